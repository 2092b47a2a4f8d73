//! Gene metadata enrichment: HGNC identity, Ensembl coordinates, Monarch diseases.
//!
//! Genes are enriched one after another with a fixed pause between them. A gene
//! unknown to HGNC is skipped; any other lookup failure degrades that field to `N/A`.

pub mod ensembl;
pub mod hgnc;
pub mod monarch;

use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use genescout_common::sandbox::SandboxClient;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use crate::models::GeneSymbolSet;
use ensembl::EnsemblClient;
use hgnc::{HgncClient, HgncRecord};
use monarch::MonarchClient;

/// Placeholder for any field that could not be resolved.
pub const NOT_AVAILABLE: &str = "N/A";

/// `base` with `segments` appended as percent-encoded path segments, so a symbol
/// such as "p53/p21" stays one segment.
fn rest_endpoint(base: &str, segments: &[&str]) -> Result<String> {
    let mut url = url::Url::parse(base).with_context(|| format!("Invalid base URL {base}"))?;
    url.path_segments_mut()
        .map_err(|_| anyhow!("Base URL {base} cannot take path segments"))?
        .pop_if_empty()
        .extend(segments);
    Ok(url.into())
}

/// One enriched gene, one CSV row. Field names match the report columns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneMetadata {
    #[serde(rename = "HGNC_ID")]
    pub hgnc_id: String,
    #[serde(rename = "HGNC_Gene_Name")]
    pub gene_name: String,
    #[serde(rename = "Gene_Aliases", default)]
    pub aliases: String,
    #[serde(rename = "Hg38_Coordinates")]
    pub hg38_coordinates: String,
    #[serde(rename = "Hg19_Coordinates")]
    pub hg19_coordinates: String,
    #[serde(rename = "Disease")]
    pub disease: String,
}

impl GeneMetadata {
    /// Aliases split on `,`, trimmed, blanks dropped.
    pub fn alias_list(&self) -> Vec<&str> {
        self.aliases
            .split(',')
            .map(str::trim)
            .filter(|a| !a.is_empty())
            .collect()
    }
}

#[derive(Debug, Clone)]
pub struct EnrichmentSettings {
    pub hgnc_url: String,
    pub ensembl_url: String,
    pub ensembl_grch37_url: String,
    pub monarch_url: String,
    /// Disease labels kept per gene.
    pub max_diseases: usize,
    /// Pause between consecutive genes.
    pub gene_delay: Duration,
}

impl Default for EnrichmentSettings {
    fn default() -> Self {
        Self {
            hgnc_url: hgnc::HGNC_REST_URL.to_string(),
            ensembl_url: ensembl::ENSEMBL_REST_URL.to_string(),
            ensembl_grch37_url: ensembl::ENSEMBL_GRCH37_REST_URL.to_string(),
            monarch_url: monarch::MONARCH_API_URL.to_string(),
            max_diseases: 2,
            gene_delay: Duration::from_secs(1),
        }
    }
}

pub struct MetadataEnricher {
    hgnc: HgncClient,
    grch38: EnsemblClient,
    grch37: EnsemblClient,
    monarch: MonarchClient,
    max_diseases: usize,
    gene_delay: Duration,
}

impl MetadataEnricher {
    pub fn new(client: SandboxClient, settings: &EnrichmentSettings) -> Self {
        Self {
            hgnc: HgncClient::new(client.clone(), &settings.hgnc_url),
            grch38: EnsemblClient::new(client.clone(), &settings.ensembl_url),
            grch37: EnsemblClient::new(client.clone(), &settings.ensembl_grch37_url),
            monarch: MonarchClient::new(client, &settings.monarch_url),
            max_diseases: settings.max_diseases,
            gene_delay: settings.gene_delay,
        }
    }

    /// Enrich every symbol, in set order. Genes HGNC does not know are left out.
    #[instrument(skip_all, fields(genes = symbols.len()))]
    pub async fn enrich(&self, symbols: &GeneSymbolSet) -> Vec<GeneMetadata> {
        let mut rows = Vec::with_capacity(symbols.len());
        for (i, symbol) in symbols.iter().enumerate() {
            if i > 0 {
                tokio::time::sleep(self.gene_delay).await;
            }
            info!(gene = %symbol, "Processing gene");
            match self.enrich_gene(symbol).await {
                Some(row) => rows.push(row),
                None => warn!(gene = %symbol, "Skipping gene due to missing HGNC data"),
            }
        }
        info!(enriched = rows.len(), requested = symbols.len(), "Enrichment complete");
        rows
    }

    /// Metadata for one gene, or `None` when HGNC has no usable record.
    pub async fn enrich_gene(&self, symbol: &str) -> Option<GeneMetadata> {
        let record = match self.hgnc.fetch_symbol(symbol).await {
            Ok(Some(record)) => record,
            Ok(None) => {
                warn!(gene = %symbol, "No HGNC data found");
                return None;
            }
            Err(e) => {
                warn!(gene = %symbol, error = %format!("{e:#}"), "HGNC lookup failed");
                return None;
            }
        };

        let hg38_coordinates = self.coordinates(&self.grch38, symbol, "GRCh38").await;
        let hg19_coordinates = self.coordinates(&self.grch37, symbol, "GRCh37").await;
        let disease = self.diseases(symbol, &record).await;

        Some(GeneMetadata {
            aliases: record.joined_aliases(),
            hgnc_id: record.hgnc_id,
            gene_name: record.name,
            hg38_coordinates,
            hg19_coordinates,
            disease,
        })
    }

    async fn coordinates(&self, ensembl: &EnsemblClient, symbol: &str, assembly: &str) -> String {
        match ensembl.coordinates(symbol).await {
            Ok(coords) => coords,
            Err(e) => {
                warn!(gene = %symbol, assembly, error = %format!("{e:#}"), "Ensembl coordinate lookup failed");
                NOT_AVAILABLE.to_string()
            }
        }
    }

    /// First `max_diseases` Monarch disease labels joined with `;`.
    async fn diseases(&self, symbol: &str, record: &HgncRecord) -> String {
        let ncbi_id = match self.grch38.entrez_gene_id(symbol).await {
            Ok(Some(id)) => Some(id),
            Ok(None) => record.entrez_id.clone(),
            Err(e) => {
                debug!(gene = %symbol, error = %format!("{e:#}"), "Ensembl xref lookup failed; using HGNC Entrez id");
                record.entrez_id.clone()
            }
        };
        let Some(ncbi_id) = ncbi_id else {
            warn!(gene = %symbol, "No NCBI Gene ID found");
            return NOT_AVAILABLE.to_string();
        };

        match self.monarch.disease_labels(&ncbi_id).await {
            Ok(labels) if !labels.is_empty() => {
                labels.into_iter().take(self.max_diseases).collect::<Vec<_>>().join(";")
            }
            Ok(_) => NOT_AVAILABLE.to_string(),
            Err(e) => {
                warn!(gene = %symbol, error = %format!("{e:#}"), "Monarch disease lookup failed");
                NOT_AVAILABLE.to_string()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::{Matcher, Server};

    #[test]
    fn test_rest_endpoint_encodes_symbol_segment() {
        assert_eq!(
            rest_endpoint("https://rest.genenames.org", &["fetch", "symbol", "p53/p21"]).unwrap(),
            "https://rest.genenames.org/fetch/symbol/p53%2Fp21"
        );
        assert_eq!(
            rest_endpoint("http://127.0.0.1:1234/hgnc/", &["fetch", "symbol", "A#B?"]).unwrap(),
            "http://127.0.0.1:1234/hgnc/fetch/symbol/A%23B%3F"
        );
        assert!(rest_endpoint("not a url", &["x"]).is_err());
    }

    async fn mock_gene(server: &mut Server, symbol: &str, hgnc_id: &str, entrez: &str) {
        server
            .mock("GET", format!("/hgnc/fetch/symbol/{symbol}").as_str())
            .with_body(format!(
                r#"{{"response": {{"numFound": 1, "docs": [{{"hgnc_id": "{hgnc_id}", "symbol": "{symbol}", "name": "{symbol} name", "alias_symbol": ["A1", "A2"]}}]}}}}"#
            ))
            .create_async()
            .await;
        server
            .mock("GET", format!("/grch38/lookup/symbol/homo_sapiens/{symbol}").as_str())
            .with_body(r#"{"seq_region_name": "17", "start": 100, "end": 200}"#)
            .create_async()
            .await;
        server
            .mock("GET", format!("/grch38/xrefs/symbol/homo_sapiens/{symbol}").as_str())
            .match_query(Matcher::Any)
            .with_body(format!(r#"[{{"dbname": "EntrezGene", "primary_id": "{entrez}"}}]"#))
            .create_async()
            .await;
    }

    fn enricher(server: &Server) -> MetadataEnricher {
        let url = server.url();
        let settings = EnrichmentSettings {
            hgnc_url: format!("{url}/hgnc"),
            ensembl_url: format!("{url}/grch38"),
            ensembl_grch37_url: format!("{url}/grch37"),
            monarch_url: format!("{url}/monarch"),
            max_diseases: 2,
            gene_delay: Duration::from_millis(1),
        };
        MetadataEnricher::new(SandboxClient::new().unwrap(), &settings)
    }

    #[tokio::test]
    async fn test_enrich_gene_fills_every_column() {
        let mut server = Server::new_async().await;
        mock_gene(&mut server, "TP53", "HGNC:11998", "7157").await;
        server
            .mock("GET", "/grch37/lookup/symbol/homo_sapiens/TP53")
            .with_body(r#"{"seq_region_name": "17", "start": 7565097, "end": 7590856}"#)
            .create_async()
            .await;
        server
            .mock("GET", "/monarch/association")
            .match_query(Matcher::UrlEncoded("subject".into(), "NCBIGene:7157".into()))
            .with_body(r#"{"items": [{"object_label": "Li-Fraumeni syndrome"}, {"object_label": "breast cancer"}, {"object_label": "glioma"}]}"#)
            .create_async()
            .await;

        let row = enricher(&server).enrich_gene("TP53").await.unwrap();
        assert_eq!(
            row,
            GeneMetadata {
                hgnc_id: "HGNC:11998".into(),
                gene_name: "TP53 name".into(),
                aliases: "A1,A2".into(),
                hg38_coordinates: "17:100-200".into(),
                hg19_coordinates: "17:7565097-7590856".into(),
                disease: "Li-Fraumeni syndrome;breast cancer".into(),
            }
        );
    }

    #[tokio::test]
    async fn test_failed_lookups_degrade_to_not_available() {
        let mut server = Server::new_async().await;
        mock_gene(&mut server, "EGFR", "HGNC:3236", "1956").await;
        server
            .mock("GET", "/grch37/lookup/symbol/homo_sapiens/EGFR")
            .with_status(503)
            .create_async()
            .await;
        server
            .mock("GET", "/monarch/association")
            .match_query(Matcher::Any)
            .with_body(r#"{"items": []}"#)
            .create_async()
            .await;

        let row = enricher(&server).enrich_gene("EGFR").await.unwrap();
        assert_eq!(row.hg38_coordinates, "17:100-200");
        assert_eq!(row.hg19_coordinates, NOT_AVAILABLE);
        assert_eq!(row.disease, NOT_AVAILABLE);
    }

    #[tokio::test]
    async fn test_genes_unknown_to_hgnc_are_skipped() {
        let mut server = Server::new_async().await;
        mock_gene(&mut server, "BRCA1", "HGNC:1100", "672").await;
        server
            .mock("GET", "/hgnc/fetch/symbol/STUDY")
            .with_body(r#"{"response": {"numFound": 0, "docs": []}}"#)
            .create_async()
            .await;
        server
            .mock("GET", Matcher::Regex(r"^/(grch37|monarch)/".into()))
            .match_query(Matcher::Any)
            .with_status(404)
            .create_async()
            .await;

        let symbols: GeneSymbolSet = ["BRCA1", "STUDY"].into_iter().collect();
        let rows = enricher(&server).enrich(&symbols).await;
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].hgnc_id, "HGNC:1100");
    }

    #[test]
    fn test_alias_list_splits_and_trims() {
        let row = GeneMetadata {
            hgnc_id: "HGNC:1".into(),
            gene_name: "x".into(),
            aliases: "RNF53, BRCC1,,".into(),
            hg38_coordinates: NOT_AVAILABLE.into(),
            hg19_coordinates: NOT_AVAILABLE.into(),
            disease: NOT_AVAILABLE.into(),
        };
        assert_eq!(row.alias_list(), vec!["RNF53", "BRCC1"]);
    }
}
