//! Ensembl REST lookups: gene coordinates and Entrez cross-references.
//!
//! Endpoints:
//!   {base}/lookup/symbol/homo_sapiens/{symbol}
//!   {base}/xrefs/symbol/homo_sapiens/{symbol}?external_db=EntrezGene
//!
//! The same client serves GRCh38 (rest.ensembl.org) and GRCh37
//! (grch37.rest.ensembl.org); only the base URL differs.

use anyhow::{Context, Result};
use genescout_common::sandbox::SandboxClient as Client;
use serde::Deserialize;
use tracing::instrument;

pub const ENSEMBL_REST_URL: &str = "https://rest.ensembl.org";
pub const ENSEMBL_GRCH37_REST_URL: &str = "https://grch37.rest.ensembl.org";

#[derive(Debug, Deserialize)]
struct GeneLookup {
    seq_region_name: String,
    start: u64,
    end: u64,
}

#[derive(Debug, Deserialize)]
struct Xref {
    #[serde(default)]
    dbname: Option<String>,
    #[serde(default)]
    primary_id: Option<String>,
}

pub struct EnsemblClient {
    client: Client,
    base_url: String,
}

impl EnsemblClient {
    pub fn new(client: Client, base_url: impl Into<String>) -> Self {
        Self { client, base_url: base_url.into() }
    }

    fn endpoint(&self, kind: &str, symbol: &str) -> Result<String> {
        super::rest_endpoint(&self.base_url, &[kind, "symbol", "homo_sapiens", symbol])
    }

    /// `"{chromosome}:{start}-{end}"` for the gene on this assembly.
    #[instrument(skip(self))]
    pub async fn coordinates(&self, symbol: &str) -> Result<String> {
        let lookup: GeneLookup = self.client
            .get(&self.endpoint("lookup", symbol)?)?
            .header("Content-Type", "application/json")
            .send()
            .await
            .context("Ensembl lookup request failed")?
            .error_for_status()?
            .json()
            .await
            .context("Ensembl lookup parse failed")?;

        Ok(format!("{}:{}-{}", lookup.seq_region_name, lookup.start, lookup.end))
    }

    /// NCBI Gene id from the first `EntrezGene` cross-reference.
    #[instrument(skip(self))]
    pub async fn entrez_gene_id(&self, symbol: &str) -> Result<Option<String>> {
        let xrefs: Vec<Xref> = self.client
            .get(&self.endpoint("xrefs", symbol)?)?
            .query(&[("external_db", "EntrezGene")])
            .header("Content-Type", "application/json")
            .send()
            .await
            .context("Ensembl xref request failed")?
            .error_for_status()?
            .json()
            .await
            .context("Ensembl xref parse failed")?;

        Ok(xrefs
            .into_iter()
            .find(|x| x.dbname.as_deref() == Some("EntrezGene"))
            .and_then(|x| x.primary_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    #[tokio::test]
    async fn test_coordinates_format() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/lookup/symbol/homo_sapiens/BRCA1")
            .with_body(r#"{"id": "ENSG00000012048", "seq_region_name": "17", "start": 43044292, "end": 43170245, "strand": -1}"#)
            .create_async()
            .await;

        let ensembl = EnsemblClient::new(Client::new().unwrap(), server.url());
        assert_eq!(ensembl.coordinates("BRCA1").await.unwrap(), "17:43044292-43170245");
    }

    #[tokio::test]
    async fn test_unknown_symbol_is_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/lookup/symbol/homo_sapiens/NOPE")
            .with_status(400)
            .with_body(r#"{"error": "No valid lookup found for symbol NOPE"}"#)
            .create_async()
            .await;

        let ensembl = EnsemblClient::new(Client::new().unwrap(), server.url());
        assert!(ensembl.coordinates("NOPE").await.is_err());
    }

    #[tokio::test]
    async fn test_entrez_xref_picks_entrezgene_entry() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/xrefs/symbol/homo_sapiens/TP53")
            .match_query(Matcher::UrlEncoded("external_db".into(), "EntrezGene".into()))
            .with_body(r#"[{"dbname": "HGNC", "primary_id": "HGNC:11998"}, {"dbname": "EntrezGene", "primary_id": "7157"}]"#)
            .create_async()
            .await;

        let ensembl = EnsemblClient::new(Client::new().unwrap(), server.url());
        assert_eq!(ensembl.entrez_gene_id("TP53").await.unwrap().as_deref(), Some("7157"));
    }

    #[tokio::test]
    async fn test_symbol_with_slash_stays_one_segment() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/lookup/symbol/homo_sapiens/p53%2Fp21")
            .with_status(400)
            .with_body(r#"{"error": "No valid lookup found"}"#)
            .expect(1)
            .create_async()
            .await;

        let ensembl = EnsemblClient::new(Client::new().unwrap(), server.url());
        assert!(ensembl.coordinates("p53/p21").await.is_err());
        mock.assert_async().await;
    }
}
