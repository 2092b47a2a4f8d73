//! HGNC REST lookup of approved gene records.
//!
//! Endpoint: {base}/fetch/symbol/{symbol}   (Accept: application/json)

use anyhow::{Context, Result};
use genescout_common::sandbox::SandboxClient as Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

pub const HGNC_REST_URL: &str = "https://rest.genenames.org";

/// A canonical HGNC gene record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HgncRecord {
    /// HGNC accession, e.g. "HGNC:6407"
    pub hgnc_id: String,
    /// Approved symbol, e.g. "KRAS"
    #[serde(default)]
    pub symbol: String,
    /// Full gene name
    #[serde(default)]
    pub name: String,
    #[serde(rename = "alias_symbol", default)]
    pub aliases: Vec<String>,
    /// NCBI Gene ID (Entrez)
    #[serde(default)]
    pub entrez_id: Option<String>,
    #[serde(rename = "ensembl_gene_id", default)]
    pub ensembl_id: Option<String>,
}

impl HgncRecord {
    /// Aliases as a single comma-separated field.
    pub fn joined_aliases(&self) -> String {
        self.aliases.join(",")
    }
}

#[derive(Debug, Deserialize)]
struct FetchResponse {
    response: FetchBody,
}

#[derive(Debug, Deserialize)]
struct FetchBody {
    #[serde(rename = "numFound")]
    num_found: u64,
    #[serde(default)]
    docs: Vec<HgncRecord>,
}

pub struct HgncClient {
    client: Client,
    base_url: String,
}

impl HgncClient {
    pub fn new(client: Client, base_url: impl Into<String>) -> Self {
        Self { client, base_url: base_url.into() }
    }

    /// Approved record for `symbol`; `None` when HGNC has no match.
    #[instrument(skip(self))]
    pub async fn fetch_symbol(&self, symbol: &str) -> Result<Option<HgncRecord>> {
        let url = super::rest_endpoint(&self.base_url, &["fetch", "symbol", symbol])?;
        let body: FetchResponse = self.client
            .get(&url)?
            .header("Accept", "application/json")
            .send()
            .await
            .context("HGNC request failed")?
            .error_for_status()?
            .json()
            .await
            .context("HGNC response parse failed")?;

        if body.response.num_found == 0 {
            debug!("HGNC has no record");
            return Ok(None);
        }
        Ok(body.response.docs.into_iter().next())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BRCA1: &str = r#"{
        "responseHeader": {"status": 0, "QTime": 1},
        "response": {"numFound": 1, "start": 0, "docs": [{
            "hgnc_id": "HGNC:1100",
            "symbol": "BRCA1",
            "name": "BRCA1 DNA repair associated",
            "alias_symbol": ["RNF53", "BRCC1", "PPP1R53"],
            "entrez_id": "672",
            "ensembl_gene_id": "ENSG00000012048",
            "status": "Approved"
        }]}
    }"#;

    #[tokio::test]
    async fn test_fetch_symbol_parses_record() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/fetch/symbol/BRCA1")
            .match_header("accept", "application/json")
            .with_body(BRCA1)
            .expect(1)
            .create_async()
            .await;

        let hgnc = HgncClient::new(Client::new().unwrap(), server.url());
        let record = hgnc.fetch_symbol("BRCA1").await.unwrap().unwrap();
        assert_eq!(record.hgnc_id, "HGNC:1100");
        assert_eq!(record.name, "BRCA1 DNA repair associated");
        assert_eq!(record.joined_aliases(), "RNF53,BRCC1,PPP1R53");
        assert_eq!(record.entrez_id.as_deref(), Some("672"));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_no_match_is_none() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/fetch/symbol/NOTAGENE")
            .with_body(r#"{"response": {"numFound": 0, "start": 0, "docs": []}}"#)
            .create_async()
            .await;

        let hgnc = HgncClient::new(Client::new().unwrap(), server.url());
        assert!(hgnc.fetch_symbol("NOTAGENE").await.unwrap().is_none());
    }

    #[test]
    fn test_record_without_aliases() {
        let record: HgncRecord = serde_json::from_str(r#"{"hgnc_id": "HGNC:11998", "symbol": "TP53"}"#).unwrap();
        assert_eq!(record.joined_aliases(), "");
        assert!(record.entrez_id.is_none());
    }
}
