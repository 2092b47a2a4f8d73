//! PubTator gene annotation client.
//!
//! Endpoint used:
//!   biocjson export: {base}/publications/export/biocjson?pmids={id}
//!
//! The export has shipped in several shapes over time: a single BioC document,
//! an array of documents, a `{"PubTator3": [...]}` wrapper, or one document per
//! line. All of them are accepted.

use async_trait::async_trait;
use genescout_common::sandbox::SandboxClient as Client;
use serde::Deserialize;
use tracing::{debug, instrument};

use crate::models::{GeneSymbolSet, PublicationId};
use super::{base, GeneSymbolSource};

pub const PUBTATOR_BASE_URL: &str = "https://www.ncbi.nlm.nih.gov/research/pubtator3-api";

pub struct PubTatorClient {
    client: Client,
    base_url: String,
}

impl PubTatorClient {
    pub fn new(client: Client) -> Self {
        Self::with_base_url(client, PUBTATOR_BASE_URL)
    }

    pub fn with_base_url(client: Client, base_url: impl Into<String>) -> Self {
        Self { client, base_url: base_url.into() }
    }
}

#[async_trait]
impl GeneSymbolSource for PubTatorClient {
    fn name(&self) -> &'static str {
        "pubtator"
    }

    #[instrument(skip(self), fields(pmid = %pmid))]
    async fn fetch_gene_symbols(&self, pmid: &PublicationId) -> anyhow::Result<GeneSymbolSet> {
        let url = format!("{}/publications/export/biocjson", base(&self.base_url));
        let body = self.client
            .get(&url)?
            .query(&[("pmids", pmid.as_str())])
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;

        let symbols = parse_biocjson(&body)?;
        debug!(count = symbols.len(), "PubTator gene annotations parsed");
        Ok(symbols)
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum BiocExport {
    Wrapped {
        #[serde(rename = "PubTator3")]
        documents: Vec<BiocDocument>,
    },
    Many(Vec<BiocDocument>),
    Single(BiocDocument),
}

impl BiocExport {
    fn into_documents(self) -> Vec<BiocDocument> {
        match self {
            BiocExport::Wrapped { documents } | BiocExport::Many(documents) => documents,
            BiocExport::Single(doc) => vec![doc],
        }
    }
}

#[derive(Debug, Deserialize)]
struct BiocDocument {
    passages: Vec<BiocPassage>,
}

#[derive(Debug, Deserialize)]
struct BiocPassage {
    #[serde(default)]
    annotations: Vec<BiocAnnotation>,
}

#[derive(Debug, Deserialize)]
struct BiocAnnotation {
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    infons: BiocInfons,
}

#[derive(Debug, Default, Deserialize)]
struct BiocInfons {
    #[serde(rename = "type", default)]
    kind: Option<String>,
}

/// Collect the text of every `Gene` annotation in a biocjson export.
pub(crate) fn parse_biocjson(body: &str) -> anyhow::Result<GeneSymbolSet> {
    let documents = match serde_json::from_str::<BiocExport>(body) {
        Ok(export) => export.into_documents(),
        Err(whole_err) => {
            // Older exports stream one document per line
            let lines: Vec<&str> = body.lines().filter(|l| !l.trim().is_empty()).collect();
            if lines.len() < 2 {
                return Err(anyhow::anyhow!("unexpected PubTator response: {whole_err}"));
            }
            lines
                .into_iter()
                .map(serde_json::from_str::<BiocDocument>)
                .collect::<Result<Vec<_>, _>>()
                .map_err(|e| anyhow::anyhow!("unexpected PubTator response: {e}"))?
        }
    };

    Ok(documents
        .iter()
        .flat_map(|doc| &doc.passages)
        .flat_map(|passage| &passage.annotations)
        .filter(|a| a.infons.kind.as_deref() == Some("Gene"))
        .filter_map(|a| a.text.as_deref())
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    const DOC: &str = r#"{
        "id": "38790019",
        "passages": [
            {"infons": {"type": "title"}, "annotations": [
                {"text": "EGFR", "infons": {"type": "Gene", "identifier": "1956"}},
                {"text": "lung cancer", "infons": {"type": "Disease"}}
            ]},
            {"infons": {"type": "abstract"}, "annotations": [
                {"text": "TP53", "infons": {"type": "Gene", "identifier": null}},
                {"text": "EGFR", "infons": {"type": "Gene"}},
                {"text": null, "infons": {"type": "Gene"}}
            ]}
        ]
    }"#;

    #[test]
    fn test_parse_single_document() {
        let symbols = parse_biocjson(DOC).unwrap();
        assert_eq!(symbols.into_vec(), vec!["EGFR", "TP53"]);
    }

    #[test]
    fn test_parse_wrapped_and_array() {
        let wrapped = format!(r#"{{"PubTator3": [{DOC}]}}"#);
        assert_eq!(parse_biocjson(&wrapped).unwrap().len(), 2);

        let array = format!("[{DOC}]");
        assert_eq!(parse_biocjson(&array).unwrap().len(), 2);
    }

    #[test]
    fn test_parse_line_delimited_documents() {
        let body = concat!(
            r#"{"passages":[{"annotations":[{"text":"KRAS","infons":{"type":"Gene"}}]}]}"#,
            "\n",
            r#"{"passages":[{"annotations":[{"text":"ALK","infons":{"type":"Gene"}}]}]}"#,
            "\n"
        );
        assert_eq!(parse_biocjson(body).unwrap().into_vec(), vec!["ALK", "KRAS"]);
    }

    #[test]
    fn test_parse_rejects_unexpected_shape() {
        assert!(parse_biocjson(r#"{"error": "not found"}"#).is_err());
        assert!(parse_biocjson("<html>down</html>").is_err());
    }

    #[test]
    fn test_no_gene_annotations_is_empty() {
        let body = r#"{"passages":[{"annotations":[{"text":"NSCLC","infons":{"type":"Disease"}}]}]}"#;
        assert!(parse_biocjson(body).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_fetch_queries_export_endpoint() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/publications/export/biocjson")
            .match_query(Matcher::UrlEncoded("pmids".into(), "38790019".into()))
            .with_status(200)
            .with_body(DOC)
            .expect(1)
            .create_async()
            .await;

        let client = PubTatorClient::with_base_url(Client::new().unwrap(), server.url());
        let symbols = client.fetch_gene_symbols(&PublicationId::from("38790019")).await.unwrap();
        assert!(symbols.contains("EGFR"));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_server_error_is_reported_as_failure() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/publications/export/biocjson")
            .match_query(Matcher::Any)
            .with_status(503)
            .create_async()
            .await;

        let client = PubTatorClient::with_base_url(Client::new().unwrap(), server.url());
        let outcome = client.gene_symbols(&PublicationId::from("1")).await;
        assert!(!outcome.is_found());
        assert!(matches!(outcome, crate::models::StageOutcome::Empty(crate::models::EmptyReason::Failed(_))));
    }
}
