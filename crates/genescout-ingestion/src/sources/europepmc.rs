//! Europe PMC text-mined annotations client.
//!
//! Endpoint: {base}/annotationsByArticleIds?articleIds=MED:{pmid}&type=Gene_Proteins&format=JSON

use async_trait::async_trait;
use genescout_common::sandbox::SandboxClient as Client;
use serde::Deserialize;
use tracing::{debug, instrument};

use crate::models::{GeneSymbolSet, PublicationId};
use super::{base, GeneSymbolSource};

pub const EUROPEPMC_ANNOTATIONS_URL: &str = "https://www.ebi.ac.uk/europepmc/annotations_api";

const GENE_ANNOTATION_TYPES: &[&str] = &["Gene", "Gene_Proteins"];

pub struct EuropePmcClient {
    client: Client,
    base_url: String,
}

impl EuropePmcClient {
    pub fn new(client: Client) -> Self {
        Self::with_base_url(client, EUROPEPMC_ANNOTATIONS_URL)
    }

    pub fn with_base_url(client: Client, base_url: impl Into<String>) -> Self {
        Self { client, base_url: base_url.into() }
    }
}

#[async_trait]
impl GeneSymbolSource for EuropePmcClient {
    fn name(&self) -> &'static str {
        "europepmc"
    }

    #[instrument(skip(self), fields(pmid = %pmid))]
    async fn fetch_gene_symbols(&self, pmid: &PublicationId) -> anyhow::Result<GeneSymbolSet> {
        let article_id = format!("MED:{pmid}");
        let params = [
            ("articleIds", article_id.as_str()),
            ("type", "Gene_Proteins"),
            ("format", "JSON"),
        ];

        let resp = self.client
            .get(&format!("{}/annotationsByArticleIds", base(&self.base_url)))?
            .query(&params)
            .send()
            .await?
            .error_for_status()?
            .json::<serde_json::Value>()
            .await?;

        let symbols = parse_annotations(resp)?;
        debug!(count = symbols.len(), "Europe PMC gene annotations parsed");
        Ok(symbols)
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum AnnotationResponse {
    Many(Vec<AnnotatedArticle>),
    Single(AnnotatedArticle),
}

#[derive(Debug, Deserialize)]
struct AnnotatedArticle {
    annotations: Vec<Annotation>,
}

#[derive(Debug, Deserialize)]
struct Annotation {
    #[serde(default)]
    exact: Option<String>,
    #[serde(rename = "type", default)]
    kind: Option<String>,
}

fn parse_annotations(resp: serde_json::Value) -> anyhow::Result<GeneSymbolSet> {
    let articles = match serde_json::from_value::<AnnotationResponse>(resp) {
        Ok(AnnotationResponse::Many(articles)) => articles,
        Ok(AnnotationResponse::Single(article)) => vec![article],
        Err(e) => anyhow::bail!("unexpected Europe PMC response: {e}"),
    };

    Ok(articles
        .iter()
        .flat_map(|a| &a.annotations)
        .filter(|a| a.kind.as_deref().is_some_and(|k| GENE_ANNOTATION_TYPES.contains(&k)))
        .filter_map(|a| a.exact.as_deref())
        .collect())
}
