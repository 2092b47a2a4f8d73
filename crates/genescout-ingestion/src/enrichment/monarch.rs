//! Monarch Initiative gene-to-disease associations.
//!
//! Endpoint (v3): {base}/association?subject=NCBIGene:{id}&category=biolink:CausalGeneToDiseaseAssociation
//!
//! Responses from the retired v2 API (`associations[].object.label`) are still understood.

use anyhow::{Context, Result};
use genescout_common::sandbox::SandboxClient as Client;
use serde::Deserialize;
use tracing::instrument;

pub const MONARCH_API_URL: &str = "https://api-v3.monarchinitiative.org/v3/api";

const DISEASE_ASSOCIATION: &str = "biolink:CausalGeneToDiseaseAssociation";

#[derive(Debug, Default, Deserialize)]
struct AssociationPage {
    #[serde(default)]
    items: Vec<V3Association>,
    #[serde(default)]
    associations: Vec<LegacyAssociation>,
}

#[derive(Debug, Deserialize)]
struct V3Association {
    #[serde(default)]
    object_label: Option<String>,
}

#[derive(Debug, Deserialize)]
struct LegacyAssociation {
    object: LegacyObject,
}

#[derive(Debug, Deserialize)]
struct LegacyObject {
    #[serde(default)]
    label: Option<String>,
}

pub struct MonarchClient {
    client: Client,
    base_url: String,
}

impl MonarchClient {
    pub fn new(client: Client, base_url: impl Into<String>) -> Self {
        Self { client, base_url: base_url.into() }
    }

    /// Disease labels associated with an NCBI gene, in API order, without duplicates.
    #[instrument(skip(self))]
    pub async fn disease_labels(&self, ncbi_gene_id: &str) -> Result<Vec<String>> {
        let subject = format!("NCBIGene:{ncbi_gene_id}");
        let page: AssociationPage = self.client
            .get(&format!("{}/association", self.base_url.trim_end_matches('/')))?
            .query(&[("subject", subject.as_str()), ("category", DISEASE_ASSOCIATION)])
            .header("Accept", "application/json")
            .send()
            .await
            .context("Monarch request failed")?
            .error_for_status()?
            .json()
            .await
            .context("Monarch response parse failed")?;

        Ok(page_labels(page))
    }
}

fn page_labels(page: AssociationPage) -> Vec<String> {
    let labels = page
        .items
        .into_iter()
        .filter_map(|a| a.object_label)
        .chain(page.associations.into_iter().filter_map(|a| a.object.label));

    let mut seen = Vec::new();
    for label in labels {
        let label = label.trim().to_string();
        if !label.is_empty() && !seen.contains(&label) {
            seen.push(label);
        }
    }
    seen
}
