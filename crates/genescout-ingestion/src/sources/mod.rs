//! Literature annotation source clients.

pub mod pubtator;
pub mod entrez;
pub mod europepmc;
pub mod pubmed;

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::models::{ArticleText, GeneSymbolSet, PublicationId, StageOutcome};

pub use entrez::EntrezClient;
pub use europepmc::EuropePmcClient;
pub use pubmed::PubMedClient;
pub use pubtator::PubTatorClient;

/// Common interface for services that return gene mentions for a publication.
#[async_trait]
pub trait GeneSymbolSource: Send + Sync {
    /// Short name used in logs and extraction reports.
    fn name(&self) -> &'static str;

    /// Query the service. Any transport, status or parse problem is an `Err`.
    async fn fetch_gene_symbols(&self, pmid: &PublicationId) -> anyhow::Result<GeneSymbolSet>;

    /// Query the service, logging and absorbing every failure.
    /// Never propagates an error: a failing source is an empty stage.
    async fn gene_symbols(&self, pmid: &PublicationId) -> StageOutcome {
        match self.fetch_gene_symbols(pmid).await {
            Ok(symbols) => {
                debug!(source = self.name(), pmid = %pmid, count = symbols.len(), "Annotation source answered");
                StageOutcome::from_symbols(symbols)
            }
            Err(e) => {
                warn!(source = self.name(), pmid = %pmid, error = %format!("{e:#}"), "Annotation source failed");
                StageOutcome::failed(format!("{e:#}"))
            }
        }
    }
}

/// Provides title and abstract text for a publication. Infallible by contract:
/// failures yield [`ArticleText::unknown`].
#[async_trait]
pub trait ArticleSource: Send + Sync {
    async fn fetch_article_text(&self, pmid: &PublicationId) -> ArticleText;
}

/// Contact parameters NCBI asks E-utilities callers to send.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EutilsContact {
    pub email: Option<String>,
    pub tool: Option<String>,
    pub api_key: Option<String>,
}

impl EutilsContact {
    fn params(&self) -> Vec<(&'static str, String)> {
        let mut params = Vec::new();
        if let Some(email) = &self.email {
            params.push(("email", email.clone()));
        }
        if let Some(tool) = &self.tool {
            params.push(("tool", tool.clone()));
        }
        if let Some(key) = &self.api_key {
            params.push(("api_key", key.clone()));
        }
        params
    }
}

/// Endpoints and politeness settings for every source client.
#[derive(Debug, Clone)]
pub struct SourceSettings {
    pub pubtator_url: String,
    /// E-utilities base used for Entrez gene links.
    pub eutils_url: String,
    pub europepmc_url: String,
    /// E-utilities base used for article title/abstract.
    pub pubmed_url: String,
    pub contact: EutilsContact,
    /// Pause before each Entrez gene detail request.
    pub entrez_delay: Duration,
}

impl Default for SourceSettings {
    fn default() -> Self {
        Self {
            pubtator_url: pubtator::PUBTATOR_BASE_URL.to_string(),
            eutils_url: entrez::EUTILS_BASE_URL.to_string(),
            europepmc_url: europepmc::EUROPEPMC_ANNOTATIONS_URL.to_string(),
            pubmed_url: entrez::EUTILS_BASE_URL.to_string(),
            contact: EutilsContact {
                email: None,
                tool: Some("genescout".to_string()),
                api_key: None,
            },
            entrez_delay: entrez::DEFAULT_REQUEST_DELAY,
        }
    }
}

/// Strip a trailing slash so endpoint paths can be appended with `format!`.
fn base(url: &str) -> &str {
    url.trim_end_matches('/')
}
