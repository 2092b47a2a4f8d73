//! Gene symbol extraction cascade.
//!
//! Stages run strictly in order and the first one that yields a non-empty set wins:
//!
//! ```text
//!   PubTator → Entrez gene links → Europe PMC → NER (two models, unioned) → regex
//! ```
//!
//! Every stage reports a [`StageOutcome`]; failures and panics never escape a stage.
//! The NER and regex stages share one title+abstract fetch through [`ExtractionContext`].

mod annotation;
mod cascade;
mod heuristic;
mod ner;

use async_trait::async_trait;
use tokio::sync::OnceCell;

use crate::models::{PublicationId, StageOutcome};
use crate::sources::ArticleSource;

pub use annotation::AnnotationStage;
pub use cascade::{ExtractionReport, GeneSymbolExtractor, StageAttempt};
pub use heuristic::{RegexExtractor, RegexStage, DEFAULT_DENYLIST};
pub use ner::{gene_symbols_from_entities, ModelState, NerExtractor, NerStage};

/// One step of the cascade.
#[async_trait]
pub trait ExtractionStrategy: Send + Sync {
    fn name(&self) -> &str;

    async fn extract(&self, ctx: &ExtractionContext<'_>) -> StageOutcome;
}

/// Per-call state shared by the stages of one extraction.
pub struct ExtractionContext<'a> {
    pmid: &'a PublicationId,
    articles: &'a dyn ArticleSource,
    text: OnceCell<String>,
}

impl<'a> ExtractionContext<'a> {
    pub fn new(pmid: &'a PublicationId, articles: &'a dyn ArticleSource) -> Self {
        Self { pmid, articles, text: OnceCell::new() }
    }

    pub fn pmid(&self) -> &PublicationId {
        self.pmid
    }

    /// Title and abstract joined by a space. Fetched on first use, at most once.
    pub async fn article_text(&self) -> &str {
        self.text
            .get_or_init(|| async { self.articles.fetch_article_text(self.pmid).await.combined() })
            .await
    }

    pub fn text_fetched(&self) -> bool {
        self.text.initialized()
    }
}
