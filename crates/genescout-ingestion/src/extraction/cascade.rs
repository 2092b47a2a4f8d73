use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use genescout_common::sandbox::SandboxClient;
use serde::Serialize;
use tracing::{error, info, instrument};

use crate::models::{EmptyReason, GeneSymbolSet, PublicationId, StageOutcome};
use crate::sources::{
    ArticleSource, EntrezClient, EuropePmcClient, PubMedClient, PubTatorClient, SourceSettings,
};
use super::{
    AnnotationStage, ExtractionContext, ExtractionStrategy, NerExtractor, NerStage, RegexExtractor,
    RegexStage,
};

/// What one stage returned during an extraction.
#[derive(Debug, Clone)]
pub struct StageAttempt {
    pub stage: String,
    pub outcome: StageOutcome,
}

/// Result of one extraction, with the trail of stages that were tried.
#[derive(Debug, Clone, Serialize)]
pub struct ExtractionReport {
    pub pmid: PublicationId,
    pub symbols: GeneSymbolSet,
    /// Stage that produced `symbols`; `None` when every stage came up empty.
    pub source: Option<String>,
    #[serde(skip)]
    pub attempts: Vec<StageAttempt>,
}

impl ExtractionReport {
    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    /// Stages that failed or could not run, with their reasons.
    pub fn problems(&self) -> impl Iterator<Item = (&str, &EmptyReason)> {
        self.attempts.iter().filter_map(|a| match &a.outcome {
            StageOutcome::Empty(
                reason @ (EmptyReason::Failed(_) | EmptyReason::Unavailable(_)),
            ) => Some((a.stage.as_str(), reason)),
            _ => None,
        })
    }
}

/// Ordered cascade of extraction stages. The first non-empty stage wins.
pub struct GeneSymbolExtractor {
    stages: Vec<Box<dyn ExtractionStrategy>>,
    articles: Arc<dyn ArticleSource>,
}

impl GeneSymbolExtractor {
    /// Empty cascade; add stages with [`with_stage`](Self::with_stage).
    pub fn new(articles: Arc<dyn ArticleSource>) -> Self {
        Self { stages: Vec::new(), articles }
    }

    /// The production cascade: PubTator, Entrez, Europe PMC, NER, regex.
    pub fn standard(
        client: SandboxClient,
        settings: &SourceSettings,
        ner: Vec<NerExtractor>,
        regex: RegexExtractor,
    ) -> Self {
        let pubtator = PubTatorClient::with_base_url(client.clone(), &settings.pubtator_url);
        let entrez = EntrezClient::new(client.clone(), settings.contact.clone())
            .with_base_url(&settings.eutils_url)
            .with_request_delay(settings.entrez_delay);
        let europepmc = EuropePmcClient::with_base_url(client.clone(), &settings.europepmc_url);
        let pubmed =
            PubMedClient::new(client, settings.contact.clone()).with_base_url(&settings.pubmed_url);

        Self::new(Arc::new(pubmed))
            .with_stage(AnnotationStage::new(Arc::new(pubtator)))
            .with_stage(AnnotationStage::new(Arc::new(entrez)))
            .with_stage(AnnotationStage::new(Arc::new(europepmc)))
            .with_stage(NerStage::new(ner))
            .with_stage(RegexStage::new(regex))
    }

    pub fn with_stage(mut self, stage: impl ExtractionStrategy + 'static) -> Self {
        self.stages.push(Box::new(stage));
        self
    }

    pub fn stage_names(&self) -> Vec<&str> {
        self.stages.iter().map(|s| s.name()).collect()
    }

    /// Run the cascade for one publication. Never fails: an empty report means
    /// no stage found anything.
    #[instrument(skip(self), fields(pmid = %pmid))]
    pub async fn extract(&self, pmid: &PublicationId) -> ExtractionReport {
        info!("Starting gene symbol extraction");
        let ctx = ExtractionContext::new(pmid, self.articles.as_ref());
        let mut attempts = Vec::with_capacity(self.stages.len());

        for stage in &self.stages {
            let name = stage.name().to_string();
            let outcome = match AssertUnwindSafe(stage.extract(&ctx)).catch_unwind().await {
                Ok(outcome) => outcome,
                Err(panic) => {
                    let msg = panic_message(panic.as_ref());
                    error!(stage = %name, panic = %msg, "Extraction stage panicked");
                    StageOutcome::failed(format!("panicked: {msg}"))
                }
            };

            match &outcome {
                StageOutcome::Found(symbols) => {
                    info!(stage = %name, count = symbols.len(), symbols = %symbols, "Gene symbols found");
                }
                StageOutcome::Empty(reason) => {
                    info!(stage = %name, reason = %reason, "Stage returned no gene symbols");
                }
            }

            let symbols = outcome.symbols().cloned();
            attempts.push(StageAttempt { stage: name.clone(), outcome });
            if let Some(symbols) = symbols {
                return ExtractionReport {
                    pmid: pmid.clone(),
                    symbols,
                    source: Some(name),
                    attempts,
                };
            }
        }

        info!("No gene symbols found by any stage");
        ExtractionReport {
            pmid: pmid.clone(),
            symbols: GeneSymbolSet::new(),
            source: None,
            attempts,
        }
    }

    /// The symbols alone.
    pub async fn gene_symbols(&self, pmid: &PublicationId) -> GeneSymbolSet {
        self.extract(pmid).await.symbols
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
