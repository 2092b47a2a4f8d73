//! NER-backed extraction: gene entities from one or more recognisers, unioned.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use async_trait::async_trait;
use genescout_ner::{
    detect_abbreviations, EntityRecognizer, EntityType, NerConfig, NerEntity, NerModel,
};
use tracing::{debug, error, info, warn};

use crate::models::{EmptyReason, GeneSymbolSet, StageOutcome};
use super::{ExtractionContext, ExtractionStrategy};

/// Whether a recogniser is usable. Load failures are remembered, not retried.
pub enum ModelState {
    Ready(Arc<dyn EntityRecognizer>),
    Unavailable(String),
}

/// One NER model in the cascade.
pub struct NerExtractor {
    label: String,
    state: ModelState,
}

impl NerExtractor {
    pub fn ready(recognizer: Arc<dyn EntityRecognizer>) -> Self {
        Self { label: recognizer.name().to_string(), state: ModelState::Ready(recognizer) }
    }

    pub fn unavailable(label: impl Into<String>, reason: impl Into<String>) -> Self {
        Self { label: label.into(), state: ModelState::Unavailable(reason.into()) }
    }

    /// Load a model once. A failure yields a disabled extractor that always reports empty.
    pub async fn load(config: NerConfig) -> Self {
        let model_id = config.model_id.clone();
        match NerModel::new(config).await {
            Ok(model) => {
                info!(model = %model_id, "NER model loaded");
                Self::ready(Arc::new(model))
            }
            Err(e) => {
                error!(model = %model_id, error = %e, "NER model failed to load; extractor disabled");
                Self::unavailable(model_id, e.to_string())
            }
        }
    }

    pub fn name(&self) -> &str {
        &self.label
    }

    pub fn is_available(&self) -> bool {
        matches!(self.state, ModelState::Ready(_))
    }

    pub fn state(&self) -> &ModelState {
        &self.state
    }

    /// Gene symbols the model finds in `text`. Model errors and panics become
    /// `Empty(Failed)`, an unloaded model is `Empty(Unavailable)`.
    pub fn extract(&self, text: &str) -> StageOutcome {
        let recognizer = match &self.state {
            ModelState::Ready(r) => r,
            ModelState::Unavailable(reason) => {
                debug!(model = %self.label, "Skipping unavailable NER model");
                return StageOutcome::Empty(EmptyReason::Unavailable(reason.clone()));
            }
        };

        let pass = catch_unwind(AssertUnwindSafe(|| {
            recognizer
                .recognize(text)
                .map(|entities| (entities.len(), gene_symbols_from_entities(text, &entities)))
        }));
        match pass {
            Ok(Ok((entities, symbols))) => {
                debug!(model = %self.label, entities, genes = symbols.len(), "NER pass complete");
                StageOutcome::from_symbols(symbols)
            }
            Ok(Err(e)) => {
                warn!(model = %self.label, error = %e, "NER inference failed");
                StageOutcome::failed(e)
            }
            Err(_) => {
                warn!(model = %self.label, "NER pass panicked");
                StageOutcome::failed("NER pass panicked")
            }
        }
    }
}

/// Text of every gene entity, plus the short form of any `long form (SF)` definition
/// whose long form overlaps a gene entity.
pub fn gene_symbols_from_entities(text: &str, entities: &[NerEntity]) -> GeneSymbolSet {
    let genes: Vec<&NerEntity> =
        entities.iter().filter(|e| e.entity_type == EntityType::Gene).collect();
    let mut symbols: GeneSymbolSet = genes.iter().map(|e| e.text.as_str()).collect();

    for abbr in detect_abbreviations(text) {
        let (long_start, long_end) = abbr.long_span;
        if genes.iter().any(|g| g.start < long_end && g.end > long_start) {
            symbols.insert(&abbr.short_form);
        }
    }
    symbols
}

/// Cascade stage running every configured extractor over the article text.
pub struct NerStage {
    extractors: Vec<NerExtractor>,
}

impl NerStage {
    pub fn new(extractors: Vec<NerExtractor>) -> Self {
        Self { extractors }
    }

    pub fn extractors(&self) -> &[NerExtractor] {
        &self.extractors
    }
}

#[async_trait]
impl ExtractionStrategy for NerStage {
    fn name(&self) -> &str {
        "ner"
    }

    async fn extract(&self, ctx: &ExtractionContext<'_>) -> StageOutcome {
        let text = ctx.article_text().await;

        let mut symbols = GeneSymbolSet::new();
        let mut unavailable = Vec::new();
        let mut failed = Vec::new();
        for extractor in &self.extractors {
            match extractor.extract(text) {
                StageOutcome::Found(found) => symbols.union_with(found),
                StageOutcome::Empty(EmptyReason::NoMatches) => {}
                StageOutcome::Empty(EmptyReason::Unavailable(r)) => {
                    unavailable.push(format!("{}: {r}", extractor.name()))
                }
                StageOutcome::Empty(EmptyReason::Failed(r)) => {
                    failed.push(format!("{}: {r}", extractor.name()))
                }
            }
        }

        if !symbols.is_empty() {
            return StageOutcome::Found(symbols);
        }
        if !failed.is_empty() {
            return StageOutcome::Empty(EmptyReason::Failed(failed.join("; ")));
        }
        if unavailable.len() == self.extractors.len() {
            let reason = if unavailable.is_empty() {
                "no NER models configured".to_string()
            } else {
                unavailable.join("; ")
            };
            return StageOutcome::Empty(EmptyReason::Unavailable(reason));
        }
        StageOutcome::Empty(EmptyReason::NoMatches)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ArticleText, PublicationId};
    use crate::sources::ArticleSource;
    use genescout_ner::NerError;

    struct StaticArticle(ArticleText);

    #[async_trait]
    impl ArticleSource for StaticArticle {
        async fn fetch_article_text(&self, _pmid: &PublicationId) -> ArticleText {
            self.0.clone()
        }
    }

    async fn run_stage(stage: &NerStage, title: &str) -> StageOutcome {
        let articles = StaticArticle(ArticleText::new(title, "No abstract"));
        let pmid = PublicationId::from("38790019");
        let ctx = ExtractionContext::new(&pmid, &articles);
        stage.extract(&ctx).await
    }

    /// Tags every occurrence of the given phrases as genes.
    struct PhraseTagger {
        phrases: Vec<&'static str>,
    }

    impl EntityRecognizer for PhraseTagger {
        fn name(&self) -> &str {
            "phrase-tagger"
        }

        fn recognize(&self, text: &str) -> genescout_ner::Result<Vec<NerEntity>> {
            Ok(self
                .phrases
                .iter()
                .flat_map(|p| {
                    text.match_indices(p)
                        .map(|(i, m)| NerEntity::new(m, "B-GENE", i, i + m.len(), 0.9))
                })
                .collect())
        }
    }

    struct Broken;

    impl EntityRecognizer for Broken {
        fn name(&self) -> &str {
            "broken"
        }

        fn recognize(&self, _text: &str) -> genescout_ner::Result<Vec<NerEntity>> {
            Err(NerError::Inference("shape mismatch".into()))
        }
    }

    struct Panicky;

    impl EntityRecognizer for Panicky {
        fn name(&self) -> &str {
            "panicky"
        }

        fn recognize(&self, _text: &str) -> genescout_ner::Result<Vec<NerEntity>> {
            panic!("index out of bounds")
        }
    }

    fn tagger(phrases: Vec<&'static str>) -> NerExtractor {
        NerExtractor::ready(Arc::new(PhraseTagger { phrases }))
    }

    #[test]
    fn test_only_gene_entities_are_kept() {
        let entities = vec![
            NerEntity::new("TP53", "B-GENE", 0, 4, 0.9),
            NerEntity::new("lung cancer", "B-Disease", 10, 21, 0.9),
        ];
        let symbols = gene_symbols_from_entities("TP53 in a lung cancer", &entities);
        assert_eq!(symbols.into_vec(), vec!["TP53"]);
    }

    #[test]
    fn test_abbreviation_of_gene_long_form_is_added() {
        let text = "Mutations in the epidermal growth factor receptor (EGFR) drive NSCLC.";
        let outcome = tagger(vec!["epidermal growth factor receptor"]).extract(text);
        let symbols = outcome.into_symbols();
        assert!(symbols.contains("EGFR"));
        assert!(symbols.contains("epidermal growth factor receptor"));
    }

    #[test]
    fn test_abbreviation_without_gene_overlap_is_ignored() {
        let text = "non-small cell lung cancer (NSCLC) with TP53 loss";
        let symbols = tagger(vec!["TP53"]).extract(text).into_symbols();
        assert_eq!(symbols.into_vec(), vec!["TP53"]);
    }

    #[test]
    fn test_errors_and_panics_are_contained() {
        assert!(matches!(
            NerExtractor::ready(Arc::new(Broken)).extract("TP53"),
            StageOutcome::Empty(EmptyReason::Failed(_))
        ));
        assert!(matches!(
            NerExtractor::ready(Arc::new(Panicky)).extract("TP53"),
            StageOutcome::Empty(EmptyReason::Failed(_))
        ));
    }

    #[test]
    fn test_unavailable_model_reports_reason() {
        let extractor = NerExtractor::unavailable("pruas/BENT-PubMedBERT-NER-Gene", "weights missing");
        assert!(!extractor.is_available());
        assert_eq!(
            extractor.extract("TP53"),
            StageOutcome::Empty(EmptyReason::Unavailable("weights missing".into()))
        );
    }

    #[test]
    fn test_load_failure_disables_extractor() {
        let rt = tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let model_id = dir.path().to_string_lossy().into_owned();
        let config = NerConfig { model_id: model_id.clone(), ..NerConfig::default() };
        let extractor = rt.block_on(NerExtractor::load(config));
        assert!(!extractor.is_available());
        assert_eq!(extractor.name(), model_id);
    }

    #[test]
    fn test_long_form_after_no_break_space_keeps_short_form() {
        let text = "Role of the\u{a0}epidermal growth factor receptor (EGFR) in lung cancer";
        let symbols = tagger(vec!["epidermal growth factor receptor"]).extract(text).into_symbols();
        assert!(symbols.contains("EGFR"));
        assert!(symbols.contains("epidermal growth factor receptor"));
    }

    #[tokio::test]
    async fn test_stage_unions_both_models() {
        let stage = NerStage::new(vec![
            tagger(vec!["epidermal growth factor receptor"]),
            tagger(vec!["KRAS"]),
        ]);
        let title = "Role of the\u{a0}epidermal growth factor receptor (EGFR) and KRAS";
        let outcome = run_stage(&stage, title).await;
        assert_eq!(
            outcome.into_symbols().into_vec(),
            vec!["EGFR", "KRAS", "epidermal growth factor receptor"]
        );
    }

    #[tokio::test]
    async fn test_panicking_model_does_not_drop_other_model() {
        let stage = NerStage::new(vec![NerExtractor::ready(Arc::new(Panicky)), tagger(vec!["KRAS"])]);
        let outcome = run_stage(&stage, "KRAS G12C in colorectal cancer").await;
        assert_eq!(outcome.into_symbols().into_vec(), vec!["KRAS"]);
    }
}
