use std::sync::Arc;

use async_trait::async_trait;

use crate::models::StageOutcome;
use crate::sources::GeneSymbolSource;
use super::{ExtractionContext, ExtractionStrategy};

/// Runs a remote annotation source as a cascade stage.
pub struct AnnotationStage {
    source: Arc<dyn GeneSymbolSource>,
}

impl AnnotationStage {
    pub fn new(source: Arc<dyn GeneSymbolSource>) -> Self {
        Self { source }
    }
}

#[async_trait]
impl ExtractionStrategy for AnnotationStage {
    fn name(&self) -> &str {
        self.source.name()
    }

    async fn extract(&self, ctx: &ExtractionContext<'_>) -> StageOutcome {
        self.source.gene_symbols(ctx.pmid()).await
    }
}
