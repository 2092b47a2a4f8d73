//! Last-resort regex extraction of symbol-like tokens.

use std::collections::HashSet;
use std::sync::OnceLock;

use async_trait::async_trait;
use regex::Regex;
use tracing::debug;

use crate::models::{GeneSymbolSet, StageOutcome};
use super::{ExtractionContext, ExtractionStrategy};

/// Tokens the pattern matches that are known not to be genes.
pub const DEFAULT_DENYLIST: &[&str] = &["ES", "GS", "EGBP", "NGS", "PRaUD"];

fn symbol_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    // 3-10 uppercase letters/digits as a whole word
    RE.get_or_init(|| Regex::new(r"\b[A-Z0-9]{3,10}\b").expect("static symbol pattern"))
}

/// Matches gene-symbol-shaped tokens and drops denylisted ones (exact, case-sensitive).
#[derive(Debug, Clone)]
pub struct RegexExtractor {
    denylist: HashSet<String>,
}

impl RegexExtractor {
    pub fn new<I, S>(denylist: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self { denylist: denylist.into_iter().map(Into::into).collect() }
    }

    pub fn extract(&self, text: &str) -> GeneSymbolSet {
        symbol_regex()
            .find_iter(text)
            .map(|m| m.as_str())
            .filter(|token| !self.denylist.contains(*token))
            .collect()
    }
}

impl Default for RegexExtractor {
    fn default() -> Self {
        Self::new(DEFAULT_DENYLIST.iter().copied())
    }
}

/// Cascade stage wrapping [`RegexExtractor`].
pub struct RegexStage {
    extractor: RegexExtractor,
}

impl RegexStage {
    pub fn new(extractor: RegexExtractor) -> Self {
        Self { extractor }
    }
}

#[async_trait]
impl ExtractionStrategy for RegexStage {
    fn name(&self) -> &str {
        "regex"
    }

    async fn extract(&self, ctx: &ExtractionContext<'_>) -> StageOutcome {
        let text = ctx.article_text().await;
        let symbols = self.extractor.extract(text);
        debug!(count = symbols.len(), "Regex fallback matched tokens");
        StageOutcome::from_symbols(symbols)
    }
}
