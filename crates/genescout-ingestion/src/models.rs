//! Data models shared by the sources, the extraction cascade and enrichment.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Opaque publication identifier (a PubMed ID in practice).
/// Passed verbatim into every source query, never parsed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PublicationId(String);

impl PublicationId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PublicationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PublicationId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for PublicationId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Unique gene symbols, iterated in sorted order.
/// An empty set is the "no result" signal of the extraction cascade.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GeneSymbolSet(BTreeSet<String>);

impl GeneSymbolSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a symbol; surrounding whitespace is trimmed and blank text is ignored.
    /// Returns `true` if the symbol was new.
    pub fn insert(&mut self, symbol: impl AsRef<str>) -> bool {
        let symbol = symbol.as_ref().trim();
        if symbol.is_empty() {
            return false;
        }
        self.0.insert(symbol.to_string())
    }

    /// Add every symbol of `other`.
    pub fn union_with(&mut self, other: GeneSymbolSet) {
        self.0.extend(other.0);
    }

    pub fn contains(&self, symbol: &str) -> bool {
        self.0.contains(symbol)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    pub fn into_vec(self) -> Vec<String> {
        self.0.into_iter().collect()
    }
}

impl<S: AsRef<str>> FromIterator<S> for GeneSymbolSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut set = Self::new();
        set.extend(iter);
        set
    }
}

impl<S: AsRef<str>> Extend<S> for GeneSymbolSet {
    fn extend<I: IntoIterator<Item = S>>(&mut self, iter: I) {
        for symbol in iter {
            self.insert(symbol);
        }
    }
}

impl IntoIterator for GeneSymbolSet {
    type Item = String;
    type IntoIter = std::collections::btree_set::IntoIter<String>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl fmt::Display for GeneSymbolSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let joined: Vec<&str> = self.iter().collect();
        write!(f, "[{}]", joined.join(", "))
    }
}

/// Title and abstract of a publication.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArticleText {
    pub title: String,
    pub abstract_text: String,
}

impl ArticleText {
    pub const UNKNOWN_TITLE: &'static str = "Unknown title";
    pub const UNKNOWN_ABSTRACT: &'static str = "Unknown abstract";
    pub const NO_ABSTRACT: &'static str = "No abstract";

    pub fn new(title: impl Into<String>, abstract_text: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            abstract_text: abstract_text.into(),
        }
    }

    /// Sentinel pair used whenever the article could not be fetched.
    pub fn unknown() -> Self {
        Self::new(Self::UNKNOWN_TITLE, Self::UNKNOWN_ABSTRACT)
    }

    pub fn is_unknown(&self) -> bool {
        self.title == Self::UNKNOWN_TITLE && self.abstract_text == Self::UNKNOWN_ABSTRACT
    }

    /// Title and abstract joined by a single space; the text NER and regex run over.
    pub fn combined(&self) -> String {
        format!("{} {}", self.title, self.abstract_text)
    }
}

/// Why a stage produced no symbols.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EmptyReason {
    /// The stage ran and found nothing.
    NoMatches,
    /// The stage failed (network, malformed response, model error, panic).
    Failed(String),
    /// The stage could not run at all, e.g. its model failed to load.
    Unavailable(String),
}

impl fmt::Display for EmptyReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EmptyReason::NoMatches => f.write_str("no matches"),
            EmptyReason::Failed(e) => write!(f, "failed: {e}"),
            EmptyReason::Unavailable(e) => write!(f, "unavailable: {e}"),
        }
    }
}

/// Uniform result of one extraction stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageOutcome {
    Found(GeneSymbolSet),
    Empty(EmptyReason),
}

impl StageOutcome {
    /// `Found` for a non-empty set, `Empty(NoMatches)` otherwise.
    pub fn from_symbols(symbols: GeneSymbolSet) -> Self {
        if symbols.is_empty() {
            StageOutcome::Empty(EmptyReason::NoMatches)
        } else {
            StageOutcome::Found(symbols)
        }
    }

    pub fn failed(error: impl fmt::Display) -> Self {
        StageOutcome::Empty(EmptyReason::Failed(error.to_string()))
    }

    pub fn is_found(&self) -> bool {
        matches!(self, StageOutcome::Found(_))
    }

    pub fn symbols(&self) -> Option<&GeneSymbolSet> {
        match self {
            StageOutcome::Found(symbols) => Some(symbols),
            StageOutcome::Empty(_) => None,
        }
    }

    pub fn into_symbols(self) -> GeneSymbolSet {
        match self {
            StageOutcome::Found(symbols) => symbols,
            StageOutcome::Empty(_) => GeneSymbolSet::new(),
        }
    }
}

impl fmt::Display for StageOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StageOutcome::Found(symbols) => write!(f, "found {} {}", symbols.len(), symbols),
            StageOutcome::Empty(reason) => write!(f, "empty ({reason})"),
        }
    }
}
