//! Biomedical Named Entity Recognition using Candle.
//!
//! Provides Rust-native token-classification NER without Python/Docker dependencies.
//! Models are pre-trained BERT checkpoints pulled from the Hugging Face Hub; labels
//! are normalised to [`EntityType`] so callers can filter on gene mentions regardless
//! of each model's tag set.

mod abbreviation;
mod entity_types;
mod ner_model;

pub use abbreviation::{detect_abbreviations, Abbreviation};
pub use entity_types::{EntityType, normalize_entity_label};
pub use ner_model::{NerModel, NerConfig, NerEntity};

pub type Result<T> = std::result::Result<T, NerError>;

#[derive(Debug, thiserror::Error)]
pub enum NerError {
    #[error("Model loading failed: {0}")]
    ModelLoad(String),

    #[error("Tokenization failed: {0}")]
    Tokenization(String),

    #[error("Inference failed: {0}")]
    Inference(String),

    #[error("Download failed: {0}")]
    Download(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl From<candle_core::Error> for NerError {
    fn from(e: candle_core::Error) -> Self {
        NerError::Inference(e.to_string())
    }
}

impl From<std::io::Error> for NerError {
    fn from(e: std::io::Error) -> Self {
        NerError::Download(e.to_string())
    }
}

/// Anything that turns free text into labelled entity spans.
///
/// Implemented by [`NerModel`]; the extraction pipeline only depends on this trait,
/// so recognisers can be swapped (or faked in tests) without touching the cascade.
pub trait EntityRecognizer: Send + Sync {
    /// Identifier used in logs, usually the model id.
    fn name(&self) -> &str;

    /// Run inference over `text`.
    fn recognize(&self, text: &str) -> Result<Vec<NerEntity>>;
}
