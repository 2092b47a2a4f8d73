//! genescout-ingestion: Gene-symbol extraction and enrichment for a single publication.
//! Covers:
//! - Annotation source clients (PubTator, Entrez gene links, Europe PMC)
//! - Title/abstract retrieval from PubMed
//! - The extraction cascade (annotation sources → NER → regex fallback)
//! - HGNC / Ensembl / Monarch metadata enrichment
//! - CSV report and SQL loading of enriched metadata

pub mod sources;
pub mod extraction;
pub mod enrichment;
pub mod export;
pub mod models;
pub mod repository;

pub use extraction::{GeneSymbolExtractor, ExtractionReport};
pub use models::{ArticleText, EmptyReason, GeneSymbolSet, PublicationId, StageOutcome};
