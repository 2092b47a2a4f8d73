//! Entity type classification and normalization.

use std::collections::HashMap;

/// Normalized entity type for biomedical NER.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum EntityType {
    /// Gene or gene product (the only type the extraction cascade keeps).
    Gene,
    Disease,
    Chemical,
    Species,
    CellLine,
    Anatomy,
    Other,
}

impl EntityType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityType::Gene => "GENE_OR_GENE_PRODUCT",
            EntityType::Disease => "DISEASE",
            EntityType::Chemical => "CHEMICAL",
            EntityType::Species => "SPECIES",
            EntityType::CellLine => "CELL_LINE",
            EntityType::Anatomy => "ANATOMY",
            EntityType::Other => "OTHER",
        }
    }
}

// Keys are upper-cased model labels with any BIO prefix removed.
fn get_label_map() -> &'static HashMap<&'static str, EntityType> {
    use std::sync::OnceLock;
    static LABEL_MAP: OnceLock<HashMap<&'static str, EntityType>> = OnceLock::new();
    LABEL_MAP.get_or_init(|| {
        let mut m = HashMap::new();

        // BioNLP13CG
        m.insert("GENE_OR_GENE_PRODUCT", EntityType::Gene);
        m.insert("CANCER", EntityType::Disease);
        m.insert("PATHOLOGICAL_FORMATION", EntityType::Disease);
        m.insert("SIMPLE_CHEMICAL", EntityType::Chemical);
        m.insert("AMINO_ACID", EntityType::Chemical);
        m.insert("ORGANISM", EntityType::Species);
        m.insert("CELL", EntityType::CellLine);
        m.insert("ORGAN", EntityType::Anatomy);
        m.insert("TISSUE", EntityType::Anatomy);
        m.insert("MULTI-TISSUE_STRUCTURE", EntityType::Anatomy);
        m.insert("CELLULAR_COMPONENT", EntityType::Anatomy);
        m.insert("ANATOMICAL_SYSTEM", EntityType::Anatomy);

        // BC5CDR
        m.insert("CHEMICAL", EntityType::Chemical);
        m.insert("DISEASE", EntityType::Disease);

        // CRAFT / JNLPBA. DNA, RNA and PROTEIN spans are not gene mentions and stay Other.
        m.insert("GGP", EntityType::Gene);
        m.insert("TAXON", EntityType::Species);
        m.insert("CELL_TYPE", EntityType::CellLine);
        m.insert("CELL_LINE", EntityType::CellLine);

        // Hugging Face gene taggers
        m.insert("GENE", EntityType::Gene);
        m.insert("GENETIC", EntityType::Gene);
        m.insert("GENE/PROTEIN", EntityType::Gene);

        m
    })
}

/// Normalize a model-specific entity label to our standard EntityType.
pub fn normalize_entity_label(label: &str) -> EntityType {
    // Handle BIO tagging (B-, I-, E-, S- prefixes)
    let upper = label.trim().to_uppercase();
    let clean = ["B-", "I-", "E-", "S-"]
        .iter()
        .find_map(|p| upper.strip_prefix(p))
        .unwrap_or(&upper);

    get_label_map()
        .get(clean)
        .copied()
        .unwrap_or(EntityType::Other)
}
