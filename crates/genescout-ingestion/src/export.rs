//! CSV report of enriched gene metadata.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::enrichment::GeneMetadata;
use crate::models::PublicationId;

/// Report column order.
pub const COLUMNS: [&str; 6] = [
    "HGNC_ID",
    "HGNC_Gene_Name",
    "Gene_Aliases",
    "Hg38_Coordinates",
    "Hg19_Coordinates",
    "Disease",
];

/// `{outdir}/{pmid}_gene_metadata.csv`
pub fn default_report_path(outdir: &Path, pmid: &PublicationId) -> PathBuf {
    outdir.join(format!("{pmid}_gene_metadata.csv"))
}

/// Write the report, creating parent directories as needed.
/// Returns `false` without touching the filesystem when there are no rows.
pub fn write_metadata_csv(path: &Path, rows: &[GeneMetadata]) -> Result<bool> {
    if rows.is_empty() {
        warn!("No data to save");
        return Ok(false);
    }

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create output directory {}", parent.display()))?;
    }

    let mut writer = csv::WriterBuilder::new()
        .quote_style(csv::QuoteStyle::Necessary)
        .from_path(path)
        .with_context(|| format!("Failed to create {}", path.display()))?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;

    info!(path = %path.display(), rows = rows.len(), "Data saved");
    Ok(true)
}

/// Read a report written by [`write_metadata_csv`]. Empty alias cells are allowed.
pub fn read_metadata_csv(path: &Path) -> Result<Vec<GeneMetadata>> {
    let mut reader = csv::Reader::from_path(path)
        .with_context(|| format!("Failed to open {}", path.display()))?;

    let headers = reader.headers()?.clone();
    for column in COLUMNS {
        if !headers.iter().any(|h| h == column) {
            anyhow::bail!("{} is missing column {column}", path.display());
        }
    }

    reader
        .deserialize()
        .enumerate()
        .map(|(i, row)| row.with_context(|| format!("Bad record {} in {}", i + 1, path.display())))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(hgnc_id: &str, aliases: &str, disease: &str) -> GeneMetadata {
        GeneMetadata {
            hgnc_id: hgnc_id.into(),
            gene_name: "BRCA1 DNA repair associated".into(),
            aliases: aliases.into(),
            hg38_coordinates: "17:43044292-43170245".into(),
            hg19_coordinates: "N/A".into(),
            disease: disease.into(),
        }
    }

    #[test]
    fn test_write_then_read_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/out/38790019_gene_metadata.csv");
        let rows = vec![
            row("HGNC:1100", "RNF53,BRCC1", "breast cancer;ovarian cancer"),
            row("HGNC:11998", "", "N/A"),
        ];

        assert!(write_metadata_csv(&path, &rows).unwrap());
        let written = std::fs::read_to_string(&path).unwrap();
        let mut lines = written.lines();
        assert_eq!(lines.next().unwrap(), COLUMNS.join(","));
        assert_eq!(
            lines.next().unwrap(),
            r#"HGNC:1100,BRCA1 DNA repair associated,"RNF53,BRCC1",17:43044292-43170245,N/A,breast cancer;ovarian cancer"#
        );

        assert_eq!(read_metadata_csv(&path).unwrap(), rows);
    }

    #[test]
    fn test_no_rows_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.csv");
        assert!(!write_metadata_csv(&path, &[]).unwrap());
        assert!(!path.exists());
    }

    #[test]
    fn test_missing_column_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.csv");
        std::fs::write(&path, "HGNC_ID,Disease\nHGNC:1,N/A\n").unwrap();
        let err = read_metadata_csv(&path).unwrap_err();
        assert!(err.to_string().contains("HGNC_Gene_Name"));
    }

    #[test]
    fn test_default_report_path() {
        let path = default_report_path(Path::new("/tmp/out"), &PublicationId::from("38790019"));
        assert_eq!(path, PathBuf::from("/tmp/out/38790019_gene_metadata.csv"));
    }
}
