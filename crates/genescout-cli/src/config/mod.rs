//! Configuration loading for genescout.
//! Reads the file given by `--config-file`, else the path in GENESCOUT_CONFIG,
//! else genescout.toml in the current directory. TOML or YAML, chosen by extension.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use genescout_common::SandboxClient;
use genescout_ingestion::enrichment::{ensembl, hgnc, monarch, EnrichmentSettings};
use genescout_ingestion::extraction::{RegexExtractor, DEFAULT_DENYLIST};
use genescout_ingestion::sources::{entrez, europepmc, pubtator, EutilsContact, SourceSettings};
use genescout_ner::NerConfig;
use serde::{Deserialize, Serialize};
use tracing::info;

pub const CONFIG_ENV: &str = "GENESCOUT_CONFIG";
pub const DEFAULT_CONFIG_FILE: &str = "genescout.toml";
const ALLOWED_EXTENSIONS: &[&str] = &["toml", "yaml", "yml"];

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub entrez: EntrezConfig,
    #[serde(default)]
    pub sources: SourcesConfig,
    #[serde(default)]
    pub ner: NerSettings,
    #[serde(default)]
    pub regex: RegexConfig,
    #[serde(default)]
    pub enrichment: EnrichmentConfig,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntrezConfig {
    /// Contact address NCBI asks callers to send.
    pub email: Option<String>,
    #[serde(default = "default_tool")]
    pub tool: String,
    pub api_key: Option<String>,
    #[serde(default = "default_eutils_url")]
    pub base_url: String,
    #[serde(default = "default_request_delay_ms")]
    pub request_delay_ms: u64,
}

fn default_tool()             -> String { "genescout".to_string() }
fn default_eutils_url()       -> String { entrez::EUTILS_BASE_URL.to_string() }
fn default_request_delay_ms() -> u64    { entrez::DEFAULT_REQUEST_DELAY.as_millis() as u64 }

impl Default for EntrezConfig {
    fn default() -> Self {
        Self {
            email: None,
            tool: default_tool(),
            api_key: None,
            base_url: default_eutils_url(),
            request_delay_ms: default_request_delay_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourcesConfig {
    #[serde(default = "default_pubtator_url")]
    pub pubtator_url: String,
    #[serde(default = "default_europepmc_url")]
    pub europepmc_url: String,
    #[serde(default = "default_eutils_url")]
    pub pubmed_url: String,
}

fn default_pubtator_url()  -> String { pubtator::PUBTATOR_BASE_URL.to_string() }
fn default_europepmc_url() -> String { europepmc::EUROPEPMC_ANNOTATIONS_URL.to_string() }

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            pubtator_url: default_pubtator_url(),
            europepmc_url: default_europepmc_url(),
            pubmed_url: default_eutils_url(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NerSettings {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_primary_model")]
    pub primary_model: String,
    #[serde(default = "default_secondary_model")]
    pub secondary_model: String,
    #[serde(default = "default_max_length")]
    pub max_length: usize,
    #[serde(default)]
    pub use_gpu: bool,
}

fn default_true()            -> bool   { true }
fn default_primary_model()   -> String { NerConfig::gene_mentions().model_id }
fn default_secondary_model() -> String { NerConfig::genetic_entities().model_id }
fn default_max_length()      -> usize  { 512 }

impl Default for NerSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            primary_model: default_primary_model(),
            secondary_model: default_secondary_model(),
            max_length: default_max_length(),
            use_gpu: false,
        }
    }
}

impl NerSettings {
    /// Model configurations in cascade order; empty when NER is disabled.
    pub fn model_configs(&self) -> Vec<NerConfig> {
        if !self.enabled {
            return Vec::new();
        }
        [&self.primary_model, &self.secondary_model]
            .into_iter()
            .filter(|id| !id.trim().is_empty())
            .map(|id| NerConfig {
                model_id: id.clone(),
                max_length: self.max_length,
                use_gpu: self.use_gpu,
            })
            .collect()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegexConfig {
    #[serde(default = "default_denylist")]
    pub denylist: Vec<String>,
}

fn default_denylist() -> Vec<String> {
    DEFAULT_DENYLIST.iter().map(|s| s.to_string()).collect()
}

impl Default for RegexConfig {
    fn default() -> Self {
        Self { denylist: default_denylist() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnrichmentConfig {
    #[serde(default = "default_hgnc_url")]
    pub hgnc_url: String,
    #[serde(default = "default_ensembl_url")]
    pub ensembl_url: String,
    #[serde(default = "default_ensembl_grch37_url")]
    pub ensembl_grch37_url: String,
    #[serde(default = "default_monarch_url")]
    pub monarch_url: String,
    #[serde(default = "default_max_diseases")]
    pub max_diseases: usize,
    #[serde(default = "default_gene_delay_ms")]
    pub gene_delay_ms: u64,
}

fn default_hgnc_url()           -> String { hgnc::HGNC_REST_URL.to_string() }
fn default_ensembl_url()        -> String { ensembl::ENSEMBL_REST_URL.to_string() }
fn default_ensembl_grch37_url() -> String { ensembl::ENSEMBL_GRCH37_REST_URL.to_string() }
fn default_monarch_url()        -> String { monarch::MONARCH_API_URL.to_string() }
fn default_max_diseases()       -> usize  { 2 }
fn default_gene_delay_ms()      -> u64    { 1000 }

impl Default for EnrichmentConfig {
    fn default() -> Self {
        Self {
            hgnc_url: default_hgnc_url(),
            ensembl_url: default_ensembl_url(),
            ensembl_grch37_url: default_ensembl_grch37_url(),
            monarch_url: default_monarch_url(),
            max_diseases: default_max_diseases(),
            gene_delay_ms: default_gene_delay_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 { 30 }

impl Default for HttpConfig {
    fn default() -> Self {
        Self { timeout_secs: default_timeout_secs() }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Report directory; a timestamped directory under /tmp when unset.
    pub outdir: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Toml,
    Yaml,
}

impl ConfigFormat {
    fn from_path(path: &Path) -> Result<Self> {
        match path.extension().and_then(|e| e.to_str()).map(str::to_ascii_lowercase).as_deref() {
            Some("toml") => Ok(ConfigFormat::Toml),
            Some("yaml" | "yml") => Ok(ConfigFormat::Yaml),
            _ => bail!(
                "Config file {} must have one of the extensions: {}",
                path.display(),
                ALLOWED_EXTENSIONS.join(", ")
            ),
        }
    }
}

impl Config {
    /// Load from `explicit`, else GENESCOUT_CONFIG, else genescout.toml.
    /// Only the implicit genescout.toml may be absent, in which case defaults apply.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::from_file(path);
        }
        if let Ok(path) = std::env::var(CONFIG_ENV) {
            return Self::from_file(Path::new(&path))
                .with_context(|| format!("Config from {CONFIG_ENV}"));
        }

        let path = Path::new(DEFAULT_CONFIG_FILE);
        if !path.exists() {
            info!("No {} found, using built-in defaults", DEFAULT_CONFIG_FILE);
            return Ok(Self::default());
        }
        Self::from_file(path)
    }

    /// Validate and parse a config file.
    pub fn from_file(path: &Path) -> Result<Self> {
        check_config_file(path)?;
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config = Self::parse(&content, ConfigFormat::from_path(path)?)
            .with_context(|| format!("Invalid config file {}", path.display()))?;
        info!("Loaded config from {}", path.display());
        Ok(config)
    }

    pub fn parse(content: &str, format: ConfigFormat) -> Result<Self> {
        Ok(match format {
            ConfigFormat::Toml => toml::from_str(content)?,
            ConfigFormat::Yaml => serde_yaml::from_str(content)?,
        })
    }

    pub fn source_settings(&self) -> SourceSettings {
        SourceSettings {
            pubtator_url: self.sources.pubtator_url.clone(),
            eutils_url: self.entrez.base_url.clone(),
            europepmc_url: self.sources.europepmc_url.clone(),
            pubmed_url: self.sources.pubmed_url.clone(),
            contact: EutilsContact {
                email: self.entrez.email.clone(),
                tool: Some(self.entrez.tool.clone()).filter(|t| !t.is_empty()),
                api_key: self.entrez.api_key.clone(),
            },
            entrez_delay: Duration::from_millis(self.entrez.request_delay_ms),
        }
    }

    pub fn enrichment_settings(&self) -> EnrichmentSettings {
        EnrichmentSettings {
            hgnc_url: self.enrichment.hgnc_url.clone(),
            ensembl_url: self.enrichment.ensembl_url.clone(),
            ensembl_grch37_url: self.enrichment.ensembl_grch37_url.clone(),
            monarch_url: self.enrichment.monarch_url.clone(),
            max_diseases: self.enrichment.max_diseases,
            gene_delay: Duration::from_millis(self.enrichment.gene_delay_ms),
        }
    }

    pub fn regex_extractor(&self) -> RegexExtractor {
        RegexExtractor::new(self.regex.denylist.iter().cloned())
    }

    pub fn http_client(&self) -> Result<SandboxClient> {
        Ok(SandboxClient::with_timeout(Duration::from_secs(self.http.timeout_secs))?)
    }

    /// `--outdir` if given, else the configured directory, else
    /// `/tmp/{USER}/genescout/{timestamp}`.
    pub fn outdir(&self, cli_outdir: Option<PathBuf>) -> PathBuf {
        cli_outdir
            .or_else(|| self.output.outdir.clone())
            .unwrap_or_else(|| default_outdir(chrono::Local::now()))
    }
}

fn default_outdir(now: chrono::DateTime<chrono::Local>) -> PathBuf {
    let user = std::env::var("USER").unwrap_or_else(|_| "genescout".to_string());
    PathBuf::from("/tmp")
        .join(user)
        .join("genescout")
        .join(now.format("%Y-%m-%d-%H%M%S").to_string())
}

/// The file must exist, be a regular non-empty file, and carry a known extension.
fn check_config_file(path: &Path) -> Result<()> {
    let meta = std::fs::metadata(path)
        .with_context(|| format!("Config file {} does not exist", path.display()))?;
    if !meta.is_file() {
        bail!("Config file {} is not a regular file", path.display());
    }
    if meta.len() == 0 {
        bail!("Config file {} is empty", path.display());
    }
    ConfigFormat::from_path(path)?;
    Ok(())
}
