use reqwest::{Client, ClientBuilder};
use std::collections::HashSet;
use std::time::Duration;
use url::Url;
use crate::error::GenescoutError;

/// Default request timeout applied to every outbound call.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

const USER_AGENT: &str = concat!("genescout/", env!("CARGO_PKG_VERSION"));

/// A Sandbox-capped HTTP Client that only allows requests to approved domains.
/// Annotation, article and enrichment calls go through it. Model downloads use
/// hf-hub's own client and are not covered.
#[derive(Debug, Clone)]
pub struct SandboxClient {
    client: Client,
    allowlist: HashSet<String>,
}

impl SandboxClient {
    /// Creates a new SandboxClient with the default allowlist of literature, gene and model hosts.
    pub fn new() -> Result<Self, GenescoutError> {
        Self::with_timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
    }

    /// Same allowlist as [`SandboxClient::new`], with a custom request timeout.
    pub fn with_timeout(timeout: Duration) -> Result<Self, GenescoutError> {
        let mut allowlist = HashSet::new();
        let domains = [
            "eutils.ncbi.nlm.nih.gov",        // Entrez / PubMed E-utilities
            "www.ncbi.nlm.nih.gov",           // PubTator
            "www.ebi.ac.uk",                  // Europe PMC
            "rest.genenames.org",             // HGNC
            "rest.ensembl.org",               // Ensembl GRCh38
            "grch37.rest.ensembl.org",        // Ensembl GRCh37
            "api.monarchinitiative.org",      // Monarch (legacy)
            "api-v3.monarchinitiative.org",   // Monarch v3
            "localhost",
            "127.0.0.1",
        ];

        for d in domains {
            allowlist.insert(d.to_string());
        }

        let client = ClientBuilder::new()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| GenescoutError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { client, allowlist })
    }

    /// Appends an exact hostname to the allowlist.
    pub fn allow_domain(&mut self, domain: &str) {
        self.allowlist.insert(domain.to_string());
    }

    /// Validates if a URL is permitted under the current sandbox policy.
    pub fn is_allowed(&self, url: &str) -> bool {
        if let Ok(parsed) = Url::parse(url) {
            if let Some(host) = parsed.host_str() {
                // Exact match or a subdomain of an allowed domain
                for allowed in &self.allowlist {
                    if host == allowed || host.ends_with(&format!(".{}", allowed)) {
                        return true;
                    }
                }
            }
        }
        false
    }

    /// Exposes the inner `reqwest::Client` builder for GET requests to allowed hosts.
    pub fn get(&self, url: &str) -> Result<reqwest::RequestBuilder, GenescoutError> {
        if !self.is_allowed(url) {
            return Err(GenescoutError::Security(format!(
                "Network capabilities capped: domain not in allowlist for URL {}",
                url
            )));
        }

        Ok(self.client.get(url))
    }
}
