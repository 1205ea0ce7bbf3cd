use reqwest::{Client, ClientBuilder};
use std::collections::HashSet;
use std::time::Duration;
use url::Url;

use crate::error::SourceError;

const USER_AGENT: &str = "Medrecon/0.1 (medical research integration)";

/// A capability-capped HTTP client that only allows requests to approved
/// upstream domains. All source adapters share this client so a misbehaving
/// adapter cannot reach arbitrary hosts.
#[derive(Debug, Clone)]
pub struct GuardedClient {
    client: Client,
    allowlist: HashSet<String>,
}

impl GuardedClient {
    /// Creates a client with the default allowlist of medical data domains.
    pub fn new() -> Result<Self, SourceError> {
        let mut allowlist = HashSet::new();
        let domains = vec![
            "eutils.ncbi.nlm.nih.gov", // PubMed / NCBI Gene E-utilities
            "pubmed.ncbi.nlm.nih.gov", // PubMed article pages
            "www.ncbi.nlm.nih.gov",    // NCBI Gene database
            "clinicaltrials.gov",      // ClinicalTrials.gov v2 API
        ];

        for d in domains {
            allowlist.insert(d.to_string());
        }

        let client = ClientBuilder::new()
            .timeout(Duration::from_secs(30))
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| SourceError::Guard(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { client, allowlist })
    }

    /// Appends an exact hostname to the allowlist.
    pub fn allow_domain(&mut self, domain: &str) {
        self.allowlist.insert(domain.to_string());
    }

    /// Validates if a URL is permitted under the current guard policy.
    pub fn is_allowed(&self, url: &str) -> bool {
        if let Ok(parsed) = Url::parse(url) {
            if let Some(host) = parsed.host_str() {
                // Exact match or subdomain of an allowed domain
                for allowed in &self.allowlist {
                    if host == allowed || host.ends_with(&format!(".{}", allowed)) {
                        return true;
                    }
                }
            }
        }
        false
    }

    /// Exposes the inner `reqwest::Client` builder pattern safely for GET requests.
    pub fn get(&self, url: &str) -> Result<reqwest::RequestBuilder, SourceError> {
        if !self.is_allowed(url) {
            return Err(SourceError::Guard(format!(
                "domain not in allowlist for URL {}",
                url
            )));
        }

        Ok(self.client.get(url))
    }

    /// Exposes the inner `reqwest::Client` builder pattern safely for POST requests.
    pub fn post(&self, url: &str) -> Result<reqwest::RequestBuilder, SourceError> {
        if !self.is_allowed(url) {
            return Err(SourceError::Guard(format!(
                "domain not in allowlist for URL {}",
                url
            )));
        }

        Ok(self.client.post(url))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_allowlist_permits_sources() {
        let client = GuardedClient::new().unwrap();
        assert!(client.is_allowed("https://eutils.ncbi.nlm.nih.gov/entrez/eutils/esearch.fcgi"));
        assert!(client.is_allowed("https://clinicaltrials.gov/api/v2/studies"));
    }

    #[test]
    fn test_unknown_domain_rejected() {
        let client = GuardedClient::new().unwrap();
        assert!(!client.is_allowed("https://example.com/data"));
        assert!(client.get("https://example.com/data").is_err());
    }

    #[test]
    fn test_allow_domain_extends_policy() {
        let mut client = GuardedClient::new().unwrap();
        assert!(!client.is_allowed("https://api.who.int/data"));
        client.allow_domain("api.who.int");
        assert!(client.is_allowed("https://api.who.int/data"));
    }
}
