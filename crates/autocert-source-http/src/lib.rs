// # HTTP Domain Source
//
// This crate provides an HTTP-based domain source for the autocert system.
//
// ## Purpose
//
// Fetches the set of domains to hold certificates for from an external
// discovery endpoint: an ingress controller, a tenant database fronted by
// an API, a service registry. The endpoint owns the truth about which
// tenants currently exist; this source only asks.
//
// ## Wire Format
//
// The endpoint returns a JSON array of domain groups:
//
// ```json
// [
//   { "primary": "tenant-a.example.com" },
//   { "primary": "tenant-b.example.com", "alternates": ["www.tenant-b.example.com"] }
// ]
// ```
//
// ## Failure Semantics
//
// Any transport or decoding failure propagates to the enumerator uncaught;
// issuing certificates from a partial tenant list is worse than failing
// the rebuild and keeping the previous snapshot.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use autocert_core::registry::ComponentRegistry;
use autocert_core::request::DomainCertRequest;
use autocert_core::traits::{DomainSource, DomainSourceFactory};
use autocert_core::{Error, Result};

/// Default request timeout against the discovery endpoint
const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// One domain group as returned by the discovery endpoint
#[derive(Debug, Clone, Deserialize)]
struct DomainGroupPayload {
    primary: String,
    #[serde(default)]
    alternates: Vec<String>,
}

/// HTTP-based domain source
pub struct HttpDomainSource {
    /// Discovery endpoint URL
    url: String,

    /// HTTP client
    client: reqwest::Client,
}

impl HttpDomainSource {
    /// Create a new HTTP domain source
    ///
    /// # Parameters
    ///
    /// - `url`: discovery endpoint returning the JSON group list
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
                .build()
                .unwrap_or_default(),
        }
    }

    /// Convert payload groups into normalized certificate requests
    fn to_requests(groups: Vec<DomainGroupPayload>) -> Result<Vec<DomainCertRequest>> {
        groups
            .into_iter()
            .map(|group| DomainCertRequest::group(group.primary, group.alternates))
            .collect()
    }
}

#[async_trait]
impl DomainSource for HttpDomainSource {
    async fn domains(&self) -> Result<Vec<DomainCertRequest>> {
        debug!(url = %self.url, "fetching domain groups");

        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| Error::source(format!("request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(Error::source(format!(
                "discovery endpoint returned {}",
                response.status()
            )));
        }

        let groups: Vec<DomainGroupPayload> = response
            .json()
            .await
            .map_err(|e| Error::source(format!("failed to decode domain groups: {e}")))?;

        debug!(groups = groups.len(), "fetched domain groups");

        Self::to_requests(groups)
    }

    fn name(&self) -> &'static str {
        "http"
    }
}

/// Configuration accepted by [`HttpSourceFactory`]
#[derive(Debug, Deserialize)]
struct HttpSourceConfig {
    /// Discovery endpoint URL
    url: String,
}

/// Factory creating HTTP domain sources from configuration
pub struct HttpSourceFactory;

impl DomainSourceFactory for HttpSourceFactory {
    fn create(&self, config: &serde_json::Value) -> Result<std::sync::Arc<dyn DomainSource>> {
        let config: HttpSourceConfig = serde_json::from_value(config.clone())
            .map_err(|e| Error::config(format!("invalid http source config: {e}")))?;

        if config.url.is_empty() {
            return Err(Error::config("http source URL cannot be empty"));
        }

        Ok(std::sync::Arc::new(HttpDomainSource::new(config.url)))
    }
}

/// Register this crate's factories with a registry
pub fn register(registry: &ComponentRegistry) {
    registry.register_source("http", Box::new(HttpSourceFactory));
}
