// # Domain Source Trait
//
// Defines the interface for contributing certificate requests beyond the
// statically configured domain groups.
//
// ## Implementations
//
// - HTTP-based: `autocert-source-http` crate
// - Future: service discovery, ingress annotations, database-backed lists
//
// ## Usage
//
// ```rust,ignore
// use autocert_core::DomainSource;
//
// #[tokio::main]
// async fn main() -> anyhow::Result<()> {
//     let source = /* DomainSource implementation */;
//
//     for request in source.domains().await? {
//         println!("would order a certificate for {:?}", request.domains());
//     }
//
//     Ok(())
// }
// ```

use async_trait::async_trait;

use crate::request::DomainCertRequest;

/// Trait for dynamic domain source implementations
///
/// Each source returns its own grouping of certificate requests; the
/// [`DomainEnumerator`](crate::DomainEnumerator) merges contributions by
/// grouping key and caches the result.
///
/// # Failure Semantics
///
/// A failing source propagates to the caller uncaught. Operating on a
/// stale or partial domain list is considered unsafe, so enumeration never
/// degrades to "whatever sources happened to answer".
///
/// # Thread Safety
///
/// Implementations must be thread-safe and usable across async tasks.
/// Sources are enumerated from the single lifecycle task, but enumeration
/// can race with TLS-path readers of the cached snapshot.
#[async_trait]
pub trait DomainSource: Send + Sync {
    /// Enumerate this source's certificate requests
    ///
    /// # Returns
    ///
    /// - `Ok(Vec<DomainCertRequest>)`: this source's current contribution
    /// - `Err(Error)`: enumeration failed; the whole rebuild fails
    async fn domains(&self) -> Result<Vec<DomainCertRequest>, crate::Error>;

    /// Get the source name (for logging/debugging)
    fn name(&self) -> &'static str;
}

/// Helper trait for constructing domain sources from configuration
pub trait DomainSourceFactory: Send + Sync {
    /// Create a DomainSource instance from configuration
    ///
    /// # Parameters
    ///
    /// - `config`: Configuration specific to this source type
    fn create(
        &self,
        config: &serde_json::Value,
    ) -> Result<std::sync::Arc<dyn DomainSource>, crate::Error>;
}
