// # Certificate Repository Trait
//
// Defines the interface for durable certificate storage.
//
// ## Purpose
//
// Repositories reload previously issued certificates at startup and
// receive every newly issued certificate. Persistence is best-effort:
// the in-memory store is the source of truth for what the TLS layer
// serves, and a repository failure never prevents serving.
//
// ## Implementations
//
// - Filesystem: `autocert-repo-fs` crate
// - Future: key vaults, secret managers, databases
//
// ## Failure Semantics
//
// `save` failures are collected per repository by the lifecycle and
// surfaced afterward as one aggregate error; other repositories still
// receive their save attempt. There are no transactional guarantees
// across repositories; each one is independently retryable by the
// operator.

use async_trait::async_trait;

use crate::cert::CertificateRecord;

/// Trait for certificate repository implementations
///
/// # Thread Safety
///
/// All methods must be safe to call concurrently from multiple tasks; the
/// lifecycle fans out saves to every repository at once.
#[async_trait]
pub trait CertificateRepository: Send + Sync {
    /// Load every certificate this repository holds
    ///
    /// Called at startup and at the start of each renewal scan.
    ///
    /// # Returns
    ///
    /// - `Ok(Vec<CertificateRecord>)`: all stored certificates
    /// - `Err(Error)`: the repository could not be read
    async fn get_certificates(&self) -> Result<Vec<CertificateRecord>, crate::Error>;

    /// Durably store a newly issued certificate
    ///
    /// # Returns
    ///
    /// - `Ok(())`: stored
    /// - `Err(Error)`: captured as a partial failure by the caller
    async fn save(&self, cert: &CertificateRecord) -> Result<(), crate::Error>;

    /// Get the repository name (for logging and failure attribution)
    fn name(&self) -> &'static str;
}

/// Helper trait for constructing repositories from configuration
pub trait CertificateRepositoryFactory: Send + Sync {
    /// Create a CertificateRepository instance from configuration
    ///
    /// # Parameters
    ///
    /// - `config`: Configuration specific to this repository type
    fn create(
        &self,
        config: &serde_json::Value,
    ) -> Result<std::sync::Arc<dyn CertificateRepository>, crate::Error>;
}
