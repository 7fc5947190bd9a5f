// # Certificate Acquirer Trait
//
// Defines the interface for obtaining newly issued certificates.
//
// ## Purpose
//
// The acquirer hides the entire issuance exchange (for ACME: account
// registration, order placement, authorization, challenge, finalization)
// behind two calls. The lifecycle neither knows nor cares how a
// certificate comes to exist.
//
// ## Implementations
//
// - Self-signed (development): `autocert-acquirer-selfsigned` crate
// - ACME clients implement the same trait out of tree
//
// ## Failure Semantics
//
// Acquisition failure is fatal to the current creation cycle and
// propagates out of the lifecycle. Silent renewal failure is considered
// worse than a visibly stopped background task.

use async_trait::async_trait;

use crate::cert::CertificateRecord;
use crate::request::DomainCertRequest;

/// Identity of the issuance account in use
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountInfo {
    /// Account identifier as reported by the issuer
    pub id: String,
    /// Contact address registered with the issuer, if any
    pub contact: Option<String>,
}

/// Trait for certificate acquisition implementations
///
/// # Thread Safety
///
/// Implementations must be thread-safe; the lifecycle may keep one
/// instance across many creation cycles.
#[async_trait]
pub trait CertificateAcquirer: Send + Sync {
    /// Return the existing issuance account, creating one if needed
    async fn get_or_create_account(&self) -> Result<AccountInfo, crate::Error>;

    /// Obtain a newly issued certificate covering the request's domains
    ///
    /// # Parameters
    ///
    /// - `request`: the domain set; the primary domain becomes the subject
    ///
    /// # Returns
    ///
    /// - `Ok(CertificateRecord)`: the freshly issued certificate
    /// - `Err(Error)`: fatal to the current creation cycle
    async fn create_certificate(
        &self,
        request: &DomainCertRequest,
    ) -> Result<CertificateRecord, crate::Error>;

    /// Get the acquirer name (for logging/debugging)
    fn name(&self) -> &'static str;
}

/// Helper trait for constructing acquirers from configuration
pub trait CertificateAcquirerFactory: Send + Sync {
    /// Create a CertificateAcquirer instance from configuration
    ///
    /// # Parameters
    ///
    /// - `config`: Configuration specific to this acquirer type
    fn create(
        &self,
        config: &serde_json::Value,
    ) -> Result<std::sync::Arc<dyn CertificateAcquirer>, crate::Error>;
}
