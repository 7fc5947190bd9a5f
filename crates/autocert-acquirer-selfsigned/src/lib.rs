// # Self-signed Certificate Acquirer
//
// This crate provides a development acquirer for the autocert system.
//
// ## IMPORTANT: Not for Production
//
// Self-signed certificates let the whole pipeline (store, renewal
// scheduling, persistence fan-out, TLS selection) run end-to-end without a
// certificate authority. Browsers will not trust them. Production
// deployments plug an ACME client into the same `CertificateAcquirer`
// trait instead.
//
// ## Use Cases
//
// - Local development and demos
// - CI environments without network access to a CA
// - Staging setups behind a private trust root

use async_trait::async_trait;
use chrono::{Datelike, Utc};
use serde::Deserialize;
use tracing::{debug, info};

use autocert_core::cert::{CertificateKind, CertificateRecord};
use autocert_core::registry::ComponentRegistry;
use autocert_core::request::DomainCertRequest;
use autocert_core::traits::{AccountInfo, CertificateAcquirer, CertificateAcquirerFactory};
use autocert_core::{Error, Result};

/// Default validity for issued certificates (days)
const DEFAULT_VALIDITY_DAYS: u32 = 90;

/// Acquirer minting self-signed certificates locally
pub struct SelfSignedAcquirer {
    /// Validity window for issued certificates
    validity_days: u32,
}

impl SelfSignedAcquirer {
    /// Create an acquirer with the default 90-day validity
    pub fn new() -> Self {
        Self {
            validity_days: DEFAULT_VALIDITY_DAYS,
        }
    }

    /// Set the validity window for issued certificates
    pub fn with_validity_days(mut self, validity_days: u32) -> Self {
        self.validity_days = validity_days;
        self
    }
}

impl Default for SelfSignedAcquirer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CertificateAcquirer for SelfSignedAcquirer {
    async fn get_or_create_account(&self) -> Result<AccountInfo> {
        // No CA involved; the "account" is the local process.
        Ok(AccountInfo {
            id: "self-signed-local".to_string(),
            contact: None,
        })
    }

    async fn create_certificate(
        &self,
        request: &DomainCertRequest,
    ) -> Result<CertificateRecord> {
        let domains: Vec<String> = request
            .domains()
            .iter()
            .map(|d| d.to_string())
            .collect();

        debug!(domains = ?domains, "minting self-signed certificate");

        let expiry = (Utc::now() + chrono::Duration::days(i64::from(self.validity_days)))
            .date_naive();

        let mut params = rcgen::CertificateParams::new(domains)
            .map_err(|e| Error::acquisition(format!("invalid subject names: {e}")))?;
        params
            .distinguished_name
            .push(rcgen::DnType::CommonName, request.primary());
        params.not_after =
            rcgen::date_time_ymd(expiry.year(), expiry.month() as u8, expiry.day() as u8);

        let key = rcgen::KeyPair::generate()
            .map_err(|e| Error::acquisition(format!("key generation failed: {e}")))?;
        let cert = params
            .self_signed(&key)
            .map_err(|e| Error::acquisition(format!("self-signing failed: {e}")))?;

        let record = CertificateRecord::from_pem(
            cert.pem(),
            key.serialize_pem(),
            CertificateKind::Production,
        )?;

        info!(
            subject = %record.subject(),
            expires = %record.not_after(),
            "minted self-signed certificate"
        );

        Ok(record)
    }

    fn name(&self) -> &'static str {
        "self-signed"
    }
}

/// Configuration accepted by [`SelfSignedAcquirerFactory`]
#[derive(Debug, Default, Deserialize)]
struct SelfSignedConfig {
    /// Validity window in days; defaults to 90
    #[serde(default)]
    validity_days: Option<u32>,
}

/// Factory creating self-signed acquirers from configuration
pub struct SelfSignedAcquirerFactory;

impl CertificateAcquirerFactory for SelfSignedAcquirerFactory {
    fn create(
        &self,
        config: &serde_json::Value,
    ) -> Result<std::sync::Arc<dyn CertificateAcquirer>> {
        let config: SelfSignedConfig = serde_json::from_value(config.clone())
            .map_err(|e| Error::config(format!("invalid self-signed acquirer config: {e}")))?;

        let mut acquirer = SelfSignedAcquirer::new();
        if let Some(days) = config.validity_days {
            if days == 0 {
                return Err(Error::config("validity_days must be > 0"));
            }
            acquirer = acquirer.with_validity_days(days);
        }

        Ok(std::sync::Arc::new(acquirer))
    }
}

/// Register this crate's factories with a registry
pub fn register(registry: &ComponentRegistry) {
    registry.register_acquirer("self-signed", Box::new(SelfSignedAcquirerFactory));
}
