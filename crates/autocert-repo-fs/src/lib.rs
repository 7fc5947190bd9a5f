// # Filesystem Certificate Repository
//
// This crate provides a filesystem-backed certificate repository for the
// autocert system.
//
// ## Purpose
//
// Persists issued certificates across daemon restarts. The lifecycle
// reloads everything here at startup and saves every newly issued
// certificate; persistence is best-effort, so a broken directory never
// prevents serving from the in-memory store.
//
// ## Directory Structure
//
// ```text
// <base>/
// └── certs/
//     └── example.com/
//         ├── cert.pem      # Certificate chain, leaf first
//         ├── key.pem       # Private key (0600 on Unix)
//         └── meta.json     # Derived metadata (expiry, domains, thumbprint)
// ```
//
// ## Crash Safety
//
// Files are written to a temporary name and renamed into place, so a crash
// mid-save leaves either the old certificate or the new one, never a
// half-written file.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::fs;
use tracing::{debug, info, warn};

use autocert_core::cert::{CertificateKind, CertificateRecord};
use autocert_core::registry::ComponentRegistry;
use autocert_core::traits::{CertificateRepository, CertificateRepositoryFactory};
use autocert_core::{Error, Result};

/// Metadata stored alongside each certificate
///
/// Everything here is derivable from the PEM; it exists so operators can
/// inspect a directory without an X.509 toolchain at hand.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CertificateMeta {
    /// Leaf subject
    pub subject: String,
    /// Domains covered by this certificate
    pub domains: Vec<String>,
    /// When the certificate expires
    pub not_after: DateTime<Utc>,
    /// Lowercase hex SHA-256 of the leaf
    pub thumbprint: String,
    /// When this entry was written
    pub saved: DateTime<Utc>,
}

/// Filesystem-backed certificate repository
#[derive(Debug)]
pub struct FsCertificateRepository {
    /// Directory holding one subdirectory per primary domain
    certs_dir: PathBuf,
}

impl FsCertificateRepository {
    /// Create a repository rooted at the given base directory
    ///
    /// Creates the directory structure if it doesn't exist and sets
    /// restrictive permissions (0700 on Unix). Setup is synchronous; it
    /// runs once, before the lifecycle task exists.
    pub fn new<P: AsRef<Path>>(base: P) -> Result<Self> {
        let certs_dir = base.as_ref().join("certs");
        std::fs::create_dir_all(&certs_dir)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let perms = std::fs::Permissions::from_mode(0o700);
            std::fs::set_permissions(base.as_ref(), perms.clone())?;
            std::fs::set_permissions(&certs_dir, perms)?;
        }

        info!(path = %certs_dir.display(), "initialized filesystem certificate repository");

        Ok(Self { certs_dir })
    }

    fn entry_dir(&self, primary: &str) -> PathBuf {
        self.certs_dir.join(primary)
    }

    /// Load one entry directory; `None` when it is not a certificate entry
    async fn load_entry(&self, dir: &Path) -> Result<Option<CertificateRecord>> {
        let cert_path = dir.join("cert.pem");
        let key_path = dir.join("key.pem");

        if !cert_path.exists() || !key_path.exists() {
            return Ok(None);
        }

        let chain_pem = fs::read_to_string(&cert_path).await?;
        let key_pem = fs::read_to_string(&key_path).await?;

        let record =
            CertificateRecord::from_pem(chain_pem, key_pem, CertificateKind::Production)?;

        debug!(
            subject = %record.subject(),
            expires = %record.not_after(),
            "loaded stored certificate"
        );

        Ok(Some(record))
    }

    /// Write a file atomically via a temporary name and rename
    async fn write_atomic(path: &Path, contents: &str, secret: bool) -> Result<()> {
        let tmp = path.with_extension("tmp");
        fs::write(&tmp, contents).await?;

        #[cfg(unix)]
        if secret {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&tmp, std::fs::Permissions::from_mode(0o600)).await?;
        }
        #[cfg(not(unix))]
        let _ = secret;

        fs::rename(&tmp, path).await?;
        Ok(())
    }
}

#[async_trait]
impl CertificateRepository for FsCertificateRepository {
    async fn get_certificates(&self) -> Result<Vec<CertificateRecord>> {
        let mut certs = Vec::new();

        let mut entries = fs::read_dir(&self.certs_dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_dir() {
                continue;
            }

            match self.load_entry(&entry.path()).await {
                Ok(Some(record)) => certs.push(record),
                Ok(None) => {}
                // A single corrupt entry must not take down startup; the
                // renewal path reissues whatever is missing.
                Err(err) => warn!(
                    entry = %entry.path().display(),
                    error = %err,
                    "skipping unreadable certificate entry"
                ),
            }
        }

        Ok(certs)
    }

    async fn save(&self, cert: &CertificateRecord) -> Result<()> {
        let primary = cert
            .names()
            .first()
            .ok_or_else(|| Error::repository("certificate covers no domains"))?;

        let dir = self.entry_dir(primary);
        fs::create_dir_all(&dir).await?;

        Self::write_atomic(&dir.join("cert.pem"), cert.chain_pem(), false).await?;
        Self::write_atomic(&dir.join("key.pem"), cert.key_pem(), true).await?;

        let meta = CertificateMeta {
            subject: cert.subject().to_string(),
            domains: cert.names().to_vec(),
            not_after: cert.not_after(),
            thumbprint: cert.thumbprint().to_string(),
            saved: Utc::now(),
        };
        let meta_json = serde_json::to_string_pretty(&meta)?;
        Self::write_atomic(&dir.join("meta.json"), &meta_json, false).await?;

        info!(
            domain = %primary,
            expires = %cert.not_after(),
            "saved certificate to filesystem repository"
        );

        Ok(())
    }

    fn name(&self) -> &'static str {
        "fs"
    }
}

/// Configuration accepted by [`FsRepositoryFactory`]
#[derive(Debug, Deserialize)]
struct FsRepositoryConfig {
    /// Base directory for the repository
    path: PathBuf,
}

/// Factory creating filesystem repositories from configuration
pub struct FsRepositoryFactory;

impl CertificateRepositoryFactory for FsRepositoryFactory {
    fn create(
        &self,
        config: &serde_json::Value,
    ) -> Result<std::sync::Arc<dyn CertificateRepository>> {
        let config: FsRepositoryConfig = serde_json::from_value(config.clone())
            .map_err(|e| Error::config(format!("invalid fs repository config: {e}")))?;

        let repository = FsCertificateRepository::new(&config.path)?;
        Ok(std::sync::Arc::new(repository))
    }
}

/// Register this crate's factories with a registry
pub fn register(registry: &ComponentRegistry) {
    registry.register_repository("fs", Box::new(FsRepositoryFactory));
}
