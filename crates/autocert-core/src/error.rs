//! Error types for the certificate lifecycle system
//!
//! This module defines all error types used throughout the crate.

use thiserror::Error;

/// Result type alias for certificate lifecycle operations
pub type Result<T> = std::result::Result<T, Error>;

/// A single repository's failure during a persistence fan-out
///
/// Collected instead of propagated so one broken repository never prevents
/// the others from receiving the save attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositoryFailure {
    /// Repository name (for operator-facing diagnostics)
    pub repository: String,
    /// Rendered failure message
    pub message: String,
}

impl std::fmt::Display for RepositoryFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.repository, self.message)
    }
}

/// Core error type for the certificate lifecycle system
#[derive(Error, Debug)]
pub enum Error {
    /// Domain source failed to enumerate; never treated as "no domains"
    #[error("domain source error: {0}")]
    Source(String),

    /// Acquisition client could not obtain a certificate; fatal to the
    /// current creation cycle
    #[error("certificate acquisition failed: {0}")]
    Acquisition(String),

    /// One or more repositories failed to persist a certificate
    ///
    /// Raised only after every repository has received its save attempt;
    /// the in-memory store already serves the certificate regardless.
    #[error("failed to persist certificate to {} repository(ies)", failures.len())]
    Persistence {
        /// Per-repository failures, in repository order
        failures: Vec<RepositoryFailure>,
    },

    /// Certificate repository read/write error
    #[error("certificate repository error: {0}")]
    Repository(String),

    /// Certificate or key material could not be parsed
    #[error("certificate parse error: {0}")]
    CertificateParse(String),

    /// Trust chain could not be assembled from the stored chain
    ///
    /// Callers on the storage path log this as a warning; the certificate
    /// is stored and served regardless.
    #[error("certificate chain validation failed: {0}")]
    ChainValidation(String),

    /// Configuration errors
    #[error("configuration error: {0}")]
    Config(String),

    /// Invalid input (domain names, tokens, paths)
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create a domain source error
    pub fn source(msg: impl Into<String>) -> Self {
        Self::Source(msg.into())
    }

    /// Create an acquisition error
    pub fn acquisition(msg: impl Into<String>) -> Self {
        Self::Acquisition(msg.into())
    }

    /// Create a repository error
    pub fn repository(msg: impl Into<String>) -> Self {
        Self::Repository(msg.into())
    }

    /// Create a certificate parse error
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::CertificateParse(msg.into())
    }

    /// Create a chain validation error
    pub fn chain(msg: impl Into<String>) -> Self {
        Self::ChainValidation(msg.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an invalid input error
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Collect per-repository failures into an aggregate persistence error
    pub fn persistence(failures: Vec<RepositoryFailure>) -> Self {
        Self::Persistence { failures }
    }
}

/// Helper for converting anyhow::Error to our Error type
impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Self::Other(err.to_string())
    }
}
