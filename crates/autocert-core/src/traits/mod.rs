//! Core traits for the certificate lifecycle system
//!
//! This module defines the abstract interfaces that all implementations must follow.
//!
//! - [`DomainSource`]: Contribute dynamic certificate requests
//! - [`CertificateRepository`]: Durably store and reload issued certificates
//! - [`CertificateAcquirer`]: Obtain newly issued certificates (e.g. via ACME)

pub mod certificate_acquirer;
pub mod certificate_repository;
pub mod domain_source;

pub use certificate_acquirer::{AccountInfo, CertificateAcquirer, CertificateAcquirerFactory};
pub use certificate_repository::{CertificateRepository, CertificateRepositoryFactory};
pub use domain_source::{DomainSource, DomainSourceFactory};
