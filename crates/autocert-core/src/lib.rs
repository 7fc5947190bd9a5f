// # autocert-core
//
// Core library for automated TLS certificate provisioning and renewal.
//
// ## Architecture Overview
//
// This library provides the core functionality for certificate lifecycle
// management:
// - **DomainSource**: Trait for contributing dynamic certificate requests
// - **CertificateRepository**: Trait for durable certificate storage
// - **CertificateAcquirer**: Trait hiding the issuance exchange (e.g. ACME)
// - **CertificateStore**: Concurrent runtime store serving TLS handshakes
// - **DomainEnumerator**: Aggregates and caches certificate requests
// - **CertificateLifecycle**: State machine that orchestrates acquisition
//   and renewal
// - **ComponentRegistry**: Plugin-based registry for the traits above
//
// ## Design Principles
//
// 1. **Separation of Concerns**: Core logic is separate from implementations
// 2. **Plugin-Based**: Repositories, sources, and acquirers are registered
//    dynamically, no hard-coded if-else
// 3. **Library-First**: All core functionality can be used as a library
// 4. **Serve-First**: The in-memory store is the source of truth for the
//    TLS layer; persistence is best-effort and independently retryable
//
// ## Control Flow
//
// One background task drives the [`CertificateLifecycle`]; the
// [`CertificateStore`] and the [`DomainEnumerator`]'s cached snapshot are
// concurrently read by the TLS handshake path through
// [`CertificateStore::select`].

pub mod cert;
pub mod challenge;
pub mod config;
pub mod domains;
pub mod error;
pub mod lifecycle;
pub mod registry;
pub mod request;
pub mod store;
pub mod traits;

// Re-export core types for convenience
pub use cert::{CertificateKind, CertificateRecord};
pub use challenge::{ChallengeResponseStore, HTTP_CHALLENGE_PATH_PREFIX};
pub use config::{AutocertConfig, ChallengeType, DomainGroupConfig, EngineConfig, RenewalConfig};
pub use domains::DomainEnumerator;
pub use error::{Error, RepositoryFailure, Result};
pub use lifecycle::{CertificateLifecycle, LifecycleEvent, LifecycleState};
pub use registry::ComponentRegistry;
pub use request::DomainCertRequest;
pub use store::CertificateStore;
pub use traits::{AccountInfo, CertificateAcquirer, CertificateRepository, DomainSource};
