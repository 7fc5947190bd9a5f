//! Plugin-based component registry
//!
//! The registry allows repositories, domain sources, and acquirers to be
//! registered dynamically at runtime, avoiding hardcoded if-else chains in
//! the daemon's wiring.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use autocert_core::registry::ComponentRegistry;
//!
//! // Create a registry
//! let registry = ComponentRegistry::new();
//!
//! // Plugin crates register themselves
//! autocert_repo_fs::register(&registry);
//!
//! // Create components from configuration values
//! let repo = registry.create_repository("fs", &serde_json::json!({"path": "/var/lib/autocert"}))?;
//! ```
//!
//! ## Registration
//!
//! Implementations should register themselves during initialization:
//!
//! ```rust,ignore
//! // In a repository plugin crate
//! pub fn register(registry: &ComponentRegistry) {
//!     registry.register_repository("fs", Box::new(FsRepositoryFactory));
//! }
//! ```

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::error::{Error, Result};
use crate::traits::{
    CertificateAcquirer, CertificateAcquirerFactory, CertificateRepository,
    CertificateRepositoryFactory, DomainSource, DomainSourceFactory,
};

/// Registry for plugin-based component creation
///
/// Maintains maps of type names to factory objects, allowing dynamic
/// instantiation of components based on configuration.
///
/// ## Thread Safety
///
/// Interior mutability with RwLock: concurrent reads, exclusive writes.
#[derive(Default)]
pub struct ComponentRegistry {
    /// Registered certificate repository factories
    repositories: RwLock<HashMap<String, Box<dyn CertificateRepositoryFactory>>>,

    /// Registered domain source factories
    sources: RwLock<HashMap<String, Box<dyn DomainSourceFactory>>>,

    /// Registered acquirer factories
    acquirers: RwLock<HashMap<String, Box<dyn CertificateAcquirerFactory>>>,
}

impl ComponentRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a certificate repository factory
    ///
    /// # Parameters
    ///
    /// - `name`: Repository type name (e.g., "fs", "vault")
    /// - `factory`: Factory object for creating repository instances
    pub fn register_repository(
        &self,
        name: impl Into<String>,
        factory: Box<dyn CertificateRepositoryFactory>,
    ) {
        let mut repositories = self.repositories.write().unwrap();
        repositories.insert(name.into(), factory);
    }

    /// Register a domain source factory
    ///
    /// # Parameters
    ///
    /// - `name`: Source type name (e.g., "http")
    /// - `factory`: Factory object for creating source instances
    pub fn register_source(&self, name: impl Into<String>, factory: Box<dyn DomainSourceFactory>) {
        let mut sources = self.sources.write().unwrap();
        sources.insert(name.into(), factory);
    }

    /// Register an acquirer factory
    ///
    /// # Parameters
    ///
    /// - `name`: Acquirer type name (e.g., "self-signed")
    /// - `factory`: Factory object for creating acquirer instances
    pub fn register_acquirer(
        &self,
        name: impl Into<String>,
        factory: Box<dyn CertificateAcquirerFactory>,
    ) {
        let mut acquirers = self.acquirers.write().unwrap();
        acquirers.insert(name.into(), factory);
    }

    /// Create a certificate repository from configuration
    ///
    /// # Returns
    ///
    /// - `Ok(Arc<dyn CertificateRepository>)`: created instance
    /// - `Err(Error)`: type not registered or creation failed
    pub fn create_repository(
        &self,
        type_name: &str,
        config: &serde_json::Value,
    ) -> Result<Arc<dyn CertificateRepository>> {
        let repositories = self.repositories.read().unwrap();
        let factory = repositories
            .get(type_name)
            .ok_or_else(|| Error::config(format!("unknown repository type: {type_name}")))?;
        factory.create(config)
    }

    /// Create a domain source from configuration
    pub fn create_source(
        &self,
        type_name: &str,
        config: &serde_json::Value,
    ) -> Result<Arc<dyn DomainSource>> {
        let sources = self.sources.read().unwrap();
        let factory = sources
            .get(type_name)
            .ok_or_else(|| Error::config(format!("unknown domain source type: {type_name}")))?;
        factory.create(config)
    }

    /// Create an acquirer from configuration
    pub fn create_acquirer(
        &self,
        type_name: &str,
        config: &serde_json::Value,
    ) -> Result<Arc<dyn CertificateAcquirer>> {
        let acquirers = self.acquirers.read().unwrap();
        let factory = acquirers
            .get(type_name)
            .ok_or_else(|| Error::config(format!("unknown acquirer type: {type_name}")))?;
        factory.create(config)
    }

    /// Check if a repository type is registered
    pub fn has_repository(&self, name: &str) -> bool {
        self.repositories.read().unwrap().contains_key(name)
    }

    /// Check if a domain source type is registered
    pub fn has_source(&self, name: &str) -> bool {
        self.sources.read().unwrap().contains_key(name)
    }

    /// Check if an acquirer type is registered
    pub fn has_acquirer(&self, name: &str) -> bool {
        self.acquirers.read().unwrap().contains_key(name)
    }

    /// List all registered repository types
    pub fn list_repositories(&self) -> Vec<String> {
        self.repositories.read().unwrap().keys().cloned().collect()
    }

    /// List all registered domain source types
    pub fn list_sources(&self) -> Vec<String> {
        self.sources.read().unwrap().keys().cloned().collect()
    }

    /// List all registered acquirer types
    pub fn list_acquirers(&self) -> Vec<String> {
        self.acquirers.read().unwrap().keys().cloned().collect()
    }
}
