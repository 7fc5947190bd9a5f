// # autocertd - Certificate Lifecycle Daemon
//
// The autocertd daemon is a THIN integration layer:
// 1. Reading configuration from environment variables
// 2. Initializing logging
// 3. Registering repositories, sources, and acquirers
// 4. Starting the certificate lifecycle
//
// All lifecycle logic lives in autocert-core; nothing here decides when a
// certificate is acquired, renewed, or served.
//
// ## Configuration
//
// All configuration is done via environment variables:
//
// ### Domains
// - `AUTOCERT_DOMAINS`: Domain groups; names separated by commas, groups
//   separated by semicolons. The first name of each group becomes the
//   certificate subject. Optional when a dynamic source is configured.
//
// ### Storage
// - `AUTOCERT_STORAGE_PATH`: Base directory for the filesystem repository
//
// ### Acquisition
// - `AUTOCERT_ACQUIRER`: Acquirer type (default: self-signed)
// - `AUTOCERT_ACQUIRER_VALIDITY_DAYS`: Validity for self-signed certificates
//
// ### Dynamic domains
// - `AUTOCERT_DOMAIN_SOURCE_URL`: Optional discovery endpoint returning
//   JSON domain groups
//
// ### Renewal
// - `AUTOCERT_RENEWAL_CHECK_PERIOD_SECS`: Renewal scan interval
// - `AUTOCERT_RENEW_DAYS_IN_ADVANCE`: Renew certificates expiring within
//   this many days
//
// Both renewal variables must be set for automatic renewal; otherwise the
// daemon performs initial acquisition and exits.
//
// ### Fallback
// - `AUTOCERT_FALLBACK_CERT` / `AUTOCERT_FALLBACK_KEY`: PEM files for the
//   certificate served when no specific match exists for a requested name
//
// ### Misc
// - `AUTOCERT_SAVE_SETTLE_SECS`: Persistence settling floor (default 300)
// - `AUTOCERT_LOG_LEVEL`: Log level (default info)
//
// ## Example
//
// ```bash
// export AUTOCERT_DOMAINS="example.com,www.example.com;api.example.com"
// export AUTOCERT_STORAGE_PATH=/var/lib/autocert
// export AUTOCERT_RENEWAL_CHECK_PERIOD_SECS=43200
// export AUTOCERT_RENEW_DAYS_IN_ADVANCE=30
//
// autocertd
// ```

use std::env;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Result;
use tracing::{Level, debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

use autocert_core::cert::{CertificateKind, CertificateRecord};
use autocert_core::{
    AutocertConfig, CertificateLifecycle, CertificateStore, ComponentRegistry, DomainEnumerator,
    DomainGroupConfig, LifecycleEvent,
};

/// Exit codes for different termination scenarios
///
/// These codes follow systemd conventions:
/// - 0: Clean shutdown
/// - 1: Configuration or startup error
/// - 2: Runtime error (unexpected)
#[derive(Debug, Clone, Copy)]
enum AutocertExitCode {
    /// Clean shutdown (normal exit)
    CleanShutdown = 0,
    /// Configuration error or startup failure
    ConfigError = 1,
    /// Runtime error (unexpected failure)
    RuntimeError = 2,
}

impl From<AutocertExitCode> for ExitCode {
    fn from(code: AutocertExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

/// Application configuration
struct Config {
    domains: Vec<Vec<String>>,
    storage_path: String,
    acquirer_type: String,
    acquirer_validity_days: Option<u32>,
    domain_source_url: Option<String>,
    renewal_check_period_secs: Option<u64>,
    renew_days_in_advance: Option<u32>,
    save_settle_secs: Option<u64>,
    fallback_cert_path: Option<String>,
    fallback_key_path: Option<String>,
    log_level: String,
}

impl Config {
    /// Load configuration from environment variables
    fn from_env() -> Result<Self> {
        Ok(Self {
            domains: env::var("AUTOCERT_DOMAINS")
                .unwrap_or_default()
                .split(';')
                .map(|group| {
                    group
                        .split(',')
                        .map(|name| name.trim().to_string())
                        .filter(|name| !name.is_empty())
                        .collect::<Vec<_>>()
                })
                .filter(|group: &Vec<String>| !group.is_empty())
                .collect(),
            storage_path: env::var("AUTOCERT_STORAGE_PATH").unwrap_or_default(),
            acquirer_type: env::var("AUTOCERT_ACQUIRER")
                .unwrap_or_else(|_| "self-signed".to_string()),
            acquirer_validity_days: env::var("AUTOCERT_ACQUIRER_VALIDITY_DAYS")
                .ok()
                .and_then(|s| s.parse().ok()),
            domain_source_url: env::var("AUTOCERT_DOMAIN_SOURCE_URL").ok(),
            renewal_check_period_secs: env::var("AUTOCERT_RENEWAL_CHECK_PERIOD_SECS")
                .ok()
                .and_then(|s| s.parse().ok()),
            renew_days_in_advance: env::var("AUTOCERT_RENEW_DAYS_IN_ADVANCE")
                .ok()
                .and_then(|s| s.parse().ok()),
            save_settle_secs: env::var("AUTOCERT_SAVE_SETTLE_SECS")
                .ok()
                .and_then(|s| s.parse().ok()),
            fallback_cert_path: env::var("AUTOCERT_FALLBACK_CERT").ok(),
            fallback_key_path: env::var("AUTOCERT_FALLBACK_KEY").ok(),
            log_level: env::var("AUTOCERT_LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
        })
    }

    /// Validate the configuration
    fn validate(&self) -> Result<()> {
        if self.storage_path.is_empty() {
            anyhow::bail!(
                "AUTOCERT_STORAGE_PATH is required. \
                Set it via: export AUTOCERT_STORAGE_PATH=/var/lib/autocert"
            );
        }

        if let Some(parent) = std::path::Path::new(&self.storage_path).parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            anyhow::bail!(
                "AUTOCERT_STORAGE_PATH parent directory does not exist: {}. \
                Create it first: sudo mkdir -p {}",
                parent.display(),
                parent.display()
            );
        }

        if self.domains.is_empty() && self.domain_source_url.is_none() {
            anyhow::bail!(
                "No domains configured. Set AUTOCERT_DOMAINS \
                (e.g. export AUTOCERT_DOMAINS=example.com,www.example.com) \
                or AUTOCERT_DOMAIN_SOURCE_URL"
            );
        }

        if let Some(url) = &self.domain_source_url
            && !(url.starts_with("http://") || url.starts_with("https://"))
        {
            anyhow::bail!(
                "AUTOCERT_DOMAIN_SOURCE_URL must be an http(s) URL, got: {url}"
            );
        }

        match self.acquirer_type.as_str() {
            "self-signed" => {}
            other => anyhow::bail!(
                "AUTOCERT_ACQUIRER '{other}' is not supported. \
                Supported acquirers: self-signed"
            ),
        }

        if self.fallback_cert_path.is_some() != self.fallback_key_path.is_some() {
            anyhow::bail!(
                "AUTOCERT_FALLBACK_CERT and AUTOCERT_FALLBACK_KEY must be set together"
            );
        }
        for path in [&self.fallback_cert_path, &self.fallback_key_path]
            .into_iter()
            .flatten()
        {
            if !std::path::Path::new(path).exists() {
                anyhow::bail!("fallback certificate file does not exist: {path}");
            }
        }

        // One renewal knob without the other is almost always a mistake;
        // the lifecycle would silently never renew.
        if self.renewal_check_period_secs.is_some() != self.renew_days_in_advance.is_some() {
            warn!(
                "only one of AUTOCERT_RENEWAL_CHECK_PERIOD_SECS and \
                AUTOCERT_RENEW_DAYS_IN_ADVANCE is set; automatic renewal stays disabled"
            );
        }

        Ok(())
    }

    /// Build the core configuration from the environment values
    fn to_core_config(&self) -> Result<AutocertConfig> {
        let mut config = AutocertConfig::default();

        for group in &self.domains {
            let (primary, alternates) = group
                .split_first()
                .expect("empty groups are filtered during parsing");
            config.domain_groups.push(
                DomainGroupConfig::new(primary.clone())
                    .with_alternates(alternates.iter().cloned()),
            );
        }

        config.renewal.check_period_secs = self.renewal_check_period_secs;
        config.renewal.renew_days_in_advance = self.renew_days_in_advance;
        if let Some(settle) = self.save_settle_secs {
            config.engine.save_settle_floor_secs = settle;
        }

        config.validate()?;
        Ok(config)
    }
}

/// Load the optional fallback certificate from PEM files
fn load_fallback(config: &Config) -> Result<Option<Arc<CertificateRecord>>> {
    let (Some(cert_path), Some(key_path)) =
        (&config.fallback_cert_path, &config.fallback_key_path)
    else {
        return Ok(None);
    };

    let chain_pem = std::fs::read_to_string(cert_path)?;
    let key_pem = std::fs::read_to_string(key_path)?;
    let record = CertificateRecord::from_pem(chain_pem, key_pem, CertificateKind::Production)?;

    Ok(Some(Arc::new(record)))
}

/// Register the built-in component factories
fn build_registry() -> ComponentRegistry {
    let registry = ComponentRegistry::new();

    #[cfg(feature = "fs")]
    autocert_repo_fs::register(&registry);

    #[cfg(feature = "http")]
    autocert_source_http::register(&registry);

    #[cfg(feature = "self-signed")]
    autocert_acquirer_selfsigned::register(&registry);

    registry
}

/// Log lifecycle events as they arrive
async fn log_events(mut events: tokio::sync::mpsc::Receiver<LifecycleEvent>) {
    while let Some(event) = events.recv().await {
        match event {
            LifecycleEvent::Started { repositories } => {
                info!(repositories, "lifecycle started");
            }
            LifecycleEvent::CertificatesLoaded { count } => {
                debug!(count, "loaded persisted certificates");
            }
            LifecycleEvent::StateChanged { from, to } => {
                debug!(?from, ?to, "lifecycle state changed");
            }
            LifecycleEvent::RenewalDue { domain } => {
                info!(domain = %domain, "certificate due for renewal");
            }
            LifecycleEvent::CreationSkipped { primary } => {
                debug!(primary = %primary, "request already satisfied");
            }
            LifecycleEvent::CertificateAcquired {
                subject,
                thumbprint,
                not_after,
            } => {
                info!(subject = %subject, thumbprint = %thumbprint, not_after = %not_after, "certificate acquired");
            }
            LifecycleEvent::PersistenceFailed { repository, error } => {
                warn!(repository = %repository, error = %error, "repository failed to persist certificate");
            }
            LifecycleEvent::Stopped { reason } => {
                info!(reason = %reason, "lifecycle stopped");
            }
        }
    }
}

async fn run() -> Result<(), AutocertExitCode> {
    let config = match Config::from_env() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("configuration error: {err}");
            return Err(AutocertExitCode::ConfigError);
        }
    };

    let level: Level = config.log_level.parse().unwrap_or(Level::INFO);
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    if tracing::subscriber::set_global_default(subscriber).is_err() {
        eprintln!("failed to initialize logging");
        return Err(AutocertExitCode::ConfigError);
    }

    if let Err(err) = config.validate() {
        error!(error = %err, "invalid configuration");
        return Err(AutocertExitCode::ConfigError);
    }

    let core_config = match config.to_core_config() {
        Ok(core_config) => core_config,
        Err(err) => {
            error!(error = %err, "invalid configuration");
            return Err(AutocertExitCode::ConfigError);
        }
    };

    let registry = build_registry();

    let wiring = (|| -> Result<_> {
        let repository = registry.create_repository(
            "fs",
            &serde_json::json!({ "path": config.storage_path }),
        )?;

        let mut sources = Vec::new();
        if let Some(url) = &config.domain_source_url {
            sources.push(registry.create_source("http", &serde_json::json!({ "url": url }))?);
        }

        let mut acquirer_config = serde_json::Map::new();
        if let Some(days) = config.acquirer_validity_days {
            acquirer_config.insert("validity_days".to_string(), days.into());
        }
        let acquirer = registry.create_acquirer(
            &config.acquirer_type,
            &serde_json::Value::Object(acquirer_config),
        )?;

        Ok((repository, sources, acquirer))
    })();

    let (repository, sources, acquirer) = match wiring {
        Ok(wiring) => wiring,
        Err(err) => {
            error!(error = %err, "failed to initialize components");
            return Err(AutocertExitCode::ConfigError);
        }
    };

    let fallback = match load_fallback(&config) {
        Ok(fallback) => fallback,
        Err(err) => {
            error!(error = %err, "failed to load fallback certificate");
            return Err(AutocertExitCode::ConfigError);
        }
    };

    let store = Arc::new(CertificateStore::with_fallback(fallback));
    let enumerator = match DomainEnumerator::new(&core_config, sources) {
        Ok(enumerator) => Arc::new(enumerator),
        Err(err) => {
            error!(error = %err, "failed to build domain enumerator");
            return Err(AutocertExitCode::ConfigError);
        }
    };

    let (lifecycle, events) = match CertificateLifecycle::new(
        Arc::clone(&store),
        enumerator,
        acquirer,
        vec![repository],
        &core_config,
    ) {
        Ok(built) => built,
        Err(err) => {
            error!(error = %err, "failed to build lifecycle");
            return Err(AutocertExitCode::ConfigError);
        }
    };

    tokio::spawn(log_events(events));

    info!(
        acquirer = %config.acquirer_type,
        storage = %config.storage_path,
        renewal_configured = core_config.renewal.is_configured(),
        allowed_challenges = ?core_config.allowed_challenges,
        "starting certificate lifecycle"
    );

    match lifecycle.run().await {
        Ok(()) => {
            info!("clean shutdown");
            Ok(())
        }
        Err(err) => {
            error!(error = %err, "lifecycle terminated with an error");
            Err(AutocertExitCode::RuntimeError)
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => AutocertExitCode::CleanShutdown.into(),
        Err(code) => code.into(),
    }
}
