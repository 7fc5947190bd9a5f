//! Minimal embedding example for autocert-core
//!
//! This example demonstrates using autocert-core as a library in a custom
//! application: a custom domain source, a custom in-memory repository, the
//! self-signed development acquirer, and a TLS selection callback, with the
//! lifecycle fully managed by the application.

#![allow(dead_code)]

use std::sync::Arc;
use std::sync::Mutex;

use autocert_core::{
    AutocertConfig, CertificateLifecycle, CertificateStore, DomainCertRequest, DomainEnumerator,
    DomainGroupConfig, Result,
    cert::CertificateRecord,
    traits::{CertificateRepository, DomainSource},
};
use autocert_acquirer_selfsigned::SelfSignedAcquirer;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::ReceiverStream;

/// Custom domain source for embedded usage
///
/// A real implementation would consult a tenant database or an ingress
/// controller; this one returns a fixed list.
struct EmbeddedDomainSource;

#[async_trait::async_trait]
impl DomainSource for EmbeddedDomainSource {
    async fn domains(&self) -> Result<Vec<DomainCertRequest>> {
        Ok(vec![DomainCertRequest::single("tenant.example.test")?])
    }

    fn name(&self) -> &'static str {
        "embedded"
    }
}

/// Custom in-memory repository for embedded usage
struct EmbeddedRepository {
    saved: Mutex<Vec<CertificateRecord>>,
}

impl EmbeddedRepository {
    fn new() -> Self {
        Self {
            saved: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait::async_trait]
impl CertificateRepository for EmbeddedRepository {
    async fn get_certificates(&self) -> Result<Vec<CertificateRecord>> {
        Ok(self.saved.lock().unwrap().clone())
    }

    async fn save(&self, cert: &CertificateRecord) -> Result<()> {
        println!("[Embedded] Persisting certificate for {:?}", cert.names());
        self.saved.lock().unwrap().push(cert.clone());
        Ok(())
    }

    fn name(&self) -> &'static str {
        "embedded"
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    println!("=== Embedded autocert-core Example ===\n");

    // Create configuration: one static group plus the dynamic source,
    // renewal every hour, 30 days in advance, no settling delay.
    let mut config = AutocertConfig::default();
    config.domain_groups.push(
        DomainGroupConfig::new("example.test")
            .with_alternates(vec!["www.example.test".to_string()]),
    );
    config.renewal.check_period_secs = Some(3600);
    config.renewal.renew_days_in_advance = Some(30);
    config.engine.save_settle_floor_secs = 0;

    // Create custom components
    let store = Arc::new(CertificateStore::new());
    let enumerator = Arc::new(DomainEnumerator::new(
        &config,
        vec![Arc::new(EmbeddedDomainSource)],
    )?);
    let acquirer = Arc::new(SelfSignedAcquirer::new().with_validity_days(90));
    let repository = Arc::new(EmbeddedRepository::new());

    // Create the lifecycle
    println!("1. Creating lifecycle...");
    let (lifecycle, event_rx) = CertificateLifecycle::new(
        Arc::clone(&store),
        enumerator,
        acquirer,
        vec![repository],
        &config,
    )?;

    // Spawn event listener (optional)
    let event_listener = tokio::spawn(async move {
        println!("2. Event listener started");
        let mut events = ReceiverStream::new(event_rx);
        while let Some(event) = events.next().await {
            println!("[Event] {event:?}");
        }
        println!("Event listener stopped");
    });

    // Run the lifecycle in the background with a controlled shutdown
    println!("3. Starting lifecycle in background...");
    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();
    let lifecycle = Arc::new(lifecycle);
    let runner = {
        let lifecycle = Arc::clone(&lifecycle);
        tokio::spawn(async move { lifecycle.run_with_shutdown(Some(shutdown_rx)).await })
    };

    // Give startup + acquisition a moment
    tokio::time::sleep(tokio::time::Duration::from_millis(500)).await;

    // The TLS layer would call this from its certificate-selection hook
    println!("\n4. Selecting certificates the way a TLS callback would:");
    for sni in [Some("example.test"), Some("tenant.example.test"), None] {
        match store.select(sni) {
            Some(cert) => println!(
                "   select({sni:?}) -> {} (expires {})",
                cert.names()[0],
                cert.not_after()
            ),
            None => println!("   select({sni:?}) -> no certificate (no fallback configured)"),
        }
    }

    // Stop the lifecycle
    println!("\n5. Stopping lifecycle...");
    let _ = shutdown_tx.send(());
    runner.await.expect("lifecycle task panicked")?;

    let _ = tokio::time::timeout(tokio::time::Duration::from_millis(100), event_listener).await;

    println!("\n6. Lifecycle stopped cleanly.");
    println!("\n=== Embedding Successful ===");
    println!("Key Points:");
    println!("- Lifecycle is fully controlled by the application");
    println!("- The store is shared by reference with the TLS path");
    println!("- All components are custom (not autocertd defaults)");

    Ok(())
}
