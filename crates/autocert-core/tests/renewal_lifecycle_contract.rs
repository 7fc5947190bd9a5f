//! Architectural Contract Test: Renewal Lifecycle
//!
//! This test verifies the state machine's scheduling decisions.
//!
//! Constraints verified:
//! - Unconfigured renewal terminates the lifecycle without sleeping
//! - A certificate inside the renewal window short-circuits to creation
//! - The full startup -> creation -> renewal-check cycle leaves the store
//!   serving every requested domain, with no redundant acquisition
//!
//! If this test fails, renewal scheduling is broken.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::*;

use autocert_core::{
    CertificateLifecycle, CertificateStore, DomainEnumerator, LifecycleState,
};

fn lifecycle_with(
    config: &autocert_core::AutocertConfig,
    store: Arc<CertificateStore>,
    acquirer: Arc<MockAcquirer>,
    repositories: Vec<Arc<MockRepository>>,
) -> CertificateLifecycle {
    let enumerator = Arc::new(DomainEnumerator::new(config, Vec::new()).unwrap());
    let repositories = repositories
        .into_iter()
        .map(|repo| repo as Arc<dyn autocert_core::CertificateRepository>)
        .collect();
    let (lifecycle, _events) =
        CertificateLifecycle::new(store, enumerator, acquirer, repositories, config).unwrap();
    lifecycle
}

#[tokio::test]
async fn unconfigured_renewal_terminates_without_sleeping() {
    let config = minimal_config(&[&["example.com"]], None, None);
    let store = Arc::new(CertificateStore::new());
    let lifecycle = lifecycle_with(&config, store, MockAcquirer::new(90), vec![]);

    // A sleep would trip the timeout; Terminal must come back immediately.
    let next = tokio::time::timeout(
        Duration::from_secs(1),
        lifecycle.step(LifecycleState::CheckRenewal),
    )
    .await
    .expect("first evaluation must not sleep")
    .unwrap();

    assert_eq!(next, LifecycleState::Terminal);
}

#[tokio::test]
async fn partially_unconfigured_renewal_also_terminates() {
    let config = minimal_config(&[&["example.com"]], Some(3600), None);
    let store = Arc::new(CertificateStore::new());
    let lifecycle = lifecycle_with(&config, store, MockAcquirer::new(90), vec![]);

    let next = tokio::time::timeout(
        Duration::from_secs(1),
        lifecycle.step(LifecycleState::CheckRenewal),
    )
    .await
    .expect("first evaluation must not sleep")
    .unwrap();

    assert_eq!(next, LifecycleState::Terminal);
}

#[tokio::test]
async fn certificate_inside_window_triggers_creation() {
    // A expires in 10 days, B in 60; with 30 days in advance, A is due.
    let config = minimal_config(
        &[&["a.example.com"], &["b.example.com"]],
        Some(3600),
        Some(30),
    );
    let store = Arc::new(CertificateStore::new());
    store.add_certificate(make_cert(&["a.example.com"], 10));
    store.add_certificate(make_cert(&["b.example.com"], 60));

    let lifecycle = lifecycle_with(&config, Arc::clone(&store), MockAcquirer::new(90), vec![]);

    let next = tokio::time::timeout(
        Duration::from_secs(1),
        lifecycle.step(LifecycleState::CheckRenewal),
    )
    .await
    .expect("a due certificate must short-circuit the scan")
    .unwrap();

    assert_eq!(next, LifecycleState::BeginCreation);
}

#[tokio::test]
async fn missing_certificate_triggers_creation() {
    let config = minimal_config(&[&["a.example.com"]], Some(3600), Some(30));
    let store = Arc::new(CertificateStore::new());
    let lifecycle = lifecycle_with(&config, store, MockAcquirer::new(90), vec![]);

    let next = tokio::time::timeout(
        Duration::from_secs(1),
        lifecycle.step(LifecycleState::CheckRenewal),
    )
    .await
    .expect("a missing certificate must short-circuit the scan")
    .unwrap();

    assert_eq!(next, LifecycleState::BeginCreation);
}

#[tokio::test]
async fn startup_with_satisfied_domains_goes_to_renewal_check() {
    let config = minimal_config(&[&["example.com", "www.example.com"]], Some(3600), Some(30));
    let repo = MockRepository::new("fs");
    repo.preload(make_cert(&["example.com", "www.example.com"], 90));

    let store = Arc::new(CertificateStore::new());
    let lifecycle = lifecycle_with(
        &config,
        Arc::clone(&store),
        MockAcquirer::new(90),
        vec![repo],
    );

    let next = lifecycle.step(LifecycleState::Startup).await.unwrap();

    assert_eq!(next, LifecycleState::CheckRenewal);
    assert!(store.has_cert_for_domain("example.com"));
    assert!(store.has_cert_for_domain("www.example.com"));
}

#[tokio::test]
async fn end_to_end_acquire_then_idle_until_shutdown() {
    let config = minimal_config(&[&["example.com", "www.example.com"]], Some(3600), Some(30));
    let store = Arc::new(CertificateStore::new());
    let acquirer = MockAcquirer::new(90);
    let repo = MockRepository::new("fs");

    let lifecycle = lifecycle_with(
        &config,
        Arc::clone(&store),
        Arc::clone(&acquirer),
        vec![Arc::clone(&repo)],
    );

    // Startup finds nothing, so creation must follow.
    let next = lifecycle.step(LifecycleState::Startup).await.unwrap();
    assert_eq!(next, LifecycleState::BeginCreation);

    let next = lifecycle.step(LifecycleState::BeginCreation).await.unwrap();
    assert_eq!(next, LifecycleState::CheckRenewal);

    assert_eq!(acquirer.create_call_count(), 1);
    assert_eq!(repo.save_call_count(), 1);
    assert!(store.has_cert_for_domain("example.com"));
    assert!(store.has_cert_for_domain("www.example.com"));

    // Run the full loop: the 90-day certificate is outside the 30-day
    // window, so the machine settles into the renewal sleep and must not
    // acquire again; shutdown must not wait out the check period.
    let lifecycle = Arc::new(lifecycle);
    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();
    let runner = {
        let lifecycle = Arc::clone(&lifecycle);
        tokio::spawn(async move { lifecycle.run_with_shutdown(Some(shutdown_rx)).await })
    };

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(acquirer.create_call_count(), 1, "no redundant acquisition");

    shutdown_tx.send(()).unwrap();
    tokio::time::timeout(Duration::from_secs(1), runner)
        .await
        .expect("shutdown must not wait a full check period")
        .unwrap()
        .unwrap();
}

#[tokio::test]
async fn acquisition_failure_propagates_out_of_the_lifecycle() {
    let config = minimal_config(&[&["example.com"]], Some(3600), Some(30));
    let store = Arc::new(CertificateStore::new());
    let lifecycle = lifecycle_with(&config, store, MockAcquirer::failing(), vec![]);

    let result = lifecycle.step(LifecycleState::BeginCreation).await;
    assert!(matches!(
        result,
        Err(autocert_core::Error::Acquisition(_))
    ));
}

#[tokio::test]
async fn satisfied_request_is_skipped_during_creation() {
    let config = minimal_config(&[&["example.com"]], Some(3600), Some(30));
    let store = Arc::new(CertificateStore::new());
    store.add_certificate(make_cert(&["example.com"], 90));

    let acquirer = MockAcquirer::new(90);
    let lifecycle = lifecycle_with(&config, store, Arc::clone(&acquirer), vec![]);

    let next = lifecycle.step(LifecycleState::BeginCreation).await.unwrap();

    assert_eq!(next, LifecycleState::CheckRenewal);
    assert_eq!(acquirer.create_call_count(), 0);
}
