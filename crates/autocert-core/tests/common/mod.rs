//! Test doubles and common utilities for architecture contract tests
//!
//! This module provides minimal test doubles that verify architectural
//! constraints without implementing real issuance or storage.

#![allow(dead_code)]

use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::{Datelike, Utc};

use autocert_core::cert::{CertificateKind, CertificateRecord};
use autocert_core::config::{AutocertConfig, DomainGroupConfig};
use autocert_core::error::{Error, Result};
use autocert_core::request::DomainCertRequest;
use autocert_core::traits::{
    AccountInfo, CertificateAcquirer, CertificateRepository, DomainSource,
};

/// Mint a self-signed certificate expiring `days_from_now` days from now
///
/// Day granularity is plenty for threshold tests; every test keeps a
/// multi-day margin around its renewal window.
pub fn make_cert(domains: &[&str], days_from_now: i64) -> CertificateRecord {
    let date = (Utc::now() + chrono::Duration::days(days_from_now)).date_naive();

    let names: Vec<String> = domains.iter().map(|d| d.to_string()).collect();
    let mut params = rcgen::CertificateParams::new(names).expect("valid SAN list");
    params
        .distinguished_name
        .push(rcgen::DnType::CommonName, domains[0]);
    params.not_after = rcgen::date_time_ymd(date.year(), date.month() as u8, date.day() as u8);

    let key = rcgen::KeyPair::generate().expect("key generation succeeds");
    let cert = params.self_signed(&key).expect("self-signing succeeds");

    CertificateRecord::from_pem(cert.pem(), key.serialize_pem(), CertificateKind::Production)
        .expect("generated certificate parses")
}

/// A domain source returning a fixed request list, counting calls
pub struct StaticDomainSource {
    requests: Vec<DomainCertRequest>,
    calls: AtomicUsize,
    /// Artificial per-call latency, for single-flight tests
    delay_ms: u64,
}

impl StaticDomainSource {
    pub fn new(requests: Vec<DomainCertRequest>) -> Arc<Self> {
        Arc::new(Self {
            requests,
            calls: AtomicUsize::new(0),
            delay_ms: 0,
        })
    }

    pub fn with_delay(requests: Vec<DomainCertRequest>, delay_ms: u64) -> Arc<Self> {
        Arc::new(Self {
            requests,
            calls: AtomicUsize::new(0),
            delay_ms,
        })
    }

    /// Get the number of times domains() was called
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DomainSource for StaticDomainSource {
    async fn domains(&self) -> Result<Vec<DomainCertRequest>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.delay_ms > 0 {
            tokio::time::sleep(tokio::time::Duration::from_millis(self.delay_ms)).await;
        }
        Ok(self.requests.clone())
    }

    fn name(&self) -> &'static str {
        "static-test"
    }
}

/// A mock repository that records saves and can fail on demand
pub struct MockRepository {
    name: &'static str,
    /// Certificates returned by get_certificates()
    preloaded: Mutex<Vec<CertificateRecord>>,
    /// Certificates received via save()
    saved: Mutex<Vec<CertificateRecord>>,
    save_calls: AtomicUsize,
    load_calls: AtomicUsize,
    fail_saves: bool,
}

impl MockRepository {
    pub fn new(name: &'static str) -> Arc<Self> {
        Arc::new(Self {
            name,
            preloaded: Mutex::new(Vec::new()),
            saved: Mutex::new(Vec::new()),
            save_calls: AtomicUsize::new(0),
            load_calls: AtomicUsize::new(0),
            fail_saves: false,
        })
    }

    pub fn failing(name: &'static str) -> Arc<Self> {
        Arc::new(Self {
            name,
            preloaded: Mutex::new(Vec::new()),
            saved: Mutex::new(Vec::new()),
            save_calls: AtomicUsize::new(0),
            load_calls: AtomicUsize::new(0),
            fail_saves: true,
        })
    }

    pub fn preload(&self, cert: CertificateRecord) {
        self.preloaded.lock().unwrap().push(cert);
    }

    /// Get the number of times save() was called
    pub fn save_call_count(&self) -> usize {
        self.save_calls.load(Ordering::SeqCst)
    }

    /// Get the number of times get_certificates() was called
    pub fn load_call_count(&self) -> usize {
        self.load_calls.load(Ordering::SeqCst)
    }

    /// Thumbprints of every certificate received via save()
    pub fn saved_thumbprints(&self) -> Vec<String> {
        self.saved
            .lock()
            .unwrap()
            .iter()
            .map(|cert| cert.thumbprint().to_string())
            .collect()
    }
}

#[async_trait]
impl CertificateRepository for MockRepository {
    async fn get_certificates(&self) -> Result<Vec<CertificateRecord>> {
        self.load_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.preloaded.lock().unwrap().clone())
    }

    async fn save(&self, cert: &CertificateRecord) -> Result<()> {
        self.save_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_saves {
            return Err(Error::repository("simulated save failure"));
        }
        self.saved.lock().unwrap().push(cert.clone());
        Ok(())
    }

    fn name(&self) -> &'static str {
        self.name
    }
}

/// A mock acquirer minting self-signed certificates, counting calls
pub struct MockAcquirer {
    validity_days: i64,
    create_calls: AtomicUsize,
    account_calls: AtomicUsize,
    fail: bool,
}

impl MockAcquirer {
    pub fn new(validity_days: i64) -> Arc<Self> {
        Arc::new(Self {
            validity_days,
            create_calls: AtomicUsize::new(0),
            account_calls: AtomicUsize::new(0),
            fail: false,
        })
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            validity_days: 0,
            create_calls: AtomicUsize::new(0),
            account_calls: AtomicUsize::new(0),
            fail: true,
        })
    }

    /// Get the number of times create_certificate() was called
    pub fn create_call_count(&self) -> usize {
        self.create_calls.load(Ordering::SeqCst)
    }

    /// Get the number of times get_or_create_account() was called
    pub fn account_call_count(&self) -> usize {
        self.account_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CertificateAcquirer for MockAcquirer {
    async fn get_or_create_account(&self) -> Result<AccountInfo> {
        self.account_calls.fetch_add(1, Ordering::SeqCst);
        Ok(AccountInfo {
            id: "test-account".to_string(),
            contact: None,
        })
    }

    async fn create_certificate(
        &self,
        request: &DomainCertRequest,
    ) -> Result<CertificateRecord> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(Error::acquisition("simulated issuance failure"));
        }
        let domains: Vec<&str> = request.domains();
        Ok(make_cert(&domains, self.validity_days))
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}

/// Helper to create a minimal AutocertConfig for testing
///
/// The settle floor is zeroed so tests that don't exercise it stay fast.
pub fn minimal_config(
    groups: &[&[&str]],
    check_period_secs: Option<u64>,
    renew_days_in_advance: Option<u32>,
) -> AutocertConfig {
    let mut config = AutocertConfig::default();
    for group in groups {
        let (primary, alternates) = group.split_first().expect("non-empty group");
        config.domain_groups.push(
            DomainGroupConfig::new(*primary)
                .with_alternates(alternates.iter().map(|a| a.to_string())),
        );
    }
    config.renewal.check_period_secs = check_period_secs;
    config.renewal.renew_days_in_advance = renew_days_in_advance;
    config.engine.save_settle_floor_secs = 0;
    config
}
