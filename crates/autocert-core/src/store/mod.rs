//! Concurrent runtime certificate store
//!
//! Maps domain names to their currently-active certificate and, separately,
//! to an in-progress challenge certificate. The store is shared by
//! reference between the TLS handshake path (unbounded concurrent
//! [`CertificateStore::select`] calls) and the single background lifecycle
//! task that mutates it.
//!
//! ## Merge policy
//!
//! Newest expiry wins. An insert only replaces an existing record when the
//! incoming certificate expires strictly later; ties keep what is already
//! stored. The comparison happens inside the map's per-key entry lock, so
//! two racing inserts for the same key can never lose the true winner.
//!
//! ## Concurrency
//!
//! `DashMap` shards the key space; readers never block on writer progress
//! and writers only contend with concurrent writers to the same key. There
//! is no global lock.

use std::sync::Arc;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tracing::{debug, trace, warn};

use crate::cert::CertificateRecord;
use crate::request::DomainCertRequest;

/// Concurrent domain -> certificate store with newest-expiry-wins merges
pub struct CertificateStore {
    /// Production certificates by lowercased domain name
    certs: DashMap<String, Arc<CertificateRecord>>,
    /// Challenge certificates by lowercased domain name
    challenge_certs: DashMap<String, Arc<CertificateRecord>>,
    /// Served when no specific match exists for the requested name
    fallback: Option<Arc<CertificateRecord>>,
}

impl CertificateStore {
    /// Create an empty store with no fallback certificate
    pub fn new() -> Self {
        Self::with_fallback(None)
    }

    /// Create an empty store with an optional fallback certificate
    pub fn with_fallback(fallback: Option<Arc<CertificateRecord>>) -> Self {
        Self {
            certs: DashMap::new(),
            challenge_certs: DashMap::new(),
            fallback,
        }
    }

    /// Register a certificate under a single domain name
    ///
    /// Returns the record stored for the domain after the merge: the
    /// incoming certificate when it won, the previously stored one
    /// otherwise.
    pub fn upsert(&self, domain: &str, cert: Arc<CertificateRecord>) -> Arc<CertificateRecord> {
        Self::merge_into(&self.certs, domain, cert)
    }

    /// Register a challenge certificate under a single domain name
    ///
    /// Same merge semantics as [`CertificateStore::upsert`], on the
    /// separate challenge map.
    pub fn upsert_challenge(
        &self,
        domain: &str,
        cert: Arc<CertificateRecord>,
    ) -> Arc<CertificateRecord> {
        Self::merge_into(&self.challenge_certs, domain, cert)
    }

    /// Remove the production certificate for a domain
    pub fn remove(&self, domain: &str) -> bool {
        self.certs.remove(&domain.to_ascii_lowercase()).is_some()
    }

    /// Remove the challenge certificate for a domain
    pub fn remove_challenge(&self, domain: &str) -> bool {
        self.challenge_certs
            .remove(&domain.to_ascii_lowercase())
            .is_some()
    }

    /// Register a certificate under every name it covers
    ///
    /// Challenge-kind records go to the challenge map. When a production
    /// certificate actually wins at least one name and is not self-signed,
    /// its trust chain is validated once, synchronously, purely to surface
    /// broken chains early; failure is logged and never affects storage.
    pub fn add_certificate(&self, cert: CertificateRecord) -> Arc<CertificateRecord> {
        let cert = Arc::new(cert);

        if cert.is_challenge() {
            self.merge_all_names(&self.challenge_certs, &cert);
            return cert;
        }

        let won = self.merge_all_names(&self.certs, &cert);
        if won && !cert.is_self_signed() {
            if let Err(err) = cert.validate_chain() {
                warn!(
                    subject = %cert.subject(),
                    thumbprint = %cert.thumbprint(),
                    error = %err,
                    "certificate stored but its chain did not validate"
                );
            }
        }

        cert
    }

    /// Register a challenge certificate under every name it covers
    pub fn add_challenge_certificate(&self, cert: CertificateRecord) -> Arc<CertificateRecord> {
        let cert = Arc::new(cert);
        self.merge_all_names(&self.challenge_certs, &cert);
        cert
    }

    /// Select the certificate to serve for an incoming TLS handshake
    ///
    /// While any challenge is outstanding, a matching challenge record wins
    /// over production traffic: validation probes must always be answered.
    /// With no SNI name or no production record, the configured fallback
    /// (possibly `None`) is served.
    ///
    /// Non-blocking; safe for unbounded concurrent callers.
    pub fn select(&self, sni: Option<&str>) -> Option<Arc<CertificateRecord>> {
        if !self.challenge_certs.is_empty()
            && let Some(name) = sni
            && let Some(challenge) = self.challenge_certs.get(&name.to_ascii_lowercase())
        {
            trace!(domain = %name, "serving challenge certificate");
            return Some(Arc::clone(challenge.value()));
        }

        let Some(name) = sni else {
            return self.fallback.clone();
        };

        match self.certs.get(&name.to_ascii_lowercase()) {
            Some(cert) => Some(Arc::clone(cert.value())),
            None => self.fallback.clone(),
        }
    }

    /// Look up the production certificate for a domain
    pub fn get(&self, domain: &str) -> Option<Arc<CertificateRecord>> {
        self.certs
            .get(&domain.to_ascii_lowercase())
            .map(|cert| Arc::clone(cert.value()))
    }

    /// Check whether a production certificate exists for a domain
    pub fn has_cert_for_domain(&self, domain: &str) -> bool {
        self.certs.contains_key(&domain.to_ascii_lowercase())
    }

    /// Check whether every domain of a request has a production certificate
    pub fn has_cert_for_request(&self, request: &DomainCertRequest) -> bool {
        request
            .domains()
            .iter()
            .all(|domain| self.has_cert_for_domain(domain))
    }

    /// True when any challenge certificate is outstanding
    pub fn any_challenge(&self) -> bool {
        !self.challenge_certs.is_empty()
    }

    /// All domains with a production certificate
    pub fn all_cert_domains(&self) -> Vec<String> {
        self.certs.iter().map(|entry| entry.key().clone()).collect()
    }

    /// Number of domains with a production certificate
    pub fn len(&self) -> usize {
        self.certs.len()
    }

    /// True when no production certificate is stored
    pub fn is_empty(&self) -> bool {
        self.certs.is_empty()
    }

    /// Merge a certificate under every covered name; true if it won anywhere
    fn merge_all_names(
        &self,
        map: &DashMap<String, Arc<CertificateRecord>>,
        cert: &Arc<CertificateRecord>,
    ) -> bool {
        let mut won = false;
        for name in cert.names() {
            let winner = Self::merge_into(map, name, Arc::clone(cert));
            won |= Arc::ptr_eq(&winner, cert);
        }
        won
    }

    /// Newest-expiry-wins merge for one key, atomic under the entry lock
    fn merge_into(
        map: &DashMap<String, Arc<CertificateRecord>>,
        domain: &str,
        cert: Arc<CertificateRecord>,
    ) -> Arc<CertificateRecord> {
        let key = domain.to_ascii_lowercase();
        match map.entry(key) {
            Entry::Occupied(mut entry) => {
                if cert.not_after() > entry.get().not_after() {
                    debug!(
                        domain = %domain,
                        expires = %cert.not_after(),
                        "replacing certificate with later-expiring one"
                    );
                    entry.insert(Arc::clone(&cert));
                    cert
                } else {
                    Arc::clone(entry.get())
                }
            }
            Entry::Vacant(entry) => {
                debug!(domain = %domain, expires = %cert.not_after(), "storing certificate");
                entry.insert(Arc::clone(&cert));
                cert
            }
        }
    }
}

impl Default for CertificateStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for CertificateStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CertificateStore")
            .field("certs", &self.certs.len())
            .field("challenge_certs", &self.challenge_certs.len())
            .field("has_fallback", &self.fallback.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cert::CertificateKind;

    fn cert(domains: &[&str], not_after: (i32, u8, u8), kind: CertificateKind) -> CertificateRecord {
        let names: Vec<String> = domains.iter().map(|d| d.to_string()).collect();
        let mut params = rcgen::CertificateParams::new(names).unwrap();
        params
            .distinguished_name
            .push(rcgen::DnType::CommonName, domains[0]);
        params.not_after = rcgen::date_time_ymd(not_after.0, not_after.1, not_after.2);

        let key = rcgen::KeyPair::generate().unwrap();
        let signed = params.self_signed(&key).unwrap();

        CertificateRecord::from_pem(signed.pem(), key.serialize_pem(), kind).unwrap()
    }

    #[test]
    fn later_expiry_wins_regardless_of_order() {
        let five_years = cert(&["test.example.com"], (2030, 1, 1), CertificateKind::Production);
        let ten_years = cert(&["test.example.com"], (2035, 1, 1), CertificateKind::Production);

        let store = CertificateStore::new();
        let longer = store.add_certificate(ten_years.clone());
        store.add_certificate(five_years.clone());
        assert_eq!(
            store.get("test.example.com").unwrap().thumbprint(),
            longer.thumbprint()
        );

        let store = CertificateStore::new();
        store.add_certificate(five_years);
        store.add_certificate(ten_years);
        assert_eq!(
            store.get("test.example.com").unwrap().thumbprint(),
            longer.thumbprint()
        );
    }

    #[test]
    fn equal_expiry_keeps_existing() {
        let first = cert(&["tie.example.com"], (2032, 6, 1), CertificateKind::Production);
        let second = cert(&["tie.example.com"], (2032, 6, 1), CertificateKind::Production);

        let store = CertificateStore::new();
        let stored_first = store.add_certificate(first);
        store.add_certificate(second);

        assert_eq!(
            store.get("tie.example.com").unwrap().thumbprint(),
            stored_first.thumbprint()
        );
    }

    #[test]
    fn select_is_idempotent_without_writes() {
        let store = CertificateStore::new();
        store.add_certificate(cert(
            &["stable.example.com"],
            (2033, 1, 1),
            CertificateKind::Production,
        ));

        let a = store.select(Some("stable.example.com")).unwrap();
        let b = store.select(Some("stable.example.com")).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn challenge_certificate_wins_over_production() {
        let store = CertificateStore::new();
        store.add_certificate(cert(
            &["probe.example.com"],
            (2035, 1, 1),
            CertificateKind::Production,
        ));
        let challenge = store.add_challenge_certificate(cert(
            &["probe.example.com"],
            (2030, 1, 1),
            CertificateKind::Challenge,
        ));

        let selected = store.select(Some("probe.example.com")).unwrap();
        assert_eq!(selected.thumbprint(), challenge.thumbprint());

        store.remove_challenge("probe.example.com");
        let selected = store.select(Some("probe.example.com")).unwrap();
        assert!(!selected.is_challenge());
    }

    #[test]
    fn fallback_served_for_null_and_unknown_sni() {
        let fallback = Arc::new(cert(
            &["fallback.example.com"],
            (2031, 1, 1),
            CertificateKind::Production,
        ));
        let store = CertificateStore::with_fallback(Some(Arc::clone(&fallback)));

        let for_null = store.select(None).unwrap();
        assert_eq!(for_null.thumbprint(), fallback.thumbprint());

        let for_unknown = store.select(Some("unknown.example.com")).unwrap();
        assert_eq!(for_unknown.thumbprint(), fallback.thumbprint());

        let bare = CertificateStore::new();
        assert!(bare.select(None).is_none());
        assert!(bare.select(Some("unknown.example.com")).is_none());
    }

    #[test]
    fn request_membership_requires_every_domain() {
        let store = CertificateStore::new();
        store.add_certificate(cert(
            &["example.com"],
            (2033, 1, 1),
            CertificateKind::Production,
        ));

        let request = DomainCertRequest::group(
            "example.com",
            vec!["www.example.com".to_string()],
        )
        .unwrap();
        assert!(!store.has_cert_for_request(&request));

        store.add_certificate(cert(
            &["www.example.com"],
            (2033, 1, 1),
            CertificateKind::Production,
        ));
        assert!(store.has_cert_for_request(&request));
    }

    #[test]
    fn lookups_are_case_insensitive() {
        let store = CertificateStore::new();
        store.add_certificate(cert(
            &["Mixed.Example.com"],
            (2033, 1, 1),
            CertificateKind::Production,
        ));

        assert!(store.has_cert_for_domain("MIXED.EXAMPLE.COM"));
        assert!(store.select(Some("mixed.example.COM")).is_some());
    }

    #[test]
    fn remove_clears_production_entry() {
        let store = CertificateStore::new();
        store.add_certificate(cert(
            &["gone.example.com"],
            (2033, 1, 1),
            CertificateKind::Production,
        ));

        assert!(store.remove("gone.example.com"));
        assert!(!store.remove("gone.example.com"));
        assert!(store.select(Some("gone.example.com")).is_none());
    }

    #[test]
    fn multi_name_certificate_registers_every_name() {
        let store = CertificateStore::new();
        store.add_certificate(cert(
            &["example.com", "www.example.com", "api.example.com"],
            (2033, 1, 1),
            CertificateKind::Production,
        ));

        assert_eq!(store.len(), 3);
        let mut domains = store.all_cert_domains();
        domains.sort();
        assert_eq!(
            domains,
            vec!["api.example.com", "example.com", "www.example.com"]
        );
    }
}
