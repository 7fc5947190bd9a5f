//! Domain aggregation and caching
//!
//! The [`DomainEnumerator`] unions the statically configured domain groups
//! with every dynamic [`DomainSource`] contribution into one deduplicated,
//! ordered list of certificate requests, and caches the result until
//! invalidated or refreshed.
//!
//! ## Caching
//!
//! The snapshot is replaced wholesale (copy-on-write via `ArcSwap`), never
//! edited in place, so concurrent readers always observe a complete list.
//!
//! ## Single-flight
//!
//! Rebuilds serialize on a mutex scoped to this enumerator instance, not
//! process-wide, so independent enumerators (e.g. in tests) never serialize
//! against each other. A caller that arrives while a rebuild is in flight
//! waits on the same lock and reuses that rebuild's snapshot instead of
//! triggering a second fetch.

use std::collections::HashMap;
use std::sync::Arc;

use arc_swap::ArcSwapOption;
use tokio::sync::Mutex;
use tracing::debug;

use crate::config::AutocertConfig;
use crate::error::Result;
use crate::request::DomainCertRequest;
use crate::traits::DomainSource;

/// Aggregates static configuration and dynamic sources into cached
/// certificate requests
pub struct DomainEnumerator {
    /// Requests built from the static configuration, in config order
    static_requests: Vec<DomainCertRequest>,

    /// Dynamic contributors, queried on every rebuild
    sources: Vec<Arc<dyn DomainSource>>,

    /// Most recently aggregated snapshot; `None` until the first rebuild
    cache: ArcSwapOption<Vec<DomainCertRequest>>,

    /// Instance-scoped single-flight lock for rebuilds
    rebuild: Mutex<()>,
}

impl DomainEnumerator {
    /// Create an enumerator from configuration and dynamic sources
    pub fn new(config: &AutocertConfig, sources: Vec<Arc<dyn DomainSource>>) -> Result<Self> {
        Ok(Self {
            static_requests: config.static_requests()?,
            sources,
            cache: ArcSwapOption::const_empty(),
            rebuild: Mutex::new(()),
        })
    }

    /// Get the current certificate requests
    ///
    /// Returns the cached snapshot when one exists and `refresh` is false.
    /// Otherwise rebuilds: static groups first, then each source's
    /// contribution, merged by grouping key (the primary domain) so names
    /// never bleed between requests with different keys.
    ///
    /// # Failure Semantics
    ///
    /// A failing source fails the whole call; the previous snapshot is left
    /// untouched.
    pub async fn domains(&self, refresh: bool) -> Result<Arc<Vec<DomainCertRequest>>> {
        if !refresh && let Some(snapshot) = self.cache.load_full() {
            return Ok(snapshot);
        }

        let observed = self.cache.load_full();
        let _guard = self.rebuild.lock().await;

        // A rebuild that finished while we waited for the lock satisfies
        // this call; only the caller that got the lock first fetches.
        if let Some(snapshot) = self.cache.load_full() {
            let fresh = match &observed {
                Some(previous) => !Arc::ptr_eq(previous, &snapshot),
                None => true,
            };
            if fresh || !refresh {
                return Ok(snapshot);
            }
        }

        debug!(sources = self.sources.len(), "rebuilding domain request list");

        let mut order: Vec<String> = Vec::new();
        let mut merged: HashMap<String, DomainCertRequest> = HashMap::new();

        for request in &self.static_requests {
            Self::merge(&mut order, &mut merged, request.clone());
        }

        for source in &self.sources {
            debug!(source = source.name(), "loading domains from source");
            for request in source.domains().await? {
                Self::merge(&mut order, &mut merged, request);
            }
        }

        let snapshot = Arc::new(
            order
                .iter()
                .filter_map(|key| merged.remove(key))
                .collect::<Vec<_>>(),
        );
        self.cache.store(Some(Arc::clone(&snapshot)));

        Ok(snapshot)
    }

    /// Drop the cached snapshot so the next call rebuilds
    pub fn invalidate(&self) {
        self.cache.store(None);
    }

    /// Merge one request into the accumulator, unioning names on key collision
    fn merge(
        order: &mut Vec<String>,
        merged: &mut HashMap<String, DomainCertRequest>,
        request: DomainCertRequest,
    ) {
        let key = request.grouping_key().to_string();
        match merged.get_mut(&key) {
            Some(existing) => existing.merge(&request),
            None => {
                order.push(key.clone());
                merged.insert(key, request);
            }
        }
    }
}

impl std::fmt::Debug for DomainEnumerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DomainEnumerator")
            .field("static_requests", &self.static_requests.len())
            .field("sources", &self.sources.len())
            .field("cached", &self.cache.load().is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DomainGroupConfig;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingSource {
        requests: Vec<DomainCertRequest>,
        calls: AtomicUsize,
    }

    impl CountingSource {
        fn new(requests: Vec<DomainCertRequest>) -> Arc<Self> {
            Arc::new(Self {
                requests,
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl DomainSource for CountingSource {
        async fn domains(&self) -> Result<Vec<DomainCertRequest>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.requests.clone())
        }

        fn name(&self) -> &'static str {
            "counting"
        }
    }

    fn config_with(primary: &str, alternates: &[&str]) -> AutocertConfig {
        let mut config = AutocertConfig::default();
        config.domain_groups.push(
            DomainGroupConfig::new(primary)
                .with_alternates(alternates.iter().map(|a| a.to_string())),
        );
        config
    }

    #[tokio::test]
    async fn static_groups_become_requests() {
        let config = config_with("example.com", &["www.example.com"]);
        let enumerator = DomainEnumerator::new(&config, Vec::new()).unwrap();

        let requests = enumerator.domains(false).await.unwrap();
        assert_eq!(requests.len(), 1);
        assert_eq!(
            requests[0].domains(),
            vec!["example.com", "www.example.com"]
        );
    }

    #[tokio::test]
    async fn source_contributions_merge_by_primary() {
        let config = config_with("example.com", &["www.example.com"]);
        let source = CountingSource::new(vec![
            DomainCertRequest::group("example.com", vec!["api.example.com".to_string()]).unwrap(),
            DomainCertRequest::single("other.org").unwrap(),
        ]);
        let enumerator = DomainEnumerator::new(&config, vec![source]).unwrap();

        let requests = enumerator.domains(false).await.unwrap();
        assert_eq!(requests.len(), 2);
        assert_eq!(
            requests[0].domains(),
            vec!["example.com", "api.example.com", "www.example.com"]
        );
        assert_eq!(requests[1].domains(), vec!["other.org"]);
    }

    #[tokio::test]
    async fn cache_prevents_repeat_source_calls() {
        let source = CountingSource::new(vec![DomainCertRequest::single("a.example.com").unwrap()]);
        let enumerator =
            DomainEnumerator::new(&AutocertConfig::default(), vec![Arc::clone(&source) as _])
                .unwrap();

        let first = enumerator.domains(false).await.unwrap();
        let second = enumerator.domains(false).await.unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);

        enumerator.domains(true).await.unwrap();
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn invalidate_forces_rebuild() {
        let source = CountingSource::new(vec![DomainCertRequest::single("a.example.com").unwrap()]);
        let enumerator =
            DomainEnumerator::new(&AutocertConfig::default(), vec![Arc::clone(&source) as _])
                .unwrap();

        enumerator.domains(false).await.unwrap();
        enumerator.invalidate();
        enumerator.domains(false).await.unwrap();

        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn source_failure_propagates() {
        struct FailingSource;

        #[async_trait]
        impl DomainSource for FailingSource {
            async fn domains(&self) -> Result<Vec<DomainCertRequest>> {
                Err(crate::Error::source("discovery endpoint unreachable"))
            }

            fn name(&self) -> &'static str {
                "failing"
            }
        }

        let enumerator =
            DomainEnumerator::new(&AutocertConfig::default(), vec![Arc::new(FailingSource) as _])
                .unwrap();

        assert!(enumerator.domains(false).await.is_err());
    }
}
