//! HTTP-01 challenge response store
//!
//! Holds the token -> key-authorization mapping an external HTTP responder
//! serves at `/.well-known/acme-challenge/<token>` while domain validation
//! is in flight. The responder itself lives outside this crate; only the
//! store is provided here.

use std::sync::Arc;

use dashmap::DashMap;
use tracing::{debug, trace};

/// Well-known path prefix for HTTP-01 validation probes
pub const HTTP_CHALLENGE_PATH_PREFIX: &str = "/.well-known/acme-challenge/";

/// Concurrent token -> response store for pending HTTP-01 challenges
///
/// Clones share the same underlying map, so the acquirer side and the HTTP
/// responder side can hold their own handles.
#[derive(Debug, Default)]
pub struct ChallengeResponseStore {
    responses: Arc<DashMap<String, String>>,
}

impl ChallengeResponseStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the response for a pending challenge token
    pub fn add_response(&self, token: impl Into<String>, response: impl Into<String>) {
        let token = token.into();
        debug!(token = %token, "registering http-01 challenge response");
        self.responses.insert(token, response.into());
    }

    /// Look up the response for a token, if the challenge is pending
    pub fn response(&self, token: &str) -> Option<String> {
        let found = self.responses.get(token).map(|entry| entry.clone());
        if found.is_some() {
            trace!(token = %token, "challenge token found");
        } else {
            trace!(token = %token, "challenge token not found");
        }
        found
    }

    /// Drop a completed or expired challenge
    pub fn remove_response(&self, token: &str) {
        if self.responses.remove(token).is_some() {
            debug!(token = %token, "removed http-01 challenge response");
        }
    }

    /// Number of pending challenges
    pub fn pending_count(&self) -> usize {
        self.responses.len()
    }

    /// Extract the challenge token from a request path, if it is a probe
    pub fn token_from_path(path: &str) -> Option<&str> {
        path.strip_prefix(HTTP_CHALLENGE_PATH_PREFIX)
            .filter(|token| !token.is_empty())
    }
}

impl Clone for ChallengeResponseStore {
    fn clone(&self) -> Self {
        Self {
            responses: Arc::clone(&self.responses),
        }
    }
}
