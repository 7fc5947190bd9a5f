//! Configuration types for the certificate lifecycle system
//!
//! This module defines all configuration structures used throughout the crate.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::request::{DomainCertRequest, normalize_domain};

/// Main lifecycle configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutocertConfig {
    /// Statically configured domain groups; each group is one certificate
    /// request with the first entry as the certificate subject
    #[serde(default)]
    pub domain_groups: Vec<DomainGroupConfig>,

    /// Renewal scheduling; unset fields disable automatic renewal
    #[serde(default)]
    pub renewal: RenewalConfig,

    /// Challenge types the issuance exchange may answer with
    #[serde(default = "default_allowed_challenges")]
    pub allowed_challenges: Vec<ChallengeType>,

    /// Optional engine settings
    #[serde(default)]
    pub engine: EngineConfig,
}

impl AutocertConfig {
    /// Create a new configuration with defaults
    pub fn new() -> Self {
        Self {
            domain_groups: Vec::new(),
            renewal: RenewalConfig::default(),
            allowed_challenges: default_allowed_challenges(),
            engine: EngineConfig::default(),
        }
    }

    /// Validate the configuration
    ///
    /// Static domain groups may be empty when dynamic sources supply the
    /// domains, so emptiness alone is not an error here.
    pub fn validate(&self) -> Result<(), crate::Error> {
        for group in &self.domain_groups {
            group.validate()?;
        }
        self.renewal.validate()?;

        if self.allowed_challenges.is_empty() {
            return Err(crate::Error::config(
                "at least one challenge type must be allowed",
            ));
        }

        Ok(())
    }

    /// Build the static certificate requests from the configured groups
    pub fn static_requests(&self) -> Result<Vec<DomainCertRequest>, crate::Error> {
        self.domain_groups
            .iter()
            .map(DomainGroupConfig::to_request)
            .collect()
    }
}

impl Default for AutocertConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// One statically configured certificate request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DomainGroupConfig {
    /// Domain assigned the certificate subject
    pub primary: String,

    /// Additional names covered by the same certificate
    #[serde(default)]
    pub alternates: Vec<String>,
}

impl DomainGroupConfig {
    /// Create a group for a single domain
    pub fn new(primary: impl Into<String>) -> Self {
        Self {
            primary: primary.into(),
            alternates: Vec::new(),
        }
    }

    /// Add alternate names to the group
    pub fn with_alternates(mut self, alternates: impl IntoIterator<Item = String>) -> Self {
        self.alternates.extend(alternates);
        self
    }

    /// Validate the group's domain names
    pub fn validate(&self) -> Result<(), crate::Error> {
        normalize_domain(self.primary.clone())?;
        for alternate in &self.alternates {
            normalize_domain(alternate.clone())?;
        }
        Ok(())
    }

    /// Convert into a normalized certificate request
    pub fn to_request(&self) -> Result<DomainCertRequest, crate::Error> {
        DomainCertRequest::group(self.primary.clone(), self.alternates.iter().cloned())
    }
}

/// Renewal scheduling configuration
///
/// Both fields must be set for automatic renewal; if either is unset the
/// lifecycle performs initial acquisition and then stops.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RenewalConfig {
    /// How often to scan certificates for upcoming expiry (in seconds)
    #[serde(default)]
    pub check_period_secs: Option<u64>,

    /// Renew certificates expiring within this many days
    #[serde(default)]
    pub renew_days_in_advance: Option<u32>,
}

impl RenewalConfig {
    /// Validate the renewal settings
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.check_period_secs == Some(0) {
            return Err(crate::Error::config("renewal check period must be > 0"));
        }
        if self.renew_days_in_advance == Some(0) {
            return Err(crate::Error::config("renew days in advance must be > 0"));
        }
        Ok(())
    }

    /// The check period as a [`Duration`], when configured
    pub fn check_period(&self) -> Option<Duration> {
        self.check_period_secs.map(Duration::from_secs)
    }

    /// True when both scheduling knobs are configured
    pub fn is_configured(&self) -> bool {
        self.check_period_secs.is_some() && self.renew_days_in_advance.is_some()
    }
}

/// ACME domain-validation challenge types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChallengeType {
    /// Answered over plain HTTP at the well-known path
    #[serde(rename = "http-01")]
    Http01,
    /// Answered inside the TLS handshake's protocol negotiation
    #[serde(rename = "tls-alpn-01")]
    TlsAlpn01,
}

/// Engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Capacity of the internal lifecycle event channel
    ///
    /// When full, new events are dropped (with a warning log) rather than
    /// blocking the lifecycle task.
    #[serde(default = "default_event_channel_capacity")]
    pub event_channel_capacity: usize,

    /// Minimum settling delay for a persistence fan-out (in seconds)
    ///
    /// The overall save is not considered complete before this floor
    /// elapses, decoupling caller-observed latency from the fastest
    /// repository. All repositories receive their save attempt regardless.
    #[serde(default = "default_save_settle_floor_secs")]
    pub save_settle_floor_secs: u64,
}

impl EngineConfig {
    /// The settling floor as a [`Duration`]
    pub fn save_settle_floor(&self) -> Duration {
        Duration::from_secs(self.save_settle_floor_secs)
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            event_channel_capacity: default_event_channel_capacity(),
            save_settle_floor_secs: default_save_settle_floor_secs(),
        }
    }
}

fn default_allowed_challenges() -> Vec<ChallengeType> {
    vec![ChallengeType::Http01]
}

fn default_event_channel_capacity() -> usize {
    1000
}

fn default_save_settle_floor_secs() -> u64 {
    300
}
