//! Certificate request grouping
//!
//! A [`DomainCertRequest`] is one certificate order: a primary domain that
//! becomes the certificate subject plus optional alternate names. Requests
//! are normalized to ASCII lowercase at construction so every later lookup
//! is case-insensitive, and names within one request are unique.
//!
//! Two requests merge only when they share the same grouping key (the
//! lowercased primary domain); names never bleed between requests with
//! different keys.

use std::collections::BTreeSet;

use crate::error::{Error, Result};

/// A single certificate request covering one or more domain names
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DomainCertRequest {
    /// A certificate for exactly one domain
    Single {
        /// The only domain; also the certificate subject
        domain: String,
    },

    /// A certificate for a primary domain plus alternate names
    Group {
        /// The domain assigned the certificate subject
        primary: String,
        /// Additional names, sorted; never contains the primary
        alternates: BTreeSet<String>,
    },
}

impl DomainCertRequest {
    /// Create a request for a single domain
    pub fn single(domain: impl Into<String>) -> Result<Self> {
        let domain = normalize_domain(domain.into())?;
        Ok(Self::Single { domain })
    }

    /// Create a request for a primary domain plus alternates
    ///
    /// Alternates equal to the primary (case-insensitively) are dropped; a
    /// group left with no alternates collapses to [`DomainCertRequest::Single`].
    pub fn group(
        primary: impl Into<String>,
        alternates: impl IntoIterator<Item = String>,
    ) -> Result<Self> {
        let primary = normalize_domain(primary.into())?;

        let mut names = BTreeSet::new();
        for alternate in alternates {
            let alternate = normalize_domain(alternate)?;
            if alternate != primary {
                names.insert(alternate);
            }
        }

        if names.is_empty() {
            Ok(Self::Single { domain: primary })
        } else {
            Ok(Self::Group {
                primary,
                alternates: names,
            })
        }
    }

    /// Create a request from an ordered name list; the first name is primary
    pub fn from_names(names: &[String]) -> Result<Self> {
        let (primary, rest) = names
            .split_first()
            .ok_or_else(|| Error::invalid_input("certificate request needs at least one domain"))?;
        Self::group(primary.clone(), rest.iter().cloned())
    }

    /// The domain used as the certificate subject
    pub fn primary(&self) -> &str {
        match self {
            Self::Single { domain } => domain,
            Self::Group { primary, .. } => primary,
        }
    }

    /// All domains in deterministic order: primary first, then sorted alternates
    pub fn domains(&self) -> Vec<&str> {
        match self {
            Self::Single { domain } => vec![domain.as_str()],
            Self::Group {
                primary,
                alternates,
            } => {
                let mut all = Vec::with_capacity(1 + alternates.len());
                all.push(primary.as_str());
                all.extend(alternates.iter().map(String::as_str));
                all
            }
        }
    }

    /// Number of distinct domains in this request
    pub fn len(&self) -> usize {
        match self {
            Self::Single { .. } => 1,
            Self::Group { alternates, .. } => 1 + alternates.len(),
        }
    }

    /// Always false: a request holds at least one domain by construction
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Check whether a name is covered by this request (case-insensitive)
    pub fn contains(&self, name: &str) -> bool {
        let name = name.to_ascii_lowercase();
        match self {
            Self::Single { domain } => *domain == name,
            Self::Group {
                primary,
                alternates,
            } => *primary == name || alternates.contains(&name),
        }
    }

    /// Grouping key for batch merges: the lowercased primary domain
    pub fn grouping_key(&self) -> &str {
        self.primary()
    }

    /// Union another request's names into this one
    ///
    /// Only valid for requests sharing the same grouping key; callers merge
    /// per-key, so mismatched keys are a logic error.
    pub(crate) fn merge(&mut self, other: &DomainCertRequest) {
        debug_assert_eq!(self.grouping_key(), other.grouping_key());

        let primary = self.primary().to_string();
        let mut alternates = match self {
            Self::Single { .. } => BTreeSet::new(),
            Self::Group { alternates, .. } => std::mem::take(alternates),
        };

        for name in other.domains() {
            if name != primary {
                alternates.insert(name.to_string());
            }
        }

        *self = if alternates.is_empty() {
            Self::Single { domain: primary }
        } else {
            Self::Group {
                primary,
                alternates,
            }
        };
    }
}

/// Lowercase and validate a domain name
///
/// Accepts registered names and wildcard names with a single leading `*.`
/// label. Rejects empty names, whitespace, and characters outside the
/// LDH (letters, digits, hyphen) plus dot set.
pub fn normalize_domain(name: String) -> Result<String> {
    let name = name.trim().to_ascii_lowercase();

    if name.is_empty() {
        return Err(Error::invalid_input("domain name cannot be empty"));
    }
    if name.len() > 253 {
        return Err(Error::invalid_input(format!(
            "domain name too long ({} chars): {}",
            name.len(),
            name
        )));
    }

    let host = name.strip_prefix("*.").unwrap_or(&name);
    if host.is_empty() || host.contains('*') {
        return Err(Error::invalid_input(format!(
            "invalid wildcard domain: {name}"
        )));
    }

    for label in host.split('.') {
        if label.is_empty() || label.len() > 63 {
            return Err(Error::invalid_input(format!(
                "invalid domain label in: {name}"
            )));
        }
        if !label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
            return Err(Error::invalid_input(format!(
                "domain contains invalid characters: {name}"
            )));
        }
        if label.starts_with('-') || label.ends_with('-') {
            return Err(Error::invalid_input(format!(
                "domain label cannot start or end with a hyphen: {name}"
            )));
        }
    }

    Ok(name)
}
