//! Certificate records and metadata extraction
//!
//! A [`CertificateRecord`] carries the opaque PEM material (chain + private
//! key) together with the metadata the lifecycle needs to make decisions:
//! covered names, expiry, thumbprint, and whether the certificate is a
//! short-lived challenge certificate or a production one.
//!
//! Metadata is derived once, at construction, by parsing the leaf
//! certificate; the store and the selection path never touch DER again.

use chrono::{DateTime, TimeZone, Utc};
use sha2::{Digest, Sha256};
use x509_parser::pem::Pem;
use x509_parser::prelude::*;
use x509_parser::time::ASN1Time;

use crate::error::{Error, Result};

/// Distinguishes production certificates from validation-only ones
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CertificateKind {
    /// A certificate meant to serve regular TLS traffic
    Production,
    /// A short-lived certificate answering a TLS-ALPN-01 validation probe
    Challenge,
}

/// A certificate plus the metadata derived from its leaf
#[derive(Debug, Clone)]
pub struct CertificateRecord {
    /// PEM-encoded chain, leaf first
    chain_pem: String,
    /// PEM-encoded private key for the leaf
    key_pem: String,
    /// Leaf subject distinguished name
    subject: String,
    /// Names the certificate covers: CN plus DNS SANs, lowercased
    names: Vec<String>,
    /// Leaf expiry
    not_after: DateTime<Utc>,
    /// Lowercase hex SHA-256 of the leaf DER
    thumbprint: String,
    /// Leaf subject equals leaf issuer
    self_signed: bool,
    kind: CertificateKind,
}

impl CertificateRecord {
    /// Build a record by parsing a PEM chain and its private key
    ///
    /// The first certificate block is treated as the leaf; the rest are
    /// kept as issuer material for [`CertificateRecord::validate_chain`].
    pub fn from_pem(
        chain_pem: impl Into<String>,
        key_pem: impl Into<String>,
        kind: CertificateKind,
    ) -> Result<Self> {
        let chain_pem = chain_pem.into();
        let key_pem = key_pem.into();

        let ders = decode_chain(&chain_pem)?;
        let leaf = ders
            .first()
            .ok_or_else(|| Error::parse("no certificate block in PEM chain"))?;

        let (_, x509) = parse_x509_certificate(leaf)
            .map_err(|e| Error::parse(format!("failed to parse leaf certificate: {e}")))?;

        let subject = x509.subject().to_string();
        let self_signed = x509.subject().as_raw() == x509.issuer().as_raw();
        let not_after = asn1_to_utc(&x509.validity().not_after)?;
        let names = dns_names(&x509);

        if names.is_empty() {
            return Err(Error::parse(format!(
                "certificate has no usable DNS names: {subject}"
            )));
        }

        let thumbprint = hex::encode(Sha256::digest(leaf));

        Ok(Self {
            chain_pem,
            key_pem,
            subject,
            names,
            not_after,
            thumbprint,
            self_signed,
            kind,
        })
    }

    /// PEM chain, leaf first
    pub fn chain_pem(&self) -> &str {
        &self.chain_pem
    }

    /// PEM private key for the leaf
    pub fn key_pem(&self) -> &str {
        &self.key_pem
    }

    /// Leaf subject distinguished name
    pub fn subject(&self) -> &str {
        &self.subject
    }

    /// All names the certificate covers, lowercased
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Leaf expiry timestamp
    pub fn not_after(&self) -> DateTime<Utc> {
        self.not_after
    }

    /// Lowercase hex SHA-256 of the leaf DER
    pub fn thumbprint(&self) -> &str {
        &self.thumbprint
    }

    /// True when the leaf's issuer equals its subject
    pub fn is_self_signed(&self) -> bool {
        self.self_signed
    }

    /// Production or challenge certificate
    pub fn kind(&self) -> CertificateKind {
        self.kind
    }

    /// True for a validation-only challenge certificate
    pub fn is_challenge(&self) -> bool {
        self.kind == CertificateKind::Challenge
    }

    /// Check whether the certificate expires within `days` days from now
    pub fn expires_within(&self, days: u32) -> bool {
        self.not_after <= Utc::now() + chrono::Duration::days(i64::from(days))
    }

    /// Walk the stored chain and verify issuer/subject linkage
    ///
    /// Revocation is never checked; the point is to surface a broken or
    /// incomplete chain at storage time rather than at the first handshake.
    /// Callers treat a failure as a warning only.
    pub fn validate_chain(&self) -> Result<()> {
        let ders = decode_chain(&self.chain_pem)?;

        let mut parsed = Vec::with_capacity(ders.len());
        for der in &ders {
            let (_, cert) = parse_x509_certificate(der)
                .map_err(|e| Error::chain(format!("unparseable chain certificate: {e}")))?;
            parsed.push(cert);
        }

        if parsed.len() == 1 && !self.self_signed {
            return Err(Error::chain(format!(
                "no issuer certificate present for {}",
                self.subject
            )));
        }

        for pair in parsed.windows(2) {
            let (child, issuer) = (&pair[0], &pair[1]);
            if child.issuer().as_raw() != issuer.subject().as_raw() {
                return Err(Error::chain(format!(
                    "{} is not issued by the next certificate in the chain ({})",
                    child.subject(),
                    issuer.subject()
                )));
            }

            let issuer_not_after = asn1_to_utc(&issuer.validity().not_after)?;
            if issuer_not_after <= Utc::now() {
                return Err(Error::chain(format!(
                    "issuer certificate expired: {}",
                    issuer.subject()
                )));
            }
        }

        Ok(())
    }
}

/// Decode every CERTIFICATE block of a PEM bundle into DER
fn decode_chain(chain_pem: &str) -> Result<Vec<Vec<u8>>> {
    let mut ders = Vec::new();
    for pem in Pem::iter_from_buffer(chain_pem.as_bytes()) {
        let pem = pem.map_err(|e| Error::parse(format!("invalid PEM block: {e}")))?;
        if pem.label == "CERTIFICATE" {
            ders.push(pem.contents);
        }
    }
    Ok(ders)
}

/// Collect the CN and every DNS subject-alternative name, lowercased
fn dns_names(cert: &X509Certificate<'_>) -> Vec<String> {
    let mut names = Vec::new();

    if let Some(cn) = cert.subject().iter_common_name().next()
        && let Ok(cn) = cn.as_str()
    {
        push_unique(&mut names, cn);
    }

    let san = cert
        .extensions()
        .iter()
        .find(|ext| ext.oid == x509_parser::oid_registry::OID_X509_EXT_SUBJECT_ALT_NAME);

    if let Some(san) = san
        && let ParsedExtension::SubjectAlternativeName(san) = san.parsed_extension()
    {
        for name in &san.general_names {
            if let GeneralName::DNSName(dns) = name {
                push_unique(&mut names, dns);
            }
        }
    }

    names
}

fn push_unique(names: &mut Vec<String>, candidate: &str) {
    let candidate = candidate.to_ascii_lowercase();
    if !names.contains(&candidate) {
        names.push(candidate);
    }
}

fn asn1_to_utc(time: &ASN1Time) -> Result<DateTime<Utc>> {
    Utc.timestamp_opt(time.timestamp(), 0)
        .single()
        .ok_or_else(|| Error::parse("certificate validity outside representable time range"))
}
