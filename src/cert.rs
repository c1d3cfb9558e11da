//! Certificate records and PEM/DER handling.
//!
//! Certificates are immutable once fetched; a refresh replaces the whole
//! record. Parsing failures are reported to the caller, which skips the
//! entry instead of aborting its load.

use std::time::SystemTime;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use thiserror::Error;
use x509_parser::prelude::*;

const PEM_BEGIN: &str = "-----BEGIN CERTIFICATE-----";
const PEM_END: &str = "-----END CERTIFICATE-----";

#[derive(Debug, Error)]
pub enum CertificateError {
    #[error("missing PEM armor")]
    MissingArmor,
    #[error("invalid base64 in PEM body: {0}")]
    InvalidBase64(String),
    #[error("certificate failed to parse: {0}")]
    Malformed(String),
}

/// One X.509 certificate filed under an alias.
#[derive(Debug, Clone)]
pub struct CertificateRecord {
    alias: String,
    der: Vec<u8>,
    subject: String,
    created_at: SystemTime,
}

impl CertificateRecord {
    /// Validate DER bytes and file them under `alias`.
    pub fn parse(alias: impl Into<String>, der: Vec<u8>) -> Result<Self, CertificateError> {
        let (_, parsed) = X509Certificate::from_der(&der)
            .map_err(|e| CertificateError::Malformed(format!("{e:?}")))?;
        let subject = parsed.subject().to_string();
        Ok(Self {
            alias: alias.into(),
            der,
            subject,
            created_at: SystemTime::now(),
        })
    }

    pub fn alias(&self) -> &str {
        &self.alias
    }

    pub fn der(&self) -> &[u8] {
        &self.der
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }

    pub fn created_at(&self) -> SystemTime {
        self.created_at
    }
}

/// Decode the first CERTIFICATE block of a PEM document to DER.
///
/// Mirrors the custodian's bundle format: armor lines around a base64
/// body, with arbitrary line breaks.
pub fn pem_to_der(pem: &str) -> Result<Vec<u8>, CertificateError> {
    let start = pem.find(PEM_BEGIN).ok_or(CertificateError::MissingArmor)?;
    let body = &pem[start + PEM_BEGIN.len()..];
    let end = body.find(PEM_END).ok_or(CertificateError::MissingArmor)?;
    let encoded: String = body[..end].chars().filter(|c| !c.is_whitespace()).collect();
    BASE64
        .decode(encoded.as_bytes())
        .map_err(|e| CertificateError::InvalidBase64(e.to_string()))
}
