//! Capability interface to the remote key custodian.
//!
//! The custodian is the certificate-authority and key-management service
//! that holds private key material and signs digests on our behalf. The
//! local process only ever sees key metadata ([`KeyInfo`]) and signature
//! bytes; the wire protocol behind this trait is the custodian's own.

use thiserror::Error;

/// Signing algorithms the custodian accepts for a remote sign operation.
///
/// Each code pairs a digest family with a signature scheme; the local
/// engine picks one per algorithm name and never negotiates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SigningAlgorithm {
    Sha256RsaPkcs1V15,
    Sha512RsaPkcs1V15,
    EcdsaSha256,
    EcdsaSha384,
    EcdsaSha512,
}

impl SigningAlgorithm {
    /// The custodian-facing algorithm code.
    pub fn code(self) -> &'static str {
        match self {
            Self::Sha256RsaPkcs1V15 => "SHA_256_RSA_PKCS1_V1_5",
            Self::Sha512RsaPkcs1V15 => "SHA_512_RSA_PKCS1_V1_5",
            Self::EcdsaSha256 => "ECDSA_SHA_256",
            Self::EcdsaSha384 => "ECDSA_SHA_384",
            Self::EcdsaSha512 => "ECDSA_SHA_512",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "SHA_256_RSA_PKCS1_V1_5" => Some(Self::Sha256RsaPkcs1V15),
            "SHA_512_RSA_PKCS1_V1_5" => Some(Self::Sha512RsaPkcs1V15),
            "ECDSA_SHA_256" => Some(Self::EcdsaSha256),
            "ECDSA_SHA_384" => Some(Self::EcdsaSha384),
            "ECDSA_SHA_512" => Some(Self::EcdsaSha512),
            _ => None,
        }
    }
}

/// Metadata describing a custodian-held key. Never contains key material.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyInfo {
    /// Key algorithm family as reported by the custodian ("RSA", "ECDSA").
    pub algorithm: String,
    /// Custodian key identifier, unique within the vault.
    pub key_id: String,
    /// Human-readable display name.
    pub display_name: String,
    /// Key length in bits.
    pub key_length: u32,
}

#[derive(Debug, Error)]
pub enum CustodianError {
    #[error("custodian connection failed: {0}")]
    ConnectionFailed(String),
    #[error("custodian send failed: {0}")]
    SendFailed(String),
    #[error("custodian receive failed: {0}")]
    ReceiveFailed(String),
    #[error("custodian rejected request: {0}")]
    Rejected(String),
    #[error("custodian invalid response: {0}")]
    InvalidResponse(String),
}

/// Blocking client interface to the custodian.
///
/// Every method is one network round trip made on the caller's thread.
/// Lookup misses are `Ok(None)` / empty rather than errors; errors mean
/// the custodian could not be reached or refused the request.
pub trait KeyCustodianClient: Send + Sync {
    /// Aliases published by the configured certificate authority.
    fn authority_aliases(&self) -> Result<Vec<String>, CustodianError>;

    /// DER-encoded certificate of the given authority, if it has one.
    fn fetch_certificate(&self, authority_id: &str) -> Result<Option<Vec<u8>>, CustodianError>;

    /// Key metadata resolved through the authority record: the authority
    /// names its key identifier and the custodian returns that key.
    fn fetch_key(&self, authority_id: &str) -> Result<Option<KeyInfo>, CustodianError>;

    /// Key metadata fetched directly by key identifier.
    fn fetch_key_by_id(&self, key_id: &str) -> Result<Option<KeyInfo>, CustodianError>;

    /// Exchange a locally computed digest for a signature.
    ///
    /// `base64_digest` is the standard-base64 encoding of the raw digest;
    /// the returned bytes are the decoded signature.
    fn remote_sign(
        &self,
        digest_name: &str,
        base64_digest: &str,
        algorithm: SigningAlgorithm,
        key_id: &str,
    ) -> Result<Vec<u8>, CustodianError>;
}
