//! Keyless signing engine.
//!
//! The engine accumulates a digest locally and exchanges it for a
//! signature computed by the custodian; no private key material is ever
//! present. Sign-only by design: there is no local public/private pair
//! to verify against, so verification and parameter handling fail loudly
//! as unsupported.
//!
//! State machine per operation:
//!   Uninitialized -> SignReady -> Accumulating -> Signed | Failed
//! A finished engine is reusable only by re-entering `init_sign`.

use std::sync::Arc;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use sha2::{Digest, Sha256, Sha384, Sha512};
use thiserror::Error;
use tracing::warn;

use crate::custodian::{KeyCustodianClient, SigningAlgorithm};
use crate::handle::{PrivateKey, RemoteKeyHandle};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Uninitialized,
    SignReady,
    Accumulating,
    Signed,
    Failed,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SignatureError {
    #[error("unsupported operation: {0}")]
    UnsupportedOperation(&'static str),
    #[error("engine is not initialized for signing")]
    NotInitialized,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DigestKind {
    Sha256,
    Sha384,
    Sha512,
}

enum Accumulator {
    Sha256(Sha256),
    Sha384(Sha384),
    Sha512(Sha512),
}

impl Accumulator {
    fn new(kind: DigestKind) -> Self {
        match kind {
            DigestKind::Sha256 => Self::Sha256(Sha256::new()),
            DigestKind::Sha384 => Self::Sha384(Sha384::new()),
            DigestKind::Sha512 => Self::Sha512(Sha512::new()),
        }
    }

    fn update(&mut self, data: &[u8]) {
        match self {
            Self::Sha256(d) => d.update(data),
            Self::Sha384(d) => d.update(data),
            Self::Sha512(d) => d.update(data),
        }
    }

    fn finalize(self) -> Vec<u8> {
        match self {
            Self::Sha256(d) => d.finalize().to_vec(),
            Self::Sha384(d) => d.finalize().to_vec(),
            Self::Sha512(d) => d.finalize().to_vec(),
        }
    }
}

/// One signature-algorithm registry entry: the local digest, the
/// custodian digest token, and the custodian signing-algorithm code.
pub struct AlgorithmEntry {
    pub name: &'static str,
    digest: DigestKind,
    pub digest_token: &'static str,
    pub custodian_algorithm: SigningAlgorithm,
}

/// Every algorithm this provider offers. RSA and EC variants differ only
/// in these constants; the engine below is shared.
pub static ALGORITHMS: [AlgorithmEntry; 5] = [
    AlgorithmEntry {
        name: "SHA256withRSA",
        digest: DigestKind::Sha256,
        digest_token: "RS256",
        custodian_algorithm: SigningAlgorithm::Sha256RsaPkcs1V15,
    },
    AlgorithmEntry {
        name: "SHA512withRSA",
        digest: DigestKind::Sha512,
        digest_token: "RS512",
        custodian_algorithm: SigningAlgorithm::Sha512RsaPkcs1V15,
    },
    AlgorithmEntry {
        name: "SHA256withECDSA",
        digest: DigestKind::Sha256,
        digest_token: "ES256",
        custodian_algorithm: SigningAlgorithm::EcdsaSha256,
    },
    AlgorithmEntry {
        name: "SHA384withECDSA",
        digest: DigestKind::Sha384,
        digest_token: "ES384",
        custodian_algorithm: SigningAlgorithm::EcdsaSha384,
    },
    AlgorithmEntry {
        name: "SHA512withECDSA",
        digest: DigestKind::Sha512,
        digest_token: "ES512",
        custodian_algorithm: SigningAlgorithm::EcdsaSha512,
    },
];

pub fn find_algorithm(name: &str) -> Option<&'static AlgorithmEntry> {
    ALGORITHMS.iter().find(|entry| entry.name == name)
}

pub struct SigningEngine {
    algorithm: &'static AlgorithmEntry,
    state: EngineState,
    accumulator: Accumulator,
    key: Option<(String, Arc<dyn KeyCustodianClient>)>,
}

impl SigningEngine {
    /// Engine for the named algorithm, or `None` if it is not in the
    /// registry.
    pub fn new(algorithm_name: &str) -> Option<Self> {
        let algorithm = find_algorithm(algorithm_name)?;
        Some(Self {
            algorithm,
            state: EngineState::Uninitialized,
            accumulator: Accumulator::new(algorithm.digest),
            key: None,
        })
    }

    pub fn algorithm_name(&self) -> &'static str {
        self.algorithm.name
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    /// Bind the engine to a signing key. Only custodian-held keys are
    /// accepted; anything else is structurally unsupported because this
    /// engine never holds key material.
    pub fn init_sign(&mut self, key: &dyn PrivateKey) -> Result<(), SignatureError> {
        match key.as_any().downcast_ref::<RemoteKeyHandle>() {
            Some(handle) => {
                self.key = Some((handle.key_id().to_owned(), handle.custodian()));
                self.accumulator = Accumulator::new(self.algorithm.digest);
                self.state = EngineState::SignReady;
                Ok(())
            }
            None => {
                self.state = EngineState::Failed;
                Err(SignatureError::UnsupportedOperation(
                    "init_sign requires a custodian-held key handle",
                ))
            }
        }
    }

    /// Append message bytes to the local digest. Nothing is sent over
    /// the network per chunk; the exchange happens once, at `sign`.
    pub fn update(&mut self, data: &[u8]) -> Result<(), SignatureError> {
        match self.state {
            EngineState::SignReady | EngineState::Accumulating => {
                self.accumulator.update(data);
                self.state = EngineState::Accumulating;
                Ok(())
            }
            _ => Err(SignatureError::NotInitialized),
        }
    }

    /// Finalize the digest and exchange it for a signature.
    ///
    /// Returns the signature bytes on success. A remote failure yields
    /// an empty vector, never an error: callers must treat an empty
    /// signature as a hard failure.
    pub fn sign(&mut self) -> Result<Vec<u8>, SignatureError> {
        let (key_id, custodian) = match self.state {
            EngineState::SignReady | EngineState::Accumulating => {
                self.key.clone().ok_or(SignatureError::NotInitialized)?
            }
            _ => return Err(SignatureError::NotInitialized),
        };

        let accumulator =
            std::mem::replace(&mut self.accumulator, Accumulator::new(self.algorithm.digest));
        let encoded = BASE64.encode(accumulator.finalize());

        match custodian.remote_sign(
            self.algorithm.digest_token,
            &encoded,
            self.algorithm.custodian_algorithm,
            &key_id,
        ) {
            Ok(signature) if !signature.is_empty() => {
                self.state = EngineState::Signed;
                Ok(signature)
            }
            Ok(_) => {
                warn!(algorithm = self.algorithm.name, key_id = %key_id, "custodian returned an empty signature");
                self.state = EngineState::Failed;
                Ok(Vec::new())
            }
            Err(e) => {
                warn!(algorithm = self.algorithm.name, key_id = %key_id, error = %e, "remote sign failed");
                self.state = EngineState::Failed;
                Ok(Vec::new())
            }
        }
    }

    /// Unsupported: keyless custodianship leaves nothing local to verify
    /// against.
    pub fn verify(&self, _signature: &[u8]) -> Result<bool, SignatureError> {
        Err(SignatureError::UnsupportedOperation("verify"))
    }

    pub fn set_parameter(&mut self, _name: &str, _value: &str) -> Result<(), SignatureError> {
        Err(SignatureError::UnsupportedOperation("set_parameter"))
    }

    pub fn parameter(&self, _name: &str) -> Result<String, SignatureError> {
        Err(SignatureError::UnsupportedOperation("get_parameter"))
    }
}
