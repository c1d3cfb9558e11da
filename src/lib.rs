//! Alias-indexed TLS credential store over a remote key custodian.
//!
//! Private keys never enter this process. The store merges certificates
//! published by a vault certificate authority with an optional locally
//! supplied certificate, hands out [`RemoteKeyHandle`]s that carry key
//! identity only, and the [`SigningEngine`] exchanges locally computed
//! digests for signatures produced inside the custodian.
//!
//! Everything is blocking and synchronous; network calls run on the
//! caller's thread with the configured timeout.

pub mod cert;
pub mod client;
pub mod config;
pub mod custodian;
pub mod handle;
pub mod manager;
pub mod signature;
pub mod source;
pub mod store;
pub mod wire;

pub use cert::{CertificateError, CertificateRecord};
pub use client::TcpCustodianClient;
pub use config::{AuthMode, ConfigError, VaultConfig};
pub use custodian::{CustodianError, KeyCustodianClient, KeyInfo, SigningAlgorithm};
pub use handle::{PrivateKey, RemoteKeyHandle, ENCODED_PLACEHOLDER_LEN};
pub use manager::KeyManager;
pub use signature::{find_algorithm, EngineState, SignatureError, SigningEngine};
pub use source::{CredentialSource, LocalCertificateSource, VaultAuthoritySource};
pub use store::CredentialStore;
