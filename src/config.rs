//! Store configuration: authority identity, custodian endpoint, and the
//! optional locally supplied certificate.
//!
//! All settings are explicit constructor inputs; nothing is read from
//! global state after construction.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// How the transport authenticates to the custodian.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthMode {
    /// Ambient identity of the host (instance principal or equivalent);
    /// no credential material is sent from local storage.
    DelegatedIdentity,
    /// Credentials read from the given file at client construction.
    CredentialsFile(PathBuf),
}

/// Configuration for one credential store.
#[derive(Debug, Clone)]
pub struct VaultConfig {
    /// Identifier of the certificate authority backing the store.
    pub authority_id: String,
    /// Custodian network endpoint, `host:port`.
    pub endpoint: String,
    /// Optional separately signed certificate to merge into the alias
    /// namespace alongside the authority's own entries.
    pub local_cert_path: Option<PathBuf>,
    /// Custodian key identifier for the local certificate's key.
    pub local_key_id: Option<String>,
    pub auth_mode: AuthMode,
    /// Per-round-trip socket timeout (connect, read, write).
    pub timeout: Duration,
}

impl VaultConfig {
    pub fn new(authority_id: impl Into<String>, endpoint: impl Into<String>) -> Self {
        Self {
            authority_id: authority_id.into(),
            endpoint: endpoint.into(),
            local_cert_path: None,
            local_key_id: None,
            auth_mode: AuthMode::DelegatedIdentity,
            timeout: Duration::from_secs(5),
        }
    }

    /// Load configuration from environment variables.
    ///
    /// `VAULT_AUTHORITY_ID` and `VAULT_ENDPOINT` are required.
    /// `VAULT_CERT_FILE`, `VAULT_KEY_ID`, `VAULT_AUTH_MODE`
    /// (`delegated` | `credentials-file`), `VAULT_CREDENTIALS_FILE` and
    /// `VAULT_TIMEOUT_MS` are optional.
    pub fn from_env() -> Result<Self, ConfigError> {
        let authority_id = std::env::var("VAULT_AUTHORITY_ID")
            .map_err(|_| ConfigError::MissingValue("VAULT_AUTHORITY_ID"))?;
        let endpoint = std::env::var("VAULT_ENDPOINT")
            .map_err(|_| ConfigError::MissingValue("VAULT_ENDPOINT"))?;

        let mut config = Self::new(authority_id, endpoint);

        if let Ok(path) = std::env::var("VAULT_CERT_FILE") {
            config.local_cert_path = Some(PathBuf::from(path));
        }
        if let Ok(key_id) = std::env::var("VAULT_KEY_ID") {
            config.local_key_id = Some(key_id);
        }
        if let Ok(mode) = std::env::var("VAULT_AUTH_MODE") {
            config.auth_mode = parse_auth_mode(&mode)?;
        }
        if let Ok(ms) = std::env::var("VAULT_TIMEOUT_MS") {
            let ms: u64 = ms
                .parse()
                .map_err(|_| ConfigError::InvalidValue("VAULT_TIMEOUT_MS"))?;
            config.timeout = Duration::from_millis(ms);
        }

        Ok(config)
    }
}

fn parse_auth_mode(mode: &str) -> Result<AuthMode, ConfigError> {
    match mode {
        "delegated" => Ok(AuthMode::DelegatedIdentity),
        "credentials-file" => {
            let path = std::env::var("VAULT_CREDENTIALS_FILE")
                .map_err(|_| ConfigError::MissingValue("VAULT_CREDENTIALS_FILE"))?;
            Ok(AuthMode::CredentialsFile(PathBuf::from(path)))
        }
        _ => Err(ConfigError::InvalidValue("VAULT_AUTH_MODE")),
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required value for {0}")]
    MissingValue(&'static str),
    #[error("invalid value for {0}")]
    InvalidValue(&'static str),
    #[error("file not found: {0}")]
    FileNotFound(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = VaultConfig::new("ocid1.certificateauthority.test", "kms.example.com:7000");
        assert_eq!(config.authority_id, "ocid1.certificateauthority.test");
        assert_eq!(config.endpoint, "kms.example.com:7000");
        assert!(config.local_cert_path.is_none());
        assert!(config.local_key_id.is_none());
        assert_eq!(config.auth_mode, AuthMode::DelegatedIdentity);
        assert_eq!(config.timeout, Duration::from_secs(5));
    }

    #[test]
    fn auth_mode_parsing() {
        assert_eq!(parse_auth_mode("delegated").unwrap(), AuthMode::DelegatedIdentity);
        assert!(matches!(
            parse_auth_mode("kerberos"),
            Err(ConfigError::InvalidValue("VAULT_AUTH_MODE"))
        ));
    }
}
