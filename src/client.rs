//! Blocking TCP transport for the custodian interface.
//!
//! One connection per operation: connect, write the framed request, shut
//! down the write half, read the response to EOF. Connect, read and
//! write all carry the configured timeout so a dead custodian fails a
//! handshake instead of hanging it forever.

use std::io::{Read, Write};
use std::net::{Shutdown, TcpStream, ToSocketAddrs};
use std::time::Duration;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use tracing::debug;

use crate::cert;
use crate::config::{AuthMode, ConfigError, VaultConfig};
use crate::custodian::{CustodianError, KeyCustodianClient, KeyInfo, SigningAlgorithm};
use crate::wire::{self, AuthPreamble, Request, WireStatus, MAX_RESPONSE_BYTES};

/// Custodian client speaking the bundled wire framing over TCP.
pub struct TcpCustodianClient {
    authority_id: String,
    endpoint: String,
    timeout: Duration,
    auth: AuthPreamble,
}

impl TcpCustodianClient {
    /// Build a client from store configuration. Reads the credentials
    /// file now, not per request, so a missing file fails construction.
    pub fn new(config: &VaultConfig) -> Result<Self, ConfigError> {
        let auth = match &config.auth_mode {
            AuthMode::DelegatedIdentity => AuthPreamble::delegated(),
            AuthMode::CredentialsFile(path) => {
                let token = std::fs::read_to_string(path).map_err(|e| {
                    ConfigError::FileNotFound(format!("{}: {}", path.display(), e))
                })?;
                AuthPreamble::token(token.trim().to_owned())
            }
        };
        Ok(Self {
            authority_id: config.authority_id.clone(),
            endpoint: config.endpoint.clone(),
            timeout: config.timeout,
            auth,
        })
    }

    fn round_trip(&self, request: &[u8]) -> Result<Vec<u8>, CustodianError> {
        let addr = self
            .endpoint
            .to_socket_addrs()
            .map_err(|e| CustodianError::ConnectionFailed(e.to_string()))?
            .next()
            .ok_or_else(|| {
                CustodianError::ConnectionFailed("endpoint resolved to no addresses".into())
            })?;

        let mut stream = TcpStream::connect_timeout(&addr, self.timeout)
            .map_err(|e| CustodianError::ConnectionFailed(e.to_string()))?;
        stream
            .set_read_timeout(Some(self.timeout))
            .map_err(|e| CustodianError::ConnectionFailed(e.to_string()))?;
        stream
            .set_write_timeout(Some(self.timeout))
            .map_err(|e| CustodianError::ConnectionFailed(e.to_string()))?;

        stream
            .write_all(request)
            .map_err(|e| CustodianError::SendFailed(e.to_string()))?;

        // Shutdown write half to signal end of request
        stream
            .shutdown(Shutdown::Write)
            .map_err(|e| CustodianError::SendFailed(e.to_string()))?;

        let mut response = Vec::with_capacity(4096);
        stream
            .take(MAX_RESPONSE_BYTES)
            .read_to_end(&mut response)
            .map_err(|e| CustodianError::ReceiveFailed(e.to_string()))?;

        Ok(response)
    }

    /// Run one request, returning the raw response only on success.
    /// `Ok(None)` is a custodian-side not-found; other statuses error.
    fn exchange(&self, request: &Request<'_>) -> Result<Option<Vec<u8>>, CustodianError> {
        let frame = wire::encode_request(&self.auth, request);
        let response = self.round_trip(&frame)?;
        match wire::parse_status(&response)
            .map_err(|e| CustodianError::InvalidResponse(e.to_string()))?
        {
            WireStatus::Success => Ok(Some(response)),
            WireStatus::NotFound => Ok(None),
            WireStatus::Rejected => Err(CustodianError::Rejected("request rejected".into())),
            WireStatus::InternalError => {
                Err(CustodianError::Rejected("custodian internal error".into()))
            }
        }
    }
}

impl KeyCustodianClient for TcpCustodianClient {
    fn authority_aliases(&self) -> Result<Vec<String>, CustodianError> {
        let response = self.exchange(&Request::AuthorityAliases {
            authority_id: &self.authority_id,
        })?;
        match response {
            Some(response) => {
                let aliases = wire::parse_alias_payload(&response)
                    .map_err(|e| CustodianError::InvalidResponse(e.to_string()))?;
                debug!(count = aliases.len(), "fetched authority aliases");
                Ok(aliases)
            }
            None => Ok(Vec::new()),
        }
    }

    fn fetch_certificate(&self, authority_id: &str) -> Result<Option<Vec<u8>>, CustodianError> {
        let response = self.exchange(&Request::FetchCertificate { authority_id })?;
        let Some(response) = response else {
            return Ok(None);
        };
        let blob = wire::parse_blob_payload(&response)
            .map_err(|e| CustodianError::InvalidResponse(e.to_string()))?;
        let pem = String::from_utf8(blob)
            .map_err(|_| CustodianError::InvalidResponse("certificate is not UTF-8".into()))?;
        let der = cert::pem_to_der(&pem)
            .map_err(|e| CustodianError::InvalidResponse(e.to_string()))?;
        Ok(Some(der))
    }

    fn fetch_key(&self, authority_id: &str) -> Result<Option<KeyInfo>, CustodianError> {
        let response = self.exchange(&Request::FetchKey { authority_id })?;
        match response {
            Some(response) => wire::parse_key_payload(&response)
                .map(Some)
                .map_err(|e| CustodianError::InvalidResponse(e.to_string())),
            None => Ok(None),
        }
    }

    fn fetch_key_by_id(&self, key_id: &str) -> Result<Option<KeyInfo>, CustodianError> {
        let response = self.exchange(&Request::FetchKeyById { key_id })?;
        match response {
            Some(response) => wire::parse_key_payload(&response)
                .map(Some)
                .map_err(|e| CustodianError::InvalidResponse(e.to_string())),
            None => Ok(None),
        }
    }

    fn remote_sign(
        &self,
        digest_name: &str,
        base64_digest: &str,
        algorithm: SigningAlgorithm,
        key_id: &str,
    ) -> Result<Vec<u8>, CustodianError> {
        let response = self.exchange(&Request::Sign {
            digest_name,
            base64_digest,
            algorithm_code: algorithm.code(),
            key_id,
        })?;
        let Some(response) = response else {
            return Err(CustodianError::Rejected("unknown signing key".into()));
        };
        let blob = wire::parse_blob_payload(&response)
            .map_err(|e| CustodianError::InvalidResponse(e.to_string()))?;
        BASE64
            .decode(&blob)
            .map_err(|e| CustodianError::InvalidResponse(e.to_string()))
    }
}
