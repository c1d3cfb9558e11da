//! Binary framing for the bundled custodian transport.
//!
//! Request (client -> custodian):
//!   [version:1][op:1][auth_mode:1][token_length:2][token:T][fields...]
//! where each string field is [length:2][bytes] big-endian.
//!
//! Response (custodian -> client):
//!   [version:1][status:1][payload...]
//! Payload layout depends on the operation:
//!   aliases:     [count:2]([length:2][alias])*
//!   certificate: [length:4][pem bytes]     (blob)
//!   signature:   [length:4][base64 bytes]  (blob)
//!   key:         [algorithm][key_id][display_name][key_length:4]

use thiserror::Error;

use crate::custodian::KeyInfo;

pub const PROTOCOL_VERSION: u8 = 0x01;

/// Upper bound on a whole response; certificates dominate, and even a
/// deep PEM bundle stays far below this.
pub const MAX_RESPONSE_BYTES: u64 = 262_144;

const AUTH_DELEGATED: u8 = 0x00;
const AUTH_TOKEN: u8 = 0x01;

/// Authentication preamble carried on every request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthPreamble {
    mode: u8,
    token: String,
}

impl AuthPreamble {
    pub fn delegated() -> Self {
        Self {
            mode: AUTH_DELEGATED,
            token: String::new(),
        }
    }

    pub fn token(token: String) -> Self {
        Self {
            mode: AUTH_TOKEN,
            token,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
enum OpCode {
    AuthorityAliases = 0x01,
    FetchCertificate = 0x02,
    FetchKey = 0x03,
    FetchKeyById = 0x04,
    Sign = 0x05,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request<'a> {
    AuthorityAliases { authority_id: &'a str },
    FetchCertificate { authority_id: &'a str },
    FetchKey { authority_id: &'a str },
    FetchKeyById { key_id: &'a str },
    Sign {
        digest_name: &'a str,
        base64_digest: &'a str,
        algorithm_code: &'a str,
        key_id: &'a str,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum WireStatus {
    Success = 0x00,
    NotFound = 0x01,
    Rejected = 0x02,
    InternalError = 0x03,
}

impl WireStatus {
    pub fn from_byte(b: u8) -> Option<Self> {
        match b {
            0x00 => Some(Self::Success),
            0x01 => Some(Self::NotFound),
            0x02 => Some(Self::Rejected),
            0x03 => Some(Self::InternalError),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WireError {
    #[error("response too short")]
    TooShort,
    #[error("invalid protocol version: {0:#04x}")]
    InvalidVersion(u8),
    #[error("invalid status byte: {0:#04x}")]
    InvalidStatus(u8),
    #[error("field truncated")]
    FieldTruncated,
    #[error("field is not valid UTF-8")]
    InvalidUtf8,
    #[error("trailing data after payload")]
    TrailingData,
}

fn put_str(buf: &mut Vec<u8>, s: &str) {
    buf.extend_from_slice(&(s.len() as u16).to_be_bytes());
    buf.extend_from_slice(s.as_bytes());
}

/// Serialize a request with its authentication preamble.
pub fn encode_request(auth: &AuthPreamble, request: &Request<'_>) -> Vec<u8> {
    let mut buf = Vec::with_capacity(64);
    buf.push(PROTOCOL_VERSION);

    let op = match request {
        Request::AuthorityAliases { .. } => OpCode::AuthorityAliases,
        Request::FetchCertificate { .. } => OpCode::FetchCertificate,
        Request::FetchKey { .. } => OpCode::FetchKey,
        Request::FetchKeyById { .. } => OpCode::FetchKeyById,
        Request::Sign { .. } => OpCode::Sign,
    };
    buf.push(op as u8);

    buf.push(auth.mode);
    put_str(&mut buf, &auth.token);

    match request {
        Request::AuthorityAliases { authority_id }
        | Request::FetchCertificate { authority_id }
        | Request::FetchKey { authority_id } => put_str(&mut buf, authority_id),
        Request::FetchKeyById { key_id } => put_str(&mut buf, key_id),
        Request::Sign {
            digest_name,
            base64_digest,
            algorithm_code,
            key_id,
        } => {
            put_str(&mut buf, digest_name);
            put_str(&mut buf, base64_digest);
            put_str(&mut buf, algorithm_code);
            put_str(&mut buf, key_id);
        }
    }

    buf
}

fn read_str(data: &[u8], offset: &mut usize) -> Result<String, WireError> {
    if data.len() < *offset + 2 {
        return Err(WireError::FieldTruncated);
    }
    let len = u16::from_be_bytes([data[*offset], data[*offset + 1]]) as usize;
    *offset += 2;
    if data.len() < *offset + len {
        return Err(WireError::FieldTruncated);
    }
    let s = core::str::from_utf8(&data[*offset..*offset + len])
        .map_err(|_| WireError::InvalidUtf8)?
        .to_owned();
    *offset += len;
    Ok(s)
}

fn read_u32(data: &[u8], offset: &mut usize) -> Result<u32, WireError> {
    if data.len() < *offset + 4 {
        return Err(WireError::FieldTruncated);
    }
    let value = u32::from_be_bytes([
        data[*offset],
        data[*offset + 1],
        data[*offset + 2],
        data[*offset + 3],
    ]);
    *offset += 4;
    Ok(value)
}

/// Validate the response header and return its status byte.
pub fn parse_status(response: &[u8]) -> Result<WireStatus, WireError> {
    if response.len() < 2 {
        return Err(WireError::TooShort);
    }
    if response[0] != PROTOCOL_VERSION {
        return Err(WireError::InvalidVersion(response[0]));
    }
    WireStatus::from_byte(response[1]).ok_or(WireError::InvalidStatus(response[1]))
}

/// Parse an alias-list payload.
pub fn parse_alias_payload(response: &[u8]) -> Result<Vec<String>, WireError> {
    let mut offset = 2; // version + status
    if response.len() < offset + 2 {
        return Err(WireError::FieldTruncated);
    }
    let count = u16::from_be_bytes([response[offset], response[offset + 1]]) as usize;
    offset += 2;

    let mut aliases = Vec::with_capacity(count);
    for _ in 0..count {
        aliases.push(read_str(response, &mut offset)?);
    }
    if offset != response.len() {
        return Err(WireError::TrailingData);
    }
    Ok(aliases)
}

/// Parse a single length-prefixed blob payload (certificate PEM or
/// base64 signature).
pub fn parse_blob_payload(response: &[u8]) -> Result<Vec<u8>, WireError> {
    let mut offset = 2;
    let len = read_u32(response, &mut offset)? as usize;
    if response.len() < offset + len {
        return Err(WireError::FieldTruncated);
    }
    if response.len() != offset + len {
        return Err(WireError::TrailingData);
    }
    Ok(response[offset..offset + len].to_vec())
}

/// Parse a key-metadata payload.
pub fn parse_key_payload(response: &[u8]) -> Result<KeyInfo, WireError> {
    let mut offset = 2;
    let algorithm = read_str(response, &mut offset)?;
    let key_id = read_str(response, &mut offset)?;
    let display_name = read_str(response, &mut offset)?;
    let key_length = read_u32(response, &mut offset)?;
    if offset != response.len() {
        return Err(WireError::TrailingData);
    }
    Ok(KeyInfo {
        algorithm,
        key_id,
        display_name,
        key_length,
    })
}
