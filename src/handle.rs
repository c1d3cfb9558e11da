//! Key handles for custodian-held private keys.
//!
//! A [`RemoteKeyHandle`] carries key identity only. The raw key never
//! exists in this process; signing routes through the handle's custodian
//! reference.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use crate::custodian::{KeyCustodianClient, KeyInfo};

/// Size of the placeholder returned by [`PrivateKey::encoded`]. The value
/// is all zeros for every key; callers that require a byte form get one
/// that derives nothing.
pub const ENCODED_PLACEHOLDER_LEN: usize = 2048;

/// Minimal private-key surface the signing engine accepts.
///
/// The `Any` bound lets the engine check at init time that a key is
/// custodian-held; any other implementation is rejected as unsupported.
pub trait PrivateKey: Any + Send + Sync {
    fn algorithm(&self) -> &str;
    fn format(&self) -> &str;
    fn encoded(&self) -> Vec<u8>;
    fn as_any(&self) -> &dyn Any;
}

/// Stand-in for a private key custodied by the remote service.
#[derive(Clone)]
pub struct RemoteKeyHandle {
    info: KeyInfo,
    custodian: Arc<dyn KeyCustodianClient>,
}

impl RemoteKeyHandle {
    pub fn new(info: KeyInfo, custodian: Arc<dyn KeyCustodianClient>) -> Self {
        Self { info, custodian }
    }

    pub fn key_id(&self) -> &str {
        &self.info.key_id
    }

    pub fn display_name(&self) -> &str {
        &self.info.display_name
    }

    pub fn key_length(&self) -> u32 {
        self.info.key_length
    }

    /// The custodian that holds this key, used to route sign requests.
    pub fn custodian(&self) -> Arc<dyn KeyCustodianClient> {
        self.custodian.clone()
    }
}

impl PrivateKey for RemoteKeyHandle {
    fn algorithm(&self) -> &str {
        &self.info.algorithm
    }

    fn format(&self) -> &str {
        "RAW"
    }

    fn encoded(&self) -> Vec<u8> {
        vec![0; ENCODED_PLACEHOLDER_LEN]
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

// Identity is the custodian key id; two handles to the same key compare
// equal even if metadata (display name, refreshed length) differs.
impl PartialEq for RemoteKeyHandle {
    fn eq(&self, other: &Self) -> bool {
        self.info.key_id == other.info.key_id
    }
}

impl Eq for RemoteKeyHandle {}

impl fmt::Debug for RemoteKeyHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteKeyHandle")
            .field("algorithm", &self.info.algorithm)
            .field("key_id", &self.info.key_id)
            .field("display_name", &self.info.display_name)
            .field("key_length", &self.info.key_length)
            .finish()
    }
}
