//! Alias selection for TLS handshakes.
//!
//! Thin capability layer the host TLS runtime drives: pick an alias for
//! a handshake, then fetch its chain and key handle. Wiring this into a
//! concrete TLS stack is the embedder's adapter.

use std::sync::Arc;

use tracing::debug;

use crate::cert::CertificateRecord;
use crate::handle::RemoteKeyHandle;
use crate::store::CredentialStore;

pub struct KeyManager {
    store: Arc<CredentialStore>,
    password: Option<Vec<u8>>,
}

impl KeyManager {
    pub fn new(store: Arc<CredentialStore>, password: Option<&[u8]>) -> Self {
        Self {
            store,
            password: password.map(<[u8]>::to_vec),
        }
    }

    /// Alias to present as client. Only a single-entry store yields an
    /// unambiguous choice; anything else defers to the peer's hints,
    /// which this store does not interpret.
    pub fn choose_client_alias(&self, _key_types: &[&str]) -> Option<String> {
        self.sole_alias()
    }

    /// Alias to present as server. Same single-entry rule as the client
    /// side.
    pub fn choose_server_alias(&self, _key_type: &str) -> Option<String> {
        self.sole_alias()
    }

    fn sole_alias(&self) -> Option<String> {
        let mut aliases = self.store.aliases();
        if aliases.len() == 1 {
            aliases.pop()
        } else {
            debug!(count = aliases.len(), "no unambiguous alias to choose");
            None
        }
    }

    pub fn client_aliases(&self) -> Vec<String> {
        self.store.aliases()
    }

    pub fn server_aliases(&self) -> Vec<String> {
        self.store.aliases()
    }

    /// Certificate chain for the alias; empty when the alias is unknown.
    pub fn certificate_chain(&self, alias: &str) -> Vec<CertificateRecord> {
        self.store.certificate_chain(alias).unwrap_or_default()
    }

    pub fn private_key(&self, alias: &str) -> Option<RemoteKeyHandle> {
        self.store.key(alias, self.password.as_deref())
    }
}
