//! Credential sources: each owns one alias-indexed slice of the store's
//! namespace and knows how to repopulate itself from its origin.
//!
//! Population is lazy (first alias enumeration) or explicit (`refresh`).
//! A refresh builds a complete replacement state off to the side and
//! swaps it in under the source's lock, so concurrent readers observe
//! either the old state or the new one, never a mix.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard};

use tracing::{debug, warn};

use crate::cert::{self, CertificateRecord};
use crate::custodian::KeyCustodianClient;
use crate::handle::RemoteKeyHandle;

/// One alias-indexed slice of the credential namespace.
///
/// `certificate` and `key` never perform network I/O; data must have
/// been populated by a prior `aliases` call or an explicit `refresh`.
pub trait CredentialSource: Send + Sync {
    /// Aliases currently known. Populates the source on first call if
    /// its cache is empty; never refreshes after that.
    fn aliases(&self) -> Vec<String>;

    fn certificate(&self, alias: &str) -> Option<CertificateRecord>;

    fn key(&self, alias: &str) -> Option<RemoteKeyHandle>;

    /// Remove the alias from this source's local view. Nothing is
    /// deleted at the origin.
    fn delete_entry(&self, alias: &str);

    /// Re-fetch from the origin and atomically replace the alias list
    /// and both maps. Per-alias failures degrade that alias, never the
    /// whole refresh.
    fn refresh(&self);
}

#[derive(Default)]
struct SourceState {
    aliases: Vec<String>,
    certificates: HashMap<String, CertificateRecord>,
    keys: HashMap<String, RemoteKeyHandle>,
}

impl SourceState {
    fn delete(&mut self, alias: &str) {
        self.aliases.retain(|a| a != alias);
        self.certificates.remove(alias);
        self.keys.remove(alias);
    }
}

/// Credentials published by one certificate authority in the vault.
///
/// The authority maps to exactly one alias (its display name); the key
/// is resolved indirectly through the authority record, which names the
/// custodian key identifier.
pub struct VaultAuthoritySource {
    authority_id: String,
    custodian: Arc<dyn KeyCustodianClient>,
    state: RwLock<SourceState>,
    populated: AtomicBool,
}

impl VaultAuthoritySource {
    pub fn new(authority_id: impl Into<String>, custodian: Arc<dyn KeyCustodianClient>) -> Self {
        Self {
            authority_id: authority_id.into(),
            custodian,
            state: RwLock::new(SourceState::default()),
            populated: AtomicBool::new(false),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, SourceState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }
}

impl CredentialSource for VaultAuthoritySource {
    fn aliases(&self) -> Vec<String> {
        if !self.populated.load(Ordering::Acquire) {
            self.refresh();
        }
        self.read().aliases.clone()
    }

    fn certificate(&self, alias: &str) -> Option<CertificateRecord> {
        self.read().certificates.get(alias).cloned()
    }

    fn key(&self, alias: &str) -> Option<RemoteKeyHandle> {
        self.read().keys.get(alias).cloned()
    }

    fn delete_entry(&self, alias: &str) {
        self.state
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .delete(alias);
    }

    fn refresh(&self) {
        let mut next = SourceState::default();

        let aliases = match self.custodian.authority_aliases() {
            Ok(aliases) => aliases,
            Err(e) => {
                warn!(authority = %self.authority_id, error = %e, "authority alias fetch failed, keeping previous state");
                self.populated.store(true, Ordering::Release);
                return;
            }
        };

        for alias in aliases {
            let der = match self.custodian.fetch_certificate(&self.authority_id) {
                Ok(Some(der)) => der,
                Ok(None) => {
                    debug!(alias = %alias, "authority has no certificate bundle, skipping alias");
                    continue;
                }
                Err(e) => {
                    warn!(alias = %alias, error = %e, "certificate fetch failed, skipping alias");
                    continue;
                }
            };
            let record = match CertificateRecord::parse(alias.clone(), der) {
                Ok(record) => record,
                Err(e) => {
                    warn!(alias = %alias, error = %e, "skipping malformed certificate");
                    continue;
                }
            };

            match self.custodian.fetch_key(&self.authority_id) {
                Ok(Some(info)) => {
                    next.keys.insert(
                        alias.clone(),
                        RemoteKeyHandle::new(info, self.custodian.clone()),
                    );
                }
                Ok(None) => debug!(alias = %alias, "authority names no key, alias is certificate-only"),
                Err(e) => {
                    warn!(alias = %alias, error = %e, "key fetch failed, alias continues certificate-only")
                }
            }

            debug!(alias = %alias, subject = %record.subject(), "loaded authority certificate");
            next.certificates.insert(alias.clone(), record);
            next.aliases.push(alias);
        }

        // Single swap: readers see the old state until this point.
        *self.state.write().unwrap_or_else(PoisonError::into_inner) = next;
        self.populated.store(true, Ordering::Release);
    }
}

/// A locally supplied, separately signed certificate whose key still
/// lives with the custodian.
///
/// The alias is the artifact's filename stem; the key handle is fetched
/// once, eagerly, at construction, by key identifier.
pub struct LocalCertificateSource {
    path: PathBuf,
    key_id: Option<String>,
    custodian: Arc<dyn KeyCustodianClient>,
    state: RwLock<SourceState>,
}

impl LocalCertificateSource {
    pub fn new(
        path: impl Into<PathBuf>,
        key_id: Option<&str>,
        custodian: Arc<dyn KeyCustodianClient>,
    ) -> Self {
        let source = Self {
            path: path.into(),
            key_id: key_id.map(str::to_owned),
            custodian,
            state: RwLock::new(SourceState::default()),
        };
        source.refresh();
        source
    }

    fn read(&self) -> RwLockReadGuard<'_, SourceState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn load(&self) -> Option<SourceState> {
        let bytes = match std::fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "unable to read local certificate");
                return None;
            }
        };

        // Accept PEM or raw DER artifacts.
        let der = if bytes.windows(10).any(|w| w == b"-----BEGIN") {
            match cert::pem_to_der(&String::from_utf8_lossy(&bytes)) {
                Ok(der) => der,
                Err(e) => {
                    warn!(path = %self.path.display(), error = %e, "unable to decode local certificate");
                    return None;
                }
            }
        } else {
            bytes
        };

        let alias = certificate_alias(&self.path);
        let record = match CertificateRecord::parse(alias.clone(), der) {
            Ok(record) => record,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "skipping malformed local certificate");
                return None;
            }
        };

        let mut state = SourceState::default();
        match &self.key_id {
            Some(key_id) => match self.custodian.fetch_key_by_id(key_id) {
                Ok(Some(info)) => {
                    state.keys.insert(
                        alias.clone(),
                        RemoteKeyHandle::new(info, self.custodian.clone()),
                    );
                }
                Ok(None) => warn!(key_id = %key_id, "custodian has no such key, alias is certificate-only"),
                Err(e) => {
                    warn!(key_id = %key_id, error = %e, "key fetch failed, alias is certificate-only")
                }
            },
            None => debug!(alias = %alias, "no key id configured for local certificate"),
        }

        debug!(alias = %alias, subject = %record.subject(), "loaded local certificate");
        state.certificates.insert(alias.clone(), record);
        state.aliases.push(alias);
        Some(state)
    }
}

impl CredentialSource for LocalCertificateSource {
    fn aliases(&self) -> Vec<String> {
        self.read().aliases.clone()
    }

    fn certificate(&self, alias: &str) -> Option<CertificateRecord> {
        self.read().certificates.get(alias).cloned()
    }

    fn key(&self, alias: &str) -> Option<RemoteKeyHandle> {
        self.read().keys.get(alias).cloned()
    }

    fn delete_entry(&self, alias: &str) {
        self.state
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .delete(alias);
    }

    fn refresh(&self) {
        if let Some(next) = self.load() {
            *self.state.write().unwrap_or_else(PoisonError::into_inner) = next;
        }
    }
}

/// Derive an alias from a certificate artifact's filename stem.
fn certificate_alias(path: &Path) -> String {
    path.file_stem()
        .or_else(|| path.file_name())
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}
