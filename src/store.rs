//! The aggregate credential store: an ordered list of sources merged
//! into one alias namespace.
//!
//! No pre-merged map is kept; every lookup fans out to the sources so
//! an independently refreshing source can never leave the aggregate
//! stale. The store is read-through only: credentials are never
//! persisted locally, so all persistence entry points are no-ops.

use std::sync::Arc;
use std::time::SystemTime;

use tracing::debug;

use crate::cert::CertificateRecord;
use crate::client::TcpCustodianClient;
use crate::config::{ConfigError, VaultConfig};
use crate::custodian::KeyCustodianClient;
use crate::handle::RemoteKeyHandle;
use crate::source::{CredentialSource, LocalCertificateSource, VaultAuthoritySource};

pub struct CredentialStore {
    /// Sources in precedence order: the authority-backed source first,
    /// the locally supplied certificate (when configured) second.
    sources: Vec<Arc<dyn CredentialSource>>,
    created_at: SystemTime,
}

impl CredentialStore {
    /// Open a store talking to the custodian over the bundled TCP
    /// transport.
    pub fn open(config: &VaultConfig) -> Result<Self, ConfigError> {
        let custodian: Arc<dyn KeyCustodianClient> = Arc::new(TcpCustodianClient::new(config)?);
        Ok(Self::with_custodian(config, custodian))
    }

    /// Open a store over an externally supplied custodian client.
    pub fn with_custodian(config: &VaultConfig, custodian: Arc<dyn KeyCustodianClient>) -> Self {
        let mut sources: Vec<Arc<dyn CredentialSource>> = vec![Arc::new(
            VaultAuthoritySource::new(&config.authority_id, custodian.clone()),
        )];
        if let Some(path) = &config.local_cert_path {
            sources.push(Arc::new(LocalCertificateSource::new(
                path,
                config.local_key_id.as_deref(),
                custodian,
            )));
        }
        Self {
            sources,
            created_at: SystemTime::now(),
        }
    }

    /// All aliases in source order. Duplicates across sources are not
    /// filtered; lookup precedence decides which entry wins.
    pub fn aliases(&self) -> Vec<String> {
        self.sources.iter().flat_map(|s| s.aliases()).collect()
    }

    /// Resolve a certificate, authority-backed source first.
    pub fn certificate(&self, alias: &str) -> Option<CertificateRecord> {
        for source in &self.sources {
            if source.aliases().iter().any(|a| a == alias) {
                return source.certificate(alias);
            }
        }
        debug!(alias = %alias, "certificate not found");
        None
    }

    /// Resolve a key handle, locally supplied source first.
    ///
    /// The scan order is deliberately the reverse of `certificate`: a
    /// locally supplied certificate's key wins over the authority's.
    /// The unlocking credential is accepted for interface compatibility
    /// and ignored; custodian-held keys have no local unlock.
    pub fn key(&self, alias: &str, _password: Option<&[u8]>) -> Option<RemoteKeyHandle> {
        for source in self.sources.iter().rev() {
            if source.aliases().iter().any(|a| a == alias) {
                return source.key(alias);
            }
        }
        debug!(alias = %alias, "key not found");
        None
    }

    /// Certificate chain for an alias. No intermediate chain is modeled;
    /// a hit is always a single-element chain.
    pub fn certificate_chain(&self, alias: &str) -> Option<Vec<CertificateRecord>> {
        self.certificate(alias).map(|record| vec![record])
    }

    /// Reverse lookup: the first alias whose certificate has exactly
    /// these DER bytes.
    pub fn certificate_alias(&self, der: &[u8]) -> Option<String> {
        self.aliases()
            .into_iter()
            .find(|alias| matches!(self.certificate(alias), Some(record) if record.der() == der))
    }

    /// Remove an alias from every source's local view.
    pub fn delete_entry(&self, alias: &str) {
        for source in &self.sources {
            source.delete_entry(alias);
        }
    }

    /// Re-fetch every source from its origin.
    pub fn refresh(&self) {
        for source in &self.sources {
            source.refresh();
        }
    }

    pub fn contains_alias(&self, alias: &str) -> bool {
        self.sources
            .iter()
            .any(|s| s.aliases().iter().any(|a| a == alias))
    }

    /// Every listed alias is a certificate entry.
    pub fn is_certificate_entry(&self, alias: &str) -> bool {
        self.contains_alias(alias)
    }

    /// Key entries coincide with certificate entries in this store.
    pub fn is_key_entry(&self, alias: &str) -> bool {
        self.is_certificate_entry(alias)
    }

    pub fn len(&self) -> usize {
        self.aliases().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Creation date of the store; reported for every alias, since
    /// entries carry their own fetch timestamps internally.
    pub fn creation_date(&self) -> SystemTime {
        self.created_at
    }

    /// No-op. The store is never a place of record for certificates.
    pub fn set_certificate_entry(&self, alias: &str, _record: &CertificateRecord) {
        debug!(alias = %alias, "set_certificate_entry ignored: store is read-through");
    }

    /// No-op. Key material cannot be imported into a keyless store.
    pub fn set_key_entry(&self, alias: &str) {
        debug!(alias = %alias, "set_key_entry ignored: store is read-through");
    }

    /// No-op. Credentials are never written to local storage.
    pub fn save(&self) {
        debug!("save ignored: store is never persisted");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::custodian::{CustodianError, KeyInfo, SigningAlgorithm};

    struct StubCustodian {
        aliases: Vec<String>,
        cert_der: Vec<u8>,
        authority_key: KeyInfo,
        local_key: KeyInfo,
    }

    impl KeyCustodianClient for StubCustodian {
        fn authority_aliases(&self) -> Result<Vec<String>, CustodianError> {
            Ok(self.aliases.clone())
        }
        fn fetch_certificate(&self, _: &str) -> Result<Option<Vec<u8>>, CustodianError> {
            Ok(Some(self.cert_der.clone()))
        }
        fn fetch_key(&self, _: &str) -> Result<Option<KeyInfo>, CustodianError> {
            Ok(Some(self.authority_key.clone()))
        }
        fn fetch_key_by_id(&self, _: &str) -> Result<Option<KeyInfo>, CustodianError> {
            Ok(Some(self.local_key.clone()))
        }
        fn remote_sign(
            &self,
            _: &str,
            _: &str,
            _: SigningAlgorithm,
            _: &str,
        ) -> Result<Vec<u8>, CustodianError> {
            Err(CustodianError::Rejected("not a signing stub".into()))
        }
    }

    fn key_info(key_id: &str) -> KeyInfo {
        KeyInfo {
            algorithm: "RSA".to_owned(),
            key_id: key_id.to_owned(),
            display_name: key_id.to_owned(),
            key_length: 2048,
        }
    }

    fn test_der() -> Vec<u8> {
        let key_pair = rcgen::KeyPair::generate().unwrap();
        rcgen::CertificateParams::default()
            .self_signed(&key_pair)
            .unwrap()
            .der()
            .to_vec()
    }

    fn stub(aliases: &[&str]) -> Arc<StubCustodian> {
        Arc::new(StubCustodian {
            aliases: aliases.iter().map(|s| s.to_string()).collect(),
            cert_der: test_der(),
            authority_key: key_info("authority-key"),
            local_key: key_info("local-key"),
        })
    }

    fn authority_only_store(custodian: Arc<StubCustodian>) -> CredentialStore {
        let config = VaultConfig::new("ca-1", "127.0.0.1:7000");
        CredentialStore::with_custodian(&config, custodian)
    }

    /// Store with an authority alias and a local certificate filed under
    /// the same alias, to pin lookup precedence.
    fn dual_source_store(alias: &str) -> (CredentialStore, std::path::PathBuf) {
        let custodian = stub(&[alias]);
        let key_pair = rcgen::KeyPair::generate().unwrap();
        let pem = rcgen::CertificateParams::default()
            .self_signed(&key_pair)
            .unwrap()
            .pem();
        let dir = std::env::temp_dir().join(format!("vault-keystore-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join(format!("{alias}.pem"));
        std::fs::write(&path, pem).unwrap();

        let mut config = VaultConfig::new("ca-1", "127.0.0.1:7000");
        config.local_cert_path = Some(path.clone());
        config.local_key_id = Some("local-key".to_owned());
        (CredentialStore::with_custodian(&config, custodian), path)
    }

    #[test]
    fn aliases_concatenate_in_source_order() {
        let (store, path) = dual_source_store("ca-list");
        // Same alias twice: once from the authority, once from the file.
        assert_eq!(store.aliases(), vec!["ca-list", "ca-list"]);
        assert_eq!(store.len(), 2);
        std::fs::remove_file(path).ok();
    }

    #[test]
    fn certificate_prefers_authority_source() {
        let (store, path) = dual_source_store("ca-cert");
        let authority_cert = store.certificate("ca-cert").unwrap();
        // The authority's certificate wins; the local file holds a
        // different self-signed certificate.
        let local_der = crate::cert::pem_to_der(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_ne!(authority_cert.der(), local_der.as_slice());
        std::fs::remove_file(path).ok();
    }

    #[test]
    fn key_prefers_local_source() {
        let (store, path) = dual_source_store("ca-key");
        let key = store.key("ca-key", None).unwrap();
        assert_eq!(key.key_id(), "local-key");
        std::fs::remove_file(path).ok();
    }

    #[test]
    fn lookup_miss_is_none_not_error() {
        let store = authority_only_store(stub(&["root-ca"]));
        assert!(store.certificate("absent").is_none());
        assert!(store.key("absent", None).is_none());
        assert!(store.certificate_chain("absent").is_none());
        assert!(!store.contains_alias("absent"));
    }

    #[test]
    fn chain_is_single_certificate() {
        let store = authority_only_store(stub(&["root-ca"]));
        let chain = store.certificate_chain("root-ca").unwrap();
        assert_eq!(chain.len(), 1);
        assert_eq!(chain[0].alias(), "root-ca");
    }

    #[test]
    fn certificate_alias_reverse_lookup() {
        let store = authority_only_store(stub(&["root-ca"]));
        let der = store.certificate("root-ca").unwrap().der().to_vec();
        assert_eq!(store.certificate_alias(&der), Some("root-ca".to_owned()));
        assert_eq!(store.certificate_alias(&[0x00]), None);
    }

    #[test]
    fn delete_removes_alias_from_every_source() {
        let (store, path) = dual_source_store("ca-del");
        store.delete_entry("ca-del");
        assert!(store.aliases().is_empty());
        assert!(store.key("ca-del", None).is_none());
        std::fs::remove_file(path).ok();
    }

    #[test]
    fn entry_kind_queries_follow_containment() {
        let store = authority_only_store(stub(&["root-ca"]));
        assert!(store.is_certificate_entry("root-ca"));
        assert!(store.is_key_entry("root-ca"));
        assert!(!store.is_certificate_entry("absent"));
    }

    #[test]
    fn persistence_operations_are_noops() {
        let store = authority_only_store(stub(&["root-ca"]));
        let record = store.certificate("root-ca").unwrap();
        store.set_certificate_entry("new-alias", &record);
        store.set_key_entry("new-alias");
        store.save();
        assert_eq!(store.aliases(), vec!["root-ca"]);
    }
}
