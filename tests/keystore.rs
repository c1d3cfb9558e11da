//! End-to-end flows over an in-process custodian stub: open a store,
//! enumerate and resolve credentials, then sign through the engine with
//! a key handle taken from the store.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use sha2::{Digest, Sha256};

use vault_keystore::{
    CredentialStore, CustodianError, EngineState, KeyCustodianClient, KeyInfo, KeyManager,
    PrivateKey, SigningAlgorithm, SigningEngine, VaultConfig, ENCODED_PLACEHOLDER_LEN,
};

struct Custodian {
    aliases: Vec<String>,
    cert_der: Vec<u8>,
    authority_key: KeyInfo,
    direct_key: Option<KeyInfo>,
    signature: Vec<u8>,
    sign_requests: Mutex<Vec<(String, String, SigningAlgorithm, String)>>,
    alias_calls: AtomicUsize,
}

impl Custodian {
    fn new(aliases: &[&str]) -> Self {
        let key_pair = rcgen::KeyPair::generate().unwrap();
        let cert_der = rcgen::CertificateParams::default()
            .self_signed(&key_pair)
            .unwrap()
            .der()
            .to_vec();
        Self {
            aliases: aliases.iter().map(|s| s.to_string()).collect(),
            cert_der,
            authority_key: KeyInfo {
                algorithm: "RSA".to_owned(),
                key_id: "ocid1.key.authority".to_owned(),
                display_name: "authority-tls-key".to_owned(),
                key_length: 2048,
            },
            direct_key: Some(KeyInfo {
                algorithm: "RSA".to_owned(),
                key_id: "ocid1.key.local".to_owned(),
                display_name: "local-tls-key".to_owned(),
                key_length: 2048,
            }),
            signature: BASE64.decode("c2lnbmF0dXJl").unwrap(),
            sign_requests: Mutex::new(Vec::new()),
            alias_calls: AtomicUsize::new(0),
        }
    }
}

impl KeyCustodianClient for Custodian {
    fn authority_aliases(&self) -> Result<Vec<String>, CustodianError> {
        self.alias_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.aliases.clone())
    }

    fn fetch_certificate(&self, _: &str) -> Result<Option<Vec<u8>>, CustodianError> {
        Ok(Some(self.cert_der.clone()))
    }

    fn fetch_key(&self, _: &str) -> Result<Option<KeyInfo>, CustodianError> {
        Ok(Some(self.authority_key.clone()))
    }

    fn fetch_key_by_id(&self, _: &str) -> Result<Option<KeyInfo>, CustodianError> {
        Ok(self.direct_key.clone())
    }

    fn remote_sign(
        &self,
        digest_name: &str,
        base64_digest: &str,
        algorithm: SigningAlgorithm,
        key_id: &str,
    ) -> Result<Vec<u8>, CustodianError> {
        self.sign_requests.lock().unwrap().push((
            digest_name.to_owned(),
            base64_digest.to_owned(),
            algorithm,
            key_id.to_owned(),
        ));
        Ok(self.signature.clone())
    }
}

fn authority_store(custodian: Arc<Custodian>) -> CredentialStore {
    let config = VaultConfig::new("ocid1.certificateauthority.test", "127.0.0.1:7000");
    CredentialStore::with_custodian(&config, custodian)
}

/// Store with the authority alias and a local certificate filed under the
/// same alias name, so precedence between the sources is observable.
fn dual_store(alias: &str, custodian: Arc<Custodian>) -> (CredentialStore, std::path::PathBuf) {
    let key_pair = rcgen::KeyPair::generate().unwrap();
    let pem = rcgen::CertificateParams::default()
        .self_signed(&key_pair)
        .unwrap()
        .pem();
    let dir = std::env::temp_dir().join(format!("vault-keystore-it-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join(format!("{alias}.pem"));
    std::fs::write(&path, pem).unwrap();

    let mut config = VaultConfig::new("ocid1.certificateauthority.test", "127.0.0.1:7000");
    config.local_cert_path = Some(path.clone());
    config.local_key_id = Some("ocid1.key.local".to_owned());
    (CredentialStore::with_custodian(&config, custodian), path)
}

#[test]
fn store_serves_certificate_chain_and_key() {
    let custodian = Arc::new(Custodian::new(&["root-ca"]));
    let store = authority_store(custodian.clone());

    assert_eq!(store.aliases(), vec!["root-ca"]);
    assert!(store.contains_alias("root-ca"));
    assert!(store.is_certificate_entry("root-ca"));
    assert!(store.is_key_entry("root-ca"));

    let chain = store.certificate_chain("root-ca").unwrap();
    assert_eq!(chain.len(), 1);
    assert_eq!(chain[0].der(), custodian.cert_der.as_slice());

    let key = store.key("root-ca", None).unwrap();
    assert_eq!(key.key_id(), "ocid1.key.authority");
    assert_eq!(key.algorithm(), "RSA");
    assert_eq!(key.encoded().len(), ENCODED_PLACEHOLDER_LEN);

    // Population was lazy and happened exactly once across all lookups.
    assert_eq!(custodian.alias_calls.load(Ordering::SeqCst), 1);
}

#[test]
fn precedence_is_asymmetric_across_sources() {
    let custodian = Arc::new(Custodian::new(&["gateway"]));
    let (store, path) = dual_store("gateway", custodian.clone());

    // Certificates resolve authority-first.
    let cert = store.certificate("gateway").unwrap();
    assert_eq!(cert.der(), custodian.cert_der.as_slice());

    // Keys resolve local-first.
    let key = store.key("gateway", None).unwrap();
    assert_eq!(key.key_id(), "ocid1.key.local");

    std::fs::remove_file(path).ok();
}

#[test]
fn delete_then_list_drops_the_alias_everywhere() {
    let custodian = Arc::new(Custodian::new(&["edge"]));
    let (store, path) = dual_store("edge", custodian);

    assert_eq!(store.len(), 2);
    store.delete_entry("edge");
    assert!(store.is_empty());
    assert!(store.certificate("edge").is_none());
    assert!(store.key("edge", None).is_none());

    // An explicit refresh restores both sources from their origins.
    store.refresh();
    assert_eq!(store.len(), 2);

    std::fs::remove_file(path).ok();
}

#[test]
fn missing_alias_is_none_and_persistence_is_inert() {
    let custodian = Arc::new(Custodian::new(&["root-ca"]));
    let store = authority_store(custodian);

    assert!(store.certificate("absent").is_none());
    assert!(store.key("absent", None).is_none());
    assert!(store.certificate_chain("absent").is_none());

    let record = store.certificate("root-ca").unwrap();
    store.set_certificate_entry("imported", &record);
    store.set_key_entry("imported");
    store.save();
    assert_eq!(store.aliases(), vec!["root-ca"]);
}

#[test]
fn sign_with_a_store_key_end_to_end() {
    let custodian = Arc::new(Custodian::new(&["root-ca"]));
    let store = authority_store(custodian.clone());
    let key = store.key("root-ca", None).unwrap();

    let mut engine = SigningEngine::new("SHA256withRSA").unwrap();
    engine.init_sign(&key).unwrap();
    engine.update(b"hello").unwrap();
    let signature = engine.sign().unwrap();

    assert_eq!(signature, b"signature");
    assert_eq!(engine.state(), EngineState::Signed);

    let requests = custodian.sign_requests.lock().unwrap();
    let (digest_name, digest, algorithm, key_id) = requests[0].clone();
    assert_eq!(digest_name, "RS256");
    assert_eq!(algorithm, SigningAlgorithm::Sha256RsaPkcs1V15);
    assert_eq!(key_id, "ocid1.key.authority");
    assert_eq!(digest, BASE64.encode(Sha256::digest(b"hello")));
}

#[test]
fn manager_drives_a_single_entry_store() {
    let custodian = Arc::new(Custodian::new(&["root-ca"]));
    let manager = KeyManager::new(Arc::new(authority_store(custodian)), None);

    assert_eq!(manager.choose_server_alias("RSA"), Some("root-ca".to_owned()));
    assert_eq!(manager.certificate_chain("root-ca").len(), 1);
    assert_eq!(
        manager.private_key("root-ca").unwrap().key_id(),
        "ocid1.key.authority"
    );
}
