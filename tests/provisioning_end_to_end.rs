use std::sync::Arc;

use rkpd::{
    rkpd_pki::CertificateChain,
    rkpd_provisioner::{
        testutil::{FakeComponent, FakeRkpServer},
        AttemptCause, ComponentRegistry, KeyAssigner, PeriodicProvisioner, ProvisioningAttempt,
        ProvisioningConfig, Provisioner, RemoteProvisioningServer,
    },
    rkpd_store::{KeyStore, SqliteKeyStore},
};
use time::OffsetDateTime;

const AVF: &str = "android.hardware.security.keymint.IRemotelyProvisionedComponent/avf";

#[test]
fn provision_then_assign_key() {
    let store = Arc::new(SqliteKeyStore::open_in_memory().unwrap());
    let server = Arc::new(FakeRkpServer::new().unwrap());
    let component = FakeComponent::new(AVF, 13);
    let config = ProvisioningConfig {
        extra_signed_keys_available: 20,
        ..ProvisioningConfig::default()
    };
    let provisioner = Provisioner::new(store.clone(), server.clone(), config);

    let mut attempt = ProvisioningAttempt::for_component(AttemptCause::Manual, AVF);
    let geek = server.fetch_geek(&mut attempt).unwrap();
    provisioner
        .provision_keys(&mut attempt, &component, &geek)
        .unwrap();
    attempt.finish();

    assert_eq!(component.csr_batches(), vec![13, 7]);
    assert_eq!(store.total_keys_for_component(AVF).unwrap(), 20);

    let assigner = KeyAssigner::new(store.clone());
    assert!(assigner
        .get_key_for_client_and_component(AVF, 1000, 2000)
        .unwrap()
        .is_none());

    let now = OffsetDateTime::now_utc();
    let key = assigner.get_or_assign_key(AVF, now, 1000, 2000).unwrap();
    assert_eq!(key.component, AVF);
    assert_eq!(assigner.unassigned_keys(AVF, now).unwrap(), 19);

    let chain = CertificateChain::parse(&key.certificate_chain).unwrap();
    assert!(chain.len() > 1);
    assert!(chain.root().info.is_self_issued());
    assert!(chain.leaf().info.subject.contains("O=AVF"));
    assert_eq!(chain.leaf().info.public_key, key.public_key);

    let again = assigner.get_or_assign_key(AVF, now, 1000, 2000).unwrap();
    assert_eq!(again, key);
    assert_eq!(assigner.unassigned_keys(AVF, now).unwrap(), 19);
}

#[test]
fn scheduled_cycle_on_disk_store() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("keys.db");
    let server = Arc::new(FakeRkpServer::new().unwrap());
    let component = Arc::new(FakeComponent::new(AVF, 13));

    {
        let store = Arc::new(SqliteKeyStore::open(&path).unwrap());
        let mut registry = ComponentRegistry::new();
        registry.register(component.clone());
        let mut periodic = PeriodicProvisioner::new(
            Provisioner::new(store, server.clone(), ProvisioningConfig::default()),
            registry,
        );
        let report = periodic.run_once(AttemptCause::Scheduled).unwrap();
        assert!(report.is_success());
        assert_eq!(report.keys_provisioned(), 6);
    }

    let reopened = SqliteKeyStore::open(&path).unwrap();
    assert_eq!(reopened.total_keys_for_component(AVF).unwrap(), 6);
}
