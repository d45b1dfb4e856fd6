//! Identity loading from PKCS#12 bundles and backend selection.

mod common;

use std::path::PathBuf;

use openssl::pkcs12::Pkcs12;
use tempfile::TempDir;

use certstore_signer::{
    connect_backend, BackendKind, CertificateOperations, HashAlgorithm, OperationOptions,
    SignerConfiguration, SigningError, SoftwareBackend, SoftwareIdentity,
};

use common::{rsa_key, self_signed, verify_rsa, PAYLOAD};

fn bundle(common_name: &str, password: &str) -> (Vec<u8>, openssl::x509::X509) {
    let key = rsa_key();
    let cert = self_signed(common_name, &key);
    let mut builder = Pkcs12::builder();
    builder.name(common_name).pkey(&key).cert(&cert);
    let der = builder.build2(password).unwrap().to_der().unwrap();
    (der, cert)
}

#[test]
fn test_pkcs12_identity_signs() {
    let (der, cert) = bundle("Bundle Identity", "correct horse");
    let identity = SoftwareIdentity::from_pkcs12_der(&der, "correct horse").unwrap();
    assert!(identity.has_private_key());
    assert_eq!(identity.cert_der(), cert.to_der().unwrap().as_slice());

    let backend = SoftwareBackend::new(vec![identity]);
    let ops = CertificateOperations::new(std::sync::Arc::new(backend), OperationOptions::default());
    ops.select_certificate().unwrap();
    assert_eq!(ops.certificate_subject().unwrap(), "Bundle Identity");
    let signature = ops.sign_data(Some("sha-256"), PAYLOAD).unwrap();
    assert!(verify_rsa(&cert, HashAlgorithm::Sha256, PAYLOAD, &signature));
}

#[test]
fn test_pkcs12_wrong_password_is_store_error() {
    let (der, _) = bundle("Locked", "right");
    let err = SoftwareIdentity::from_pkcs12_der(&der, "wrong").unwrap_err();
    assert!(matches!(err, SigningError::StoreError(_)));
    assert_eq!(err.error_code(), "certificate_error");
}

#[test]
fn test_missing_pkcs12_file_is_store_error() {
    let err = SoftwareIdentity::from_pkcs12_file(&PathBuf::from("does-not-exist.p12"), "")
        .unwrap_err();
    assert!(matches!(err, SigningError::StoreError(_)));
}

#[test]
fn test_connect_pkcs12_backend_from_config() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("identity.p12");
    let (der, cert) = bundle("Configured Bundle", "");
    std::fs::write(&path, der).unwrap();

    let config = SignerConfiguration {
        backend: BackendKind::Pkcs12,
        pkcs12_path: Some(path),
        store_name: "Signing".to_string(),
        ..SignerConfiguration::default()
    };
    let backend = connect_backend(&config).unwrap();
    let ops = CertificateOperations::new(backend, OperationOptions::from_config(&config).unwrap());

    ops.select_certificate().unwrap();
    let signature = ops.sign_data(None, PAYLOAD).unwrap();
    assert!(verify_rsa(&cert, HashAlgorithm::Sha256, PAYLOAD, &signature));
}

#[test]
fn test_pkcs12_backend_requires_path() {
    let config = SignerConfiguration {
        backend: BackendKind::Pkcs12,
        pkcs12_path: None,
        ..SignerConfiguration::default()
    };
    assert!(matches!(
        connect_backend(&config),
        Err(SigningError::ConfigurationError(_))
    ));
    assert!(config.validate().is_err());
}

#[cfg(not(windows))]
#[test]
fn test_system_store_unavailable_off_windows() {
    let err = connect_backend(&SignerConfiguration::default()).err().unwrap();
    assert!(matches!(err, SigningError::StoreError(_)));
}
