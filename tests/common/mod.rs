//! Test identities and signature verification helpers.
//!
//! Identities are generated with OpenSSL on the fly: a self-signed
//! certificate whose subject common name is the requested text, plus the
//! matching private key.

#![allow(dead_code)]

use openssl::asn1::Asn1Time;
use openssl::bn::BigNum;
use openssl::ec::{EcGroup, EcKey};
use openssl::ecdsa::EcdsaSig;
use openssl::hash::MessageDigest;
use openssl::nid::Nid;
use openssl::pkey::{PKey, Private};
use openssl::rsa::Rsa;
use openssl::sign::Verifier;
use openssl::x509::{X509Builder, X509NameBuilder, X509};

use certstore_signer::{HashAlgorithm, SoftwareBackend, SoftwareIdentity};

/// Payload used by the end-to-end tests (13 ASCII bytes).
pub const PAYLOAD: &[u8] = b"Hello, world!";

pub fn self_signed(common_name: &str, key: &PKey<Private>) -> X509 {
    let mut name = X509NameBuilder::new().unwrap();
    name.append_entry_by_nid(Nid::COMMONNAME, common_name).unwrap();
    let name = name.build();

    let mut builder = X509Builder::new().unwrap();
    builder.set_version(2).unwrap();
    let serial = BigNum::from_u32(1).unwrap().to_asn1_integer().unwrap();
    builder.set_serial_number(&serial).unwrap();
    builder.set_subject_name(&name).unwrap();
    builder.set_issuer_name(&name).unwrap();
    builder.set_pubkey(key).unwrap();
    builder
        .set_not_before(&Asn1Time::days_from_now(0).unwrap())
        .unwrap();
    builder
        .set_not_after(&Asn1Time::days_from_now(365).unwrap())
        .unwrap();
    builder.sign(key, MessageDigest::sha256()).unwrap();
    builder.build()
}

pub fn rsa_key() -> PKey<Private> {
    PKey::from_rsa(Rsa::generate(2048).unwrap()).unwrap()
}

pub fn ec_key() -> PKey<Private> {
    let group = EcGroup::from_curve_name(Nid::X9_62_PRIME256V1).unwrap();
    PKey::from_ec_key(EcKey::generate(&group).unwrap()).unwrap()
}

/// RSA identity and its certificate.
pub fn rsa_identity(common_name: &str) -> (SoftwareIdentity, X509) {
    let key = rsa_key();
    let cert = self_signed(common_name, &key);
    (SoftwareIdentity::new(&cert, key).unwrap(), cert)
}

/// P-256 identity and its certificate.
pub fn ec_identity(common_name: &str) -> (SoftwareIdentity, X509) {
    let key = ec_key();
    let cert = self_signed(common_name, &key);
    (SoftwareIdentity::new(&cert, key).unwrap(), cert)
}

/// Software store holding one RSA identity, plus its certificate.
pub fn rsa_store(common_name: &str) -> (SoftwareBackend, X509) {
    let (identity, cert) = rsa_identity(common_name);
    (SoftwareBackend::new(vec![identity]), cert)
}

pub fn message_digest(algorithm: HashAlgorithm) -> MessageDigest {
    match algorithm {
        HashAlgorithm::Sha1 => MessageDigest::sha1(),
        HashAlgorithm::Sha256 => MessageDigest::sha256(),
        HashAlgorithm::Sha384 => MessageDigest::sha384(),
        HashAlgorithm::Sha512 => MessageDigest::sha512(),
    }
}

/// Verify a big-endian RSA PKCS#1 v1.5 signature over `data`.
pub fn verify_rsa(cert: &X509, algorithm: HashAlgorithm, data: &[u8], signature: &[u8]) -> bool {
    let public = cert.public_key().unwrap();
    let mut verifier = Verifier::new(message_digest(algorithm), &public).unwrap();
    verifier.update(data).unwrap();
    verifier.verify(signature).unwrap_or(false)
}

/// Verify a fixed-width `r || s` ECDSA signature over `data`.
pub fn verify_ecdsa(cert: &X509, algorithm: HashAlgorithm, data: &[u8], signature: &[u8]) -> bool {
    let (r, s) = signature.split_at(signature.len() / 2);
    let sig = EcdsaSig::from_private_components(
        BigNum::from_slice(r).unwrap(),
        BigNum::from_slice(s).unwrap(),
    )
    .unwrap();
    let digest = openssl::hash::hash(message_digest(algorithm), data).unwrap();
    let public = cert.public_key().unwrap().ec_key().unwrap();
    sig.verify(&digest, &public).unwrap_or(false)
}
