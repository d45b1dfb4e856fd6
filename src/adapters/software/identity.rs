//! Identities held by the software store and the OpenSSL primitives that
//! sign with them.

use std::fmt;
use std::path::Path;

use openssl::ecdsa::EcdsaSig;
use openssl::error::ErrorStack;
use openssl::md::{Md, MdRef};
use openssl::pkcs12::Pkcs12;
use openssl::pkey::{Id, PKey, Private};
use openssl::pkey_ctx::PkeyCtx;
use openssl::rsa::Padding;
use openssl::x509::X509;

use crate::domain::crypto::HashAlgorithm;
use crate::infra::error::{SigningError, SigningResult};

/// Certificate plus optional private key.
#[derive(Clone)]
pub struct SoftwareIdentity {
    cert_der: Vec<u8>,
    key: Option<PKey<Private>>,
    friendly_name: Option<String>,
}

impl SoftwareIdentity {
    pub fn new(cert: &X509, key: PKey<Private>) -> SigningResult<Self> {
        Ok(Self {
            cert_der: encode_cert(cert)?,
            key: Some(key),
            friendly_name: None,
        })
    }

    /// Certificate without key material; key acquisition will fail.
    pub fn certificate_only(cert: &X509) -> SigningResult<Self> {
        Ok(Self {
            cert_der: encode_cert(cert)?,
            key: None,
            friendly_name: None,
        })
    }

    /// Load a PKCS#12 bundle protected by `password`.
    pub fn from_pkcs12_der(der: &[u8], password: &str) -> SigningResult<Self> {
        let parsed = Pkcs12::from_der(der)
            .and_then(|p12| p12.parse2(password))
            .map_err(|e| SigningError::StoreError(format!("Failed to open PKCS#12 bundle: {e}")))?;
        let cert = parsed.cert.ok_or_else(|| {
            SigningError::StoreError("PKCS#12 bundle contains no certificate".to_string())
        })?;
        Ok(Self {
            cert_der: encode_cert(&cert)?,
            key: parsed.pkey,
            friendly_name: None,
        })
    }

    pub fn from_pkcs12_file(path: &Path, password: &str) -> SigningResult<Self> {
        let der = std::fs::read(path).map_err(|e| {
            SigningError::StoreError(format!("Failed to read {}: {e}", path.display()))
        })?;
        Self::from_pkcs12_der(&der, password)
    }

    /// Load a PEM certificate and PEM (PKCS#8 or traditional) private key.
    pub fn from_pem(cert_pem: &[u8], key_pem: &[u8]) -> SigningResult<Self> {
        let cert = X509::from_pem(cert_pem)
            .map_err(|e| SigningError::StoreError(format!("Invalid PEM certificate: {e}")))?;
        let key = PKey::private_key_from_pem(key_pem)
            .map_err(|e| SigningError::StoreError(format!("Invalid PEM private key: {e}")))?;
        Self::new(&cert, key)
    }

    #[must_use]
    pub fn with_friendly_name(mut self, name: impl Into<String>) -> Self {
        self.friendly_name = Some(name.into());
        self
    }

    #[must_use]
    pub fn cert_der(&self) -> &[u8] {
        &self.cert_der
    }
    #[must_use]
    pub fn friendly_name(&self) -> Option<&str> {
        self.friendly_name.as_deref()
    }
    #[must_use]
    pub fn has_private_key(&self) -> bool {
        self.key.is_some()
    }
    pub(crate) fn key(&self) -> Option<&PKey<Private>> {
        self.key.as_ref()
    }
}

impl fmt::Debug for SoftwareIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "SoftwareIdentity(cert_len={}, has_key={})",
            self.cert_der.len(),
            self.key.is_some()
        )
    }
}

fn encode_cert(cert: &X509) -> SigningResult<Vec<u8>> {
    cert.to_der()
        .map_err(|e| SigningError::EncodingError(format!("Failed to encode certificate: {e}")))
}

pub(crate) fn message_digest(algorithm: HashAlgorithm) -> &'static MdRef {
    match algorithm {
        HashAlgorithm::Sha1 => Md::sha1(),
        HashAlgorithm::Sha256 => Md::sha256(),
        HashAlgorithm::Sha384 => Md::sha384(),
        HashAlgorithm::Sha512 => Md::sha512(),
    }
}

pub(crate) fn is_rsa(key: &PKey<Private>) -> bool {
    key.id() == Id::RSA
}

/// Algorithm group name as CNG reports it.
pub(crate) fn algorithm_group(key: &PKey<Private>) -> &'static str {
    match key.id() {
        Id::RSA => "RSA",
        Id::EC => "ECDSA",
        Id::DSA => "DSA",
        _ => "UNKNOWN",
    }
}

/// RSA PKCS#1 v1.5 over a precomputed digest. With `out == None` returns the
/// signature length.
pub(crate) fn rsa_pkcs1_sign(
    key: &PKey<Private>,
    algorithm: HashAlgorithm,
    digest: &[u8],
    out: Option<&mut [u8]>,
) -> Result<usize, ErrorStack> {
    let mut ctx = PkeyCtx::new(key)?;
    ctx.sign_init()?;
    ctx.set_rsa_padding(Padding::PKCS1)?;
    ctx.set_signature_md(message_digest(algorithm))?;
    ctx.sign(digest, out)
}

/// ECDSA over a precomputed digest in fixed-width `r || s` form, the layout
/// CNG returns. With `out == None` returns the signature length.
pub(crate) fn ecdsa_p1363_sign(
    key: &PKey<Private>,
    digest: &[u8],
    out: Option<&mut [u8]>,
) -> Result<usize, ErrorStack> {
    let ec = key.ec_key()?;
    let width = ec.group().degree().div_ceil(8) as usize;
    let len = width * 2;
    let Some(out) = out else {
        return Ok(len);
    };
    let sig = EcdsaSig::sign(digest, &ec)?;
    let r = sig.r().to_vec_padded(width as i32)?;
    let s = sig.s().to_vec_padded(width as i32)?;
    out[..width].copy_from_slice(&r);
    out[width..len].copy_from_slice(&s);
    Ok(len)
}
