//! Platform certificate-store backend trait.
//!
//! A backend exposes the primitive native calls of a certificate store and
//! its two key APIs. Every decision (key classification, path dispatch,
//! padding selection, size-then-fill, byte-order normalization, cleanup) is
//! made above this trait by the services layer, so it behaves identically
//! whichever backend is plugged in:
//! - Windows system store via Crypt32/NCrypt/BCrypt/CryptoAPI (`cfg(windows)`)
//! - In-process software store loaded from PKCS#12 or PEM files

use std::sync::Arc;

use thiserror::Error;

use crate::adapters::handle::{HandleReleaser, RawHandle};
use crate::domain::crypto::HashAlgorithm;
use crate::infra::config::{BackendKind, SignerConfiguration};
use crate::infra::error::{SigningError, SigningResult};

/// Failure of a single native call.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{api} failed: {detail}")]
pub struct NativeError {
    pub api: &'static str,
    pub detail: String,
}

impl NativeError {
    pub fn new(api: &'static str, detail: impl Into<String>) -> Self {
        Self {
            api,
            detail: detail.into(),
        }
    }

    /// Failure reported as a numeric status (`GetLastError`, `NTSTATUS`,
    /// `SECURITY_STATUS`).
    #[must_use]
    pub fn status(api: &'static str, status: u32) -> Self {
        Self::new(api, format!("status {status:#010x}"))
    }
}

/// Backend implementation type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendType {
    /// Windows system certificate store.
    #[cfg(windows)]
    WindowsSystem,
    /// In-process store backed by OpenSSL.
    Software,
}

impl std::fmt::Display for BackendType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            #[cfg(windows)]
            BackendType::WindowsSystem => write!(f, "Windows system store"),
            BackendType::Software => write!(f, "software store"),
        }
    }
}

/// Private key handle as returned by the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AcquiredKey {
    pub handle: RawHandle,
    /// Raw key spec (`AT_SIGNATURE`, `AT_KEYEXCHANGE`, `CERT_NCRYPT_KEY_SPEC`...).
    pub key_spec: u32,
    /// Whether the caller must free the handle (`pfCallerFreeProvOrNCryptKey`).
    pub caller_owns: bool,
}

/// Primitive operations of a certificate store with dual key APIs.
pub trait CertStoreBackend: Send + Sync {
    /// Get the backend type.
    fn backend_type(&self) -> BackendType;

    /// Releaser used to wrap every handle this backend hands out.
    fn releaser(&self) -> Arc<dyn HandleReleaser>;

    /// Open the named certificate store of the current user.
    fn open_store(&self, store_name: &str) -> Result<RawHandle, NativeError>;

    /// Let the user pick a certificate. `Ok(None)` means nothing was chosen.
    fn select_certificate(&self, store: RawHandle) -> Result<Option<RawHandle>, NativeError>;

    /// DER encoding of a certificate context.
    fn certificate_der(&self, cert: RawHandle) -> Result<Vec<u8>, NativeError>;

    /// Simple display name of a certificate. May be empty.
    fn display_name(&self, cert: RawHandle) -> Result<String, NativeError>;

    /// Acquire the private key of a certificate, preferring the key-storage
    /// API.
    fn acquire_private_key(&self, cert: RawHandle) -> Result<AcquiredKey, NativeError>;

    /// Hash `data` with the platform hashing primitive.
    ///
    /// # Errors
    ///
    /// Returns `SignatureError` sub-coded with the failing hashing step.
    fn digest(&self, algorithm: HashAlgorithm, data: &[u8]) -> SigningResult<Vec<u8>>;

    /// Algorithm group of a key-storage key (`"RSA"`, `"ECDSA"`...).
    fn key_algorithm_group(&self, key: RawHandle) -> Result<String, NativeError>;

    /// Sign a digest with a key-storage key.
    ///
    /// `padding` carries the hash identifier for PKCS#1 v1.5 padding info;
    /// `None` means no padding info. When `signature` is `None` only the
    /// required length is returned.
    fn modern_sign_hash(
        &self,
        key: RawHandle,
        padding: Option<HashAlgorithm>,
        digest: &[u8],
        signature: Option<&mut [u8]>,
    ) -> Result<usize, NativeError>;

    /// Create a hash object bound to a legacy provider.
    fn legacy_create_hash(
        &self,
        provider: RawHandle,
        algorithm: HashAlgorithm,
    ) -> Result<RawHandle, NativeError>;

    /// Feed data into a legacy hash object.
    fn legacy_hash_data(&self, hash: RawHandle, data: &[u8]) -> Result<(), NativeError>;

    /// Sign the value of a legacy hash object. Output is little-endian.
    /// When `signature` is `None` only the required length is returned.
    fn legacy_sign_hash(
        &self,
        hash: RawHandle,
        key_spec: u32,
        signature: Option<&mut [u8]>,
    ) -> Result<usize, NativeError>;
}

/// Environment variable holding the PKCS#12 password for the software store.
pub const PKCS12_PASSWORD_ENV: &str = "CERTSTORE_PKCS12_PASSWORD";

/// Connect the backend named by the configuration.
///
/// # Errors
///
/// Returns `StoreError` if the backend is unavailable on this platform or
/// its store cannot be loaded.
pub fn connect_backend(config: &SignerConfiguration) -> SigningResult<Arc<dyn CertStoreBackend>> {
    match config.backend {
        BackendKind::System => connect_system_backend(),
        BackendKind::Pkcs12 => {
            let path = config.pkcs12_path.as_ref().ok_or_else(|| {
                SigningError::ConfigurationError(
                    "pkcs12 backend selected but no pkcs12_path configured".to_string(),
                )
            })?;
            let password = std::env::var(PKCS12_PASSWORD_ENV).unwrap_or_default();
            log::info!("Using software store from {}", path.display());
            let backend =
                crate::adapters::software::SoftwareBackend::from_pkcs12_file(path, &password)?
                    .with_store_name(config.store_name.clone());
            Ok(Arc::new(backend))
        }
    }
}

#[cfg(windows)]
fn connect_system_backend() -> SigningResult<Arc<dyn CertStoreBackend>> {
    log::info!("Using Windows system certificate store");
    Ok(Arc::new(crate::adapters::windows::WindowsBackend::new()))
}

#[cfg(not(windows))]
fn connect_system_backend() -> SigningResult<Arc<dyn CertStoreBackend>> {
    Err(SigningError::StoreError(
        "The system certificate store is only available on Windows; use the pkcs12 backend"
            .to_string(),
    ))
}
