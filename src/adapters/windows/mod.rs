//! Windows system certificate store backend.
//!
//! Store access and the certificate picker go through Crypt32/CryptUI,
//! key-storage keys through NCrypt with BCrypt hashing, and legacy provider
//! keys through CryptoAPI hash objects. Every function here is a thin,
//! single-call wrapper; sequencing and cleanup live in the services layer.

mod capi;
mod cng;
mod release;
mod store;

use std::ffi::OsStr;
use std::os::windows::ffi::OsStrExt;
use std::sync::Arc;

use winapi::um::errhandlingapi::GetLastError;

use crate::adapters::backend::{AcquiredKey, BackendType, CertStoreBackend, NativeError};
use crate::adapters::handle::{HandleReleaser, RawHandle};
use crate::domain::crypto::HashAlgorithm;
use crate::infra::error::SigningResult;

pub use release::WindowsReleaser;

/// Backend over the current user's system stores.
#[derive(Debug, Clone, Default)]
pub struct WindowsBackend {
    releaser: Arc<WindowsReleaser>,
}

impl WindowsBackend {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

/// NUL-terminated UTF-16 copy of `s`.
fn to_wide(s: &str) -> Vec<u16> {
    OsStr::new(s).encode_wide().chain(Some(0)).collect()
}

/// Error for a call that reports failure through `GetLastError`.
fn last_error(api: &'static str) -> NativeError {
    let code = unsafe { GetLastError() };
    NativeError::status(api, code)
}

/// Buffer length as the `DWORD` the native calls take.
fn dword_len(api: &'static str, len: usize) -> Result<u32, NativeError> {
    u32::try_from(len).map_err(|_| NativeError::new(api, format!("length {len} exceeds u32")))
}

impl CertStoreBackend for WindowsBackend {
    fn backend_type(&self) -> BackendType {
        BackendType::WindowsSystem
    }

    fn releaser(&self) -> Arc<dyn HandleReleaser> {
        self.releaser.clone()
    }

    fn open_store(&self, store_name: &str) -> Result<RawHandle, NativeError> {
        store::open_store(store_name)
    }

    fn select_certificate(&self, store: RawHandle) -> Result<Option<RawHandle>, NativeError> {
        store::select_certificate(store)
    }

    fn certificate_der(&self, cert: RawHandle) -> Result<Vec<u8>, NativeError> {
        store::certificate_der(cert)
    }

    fn display_name(&self, cert: RawHandle) -> Result<String, NativeError> {
        store::display_name(cert)
    }

    fn acquire_private_key(&self, cert: RawHandle) -> Result<AcquiredKey, NativeError> {
        store::acquire_private_key(cert)
    }

    fn digest(&self, algorithm: HashAlgorithm, data: &[u8]) -> SigningResult<Vec<u8>> {
        cng::digest(self.releaser(), algorithm, data)
    }

    fn key_algorithm_group(&self, key: RawHandle) -> Result<String, NativeError> {
        cng::key_algorithm_group(key)
    }

    fn modern_sign_hash(
        &self,
        key: RawHandle,
        padding: Option<HashAlgorithm>,
        digest: &[u8],
        signature: Option<&mut [u8]>,
    ) -> Result<usize, NativeError> {
        cng::sign_hash(key, padding, digest, signature)
    }

    fn legacy_create_hash(
        &self,
        provider: RawHandle,
        algorithm: HashAlgorithm,
    ) -> Result<RawHandle, NativeError> {
        capi::create_hash(provider, algorithm)
    }

    fn legacy_hash_data(&self, hash: RawHandle, data: &[u8]) -> Result<(), NativeError> {
        capi::hash_data(hash, data)
    }

    fn legacy_sign_hash(
        &self,
        hash: RawHandle,
        key_spec: u32,
        signature: Option<&mut [u8]>,
    ) -> Result<usize, NativeError> {
        capi::sign_hash(hash, key_spec, signature)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wide_strings_are_nul_terminated() {
        assert_eq!(to_wide("MY"), vec![u16::from(b'M'), u16::from(b'Y'), 0]);
        assert_eq!(to_wide(""), vec![0]);
    }

    #[test]
    fn unknown_store_does_not_open() {
        let backend = WindowsBackend::new();
        assert!(backend.open_store("NoSuchStore-certstore-signer").is_err());
    }
}
