//! Signing session: one selected identity and the backend it lives in.

use std::sync::Arc;

use crate::adapters::backend::CertStoreBackend;
use crate::domain::crypto::{CertificateDer, HashAlgorithm, RawSignature};
use crate::infra::error::SigningResult;
use crate::services::key_resolver::{self, KeyHandle};
use crate::services::selector::{self, ExportedIdentity, Identity};
use crate::services::signer;

/// An identity selected from a store, kept until the session is dropped.
///
/// Dropping the session releases the certificate context and closes the
/// store.
pub struct SigningSession {
    identity: Identity,
    backend: Arc<dyn CertStoreBackend>,
}

impl SigningSession {
    /// Open `store_name` and let the user select an identity.
    ///
    /// # Errors
    ///
    /// Returns `StoreError`, `SelectionCancelled`, `SelectionError` or
    /// `EncodingError`. Handles opened before the failure are released.
    pub fn select(backend: Arc<dyn CertStoreBackend>, store_name: &str) -> SigningResult<Self> {
        let store = selector::open_store(backend.as_ref(), store_name)?;
        let identity = selector::select_certificate(backend.as_ref(), store)?;
        Ok(Self { identity, backend })
    }

    #[must_use]
    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    #[must_use]
    pub fn certificate(&self) -> &CertificateDer {
        self.identity.certificate()
    }

    /// PEM text of the selected certificate.
    #[must_use]
    pub fn certificate_pem(&self) -> String {
        self.identity.certificate().to_pem()
    }

    /// Display subject of the selected certificate.
    ///
    /// # Errors
    ///
    /// Returns `NameResolutionError` when no name can be resolved.
    pub fn subject(&self) -> SigningResult<String> {
        selector::subject_name(self.backend.as_ref(), &self.identity)
    }

    /// PEM text plus subject.
    ///
    /// # Errors
    ///
    /// Returns `EncodingError` or `NameResolutionError`.
    pub fn export(&self) -> SigningResult<ExportedIdentity> {
        selector::export_selected(self.backend.as_ref(), &self.identity)
    }

    /// Acquire the private key of the selected identity.
    ///
    /// # Errors
    ///
    /// Returns `KeyAcquisitionError` or `UnsupportedKeyError`.
    pub fn acquire_key(&self) -> SigningResult<KeyHandle<'_>> {
        key_resolver::acquire_key(self.backend.as_ref(), &self.identity)
    }

    /// Sign `data` with the selected identity's private key.
    ///
    /// The key is acquired for this call and released before returning.
    ///
    /// # Errors
    ///
    /// Returns key acquisition errors or `SignatureError`/`AllocationError`
    /// from the signer.
    pub fn sign(&self, algorithm: HashAlgorithm, data: &[u8]) -> SigningResult<RawSignature> {
        let key = self.acquire_key()?;
        let signature = signer::sign(self.backend.as_ref(), &key, algorithm, data)?;
        log::info!(
            "Signed {} bytes with {algorithm} ({} byte signature)",
            data.len(),
            signature.as_slice().len()
        );
        Ok(signature)
    }
}

impl Drop for SigningSession {
    fn drop(&mut self) {
        log::debug!(
            "Closing session on store {}",
            self.identity.store_handle().raw()
        );
    }
}

impl std::fmt::Debug for SigningSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SigningSession")
            .field("backend", &self.backend.backend_type())
            .field("identity", &self.identity)
            .finish()
    }
}
