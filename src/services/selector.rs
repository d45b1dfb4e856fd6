//! Store access and certificate selection.

use crate::adapters::backend::CertStoreBackend;
use crate::adapters::handle::{HandleKind, ScopedHandle};
use crate::domain::crypto::CertificateDer;
use crate::infra::error::{SigningError, SigningResult};

/// A certificate picked by the user, with the store it came from.
///
/// Field order matters: the certificate context is released before the
/// store is closed.
#[derive(Debug)]
pub struct Identity {
    cert: ScopedHandle,
    store: ScopedHandle,
    der: CertificateDer,
}

/// Certificate text and subject echoed back to the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportedIdentity {
    pub pem: String,
    pub subject: String,
}

impl Identity {
    pub(crate) fn cert_handle(&self) -> &ScopedHandle {
        &self.cert
    }
    pub(crate) fn store_handle(&self) -> &ScopedHandle {
        &self.store
    }
    #[must_use]
    pub fn certificate(&self) -> &CertificateDer {
        &self.der
    }
}

/// Open the current user's certificate store.
///
/// # Errors
///
/// Returns `StoreError` if the store cannot be opened.
pub fn open_store(backend: &dyn CertStoreBackend, store_name: &str) -> SigningResult<ScopedHandle> {
    let raw = backend.open_store(store_name).map_err(|e| {
        log::warn!("Opening store '{store_name}' failed: {e}");
        SigningError::StoreError(format!("Cannot open certificate store '{store_name}': {e}"))
    })?;
    log::debug!("Opened certificate store '{store_name}' ({raw})");
    Ok(ScopedHandle::owned(backend.releaser(), HandleKind::Store, raw))
}

/// Present the certificates of `store` and return the chosen identity.
///
/// # Errors
///
/// Returns `SelectionCancelled` if nothing was chosen, `SelectionError` if
/// the picker failed and `EncodingError` if the certificate bytes cannot be
/// read.
pub fn select_certificate(
    backend: &dyn CertStoreBackend,
    store: ScopedHandle,
) -> SigningResult<Identity> {
    let raw = backend
        .select_certificate(store.raw())
        .map_err(|e| {
            log::warn!("Certificate selection failed: {e}");
            SigningError::SelectionError(e.to_string())
        })?
        .ok_or(SigningError::SelectionCancelled)?;
    let cert = ScopedHandle::owned(backend.releaser(), HandleKind::Certificate, raw);

    let der = backend
        .certificate_der(cert.raw())
        .map_err(|e| SigningError::EncodingError(e.to_string()))?;
    if der.is_empty() {
        return Err(SigningError::EncodingError(
            "Certificate has no encoded bytes".to_string(),
        ));
    }
    log::info!("Selected certificate ({} bytes)", der.len());
    Ok(Identity {
        cert,
        store,
        der: CertificateDer::from_der(der),
    })
}

/// Display subject of an identity.
///
/// Uses the platform's simple display name, falling back to the subject
/// common name and then to the full subject parsed from the certificate.
///
/// # Errors
///
/// Returns `NameResolutionError` when no name can be produced.
pub fn subject_name(backend: &dyn CertStoreBackend, identity: &Identity) -> SigningResult<String> {
    let name = backend
        .display_name(identity.cert.raw())
        .map_err(|e| SigningError::NameResolutionError(e.to_string()))?;
    let name = name.trim();
    if !name.is_empty() {
        return Ok(name.to_string());
    }
    identity
        .der
        .subject_common_name()
        .or_else(|| identity.der.subject_rfc4514())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| {
            SigningError::NameResolutionError("Certificate has no subject name".to_string())
        })
}

/// PEM text and display subject of the selected identity.
///
/// # Errors
///
/// Returns `EncodingError` if the certificate cannot be encoded and
/// `NameResolutionError` if the subject cannot be resolved.
pub fn export_selected(
    backend: &dyn CertStoreBackend,
    identity: &Identity,
) -> SigningResult<ExportedIdentity> {
    if identity.der.is_empty() {
        return Err(SigningError::EncodingError(
            "Certificate has no encoded bytes".to_string(),
        ));
    }
    Ok(ExportedIdentity {
        pem: identity.der.to_pem(),
        subject: subject_name(backend, identity)?,
    })
}
