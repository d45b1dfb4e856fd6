//! Private key acquisition and key-family classification.

use std::marker::PhantomData;

use crate::adapters::backend::CertStoreBackend;
use crate::adapters::handle::{HandleKind, ScopedHandle};
use crate::domain::constants::KEY_SPEC_NCRYPT;
use crate::domain::types::KeyFamily;
use crate::infra::error::{SigningError, SigningResult};
use crate::services::selector::Identity;

/// Private key of an identity, tagged with the API family that serves it.
///
/// Borrows the identity it was resolved from, so it cannot outlive the
/// store session. The native handle is released on drop only when the
/// store transferred ownership at acquisition.
#[derive(Debug)]
pub struct KeyHandle<'a> {
    handle: ScopedHandle,
    family: KeyFamily,
    _identity: PhantomData<&'a Identity>,
}

impl KeyHandle<'_> {
    #[must_use]
    pub fn family(&self) -> KeyFamily {
        self.family
    }
    #[must_use]
    pub fn handle(&self) -> &ScopedHandle {
        &self.handle
    }
    /// Whether dropping this key frees the native handle.
    #[must_use]
    pub fn is_owned(&self) -> bool {
        self.handle.is_owned()
    }
}

/// Acquire and classify the private key of `identity`.
///
/// # Errors
///
/// Returns `KeyAcquisitionError` when the certificate has no usable private
/// key and `UnsupportedKeyError` when the key spec is neither the key-storage
/// spec nor a legacy signature/exchange spec. In the latter case the handle
/// is still released if it was ours.
pub fn acquire_key<'a>(
    backend: &dyn CertStoreBackend,
    identity: &'a Identity,
) -> SigningResult<KeyHandle<'a>> {
    let acquired = backend
        .acquire_private_key(identity.cert_handle().raw())
        .map_err(|e| {
            log::warn!("Private key acquisition failed: {e}");
            SigningError::KeyAcquisitionError(e.to_string())
        })?;

    let kind = if acquired.key_spec == KEY_SPEC_NCRYPT {
        HandleKind::ModernKey
    } else {
        HandleKind::LegacyProvider
    };
    let handle = ScopedHandle::new(
        backend.releaser(),
        kind,
        acquired.handle,
        acquired.caller_owns,
    );

    let family = KeyFamily::from_key_spec(acquired.key_spec).inspect_err(|e| {
        log::warn!("{e}");
    })?;
    log::debug!(
        "Acquired {family} key (caller owns handle: {})",
        acquired.caller_owns
    );
    Ok(KeyHandle {
        handle,
        family,
        _identity: PhantomData,
    })
}
