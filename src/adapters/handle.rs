//! Scoped ownership of native handles.
//!
//! Every store, certificate context, key, hash object and algorithm provider
//! acquired from a backend is wrapped in a [`ScopedHandle`] immediately after
//! acquisition. The wrapper releases the handle when it goes out of scope,
//! at most once, and only when the acquisition transferred ownership to us.

use std::fmt;
use std::sync::Arc;

/// Opaque native handle value (pointer or `ULONG_PTR` sized).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RawHandle(usize);

impl RawHandle {
    pub const NULL: RawHandle = RawHandle(0);

    #[must_use]
    pub fn new(value: usize) -> Self {
        RawHandle(value)
    }
    #[must_use]
    pub fn value(&self) -> usize {
        self.0
    }
    #[must_use]
    pub fn is_null(&self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for RawHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

/// What a handle refers to; selects the matching release call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HandleKind {
    /// `HCERTSTORE`, closed with `CertCloseStore`.
    Store,
    /// `PCCERT_CONTEXT`, freed with `CertFreeCertificateContext`.
    Certificate,
    /// `NCRYPT_KEY_HANDLE`, freed with `NCryptFreeObject`.
    ModernKey,
    /// `HCRYPTPROV`, released with `CryptReleaseContext`.
    LegacyProvider,
    /// `HCRYPTHASH`, destroyed with `CryptDestroyHash`.
    LegacyHash,
    /// `BCRYPT_ALG_HANDLE`, closed with `BCryptCloseAlgorithmProvider`.
    DigestProvider,
    /// `BCRYPT_HASH_HANDLE`, destroyed with `BCryptDestroyHash`.
    DigestHash,
}

/// Frees native handles of every [`HandleKind`].
pub trait HandleReleaser: Send + Sync {
    fn release(&self, kind: HandleKind, handle: RawHandle);
}

/// A native handle released on drop when owned.
pub struct ScopedHandle {
    raw: RawHandle,
    kind: HandleKind,
    owned: bool,
    releaser: Arc<dyn HandleReleaser>,
}

impl ScopedHandle {
    /// Handle whose release is our responsibility.
    pub fn owned(releaser: Arc<dyn HandleReleaser>, kind: HandleKind, raw: RawHandle) -> Self {
        Self::new(releaser, kind, raw, true)
    }

    /// Handle whose lifetime belongs to someone else (e.g. a key cached by
    /// the certificate store). Never released by us.
    pub fn borrowed(releaser: Arc<dyn HandleReleaser>, kind: HandleKind, raw: RawHandle) -> Self {
        Self::new(releaser, kind, raw, false)
    }

    pub fn new(
        releaser: Arc<dyn HandleReleaser>,
        kind: HandleKind,
        raw: RawHandle,
        owned: bool,
    ) -> Self {
        Self {
            raw,
            kind,
            owned,
            releaser,
        }
    }

    #[must_use]
    pub fn raw(&self) -> RawHandle {
        self.raw
    }
    #[must_use]
    pub fn kind(&self) -> HandleKind {
        self.kind
    }
    #[must_use]
    pub fn is_owned(&self) -> bool {
        self.owned
    }

    /// Releases now instead of at end of scope.
    pub fn release(mut self) {
        self.release_once();
    }

    /// Gives up ownership and returns the raw value; nothing is released.
    #[must_use]
    pub fn into_raw(mut self) -> RawHandle {
        self.owned = false;
        self.raw
    }

    fn release_once(&mut self) {
        if self.owned && !self.raw.is_null() {
            log::trace!("Releasing {:?} handle {}", self.kind, self.raw);
            self.releaser.release(self.kind, self.raw);
        }
        self.owned = false;
        self.raw = RawHandle::NULL;
    }
}

impl Drop for ScopedHandle {
    fn drop(&mut self) {
        self.release_once();
    }
}

impl fmt::Debug for ScopedHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ScopedHandle({:?} {}, owned={})",
            self.kind, self.raw, self.owned
        )
    }
}
