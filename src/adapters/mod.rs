//! Adapter layer over native certificate stores.
//!
//! Provides:
//! - the [`CertStoreBackend`](backend::CertStoreBackend) seam and backend selection
//! - scoped ownership of native handles
//! - the Windows CryptoAPI/CNG backend
//! - an OpenSSL-backed software store for PKCS#12 identities and tests

pub mod backend;
pub mod handle;
pub mod software;
#[cfg(windows)]
pub mod windows;
