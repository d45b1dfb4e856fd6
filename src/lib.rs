//! Certificate Store Signer Library
//!
//! Selects an identity from the user's certificate store and signs data with
//! its private key, whichever key API generation holds it. Key-storage keys
//! are hashed with the platform digest and signed with PKCS#1 v1.5 padding
//! info for RSA; legacy provider keys are hashed inside the provider and
//! their little-endian output is reversed. Every native handle is released
//! on every exit path.
//!
//! The Windows system store is used on Windows. A software store loaded from
//! PKCS#12 files serves the same calls on any host.

pub mod adapters;
pub mod domain;
pub mod infra;
pub mod services;

pub use adapters::backend::{connect_backend, BackendType, CertStoreBackend, NativeError};
pub use adapters::handle::{HandleKind, RawHandle, ScopedHandle};
pub use adapters::software::{KeyEmulation, SelectionPolicy, SoftwareBackend, SoftwareIdentity};
#[cfg(windows)]
pub use adapters::windows::WindowsBackend;
pub use domain::crypto::{CertificateDer, DigestBytes, HashAlgorithm, RawSignature};
pub use domain::types::{KeyFamily, LegacySpec};
pub use infra::config::{BackendKind, ConfigManager, ExportFormat, SignerConfiguration};
pub use infra::error::{SignStep, SigningError, SigningResult};
pub use services::{
    CertificateOperations, MethodCall, MethodResponse, OperationOptions, ResponseValue,
    SigningSession,
};

/// Error types, re-exported at the crate root.
pub mod error {
    pub use crate::infra::error::*;
}

/// Configuration types, re-exported at the crate root.
pub mod config {
    pub use crate::infra::config::*;
}
