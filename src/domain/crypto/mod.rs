//! Foundational cryptographic domain types.
//!
//! Provides strongly-typed wrappers for:
//! - Hash algorithms and the identifiers each key API expects
//! - Digest values with size validation
//! - Certificate DER with PEM export and subject helpers
//! - Signature values normalized to big-endian order

mod cert;
mod digest_bytes;
mod hash;
mod signature;

pub use cert::CertificateDer;
pub use digest_bytes::{DigestBytes, DigestBytesError};
pub use hash::HashAlgorithm;
pub use signature::RawSignature;
