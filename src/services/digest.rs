//! Digest engine.
//!
//! Pure, deterministic hashing for the four supported algorithms. The
//! signer hashes through the backend's platform primitive; this module is
//! the reference implementation the software store delegates to and the
//! entry point for callers that only need a digest.

use sha1::Sha1;
use sha2::{Digest, Sha256, Sha384, Sha512};

use crate::domain::crypto::{DigestBytes, HashAlgorithm};

/// Hash `data` with `algorithm`.
#[must_use]
pub fn compute_digest(data: &[u8], algorithm: HashAlgorithm) -> DigestBytes {
    let bytes = match algorithm {
        HashAlgorithm::Sha1 => Sha1::digest(data).to_vec(),
        HashAlgorithm::Sha256 => Sha256::digest(data).to_vec(),
        HashAlgorithm::Sha384 => Sha384::digest(data).to_vec(),
        HashAlgorithm::Sha512 => Sha512::digest(data).to_vec(),
    };
    // Output sizes of the hashers match digest_size() by construction.
    DigestBytes::new(algorithm, bytes).unwrap_or_else(|e| unreachable!("{e}"))
}

/// Hash `data` with the algorithm named by `name`, resolved leniently
/// (unknown or missing names hash with SHA-256).
#[must_use]
pub fn compute_digest_named(data: &[u8], name: Option<&str>) -> DigestBytes {
    compute_digest(data, HashAlgorithm::from_name_lenient(name))
}
