//! Dual-path signer.
//!
//! Signs caller data with a classified [`KeyHandle`]:
//! - key-storage keys: hash with the platform digest, attach PKCS#1 v1.5
//!   padding info for RSA keys, sign the digest, return the bytes as is
//! - legacy provider keys: hash inside a provider-bound hash object, sign it,
//!   reverse the little-endian output
//!
//! The path is chosen only by the key family. A failure on one path is
//! returned as is; the other path is never tried.

use crate::adapters::backend::{CertStoreBackend, NativeError};
use crate::adapters::handle::{HandleKind, ScopedHandle};
use crate::domain::constants::RSA_ALGORITHM_GROUP;
use crate::domain::crypto::{DigestBytes, HashAlgorithm, RawSignature};
use crate::domain::types::{KeyFamily, LegacySpec};
use crate::infra::error::{SignStep, SigningError, SigningResult};
use crate::services::key_resolver::KeyHandle;

/// Sign `data` with `key`.
///
/// # Errors
///
/// Returns `SignatureError` sub-coded with the failing step, or
/// `AllocationError` if the signature buffer cannot be reserved.
pub fn sign(
    backend: &dyn CertStoreBackend,
    key: &KeyHandle<'_>,
    algorithm: HashAlgorithm,
    data: &[u8],
) -> SigningResult<RawSignature> {
    log::debug!(
        "Signing {} bytes with {algorithm} via {}",
        data.len(),
        key.family()
    );
    match key.family() {
        KeyFamily::Modern => sign_modern(backend, key.handle(), algorithm, data),
        KeyFamily::Legacy(spec) => sign_legacy(backend, key.handle(), spec, algorithm, data),
    }
}

/// Hash through the backend and check the output against the algorithm.
///
/// # Errors
///
/// Returns `SignatureError` at the failing hashing step, or at `FinishHash`
/// when the platform returns a digest of the wrong length.
pub fn platform_digest(
    backend: &dyn CertStoreBackend,
    algorithm: HashAlgorithm,
    data: &[u8],
) -> SigningResult<DigestBytes> {
    let bytes = backend.digest(algorithm, data)?;
    DigestBytes::new(algorithm, bytes).map_err(|e| SigningError::at(SignStep::FinishHash, e))
}

fn sign_modern(
    backend: &dyn CertStoreBackend,
    key: &ScopedHandle,
    algorithm: HashAlgorithm,
    data: &[u8],
) -> SigningResult<RawSignature> {
    let digest = platform_digest(backend, algorithm, data)?;

    let group = backend
        .key_algorithm_group(key.raw())
        .map_err(|e| native_failure(SignStep::QueryAlgorithmGroup, e))?;
    let padding = (group == RSA_ALGORITHM_GROUP).then_some(algorithm);

    let signature = size_then_fill(|out| {
        backend.modern_sign_hash(key.raw(), padding, digest.as_slice(), out)
    })?;
    Ok(RawSignature::from_modern(algorithm, signature))
}

fn sign_legacy(
    backend: &dyn CertStoreBackend,
    provider: &ScopedHandle,
    spec: LegacySpec,
    algorithm: HashAlgorithm,
    data: &[u8],
) -> SigningResult<RawSignature> {
    let hash_raw = backend
        .legacy_create_hash(provider.raw(), algorithm)
        .map_err(|e| native_failure(SignStep::CreateHash, e))?;
    // Destroyed on every exit from here on.
    let hash = ScopedHandle::owned(backend.releaser(), HandleKind::LegacyHash, hash_raw);

    backend
        .legacy_hash_data(hash.raw(), data)
        .map_err(|e| native_failure(SignStep::HashData, e))?;

    let signature =
        size_then_fill(|out| backend.legacy_sign_hash(hash.raw(), spec.as_u32(), out))?;
    Ok(RawSignature::from_legacy(algorithm, signature))
}

/// Runs a two-phase native call: a length query with no buffer, then the
/// real call into a buffer of that length, truncated to what was written.
fn size_then_fill<F>(mut call: F) -> SigningResult<Vec<u8>>
where
    F: FnMut(Option<&mut [u8]>) -> Result<usize, NativeError>,
{
    let needed = call(None).map_err(|e| native_failure(SignStep::QuerySignatureLength, e))?;
    if needed == 0 {
        return Err(SigningError::at(
            SignStep::QuerySignatureLength,
            "reported signature length is zero",
        ));
    }

    let mut buffer = Vec::new();
    buffer.try_reserve_exact(needed)?;
    buffer.resize(needed, 0);

    let written = call(Some(buffer.as_mut_slice()))
        .map_err(|e| native_failure(SignStep::SignHash, e))?;
    buffer.truncate(written.min(needed));
    Ok(buffer)
}

fn native_failure(step: SignStep, error: NativeError) -> SigningError {
    log::warn!("Signing failed at {step}: {error}");
    SigningError::at(step, error)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn size_then_fill_truncates_to_written() {
        let out = size_then_fill(|buf| match buf {
            None => Ok(8),
            Some(b) => {
                b[..5].copy_from_slice(&[1, 2, 3, 4, 5]);
                Ok(5)
            }
        })
        .unwrap();
        assert_eq!(out, vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn size_then_fill_reports_failing_phase() {
        let err = size_then_fill(|_| Err(NativeError::new("NCryptSignHash", "denied")))
            .unwrap_err();
        assert_eq!(err.sign_step(), Some(SignStep::QuerySignatureLength));

        let err = size_then_fill(|buf| match buf {
            None => Ok(4),
            Some(_) => Err(NativeError::new("NCryptSignHash", "denied")),
        })
        .unwrap_err();
        assert_eq!(err.sign_step(), Some(SignStep::SignHash));
    }

    #[test]
    fn size_then_fill_rejects_zero_length() {
        let err = size_then_fill(|_| Ok(0)).unwrap_err();
        assert_eq!(err.sign_step(), Some(SignStep::QuerySignatureLength));
    }
}
