//! Legacy CryptoAPI hash objects and signing.

use std::ptr;

use winapi::shared::minwindef::FALSE;
use winapi::um::wincrypt::{CryptCreateHash, CryptHashData, CryptSignHashW, HCRYPTHASH};

use super::{dword_len, last_error};
use crate::adapters::backend::NativeError;
use crate::adapters::handle::RawHandle;
use crate::domain::crypto::HashAlgorithm;

pub(super) fn create_hash(
    provider: RawHandle,
    algorithm: HashAlgorithm,
) -> Result<RawHandle, NativeError> {
    let mut hash: HCRYPTHASH = 0;
    let ok = unsafe {
        CryptCreateHash(
            provider.value(),
            algorithm.legacy_alg_id(),
            0,
            0,
            &mut hash,
        )
    };
    if ok == FALSE {
        return Err(last_error("CryptCreateHash"));
    }
    Ok(RawHandle::new(hash))
}

pub(super) fn hash_data(hash: RawHandle, data: &[u8]) -> Result<(), NativeError> {
    let len = dword_len("CryptHashData", data.len())?;
    let ok = unsafe { CryptHashData(hash.value(), data.as_ptr(), len, 0) };
    if ok == FALSE {
        return Err(last_error("CryptHashData"));
    }
    Ok(())
}

/// Returns the length written, or the length required when `signature` is
/// `None`. Output is little-endian.
pub(super) fn sign_hash(
    hash: RawHandle,
    key_spec: u32,
    signature: Option<&mut [u8]>,
) -> Result<usize, NativeError> {
    let (out_ptr, mut len) = match signature {
        Some(out) => (out.as_mut_ptr(), dword_len("CryptSignHashW", out.len())?),
        None => (ptr::null_mut(), 0),
    };
    let ok = unsafe { CryptSignHashW(hash.value(), key_spec, ptr::null(), 0, out_ptr, &mut len) };
    if ok == FALSE {
        return Err(last_error("CryptSignHashW"));
    }
    Ok(len as usize)
}
