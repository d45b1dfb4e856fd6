//! BCrypt hashing and NCrypt key-storage signing.

use std::mem;
use std::ptr;
use std::sync::Arc;

use winapi::ctypes::c_void;
use winapi::shared::bcrypt::{
    BCryptCreateHash, BCryptFinishHash, BCryptGetProperty, BCryptHashData,
    BCryptOpenAlgorithmProvider, BCRYPT_ALG_HANDLE, BCRYPT_HASH_HANDLE,
    BCRYPT_PKCS1_PADDING_INFO,
};
use winapi::um::ncrypt::{NCryptGetProperty, NCryptSignHash};

use super::{dword_len, to_wide};
use crate::adapters::backend::NativeError;
use crate::adapters::handle::{HandleKind, HandleReleaser, RawHandle, ScopedHandle};
use crate::domain::crypto::HashAlgorithm;
use crate::infra::error::{SignStep, SigningError, SigningResult};

const BCRYPT_OBJECT_LENGTH: &str = "ObjectLength";
const BCRYPT_HASH_LENGTH: &str = "HashDigestLength";
const NCRYPT_ALGORITHM_GROUP_PROPERTY: &str = "Algorithm Group";
const BCRYPT_PAD_PKCS1: u32 = 0x0000_0002;

fn nt_failure(step: SignStep, api: &str, status: i32) -> SigningError {
    log::warn!("{api} failed with status {:#010x}", status as u32);
    SigningError::at(step, format!("{api} failed: status {:#010x}", status as u32))
}

fn u32_property(alg: BCRYPT_ALG_HANDLE, name: &str, step: SignStep) -> SigningResult<u32> {
    let property = to_wide(name);
    let mut value: u32 = 0;
    let mut written: u32 = 0;
    let status = unsafe {
        BCryptGetProperty(
            alg,
            property.as_ptr(),
            ptr::addr_of_mut!(value).cast(),
            mem::size_of::<u32>() as u32,
            &mut written,
            0,
        )
    };
    if status < 0 {
        return Err(nt_failure(step, "BCryptGetProperty", status));
    }
    Ok(value)
}

fn zeroed_buffer(len: usize) -> SigningResult<Vec<u8>> {
    let mut buffer = Vec::new();
    buffer.try_reserve_exact(len)?;
    buffer.resize(len, 0);
    Ok(buffer)
}

/// Hash `data` with a BCrypt algorithm provider.
///
/// The hash object buffer is declared before the hash handle, so the handle
/// is destroyed first on every exit.
pub(super) fn digest(
    releaser: Arc<dyn HandleReleaser>,
    algorithm: HashAlgorithm,
    data: &[u8],
) -> SigningResult<Vec<u8>> {
    let alg_id = to_wide(algorithm.cng_algorithm_id());
    let mut alg: BCRYPT_ALG_HANDLE = ptr::null_mut();
    let status = unsafe { BCryptOpenAlgorithmProvider(&mut alg, alg_id.as_ptr(), ptr::null(), 0) };
    if status < 0 {
        return Err(nt_failure(
            SignStep::OpenAlgorithmProvider,
            "BCryptOpenAlgorithmProvider",
            status,
        ));
    }
    let _provider = ScopedHandle::owned(
        releaser.clone(),
        HandleKind::DigestProvider,
        RawHandle::new(alg as usize),
    );

    let object_len = u32_property(alg, BCRYPT_OBJECT_LENGTH, SignStep::QueryObjectLength)?;
    let mut hash_object = zeroed_buffer(object_len as usize)?;
    let hash_len = u32_property(alg, BCRYPT_HASH_LENGTH, SignStep::QueryHashLength)?;
    let mut output = zeroed_buffer(hash_len as usize)?;

    let mut hash: BCRYPT_HASH_HANDLE = ptr::null_mut();
    let status = unsafe {
        BCryptCreateHash(
            alg,
            &mut hash,
            hash_object.as_mut_ptr(),
            object_len,
            ptr::null_mut(),
            0,
            0,
        )
    };
    if status < 0 {
        return Err(nt_failure(SignStep::CreateHash, "BCryptCreateHash", status));
    }
    let _hash_guard =
        ScopedHandle::owned(releaser, HandleKind::DigestHash, RawHandle::new(hash as usize));

    let input_len = dword_len("BCryptHashData", data.len())
        .map_err(|e| SigningError::at(SignStep::HashData, e))?;
    // BCryptHashData does not write through its input pointer.
    let status = unsafe { BCryptHashData(hash, data.as_ptr().cast_mut(), input_len, 0) };
    if status < 0 {
        return Err(nt_failure(SignStep::HashData, "BCryptHashData", status));
    }

    let status = unsafe { BCryptFinishHash(hash, output.as_mut_ptr(), hash_len, 0) };
    if status < 0 {
        return Err(nt_failure(SignStep::FinishHash, "BCryptFinishHash", status));
    }

    Ok(output)
}

pub(super) fn key_algorithm_group(key: RawHandle) -> Result<String, NativeError> {
    let property = to_wide(NCRYPT_ALGORITHM_GROUP_PROPERTY);
    let mut buffer = [0u16; 32];
    let mut written: u32 = 0;
    let status = unsafe {
        NCryptGetProperty(
            key.value(),
            property.as_ptr(),
            buffer.as_mut_ptr().cast(),
            mem::size_of_val(&buffer) as u32,
            &mut written,
            0,
        )
    };
    if status != 0 {
        return Err(NativeError::status("NCryptGetProperty", status as u32));
    }
    let chars = (written as usize / 2).min(buffer.len());
    let group = &buffer[..chars];
    let end = group.iter().position(|&c| c == 0).unwrap_or(group.len());
    Ok(String::from_utf16_lossy(&group[..end]))
}

/// Sign a digest with a key-storage key.
///
/// PKCS#1 v1.5 padding info and its flag are passed only when `padding`
/// names a hash.
pub(super) fn sign_hash(
    key: RawHandle,
    padding: Option<HashAlgorithm>,
    digest: &[u8],
    signature: Option<&mut [u8]>,
) -> Result<usize, NativeError> {
    const API: &str = "NCryptSignHash";
    let alg_id = padding.map(|alg| to_wide(alg.cng_algorithm_id()));
    let mut padding_info = alg_id.as_ref().map(|id| BCRYPT_PKCS1_PADDING_INFO {
        pszAlgId: id.as_ptr(),
    });
    let (padding_ptr, flags): (*mut c_void, u32) = match padding_info.as_mut() {
        Some(info) => ((info as *mut BCRYPT_PKCS1_PADDING_INFO).cast(), BCRYPT_PAD_PKCS1),
        None => (ptr::null_mut(), 0),
    };

    let digest_len = dword_len(API, digest.len())?;
    let (out_ptr, out_len) = match signature {
        Some(out) => (out.as_mut_ptr(), dword_len(API, out.len())?),
        None => (ptr::null_mut(), 0),
    };
    let mut result: u32 = 0;
    let status = unsafe {
        NCryptSignHash(
            key.value(),
            padding_ptr,
            digest.as_ptr().cast_mut(),
            digest_len,
            out_ptr,
            out_len,
            &mut result,
            flags,
        )
    };
    if status != 0 {
        return Err(NativeError::status(API, status as u32));
    }
    Ok(result as usize)
}
