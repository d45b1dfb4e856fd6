//! Crypt32 store, picker, name and key-acquisition calls.

use std::ptr;

use winapi::ctypes::c_void;
use winapi::shared::minwindef::{BOOL, DWORD, FALSE};
use winapi::um::wincrypt::{
    CertGetNameStringW, CertOpenStore, CryptAcquireCertificatePrivateKey, CERT_CONTEXT,
    HCERTSTORE, HCRYPTPROV_OR_NCRYPT_KEY_HANDLE, PCCERT_CONTEXT,
};

use super::{last_error, to_wide};
use crate::adapters::backend::{AcquiredKey, NativeError};
use crate::adapters::handle::RawHandle;

const CERT_STORE_PROV_SYSTEM_W: usize = 10;
const X509_ASN_ENCODING: DWORD = 0x0000_0001;
const CERT_STORE_OPEN_EXISTING_FLAG: DWORD = 0x0000_4000;
const CERT_SYSTEM_STORE_CURRENT_USER: DWORD = 0x0001_0000;
const CERT_NAME_SIMPLE_DISPLAY_TYPE: DWORD = 4;
const CRYPT_ACQUIRE_COMPARE_KEY_FLAG: DWORD = 0x0000_0004;
const CRYPT_ACQUIRE_PREFER_NCRYPT_KEY_FLAG: DWORD = 0x0002_0000;
const CRYPTUI_SELECT_LOCATION_COLUMN: DWORD = 0x0000_0010;

#[link(name = "cryptui")]
extern "system" {
    fn CryptUIDlgSelectCertificateFromStore(
        hCertStore: HCERTSTORE,
        hwnd: *mut c_void,
        pwszTitle: *const u16,
        pwszDisplayString: *const u16,
        dwDontUseColumn: DWORD,
        dwFlags: DWORD,
        pvReserved: *mut c_void,
    ) -> PCCERT_CONTEXT;
}

pub(super) fn open_store(store_name: &str) -> Result<RawHandle, NativeError> {
    let name = to_wide(store_name);
    let store = unsafe {
        CertOpenStore(
            CERT_STORE_PROV_SYSTEM_W as _,
            X509_ASN_ENCODING,
            0,
            CERT_STORE_OPEN_EXISTING_FLAG | CERT_SYSTEM_STORE_CURRENT_USER,
            name.as_ptr().cast(),
        )
    };
    if store.is_null() {
        return Err(last_error("CertOpenStore"));
    }
    Ok(RawHandle::new(store as usize))
}

pub(super) fn select_certificate(store: RawHandle) -> Result<Option<RawHandle>, NativeError> {
    let cert = unsafe {
        CryptUIDlgSelectCertificateFromStore(
            store.value() as HCERTSTORE,
            ptr::null_mut(),
            ptr::null(),
            ptr::null(),
            CRYPTUI_SELECT_LOCATION_COLUMN,
            0,
            ptr::null_mut(),
        )
    };
    if cert.is_null() {
        log::debug!("Certificate picker returned no certificate");
        return Ok(None);
    }
    Ok(Some(RawHandle::new(cert as usize)))
}

fn context<'a>(cert: RawHandle) -> Result<&'a CERT_CONTEXT, NativeError> {
    let ptr = cert.value() as PCCERT_CONTEXT;
    // Non-null contexts come from the picker and stay valid until freed.
    unsafe { ptr.as_ref() }.ok_or_else(|| NativeError::new("CERT_CONTEXT", "null context"))
}

pub(super) fn certificate_der(cert: RawHandle) -> Result<Vec<u8>, NativeError> {
    let ctx = context(cert)?;
    if ctx.pbCertEncoded.is_null() || ctx.cbCertEncoded == 0 {
        return Ok(Vec::new());
    }
    let der =
        unsafe { std::slice::from_raw_parts(ctx.pbCertEncoded, ctx.cbCertEncoded as usize) };
    Ok(der.to_vec())
}

pub(super) fn display_name(cert: RawHandle) -> Result<String, NativeError> {
    let ctx: PCCERT_CONTEXT = context(cert)?;
    let name_string = |buffer: *mut u16, len: DWORD| unsafe {
        CertGetNameStringW(
            ctx,
            CERT_NAME_SIMPLE_DISPLAY_TYPE,
            0,
            ptr::null_mut(),
            buffer,
            len,
        )
    };

    // The count includes the terminator, so 1 means an empty name.
    let needed = name_string(ptr::null_mut(), 0);
    if needed <= 1 {
        return Ok(String::new());
    }
    let mut buffer = vec![0u16; needed as usize];
    let written = name_string(buffer.as_mut_ptr(), needed);
    if written == 0 {
        return Err(last_error("CertGetNameStringW"));
    }
    buffer.truncate((written as usize).saturating_sub(1));
    Ok(String::from_utf16_lossy(&buffer))
}

pub(super) fn acquire_private_key(cert: RawHandle) -> Result<AcquiredKey, NativeError> {
    let ctx: PCCERT_CONTEXT = context(cert)?;
    let mut handle: HCRYPTPROV_OR_NCRYPT_KEY_HANDLE = 0;
    let mut key_spec: DWORD = 0;
    let mut caller_free: BOOL = FALSE;
    let ok = unsafe {
        CryptAcquireCertificatePrivateKey(
            ctx,
            CRYPT_ACQUIRE_PREFER_NCRYPT_KEY_FLAG | CRYPT_ACQUIRE_COMPARE_KEY_FLAG,
            ptr::null_mut(),
            &mut handle,
            &mut key_spec,
            &mut caller_free,
        )
    };
    if ok == FALSE {
        return Err(last_error("CryptAcquireCertificatePrivateKey"));
    }
    Ok(AcquiredKey {
        handle: RawHandle::new(handle),
        key_spec,
        caller_owns: caller_free != FALSE,
    })
}
