//! Release calls for every native handle kind.

use winapi::shared::bcrypt::{BCryptCloseAlgorithmProvider, BCryptDestroyHash};
use winapi::shared::minwindef::FALSE;
use winapi::um::errhandlingapi::GetLastError;
use winapi::um::ncrypt::NCryptFreeObject;
use winapi::um::wincrypt::{
    CertCloseStore, CertFreeCertificateContext, CryptDestroyHash, CryptReleaseContext,
    HCERTSTORE, PCCERT_CONTEXT,
};

use crate::adapters::handle::{HandleKind, HandleReleaser, RawHandle};

const CERT_CLOSE_STORE_CHECK_FLAG: u32 = 0x0000_0002;
const CRYPT_E_PENDING_CLOSE: u32 = 0x8009_2027;

/// Stateless releaser dispatching on [`HandleKind`].
#[derive(Debug, Clone, Copy, Default)]
pub struct WindowsReleaser;

impl HandleReleaser for WindowsReleaser {
    fn release(&self, kind: HandleKind, handle: RawHandle) {
        if handle.is_null() {
            return;
        }
        let value = handle.value();
        let failed = unsafe {
            match kind {
                HandleKind::Store => {
                    let ok = CertCloseStore(value as HCERTSTORE, CERT_CLOSE_STORE_CHECK_FLAG);
                    if ok == FALSE && GetLastError() == CRYPT_E_PENDING_CLOSE {
                        log::warn!("Store {handle} closed with certificate contexts still open");
                        false
                    } else {
                        ok == FALSE
                    }
                }
                HandleKind::Certificate => {
                    CertFreeCertificateContext(value as PCCERT_CONTEXT) == FALSE
                }
                HandleKind::ModernKey => NCryptFreeObject(value) != 0,
                HandleKind::LegacyProvider => CryptReleaseContext(value, 0) == FALSE,
                HandleKind::LegacyHash => CryptDestroyHash(value) == FALSE,
                HandleKind::DigestProvider => BCryptCloseAlgorithmProvider(value as _, 0) < 0,
                HandleKind::DigestHash => BCryptDestroyHash(value as _) < 0,
            }
        };
        if failed {
            log::warn!("Releasing {kind:?} handle {handle} failed");
        }
    }
}
