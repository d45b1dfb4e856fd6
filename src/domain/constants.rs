//! Centralized constants shared by the domain, the backends and the
//! operation surface.

// === Boundary error codes ===

/// Error code for store, selection, encoding and subject failures.
pub const CERTIFICATE_ERROR_CODE: &str = "certificate_error";

/// Error code for key acquisition and signing failures.
pub const SIGNING_ERROR_CODE: &str = "signing_error";

// === Operation names ===

pub const METHOD_SELECT_CERTIFICATE: &str = "selectCertificate";
pub const METHOD_CERTIFICATE_SUBJECT: &str = "certificateSubject";
pub const METHOD_SIGN_DATA: &str = "signData";

/// Personal certificate store of the current user.
pub const DEFAULT_STORE_NAME: &str = "MY";

// === Key specs reported by CryptAcquireCertificatePrivateKey ===

/// `AT_KEYEXCHANGE`
pub const KEY_SPEC_KEY_EXCHANGE: u32 = 1;

/// `AT_SIGNATURE`
pub const KEY_SPEC_SIGNATURE: u32 = 2;

/// `CERT_NCRYPT_KEY_SPEC`
pub const KEY_SPEC_NCRYPT: u32 = 0xFFFF_FFFF;

// === Legacy ALG_ID values ===

pub const CALG_SHA1: u32 = 0x0000_8004;
pub const CALG_SHA_256: u32 = 0x0000_800c;
pub const CALG_SHA_384: u32 = 0x0000_800d;
pub const CALG_SHA_512: u32 = 0x0000_800e;

/// Value of `NCRYPT_ALGORITHM_GROUP_PROPERTY` for RSA keys.
pub const RSA_ALGORITHM_GROUP: &str = "RSA";

// === PEM framing ===

pub const PEM_CERTIFICATE_BEGIN: &str = "-----BEGIN CERTIFICATE-----";
pub const PEM_CERTIFICATE_END: &str = "-----END CERTIFICATE-----";

/// Base64 line width inside PEM bodies.
pub const PEM_LINE_WIDTH: usize = 64;
