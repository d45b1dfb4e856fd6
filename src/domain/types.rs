//! Key family types.
//!
//! A private key resolved from the certificate store belongs to one of two
//! API generations. The family decides which signing path applies.

use std::fmt;

use crate::domain::constants::{KEY_SPEC_KEY_EXCHANGE, KEY_SPEC_NCRYPT, KEY_SPEC_SIGNATURE};
use crate::infra::error::{SigningError, SigningResult};

/// Legacy CryptoAPI key container slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LegacySpec {
    /// `AT_SIGNATURE`
    Signature,
    /// `AT_KEYEXCHANGE`
    KeyExchange,
}

impl LegacySpec {
    #[must_use]
    pub fn as_u32(&self) -> u32 {
        match self {
            LegacySpec::Signature => KEY_SPEC_SIGNATURE,
            LegacySpec::KeyExchange => KEY_SPEC_KEY_EXCHANGE,
        }
    }
}

/// Which key API a handle belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyFamily {
    /// Key-storage provider (CNG `NCRYPT_KEY_HANDLE`).
    Modern,
    /// Cryptographic service provider (CryptoAPI `HCRYPTPROV`).
    Legacy(LegacySpec),
}

impl KeyFamily {
    /// Classifies the key spec reported by `CryptAcquireCertificatePrivateKey`.
    pub fn from_key_spec(spec: u32) -> SigningResult<Self> {
        match spec {
            KEY_SPEC_NCRYPT => Ok(KeyFamily::Modern),
            KEY_SPEC_SIGNATURE => Ok(KeyFamily::Legacy(LegacySpec::Signature)),
            KEY_SPEC_KEY_EXCHANGE => Ok(KeyFamily::Legacy(LegacySpec::KeyExchange)),
            other => Err(SigningError::UnsupportedKeyError(other)),
        }
    }

    #[must_use]
    pub fn key_spec(&self) -> u32 {
        match self {
            KeyFamily::Modern => KEY_SPEC_NCRYPT,
            KeyFamily::Legacy(spec) => spec.as_u32(),
        }
    }
}

impl fmt::Display for KeyFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyFamily::Modern => write!(f, "CNG key storage"),
            KeyFamily::Legacy(LegacySpec::Signature) => write!(f, "CryptoAPI (AT_SIGNATURE)"),
            KeyFamily::Legacy(LegacySpec::KeyExchange) => write!(f, "CryptoAPI (AT_KEYEXCHANGE)"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_known_specs() {
        assert_eq!(KeyFamily::from_key_spec(0xFFFF_FFFF).unwrap(), KeyFamily::Modern);
        assert_eq!(
            KeyFamily::from_key_spec(2).unwrap(),
            KeyFamily::Legacy(LegacySpec::Signature)
        );
        assert_eq!(
            KeyFamily::from_key_spec(1).unwrap(),
            KeyFamily::Legacy(LegacySpec::KeyExchange)
        );
    }

    #[test]
    fn rejects_other_specs() {
        for spec in [0, 3, 0x8000_0000] {
            match KeyFamily::from_key_spec(spec) {
                Err(SigningError::UnsupportedKeyError(s)) => assert_eq!(s, spec),
                other => panic!("expected unsupported key error, got {other:?}"),
            }
        }
    }

    #[test]
    fn key_spec_roundtrip() {
        for family in [
            KeyFamily::Modern,
            KeyFamily::Legacy(LegacySpec::Signature),
            KeyFamily::Legacy(LegacySpec::KeyExchange),
        ] {
            assert_eq!(KeyFamily::from_key_spec(family.key_spec()).unwrap(), family);
        }
    }
}
