//! Hash algorithm domain type.
//!
//! Provides the `HashAlgorithm` enumeration (SHA-1, SHA-256, SHA-384,
//! SHA-512) together with the identifiers each key API expects: the CNG
//! algorithm name used for BCrypt hashing and PKCS#1 padding info, and the
//! legacy CryptoAPI `ALG_ID`.

use std::fmt;
use std::str::FromStr;

use crate::domain::constants;
use crate::infra::error::SigningError;

/// Supported hash algorithms
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum HashAlgorithm {
    Sha1,
    #[default]
    Sha256,
    Sha384,
    Sha512,
}

impl HashAlgorithm {
    pub const ALL: [HashAlgorithm; 4] = [
        HashAlgorithm::Sha1,
        HashAlgorithm::Sha256,
        HashAlgorithm::Sha384,
        HashAlgorithm::Sha512,
    ];

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            HashAlgorithm::Sha1 => "sha-1",
            HashAlgorithm::Sha256 => "sha-256",
            HashAlgorithm::Sha384 => "sha-384",
            HashAlgorithm::Sha512 => "sha-512",
        }
    }

    #[must_use]
    pub fn digest_size(&self) -> usize {
        match self {
            HashAlgorithm::Sha1 => 20,
            HashAlgorithm::Sha256 => 32,
            HashAlgorithm::Sha384 => 48,
            HashAlgorithm::Sha512 => 64,
        }
    }

    /// CNG algorithm identifier, also used as `pszAlgId` in PKCS#1 padding info.
    #[must_use]
    pub fn cng_algorithm_id(&self) -> &'static str {
        match self {
            HashAlgorithm::Sha1 => "SHA1",
            HashAlgorithm::Sha256 => "SHA256",
            HashAlgorithm::Sha384 => "SHA384",
            HashAlgorithm::Sha512 => "SHA512",
        }
    }

    /// Legacy CryptoAPI `ALG_ID`.
    #[must_use]
    pub fn legacy_alg_id(&self) -> u32 {
        match self {
            HashAlgorithm::Sha1 => constants::CALG_SHA1,
            HashAlgorithm::Sha256 => constants::CALG_SHA_256,
            HashAlgorithm::Sha384 => constants::CALG_SHA_384,
            HashAlgorithm::Sha512 => constants::CALG_SHA_512,
        }
    }

    /// Lenient parse used at the signing boundary.
    ///
    /// Case-insensitive substring match, so `"SHA256withRSA"` selects
    /// SHA-256. Absent, empty or unrecognized names resolve to SHA-256.
    #[must_use]
    pub fn from_name_lenient(name: Option<&str>) -> Self {
        name.map_or_else(HashAlgorithm::default, |name| {
            Self::from_name_or(name, HashAlgorithm::default())
        })
    }

    /// Substring match of `name`, or `fallback` when no supported algorithm
    /// is named.
    #[must_use]
    pub fn from_name_or(name: &str, fallback: Self) -> Self {
        Self::match_substring(&name.to_ascii_lowercase()).unwrap_or_else(|| {
            log::debug!("Unrecognized hash algorithm '{name}', using {fallback}");
            fallback
        })
    }

    fn match_substring(lower: &str) -> Option<Self> {
        if lower.contains("sha-1") || lower.contains("sha1") {
            Some(HashAlgorithm::Sha1)
        } else if lower.contains("sha-256") || lower.contains("sha256") {
            Some(HashAlgorithm::Sha256)
        } else if lower.contains("sha-384") || lower.contains("sha384") {
            Some(HashAlgorithm::Sha384)
        } else if lower.contains("sha-512") || lower.contains("sha512") {
            Some(HashAlgorithm::Sha512)
        } else {
            None
        }
    }
}

/// Strict parse: the name must contain one of the supported algorithms.
impl FromStr for HashAlgorithm {
    type Err = SigningError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::match_substring(&s.to_ascii_lowercase())
            .ok_or_else(|| SigningError::InvalidInput(format!("Unsupported hash algorithm: {s}")))
    }
}

impl fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_algorithm_properties() {
        assert_eq!(HashAlgorithm::Sha1.digest_size(), 20);
        assert_eq!(HashAlgorithm::Sha256.digest_size(), 32);
        assert_eq!(HashAlgorithm::Sha384.digest_size(), 48);
        assert_eq!(HashAlgorithm::Sha512.digest_size(), 64);

        assert_eq!(HashAlgorithm::Sha384.cng_algorithm_id(), "SHA384");
        assert_eq!(HashAlgorithm::Sha512.legacy_alg_id(), 0x800e);
    }

    #[test]
    fn test_lenient_parse() {
        assert_eq!(
            HashAlgorithm::from_name_lenient(Some("SHA-1")),
            HashAlgorithm::Sha1
        );
        assert_eq!(
            HashAlgorithm::from_name_lenient(Some("sha384")),
            HashAlgorithm::Sha384
        );
        assert_eq!(
            HashAlgorithm::from_name_lenient(Some("SHA512withRSA")),
            HashAlgorithm::Sha512
        );
        assert_eq!(
            HashAlgorithm::from_name_lenient(Some("md5")),
            HashAlgorithm::Sha256
        );
        assert_eq!(
            HashAlgorithm::from_name_lenient(Some("")),
            HashAlgorithm::Sha256
        );
        assert_eq!(HashAlgorithm::from_name_lenient(None), HashAlgorithm::Sha256);
    }

    #[test]
    fn test_fallback_parse() {
        assert_eq!(
            HashAlgorithm::from_name_or("md5", HashAlgorithm::Sha512),
            HashAlgorithm::Sha512
        );
        assert_eq!(
            HashAlgorithm::from_name_or("sha-1", HashAlgorithm::Sha512),
            HashAlgorithm::Sha1
        );
    }

    #[test]
    fn test_strict_parse() {
        assert_eq!("Sha-256".parse::<HashAlgorithm>().unwrap(), HashAlgorithm::Sha256);
        assert!("md5".parse::<HashAlgorithm>().is_err());
        assert!("".parse::<HashAlgorithm>().is_err());
    }
}
