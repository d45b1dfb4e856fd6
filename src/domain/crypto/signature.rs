use std::fmt;

use super::HashAlgorithm;

/// Signature bytes in big-endian (PKCS#1 / CNG) order.
#[derive(Clone, Eq, PartialEq)]
pub struct RawSignature {
    algo: HashAlgorithm,
    bytes: Vec<u8>,
}

impl RawSignature {
    /// Signature produced by a key-storage (CNG) key, already in the
    /// expected byte order.
    #[must_use]
    pub fn from_modern(algo: HashAlgorithm, bytes: Vec<u8>) -> Self {
        Self { algo, bytes }
    }

    /// Signature produced by a legacy CryptoAPI provider.
    ///
    /// `CryptSignHash` emits the signature little-endian. Reversing it
    /// end-to-end yields exactly what a CNG key would have produced for the
    /// same key material and digest; no other transform is needed.
    #[must_use]
    pub fn from_legacy(algo: HashAlgorithm, mut bytes: Vec<u8>) -> Self {
        bytes.reverse();
        Self { algo, bytes }
    }

    #[must_use]
    pub fn algorithm(&self) -> HashAlgorithm {
        self.algo
    }
    #[must_use]
    pub fn as_slice(&self) -> &[u8] {
        &self.bytes
    }
    #[must_use]
    pub fn into_vec(self) -> Vec<u8> {
        self.bytes
    }
}

impl fmt::Debug for RawSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "RawSignature(algo={:?}, len={})",
            self.algo,
            self.bytes.len()
        )
    }
}
