//! Error types for certificate selection and signing operations.

use std::fmt;

use thiserror::Error;

use crate::domain::constants::{CERTIFICATE_ERROR_CODE, SIGNING_ERROR_CODE};

/// Result type for signing operations
pub type SigningResult<T> = Result<T, SigningError>;

/// Native step at which a signing operation failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignStep {
    OpenAlgorithmProvider,
    QueryObjectLength,
    QueryHashLength,
    CreateHash,
    HashData,
    FinishHash,
    QueryAlgorithmGroup,
    QuerySignatureLength,
    SignHash,
}

impl SignStep {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            SignStep::OpenAlgorithmProvider => "open_algorithm_provider",
            SignStep::QueryObjectLength => "query_object_length",
            SignStep::QueryHashLength => "query_hash_length",
            SignStep::CreateHash => "create_hash",
            SignStep::HashData => "hash_data",
            SignStep::FinishHash => "finish_hash",
            SignStep::QueryAlgorithmGroup => "query_algorithm_group",
            SignStep::QuerySignatureLength => "query_signature_length",
            SignStep::SignHash => "sign_hash",
        }
    }
}

impl fmt::Display for SignStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error taxonomy for store access, key resolution and signing
#[derive(Error, Debug, miette::Diagnostic)]
pub enum SigningError {
    #[error("Certificate store error: {0}")]
    StoreError(String),

    #[error("Certificate selection cancelled")]
    SelectionCancelled,

    #[error("Certificate selection error: {0}")]
    SelectionError(String),

    #[error("Certificate encoding error: {0}")]
    EncodingError(String),

    #[error("Subject name error: {0}")]
    NameResolutionError(String),

    #[error("Key acquisition error: {0}")]
    KeyAcquisitionError(String),

    #[error("Unsupported key spec: {0:#x}")]
    UnsupportedKeyError(u32),

    #[error("Signature error at {step}: {detail}")]
    SignatureError { step: SignStep, detail: String },

    #[error("Allocation error: {0}")]
    AllocationError(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Configuration error: {0}")]
    ConfigurationError(String),
}

impl SigningError {
    /// Builds a sub-coded signing failure.
    pub fn at(step: SignStep, detail: impl fmt::Display) -> Self {
        SigningError::SignatureError {
            step,
            detail: detail.to_string(),
        }
    }

    /// Machine-readable code reported at the operation boundary.
    ///
    /// Store, selection, encoding and subject failures are
    /// `certificate_error`; everything else is `signing_error`.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            SigningError::StoreError(_)
            | SigningError::SelectionCancelled
            | SigningError::SelectionError(_)
            | SigningError::EncodingError(_)
            | SigningError::NameResolutionError(_) => CERTIFICATE_ERROR_CODE,
            _ => SIGNING_ERROR_CODE,
        }
    }

    /// Sub-code of a signing failure, if this is one.
    #[must_use]
    pub fn sign_step(&self) -> Option<SignStep> {
        match self {
            SigningError::SignatureError { step, .. } => Some(*step),
            _ => None,
        }
    }
}

impl From<std::collections::TryReserveError> for SigningError {
    fn from(error: std::collections::TryReserveError) -> Self {
        SigningError::AllocationError(error.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let error = SigningError::StoreError("access denied".to_string());
        assert_eq!(error.to_string(), "Certificate store error: access denied");

        let error = SigningError::UnsupportedKeyError(7);
        assert_eq!(error.to_string(), "Unsupported key spec: 0x7");

        let error = SigningError::at(SignStep::SignHash, "NTE_BAD_KEYSET");
        assert_eq!(error.to_string(), "Signature error at sign_hash: NTE_BAD_KEYSET");
    }

    #[test]
    fn test_error_codes() {
        assert_eq!(
            SigningError::SelectionCancelled.error_code(),
            "certificate_error"
        );
        assert_eq!(
            SigningError::EncodingError("x".into()).error_code(),
            "certificate_error"
        );
        assert_eq!(
            SigningError::NameResolutionError("x".into()).error_code(),
            "certificate_error"
        );
        assert_eq!(
            SigningError::KeyAcquisitionError("x".into()).error_code(),
            "signing_error"
        );
        assert_eq!(
            SigningError::UnsupportedKeyError(0).error_code(),
            "signing_error"
        );
        assert_eq!(
            SigningError::AllocationError("x".into()).error_code(),
            "signing_error"
        );
    }

    #[test]
    fn test_sign_step_accessor() {
        let error = SigningError::at(SignStep::CreateHash, "bad alg");
        assert_eq!(error.sign_step(), Some(SignStep::CreateHash));
        assert_eq!(SigningError::SelectionCancelled.sign_step(), None);
    }
}
