//! Operation surface: `selectCertificate`, `certificateSubject`, `signData`.
//!
//! Requests and responses are plain serde types so any transport can carry
//! them. The selected identity is held in a mutex-guarded session, which
//! serializes concurrent callers instead of letting them race on the same
//! native handles.

use std::sync::{Arc, Mutex, MutexGuard};

use serde::{Deserialize, Serialize};

use crate::adapters::backend::CertStoreBackend;
use crate::domain::constants::{
    DEFAULT_STORE_NAME, METHOD_CERTIFICATE_SUBJECT, METHOD_SELECT_CERTIFICATE, METHOD_SIGN_DATA,
};
use crate::domain::crypto::HashAlgorithm;
use crate::infra::config::SignerConfiguration;
use crate::infra::error::{SigningError, SigningResult};
use crate::services::session::SigningSession;

/// A named operation with its arguments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MethodCall {
    pub method: String,
    #[serde(default)]
    pub arguments: serde_json::Value,
}

impl MethodCall {
    pub fn new(method: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            arguments: serde_json::Value::Null,
        }
    }

    /// `signData` call.
    pub fn sign_data(algorithm: Option<&str>, data: &[u8]) -> Self {
        Self {
            method: METHOD_SIGN_DATA.to_string(),
            arguments: serde_json::json!({ "algorithm": algorithm, "data": data }),
        }
    }
}

/// Arguments of `signData`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SignDataArguments {
    #[serde(default)]
    pub algorithm: Option<String>,
    #[serde(default)]
    pub data: Option<Vec<u8>>,
}

/// Payload of a successful response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ResponseValue {
    Text(String),
    Bytes(Vec<u8>),
}

/// Outcome of a method call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum MethodResponse {
    Success { value: ResponseValue },
    Error { code: String, message: String },
    NotImplemented,
}

impl From<&SigningError> for MethodResponse {
    fn from(error: &SigningError) -> Self {
        MethodResponse::Error {
            code: error.error_code().to_string(),
            message: error.to_string(),
        }
    }
}

impl MethodResponse {
    fn from_result(result: SigningResult<ResponseValue>) -> Self {
        match result {
            Ok(value) => MethodResponse::Success { value },
            Err(e) => (&e).into(),
        }
    }
}

/// Behavior switches of the operation surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationOptions {
    pub store_name: String,
    /// Used when `signData` names no algorithm.
    pub default_algorithm: HashAlgorithm,
    /// Reject unrecognized algorithm names instead of falling back to SHA-256.
    pub strict_algorithm_names: bool,
}

impl Default for OperationOptions {
    fn default() -> Self {
        Self {
            store_name: DEFAULT_STORE_NAME.to_string(),
            default_algorithm: HashAlgorithm::Sha256,
            strict_algorithm_names: false,
        }
    }
}

impl OperationOptions {
    /// # Errors
    ///
    /// Returns `ConfigurationError` if the configured default algorithm is
    /// not a supported name.
    pub fn from_config(config: &SignerConfiguration) -> SigningResult<Self> {
        let default_algorithm = config
            .default_hash_algorithm
            .parse::<HashAlgorithm>()
            .map_err(|_| {
                SigningError::ConfigurationError(format!(
                    "Invalid hash algorithm: {}",
                    config.default_hash_algorithm
                ))
            })?;
        Ok(Self {
            store_name: config.store_name.clone(),
            default_algorithm,
            strict_algorithm_names: config.strict_algorithm_names,
        })
    }

    /// Resolve the algorithm named by a `signData` call.
    ///
    /// Absent and unrecognized names both resolve to the configured default
    /// (SHA-256 unless configured otherwise).
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` for an unrecognized name in strict mode.
    pub fn resolve_algorithm(&self, name: Option<&str>) -> SigningResult<HashAlgorithm> {
        match name {
            None => Ok(self.default_algorithm),
            Some(name) if self.strict_algorithm_names => name.parse(),
            Some(name) => Ok(HashAlgorithm::from_name_or(name, self.default_algorithm)),
        }
    }
}

/// Certificate selection and signing operations over one backend.
pub struct CertificateOperations {
    backend: Arc<dyn CertStoreBackend>,
    options: OperationOptions,
    session: Mutex<Option<SigningSession>>,
}

impl CertificateOperations {
    pub fn new(backend: Arc<dyn CertStoreBackend>, options: OperationOptions) -> Self {
        Self {
            backend,
            options,
            session: Mutex::new(None),
        }
    }

    #[must_use]
    pub fn options(&self) -> &OperationOptions {
        &self.options
    }

    fn session(&self) -> MutexGuard<'_, Option<SigningSession>> {
        // A session is either fully built or absent, so a poisoned lock is
        // still usable.
        self.session
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Dispatch a method call.
    pub fn handle(&self, call: &MethodCall) -> MethodResponse {
        log::debug!("Handling method call '{}'", call.method);
        match call.method.as_str() {
            METHOD_SELECT_CERTIFICATE => {
                MethodResponse::from_result(self.select_certificate().map(ResponseValue::Text))
            }
            METHOD_CERTIFICATE_SUBJECT => {
                MethodResponse::from_result(self.certificate_subject().map(ResponseValue::Text))
            }
            METHOD_SIGN_DATA => MethodResponse::from_result(
                Self::sign_arguments(&call.arguments).and_then(|args| {
                    let data = args.data.ok_or_else(|| {
                        SigningError::InvalidInput("signData requires 'data'".to_string())
                    })?;
                    self.sign_data(args.algorithm.as_deref(), &data)
                        .map(ResponseValue::Bytes)
                }),
            ),
            other => {
                log::debug!("Method '{other}' not implemented");
                MethodResponse::NotImplemented
            }
        }
    }

    fn sign_arguments(arguments: &serde_json::Value) -> SigningResult<SignDataArguments> {
        if arguments.is_null() {
            return Ok(SignDataArguments::default());
        }
        SignDataArguments::deserialize(arguments)
            .map_err(|e| SigningError::InvalidInput(format!("Invalid signData arguments: {e}")))
    }

    /// Select a certificate, replacing any previous selection, and return
    /// its PEM text.
    ///
    /// The previous session is released before the store is opened again.
    ///
    /// # Errors
    ///
    /// Returns store or selection errors; the previous selection is gone
    /// either way.
    pub fn select_certificate(&self) -> SigningResult<String> {
        let mut session = self.session();
        *session = None;
        let selected = SigningSession::select(self.backend.clone(), &self.options.store_name)?;
        let pem = selected.certificate_pem();
        *session = Some(selected);
        Ok(pem)
    }

    /// Display subject of the last selection.
    ///
    /// # Errors
    ///
    /// Returns `NameResolutionError` if nothing is selected or the name
    /// cannot be resolved.
    pub fn certificate_subject(&self) -> SigningResult<String> {
        match self.session().as_ref() {
            Some(session) => session.subject(),
            None => Err(SigningError::NameResolutionError(
                "No certificate selected".to_string(),
            )),
        }
    }

    /// Sign `data` with the last selection.
    ///
    /// # Errors
    ///
    /// Returns `KeyAcquisitionError` if nothing is selected, `InvalidInput`
    /// for a rejected algorithm name in strict mode, and signing errors.
    pub fn sign_data(&self, algorithm: Option<&str>, data: &[u8]) -> SigningResult<Vec<u8>> {
        let algorithm = self.options.resolve_algorithm(algorithm)?;
        match self.session().as_ref() {
            Some(session) => session.sign(algorithm, data).map(|sig| sig.into_vec()),
            None => Err(SigningError::KeyAcquisitionError(
                "No certificate selected".to_string(),
            )),
        }
    }

    /// Release the current selection, if any.
    pub fn clear(&self) {
        *self.session() = None;
    }

    /// Whether a certificate is currently selected.
    #[must_use]
    pub fn has_selection(&self) -> bool {
        self.session().is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn response_json_shape() {
        let ok = MethodResponse::Success {
            value: ResponseValue::Text("pem".into()),
        };
        assert_eq!(
            serde_json::to_value(&ok).unwrap(),
            serde_json::json!({"status": "success", "value": "pem"})
        );

        let err: MethodResponse = (&SigningError::SelectionCancelled).into();
        assert_eq!(
            serde_json::to_value(&err).unwrap(),
            serde_json::json!({
                "status": "error",
                "code": "certificate_error",
                "message": "Certificate selection cancelled"
            })
        );

        assert_eq!(
            serde_json::to_value(MethodResponse::NotImplemented).unwrap(),
            serde_json::json!({"status": "not_implemented"})
        );
    }

    #[test]
    fn algorithm_resolution() {
        let lenient = OperationOptions::default();
        assert_eq!(lenient.resolve_algorithm(Some("md5")).unwrap(), HashAlgorithm::Sha256);
        assert_eq!(lenient.resolve_algorithm(Some("SHA-384")).unwrap(), HashAlgorithm::Sha384);
        assert_eq!(lenient.resolve_algorithm(None).unwrap(), HashAlgorithm::Sha256);

        let strict = OperationOptions {
            strict_algorithm_names: true,
            default_algorithm: HashAlgorithm::Sha512,
            ..OperationOptions::default()
        };
        assert!(matches!(
            strict.resolve_algorithm(Some("md5")),
            Err(SigningError::InvalidInput(_))
        ));
        assert_eq!(strict.resolve_algorithm(None).unwrap(), HashAlgorithm::Sha512);
    }

    #[test]
    fn unknown_and_absent_names_share_the_configured_default() {
        let config = SignerConfiguration {
            default_hash_algorithm: "sha-512".to_string(),
            ..SignerConfiguration::default()
        };
        let options = OperationOptions::from_config(&config).unwrap();
        assert_eq!(options.resolve_algorithm(None).unwrap(), HashAlgorithm::Sha512);
        assert_eq!(options.resolve_algorithm(Some("md5")).unwrap(), HashAlgorithm::Sha512);
        assert_eq!(options.resolve_algorithm(Some("")).unwrap(), HashAlgorithm::Sha512);
        assert_eq!(options.resolve_algorithm(Some("sha-1")).unwrap(), HashAlgorithm::Sha1);
    }

    #[test]
    fn method_call_deserializes_without_arguments() {
        let call: MethodCall = serde_json::from_str(r#"{"method": "selectCertificate"}"#).unwrap();
        assert_eq!(call, MethodCall::new(METHOD_SELECT_CERTIFICATE));
    }
}
