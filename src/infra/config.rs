//! Configuration management infrastructure.
//!
//! Signing preferences live in a TOML file under the user's config
//! directory. Command-line options override what is loaded here.

use crate::domain::constants::DEFAULT_STORE_NAME;
use crate::domain::crypto::HashAlgorithm;
use crate::infra::error::{SigningError, SigningResult};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Where identities come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// The platform certificate store (Windows only).
    #[default]
    System,
    /// A PKCS#12 file loaded into an in-process store.
    Pkcs12,
}

impl std::str::FromStr for BackendKind {
    type Err = SigningError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "system" => Ok(BackendKind::System),
            "pkcs12" => Ok(BackendKind::Pkcs12),
            _ => Err(SigningError::ConfigurationError(format!(
                "Unknown backend: {s} (expected 'system' or 'pkcs12')"
            ))),
        }
    }
}

/// Application configuration with all signing preferences
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SignerConfiguration {
    /// Name of the current user's store to select from
    pub store_name: String,

    /// Hash algorithm used when a request names none
    pub default_hash_algorithm: String,

    /// Reject unknown algorithm names instead of falling back to SHA-256
    pub strict_algorithm_names: bool,

    /// Identity source
    pub backend: BackendKind,

    /// PKCS#12 file for the `pkcs12` backend
    pub pkcs12_path: Option<PathBuf>,

    /// Whether to show verbose output
    pub verbose: bool,
}

impl Default for SignerConfiguration {
    fn default() -> Self {
        Self {
            store_name: DEFAULT_STORE_NAME.to_string(),
            default_hash_algorithm: HashAlgorithm::Sha256.as_str().to_string(),
            strict_algorithm_names: false,
            backend: BackendKind::default(),
            pkcs12_path: None,
            verbose: false,
        }
    }
}

impl SignerConfiguration {
    /// Check that every value is usable.
    ///
    /// # Errors
    ///
    /// Returns `ConfigurationError` describing the first invalid value.
    pub fn validate(&self) -> SigningResult<()> {
        if self.store_name.trim().is_empty() {
            return Err(SigningError::ConfigurationError(
                "Store name must not be empty".to_string(),
            ));
        }

        self.default_hash_algorithm
            .parse::<HashAlgorithm>()
            .map_err(|_| {
                SigningError::ConfigurationError(format!(
                    "Invalid hash algorithm: {}",
                    self.default_hash_algorithm
                ))
            })?;

        if self.backend == BackendKind::Pkcs12 && self.pkcs12_path.is_none() {
            return Err(SigningError::ConfigurationError(
                "pkcs12 backend requires pkcs12_path".to_string(),
            ));
        }

        Ok(())
    }
}

/// Configuration manager for handling config files
pub struct ConfigManager {
    config_path: PathBuf,
}

impl ConfigManager {
    /// Create a new configuration manager with default path
    pub fn new() -> SigningResult<Self> {
        let config_path = Self::default_config_path()?;
        Ok(Self { config_path })
    }

    /// Create a configuration manager with custom path
    pub fn with_path<P: AsRef<Path>>(path: P) -> Self {
        Self {
            config_path: path.as_ref().to_path_buf(),
        }
    }

    /// Get the default configuration file path
    pub fn default_config_path() -> SigningResult<PathBuf> {
        if let Some(config_dir) = dirs::config_dir() {
            Ok(config_dir.join("certstore-signer").join("config.toml"))
        } else {
            Ok(PathBuf::from("certstore-signer-config.toml"))
        }
    }

    /// Load configuration from file, creating default if it doesn't exist
    pub fn load_or_create_default(&self) -> SigningResult<SignerConfiguration> {
        if self.config_path.exists() {
            self.load()
        } else {
            log::info!(
                "Configuration file not found, creating default: {}",
                self.config_path.display()
            );
            let default_config = SignerConfiguration::default();
            self.save(&default_config)?;
            Ok(default_config)
        }
    }

    /// Load configuration from file, or defaults if there is none.
    ///
    /// Unlike [`load_or_create_default`](Self::load_or_create_default) this
    /// never writes to disk.
    pub fn load_or_default(&self) -> SigningResult<SignerConfiguration> {
        if self.config_path.exists() {
            self.load()
        } else {
            log::debug!(
                "No configuration at {}, using defaults",
                self.config_path.display()
            );
            Ok(SignerConfiguration::default())
        }
    }

    /// Load configuration from file
    pub fn load(&self) -> SigningResult<SignerConfiguration> {
        log::info!("Loading configuration from: {}", self.config_path.display());

        let content = fs::read_to_string(&self.config_path).map_err(|e| {
            SigningError::ConfigurationError(format!(
                "Failed to read config file {}: {}",
                self.config_path.display(),
                e
            ))
        })?;

        let config: SignerConfiguration = toml::from_str(&content).map_err(|e| {
            SigningError::ConfigurationError(format!("Failed to parse config file: {e}"))
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self, config: &SignerConfiguration) -> SigningResult<()> {
        log::info!("Saving configuration to: {}", self.config_path.display());

        if let Some(parent) = self.config_path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| {
                    SigningError::ConfigurationError(format!(
                        "Failed to create config directory {}: {}",
                        parent.display(),
                        e
                    ))
                })?;
            }
        }

        let content = toml::to_string_pretty(config).map_err(|e| {
            SigningError::ConfigurationError(format!("Failed to serialize config: {e}"))
        })?;

        fs::write(&self.config_path, content).map_err(|e| {
            SigningError::ConfigurationError(format!(
                "Failed to write config file {}: {}",
                self.config_path.display(),
                e
            ))
        })?;

        log::info!("Configuration saved successfully");
        Ok(())
    }

    /// Update a specific configuration value
    pub fn update_value(&self, key: &str, value: &str) -> SigningResult<()> {
        let mut config = self.load_or_default()?;

        match key {
            "store_name" => {
                config.store_name = value.to_string();
            }
            "default_hash_algorithm" => {
                let algorithm = value.parse::<HashAlgorithm>().map_err(|_| {
                    SigningError::ConfigurationError(format!("Invalid hash algorithm: {value}"))
                })?;
                config.default_hash_algorithm = algorithm.as_str().to_string();
            }
            "strict_algorithm_names" => {
                config.strict_algorithm_names = parse_bool(value)?;
            }
            "backend" => {
                config.backend = value.parse()?;
            }
            "pkcs12_path" => {
                config.pkcs12_path = if value.is_empty() {
                    None
                } else {
                    Some(PathBuf::from(value))
                };
            }
            "verbose" => {
                config.verbose = parse_bool(value)?;
            }
            _ => {
                return Err(SigningError::ConfigurationError(format!(
                    "Unknown configuration key: {key}"
                )));
            }
        }

        config.validate()?;
        self.save(&config)
    }

    /// Get the configuration file path
    #[must_use]
    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    /// Export configuration as a portable format
    pub fn export_config(&self, format: ExportFormat) -> SigningResult<String> {
        let config = self.load_or_default()?;

        match format {
            ExportFormat::Toml => toml::to_string_pretty(&config)
                .map_err(|e| SigningError::ConfigurationError(format!("TOML export failed: {e}"))),
            ExportFormat::Json => serde_json::to_string_pretty(&config)
                .map_err(|e| SigningError::ConfigurationError(format!("JSON export failed: {e}"))),
        }
    }
}

/// Configuration export formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Toml,
    Json,
}

fn parse_bool(value: &str) -> SigningResult<bool> {
    value
        .parse()
        .map_err(|_| SigningError::ConfigurationError(format!("Invalid boolean value: {value}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_configuration() {
        let config = SignerConfiguration::default();
        assert_eq!(config.store_name, "MY");
        assert_eq!(config.default_hash_algorithm, "sha-256");
        assert_eq!(config.backend, BackendKind::System);
        assert!(!config.strict_algorithm_names);
        config.validate().unwrap();
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let config: SignerConfiguration =
            toml::from_str("backend = \"pkcs12\"\npkcs12_path = \"id.p12\"\n").unwrap();
        assert_eq!(config.backend, BackendKind::Pkcs12);
        assert_eq!(config.pkcs12_path, Some(PathBuf::from("id.p12")));
        assert_eq!(config.store_name, "MY");
    }

    #[test]
    fn test_config_manager_with_temp_path() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("nested").join("config.toml");
        let manager = ConfigManager::with_path(&config_path);

        let config = manager.load_or_create_default().unwrap();
        assert!(config_path.exists());

        let loaded = manager.load().unwrap();
        assert_eq!(config, loaded);
    }

    #[test]
    fn test_update_value() {
        let temp_dir = TempDir::new().unwrap();
        let manager = ConfigManager::with_path(temp_dir.path().join("config.toml"));

        manager.update_value("default_hash_algorithm", "SHA384").unwrap();
        manager.update_value("strict_algorithm_names", "true").unwrap();
        let config = manager.load().unwrap();
        assert_eq!(config.default_hash_algorithm, "sha-384");
        assert!(config.strict_algorithm_names);

        assert!(manager.update_value("default_hash_algorithm", "md5").is_err());
        assert!(manager.update_value("verbose", "maybe").is_err());
        assert!(manager.update_value("no_such_key", "1").is_err());
        // pkcs12 without a path is rejected and nothing is written
        assert!(manager.update_value("backend", "pkcs12").is_err());
        assert_eq!(manager.load().unwrap().backend, BackendKind::System);
    }

    #[test]
    fn test_invalid_file_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");
        fs::write(&path, "default_hash_algorithm = \"whirlpool\"\n").unwrap();
        let err = ConfigManager::with_path(&path).load().unwrap_err();
        assert!(matches!(err, SigningError::ConfigurationError(_)));
    }

    #[test]
    fn test_unreadable_file_is_configuration_error() {
        let temp_dir = TempDir::new().unwrap();
        // A directory exists but cannot be read as a file
        let err = ConfigManager::with_path(temp_dir.path()).load().unwrap_err();
        assert!(matches!(err, SigningError::ConfigurationError(_)));
        assert_eq!(err.error_code(), "signing_error");
    }

    #[test]
    fn test_export_json() {
        let temp_dir = TempDir::new().unwrap();
        let manager = ConfigManager::with_path(temp_dir.path().join("config.toml"));
        let json = manager.export_config(ExportFormat::Json).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["backend"], "system");
        assert_eq!(value["store_name"], "MY");
    }
}
