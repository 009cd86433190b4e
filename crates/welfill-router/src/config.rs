//! Configuration file parsing for the server.
//!
//! Loads settings from TOML: bind address, credentials, the Gemini
//! connection, storage locations, the era calendar and extraction limits.
//! Secrets can come from the environment instead of the file.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;
use welfill_extractor::ExtractorConfig;
use welfill_janitor::SweeperConfig;
use welfill_llm::GeminiConfig;
use welfill_merger::EraCalendar;

/// Environment variable overriding `auth.username`
pub const ENV_USERNAME: &str = "APP_USERNAME";
/// Environment variable overriding `auth.password`
pub const ENV_PASSWORD: &str = "APP_PASSWORD";
/// Environment variable overriding `llm.api_key`
pub const ENV_GEMINI_API_KEY: &str = "GEMINI_API_KEY";

/// Configuration error
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read config file
    #[error("Failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    /// Failed to parse TOML
    #[error("Failed to parse config TOML: {0}")]
    TomlParse(#[from] toml::de::Error),

    /// Missing required field
    #[error("Missing required configuration field: {0}")]
    MissingField(String),

    /// A value is out of range
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Server configuration loaded from TOML
#[derive(Debug, Clone, Deserialize)]
pub struct RouterConfig {
    /// Bind address (e.g., "127.0.0.1")
    #[serde(default = "default_bind_address")]
    pub bind_address: String,

    /// Bind port (e.g., 8000)
    #[serde(default = "default_bind_port")]
    pub bind_port: u16,

    /// Basic auth credentials
    #[serde(default)]
    pub auth: AuthConfig,

    /// Gemini connection
    #[serde(default)]
    pub llm: LlmConfig,

    /// Filesystem locations and upload limits
    #[serde(default)]
    pub storage: StorageConfig,

    /// Era used for era-calendar dates
    #[serde(default)]
    pub era: EraCalendar,

    /// Extraction limits
    #[serde(default)]
    pub extractor: ExtractorConfig,
}

/// Basic auth credentials
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Username (default: "admin")
    pub username: String,
    /// Password; required, from the file or `APP_PASSWORD`
    pub password: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            username: "admin".to_string(),
            password: String::new(),
        }
    }
}

/// Gemini connection settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// API base URL
    pub endpoint: String,
    /// Model name
    pub model: String,
    /// API key; usually supplied through `GEMINI_API_KEY`
    pub api_key: Option<String>,
    /// Transport timeout for one call, in seconds
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        let gemini = GeminiConfig::default();
        Self {
            endpoint: gemini.endpoint,
            model: gemini.model,
            api_key: None,
            timeout_secs: gemini.timeout_secs,
        }
    }
}

impl LlmConfig {
    /// Provider settings for [`welfill_llm::GeminiProvider`]
    pub fn gemini_config(&self) -> GeminiConfig {
        GeminiConfig {
            endpoint: self.endpoint.clone(),
            model: self.model.clone(),
            api_key: self.api_key.clone(),
            timeout_secs: self.timeout_secs,
        }
    }
}

/// Filesystem locations and upload limits
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Template registry file (JSON)
    pub template_config: PathBuf,
    /// Directory holding template workbooks
    pub template_dir: PathBuf,
    /// Scratch directory for uploads
    pub temp_dir: PathBuf,
    /// Directory for generated outputs
    pub output_dir: PathBuf,
    /// Maximum request body size in megabytes
    pub max_upload_mb: usize,
    /// Sweeping of outputs that are never downloaded
    pub sweeper: SweeperConfig,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            template_config: PathBuf::from("mapping_config.json"),
            template_dir: PathBuf::from("template"),
            temp_dir: PathBuf::from("temp"),
            output_dir: PathBuf::from("outputs"),
            max_upload_mb: 50,
            sweeper: SweeperConfig::default(),
        }
    }
}

impl StorageConfig {
    /// Request body limit in bytes
    pub fn max_upload_bytes(&self) -> usize {
        self.max_upload_mb * 1024 * 1024
    }
}

fn default_bind_address() -> String {
    "127.0.0.1".to_string()
}

fn default_bind_port() -> u16 {
    8000
}

impl RouterConfig {
    /// Load configuration from a TOML file, then apply environment overrides
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let config: RouterConfig = toml::from_str(&contents)?;
        let config = config.with_env_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Replace credentials and the API key with values from `lookup`
    ///
    /// Empty values are ignored.
    pub fn with_env_overrides<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = |key: &str| lookup(key).filter(|v| !v.is_empty());
        if let Some(username) = lookup(ENV_USERNAME) {
            self.auth.username = username;
        }
        if let Some(password) = lookup(ENV_PASSWORD) {
            self.auth.password = password;
        }
        if let Some(api_key) = lookup(ENV_GEMINI_API_KEY) {
            self.llm.api_key = Some(api_key);
        }
        self
    }

    /// Validate required fields and limits
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.auth.username.is_empty() {
            return Err(ConfigError::MissingField("auth.username".to_string()));
        }
        if self.auth.password.is_empty() {
            return Err(ConfigError::MissingField(format!(
                "auth.password (or {})",
                ENV_PASSWORD
            )));
        }
        if self.storage.max_upload_mb == 0 {
            return Err(ConfigError::Invalid(
                "storage.max_upload_mb must be greater than 0".to_string(),
            ));
        }
        self.storage
            .sweeper
            .validate()
            .map_err(|e| ConfigError::Invalid(format!("storage.sweeper: {}", e)))?;
        self.extractor
            .validate()
            .map_err(|e| ConfigError::Invalid(format!("extractor: {}", e)))?;
        self.era
            .validate()
            .map_err(|e| ConfigError::Invalid(format!("era: {}", e)))?;
        Ok(())
    }

    /// Create a default configuration for testing
    pub fn default_test_config() -> Self {
        RouterConfig {
            bind_address: default_bind_address(),
            bind_port: default_bind_port(),
            auth: AuthConfig {
                username: "admin".to_string(),
                password: "test-password-do-not-use-in-production".to_string(),
            },
            llm: LlmConfig::default(),
            storage: StorageConfig::default(),
            era: EraCalendar::default(),
            extractor: ExtractorConfig::default(),
        }
    }

    /// Get the full bind address (address:port)
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.bind_address, self.bind_port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = RouterConfig::default_test_config();
        assert_eq!(config.bind_addr(), "127.0.0.1:8000");
        assert_eq!(config.auth.username, "admin");
        assert_eq!(config.storage.max_upload_bytes(), 50 * 1024 * 1024);
        assert_eq!(config.era.name, "令和");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_toml() {
        let toml = r#"
            bind_address = "0.0.0.0"
            bind_port = 9000

            [auth]
            username = "staff"
            password = "pw"

            [llm]
            model = "gemini-2.5-pro"
            timeout_secs = 60

            [storage]
            template_config = "/srv/welfill/mapping_config.json"
            template_dir = "/srv/welfill/template"
            max_upload_mb = 20

            [storage.sweeper]
            retention_minutes = 15

            [era]
            name = "令和"
            start = "2019-05-01"

            [extractor]
            max_text_length = 1000
        "#;

        let config: RouterConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.bind_addr(), "0.0.0.0:9000");
        assert_eq!(config.auth.username, "staff");
        assert_eq!(config.llm.model, "gemini-2.5-pro");
        assert_eq!(config.llm.endpoint, welfill_llm::DEFAULT_ENDPOINT);
        assert_eq!(config.storage.max_upload_mb, 20);
        assert_eq!(config.storage.temp_dir, PathBuf::from("temp"));
        assert_eq!(config.storage.sweeper.retention_minutes, 15);
        assert_eq!(config.storage.sweeper.sweep_interval_minutes, 10);
        assert_eq!(config.extractor.max_text_length, 1000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_minimal_toml_uses_defaults() {
        let config: RouterConfig = toml::from_str("").unwrap();
        assert_eq!(config.bind_port, 8000);
        assert_eq!(config.auth.username, "admin");
        assert_eq!(config.storage.output_dir, PathBuf::from("outputs"));
        // No password anywhere
        assert!(matches!(
            config.validate(),
            Err(ConfigError::MissingField(_))
        ));
    }

    #[test]
    fn test_env_overrides() {
        let config: RouterConfig = toml::from_str("[auth]\npassword = \"file\"").unwrap();
        let config = config.with_env_overrides(|key| match key {
            ENV_PASSWORD => Some("from-env".to_string()),
            ENV_USERNAME => Some(String::new()),
            ENV_GEMINI_API_KEY => Some("key".to_string()),
            _ => None,
        });

        assert_eq!(config.auth.password, "from-env");
        assert_eq!(config.auth.username, "admin");
        assert_eq!(config.llm.gemini_config().api_key.as_deref(), Some("key"));
    }

    #[test]
    fn test_invalid_limits() {
        let mut config = RouterConfig::default_test_config();
        config.storage.max_upload_mb = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }
}
