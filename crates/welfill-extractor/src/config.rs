//! Configuration for the Extractor

use serde::{Deserialize, Serialize};

/// Configuration for the Extractor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractorConfig {
    /// Maximum normalized text length (characters)
    pub max_text_length: usize,

    /// Maximum total size of attachments sent inline (bytes)
    pub max_attachment_bytes: u64,
}

impl ExtractorConfig {
    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.max_text_length == 0 {
            return Err("max_text_length must be greater than 0".to_string());
        }
        if self.max_attachment_bytes == 0 {
            return Err("max_attachment_bytes must be greater than 0".to_string());
        }
        Ok(())
    }
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            max_text_length: 50_000,
            // Inline request payloads are capped at 20 MB upstream.
            max_attachment_bytes: 15 * 1024 * 1024,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(ExtractorConfig::default().validate().is_ok());
    }

    #[test]
    fn test_invalid_limits() {
        let mut config = ExtractorConfig::default();
        config.max_text_length = 0;
        assert!(config.validate().is_err());

        let mut config = ExtractorConfig::default();
        config.max_attachment_bytes = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: ExtractorConfig = serde_json::from_str(r#"{"max_text_length": 100}"#).unwrap();
        assert_eq!(config.max_text_length, 100);
        assert_eq!(
            config.max_attachment_bytes,
            ExtractorConfig::default().max_attachment_bytes
        );
    }
}
