//! Configuration loader supporting YAML, TOML and JSON.

use crate::error::ConfigError;
use serde::de::DeserializeOwned;
use std::path::Path;
use tracing::debug;

/// Supported configuration file formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConfigFormat {
    /// YAML format (.yaml, .yml)
    #[default]
    Yaml,
    /// TOML format (.toml)
    Toml,
    /// JSON format (.json)
    Json,
}

impl ConfigFormat {
    /// Detects the format from a file extension.
    #[must_use]
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(|ext| match ext.to_lowercase().as_str() {
                "yaml" | "yml" => Some(Self::Yaml),
                "toml" => Some(Self::Toml),
                "json" => Some(Self::Json),
                _ => None,
            })
    }
}

/// Deserializes configuration structs from files or strings.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConfigLoader;

impl ConfigLoader {
    /// Creates a new configuration loader.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Loads configuration from a file, detecting the format from its extension.
    ///
    /// # Errors
    ///
    /// Returns an error if the extension is not recognized, the file
    /// cannot be read or the content cannot be parsed.
    pub fn load_file<T, P>(&self, path: P) -> Result<T, ConfigError>
    where
        T: DeserializeOwned,
        P: AsRef<Path>,
    {
        let path = path.as_ref();
        let format = ConfigFormat::from_path(path).ok_or_else(|| ConfigError::InvalidFormat {
            path: path.display().to_string(),
            reason: "Unrecognized file extension. Supported: .yaml, .yml, .toml, .json".to_string(),
        })?;

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::FileReadError {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;

        debug!(path = %path.display(), ?format, "Loading configuration");
        self.load_str(&content, format)
    }

    /// Loads configuration from a string in the given format.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidFormat` if the content cannot be parsed.
    pub fn load_str<T>(&self, content: &str, format: ConfigFormat) -> Result<T, ConfigError>
    where
        T: DeserializeOwned,
    {
        let invalid = |kind: &str, e: &dyn std::fmt::Display| ConfigError::InvalidFormat {
            path: "<string>".to_string(),
            reason: format!("{kind} parse error: {e}"),
        };
        match format {
            ConfigFormat::Yaml => serde_yaml::from_str(content).map_err(|e| invalid("YAML", &e)),
            ConfigFormat::Toml => toml::from_str(content).map_err(|e| invalid("TOML", &e)),
            ConfigFormat::Json => serde_json::from_str(content).map_err(|e| invalid("JSON", &e)),
        }
    }

    /// Serializes a configuration to a string in the given format.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidFormat` if serialization fails.
    pub fn serialize<T>(config: &T, format: ConfigFormat) -> Result<String, ConfigError>
    where
        T: serde::Serialize,
    {
        let invalid = |kind: &str, e: &dyn std::fmt::Display| ConfigError::InvalidFormat {
            path: "<serialize>".to_string(),
            reason: format!("{kind} serialization error: {e}"),
        };
        match format {
            ConfigFormat::Yaml => serde_yaml::to_string(config).map_err(|e| invalid("YAML", &e)),
            ConfigFormat::Toml => toml::to_string_pretty(config).map_err(|e| invalid("TOML", &e)),
            ConfigFormat::Json => {
                serde_json::to_string_pretty(config).map_err(|e| invalid("JSON", &e))
            }
        }
    }

    /// Saves a configuration to a file, detecting the format from its extension.
    ///
    /// # Errors
    ///
    /// Returns an error if the extension is not recognized, serialization
    /// fails or the file cannot be written.
    pub fn save_file<T, P>(config: &T, path: P) -> Result<(), ConfigError>
    where
        T: serde::Serialize,
        P: AsRef<Path>,
    {
        let path = path.as_ref();
        let format = ConfigFormat::from_path(path).ok_or_else(|| ConfigError::InvalidFormat {
            path: path.display().to_string(),
            reason: "Unrecognized file extension. Supported: .yaml, .yml, .toml, .json".to_string(),
        })?;
        let content = Self::serialize(config, format)?;
        std::fs::write(path, content).map_err(|e| ConfigError::FileWriteError {
            path: path.display().to_string(),
            reason: e.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Sample {
        endpoint: String,
        ticks: u32,
    }

    #[test]
    fn test_format_from_path() {
        assert_eq!(
            ConfigFormat::from_path(Path::new("server.yml")),
            Some(ConfigFormat::Yaml)
        );
        assert_eq!(
            ConfigFormat::from_path(Path::new("server.TOML")),
            Some(ConfigFormat::Toml)
        );
        assert_eq!(ConfigFormat::from_path(Path::new("server.ini")), None);
    }

    #[test]
    fn test_load_all_formats() {
        let expected = Sample {
            endpoint: "tcp://127.0.0.1:5555".to_string(),
            ticks: 512,
        };
        let loader = ConfigLoader::new();

        let yaml: Sample = loader
            .load_str("endpoint: tcp://127.0.0.1:5555\nticks: 512\n", ConfigFormat::Yaml)
            .unwrap();
        let toml: Sample = loader
            .load_str(
                "endpoint = \"tcp://127.0.0.1:5555\"\nticks = 512\n",
                ConfigFormat::Toml,
            )
            .unwrap();
        let json: Sample = loader
            .load_str(
                r#"{"endpoint":"tcp://127.0.0.1:5555","ticks":512}"#,
                ConfigFormat::Json,
            )
            .unwrap();

        assert_eq!(yaml, expected);
        assert_eq!(toml, expected);
        assert_eq!(json, expected);
    }

    #[test]
    fn test_serialize_roundtrip_toml() {
        let sample = Sample {
            endpoint: "mem://server".to_string(),
            ticks: 64,
        };
        let text = ConfigLoader::serialize(&sample, ConfigFormat::Toml).unwrap();
        let parsed: Sample = ConfigLoader::new().load_str(&text, ConfigFormat::Toml).unwrap();
        assert_eq!(parsed, sample);
    }

    #[test]
    fn test_invalid_content() {
        let result: Result<Sample, _> = ConfigLoader::new().load_str("{", ConfigFormat::Json);
        assert!(matches!(result, Err(ConfigError::InvalidFormat { .. })));
    }

    #[test]
    fn test_missing_file() {
        let result: Result<Sample, _> =
            ConfigLoader::new().load_file("/nonexistent/sirocco/server.yaml");
        assert!(matches!(result, Err(ConfigError::FileReadError { .. })));
    }
}
