//! Configuration management for UFChain

use crate::crypto::PUBLIC_KEY_LEN;
use crate::error::ChainError;
use serde::Deserialize;
use std::fs;
use std::io;
use std::path::Path;

pub const DEFAULT_CONFIG_PATH: &str = "config.toml";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub validators: Vec<ValidatorConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_api_port")]
    pub port: u16,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_api_port(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ValidatorConfig {
    /// Hex encoded 64-byte public key.
    pub public_key: String,
    pub stake: u64,
}

impl ValidatorConfig {
    pub fn public_key_bytes(&self) -> Result<Vec<u8>, ChainError> {
        let bytes = hex::decode(&self.public_key).map_err(|e| {
            ChainError::ConfigError(format!("validator public_key is not hex: {}", e))
        })?;
        if bytes.len() != PUBLIC_KEY_LEN {
            return Err(ChainError::ConfigError(format!(
                "validator public_key must be {} bytes, got {}",
                PUBLIC_KEY_LEN,
                bytes.len()
            )));
        }
        Ok(bytes)
    }
}

impl Config {
    pub fn from_toml_str(input: &str) -> Result<Self, Box<dyn std::error::Error>> {
        let config: Config = if input.trim().is_empty() {
            Config::default()
        } else {
            toml::from_str(input)?
        };
        config.validate()?;
        Ok(config)
    }

    /// Validate critical values
    pub fn validate(&self) -> Result<(), ChainError> {
        if self.database.path.is_empty() {
            return Err(ChainError::ConfigError(
                "database.path must be set in config.toml".to_string(),
            ));
        }
        if self.api.host.is_empty() {
            return Err(ChainError::ConfigError(
                "api.host must be set in config.toml".to_string(),
            ));
        }
        for validator in &self.validators {
            validator.public_key_bytes()?;
        }
        Ok(())
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.api.host, self.api.port)
    }
}

/// Loads `config.toml` from the working directory.
pub fn load_config() -> Result<Config, Box<dyn std::error::Error>> {
    load_config_from(DEFAULT_CONFIG_PATH)
}

/// Reads the file at `path`, falling back to defaults only when it does
/// not exist. Any other read error is returned.
/// A `PORT` environment variable overrides `api.port`.
pub fn load_config_from<P: AsRef<Path>>(path: P) -> Result<Config, Box<dyn std::error::Error>> {
    let config_str = match fs::read_to_string(path.as_ref()) {
        Ok(contents) => contents,
        Err(e) if e.kind() == io::ErrorKind::NotFound => String::new(),
        Err(e) => {
            return Err(ChainError::ConfigError(format!(
                "Cannot read {}: {}",
                path.as_ref().display(),
                e
            ))
            .into())
        }
    };
    let mut config = Config::from_toml_str(&config_str)?;

    if let Ok(port) = std::env::var("PORT") {
        config.api.port = port
            .parse()
            .map_err(|e| ChainError::ConfigError(format!("PORT is not a valid port: {}", e)))?;
    }
    Ok(config)
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_api_port() -> u16 {
    3000
}

fn default_db_path() -> String {
    "./data/ufchain.db".to_string()
}

fn default_level() -> String {
    "info".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_when_empty() {
        let config = Config::from_toml_str("").unwrap();
        assert_eq!(config.api.port, 3000);
        assert_eq!(config.database.path, "./data/ufchain.db");
        assert_eq!(config.logging.level, "info");
        assert!(config.validators.is_empty());
    }

    #[test]
    fn test_parse_sections() {
        let key = "ab".repeat(64);
        let input = format!(
            r#"
[api]
host = "0.0.0.0"
port = 9000

[database]
path = "/tmp/ledger.db"

[logging]
level = "debug"

[[validators]]
public_key = "{}"
stake = 70
"#,
            key
        );
        let config = Config::from_toml_str(&input).unwrap();
        assert_eq!(config.bind_address(), "0.0.0.0:9000");
        assert_eq!(config.database.path, "/tmp/ledger.db");
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.validators[0].stake, 70);
        assert_eq!(config.validators[0].public_key_bytes().unwrap(), vec![0xab; 64]);
    }

    #[test]
    fn test_rejects_bad_validator_key() {
        let input = r#"
[[validators]]
public_key = "abcd"
stake = 1
"#;
        assert!(Config::from_toml_str(input).is_err());
    }

    #[test]
    fn test_rejects_empty_database_path() {
        let input = r#"
[database]
path = ""
"#;
        assert!(Config::from_toml_str(input).is_err());
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_config_from(dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_unreadable_path_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_config_from(dir.path()).unwrap_err();
        assert!(err.to_string().contains("Cannot read"));
    }
}
