//! # Configuration Module
//!
//! Handles loading and validating device configuration from TOML files.
//!
//! ```toml
//! [device]
//! protocol_version = 6
//! auth_key = "jSO9LnThTZ5nCWFBEmAxOuECbHY="
//! encryption_key = "37996fb42dde61e890d2d88b9b5a83d16f3d35876d778e3e064677c37b50c424"
//! ```

use serde::de::Error;
use serde::Deserialize;
use std::fs;
use std::path::Path;

use crate::error::{GsatError, Result};
use crate::gsat::auth::AuthKey;
use crate::gsat::envelope::{Credentials, EncryptionKey};
use crate::gsat::protocol::ProtocolVersion;

/// Main configuration structure
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub device: DeviceConfig,
}

/// Per-device protocol settings and key material
#[derive(Debug, Deserialize, Clone)]
pub struct DeviceConfig {
    /// Firmware protocol version; 6 when the device has not reported one
    #[serde(default = "default_protocol_version")]
    pub protocol_version: u16,

    /// Base64 HMAC secret (device password)
    #[serde(default)]
    pub auth_key: String,

    /// Hex AES key, 32 or 64 hex digits
    #[serde(default)]
    pub encryption_key: Option<String>,
}

fn default_protocol_version() -> u16 { ProtocolVersion::ASSUMED.number() as u16 }

impl Config {
    /// Load configuration from a TOML file
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the configuration file
    ///
    /// # Returns
    ///
    /// * `Result<Config>` - Loaded and validated configuration
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - File cannot be read
    /// - TOML parsing fails
    /// - Validation fails
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use gsat_codec::config::Config;
    ///
    /// let config = Config::load("config/device.toml")?;
    /// let credentials = config.credentials()?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        Self::from_toml(&contents)
    }

    /// Parse and validate configuration from TOML text
    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Protocol version of the configured device
    pub fn protocol_version(&self) -> ProtocolVersion {
        ProtocolVersion(self.device.protocol_version.min(u8::MAX as u16) as u8)
    }

    /// Parse the configured keys
    ///
    /// # Errors
    ///
    /// Returns `InvalidKey` if a key is not valid base64 or hex, or if the
    /// encryption key has the wrong length.
    pub fn credentials(&self) -> Result<Credentials> {
        let auth_key = AuthKey::from_base64(&self.device.auth_key)?;
        let encryption_key = self
            .device
            .encryption_key
            .as_deref()
            .map(EncryptionKey::from_hex)
            .transpose()?;

        Ok(Credentials::new(auth_key, encryption_key))
    }

    /// Validate configuration values
    ///
    /// # Errors
    ///
    /// Returns error if any configuration value is out of valid range
    fn validate(&self) -> Result<()> {
        let device = &self.device;

        if device.protocol_version > u8::MAX as u16 {
            return Err(GsatError::Config(
                toml::de::Error::custom("protocol_version must be between 0 and 255")
            ));
        }

        if self.protocol_version().is_binary() && device.auth_key.trim().is_empty() {
            return Err(GsatError::Config(
                toml::de::Error::custom("auth_key is required for protocol version 2 and later")
            ));
        }

        if let Some(key) = &device.encryption_key {
            let len = key.trim().len();
            if len != 32 && len != 64 {
                return Err(GsatError::Config(
                    toml::de::Error::custom("encryption_key must be 32 or 64 hex digits")
                ));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Layer;

    const AUTH_KEY: &str = "jSO9LnThTZ5nCWFBEmAxOuECbHY=";
    const ENCRYPTION_KEY: &str = "37996fb42dde61e890d2d88b9b5a83d16f3d35876d778e3e064677c37b50c424";

    fn create_valid_config() -> Config {
        Config {
            device: DeviceConfig {
                protocol_version: default_protocol_version(),
                auth_key: AUTH_KEY.to_string(),
                encryption_key: Some(ENCRYPTION_KEY.to_string()),
            },
        }
    }

    #[test]
    fn test_default_config() {
        let config = create_valid_config();
        assert!(config.validate().is_ok());
        assert_eq!(config.protocol_version(), ProtocolVersion::ASSUMED);
    }

    #[test]
    fn test_load_config_from_file() {
        use std::io::Write;
        use tempfile::NamedTempFile;

        let toml_content = format!(
            r#"
[device]
auth_key = "{}"
encryption_key = "{}"
"#,
            AUTH_KEY, ENCRYPTION_KEY
        );

        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(toml_content.as_bytes()).unwrap();
        temp_file.flush().unwrap();

        let config = Config::load(temp_file.path()).unwrap();
        assert_eq!(config.device.protocol_version, 6);

        let credentials = config.credentials().unwrap();
        assert_eq!(credentials.auth_key.as_bytes().len(), 20);
        assert_eq!(credentials.encryption_key.map(|k| k.bits()), Some(256));
    }

    #[test]
    fn test_load_missing_file() {
        let result = Config::load("/nonexistent/gsat-device.toml");
        assert!(matches!(result, Err(GsatError::Io(_))));
    }

    #[test]
    fn test_load_invalid_toml() {
        let err = Config::from_toml("[device\nauth_key = ").unwrap_err();
        assert!(matches!(err, GsatError::Config(_)));
        assert!(err.to_string().starts_with("config error: "));
    }

    #[test]
    fn test_legacy_device_needs_no_keys() {
        let config = Config::from_toml("[device]\nprotocol_version = 1\n").unwrap();
        assert!(!config.protocol_version().is_binary());
        assert!(config.device.encryption_key.is_none());
    }

    #[test]
    fn test_missing_auth_key() {
        let mut config = create_valid_config();
        config.device.auth_key = String::new();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_protocol_version_too_high() {
        let mut config = create_valid_config();
        config.device.protocol_version = 256;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_encryption_key_wrong_length() {
        let mut config = create_valid_config();
        config.device.encryption_key = Some("abcd".to_string());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_aes128_encryption_key() {
        let mut config = create_valid_config();
        config.device.encryption_key = Some("000102030405060708090a0b0c0d0e0f".to_string());
        assert!(config.validate().is_ok());
        let credentials = config.credentials().unwrap();
        assert_eq!(credentials.encryption_key.map(|k| k.bits()), Some(128));
    }

    #[test]
    fn test_no_encryption_key() {
        let mut config = create_valid_config();
        config.device.encryption_key = None;
        assert!(config.validate().is_ok());
        assert!(config.credentials().unwrap().encryption_key.is_none());
    }

    #[test]
    fn test_invalid_key_material() {
        let mut config = create_valid_config();
        config.device.encryption_key = Some("zz".repeat(16));
        assert!(config.validate().is_ok());
        let err = config.credentials().unwrap_err();
        assert!(matches!(err, GsatError::InvalidKey(_)));
        assert_eq!(err.layer(), Layer::Config);

        let mut config = create_valid_config();
        config.device.auth_key = "%%%".to_string();
        assert!(matches!(config.credentials(), Err(GsatError::InvalidKey(_))));
    }
}
