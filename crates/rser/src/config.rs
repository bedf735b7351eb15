//! Codec configuration.

use serde::{Deserialize, Serialize};

use crate::codes::VERSION;
use crate::error::ConfigError;

/// Settings shared by the encoder and the decoder.
///
/// ```
/// use rser::CodecConfig;
///
/// let config = CodecConfig::from_json_str(r#"{"templated_object_arrays": false}"#).unwrap();
/// assert!(!config.templated_object_arrays);
/// assert_eq!(config.version, rser::VERSION);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CodecConfig {
    /// Format version written in and required from stream headers.
    pub version: u32,
    /// Initial buffer size of the stream accumulator.
    pub initial_capacity: usize,
    /// Emit arrays of same-shaped objects as templated object arrays.
    pub templated_object_arrays: bool,
    /// Deepest container nesting accepted by the encoder and the decoder.
    pub max_depth: usize,
    pub key_cache: KeyCacheConfig,
}

impl Default for CodecConfig {
    fn default() -> Self {
        Self {
            version: VERSION,
            initial_capacity: 4 * 1024,
            templated_object_arrays: true,
            max_depth: 256,
            key_cache: KeyCacheConfig::default(),
        }
    }
}

/// Bounds of the decode-time key cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeyCacheConfig {
    /// Maximum number of cached keys. Zero disables the cache.
    pub capacity: usize,
    /// Keys longer than this many bytes are never cached.
    pub max_key_len: usize,
}

impl Default for KeyCacheConfig {
    fn default() -> Self {
        Self {
            capacity: 256,
            max_key_len: 32,
        }
    }
}

impl CodecConfig {
    /// Parses and validates a JSON config. Missing fields keep their defaults.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: CodecConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.version == 0 {
            return Err(ConfigError::Zero { field: "version" });
        }
        if self.initial_capacity == 0 {
            return Err(ConfigError::Zero {
                field: "initial_capacity",
            });
        }
        if self.max_depth == 0 {
            return Err(ConfigError::Zero { field: "max_depth" });
        }
        Ok(())
    }
}
