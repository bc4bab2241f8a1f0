//! View State Configuration
//!
//! The configuration surface consumed by the view state manager and the page
//! pipeline. The host application owns loading (files, environment); this
//! module only defines the shape, the presets and validation.

use serde::{Deserialize, Serialize};

use crate::viewstate::compression::CompressionKind;
use crate::viewstate::token::{HEADER_LENGTH, HASH_LENGTH};
use crate::{Result, WebFormsError};

// ----------------------------------------------------------------------------
// Defaults
// ----------------------------------------------------------------------------

/// Default ceiling for an encoded token
pub const DEFAULT_MAX_BYTES: usize = 100 * 1024;

/// Default zstd compression level
pub const DEFAULT_ZSTD_LEVEL: i32 = 3;

// ----------------------------------------------------------------------------
// View State Configuration
// ----------------------------------------------------------------------------

/// Configuration for view state persistence
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewStateConfig {
    /// Whether view state is read and written at all
    pub enabled: bool,
    /// Maximum size of an encoded (base64) token in bytes
    pub max_bytes: usize,
    /// Codecs to try, strongest first. Raw storage is always the final fallback.
    pub compression: Vec<CompressionKind>,
    /// Level used by the zstd codec
    pub zstd_level: i32,
    /// Key material for HMAC-SHA256. Without a key an unkeyed SHA-256 is used.
    pub hash_key: Option<String>,
    /// Initial `EnableViewState` value for newly attached controls
    pub enable_view_state_default: bool,
}

impl Default for ViewStateConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_bytes: DEFAULT_MAX_BYTES,
            compression: CompressionKind::default_preference(),
            zstd_level: DEFAULT_ZSTD_LEVEL,
            hash_key: None,
            enable_view_state_default: true,
        }
    }
}

impl ViewStateConfig {
    /// Uncompressed, unkeyed configuration that keeps tokens easy to inspect
    pub fn testing() -> Self {
        Self {
            compression: Vec::new(),
            ..Self::default()
        }
    }

    /// Keyed configuration with a tighter size ceiling
    pub fn strict<K: Into<String>>(key: K) -> Self {
        Self {
            max_bytes: 16 * 1024,
            hash_key: Some(key.into()),
            ..Self::default()
        }
    }

    /// Use the given key for HMAC-SHA256
    pub fn with_hash_key<K: Into<String>>(mut self, key: K) -> Self {
        self.hash_key = Some(key.into());
        self
    }

    /// Replace the codec preference order
    pub fn with_compression(mut self, compression: Vec<CompressionKind>) -> Self {
        self.compression = compression;
        self
    }

    /// Set the encoded token ceiling
    pub fn with_max_bytes(mut self, max_bytes: usize) -> Self {
        self.max_bytes = max_bytes;
        self
    }

    /// Smallest encoded token that can carry a header and a hash
    pub fn minimum_token_bytes() -> usize {
        base64::encoded_len(HEADER_LENGTH + HASH_LENGTH, true).unwrap_or(usize::MAX)
    }

    /// Check the configuration for values the manager cannot work with
    pub fn validate(&self) -> Result<()> {
        let minimum = Self::minimum_token_bytes();
        if self.max_bytes < minimum {
            return Err(WebFormsError::config_error(format!(
                "max_bytes must be at least {} (got {})",
                minimum, self.max_bytes
            )));
        }

        for (index, kind) in self.compression.iter().enumerate() {
            if self.compression[..index].contains(kind) {
                return Err(WebFormsError::config_error(format!(
                    "compression kind {:?} listed twice",
                    kind
                )));
            }
            if !kind.is_available() {
                return Err(WebFormsError::config_error(format!(
                    "compression kind {:?} is not available in this build",
                    kind
                )));
            }
        }

        if matches!(&self.hash_key, Some(key) if key.is_empty()) {
            return Err(WebFormsError::config_error(
                "hash_key must not be empty; omit it for an unkeyed digest",
            ));
        }

        Ok(())
    }
}
