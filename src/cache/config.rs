//! Cache Configuration

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

use super::hashing::RowLimit;
use super::{MAXIMUM_PROPERTY_VALUE, ROW_PADDING_LENGTH};

/// Cache configuration
///
/// ```yaml
/// prefix: phishing_connector
/// max_size: 3000
/// max_property_value: 65536
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Namespace shared by every storage key of one cache
    pub prefix: String,
    /// Cap on the total entry count, `None` for unbounded
    pub max_size: Option<usize>,
    /// Maximum characters the context store accepts per value
    pub max_property_value: usize,
    /// Safety margin kept free below `max_property_value`
    pub row_padding: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            prefix: String::new(),
            max_size: None,
            max_property_value: MAXIMUM_PROPERTY_VALUE,
            row_padding: ROW_PADDING_LENGTH,
        }
    }
}

impl CacheConfig {
    /// Create a configuration for `prefix` with default limits
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            ..Self::default()
        }
    }

    pub fn with_max_size(mut self, max_size: Option<usize>) -> Self {
        self.max_size = max_size;
        self
    }

    pub fn with_max_property_value(mut self, max_property_value: usize) -> Self {
        self.max_property_value = max_property_value;
        self
    }

    pub fn with_row_padding(mut self, row_padding: usize) -> Self {
        self.row_padding = row_padding;
        self
    }

    /// Parse a YAML document
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a YAML configuration file
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&raw)
    }

    /// Check the configuration is usable
    pub fn validate(&self) -> Result<()> {
        if self.prefix.is_empty() {
            return Err(Error::Config("prefix must not be empty".to_string()));
        }
        if self.row_padding >= self.max_property_value {
            return Err(Error::Config(format!(
                "row_padding ({}) must be smaller than max_property_value ({})",
                self.row_padding, self.max_property_value
            )));
        }
        Ok(())
    }

    /// Row budget derived from the limits
    pub fn row_limit(&self) -> RowLimit {
        RowLimit::new(self.max_property_value, self.row_padding)
    }
}

// =============================================================================
// Tests
// =============================================================================
