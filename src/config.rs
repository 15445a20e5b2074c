//! # Configuration Module
//!
//! Startup configuration for a dispatcher, from a YAML file and the
//! environment.
//!
//! ## File format
//!
//! ```yaml
//! # Coroutine stack size for spawn_incoming, decimal or 0x hex
//! stack_size: 0x10000
//!
//! # Namespace -> ordered default filter names
//! filters:
//!   default: [logging]
//!   admin: [auth, logging]
//! ```
//!
//! Every key is optional.
//!
//! ## Environment Variables
//!
//! ### `STREST_STACK_SIZE`
//!
//! Overrides `stack_size`. Accepts decimal (`65536`) or hexadecimal
//! (`0x10000`). Unparsable values are ignored with a warning.
//!
//! ## Usage
//!
//! ```rust
//! use strest::config::StrestConfig;
//! use strest::dispatcher::Dispatcher;
//!
//! let config: StrestConfig = serde_yaml::from_str("stack_size: 0x8000").unwrap();
//! let dispatcher = Dispatcher::with_config(&config);
//! assert_eq!(dispatcher.stack_size(), 0x8000);
//! ```

use anyhow::Context;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashMap;
use std::env;
use std::path::Path;
use tracing::{debug, warn};

/// Coroutine stack size when none is configured (64 KB).
pub const DEFAULT_STACK_SIZE: usize = 0x10000;

/// Environment variable overriding the configured stack size.
pub const STACK_SIZE_ENV: &str = "STREST_STACK_SIZE";

/// Dispatcher configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StrestConfig {
    /// Stack size in bytes for coroutines started by `spawn_incoming`
    #[serde(
        deserialize_with = "deserialize_stack_size",
        skip_serializing_if = "Option::is_none"
    )]
    pub stack_size: Option<usize>,

    /// Default filter names per namespace
    pub filters: HashMap<String, Vec<String>>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum StackSizeValue {
    Bytes(usize),
    Text(String),
}

fn deserialize_stack_size<'de, D>(deserializer: D) -> Result<Option<usize>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<StackSizeValue>::deserialize(deserializer)? {
        None => Ok(None),
        Some(StackSizeValue::Bytes(n)) => Ok(Some(n)),
        Some(StackSizeValue::Text(s)) => parse_stack_size(&s)
            .map(Some)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid stack_size: {s:?}"))),
    }
}

/// Parse a stack size given as decimal or `0x`-prefixed hexadecimal.
#[must_use]
pub fn parse_stack_size(value: &str) -> Option<usize> {
    let value = value.trim();
    if let Some(hex) = value
        .strip_prefix("0x")
        .or_else(|| value.strip_prefix("0X"))
    {
        usize::from_str_radix(hex, 16).ok()
    } else {
        value.parse().ok()
    }
}

impl StrestConfig {
    /// Read and parse a YAML configuration file.
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config: {}", path.display()))?;
        let config: StrestConfig = serde_yaml::from_str(&contents)
            .with_context(|| format!("Failed to parse config: {}", path.display()))?;
        debug!(path = %path.display(), config = ?config, "Configuration loaded");
        Ok(config)
    }

    /// Defaults with environment overrides applied.
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env();
        config
    }

    /// [`StrestConfig::load`] followed by environment overrides.
    pub fn load_with_env(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let mut config = Self::load(path)?;
        config.apply_env();
        Ok(config)
    }

    /// Apply `STREST_STACK_SIZE` if set and valid.
    pub fn apply_env(&mut self) {
        let Ok(raw) = env::var(STACK_SIZE_ENV) else {
            return;
        };
        match parse_stack_size(&raw) {
            Some(stack_size) => self.stack_size = Some(stack_size),
            None => warn!(
                variable = STACK_SIZE_ENV,
                value = %raw,
                "Ignoring invalid stack size"
            ),
        }
    }

    /// Configured stack size, or [`DEFAULT_STACK_SIZE`].
    #[must_use]
    pub fn effective_stack_size(&self) -> usize {
        self.stack_size.unwrap_or(DEFAULT_STACK_SIZE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn parses_decimal_and_hex() {
        assert_eq!(parse_stack_size("65536"), Some(65536));
        assert_eq!(parse_stack_size("0x4000"), Some(0x4000));
        assert_eq!(parse_stack_size(" 0X10 "), Some(16));
        assert_eq!(parse_stack_size("big"), None);
        assert_eq!(parse_stack_size("0xzz"), None);
    }

    #[test]
    fn empty_document_is_default() {
        let config: StrestConfig = serde_yaml::from_str("{}").unwrap();
        assert_eq!(config, StrestConfig::default());
        assert_eq!(config.effective_stack_size(), DEFAULT_STACK_SIZE);
    }

    #[test]
    fn stack_size_accepts_int_or_hex_string() {
        let config: StrestConfig = serde_yaml::from_str("stack_size: 32768").unwrap();
        assert_eq!(config.stack_size, Some(32768));

        let config: StrestConfig = serde_yaml::from_str("stack_size: \"0x8000\"").unwrap();
        assert_eq!(config.stack_size, Some(0x8000));

        assert!(serde_yaml::from_str::<StrestConfig>("stack_size: lots").is_err());
    }

    #[test]
    fn load_reads_filters_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "stack_size: 0x8000\nfilters:\n  default: [logging]\n  admin: [auth, logging]"
        )
        .unwrap();

        let config = StrestConfig::load(file.path()).unwrap();
        assert_eq!(config.stack_size, Some(0x8000));
        assert_eq!(config.filters["default"], ["logging"]);
        assert_eq!(config.filters["admin"], ["auth", "logging"]);
    }

    #[test]
    fn load_reports_missing_file() {
        let err = StrestConfig::load("/definitely/not/here.yaml").unwrap_err();
        assert!(err.to_string().contains("Failed to read config"));
    }

    #[test]
    fn load_reports_parse_errors() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "filters: [not, a, map]").unwrap();
        let err = StrestConfig::load(file.path()).unwrap_err();
        assert!(err.to_string().contains("Failed to parse config"));
    }
}
