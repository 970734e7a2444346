//! Tracker configuration
//!
//! Loaded from TOML; every section and field is optional. A small set of
//! environment variables override the file.
//!
//! ```toml
//! [undo]
//! window_ms = 10000
//!
//! [ledger]
//! max_entries = 200
//!
//! [audit]
//! collection = "audit_logs"
//! max_attempts = 3
//! backoff_ms = 250
//! ```

use ctrack_audit::AuditSettings;
use ctrack_ledger::RetentionPolicy;
use ctrack_model::collections;
use ctrack_notify::PromptSettings;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Overrides `undo.window_ms`
pub const UNDO_WINDOW_ENV: &str = "CTRACK_UNDO_WINDOW_MS";

/// Configuration loading errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// File could not be read
    #[error("failed to read {path}: {source}")]
    Io {
        /// File path
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// TOML syntax or type error
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),

    /// Value out of range
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Complete tracker configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// Reversible prompt durations
    pub undo: UndoConfig,
    /// Ledger retention
    pub ledger: LedgerConfig,
    /// Audit trail destination and retry policy
    pub audit: AuditConfig,
    /// Log output
    pub telemetry: TelemetryConfig,
}

/// Reversible prompt durations, in milliseconds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UndoConfig {
    /// Reversal window
    pub window_ms: u64,
    /// Success confirmation duration
    pub confirmation_ms: u64,
    /// Failure message duration
    pub error_ms: u64,
}

impl Default for UndoConfig {
    fn default() -> Self {
        Self {
            window_ms: 10_000,
            confirmation_ms: 3_000,
            error_ms: 5_000,
        }
    }
}

/// Ledger retention
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// Most entries kept; `None` is unbounded
    pub max_entries: Option<usize>,
    /// Oldest entry age in seconds; `None` keeps entries indefinitely
    pub max_age_secs: Option<u64>,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        let retention = RetentionPolicy::default();
        Self {
            max_entries: retention.max_entries,
            max_age_secs: retention.max_age.map(|age| age.as_secs()),
        }
    }
}

/// Audit trail destination and retry policy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuditConfig {
    /// Append-only collection
    pub collection: String,
    /// Total attempts per event
    pub max_attempts: u32,
    /// Pause between attempts, in milliseconds
    pub backoff_ms: u64,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            collection: collections::AUDIT_LOGS.to_string(),
            max_attempts: 1,
            backoff_ms: 250,
        }
    }
}

/// Log output
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is unset
    pub filter: String,
    /// Emit JSON lines instead of human-readable output
    pub json: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
            json: false,
        }
    }
}

impl TrackerConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse and validate TOML
    ///
    /// # Errors
    /// Parse errors and out-of-range values.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file
    ///
    /// # Errors
    /// I/O, parse errors and out-of-range values.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Apply overrides from the process environment
    ///
    /// # Errors
    /// An override that is not a valid number.
    pub fn with_env_overrides(self) -> Result<Self, ConfigError> {
        self.with_overrides_from(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary variable lookup
    ///
    /// # Errors
    /// An override that is not a valid number.
    pub fn with_overrides_from(
        mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        if let Some(raw) = lookup(UNDO_WINDOW_ENV) {
            self.undo.window_ms = raw.trim().parse().map_err(|_| {
                ConfigError::Invalid(format!("{UNDO_WINDOW_ENV} must be milliseconds, got {raw:?}"))
            })?;
        }
        Ok(self)
    }

    /// With reversal window
    #[inline]
    #[must_use]
    pub fn with_undo_window(mut self, window: Duration) -> Self {
        self.undo.window_ms = duration_millis(window);
        self
    }

    /// With ledger entry cap
    #[inline]
    #[must_use]
    pub fn with_max_entries(mut self, max: Option<usize>) -> Self {
        self.ledger.max_entries = max;
        self
    }

    /// With audit retry policy
    #[inline]
    #[must_use]
    pub fn with_audit_retry(mut self, max_attempts: u32, backoff: Duration) -> Self {
        self.audit.max_attempts = max_attempts;
        self.audit.backoff_ms = duration_millis(backoff);
        self
    }

    /// Check ranges
    ///
    /// # Errors
    /// [`ConfigError::Invalid`] naming the offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.audit.max_attempts == 0 {
            return Err(ConfigError::Invalid("audit.max_attempts must be at least 1".into()));
        }
        if self.audit.collection.trim().is_empty() {
            return Err(ConfigError::Invalid("audit.collection must not be empty".into()));
        }
        if self.ledger.max_entries == Some(0) {
            return Err(ConfigError::Invalid("ledger.max_entries must be positive or unset".into()));
        }
        Ok(())
    }

    /// Prompt durations for the notification coordinator
    #[must_use]
    pub fn prompt_settings(&self) -> PromptSettings {
        PromptSettings {
            default_window: Duration::from_millis(self.undo.window_ms),
            confirmation: Duration::from_millis(self.undo.confirmation_ms),
            error: Duration::from_millis(self.undo.error_ms),
        }
    }

    /// Ledger retention policy
    #[must_use]
    pub fn retention(&self) -> RetentionPolicy {
        RetentionPolicy {
            max_entries: self.ledger.max_entries,
            max_age: self.ledger.max_age_secs.map(Duration::from_secs),
        }
    }

    /// Audit writer settings
    #[must_use]
    pub fn audit_settings(&self) -> AuditSettings {
        AuditSettings::default()
            .with_collection(self.audit.collection.clone())
            .with_retry(self.audit.max_attempts, Duration::from_millis(self.audit.backoff_ms))
    }
}

fn duration_millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;

    #[test]
    fn empty_document_yields_defaults() {
        let config = TrackerConfig::from_toml_str("").unwrap();
        assert_eq!(config, TrackerConfig::default());
        assert_eq!(config.prompt_settings(), PromptSettings::default());
        assert_eq!(config.retention(), RetentionPolicy::default());
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let config = TrackerConfig::from_toml_str(
            r#"
            [undo]
            window_ms = 4000

            [audit]
            max_attempts = 3
            "#,
        )
        .unwrap();

        assert_eq!(config.undo.window_ms, 4000);
        assert_eq!(config.undo.confirmation_ms, 3000);
        assert_eq!(config.audit.collection, "audit_logs");
        assert_eq!(config.audit_settings().max_attempts, 3);
    }

    #[test]
    fn rejects_zero_attempts() {
        let err = TrackerConfig::from_toml_str("[audit]\nmax_attempts = 0").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn rejects_malformed_toml() {
        let err = TrackerConfig::from_toml_str("[undo\nwindow_ms = 1").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn env_override_replaces_window() {
        let config = TrackerConfig::new()
            .with_overrides_from(|key| (key == UNDO_WINDOW_ENV).then(|| "2500".to_string()))
            .unwrap();
        assert_eq!(config.prompt_settings().default_window, Duration::from_millis(2500));

        let err = TrackerConfig::new()
            .with_overrides_from(|_| Some("soon".to_string()))
            .unwrap_err();
        assert!(err.to_string().contains(UNDO_WINDOW_ENV));
    }

    #[test]
    fn loads_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[ledger]\nmax_entries = 5\nmax_age_secs = 60").unwrap();

        let config = TrackerConfig::from_file(file.path()).unwrap();
        assert_eq!(
            config.retention(),
            RetentionPolicy::unbounded()
                .with_max_entries(5)
                .with_max_age(Duration::from_secs(60))
        );
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = TrackerConfig::from_file("/nonexistent/ctrack.toml").unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
