//! Configuration for Questlog.
//!
//! Maps directly to `questlog.toml`. Every section and field is optional.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Default scheduling horizon for sessions, in days.
pub const DEFAULT_MAX_FUTURE_DAYS: i64 = 365;

/// Default look-back window for "active" campaigns, in days.
pub const DEFAULT_ACTIVE_WINDOW_DAYS: i64 = 30;

/// Largest accepted value for any day count in the config (about a century).
pub const MAX_CONFIG_DAYS: i64 = 36_525;

/// Top-level configuration, loadable from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QuestlogConfig {
    /// General settings.
    #[serde(default)]
    pub general: GeneralConfig,
    /// Database settings.
    #[serde(default)]
    pub persistence: PersistenceConfig,
    /// Session scheduling rules.
    #[serde(default)]
    pub sessions: SessionConfig,
    /// Calendar conventions for week/month classification.
    #[serde(default)]
    pub calendar: CalendarConfig,
    /// Campaign query tuning.
    #[serde(default)]
    pub campaigns: CampaignConfig,
}

impl QuestlogConfig {
    /// Load configuration from a TOML string.
    ///
    /// # Errors
    /// Returns `QuestlogError::Config` if the TOML is invalid or a value is
    /// out of range.
    pub fn from_toml(toml_str: &str) -> crate::error::Result<Self> {
        let config: Self = toml::from_str(toml_str).map_err(|e| crate::QuestlogError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Check value ranges that serde cannot express.
    ///
    /// Day counts must lie in `0..=MAX_CONFIG_DAYS` so that date arithmetic
    /// on them never leaves chrono's representable range.
    ///
    /// # Errors
    /// Returns `QuestlogError::Config` naming the first offending field.
    pub fn validate(&self) -> crate::error::Result<()> {
        check_days("sessions.max_future_days", self.sessions.max_future_days)?;
        check_days("campaigns.active_window_days", self.campaigns.active_window_days)
    }

    /// Load configuration from a TOML file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &std::path::Path) -> crate::error::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }
}

// ---------------------------------------------------------------------------
// Sub-configs
// ---------------------------------------------------------------------------

/// General settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Log level: trace, debug, info, warn, error.
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Emit logs as JSON lines instead of human-readable text.
    #[serde(default)]
    pub json_logs: bool,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            json_logs: false,
        }
    }
}

/// SQLite database settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistenceConfig {
    /// Database file path.
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
    /// Use WAL mode for concurrent reads.
    #[serde(default = "default_true")]
    pub wal_mode: bool,
    /// How long a writer waits on a locked database, in milliseconds.
    #[serde(default = "default_busy_timeout")]
    pub busy_timeout_ms: u32,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
            wal_mode: true,
            busy_timeout_ms: default_busy_timeout(),
        }
    }
}

/// Session scheduling rules.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Furthest a session may be scheduled ahead of now, in days (inclusive).
    #[serde(default = "default_max_future_days")]
    pub max_future_days: i64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_future_days: DEFAULT_MAX_FUTURE_DAYS,
        }
    }
}

/// First day of the calendar week.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WeekStart {
    /// ISO weeks: Monday through Sunday.
    #[default]
    Monday,
    /// Sunday through Saturday.
    Sunday,
}

/// Calendar conventions. All calendar arithmetic is done in UTC.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CalendarConfig {
    /// Day the week begins on.
    #[serde(default)]
    pub week_start: WeekStart,
}

/// Campaign query tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CampaignConfig {
    /// A campaign is "active" if it has a session within this many days.
    #[serde(default = "default_active_window_days")]
    pub active_window_days: i64,
}

impl Default for CampaignConfig {
    fn default() -> Self {
        Self {
            active_window_days: DEFAULT_ACTIVE_WINDOW_DAYS,
        }
    }
}

fn check_days(field: &str, days: i64) -> crate::error::Result<()> {
    if (0..=MAX_CONFIG_DAYS).contains(&days) {
        Ok(())
    } else {
        Err(crate::QuestlogError::Config(format!(
            "{field} must be between 0 and {MAX_CONFIG_DAYS} days, got {days}"
        )))
    }
}

// ---------------------------------------------------------------------------
// Serde default helpers
// ---------------------------------------------------------------------------

fn default_true() -> bool {
    true
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_db_path() -> PathBuf {
    PathBuf::from("questlog.db")
}
fn default_busy_timeout() -> u32 {
    5000
}
fn default_max_future_days() -> i64 {
    DEFAULT_MAX_FUTURE_DAYS
}
fn default_active_window_days() -> i64 {
    DEFAULT_ACTIVE_WINDOW_DAYS
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = QuestlogConfig::default();
        assert_eq!(config.general.log_level, "info");
        assert_eq!(config.sessions.max_future_days, 365);
        assert_eq!(config.campaigns.active_window_days, 30);
        assert_eq!(config.calendar.week_start, WeekStart::Monday);
        assert!(config.persistence.wal_mode);
    }

    #[test]
    fn empty_toml_uses_defaults() {
        let config = QuestlogConfig::from_toml("").expect("parse");
        assert_eq!(config.persistence.path, PathBuf::from("questlog.db"));
        assert_eq!(config.persistence.busy_timeout_ms, 5000);
    }

    #[test]
    fn partial_toml_overrides() {
        let toml = r#"
[general]
log_level = "debug"
json_logs = true

[calendar]
week_start = "sunday"

[campaigns]
active_window_days = 14
"#;
        let config = QuestlogConfig::from_toml(toml).expect("parse");
        assert_eq!(config.general.log_level, "debug");
        assert!(config.general.json_logs);
        assert_eq!(config.calendar.week_start, WeekStart::Sunday);
        assert_eq!(config.campaigns.active_window_days, 14);
        // Untouched sections keep defaults.
        assert_eq!(config.sessions.max_future_days, 365);
    }

    #[test]
    fn invalid_toml_is_config_error() {
        let err = QuestlogConfig::from_toml("[calendar]\nweek_start = \"friday\"").expect_err("bad");
        assert!(matches!(err, crate::QuestlogError::Config(_)));
    }

    #[test]
    fn out_of_range_days_are_config_errors() {
        let err = QuestlogConfig::from_toml("[sessions]\nmax_future_days = 100000000\n").expect_err("horizon");
        assert!(matches!(&err, crate::QuestlogError::Config(msg) if msg.contains("sessions.max_future_days")));

        let err =
            QuestlogConfig::from_toml("[campaigns]\nactive_window_days = 200000000000\n").expect_err("window");
        assert!(matches!(&err, crate::QuestlogError::Config(msg) if msg.contains("campaigns.active_window_days")));

        let err = QuestlogConfig::from_toml("[campaigns]\nactive_window_days = -1\n").expect_err("negative");
        assert!(matches!(err, crate::QuestlogError::Config(_)));

        let edge = format!("[sessions]\nmax_future_days = {MAX_CONFIG_DAYS}\n");
        assert!(QuestlogConfig::from_toml(&edge).is_ok());
    }

    #[test]
    fn from_file_reads_toml() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("questlog.toml");
        std::fs::write(&path, "[sessions]\nmax_future_days = 90\n").expect("write");
        let config = QuestlogConfig::from_file(&path).expect("load");
        assert_eq!(config.sessions.max_future_days, 90);
    }
}
