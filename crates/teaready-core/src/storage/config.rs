//! TOML-based application configuration.
//!
//! Stores user preferences including:
//! - The "tea's ready" reminder and readiness preference
//! - Cooling model tuning
//! - Alert pulse timing
//! - Per-tea steep time overrides (zero hides a tea)
//! - Display units
//!
//! Configuration is stored at `~/.config/teaready/config.toml`.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::data_dir;
use crate::alert::AlertConfig;
use crate::catalog::{TeaCatalog, TempUnit};
use crate::cooling::{
    CoolingModel, Readiness, DEFAULT_MINUTES_PER_DEGREE, DEFAULT_THRESHOLD_SECS,
};
use crate::error::ConfigError;
use crate::session::SessionSettings;

/// "Tea's ready" reminder after steeping.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReminderConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub readiness: Readiness,
}

/// Cooling model tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoolingConfig {
    #[serde(default = "default_minutes_per_degree")]
    pub minutes_per_degree: f64,
    #[serde(default = "default_threshold_secs")]
    pub threshold_secs: i64,
}

/// Vibration alert timing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertSettings {
    #[serde(default = "default_pulse_cap")]
    pub pulse_cap: u8,
    #[serde(default = "default_pulse_interval_secs")]
    pub pulse_interval_secs: u64,
    #[serde(default = "default_final_wait_secs")]
    pub final_wait_secs: u64,
}

/// How the catalog is shown.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DisplayConfig {
    #[serde(default)]
    pub temp_unit: TempUnit,
}

/// Application configuration.
///
/// Serialized to/from TOML at `~/.config/teaready/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub reminder: ReminderConfig,
    #[serde(default)]
    pub cooling: CoolingConfig,
    #[serde(default)]
    pub alert: AlertSettings,
    #[serde(default)]
    pub display: DisplayConfig,
    /// Steep time overrides in seconds, keyed by tea persist key.
    #[serde(default = "default_teas")]
    pub teas: BTreeMap<String, u16>,
}

// Default functions
fn default_true() -> bool {
    true
}
fn default_minutes_per_degree() -> f64 {
    DEFAULT_MINUTES_PER_DEGREE
}
fn default_threshold_secs() -> i64 {
    DEFAULT_THRESHOLD_SECS
}
fn default_pulse_cap() -> u8 {
    3
}
fn default_pulse_interval_secs() -> u64 {
    10
}
fn default_final_wait_secs() -> u64 {
    120
}
fn default_teas() -> BTreeMap<String, u16> {
    TeaCatalog::builtin()
        .profiles()
        .iter()
        .map(|p| (p.persist_key.clone(), p.default_duration_secs))
        .collect()
}

impl Default for ReminderConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            readiness: Readiness::default(),
        }
    }
}

impl Default for CoolingConfig {
    fn default() -> Self {
        Self {
            minutes_per_degree: default_minutes_per_degree(),
            threshold_secs: default_threshold_secs(),
        }
    }
}

impl Default for AlertSettings {
    fn default() -> Self {
        Self {
            pulse_cap: default_pulse_cap(),
            pulse_interval_secs: default_pulse_interval_secs(),
            final_wait_secs: default_final_wait_secs(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            reminder: ReminderConfig::default(),
            cooling: CoolingConfig::default(),
            alert: AlertSettings::default(),
            display: DisplayConfig::default(),
            teas: default_teas(),
        }
    }
}

impl Config {
    fn get_json_value_by_path<'a>(
        root: &'a serde_json::Value,
        key: &str,
    ) -> Option<&'a serde_json::Value> {
        if key.is_empty() {
            return None;
        }

        let mut current = root;
        for part in key.split('.') {
            current = current.get(part)?;
        }
        Some(current)
    }

    fn set_json_value_by_path(
        root: &mut serde_json::Value,
        key: &str,
        value: &str,
    ) -> Result<(), ConfigError> {
        let unknown = || ConfigError::UnknownKey(key.to_string());
        let invalid = |message: String| ConfigError::InvalidValue {
            key: key.to_string(),
            message,
        };

        if key.is_empty() {
            return Err(unknown());
        }
        let mut parts = key.split('.').peekable();

        let mut current = root;
        while let Some(part) = parts.next() {
            let is_leaf = parts.peek().is_none();
            if is_leaf {
                let obj = current.as_object_mut().ok_or_else(unknown)?;
                let existing = obj.get(part).ok_or_else(unknown)?;

                let new_value = match existing {
                    serde_json::Value::Bool(_) => serde_json::Value::Bool(
                        value.parse::<bool>().map_err(|e| invalid(e.to_string()))?,
                    ),
                    serde_json::Value::Number(_) => {
                        if let Ok(n) = value.parse::<i64>() {
                            serde_json::Value::Number(n.into())
                        } else if let Ok(n) = value.parse::<f64>() {
                            let number = serde_json::Number::from_f64(n).ok_or_else(|| {
                                invalid(format!("cannot parse '{value}' as number"))
                            })?;
                            serde_json::Value::Number(number)
                        } else {
                            return Err(invalid(format!("cannot parse '{value}' as number")));
                        }
                    }
                    serde_json::Value::Object(_) | serde_json::Value::Array(_) => {
                        serde_json::from_str(value).map_err(|e| invalid(e.to_string()))?
                    }
                    _ => serde_json::Value::String(value.into()),
                };

                obj.insert(part.to_string(), new_value);
                return Ok(());
            }

            current = current.get_mut(part).ok_or_else(unknown)?;
        }

        Err(unknown())
    }

    fn path() -> Result<PathBuf, ConfigError> {
        Ok(data_dir()?.join("config.toml"))
    }

    /// Load from disk, writing defaults on first run.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed or
    /// fails validation, or if the default config cannot be written.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::path()?;
        match std::fs::read_to_string(&path) {
            Ok(content) => Self::from_toml(&content),
            Err(_) => {
                let cfg = Self::default();
                cfg.save()?;
                Ok(cfg)
            }
        }
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let cfg: Config =
            toml::from_str(content).map_err(|e| ConfigError::ParseFailed(e.to_string()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Persist to disk.
    ///
    /// # Errors
    ///
    /// Returns an error if the config cannot be serialized or written to disk.
    pub fn save(&self) -> Result<(), ConfigError> {
        let path = Self::path()?;
        let content = toml::to_string_pretty(self).map_err(|e| ConfigError::SaveFailed {
            path: path.clone(),
            message: e.to_string(),
        })?;
        std::fs::write(&path, content).map_err(|e| ConfigError::SaveFailed {
            path,
            message: e.to_string(),
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.alert.pulse_cap == 0 {
            return Err(ConfigError::InvalidValue {
                key: "alert.pulse_cap".into(),
                message: "must be at least 1".into(),
            });
        }
        if !self.cooling.minutes_per_degree.is_finite() || self.cooling.minutes_per_degree < 0.0 {
            return Err(ConfigError::InvalidValue {
                key: "cooling.minutes_per_degree".into(),
                message: "must be a non-negative number".into(),
            });
        }
        Ok(())
    }

    /// Get a config value as string by dot-separated key.
    pub fn get(&self, key: &str) -> Option<String> {
        let json = serde_json::to_value(self).ok()?;
        let val = Self::get_json_value_by_path(&json, key)?;
        match val {
            serde_json::Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    /// Set a config value by key without saving. Returns error if the key
    /// is unknown or the result does not validate.
    pub fn apply(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        let mut json =
            serde_json::to_value(&*self).map_err(|e| ConfigError::ParseFailed(e.to_string()))?;
        Self::set_json_value_by_path(&mut json, key, value)?;
        let updated: Config = serde_json::from_value(json).map_err(|e| ConfigError::InvalidValue {
            key: key.to_string(),
            message: e.to_string(),
        })?;
        updated.validate()?;
        *self = updated;
        Ok(())
    }

    /// Set a config value by key and save.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is unknown, the value cannot be parsed,
    /// or the config cannot be saved.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        self.apply(key, value)?;
        self.save()
    }

    /// Settings handed to the session machine.
    pub fn session_settings(&self) -> SessionSettings {
        SessionSettings {
            reminder_enabled: self.reminder.enabled,
            readiness: self.reminder.readiness,
            cooling: CoolingModel {
                minutes_per_degree: self.cooling.minutes_per_degree,
                threshold_secs: self.cooling.threshold_secs,
            },
            alert: AlertConfig {
                pulse_cap: self.alert.pulse_cap,
                pulse_interval: Duration::from_secs(self.alert.pulse_interval_secs),
                final_wait: Duration::from_secs(self.alert.final_wait_secs),
            },
        }
    }

    /// Built-in catalog with this config's steep time overrides applied.
    pub fn catalog(&self) -> TeaCatalog {
        TeaCatalog::builtin().with_overrides(&self.teas)
    }

    /// Load from disk, returning default on error.
    /// This is a convenience method that never fails.
    pub fn load_or_default() -> Self {
        Self::load().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_roundtrip() {
        let cfg = Config::default();
        let toml_str = toml::to_string_pretty(&cfg).unwrap();
        let parsed = Config::from_toml(&toml_str).unwrap();
        assert!(parsed.reminder.enabled);
        assert_eq!(parsed.reminder.readiness, Readiness::Hot);
        assert_eq!(parsed.teas.get("green"), Some(&120));
    }

    #[test]
    fn empty_file_gets_defaults() {
        let cfg = Config::from_toml("").unwrap();
        assert_eq!(cfg.alert.pulse_cap, 3);
        assert_eq!(cfg.cooling.minutes_per_degree, 2.5);
        assert_eq!(cfg.teas.len(), 9);
    }

    #[test]
    fn readiness_out_of_range_is_rejected() {
        let result = Config::from_toml("[reminder]\nreadiness = 7\n");
        assert!(matches!(result, Err(ConfigError::ParseFailed(_))));
    }

    #[test]
    fn get_supports_dot_path_keys() {
        let cfg = Config::default();
        assert_eq!(cfg.get("reminder.enabled").as_deref(), Some("true"));
        assert_eq!(cfg.get("reminder.readiness").as_deref(), Some("1"));
        assert_eq!(cfg.get("teas.black").as_deref(), Some("240"));
        assert!(cfg.get("reminder.missing_key").is_none());
    }

    #[test]
    fn apply_updates_nested_values() {
        let mut cfg = Config::default();
        cfg.apply("reminder.enabled", "false").unwrap();
        cfg.apply("reminder.readiness", "3").unwrap();
        cfg.apply("cooling.minutes_per_degree", "0.5").unwrap();
        cfg.apply("teas.green", "150").unwrap();
        assert!(!cfg.reminder.enabled);
        assert_eq!(cfg.reminder.readiness, Readiness::Mild);
        assert_eq!(cfg.cooling.minutes_per_degree, 0.5);
        assert_eq!(cfg.catalog().profiles()[1].default_duration_secs, 150);
    }

    #[test]
    fn apply_rejects_unknown_key() {
        let mut cfg = Config::default();
        assert!(matches!(
            cfg.apply("reminder.nonexistent", "1"),
            Err(ConfigError::UnknownKey(_))
        ));
        assert!(matches!(cfg.apply("", "1"), Err(ConfigError::UnknownKey(_))));
    }

    #[test]
    fn apply_rejects_invalid_values() {
        let mut cfg = Config::default();
        assert!(cfg.apply("reminder.enabled", "not_a_bool").is_err());
        assert!(cfg.apply("reminder.readiness", "9").is_err());
        assert!(cfg.apply("alert.pulse_cap", "0").is_err());
        // Failed applies leave the config untouched.
        assert_eq!(cfg.alert.pulse_cap, 3);
        assert_eq!(cfg.reminder.readiness, Readiness::Hot);
    }

    #[test]
    fn temp_unit_and_hidden_tea() {
        let mut cfg = Config::default();
        assert_eq!(cfg.get("display.temp_unit").as_deref(), Some("celsius"));
        cfg.apply("display.temp_unit", "rankine").unwrap();
        assert_eq!(cfg.display.temp_unit, TempUnit::Rankine);
        assert!(cfg.apply("display.temp_unit", "reaumur").is_err());
        assert_eq!(cfg.display.temp_unit, TempUnit::Rankine);

        cfg.apply("teas.matcha", "0").unwrap();
        assert!(!cfg.catalog().is_visible(4));
    }

    #[test]
    fn session_settings_mirror_config() {
        let mut cfg = Config::default();
        cfg.alert.final_wait_secs = 60;
        cfg.reminder.readiness = Readiness::Cool;
        let settings = cfg.session_settings();
        assert_eq!(settings.alert.final_wait, Duration::from_secs(60));
        assert_eq!(settings.alert.pulse_interval, Duration::from_secs(10));
        assert_eq!(settings.readiness, Readiness::Cool);
        assert_eq!(settings.cooling.threshold_secs, 30);
    }
}
