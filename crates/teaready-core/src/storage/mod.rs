mod config;
pub mod database;
pub mod wakeups;

pub use config::{AlertSettings, Config, CoolingConfig, DisplayConfig, ReminderConfig};
pub use database::Database;
pub use wakeups::WakeupQueue;

use std::path::PathBuf;

use crate::error::ConfigError;

/// Returns `~/.config/teaready[-dev]/` based on TEAREADY_ENV.
///
/// Set TEAREADY_ENV=dev to use development data directory.
/// TEAREADY_DATA_DIR overrides the location entirely.
///
/// # Errors
/// Returns an error if creating the directory fails.
pub fn data_dir() -> Result<PathBuf, ConfigError> {
    let dir = match std::env::var_os("TEAREADY_DATA_DIR") {
        Some(dir) => PathBuf::from(dir),
        None => {
            let base_dir = dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".config");

            let env = std::env::var("TEAREADY_ENV").unwrap_or_else(|_| "production".to_string());

            if env == "dev" {
                base_dir.join("teaready-dev")
            } else {
                base_dir.join("teaready")
            }
        }
    };

    std::fs::create_dir_all(&dir)
        .map_err(|e| ConfigError::DataDir(format!("{}: {e}", dir.display())))?;
    Ok(dir)
}

/// Path of the SQLite file shared by [`Database`] and [`WakeupQueue`].
pub fn database_path() -> Result<PathBuf, ConfigError> {
    Ok(data_dir()?.join("teaready.db"))
}
