//! # Save Configuration
//!
//! [`SaveConfig`] is the manager's mutable runtime configuration. It deserializes with serde
//! defaults, so a config file only names what it overrides, and [`load_config`] layers
//! `YOKI__`-prefixed environment variables on top of a file source.

use crate::error::{SaveError, SaveErrorExt};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::{Component, Path, PathBuf};
use std::time::Duration;
use tracing::info;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SaveConfig {
    /// Directory holding one file per slot.
    pub save_path: PathBuf,
    /// Schema version stamped on every save; older files are migrated on load.
    pub current_version: i32,
    /// Valid slots are `0..max_slots`.
    pub max_slots: i32,
    pub file_prefix: String,
    pub file_extension: String,
    pub auto_save_interval_secs: u64,
}

impl Default for SaveConfig {
    fn default() -> Self {
        Self {
            save_path: PathBuf::from("saves"),
            current_version: 1,
            max_slots: 16,
            file_prefix: "save_".to_owned(),
            file_extension: ".yoki".to_owned(),
            auto_save_interval_secs: 300,
        }
    }
}

impl SaveConfig {
    /// Checks the invariants every other method relies on.
    pub fn validate(&self) -> Result<(), SaveError> {
        if self.current_version < 1 {
            return Err(SaveError::invalid_config(format!(
                "current_version must be at least 1, got {}",
                self.current_version
            )));
        }
        if self.max_slots < 1 {
            return Err(SaveError::invalid_config(format!(
                "max_slots must be at least 1, got {}",
                self.max_slots
            )));
        }
        if self.auto_save_interval_secs == 0 {
            return Err(SaveError::invalid_config("auto_save_interval_secs must be positive"));
        }
        validate_naming_part("file_prefix", &self.file_prefix)?;
        validate_naming_part("file_extension", &self.file_extension)
    }

    /// File name for `slot`, e.g. `save_3.yoki`.
    #[must_use]
    pub fn file_name(&self, slot: i32) -> String {
        format!("{}{slot}{}", self.file_prefix, self.file_extension)
    }

    /// Inverse of [`file_name`](Self::file_name). Only canonical names match, so
    /// `save_03.yoki` or `save_-1.yoki` are ignored.
    #[must_use]
    pub fn parse_slot(&self, file_name: &str) -> Option<i32> {
        let digits =
            file_name.strip_prefix(&self.file_prefix)?.strip_suffix(&self.file_extension)?;
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        if digits.len() > 1 && digits.starts_with('0') {
            return None;
        }
        digits.parse().ok()
    }

    #[must_use]
    pub const fn contains_slot(&self, slot: i32) -> bool {
        slot >= 0 && slot < self.max_slots
    }

    pub fn check_slot(&self, slot: i32) -> Result<(), SaveError> {
        if self.contains_slot(slot) {
            Ok(())
        } else {
            Err(SaveError::SlotOutOfRange { slot, max_slots: self.max_slots, context: None })
        }
    }

    #[must_use]
    pub const fn auto_save_interval(&self) -> Duration {
        Duration::from_secs(self.auto_save_interval_secs)
    }
}

fn validate_naming_part(field: &'static str, value: &str) -> Result<(), SaveError> {
    if value.is_empty() {
        return Err(SaveError::invalid_config(format!("{field} must not be empty")));
    }
    let single_normal = {
        let mut components = Path::new(value).components();
        matches!(
            (components.next(), components.next()),
            (Some(Component::Normal(_)), None)
        )
    };
    if !single_normal || value.contains(['/', '\\']) {
        return Err(SaveError::invalid_config(format!("{field} `{value}` must not be a path")));
    }
    Ok(())
}

/// Loads a [`SaveConfig`] from a file, then applies environment overrides.
///
/// Without a path the loader looks for an optional `yoki` file (any format the `config` crate
/// understands: `yoki.toml`, `yoki.json`, ...) in the working directory. An explicit path must exist.
/// Environment variables use the `YOKI__` prefix, e.g. `YOKI__MAX_SLOTS=32`.
///
/// The result is validated before it is returned.
pub fn load_config(path: Option<impl AsRef<Path>>) -> Result<SaveConfig, SaveError> {
    let (effective_path, required) =
        path.map_or_else(|| (PathBuf::from("yoki"), false), |p| (p.as_ref().to_path_buf(), true));

    let builder = Config::builder()
        .add_source(File::from(effective_path.as_path()).required(required))
        .add_source(
            Environment::with_prefix("YOKI").separator("__").convert_case(config::Case::Snake),
        );

    info!(path = %effective_path.display(), required, "Loading save configuration");

    let config = builder
        .build()
        .context("Failed to build save configuration")?
        .try_deserialize::<SaveConfig>()
        .context("Failed to deserialize save configuration")?;

    config.validate()?;
    Ok(config)
}
