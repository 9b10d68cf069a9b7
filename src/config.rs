// src/config.rs

//! Configuration loading utilities.
//!
//! Settings come from three layers, later ones winning: built-in defaults,
//! an optional TOML file, and process environment variables.

use std::path::Path;

use crate::error::Result;
use crate::models::Config;

/// Load configuration from a TOML file, apply environment overrides and
/// validate the result.
///
/// Falls back to defaults if the file cannot be loaded.
pub fn load_config(path: &Path) -> Result<Config> {
    load_config_with(path, |key| std::env::var(key).ok())
}

/// [`load_config`] with an explicit variable lookup.
pub fn load_config_with<F>(path: &Path, lookup: F) -> Result<Config>
where
    F: Fn(&str) -> Option<String>,
{
    let mut config = if path.exists() {
        Config::load_or_default(path)
    } else {
        log::info!("No config file at {}, using defaults", path.display());
        Config::default()
    };

    config.apply_overrides(lookup)?;
    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let temp = TempDir::new().unwrap();
        let config = load_config_with(&temp.path().join("absent.toml"), no_env).unwrap();
        assert_eq!(config.ingestion.window_hours, 24);
        assert_eq!(config.sources.len(), 5);
    }

    #[test]
    fn test_file_then_env_layering() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("harvester.toml");
        std::fs::write(
            &path,
            "[ingestion]\nwindow_hours = 12\nmeta_fetch_budget = 3\n\n[storage]\ndir = \"/srv/data\"\n",
        )
        .unwrap();

        let config = load_config_with(&path, |key: &str| {
            (key == "INGESTION_WINDOW_HOURS").then(|| "36".to_string())
        })
        .unwrap();

        assert_eq!(config.ingestion.window_hours, 36);
        assert_eq!(config.ingestion.meta_fetch_budget, 3);
        assert_eq!(config.storage.dir, PathBuf::from("/srv/data"));
    }

    #[test]
    fn test_invalid_override_values_fail_validation() {
        let temp = TempDir::new().unwrap();
        let result = load_config_with(&temp.path().join("absent.toml"), |key: &str| {
            (key == "SCHEDULE_HOUR_UTC").then(|| "25".to_string())
        });
        assert!(result.is_err());
    }
}
