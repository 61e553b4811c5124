//! Write MarqueeConfig to TOML on disk.
//!
//! Writes go to a `.tmp` sibling first and are renamed into place so a crash
//! mid-write never leaves a truncated config.

use std::path::Path;

use marquee_common::ConfigError;
use tracing::{debug, warn};

use crate::schema::MarqueeConfig;
use crate::toml_loader::default_config_path;

/// Write config to the platform default path (`~/.config/marquee/config.toml`).
pub fn save_config(config: &MarqueeConfig) -> Result<(), ConfigError> {
    let path = default_config_path()?;
    save_config_to_path(config, &path)
}

/// Write config to a specific path, creating parent directories.
pub fn save_config_to_path(config: &MarqueeConfig, path: &Path) -> Result<(), ConfigError> {
    let toml_str = toml::to_string_pretty(config)
        .map_err(|e| ConfigError::ParseError(format!("failed to serialize config to TOML: {e}")))?;
    write_atomic(path, &toml_str)?;
    debug!(path = %path.display(), "Config saved");
    Ok(())
}

/// Replace `path` with `contents` through a `.tmp` sibling.
pub(crate) fn write_atomic(path: &Path, contents: &str) -> Result<(), ConfigError> {
    let io_err = |what: &str, at: &Path, e: std::io::Error| {
        ConfigError::ParseError(format!("failed to {what} {}: {e}", at.display()))
    };

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| io_err("create config directory", parent, e))?;
    }

    let tmp_path = path.with_extension("toml.tmp");
    std::fs::write(&tmp_path, contents).map_err(|e| io_err("write", &tmp_path, e))?;

    if let Err(e) = std::fs::rename(&tmp_path, path) {
        // Rename can fail across filesystems on Windows
        warn!(error = %e, "Atomic rename failed, writing config directly");
        let _ = std::fs::remove_file(&tmp_path);
        std::fs::write(path, contents).map_err(|e| io_err("write", path, e))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use tempfile::TempDir;

    #[test]
    fn save_config_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");

        let mut config = MarqueeConfig::default();
        config.gui.max_open_attempts = 7;
        config.storage.path = Some(PathBuf::from("/tmp/state.json"));
        config.widgets.disabled = vec!["stateful-marquee-widget".into()];
        save_config_to_path(&config, &path).unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        let parsed: MarqueeConfig = toml::from_str(&contents).unwrap();
        assert_eq!(parsed.gui.max_open_attempts, 7);
        assert_eq!(parsed.storage.path, Some(PathBuf::from("/tmp/state.json")));
        assert_eq!(parsed.widgets.disabled, config.widgets.disabled);
    }

    #[test]
    fn save_config_creates_parent_dirs() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("deep").join("config.toml");

        save_config_to_path(&MarqueeConfig::default(), &path).unwrap();
        assert!(path.exists());
    }

    #[test]
    fn save_config_cleans_up_tmp_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");

        save_config_to_path(&MarqueeConfig::default(), &path).unwrap();
        assert!(!path.with_extension("toml.tmp").exists());
    }
}
