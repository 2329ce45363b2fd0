//! Initialize the configuration directory: create ~/.tgflow and a template config.json.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

use crate::config::Config;

/// Create the config directory and a template config file if it does not exist.
/// The template lists every field so credentials can be filled in by hand; an existing file is left untouched.
pub fn init_config_dir(config_path: &Path) -> Result<PathBuf> {
    let config_dir = config_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(config_dir)
        .with_context(|| format!("creating config directory {}", config_dir.display()))?;

    if !config_path.exists() {
        let template = serde_json::to_string_pretty(&Config::default())
            .context("serializing default config")?;
        std::fs::write(config_path, template)
            .with_context(|| format!("writing default config to {}", config_path.display()))?;
        log::info!("created default config at {}", config_path.display());
    } else {
        log::debug!(
            "config file already exists at {}, skipping",
            config_path.display()
        );
    }

    Ok(config_dir.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_dir() -> PathBuf {
        std::env::temp_dir().join(format!("tgflow-init-{}", uuid::Uuid::new_v4()))
    }

    #[test]
    fn writes_template_with_all_sections() {
        let dir = temp_dir();
        let path = dir.join("config.json");
        let out = init_config_dir(&path).unwrap();
        assert_eq!(out, dir);

        let written: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(written["server"]["port"], 3000);
        assert!(written["telegram"].get("botToken").is_some());
        assert!(written["dialogflow"].get("privateKey").is_some());
        assert_eq!(written["dialogflow"]["languageCode"], "en");
        let _ = std::fs::remove_dir_all(dir);
    }

    #[test]
    fn keeps_existing_config() {
        let dir = temp_dir();
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.json");
        std::fs::write(&path, br#"{"server":{"port":9000}}"#).unwrap();
        init_config_dir(&path).unwrap();
        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            r#"{"server":{"port":9000}}"#
        );
        let _ = std::fs::remove_dir_all(dir);
    }
}
