pub mod schema;

pub use schema::{JarvisConfig, MusicConfig, RunnableApp, SpeechConfig, WikipediaConfig};

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

/// Default jarvis home directory (~/.jarvis).
pub fn default_home_dir() -> PathBuf {
    directories::BaseDirs::new()
        .map(|d| d.home_dir().join(".jarvis"))
        .unwrap_or_else(|| PathBuf::from(".jarvis"))
}

/// Load config from the given path, or return defaults.
pub fn load_config(path: &Path) -> Result<JarvisConfig> {
    if path.exists() {
        let contents =
            std::fs::read_to_string(path).context("Failed to read jarvis config file")?;
        let config: JarvisConfig =
            toml::from_str(&contents).context("Failed to parse jarvis config (TOML)")?;
        Ok(config)
    } else {
        Ok(JarvisConfig::default())
    }
}

/// Save config to the given path (TOML format).
pub fn save_config(config: &JarvisConfig, path: &Path) -> Result<()> {
    let contents = toml::to_string_pretty(config).context("Failed to serialize config")?;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, contents).context("Failed to write config file")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = load_config(&dir.path().join("jarvis.toml")).unwrap();
        assert_eq!(cfg.name, "JARVIS");
    }

    #[test]
    fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("jarvis.toml");

        let mut cfg = JarvisConfig::default();
        cfg.recent_chat_memory = 4;
        cfg.apps.push(RunnableApp {
            name: "chrome".into(),
            description: "web browser.".into(),
            exe: "/usr/bin/google-chrome".into(),
        });
        save_config(&cfg, &path).unwrap();

        let loaded = load_config(&path).unwrap();
        assert_eq!(loaded.recent_chat_memory, 4);
        assert_eq!(loaded.apps, cfg.apps);
    }
}
