//! Persisted assistant settings and the ConfigManager tool that edits them.
//!
//! Settings are a flat key → string map stored as JSON. Only a fixed set of
//! keys exists; everything else is rejected on both get and set.

use super::traits::{Tool, ToolError, ToolInput, ToolOutput};
use super::user_line;
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, warn};

pub const IN_VOICE_ENABLE: &str = "inVoiceEnable";
pub const IN_VOICE_TRANSCRIPTION_ENABLE: &str = "inVoiceTranscriptionEnable";

/// Known keys with the description shown to the model.
const KNOWN_KEYS: &[(&str, &str)] = &[
    (
        IN_VOICE_ENABLE,
        "(boolean) - Select if the agent should try to understand and respond to voice messages.",
    ),
    (
        IN_VOICE_TRANSCRIPTION_ENABLE,
        "(boolean) - Select if the agent should echo back its understanding of voice messages, when receiving one.",
    ),
];

/// Shared handle to the settings store.
pub type SettingsHandle = Arc<Mutex<Settings>>;

/// The settings store.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    values: BTreeMap<String, String>,
    path: Option<PathBuf>,
}

impl Settings {
    /// Defaults, never written to disk.
    pub fn in_memory() -> Self {
        Self {
            values: Self::defaults(),
            path: None,
        }
    }

    /// Load from `path`, falling back to defaults for a missing file or keys.
    pub fn load(path: &Path) -> Result<Self> {
        let mut values = Self::defaults();

        if path.exists() {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read settings at {}", path.display()))?;
            let stored: BTreeMap<String, serde_json::Value> = serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse settings at {}", path.display()))?;

            for (key, value) in stored {
                if !Self::is_known(&key) {
                    warn!("Ignoring unknown settings key '{}'", key);
                    continue;
                }
                let value = match value {
                    serde_json::Value::String(s) => s,
                    other => other.to_string(),
                };
                values.insert(key, value);
            }
        }

        Ok(Self {
            values,
            path: Some(path.to_path_buf()),
        })
    }

    /// Write the settings file (no-op for in-memory settings).
    pub fn save(&self) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(&self.values)?;
        std::fs::write(path, contents)
            .with_context(|| format!("Failed to write settings to {}", path.display()))?;
        Ok(())
    }

    pub fn into_handle(self) -> SettingsHandle {
        Arc::new(Mutex::new(self))
    }

    pub fn is_known(key: &str) -> bool {
        KNOWN_KEYS.iter().any(|(k, _)| *k == key)
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    /// True when a boolean-valued key is set to "true".
    pub fn is_enabled(&self, key: &str) -> bool {
        self.get(key)
            .map(|v| v.eq_ignore_ascii_case("true"))
            .unwrap_or(false)
    }

    /// Set a known key and persist. Unknown keys are an error.
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        if !Self::is_known(key) {
            anyhow::bail!("'{}' is not a known settings key", key);
        }
        self.values.insert(key.to_string(), value.to_string());
        self.save()?;
        info!("Setting '{}' changed to '{}'", key, value);
        Ok(())
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(&self.values).unwrap_or_else(|_| "{}".into())
    }

    fn defaults() -> BTreeMap<String, String> {
        KNOWN_KEYS
            .iter()
            .map(|(k, _)| (k.to_string(), "false".to_string()))
            .collect()
    }
}

/// Accept the spellings models use for booleans.
fn normalize_bool(value: &str) -> Option<&'static str> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "on" | "yes" | "1" => Some("true"),
        "false" | "off" | "no" | "0" => Some("false"),
        _ => None,
    }
}

/// Tool that reads and writes the settings store.
pub struct ConfigManager {
    settings: SettingsHandle,
}

impl ConfigManager {
    pub fn new(settings: SettingsHandle) -> Self {
        Self { settings }
    }

    fn not_found(key: &str) -> ToolOutput {
        ToolOutput::free(format!("'{}' is not found in the configuration.", key))
    }
}

#[async_trait]
impl Tool for ConfigManager {
    fn name(&self) -> &str {
        "ConfigManager"
    }

    fn when_to_use(&self) -> String {
        let mut text = String::from(
            "This tool can be used to configure various parameters in the agent's internal configuration, \
             which decide how it responds to user inputs.\n\
             You can set and get configuration options using commands.\n\
             Available Commands:\n\
             - getAll: Gets the entire config. No key or value required.\n\
             - get: Gets the value for a specific key. Requires to provide the name of the 'key'.\n\
             - set: Sets the value of a specific key. Requires both 'key' and a 'value'.\n\
             Available Config Keys:\n",
        );
        for (key, desc) in KNOWN_KEYS {
            text.push_str(&format!("- {}: {}\n", key, desc));
        }
        text.push_str(
            "You can only get and set values of keys that are in the \"Available Config Keys\" list. \
             For other keys/settings, this is the wrong tool.",
        );
        text
    }

    fn examples(&self) -> String {
        let cases = [
            ("show the entire chat config", r#"{"command": "getAll"}"#),
            (
                "pls show what you understood, when receiving a voice message.",
                r#"{"command": "set", "key": "inVoiceTranscriptionEnable", "value": "true"}"#,
            ),
            (
                "do you understand voice messages atm?",
                r#"{"command": "get", "key": "inVoiceEnable"}"#,
            ),
        ];
        cases
            .iter()
            .map(|(msg, input)| {
                format!(
                    "<chat&tools>\n{}\n<response>\n{{\n    \"toolsToCall\": [\n        {{\"name\": \"ConfigManager\", \"input\": {}}}\n    ]\n}}\n</response>\n",
                    user_line(msg),
                    input
                )
            })
            .collect()
    }

    fn answer_examples(&self) -> String {
        format!(
            "<chat&tools>\n{}\n{}\n<response>\nConfig:\n- inVoiceEnable:                true\n- inVoiceTranscriptionEnable:   true\n</response>",
            user_line("show the config"),
            serde_json::json!({
                "role": "ConfigManager",
                "content": "{\"inVoiceEnable\":\"true\",\"inVoiceTranscriptionEnable\":\"true\"}"
            })
        )
    }

    async fn execute(&self, input: &ToolInput) -> Result<ToolOutput, ToolError> {
        let command = input.require("command")?;

        match command.as_str() {
            "getAll" => {
                let settings = self.settings.lock().await;
                Ok(ToolOutput::free(settings.to_json()))
            }
            "get" => {
                let key = input.require("key")?;
                let settings = self.settings.lock().await;
                match settings.get(&key) {
                    Some(value) => Ok(ToolOutput::free(format!(
                        "'{}' is set to '{}'",
                        key, value
                    ))),
                    None => Ok(Self::not_found(&key)),
                }
            }
            "set" => {
                let key = input.require("key")?;
                if !Settings::is_known(&key) {
                    return Ok(Self::not_found(&key));
                }
                let raw = input.require("value")?;
                let value = normalize_bool(&raw).ok_or_else(|| {
                    ToolError::InvalidToolInput(format!(
                        "'{}' expects true or false, got '{}'",
                        key, raw
                    ))
                })?;
                let mut settings = self.settings.lock().await;
                settings.set(&key, value)?;
                Ok(ToolOutput::free(format!(
                    "Set '{}' to '{}' successfully.",
                    key, value
                )))
            }
            other => Err(ToolError::InvalidToolInput(format!(
                "'{}' is not a valid command for ConfigManager",
                other
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn tool() -> (ConfigManager, SettingsHandle) {
        let handle = Settings::in_memory().into_handle();
        (ConfigManager::new(handle.clone()), handle)
    }

    #[tokio::test]
    async fn set_then_get_reads_back() {
        let (tool, handle) = tool();

        let out = tool
            .execute(&ToolInput::from(
                json!({"command": "set", "key": "inVoiceEnable", "value": "true"}),
            ))
            .await
            .unwrap();
        assert_eq!(out.text, "Set 'inVoiceEnable' to 'true' successfully.");

        let out = tool
            .execute(&ToolInput::from(json!({"command": "get", "key": "inVoiceEnable"})))
            .await
            .unwrap();
        assert_eq!(out.text, "'inVoiceEnable' is set to 'true'");
        assert!(handle.lock().await.is_enabled(IN_VOICE_ENABLE));
    }

    #[tokio::test]
    async fn unknown_keys_are_not_found_results() {
        let (tool, _) = tool();

        let out = tool
            .execute(&ToolInput::from(json!({"command": "get", "key": "unknownKey"})))
            .await
            .unwrap();
        assert!(out.text.contains("not found"));

        let out = tool
            .execute(&ToolInput::from(
                json!({"command": "set", "key": "unknownKey", "value": "true"}),
            ))
            .await
            .unwrap();
        assert!(out.text.contains("not found"));
    }

    #[tokio::test]
    async fn malformed_calls_are_invalid_input() {
        let (tool, _) = tool();

        for input in [
            ToolInput::None,
            ToolInput::from(json!({"key": "inVoiceEnable"})),
            ToolInput::from(json!({"command": "get"})),
            ToolInput::from(json!({"command": "set", "key": "inVoiceEnable"})),
            ToolInput::from(json!({"command": "set", "key": "inVoiceEnable", "value": "maybe"})),
            ToolInput::from(json!({"command": "delete", "key": "inVoiceEnable"})),
        ] {
            let err = tool.execute(&input).await.unwrap_err();
            assert!(
                matches!(err, ToolError::InvalidToolInput(_)),
                "{:?} gave {:?}",
                input,
                err
            );
        }
    }

    #[tokio::test]
    async fn json_booleans_are_accepted() {
        let (tool, _) = tool();
        let out = tool
            .execute(&ToolInput::from(
                json!({"command": "set", "key": "inVoiceTranscriptionEnable", "value": true}),
            ))
            .await
            .unwrap();
        assert!(out.text.contains("'true'"));

        let all = tool
            .execute(&ToolInput::from(json!({"command": "getAll"})))
            .await
            .unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&all.text).unwrap();
        assert_eq!(parsed["inVoiceTranscriptionEnable"], "true");
        assert_eq!(parsed["inVoiceEnable"], "false");
    }

    #[test]
    fn settings_persist_across_loads() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");

        let mut settings = Settings::load(&path).unwrap();
        assert!(!settings.is_enabled(IN_VOICE_ENABLE));
        settings.set(IN_VOICE_ENABLE, "true").unwrap();

        let reloaded = Settings::load(&path).unwrap();
        assert!(reloaded.is_enabled(IN_VOICE_ENABLE));
        assert_eq!(reloaded.get(IN_VOICE_TRANSCRIPTION_ENABLE), Some("false"));
    }

    #[test]
    fn unknown_keys_on_disk_are_dropped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{"inVoiceEnable": true, "legacyKey": "x"}"#).unwrap();

        let settings = Settings::load(&path).unwrap();
        assert!(settings.is_enabled(IN_VOICE_ENABLE));
        assert_eq!(settings.get("legacyKey"), None);
    }
}
