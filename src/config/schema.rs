//! Configuration schema for jarvis.toml.

use serde::{Deserialize, Serialize};

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct JarvisConfig {
    /// Name the assistant introduces itself with.
    pub name: String,

    /// The assistant's role, embedded in both prompts.
    pub role: String,

    /// Base URL of the OpenAI-compatible completion API.
    pub llm_api_url: String,

    /// API key for the completion API.
    pub llm_api_key: String,

    /// Model used for tool selection.
    pub selection_model: String,

    /// Model used for the final answer.
    pub answer_model: String,

    /// Output token budget of a tool-selection call.
    pub selection_max_tokens: u32,

    /// Output token budget of the final answer call.
    pub answer_max_tokens: u32,

    /// Sampling temperature for every completion.
    pub temperature: f64,

    /// Maximum planning steps per exchange.
    pub max_thought_steps: usize,

    /// How many recent chat messages an exchange sees.
    pub recent_chat_memory: usize,

    /// Path to the settings JSON managed by the ConfigManager tool.
    pub settings_path: String,

    /// Log level (debug, info, warn, error).
    pub log_level: String,

    pub speech: SpeechConfig,

    pub music: MusicConfig,

    pub wikipedia: WikipediaConfig,

    /// Applications the AppManager tool may start.
    pub apps: Vec<RunnableApp>,
}

/// Speech-to-text endpoint for voice messages.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SpeechConfig {
    pub api_url: String,
    pub api_key: String,
    pub model: String,
}

/// Music service (Spotify Web API) access.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MusicConfig {
    pub api_url: String,
    /// OAuth access token with the user-modify-playback-state scope.
    pub access_token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WikipediaConfig {
    pub enabled: bool,
    pub api_url: String,
    pub user_agent: String,
}

/// An application the assistant is allowed to launch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunnableApp {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub exe: String,
}

impl Default for JarvisConfig {
    fn default() -> Self {
        Self {
            name: "JARVIS".into(),
            role: "assistant".into(),
            llm_api_url: "https://api.together.xyz".into(),
            llm_api_key: String::new(),
            selection_model: "mistralai/Mistral-7B-Instruct-v0.2".into(),
            answer_model: "mistralai/Mistral-7B-Instruct-v0.2".into(),
            selection_max_tokens: 1024,
            answer_max_tokens: 512,
            temperature: 0.7,
            max_thought_steps: 1,
            recent_chat_memory: 16,
            settings_path: "~/.jarvis/settings.json".into(),
            log_level: "info".into(),
            speech: SpeechConfig::default(),
            music: MusicConfig::default(),
            wikipedia: WikipediaConfig::default(),
            apps: Vec::new(),
        }
    }
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            api_url: "https://api.openai.com".into(),
            api_key: String::new(),
            model: "whisper-1".into(),
        }
    }
}

impl Default for MusicConfig {
    fn default() -> Self {
        Self {
            api_url: "https://api.spotify.com".into(),
            access_token: String::new(),
        }
    }
}

impl Default for WikipediaConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            api_url: "https://en.wikipedia.org/api/rest_v1".into(),
            user_agent: "jarvis/0.1".into(),
        }
    }
}

impl JarvisConfig {
    /// Resolve a path that may contain `~` to an absolute path.
    pub fn resolve_path(&self, path: &str) -> String {
        shellexpand::tilde(path).into_owned()
    }

    /// Resolved settings file path.
    pub fn resolved_settings_path(&self) -> String {
        self.resolve_path(&self.settings_path)
    }
}
