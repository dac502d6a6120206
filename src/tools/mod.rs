pub mod apps;
pub mod datetime;
pub mod music;
pub mod ready;
pub mod settings;
pub mod traits;
pub mod wikipedia;

pub use apps::{AppManager, ProcessControl, SystemProcesses};
pub use datetime::GetDateTime;
pub use music::{MusicControl, MusicService, SpotifyClient};
pub use ready::{ReadyToAnswer, READY_TOOL};
pub use settings::{ConfigManager, Settings, SettingsHandle};
pub use traits::{Tool, ToolError, ToolInput, ToolOutput};
pub use wikipedia::WikipediaSummary;

use crate::config::JarvisConfig;
use std::sync::Arc;
use tracing::{debug, info};

/// Named tools available to the planner.
///
/// Registration order is kept so prompt text is stable across runs.
#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: Vec<Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a tool, replacing any tool registered under the same name.
    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        match self.tools.iter().position(|t| t.name() == tool.name()) {
            Some(idx) => self.tools[idx] = tool,
            None => self.tools.push(tool),
        }
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn Tool>> {
        self.tools.iter().find(|t| t.name() == name)
    }

    pub fn names(&self) -> Vec<&str> {
        self.tools.iter().map(|t| t.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Every tool's usage text, in registration order.
    pub fn describe_all(&self) -> String {
        let mut desc = String::new();
        for tool in &self.tools {
            desc.push_str(&format!(
                "\nTool Name: {}\nWhen to use:\n{}\n",
                tool.name(),
                tool.when_to_use().trim()
            ));
        }
        desc
    }

    /// Every tool's selection examples, in registration order.
    pub fn examples(&self) -> String {
        self.tools
            .iter()
            .map(|t| t.examples())
            .filter(|e| !e.trim().is_empty())
            .map(|e| format!("\n{}\n", e.trim()))
            .collect()
    }

    /// Every tool's answer examples, in registration order.
    pub fn answer_examples(&self) -> String {
        self.tools
            .iter()
            .map(|t| t.answer_examples())
            .filter(|e| !e.trim().is_empty())
            .map(|e| format!("\n{}\n", e.trim()))
            .collect()
    }

    /// Execute a tool call by name.
    pub async fn dispatch(&self, name: &str, input: &ToolInput) -> Result<ToolOutput, ToolError> {
        let tool = self
            .get(name)
            .ok_or_else(|| ToolError::UnknownTool(name.to_string()))?;
        debug!("Dispatching {} with {:?}", name, input);
        tool.execute(input).await
    }
}

/// The assistant's tool set for `config`.
///
/// The music and Wikipedia tools are only registered when configured.
pub fn build_registry(config: &JarvisConfig, settings: SettingsHandle) -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry.register(Arc::new(ReadyToAnswer));
    registry.register(Arc::new(ConfigManager::new(settings)));
    registry.register(Arc::new(GetDateTime::new()));

    if config.music.access_token.is_empty() {
        info!("No music access token configured, SpotifyControl disabled");
    } else {
        let service = SpotifyClient::new(&config.music.api_url, &config.music.access_token);
        registry.register(Arc::new(MusicControl::new(Arc::new(service))));
    }

    registry.register(Arc::new(AppManager::new(
        config.apps.clone(),
        Arc::new(SystemProcesses),
    )));

    if config.wikipedia.enabled {
        registry.register(Arc::new(WikipediaSummary::new(&config.wikipedia)));
    }

    debug!("Registered tools: {:?}", registry.names());
    registry
}

/// Render a one-user-message few-shot line the way the chat section is rendered.
pub(crate) fn user_line(content: &str) -> String {
    serde_json::json!({"role": "user", "content": content}).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct Echo {
        name: &'static str,
        usage: &'static str,
    }

    #[async_trait]
    impl Tool for Echo {
        fn name(&self) -> &str {
            self.name
        }

        fn when_to_use(&self) -> String {
            self.usage.to_string()
        }

        async fn execute(&self, input: &ToolInput) -> Result<ToolOutput, ToolError> {
            match input {
                ToolInput::Text(t) => Ok(ToolOutput {
                    text: t.clone(),
                    cost: 0.5,
                }),
                _ => Err(ToolError::Execution("echo needs text".into())),
            }
        }
    }

    #[tokio::test]
    async fn dispatch_runs_the_named_tool() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(Echo {
            name: "Echo",
            usage: "echoes",
        }));

        let out = registry
            .dispatch("Echo", &ToolInput::Text("ping".into()))
            .await
            .unwrap();
        assert_eq!(out.text, "ping");
        assert_eq!(out.cost, 0.5);

        let err = registry.dispatch("Echo", &ToolInput::None).await.unwrap_err();
        assert_eq!(err, ToolError::Execution("echo needs text".into()));
    }

    #[tokio::test]
    async fn unknown_names_fail() {
        let registry = ToolRegistry::new();
        let err = registry.dispatch("Nope", &ToolInput::None).await.unwrap_err();
        assert_eq!(err, ToolError::UnknownTool("Nope".into()));
    }

    #[test]
    fn optional_tools_follow_the_config() {
        let settings = Settings::in_memory().into_handle();
        let mut config = JarvisConfig::default();
        let registry = build_registry(&config, settings.clone());
        assert_eq!(
            registry.names(),
            vec!["ReadyToAnswer", "ConfigManager", "GetDateTime", "AppManager"]
        );

        config.music.access_token = "token".into();
        config.wikipedia.enabled = true;
        let registry = build_registry(&config, settings);
        assert!(registry.get("SpotifyControl").is_some());
        assert!(registry.get("WikipediaSummary").is_some());
        assert_eq!(registry.len(), 6);
    }

    #[test]
    fn register_overwrites_by_name_in_place() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(Echo { name: "A", usage: "first" }));
        registry.register(Arc::new(Echo { name: "B", usage: "b" }));
        registry.register(Arc::new(Echo { name: "A", usage: "second" }));

        assert_eq!(registry.names(), vec!["A", "B"]);
        let desc = registry.describe_all();
        assert!(desc.contains("second"));
        assert!(!desc.contains("first"));
        assert!(desc.find("Tool Name: A").unwrap() < desc.find("Tool Name: B").unwrap());
    }
}
