//! End-to-end exchanges through `Conversation` with a scripted model.

use anyhow::Result;
use async_trait::async_trait;
use std::sync::{Arc, Mutex};

use jarvis::agent::{Planner, PlannerConfig};
use jarvis::audio::Transcriber;
use jarvis::chat::Conversation;
use jarvis::config::JarvisConfig;
use jarvis::llm::{Completion, CompletionClient, LlmError};
use jarvis::tools::{build_registry, Settings, SettingsHandle};
use jarvis::types::{ChatMessage, Role, TokenUsage};

struct ScriptedLlm {
    responses: Mutex<Vec<Result<String, u16>>>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedLlm {
    fn new(responses: Vec<Result<&str, u16>>) -> Arc<Self> {
        Arc::new(Self {
            responses: Mutex::new(responses.into_iter().map(|r| r.map(String::from)).collect()),
            prompts: Mutex::new(Vec::new()),
        })
    }

    fn prompt(&self, idx: usize) -> String {
        self.prompts.lock().unwrap()[idx].clone()
    }
}

#[async_trait]
impl CompletionClient for ScriptedLlm {
    async fn complete(
        &self,
        prompt: &str,
        _model: &str,
        _max_tokens: u32,
        _stop: &[&str],
    ) -> Result<Completion, LlmError> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        let mut responses = self.responses.lock().unwrap();
        let next = if responses.is_empty() {
            Ok(r#"{"toolsToCall":[{"name":"ReadyToAnswer"}]}"#.to_string())
        } else {
            responses.remove(0)
        };
        match next {
            Ok(text) => Ok(Completion {
                text,
                usage: TokenUsage::default(),
                cost_usd: 0.01,
            }),
            Err(status) => Err(LlmError::Status {
                status,
                body: "boom".into(),
            }),
        }
    }
}

struct FixedTranscriber(&'static str);

#[async_trait]
impl Transcriber for FixedTranscriber {
    async fn transcribe(&self, _audio: Vec<u8>, _file_name: &str) -> Result<String> {
        Ok(self.0.to_string())
    }
}

fn conversation(llm: Arc<ScriptedLlm>, memory: usize) -> (Conversation, SettingsHandle) {
    let config = JarvisConfig::default();
    let settings = Settings::in_memory().into_handle();
    let registry = build_registry(&config, settings.clone());
    let planner = Planner::new(llm, registry, PlannerConfig::from(&config));
    (
        Conversation::new(planner, settings.clone(), memory),
        settings,
    )
}

#[tokio::test]
async fn text_exchange_records_both_turns() {
    let llm = ScriptedLlm::new(vec![
        Ok(r#"<response>{"toolsToCall": [{"name": "GetDateTime"}]}</response>"#),
        Ok(" It is late, sir. "),
    ]);
    let (mut chat, _) = conversation(llm.clone(), 16);

    let reply = chat.handle_text("what time is it?").await.unwrap();
    assert_eq!(reply.as_deref(), Some("It is late, sir."));
    assert_eq!(
        chat.history().messages(),
        &[
            ChatMessage::user("what time is it?"),
            ChatMessage::assistant("It is late, sir.")
        ]
    );
    assert!(llm.prompt(1).contains(r#"{"role":"GetDateTime","content":"Current Date: "#));
    assert!((chat.total_cost() - 0.02).abs() < 1e-9);
}

#[tokio::test]
async fn config_tool_changes_the_voice_gate() {
    let llm = ScriptedLlm::new(vec![
        Ok(r#"{"toolsToCall": [{"name": "ConfigManager", "input": {"command": "set", "key": "inVoiceEnable", "value": "true"}}]}"#),
        Ok("Voice messages are on now."),
        Ok(r#"{"toolsToCall": [{"name": "ReadyToAnswer"}]}"#),
        Ok("You said hello."),
    ]);
    let (mut chat, settings) = conversation(llm, 16);
    chat = chat.with_transcriber(Arc::new(FixedTranscriber("hello there")));

    let replies = chat.handle_voice(vec![1, 2, 3], "voice.ogg").await.unwrap();
    assert_eq!(replies.len(), 1);
    assert!(replies[0].contains("inVoiceEnable"));
    assert!(chat.history().is_empty());

    chat.handle_text("please understand voice messages").await.unwrap();
    assert!(settings.lock().await.is_enabled("inVoiceEnable"));

    settings
        .lock()
        .await
        .set("inVoiceTranscriptionEnable", "true")
        .unwrap();
    let replies = chat.handle_voice(vec![1, 2, 3], "voice.ogg").await.unwrap();
    assert_eq!(
        replies,
        vec!["Audio Transcription: hello there", "You said hello."]
    );
}

#[tokio::test]
async fn stopped_conversations_ignore_messages() {
    let llm = ScriptedLlm::new(vec![]);
    let (mut chat, _) = conversation(llm.clone(), 16);

    assert_eq!(chat.start(), "JARVIS is already Online!");
    assert_eq!(chat.stop(), "JARVIS Offline.");
    assert_eq!(chat.handle_text("hello?").await.unwrap(), None);
    assert!(chat.handle_voice(vec![0], "v.ogg").await.unwrap().is_empty());
    assert!(llm.prompts.lock().unwrap().is_empty());

    assert_eq!(chat.start(), "JARVIS Online!");
    assert!(chat.handle_text("hello?").await.unwrap().is_some());
}

#[tokio::test]
async fn reset_clears_history_and_restarts() {
    let (mut chat, _) = conversation(ScriptedLlm::new(vec![]), 16);
    chat.handle_text("remember me").await.unwrap();
    assert_eq!(chat.history().len(), 2);

    chat.stop();
    let lines = chat.reset();
    assert_eq!(
        lines,
        vec!["JARVIS Offline.", "Chat history removed...", "JARVIS Online!"]
    );
    assert!(chat.history().is_empty());
    assert!(chat.is_running());
}

#[tokio::test]
async fn only_recent_messages_reach_the_model() {
    let llm = ScriptedLlm::new(vec![]);
    let (mut short, _) = conversation(llm.clone(), 2);
    short.handle_text("first question").await.unwrap();
    short.handle_text("second question").await.unwrap();

    let selection = llm.prompt(2);
    let section = &selection[selection.rfind("<chat&tools>").unwrap()..];
    assert!(!section.contains("first question"));
    assert!(section.contains("second question"));
}

#[tokio::test]
async fn answer_failure_keeps_the_user_message() {
    let llm = ScriptedLlm::new(vec![Ok(r#"{"toolsToCall": []}"#), Err(502)]);
    let (mut chat, _) = conversation(llm, 16);

    let err = chat.handle_text("hi").await.unwrap_err();
    assert!(format!("{:#}", err).contains("502"));
    assert_eq!(chat.history().messages(), &[ChatMessage::user("hi")]);
    assert_eq!(chat.history().messages()[0].role, Role::User);
}

#[test]
fn help_lists_commands_and_tools() {
    let (chat, _) = conversation(ScriptedLlm::new(vec![]), 16);
    let help = chat.help_text();
    assert!(help.contains("/reset"));
    assert!(help.contains("Tool Name: ConfigManager"));
    assert!(help.contains("Tool Name: AppManager"));
}
