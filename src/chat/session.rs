//! One conversation with the assistant: message ingress and lifecycle.

use super::history::ChatHistory;
use crate::agent::Planner;
use crate::audio::Transcriber;
use crate::tools::settings::{IN_VOICE_ENABLE, IN_VOICE_TRANSCRIPTION_ENABLE};
use crate::tools::SettingsHandle;
use crate::types::ChatMessage;
use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::info;

/// A conversation owns its history and runs one exchange per inbound message.
///
/// Exchanges on the same conversation are serialized by `&mut self`.
pub struct Conversation {
    history: ChatHistory,
    planner: Planner,
    settings: SettingsHandle,
    transcriber: Option<Arc<dyn Transcriber>>,
    recent_chat_memory: usize,
    running: bool,
    total_cost: f64,
}

impl Conversation {
    pub fn new(planner: Planner, settings: SettingsHandle, recent_chat_memory: usize) -> Self {
        Self {
            history: ChatHistory::new(),
            planner,
            settings,
            transcriber: None,
            recent_chat_memory,
            running: true,
            total_cost: 0.0,
        }
    }

    pub fn with_transcriber(mut self, transcriber: Arc<dyn Transcriber>) -> Self {
        self.transcriber = Some(transcriber);
        self
    }

    pub fn name(&self) -> &str {
        &self.planner.config().name
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn history(&self) -> &ChatHistory {
        &self.history
    }

    /// USD spent on every exchange so far.
    pub fn total_cost(&self) -> f64 {
        self.total_cost
    }

    /// Answer a text message. `None` while the conversation is stopped.
    pub async fn handle_text(&mut self, text: &str) -> Result<Option<String>> {
        if !self.running {
            return Ok(None);
        }

        self.history.append(ChatMessage::user(text));
        let exchange = self
            .planner
            .run(self.history.latest(self.recent_chat_memory))
            .await
            .context("Failed to generate an answer")?;

        info!(
            "Exchange {} cost {:.6} USD ({:.4} cent)",
            exchange.id,
            exchange.cost,
            exchange.cost * 100.0
        );
        self.total_cost += exchange.cost;
        self.history.append(ChatMessage::assistant(exchange.reply.clone()));
        Ok(Some(exchange.reply))
    }

    /// Answer a voice message. Returns every line to show the user, in order.
    pub async fn handle_voice(&mut self, audio: Vec<u8>, file_name: &str) -> Result<Vec<String>> {
        if !self.running {
            return Ok(Vec::new());
        }

        let (voice_enabled, echo_transcription) = {
            let settings = self.settings.lock().await;
            (
                settings.is_enabled(IN_VOICE_ENABLE),
                settings.is_enabled(IN_VOICE_TRANSCRIPTION_ENABLE),
            )
        };

        if !voice_enabled {
            return Ok(vec![format!(
                "Audio transcription is turned off, so I can't understand voice messages at this time.\n\
                 If you want to enable this feature, set \"{}\" to \"true\" in the config or ask me to do so via text.",
                IN_VOICE_ENABLE
            )]);
        }

        let Some(transcriber) = self.transcriber.clone() else {
            return Ok(vec![
                "Voice messages can't be understood because no speech service is configured.".into(),
            ]);
        };

        let text = transcriber
            .transcribe(audio, file_name)
            .await
            .context("Failed to transcribe voice message")?;

        let mut replies = Vec::new();
        if echo_transcription {
            replies.push(format!("Audio Transcription: {}", text));
        }
        if let Some(reply) = self.handle_text(&text).await? {
            replies.push(reply);
        }
        Ok(replies)
    }

    pub fn start(&mut self) -> String {
        if self.running {
            format!("{} is already Online!", self.name())
        } else {
            self.running = true;
            info!("{} online", self.name());
            format!("{} Online!", self.name())
        }
    }

    pub fn stop(&mut self) -> String {
        self.running = false;
        info!("{} offline", self.name());
        format!("{} Offline.", self.name())
    }

    /// Stop, forget the chat history and start again.
    pub fn reset(&mut self) -> Vec<String> {
        let mut lines = vec![self.stop()];
        self.history.clear();
        lines.push("Chat history removed...".into());
        lines.push(self.start());
        lines
    }

    pub fn help_text(&self) -> String {
        let name = self.name();
        format!(
            "{name} Help Screen\n\
             Welcome to the chat interface of {name}!\n\
             {name} is a conversational AI assistant that can use the tools listed below.\n\n\
             List of available commands:\n\
             /help, this.\n\
             /start, start the agent.\n\
             /reset, restarts the agent, deleting chat history.\n\
             /stop, stops the agent, it will no longer answer until start or reset is used.\n\
             /voice <path>, send an audio file as a voice message.\n\
             /quit, leave the chat.\n\n\
             List of tools {name} can use:\n{tools}",
            name = name,
            tools = self.planner.registry().describe_all()
        )
    }
}
