//! The planning loop.
//!
//! select tools → dispatch → fold results into scratch messages, repeated
//! until the model picks the sentinel tool or the step budget runs out, then
//! one final call writes the reply.

use super::extract::{extract_tool_calls, ExtractError};
use super::prompt::{PromptBuilder, CHAT_MARKER, RESPONSE_END_MARKER, RESPONSE_MARKER};
use crate::config::JarvisConfig;
use crate::llm::{CompletionClient, LlmError};
use crate::tools::{ToolInput, ToolRegistry, READY_TOOL};
use crate::types::{ChatMessage, ToolSelection};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};
use ulid::Ulid;

/// Tool output longer than this many characters is cut before it reaches a prompt.
pub const TOOL_OUTPUT_MAX_CHARS: usize = 2048;

const SELECTION_STOP: &[&str] = &["</s>", CHAT_MARKER, RESPONSE_MARKER];
const ANSWER_STOP: &[&str] = &["</s>", CHAT_MARKER, RESPONSE_END_MARKER];

/// Everything the planner needs from the assistant config.
#[derive(Debug, Clone)]
pub struct PlannerConfig {
    pub name: String,
    pub role: String,
    pub selection_model: String,
    pub answer_model: String,
    pub selection_max_tokens: u32,
    pub answer_max_tokens: u32,
    pub max_thought_steps: usize,
}

impl From<&JarvisConfig> for PlannerConfig {
    fn from(config: &JarvisConfig) -> Self {
        Self {
            name: config.name.clone(),
            role: config.role.clone(),
            selection_model: config.selection_model.clone(),
            answer_model: config.answer_model.clone(),
            selection_max_tokens: config.selection_max_tokens,
            answer_max_tokens: config.answer_max_tokens,
            max_thought_steps: config.max_thought_steps,
        }
    }
}

/// Outcome of one exchange.
#[derive(Debug, Clone, PartialEq)]
pub struct Exchange {
    pub id: String,
    pub reply: String,
    /// USD across every LLM call and tool invocation.
    pub cost: f64,
    /// Planning steps taken.
    pub steps: usize,
    /// Tool results and errors gathered while planning.
    pub scratch: Vec<ChatMessage>,
}

#[derive(Debug, Error)]
enum SelectError {
    #[error(transparent)]
    Llm(#[from] LlmError),

    #[error(transparent)]
    Extract(#[from] ExtractError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PlanState {
    Planning,
    Ready,
}

/// Cut `text` to at most `max` characters.
fn truncate_chars(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

pub struct Planner {
    llm: Arc<dyn CompletionClient>,
    registry: ToolRegistry,
    prompts: PromptBuilder,
    config: PlannerConfig,
}

impl Planner {
    pub fn new(llm: Arc<dyn CompletionClient>, registry: ToolRegistry, config: PlannerConfig) -> Self {
        Self {
            llm,
            prompts: PromptBuilder::new(config.name.clone(), config.role.clone()),
            registry,
            config,
        }
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    pub fn config(&self) -> &PlannerConfig {
        &self.config
    }

    /// Run one exchange over `history`.
    ///
    /// Selection and tool failures end up as scratch messages for the model to
    /// explain; only a failure of the final answer call is returned as an error.
    pub async fn run(&self, history: &[ChatMessage]) -> Result<Exchange, LlmError> {
        let id = Ulid::new().to_string();
        let mut scratch: Vec<ChatMessage> = Vec::new();
        let mut cost = 0.0;
        let mut steps = 0;
        let mut state = PlanState::Planning;

        while state == PlanState::Planning && steps < self.config.max_thought_steps {
            steps += 1;
            debug!(exchange = %id, step = steps, "Planning step");

            let selection = match self.select_tools(&id, history, &scratch, &mut cost).await {
                Ok(selection) => selection,
                Err(e) => {
                    warn!(exchange = %id, step = steps, "Tool selection failed: {}", e);
                    scratch.push(ChatMessage::error(format!(
                        "Something went wrong trying to select tools. The error that occurred was: {}",
                        e
                    )));
                    break;
                }
            };

            state = self.call_tools(&id, selection, &mut scratch, &mut cost).await;
        }

        if state == PlanState::Planning && steps >= self.config.max_thought_steps {
            debug!(exchange = %id, steps, "Step budget exhausted");
        }

        let prompt = self
            .prompts
            .build_answer_prompt(&self.registry, history, &scratch);
        debug!(exchange = %id, "Answer prompt:\n{}", prompt);

        let completion = self
            .llm
            .complete(
                &prompt,
                &self.config.answer_model,
                self.config.answer_max_tokens,
                ANSWER_STOP,
            )
            .await?;
        cost += completion.cost_usd;
        debug!(exchange = %id, "Answer output: {}", completion.text);

        info!(
            exchange = %id,
            steps,
            tool_messages = scratch.len(),
            cost_usd = cost,
            "Exchange complete"
        );

        Ok(Exchange {
            id,
            reply: completion.text.trim().to_string(),
            cost,
            steps,
            scratch,
        })
    }

    async fn select_tools(
        &self,
        id: &str,
        history: &[ChatMessage],
        scratch: &[ChatMessage],
        cost: &mut f64,
    ) -> Result<ToolSelection, SelectError> {
        let prompt = self
            .prompts
            .build_selection_prompt(&self.registry, history, scratch);
        debug!(exchange = %id, "Selection prompt:\n{}", prompt);

        let completion = self
            .llm
            .complete(
                &prompt,
                &self.config.selection_model,
                self.config.selection_max_tokens,
                SELECTION_STOP,
            )
            .await?;
        *cost += completion.cost_usd;
        debug!(exchange = %id, "Selection output: {}", completion.text);

        Ok(extract_tool_calls(&completion.text)?)
    }

    /// Dispatch one step's calls in order.
    async fn call_tools(
        &self,
        id: &str,
        selection: ToolSelection,
        scratch: &mut Vec<ChatMessage>,
        cost: &mut f64,
    ) -> PlanState {
        let calls = selection.tools_to_call;
        let names: Vec<&str> = calls.iter().map(|c| c.name.as_str()).collect();
        info!(exchange = %id, tools = ?names, "Tools selected");

        if calls.is_empty() || calls.iter().any(|c| c.name == READY_TOOL) {
            if calls.len() > 1 {
                debug!(exchange = %id, "Ready selected with other tools, skipping them");
            }
            return PlanState::Ready;
        }

        for call in calls {
            let input = ToolInput::from(call.input);
            match self.registry.dispatch(&call.name, &input).await {
                Ok(output) => {
                    *cost += output.cost;
                    debug!(
                        exchange = %id,
                        tool = %call.name,
                        chars = output.text.chars().count(),
                        "Tool finished"
                    );
                    if output.text.is_empty() {
                        continue;
                    }
                    let text = truncate_chars(&output.text, TOOL_OUTPUT_MAX_CHARS);
                    scratch.push(ChatMessage::tool(&call.name, text));
                }
                Err(e) => {
                    warn!(exchange = %id, tool = %call.name, "Tool failed: {}", e);
                    scratch.push(ChatMessage::error(format!(
                        "Calling the tool '{}' failed: {}",
                        call.name, e
                    )));
                }
            }
        }

        PlanState::Planning
    }
}
