//! Text completion via an OpenAI-compatible chat completions API.
//!
//! The planner only ever sends a single prompt and reads back text, so the
//! prompt travels as one user message and tool-use fields are not used.

use crate::types::TokenUsage;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

/// Failure of an LLM round trip.
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("completion request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("completion failed ({status}): {body}")]
    Status { status: u16, body: String },

    #[error("completion response contained no choices")]
    EmptyResponse,
}

/// Generated text plus what it cost.
#[derive(Debug, Clone, PartialEq)]
pub struct Completion {
    pub text: String,
    pub usage: TokenUsage,
    pub cost_usd: f64,
}

/// The LLM completion boundary.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    async fn complete(
        &self,
        prompt: &str,
        model: &str,
        max_tokens: u32,
        stop: &[&str],
    ) -> Result<Completion, LlmError>;
}

/// Completion client for an OpenAI-compatible HTTP endpoint.
#[derive(Debug, Clone)]
pub struct HttpCompletionClient {
    base_url: String,
    api_key: String,
    temperature: f64,
    http: reqwest::Client,
}

// -- OpenAI-compatible request/response types --------------------------------

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [MessagePayload<'a>; 1],
    max_tokens: u32,
    temperature: f64,
    #[serde(skip_serializing_if = "no_stop")]
    stop: &'a [&'a str],
}

fn no_stop(stop: &&[&str]) -> bool {
    stop.is_empty()
}

#[derive(Debug, Serialize)]
struct MessagePayload<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
    usage: Option<UsagePayload>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UsagePayload {
    prompt_tokens: u32,
    completion_tokens: u32,
    total_tokens: u32,
}

/// Pricing per 1M tokens (prompt, completion) in USD.
const MODEL_PRICING: &[(&str, f64, f64)] = &[
    ("mistralai/Mixtral-8x7B-Instruct-v0.1", 0.60, 0.60),
    ("mistralai/Mistral-7B-Instruct-v0.2", 0.20, 0.20),
    ("snorkelai/Snorkel-Mistral-PairRM-DPO", 0.20, 0.20),
    ("gpt-4o-mini", 0.15, 0.60),
    ("gpt-4o", 2.50, 10.00),
];

impl HttpCompletionClient {
    pub fn new(base_url: &str, api_key: &str, temperature: f64) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            temperature,
            http: reqwest::Client::new(),
        }
    }

    /// Estimate the USD cost of a token usage for a given model.
    pub fn estimate_cost(model: &str, usage: &TokenUsage) -> f64 {
        let (prompt_rate, completion_rate) = MODEL_PRICING
            .iter()
            .find(|(name, _, _)| model.contains(name))
            .map(|(_, p, c)| (*p, *c))
            .unwrap_or((0.20, 0.20)); // Default to 7B pricing

        let prompt_cost = (usage.prompt_tokens as f64 / 1_000_000.0) * prompt_rate;
        let completion_cost = (usage.completion_tokens as f64 / 1_000_000.0) * completion_rate;
        prompt_cost + completion_cost
    }
}

#[async_trait]
impl CompletionClient for HttpCompletionClient {
    async fn complete(
        &self,
        prompt: &str,
        model: &str,
        max_tokens: u32,
        stop: &[&str],
    ) -> Result<Completion, LlmError> {
        let url = format!("{}/v1/chat/completions", self.base_url);

        let request = ChatRequest {
            model,
            messages: [MessagePayload {
                role: "user",
                content: prompt,
            }],
            max_tokens,
            temperature: self.temperature,
            stop,
        };

        debug!("Completion request to model {} ({} prompt chars)", model, prompt.len());

        let resp = self
            .http
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(LlmError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let body: ChatResponse = resp.json().await?;
        let choice = body
            .choices
            .into_iter()
            .next()
            .ok_or(LlmError::EmptyResponse)?;

        let usage = body
            .usage
            .map(|u| TokenUsage {
                prompt_tokens: u.prompt_tokens,
                completion_tokens: u.completion_tokens,
                total_tokens: u.total_tokens,
            })
            .unwrap_or_default();

        let cost_usd = Self::estimate_cost(model, &usage);
        debug!(
            "Completion used {} prompt / {} completion tokens (${:.6})",
            usage.prompt_tokens, usage.completion_tokens, cost_usd
        );

        Ok(Completion {
            text: choice.message.content.unwrap_or_default(),
            usage,
            cost_usd,
        })
    }
}
