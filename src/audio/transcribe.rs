//! Speech-to-text for voice messages.

use crate::config::SpeechConfig;
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use tracing::debug;

/// Turns recorded audio into text.
#[async_trait]
pub trait Transcriber: Send + Sync {
    async fn transcribe(&self, audio: Vec<u8>, file_name: &str) -> Result<String>;
}

#[derive(Debug, Deserialize)]
struct TranscriptionResponse {
    text: String,
}

/// Client for an OpenAI-compatible `/v1/audio/transcriptions` endpoint.
#[derive(Debug, Clone)]
pub struct WhisperClient {
    base_url: String,
    api_key: String,
    model: String,
    http: reqwest::Client,
}

impl WhisperClient {
    pub fn new(config: &SpeechConfig) -> Self {
        Self {
            base_url: config.api_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            http: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl Transcriber for WhisperClient {
    async fn transcribe(&self, audio: Vec<u8>, file_name: &str) -> Result<String> {
        debug!("Transcribing {} ({} bytes)", file_name, audio.len());

        let form = Form::new()
            .text("model", self.model.clone())
            .part("file", Part::bytes(audio).file_name(file_name.to_string()));

        let resp = self
            .http
            .post(format!("{}/v1/audio/transcriptions", self.base_url))
            .bearer_auth(&self.api_key)
            .multipart(form)
            .send()
            .await
            .context("Transcription request failed")?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            bail!("Transcription failed ({}): {}", status, body);
        }

        let body: TranscriptionResponse = resp
            .json()
            .await
            .context("Failed to parse transcription response")?;
        Ok(body.text.trim().to_string())
    }
}
