//! Wikipedia page summaries via the REST API.

use super::traits::{Tool, ToolError, ToolInput, ToolOutput};
use super::user_line;
use crate::config::WikipediaConfig;
use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use reqwest::{StatusCode, Url};
use serde::Deserialize;
use tracing::debug;

#[derive(Debug, Deserialize)]
struct SummaryResponse {
    #[serde(default)]
    title: String,
    #[serde(default)]
    extract: String,
}

pub struct WikipediaSummary {
    api_url: String,
    user_agent: String,
    http: reqwest::Client,
}

impl WikipediaSummary {
    pub fn new(config: &WikipediaConfig) -> Self {
        Self {
            api_url: config.api_url.trim_end_matches('/').to_string(),
            user_agent: config.user_agent.clone(),
            http: reqwest::Client::new(),
        }
    }

    /// `{api_url}/page/summary/{Title_With_Underscores}`, percent-encoded.
    fn summary_url(&self, term: &str) -> Result<Url> {
        let title = term.trim().replace(' ', "_");
        let mut url = Url::parse(&self.api_url)
            .with_context(|| format!("Invalid Wikipedia api_url '{}'", self.api_url))?;
        url.path_segments_mut()
            .map_err(|_| anyhow!("Wikipedia api_url cannot be a base"))?
            .pop_if_empty()
            .extend(["page", "summary", title.as_str()]);
        Ok(url)
    }

    async fn fetch(&self, term: &str) -> Result<Option<SummaryResponse>> {
        let url = self.summary_url(term)?;
        debug!("Wikipedia lookup: {}", url);

        let resp = self
            .http
            .get(url)
            .header(reqwest::header::USER_AGENT, &self.user_agent)
            .send()
            .await
            .context("Wikipedia request failed")?;

        let status = resp.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            bail!("Wikipedia lookup failed ({}): {}", status, body);
        }
        Ok(Some(
            resp.json().await.context("Failed to parse Wikipedia summary")?,
        ))
    }
}

#[async_trait]
impl Tool for WikipediaSummary {
    fn name(&self) -> &str {
        "WikipediaSummary"
    }

    fn when_to_use(&self) -> String {
        "Use this tool to look up facts about a person, place, thing or event on Wikipedia.\n\
         Input is the search term, for example the name of the article."
            .into()
    }

    fn examples(&self) -> String {
        format!(
            "<chat&tools>\n{}\n<response>\n{{\n    \"toolsToCall\": [\n        {{\"name\": \"WikipediaSummary\", \"input\": \"Ada Lovelace\"}}\n    ]\n}}\n</response>\n",
            user_line("who was ada lovelace?")
        )
    }

    async fn execute(&self, input: &ToolInput) -> Result<ToolOutput, ToolError> {
        let term = input.text_or_field("query").ok_or_else(|| {
            ToolError::InvalidToolInput("WikipediaSummary needs a search term".into())
        })?;

        let text = match self.fetch(&term).await? {
            Some(summary) if !summary.extract.trim().is_empty() => {
                let title = if summary.title.is_empty() { &term } else { &summary.title };
                format!("Summary of '{}' from Wikipedia:\n{}", title, summary.extract.trim())
            }
            _ => format!(
                "No Wikipedia page found for '{}'. Please answer without the knowledge from Wikipedia.",
                term
            ),
        };
        Ok(ToolOutput::free(text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tool(api_url: &str) -> WikipediaSummary {
        WikipediaSummary::new(&WikipediaConfig {
            enabled: true,
            api_url: api_url.into(),
            user_agent: "jarvis-test".into(),
        })
    }

    #[test]
    fn titles_are_underscored_and_encoded() {
        let url = tool("https://en.wikipedia.org/api/rest_v1/")
            .summary_url(" Ada Lovelace ")
            .unwrap();
        assert_eq!(
            url.as_str(),
            "https://en.wikipedia.org/api/rest_v1/page/summary/Ada_Lovelace"
        );

        let url = tool("https://en.wikipedia.org/api/rest_v1")
            .summary_url("AC/DC")
            .unwrap();
        assert!(url.as_str().ends_with("/page/summary/AC%2FDC"));
    }

    #[tokio::test]
    async fn empty_input_is_invalid() {
        let err = tool("https://en.wikipedia.org/api/rest_v1")
            .execute(&ToolInput::None)
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::InvalidToolInput(_)));
    }
}
