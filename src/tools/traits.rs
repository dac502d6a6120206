//! Tool trait and the values that cross the tool execution boundary.

use async_trait::async_trait;
use serde_json::{Map, Value};
use thiserror::Error;

/// Why a tool call could not produce output.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ToolError {
    #[error("unknown tool: {0}")]
    UnknownTool(String),

    #[error("invalid input: {0}")]
    InvalidToolInput(String),

    #[error("execution failed: {0}")]
    Execution(String),
}

impl From<anyhow::Error> for ToolError {
    fn from(e: anyhow::Error) -> Self {
        Self::Execution(format!("{:#}", e))
    }
}

/// Text a tool produced and the USD cost it incurred.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolOutput {
    pub text: String,
    pub cost: f64,
}

impl ToolOutput {
    /// Output of a tool that made no paid calls.
    pub fn free(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            cost: 0.0,
        }
    }
}

/// Input of a tool call: nothing, free text, or a flat key/value map.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum ToolInput {
    #[default]
    None,
    Text(String),
    Fields(Map<String, Value>),
}

impl From<Value> for ToolInput {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => Self::None,
            Value::Object(map) => Self::Fields(map),
            Value::String(s) => {
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    return Self::None;
                }
                // Models regularly quote the whole input object.
                if trimmed.starts_with('{') {
                    if let Ok(Value::Object(map)) = serde_json::from_str(trimmed) {
                        return Self::Fields(map);
                    }
                }
                Self::Text(s)
            }
            other => Self::Text(other.to_string()),
        }
    }
}

impl ToolInput {
    /// The key/value map, or `InvalidToolInput` if the input is not one.
    pub fn fields(&self) -> Result<&Map<String, Value>, ToolError> {
        match self {
            Self::Fields(map) => Ok(map),
            Self::None => Err(ToolError::InvalidToolInput(
                "expected an input object, got nothing".into(),
            )),
            Self::Text(text) => Err(ToolError::InvalidToolInput(format!(
                "expected an input object, got text '{}'",
                text
            ))),
        }
    }

    /// A field value as text, if present and non-empty. Scalars are stringified.
    pub fn field(&self, key: &str) -> Option<String> {
        let Self::Fields(map) = self else {
            return None;
        };
        let text = match map.get(key)? {
            Value::Null => return None,
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        if text.trim().is_empty() {
            None
        } else {
            Some(text)
        }
    }

    /// A field that must be present and non-empty.
    pub fn require(&self, key: &str) -> Result<String, ToolError> {
        self.fields()?;
        self.field(key).ok_or_else(|| {
            ToolError::InvalidToolInput(format!("missing a value for key '{}'", key))
        })
    }

    /// Free-text view: the text itself, or the value of `key` in a map.
    pub fn text_or_field(&self, key: &str) -> Option<String> {
        match self {
            Self::Text(text) => Some(text.clone()),
            Self::Fields(_) => self.field(key),
            Self::None => None,
        }
    }
}

/// A capability the planner can dispatch to.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Tool name (the key the model selects it by).
    fn name(&self) -> &str;

    /// When (and when not) to use this tool, including its input format.
    fn when_to_use(&self) -> String;

    /// Few-shot selection examples.
    fn examples(&self) -> String {
        String::new()
    }

    /// Few-shot examples of final answers built from this tool's output.
    fn answer_examples(&self) -> String {
        String::new()
    }

    /// Execute the tool with the given input.
    async fn execute(&self, input: &ToolInput) -> Result<ToolOutput, ToolError>;
}
