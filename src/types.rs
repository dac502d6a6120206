//! Shared types used across the assistant runtime.

use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Chat messages
// ---------------------------------------------------------------------------

/// Who authored a message.
///
/// Tool results are tagged with the invoking tool's name, so the set of roles
/// is open-ended. Serialized as a plain string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Role {
    User,
    Assistant,
    System,
    /// A tool name, or `error` for synthetic failure messages.
    Tool(String),
}

impl Role {
    /// Role used for synthetic failure messages inside a planning loop.
    pub fn error() -> Self {
        Self::Tool("error".into())
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
            Self::System => "system",
            Self::Tool(name) => name,
        }
    }
}

impl From<String> for Role {
    fn from(s: String) -> Self {
        match s.as_str() {
            "user" => Self::User,
            "assistant" => Self::Assistant,
            "system" => Self::System,
            _ => Self::Tool(s),
        }
    }
}

impl From<Role> for String {
    fn from(role: Role) -> Self {
        match role {
            Role::Tool(name) => name,
            other => other.as_str().to_string(),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A role-tagged chat message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    /// A tool-result message tagged with the tool's name.
    pub fn tool(name: &str, content: impl Into<String>) -> Self {
        Self::new(Role::Tool(name.to_string()), content)
    }

    pub fn error(content: impl Into<String>) -> Self {
        Self::new(Role::error(), content)
    }
}

// ---------------------------------------------------------------------------
// Tool selection
// ---------------------------------------------------------------------------

/// One tool call requested by the model in a `toolsToCall` envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallRequest {
    pub name: String,
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub input: serde_json::Value,
}

/// The JSON envelope the selection prompt asks the model for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolSelection {
    #[serde(rename = "toolsToCall")]
    pub tools_to_call: Vec<ToolCallRequest>,
}

// ---------------------------------------------------------------------------
// Inference accounting
// ---------------------------------------------------------------------------

/// Token usage from an inference call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}
