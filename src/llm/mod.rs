pub mod client;

pub use client::{Completion, CompletionClient, HttpCompletionClient, LlmError};
