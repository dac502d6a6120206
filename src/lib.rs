//! Jarvis: a personal assistant chat bot.
//!
//! Each inbound message runs one exchange: the model picks tools from a
//! registry, the tools run, and a second prompt turns their output into a
//! natural-language reply.

pub mod agent;
pub mod audio;
pub mod chat;
pub mod config;
pub mod llm;
pub mod tools;
pub mod types;
