pub mod transcribe;

pub use transcribe::{Transcriber, WhisperClient};
