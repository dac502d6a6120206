//! Jarvis: personal assistant chat bot.
//!
//! Usage:
//!   jarvis init            Write a default config and settings file
//!   jarvis chat            Talk to the assistant in the console
//!   jarvis ask <text>      Ask a single question
//!   jarvis tools           List the tools the assistant can use

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use jarvis::agent::{Planner, PlannerConfig};
use jarvis::audio::WhisperClient;
use jarvis::chat::Conversation;
use jarvis::config::{self, JarvisConfig};
use jarvis::llm::HttpCompletionClient;
use jarvis::tools::{self, Settings};

// ---------------------------------------------------------------------------
// CLI definition
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(name = "jarvis")]
#[command(version = "0.1.0")]
#[command(about = "Personal assistant chat bot driven by an LLM tool-selection loop")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to the jarvis home directory (default ~/.jarvis).
    #[arg(long)]
    home: Option<String>,

    /// Log level (debug, info, warn, error). Overrides the config file.
    #[arg(long)]
    log_level: Option<String>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Write a default jarvis.toml and settings file.
    Init,

    /// Start an interactive chat in the console.
    Chat,

    /// Ask a single question and print the answer.
    Ask {
        /// The message to send.
        #[arg(required = true, num_args = 1..)]
        text: Vec<String>,
    },

    /// List the tools the assistant can use.
    Tools,
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let home_dir = match &cli.home {
        Some(home) => PathBuf::from(shellexpand::tilde(home).into_owned()),
        None => config::default_home_dir(),
    };
    let config_path = home_dir.join("jarvis.toml");
    let cfg = config::load_config(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?;

    // Initialize logging
    let level = cli.log_level.clone().unwrap_or_else(|| cfg.log_level.clone());
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&level));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .init();

    match cli.command {
        Commands::Init => cmd_init(&home_dir, &cfg),
        Commands::Chat => cmd_chat(&cfg).await,
        Commands::Ask { text } => cmd_ask(&cfg, &text.join(" ")).await,
        Commands::Tools => cmd_tools(&cfg),
    }
}

// ---------------------------------------------------------------------------
// Command implementations
// ---------------------------------------------------------------------------

fn cmd_init(home_dir: &Path, cfg: &JarvisConfig) -> Result<()> {
    std::fs::create_dir_all(home_dir)
        .with_context(|| format!("Failed to create home directory: {}", home_dir.display()))?;

    let config_path = home_dir.join("jarvis.toml");
    if config_path.exists() {
        println!("Config already exists at {}", config_path.display());
    } else {
        config::save_config(cfg, &config_path)?;
        println!("{} Wrote {}", ">>>".green().bold(), config_path.display());
    }

    let settings_path = PathBuf::from(cfg.resolved_settings_path());
    if settings_path.exists() {
        println!("Settings already exist at {}", settings_path.display());
    } else {
        Settings::load(&settings_path)?.save()?;
        println!("{} Wrote {}", ">>>".green().bold(), settings_path.display());
    }

    Ok(())
}

async fn cmd_chat(cfg: &JarvisConfig) -> Result<()> {
    let mut conversation = build_conversation(cfg)?;

    println!(
        "{} {} Online! (model: {}) Type /help for commands.",
        ">>>".green().bold(),
        conversation.name(),
        cfg.answer_model
    );

    let cancel = CancellationToken::new();
    let ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            ctrl_c.cancel();
        }
    });

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("{} ", "you>".cyan().bold());
        std::io::stdout().flush().ok();

        let line = tokio::select! {
            line = lines.next_line() => line.context("Failed to read from stdin")?,
            _ = cancel.cancelled() => break,
        };
        let Some(line) = line else {
            break;
        };

        match ChatInput::parse(&line) {
            ChatInput::Empty => continue,
            ChatInput::Quit => break,
            ChatInput::Start => {
                let status = conversation.start();
                say(conversation.name(), &status);
            }
            ChatInput::Stop => {
                let status = conversation.stop();
                say(conversation.name(), &status);
            }
            ChatInput::Reset => {
                for line in conversation.reset() {
                    say(conversation.name(), &line);
                }
            }
            ChatInput::Help => println!("{}", conversation.help_text()),
            ChatInput::VoiceUsage => println!("{}", "usage: /voice <audio file>".dimmed()),
            ChatInput::Voice(path) => {
                let audio = match tokio::fs::read(&path).await {
                    Ok(audio) => audio,
                    Err(e) => {
                        eprintln!("{} cannot read {}: {}", "Error:".red().bold(), path, e);
                        continue;
                    }
                };
                let file_name = Path::new(&path)
                    .file_name()
                    .map(|f| f.to_string_lossy().into_owned())
                    .unwrap_or_else(|| "voice.ogg".into());

                let replies = tokio::select! {
                    replies = conversation.handle_voice(audio, &file_name) => replies,
                    _ = cancel.cancelled() => break,
                };
                match replies {
                    Ok(replies) => {
                        for reply in replies {
                            say(conversation.name(), &reply);
                        }
                    }
                    Err(e) => report(&e),
                }
            }
            ChatInput::Text(text) => {
                let reply = tokio::select! {
                    reply = conversation.handle_text(&text) => reply,
                    _ = cancel.cancelled() => break,
                };
                match reply {
                    Ok(Some(reply)) => say(conversation.name(), &reply),
                    Ok(None) => println!("{}", "(offline, use /start to resume)".dimmed()),
                    Err(e) => report(&e),
                }
            }
        }
    }

    println!(
        "\n{} {} Offline. Session cost: {:.4} $cent",
        "<<<".red().bold(),
        conversation.name(),
        conversation.total_cost() * 100.0
    );
    info!("Chat session ended");
    Ok(())
}

async fn cmd_ask(cfg: &JarvisConfig, text: &str) -> Result<()> {
    let mut conversation = build_conversation(cfg)?;
    if let Some(reply) = conversation.handle_text(text).await? {
        say(conversation.name(), &reply);
    }
    println!(
        "{}",
        format!("cost: {:.4} $cent", conversation.total_cost() * 100.0).dimmed()
    );
    Ok(())
}

fn cmd_tools(cfg: &JarvisConfig) -> Result<()> {
    let settings = Settings::in_memory().into_handle();
    let registry = tools::build_registry(cfg, settings);

    for name in registry.names() {
        if let Some(tool) = registry.get(name) {
            println!("{}", name.bold());
            for line in tool.when_to_use().trim().lines() {
                println!("  {}", line);
            }
            println!();
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Wire the configured LLM, tools, settings and speech client together.
fn build_conversation(cfg: &JarvisConfig) -> Result<Conversation> {
    let settings_path = PathBuf::from(cfg.resolved_settings_path());
    let settings = Settings::load(&settings_path)
        .with_context(|| format!("Failed to load settings from {}", settings_path.display()))?
        .into_handle();

    let registry = tools::build_registry(cfg, settings.clone());
    let llm = Arc::new(HttpCompletionClient::new(
        &cfg.llm_api_url,
        &cfg.llm_api_key,
        cfg.temperature,
    ));
    let planner = Planner::new(llm, registry, PlannerConfig::from(cfg));

    let mut conversation = Conversation::new(planner, settings, cfg.recent_chat_memory);
    if !cfg.speech.api_key.is_empty() {
        conversation = conversation.with_transcriber(Arc::new(WhisperClient::new(&cfg.speech)));
    }
    Ok(conversation)
}

/// One line typed into the console chat.
#[derive(Debug, PartialEq)]
enum ChatInput {
    Empty,
    Quit,
    Start,
    Stop,
    Reset,
    Help,
    /// `/voice` without a file to send.
    VoiceUsage,
    Voice(String),
    Text(String),
}

impl ChatInput {
    fn parse(line: &str) -> Self {
        let line = line.trim();
        if line.is_empty() {
            return Self::Empty;
        }
        match line.split_once(' ') {
            Some(("/voice", path)) => Self::Voice(shellexpand::tilde(path.trim()).into_owned()),
            _ => match line {
                "/voice" => Self::VoiceUsage,
                "/quit" | "/exit" => Self::Quit,
                "/start" => Self::Start,
                "/stop" => Self::Stop,
                "/reset" => Self::Reset,
                "/help" => Self::Help,
                _ => Self::Text(line.to_string()),
            },
        }
    }
}

fn say(name: &str, text: &str) {
    println!("{} {}", format!("{}>", name).green().bold(), text);
}

fn report(e: &anyhow::Error) {
    error!("{:#}", e);
    eprintln!("{} {:#}", "Error:".red().bold(), e);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn console_commands() {
        assert_eq!(ChatInput::parse("  "), ChatInput::Empty);
        assert_eq!(ChatInput::parse("/reset"), ChatInput::Reset);
        assert_eq!(
            ChatInput::parse("/voice  ~/memo.ogg "),
            ChatInput::Voice(shellexpand::tilde("~/memo.ogg").into_owned())
        );
        assert_eq!(
            ChatInput::parse("/voice /tmp/memo.ogg"),
            ChatInput::Voice("/tmp/memo.ogg".into())
        );
        assert_eq!(ChatInput::parse("/voice   "), ChatInput::VoiceUsage);
        assert_eq!(
            ChatInput::parse("what time is it?"),
            ChatInput::Text("what time is it?".into())
        );
    }
}
