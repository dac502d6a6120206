//! Launch configured applications and terminate running ones.

use super::traits::{Tool, ToolError, ToolInput, ToolOutput};
use super::user_line;
use crate::config::RunnableApp;
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;
use sysinfo::{Pid, Signal, System};
use tracing::{info, warn};

/// A running process as seen by [`ProcessControl`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessInfo {
    pub pid: u32,
    pub name: String,
}

/// Host process access.
pub trait ProcessControl: Send + Sync {
    /// Processes owned by the current user.
    fn list(&self) -> Result<Vec<ProcessInfo>>;

    /// PID of the assistant itself.
    fn own_pid(&self) -> u32;

    fn terminate(&self, pid: u32) -> Result<()>;

    /// Start `exe` detached and return its PID.
    fn spawn(&self, exe: &str) -> Result<u32>;
}

/// [`ProcessControl`] backed by the real host via `sysinfo`.
#[derive(Debug, Default)]
pub struct SystemProcesses;

impl ProcessControl for SystemProcesses {
    fn list(&self) -> Result<Vec<ProcessInfo>> {
        let mut sys = System::new();
        sys.refresh_processes();

        let own = Pid::from_u32(self.own_pid());
        let user = sys.process(own).and_then(|p| p.user_id()).cloned();

        Ok(sys
            .processes()
            .iter()
            .filter(|(_, p)| match &user {
                Some(uid) => p.user_id() == Some(uid),
                None => true,
            })
            .map(|(pid, p)| ProcessInfo {
                pid: pid.as_u32(),
                name: p.name().to_string(),
            })
            .collect())
    }

    fn own_pid(&self) -> u32 {
        std::process::id()
    }

    fn terminate(&self, pid: u32) -> Result<()> {
        let mut sys = System::new();
        sys.refresh_processes();
        let Some(process) = sys.process(Pid::from_u32(pid)) else {
            bail!("process {} no longer exists", pid);
        };
        match process.kill_with(Signal::Term) {
            Some(true) => Ok(()),
            Some(false) => bail!("the signal could not be delivered"),
            // SIGTERM is not available on this platform
            None if process.kill() => Ok(()),
            None => bail!("the process could not be killed"),
        }
    }

    fn spawn(&self, exe: &str) -> Result<u32> {
        let exe = shellexpand::tilde(exe).into_owned();
        let child = tokio::process::Command::new(&exe)
            .stdin(std::process::Stdio::null())
            .stdout(std::process::Stdio::null())
            .stderr(std::process::Stdio::null())
            .spawn()
            .with_context(|| format!("Failed to start {}", exe))?;
        child
            .id()
            .with_context(|| format!("{} exited before reporting a PID", exe))
    }
}

/// Lowercased file name without directory or `.exe` suffix.
fn exe_stem(name: &str) -> String {
    let file = Path::new(name.trim())
        .file_name()
        .map(|f| f.to_string_lossy().into_owned())
        .unwrap_or_default()
        .to_lowercase();
    file.strip_suffix(".exe").map(String::from).unwrap_or(file)
}

/// Shortest query that may match part of an app name or description.
const MIN_PARTIAL_QUERY: usize = 3;

/// Find the configured app the user most likely means.
fn find_app<'a>(apps: &'a [RunnableApp], query: &str) -> Option<&'a RunnableApp> {
    let q = query.trim().to_lowercase();
    if q.is_empty() {
        return None;
    }
    let words: Vec<&str> = q
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .collect();
    let partial = q.chars().count() >= MIN_PARTIAL_QUERY;
    let named: Vec<(&RunnableApp, String)> = apps
        .iter()
        .map(|a| (a, a.name.trim().to_lowercase()))
        .filter(|(_, name)| !name.is_empty())
        .collect();

    named
        .iter()
        .find(|(_, name)| *name == q)
        .or_else(|| {
            named
                .iter()
                .find(|(_, name)| words.iter().any(|w| *w == name.as_str()))
        })
        .or_else(|| named.iter().find(|(_, name)| partial && name.contains(&q)))
        .map(|(app, _)| *app)
        .or_else(|| {
            apps.iter().find(|a| {
                partial && !a.description.is_empty() && a.description.to_lowercase().contains(&q)
            })
        })
}

/// Processes whose executable matches the query or a configured app's
/// executable. The assistant's own process is never included.
fn matching_processes<'a>(
    processes: &'a [ProcessInfo],
    query: &str,
    apps: &[RunnableApp],
    own_pid: u32,
) -> Vec<&'a ProcessInfo> {
    let mut targets = Vec::new();
    let stem = exe_stem(query);
    if !stem.is_empty() {
        targets.push(stem);
    }
    if let Some(app) = find_app(apps, query) {
        targets.push(exe_stem(&app.exe));
    }
    if targets.is_empty() {
        return Vec::new();
    }

    processes
        .iter()
        .filter(|p| p.pid != own_pid)
        .filter(|p| targets.contains(&exe_stem(&p.name)))
        .collect()
}

/// Terminate every process matching `query`, one report line per process.
/// Performs blocking host calls.
fn kill_matching(
    processes: &dyn ProcessControl,
    apps: &[RunnableApp],
    query: &str,
) -> Result<ToolOutput, ToolError> {
    let running = processes.list()?;
    let matches = matching_processes(&running, query, apps, processes.own_pid());
    if matches.is_empty() {
        return Ok(ToolOutput::free(format!(
            "No running process matches '{}', nothing to terminate.",
            query
        )));
    }

    let lines: Vec<String> = matches
        .iter()
        .map(|p| match processes.terminate(p.pid) {
            Ok(()) => {
                info!("Terminated {} ({})", p.name, p.pid);
                format!("Terminated '{}' (PID {}).", p.name, p.pid)
            }
            Err(e) => {
                warn!("Failed to terminate {} ({}): {:#}", p.name, p.pid, e);
                format!("Failed to terminate '{}' (PID {}): {:#}", p.name, p.pid, e)
            }
        })
        .collect();
    Ok(ToolOutput::free(lines.join("\n")))
}

/// Tool that starts configured apps and kills running processes.
pub struct AppManager {
    apps: Arc<Vec<RunnableApp>>,
    processes: Arc<dyn ProcessControl>,
}

impl AppManager {
    pub fn new(apps: Vec<RunnableApp>, processes: Arc<dyn ProcessControl>) -> Self {
        Self {
            apps: Arc::new(apps),
            processes,
        }
    }

    async fn kill(&self, query: &str) -> Result<ToolOutput, ToolError> {
        let processes = self.processes.clone();
        let apps = self.apps.clone();
        let query = query.to_string();
        tokio::task::spawn_blocking(move || kill_matching(processes.as_ref(), &apps, &query))
            .await
            .map_err(|e| ToolError::Execution(format!("process scan did not finish: {}", e)))?
    }

    fn app_names(&self) -> String {
        if self.apps.is_empty() {
            return "none configured".into();
        }
        self.apps
            .iter()
            .map(|a| a.name.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }

    fn start(&self, query: &str) -> Result<ToolOutput, ToolError> {
        let Some(app) = find_app(&self.apps, query) else {
            return Ok(ToolOutput::free(format!(
                "'{}' is not a runnable app. Runnable apps: {}",
                query,
                self.app_names()
            )));
        };
        let pid = self.processes.spawn(&app.exe)?;
        info!("Started {} ({})", app.name, pid);
        Ok(ToolOutput::free(format!(
            "Started '{}' (PID {}).",
            app.name, pid
        )))
    }
}

#[async_trait]
impl Tool for AppManager {
    fn name(&self) -> &str {
        "AppManager"
    }

    fn when_to_use(&self) -> String {
        let mut text = String::from(
            "Use this tool to start applications or to close/kill running programs and processes.\n\
             Available Commands:\n\
             - start: Starts a runnable app. Requires 'appQuery', the name of the app.\n\
             - kill: Terminates every running process of a program. Requires 'appQuery', \
             the program or executable name.\n\
             Runnable Apps:\n",
        );
        if self.apps.is_empty() {
            text.push_str("- none configured\n");
        }
        for app in self.apps.iter() {
            if app.description.is_empty() {
                text.push_str(&format!("- {}\n", app.name));
            } else {
                text.push_str(&format!("- {}: {}\n", app.name, app.description));
            }
        }
        text
    }

    fn examples(&self) -> String {
        let cases = [
            ("close spotify", r#"{"command": "kill", "appQuery": "spotify"}"#),
            ("pls start the browser", r#"{"command": "start", "appQuery": "browser"}"#),
        ];
        cases
            .iter()
            .map(|(msg, input)| {
                format!(
                    "<chat&tools>\n{}\n<response>\n{{\n    \"toolsToCall\": [\n        {{\"name\": \"AppManager\", \"input\": {}}}\n    ]\n}}\n</response>\n",
                    user_line(msg),
                    input
                )
            })
            .collect()
    }

    async fn execute(&self, input: &ToolInput) -> Result<ToolOutput, ToolError> {
        let command = input.require("command")?;
        let query = input.require("appQuery")?;

        match command.to_lowercase().as_str() {
            "kill" => self.kill(&query).await,
            "start" => self.start(&query),
            other => Err(ToolError::InvalidToolInput(format!(
                "'{}' is not a valid command for AppManager",
                other
            ))),
        }
    }
}
