//! Claude Code CLI submitter.
//!
//! Runs the `claude` CLI in one-shot mode with streaming JSON output, pointed
//! at the agent's proxy through `ANTHROPIC_BASE_URL`. Each stdout line is one
//! JSON message; assistant text blocks become [`Fragment::Text`] and every
//! other message becomes [`Fragment::Other`].
//!
//! The CLI runs in its own process group. Dropping the fragment stream (task
//! timeout, abort, interrupt) kills that group, taking any tool commands the
//! CLI started down with it.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use futures::StreamExt;
use nix::errno::Errno;
use nix::sys::signal::{killpg, Signal};
use nix::unistd::Pid;
use serde::Deserialize;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, ChildStdout, Command};
use tracing::{debug, info, warn};

use super::{Fragment, FragmentStream, QueryRequest, QuerySubmitter};
use crate::config::defaults::{
    default_allowed_tools, DEFAULT_CLAUDE_PATH, DEFAULT_CLIENT_MODEL, DEFAULT_PERMISSION_MODE,
};
use crate::config::ClientConfig;
use crate::error::SubmitError;

/// Submits queries by driving the Claude Code CLI.
#[derive(Debug, Clone)]
pub struct ClaudeCliSubmitter {
    claude_path: String,
    model: String,
    permission_mode: String,
    allowed_tools: Vec<String>,
    cwd: PathBuf,
}

impl ClaudeCliSubmitter {
    /// The path can be just "claude" to use PATH lookup, or a full path.
    pub fn new(claude_path: impl Into<String>, cwd: impl Into<PathBuf>) -> Self {
        Self {
            claude_path: claude_path.into(),
            model: DEFAULT_CLIENT_MODEL.to_string(),
            permission_mode: DEFAULT_PERMISSION_MODE.to_string(),
            allowed_tools: default_allowed_tools(),
            cwd: cwd.into(),
        }
    }

    pub fn from_config(client: &ClientConfig, cwd: &Path) -> Self {
        Self::new(client.claude_path.clone(), cwd)
            .with_model(client.model.clone())
            .with_permission_mode(client.permission_mode.clone())
            .with_allowed_tools(client.allowed_tools.clone())
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_permission_mode(mut self, mode: impl Into<String>) -> Self {
        self.permission_mode = mode.into();
        self
    }

    pub fn with_allowed_tools(mut self, tools: Vec<String>) -> Self {
        self.allowed_tools = tools;
        self
    }

    /// CLI arguments for one request, prompt last.
    pub fn args(&self, request: &QueryRequest) -> Vec<String> {
        let mut args = vec![
            "--print".to_string(),
            "--output-format".to_string(),
            "stream-json".to_string(),
            "--verbose".to_string(),
            "--model".to_string(),
            self.model.clone(),
            "--permission-mode".to_string(),
            self.permission_mode.clone(),
        ];
        if !self.allowed_tools.is_empty() {
            args.push("--allowedTools".to_string());
            args.push(self.allowed_tools.join(","));
        }
        if !request.system_prompt.is_empty() {
            args.push("--system-prompt".to_string());
            args.push(request.system_prompt.clone());
        }
        args.push("--".to_string());
        args.push(request.query.clone());
        args
    }
}

impl Default for ClaudeCliSubmitter {
    fn default() -> Self {
        Self::new(DEFAULT_CLAUDE_PATH, ".")
    }
}

#[async_trait]
impl QuerySubmitter for ClaudeCliSubmitter {
    async fn submit(&self, request: &QueryRequest) -> Result<FragmentStream, SubmitError> {
        info!(
            agent = %request.agent,
            endpoint = %request.endpoint,
            cwd = %self.cwd.display(),
            prompt_len = request.query.len(),
            "Starting Claude CLI"
        );

        let mut child = Command::new(&self.claude_path)
            .args(self.args(request))
            .env("ANTHROPIC_BASE_URL", &request.endpoint)
            .current_dir(&self.cwd)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .process_group(0)
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    SubmitError::Spawn(format!(
                        "`{}` not found; make sure Claude Code is installed",
                        self.claude_path
                    ))
                } else {
                    SubmitError::Spawn(format!("failed to run `{}`: {e}", self.claude_path))
                }
            })?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| SubmitError::Protocol("Failed to capture stdout".to_string()))?;

        if let Some(stderr) = child.stderr.take() {
            let agent = request.agent.clone();
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    let trimmed = line.trim();
                    if !trimmed.is_empty() {
                        warn!(agent = %agent, stderr = %trimmed, "Claude stderr");
                    }
                }
            });
        }

        Ok(fragment_stream(stdout, CliProcess::new(child)))
    }
}

/// The running CLI. Dropping it kills the CLI's whole process group.
struct CliProcess {
    child: Child,
    pgid: Option<Pid>,
}

impl CliProcess {
    fn new(child: Child) -> Self {
        let pgid = child.id().map(|pid| Pid::from_raw(pid as i32));
        Self { child, pgid }
    }
}

impl Drop for CliProcess {
    fn drop(&mut self) {
        let Some(pgid) = self.pgid else {
            return;
        };
        match killpg(pgid, Signal::SIGKILL) {
            Ok(()) | Err(Errno::ESRCH) => {}
            Err(e) => debug!(%pgid, error = %e, "Failed to kill Claude process group"),
        }
    }
}

/// Turn the CLI's stdout into fragments. The stream ends with an error if the
/// CLI exits non-zero.
fn fragment_stream(stdout: ChildStdout, process: CliProcess) -> FragmentStream {
    let lines = BufReader::new(stdout).lines();

    futures::stream::unfold(Some((lines, process)), |state| async move {
        let (mut lines, mut process) = state?;
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => {
                    let trimmed = line.trim();
                    if trimmed.is_empty() {
                        continue;
                    }
                    return match parse_line(trimmed) {
                        Ok(fragment) => Some((Ok(fragment), Some((lines, process)))),
                        Err(e) => Some((Err(e), None)),
                    };
                }
                Ok(None) => {
                    return match process.child.wait().await {
                        Ok(status) if status.success() => None,
                        Ok(status) => Some((
                            Err(SubmitError::Backend(format!("claude exited with {status}"))),
                            None,
                        )),
                        Err(e) => Some((Err(SubmitError::Io(e)), None)),
                    };
                }
                Err(e) => return Some((Err(SubmitError::Io(e)), None)),
            }
        }
    })
    .boxed()
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum StreamLine {
    Assistant {
        message: AssistantMessage,
    },
    Result {
        #[serde(default)]
        is_error: Option<bool>,
        #[serde(default)]
        result: Option<serde_json::Value>,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct AssistantMessage {
    #[serde(default)]
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentBlock {
    Text { text: String },
    #[serde(other)]
    Other,
}

/// Classify one stdout line. Unparseable lines are skipped as `Other`.
fn parse_line(line: &str) -> Result<Fragment, SubmitError> {
    let message = match serde_json::from_str::<StreamLine>(line) {
        Ok(message) => message,
        Err(e) => {
            let preview: String = line.chars().take(200).collect();
            debug!(error = %e, preview = %preview, "Skipping unrecognized Claude output");
            return Ok(Fragment::Other);
        }
    };

    match message {
        StreamLine::Assistant { message } => {
            let text: String = message
                .content
                .into_iter()
                .filter_map(|block| match block {
                    ContentBlock::Text { text } => Some(text),
                    ContentBlock::Other => None,
                })
                .collect();
            if text.is_empty() {
                Ok(Fragment::Other)
            } else {
                Ok(Fragment::Text(text))
            }
        }
        StreamLine::Result {
            is_error: Some(true),
            result,
        } => {
            let detail = match result {
                Some(serde_json::Value::String(s)) => s,
                Some(other) => other.to_string(),
                None => "claude reported an error".to_string(),
            };
            Err(SubmitError::Backend(detail))
        }
        StreamLine::Result { .. } | StreamLine::Other => Ok(Fragment::Other),
    }
}
