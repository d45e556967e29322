use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// The TOML file structure for mca.toml.
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFile {
    pub general: Option<GeneralConfig>,
    pub timeouts: Option<TimeoutConfig>,
    pub client: Option<ClientSection>,
}

#[derive(Debug, Deserialize)]
pub struct GeneralConfig {
    pub agents_file: Option<String>,
    /// Program plus any leading arguments; the per-agent arguments are appended.
    pub proxy_command: Option<Vec<String>>,
    pub host: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct TimeoutConfig {
    pub readiness_secs: Option<u64>,
    pub poll_interval_ms: Option<u64>,
    pub probe_timeout_ms: Option<u64>,
    pub task_secs: Option<u64>,
    pub stop_grace_secs: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct ClientSection {
    pub kind: Option<ClientKind>,
    pub claude_path: Option<String>,
    pub model: Option<String>,
    pub permission_mode: Option<String>,
    pub allowed_tools: Option<Vec<String>>,
    pub api_key: Option<String>,
}

/// Which query submission backend talks to the proxies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum ClientKind {
    /// Drive the Claude Code CLI pointed at the agent's proxy.
    #[default]
    ClaudeCli,
    /// Stream a chat completion straight from the proxy.
    Api,
}

/// Fully-resolved client settings.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub kind: ClientKind,
    pub claude_path: String,
    pub model: String,
    pub permission_mode: String,
    pub allowed_tools: Vec<String>,
    pub api_key: String,
}

/// Fully-resolved runtime configuration. All fields have values.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub cwd: PathBuf,
    pub agents_file: PathBuf,
    pub proxy_command: Vec<String>,
    pub host: String,
    pub readiness_timeout: Duration,
    pub poll_interval: Duration,
    pub probe_timeout: Duration,
    pub task_timeout: Duration,
    pub stop_grace: Duration,
    pub client: ClientConfig,
}

/// Partial config used during merge. All fields are Option so that
/// missing fields don't override lower-priority values.
#[derive(Debug, Clone, Default)]
pub struct PartialConfig {
    pub cwd: Option<PathBuf>,
    pub agents_file: Option<PathBuf>,
    pub proxy_command: Option<Vec<String>>,
    pub host: Option<String>,
    pub readiness_timeout_secs: Option<u64>,
    pub poll_interval_ms: Option<u64>,
    pub probe_timeout_ms: Option<u64>,
    pub task_timeout_secs: Option<u64>,
    pub stop_grace_secs: Option<u64>,
    pub client_kind: Option<ClientKind>,
    pub claude_path: Option<String>,
    pub client_model: Option<String>,
    pub permission_mode: Option<String>,
    pub allowed_tools: Option<Vec<String>>,
    pub api_key: Option<String>,
}

impl ConfigFile {
    /// Flatten the sectioned file into a PartialConfig.
    pub fn to_partial(self) -> PartialConfig {
        let mut partial = PartialConfig::default();
        if let Some(general) = self.general {
            partial.agents_file = general.agents_file.map(PathBuf::from);
            partial.proxy_command = general.proxy_command.filter(|c| !c.is_empty());
            partial.host = general.host;
        }
        if let Some(timeouts) = self.timeouts {
            partial.readiness_timeout_secs = timeouts.readiness_secs;
            partial.poll_interval_ms = timeouts.poll_interval_ms;
            partial.probe_timeout_ms = timeouts.probe_timeout_ms;
            partial.task_timeout_secs = timeouts.task_secs;
            partial.stop_grace_secs = timeouts.stop_grace_secs;
        }
        if let Some(client) = self.client {
            partial.client_kind = client.kind;
            partial.claude_path = client.claude_path;
            partial.client_model = client.model;
            partial.permission_mode = client.permission_mode;
            partial.allowed_tools = client.allowed_tools;
            partial.api_key = client.api_key;
        }
        partial
    }
}
