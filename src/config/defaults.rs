/// Default roster filename, resolved against the working directory.
pub const DEFAULT_AGENTS_FILE: &str = "agents_config.json";

/// Settings filename looked up in the global config dir and the working directory.
pub const SETTINGS_FILE: &str = "mca.toml";

pub const DEFAULT_PROXY_PROGRAM: &str = "ccc";
pub const DEFAULT_HOST: &str = "localhost";

pub const DEFAULT_READINESS_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 500;
pub const DEFAULT_PROBE_TIMEOUT_MS: u64 = 1000;
pub const DEFAULT_TASK_TIMEOUT_SECS: u64 = 500;
pub const DEFAULT_STOP_GRACE_SECS: u64 = 5;

pub const DEFAULT_CLAUDE_PATH: &str = "claude";

/// The model name sent by the client. The proxy decides which model actually answers.
pub const DEFAULT_CLIENT_MODEL: &str = "claude-opus-4.5";
pub const DEFAULT_PERMISSION_MODE: &str = "acceptEdits";

/// Placeholder credential; the local proxies hold the real upstream keys.
pub const DEFAULT_API_KEY: &str = "mca-local-proxy";

pub const DEFAULT_SYSTEM_PROMPT: &str = "You are an expert analyst. Provide comprehensive and \
well-structured analysis with a focus on practical solutions.";

pub fn default_allowed_tools() -> Vec<String> {
    ["Bash", "Glob", "Grep", "Read", "Edit", "Write", "BashOutput"]
        .into_iter()
        .map(String::from)
        .collect()
}

/// Roster written by `mca init`.
pub fn default_agents() -> Vec<(&'static str, u16)> {
    vec![
        ("copilotcode-13", 4900),
        ("lyra-flash-6", 4901),
        ("cortex-15", 4902),
        ("cortex-12", 4903),
    ]
}
