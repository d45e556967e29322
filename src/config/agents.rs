//! Agent roster file (`agents_config.json`).
//!
//! The roster lists every backend agent: its model name, the local port its
//! proxy listens on, and the system prompt the agent is run with.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::defaults::{default_agents, DEFAULT_SYSTEM_PROMPT};
use crate::error::ConfigError;

/// One configured agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Model identity; handed to the proxy and used to label results.
    pub name: String,
    pub port: u16,
    #[serde(default)]
    pub system_prompt: String,
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
}

fn enabled_by_default() -> bool {
    true
}

impl AgentConfig {
    pub fn new(name: impl Into<String>, port: u16, system_prompt: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            port,
            system_prompt: system_prompt.into(),
            enabled: true,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct AgentsFile {
    agents: Vec<AgentConfig>,
}

/// Load and validate the roster at `path`.
pub fn load_agents(path: &Path) -> Result<Vec<AgentConfig>, ConfigError> {
    let contents = match std::fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(ConfigError::NotFound {
                path: path.to_path_buf(),
            });
        }
        Err(e) => return Err(e.into()),
    };

    let file: AgentsFile =
        serde_json::from_str(&contents).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

    validate_agents(&file.agents)?;
    tracing::info!(path = %path.display(), agents = file.agents.len(), "Loaded agent roster");
    Ok(file.agents)
}

/// Check the roster for empty names, port 0, and collisions among enabled agents.
pub fn validate_agents(agents: &[AgentConfig]) -> Result<(), ConfigError> {
    if agents.is_empty() {
        return Err(ConfigError::Invalid("the roster lists no agents".to_string()));
    }

    let mut names = HashSet::new();
    let mut ports = HashSet::new();

    for (i, agent) in agents.iter().enumerate() {
        if agent.name.trim().is_empty() {
            return Err(ConfigError::Invalid(format!("agent #{i} has an empty name")));
        }
        if agent.port == 0 {
            return Err(ConfigError::Invalid(format!(
                "agent #{i} ({}) has port 0",
                agent.name
            )));
        }
        if !agent.enabled {
            continue;
        }
        if !names.insert(agent.name.as_str()) {
            return Err(ConfigError::Invalid(format!(
                "duplicate agent name `{}`",
                agent.name
            )));
        }
        if !ports.insert(agent.port) {
            return Err(ConfigError::Invalid(format!(
                "port {} is used by more than one enabled agent",
                agent.port
            )));
        }
    }

    Ok(())
}

/// Only enabled agents take part in a run.
pub fn enabled_agents(agents: &[AgentConfig]) -> Vec<AgentConfig> {
    agents.iter().filter(|a| a.enabled).cloned().collect()
}

/// Write the default roster. `output` may be a file or a directory.
pub fn create_default_config(output: Option<&Path>, force: bool) -> Result<PathBuf, ConfigError> {
    let path = match output {
        Some(p) if p.is_dir() => p.join(super::defaults::DEFAULT_AGENTS_FILE),
        Some(p) => p.to_path_buf(),
        None => std::env::current_dir()?.join(super::defaults::DEFAULT_AGENTS_FILE),
    };

    if path.exists() && !force {
        return Err(ConfigError::AlreadyExists { path });
    }

    let file = AgentsFile {
        agents: default_agents()
            .into_iter()
            .map(|(name, port)| AgentConfig::new(name, port, DEFAULT_SYSTEM_PROMPT))
            .collect(),
    };
    let json = serde_json::to_string_pretty(&file).map_err(|e| ConfigError::ParseError {
        path: path.clone(),
        message: e.to_string(),
    })?;
    std::fs::write(&path, json + "\n")?;

    Ok(path)
}
