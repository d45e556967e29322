pub mod agents;
pub mod defaults;
pub mod merge;
pub mod schema;

pub use agents::{create_default_config, enabled_agents, load_agents, AgentConfig};
pub use schema::*;

use crate::cli::AnalyzeArgs;
use anyhow::Context;
use defaults::SETTINGS_FILE;
use std::path::{Path, PathBuf};

/// Load settings by merging global, working-directory, explicit, and CLI sources.
/// Precedence: CLI > --config file > working-directory mca.toml > global mca.toml > defaults.
///
/// Missing settings files are handled gracefully (defaults apply). An explicit
/// `--config` path that cannot be read or parsed is an error.
pub fn load_config(args: &AnalyzeArgs) -> anyhow::Result<AppConfig> {
    let cwd = resolve_cwd(args.cwd.as_deref())?;

    // Layer 1: Global settings (~/.config/mca/mca.toml or platform equivalent)
    let global = load_global_config();

    // Layer 2: Working-directory settings (cwd/mca.toml)
    let local = load_toml_file(&cwd.join(SETTINGS_FILE)).unwrap_or_default();

    // Layer 3: Explicit settings file
    let explicit = match &args.config {
        Some(path) => load_explicit_file(path)?,
        None => PartialConfig::default(),
    };

    // Layer 4: CLI args
    let cli_partial = cli_to_partial(args, cwd);

    let config = cli_partial
        .with_fallback(explicit)
        .with_fallback(local)
        .with_fallback(global)
        .finalize();

    Ok(config)
}

fn resolve_cwd(cwd: Option<&Path>) -> anyhow::Result<PathBuf> {
    let cwd = match cwd {
        Some(p) => p.to_path_buf(),
        None => std::env::current_dir().context("Failed to read current directory")?,
    };
    std::fs::canonicalize(&cwd)
        .with_context(|| format!("Working directory {} is not accessible", cwd.display()))
}

/// Load global settings from the platform-specific config directory.
fn load_global_config() -> PartialConfig {
    match global_config_path() {
        Some(p) => load_toml_file(&p).unwrap_or_default(),
        None => {
            tracing::debug!("Could not determine global config directory");
            PartialConfig::default()
        }
    }
}

fn load_explicit_file(path: &Path) -> anyhow::Result<PartialConfig> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let file = toml::from_str::<ConfigFile>(&contents)
        .with_context(|| format!("Failed to parse {}", path.display()))?;
    tracing::info!("Loaded settings from {}", path.display());
    Ok(file.to_partial())
}

/// Load and parse a TOML settings file into a PartialConfig.
/// Returns None on file-not-found; parse errors are logged and skipped.
fn load_toml_file(path: &Path) -> Option<PartialConfig> {
    match std::fs::read_to_string(path) {
        Ok(contents) => match toml::from_str::<ConfigFile>(&contents)
            .context(format!("Failed to parse {}", path.display()))
        {
            Ok(config_file) => {
                tracing::info!("Loaded settings from {}", path.display());
                Some(config_file.to_partial())
            }
            Err(e) => {
                tracing::warn!("Settings parse error: {:#}", e);
                None
            }
        },
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!("No settings file at {}, using defaults", path.display());
            None
        }
        Err(e) => {
            tracing::warn!("Failed to read settings at {}: {}", path.display(), e);
            None
        }
    }
}

/// Linux: ~/.config/mca/mca.toml
/// macOS: ~/Library/Application Support/mca/mca.toml
fn global_config_path() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", "mca").map(|dirs| dirs.config_dir().join(SETTINGS_FILE))
}

fn cli_to_partial(args: &AnalyzeArgs, cwd: PathBuf) -> PartialConfig {
    PartialConfig {
        cwd: Some(cwd),
        agents_file: args.agents.clone(),
        proxy_command: args
            .proxy_command
            .as_deref()
            .map(|c| c.split_whitespace().map(String::from).collect::<Vec<_>>())
            .filter(|c| !c.is_empty()),
        readiness_timeout_secs: args.readiness_timeout,
        task_timeout_secs: args.task_timeout,
        ..Default::default()
    }
}
