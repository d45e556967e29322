use super::defaults::*;
use super::schema::{AppConfig, ClientConfig, PartialConfig};
use std::path::PathBuf;
use std::time::Duration;

impl PartialConfig {
    /// Merge self with a lower-priority fallback.
    /// Self's non-None values take precedence. Lists use REPLACE semantics.
    pub fn with_fallback(self, fallback: PartialConfig) -> PartialConfig {
        PartialConfig {
            cwd: self.cwd.or(fallback.cwd),
            agents_file: self.agents_file.or(fallback.agents_file),
            proxy_command: self.proxy_command.or(fallback.proxy_command),
            host: self.host.or(fallback.host),
            readiness_timeout_secs: self
                .readiness_timeout_secs
                .or(fallback.readiness_timeout_secs),
            poll_interval_ms: self.poll_interval_ms.or(fallback.poll_interval_ms),
            probe_timeout_ms: self.probe_timeout_ms.or(fallback.probe_timeout_ms),
            task_timeout_secs: self.task_timeout_secs.or(fallback.task_timeout_secs),
            stop_grace_secs: self.stop_grace_secs.or(fallback.stop_grace_secs),
            client_kind: self.client_kind.or(fallback.client_kind),
            claude_path: self.claude_path.or(fallback.claude_path),
            client_model: self.client_model.or(fallback.client_model),
            permission_mode: self.permission_mode.or(fallback.permission_mode),
            allowed_tools: self.allowed_tools.or(fallback.allowed_tools),
            api_key: self.api_key.or(fallback.api_key),
        }
    }

    /// Convert to AppConfig, filling any remaining gaps with defaults.
    /// A relative agents file is resolved against the working directory.
    pub fn finalize(self) -> AppConfig {
        let cwd = self.cwd.unwrap_or_else(|| PathBuf::from("."));
        let agents_file = self
            .agents_file
            .unwrap_or_else(|| PathBuf::from(DEFAULT_AGENTS_FILE));
        let agents_file = if agents_file.is_absolute() {
            agents_file
        } else {
            cwd.join(agents_file)
        };

        AppConfig {
            cwd,
            agents_file,
            proxy_command: self
                .proxy_command
                .unwrap_or_else(|| vec![DEFAULT_PROXY_PROGRAM.to_string()]),
            host: self.host.unwrap_or_else(|| DEFAULT_HOST.to_string()),
            readiness_timeout: Duration::from_secs(
                self.readiness_timeout_secs
                    .unwrap_or(DEFAULT_READINESS_TIMEOUT_SECS),
            ),
            poll_interval: Duration::from_millis(
                self.poll_interval_ms.unwrap_or(DEFAULT_POLL_INTERVAL_MS),
            ),
            probe_timeout: Duration::from_millis(
                self.probe_timeout_ms.unwrap_or(DEFAULT_PROBE_TIMEOUT_MS),
            ),
            task_timeout: Duration::from_secs(
                self.task_timeout_secs.unwrap_or(DEFAULT_TASK_TIMEOUT_SECS),
            ),
            stop_grace: Duration::from_secs(self.stop_grace_secs.unwrap_or(DEFAULT_STOP_GRACE_SECS)),
            client: ClientConfig {
                kind: self.client_kind.unwrap_or_default(),
                claude_path: self
                    .claude_path
                    .unwrap_or_else(|| DEFAULT_CLAUDE_PATH.to_string()),
                model: self
                    .client_model
                    .unwrap_or_else(|| DEFAULT_CLIENT_MODEL.to_string()),
                permission_mode: self
                    .permission_mode
                    .unwrap_or_else(|| DEFAULT_PERMISSION_MODE.to_string()),
                allowed_tools: self.allowed_tools.unwrap_or_else(default_allowed_tools),
                api_key: self.api_key.unwrap_or_else(|| DEFAULT_API_KEY.to_string()),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ClientKind;

    #[test]
    fn higher_priority_values_win() {
        let cli = PartialConfig {
            task_timeout_secs: Some(10),
            ..Default::default()
        };
        let file = PartialConfig {
            task_timeout_secs: Some(99),
            readiness_timeout_secs: Some(7),
            ..Default::default()
        };

        let merged = cli.with_fallback(file).finalize();
        assert_eq!(merged.task_timeout, Duration::from_secs(10));
        assert_eq!(merged.readiness_timeout, Duration::from_secs(7));
    }

    #[test]
    fn finalize_fills_defaults() {
        let config = PartialConfig::default().finalize();
        assert_eq!(config.proxy_command, vec!["ccc".to_string()]);
        assert_eq!(config.host, "localhost");
        assert_eq!(config.readiness_timeout, Duration::from_secs(30));
        assert_eq!(config.poll_interval, Duration::from_millis(500));
        assert_eq!(config.task_timeout, Duration::from_secs(500));
        assert_eq!(config.stop_grace, Duration::from_secs(5));
        assert_eq!(config.client.kind, ClientKind::ClaudeCli);
        assert_eq!(config.client.allowed_tools.len(), 7);
        assert_eq!(config.agents_file, PathBuf::from("./agents_config.json"));
    }

    #[test]
    fn relative_agents_file_resolves_against_cwd() {
        let config = PartialConfig {
            cwd: Some(PathBuf::from("/work")),
            agents_file: Some(PathBuf::from("roster.json")),
            ..Default::default()
        }
        .finalize();
        assert_eq!(config.agents_file, PathBuf::from("/work/roster.json"));

        let config = PartialConfig {
            cwd: Some(PathBuf::from("/work")),
            agents_file: Some(PathBuf::from("/etc/mca/roster.json")),
            ..Default::default()
        }
        .finalize();
        assert_eq!(config.agents_file, PathBuf::from("/etc/mca/roster.json"));
    }

    #[test]
    fn proxy_command_is_replaced_not_appended() {
        let high = PartialConfig {
            proxy_command: Some(vec!["npx".into(), "ccc".into()]),
            ..Default::default()
        };
        let low = PartialConfig {
            proxy_command: Some(vec!["other".into()]),
            ..Default::default()
        };
        let merged = high.with_fallback(low).finalize();
        assert_eq!(merged.proxy_command, vec!["npx", "ccc"]);
    }
}
