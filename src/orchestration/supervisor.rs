//! Backend proxy supervisor.
//!
//! [`ProcessSupervisor`] owns the full lifecycle of the per-agent proxy
//! processes for one run: spawn, readiness polling, and teardown. The handles
//! it creates are returned to the caller as an explicitly owned collection and
//! handed back to [`ProcessSupervisor::stop_all`]; there is no global process
//! table.
//!
//! Each spawned proxy:
//! - Runs in its own process group (`process_group(0)`) so the whole group can be signalled
//! - Has stdio discarded so it cannot interleave with result output
//! - Has `kill_on_drop(true)`, and its handle kills the whole group on drop,
//!   as a safety net for unwinding paths
//!
//! Readiness is a TCP connect against the agent's port, repeated at a fixed
//! interval until it succeeds, the process exits, or the readiness timeout
//! elapses. Every wait is bounded.

use std::process::Stdio;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use futures::future::join_all;
use nix::errno::Errno;
use nix::sys::signal::{killpg, Signal};
use nix::unistd::Pid;
use tokio::process::{Child, Command};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::probe;
use super::types::{ProcessInfo, ProcessState, StopOutcome};
use crate::config::{AgentConfig, AppConfig};
use crate::error::LaunchError;

/// How long to wait for the kernel to reap a process after SIGKILL.
const KILL_CONFIRM_TIMEOUT: Duration = Duration::from_secs(2);

/// Per-agent proxy arguments.
///
/// The agent name is passed as all three model tiers, followed by the port and
/// the non-interactive flag. The proxy binary depends on this exact shape.
pub fn proxy_args(config: &AgentConfig) -> Vec<String> {
    let name = &config.name;
    vec![
        format!("BIG_MODEL={name}"),
        format!("MIDDLE_MODEL={name}"),
        format!("SMALL_MODEL={name}"),
        format!("PORT={}", config.port),
        "-auto".to_string(),
    ]
}

/// Knobs for spawning, probing, and stopping proxies.
#[derive(Debug, Clone)]
pub struct SupervisorSettings {
    /// Program plus leading arguments. [`proxy_args`] are appended.
    pub command: Vec<String>,
    pub host: String,
    pub poll_interval: Duration,
    pub probe_timeout: Duration,
    pub stop_grace: Duration,
}

impl SupervisorSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            command: config.proxy_command.clone(),
            host: config.host.clone(),
            poll_interval: config.poll_interval,
            probe_timeout: config.probe_timeout,
            stop_grace: config.stop_grace,
        }
    }
}

/// One spawned (or attempted) proxy process.
///
/// Only the supervisor mutates a handle; everyone else reads through the
/// accessors or takes a [`ProcessInfo`] snapshot.
#[derive(Debug)]
pub struct ProcessHandle {
    config: AgentConfig,
    state: ProcessState,
    child: Option<Child>,
    pid: Option<u32>,
    started_at: DateTime<Utc>,
    error: Option<LaunchError>,
    stop_outcome: Option<StopOutcome>,
}

impl ProcessHandle {
    fn new(config: &AgentConfig) -> Self {
        Self {
            config: config.clone(),
            state: ProcessState::Starting,
            child: None,
            pid: None,
            started_at: Utc::now(),
            error: None,
            stop_outcome: None,
        }
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    pub fn state(&self) -> ProcessState {
        self.state
    }

    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    pub fn error(&self) -> Option<&LaunchError> {
        self.error.as_ref()
    }

    pub fn stop_outcome(&self) -> Option<&StopOutcome> {
        self.stop_outcome.as_ref()
    }

    pub fn is_ready(&self) -> bool {
        self.state == ProcessState::Ready
    }

    pub fn info(&self) -> ProcessInfo {
        ProcessInfo {
            name: self.config.name.clone(),
            port: self.config.port,
            pid: self.pid,
            state: self.state,
            started_at: self.started_at.to_rfc3339(),
            error: self.error.as_ref().map(ToString::to_string),
            stop_outcome: self.stop_outcome.clone(),
        }
    }

    fn fail(&mut self, error: LaunchError) {
        error!(agent = %self.config.name, port = self.config.port, error = %error, "Proxy failed to start");
        self.state = ProcessState::Failed;
        self.error = Some(error);
    }
}

/// Handles dropped without going through [`ProcessSupervisor::stop_all`]
/// (a dropped run future, a panic) still take their whole process group down.
/// `kill_on_drop` alone only reaches the leader.
impl Drop for ProcessHandle {
    fn drop(&mut self) {
        if self.state == ProcessState::Stopped {
            return;
        }
        if let Some(pid) = self.pid {
            let _ = killpg(Pid::from_raw(pid as i32), Signal::SIGKILL);
        }
    }
}

/// Spawns, health-checks, and terminates proxy processes.
#[derive(Debug, Clone)]
pub struct ProcessSupervisor {
    settings: SupervisorSettings,
}

impl ProcessSupervisor {
    pub fn new(settings: SupervisorSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &SupervisorSettings {
        &self.settings
    }

    /// Spawn a proxy for every enabled config and wait, concurrently, until
    /// each one is Ready or Failed.
    ///
    /// Handles come back in config order. If `cancel` fires, polling is
    /// abandoned and unresolved handles stay `Starting`; they still hold their
    /// child process, so [`stop_all`](Self::stop_all) tears them down.
    pub async fn start_all(
        &self,
        configs: &[AgentConfig],
        readiness_timeout: Duration,
        cancel: &CancellationToken,
    ) -> Vec<ProcessHandle> {
        let mut handles: Vec<ProcessHandle> = configs
            .iter()
            .filter(|c| c.enabled)
            .map(|c| self.spawn(c))
            .collect();

        info!(
            spawned = handles.iter().filter(|h| h.child.is_some()).count(),
            total = handles.len(),
            timeout_secs = readiness_timeout.as_secs_f64(),
            "Waiting for proxies to accept connections"
        );

        join_all(
            handles
                .iter_mut()
                .filter(|h| h.state == ProcessState::Starting)
                .map(|h| self.await_ready(h, readiness_timeout, cancel)),
        )
        .await;

        handles
    }

    /// Stop every handle not already `Stopped`.
    ///
    /// Sends SIGINT to each process group, waits up to the grace period, then
    /// SIGKILLs whatever is left. Never fails: problems are logged. Calling it
    /// again on stopped handles does nothing.
    pub async fn stop_all(&self, handles: &mut [ProcessHandle]) {
        let pending = handles
            .iter()
            .filter(|h| h.state != ProcessState::Stopped)
            .count();
        if pending == 0 {
            debug!("No proxies left to stop");
            return;
        }

        info!(pending, "Stopping proxies");
        join_all(
            handles
                .iter_mut()
                .filter(|h| h.state != ProcessState::Stopped)
                .map(|h| self.stop(h)),
        )
        .await;
        info!("All proxies stopped");
    }

    fn spawn(&self, config: &AgentConfig) -> ProcessHandle {
        let mut handle = ProcessHandle::new(config);

        let Some((program, leading)) = self.settings.command.split_first() else {
            handle.fail(LaunchError::NotFound {
                program: String::new(),
            });
            return handle;
        };
        let args = proxy_args(config);

        info!(
            agent = %config.name,
            port = config.port,
            command = %format!("{} {}", self.settings.command.join(" "), args.join(" ")),
            "Launching proxy"
        );

        let spawned = Command::new(program)
            .args(leading)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .process_group(0)
            .kill_on_drop(true)
            .spawn();

        match spawned {
            Ok(child) => {
                handle.pid = child.id();
                debug!(agent = %config.name, pid = ?handle.pid, "Proxy spawned");
                handle.child = Some(child);
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                handle.fail(LaunchError::NotFound {
                    program: program.clone(),
                });
            }
            Err(source) => {
                handle.fail(LaunchError::SpawnFailed {
                    program: program.clone(),
                    source,
                });
            }
        }

        handle
    }

    async fn await_ready(
        &self,
        handle: &mut ProcessHandle,
        timeout: Duration,
        cancel: &CancellationToken,
    ) {
        let Some(child) = handle.child.as_mut() else {
            return;
        };
        let port = handle.config.port;
        let started = Instant::now();

        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            polled = tokio::time::timeout(timeout, self.poll_until_ready(child, port)) => Some(polled),
        };

        match outcome {
            None => debug!(agent = %handle.config.name, "Readiness check abandoned"),
            Some(Ok(Ok(()))) => {
                handle.state = ProcessState::Ready;
                info!(
                    agent = %handle.config.name,
                    port,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Proxy ready"
                );
            }
            Some(Ok(Err(e))) => handle.fail(e),
            Some(Err(_)) => handle.fail(LaunchError::ReadinessTimeout { after: timeout }),
        }
    }

    /// Poll until the port accepts a connection or the process exits.
    /// Unbounded on its own; callers wrap it in a timeout.
    async fn poll_until_ready(&self, child: &mut Child, port: u16) -> Result<(), LaunchError> {
        loop {
            match child.try_wait() {
                Ok(Some(status)) => {
                    return Err(LaunchError::ExitedEarly {
                        status: status.to_string(),
                    });
                }
                Ok(None) => {}
                Err(e) => warn!(port, error = %e, "Failed to poll proxy process status"),
            }

            if probe::is_listening(&self.settings.host, port, self.settings.probe_timeout).await {
                return Ok(());
            }

            tokio::time::sleep(self.settings.poll_interval).await;
        }
    }

    async fn stop(&self, handle: &mut ProcessHandle) {
        let outcome = match (handle.child.as_mut(), handle.pid) {
            (Some(child), Some(pid)) => {
                terminate(child, pid, &handle.config.name, self.settings.stop_grace).await
            }
            (Some(_), None) => StopOutcome::AlreadyExited,
            (None, _) => StopOutcome::NotSpawned,
        };

        match &outcome {
            StopOutcome::Unconfirmed(reason) => {
                warn!(agent = %handle.config.name, reason = %reason, "Could not confirm proxy exit")
            }
            other => debug!(agent = %handle.config.name, outcome = ?other, "Proxy stopped"),
        }

        // Dropping the child also fires kill_on_drop for anything still alive.
        handle.child = None;
        handle.state = ProcessState::Stopped;
        handle.stop_outcome = Some(outcome);
    }
}

/// Interrupt the process group, then force-kill it after `grace`.
///
/// `pid` is the leader's pid saved at spawn, which is also the group id. The
/// group is swept with SIGKILL afterwards whatever happened to the leader, so
/// helpers it forked cannot outlive the run.
async fn terminate(child: &mut Child, pid: u32, name: &str, grace: Duration) -> StopOutcome {
    let pgid = Pid::from_raw(pid as i32);
    let outcome = interrupt_then_kill(child, pgid, name, grace).await;
    sweep_group(pgid, name);
    outcome
}

async fn interrupt_then_kill(
    child: &mut Child,
    pgid: Pid,
    name: &str,
    grace: Duration,
) -> StopOutcome {
    match child.try_wait() {
        Ok(Some(_)) => return StopOutcome::AlreadyExited,
        Ok(None) => {}
        Err(e) => warn!(agent = %name, error = %e, "Failed to poll proxy process status"),
    }

    if let Err(e) = killpg(pgid, Signal::SIGINT) {
        debug!(agent = %name, %pgid, error = %e, "SIGINT to process group failed");
    }

    match tokio::time::timeout(grace, child.wait()).await {
        Ok(Ok(_)) => StopOutcome::Graceful,
        Ok(Err(e)) => StopOutcome::Unconfirmed(format!("wait failed: {e}")),
        Err(_) => {
            warn!(agent = %name, %pgid, grace_secs = grace.as_secs_f64(), "Proxy ignored interrupt, killing");
            if let Err(e) = killpg(pgid, Signal::SIGKILL) {
                debug!(agent = %name, %pgid, error = %e, "SIGKILL to process group failed");
            }
            // Reap the child to prevent zombies.
            match tokio::time::timeout(KILL_CONFIRM_TIMEOUT, child.wait()).await {
                Ok(Ok(_)) => StopOutcome::Forced,
                Ok(Err(e)) => StopOutcome::Unconfirmed(format!("wait failed: {e}")),
                Err(_) => StopOutcome::Unconfirmed("process still running after SIGKILL".into()),
            }
        }
    }
}

/// SIGKILL whatever is left in the group. ESRCH means it is already empty.
fn sweep_group(pgid: Pid, name: &str) {
    match killpg(pgid, Signal::SIGKILL) {
        Ok(()) => debug!(agent = %name, %pgid, "Killed leftover processes in proxy group"),
        Err(Errno::ESRCH) => {}
        Err(e) => warn!(agent = %name, %pgid, error = %e, "Failed to sweep proxy process group"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn proxy_args_repeat_name_for_every_tier() {
        let args = proxy_args(&AgentConfig::new("cortex-15", 4902, "prompt"));
        assert_eq!(
            args,
            vec![
                "BIG_MODEL=cortex-15",
                "MIDDLE_MODEL=cortex-15",
                "SMALL_MODEL=cortex-15",
                "PORT=4902",
                "-auto",
            ]
        );
    }

    #[test]
    fn settings_come_from_app_config() {
        let config = crate::config::PartialConfig {
            proxy_command: Some(vec!["npx".into(), "ccc".into()]),
            poll_interval_ms: Some(250),
            ..Default::default()
        }
        .finalize();
        let settings = SupervisorSettings::from_config(&config);
        assert_eq!(settings.command, vec!["npx", "ccc"]);
        assert_eq!(settings.poll_interval, Duration::from_millis(250));
        assert_eq!(settings.stop_grace, Duration::from_secs(5));
    }
}
