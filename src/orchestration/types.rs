//! Type definitions shared by the supervisor, the task runner, the
//! orchestrator, and the result formatter.
//!
//! Everything here derives [`serde::Serialize`] so a whole run can be emitted
//! as JSON with `--json`.

use serde::Serialize;

/// Lifecycle state of one backend proxy process.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessState {
    /// Spawned; readiness not yet determined.
    Starting,
    /// The proxy port accepted a TCP connection.
    Ready,
    /// Spawn failed, the process exited early, or readiness timed out.
    Failed,
    /// Torn down. Terminal.
    Stopped,
}

/// How teardown finished for one process.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StopOutcome {
    /// No process was ever created.
    NotSpawned,
    /// The process had already exited on its own.
    AlreadyExited,
    /// Exited within the grace period after the interrupt signal.
    Graceful,
    /// Needed SIGKILL after the grace period.
    Forced,
    /// Termination could not be confirmed.
    Unconfirmed(String),
}

/// Read-only snapshot of a process handle.
#[derive(Clone, Debug, Serialize)]
pub struct ProcessInfo {
    pub name: String,
    pub port: u16,
    pub pid: Option<u32>,
    pub state: ProcessState,
    /// RFC 3339 timestamp of the spawn attempt.
    pub started_at: String,
    pub error: Option<String>,
    pub stop_outcome: Option<StopOutcome>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Success,
    Error,
}

/// Outcome for one enabled agent. Produced exactly once per agent.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct TaskResult {
    pub model: String,
    pub status: TaskStatus,
    pub result: Option<String>,
    pub error: Option<String>,
}

impl TaskResult {
    pub fn success(model: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            status: TaskStatus::Success,
            result: Some(text.into()),
            error: None,
        }
    }

    pub fn failure(model: impl Into<String>, error: impl ToString) -> Self {
        Self {
            model: model.into(),
            status: TaskStatus::Error,
            result: None,
            error: Some(error.to_string()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == TaskStatus::Success
    }
}

/// Counts for one run. `failed == not_ready + task_failed + interrupted`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Agents whose proxy never became ready.
    pub not_ready: usize,
    /// Ready agents whose query failed or timed out.
    pub task_failed: usize,
    /// Agents left unfinished by an interrupt.
    pub interrupted: usize,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    AllSucceeded,
    PartialSuccess,
    AllAgentsFailed,
    Interrupted,
}

impl RunStatus {
    /// 0 = all succeeded, 1 = all failed, 2 = partial success, 130 = interrupted.
    pub fn exit_code(self) -> u8 {
        match self {
            RunStatus::AllSucceeded => 0,
            RunStatus::AllAgentsFailed => 1,
            RunStatus::PartialSuccess => 2,
            RunStatus::Interrupted => 130,
        }
    }
}

/// Everything a caller gets back from one run.
#[derive(Clone, Debug, Serialize)]
pub struct RunReport {
    pub status: RunStatus,
    /// One entry per enabled agent, in configuration order.
    pub results: Vec<TaskResult>,
    pub summary: RunSummary,
    /// Process snapshots taken after teardown.
    pub processes: Vec<ProcessInfo>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn task_result_serializes_with_lowercase_status() {
        let json = serde_json::to_value(TaskResult::success("A", "hello")).unwrap();
        assert_eq!(json["model"], "A");
        assert_eq!(json["status"], "success");
        assert_eq!(json["result"], "hello");
        assert!(json["error"].is_null());

        let json = serde_json::to_value(TaskResult::failure("B", "timeout")).unwrap();
        assert_eq!(json["status"], "error");
        assert_eq!(json["error"], "timeout");
    }

    #[test]
    fn exit_codes_follow_run_status() {
        assert_eq!(RunStatus::AllSucceeded.exit_code(), 0);
        assert_eq!(RunStatus::AllAgentsFailed.exit_code(), 1);
        assert_eq!(RunStatus::PartialSuccess.exit_code(), 2);
        assert_eq!(RunStatus::Interrupted.exit_code(), 130);
    }
}
