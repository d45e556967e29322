//! End-to-end run coordination.
//!
//! A run moves through `Starting -> Dispatching -> Aggregating -> Stopping`.
//! Teardown is not optional: once [`ProcessSupervisor::start_all`] has
//! returned handles, [`ProcessSupervisor::stop_all`] runs before `execute`
//! returns, whether the run completed, failed, or was cancelled. Nothing in
//! between returns early, and task panics come back as `JoinError`s rather than
//! unwinding through here. `kill_on_drop` on every child covers the rest.

use std::time::Duration;

use futures::future::join_all;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, info_span, warn, Instrument};
use uuid::Uuid;

use super::runner::AgentTaskRunner;
use super::supervisor::{ProcessHandle, ProcessSupervisor};
use super::types::{ProcessState, RunReport, RunStatus, RunSummary, TaskResult};
use crate::config::{enabled_agents, AgentConfig};
use crate::error::{RunError, TaskError};
use crate::submit::endpoint_for;

const INTERRUPTED: &str = "interrupted before completion";

/// Runs one question across every enabled agent, from proxy startup to teardown.
pub struct Orchestrator {
    supervisor: ProcessSupervisor,
    runner: AgentTaskRunner,
}

/// What the dispatch phase produced, slot per enabled agent.
struct Dispatch {
    slots: Vec<Option<TaskResult>>,
    not_ready: usize,
    dispatched: Vec<usize>,
    interrupted: bool,
}

impl Orchestrator {
    pub fn new(supervisor: ProcessSupervisor, runner: AgentTaskRunner) -> Self {
        Self { supervisor, runner }
    }

    /// Bring up a proxy per enabled agent, ask every ready agent `query`
    /// concurrently, and tear everything down.
    ///
    /// Results follow config order. Cancelling `cancel` skips straight to
    /// teardown; unfinished agents are reported as interrupted.
    pub async fn execute(
        &self,
        configs: &[AgentConfig],
        query: &str,
        readiness_timeout: Duration,
        task_timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<RunReport, RunError> {
        let enabled = enabled_agents(configs);
        if enabled.is_empty() {
            return Err(RunError::NoEnabledAgents);
        }

        let run_id = Uuid::new_v4();
        let span = info_span!("run", %run_id);

        async move {
            info!(agents = enabled.len(), "Run starting");

            // Starting
            let mut handles = self
                .supervisor
                .start_all(&enabled, readiness_timeout, cancel)
                .await;

            // Dispatching
            let dispatch = self.dispatch(&handles, query, task_timeout, cancel).await;

            // Stopping
            self.supervisor.stop_all(&mut handles).await;

            // Aggregating
            let report = aggregate(&enabled, &handles, dispatch);
            info!(
                status = ?report.status,
                succeeded = report.summary.succeeded,
                failed = report.summary.failed,
                "Run finished"
            );
            Ok(report)
        }
        .instrument(span)
        .await
    }

    async fn dispatch(
        &self,
        handles: &[ProcessHandle],
        query: &str,
        task_timeout: Duration,
        cancel: &CancellationToken,
    ) -> Dispatch {
        let mut slots: Vec<Option<TaskResult>> = vec![None; handles.len()];
        let mut not_ready = 0;
        let mut dispatched = Vec::new();
        let mut tasks: Vec<JoinHandle<TaskResult>> = Vec::new();

        for (i, handle) in handles.iter().enumerate() {
            let config = handle.config();
            match handle.state() {
                // Unresolved or ready-but-cancelled slots stay empty.
                ProcessState::Starting => {}
                ProcessState::Ready if cancel.is_cancelled() => {}
                ProcessState::Ready => {
                    let runner = self.runner.clone();
                    let config = config.clone();
                    let endpoint = endpoint_for(&self.supervisor.settings().host, config.port);
                    let query = query.to_string();
                    tasks.push(tokio::spawn(
                        async move { runner.run(&config, &endpoint, &query, task_timeout).await }
                            .in_current_span(),
                    ));
                    dispatched.push(i);
                }
                ProcessState::Failed | ProcessState::Stopped => {
                    let reason = handle
                        .error()
                        .map(ToString::to_string)
                        .unwrap_or_else(|| "proxy not ready".to_string());
                    slots[i] = Some(TaskResult::failure(&config.name, reason));
                    not_ready += 1;
                }
            }
        }

        if cancel.is_cancelled() {
            warn!("Interrupted during startup, skipping dispatch");
            return Dispatch {
                slots,
                not_ready,
                dispatched,
                interrupted: true,
            };
        }

        if tasks.is_empty() {
            warn!("No proxy became ready, nothing to dispatch");
            return Dispatch {
                slots,
                not_ready,
                dispatched,
                interrupted: false,
            };
        }

        info!(ready = tasks.len(), not_ready, "Dispatching query");

        let joined = tokio::select! {
            outcomes = join_all(tasks.iter_mut()) => Some(outcomes),
            _ = cancel.cancelled() => None,
        };
        let interrupted = joined.is_none();

        let outcomes = match joined {
            Some(outcomes) => outcomes,
            None => {
                warn!(in_flight = tasks.len(), "Interrupted, abandoning agent tasks");
                for task in &tasks {
                    task.abort();
                }
                // Tasks that finished before the abort still report normally.
                join_all(tasks).await
            }
        };

        for (i, outcome) in dispatched.iter().copied().zip(outcomes) {
            let name = &handles[i].config().name;
            match outcome {
                Ok(result) => slots[i] = Some(result),
                Err(e) if e.is_cancelled() => {}
                Err(e) => slots[i] = Some(TaskResult::failure(name, TaskError::Aborted(e.to_string()))),
            }
        }

        Dispatch {
            slots,
            not_ready,
            dispatched,
            interrupted,
        }
    }
}

fn aggregate(enabled: &[AgentConfig], handles: &[ProcessHandle], dispatch: Dispatch) -> RunReport {
    let Dispatch {
        slots,
        not_ready,
        dispatched,
        interrupted,
    } = dispatch;

    let task_failed = dispatched
        .iter()
        .filter(|&&i| matches!(&slots[i], Some(result) if !result.is_success()))
        .count();

    let mut missing = 0;
    let results: Vec<TaskResult> = slots
        .into_iter()
        .zip(enabled)
        .map(|(slot, config)| {
            slot.unwrap_or_else(|| {
                missing += 1;
                TaskResult::failure(&config.name, INTERRUPTED)
            })
        })
        .collect();

    let succeeded = results.iter().filter(|r| r.is_success()).count();

    let summary = RunSummary {
        total: results.len(),
        succeeded,
        failed: results.len() - succeeded,
        not_ready,
        task_failed,
        interrupted: missing,
    };

    let status = if interrupted {
        RunStatus::Interrupted
    } else if succeeded == 0 {
        RunStatus::AllAgentsFailed
    } else if succeeded == results.len() {
        RunStatus::AllSucceeded
    } else {
        RunStatus::PartialSuccess
    };

    RunReport {
        status,
        results,
        summary,
        processes: handles.iter().map(ProcessHandle::info).collect(),
    }
}
