//! Multi-agent run orchestration.
//!
//! [`supervisor::ProcessSupervisor`] brings the per-agent proxies up and down,
//! [`runner::AgentTaskRunner`] asks one ready agent one question, and
//! [`orchestrator::Orchestrator`] drives a whole run across both. Shared
//! result and state types live in [`types`].

pub mod orchestrator;
pub mod probe;
pub mod runner;
pub mod supervisor;
pub mod types;

pub use orchestrator::Orchestrator;
pub use runner::AgentTaskRunner;
pub use supervisor::{proxy_args, ProcessHandle, ProcessSupervisor, SupervisorSettings};
pub use types::*;
