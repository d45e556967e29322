use std::net::TcpListener;
use std::time::{Duration, Instant};

use mca::config::AgentConfig;
use mca::orchestration::{ProcessState, ProcessSupervisor, StopOutcome, SupervisorSettings};
use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use tokio_util::sync::CancellationToken;

mod common;
use common::group_gone;

// ─── Helpers ──────────────────────────────────────────────────────────

/// A proxy stand-in: `sh -c <script> proxy <proxy args...>`.
fn supervisor(script: &str, stop_grace: Duration) -> ProcessSupervisor {
    ProcessSupervisor::new(SupervisorSettings {
        command: vec!["sh".into(), "-c".into(), script.into(), "proxy".into()],
        host: "127.0.0.1".into(),
        poll_interval: Duration::from_millis(50),
        probe_timeout: Duration::from_millis(200),
        stop_grace,
    })
}

fn free_port() -> u16 {
    TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port()
}

/// Bind a port so the probe sees it as listening.
fn held_listener() -> (TcpListener, u16) {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    (listener, port)
}

fn is_gone(pid: u32) -> bool {
    kill(Pid::from_raw(pid as i32), None::<Signal>).is_err()
}

// ============================================================
// Startup
// ============================================================

#[tokio::test]
async fn test_missing_program_fails_without_spawning() {
    let sup = ProcessSupervisor::new(SupervisorSettings {
        command: vec!["/nonexistent/ccc-proxy".into()],
        ..supervisor("", Duration::from_secs(1)).settings().clone()
    });
    let configs = vec![AgentConfig::new("A", free_port(), "")];

    let mut handles = sup
        .start_all(&configs, Duration::from_secs(2), &CancellationToken::new())
        .await;

    assert_eq!(handles.len(), 1);
    assert_eq!(handles[0].state(), ProcessState::Failed);
    assert!(handles[0].pid().is_none());
    assert!(handles[0].error().unwrap().to_string().contains("not found"));

    sup.stop_all(&mut handles).await;
    assert_eq!(handles[0].state(), ProcessState::Stopped);
    assert_eq!(handles[0].stop_outcome(), Some(&StopOutcome::NotSpawned));
}

#[tokio::test]
async fn test_early_exit_reports_exit_status() {
    let sup = supervisor("sleep 300 & exit 3", Duration::from_secs(1));
    let configs = vec![AgentConfig::new("A", free_port(), "")];

    let mut handles = sup
        .start_all(&configs, Duration::from_secs(5), &CancellationToken::new())
        .await;

    assert_eq!(handles[0].state(), ProcessState::Failed);
    let error = handles[0].error().unwrap().to_string();
    assert!(error.contains("exit status"), "unexpected error: {error}");

    let pgid = handles[0].pid().unwrap();
    sup.stop_all(&mut handles).await;
    assert_eq!(handles[0].stop_outcome(), Some(&StopOutcome::AlreadyExited));
    // The backgrounded sleep outlived its launcher until the group sweep.
    assert!(group_gone(pgid).await);
}

#[tokio::test]
async fn test_readiness_timeout_on_silent_port() {
    let sup = supervisor("exec sleep 30", Duration::from_secs(2));
    let configs = vec![AgentConfig::new("A", free_port(), "")];

    let started = Instant::now();
    let mut handles = sup
        .start_all(&configs, Duration::from_millis(400), &CancellationToken::new())
        .await;
    assert!(started.elapsed() < Duration::from_secs(3));

    assert_eq!(handles[0].state(), ProcessState::Failed);
    assert_eq!(handles[0].error().unwrap().to_string(), "readiness timeout");

    let pid = handles[0].pid().unwrap();
    sup.stop_all(&mut handles).await;
    assert_eq!(handles[0].stop_outcome(), Some(&StopOutcome::Graceful));
    assert!(is_gone(pid));
    assert!(group_gone(pid).await);
}

#[tokio::test]
async fn test_listening_port_marks_ready() {
    let (_listener, port) = held_listener();
    let sup = supervisor("exec sleep 30", Duration::from_secs(2));
    let configs = vec![AgentConfig::new("A", port, "")];

    let mut handles = sup
        .start_all(&configs, Duration::from_secs(5), &CancellationToken::new())
        .await;

    assert!(handles[0].is_ready());
    assert!(handles[0].error().is_none());

    sup.stop_all(&mut handles).await;
    assert_eq!(handles[0].state(), ProcessState::Stopped);
}

#[tokio::test]
async fn test_disabled_configs_are_not_spawned() {
    let (_listener, port) = held_listener();
    let sup = supervisor("exec sleep 30", Duration::from_secs(2));
    let mut disabled = AgentConfig::new("off", free_port(), "");
    disabled.enabled = false;
    let configs = vec![disabled, AgentConfig::new("on", port, "")];

    let mut handles = sup
        .start_all(&configs, Duration::from_secs(5), &CancellationToken::new())
        .await;

    assert_eq!(handles.len(), 1);
    assert_eq!(handles[0].config().name, "on");
    sup.stop_all(&mut handles).await;
}

#[tokio::test]
async fn test_mixed_readiness_keeps_config_order() {
    let (_listener, ready_port) = held_listener();
    let sup = supervisor("exec sleep 30", Duration::from_secs(2));
    let configs = vec![
        AgentConfig::new("slow", free_port(), ""),
        AgentConfig::new("fast", ready_port, ""),
    ];

    let mut handles = sup
        .start_all(&configs, Duration::from_millis(500), &CancellationToken::new())
        .await;

    let names: Vec<_> = handles.iter().map(|h| h.config().name.as_str()).collect();
    assert_eq!(names, ["slow", "fast"]);
    assert_eq!(handles[0].state(), ProcessState::Failed);
    assert_eq!(handles[1].state(), ProcessState::Ready);

    sup.stop_all(&mut handles).await;
}

// ============================================================
// Cancellation
// ============================================================

#[tokio::test]
async fn test_cancel_during_startup_leaves_handles_starting() {
    let sup = supervisor("exec sleep 30", Duration::from_secs(2));
    let configs = vec![AgentConfig::new("A", free_port(), "")];
    let cancel = CancellationToken::new();

    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(200)).await;
        trigger.cancel();
    });

    let started = Instant::now();
    let mut handles = sup.start_all(&configs, Duration::from_secs(30), &cancel).await;
    assert!(started.elapsed() < Duration::from_secs(5));
    assert_eq!(handles[0].state(), ProcessState::Starting);

    let pid = handles[0].pid().unwrap();
    sup.stop_all(&mut handles).await;
    assert_eq!(handles[0].state(), ProcessState::Stopped);
    assert!(is_gone(pid));
    assert!(group_gone(pid).await);
}

// ============================================================
// Teardown
// ============================================================

#[tokio::test]
async fn test_interrupt_ignoring_proxy_is_force_killed() {
    let (_listener, port) = held_listener();
    let sup = supervisor(
        "trap '' INT; while :; do sleep 1; done",
        Duration::from_millis(300),
    );
    let configs = vec![AgentConfig::new("A", port, "")];

    let mut handles = sup
        .start_all(&configs, Duration::from_secs(5), &CancellationToken::new())
        .await;
    assert!(handles[0].is_ready());
    let pid = handles[0].pid().unwrap();

    sup.stop_all(&mut handles).await;

    assert_eq!(handles[0].stop_outcome(), Some(&StopOutcome::Forced));
    assert!(is_gone(pid));
    assert!(group_gone(pid).await);
}

#[tokio::test]
async fn test_graceful_stop_also_clears_forked_helpers() {
    let (_listener, port) = held_listener();
    // Background jobs of a non-interactive shell ignore SIGINT.
    let sup = supervisor("sleep 300 & wait", Duration::from_secs(2));
    let configs = vec![AgentConfig::new("A", port, "")];

    let mut handles = sup
        .start_all(&configs, Duration::from_secs(5), &CancellationToken::new())
        .await;
    assert!(handles[0].is_ready());
    let pgid = handles[0].pid().unwrap();

    sup.stop_all(&mut handles).await;

    assert_eq!(handles[0].stop_outcome(), Some(&StopOutcome::Graceful));
    assert!(group_gone(pgid).await);
}

#[tokio::test]
async fn test_dropped_handles_take_their_group_down() {
    let (_listener, port) = held_listener();
    let sup = supervisor("sleep 300 & wait", Duration::from_secs(2));
    let configs = vec![AgentConfig::new("A", port, "")];

    let handles = sup
        .start_all(&configs, Duration::from_secs(5), &CancellationToken::new())
        .await;
    assert!(handles[0].is_ready());
    let pgid = handles[0].pid().unwrap();

    drop(handles);

    assert!(group_gone(pgid).await);
}

#[tokio::test]
async fn test_stop_all_is_idempotent() {
    let (_listener, port) = held_listener();
    let sup = supervisor("exec sleep 30", Duration::from_secs(2));
    let configs = vec![AgentConfig::new("A", port, "")];

    let mut handles = sup
        .start_all(&configs, Duration::from_secs(5), &CancellationToken::new())
        .await;

    sup.stop_all(&mut handles).await;
    let first = handles[0].stop_outcome().cloned();
    assert_eq!(first, Some(StopOutcome::Graceful));

    sup.stop_all(&mut handles).await;
    assert_eq!(handles[0].state(), ProcessState::Stopped);
    assert_eq!(handles[0].stop_outcome().cloned(), first);
}

#[tokio::test]
async fn test_snapshot_reflects_final_state() {
    let sup = supervisor("exit 1", Duration::from_secs(1));
    let port = free_port();
    let configs = vec![AgentConfig::new("A", port, "")];

    let mut handles = sup
        .start_all(&configs, Duration::from_secs(5), &CancellationToken::new())
        .await;
    sup.stop_all(&mut handles).await;

    let info = handles[0].info();
    assert_eq!(info.name, "A");
    assert_eq!(info.port, port);
    assert_eq!(info.state, ProcessState::Stopped);
    assert!(info.error.unwrap().contains("exit status"));
    assert!(chrono::DateTime::parse_from_rfc3339(&info.started_at).is_ok());
}
