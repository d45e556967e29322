//! Process-group liveness checks shared by the integration tests.

use std::time::{Duration, Instant};

use nix::sys::signal::killpg;
use nix::unistd::Pid;

/// True while any non-zombie process is left in group `pgid`.
///
/// `killpg(pgid, None)` also succeeds for zombies, which linger until their
/// parent (possibly init) reaps them, so on Linux the group is confirmed
/// through `/proc`.
pub fn group_alive(pgid: u32) -> bool {
    if killpg(Pid::from_raw(pgid as i32), None).is_err() {
        return false;
    }
    let Ok(entries) = std::fs::read_dir("/proc") else {
        return true;
    };
    entries
        .flatten()
        .filter_map(|entry| std::fs::read_to_string(entry.path().join("stat")).ok())
        .any(|stat| is_live_member(&stat, pgid))
}

/// `/proc/<pid>/stat` reads `pid (comm) state ppid pgrp ...`; comm may
/// contain spaces and parentheses.
fn is_live_member(stat: &str, pgid: u32) -> bool {
    let Some(close) = stat.rfind(')') else {
        return false;
    };
    let mut fields = stat[close + 1..].split_whitespace();
    let state = fields.next();
    let _ppid = fields.next();
    let pgrp = fields.next().and_then(|f| f.parse::<u32>().ok());
    !matches!(state, Some("Z") | Some("X")) && pgrp == Some(pgid)
}

/// Wait up to five seconds for group `pgid` to empty out.
pub async fn group_gone(pgid: u32) -> bool {
    let deadline = Instant::now() + Duration::from_secs(5);
    while Instant::now() < deadline {
        if !group_alive(pgid) {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    !group_alive(pgid)
}
