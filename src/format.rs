//! Rendering a [`RunReport`] for the terminal.

use crate::orchestration::{RunReport, TaskResult};

const RULE_WIDTH: usize = 50;

/// Per-agent answers in config order, optionally followed by a summary block.
pub fn format_results(report: &RunReport, include_summary: bool) -> String {
    if report.results.is_empty() {
        return "No results.\n".to_string();
    }

    let separator = format!("\n{}\n\n", "=".repeat(RULE_WIDTH));
    let mut out = report
        .results
        .iter()
        .map(format_result)
        .collect::<Vec<_>>()
        .join(&separator);

    if include_summary {
        let s = &report.summary;
        out.push_str(&format!("\n{}\n", "=".repeat(RULE_WIDTH)));
        out.push_str("Summary:\n");
        out.push_str(&format!("  Total:       {}\n", s.total));
        out.push_str(&format!("  Succeeded:   {}\n", s.succeeded));
        out.push_str(&format!("  Failed:      {}\n", s.failed));
        if s.failed > 0 {
            out.push_str(&format!("    not ready:   {}\n", s.not_ready));
            out.push_str(&format!("    task failed: {}\n", s.task_failed));
            if s.interrupted > 0 {
                out.push_str(&format!("    interrupted: {}\n", s.interrupted));
            }
        }
    }

    out
}

fn format_result(result: &TaskResult) -> String {
    let body = match (&result.result, &result.error) {
        (Some(text), _) if result.is_success() => text.trim_end().to_string(),
        (_, Some(error)) => format!("[failed] {error}"),
        _ => "[failed] unknown error".to_string(),
    };
    format!(
        "Model [{}] answer:\n{}\n{}\n",
        result.model,
        "-".repeat(RULE_WIDTH),
        body
    )
}

/// The whole report, pretty-printed.
pub fn format_json(report: &RunReport) -> serde_json::Result<String> {
    serde_json::to_string_pretty(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orchestration::{RunStatus, RunSummary};

    fn report() -> RunReport {
        RunReport {
            status: RunStatus::PartialSuccess,
            results: vec![
                TaskResult::success("A", "hello\n"),
                TaskResult::failure("B", "timeout"),
            ],
            summary: RunSummary {
                total: 2,
                succeeded: 1,
                failed: 1,
                not_ready: 0,
                task_failed: 1,
                interrupted: 0,
            },
            processes: Vec::new(),
        }
    }

    #[test]
    fn text_lists_agents_in_order() {
        let text = format_results(&report(), false);
        let a = text.find("Model [A] answer:").unwrap();
        let b = text.find("Model [B] answer:").unwrap();
        assert!(a < b);
        assert!(text.contains("hello\n"));
        assert!(text.contains("[failed] timeout"));
        assert!(text.contains(&"=".repeat(50)));
        assert!(!text.contains("Summary:"));
    }

    #[test]
    fn summary_block_breaks_down_failures() {
        let text = format_results(&report(), true);
        assert!(text.contains("Summary:"));
        assert!(text.contains("Succeeded:   1"));
        assert!(text.contains("task failed: 1"));
        assert!(!text.contains("interrupted:"));
    }

    #[test]
    fn json_carries_status_and_results() {
        let json: serde_json::Value = serde_json::from_str(&format_json(&report()).unwrap()).unwrap();
        assert_eq!(json["status"], "partial_success");
        assert_eq!(json["results"][1]["error"], "timeout");
        assert_eq!(json["summary"]["total"], 2);
    }
}
