//! Single-agent query execution.
//!
//! [`AgentTaskRunner::run`] asks one ready agent one question, bounded by a
//! timeout, and always returns a [`TaskResult`]. Failures never escape.

use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::StreamExt;
use tracing::{debug, error, info, warn};

use super::types::TaskResult;
use crate::config::AgentConfig;
use crate::error::TaskError;
use crate::submit::{Fragment, QueryRequest, QuerySubmitter};

/// Stateless apart from the shared submitter; clone freely into tasks.
#[derive(Clone)]
pub struct AgentTaskRunner {
    submitter: Arc<dyn QuerySubmitter>,
}

impl AgentTaskRunner {
    pub fn new(submitter: Arc<dyn QuerySubmitter>) -> Self {
        Self { submitter }
    }

    pub async fn run(
        &self,
        config: &AgentConfig,
        endpoint: &str,
        query: &str,
        timeout: Duration,
    ) -> TaskResult {
        info!(agent = %config.name, endpoint, "Agent task started");
        let started = Instant::now();

        let outcome = match tokio::time::timeout(timeout, self.collect(config, endpoint, query)).await {
            Ok(outcome) => outcome,
            Err(_) => Err(TaskError::Timeout),
        };
        let elapsed_ms = started.elapsed().as_millis() as u64;

        match outcome {
            Ok(text) => {
                info!(agent = %config.name, elapsed_ms, chars = text.len(), "Agent task succeeded");
                TaskResult::success(&config.name, text)
            }
            Err(TaskError::Timeout) => {
                warn!(agent = %config.name, timeout_secs = timeout.as_secs_f64(), "Agent task timed out");
                TaskResult::failure(&config.name, TaskError::Timeout)
            }
            Err(e) => {
                error!(agent = %config.name, elapsed_ms, error = %e, "Agent task failed");
                TaskResult::failure(&config.name, e)
            }
        }
    }

    /// Submit and concatenate the text fragments in arrival order.
    async fn collect(
        &self,
        config: &AgentConfig,
        endpoint: &str,
        query: &str,
    ) -> Result<String, TaskError> {
        let request = QueryRequest {
            agent: config.name.clone(),
            endpoint: endpoint.to_string(),
            system_prompt: config.system_prompt.clone(),
            query: query.to_string(),
        };

        let mut stream = self.submitter.submit(&request).await?;
        let mut text = String::new();
        let mut skipped = 0usize;

        while let Some(fragment) = stream.next().await {
            match fragment? {
                Fragment::Text(chunk) => text.push_str(&chunk),
                Fragment::Other => skipped += 1,
            }
        }
        debug!(agent = %config.name, skipped, "Response stream finished");

        if text.is_empty() {
            return Err(TaskError::EmptyResponse);
        }
        Ok(text)
    }
}
