//! Query submission backends.
//!
//! A [`QuerySubmitter`] sends one query to one agent's proxy and hands back
//! the answer as a stream of [`Fragment`]s. The task runner keeps only the
//! [`Fragment::Text`] payloads, in arrival order.

pub mod api;
pub mod claude_cli;

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::config::{ClientConfig, ClientKind};
use crate::error::SubmitError;

pub use api::ApiSubmitter;
pub use claude_cli::ClaudeCliSubmitter;

/// One piece of an agent's response.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Fragment {
    /// Answer text, concatenated into the final result.
    Text(String),
    /// Anything else the backend emits (tool use, status, usage...).
    Other,
}

pub type FragmentStream = BoxStream<'static, Result<Fragment, SubmitError>>;

/// Everything needed to ask one agent one question.
#[derive(Clone, Debug)]
pub struct QueryRequest {
    /// Agent name, for logging.
    pub agent: String,
    /// Base URL of the agent's proxy, e.g. `http://localhost:4900`.
    pub endpoint: String,
    pub system_prompt: String,
    pub query: String,
}

#[async_trait]
pub trait QuerySubmitter: Send + Sync {
    async fn submit(&self, request: &QueryRequest) -> Result<FragmentStream, SubmitError>;
}

/// Base URL of a local proxy.
pub fn endpoint_for(host: &str, port: u16) -> String {
    format!("http://{host}:{port}")
}

/// Build the configured submitter. `cwd` is where CLI-driven agents run.
pub fn build_submitter(client: &ClientConfig, cwd: &Path) -> Arc<dyn QuerySubmitter> {
    match client.kind {
        ClientKind::ClaudeCli => Arc::new(ClaudeCliSubmitter::from_config(client, cwd)),
        ClientKind::Api => Arc::new(ApiSubmitter::new(&client.model, &client.api_key)),
    }
}
