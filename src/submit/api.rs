//! Direct API submitter.
//!
//! Streams a single chat completion from the agent's proxy with genai. Every
//! request is resolved to the Anthropic adapter at `<endpoint>/v1/`, since the
//! proxies speak the Anthropic messages API; the proxy decides which model
//! actually answers.

use async_trait::async_trait;
use futures::StreamExt;
use genai::adapter::AdapterKind;
use genai::chat::{ChatMessage, ChatOptions, ChatRequest, ChatStreamEvent};
use genai::resolver::{AuthData, Endpoint, ServiceTargetResolver};
use genai::{Client, ModelIden, ServiceTarget};
use tracing::info;

use super::{Fragment, FragmentStream, QueryRequest, QuerySubmitter};
use crate::error::SubmitError;

#[derive(Debug, Clone)]
pub struct ApiSubmitter {
    model: String,
    api_key: String,
}

impl ApiSubmitter {
    pub fn new(model: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            api_key: api_key.into(),
        }
    }

    /// A client whose every request goes to `endpoint`.
    fn client_for(&self, endpoint: &str) -> Client {
        let base_url = format!("{}/v1/", endpoint.trim_end_matches('/'));
        let api_key = self.api_key.clone();

        let resolver = ServiceTargetResolver::from_resolver_fn(
            move |service_target: ServiceTarget| -> Result<ServiceTarget, genai::resolver::Error> {
                let ServiceTarget { model, .. } = service_target;
                Ok(ServiceTarget {
                    endpoint: Endpoint::from_owned(base_url.clone()),
                    auth: AuthData::from_single(api_key.clone()),
                    model: ModelIden::new(AdapterKind::Anthropic, model.model_name),
                })
            },
        );

        Client::builder()
            .with_service_target_resolver(resolver)
            .build()
    }
}

#[async_trait]
impl QuerySubmitter for ApiSubmitter {
    async fn submit(&self, request: &QueryRequest) -> Result<FragmentStream, SubmitError> {
        info!(agent = %request.agent, endpoint = %request.endpoint, "Streaming chat completion");

        let client = self.client_for(&request.endpoint);

        let mut chat_req = ChatRequest::default();
        if !request.system_prompt.is_empty() {
            chat_req = chat_req.with_system(request.system_prompt.clone());
        }
        let chat_req = chat_req.append_message(ChatMessage::user(request.query.clone()));

        let chat_options = ChatOptions::default().with_capture_content(false);

        let response = client
            .exec_chat_stream(&self.model, chat_req, Some(&chat_options))
            .await
            .map_err(|e| SubmitError::Llm(e.to_string()))?;

        let fragments = response.stream.map(|event| match event {
            Ok(ChatStreamEvent::Chunk(chunk)) => Ok(Fragment::Text(chunk.content)),
            // Start, End, reasoning and tool-call chunks are not part of the answer.
            Ok(_) => Ok(Fragment::Other),
            Err(e) => Err(SubmitError::Llm(e.to_string())),
        });

        Ok(fragments.boxed())
    }
}
