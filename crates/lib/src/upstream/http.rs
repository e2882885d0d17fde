use super::{lines::decode_event_stream, ChatUpstream, EventStream};
use crate::{errors::ChatError, types::ChatRequest};
use async_trait::async_trait;
use reqwest::{header::ACCEPT, Client as ReqwestClient};
use std::time::Duration;
use tracing::{debug, error};

/// Options for building an [`HttpChatUpstream`].
#[derive(Debug, Clone, Default)]
pub struct HttpUpstreamOptions {
    pub api_key: Option<String>,
    pub connect_timeout: Option<Duration>,
    /// Skips TLS certificate verification. Only for internal endpoints with
    /// self-signed certificates.
    pub accept_invalid_certs: bool,
}

/// A client for an upstream Q&A service that answers with JSON lines over HTTP.
#[derive(Clone, Debug)]
pub struct HttpChatUpstream {
    client: ReqwestClient,
    api_url: String,
    api_key: Option<String>,
}

impl HttpChatUpstream {
    /// Creates a new `HttpChatUpstream`.
    ///
    /// No overall request timeout is set: an answer may stream for as long as
    /// the upstream keeps producing tokens.
    pub fn new(api_url: String, options: HttpUpstreamOptions) -> Result<Self, ChatError> {
        let mut builder = ReqwestClient::builder();
        if let Some(timeout) = options.connect_timeout {
            builder = builder.connect_timeout(timeout);
        }
        if options.accept_invalid_certs {
            builder = builder.danger_accept_invalid_certs(true);
        }
        let client = builder.build().map_err(ChatError::ReqwestClientBuild)?;

        Ok(Self {
            client,
            api_url,
            api_key: options.api_key,
        })
    }

    pub fn api_url(&self) -> &str {
        &self.api_url
    }
}

#[async_trait]
impl ChatUpstream for HttpChatUpstream {
    async fn stream_chat(&self, request: &ChatRequest) -> Result<EventStream, ChatError> {
        debug!(
            conversation_id = %request.conversation_id,
            history_len = request.chat_history.len(),
            "--> Opening upstream chat stream"
        );

        let mut request_builder = self
            .client
            .post(&self.api_url)
            .header(ACCEPT, "application/jsonl")
            .json(request);

        if let Some(key) = &self.api_key {
            request_builder = request_builder.header("x-api-key", key);
        }

        let response = request_builder
            .send()
            .await
            .map_err(ChatError::UpstreamRequest)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!(status = %status, "Upstream chat API rejected the request");
            return Err(ChatError::UpstreamStatus {
                status: status.as_u16(),
                body,
            });
        }

        Ok(decode_event_stream(response.bytes_stream()))
    }
}
