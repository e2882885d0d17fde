//! # Upstream Chat Client
//!
//! The upstream Q&A service answers a question with a stream of JSON lines,
//! each carrying a `type` discriminator. This module defines the event type the
//! rest of the crate consumes and the trait implemented by upstream clients.

pub mod http;
pub mod lines;

use crate::{errors::ChatError, types::ChatRequest};
use async_trait::async_trait;
use futures::Stream;
use serde_json::Value;
use std::{fmt::Debug, pin::Pin};

/// One event read from the upstream answer stream.
#[derive(Debug, Clone, PartialEq)]
pub enum UpstreamEvent {
    /// An incremental answer token.
    Text(String),
    /// Supplementary structured data, e.g. the source documents of the answer.
    Metadata(Value),
    /// A terminal error reported by the upstream service.
    Error(String),
}

/// A lazy, finite, non-restartable sequence of upstream events.
pub type EventStream = Pin<Box<dyn Stream<Item = Result<UpstreamEvent, ChatError>> + Send>>;

/// A trait for clients of the upstream Q&A service.
///
/// Implementations open one connection per call. The connection is torn down
/// when the returned stream is exhausted or dropped.
#[async_trait]
pub trait ChatUpstream: Send + Sync + Debug {
    /// Sends the question and returns the answer as an event stream.
    ///
    /// Connection failures and non-success statuses are reported here, before
    /// any event is produced.
    async fn stream_chat(&self, request: &ChatRequest) -> Result<EventStream, ChatError>;
}
