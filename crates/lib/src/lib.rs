//! # Q&A Chat Relay
//!
//! This crate holds the core of the chatbot: the client for the upstream Q&A
//! service, the relay that forwards its answer stream to the browser while
//! recording the turn, the per-session turn tracker, the persistence gateway,
//! and the blob storage used for reference documents.

pub mod blob;
pub mod constants;
pub mod errors;
pub mod relay;
pub mod store;
pub mod turns;
pub mod types;
pub mod upstream;

pub use errors::{BlobError, ChatError, StoreError};
pub use relay::{ChatRelay, FrameStream, RelayFrame, RelayRequest, WireFormat};
pub use store::{turso::TursoQaStore, QaStore};
pub use turns::TurnTracker;
pub use types::{ChatRequest, HistoryTurn, QaTurn, SessionSummary, TurnRecord};
pub use upstream::{http::HttpChatUpstream, ChatUpstream, EventStream, UpstreamEvent};
