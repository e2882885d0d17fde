//! # Shared Constants
//!
//! Constants that are shared across the crates of the `qachat` workspace.

/// The default path for the main application SQLite database.
pub const DEFAULT_DB_FILE: &str = "db/qachat.db";

/// Marker prepended to metadata payloads in the sentinel wire format.
pub const META_SENTINEL: &str = "[[META]]";

/// Marker prepended to the generated log id in the sentinel wire format.
pub const QA_LOG_CD_SENTINEL: &str = "[[QA_LOG_CD]]";

/// Marker prepended to error messages in the sentinel wire format.
pub const ERROR_SENTINEL: &str = "[ERROR]";

/// Message used when an upstream `error` event carries no message.
pub const DEFAULT_STREAM_ERROR: &str = "Stream error";

/// The title given to a conversation before its first question is asked.
pub const DEFAULT_CONVERSATION_TITLE: &str = "新しいチャット";

/// Size of the chunks yielded by streamed blob downloads (4 MiB).
pub const BLOB_CHUNK_SIZE: u64 = 4 * 1024 * 1024;
