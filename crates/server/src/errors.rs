use axum::{
    extract::rejection::{JsonRejection, PathRejection},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use core_access::CoreAccessError;
use qachat::{
    store::{ERR_INVALID_ARGUMENT, ERR_LOG_NOT_FOUND},
    BlobError, ChatError, StoreError,
};
use serde_json::json;
use tracing::{error, warn};

/// A custom error type for the server application.
///
/// This enum encapsulates different kinds of errors that can occur within the server,
/// allowing them to be converted into appropriate HTTP responses.
#[derive(Debug)]
pub enum AppError {
    /// The request is malformed or misses a required field.
    Validation(String),
    /// A user, log entry or document that does not exist.
    NotFound(String),
    /// Errors from the upstream Q&A service.
    Chat(ChatError),
    /// Errors from the Q&A log store.
    Store(StoreError),
    /// Errors from document storage.
    Blob(BlobError),
    /// Errors from the user directory.
    Directory(CoreAccessError),
    /// Generic internal server errors.
    Internal(anyhow::Error),
}

impl From<ChatError> for AppError {
    fn from(err: ChatError) -> Self {
        AppError::Chat(err)
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        AppError::Store(err)
    }
}

impl From<BlobError> for AppError {
    fn from(err: BlobError) -> Self {
        AppError::Blob(err)
    }
}

impl From<CoreAccessError> for AppError {
    fn from(err: CoreAccessError) -> Self {
        AppError::Directory(err)
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal(err)
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::Validation(rejection.body_text())
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        AppError::Validation(rejection.body_text())
    }
}

const INTERNAL_MESSAGE: &str = "An internal server error occurred.";

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status_code, error_message) = match self {
            AppError::Validation(message) => (StatusCode::BAD_REQUEST, message),
            AppError::NotFound(message) => (StatusCode::NOT_FOUND, message),
            AppError::Chat(err) => {
                error!("Chat API error: {err}");
                (
                    StatusCode::BAD_GATEWAY,
                    "The chat service is unavailable.".to_string(),
                )
            }
            AppError::Store(err) => match err.procedure_code() {
                Some(ERR_LOG_NOT_FOUND) => {
                    warn!("{err}");
                    (StatusCode::NOT_FOUND, "Log entry not found".to_string())
                }
                Some(ERR_INVALID_ARGUMENT) => {
                    warn!("{err}");
                    (StatusCode::BAD_REQUEST, "Invalid argument".to_string())
                }
                _ => {
                    error!("Store error: {err}");
                    (StatusCode::INTERNAL_SERVER_ERROR, INTERNAL_MESSAGE.to_string())
                }
            },
            AppError::Blob(BlobError::NotFound(name)) => {
                warn!(blob = %name, "Blob not found");
                (StatusCode::NOT_FOUND, "Blob not found".to_string())
            }
            AppError::Blob(BlobError::InvalidRange { header, total }) => {
                warn!(range = %header, total, "Unsatisfiable range");
                let body = Json(json!({
                    "success": false,
                    "error": "Requested range not satisfiable",
                }));
                return (
                    StatusCode::RANGE_NOT_SATISFIABLE,
                    [(header::CONTENT_RANGE, format!("bytes */{total}"))],
                    body,
                )
                    .into_response();
            }
            AppError::Blob(err) => {
                error!("Blob storage error: {err}");
                (StatusCode::INTERNAL_SERVER_ERROR, INTERNAL_MESSAGE.to_string())
            }
            AppError::Directory(err) => {
                error!("User directory error: {err}");
                (StatusCode::INTERNAL_SERVER_ERROR, INTERNAL_MESSAGE.to_string())
            }
            AppError::Internal(err) => {
                error!("Internal server error: {:?}", err);
                (StatusCode::INTERNAL_SERVER_ERROR, INTERNAL_MESSAGE.to_string())
            }
        };

        let body = Json(json!({
            "success": false,
            "error": error_message,
        }));

        (status_code, body).into_response()
    }
}
