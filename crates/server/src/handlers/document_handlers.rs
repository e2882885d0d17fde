//! # Document Route Handlers
//!
//! Serves reference documents from blob storage: inline with byte ranges for
//! the PDF viewer, as a single download, or as a chunked stream.

use super::{AppError, AppState};
use crate::auth::middleware::AuthenticatedUser;
use axum::{
    body::Body,
    extract::{Path, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use qachat::{
    blob::{content_disposition, file_name, ByteRange},
    BlobError,
};
use tracing::{debug, info};

const PDF_CONTENT_TYPE: &str = "application/pdf";

/// `GET /download/view/{*blob}`: the whole PDF, or one byte range of it.
pub async fn view_document_handler(
    State(app_state): State<AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
    Path(blob_name): Path<String>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    let properties = app_state
        .blobs
        .properties(&blob_name)
        .await?
        .ok_or_else(|| BlobError::NotFound(blob_name.clone()))?;

    let range_header = headers
        .get(header::RANGE)
        .and_then(|value| value.to_str().ok());

    if let Some(range_header) = range_header {
        let range = ByteRange::parse(range_header, properties.size)?;
        debug!(blob = %blob_name, range = %range_header, "Serving byte range");
        let data = app_state
            .blobs
            .read_range(&blob_name, range.start, range.len())
            .await?;

        return Ok((
            StatusCode::PARTIAL_CONTENT,
            [
                (header::CONTENT_TYPE, PDF_CONTENT_TYPE.to_string()),
                (header::CONTENT_RANGE, range.content_range(properties.size)),
                (header::ACCEPT_RANGES, "bytes".to_string()),
                (header::CONTENT_DISPOSITION, "inline".to_string()),
            ],
            data,
        )
            .into_response());
    }

    let data = app_state.blobs.read_all(&blob_name).await?;
    info!(blob = %blob_name, size = data.len(), "Serving document inline");
    Ok((
        [
            (header::CONTENT_TYPE, PDF_CONTENT_TYPE),
            (header::ACCEPT_RANGES, "bytes"),
            (header::CONTENT_DISPOSITION, "inline"),
        ],
        data,
    )
        .into_response())
}

/// `GET /download/file/{*blob}`: the whole file as an attachment.
pub async fn download_file_handler(
    State(app_state): State<AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
    Path(blob_name): Path<String>,
) -> Result<Response, AppError> {
    let data = app_state.blobs.read_all(&blob_name).await?;
    info!(blob = %blob_name, size = data.len(), "Downloading document");

    Ok((
        [
            (header::CONTENT_TYPE, "application/octet-stream".to_string()),
            (
                header::CONTENT_DISPOSITION,
                content_disposition("attachment", file_name(&blob_name)),
            ),
        ],
        data,
    )
        .into_response())
}

/// `GET /download/stream/{*blob}`: the whole file, streamed chunk by chunk.
pub async fn stream_document_handler(
    State(app_state): State<AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
    Path(blob_name): Path<String>,
) -> Result<Response, AppError> {
    let chunks = app_state.blobs.stream_chunks(&blob_name).await?;
    let content_type = mime_guess::from_path(&blob_name)
        .first_or_octet_stream()
        .to_string();
    info!(blob = %blob_name, content_type = %content_type, "Streaming document");

    Ok((
        [
            (header::CONTENT_TYPE, content_type),
            (
                header::CONTENT_DISPOSITION,
                content_disposition("attachment", file_name(&blob_name)),
            ),
        ],
        Body::from_stream(chunks),
    )
        .into_response())
}
