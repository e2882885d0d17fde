use thiserror::Error;

/// Errors raised while talking to the upstream Q&A service.
#[derive(Error, Debug)]
pub enum ChatError {
    #[error("Failed to build Reqwest client: {0}")]
    ReqwestClientBuild(reqwest::Error),
    #[error("Failed to send request to chat API: {0}")]
    UpstreamRequest(reqwest::Error),
    #[error("Chat API returned status {status}: {body}")]
    UpstreamStatus { status: u16, body: String },
    #[error("Chat stream interrupted: {0}")]
    StreamInterrupted(String),
}

/// Errors raised by the persistence gateway.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Storage connection error: {0}")]
    Connection(String),
    #[error("Storage operation failed: {0}")]
    OperationFailed(String),
    #[error("Data integrity error: {0}")]
    DataIntegrity(String),
    /// A stored operation ran but reported a non-zero application error code.
    #[error("{procedure} failed with code {code}: {message}")]
    Procedure {
        procedure: &'static str,
        code: i32,
        message: String,
    },
}

impl StoreError {
    /// Returns the application error code if this is a procedure error.
    pub fn procedure_code(&self) -> Option<i32> {
        match self {
            StoreError::Procedure { code, .. } => Some(*code),
            _ => None,
        }
    }
}

impl From<turso::Error> for StoreError {
    fn from(err: turso::Error) -> Self {
        StoreError::OperationFailed(err.to_string())
    }
}

/// Errors raised by blob storage backends.
#[derive(Error, Debug)]
pub enum BlobError {
    #[error("Blob not found: {0}")]
    NotFound(String),
    #[error("Range '{header}' not satisfiable for {total} bytes")]
    InvalidRange { header: String, total: u64 },
    #[error("Blob storage request failed: {0}")]
    Request(String),
    #[error("Blob I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<reqwest::Error> for BlobError {
    fn from(err: reqwest::Error) -> Self {
        BlobError::Request(err.to_string())
    }
}
