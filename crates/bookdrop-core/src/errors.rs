/// Core error type for the ingestion pipeline.
///
/// Adapter crates should map their specific failures into this type so the
/// transport layer can handle outcomes consistently (user-facing message vs
/// terminal error).
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("config error: {0}")]
    Config(String),

    #[error("caller {0} is not authorized")]
    Unauthorized(i64),

    #[error("file type not allowed: {extension}")]
    TypeRejected { extension: String },

    #[error("file size {size} bytes exceeds maximum allowed size {limit_mb} MB")]
    SizeRejected { size: u64, limit_mb: u64 },

    #[error("transfer failed: {0}")]
    Transport(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("remote library error: {0}")]
    Api(#[from] ApiError),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Classified failure of a remote-library call.
///
/// HTTP-status-derived variants come from the structured error body when the
/// server sends one; `Network` means no response was received at all.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ApiError {
    #[error("library API client is not configured")]
    Unconfigured,

    #[error("invalid API token")]
    InvalidCredential,

    #[error("forbidden: {message}")]
    Forbidden { message: String },

    #[error("not found: {message}")]
    NotFound { message: String },

    #[error("bad request ({status}): {message}")]
    BadRequest { message: String, status: u16 },

    #[error("server error: {message}")]
    Internal { message: String },

    #[error("service unavailable: {message}")]
    ServiceUnavailable { message: String },

    #[error("network error: {0}")]
    Network(String),
}

pub type ApiResult<T> = std::result::Result<T, ApiError>;
