// ============================================================================
// ERRORS — everything the edit session and its collaborators can report
// ============================================================================

use thiserror::Error;

pub type Result<T> = std::result::Result<T, EditError>;

#[derive(Debug, Error)]
pub enum EditError {
    /// No image has been loaded yet.
    #[error("no image loaded")]
    NoImage,
    /// A stroke is still in progress.
    #[error("a brush stroke is in progress")]
    Busy,
    /// An edit request is already waiting for the service.
    #[error("an edit request is already in flight")]
    SubmissionInFlight,
    #[error("result {index} does not exist ({len} results available)")]
    NoSuchResult { index: usize, len: usize },
    #[error("overlay is {actual:?} but padding expects {expected:?}")]
    DimensionMismatch {
        expected: (u32, u32),
        actual: (u32, u32),
    },
    #[error("image error: {0}")]
    Image(#[from] image::ImageError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("edit service returned {status}: {message}")]
    Service { status: u16, message: String },
    #[error("malformed edit response: {0}")]
    MalformedResponse(String),
    #[error("invalid base64 payload: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("API key not found in environment variable {0}")]
    MissingApiKey(String),
    #[error("edit failed: {0}")]
    EditFailed(String),
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}
