use thiserror::Error;

/// Errors surfaced by a monitoring session.
///
/// Input validation errors are returned before any processing starts. Pipeline
/// errors end the session; they never take the process down.
#[derive(Debug, Error)]
pub enum SessionError {
    /// Video or mask payload missing from the request.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Mask could not be decoded, or produced no usable regions.
    #[error("invalid mask: {0}")]
    InvalidMask(String),

    /// Video source could not be opened.
    #[error("video cannot be opened: {0}")]
    VideoOpen(String),

    /// The render side failed. Fatal to the whole session.
    #[error("render failure: {0}")]
    RenderFailure(String),

    /// Frame decoding failed after the stream was opened.
    #[error("stream failure: {0}")]
    StreamFailure(String),
}

impl SessionError {
    /// HTTP status the upload endpoint answers with for this error.
    pub fn http_status(&self) -> u16 {
        match self {
            SessionError::InvalidInput(_) => 400,
            SessionError::InvalidMask(_)
            | SessionError::VideoOpen(_)
            | SessionError::RenderFailure(_)
            | SessionError::StreamFailure(_) => 500,
        }
    }

    /// Client-facing message for the upload endpoint.
    pub fn public_message(&self) -> String {
        match self {
            SessionError::InvalidInput(_) => "Both video and mask files are required".to_string(),
            SessionError::InvalidMask(_) => "Invalid mask file".to_string(),
            SessionError::VideoOpen(_) => "Video cannot be opened".to_string(),
            SessionError::RenderFailure(detail) => format!("Rendering failed: {detail}"),
            SessionError::StreamFailure(detail) => format!("Video decoding failed: {detail}"),
        }
    }
}

/// Flattens an `anyhow` chain into one line for error variants.
pub(crate) fn describe(err: &anyhow::Error) -> String {
    format!("{err:#}")
}
