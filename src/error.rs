use thiserror::Error;

/// Errors surfaced by the form and its configuration.
#[derive(Debug, Error)]
pub enum QrFormError {
    /// Any failed generation request. The cause is not retained.
    #[error("Generation failed")]
    GenerationFailed,
    /// The input was empty.
    #[error("a target URL is required")]
    MissingUrl,
    /// The input did not parse as an absolute URL.
    #[error("invalid target URL `{0}`")]
    InvalidUrl(String),
    #[error("invalid configuration: {0}")]
    Config(String),
}

/// Errors reported by a [`crate::QrApi`] implementation.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("backend answered with status {0}")]
    Status(u16),
    #[error("failed to reach the backend: {0}")]
    Transport(String),
    #[error("malformed response body: {0}")]
    Decode(String),
}
