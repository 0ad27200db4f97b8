use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum HarvestError {
    #[error("robots.txt disallows fetching {0}")]
    PermissionDenied(String),

    #[error("request returned status {status}: {message}")]
    HttpStatus { status: u16, message: String },

    #[error("connection failed: {0}")]
    Connection(String),

    #[error("page render failed: {0}")]
    Render(String),

    #[error("failed to parse robots.txt: {0}")]
    Robots(String),

    #[error("corrupt or invalid archive: {0}")]
    CorruptArchive(String),

    #[error("filename does not carry a year/month/version prefix: {0}")]
    InvalidFilename(String),

    #[error("invalid url: {0}")]
    InvalidUrl(String),

    #[error("listing yielded no usable entries: {0}")]
    EmptyListing(String),

    #[error("filesystem error: {0}")]
    Filesystem(String),
}
