use thiserror::Error;

pub type Result<T> = std::result::Result<T, ResourcesError>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResourcesError {
    #[error("Invalid HTTP method: {0}")]
    InvalidMethod(String),

    #[error("Invalid principal reference: {0}")]
    InvalidPrincipal(String),

    #[error("Invalid resource pattern: {0}")]
    InvalidResourcePattern(String),

    #[error("Invalid path segment: {0}")]
    InvalidPathSegment(String),

    #[error("Invalid CORS option: {0}")]
    InvalidCors(String),

    #[error("Unsupported runtime: {0}")]
    UnsupportedRuntime(String),
}
