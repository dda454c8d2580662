//! Error types for access evaluation.
//!
//! A rejected request is not an error; these cover failures to build or run
//! the policy engine itself.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AuthzError {
    /// Generated policy text failed to parse.
    ///
    /// Indicates a name the policy language cannot express, since the text is
    /// produced from an already validated backend.
    #[error("Policy parsing failed: {0}")]
    PolicyParse(String),

    #[error("Entity creation failed: {0}")]
    EntityCreation(String),

    #[error("Authorization evaluation failed: {0}")]
    EvaluationError(String),

    /// The backend declares no REST API to evaluate routes against.
    #[error("Backend has no REST API")]
    NoApi,

    #[error("Invalid request path: {0}")]
    InvalidPath(String),
}

pub type Result<T> = std::result::Result<T, AuthzError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = AuthzError::PolicyParse("unexpected token".to_string());
        assert_eq!(err.to_string(), "Policy parsing failed: unexpected token");

        let err = AuthzError::NoApi;
        assert_eq!(err.to_string(), "Backend has no REST API");

        let err = AuthzError::InvalidPath("items".to_string());
        assert_eq!(err.to_string(), "Invalid request path: items");
    }
}
