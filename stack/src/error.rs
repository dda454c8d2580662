use resources::ResourcesError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, StackError>;

/// Deploy-time configuration errors. None of these are recoverable; the
/// declaration has to be fixed and the build rerun.
#[derive(Error, Debug)]
pub enum StackError {
    #[error("Missing resource: {0}")]
    MissingResource(String),

    #[error("Unknown function '{0}'")]
    UnknownFunction(String),

    #[error("Unknown group '{group}' in user directory '{directory}'")]
    UnknownGroup { group: String, directory: String },

    #[error("Unknown policy '{0}'")]
    UnknownPolicy(String),

    #[error("Unknown authorizer '{0}'")]
    UnknownAuthorizer(String),

    #[error("Authorizer '{authorizer}' is bound to directory '{bound}', expected '{expected}'")]
    ForeignAuthorizer {
        authorizer: String,
        bound: String,
        expected: String,
    },

    #[error("Route {method} {path} has no authorization")]
    Unauthorized { method: String, path: String },

    #[error("Route {method} {path}: {reason}")]
    InvalidRoute {
        method: String,
        path: String,
        reason: String,
    },

    #[error("Duplicate route {method} {path}")]
    DuplicateRoute { method: String, path: String },

    #[error("Invalid policy '{policy}': {reason}")]
    InvalidPolicy { policy: String, reason: String },

    #[error("Policy '{policy}' attached to group '{group}' grants function-execution action '{action}'")]
    SeparationOfConcerns {
        policy: String,
        group: String,
        action: String,
    },

    #[error("Logical ID '{0}' is produced by more than one declared resource; rename one of them")]
    LogicalIdCollision(String),

    #[error("Invalid function '{function}': {reason}")]
    InvalidFunction { function: String, reason: String },

    #[error("Declaration error: {0}")]
    Declaration(String),

    #[error(transparent)]
    Resources(#[from] ResourcesError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parsing error: {0}")]
    YamlParsing(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
