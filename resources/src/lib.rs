//! Declaration types for a serverless backend: user directory, data service,
//! compute functions, REST API surface and IAM policies.
//!
//! Everything here is plain data. Cross-references (a method naming a
//! function, a policy attached to a group) are resolved and validated by the
//! `stack` crate when a backend is finalized.

pub mod api;
pub mod arn;
pub mod directory;
pub mod error;
pub mod function;
pub mod iam;

pub use api::{
    validate_segment, AllowHeaders, AllowMethods, AllowOrigins, AuthorizationMode, Authorizer,
    CorsOptions, HttpMethod, MethodBinding, ProxyBinding, ResourcePath, RestApiDefinition,
};
pub use arn::{Environment, ExecuteApiArn};
pub use directory::{
    DataAuthorization, DataModel, DataResource, FieldKind, LoginMechanism, UserDirectory,
};
pub use error::{ResourcesError, Result};
pub use function::{BundlingOptions, FunctionDefinition, Runtime, MAX_TIMEOUT_SECONDS};
pub use iam::{
    validate_action, ActionCategory, Effect, Policy, PolicyStatement, PrincipalRef,
    ResourcePattern,
};
