//! Assembles a serverless backend from its declarations.
//!
//! A `BackendBuilder` collects the user directory, data service, functions,
//! REST API and policies. `finalize` resolves every cross-reference and
//! enforces the access rules:
//!
//! - every REST route carries IAM or directory-token authorization
//! - the proxy resource inherits the parent's integration and authorization
//! - directory groups never receive function-execution actions
//! - wildcard resources are kept but reported as warnings
//!
//! The resulting `Backend` is immutable. It can be synthesized into a
//! provisioning template, compared against a previous template, and turned
//! into the client configuration once the API has been assigned an id.

pub mod backend;
pub mod builder;
pub mod declaration;
pub mod error;
pub mod outputs;
pub mod plan;
pub mod synth;

pub use backend::{Attachment, Backend, Route, ValidationWarning, PROXY_SEGMENT};
pub use builder::BackendBuilder;
pub use declaration::{Declaration, PolicyDeclaration};
pub use error::{Result, StackError};
pub use outputs::{ApiOutput, ClientOutputs};
pub use plan::{plan, Change, ChangeCategory, ChangeKind, Plan};
pub use synth::{synthesize, synthesize_with, SynthOptions, Template};
