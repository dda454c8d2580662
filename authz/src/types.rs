//! Request and decision types for deploy-time access evaluation.
//!
//! A request names an HTTP verb, a concrete path (e.g. `/items/42`) and the
//! kind of credentials the caller presents. The decision mirrors what the
//! gateway would answer for that call.

use resources::{HttpMethod, PrincipalRef};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Deployment details that only exist once the API has been created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessContext {
    /// Identifier the provider assigned to the REST API.
    pub api_id: String,
}

impl AccessContext {
    pub fn new(api_id: impl Into<String>) -> Self {
        Self {
            api_id: api_id.into(),
        }
    }
}

/// Credentials presented with a call.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Caller {
    /// No signature and no token.
    Anonymous,
    /// Request signed with the credentials of an IAM principal.
    Signed(PrincipalRef),
    /// Bearer token issued by the named user directory.
    DirectoryToken { directory: String },
}

impl fmt::Display for Caller {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Caller::Anonymous => f.write_str("anonymous"),
            Caller::Signed(principal) => write!(f, "signed as {}", principal),
            Caller::DirectoryToken { directory } => write!(f, "token from {}", directory),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessRequest {
    pub method: HttpMethod,
    pub path: String,
    pub caller: Caller,
}

impl AccessRequest {
    pub fn new(method: HttpMethod, path: impl Into<String>, caller: Caller) -> Self {
        Self {
            method,
            path: path.into(),
            caller,
        }
    }
}

/// Why the gateway turns a call away.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Reason {
    /// No resource or method matches the request.
    MissingAuthenticationToken,
    /// The caller lacks the credentials the route requires.
    Unauthorized,
    /// Credentials were accepted but no policy grants the call.
    Forbidden,
}

impl Reason {
    /// Status code the gateway answers with.
    pub fn status(&self) -> u16 {
        match self {
            Reason::MissingAuthenticationToken | Reason::Forbidden => 403,
            Reason::Unauthorized => 401,
        }
    }
}

impl fmt::Display for Reason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Reason::MissingAuthenticationToken => "Missing Authentication Token",
            Reason::Unauthorized => "Unauthorized",
            Reason::Forbidden => "Forbidden",
        };
        f.write_str(text)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum AccessDecision {
    /// The call reaches `function`.
    Allowed { function: String },
    Rejected { reason: Reason },
}

impl AccessDecision {
    pub fn rejected(reason: Reason) -> Self {
        AccessDecision::Rejected { reason }
    }

    pub fn is_allowed(&self) -> bool {
        matches!(self, AccessDecision::Allowed { .. })
    }
}

impl fmt::Display for AccessDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AccessDecision::Allowed { function } => write!(f, "allowed (invokes {})", function),
            AccessDecision::Rejected { reason } => {
                write!(f, "rejected: {} ({})", reason, reason.status())
            }
        }
    }
}
