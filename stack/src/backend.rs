//! The finalized, immutable resource graph.

use resources::{
    AuthorizationMode, DataResource, Environment, FunctionDefinition, HttpMethod, Policy,
    PrincipalRef, RestApiDefinition, UserDirectory,
};
use serde::Serialize;
use std::fmt;

/// Path segment the gateway uses for catch-all children.
pub const PROXY_SEGMENT: &str = "{proxy+}";

/// One effective method binding after inheritance has been applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Route {
    /// Full path, e.g. `/items` or `/items/{proxy+}`.
    pub path: String,
    pub method: HttpMethod,
    pub function: String,
    pub authorization: AuthorizationMode,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub authorizer: Option<String>,
    pub proxy: bool,
}

impl Route {
    /// Path as written in execute-api ARNs; the proxy segment becomes `*`.
    pub fn arn_path(&self) -> String {
        match self.path.strip_suffix(PROXY_SEGMENT) {
            Some(prefix) => format!("{}*", prefix),
            None => self.path.clone(),
        }
    }

    pub fn segments(&self) -> Vec<&str> {
        self.path.split('/').filter(|s| !s.is_empty()).collect()
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method, self.path)
    }
}

/// A named policy bound to a principal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Attachment {
    pub policy: String,
    pub principal: PrincipalRef,
}

/// Non-fatal findings reported by `finalize`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ValidationWarning {
    /// A statement grants its actions on every resource (`"*"`).
    WildcardResource { policy: String },
    /// CORS preflight accepts any origin.
    PermissiveCors { api: String },
    /// A declared policy is not attached to any principal.
    UnattachedPolicy { policy: String },
}

impl fmt::Display for ValidationWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationWarning::WildcardResource { policy } => write!(
                f,
                "policy '{}' grants actions on all resources (\"*\"); scope it before production",
                policy
            ),
            ValidationWarning::PermissiveCors { api } => write!(
                f,
                "API '{}' allows CORS requests from any origin; restrict it to trusted domains",
                api
            ),
            ValidationWarning::UnattachedPolicy { policy } => {
                write!(f, "policy '{}' is declared but never attached", policy)
            }
        }
    }
}

/// A validated backend, ready for synthesis.
///
/// Built only through `BackendBuilder::finalize`, so every reference inside
/// it resolves.
#[derive(Debug, Clone)]
pub struct Backend {
    pub(crate) name: String,
    pub(crate) environment: Environment,
    pub(crate) auth: Option<UserDirectory>,
    pub(crate) data: Option<DataResource>,
    pub(crate) functions: Vec<FunctionDefinition>,
    pub(crate) api: Option<RestApiDefinition>,
    pub(crate) routes: Vec<Route>,
    pub(crate) policies: Vec<Policy>,
    pub(crate) attachments: Vec<Attachment>,
    pub(crate) warnings: Vec<ValidationWarning>,
}

impl Backend {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn environment(&self) -> &Environment {
        &self.environment
    }

    pub fn auth(&self) -> Option<&UserDirectory> {
        self.auth.as_ref()
    }

    pub fn data(&self) -> Option<&DataResource> {
        self.data.as_ref()
    }

    pub fn functions(&self) -> &[FunctionDefinition] {
        &self.functions
    }

    pub fn function(&self, name: &str) -> Option<&FunctionDefinition> {
        self.functions.iter().find(|f| f.name == name)
    }

    pub fn api(&self) -> Option<&RestApiDefinition> {
        self.api.as_ref()
    }

    /// Stage of the REST API, if one is declared.
    pub fn stage(&self) -> Option<&str> {
        self.api.as_ref().map(|api| api.stage.as_str())
    }

    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    pub fn route(&self, method: HttpMethod, path: &str) -> Option<&Route> {
        self.routes
            .iter()
            .find(|r| r.method == method && r.path == path)
    }

    pub fn policies(&self) -> &[Policy] {
        &self.policies
    }

    pub fn policy(&self, name: &str) -> Option<&Policy> {
        self.policies.iter().find(|p| p.name == name)
    }

    pub fn attachments(&self) -> &[Attachment] {
        &self.attachments
    }

    /// Policies attached to a principal, in declaration order.
    pub fn attachments_for(&self, principal: &PrincipalRef) -> Vec<&Policy> {
        self.attachments
            .iter()
            .filter(|a| &a.principal == principal)
            .filter_map(|a| self.policy(&a.policy))
            .collect()
    }

    /// Every principal that exists in this backend, attached or not.
    pub fn principals(&self) -> Vec<PrincipalRef> {
        let mut principals = Vec::new();
        if let Some(auth) = &self.auth {
            principals.push(PrincipalRef::AuthenticatedUsers);
            if auth.allow_unauthenticated {
                principals.push(PrincipalRef::UnauthenticatedUsers);
            }
            principals.extend(auth.groups.iter().map(PrincipalRef::group));
        }
        principals.extend(self.functions.iter().map(|f| PrincipalRef::function(&f.name)));
        principals
    }

    pub fn warnings(&self) -> &[ValidationWarning] {
        &self.warnings
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn route(path: &str, proxy: bool) -> Route {
        Route {
            path: path.to_string(),
            method: HttpMethod::Any,
            function: "f".to_string(),
            authorization: AuthorizationMode::Iam,
            authorizer: None,
            proxy,
        }
    }

    #[test]
    fn test_arn_path() {
        assert_eq!(route("/items/{proxy+}", true).arn_path(), "/items/*");
        assert_eq!(route("/items", false).arn_path(), "/items");
    }

    #[test]
    fn test_segments() {
        assert_eq!(route("/items/{proxy+}", true).segments(), vec!["items", "{proxy+}"]);
    }

    #[test]
    fn test_warning_display() {
        let warning = ValidationWarning::WildcardResource {
            policy: "CognitoGroupPolicy".into(),
        };
        assert!(warning.to_string().contains("CognitoGroupPolicy"));
        assert!(warning.to_string().contains("\"*\""));
    }
}
