//! IAM policy declarations and the principals they attach to.
//!
//! Policies are attached, never owned: the same named policy can be bound to
//! several principals, and attachment is purely additive.

use crate::api::HttpMethod;
use crate::arn::{Environment, ExecuteApiArn};
use crate::error::{ResourcesError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Effect {
    #[default]
    Allow,
    Deny,
}

impl fmt::Display for Effect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Effect::Allow => f.write_str("Allow"),
            Effect::Deny => f.write_str("Deny"),
        }
    }
}

/// The resource side of a policy statement.
///
/// Written in declarations as `"*"`, a literal ARN (`"arn:..."`), or an
/// execute-api route pattern (`"execute-api:<METHOD|*>:<path>"`) that is
/// expanded against the API's stage when the backend is synthesized.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ResourcePattern {
    Any,
    Arn(String),
    ExecuteApi {
        /// `None` matches every verb.
        method: Option<HttpMethod>,
        path: String,
    },
}

const EXECUTE_API_PREFIX: &str = "execute-api:";

impl ResourcePattern {
    pub fn execute_api(method: Option<HttpMethod>, path: impl Into<String>) -> Self {
        ResourcePattern::ExecuteApi {
            method,
            path: path.into(),
        }
    }

    /// True for the unscoped `"*"` resource.
    pub fn is_wildcard(&self) -> bool {
        matches!(self, ResourcePattern::Any)
    }

    /// Renders the pattern as a concrete ARN pattern for one API deployment.
    pub fn render(&self, env: &Environment, api_id: &str, stage: &str) -> String {
        match self {
            ResourcePattern::Any => "*".to_string(),
            ResourcePattern::Arn(arn) => arn.clone(),
            ResourcePattern::ExecuteApi { method, path } => {
                ExecuteApiArn::new(env, api_id, stage, *method, path).to_string()
            }
        }
    }
}

impl FromStr for ResourcePattern {
    type Err = ResourcesError;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if s == "*" {
            return Ok(ResourcePattern::Any);
        }
        if s.contains('"') || s.contains('\\') {
            return Err(ResourcesError::InvalidResourcePattern(s.to_string()));
        }
        if let Some(rest) = s.strip_prefix(EXECUTE_API_PREFIX) {
            let (method, path) = rest
                .split_once(':')
                .ok_or_else(|| ResourcesError::InvalidResourcePattern(s.to_string()))?;
            if !path.starts_with('/') {
                return Err(ResourcesError::InvalidResourcePattern(s.to_string()));
            }
            let method = match method {
                "*" => None,
                verb => Some(verb.parse::<HttpMethod>()?),
            };
            return Ok(ResourcePattern::ExecuteApi {
                method,
                path: path.to_string(),
            });
        }
        if s.starts_with("arn:") {
            return Ok(ResourcePattern::Arn(s.to_string()));
        }
        Err(ResourcesError::InvalidResourcePattern(s.to_string()))
    }
}

impl TryFrom<String> for ResourcePattern {
    type Error = ResourcesError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<ResourcePattern> for String {
    fn from(value: ResourcePattern) -> Self {
        value.to_string()
    }
}

impl fmt::Display for ResourcePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourcePattern::Any => f.write_str("*"),
            ResourcePattern::Arn(arn) => f.write_str(arn),
            ResourcePattern::ExecuteApi { method, path } => {
                let verb = method.map(|m| m.as_str()).unwrap_or("*");
                write!(f, "{}{}:{}", EXECUTE_API_PREFIX, verb, path)
            }
        }
    }
}

/// One allow/deny rule over a set of actions and resources.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PolicyStatement {
    #[serde(default)]
    pub effect: Effect,
    pub actions: Vec<String>,
    pub resources: Vec<ResourcePattern>,
}

impl PolicyStatement {
    pub fn allow<A, S>(actions: A, resources: Vec<ResourcePattern>) -> Self
    where
        A: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            effect: Effect::Allow,
            actions: actions.into_iter().map(Into::into).collect(),
            resources,
        }
    }

    pub fn has_wildcard_resource(&self) -> bool {
        self.resources.iter().any(ResourcePattern::is_wildcard)
    }

    pub fn categories(&self) -> Vec<ActionCategory> {
        let mut categories: Vec<ActionCategory> =
            self.actions.iter().map(|a| ActionCategory::of(a)).collect();
        categories.sort();
        categories.dedup();
        categories
    }
}

/// A named, immutable set of statements.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Policy {
    pub name: String,
    pub statements: Vec<PolicyStatement>,
}

impl Policy {
    pub fn new(name: impl Into<String>, statements: Vec<PolicyStatement>) -> Self {
        Self {
            name: name.into(),
            statements,
        }
    }

    pub fn actions(&self) -> impl Iterator<Item = &str> {
        self.statements
            .iter()
            .flat_map(|s| s.actions.iter().map(String::as_str))
    }
}

/// An IAM identity a policy can be attached to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum PrincipalRef {
    /// Identity-pool role assumed by signed-in users.
    AuthenticatedUsers,
    /// Identity-pool role assumed by guests.
    UnauthenticatedUsers,
    /// Role of a named user-directory group.
    Group(String),
    /// Execution role of a compute function.
    Function(String),
}

impl PrincipalRef {
    pub fn group(name: impl Into<String>) -> Self {
        PrincipalRef::Group(name.into())
    }

    pub fn function(name: impl Into<String>) -> Self {
        PrincipalRef::Function(name.into())
    }

    /// Principals backed by the user directory's identity pool.
    pub fn is_directory_principal(&self) -> bool {
        !matches!(self, PrincipalRef::Function(_))
    }
}

impl FromStr for PrincipalRef {
    type Err = ResourcesError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "authenticated" => Ok(PrincipalRef::AuthenticatedUsers),
            "unauthenticated" => Ok(PrincipalRef::UnauthenticatedUsers),
            _ => match s.split_once(':') {
                Some(("group", name)) if !name.is_empty() => Ok(PrincipalRef::group(name)),
                Some(("function", name)) if !name.is_empty() => Ok(PrincipalRef::function(name)),
                _ => Err(ResourcesError::InvalidPrincipal(s.to_string())),
            },
        }
    }
}

impl TryFrom<String> for PrincipalRef {
    type Error = ResourcesError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<PrincipalRef> for String {
    fn from(value: PrincipalRef) -> Self {
        value.to_string()
    }
}

impl fmt::Display for PrincipalRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PrincipalRef::AuthenticatedUsers => f.write_str("authenticated"),
            PrincipalRef::UnauthenticatedUsers => f.write_str("unauthenticated"),
            PrincipalRef::Group(name) => write!(f, "group:{}", name),
            PrincipalRef::Function(name) => write!(f, "function:{}", name),
        }
    }
}

/// Coarse grouping of IAM actions by service prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionCategory {
    /// `execute-api:*`
    ApiInvocation,
    /// Identity, directory administration and role assumption; reserved for
    /// function execution roles.
    FunctionExecution,
    /// Query engines, data catalogs and data-lake permissions.
    Analytics,
    /// Object storage.
    Storage,
    Other,
}

impl ActionCategory {
    pub fn of(action: &str) -> Self {
        let service = action.split(':').next().unwrap_or_default();
        match service {
            "execute-api" => ActionCategory::ApiInvocation,
            "cognito-identity" | "cognito-idp" | "sts" => ActionCategory::FunctionExecution,
            "athena" | "glue" | "lakeformation" => ActionCategory::Analytics,
            "s3" => ActionCategory::Storage,
            _ => ActionCategory::Other,
        }
    }

    /// Whether `action` can grant actions of this category. A bare `*`
    /// spans every service.
    pub fn is_granted_by(self, action: &str) -> bool {
        action == "*" || Self::of(action) == self
    }
}

/// Checks the shape of an IAM action name (`service:Action`, `*` allowed).
pub fn validate_action(action: &str) -> bool {
    if action == "*" {
        return true;
    }
    match action.split_once(':') {
        Some((service, name)) => {
            !service.is_empty()
                && !name.is_empty()
                && service
                    .chars()
                    .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
                && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '*')
        }
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resource_pattern_parsing() {
        assert_eq!("*".parse::<ResourcePattern>().unwrap(), ResourcePattern::Any);
        assert_eq!(
            "execute-api:*:/items/*".parse::<ResourcePattern>().unwrap(),
            ResourcePattern::execute_api(None, "/items/*")
        );
        assert_eq!(
            "execute-api:GET:/items".parse::<ResourcePattern>().unwrap(),
            ResourcePattern::execute_api(Some(HttpMethod::Get), "/items")
        );
        assert_eq!(
            "arn:aws:s3:::bucket/*".parse::<ResourcePattern>().unwrap(),
            ResourcePattern::Arn("arn:aws:s3:::bucket/*".into())
        );
        assert!("execute-api:GET:items".parse::<ResourcePattern>().is_err());
        assert!("bucket".parse::<ResourcePattern>().is_err());
        assert!("arn:aws:s3:::\"quoted\"".parse::<ResourcePattern>().is_err());
    }

    #[test]
    fn test_resource_pattern_display_matches_parse() {
        for text in ["*", "execute-api:*:/cognito-auth-path", "arn:aws:sqs:*:1:q"] {
            let pattern: ResourcePattern = text.parse().unwrap();
            assert_eq!(pattern.to_string(), text);
        }
    }

    #[test]
    fn test_render_execute_api_pattern() {
        let env = Environment::new("123456789012", "ap-northeast-1");
        let pattern = ResourcePattern::execute_api(None, "/items/*");
        assert_eq!(
            pattern.render(&env, "a1b2c3", "dev"),
            "arn:aws:execute-api:ap-northeast-1:123456789012:a1b2c3/dev/*/items/*"
        );
        assert_eq!(ResourcePattern::Any.render(&env, "a1b2c3", "dev"), "*");
    }

    #[test]
    fn test_principal_ref_parsing() {
        assert_eq!(
            "authenticated".parse::<PrincipalRef>().unwrap(),
            PrincipalRef::AuthenticatedUsers
        );
        assert_eq!(
            "group:test1".parse::<PrincipalRef>().unwrap(),
            PrincipalRef::group("test1")
        );
        assert_eq!(
            "function:lakeformation".parse::<PrincipalRef>().unwrap(),
            PrincipalRef::function("lakeformation")
        );
        assert!("group:".parse::<PrincipalRef>().is_err());
        assert!("admins".parse::<PrincipalRef>().is_err());
        assert!(!PrincipalRef::function("f").is_directory_principal());
    }

    #[test]
    fn test_action_categories() {
        assert_eq!(ActionCategory::of("execute-api:Invoke"), ActionCategory::ApiInvocation);
        assert_eq!(ActionCategory::of("sts:AssumeRole"), ActionCategory::FunctionExecution);
        assert_eq!(
            ActionCategory::of("cognito-idp:AdminGetUser"),
            ActionCategory::FunctionExecution
        );
        assert_eq!(ActionCategory::of("glue:GetTable"), ActionCategory::Analytics);
        assert_eq!(ActionCategory::of("s3:PutObject"), ActionCategory::Storage);
        assert_eq!(ActionCategory::of("dynamodb:GetItem"), ActionCategory::Other);
        assert!(ActionCategory::FunctionExecution.is_granted_by("*"));
        assert!(ActionCategory::FunctionExecution.is_granted_by("sts:*"));
        assert!(!ActionCategory::FunctionExecution.is_granted_by("athena:*"));

        let statement = PolicyStatement::allow(
            ["s3:GetObject", "athena:GetQueryResults", "s3:PutObject"],
            vec![ResourcePattern::Any],
        );
        assert_eq!(
            statement.categories(),
            vec![ActionCategory::Analytics, ActionCategory::Storage]
        );
        assert!(statement.has_wildcard_resource());
    }

    #[test]
    fn test_action_validation() {
        assert!(validate_action("execute-api:Invoke"));
        assert!(validate_action("s3:Get*"));
        assert!(validate_action("*"));
        assert!(!validate_action("Invoke"));
        assert!(!validate_action("s3:"));
        assert!(!validate_action("S3:GetObject"));
    }

    #[test]
    fn test_statement_yaml() {
        let yaml = r#"
actions: [execute-api:Invoke]
resources:
  - execute-api:*:/items
  - "*"
"#;
        let statement: PolicyStatement = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(statement.effect, Effect::Allow);
        assert_eq!(statement.resources.len(), 2);
        assert!(statement.has_wildcard_resource());
    }
}
