//! Cedar-based prediction of gateway access decisions.
//!
//! Given a finalized backend and the id its REST API was deployed under,
//! `AccessEvaluator` answers two kinds of questions before anything is live:
//!
//! - would the gateway let this caller make this HTTP call, and which
//!   function would it reach?
//! - does the policy attached to a principal allow an IAM action on a
//!   resource ARN?
//!
//! Route resolution follows the gateway: an exact resource path wins, and a
//! `{proxy+}` resource is only used when no declared path matches. The
//! evaluator never serves traffic.
//!
//! # Example
//!
//! ```rust
//! use authz::{AccessContext, AccessEvaluator, AccessRequest, Caller};
//! use resources::{HttpMethod, PrincipalRef};
//! use stack::Declaration;
//!
//! let backend = Declaration::reference().into_builder().finalize().unwrap();
//! let evaluator = AccessEvaluator::new(&backend, AccessContext::new("a1b2c3")).unwrap();
//!
//! let request = AccessRequest::new(
//!     HttpMethod::Get,
//!     "/items",
//!     Caller::Signed(PrincipalRef::AuthenticatedUsers),
//! );
//! assert!(evaluator.evaluate(&request).unwrap().is_allowed());
//! ```

pub mod error;
mod policies;
pub mod types;

pub use error::{AuthzError, Result};
pub use types::{AccessContext, AccessDecision, AccessRequest, Caller, Reason};

use cedar_policy::{Authorizer, Context, Decision, PolicySet, Request};
use policies::{ACTION_TYPE, RESOURCE_TYPE, ROLE_TYPE, TARGET_ID};
use resources::{AuthorizationMode, ExecuteApiArn, HttpMethod, PrincipalRef, ResourcePath};
use stack::{Backend, Route, PROXY_SEGMENT};
use std::collections::BTreeSet;
use tracing::{debug, info};

pub const INVOKE_ACTION: &str = "execute-api:Invoke";

pub struct AccessEvaluator {
    authorizer: Authorizer,
    policies: PolicySet,
    backend: Backend,
    api_id: String,
    /// Every declared resource path, including proxy resources.
    resource_paths: BTreeSet<String>,
}

impl AccessEvaluator {
    pub fn new(backend: &Backend, context: AccessContext) -> Result<Self> {
        let api_id = context.api_id;
        if api_id.is_empty() || !api_id.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(AuthzError::EntityCreation(format!(
                "Invalid API id '{}'",
                api_id
            )));
        }

        let policies = policies::policy_set(backend, &api_id)?;
        let mut resource_paths = BTreeSet::new();
        if let Some(api) = backend.api() {
            for path in &api.paths {
                collect_paths(path, "", &mut resource_paths);
            }
        }
        info!(
            "Access evaluator ready for '{}' ({} resource paths)",
            backend.name(),
            resource_paths.len()
        );

        Ok(Self {
            authorizer: Authorizer::new(),
            policies,
            backend: backend.clone(),
            api_id,
            resource_paths,
        })
    }

    /// Predicts the gateway's answer to `request`.
    pub fn evaluate(&self, request: &AccessRequest) -> Result<AccessDecision> {
        let api = self.backend.api().ok_or(AuthzError::NoApi)?;
        let path = normalize(&request.path)?;

        let Some(route) = self.resolve(request.method, &path) else {
            debug!("No route for {} {}", request.method, path);
            return Ok(AccessDecision::rejected(Reason::MissingAuthenticationToken));
        };
        let allowed = AccessDecision::Allowed {
            function: route.function.clone(),
        };

        let decision = match (route.authorization, &request.caller) {
            (AuthorizationMode::Iam, Caller::Signed(principal)) => {
                let arn = ExecuteApiArn::new(
                    self.backend.environment(),
                    &self.api_id,
                    &api.stage,
                    Some(request.method),
                    &path,
                )
                .to_string();
                if self.is_action_allowed(principal, INVOKE_ACTION, &arn)? {
                    allowed
                } else {
                    AccessDecision::rejected(Reason::Forbidden)
                }
            }
            (AuthorizationMode::Iam, _) => AccessDecision::rejected(Reason::Unauthorized),
            (AuthorizationMode::Cognito, Caller::DirectoryToken { directory }) => {
                let accepted = route
                    .authorizer
                    .as_deref()
                    .and_then(|name| api.authorizer(name))
                    .is_some_and(|a| &a.directory == directory);
                if accepted {
                    allowed
                } else {
                    AccessDecision::rejected(Reason::Unauthorized)
                }
            }
            (AuthorizationMode::Cognito, _) => AccessDecision::rejected(Reason::Unauthorized),
            // Unreachable for finalized backends; the gateway would pass it through.
            (AuthorizationMode::None, _) => allowed,
        };

        info!(
            "{} {} ({}) via {}: {}",
            request.method, path, request.caller, route, decision
        );
        Ok(decision)
    }

    /// Whether the statements attached to `principal` allow `action` on
    /// `resource_arn`. An explicit deny wins over any allow.
    pub fn is_action_allowed(
        &self,
        principal: &PrincipalRef,
        action: &str,
        resource_arn: &str,
    ) -> Result<bool> {
        let entities = policies::entities(&self.backend.principals(), resource_arn)?;
        let context = Context::from_json_value(
            serde_json::json!({ "action": action.to_ascii_lowercase() }),
            None,
        )
        .map_err(|e| AuthzError::EvaluationError(e.to_string()))?;

        let request = Request::new(
            Some(policies::entity_uid(ROLE_TYPE, &principal.to_string())?),
            Some(policies::entity_uid(ACTION_TYPE, action)?),
            Some(policies::entity_uid(RESOURCE_TYPE, TARGET_ID)?),
            context,
            None,
        )
        .map_err(|e| AuthzError::EvaluationError(e.to_string()))?;

        let response = self
            .authorizer
            .is_authorized(&request, &self.policies, &entities);
        let allowed = response.decision() == Decision::Allow;
        debug!(
            "{} -> {} on {}: {}",
            principal,
            action,
            resource_arn,
            if allowed { "allow" } else { "deny" }
        );
        Ok(allowed)
    }

    /// Finds the route the gateway would dispatch to. A declared resource
    /// path is matched exactly; otherwise the deepest enclosing proxy wins.
    fn resolve(&self, method: HttpMethod, path: &str) -> Option<&Route> {
        if self.resource_paths.contains(path) {
            return self.route_at(method, path);
        }

        let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        for depth in (0..segments.len()).rev() {
            let prefix: String = segments[..depth].iter().map(|s| format!("/{}", s)).collect();
            let proxy = format!("{}/{}", prefix, PROXY_SEGMENT);
            if self.resource_paths.contains(&proxy) {
                return self.route_at(method, &proxy);
            }
        }
        None
    }

    /// An explicit verb binding wins over `ANY` on the same resource.
    fn route_at(&self, method: HttpMethod, path: &str) -> Option<&Route> {
        let mut at_path = self.backend.routes().iter().filter(|r| r.path == path);
        at_path
            .clone()
            .find(|r| r.method == method)
            .or_else(|| at_path.find(|r| r.method == HttpMethod::Any))
    }
}

fn collect_paths(node: &ResourcePath, parent: &str, paths: &mut BTreeSet<String>) {
    let path = format!("{}/{}", parent, node.segment);
    if node.proxy.is_some() {
        paths.insert(format!("{}/{}", path, PROXY_SEGMENT));
    }
    for child in &node.children {
        collect_paths(child, &path, paths);
    }
    paths.insert(path);
}

/// Collapses repeated and trailing slashes: `/items//42/` becomes `/items/42`.
fn normalize(path: &str) -> Result<String> {
    if !path.starts_with('/') {
        return Err(AuthzError::InvalidPath(path.to_string()));
    }
    if path.contains('"') || path.contains('\\') {
        return Err(AuthzError::InvalidPath(path.to_string()));
    }
    let normalized: String = path
        .split('/')
        .filter(|s| !s.is_empty())
        .map(|s| format!("/{}", s))
        .collect();
    if normalized.is_empty() {
        Ok("/".to_string())
    } else {
        Ok(normalized)
    }
}
