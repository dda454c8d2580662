//! Translation of a backend's attached IAM statements into Cedar.
//!
//! Every attachment of a statement to a principal becomes one Cedar policy
//! scoped to that principal's role. IAM wildcards (`*`) in actions and
//! resource ARNs map directly onto Cedar's `like` patterns; the requested
//! action travels in the request context because IAM actions may be
//! wildcarded while Cedar action entities cannot.

use crate::error::{AuthzError, Result};
use cedar_policy::{Entities, EntityId, EntityTypeName, EntityUid, PolicySet};
use resources::{Effect, Environment, PolicyStatement, PrincipalRef};
use stack::Backend;
use std::str::FromStr;
use tracing::debug;

pub(crate) const ROLE_TYPE: &str = "Role";
pub(crate) const ACTION_TYPE: &str = "Action";
pub(crate) const RESOURCE_TYPE: &str = "Resource";
/// Id of the single resource entity each request is evaluated against.
pub(crate) const TARGET_ID: &str = "target";

/// Escapes a value for use inside a Cedar string literal.
fn quote(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}

/// Renders every attached statement of `backend` as Cedar policy text.
pub(crate) fn policy_text(backend: &Backend, api_id: &str) -> String {
    let env = backend.environment();
    let stage = backend.stage().unwrap_or("*");
    let mut text = String::new();

    for attachment in backend.attachments() {
        let Some(policy) = backend.policy(&attachment.policy) else {
            continue;
        };
        for statement in &policy.statements {
            text.push_str(&statement_text(&attachment.principal, statement, env, api_id, stage));
            text.push('\n');
        }
    }
    text
}

fn statement_text(
    principal: &PrincipalRef,
    statement: &PolicyStatement,
    env: &Environment,
    api_id: &str,
    stage: &str,
) -> String {
    let effect = match statement.effect {
        Effect::Allow => "permit",
        Effect::Deny => "forbid",
    };
    // IAM action names are case-insensitive.
    let actions = statement
        .actions
        .iter()
        .map(|a| format!("context.action like \"{}\"", quote(&a.to_ascii_lowercase())))
        .collect::<Vec<_>>()
        .join(" || ");
    let resources = statement
        .resources
        .iter()
        .map(|r| format!("resource.arn like \"{}\"", quote(&r.render(env, api_id, stage))))
        .collect::<Vec<_>>()
        .join(" || ");

    format!(
        "{}(principal == {}::\"{}\", action, resource) when {{ ({}) && ({}) }};",
        effect,
        ROLE_TYPE,
        quote(&principal.to_string()),
        actions,
        resources
    )
}

pub(crate) fn policy_set(backend: &Backend, api_id: &str) -> Result<PolicySet> {
    let text = policy_text(backend, api_id);
    if text.is_empty() {
        return Ok(PolicySet::new());
    }
    debug!("Generated Cedar policies:\n{}", text);
    PolicySet::from_str(&text).map_err(|e| AuthzError::PolicyParse(e.to_string()))
}

/// Role entities for every principal plus the resource being requested.
pub(crate) fn entities(principals: &[PrincipalRef], resource_arn: &str) -> Result<Entities> {
    let mut entities: Vec<serde_json::Value> = principals
        .iter()
        .map(|p| {
            serde_json::json!({
                "uid": { "type": ROLE_TYPE, "id": p.to_string() },
                "attrs": {},
                "parents": []
            })
        })
        .collect();
    entities.push(serde_json::json!({
        "uid": { "type": RESOURCE_TYPE, "id": TARGET_ID },
        "attrs": { "arn": resource_arn },
        "parents": []
    }));

    Entities::from_json_value(serde_json::Value::Array(entities), None)
        .map_err(|e| AuthzError::EntityCreation(e.to_string()))
}

pub(crate) fn entity_uid(entity_type: &str, id: &str) -> Result<EntityUid> {
    let type_name = EntityTypeName::from_str(entity_type).map_err(|e| {
        AuthzError::EntityCreation(format!("Invalid entity type {}: {}", entity_type, e))
    })?;
    Ok(EntityUid::from_type_name_and_id(type_name, EntityId::new(id)))
}
