//! Compares a previously synthesized template with a new one.

use crate::synth::Template;
use serde::Serialize;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use tracing::{debug, info, warn};

/// Impact of a change on the deployed backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeCategory {
    /// New resources; nothing existing is touched.
    Safe,
    /// Updated in place; behavior or permissions may change.
    Warning,
    /// Deleted or replaced; state in the old resource is lost.
    Breaking,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    Add,
    Modify,
    Replace,
    Remove,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Change {
    pub logical_id: String,
    pub resource_type: String,
    pub kind: ChangeKind,
    pub category: ChangeCategory,
    /// Top-level properties that differ, for modifications.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub properties: Vec<String>,
}

impl fmt::Display for Change {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let verb = match self.kind {
            ChangeKind::Add => "add",
            ChangeKind::Modify => "modify",
            ChangeKind::Replace => "replace",
            ChangeKind::Remove => "remove",
        };
        write!(f, "{} {} ({})", verb, self.logical_id, self.resource_type)?;
        if !self.properties.is_empty() {
            write!(f, " [{}]", self.properties.join(", "))?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Plan {
    pub changes: Vec<Change>,
}

impl Plan {
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn has_breaking(&self) -> bool {
        self.changes
            .iter()
            .any(|c| c.category == ChangeCategory::Breaking)
    }

    pub fn by_category(&self, category: ChangeCategory) -> impl Iterator<Item = &Change> {
        self.changes.iter().filter(move |c| c.category == category)
    }
}

/// Properties whose update forces the provider to recreate the resource.
const REPLACEMENT_PROPERTIES: &[(&str, &str)] = &[
    ("AWS::Cognito::UserPool", "UsernameAttributes"),
    ("AWS::Cognito::UserPoolGroup", "GroupName"),
    ("AWS::Cognito::UserPoolGroup", "UserPoolId"),
    ("AWS::ApiGateway::Resource", "PathPart"),
    ("AWS::ApiGateway::Resource", "ParentId"),
    ("AWS::ApiGateway::Stage", "StageName"),
    ("AWS::IAM::Role", "RoleName"),
];

/// Diffs two templates resource by resource. `previous` is `None` for a
/// first deployment.
pub fn plan(previous: Option<&Template>, next: &Template) -> Plan {
    let mut plan = Plan::default();
    let empty = BTreeMap::new();
    let old_resources = previous.map(|t| &t.resources).unwrap_or(&empty);

    for (id, resource) in &next.resources {
        match old_resources.get(id) {
            None => plan.changes.push(Change {
                logical_id: id.clone(),
                resource_type: resource_type(resource),
                kind: ChangeKind::Add,
                category: ChangeCategory::Safe,
                properties: Vec::new(),
            }),
            Some(old) if old != resource => plan.changes.push(modification(id, old, resource)),
            Some(_) => {}
        }
    }

    for (id, resource) in old_resources {
        if !next.resources.contains_key(id) {
            plan.changes.push(Change {
                logical_id: id.clone(),
                resource_type: resource_type(resource),
                kind: ChangeKind::Remove,
                category: ChangeCategory::Breaking,
                properties: Vec::new(),
            });
        }
    }

    plan.changes
        .sort_by(|a, b| b.category.cmp(&a.category).then(a.logical_id.cmp(&b.logical_id)));

    for change in plan.by_category(ChangeCategory::Breaking) {
        warn!("Breaking change: {}", change);
    }
    info!("Planned {} changes", plan.changes.len());
    plan
}

fn resource_type(resource: &Value) -> String {
    resource
        .get("Type")
        .and_then(Value::as_str)
        .unwrap_or("Unknown")
        .to_string()
}

fn modification(id: &str, old: &Value, new: &Value) -> Change {
    let old_type = resource_type(old);
    let new_type = resource_type(new);

    if old_type != new_type {
        debug!("{} changed type from {} to {}", id, old_type, new_type);
        return Change {
            logical_id: id.to_string(),
            resource_type: new_type,
            kind: ChangeKind::Replace,
            category: ChangeCategory::Breaking,
            properties: vec!["Type".to_string()],
        };
    }

    let properties = changed_properties(old.get("Properties"), new.get("Properties"));
    let replaces = properties.iter().any(|p| {
        REPLACEMENT_PROPERTIES
            .iter()
            .any(|(ty, prop)| *ty == new_type.as_str() && *prop == p.as_str())
    });

    let (kind, category) = if replaces {
        (ChangeKind::Replace, ChangeCategory::Breaking)
    } else {
        (ChangeKind::Modify, ChangeCategory::Warning)
    };
    Change {
        logical_id: id.to_string(),
        resource_type: new_type,
        kind,
        category,
        properties,
    }
}

fn changed_properties(old: Option<&Value>, new: Option<&Value>) -> Vec<String> {
    let old = old.and_then(Value::as_object);
    let new = new.and_then(Value::as_object);
    let keys: BTreeSet<&String> = old
        .into_iter()
        .flat_map(|m| m.keys())
        .chain(new.into_iter().flat_map(|m| m.keys()))
        .collect();

    keys.into_iter()
        .filter(|k| old.and_then(|m| m.get(*k)) != new.and_then(|m| m.get(*k)))
        .cloned()
        .collect()
}
