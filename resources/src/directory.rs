//! User directory and data service declarations. Both are leaf resources.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Attribute users sign in with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoginMechanism {
    #[default]
    Email,
    Phone,
    Username,
}

/// A managed user directory with its identity pool and named groups.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UserDirectory {
    pub name: String,
    #[serde(default)]
    pub login: LoginMechanism,
    #[serde(default)]
    pub groups: Vec<String>,
    /// Whether guests receive credentials from the identity pool.
    #[serde(default = "default_allow_guests")]
    pub allow_unauthenticated: bool,
}

fn default_allow_guests() -> bool {
    true
}

impl UserDirectory {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            login: LoginMechanism::default(),
            groups: Vec::new(),
            allow_unauthenticated: default_allow_guests(),
        }
    }

    pub fn with_group(mut self, group: impl Into<String>) -> Self {
        self.groups.push(group.into());
        self
    }

    pub fn has_group(&self, group: &str) -> bool {
        self.groups.iter().any(|g| g == group)
    }
}

/// Default authorization of the data API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataAuthorization {
    #[default]
    ApiKey,
    UserPool,
    Iam,
}

impl DataAuthorization {
    pub fn appsync_type(&self) -> &'static str {
        match self {
            DataAuthorization::ApiKey => "API_KEY",
            DataAuthorization::UserPool => "AMAZON_COGNITO_USER_POOLS",
            DataAuthorization::Iam => "AWS_IAM",
        }
    }
}

/// Scalar field types of a data model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    String,
    Int,
    Float,
    Boolean,
    Datetime,
}

impl FieldKind {
    pub fn graphql_type(&self) -> &'static str {
        match self {
            FieldKind::String => "String",
            FieldKind::Int => "Int",
            FieldKind::Float => "Float",
            FieldKind::Boolean => "Boolean",
            FieldKind::Datetime => "AWSDateTime",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DataModel {
    pub name: String,
    pub fields: BTreeMap<String, FieldKind>,
}

impl DataModel {
    /// GraphQL type definition for this model.
    pub fn to_graphql(&self) -> String {
        let mut sdl = format!("type {} @model {{\n  id: ID!\n", self.name);
        for (field, kind) in &self.fields {
            sdl.push_str(&format!("  {}: {}\n", field, kind.graphql_type()));
        }
        sdl.push('}');
        sdl
    }
}

/// The managed structured-data service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DataResource {
    pub name: String,
    #[serde(default)]
    pub default_authorization: DataAuthorization,
    #[serde(default = "default_key_expiry")]
    pub api_key_expires_in_days: u32,
    #[serde(default)]
    pub models: Vec<DataModel>,
}

fn default_key_expiry() -> u32 {
    30
}

impl DataResource {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            default_authorization: DataAuthorization::default(),
            api_key_expires_in_days: default_key_expiry(),
            models: Vec::new(),
        }
    }

    pub fn schema(&self) -> String {
        self.models
            .iter()
            .map(DataModel::to_graphql)
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_directory_groups() {
        let directory = UserDirectory::new("amplifyAuth").with_group("test1");
        assert!(directory.has_group("test1"));
        assert!(!directory.has_group("admins"));
        assert_eq!(directory.login, LoginMechanism::Email);
        assert!(directory.allow_unauthenticated);
    }

    #[test]
    fn test_model_schema() {
        let mut fields = BTreeMap::new();
        fields.insert("content".to_string(), FieldKind::String);
        fields.insert("done".to_string(), FieldKind::Boolean);
        let mut data = DataResource::new("data");
        data.models.push(DataModel {
            name: "Todo".into(),
            fields,
        });

        let schema = data.schema();
        assert!(schema.starts_with("type Todo @model {"));
        assert!(schema.contains("  content: String\n"));
        assert!(schema.contains("  done: Boolean\n"));
        assert_eq!(data.default_authorization.appsync_type(), "API_KEY");
    }
}
