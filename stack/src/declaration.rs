use crate::builder::BackendBuilder;
use crate::error::{Result, StackError};
use resources::{
    AuthorizationMode, Authorizer, DataModel, DataResource, Environment, FieldKind,
    FunctionDefinition, HttpMethod, MethodBinding, Policy, PolicyStatement, PrincipalRef,
    ProxyBinding, ResourcePath, ResourcePattern, RestApiDefinition, UserDirectory,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::env;
use std::path::Path;
use tracing::{debug, info};

/// Environment variables that override the declared deployment target.
pub const ACCOUNT_ENV: &str = "CDK_DEFAULT_ACCOUNT";
pub const REGION_ENV: &str = "CDK_DEFAULT_REGION";

/// A policy together with the principals it is attached to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PolicyDeclaration {
    pub name: String,
    pub statements: Vec<PolicyStatement>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attach_to: Vec<PrincipalRef>,
}

/// The whole backend as written in a YAML declaration file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Declaration {
    pub name: String,
    pub environment: Environment,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth: Option<UserDirectory>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<DataResource>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub functions: Vec<FunctionDefinition>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api: Option<RestApiDefinition>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub policies: Vec<PolicyDeclaration>,
}

impl Declaration {
    /// Parses a declaration. Within one file every function and policy name
    /// must be unique; replacing by name is a builder feature, not a file one.
    pub fn from_yaml(content: &str) -> Result<Self> {
        let declaration: Self = serde_yaml::from_str(content)?;
        check_unique("function", declaration.functions.iter().map(|f| f.name.as_str()))?;
        check_unique("policy", declaration.policies.iter().map(|p| p.name.as_str()))?;
        Ok(declaration)
    }

    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Loads a declaration file.
    ///
    /// Relative function sources are resolved against the file's directory,
    /// and the deployment target may be overridden from the environment.
    pub async fn load(path: &Path) -> Result<Self> {
        debug!("Loading declaration from: {:?}", path);

        let content = std::fs::read_to_string(path).map_err(|e| {
            StackError::Declaration(format!("Failed to read {}: {}", path.display(), e))
        })?;
        let mut declaration = Self::from_yaml(&content)?;

        if let Some(base) = path.parent() {
            declaration.rebase(base);
        }
        declaration.apply_env_overrides();

        info!("Loaded declaration '{}' from {:?}", declaration.name, path);
        Ok(declaration)
    }

    /// Makes relative function source directories relative to `base`.
    pub fn rebase(&mut self, base: &Path) {
        for function in &mut self.functions {
            if function.source.is_relative() {
                function.source = base.join(&function.source);
            }
        }
    }

    pub fn apply_env_overrides(&mut self) {
        if let Ok(account) = env::var(ACCOUNT_ENV) {
            if !account.is_empty() {
                debug!("Overriding account from {}", ACCOUNT_ENV);
                self.environment.account = account;
            }
        }
        if let Ok(region) = env::var(REGION_ENV) {
            if !region.is_empty() {
                debug!("Overriding region from {}", REGION_ENV);
                self.environment.region = region;
            }
        }
    }

    pub fn into_builder(self) -> BackendBuilder {
        let mut builder = BackendBuilder::new(self.name, self.environment);
        if let Some(auth) = self.auth {
            builder = builder.auth(auth);
        }
        if let Some(data) = self.data {
            builder = builder.data(data);
        }
        for function in self.functions {
            builder = builder.function(function);
        }
        if let Some(api) = self.api {
            builder = builder.rest_api(api);
        }
        for policy in self.policies {
            for principal in &policy.attach_to {
                builder = builder.attach(policy.name.clone(), principal.clone());
            }
            builder = builder.policy(Policy::new(policy.name, policy.statements));
        }
        builder
    }

    /// The Athena/Lake Formation backend this tool was written for: a REST
    /// API in front of one Python function, with a user directory whose
    /// `test1` group may run analytics queries.
    pub fn reference() -> Self {
        let function = "lakeformation";

        let mut todo_fields = BTreeMap::new();
        todo_fields.insert("content".to_string(), FieldKind::String);
        let mut data = DataResource::new("data");
        data.models.push(DataModel {
            name: "Todo".to_string(),
            fields: todo_fields,
        });

        let mut api = RestApiDefinition::new("myRestApi");
        api.authorizers.push(Authorizer {
            name: "CognitoAuth".to_string(),
            directory: "amplifyAuth".to_string(),
        });
        api.paths.push(
            ResourcePath::new("items")
                .with_default_authorization(AuthorizationMode::Iam)
                .method(MethodBinding::new(HttpMethod::Get, function))
                .method(MethodBinding::new(HttpMethod::Post, function))
                .method(MethodBinding::new(HttpMethod::Delete, function))
                .method(MethodBinding::new(HttpMethod::Put, function))
                .proxy(ProxyBinding::new(function)),
        );
        api.paths.push(
            ResourcePath::new("cognito-auth-path")
                .method(MethodBinding::new(HttpMethod::Get, function).with_cognito("CognitoAuth")),
        );

        let invoke = PolicyDeclaration {
            name: "RestApiPolicy".to_string(),
            statements: vec![PolicyStatement::allow(
                ["execute-api:Invoke"],
                vec![
                    ResourcePattern::execute_api(None, "/items"),
                    ResourcePattern::execute_api(None, "/items/*"),
                    ResourcePattern::execute_api(None, "/cognito-auth-path"),
                ],
            )],
            attach_to: vec![
                PrincipalRef::AuthenticatedUsers,
                PrincipalRef::UnauthenticatedUsers,
            ],
        };

        // Wildcard resources are kept as declared and reported at finalize.
        let function_role = PolicyDeclaration {
            name: "lakeformationFunctionPolicy".to_string(),
            statements: vec![PolicyStatement::allow(
                [
                    "cognito-identity:GetCredentialsForIdentity",
                    "cognito-identity:GetId",
                    "cognito-idp:AdminGetUser",
                    "cognito-idp:AdminListGroupsForUser",
                    "sts:AssumeRole",
                ],
                vec![ResourcePattern::Any],
            )],
            attach_to: vec![PrincipalRef::function(function)],
        };

        let analytics = PolicyDeclaration {
            name: "CognitoGroupPolicy".to_string(),
            statements: vec![PolicyStatement::allow(
                [
                    "athena:StartQueryExecution",
                    "athena:GetQueryExecution",
                    "athena:GetQueryResults",
                    "lakeformation:GetDataAccess",
                    "lakeformation:ListPermissions",
                    "glue:GetTable",
                    "glue:GetDatabase",
                    "s3:GetBucketLocation",
                    "s3:GetObject",
                    "s3:ListBucket",
                    "s3:PutObject",
                ],
                vec![ResourcePattern::Any],
            )],
            attach_to: vec![PrincipalRef::group("test1")],
        };

        Self {
            name: "lakeformation-backend".to_string(),
            environment: Environment::new("123456789012", "ap-northeast-1"),
            auth: Some(UserDirectory::new("amplifyAuth").with_group("test1")),
            data: Some(data),
            functions: vec![FunctionDefinition::new(
                function,
                "amplify/functions/lakeformation",
            )],
            api: Some(api),
            policies: vec![invoke, function_role, analytics],
        }
    }
}

fn check_unique<'a>(kind: &str, names: impl Iterator<Item = &'a str>) -> Result<()> {
    let mut seen = HashSet::new();
    for name in names {
        if !seen.insert(name) {
            return Err(StackError::Declaration(format!(
                "{} '{}' is declared more than once",
                kind, name
            )));
        }
    }
    Ok(())
}
