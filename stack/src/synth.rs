//! Renders a finalized backend as a provisioning template.
//!
//! The output is a CloudFormation-shaped JSON document. Keys are ordered, so
//! synthesizing the same backend twice yields byte-identical output.

use crate::backend::{Backend, Route, PROXY_SEGMENT};
use crate::error::Result;
use resources::{
    AuthorizationMode, DataAuthorization, Effect, FunctionDefinition, HttpMethod, PolicyStatement,
    PrincipalRef, ResourcePath, ResourcePattern, RestApiDefinition, UserDirectory,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, info};

pub const TEMPLATE_FORMAT_VERSION: &str = "2010-09-09";
const POLICY_VERSION: &str = "2012-10-17";
const IDENTITY_SERVICE: &str = "cognito-identity.amazonaws.com";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Template {
    #[serde(rename = "AWSTemplateFormatVersion")]
    pub format_version: String,
    #[serde(rename = "Description")]
    pub description: String,
    #[serde(rename = "Parameters", default, skip_serializing_if = "BTreeMap::is_empty")]
    pub parameters: BTreeMap<String, Value>,
    #[serde(rename = "Resources")]
    pub resources: BTreeMap<String, Value>,
    #[serde(rename = "Outputs", default, skip_serializing_if = "BTreeMap::is_empty")]
    pub outputs: BTreeMap<String, Value>,
    /// Logical IDs added more than once while rendering.
    #[serde(skip)]
    collisions: Vec<String>,
}

impl Template {
    fn new(description: String) -> Self {
        Self {
            format_version: TEMPLATE_FORMAT_VERSION.to_string(),
            description,
            parameters: BTreeMap::new(),
            resources: BTreeMap::new(),
            outputs: BTreeMap::new(),
            collisions: Vec::new(),
        }
    }

    /// Type of a logical resource (`AWS::...`), if present.
    pub fn resource_type(&self, logical_id: &str) -> Option<&str> {
        self.resources.get(logical_id)?.get("Type")?.as_str()
    }

    pub fn resources_of_type<'a>(&'a self, ty: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.resources
            .iter()
            .filter(move |(_, v)| v.get("Type").and_then(Value::as_str) == Some(ty))
            .map(|(k, _)| k.as_str())
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(content: &str) -> Result<Self> {
        Ok(serde_json::from_str(content)?)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, self.to_json_pretty()?)?;
        info!("Wrote template to {:?}", path);
        Ok(())
    }

    fn add(&mut self, logical_id: impl Into<String>, resource: Value) {
        let logical_id = logical_id.into();
        if self.resources.contains_key(&logical_id) {
            self.collisions.push(logical_id.clone());
        }
        self.resources.insert(logical_id, resource);
    }
}

/// Inputs that are only known once other build steps have run.
#[derive(Debug, Clone, Default)]
pub struct SynthOptions {
    /// Bundle digest per function name, used as the code object key.
    pub asset_digests: BTreeMap<String, String>,
}

pub fn synthesize(backend: &Backend) -> Template {
    synthesize_with(backend, &SynthOptions::default())
}

pub fn synthesize_with(backend: &Backend, options: &SynthOptions) -> Template {
    let template = render(backend, options);
    info!(
        "Synthesized backend '{}' into {} resources",
        backend.name(),
        template.resources.len()
    );
    template
}

/// Logical IDs that more than one declared resource maps to, e.g. a policy
/// named `lakeformation-function` next to the `lakeformation` function.
pub(crate) fn logical_id_collisions(backend: &Backend) -> Vec<String> {
    let mut collisions = render(backend, &SynthOptions::default()).collisions;
    collisions.dedup();
    collisions
}

fn render(backend: &Backend, options: &SynthOptions) -> Template {
    let mut template = Template::new(format!("Backend '{}'", backend.name()));
    let ctx = Context { backend };

    if let Some(auth) = backend.auth() {
        ctx.add_directory(&mut template, auth);
    }
    if backend.data().is_some() {
        ctx.add_data(&mut template);
    }
    for function in backend.functions() {
        ctx.add_function(&mut template, function, options);
    }
    if let Some(api) = backend.api() {
        ctx.add_api(&mut template, api);
    }
    ctx.add_policies(&mut template);
    template
}

/// Builds a logical ID from arbitrary names: `cognito-auth-path` becomes
/// `CognitoAuthPath`, `{proxy+}` becomes `Proxy`.
pub fn logical_id(parts: &[&str]) -> String {
    let mut id = String::new();
    for part in parts {
        for word in part.split(|c: char| !c.is_ascii_alphanumeric()) {
            let mut chars = word.chars();
            if let Some(first) = chars.next() {
                id.push(first.to_ascii_uppercase());
                id.extend(chars);
            }
        }
    }
    id
}

fn reference(logical_id: &str) -> Value {
    json!({ "Ref": logical_id })
}

fn get_att(logical_id: &str, attribute: &str) -> Value {
    json!({ "Fn::GetAtt": [logical_id, attribute] })
}

fn join(parts: Vec<Value>) -> Value {
    json!({ "Fn::Join": ["", parts] })
}

/// Mapping template echoing the request origin when it is one of the
/// allowed origins after the first. The first is the static header value.
fn origin_selector(origins: &[String]) -> Option<String> {
    if origins.len() < 2 {
        return None;
    }
    let condition = origins[1..]
        .iter()
        .map(|o| format!("$origin == \"{}\"", o))
        .collect::<Vec<_>>()
        .join(" || ");
    Some(
        [
            "#set($origin = $input.params().header.get(\"Origin\"))".to_string(),
            "#if($origin == \"\")".to_string(),
            "  #set($origin = $input.params().header.get(\"origin\"))".to_string(),
            "#end".to_string(),
            format!("#if({})", condition),
            "  #set($context.responseOverride.header.Access-Control-Allow-Origin = $origin)"
                .to_string(),
            "#end".to_string(),
        ]
        .join("\n"),
    )
}

struct Context<'a> {
    backend: &'a Backend,
}

impl Context<'_> {
    fn directory_id(&self, suffix: &str) -> String {
        let name = self.backend.auth().map(|a| a.name.as_str()).unwrap_or("Auth");
        logical_id(&[name, suffix])
    }

    fn api_id(&self) -> String {
        let name = self.backend.api().map(|a| a.name.as_str()).unwrap_or("RestApi");
        logical_id(&[name])
    }

    /// Role logical ID backing a principal.
    fn role_id(&self, principal: &PrincipalRef) -> String {
        match principal {
            PrincipalRef::AuthenticatedUsers => self.directory_id("AuthenticatedUserRole"),
            PrincipalRef::UnauthenticatedUsers => self.directory_id("UnauthenticatedUserRole"),
            PrincipalRef::Group(group) => self.directory_id(&format!("{}GroupRole", logical_id(&[group]))),
            PrincipalRef::Function(function) => logical_id(&[function, "ServiceRole"]),
        }
    }

    fn function_id(&self, name: &str) -> String {
        logical_id(&[name, "Function"])
    }

    fn execute_api_arn(&self, method: &str, path: &str) -> Value {
        let env = self.backend.environment();
        let stage = self.backend.stage().unwrap_or("*");
        join(vec![
            json!("arn:"),
            reference("AWS::Partition"),
            json!(format!(":execute-api:{}:{}:", env.region, env.account)),
            reference(&self.api_id()),
            json!(format!("/{}/{}{}", stage, method, path)),
        ])
    }

    fn identity_trust(&self, amr: &str) -> Value {
        json!({
            "Version": POLICY_VERSION,
            "Statement": [{
                "Effect": "Allow",
                "Principal": { "Federated": IDENTITY_SERVICE },
                "Action": "sts:AssumeRoleWithWebIdentity",
                "Condition": {
                    "StringEquals": {
                        "cognito-identity.amazonaws.com:aud": reference(&self.directory_id("IdentityPool"))
                    },
                    "ForAnyValue:StringLike": { "cognito-identity.amazonaws.com:amr": amr }
                }
            }]
        })
    }

    fn add_directory(&self, template: &mut Template, auth: &UserDirectory) {
        let pool = self.directory_id("UserPool");
        let client = self.directory_id("UserPoolClient");
        let identity_pool = self.directory_id("IdentityPool");

        let (username_attributes, auto_verified) = match auth.login {
            resources::LoginMechanism::Email => (json!(["email"]), json!(["email"])),
            resources::LoginMechanism::Phone => (json!(["phone_number"]), json!(["phone_number"])),
            resources::LoginMechanism::Username => (json!([]), json!([])),
        };

        template.add(
            &pool,
            json!({
                "Type": "AWS::Cognito::UserPool",
                "Properties": {
                    "UserPoolName": auth.name,
                    "UsernameAttributes": username_attributes,
                    "AutoVerifiedAttributes": auto_verified
                }
            }),
        );
        template.add(
            &client,
            json!({
                "Type": "AWS::Cognito::UserPoolClient",
                "Properties": {
                    "UserPoolId": reference(&pool),
                    "GenerateSecret": false
                }
            }),
        );
        template.add(
            &identity_pool,
            json!({
                "Type": "AWS::Cognito::IdentityPool",
                "Properties": {
                    "AllowUnauthenticatedIdentities": auth.allow_unauthenticated,
                    "CognitoIdentityProviders": [{
                        "ClientId": reference(&client),
                        "ProviderName": get_att(&pool, "ProviderName")
                    }]
                }
            }),
        );

        let authenticated = self.role_id(&PrincipalRef::AuthenticatedUsers);
        template.add(
            &authenticated,
            json!({
                "Type": "AWS::IAM::Role",
                "Properties": { "AssumeRolePolicyDocument": self.identity_trust("authenticated") }
            }),
        );

        let mut roles = Map::new();
        roles.insert("authenticated".to_string(), get_att(&authenticated, "Arn"));
        if auth.allow_unauthenticated {
            let unauthenticated = self.role_id(&PrincipalRef::UnauthenticatedUsers);
            template.add(
                &unauthenticated,
                json!({
                    "Type": "AWS::IAM::Role",
                    "Properties": { "AssumeRolePolicyDocument": self.identity_trust("unauthenticated") }
                }),
            );
            roles.insert("unauthenticated".to_string(), get_att(&unauthenticated, "Arn"));
        }
        template.add(
            self.directory_id("IdentityPoolRoleAttachment"),
            json!({
                "Type": "AWS::Cognito::IdentityPoolRoleAttachment",
                "Properties": {
                    "IdentityPoolId": reference(&identity_pool),
                    "Roles": Value::Object(roles)
                }
            }),
        );

        for (precedence, group) in auth.groups.iter().enumerate() {
            let role = self.role_id(&PrincipalRef::group(group));
            template.add(
                &role,
                json!({
                    "Type": "AWS::IAM::Role",
                    "Properties": { "AssumeRolePolicyDocument": self.identity_trust("authenticated") }
                }),
            );
            template.add(
                self.directory_id(&format!("{}Group", logical_id(&[group]))),
                json!({
                    "Type": "AWS::Cognito::UserPoolGroup",
                    "Properties": {
                        "GroupName": group,
                        "UserPoolId": reference(&pool),
                        "RoleArn": get_att(&role, "Arn"),
                        "Precedence": precedence
                    }
                }),
            );
        }

        template.outputs.insert(
            "UserPoolId".to_string(),
            json!({ "Value": reference(&pool) }),
        );
        template.outputs.insert(
            "IdentityPoolId".to_string(),
            json!({ "Value": reference(&identity_pool) }),
        );
    }

    fn add_data(&self, template: &mut Template) {
        let Some(data) = self.backend.data() else {
            return;
        };
        let api = logical_id(&[&data.name, "GraphQLApi"]);

        let mut properties = json!({
            "Name": data.name,
            "AuthenticationType": data.default_authorization.appsync_type()
        });
        if data.default_authorization == DataAuthorization::UserPool {
            properties["UserPoolConfig"] = json!({
                "UserPoolId": reference(&self.directory_id("UserPool")),
                "AwsRegion": self.backend.environment().region,
                "DefaultAction": "ALLOW"
            });
        }
        template.add(
            &api,
            json!({ "Type": "AWS::AppSync::GraphQLApi", "Properties": properties }),
        );
        template.add(
            logical_id(&[&data.name, "GraphQLSchema"]),
            json!({
                "Type": "AWS::AppSync::GraphQLSchema",
                "Properties": {
                    "ApiId": get_att(&api, "ApiId"),
                    "Definition": data.schema()
                }
            }),
        );
        if data.default_authorization == DataAuthorization::ApiKey {
            template.add(
                logical_id(&[&data.name, "ApiKey"]),
                json!({
                    "Type": "AWS::AppSync::ApiKey",
                    "Properties": {
                        "ApiId": get_att(&api, "ApiId"),
                        "Description": format!("Expires {} days after deployment", data.api_key_expires_in_days)
                    }
                }),
            );
        }
    }

    fn add_function(&self, template: &mut Template, function: &FunctionDefinition, options: &SynthOptions) {
        let role = self.role_id(&PrincipalRef::function(&function.name));
        template.add(
            &role,
            json!({
                "Type": "AWS::IAM::Role",
                "Properties": {
                    "AssumeRolePolicyDocument": {
                        "Version": POLICY_VERSION,
                        "Statement": [{
                            "Effect": "Allow",
                            "Principal": { "Service": "lambda.amazonaws.com" },
                            "Action": "sts:AssumeRole"
                        }]
                    },
                    "ManagedPolicyArns": [join(vec![
                        json!("arn:"),
                        reference("AWS::Partition"),
                        json!(":iam::aws:policy/service-role/AWSLambdaBasicExecutionRole"),
                    ])]
                }
            }),
        );

        let key = match options.asset_digests.get(&function.name) {
            Some(digest) => format!("{}.zip", digest),
            None => format!("{}.zip", function.name),
        };
        template.parameters.insert(
            "AssetBucket".to_string(),
            json!({ "Type": "String", "Description": "Bucket holding function bundles" }),
        );
        template.add(
            self.function_id(&function.name),
            json!({
                "Type": "AWS::Lambda::Function",
                "Properties": {
                    "Handler": function.handler,
                    "Runtime": function.runtime.identifier(),
                    "Timeout": function.timeout_seconds,
                    "Role": get_att(&role, "Arn"),
                    "Code": { "S3Bucket": reference("AssetBucket"), "S3Key": key }
                },
                "DependsOn": [role],
                "Metadata": { "asset:path": function.source.display().to_string() }
            }),
        );
    }

    fn add_api(&self, template: &mut Template, api: &RestApiDefinition) {
        let api_id = self.api_id();
        template.add(
            &api_id,
            json!({ "Type": "AWS::ApiGateway::RestApi", "Properties": { "Name": api.name } }),
        );

        // Root preflight, then every declared resource.
        let mut methods = vec![self.add_preflight(
            template,
            api,
            &api_id,
            get_att(&api_id, "RootResourceId"),
        )];
        for path in &api.paths {
            self.add_resource(
                template,
                api,
                path,
                &[],
                get_att(&api_id, "RootResourceId"),
                &mut methods,
            );
        }

        for authorizer in &api.authorizers {
            template.add(
                logical_id(&[&authorizer.name]),
                json!({
                    "Type": "AWS::ApiGateway::Authorizer",
                    "Properties": {
                        "Name": authorizer.name,
                        "Type": "COGNITO_USER_POOLS",
                        "IdentitySource": "method.request.header.Authorization",
                        "RestApiId": reference(&api_id),
                        "ProviderARNs": [get_att(&self.directory_id("UserPool"), "Arn")]
                    }
                }),
            );
        }

        for route in self.backend.routes() {
            methods.push(self.add_method(template, route));
        }

        let deployment = logical_id(&[&api.name, "Deployment"]);
        template.add(
            &deployment,
            json!({
                "Type": "AWS::ApiGateway::Deployment",
                "Properties": { "RestApiId": reference(&api_id) },
                "DependsOn": methods
            }),
        );
        template.add(
            logical_id(&[&api.name, "DeploymentStage", &api.stage]),
            json!({
                "Type": "AWS::ApiGateway::Stage",
                "Properties": {
                    "RestApiId": reference(&api_id),
                    "DeploymentId": reference(&deployment),
                    "StageName": api.stage
                }
            }),
        );

        let env = self.backend.environment();
        template.outputs.insert(
            logical_id(&[&api.name, "Endpoint"]),
            json!({
                "Value": join(vec![
                    json!("https://"),
                    reference(&api_id),
                    json!(format!(".execute-api.{}.{}/{}/", env.region, env.url_suffix(), api.stage)),
                ])
            }),
        );
        template.outputs.insert(
            logical_id(&[&api.name, "Region"]),
            json!({ "Value": env.region }),
        );
        template.outputs.insert(
            logical_id(&[&api.name, "Name"]),
            json!({ "Value": api.name }),
        );
    }

    fn add_resource(
        &self,
        template: &mut Template,
        api: &RestApiDefinition,
        node: &ResourcePath,
        parents: &[&str],
        parent_id: Value,
        preflights: &mut Vec<String>,
    ) {
        let mut segments = parents.to_vec();
        segments.push(&node.segment);
        let resource_id = self.resource_id(&segments);
        template.add(
            &resource_id,
            json!({
                "Type": "AWS::ApiGateway::Resource",
                "Properties": {
                    "ParentId": parent_id,
                    "PathPart": node.segment,
                    "RestApiId": reference(&self.api_id())
                }
            }),
        );
        preflights.push(self.add_preflight(template, api, &resource_id, reference(&resource_id)));

        if node.proxy.is_some() {
            let mut proxy_segments = segments.clone();
            proxy_segments.push(PROXY_SEGMENT);
            let proxy_id = self.resource_id(&proxy_segments);
            template.add(
                &proxy_id,
                json!({
                    "Type": "AWS::ApiGateway::Resource",
                    "Properties": {
                        "ParentId": reference(&resource_id),
                        "PathPart": PROXY_SEGMENT,
                        "RestApiId": reference(&self.api_id())
                    }
                }),
            );
            preflights.push(self.add_preflight(template, api, &proxy_id, reference(&proxy_id)));
        }

        for child in &node.children {
            self.add_resource(
                template,
                api,
                child,
                &segments,
                reference(&resource_id),
                preflights,
            );
        }
    }

    fn resource_id(&self, segments: &[&str]) -> String {
        let mut parts = vec![self.api_id()];
        parts.extend(segments.iter().map(|s| logical_id(&[s])));
        parts.concat()
    }

    /// CORS preflight: an unauthenticated `OPTIONS` mock method.
    fn add_preflight(
        &self,
        template: &mut Template,
        api: &RestApiDefinition,
        owner: &str,
        resource: Value,
    ) -> String {
        let cors = &api.cors;
        let origins = cors.origins();
        let mut response_parameters = Map::new();
        response_parameters.insert(
            "method.response.header.Access-Control-Allow-Headers".to_string(),
            json!(format!("'{}'", cors.headers().join(","))),
        );
        response_parameters.insert(
            "method.response.header.Access-Control-Allow-Origin".to_string(),
            json!(format!("'{}'", origins.first().map(String::as_str).unwrap_or("*"))),
        );
        response_parameters.insert(
            "method.response.header.Access-Control-Allow-Methods".to_string(),
            json!(format!("'{}'", cors.methods().join(","))),
        );
        if origins.first().is_some_and(|o| o != "*") {
            response_parameters.insert("method.response.header.Vary".to_string(), json!("'Origin'"));
        }
        let response_flags: Map<String, Value> = response_parameters
            .keys()
            .map(|k| (k.clone(), Value::Bool(true)))
            .collect();

        let mut integration_response = json!({
            "StatusCode": "204",
            "ResponseParameters": Value::Object(response_parameters)
        });
        if let Some(selector) = origin_selector(&origins) {
            integration_response["ResponseTemplates"] = json!({ "application/json": selector });
        }

        let method_id = format!("{}OPTIONS", owner);
        template.add(
            &method_id,
            json!({
                "Type": "AWS::ApiGateway::Method",
                "Properties": {
                    "HttpMethod": "OPTIONS",
                    "ResourceId": resource,
                    "RestApiId": reference(&self.api_id()),
                    "AuthorizationType": AuthorizationMode::None.gateway_type(),
                    "Integration": {
                        "Type": "MOCK",
                        "RequestTemplates": { "application/json": "{ statusCode: 200 }" },
                        "IntegrationResponses": [integration_response]
                    },
                    "MethodResponses": [{
                        "StatusCode": "204",
                        "ResponseParameters": Value::Object(response_flags)
                    }]
                }
            }),
        );
        method_id
    }

    fn add_method(&self, template: &mut Template, route: &Route) -> String {
        let segments = route.segments();
        let resource_id = self.resource_id(&segments);
        let method_id = format!("{}{}", resource_id, route.method);
        let function_arn = get_att(&self.function_id(&route.function), "Arn");
        let env = self.backend.environment();

        let mut properties = json!({
            "HttpMethod": route.method.as_str(),
            "ResourceId": reference(&resource_id),
            "RestApiId": reference(&self.api_id()),
            "AuthorizationType": route.authorization.gateway_type(),
            "Integration": {
                "Type": "AWS_PROXY",
                "IntegrationHttpMethod": "POST",
                "Uri": join(vec![
                    json!("arn:"),
                    reference("AWS::Partition"),
                    json!(format!(":apigateway:{}:lambda:path/2015-03-31/functions/", env.region)),
                    function_arn.clone(),
                    json!("/invocations"),
                ])
            }
        });
        if let Some(authorizer) = &route.authorizer {
            properties["AuthorizerId"] = reference(&logical_id(&[authorizer]));
        }
        template.add(
            &method_id,
            json!({ "Type": "AWS::ApiGateway::Method", "Properties": properties }),
        );

        let verb = match route.method {
            HttpMethod::Any => "*",
            other => other.as_str(),
        };
        template.add(
            format!("{}Permission", method_id),
            json!({
                "Type": "AWS::Lambda::Permission",
                "Properties": {
                    "Action": "lambda:InvokeFunction",
                    "FunctionName": function_arn,
                    "Principal": "apigateway.amazonaws.com",
                    "SourceArn": self.execute_api_arn(verb, &route.arn_path())
                }
            }),
        );
        debug!("Synthesized method {}", route);
        method_id
    }

    fn add_policies(&self, template: &mut Template) {
        for policy in self.backend.policies() {
            let mut roles: Vec<String> = self
                .backend
                .attachments()
                .iter()
                .filter(|a| a.policy == policy.name)
                .map(|a| self.role_id(&a.principal))
                .collect();
            if roles.is_empty() {
                debug!("Skipping unattached policy '{}'", policy.name);
                continue;
            }
            roles.dedup();

            let statements: Vec<Value> = policy
                .statements
                .iter()
                .map(|s| self.statement(s))
                .collect();
            let roles: Vec<Value> = roles.iter().map(|r| reference(r)).collect();
            template.add(
                logical_id(&[&policy.name]),
                json!({
                    "Type": "AWS::IAM::Policy",
                    "Properties": {
                        "PolicyName": policy.name,
                        "PolicyDocument": { "Version": POLICY_VERSION, "Statement": statements },
                        "Roles": roles
                    }
                }),
            );
        }
    }

    fn statement(&self, statement: &PolicyStatement) -> Value {
        let resources: Vec<Value> = statement
            .resources
            .iter()
            .map(|r| match r {
                ResourcePattern::Any => json!("*"),
                ResourcePattern::Arn(arn) => json!(arn),
                ResourcePattern::ExecuteApi { method, path } => {
                    let verb = (*method)
                        .filter(|m| *m != HttpMethod::Any)
                        .map(|m| m.as_str())
                        .unwrap_or("*");
                    self.execute_api_arn(verb, path)
                }
            })
            .collect();
        let effect = match statement.effect {
            Effect::Allow => "Allow",
            Effect::Deny => "Deny",
        };
        json!({
            "Effect": effect,
            "Action": statement.actions,
            "Resource": resources
        })
    }
}
