use crate::backend::{Attachment, Backend, Route, ValidationWarning, PROXY_SEGMENT};
use crate::error::{Result, StackError};
use crate::synth::logical_id_collisions;
use resources::{
    validate_action, validate_segment, ActionCategory, AuthorizationMode, DataResource, Effect,
    Environment, FunctionDefinition, HttpMethod, Policy, PrincipalRef, ResourcePath,
    ResourcePattern, RestApiDefinition, UserDirectory, MAX_TIMEOUT_SECONDS,
};
use std::collections::HashSet;
use tracing::{debug, info, warn};

/// Accumulates backend declarations until `finalize` turns them into an
/// immutable `Backend`.
///
/// Functions and policies are keyed by name: declaring one again replaces
/// the earlier declaration, which is how a redeploy picks up new contents.
#[derive(Debug, Clone)]
pub struct BackendBuilder {
    name: String,
    environment: Environment,
    auth: Option<UserDirectory>,
    data: Option<DataResource>,
    functions: Vec<FunctionDefinition>,
    api: Option<RestApiDefinition>,
    policies: Vec<Policy>,
    attachments: Vec<Attachment>,
}

impl BackendBuilder {
    pub fn new(name: impl Into<String>, environment: Environment) -> Self {
        Self {
            name: name.into(),
            environment,
            auth: None,
            data: None,
            functions: Vec::new(),
            api: None,
            policies: Vec::new(),
            attachments: Vec::new(),
        }
    }

    pub fn auth(mut self, directory: UserDirectory) -> Self {
        self.auth = Some(directory);
        self
    }

    pub fn data(mut self, data: DataResource) -> Self {
        self.data = Some(data);
        self
    }

    pub fn function(mut self, function: FunctionDefinition) -> Self {
        if let Some(existing) = self.functions.iter_mut().find(|f| f.name == function.name) {
            debug!("Replacing function declaration '{}'", function.name);
            *existing = function;
        } else {
            self.functions.push(function);
        }
        self
    }

    pub fn rest_api(mut self, api: RestApiDefinition) -> Self {
        self.api = Some(api);
        self
    }

    pub fn policy(mut self, policy: Policy) -> Self {
        if let Some(existing) = self.policies.iter_mut().find(|p| p.name == policy.name) {
            debug!("Replacing policy declaration '{}'", policy.name);
            *existing = policy;
        } else {
            self.policies.push(policy);
        }
        self
    }

    /// Attaches a named policy to a principal. Attaching twice is a no-op.
    pub fn attach(mut self, policy: impl Into<String>, principal: PrincipalRef) -> Self {
        let attachment = Attachment {
            policy: policy.into(),
            principal,
        };
        if !self.attachments.contains(&attachment) {
            self.attachments.push(attachment);
        }
        self
    }

    /// Validates every declaration and cross-reference.
    ///
    /// Any error here is a fatal configuration error: nothing has been
    /// synthesized and nothing should be deployed.
    pub fn finalize(self) -> Result<Backend> {
        info!("Finalizing backend '{}'", self.name);

        self.check_directory_required()?;
        self.check_functions()?;

        let routes = match &self.api {
            Some(api) => flatten_routes(api)?,
            None => Vec::new(),
        };
        self.check_routes(&routes)?;
        self.check_policies()?;
        self.check_attachments()?;

        let warnings = self.collect_warnings();
        for warning in &warnings {
            warn!("{}", warning);
        }

        let backend = Backend {
            name: self.name,
            environment: self.environment,
            auth: self.auth,
            data: self.data,
            functions: self.functions,
            api: self.api,
            routes,
            policies: self.policies,
            attachments: self.attachments,
            warnings,
        };

        // Names are flattened into template logical IDs; two resources must
        // not end up under the same one.
        if let Some(logical_id) = logical_id_collisions(&backend).into_iter().next() {
            return Err(StackError::LogicalIdCollision(logical_id));
        }

        info!(
            "Backend '{}' finalized: {} routes, {} policies, {} attachments",
            backend.name,
            backend.routes.len(),
            backend.policies.len(),
            backend.attachments.len()
        );
        Ok(backend)
    }

    fn check_directory_required(&self) -> Result<()> {
        if self.auth.is_some() {
            return Ok(());
        }
        if let Some(api) = &self.api {
            if let Some(authorizer) = api.authorizers.first() {
                return Err(StackError::MissingResource(format!(
                    "user directory '{}' required by authorizer '{}'",
                    authorizer.directory, authorizer.name
                )));
            }
        }
        if let Some(attachment) = self
            .attachments
            .iter()
            .find(|a| a.principal.is_directory_principal())
        {
            return Err(StackError::MissingResource(format!(
                "user directory required by principal '{}'",
                attachment.principal
            )));
        }
        Ok(())
    }

    fn check_functions(&self) -> Result<()> {
        for function in &self.functions {
            if function.timeout_seconds == 0 || function.timeout_seconds > MAX_TIMEOUT_SECONDS {
                return Err(StackError::InvalidFunction {
                    function: function.name.clone(),
                    reason: format!(
                        "timeout must be between 1 and {} seconds, got {}",
                        MAX_TIMEOUT_SECONDS, function.timeout_seconds
                    ),
                });
            }
            if !function.handler.contains('.') {
                return Err(StackError::InvalidFunction {
                    function: function.name.clone(),
                    reason: format!("handler '{}' is not of the form module.function", function.handler),
                });
            }
        }
        Ok(())
    }

    fn check_routes(&self, routes: &[Route]) -> Result<()> {
        let Some(api) = &self.api else {
            return Ok(());
        };

        for authorizer in &api.authorizers {
            // Checked by check_directory_required when no directory exists.
            if let Some(auth) = &self.auth {
                if authorizer.directory != auth.name {
                    return Err(StackError::ForeignAuthorizer {
                        authorizer: authorizer.name.clone(),
                        bound: authorizer.directory.clone(),
                        expected: auth.name.clone(),
                    });
                }
            }
        }

        let mut seen = HashSet::new();
        for route in routes {
            let invalid = |reason: &str| StackError::InvalidRoute {
                method: route.method.to_string(),
                path: route.path.clone(),
                reason: reason.to_string(),
            };

            if !seen.insert((route.path.as_str(), route.method)) {
                return Err(StackError::DuplicateRoute {
                    method: route.method.to_string(),
                    path: route.path.clone(),
                });
            }

            if route.method == HttpMethod::Options {
                return Err(invalid("OPTIONS is reserved for the CORS preflight"));
            }

            if !self.functions.iter().any(|f| f.name == route.function) {
                return Err(StackError::UnknownFunction(route.function.clone()));
            }

            match (route.authorization, &route.authorizer) {
                (AuthorizationMode::None, _) => {
                    return Err(StackError::Unauthorized {
                        method: route.method.to_string(),
                        path: route.path.clone(),
                    });
                }
                (AuthorizationMode::Cognito, None) => {
                    return Err(invalid(
                        "directory-token authorization requires an authorizer",
                    ));
                }
                (AuthorizationMode::Cognito, Some(name)) => {
                    if api.authorizer(name).is_none() {
                        return Err(StackError::UnknownAuthorizer(name.clone()));
                    }
                }
                (AuthorizationMode::Iam, Some(_)) => {
                    return Err(invalid(
                        "an authorizer can only be used with directory-token authorization",
                    ));
                }
                (AuthorizationMode::Iam, None) => {}
            }
        }
        Ok(())
    }

    fn check_policies(&self) -> Result<()> {
        for policy in &self.policies {
            let invalid = |reason: String| StackError::InvalidPolicy {
                policy: policy.name.clone(),
                reason,
            };

            if policy.name.is_empty() {
                return Err(invalid("policy name cannot be empty".to_string()));
            }
            if policy.statements.is_empty() {
                return Err(invalid("policy has no statements".to_string()));
            }
            for statement in &policy.statements {
                if statement.actions.is_empty() {
                    return Err(invalid("statement has no actions".to_string()));
                }
                if let Some(action) = statement.actions.iter().find(|a| !validate_action(a)) {
                    return Err(invalid(format!("malformed action '{}'", action)));
                }
                if statement.resources.is_empty() {
                    return Err(invalid("statement has no resources".to_string()));
                }
                let targets_api = statement
                    .resources
                    .iter()
                    .any(|r| matches!(r, ResourcePattern::ExecuteApi { .. }));
                if targets_api && self.api.is_none() {
                    return Err(invalid(
                        "execute-api resources require a REST API".to_string(),
                    ));
                }
            }
        }
        Ok(())
    }

    fn check_attachments(&self) -> Result<()> {
        for attachment in &self.attachments {
            let policy = self
                .policies
                .iter()
                .find(|p| p.name == attachment.policy)
                .ok_or_else(|| StackError::UnknownPolicy(attachment.policy.clone()))?;

            match &attachment.principal {
                PrincipalRef::AuthenticatedUsers => {}
                PrincipalRef::UnauthenticatedUsers => {
                    let guests = self.auth.as_ref().is_some_and(|a| a.allow_unauthenticated);
                    if !guests {
                        return Err(StackError::MissingResource(
                            "unauthenticated role (guest access is disabled)".to_string(),
                        ));
                    }
                }
                PrincipalRef::Group(group) => {
                    // A directory exists: check_directory_required ran first.
                    if let Some(auth) = &self.auth {
                        if !auth.has_group(group) {
                            return Err(StackError::UnknownGroup {
                                group: group.clone(),
                                directory: auth.name.clone(),
                            });
                        }
                    }
                    let reserved = policy
                        .statements
                        .iter()
                        .filter(|s| s.effect == Effect::Allow)
                        .flat_map(|s| s.actions.iter())
                        .find(|a| ActionCategory::FunctionExecution.is_granted_by(a));
                    if let Some(action) = reserved {
                        return Err(StackError::SeparationOfConcerns {
                            policy: policy.name.clone(),
                            group: group.clone(),
                            action: action.to_string(),
                        });
                    }
                }
                PrincipalRef::Function(function) => {
                    if !self.functions.iter().any(|f| &f.name == function) {
                        return Err(StackError::UnknownFunction(function.clone()));
                    }
                }
            }
        }
        Ok(())
    }

    fn collect_warnings(&self) -> Vec<ValidationWarning> {
        let mut warnings = Vec::new();
        if let Some(api) = &self.api {
            if api.cors.is_permissive() {
                warnings.push(ValidationWarning::PermissiveCors {
                    api: api.name.clone(),
                });
            }
        }
        for policy in &self.policies {
            if policy.statements.iter().any(|s| s.has_wildcard_resource()) {
                warnings.push(ValidationWarning::WildcardResource {
                    policy: policy.name.clone(),
                });
            }
            if !self.attachments.iter().any(|a| a.policy == policy.name) {
                warnings.push(ValidationWarning::UnattachedPolicy {
                    policy: policy.name.clone(),
                });
            }
        }
        warnings
    }
}

/// Expands the resource tree into effective routes.
///
/// Authorization defaults flow from a path to its children and proxy; a
/// method's own setting wins. Anything left unset is `None`, which
/// `finalize` rejects.
pub(crate) fn flatten_routes(api: &RestApiDefinition) -> Result<Vec<Route>> {
    let mut routes = Vec::new();
    for path in &api.paths {
        flatten_path(path, "", None, &mut routes)?;
    }
    Ok(routes)
}

fn flatten_path(
    node: &ResourcePath,
    prefix: &str,
    inherited: Option<AuthorizationMode>,
    routes: &mut Vec<Route>,
) -> Result<()> {
    validate_segment(&node.segment)?;
    let path = format!("{}/{}", prefix, node.segment);
    let default = node.authorization.or(inherited);

    for binding in &node.methods {
        routes.push(Route {
            path: path.clone(),
            method: binding.method,
            function: binding.function.clone(),
            authorization: binding
                .authorization
                .or(default)
                .unwrap_or(AuthorizationMode::None),
            authorizer: binding.authorizer.clone(),
            proxy: false,
        });
    }

    if let Some(proxy) = &node.proxy {
        if proxy.any_method {
            routes.push(Route {
                path: format!("{}/{}", path, PROXY_SEGMENT),
                method: HttpMethod::Any,
                function: proxy.function.clone(),
                authorization: proxy
                    .authorization
                    .or(default)
                    .unwrap_or(AuthorizationMode::None),
                authorizer: proxy.authorizer.clone(),
                proxy: true,
            });
        }
    }

    for child in &node.children {
        flatten_path(child, &path, default, routes)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::declaration::Declaration;
    use resources::{Authorizer, MethodBinding, PolicyStatement, ProxyBinding};

    fn reference() -> BackendBuilder {
        Declaration::reference().into_builder()
    }

    fn env() -> Environment {
        Environment::new("123456789012", "ap-northeast-1")
    }

    fn minimal_api(path: ResourcePath) -> RestApiDefinition {
        let mut api = RestApiDefinition::new("myRestApi");
        api.paths.push(path);
        api
    }

    #[test]
    fn test_reference_backend_finalizes() {
        let backend = reference().finalize().unwrap();
        assert_eq!(backend.routes().len(), 6);
        assert_eq!(backend.policies().len(), 3);
        assert_eq!(backend.stage(), Some("dev"));
    }

    #[test]
    fn test_every_route_requires_authorization() {
        let backend = reference().finalize().unwrap();
        for route in backend.routes() {
            assert_ne!(route.authorization, AuthorizationMode::None, "{}", route);
        }
    }

    #[test]
    fn test_proxy_shares_items_integration() {
        let backend = reference().finalize().unwrap();
        let proxy = backend
            .route(HttpMethod::Any, "/items/{proxy+}")
            .expect("proxy route");
        assert!(proxy.proxy);
        assert_eq!(proxy.authorization, AuthorizationMode::Iam);
        for method in [HttpMethod::Get, HttpMethod::Post, HttpMethod::Put, HttpMethod::Delete] {
            let route = backend.route(method, "/items").unwrap();
            assert_eq!(route.function, proxy.function);
            assert_eq!(route.authorization, AuthorizationMode::Iam);
        }
    }

    #[test]
    fn test_cognito_route_uses_directory_authorizer() {
        let backend = reference().finalize().unwrap();
        let route = backend.route(HttpMethod::Get, "/cognito-auth-path").unwrap();
        assert_eq!(route.authorization, AuthorizationMode::Cognito);
        let authorizer = backend
            .api()
            .and_then(|api| api.authorizer(route.authorizer.as_deref().unwrap()))
            .unwrap();
        assert_eq!(authorizer.directory, backend.auth().unwrap().name);
    }

    #[test]
    fn test_group_policy_is_analytics_and_storage_only() {
        let backend = reference().finalize().unwrap();
        let policies = backend.attachments_for(&PrincipalRef::group("test1"));
        assert_eq!(policies.len(), 1);
        for action in policies[0].actions() {
            let category = ActionCategory::of(action);
            assert!(
                matches!(category, ActionCategory::Analytics | ActionCategory::Storage),
                "unexpected action {}",
                action
            );
        }
    }

    #[test]
    fn test_wildcard_resources_are_warnings() {
        let backend = reference().finalize().unwrap();
        let wildcard: Vec<_> = backend
            .warnings()
            .iter()
            .filter_map(|w| match w {
                ValidationWarning::WildcardResource { policy } => Some(policy.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(wildcard, vec!["lakeformationFunctionPolicy", "CognitoGroupPolicy"]);
        assert!(backend
            .warnings()
            .contains(&ValidationWarning::PermissiveCors { api: "myRestApi".into() }));
    }

    #[test]
    fn test_unknown_group_is_fatal() {
        let result = reference().attach("CognitoGroupPolicy", PrincipalRef::group("admins")).finalize();
        assert!(matches!(result, Err(StackError::UnknownGroup { group, .. }) if group == "admins"));
    }

    #[test]
    fn test_group_cannot_receive_function_actions() {
        let result = reference()
            .attach("lakeformationFunctionPolicy", PrincipalRef::group("test1"))
            .finalize();
        assert!(matches!(
            result,
            Err(StackError::SeparationOfConcerns { action, .. }) if action.starts_with("cognito-identity:")
        ));
    }

    #[test]
    fn test_group_cannot_receive_wildcard_actions() {
        let everything = Policy::new(
            "Everything",
            vec![PolicyStatement::allow(["*"], vec![ResourcePattern::Any])],
        );
        let result = reference()
            .policy(everything)
            .attach("Everything", PrincipalRef::group("test1"))
            .finalize();
        assert!(matches!(
            result,
            Err(StackError::SeparationOfConcerns { action, .. }) if action == "*"
        ));
    }

    #[test]
    fn test_group_may_be_denied_function_actions() {
        let mut statement = PolicyStatement::allow(["sts:*"], vec![ResourcePattern::Any]);
        statement.effect = Effect::Deny;
        let backend = reference()
            .policy(Policy::new("NoAssume", vec![statement]))
            .attach("NoAssume", PrincipalRef::group("test1"))
            .finalize()
            .unwrap();
        assert_eq!(backend.attachments_for(&PrincipalRef::group("test1")).len(), 2);
    }

    #[test]
    fn test_route_without_authorization_is_rejected() {
        let api = minimal_api(
            ResourcePath::new("open").method(MethodBinding::new(HttpMethod::Get, "lakeformation")),
        );
        let result = reference().rest_api(api).finalize();
        assert!(matches!(result, Err(StackError::Unauthorized { path, .. }) if path == "/open"));
    }

    #[test]
    fn test_explicit_none_is_rejected() {
        let api = minimal_api(
            ResourcePath::new("items")
                .with_default_authorization(AuthorizationMode::Iam)
                .method(
                    MethodBinding::new(HttpMethod::Get, "lakeformation")
                        .with_authorization(AuthorizationMode::None),
                ),
        );
        assert!(matches!(
            reference().rest_api(api).finalize(),
            Err(StackError::Unauthorized { .. })
        ));
    }

    #[test]
    fn test_children_inherit_default_authorization() {
        let api = minimal_api(
            ResourcePath::new("items")
                .with_default_authorization(AuthorizationMode::Iam)
                .child(
                    ResourcePath::new("archive")
                        .method(MethodBinding::new(HttpMethod::Get, "lakeformation"))
                        .proxy(ProxyBinding::new("lakeformation")),
                ),
        );
        let routes = flatten_routes(&api).unwrap();
        assert_eq!(routes.len(), 2);
        assert_eq!(routes[0].path, "/items/archive");
        assert_eq!(routes[0].authorization, AuthorizationMode::Iam);
        assert_eq!(routes[1].path, "/items/archive/{proxy+}");
        assert_eq!(routes[1].authorization, AuthorizationMode::Iam);
    }

    #[test]
    fn test_foreign_authorizer_is_rejected() {
        let mut api = Declaration::reference().api.unwrap();
        api.authorizers = vec![Authorizer {
            name: "CognitoAuth".into(),
            directory: "otherPool".into(),
        }];
        assert!(matches!(
            reference().rest_api(api).finalize(),
            Err(StackError::ForeignAuthorizer { bound, .. }) if bound == "otherPool"
        ));
    }

    #[test]
    fn test_cognito_without_authorizer_is_rejected() {
        let api = minimal_api(ResourcePath::new("books").method(
            MethodBinding::new(HttpMethod::Get, "lakeformation")
                .with_authorization(AuthorizationMode::Cognito),
        ));
        assert!(matches!(
            reference().rest_api(api).finalize(),
            Err(StackError::InvalidRoute { .. })
        ));
    }

    #[test]
    fn test_unknown_function_is_rejected() {
        let api = minimal_api(
            ResourcePath::new("items")
                .with_default_authorization(AuthorizationMode::Iam)
                .method(MethodBinding::new(HttpMethod::Get, "missing")),
        );
        assert!(matches!(
            reference().rest_api(api).finalize(),
            Err(StackError::UnknownFunction(name)) if name == "missing"
        ));
    }

    #[test]
    fn test_duplicate_route_is_rejected() {
        let api = minimal_api(
            ResourcePath::new("items")
                .with_default_authorization(AuthorizationMode::Iam)
                .method(MethodBinding::new(HttpMethod::Get, "lakeformation"))
                .method(MethodBinding::new(HttpMethod::Get, "lakeformation")),
        );
        assert!(matches!(
            reference().rest_api(api).finalize(),
            Err(StackError::DuplicateRoute { .. })
        ));
    }

    #[test]
    fn test_options_method_is_reserved() {
        let api = minimal_api(
            ResourcePath::new("items")
                .with_default_authorization(AuthorizationMode::Iam)
                .method(MethodBinding::new(HttpMethod::Options, "lakeformation")),
        );
        assert!(matches!(
            reference().rest_api(api).finalize(),
            Err(StackError::InvalidRoute { .. })
        ));
    }

    #[test]
    fn test_invalid_segment_is_rejected() {
        let api = minimal_api(
            ResourcePath::new("items/all")
                .with_default_authorization(AuthorizationMode::Iam)
                .method(MethodBinding::new(HttpMethod::Get, "lakeformation")),
        );
        assert!(matches!(
            reference().rest_api(api).finalize(),
            Err(StackError::Resources(_))
        ));
    }

    #[test]
    fn test_policy_name_cannot_shadow_function() {
        let policy = Policy::new(
            "lakeformation-function",
            vec![PolicyStatement::allow(["s3:GetObject"], vec![ResourcePattern::Any])],
        );
        let result = reference()
            .policy(policy)
            .attach("lakeformation-function", PrincipalRef::AuthenticatedUsers)
            .finalize();
        assert!(matches!(
            result,
            Err(StackError::LogicalIdCollision(id)) if id == "LakeformationFunction"
        ));
    }

    #[test]
    fn test_resource_names_cannot_collide() {
        // A `proxy` child lands on the same logical ID as `{proxy+}`.
        let mut api = Declaration::reference().api.unwrap();
        api.paths[0] = api.paths[0].clone().child(ResourcePath::new("proxy"));
        assert!(matches!(
            reference().rest_api(api).finalize(),
            Err(StackError::LogicalIdCollision(id)) if id == "MyRestApiItemsProxy"
        ));

        // `a-b` and `a/b` flatten to the same name.
        let mut api = Declaration::reference().api.unwrap();
        api.paths.push(ResourcePath::new("a-b"));
        api.paths.push(ResourcePath::new("a").child(ResourcePath::new("b")));
        assert!(matches!(
            reference().rest_api(api).finalize(),
            Err(StackError::LogicalIdCollision(id)) if id == "MyRestApiAB"
        ));
    }

    #[test]
    fn test_policy_redeclaration_replaces() {
        let replacement = Policy::new(
            "CognitoGroupPolicy",
            vec![PolicyStatement::allow(
                ["s3:GetObject"],
                vec!["arn:aws:s3:::dip2025/*".parse().unwrap()],
            )],
        );
        let backend = reference().policy(replacement.clone()).finalize().unwrap();
        assert_eq!(backend.policies().len(), 3);
        assert_eq!(backend.policy("CognitoGroupPolicy"), Some(&replacement));
        assert!(!backend.warnings().contains(&ValidationWarning::WildcardResource {
            policy: "CognitoGroupPolicy".into()
        }));
    }

    #[test]
    fn test_attach_is_idempotent() {
        let backend = reference()
            .attach("RestApiPolicy", PrincipalRef::AuthenticatedUsers)
            .finalize()
            .unwrap();
        let count = backend
            .attachments()
            .iter()
            .filter(|a| a.policy == "RestApiPolicy" && a.principal == PrincipalRef::AuthenticatedUsers)
            .count();
        assert_eq!(count, 1);
    }

    #[test]
    fn test_timeout_bounds() {
        let mut function = FunctionDefinition::new("lakeformation", "functions/lakeformation");
        function.timeout_seconds = 901;
        assert!(matches!(
            reference().function(function).finalize(),
            Err(StackError::InvalidFunction { .. })
        ));
    }

    #[test]
    fn test_directory_required_for_user_principals() {
        let policy = Policy::new(
            "Invoke",
            vec![PolicyStatement::allow(["execute-api:Invoke"], vec![ResourcePattern::Any])],
        );
        let result = BackendBuilder::new("b", env())
            .policy(policy)
            .attach("Invoke", PrincipalRef::AuthenticatedUsers)
            .finalize();
        assert!(matches!(result, Err(StackError::MissingResource(_))));
    }

    #[test]
    fn test_unknown_policy_attachment() {
        let result = reference()
            .attach("NoSuchPolicy", PrincipalRef::AuthenticatedUsers)
            .finalize();
        assert!(matches!(result, Err(StackError::UnknownPolicy(name)) if name == "NoSuchPolicy"));
    }

    #[test]
    fn test_guest_role_disabled() {
        let mut auth = Declaration::reference().auth.unwrap();
        auth.allow_unauthenticated = false;
        assert!(matches!(
            reference().auth(auth).finalize(),
            Err(StackError::MissingResource(_))
        ));
    }

    #[test]
    fn test_malformed_action_rejected() {
        let policy = Policy::new(
            "Broken",
            vec![PolicyStatement::allow(["Invoke"], vec![ResourcePattern::Any])],
        );
        assert!(matches!(
            reference().policy(policy).finalize(),
            Err(StackError::InvalidPolicy { .. })
        ));
    }
}
