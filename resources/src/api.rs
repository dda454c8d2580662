//! REST API surface declarations: resource paths, method bindings,
//! authorizers and CORS preflight options.

use crate::error::{ResourcesError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// HTTP verbs a method binding can be declared for.
///
/// `Any` is the gateway's catch-all verb used by proxy resources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
    Patch,
    Head,
    Options,
    Any,
}

impl HttpMethod {
    /// Every concrete verb, in the order the gateway lists them for CORS.
    pub const ALL: [HttpMethod; 7] = [
        HttpMethod::Options,
        HttpMethod::Get,
        HttpMethod::Put,
        HttpMethod::Post,
        HttpMethod::Delete,
        HttpMethod::Patch,
        HttpMethod::Head,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Delete => "DELETE",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Head => "HEAD",
            HttpMethod::Options => "OPTIONS",
            HttpMethod::Any => "ANY",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HttpMethod {
    type Err = ResourcesError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Ok(HttpMethod::Get),
            "POST" => Ok(HttpMethod::Post),
            "PUT" => Ok(HttpMethod::Put),
            "DELETE" => Ok(HttpMethod::Delete),
            "PATCH" => Ok(HttpMethod::Patch),
            "HEAD" => Ok(HttpMethod::Head),
            "OPTIONS" => Ok(HttpMethod::Options),
            "ANY" | "*" => Ok(HttpMethod::Any),
            _ => Err(ResourcesError::InvalidMethod(s.to_string())),
        }
    }
}

/// How the gateway authorizes calls to a method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthorizationMode {
    /// No authorization. Declarable, but rejected when the backend is finalized.
    None,
    /// Signed-request authorization evaluated against the caller's IAM policies.
    Iam,
    /// Directory-token authorization through a user pool authorizer.
    Cognito,
}

impl AuthorizationMode {
    /// The gateway's `AuthorizationType` value.
    pub fn gateway_type(&self) -> &'static str {
        match self {
            AuthorizationMode::None => "NONE",
            AuthorizationMode::Iam => "AWS_IAM",
            AuthorizationMode::Cognito => "COGNITO_USER_POOLS",
        }
    }
}

impl fmt::Display for AuthorizationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            AuthorizationMode::None => "none",
            AuthorizationMode::Iam => "iam",
            AuthorizationMode::Cognito => "cognito",
        };
        f.write_str(label)
    }
}

/// Headers the gateway allows by default on CORS preflight responses.
pub const DEFAULT_CORS_HEADERS: [&str; 6] = [
    "Content-Type",
    "X-Amz-Date",
    "Authorization",
    "X-Api-Key",
    "X-Amz-Security-Token",
    "X-Amz-User-Agent",
];

/// Either a keyword (`all`, `default`) or an explicit list, as written in
/// declaration files.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum KeywordOr<T> {
    Keyword(String),
    List(Vec<T>),
}

fn expect_keyword(found: &str, expected: &str) -> Result<()> {
    if found.eq_ignore_ascii_case(expected) {
        Ok(())
    } else {
        Err(ResourcesError::InvalidCors(format!(
            "expected '{}' or a list, found '{}'",
            expected, found
        )))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "KeywordOr<String>", into = "KeywordOr<String>")]
pub enum AllowOrigins {
    All,
    List(Vec<String>),
}

impl TryFrom<KeywordOr<String>> for AllowOrigins {
    type Error = ResourcesError;

    fn try_from(value: KeywordOr<String>) -> Result<Self> {
        match value {
            KeywordOr::Keyword(k) => expect_keyword(&k, "all").map(|_| AllowOrigins::All),
            KeywordOr::List(list) => Ok(AllowOrigins::List(list)),
        }
    }
}

impl From<AllowOrigins> for KeywordOr<String> {
    fn from(value: AllowOrigins) -> Self {
        match value {
            AllowOrigins::All => KeywordOr::Keyword("all".to_string()),
            AllowOrigins::List(list) => KeywordOr::List(list),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "KeywordOr<HttpMethod>", into = "KeywordOr<HttpMethod>")]
pub enum AllowMethods {
    All,
    List(Vec<HttpMethod>),
}

impl TryFrom<KeywordOr<HttpMethod>> for AllowMethods {
    type Error = ResourcesError;

    fn try_from(value: KeywordOr<HttpMethod>) -> Result<Self> {
        match value {
            KeywordOr::Keyword(k) => expect_keyword(&k, "all").map(|_| AllowMethods::All),
            KeywordOr::List(list) => Ok(AllowMethods::List(list)),
        }
    }
}

impl From<AllowMethods> for KeywordOr<HttpMethod> {
    fn from(value: AllowMethods) -> Self {
        match value {
            AllowMethods::All => KeywordOr::Keyword("all".to_string()),
            AllowMethods::List(list) => KeywordOr::List(list),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "KeywordOr<String>", into = "KeywordOr<String>")]
pub enum AllowHeaders {
    Default,
    List(Vec<String>),
}

impl TryFrom<KeywordOr<String>> for AllowHeaders {
    type Error = ResourcesError;

    fn try_from(value: KeywordOr<String>) -> Result<Self> {
        match value {
            KeywordOr::Keyword(k) => expect_keyword(&k, "default").map(|_| AllowHeaders::Default),
            KeywordOr::List(list) => Ok(AllowHeaders::List(list)),
        }
    }
}

impl From<AllowHeaders> for KeywordOr<String> {
    fn from(value: AllowHeaders) -> Self {
        match value {
            AllowHeaders::Default => KeywordOr::Keyword("default".to_string()),
            AllowHeaders::List(list) => KeywordOr::List(list),
        }
    }
}

/// CORS preflight options applied to every resource of an API.
///
/// The default is fully permissive. Narrow `allow_origins` to trusted
/// domains before deploying anywhere real.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CorsOptions {
    #[serde(default = "default_allow_origins")]
    pub allow_origins: AllowOrigins,
    #[serde(default = "default_allow_methods")]
    pub allow_methods: AllowMethods,
    #[serde(default = "default_allow_headers")]
    pub allow_headers: AllowHeaders,
}

fn default_allow_origins() -> AllowOrigins {
    AllowOrigins::All
}

fn default_allow_methods() -> AllowMethods {
    AllowMethods::All
}

fn default_allow_headers() -> AllowHeaders {
    AllowHeaders::Default
}

impl Default for CorsOptions {
    fn default() -> Self {
        Self {
            allow_origins: default_allow_origins(),
            allow_methods: default_allow_methods(),
            allow_headers: default_allow_headers(),
        }
    }
}

impl CorsOptions {
    pub fn origins(&self) -> Vec<String> {
        match &self.allow_origins {
            AllowOrigins::All => vec!["*".to_string()],
            AllowOrigins::List(origins) => origins.clone(),
        }
    }

    pub fn methods(&self) -> Vec<String> {
        match &self.allow_methods {
            AllowMethods::All => HttpMethod::ALL.iter().map(|m| m.to_string()).collect(),
            AllowMethods::List(methods) => methods.iter().map(|m| m.to_string()).collect(),
        }
    }

    pub fn headers(&self) -> Vec<String> {
        match &self.allow_headers {
            AllowHeaders::Default => DEFAULT_CORS_HEADERS.iter().map(|h| h.to_string()).collect(),
            AllowHeaders::List(headers) => headers.clone(),
        }
    }

    /// True when any origin may call the API.
    pub fn is_permissive(&self) -> bool {
        self.allow_origins == AllowOrigins::All
    }
}

/// A directory-token authorizer bound to a user directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Authorizer {
    pub name: String,
    /// Name of the user directory whose tokens this authorizer accepts.
    pub directory: String,
}

/// An HTTP verb on a resource path, integrated with a compute function.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MethodBinding {
    pub method: HttpMethod,
    /// Function the method is integrated with.
    pub function: String,
    /// Overrides the path's default authorization when set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authorization: Option<AuthorizationMode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authorizer: Option<String>,
}

impl MethodBinding {
    pub fn new(method: HttpMethod, function: impl Into<String>) -> Self {
        Self {
            method,
            function: function.into(),
            authorization: None,
            authorizer: None,
        }
    }

    /// Binds the method to a directory-token authorizer.
    pub fn with_cognito(mut self, authorizer: impl Into<String>) -> Self {
        self.authorization = Some(AuthorizationMode::Cognito);
        self.authorizer = Some(authorizer.into());
        self
    }

    pub fn with_authorization(mut self, mode: AuthorizationMode) -> Self {
        self.authorization = Some(mode);
        self
    }
}

/// Catch-all child of a resource path (`{proxy+}`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProxyBinding {
    pub function: String,
    #[serde(default = "default_any_method")]
    pub any_method: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authorization: Option<AuthorizationMode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authorizer: Option<String>,
}

fn default_any_method() -> bool {
    true
}

impl ProxyBinding {
    pub fn new(function: impl Into<String>) -> Self {
        Self {
            function: function.into(),
            any_method: true,
            authorization: None,
            authorizer: None,
        }
    }
}

/// A route segment under the API root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ResourcePath {
    #[serde(rename = "path")]
    pub segment: String,
    /// Default authorization for methods on this path and its children.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authorization: Option<AuthorizationMode>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub methods: Vec<MethodBinding>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proxy: Option<ProxyBinding>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<ResourcePath>,
}

impl ResourcePath {
    pub fn new(segment: impl Into<String>) -> Self {
        Self {
            segment: segment.into(),
            authorization: None,
            methods: Vec::new(),
            proxy: None,
            children: Vec::new(),
        }
    }

    pub fn with_default_authorization(mut self, mode: AuthorizationMode) -> Self {
        self.authorization = Some(mode);
        self
    }

    pub fn method(mut self, binding: MethodBinding) -> Self {
        self.methods.push(binding);
        self
    }

    pub fn proxy(mut self, proxy: ProxyBinding) -> Self {
        self.proxy = Some(proxy);
        self
    }

    pub fn child(mut self, child: ResourcePath) -> Self {
        self.children.push(child);
        self
    }
}

/// Checks that a path segment is a single, non-empty route component.
pub fn validate_segment(segment: &str) -> Result<()> {
    if segment.is_empty() || segment.contains('/') || segment.chars().any(char::is_whitespace) {
        return Err(ResourcesError::InvalidPathSegment(segment.to_string()));
    }
    if segment.contains('{') || segment.contains('}') {
        // Proxy segments are declared through `ProxyBinding`, never by name.
        return Err(ResourcesError::InvalidPathSegment(segment.to_string()));
    }
    Ok(())
}

/// A REST API with its deployment stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RestApiDefinition {
    pub name: String,
    /// Nested stack the API is created in.
    #[serde(default = "default_stack")]
    pub stack: String,
    #[serde(default = "default_stage")]
    pub stage: String,
    #[serde(default)]
    pub cors: CorsOptions,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub authorizers: Vec<Authorizer>,
    #[serde(default)]
    pub paths: Vec<ResourcePath>,
}

fn default_stack() -> String {
    "api-stack".to_string()
}

fn default_stage() -> String {
    "dev".to_string()
}

impl RestApiDefinition {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            stack: default_stack(),
            stage: default_stage(),
            cors: CorsOptions::default(),
            authorizers: Vec::new(),
            paths: Vec::new(),
        }
    }

    pub fn authorizer(&self, name: &str) -> Option<&Authorizer> {
        self.authorizers.iter().find(|a| a.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_method_parsing() {
        assert_eq!("get".parse::<HttpMethod>().unwrap(), HttpMethod::Get);
        assert_eq!("DELETE".parse::<HttpMethod>().unwrap(), HttpMethod::Delete);
        assert_eq!("*".parse::<HttpMethod>().unwrap(), HttpMethod::Any);
        assert!("FETCH".parse::<HttpMethod>().is_err());
    }

    #[test]
    fn test_default_cors_is_permissive() {
        let cors = CorsOptions::default();
        assert!(cors.is_permissive());
        assert_eq!(cors.origins(), vec!["*"]);
        assert_eq!(cors.methods().len(), 7);
        assert!(cors.headers().contains(&"X-Amz-Security-Token".to_string()));
    }

    #[test]
    fn test_narrowed_cors() {
        let cors = CorsOptions {
            allow_origins: AllowOrigins::List(vec!["https://app.example.com".into()]),
            allow_methods: AllowMethods::List(vec![HttpMethod::Get]),
            allow_headers: AllowHeaders::List(vec!["Authorization".into()]),
        };
        assert!(!cors.is_permissive());
        assert_eq!(cors.methods(), vec!["GET"]);
        assert_eq!(cors.headers(), vec!["Authorization"]);
    }

    #[test]
    fn test_segment_validation() {
        assert!(validate_segment("items").is_ok());
        assert!(validate_segment("cognito-auth-path").is_ok());
        assert!(validate_segment("").is_err());
        assert!(validate_segment("items/more").is_err());
        assert!(validate_segment("{proxy+}").is_err());
    }

    #[test]
    fn test_gateway_types() {
        assert_eq!(AuthorizationMode::Iam.gateway_type(), "AWS_IAM");
        assert_eq!(AuthorizationMode::Cognito.gateway_type(), "COGNITO_USER_POOLS");
        assert_eq!(AuthorizationMode::None.gateway_type(), "NONE");
    }

    #[test]
    fn test_resource_path_yaml() {
        let yaml = r#"
path: items
authorization: iam
methods:
  - method: GET
    function: lakeformation
proxy:
  function: lakeformation
"#;
        let path: ResourcePath = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(path.segment, "items");
        assert_eq!(path.authorization, Some(AuthorizationMode::Iam));
        assert_eq!(path.methods[0].method, HttpMethod::Get);
        let proxy = path.proxy.unwrap();
        assert!(proxy.any_method);
        assert_eq!(proxy.function, "lakeformation");
    }

    #[test]
    fn test_cors_yaml_keywords_and_lists() {
        let cors: CorsOptions = serde_yaml::from_str(
            "allow_origins: [\"https://app.example.com\"]\nallow_methods: all\n",
        )
        .unwrap();
        assert_eq!(
            cors.allow_origins,
            AllowOrigins::List(vec!["https://app.example.com".to_string()])
        );
        assert_eq!(cors.allow_methods, AllowMethods::All);
        assert_eq!(cors.allow_headers, AllowHeaders::Default);

        assert!(serde_yaml::from_str::<CorsOptions>("allow_origins: everyone\n").is_err());

        let rendered = serde_yaml::to_string(&CorsOptions::default()).unwrap();
        assert!(rendered.contains("allow_origins: all"));
    }

    #[test]
    fn test_unknown_fields_rejected() {
        let yaml = "path: items\nverbs: [GET]\n";
        assert!(serde_yaml::from_str::<ResourcePath>(yaml).is_err());
    }
}
