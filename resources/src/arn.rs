//! Deployment environment and ARN rendering.

use crate::api::HttpMethod;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Account, region and partition a backend is deployed into.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Environment {
    pub account: String,
    pub region: String,
    #[serde(default = "default_partition")]
    pub partition: String,
}

fn default_partition() -> String {
    "aws".to_string()
}

impl Environment {
    pub fn new(account: impl Into<String>, region: impl Into<String>) -> Self {
        Self {
            account: account.into(),
            region: region.into(),
            partition: default_partition(),
        }
    }

    /// Host suffix for regional endpoints.
    pub fn url_suffix(&self) -> &'static str {
        match self.partition.as_str() {
            "aws-cn" => "amazonaws.com.cn",
            _ => "amazonaws.com",
        }
    }
}

/// ARN of an API route in a stage, as used by `execute-api:Invoke`.
///
/// With `method` unset the verb position is `*`, matching every verb.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecuteApiArn {
    pub partition: String,
    pub region: String,
    pub account: String,
    pub api_id: String,
    pub stage: String,
    pub method: Option<HttpMethod>,
    pub path: String,
}

impl ExecuteApiArn {
    pub fn new(
        env: &Environment,
        api_id: &str,
        stage: &str,
        method: Option<HttpMethod>,
        path: &str,
    ) -> Self {
        Self {
            partition: env.partition.clone(),
            region: env.region.clone(),
            account: env.account.clone(),
            api_id: api_id.to_string(),
            stage: stage.to_string(),
            // ANY is spelled as a wildcard in execute-api ARNs.
            method: method.filter(|m| *m != HttpMethod::Any),
            path: path.to_string(),
        }
    }
}

impl fmt::Display for ExecuteApiArn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let verb = self.method.map(|m| m.as_str()).unwrap_or("*");
        write!(
            f,
            "arn:{}:execute-api:{}:{}:{}/{}/{}{}",
            self.partition, self.region, self.account, self.api_id, self.stage, verb, self.path
        )
    }
}
