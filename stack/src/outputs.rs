//! Client configuration published after deployment.

use crate::backend::Backend;
use crate::error::{Result, StackError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::info;

pub const OUTPUTS_VERSION: &str = "1";

/// Endpoint details of one REST API as seen by clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiOutput {
    pub endpoint: String,
    pub region: String,
    #[serde(rename = "apiName")]
    pub api_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CustomOutputs {
    #[serde(rename = "API")]
    pub api: BTreeMap<String, ApiOutput>,
}

/// The client configuration document, keyed as
/// `custom.API.<api name>.{endpoint, region, apiName}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientOutputs {
    pub version: String,
    pub custom: CustomOutputs,
}

impl ClientOutputs {
    /// Builds the outputs for a deployed backend whose REST API was assigned
    /// `api_id` by the provider.
    pub fn from_backend(backend: &Backend, api_id: &str) -> Result<Self> {
        let api = backend
            .api()
            .ok_or_else(|| StackError::MissingResource("REST API".to_string()))?;
        validate_api_id(api_id)?;

        let env = backend.environment();
        let output = ApiOutput {
            endpoint: format!(
                "https://{}.execute-api.{}.{}/{}/",
                api_id,
                env.region,
                env.url_suffix(),
                api.stage
            ),
            region: env.region.clone(),
            api_name: api.name.clone(),
        };

        let mut custom = CustomOutputs::default();
        custom.api.insert(api.name.clone(), output);
        Ok(Self {
            version: OUTPUTS_VERSION.to_string(),
            custom,
        })
    }

    pub fn api(&self, name: &str) -> Option<&ApiOutput> {
        self.custom.api.get(name)
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, self.to_json_pretty()?)?;
        info!("Wrote client outputs to {:?}", path);
        Ok(())
    }
}

fn validate_api_id(api_id: &str) -> Result<()> {
    if api_id.is_empty() || !api_id.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(StackError::Declaration(format!(
            "Invalid API id '{}': expected an alphanumeric identifier",
            api_id
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::declaration::Declaration;
    use serde_json::json;

    fn backend() -> Backend {
        Declaration::reference().into_builder().finalize().unwrap()
    }

    #[test]
    fn test_reference_outputs() {
        let outputs = ClientOutputs::from_backend(&backend(), "a1b2c3d4e5").unwrap();
        let value = serde_json::to_value(&outputs).unwrap();
        assert_eq!(
            value["custom"]["API"]["myRestApi"],
            json!({
                "endpoint": "https://a1b2c3d4e5.execute-api.ap-northeast-1.amazonaws.com/dev/",
                "region": "ap-northeast-1",
                "apiName": "myRestApi"
            })
        );
    }

    #[test]
    fn test_china_partition_suffix() {
        let mut declaration = Declaration::reference();
        declaration.environment.partition = "aws-cn".to_string();
        declaration.environment.region = "cn-north-1".to_string();
        let backend = declaration.into_builder().finalize().unwrap();

        let outputs = ClientOutputs::from_backend(&backend, "abc").unwrap();
        assert_eq!(
            outputs.api("myRestApi").unwrap().endpoint,
            "https://abc.execute-api.cn-north-1.amazonaws.com.cn/dev/"
        );
    }

    #[test]
    fn test_invalid_api_id() {
        assert!(ClientOutputs::from_backend(&backend(), "").is_err());
        assert!(ClientOutputs::from_backend(&backend(), "abc/../x").is_err());
    }

    #[test]
    fn test_backend_without_api() {
        let mut declaration = Declaration::reference();
        declaration.api = None;
        declaration.policies.retain(|p| p.name != "RestApiPolicy");
        let backend = declaration.into_builder().finalize().unwrap();
        assert!(matches!(
            ClientOutputs::from_backend(&backend, "abc"),
            Err(StackError::MissingResource(_))
        ));
    }
}
