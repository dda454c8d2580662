//! Compute function declarations.

use crate::error::{ResourcesError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Longest timeout the managed runtime accepts.
pub const MAX_TIMEOUT_SECONDS: u32 = 900;

/// Managed language runtimes a function can target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Runtime {
    Python39,
    Python310,
    Python311,
    Python312,
    Python313,
    Nodejs18,
    Nodejs20,
    Nodejs22,
}

impl Runtime {
    pub fn identifier(&self) -> &'static str {
        match self {
            Runtime::Python39 => "python3.9",
            Runtime::Python310 => "python3.10",
            Runtime::Python311 => "python3.11",
            Runtime::Python312 => "python3.12",
            Runtime::Python313 => "python3.13",
            Runtime::Nodejs18 => "nodejs18.x",
            Runtime::Nodejs20 => "nodejs20.x",
            Runtime::Nodejs22 => "nodejs22.x",
        }
    }

    /// Whether dependencies are installed with a Python package installer.
    pub fn is_python(&self) -> bool {
        self.identifier().starts_with("python")
    }
}

impl FromStr for Runtime {
    type Err = ResourcesError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "python3.9" => Ok(Runtime::Python39),
            "python3.10" => Ok(Runtime::Python310),
            "python3.11" => Ok(Runtime::Python311),
            "python3.12" => Ok(Runtime::Python312),
            "python3.13" => Ok(Runtime::Python313),
            "nodejs18.x" => Ok(Runtime::Nodejs18),
            "nodejs20.x" => Ok(Runtime::Nodejs20),
            "nodejs22.x" => Ok(Runtime::Nodejs22),
            _ => Err(ResourcesError::UnsupportedRuntime(s.to_string())),
        }
    }
}

impl TryFrom<String> for Runtime {
    type Error = ResourcesError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<Runtime> for String {
    fn from(value: Runtime) -> Self {
        value.identifier().to_string()
    }
}

impl fmt::Display for Runtime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.identifier())
    }
}

/// How the dependency bundle of a function is produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BundlingOptions {
    /// Requirements manifest, relative to the function's source directory.
    #[serde(default = "default_requirements")]
    pub requirements: PathBuf,
    /// Binary platform tag the installer resolves wheels for.
    #[serde(default = "default_platform")]
    pub platform: String,
    /// Interpreter used to run the installer.
    #[serde(default = "default_python")]
    pub python: String,
    /// Refuse source distributions so the bundle matches the target platform.
    #[serde(default = "default_only_binary")]
    pub only_binary: bool,
}

fn default_requirements() -> PathBuf {
    PathBuf::from("requirements.txt")
}

fn default_platform() -> String {
    "manylinux2014_x86_64".to_string()
}

fn default_python() -> String {
    "python".to_string()
}

fn default_only_binary() -> bool {
    true
}

impl Default for BundlingOptions {
    fn default() -> Self {
        Self {
            requirements: default_requirements(),
            platform: default_platform(),
            python: default_python(),
            only_binary: default_only_binary(),
        }
    }
}

/// A single invokable compute unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FunctionDefinition {
    pub name: String,
    /// Directory holding the handler source.
    pub source: PathBuf,
    #[serde(default = "default_handler")]
    pub handler: String,
    #[serde(default = "default_runtime")]
    pub runtime: Runtime,
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u32,
    #[serde(default)]
    pub bundling: BundlingOptions,
}

fn default_handler() -> String {
    "index.handler".to_string()
}

fn default_runtime() -> Runtime {
    Runtime::Python312
}

fn default_timeout_seconds() -> u32 {
    20
}

impl FunctionDefinition {
    pub fn new(name: impl Into<String>, source: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            source: source.into(),
            handler: default_handler(),
            runtime: default_runtime(),
            timeout_seconds: default_timeout_seconds(),
            bundling: BundlingOptions::default(),
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(u64::from(self.timeout_seconds))
    }

    /// Absolute or cwd-relative path of the requirements manifest.
    pub fn requirements_path(&self) -> PathBuf {
        self.source.join(&self.bundling.requirements)
    }
}
