use anyhow::{Context, Result};
use std::env;
use std::path::{Path, PathBuf};

pub const FILE_VAR: &str = "LAKESTACK_FILE";
pub const OUT_DIR_VAR: &str = "LAKESTACK_OUT_DIR";
pub const LOG_DIR_VAR: &str = "LAKESTACK_LOG_DIR";

/// Environment-based path configuration
#[derive(Debug, Clone)]
pub struct EnvPaths {
    pub declaration_path: PathBuf,
    pub out_dir: PathBuf,
    /// File logging is enabled only when this is set.
    pub log_dir: Option<PathBuf>,
}

impl EnvPaths {
    /// Load paths from environment variables with defaults
    pub fn load() -> Result<Self> {
        Self::load_with_base(None)
    }

    /// Load paths from environment variables with an optional base directory
    /// This is primarily for testing purposes
    pub fn load_with_base(base_dir: Option<PathBuf>) -> Result<Self> {
        let base = if let Some(base) = base_dir {
            base
        } else {
            // Try to load .env file if it exists in current directory
            if let Ok(env_path) = env::current_dir() {
                let env_file = env_path.join(".env");
                if env_file.exists() {
                    dotenv::from_path(&env_file).ok();
                }
            }
            env::current_dir().context("Failed to get current directory")?
        };

        let log_dir = match env::var(LOG_DIR_VAR) {
            Ok(dir) if !dir.is_empty() => Some(Self::resolve(PathBuf::from(dir), &base)),
            _ => None,
        };

        Ok(Self {
            declaration_path: Self::get_path_from_env(FILE_VAR, "./backend.yaml", &base),
            out_dir: Self::get_path_from_env(OUT_DIR_VAR, "./cdk.out", &base),
            log_dir,
        })
    }

    /// Replaces the declaration path, e.g. from `--file`.
    pub fn with_declaration(mut self, path: Option<PathBuf>) -> Self {
        if let Some(path) = path {
            self.declaration_path = path;
        }
        self
    }

    /// Get a path from environment variable or use default
    fn get_path_from_env(var_name: &str, default: &str, base_dir: &Path) -> PathBuf {
        let path_str = env::var(var_name).unwrap_or_else(|_| default.to_string());
        Self::resolve(PathBuf::from(path_str), base_dir)
    }

    fn resolve(path: PathBuf, base_dir: &Path) -> PathBuf {
        if path.is_relative() {
            base_dir.join(path)
        } else {
            path
        }
    }

    /// Synthesized provisioning template
    pub fn template_path(&self) -> PathBuf {
        self.out_dir.join("template.json")
    }

    /// Client configuration artifact
    pub fn outputs_path(&self) -> PathBuf {
        self.out_dir.join("amplify_outputs.json")
    }

    /// Bundle directory of one function
    pub fn bundle_dir(&self, function: &str) -> PathBuf {
        self.out_dir.join("bundles").join(function)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use tempfile::TempDir;

    // Use a mutex to ensure tests don't interfere with each other's environment variables
    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    fn clear_env() {
        env::remove_var(FILE_VAR);
        env::remove_var(OUT_DIR_VAR);
        env::remove_var(LOG_DIR_VAR);
    }

    #[test]
    fn test_env_paths_with_defaults() {
        let _guard = ENV_MUTEX.lock().unwrap();
        clear_env();

        let temp_dir = TempDir::new().unwrap();
        let base = temp_dir.path().to_path_buf();
        let paths = EnvPaths::load_with_base(Some(base.clone())).unwrap();

        assert_eq!(paths.declaration_path, base.join("./backend.yaml"));
        assert_eq!(paths.out_dir, base.join("./cdk.out"));
        assert!(paths.log_dir.is_none());
    }

    #[test]
    fn test_env_paths_with_env_vars() {
        let _guard = ENV_MUTEX.lock().unwrap();
        clear_env();

        let temp_dir = TempDir::new().unwrap();
        let absolute_out = temp_dir.path().join("artifacts");
        env::set_var(FILE_VAR, "./stacks/analytics.yaml");
        env::set_var(OUT_DIR_VAR, absolute_out.to_str().unwrap());
        env::set_var(LOG_DIR_VAR, "logs");

        let base = temp_dir.path().to_path_buf();
        let paths = EnvPaths::load_with_base(Some(base.clone())).unwrap();

        assert!(paths.declaration_path.ends_with("stacks/analytics.yaml"));
        // Absolute paths are used as-is
        assert_eq!(paths.out_dir, absolute_out);
        assert_eq!(paths.log_dir, Some(base.join("logs")));

        clear_env();
    }

    #[test]
    fn test_derived_paths() {
        let _guard = ENV_MUTEX.lock().unwrap();
        clear_env();

        let temp_dir = TempDir::new().unwrap();
        let base = temp_dir.path().to_path_buf();
        let paths = EnvPaths::load_with_base(Some(base.clone()))
            .unwrap()
            .with_declaration(Some(PathBuf::from("/tmp/other.yaml")));

        assert_eq!(paths.declaration_path, PathBuf::from("/tmp/other.yaml"));
        assert!(paths.template_path().ends_with("cdk.out/template.json"));
        assert!(paths.outputs_path().ends_with("cdk.out/amplify_outputs.json"));
        assert!(paths
            .bundle_dir("lakeformation")
            .ends_with("cdk.out/bundles/lakeformation"));
    }
}
