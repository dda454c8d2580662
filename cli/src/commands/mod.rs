pub mod check_access;
pub mod init;
pub mod outputs;
pub mod package;
pub mod plan;
pub mod synth;
pub mod validate;

use crate::utils::env_paths::EnvPaths;
use anyhow::{anyhow, Result};
use colored::*;
use stack::{Backend, Declaration};

/// Load the declaration file and finalize it into a backend
pub async fn load_backend(env_paths: &EnvPaths) -> Result<Backend> {
    let declaration = Declaration::load(&env_paths.declaration_path)
        .await
        .map_err(|e| anyhow!("Failed to load declaration: {}", e))?;
    let backend = declaration.into_builder().finalize()?;
    Ok(backend)
}

/// Print finalize warnings to stderr
pub fn print_warnings(backend: &Backend) {
    for warning in backend.warnings() {
        eprintln!("{} {}", "Warning:".yellow().bold(), warning);
    }
}
