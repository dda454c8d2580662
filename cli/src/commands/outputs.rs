use super::load_backend;
use crate::utils::env_paths::EnvPaths;
use anyhow::Result;
use colored::*;
use stack::ClientOutputs;
use std::path::PathBuf;

/// Write the client configuration for a deployed REST API
pub async fn execute(env_paths: &EnvPaths, api_id: String, out: Option<PathBuf>) -> Result<()> {
    let backend = load_backend(env_paths).await?;
    let outputs = ClientOutputs::from_backend(&backend, &api_id)?;

    let path = out.unwrap_or_else(|| env_paths.outputs_path());
    outputs.write(&path)?;

    for (name, api) in &outputs.custom.api {
        println!("{} {}", name.bold(), api.endpoint);
    }
    println!("{} {}", "Wrote".green().bold(), path.display());
    Ok(())
}
