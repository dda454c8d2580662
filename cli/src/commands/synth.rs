use super::{load_backend, print_warnings};
use crate::utils::env_paths::EnvPaths;
use anyhow::Result;
use colored::*;
use stack::{synthesize_with, Backend, SynthOptions};
use std::path::PathBuf;
use tracing::debug;

/// Synthesize the provisioning template
pub async fn execute(env_paths: &EnvPaths, out: Option<PathBuf>, stdout: bool) -> Result<()> {
    let backend = load_backend(env_paths).await?;
    print_warnings(&backend);

    let template = synthesize_with(&backend, &synth_options(env_paths, &backend)?);
    if stdout {
        println!("{}", template.to_json_pretty()?);
        return Ok(());
    }

    let path = out.unwrap_or_else(|| env_paths.template_path());
    template.write(&path)?;
    println!(
        "{} {} ({} resources)",
        "Wrote".green().bold(),
        path.display(),
        template.resources.len()
    );
    Ok(())
}

/// Digests of bundles already built by `package`, keyed by function
pub fn synth_options(env_paths: &EnvPaths, backend: &Backend) -> Result<SynthOptions> {
    let mut options = SynthOptions::default();
    for function in backend.functions() {
        let dir = env_paths.bundle_dir(&function.name);
        if dir.is_dir() {
            let (digest, _) = packaging::digest_dir(&dir)?;
            debug!("Using bundle digest {} for '{}'", digest, function.name);
            options.asset_digests.insert(function.name.clone(), digest);
        }
    }
    Ok(options)
}
