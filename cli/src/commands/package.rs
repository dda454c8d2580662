use super::load_backend;
use crate::utils::env_paths::EnvPaths;
use anyhow::{bail, Result};
use colored::*;
use packaging::Bundler;

/// Bundle every function (or just one) into the output directory
pub async fn execute(
    env_paths: &EnvPaths,
    function: Option<String>,
    python: Option<String>,
) -> Result<()> {
    let backend = load_backend(env_paths).await?;

    let mut functions: Vec<_> = backend
        .functions()
        .iter()
        .filter(|f| function.as_ref().map_or(true, |name| &f.name == name))
        .cloned()
        .collect();
    if functions.is_empty() {
        match function {
            Some(name) => bail!("Unknown function '{}'", name),
            None => bail!("The declaration has no functions to package"),
        }
    }

    let bundler = Bundler::new();
    for function in &mut functions {
        if let Some(python) = &python {
            function.bundling.python = python.clone();
        }
        let bundle = bundler.bundle(function, &env_paths.bundle_dir(&function.name))?;
        println!(
            "{} {} -> {} ({} files, sha256 {})",
            "Bundled".green().bold(),
            bundle.function,
            bundle.directory.display(),
            bundle.files,
            bundle.digest
        );
    }

    Ok(())
}
