use crate::utils::env_paths::EnvPaths;
use anyhow::{bail, Context, Result};
use colored::*;
use stack::Declaration;
use std::fs;

const HANDLER: &str = r#"import json


def handler(event, context):
    return {
        "statusCode": 200,
        "headers": {"Access-Control-Allow-Origin": "*"},
        "body": json.dumps({"path": event.get("path")}),
    }
"#;

const REQUIREMENTS: &str = "boto3\n";

/// Write the reference declaration plus a function skeleton next to it
pub async fn execute(env_paths: &EnvPaths, force: bool) -> Result<()> {
    let path = &env_paths.declaration_path;
    if path.exists() && !force {
        bail!(
            "{} already exists; pass --force to overwrite it",
            path.display()
        );
    }

    let declaration = Declaration::reference();
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, declaration.to_yaml()?)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    println!("{} {}", "Created".green().bold(), path.display());

    let base = path.parent().map(|p| p.to_path_buf()).unwrap_or_default();
    for function in &declaration.functions {
        let source = base.join(&function.source);
        fs::create_dir_all(&source)?;

        let handler = source.join("index.py");
        if !handler.exists() {
            fs::write(&handler, HANDLER)?;
            println!("{} {}", "Created".green().bold(), handler.display());
        }
        let requirements = source.join(&function.bundling.requirements);
        if !requirements.exists() {
            fs::write(&requirements, REQUIREMENTS)?;
            println!("{} {}", "Created".green().bold(), requirements.display());
        }
    }

    Ok(())
}
