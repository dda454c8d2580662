use super::{load_backend, print_warnings};
use crate::utils::env_paths::EnvPaths;
use anyhow::Result;
use colored::*;
use resources::AuthorizationMode;
use serde_json::json;
use stack::Backend;

/// Validate the declaration and print a summary of the resulting backend
pub async fn execute(env_paths: &EnvPaths, format: String) -> Result<()> {
    let backend = load_backend(env_paths).await?;

    match format.as_str() {
        "json" => {
            let summary = json!({
                "name": backend.name(),
                "valid": true,
                "routes": backend.routes(),
                "attachments": backend.attachments(),
                "warnings": backend.warnings(),
            });
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
        _ => {
            print_summary_text(&backend);
            print_warnings(&backend);
        }
    }

    Ok(())
}

fn print_summary_text(backend: &Backend) {
    println!(
        "{} Backend '{}' is valid",
        "✓".green().bold(),
        backend.name().bold()
    );

    if !backend.routes().is_empty() {
        println!();
        println!("{}", "Routes:".bold());
        for route in backend.routes() {
            let auth = match route.authorization {
                AuthorizationMode::Iam => "signed request".to_string(),
                AuthorizationMode::Cognito => format!(
                    "directory token ({})",
                    route.authorizer.as_deref().unwrap_or("-")
                ),
                AuthorizationMode::None => "none".red().to_string(),
            };
            println!(
                "  {:<7} {:<24} -> {} [{}]",
                route.method.to_string().cyan(),
                route.path,
                route.function,
                auth
            );
        }
    }

    if !backend.attachments().is_empty() {
        println!();
        println!("{}", "Policies:".bold());
        for attachment in backend.attachments() {
            println!("  {:<28} -> {}", attachment.policy, attachment.principal);
        }
    }
}
