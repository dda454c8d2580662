use super::load_backend;
use crate::utils::env_paths::EnvPaths;
use anyhow::{anyhow, bail, Result};
use authz::{AccessContext, AccessEvaluator, AccessRequest, Caller};
use colored::*;
use resources::{HttpMethod, PrincipalRef};

/// What to evaluate
pub enum Target {
    Route { method: String, path: String },
    Action { action: String, resource: String },
}

/// Predict an access decision; denied requests exit with an error
pub async fn execute(
    env_paths: &EnvPaths,
    target: Target,
    caller: String,
    api_id: String,
) -> Result<()> {
    let backend = load_backend(env_paths).await?;
    let evaluator = AccessEvaluator::new(&backend, AccessContext::new(api_id))?;

    match target {
        Target::Route { method, path } => {
            let method: HttpMethod = method.parse()?;
            let caller = parse_caller(&caller)?;
            let request = AccessRequest::new(method, path.clone(), caller.clone());
            let decision = evaluator.evaluate(&request)?;

            let marker = if decision.is_allowed() {
                "✓".green().bold()
            } else {
                "✗".red().bold()
            };
            println!("{} {} {} ({}): {}", marker, method, path, caller, decision);
            if !decision.is_allowed() {
                bail!("access denied");
            }
        }
        Target::Action { action, resource } => {
            let principal: PrincipalRef = caller
                .parse()
                .map_err(|e| anyhow!("--as must name an IAM principal for --action: {}", e))?;

            if evaluator.is_action_allowed(&principal, &action, &resource)? {
                println!("{} {} may {} on {}", "✓".green().bold(), principal, action, resource);
            } else {
                println!("{} {} may not {} on {}", "✗".red().bold(), principal, action, resource);
                bail!("access denied");
            }
        }
    }

    Ok(())
}

fn parse_caller(value: &str) -> Result<Caller> {
    if value == "anonymous" {
        return Ok(Caller::Anonymous);
    }
    if let Some(directory) = value.strip_prefix("token:") {
        if directory.is_empty() {
            bail!("token caller needs a directory name, e.g. token:amplifyAuth");
        }
        return Ok(Caller::DirectoryToken {
            directory: directory.to_string(),
        });
    }
    let principal: PrincipalRef = value.parse()?;
    Ok(Caller::Signed(principal))
}
