use super::load_backend;
use super::synth::synth_options;
use crate::utils::env_paths::EnvPaths;
use anyhow::{bail, Result};
use colored::*;
use stack::{plan, synthesize_with, ChangeCategory, Plan, Template};
use std::path::PathBuf;
use tracing::info;

/// Show what deploying the current declaration would change
pub async fn execute(
    env_paths: &EnvPaths,
    previous: Option<PathBuf>,
    format: String,
    fail_on_breaking: bool,
) -> Result<()> {
    let backend = load_backend(env_paths).await?;
    let next = synthesize_with(&backend, &synth_options(env_paths, &backend)?);

    let previous_path = previous.unwrap_or_else(|| env_paths.template_path());
    let previous = if previous_path.exists() {
        Some(Template::load(&previous_path)?)
    } else {
        info!("No previous template at {:?}; planning a first deployment", previous_path);
        None
    };

    let plan = plan(previous.as_ref(), &next);
    match format.as_str() {
        "json" => println!("{}", serde_json::to_string_pretty(&plan)?),
        _ => print_plan_text(&plan),
    }

    if fail_on_breaking && plan.has_breaking() {
        bail!("plan contains breaking changes");
    }
    Ok(())
}

fn print_plan_text(plan: &Plan) {
    if plan.is_empty() {
        println!("{}", "No changes".green());
        return;
    }

    for change in &plan.changes {
        let marker = match change.category {
            ChangeCategory::Safe => "+".green(),
            ChangeCategory::Warning => "~".yellow(),
            ChangeCategory::Breaking => "!".red().bold(),
        };
        println!("{} {}", marker, change);
    }

    let count = |category| plan.by_category(category).count();
    println!();
    println!(
        "{} safe, {} warning, {} breaking",
        count(ChangeCategory::Safe),
        count(ChangeCategory::Warning),
        count(ChangeCategory::Breaking)
    );
}
