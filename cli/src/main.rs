use anyhow::Result;
use clap::{Parser, Subcommand};
use colored::*;
use std::path::PathBuf;

mod commands;
mod utils;

use commands::{check_access, init, outputs, package, plan, synth, validate};
use utils::env_paths::EnvPaths;
use utils::logging;

/// lakestack - declare, validate and synthesize a serverless analytics backend
#[derive(Parser)]
#[command(name = "lakestack")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Backend declaration file (defaults to $LAKESTACK_FILE or ./backend.yaml)
    #[arg(short, long, global = true)]
    file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write the reference declaration and a function skeleton
    Init {
        /// Overwrite an existing declaration
        #[arg(long)]
        force: bool,
    },

    /// Check the declaration and report warnings
    Validate {
        /// Output format (json, text)
        #[arg(short = 'F', long, default_value = "text")]
        format: String,
    },

    /// Render the provisioning template
    Synth {
        /// Template path (defaults to <out dir>/template.json)
        #[arg(short, long)]
        out: Option<PathBuf>,

        /// Print the template instead of writing it
        #[arg(long)]
        stdout: bool,
    },

    /// Write the client configuration for a deployed API
    Outputs {
        /// Id the provider assigned to the REST API
        #[arg(long)]
        api_id: String,

        /// Output path (defaults to <out dir>/amplify_outputs.json)
        #[arg(short, long)]
        out: Option<PathBuf>,
    },

    /// Compare the declaration with a previously synthesized template
    Plan {
        /// Previous template (defaults to <out dir>/template.json)
        #[arg(long)]
        previous: Option<PathBuf>,

        /// Output format (json, text)
        #[arg(short = 'F', long, default_value = "text")]
        format: String,

        /// Exit with an error when any resource would be removed or replaced
        #[arg(long)]
        fail_on_breaking: bool,
    },

    /// Install dependencies and bundle function sources
    Package {
        /// Only bundle this function
        #[arg(long)]
        function: Option<String>,

        /// Interpreter used to run pip, overriding the declaration
        #[arg(long)]
        python: Option<String>,
    },

    /// Predict whether the gateway or IAM would allow a call
    CheckAccess {
        /// HTTP verb of the call, e.g. GET
        method: Option<String>,

        /// Request path, e.g. /items/42
        path: Option<String>,

        /// Caller: anonymous, token:<directory>, authenticated,
        /// unauthenticated, group:<name> or function:<name>
        #[arg(long = "as", default_value = "anonymous")]
        caller: String,

        /// Check an IAM action instead of an HTTP call
        #[arg(long, requires = "resource", conflicts_with_all = ["method", "path"])]
        action: Option<String>,

        /// Resource ARN for --action
        #[arg(long)]
        resource: Option<String>,

        /// REST API id used in execute-api ARNs
        #[arg(long, default_value = "local")]
        api_id: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments
    let cli = Cli::parse();

    let env_paths = match EnvPaths::load() {
        Ok(paths) => paths.with_declaration(cli.file.clone()),
        Err(e) => {
            eprintln!("{} {}", "Error:".red().bold(), e);
            std::process::exit(1);
        }
    };

    // Initialize logging
    let guard = logging::init_logging(cli.verbose, &env_paths)?;

    let result = match cli.command {
        Commands::Init { force } => init::execute(&env_paths, force).await,
        Commands::Validate { format } => validate::execute(&env_paths, format).await,
        Commands::Synth { out, stdout } => synth::execute(&env_paths, out, stdout).await,
        Commands::Outputs { api_id, out } => outputs::execute(&env_paths, api_id, out).await,
        Commands::Plan {
            previous,
            format,
            fail_on_breaking,
        } => plan::execute(&env_paths, previous, format, fail_on_breaking).await,
        Commands::Package { function, python } => {
            package::execute(&env_paths, function, python).await
        }
        Commands::CheckAccess {
            method,
            path,
            caller,
            action,
            resource,
            api_id,
        } => {
            let target = match (action, resource, method, path) {
                (Some(action), Some(resource), _, _) => {
                    check_access::Target::Action { action, resource }
                }
                (None, _, Some(method), Some(path)) => check_access::Target::Route { method, path },
                _ => {
                    eprintln!(
                        "{} expected METHOD PATH or --action with --resource",
                        "Error:".red().bold()
                    );
                    std::process::exit(2);
                }
            };
            check_access::execute(&env_paths, target, caller, api_id).await
        }
    };

    if let Err(e) = result {
        eprintln!("{} {:#}", "Error:".red().bold(), e);
        drop(guard);
        std::process::exit(1);
    }

    Ok(())
}
