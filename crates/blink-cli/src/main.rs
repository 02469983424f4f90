#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::struct_excessive_bools)]
#![allow(clippy::needless_pass_by_value)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::doc_markdown)]

mod commands;
mod logging;

use blink_core::Config;
use clap::{CommandFactory, Parser};
use miette::{IntoDiagnostic, Result};
use serde_json::{Map, Value};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "blink")]
#[command(author, version, about = "Scaffold projects and run commands published as npm packages", long_about = None)]
struct Cli {
    /// Increase logging verbosity (-v for DEBUG, -vv for TRACE)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Debug mode, same as -v
    #[arg(short, long, global = true)]
    debug: bool,

    /// Emit JSON formatted output (stable, machine-readable)
    #[arg(long, global = true)]
    json: bool,

    /// Override the working directory
    #[arg(long, global = true, value_name = "PATH")]
    cwd: Option<PathBuf>,

    /// Run commands from a local package instead of the registry
    #[arg(long, visible_alias = "targetPath", global = true, value_name = "PATH")]
    target_path: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Print version information
    Version,

    /// Initialize a project through the `init` command package
    Init {
        /// Project name
        project_name: Option<String>,

        /// Force initialization, clearing an existing project
        #[arg(short, long)]
        force: bool,
    },

    /// Create a project from a template in the working directory
    Create {
        /// Project name (defaults to the directory name)
        name: Option<String>,

        /// Template npm name, display name or catalogue number
        #[arg(short, long)]
        template: Option<String>,

        /// Project version
        #[arg(long, value_name = "VERSION")]
        project_version: Option<String>,

        /// Project description
        #[arg(long)]
        description: Option<String>,

        /// Clear a non-empty working directory
        #[arg(short, long)]
        force: bool,

        /// Accept defaults without prompting
        #[arg(short, long)]
        yes: bool,
    },

    /// Inspect the package caches
    Cache {
        #[command(subcommand)]
        cache_cmd: CacheCommands,
    },

    /// Print the resolved configuration as JSON
    Config,

    #[command(external_subcommand)]
    External(Vec<String>),
}

#[derive(clap::Subcommand, Debug)]
enum CacheCommands {
    /// List cached command and template packages
    Ls,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let Some(command) = cli.command else {
        Cli::command().print_help().into_diagnostic()?;
        return Ok(());
    };

    if matches!(command, Commands::Version) {
        return commands::version::run();
    }

    // Determine working directory
    let cwd = cli
        .cwd
        .or_else(|| std::env::current_dir().ok())
        .unwrap_or_else(|| PathBuf::from("."));
    let verbosity = if cli.debug {
        cli.verbose.max(1)
    } else {
        cli.verbose
    };

    let config = match Config::load(cwd) {
        Ok(config) => config
            .with_verbosity(verbosity)
            .with_json_logs(cli.json)
            .with_target_path(cli.target_path.as_deref()),
        Err(e) => std::process::exit(commands::report(&e, cli.json)),
    };

    logging::init(config.verbosity, config.json_logs);

    let runtime = tokio::runtime::Runtime::new().into_diagnostic()?;
    let result = runtime.block_on(async {
        commands::check_for_update(&config).await;

        match command {
            Commands::Init {
                project_name,
                force,
            } => {
                let mut options = Map::new();
                options.insert("force".to_string(), Value::Bool(force));
                let positional = vec![project_name.map_or(Value::Null, Value::String)];
                commands::dispatch::run(&config, "init", positional, options).await
            }
            Commands::Create {
                name,
                template,
                project_version,
                description,
                force,
                yes,
            } => {
                let opts = commands::create::options(
                    name,
                    template,
                    project_version,
                    description,
                    force,
                    yes,
                );
                commands::create::run(&config, &opts, cli.json).await
            }
            Commands::Cache {
                cache_cmd: CacheCommands::Ls,
            } => commands::cache::list(&config, cli.json),
            Commands::Config => commands::config::run(&config),
            Commands::External(args) => {
                let mut args = args.into_iter();
                let name = args.next().unwrap_or_default();
                let positional = args.map(Value::String).collect();
                commands::dispatch::run(&config, &name, positional, Map::new()).await
            }
            // Printed before the configuration is loaded.
            Commands::Version => Ok(0),
        }
    });

    let code = match result {
        Ok(code) => code,
        Err(e) => commands::report(&e, cli.json),
    };
    std::process::exit(code)
}
