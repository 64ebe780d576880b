mod commands;
mod errors;

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::{commands::Commands, errors::{CliError, Result}};
use clap::Parser;
use launchpad_core::{Config, ExecutionContext, LaunchError, Pipeline, env, handoff};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Launchpad - sync a service's repository, install its dependencies and exec into it
#[derive(Parser, Debug)]
#[command(name = "launchpad")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Verbose output (also shows git/pip output)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Load variables from a dotenv file; the process environment takes precedence
    #[arg(long = "env-file", global = true, value_name = "PATH")]
    pub env_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(e) = run(cli) {
        eprintln!("Error: {}", e);
        std::process::exit(e.exit_code());
    }
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    // stdout belongs to `launchpad config` and, after the handoff, the service
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn run(cli: Cli) -> Result<()> {
    let vars = collect_vars(cli.env_file.as_deref())?;
    let config = Config::resolve(&vars)?;
    let cwd = std::env::current_dir().map_err(CliError::WorkingDir)?;
    let ctx = ExecutionContext::new(&vars, cwd);

    match cli.command {
        Commands::Config => {
            print!("{}", serde_yaml::to_string(&config)?);
            Ok(())
        }

        Commands::Sync => {
            let working_copy = block_on(async {
                let mut pipeline = Pipeline::new(config)?;
                pipeline.sync(&ctx).await
            })?;
            info!(
                "Working copy {} is current ({:?})",
                working_copy.path.display(),
                working_copy.action
            );
            Ok(())
        }

        Commands::Install => {
            block_on(async {
                let mut pipeline = Pipeline::new(config)?;
                pipeline.install_only(ctx).await
            })?;
            Ok(())
        }

        Commands::Run { command } => {
            let runtime = build_runtime()?;
            let spec = runtime.block_on(async {
                let mut pipeline = Pipeline::new(config)?;
                let spec = pipeline.prepare(ctx, Some(command.as_slice())).await?;
                pipeline.release_signals().await?;
                Ok::<_, LaunchError>(spec)
            })?;
            // No runtime thread may outlive the exec.
            drop(runtime);

            match handoff::handoff(spec) {
                Ok(never) => match never {},
                Err(e) => Err(LaunchError::from(e).into()),
            }
        }
    }
}

/// Snapshot the process environment, layered over `--env-file` if given.
fn collect_vars(env_file: Option<&Path>) -> Result<HashMap<String, String>> {
    let process_env: HashMap<String, String> = std::env::vars_os()
        .filter_map(|(k, v)| match (k.into_string(), v.into_string()) {
            (Ok(k), Ok(v)) => Some((k, v)),
            (Ok(k), Err(_)) => {
                warn!("Ignoring {}: value is not valid UTF-8", k);
                None
            }
            _ => None,
        })
        .collect();

    match env_file {
        Some(path) => {
            let file_env = env::load_env_file(path)?;
            info!("Loaded {} variables from {}", file_env.len(), path.display());
            Ok(env::merge_under(process_env, file_env))
        }
        None => Ok(process_env),
    }
}

fn build_runtime() -> Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(CliError::Runtime)
}

fn block_on<T>(
    fut: impl std::future::Future<Output = std::result::Result<T, LaunchError>>,
) -> Result<T> {
    let runtime = build_runtime()?;
    Ok(runtime.block_on(fut)?)
}
