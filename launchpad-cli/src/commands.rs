use clap::Subcommand;

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Sync, install, then exec the service (does not return on success)
    Run {
        /// Start command, overriding LAUNCHPAD_START_COMMAND and the uvicorn default
        #[arg(last = true, value_name = "COMMAND")]
        command: Vec<String>,
    },
    /// Only bring the working copy up to date
    Sync,
    /// Only install dependencies from the existing working copy
    Install,
    /// Print the resolved configuration as YAML
    Config,
}
