use launchpad_core::errors::{ConfigError, LaunchError};
use thiserror::Error;

/// Exit code for failures that belong to no pipeline stage
const EXIT_INTERNAL: i32 = 1;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Launch(#[from] LaunchError),

    #[error("Failed to start async runtime: {0}")]
    Runtime(#[source] std::io::Error),

    #[error("Cannot determine working directory: {0}")]
    WorkingDir(#[source] std::io::Error),

    #[error("Failed to render configuration: {0}")]
    Render(#[from] serde_yaml::Error),
}

impl From<ConfigError> for CliError {
    fn from(e: ConfigError) -> Self {
        CliError::Launch(e.into())
    }
}

impl CliError {
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::Launch(e) => e.exit_code(),
            CliError::Runtime(_) | CliError::WorkingDir(_) | CliError::Render(_) => EXIT_INTERNAL,
        }
    }
}

pub type Result<T> = std::result::Result<T, CliError>;
