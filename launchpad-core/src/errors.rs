use std::fmt;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

use crate::config::format_duration;

/// Pipeline stage a failure is attributed to.
///
/// Each stage owns a distinct exit code so the orchestrator (and whoever reads
/// its restart events) can tell a dead remote from a broken manifest.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Config,
    Clone,
    Update,
    Install,
    Browser,
    Handoff,
}

impl Stage {
    pub fn exit_code(&self) -> i32 {
        match self {
            Stage::Config => 78,
            Stage::Clone => 80,
            Stage::Update => 81,
            Stage::Install => 82,
            Stage::Browser => 83,
            Stage::Handoff => 127,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Config => write!(f, "config"),
            Stage::Clone => write!(f, "clone"),
            Stage::Update => write!(f, "update"),
            Stage::Install => write!(f, "install"),
            Stage::Browser => write!(f, "browser"),
            Stage::Handoff => write!(f, "handoff"),
        }
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration error: {0} is required but not set")]
    Missing(&'static str),

    #[error("Configuration error: invalid value for {name}: {value:?} ({reason})")]
    Invalid {
        name: &'static str,
        value: String,
        reason: String,
    },

    #[error("Configuration error: unrecognized variable {0}")]
    Unrecognized(String),

    #[error("Configuration error: environment file not found: {0}")]
    EnvFileNotFound(PathBuf),

    #[error("Configuration error: failed to parse environment file {path}: {source}")]
    EnvFileParse {
        path: PathBuf,
        #[source]
        source: dotenvy::Error,
    },
}

/// Failure of an external tool the bootstrapper runs (git, pip, playwright).
#[derive(Error, Debug)]
pub enum CommandError {
    #[error("empty command")]
    Empty,

    #[error("working directory '{0}' does not exist")]
    MissingWorkingDir(PathBuf),

    #[error("failed to run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{program} {}{}", describe_exit(.exit_code), format_diagnostic(.stderr))]
    Failed {
        program: String,
        exit_code: Option<i32>,
        stderr: Vec<String>,
    },
}

fn describe_exit(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("exited with code {}", code),
        None => "was killed by a signal".to_string(),
    }
}

fn format_diagnostic(stderr: &[String]) -> String {
    if stderr.is_empty() {
        String::new()
    } else {
        format!(":\n  {}", stderr.join("\n  "))
    }
}

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Failed to inspect working copy {path}: {source}")]
    Inspect {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(
        "Refusing to check out into {path}: directory is not empty and has no version-control metadata"
    )]
    ForeignContent { path: PathBuf },

    #[error("Failed to clone {remote} into {path}: {source}")]
    Clone {
        remote: String,
        path: PathBuf,
        #[source]
        source: CommandError,
    },

    #[error("Failed to update {path} from {remote}: {source}")]
    Update {
        remote: String,
        path: PathBuf,
        #[source]
        source: CommandError,
    },
}

impl SyncError {
    /// Whether the failure happened while refreshing an existing checkout.
    pub fn is_update(&self) -> bool {
        matches!(self, SyncError::Update { .. })
    }
}

#[derive(Error, Debug)]
pub enum ProvisionError {
    #[error("Dependency manifest not found: {0}")]
    ManifestNotFound(PathBuf),

    #[error("Failed to read dependency manifest {path}: {source}")]
    ManifestRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to install dependencies from {path}: {source}")]
    Manifest {
        path: PathBuf,
        #[source]
        source: CommandError,
    },

    #[error("Failed to install {capability}: {source}")]
    Capability {
        capability: String,
        #[source]
        source: CommandError,
    },
}

impl ProvisionError {
    pub fn is_capability(&self) -> bool {
        matches!(self, ProvisionError::Capability { .. })
    }
}

#[derive(Error, Debug)]
pub enum HandoffError {
    #[error("Start command is empty")]
    EmptyCommand,

    #[error("Start command '{command}' not found in search path '{search_path}'")]
    NotFound { command: String, search_path: String },

    #[error("Start command '{0}' is not an executable file")]
    NotExecutable(PathBuf),

    #[error("Start command contains an interior NUL byte: {0:?}")]
    InvalidArgument(String),

    #[error("Failed to enter working directory {path}: {source}")]
    WorkingDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to exec {path}: {source}")]
    Exec {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Any failure that ends a launchpad run before (or instead of) the handoff.
#[derive(Error, Debug)]
pub enum LaunchError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Sync(#[from] SyncError),

    #[error(transparent)]
    Provision(#[from] ProvisionError),

    #[error(transparent)]
    Handoff(#[from] HandoffError),

    #[error("{stage} stage timed out after {}", format_duration(.after))]
    Timeout { stage: Stage, after: Duration },

    #[error("Interrupted by signal {signal} during {stage} stage")]
    Interrupted { stage: Stage, signal: i32 },

    #[error("Failed to install signal handlers: {0}")]
    Signals(#[source] std::io::Error),
}

impl LaunchError {
    pub fn stage(&self) -> Stage {
        match self {
            LaunchError::Config(_) => Stage::Config,
            LaunchError::Sync(e) if e.is_update() => Stage::Update,
            LaunchError::Sync(_) => Stage::Clone,
            LaunchError::Provision(e) if e.is_capability() => Stage::Browser,
            LaunchError::Provision(_) => Stage::Install,
            LaunchError::Handoff(_) => Stage::Handoff,
            LaunchError::Timeout { stage, .. } | LaunchError::Interrupted { stage, .. } => *stage,
            LaunchError::Signals(_) => Stage::Config,
        }
    }

    /// Process exit code for this failure: the stage's code, or `128 + signo`
    /// when a termination signal cut the run short.
    pub fn exit_code(&self) -> i32 {
        match self {
            LaunchError::Interrupted { signal, .. } => 128 + signal,
            other => other.stage().exit_code(),
        }
    }
}

pub type Result<T> = std::result::Result<T, LaunchError>;
