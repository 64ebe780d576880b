//! Start-command resolution and the terminal handoff
//!
//! Everything that can fail is checked while the bootstrapper still owns the
//! process: the command is resolved against the context search path and
//! every argument is converted up front. Only then is the process image
//! replaced, so a caller that gets a [`HandoffError`] back is still itself.

use std::collections::HashMap;
use std::convert::Infallible;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::config::ServiceConfig;
use crate::context::ExecutionContext;
use crate::env::expand_env;
use crate::errors::HandoffError;

const DEFAULT_SERVER: &str = "uvicorn";

/// Fully resolved start procedure of the service
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceStartSpec {
    /// Absolute (or working-directory relative) path of the executable
    pub command_path: PathBuf,
    /// The program token as written, passed as argv[0]
    pub program_name: String,
    /// Arguments after argv[0]
    pub arguments: Vec<String>,
    pub working_directory: PathBuf,
    pub environment: HashMap<String, String>,
}

/// Pick the start command: an explicit override, then the configured
/// command, then uvicorn serving the configured app module.
pub fn start_command(service: &ServiceConfig, override_command: Option<&[String]>) -> Vec<String> {
    if let Some(command) = override_command.filter(|c| !c.is_empty()) {
        return command.to_vec();
    }
    if let Some(command) = service.start_command.as_ref().filter(|c| !c.is_empty()) {
        return command.clone();
    }
    vec![
        DEFAULT_SERVER.to_string(),
        service.app_module.clone(),
        "--host".to_string(),
        service.host.clone(),
        "--port".to_string(),
        service.port.to_string(),
    ]
}

/// Resolve `command` into a start spec rooted at the context's working
/// directory.
///
/// `${VAR}` references in any token are expanded against the service
/// environment, which is the context environment plus `HOST` and `PORT`.
pub fn resolve(
    command: &[String],
    service: &ServiceConfig,
    ctx: &ExecutionContext,
) -> Result<ServiceStartSpec, HandoffError> {
    let mut environment = ctx.environment();
    environment.insert("HOST".to_string(), service.host.clone());
    environment.insert("PORT".to_string(), service.port.to_string());

    let expanded: Vec<String> = command
        .iter()
        .map(|token| expand_env(token, &environment))
        .collect();

    let Some((program, arguments)) = expanded.split_first() else {
        return Err(HandoffError::EmptyCommand);
    };
    if program.is_empty() {
        return Err(HandoffError::EmptyCommand);
    }

    let command_path = resolve_command(program, ctx)?;
    debug!("Resolved start command {} to {}", program, command_path.display());

    Ok(ServiceStartSpec {
        command_path,
        program_name: program.clone(),
        arguments: arguments.to_vec(),
        working_directory: ctx.working_dir().to_path_buf(),
        environment,
    })
}

/// Find `program` the way a shell would, but only on the context search path.
///
/// Names containing a separator are taken as paths relative to the working
/// directory and are never looked up on the search path.
pub fn resolve_command(program: &str, ctx: &ExecutionContext) -> Result<PathBuf, HandoffError> {
    if program.contains(std::path::MAIN_SEPARATOR) || program.contains('/') {
        let path = ctx.working_dir().join(program);
        if !path.exists() {
            return Err(HandoffError::NotFound {
                command: program.to_string(),
                search_path: ctx.working_dir().display().to_string(),
            });
        }
        if !is_executable(&path) {
            return Err(HandoffError::NotExecutable(path));
        }
        return Ok(path);
    }

    which::which_in(program, Some(ctx.path_var()), ctx.working_dir()).map_err(|e| {
        debug!("Lookup of {} failed: {}", program, e);
        HandoffError::NotFound {
            command: program.to_string(),
            search_path: ctx.path_var().to_string_lossy().into_owned(),
        }
    })
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    launchpad_unix::process::is_executable(path)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}

/// Transfer the process to the service. Returns only if the transfer failed.
///
/// The caller must have shut down its async runtime first: after the exec
/// no thread of ours survives, and before it nothing else may be running.
#[cfg(unix)]
pub fn handoff(spec: ServiceStartSpec) -> Result<Infallible, HandoffError> {
    use std::ffi::CString;
    use std::os::unix::ffi::OsStrExt;

    let to_cstring = |s: &[u8]| {
        CString::new(s).map_err(|_| HandoffError::InvalidArgument(String::from_utf8_lossy(s).into_owned()))
    };

    let program = to_cstring(spec.command_path.as_os_str().as_bytes())?;
    let mut argv = Vec::with_capacity(spec.arguments.len() + 1);
    argv.push(to_cstring(spec.program_name.as_bytes())?);
    for arg in &spec.arguments {
        argv.push(to_cstring(arg.as_bytes())?);
    }

    let mut vars: Vec<_> = spec.environment.iter().collect();
    vars.sort();
    let envp = vars
        .into_iter()
        .map(|(k, v)| to_cstring(format!("{}={}", k, v).as_bytes()))
        .collect::<Result<Vec<_>, _>>()?;

    info!(
        "Starting application: {} {}",
        spec.command_path.display(),
        spec.arguments.join(" ")
    );

    std::env::set_current_dir(&spec.working_directory).map_err(|source| {
        HandoffError::WorkingDirectory {
            path: spec.working_directory.clone(),
            source,
        }
    })?;

    launchpad_unix::process::close_fds_above_stderr();

    match launchpad_unix::process::replace_process(&program, &argv, &envp) {
        Ok(never) => match never {},
        Err(errno) => Err(HandoffError::Exec {
            path: spec.command_path,
            source: std::io::Error::from(errno),
        }),
    }
}

/// Without exec, run the service as a child and exit with its status.
#[cfg(not(unix))]
pub fn handoff(spec: ServiceStartSpec) -> Result<Infallible, HandoffError> {
    info!(
        "Starting application: {} {}",
        spec.command_path.display(),
        spec.arguments.join(" ")
    );

    if !spec.working_directory.is_dir() {
        return Err(HandoffError::WorkingDirectory {
            path: spec.working_directory.clone(),
            source: std::io::Error::from(std::io::ErrorKind::NotFound),
        });
    }

    let status = std::process::Command::new(&spec.command_path)
        .args(&spec.arguments)
        .current_dir(&spec.working_directory)
        .env_clear()
        .envs(&spec.environment)
        .status()
        .map_err(|source| HandoffError::Exec {
            path: spec.command_path.clone(),
            source,
        })?;

    std::process::exit(status.code().unwrap_or(1))
}
