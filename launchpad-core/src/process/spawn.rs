//! Running external tools to completion

use std::collections::VecDeque;
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio::task::JoinHandle;
use tracing::debug;

use super::CommandSpec;
use crate::errors::CommandError;

/// Lines of output kept per stream for diagnostics
const TAIL_LINES: usize = 40;

/// Trailing output of a finished command
#[derive(Debug, Default)]
pub struct CommandOutput {
    pub stdout: Vec<String>,
    pub stderr: Vec<String>,
}

/// SIGKILLs the child's process group if the run is abandoned.
///
/// Each tool runs in its own group, so dropping the future (stage timeout,
/// termination signal) also takes down helpers such as `git-remote-https`
/// that `kill_on_drop` alone would leave behind.
struct GroupGuard {
    pgid: Option<i32>,
}

impl GroupGuard {
    fn disarm(&mut self) {
        self.pgid = None;
    }
}

impl Drop for GroupGuard {
    fn drop(&mut self) {
        #[cfg(unix)]
        if let Some(pgid) = self.pgid.take() {
            use nix::sys::signal::{Signal, killpg};
            use nix::unistd::Pid;

            debug!("Killing abandoned process group {}", pgid);
            let _ = killpg(Pid::from_raw(pgid), Signal::SIGKILL);
        }
    }
}

fn build_command(spec: &CommandSpec) -> Result<Command, CommandError> {
    let Some((program, args)) = spec.program_and_args.split_first() else {
        return Err(CommandError::Empty);
    };

    if !spec.working_dir.is_dir() {
        return Err(CommandError::MissingWorkingDir(spec.working_dir.clone()));
    }

    let mut cmd = Command::new(program);
    cmd.args(args)
        .current_dir(&spec.working_dir)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    #[cfg(unix)]
    cmd.process_group(0);

    if spec.clear_env {
        cmd.env_clear();
    }
    cmd.envs(&spec.environment);

    Ok(cmd)
}

/// Forward each line of a stream to tracing, keeping the last few lines.
fn spawn_capture_task(
    stream: Option<impl tokio::io::AsyncRead + Unpin + Send + 'static>,
    label: String,
) -> JoinHandle<VecDeque<String>> {
    tokio::spawn(async move {
        let mut tail = VecDeque::with_capacity(TAIL_LINES);
        if let Some(stream) = stream {
            let mut lines = BufReader::new(stream).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                debug!(target: "tool", "[{}] {}", label, line);
                if tail.len() == TAIL_LINES {
                    tail.pop_front();
                }
                tail.push_back(line);
            }
        }
        tail
    })
}

/// Run a command and wait for it to exit.
///
/// `label` names the tool in logs and errors (e.g. `"git clone"`). A non-zero
/// exit becomes [`CommandError::Failed`] carrying the tail of stderr.
pub async fn run_to_completion(
    spec: &CommandSpec,
    label: &str,
) -> Result<CommandOutput, CommandError> {
    let mut cmd = build_command(spec)?;
    debug!("Running {}: {:?}", label, spec.program_and_args);

    let mut child = cmd.spawn().map_err(|source| CommandError::Spawn {
        program: label.to_string(),
        source,
    })?;
    let mut guard = GroupGuard {
        pgid: child.id().map(|pid| pid as i32),
    };

    let stdout_task = spawn_capture_task(child.stdout.take(), label.to_string());
    let stderr_task = spawn_capture_task(child.stderr.take(), label.to_string());

    let status = child.wait().await.map_err(|source| CommandError::Spawn {
        program: label.to_string(),
        source,
    })?;
    guard.disarm();

    let stdout: Vec<String> = stdout_task.await.unwrap_or_default().into();
    let stderr: Vec<String> = stderr_task.await.unwrap_or_default().into();

    if !status.success() {
        return Err(CommandError::Failed {
            program: label.to_string(),
            exit_code: status.code(),
            stderr,
        });
    }

    Ok(CommandOutput { stdout, stderr })
}
