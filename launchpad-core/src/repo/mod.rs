//! Working-copy synchronization
//!
//! The clone-vs-update decision is a two-state machine over the app dir:
//! `Absent` gets a fresh checkout, `Present` gets a fast-forward update. The
//! state comes only from the local filesystem (is there `.git` metadata?);
//! the remote is never consulted to decide. A third state, `Foreign`, covers
//! a non-empty directory without metadata and is resolved by
//! [`ForeignContentPolicy`].

use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::config::{ForeignContentPolicy, RepoConfig};
use crate::context::ExecutionContext;
use crate::errors::{CommandError, SyncError};
use crate::process::{CommandSpec, run_to_completion};

const GIT_DIR: &str = ".git";
const DEFAULT_ADOPT_BRANCH: &str = "main";

/// What the app dir looks like before syncing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepoState {
    /// Missing, or an empty directory
    Absent,
    /// Has version-control metadata
    Present,
    /// Non-empty, but no metadata
    Foreign,
}

/// What `sync` did to get the working copy current
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncAction {
    Cloned,
    Updated { changed: bool },
    Adopted,
}

/// A synchronized working copy
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkingCopy {
    pub path: PathBuf,
    pub has_version_control_metadata: bool,
    pub head: Option<String>,
    pub action: SyncAction,
}

/// Classify the app dir. Purely local: reads the directory, never the remote.
pub fn probe(path: &Path) -> Result<RepoState, SyncError> {
    let inspect = |source| SyncError::Inspect {
        path: path.to_path_buf(),
        source,
    };

    let meta = match std::fs::metadata(path) {
        Ok(meta) => meta,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(RepoState::Absent),
        Err(e) => return Err(inspect(e)),
    };

    if !meta.is_dir() {
        return Ok(RepoState::Foreign);
    }

    if path.join(GIT_DIR).exists() {
        return Ok(RepoState::Present);
    }

    let mut entries = std::fs::read_dir(path).map_err(inspect)?;
    if entries.next().is_none() {
        Ok(RepoState::Absent)
    } else {
        Ok(RepoState::Foreign)
    }
}

/// Keeps one working copy in step with one remote
#[derive(Debug, Clone)]
pub struct RepoSync {
    remote: String,
    branch: Option<String>,
    depth: Option<u32>,
    foreign_content: ForeignContentPolicy,
}

impl RepoSync {
    pub fn new(remote: impl Into<String>) -> Self {
        Self {
            remote: remote.into(),
            branch: None,
            depth: None,
            foreign_content: ForeignContentPolicy::default(),
        }
    }

    pub fn from_config(config: &RepoConfig) -> Self {
        Self {
            remote: config.url.clone(),
            branch: config.branch.clone(),
            depth: config.depth,
            foreign_content: config.on_foreign_content,
        }
    }

    pub fn with_branch(mut self, branch: impl Into<String>) -> Self {
        self.branch = Some(branch.into());
        self
    }

    pub fn with_depth(mut self, depth: u32) -> Self {
        self.depth = Some(depth);
        self
    }

    pub fn with_foreign_content(mut self, policy: ForeignContentPolicy) -> Self {
        self.foreign_content = policy;
        self
    }

    /// Make `path` a current checkout of the remote.
    ///
    /// Any failure is returned immediately; there is no retry. An update
    /// only ever fast-forwards, so diverged history is an error rather than
    /// a merge.
    pub async fn sync(&self, path: &Path, ctx: &ExecutionContext) -> Result<WorkingCopy, SyncError> {
        let path = &ctx.working_dir().join(path);
        let state = probe(path)?;
        debug!("Working copy {} is {:?}", path.display(), state);

        let action = match state {
            RepoState::Absent => {
                info!("Cloning repository {} into {}", self.remote, path.display());
                self.clone_into(path, ctx).await?;
                SyncAction::Cloned
            }
            RepoState::Present => {
                info!("Updating repository {} from {}", path.display(), self.remote);
                let before = self.head(path, ctx).await;
                self.update(path, ctx).await?;
                let after = self.head(path, ctx).await;
                SyncAction::Updated {
                    changed: before != after,
                }
            }
            RepoState::Foreign => match self.foreign_content {
                ForeignContentPolicy::Refuse => {
                    return Err(SyncError::ForeignContent {
                        path: path.to_path_buf(),
                    });
                }
                ForeignContentPolicy::Adopt => {
                    info!(
                        "Cloning repository {} into non-empty {} (adopting existing files)",
                        self.remote,
                        path.display()
                    );
                    self.adopt(path, ctx).await?;
                    SyncAction::Adopted
                }
            },
        };

        let head = self.head(path, ctx).await;
        match (&action, &head) {
            (SyncAction::Updated { changed: false }, Some(rev)) => {
                info!("Repository already up to date at {}", short(rev))
            }
            (_, Some(rev)) => info!("Repository now at {}", short(rev)),
            (_, None) => warn!("Could not read HEAD of {}", path.display()),
        }

        Ok(WorkingCopy {
            path: path.to_path_buf(),
            has_version_control_metadata: path.join(GIT_DIR).exists(),
            head,
            action,
        })
    }

    async fn clone_into(&self, path: &Path, ctx: &ExecutionContext) -> Result<(), SyncError> {
        let mut args = vec!["clone".to_string()];
        if let Some(branch) = &self.branch {
            args.push("--branch".to_string());
            args.push(branch.clone());
        }
        if let Some(depth) = self.depth {
            args.push("--depth".to_string());
            args.push(depth.to_string());
        }
        args.push("--".to_string());
        args.push(self.remote.clone());
        args.push(path.to_string_lossy().into_owned());

        let cwd = clone_parent(path, ctx);
        git(&args, &cwd, ctx, "git clone")
            .await
            .map_err(|source| self.clone_error(path, source))
    }

    async fn update(&self, path: &Path, ctx: &ExecutionContext) -> Result<(), SyncError> {
        // No --depth: a shallow copy already fetches down to its existing
        // boundary, while a depth-limited fetch would move the boundary past
        // the current HEAD and refuse to fast-forward.
        let args = vec![
            "pull".to_string(),
            "--ff-only".to_string(),
            self.remote.clone(),
            self.fetch_ref().to_string(),
        ];

        git(&args, path, ctx, "git pull")
            .await
            .map_err(|source| SyncError::Update {
                remote: self.remote.clone(),
                path: path.to_path_buf(),
                source,
            })
    }

    /// Check the remote out over existing files without removing any of them.
    async fn adopt(&self, path: &Path, ctx: &ExecutionContext) -> Result<(), SyncError> {
        let result = self.adopt_steps(path, ctx).await;
        if result.is_err() {
            // Drop only the metadata this run created so the next start sees
            // the directory exactly as it was.
            if let Err(e) = std::fs::remove_dir_all(path.join(GIT_DIR)) {
                warn!("Failed to remove partial metadata in {}: {}", path.display(), e);
            }
        }
        result
    }

    async fn adopt_steps(&self, path: &Path, ctx: &ExecutionContext) -> Result<(), SyncError> {
        let local_branch = self.branch.as_deref().unwrap_or(DEFAULT_ADOPT_BRANCH);

        let mut fetch = vec!["fetch".to_string()];
        if let Some(depth) = self.depth {
            fetch.push("--depth".to_string());
            fetch.push(depth.to_string());
        }
        fetch.push(self.remote.clone());
        fetch.push(self.fetch_ref().to_string());

        let steps: [(Vec<String>, &str); 4] = [
            (vec!["init".into(), "--quiet".into()], "git init"),
            (
                vec!["remote".into(), "add".into(), "origin".into(), self.remote.clone()],
                "git remote add",
            ),
            (fetch, "git fetch"),
            (
                vec!["checkout".into(), "-b".into(), local_branch.into(), "FETCH_HEAD".into()],
                "git checkout",
            ),
        ];

        for (args, label) in steps {
            git(&args, path, ctx, label)
                .await
                .map_err(|source| self.clone_error(path, source))?;
        }
        Ok(())
    }

    /// Current `HEAD` revision, if readable
    pub async fn head(&self, path: &Path, ctx: &ExecutionContext) -> Option<String> {
        let args = ["rev-parse".to_string(), "HEAD".to_string()];
        let spec = git_spec(&args, path, ctx);
        match run_to_completion(&spec, "git rev-parse").await {
            Ok(output) => output.stdout.last().map(|s| s.trim().to_string()),
            Err(e) => {
                debug!("git rev-parse HEAD failed in {}: {}", path.display(), e);
                None
            }
        }
    }

    fn fetch_ref(&self) -> &str {
        self.branch.as_deref().unwrap_or("HEAD")
    }

    fn clone_error(&self, path: &Path, source: CommandError) -> SyncError {
        SyncError::Clone {
            remote: self.remote.clone(),
            path: path.to_path_buf(),
            source,
        }
    }
}

/// git runs from the nearest existing ancestor so `clone` can create
/// missing parent directories itself. `path` is absolute here.
fn clone_parent(path: &Path, ctx: &ExecutionContext) -> PathBuf {
    path.ancestors()
        .skip(1)
        .find(|p| p.is_dir())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| ctx.working_dir().to_path_buf())
}

fn git_spec(args: &[String], cwd: &Path, ctx: &ExecutionContext) -> CommandSpec {
    let mut program_and_args = Vec::with_capacity(args.len() + 1);
    program_and_args.push("git".to_string());
    program_and_args.extend(args.iter().cloned());

    let mut spec = CommandSpec::in_context(program_and_args, ctx)
        // fail on missing credentials instead of waiting on a prompt nobody sees
        .env("GIT_TERMINAL_PROMPT", "0")
        .env("GIT_ASKPASS", "true");
    spec.working_dir = cwd.to_path_buf();
    spec
}

async fn git(
    args: &[String],
    cwd: &Path,
    ctx: &ExecutionContext,
    label: &str,
) -> Result<(), CommandError> {
    run_to_completion(&git_spec(args, cwd, ctx), label).await.map(|_| ())
}

fn short(rev: &str) -> &str {
    rev.get(..12).unwrap_or(rev)
}

#[cfg(test)]
mod tests;
