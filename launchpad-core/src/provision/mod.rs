//! Dependency provisioning
//!
//! Two independent units:
//! - the dependency manifest, installed with pip and gated by a stamp so an
//!   unchanged manifest costs no network round trip on restart
//! - the browser runtime, installed with playwright and allowed to fail on
//!   its own (the caller decides whether that failure matters)

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::config::{DepsConfig, InstallScope};
use crate::context::ExecutionContext;
use crate::errors::ProvisionError;
use crate::process::{CommandSpec, run_to_completion};

const STAMP_FILE: &str = "manifest.stamp";

/// The service's declared runtime dependencies
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyManifest {
    pub path: PathBuf,
    pub scope: InstallScope,
}

impl DependencyManifest {
    pub fn new(path: impl Into<PathBuf>, scope: InstallScope) -> Self {
        Self {
            path: path.into(),
            scope,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallOutcome {
    Installed,
    /// The stamp matched; pip was not run.
    AlreadySatisfied,
}

/// Record of the last successful manifest install
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManifestStamp {
    pub digest: String,
    pub scope: InstallScope,
    pub interpreter: String,
    pub installed_at: DateTime<Utc>,
}

/// SHA-256 over everything that changes what pip would install.
pub fn manifest_digest(contents: &[u8], scope: InstallScope, interpreter: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(contents);
    hasher.update([0u8]);
    hasher.update(scope.to_string().as_bytes());
    hasher.update([0u8]);
    hasher.update(interpreter.as_bytes());
    hex::encode(hasher.finalize())
}

/// Directory pip puts entry points in for `--user` installs
pub fn user_bin_dir(ctx: &ExecutionContext) -> Option<PathBuf> {
    if let Some(base) = ctx.var("PYTHONUSERBASE") {
        return Some(PathBuf::from(base).join("bin"));
    }
    ctx.var("HOME")
        .map(|home| PathBuf::from(home).join(".local").join("bin"))
}

/// Installs manifests and optional capabilities with one interpreter
#[derive(Debug, Clone)]
pub struct Provisioner {
    python: String,
    state_dir: PathBuf,
    force: bool,
}

impl Provisioner {
    pub fn new(python: impl Into<String>, state_dir: impl Into<PathBuf>) -> Self {
        Self {
            python: python.into(),
            state_dir: state_dir.into(),
            force: false,
        }
    }

    pub fn from_config(config: &DepsConfig) -> Self {
        Self {
            python: config.python.clone(),
            state_dir: config.state_dir.clone(),
            force: config.force,
        }
    }

    /// Ignore the stamp and always run pip
    pub fn with_force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    pub fn stamp_path(&self) -> PathBuf {
        self.state_dir.join(STAMP_FILE)
    }

    /// Install the manifest and return the context the next stage should use.
    ///
    /// For user-scope installs the returned context searches the user `bin`
    /// directory first, whether or not pip actually ran.
    pub async fn install(
        &self,
        manifest: &DependencyManifest,
        ctx: &ExecutionContext,
    ) -> Result<(InstallOutcome, ExecutionContext), ProvisionError> {
        let path = ctx.working_dir().join(&manifest.path);
        let contents = match tokio::fs::read(&path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(ProvisionError::ManifestNotFound(path));
            }
            Err(source) => return Err(ProvisionError::ManifestRead { path, source }),
        };

        let next_ctx = extend_for_scope(ctx.clone(), manifest.scope);
        let digest = manifest_digest(&contents, manifest.scope, &self.python);

        if self.force {
            debug!("Forced install, ignoring {}", self.stamp_path().display());
        } else if self.read_stamp().is_some_and(|stamp| stamp.digest == digest) {
            info!(
                "Dependencies from {} already installed, skipping",
                path.display()
            );
            return Ok((InstallOutcome::AlreadySatisfied, next_ctx));
        }

        info!(
            "Installing dependencies from {} ({} scope)",
            path.display(),
            manifest.scope
        );

        let mut args = vec![
            self.python.clone(),
            "-m".to_string(),
            "pip".to_string(),
            "install".to_string(),
            "--disable-pip-version-check".to_string(),
            "--no-input".to_string(),
        ];
        if manifest.scope == InstallScope::User {
            args.push("--user".to_string());
        }
        args.push("-r".to_string());
        args.push(path.to_string_lossy().into_owned());

        run_to_completion(&CommandSpec::in_context(args, ctx), "pip install")
            .await
            .map_err(|source| ProvisionError::Manifest {
                path: path.clone(),
                source,
            })?;

        let stamp = ManifestStamp {
            digest,
            scope: manifest.scope,
            interpreter: self.python.clone(),
            installed_at: Utc::now(),
        };
        // The install itself succeeded; a missing stamp only costs a
        // reinstall next time.
        if let Err(e) = self.write_stamp(&stamp) {
            warn!(
                "Failed to write install stamp {}: {}",
                self.stamp_path().display(),
                e
            );
        }

        Ok((InstallOutcome::Installed, next_ctx))
    }

    /// Install the headless browser runtime.
    ///
    /// A failure here is reported as [`ProvisionError::Capability`], never as
    /// a manifest failure.
    pub async fn install_optional_capability(
        &self,
        browser: &str,
        scope: InstallScope,
        ctx: &ExecutionContext,
    ) -> Result<(), ProvisionError> {
        info!("Installing browser runtime {}", browser);

        let mut args = vec![
            self.python.clone(),
            "-m".to_string(),
            "playwright".to_string(),
            "install".to_string(),
        ];
        // system packages need root
        if scope == InstallScope::System {
            args.push("--with-deps".to_string());
        }
        args.push(browser.to_string());

        run_to_completion(&CommandSpec::in_context(args, ctx), "playwright install")
            .await
            .map(|_| ())
            .map_err(|source| ProvisionError::Capability {
                capability: format!("browser runtime {}", browser),
                source,
            })
    }

    /// The last stamp, or `None` if missing or unreadable
    pub fn read_stamp(&self) -> Option<ManifestStamp> {
        let path = self.stamp_path();
        let contents = match std::fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                warn!("Failed to read install stamp {}: {}", path.display(), e);
                return None;
            }
        };
        match serde_yaml::from_str(&contents) {
            Ok(stamp) => Some(stamp),
            Err(e) => {
                warn!("Ignoring corrupt install stamp {}: {}", path.display(), e);
                None
            }
        }
    }

    fn write_stamp(&self, stamp: &ManifestStamp) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.state_dir)?;
        let yaml = serde_yaml::to_string(stamp).map_err(std::io::Error::other)?;
        write_atomic(&self.stamp_path(), yaml.as_bytes())
    }
}

fn extend_for_scope(ctx: ExecutionContext, scope: InstallScope) -> ExecutionContext {
    match (scope, user_bin_dir(&ctx)) {
        (InstallScope::User, Some(bin)) => {
            debug!("Adding {} to the search path", bin.display());
            ctx.with_path_prepended(bin)
        }
        (InstallScope::User, None) => {
            warn!("Neither PYTHONUSERBASE nor HOME is set; user-installed commands may not resolve");
            ctx
        }
        (InstallScope::System, _) => ctx,
    }
}

/// Write through a sibling temp file and rename, so a crash never leaves a
/// half-written file behind.
fn write_atomic(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    let tmp = path.with_extension("tmp");
    let mut file = std::fs::File::create(&tmp)?;
    file.write_all(contents)?;
    file.sync_all()?;
    std::fs::rename(&tmp, path)
}
