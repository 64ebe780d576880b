//! Stage sequencing
//!
//! Sync, install, browser runtime and start-command resolution run strictly
//! in order. Each stage runs under its own timeout and races the shutdown
//! signals; whichever finishes first decides the outcome. Losing the race
//! drops the stage future, which kills the tool's process group.

use std::future::Future;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::{CapabilityPolicy, Config};
use crate::context::ExecutionContext;
use crate::errors::{LaunchError, Stage};
use crate::handoff::{self, ServiceStartSpec};
use crate::provision::{DependencyManifest, InstallOutcome, Provisioner};
use crate::repo::{self, RepoState, RepoSync, WorkingCopy};

/// Termination signals observed before the handoff
pub struct ShutdownSignals {
    #[cfg(unix)]
    terminate: tokio::signal::unix::Signal,
    #[cfg(unix)]
    interrupt: tokio::signal::unix::Signal,
    #[cfg(unix)]
    hangup: tokio::signal::unix::Signal,
}

impl ShutdownSignals {
    /// Register the handlers. Must be called inside a tokio runtime.
    #[cfg(unix)]
    pub fn install() -> std::io::Result<Self> {
        use tokio::signal::unix::{SignalKind, signal};

        Ok(Self {
            terminate: signal(SignalKind::terminate())?,
            interrupt: signal(SignalKind::interrupt())?,
            hangup: signal(SignalKind::hangup())?,
        })
    }

    #[cfg(not(unix))]
    pub fn install() -> std::io::Result<Self> {
        Ok(Self {})
    }

    /// Wait for the next termination signal and return its number.
    #[cfg(unix)]
    pub async fn recv(&mut self) -> i32 {
        use nix::sys::signal::Signal;

        let signal = tokio::select! {
            _ = self.terminate.recv() => Signal::SIGTERM,
            _ = self.interrupt.recv() => Signal::SIGINT,
            _ = self.hangup.recv() => Signal::SIGHUP,
        };
        info!("Received {}", signal.as_str());
        signal as i32
    }

    /// A signal that was already caught, without waiting for a new one.
    pub async fn pending(&mut self) -> Option<i32> {
        // one scheduler turn lets the driver deliver anything already caught
        tokio::task::yield_now().await;
        tokio::select! {
            biased;
            signal = self.recv() => Some(signal),
            _ = std::future::ready(()) => None,
        }
    }

    /// Give SIGTERM, SIGINT and SIGHUP back to the kernel's default action.
    #[cfg(unix)]
    pub fn restore_default(&self) -> std::io::Result<()> {
        use nix::sys::signal::Signal;

        launchpad_unix::process::restore_default_signals(&[
            Signal::SIGTERM,
            Signal::SIGINT,
            Signal::SIGHUP,
        ])
        .map_err(std::io::Error::from)
    }

    #[cfg(not(unix))]
    pub fn restore_default(&self) -> std::io::Result<()> {
        Ok(())
    }

    #[cfg(not(unix))]
    pub async fn recv(&mut self) -> i32 {
        const SIGINT: i32 = 2;

        if tokio::signal::ctrl_c().await.is_err() {
            std::future::pending::<()>().await;
        }
        info!("Received Ctrl+C");
        SIGINT
    }
}

/// Run one stage under `limit`, aborting early on a termination signal.
pub async fn run_stage<T, E, F>(
    stage: Stage,
    limit: Option<Duration>,
    signals: &mut ShutdownSignals,
    work: F,
) -> Result<T, LaunchError>
where
    F: Future<Output = Result<T, E>>,
    E: Into<LaunchError>,
{
    let bounded = async {
        match limit {
            Some(after) => tokio::time::timeout(after, work)
                .await
                .map_err(|_| LaunchError::Timeout { stage, after }),
            None => Ok(work.await),
        }
    };

    tokio::select! {
        result = bounded => result?.map_err(Into::into),
        signal = signals.recv() => {
            warn!("Aborting {} stage", stage);
            Err(LaunchError::Interrupted { stage, signal })
        }
    }
}

/// One launchpad run: everything up to (not including) the handoff
pub struct Pipeline {
    config: Config,
    signals: ShutdownSignals,
}

impl Pipeline {
    /// Must be called inside a tokio runtime.
    pub fn new(config: Config) -> Result<Self, LaunchError> {
        let signals = ShutdownSignals::install().map_err(LaunchError::Signals)?;
        Ok(Self { config, signals })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Bring the working copy up to date.
    pub async fn sync(&mut self, ctx: &ExecutionContext) -> Result<WorkingCopy, LaunchError> {
        let app_dir = ctx.working_dir().join(&self.config.repo.app_dir);
        let stage = match repo::probe(&app_dir)? {
            RepoState::Present => Stage::Update,
            RepoState::Absent | RepoState::Foreign => Stage::Clone,
        };

        let sync = RepoSync::from_config(&self.config.repo);
        run_stage(
            stage,
            self.config.timeouts.sync,
            &mut self.signals,
            sync.sync(&app_dir, ctx),
        )
        .await
    }

    /// Install dependencies, then the browser runtime as its policy allows.
    ///
    /// `ctx` must be rooted at the working copy. The returned context is the
    /// one the service should start in.
    pub async fn provision(&mut self, ctx: ExecutionContext) -> Result<ExecutionContext, LaunchError> {
        let provisioner = Provisioner::from_config(&self.config.deps);
        let manifest = DependencyManifest::new(&self.config.deps.manifest, self.config.deps.scope);

        let (outcome, ctx) = run_stage(
            Stage::Install,
            self.config.timeouts.install,
            &mut self.signals,
            provisioner.install(&manifest, &ctx),
        )
        .await?;
        debug!("Manifest install outcome: {:?}", outcome);
        if outcome == InstallOutcome::AlreadySatisfied {
            debug!("Skipped pip; stamp at {}", provisioner.stamp_path().display());
        }

        let browser = &self.config.browser;
        if browser.policy == CapabilityPolicy::Skip {
            debug!("Browser runtime install disabled");
            return Ok(ctx);
        }

        let result = run_stage(
            Stage::Browser,
            self.config.timeouts.browser,
            &mut self.signals,
            provisioner.install_optional_capability(&browser.name, self.config.deps.scope, &ctx),
        )
        .await;

        match result {
            Ok(()) => {}
            Err(e @ LaunchError::Interrupted { .. }) => return Err(e),
            Err(e) if browser.policy == CapabilityPolicy::Required => return Err(e),
            Err(e) => warn!("{}; continuing without the browser runtime", e),
        }
        Ok(ctx)
    }

    /// Sync, provision and resolve the start command.
    ///
    /// `command` overrides the configured start command when non-empty.
    pub async fn prepare(
        &mut self,
        ctx: ExecutionContext,
        command: Option<&[String]>,
    ) -> Result<ServiceStartSpec, LaunchError> {
        let working_copy = self.sync(&ctx).await?;
        let app_ctx = ctx.with_working_dir(&working_copy.path);
        let app_ctx = self.provision(app_ctx).await?;

        let command = handoff::start_command(&self.config.service, command);
        let spec = handoff::resolve(&command, &self.config.service, &app_ctx)?;
        self.check_interrupted().await?;
        Ok(spec)
    }

    /// Stop catching termination signals ahead of the handoff.
    ///
    /// From here on a termination signal kills the process outright. One
    /// caught before the switch is reported as `Interrupted`, so a request to
    /// stop is never swallowed between the last stage and the exec.
    pub async fn release_signals(&mut self) -> Result<(), LaunchError> {
        self.signals.restore_default().map_err(LaunchError::Signals)?;
        self.check_interrupted().await
    }

    async fn check_interrupted(&mut self) -> Result<(), LaunchError> {
        match self.signals.pending().await {
            Some(signal) => {
                warn!("Not starting the application");
                Err(LaunchError::Interrupted {
                    stage: Stage::Handoff,
                    signal,
                })
            }
            None => Ok(()),
        }
    }

    /// Provision from the existing working copy without syncing it.
    pub async fn install_only(&mut self, ctx: ExecutionContext) -> Result<ExecutionContext, LaunchError> {
        let app_ctx = ctx.with_working_dir(&self.config.repo.app_dir);
        self.provision(app_ctx).await
    }
}

#[cfg(test)]
mod tests;
