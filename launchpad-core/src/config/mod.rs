//! Configuration resolution
//!
//! launchpad is configured entirely through a fixed set of `LAUNCHPAD_*`
//! variables. [`Config::resolve`] is a pure function of the variable map it is
//! given; reading the process environment (and any env file) is the caller's
//! job, which keeps resolution testable without touching global state.

mod duration;

pub use duration::{format_duration, parse_duration, parse_timeout};

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::errors::ConfigError;

pub const ENV_PREFIX: &str = "LAUNCHPAD_";

pub const REPO_URL: &str = "LAUNCHPAD_REPO_URL";
pub const REPO_BRANCH: &str = "LAUNCHPAD_REPO_BRANCH";
pub const REPO_DEPTH: &str = "LAUNCHPAD_REPO_DEPTH";
pub const APP_DIR: &str = "LAUNCHPAD_APP_DIR";
pub const MANIFEST: &str = "LAUNCHPAD_MANIFEST";
pub const INSTALL_SCOPE: &str = "LAUNCHPAD_INSTALL_SCOPE";
pub const PYTHON: &str = "LAUNCHPAD_PYTHON";
pub const BROWSER: &str = "LAUNCHPAD_BROWSER";
pub const BROWSER_NAME: &str = "LAUNCHPAD_BROWSER_NAME";
pub const HOST: &str = "LAUNCHPAD_HOST";
pub const PORT: &str = "LAUNCHPAD_PORT";
pub const APP_MODULE: &str = "LAUNCHPAD_APP_MODULE";
pub const START_COMMAND: &str = "LAUNCHPAD_START_COMMAND";
pub const ON_FOREIGN_CONTENT: &str = "LAUNCHPAD_ON_FOREIGN_CONTENT";
pub const FORCE_INSTALL: &str = "LAUNCHPAD_FORCE_INSTALL";
pub const STATE_DIR: &str = "LAUNCHPAD_STATE_DIR";
pub const SYNC_TIMEOUT: &str = "LAUNCHPAD_SYNC_TIMEOUT";
pub const INSTALL_TIMEOUT: &str = "LAUNCHPAD_INSTALL_TIMEOUT";
pub const BROWSER_TIMEOUT: &str = "LAUNCHPAD_BROWSER_TIMEOUT";

/// Every variable launchpad understands. Anything else under the prefix is
/// rejected so a typo cannot silently fall back to a default.
pub const RECOGNIZED: &[&str] = &[
    REPO_URL,
    REPO_BRANCH,
    REPO_DEPTH,
    APP_DIR,
    MANIFEST,
    INSTALL_SCOPE,
    PYTHON,
    BROWSER,
    BROWSER_NAME,
    HOST,
    PORT,
    APP_MODULE,
    START_COMMAND,
    ON_FOREIGN_CONTENT,
    FORCE_INSTALL,
    STATE_DIR,
    SYNC_TIMEOUT,
    INSTALL_TIMEOUT,
    BROWSER_TIMEOUT,
];

const DEFAULT_APP_DIR: &str = "/app";
const DEFAULT_MANIFEST: &str = "requirements.txt";
const DEFAULT_PYTHON: &str = "python3";
const DEFAULT_BROWSER_NAME: &str = "chromium";
const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 8000;
const DEFAULT_APP_MODULE: &str = "main:app";
const DEFAULT_SYNC_TIMEOUT: Duration = Duration::from_secs(5 * 60);
const DEFAULT_INSTALL_TIMEOUT: Duration = Duration::from_secs(15 * 60);
const DEFAULT_BROWSER_TIMEOUT: Duration = Duration::from_secs(10 * 60);
const STATE_DIR_NAME: &str = ".launchpad";

/// Where dependencies get installed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InstallScope {
    /// Per-user site packages; works without root.
    #[default]
    User,
    System,
}

impl FromStr for InstallScope {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(InstallScope::User),
            "system" => Ok(InstallScope::System),
            _ => Err("expected 'user' or 'system'".to_string()),
        }
    }
}

impl fmt::Display for InstallScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InstallScope::User => write!(f, "user"),
            InstallScope::System => write!(f, "system"),
        }
    }
}

/// How a failed browser-runtime install is treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CapabilityPolicy {
    /// Never attempt the install.
    Skip,
    /// Attempt it; a failure is logged and the run continues.
    #[default]
    Optional,
    /// Attempt it; a failure aborts the run.
    Required,
}

impl FromStr for CapabilityPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "skip" => Ok(CapabilityPolicy::Skip),
            "optional" => Ok(CapabilityPolicy::Optional),
            "required" => Ok(CapabilityPolicy::Required),
            _ => Err("expected 'skip', 'optional' or 'required'".to_string()),
        }
    }
}

/// What to do when the app dir holds files but no repository.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ForeignContentPolicy {
    #[default]
    Refuse,
    /// Initialise a repository in place and check the remote out over the
    /// existing files. git refuses to overwrite untracked files, so nothing
    /// already there is lost.
    Adopt,
}

impl FromStr for ForeignContentPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "refuse" => Ok(ForeignContentPolicy::Refuse),
            "adopt" => Ok(ForeignContentPolicy::Adopt),
            _ => Err("expected 'refuse' or 'adopt'".to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RepoConfig {
    pub url: String,
    pub branch: Option<String>,
    pub depth: Option<u32>,
    pub app_dir: PathBuf,
    pub on_foreign_content: ForeignContentPolicy,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DepsConfig {
    /// Manifest path; relative paths are relative to the app dir.
    pub manifest: PathBuf,
    pub scope: InstallScope,
    pub python: String,
    pub force: bool,
    pub state_dir: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BrowserConfig {
    pub policy: CapabilityPolicy,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ServiceConfig {
    pub host: String,
    pub port: u16,
    pub app_module: String,
    pub start_command: Option<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StageTimeouts {
    #[serde(serialize_with = "duration::serialize_timeout")]
    pub sync: Option<Duration>,
    #[serde(serialize_with = "duration::serialize_timeout")]
    pub install: Option<Duration>,
    #[serde(serialize_with = "duration::serialize_timeout")]
    pub browser: Option<Duration>,
}

/// Fully resolved launchpad configuration
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Config {
    pub repo: RepoConfig,
    pub deps: DepsConfig,
    pub browser: BrowserConfig,
    pub service: ServiceConfig,
    pub timeouts: StageTimeouts,
}

impl Config {
    /// Resolve the configuration from a variable map.
    pub fn resolve(vars: &HashMap<String, String>) -> Result<Config, ConfigError> {
        reject_unrecognized(vars)?;
        let lookup = Lookup { vars };

        let url = lookup.get(REPO_URL).ok_or(ConfigError::Missing(REPO_URL))?;
        let app_dir = PathBuf::from(lookup.get(APP_DIR).unwrap_or(DEFAULT_APP_DIR));

        let depth = lookup.parse_with(REPO_DEPTH, |s| match s.parse::<u32>() {
            Ok(0) | Err(_) => Err("expected a positive integer".to_string()),
            Ok(n) => Ok(n),
        })?;

        let state_dir = match lookup.get(STATE_DIR) {
            Some(dir) => PathBuf::from(dir),
            None => default_state_dir(vars)?,
        };

        let port = lookup
            .parse_with(PORT, |s| match s.parse::<u16>() {
                Ok(0) | Err(_) => Err("expected a port between 1 and 65535".to_string()),
                Ok(p) => Ok(p),
            })?
            .unwrap_or(DEFAULT_PORT);

        let start_command = match lookup.get(START_COMMAND) {
            Some(cmd) => Some(cmd.split_whitespace().map(str::to_string).collect()),
            None => None,
        };

        Ok(Config {
            repo: RepoConfig {
                url: url.to_string(),
                branch: lookup.get(REPO_BRANCH).map(str::to_string),
                depth,
                app_dir,
                on_foreign_content: lookup.parse(ON_FOREIGN_CONTENT)?.unwrap_or_default(),
            },
            deps: DepsConfig {
                manifest: PathBuf::from(lookup.get(MANIFEST).unwrap_or(DEFAULT_MANIFEST)),
                scope: lookup.parse(INSTALL_SCOPE)?.unwrap_or_default(),
                python: lookup.get(PYTHON).unwrap_or(DEFAULT_PYTHON).to_string(),
                force: lookup.parse_with(FORCE_INSTALL, parse_bool)?.unwrap_or(false),
                state_dir,
            },
            browser: BrowserConfig {
                policy: lookup.parse(BROWSER)?.unwrap_or_default(),
                name: lookup.get(BROWSER_NAME).unwrap_or(DEFAULT_BROWSER_NAME).to_string(),
            },
            service: ServiceConfig {
                host: lookup.get(HOST).unwrap_or(DEFAULT_HOST).to_string(),
                port,
                app_module: lookup.get(APP_MODULE).unwrap_or(DEFAULT_APP_MODULE).to_string(),
                start_command,
            },
            timeouts: StageTimeouts {
                sync: lookup.timeout(SYNC_TIMEOUT, DEFAULT_SYNC_TIMEOUT)?,
                install: lookup.timeout(INSTALL_TIMEOUT, DEFAULT_INSTALL_TIMEOUT)?,
                browser: lookup.timeout(BROWSER_TIMEOUT, DEFAULT_BROWSER_TIMEOUT)?,
            },
        })
    }
}

/// Parse a boolean flag value (`1/0`, `true/false`, `yes/no`, `on/off`)
pub fn parse_bool(s: &str) -> std::result::Result<bool, String> {
    match s.to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err("expected a boolean (true/false)".to_string()),
    }
}

fn reject_unrecognized(vars: &HashMap<String, String>) -> Result<(), ConfigError> {
    let mut unknown: Vec<&String> = vars
        .keys()
        .filter(|k| k.starts_with(ENV_PREFIX) && !RECOGNIZED.contains(&k.as_str()))
        .collect();
    unknown.sort();
    match unknown.first() {
        Some(name) => Err(ConfigError::Unrecognized((*name).clone())),
        None => Ok(()),
    }
}

fn default_state_dir(vars: &HashMap<String, String>) -> Result<PathBuf, ConfigError> {
    vars.get("HOME")
        .filter(|h| !h.is_empty())
        .map(PathBuf::from)
        .or_else(dirs::home_dir)
        .map(|home| home.join(STATE_DIR_NAME))
        .ok_or(ConfigError::Missing(STATE_DIR))
}

/// Read-only view over the variable map; empty values count as unset.
struct Lookup<'a> {
    vars: &'a HashMap<String, String>,
}

impl<'a> Lookup<'a> {
    fn get(&self, name: &str) -> Option<&'a str> {
        self.vars
            .get(name)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }

    fn parse_with<T>(
        &self,
        name: &'static str,
        parse: impl FnOnce(&str) -> std::result::Result<T, String>,
    ) -> Result<Option<T>, ConfigError> {
        self.get(name)
            .map(|value| {
                parse(value).map_err(|reason| ConfigError::Invalid {
                    name,
                    value: value.to_string(),
                    reason,
                })
            })
            .transpose()
    }

    fn parse<T: FromStr<Err = String>>(&self, name: &'static str) -> Result<Option<T>, ConfigError> {
        self.parse_with(name, |s| s.parse::<T>())
    }

    fn timeout(&self, name: &'static str, default: Duration) -> Result<Option<Duration>, ConfigError> {
        Ok(self.parse_with(name, parse_timeout)?.unwrap_or(Some(default)))
    }
}

#[cfg(test)]
mod tests;
