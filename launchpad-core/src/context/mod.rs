//! Execution context threaded through every stage
//!
//! Stages never call `set_current_dir` or `set_var`. Instead each one takes
//! an [`ExecutionContext`] and, when it needs to (a user-local install adds a
//! `bin` directory to the search path), returns an extended copy.

use std::collections::{BTreeMap, HashMap};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tracing::warn;

const PATH_VAR: &str = "PATH";

/// Environment, search path and working directory for child processes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionContext {
    working_dir: PathBuf,
    search_path: Vec<PathBuf>,
    /// Everything except `PATH`, which is derived from `search_path`
    env: BTreeMap<String, String>,
}

impl ExecutionContext {
    /// Build a context from a snapshot of variables and a starting directory
    pub fn new(vars: &HashMap<String, String>, working_dir: impl Into<PathBuf>) -> Self {
        let search_path = vars
            .get(PATH_VAR)
            .map(|p| std::env::split_paths(p).filter(|d| !d.as_os_str().is_empty()).collect())
            .unwrap_or_default();
        let env = vars
            .iter()
            .filter(|(k, _)| k.as_str() != PATH_VAR)
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();

        Self {
            working_dir: working_dir.into(),
            search_path,
            env,
        }
    }

    pub fn working_dir(&self) -> &Path {
        &self.working_dir
    }

    pub fn search_path(&self) -> &[PathBuf] {
        &self.search_path
    }

    pub fn var(&self, name: &str) -> Option<&str> {
        if name == PATH_VAR {
            return None;
        }
        self.env.get(name).map(String::as_str)
    }

    /// Same context, rooted at `dir`. Relative paths resolve against the
    /// current working directory.
    pub fn with_working_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.working_dir = self.working_dir.join(dir);
        self
    }

    /// Same context with `dir` searched first. A directory already on the
    /// path moves to the front rather than appearing twice.
    pub fn with_path_prepended(mut self, dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        if std::env::join_paths([&dir]).is_err() {
            warn!("Not adding {:?} to the search path: contains a path separator", dir);
            return self;
        }
        self.search_path.retain(|d| d != &dir);
        self.search_path.insert(0, dir);
        self
    }

    pub fn with_var(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        let name = name.into();
        let value = value.into();
        if name == PATH_VAR {
            self.search_path = std::env::split_paths(&value).collect();
        } else {
            self.env.insert(name, value);
        }
        self
    }

    /// The search path joined into a `PATH` value
    pub fn path_var(&self) -> OsString {
        std::env::join_paths(&self.search_path).unwrap_or_default()
    }

    /// Full environment for a child process, `PATH` included
    pub fn environment(&self) -> HashMap<String, String> {
        let mut env: HashMap<String, String> = self
            .env
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        env.insert(PATH_VAR.to_string(), self.path_var().to_string_lossy().into_owned());
        env
    }
}
