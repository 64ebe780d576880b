//! Sandboxed variable maps for pipeline runs

use launchpad_core::config;
use launchpad_core::context::ExecutionContext;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

const SYSTEM_PATH: &str = "/usr/local/bin:/usr/bin:/bin";

/// Builds the variable map a container would see, rooted in a temp dir.
///
/// `HOME`, the app dir and the state dir all live under `root`, so nothing
/// a test does touches the real home directory.
pub struct TestEnvBuilder {
    root: PathBuf,
    vars: HashMap<String, String>,
}

impl TestEnvBuilder {
    pub fn new(root: &Path) -> Self {
        let home = root.join("home");
        std::fs::create_dir_all(&home).expect("failed to create test home");

        let mut vars = HashMap::new();
        vars.insert("HOME".to_string(), path_string(&home));
        vars.insert("PATH".to_string(), SYSTEM_PATH.to_string());
        vars.insert(config::APP_DIR.to_string(), path_string(&root.join("app")));
        vars.insert(config::STATE_DIR.to_string(), path_string(&root.join("state")));

        Self {
            root: root.to_path_buf(),
            vars,
        }
    }

    pub fn with_repo_url(self, url: &str) -> Self {
        self.with_var(config::REPO_URL, url)
    }

    pub fn with_python(self, python: &Path) -> Self {
        self.with_var(config::PYTHON, &path_string(python))
    }

    pub fn with_browser(self, policy: &str) -> Self {
        self.with_var(config::BROWSER, policy)
    }

    pub fn with_var(mut self, name: &str, value: &str) -> Self {
        self.vars.insert(name.to_string(), value.to_string());
        self
    }

    pub fn without_var(mut self, name: &str) -> Self {
        self.vars.remove(name);
        self
    }

    pub fn app_dir(&self) -> PathBuf {
        PathBuf::from(&self.vars[config::APP_DIR])
    }

    pub fn home(&self) -> PathBuf {
        self.root.join("home")
    }

    pub fn vars(&self) -> &HashMap<String, String> {
        &self.vars
    }

    /// Context a run would start with, rooted at the sandbox
    pub fn context(&self) -> ExecutionContext {
        ExecutionContext::new(&self.vars, &self.root)
    }

    pub fn build(self) -> HashMap<String, String> {
        self.vars
    }
}

fn path_string(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}
