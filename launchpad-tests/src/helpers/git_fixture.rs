//! Local git repositories standing in for a remote

use std::path::{Path, PathBuf};
use std::process::Command;

const IDENTITY: [(&str, &str); 4] = [
    ("GIT_AUTHOR_NAME", "Launchpad Tests"),
    ("GIT_AUTHOR_EMAIL", "tests@launchpad.invalid"),
    ("GIT_COMMITTER_NAME", "Launchpad Tests"),
    ("GIT_COMMITTER_EMAIL", "tests@launchpad.invalid"),
];

/// Run git in `dir` and return trimmed stdout. Panics on failure.
pub fn git_output(dir: &Path, args: &[&str]) -> String {
    let output = Command::new("git")
        .args(args)
        .current_dir(dir)
        .envs(IDENTITY)
        .env("GIT_CONFIG_NOSYSTEM", "1")
        .output()
        .expect("failed to run git");
    assert!(
        output.status.success(),
        "git {:?} failed in {}: {}",
        args,
        dir.display(),
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8_lossy(&output.stdout).trim().to_string()
}

/// Commit `content` as `file` in the checkout at `dir` and return the new revision
pub fn commit_local(dir: &Path, file: &str, content: &str, message: &str) -> String {
    let path = dir.join(file);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).expect("failed to create parent directory");
    }
    std::fs::write(&path, content).expect("failed to write file");
    git_output(dir, &["add", "--", file]);
    git_output(dir, &["commit", "--quiet", "-m", message]);
    git_output(dir, &["rev-parse", "HEAD"])
}

/// A non-bare repository on `main` used as the clone source
pub struct GitRemote {
    dir: PathBuf,
}

impl GitRemote {
    /// Initialise an empty repository at `dir`
    pub fn new(dir: &Path) -> Self {
        std::fs::create_dir_all(dir).expect("failed to create remote directory");
        git_output(dir, &["init", "--quiet"]);
        git_output(dir, &["symbolic-ref", "HEAD", "refs/heads/main"]);
        Self {
            dir: dir.to_path_buf(),
        }
    }

    /// A remote with a minimal FastAPI-shaped service already committed
    pub fn with_service(dir: &Path) -> Self {
        let remote = Self::new(dir);
        remote.commit("main.py", "app = object()\n", "Add app");
        remote.commit("requirements.txt", "fastapi\nuvicorn\n", "Add requirements");
        remote
    }

    pub fn path(&self) -> &Path {
        &self.dir
    }

    /// Location to hand to `git clone`
    pub fn url(&self) -> String {
        self.dir.to_string_lossy().into_owned()
    }

    pub fn commit(&self, file: &str, content: &str, message: &str) -> String {
        commit_local(&self.dir, file, content, message)
    }

    pub fn head(&self) -> String {
        git_output(&self.dir, &["rev-parse", "HEAD"])
    }

    /// Create `branch` at the current HEAD and switch the remote to it
    pub fn branch(&self, branch: &str) {
        git_output(&self.dir, &["checkout", "--quiet", "-b", branch]);
    }

    pub fn checkout(&self, branch: &str) {
        git_output(&self.dir, &["checkout", "--quiet", branch]);
    }
}
