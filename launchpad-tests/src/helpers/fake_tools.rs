//! Interpreter stand-in for pip and playwright
//!
//! `FakePython` writes a shell script that answers `-m pip install` and
//! `-m playwright install`, appends every invocation to a log, and can be
//! told to fail or stall. A successful `--user` install drops an executable
//! `uvicorn` into the user base `bin` directory, the way pip would.

use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Builder and inspector for a fake interpreter
#[derive(Clone)]
pub struct FakePython {
    dir: PathBuf,
    pip_exit: i32,
    playwright_exit: i32,
    pip_delay: Option<Duration>,
}

impl FakePython {
    /// Fake interpreter living in `dir`; every step succeeds by default
    pub fn new(dir: &Path) -> Self {
        Self {
            dir: dir.to_path_buf(),
            pip_exit: 0,
            playwright_exit: 0,
            pip_delay: None,
        }
    }

    pub fn with_pip_exit(mut self, code: i32) -> Self {
        self.pip_exit = code;
        self
    }

    pub fn with_playwright_exit(mut self, code: i32) -> Self {
        self.playwright_exit = code;
        self
    }

    /// Make `pip install` hang for `delay` before answering
    pub fn with_pip_delay(mut self, delay: Duration) -> Self {
        self.pip_delay = Some(delay);
        self
    }

    pub fn path(&self) -> PathBuf {
        self.dir.join("python")
    }

    pub fn log_path(&self) -> PathBuf {
        self.dir.join("python.log")
    }

    /// Write the script and return its path
    pub fn install(&self) -> PathBuf {
        std::fs::create_dir_all(&self.dir).expect("failed to create tool directory");

        let sleep = self
            .pip_delay
            .map(|d| format!("sleep {}\n    ", d.as_secs_f64()))
            .unwrap_or_default();

        let script = format!(
            r#"#!/bin/sh
echo "$*" >> '{log}'
case "$2" in
  pip)
    {sleep}if [ {pip_exit} -ne 0 ]; then
      echo "ERROR: No matching distribution found" >&2
      exit {pip_exit}
    fi
    for arg in "$@"; do
      if [ "$arg" = "--user" ]; then
        bin="${{PYTHONUSERBASE:-$HOME/.local}}/bin"
        mkdir -p "$bin"
        echo '#!/bin/sh' > "$bin/uvicorn"
        echo 'exit 0' >> "$bin/uvicorn"
        chmod 755 "$bin/uvicorn"
      fi
    done
    exit 0
    ;;
  playwright)
    if [ {playwright_exit} -ne 0 ]; then
      echo "Failed to install browsers" >&2
      exit {playwright_exit}
    fi
    exit 0
    ;;
esac
echo "unexpected invocation: $*" >&2
exit 2
"#,
            log = self.log_path().display(),
            sleep = sleep,
            pip_exit = self.pip_exit,
            playwright_exit = self.playwright_exit,
        );

        let path = self.path();
        std::fs::write(&path, script).expect("failed to write fake interpreter");
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755))
            .expect("failed to make fake interpreter executable");
        path
    }

    /// Every recorded invocation, arguments joined by spaces
    pub fn invocations(&self) -> Vec<String> {
        std::fs::read_to_string(self.log_path())
            .map(|s| s.lines().map(str::to_string).collect())
            .unwrap_or_default()
    }

    pub fn pip_calls(&self) -> usize {
        self.invocations()
            .iter()
            .filter(|line| line.starts_with("-m pip "))
            .count()
    }

    pub fn playwright_calls(&self) -> usize {
        self.invocations()
            .iter()
            .filter(|line| line.starts_with("-m playwright "))
            .count()
    }
}
