//! Command specification for external tools

use std::collections::HashMap;
use std::path::PathBuf;

use crate::context::ExecutionContext;

/// Everything needed to run one external tool to completion
#[derive(Debug, Clone)]
pub struct CommandSpec {
    /// Program and arguments (e.g. `["git", "clone", url, dir]`)
    pub program_and_args: Vec<String>,
    pub working_dir: PathBuf,
    pub environment: HashMap<String, String>,
    /// Start from an empty environment instead of inheriting the
    /// bootstrapper's own. The context already carries what the tool needs.
    pub clear_env: bool,
}

impl CommandSpec {
    pub fn new(
        program_and_args: Vec<String>,
        working_dir: PathBuf,
        environment: HashMap<String, String>,
    ) -> Self {
        Self {
            program_and_args,
            working_dir,
            environment,
            clear_env: true,
        }
    }

    /// Command rooted at the context's working directory with its environment
    pub fn in_context<I, S>(args: I, ctx: &ExecutionContext) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(
            args.into_iter().map(Into::into).collect(),
            ctx.working_dir().to_path_buf(),
            ctx.environment(),
        )
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.environment.insert(key.into(), value.into());
        self
    }

    pub fn program(&self) -> Option<&str> {
        self.program_and_args.first().map(String::as_str)
    }
}
