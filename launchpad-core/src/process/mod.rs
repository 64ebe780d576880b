//! External tool execution
//!
//! This module provides:
//! - `CommandSpec` - what to run, where, with which environment
//! - `run_to_completion` - run a tool, stream its output to tracing, and
//!   report failures with the tail of its stderr

mod command;
mod spawn;

pub use command::CommandSpec;
pub use spawn::{CommandOutput, run_to_completion};
