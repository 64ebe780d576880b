pub mod config;
pub mod context;
pub mod env;
pub mod errors;
pub mod handoff;
pub mod pipeline;
pub mod process;
pub mod provision;
pub mod repo;

pub use config::Config;
pub use context::ExecutionContext;
pub use errors::{LaunchError, Stage};
pub use pipeline::Pipeline;
