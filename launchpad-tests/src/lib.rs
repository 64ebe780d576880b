//! Test utilities for the launchpad workspace
//!
//! This crate provides fixtures for exercising the pipeline against real
//! tools where that is cheap (git, against local repositories) and fake
//! ones where it is not (an interpreter stand-in for pip and playwright).

pub mod helpers;

pub use helpers::env_builder::TestEnvBuilder;
pub use helpers::fake_tools::FakePython;
pub use helpers::git_fixture::{GitRemote, commit_local, git_output};
