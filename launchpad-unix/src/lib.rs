//! Unix primitives used at the very end of a launchpad run.
//!
//! Everything here is a thin wrapper over `libc`/`nix` so the core crate
//! can stay free of `unsafe`.

#[cfg(unix)]
pub mod process;
