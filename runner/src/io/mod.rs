//! Side-effecting operations: filesystem, git, child processes, cache store.

pub mod cache;
pub mod config;
pub mod git;
pub mod process;
pub mod secrets;
pub mod state;
