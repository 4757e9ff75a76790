//! Update-if-changed runner for a generated README banner.
//!
//! The runner executes a fixed six-step sequence per trigger (checkout,
//! runtime provisioning, cache restore, dependency install, banner
//! generation, conditional commit/push) and commits the result only when the
//! working tree actually changed. The architecture enforces a strict
//! separation:
//!
//! - **[`core`]**: Pure, deterministic logic (trigger schedule arithmetic,
//!   clean/dirty gate decision). No I/O, fully testable in isolation.
//! - **[`io`]**: Side-effecting operations (filesystem, git, process
//!   execution, cache store). Isolated to enable scripted doubles in tests.
//!
//! Orchestration modules ([`steps`], [`watch`]) coordinate core logic with
//! I/O to implement the CLI commands.

pub mod core;
pub mod exit_codes;
pub mod io;
pub mod logging;
pub mod steps;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
pub mod watch;
