//! Stable exit codes for banner-runner CLI commands.

/// Run succeeded, including the "nothing to commit" path.
pub const OK: i32 = 0;
/// Invalid config/arguments, a git failure, or any error without a child
/// exit code. Steps that fail with a child exit code propagate that code
/// instead.
pub const INVALID: i32 = 1;
