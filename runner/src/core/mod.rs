//! Pure, deterministic logic with no I/O.

pub mod gate;
pub mod trigger;
