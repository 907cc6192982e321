//! transcc — stream Python-to-C++ translations from hosted models, then run
//! both programs and compare what they print.
//!
//! Model output is fence-stripped as it streams. Native builds run in a
//! per-session work directory with timeouts and cancellation.

pub mod backends;
pub mod cli;
pub mod core;
pub mod process;
