//! Core pipeline logic — types, config, translation, execution, verification.

pub mod digest;
pub mod error;
pub mod fence;
pub mod orchestrator;
pub mod parser;
pub mod prompt;
pub mod sandbox;
pub mod toolchain;
pub mod types;
pub mod verify;
