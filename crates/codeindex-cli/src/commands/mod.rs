//! CLI command handlers

pub mod cleanup;
pub mod refresh;
pub mod status;
