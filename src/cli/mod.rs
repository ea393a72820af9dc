//! Command-line interface
//!
//! Argument parsing and command handlers for the `stagehand` binary.

pub mod args;
pub mod commands;
