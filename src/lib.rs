//! `stagehand` - staged intro and boot sequencer
//!
//! Plays a first-visit narrative, then a boot animation, then hands off to
//! main content. Sequences are timed, skippable and driven by YAML
//! configuration or built-in themes.

pub mod cli;
pub mod config;
pub mod controller;
pub mod error;
pub mod facts;
pub mod ledger;
pub mod observability;
pub mod sequence;
pub mod themes;
