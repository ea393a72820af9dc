//! Configuration module
//!
//! Loads and validates site configuration: which sequences run as the
//! narrative and boot screens, where facts come from, and where the visit
//! ledger lives.

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{
    ConfigLimits, ConfigLoader, LoadResult, LoadWarning, LoadedSite, LoaderOptions,
    default_ledger_path, resolve_source,
};
pub use schema::*;
pub use validation::{ValidationResult, Validator};
