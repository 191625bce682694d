//! Thermo core crate.
//!
//! Configuration for the thermostat page server lives in a single JSON tree
//! whose nodes may branch on runtime criteria (for example the active
//! environment):
//!
//! - `criteria`: the process-wide criteria snapshot, computed once.
//! - `store`: the immutable tree and its resolver (`$filter`, `$default`,
//!   `$range`, `$base`, `$meta`).
//! - `config`: the cheap-to-clone handle consumers read through.
//!
//! Resolution is a pure function of (tree, path, criteria), so any number of
//! readers may resolve concurrently without synchronisation.

pub mod config;
pub mod criteria;
pub mod error;
pub mod store;

pub use config::Config;
pub use criteria::{
    Criteria, CriteriaResolver, DEFAULT_ENVIRONMENT, ENVIRONMENT, ENVIRONMENT_VAR,
    process_criteria,
};
pub use error::{ConfigError, ResolutionError};
pub use store::ConfigStore;
