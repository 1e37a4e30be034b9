//! Shared primitives for quarry jobs.
//!
//! Provides the immutable per-job configuration map, typed config errors,
//! and the JSON/CSV record stores with key-based incremental merge.

pub mod config;
pub mod error;
pub mod store;
pub mod table;

pub use config::JobConfig;
pub use error::ConfigError;
pub use store::{LoadedStore, Record, StoreRecovery};
pub use table::{LoadedTable, Table};
