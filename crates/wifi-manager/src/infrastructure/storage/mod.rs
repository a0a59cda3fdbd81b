//! Storage infrastructure: configuration and the in-memory code store.
//!
//! - `config` reads the TOML configuration file, falling back to defaults on
//!   first run.
//! - `memory` is the process-lifetime [`CodeStore`](crate::application::ports::CodeStore)
//!   used when no database is attached.

pub mod config;
pub mod memory;
