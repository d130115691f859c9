// ABOUTME: Library module for rowdump
// ABOUTME: Exports the dump pipeline for use in the binary and tests

pub mod codec;
pub mod commands;
pub mod config;
pub mod dump;
pub mod error;
pub mod schema;
pub mod sink;
pub mod source;
pub mod sqlite;
pub mod table_rules;

pub use dump::{run_dump, DumpCoordinator, DumpSummary};
pub use error::{DumpError, Result};
