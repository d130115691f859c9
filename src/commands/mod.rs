// ABOUTME: Command implementations invoked by the CLI
// ABOUTME: Exports the dump command

pub mod dump;

pub use dump::{dump, STDOUT_DESTINATION};
