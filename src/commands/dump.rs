// ABOUTME: Dump command: resolves configuration into a source, policy, and sink
// ABOUTME: Runs the export and reports what was written

use crate::config::DumpConfig;
use crate::dump::{run_dump, DumpSummary};
use crate::error::DumpError;
use crate::sink::{AsyncSink, SinkOptions};
use crate::sqlite::SqliteSource;
use anyhow::{Context, Result};

/// Output path that selects standard output
pub const STDOUT_DESTINATION: &str = "-";

/// Dump the configured SQLite database to the configured destination.
///
/// Validation happens before anything is written: an invalid policy, a
/// missing source, or an unopenable source leaves the destination untouched.
///
/// # Arguments
///
/// * `config` - Merged file and command-line configuration
///
/// # Returns
///
/// Counters for the completed dump
pub async fn dump(config: &DumpConfig) -> Result<DumpSummary> {
    let policy = config.to_policy()?;
    let options = SinkOptions {
        capacity: config.queue_capacity()?,
    };
    let source_path = config
        .source_path
        .as_deref()
        .ok_or_else(|| DumpError::config("no source database given (use --source or [source] path)"))?;

    let source = SqliteSource::open(source_path)
        .with_context(|| format!("Failed to open source database '{}'", source_path))?;

    tracing::info!(
        "Dumping schema '{}' with up to {} row(s) per INSERT{}",
        policy.schema,
        policy.max_rows_per_insert,
        if policy.truncate { ", truncating tables" } else { "" }
    );

    let summary = match config.output_path.as_deref() {
        None | Some(STDOUT_DESTINATION) => {
            let sink = AsyncSink::from_writer(tokio::io::stdout(), options);
            let (summary, _stdout) = run_dump(source, policy, sink).await?;
            summary
        }
        Some(path) => {
            let sink = AsyncSink::create(path, options).await?;
            let (summary, _file) = run_dump(source, policy, sink)
                .await
                .with_context(|| format!("Dump to '{}' failed", path))?;
            summary
        }
    };

    Ok(summary)
}
