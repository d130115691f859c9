// ABOUTME: Drives a full dump: schema discovery, per-table statements, batched inserts
// ABOUTME: Streams every line through the sink in strict order and reports a summary

use crate::codec::encode_row;
use crate::config::ExportPolicy;
use crate::error::{DumpError, Result};
use crate::schema::{build_tables, Table};
use crate::sink::{AsyncSink, LineSender, SinkOutcome};
use crate::source::SourceDatabase;
use tokio::io::AsyncWrite;

pub const FOREIGN_KEY_CHECKS_OFF: &str = "SET FOREIGN_KEY_CHECKS = 0;";
pub const FOREIGN_KEY_CHECKS_ON: &str = "SET FOREIGN_KEY_CHECKS = 1;";

/// Counters for a completed dump
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DumpSummary {
    pub tables_exported: usize,
    pub tables_skipped: usize,
    pub rows_written: u64,
    /// INSERT statements emitted across all tables
    pub statements_written: u64,
}

/// Exports one schema of a source database, one table at a time.
///
/// The coordinator is synchronous. It blocks on the row cursor and, with a
/// bounded sink, on queue space, so async callers run it on a blocking thread
/// (see [`run_dump`]).
pub struct DumpCoordinator<'a> {
    source: &'a dyn SourceDatabase,
    policy: &'a ExportPolicy,
}

impl<'a> DumpCoordinator<'a> {
    pub fn new(source: &'a dyn SourceDatabase, policy: &'a ExportPolicy) -> Self {
        Self { source, policy }
    }

    /// Emit the complete dump into `out`.
    ///
    /// Any failure aborts the whole dump. Lines already queued stay queued;
    /// closing the sink is the caller's job.
    pub fn run(&self, out: &LineSender) -> Result<DumpSummary> {
        let tables = build_tables(self.source, &self.policy.schema, &self.policy.rules)?;
        let mut summary = DumpSummary::default();

        out.send_line(FOREIGN_KEY_CHECKS_OFF)?;

        for table in &tables {
            if table.is_skipped() {
                tracing::info!("Skipping excluded table '{}'", table.source_name());
                summary.tables_skipped += 1;
                continue;
            }

            let exported = self
                .export_table(table, out)
                .map_err(|e| match e {
                    DumpError::SinkClosed => DumpError::SinkClosed,
                    other => other.in_table(table.name()),
                })?;
            summary.tables_exported += 1;
            summary.rows_written += exported.rows;
            summary.statements_written += exported.statements;
        }

        out.send_line(FOREIGN_KEY_CHECKS_ON)?;

        tracing::info!(
            "✓ Dumped {} table(s), {} row(s) in {} INSERT statement(s); {} table(s) skipped",
            summary.tables_exported,
            summary.rows_written,
            summary.statements_written,
            summary.tables_skipped
        );
        Ok(summary)
    }

    fn export_table(&self, table: &Table, out: &LineSender) -> Result<TableExport> {
        let schema = &self.policy.schema;
        let expected = self.source.count_rows(&table.count_query(schema))?;
        tracing::info!(
            "Exporting '{}' as '{}' ({} row(s))",
            table.source_name(),
            table.name(),
            expected
        );

        out.send_line(table.lock_statement())?;
        if self.policy.truncate {
            out.send_line(table.truncate_statement())?;
        }

        let mut batcher =
            InsertBatcher::new(table.insert_prefix(), self.policy.max_rows_per_insert.get());
        let rows = self
            .source
            .for_each_row(&table.select_query(schema), &mut |row| {
                let tuple = encode_row(table.columns(), row)?;
                batcher.push(tuple, &mut |line| out.send_line(line))
            })?;
        batcher.finish(&mut |line| out.send_line(line))?;

        out.send_line(table.unlock_statement())?;

        if rows != expected {
            tracing::warn!(
                "Table '{}' changed during export: counted {} row(s), streamed {}",
                table.source_name(),
                expected,
                rows
            );
        }
        tracing::debug!(
            "Finished '{}': {} row(s), {} statement(s)",
            table.name(),
            rows,
            batcher.statements
        );

        Ok(TableExport {
            rows,
            statements: batcher.statements,
        })
    }
}

struct TableExport {
    rows: u64,
    statements: u64,
}

/// Splits a table's tuples into INSERT statements of at most `max_rows` tuples.
///
/// A tuple is held back until the next one arrives, since only then is it
/// known whether it closes its statement (`;`) or continues it (`,`).
struct InsertBatcher {
    prefix: String,
    max_rows: usize,
    in_statement: usize,
    pending: Option<String>,
    statements: u64,
}

impl InsertBatcher {
    fn new(prefix: String, max_rows: usize) -> Self {
        Self {
            prefix,
            max_rows,
            in_statement: 0,
            pending: None,
            statements: 0,
        }
    }

    fn push(&mut self, tuple: String, emit: &mut dyn FnMut(String) -> Result<()>) -> Result<()> {
        if let Some(previous) = self.pending.take() {
            emit(previous + ",")?;
        }
        if self.in_statement == 0 {
            emit(self.prefix.clone())?;
            self.statements += 1;
        }

        self.in_statement += 1;
        if self.in_statement == self.max_rows {
            self.in_statement = 0;
            emit(tuple + ";")
        } else {
            self.pending = Some(tuple);
            Ok(())
        }
    }

    fn finish(&mut self, emit: &mut dyn FnMut(String) -> Result<()>) -> Result<()> {
        self.in_statement = 0;
        match self.pending.take() {
            Some(last) => emit(last + ";"),
            None => Ok(()),
        }
    }
}

/// Run a complete dump of `source` into `sink` and close it.
///
/// The coordinator runs on a blocking thread while the sink task writes. The
/// sink is closed on every path, so a failed dump still releases the
/// destination. When both sides fail, the sink's own error wins over the
/// `SinkClosed` it caused on the producer side.
///
/// # Examples
///
/// ```no_run
/// # use rowdump::{config::ExportPolicy, dump::run_dump, sink::{AsyncSink, SinkOptions}, sqlite::SqliteSource};
/// # async fn example() -> anyhow::Result<()> {
/// let source = SqliteSource::open("app.db")?;
/// let sink = AsyncSink::create("dump.sql", SinkOptions::default()).await?;
/// let (summary, _outcome) = run_dump(source, ExportPolicy::default(), sink).await?;
/// println!("{} rows", summary.rows_written);
/// # Ok(())
/// # }
/// ```
pub async fn run_dump<S, W>(
    source: S,
    policy: ExportPolicy,
    sink: AsyncSink<W>,
) -> Result<(DumpSummary, SinkOutcome<W>)>
where
    S: SourceDatabase + Send + 'static,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let sender = sink.handle();
    let producer = tokio::task::spawn_blocking(move || {
        let coordinator = DumpCoordinator::new(&source, &policy);
        coordinator.run(&sender)
    });

    let produced = producer
        .await
        .unwrap_or_else(|e| Err(DumpError::source("running the export", e)));
    let closed = sink.close().await;

    match (produced, closed) {
        (Ok(summary), Ok(outcome)) => Ok((summary, outcome)),
        (Err(DumpError::SinkClosed), Err(sink_error)) => Err(sink_error),
        (Err(e), _) => Err(e),
        (Ok(_), Err(e)) => Err(e),
    }
}
