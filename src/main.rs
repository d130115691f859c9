// ABOUTME: CLI entry point for rowdump
// ABOUTME: Merges config file and flags, then runs the dump command

use anyhow::Result;
use clap::Parser;
use rowdump::commands;
use rowdump::config::{load_dump_config_from_file, DumpConfig};

#[derive(Parser, Debug)]
#[command(name = "rowdump")]
#[command(
    about = "Export a relational database as a MySQL-compatible INSERT dump",
    long_about = None
)]
struct Cli {
    /// Source SQLite database (.db, .sqlite, .sqlite3)
    #[arg(long)]
    source: Option<String>,
    /// TOML config file; flags override its values
    #[arg(long)]
    config: Option<String>,
    /// Dump destination, or "-" for stdout
    #[arg(short, long)]
    output: Option<String>,
    /// Schema to export
    #[arg(long)]
    schema: Option<String>,
    /// Emit TRUNCATE TABLE before each table's rows
    #[arg(long)]
    truncate: bool,
    /// Maximum tuples per INSERT statement
    #[arg(long)]
    max_rows_per_insert: Option<usize>,
    /// Bound on queued output lines (unbounded when omitted)
    #[arg(long)]
    queue_capacity: Option<usize>,
    /// Export a table under another name (format: source=target)
    #[arg(long = "rename", value_name = "SOURCE=TARGET")]
    renames: Vec<String>,
    /// Leave a table out of the dump
    #[arg(long = "exclude", value_name = "TABLE")]
    excludes: Vec<String>,
}

impl Cli {
    /// Apply flags on top of the config file (or defaults)
    fn into_config(self) -> Result<DumpConfig> {
        let mut config = match &self.config {
            Some(path) => load_dump_config_from_file(path)?,
            None => DumpConfig::default(),
        };

        if self.source.is_some() {
            config.source_path = self.source;
        }
        if self.output.is_some() {
            config.output_path = self.output;
        }
        if self.schema.is_some() {
            config.schema = self.schema;
        }
        if self.truncate {
            config.truncate_tables = Some(true);
        }
        if self.max_rows_per_insert.is_some() {
            config.max_rows_per_insert = self.max_rows_per_insert;
        }
        if self.queue_capacity.is_some() {
            config.queue_capacity = self.queue_capacity;
        }
        config.rules.apply_rename_cli(&self.renames)?;
        config.rules.apply_exclude_cli(&self.excludes)?;

        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr so a dump on stdout stays clean
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = Cli::parse().into_config()?;
    commands::dump(&config).await?;
    Ok(())
}
