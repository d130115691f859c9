// ABOUTME: Error taxonomy for the dump pipeline
// ABOUTME: Separates configuration, source access, cell encoding, and sink failures

use thiserror::Error;

/// Main error type for dump operations.
///
/// Every variant is fatal: the pipeline never retries and never reports a
/// partial success.
#[derive(Error, Debug)]
pub enum DumpError {
    /// Invalid policy or destination, detected before the dump starts
    #[error("Configuration error: {0}")]
    Config(String),

    /// Catalog, cursor, or connection failure on the source database
    #[error("Source database error while {context}: {message}")]
    Source { context: String, message: String },

    /// A single cell could not be rendered as a literal
    #[error("Failed to encode column '{column}': {message}")]
    Encoding { column: String, message: String },

    /// Export of one table was aborted
    #[error("Export of table '{table}' failed: {source}")]
    Table {
        table: String,
        #[source]
        source: Box<DumpError>,
    },

    /// Destination write, flush, or close failure
    #[error("Sink error: {0}")]
    Sink(#[from] std::io::Error),

    /// The sink consumer is gone and can no longer accept lines
    #[error("Sink is closed; the consumer task has already terminated")]
    SinkClosed,
}

impl DumpError {
    pub fn config(message: impl Into<String>) -> Self {
        DumpError::Config(message.into())
    }

    pub fn source(context: impl Into<String>, err: impl std::fmt::Display) -> Self {
        DumpError::Source {
            context: context.into(),
            message: err.to_string(),
        }
    }

    pub fn encoding(column: impl Into<String>, message: impl Into<String>) -> Self {
        DumpError::Encoding {
            column: column.into(),
            message: message.into(),
        }
    }

    /// Attach the table being exported to a failure
    pub fn in_table(self, table: impl Into<String>) -> Self {
        DumpError::Table {
            table: table.into(),
            source: Box::new(self),
        }
    }
}

/// Result type alias for dump operations.
pub type Result<T> = std::result::Result<T, DumpError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_error_names_table_and_cause() {
        let err = DumpError::encoding("PAYLOAD", "stream closed").in_table("ORDERS");
        let message = err.to_string();
        assert!(message.contains("ORDERS"));
        assert!(message.contains("PAYLOAD"));
        assert!(message.contains("stream closed"));
    }

    #[test]
    fn io_errors_become_sink_errors() {
        let io = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "pipe closed");
        let err: DumpError = io.into();
        assert!(matches!(err, DumpError::Sink(_)));
    }
}
