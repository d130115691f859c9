// ABOUTME: Source database access traits consumed by the dump pipeline
// ABOUTME: Catalog enumeration, forward-only row cursors, and typed cell reads

use crate::error::Result;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use rust_decimal::Decimal;
use std::io::Read;

/// Declared column metadata as reported by the source catalog
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnInfo {
    pub name: String,
    pub declared_type: String,
}

impl ColumnInfo {
    pub fn new(name: impl Into<String>, declared_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            declared_type: declared_type.into(),
        }
    }
}

/// Typed access to the current row of a cursor.
///
/// Reads address columns by name. Every `Option`-returning read yields `None`
/// for SQL NULL. The floating-point reads cannot signal absence through their
/// return value, so callers must consult [`RowAccess::was_null`] right after
/// calling them.
pub trait RowAccess {
    fn read_bytes(&mut self, column: &str) -> Result<Option<Vec<u8>>>;

    /// Open the character stream of a large text object
    fn open_text_stream(&mut self, column: &str) -> Result<Option<Box<dyn Read + '_>>>;

    fn read_string(&mut self, column: &str) -> Result<Option<String>>;

    fn read_time(&mut self, column: &str) -> Result<Option<NaiveTime>>;

    fn read_date(&mut self, column: &str) -> Result<Option<NaiveDate>>;

    fn read_timestamp(&mut self, column: &str) -> Result<Option<NaiveDateTime>>;

    fn read_decimal(&mut self, column: &str) -> Result<Option<Decimal>>;

    /// Returns `0.0` for NULL; check [`RowAccess::was_null`]
    fn read_f32(&mut self, column: &str) -> Result<f32>;

    /// Returns `0.0` for NULL; check [`RowAccess::was_null`]
    fn read_f64(&mut self, column: &str) -> Result<f64>;

    /// Whether the last read on this row returned SQL NULL
    fn was_null(&self) -> bool;

    /// Generic read rendered in the value's natural text form
    fn read_value(&mut self, column: &str) -> Result<Option<String>>;
}

/// A relational source that can be enumerated and streamed
pub trait SourceDatabase {
    /// Table names of `schema`, in a stable discovery order
    fn list_tables(&self, schema: &str) -> Result<Vec<String>>;

    /// Columns of a table in ordinal order, matching `SELECT *` projection
    fn list_columns(&self, schema: &str, table: &str) -> Result<Vec<ColumnInfo>>;

    fn count_rows(&self, query: &str) -> Result<u64>;

    /// Run `query` and hand each row to `visit`, in cursor order.
    ///
    /// The cursor is released before returning, whether the walk completed or
    /// `visit` failed. Returns the number of rows visited.
    fn for_each_row(
        &self,
        query: &str,
        visit: &mut dyn FnMut(&mut dyn RowAccess) -> Result<()>,
    ) -> Result<u64>;
}
