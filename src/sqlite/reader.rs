// ABOUTME: SQLite catalog introspection and forward-only row cursors
// ABOUTME: Implements the source traits with typed reads over SQLite storage classes

use crate::error::{DumpError, Result};
use crate::source::{ColumnInfo, RowAccess, SourceDatabase};
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};
use rust_decimal::Decimal;
use rusqlite::types::ValueRef;
use rusqlite::{Connection, Row};
use std::io::{Cursor, Read};
use std::str::FromStr;

const TIMESTAMP_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
];

const TIME_FORMATS: &[&str] = &["%H:%M:%S%.f", "%H:%M"];

/// Read-only SQLite source
pub struct SqliteSource {
    conn: Connection,
}

impl SqliteSource {
    pub fn new(conn: Connection) -> Self {
        Self { conn }
    }

    /// Validate the path and open the database read-only
    pub fn open(path: &str) -> anyhow::Result<Self> {
        Ok(Self::new(super::open_sqlite(path)?))
    }
}

impl SourceDatabase for SqliteSource {
    /// Lists user tables in name order, excluding `sqlite_*` internals
    fn list_tables(&self, schema: &str) -> Result<Vec<String>> {
        tracing::debug!("Listing tables from SQLite schema '{}'", schema);

        let query = format!(
            "SELECT name FROM {}.sqlite_master \
             WHERE type='table' \
             AND name NOT LIKE 'sqlite_%' \
             ORDER BY name",
            quote_ident(schema)
        );

        let mut stmt = self
            .conn
            .prepare(&query)
            .map_err(|e| DumpError::source("preparing table listing", e))?;

        let tables = stmt
            .query_map([], |row| row.get::<_, String>(0))
            .map_err(|e| DumpError::source("listing tables", e))?
            .collect::<std::result::Result<Vec<String>, _>>()
            .map_err(|e| DumpError::source("collecting table names", e))?;

        Ok(tables)
    }

    fn list_columns(&self, schema: &str, table: &str) -> Result<Vec<ColumnInfo>> {
        let query = format!(
            "PRAGMA {}.table_info({})",
            quote_ident(schema),
            quote_ident(table)
        );
        let context = format!("reading columns of table '{}'", table);

        let mut stmt = self
            .conn
            .prepare(&query)
            .map_err(|e| DumpError::source(context.as_str(), e))?;

        let columns = stmt
            .query_map([], |row| {
                let name: String = row.get(1)?;
                let declared: String = row.get(2)?;
                Ok(ColumnInfo::new(name, affinity_type(declared)))
            })
            .map_err(|e| DumpError::source(context.as_str(), e))?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| DumpError::source(context.as_str(), e))?;

        Ok(columns)
    }

    fn count_rows(&self, query: &str) -> Result<u64> {
        let count: i64 = self
            .conn
            .query_row(query, [], |row| row.get(0))
            .map_err(|e| DumpError::source(format!("running '{}'", query), e))?;
        Ok(count.max(0) as u64)
    }

    fn for_each_row(
        &self,
        query: &str,
        visit: &mut dyn FnMut(&mut dyn RowAccess) -> Result<()>,
    ) -> Result<u64> {
        let mut stmt = self
            .conn
            .prepare(query)
            .map_err(|e| DumpError::source(format!("preparing '{}'", query), e))?;
        let mut rows = stmt
            .query([])
            .map_err(|e| DumpError::source(format!("opening cursor for '{}'", query), e))?;

        let mut visited = 0u64;
        while let Some(row) = rows
            .next()
            .map_err(|e| DumpError::source(format!("advancing cursor for '{}'", query), e))?
        {
            let mut access = SqliteRow::new(row);
            visit(&mut access)?;
            visited += 1;
        }

        Ok(visited)
    }
}

/// Columns without a declared type have BLOB affinity in SQLite
fn affinity_type(declared: String) -> String {
    if declared.trim().is_empty() {
        "BLOB".to_string()
    } else {
        declared
    }
}

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Current row of a SQLite cursor with JDBC-style null tracking
struct SqliteRow<'a, 'stmt> {
    row: &'a Row<'stmt>,
    last_null: bool,
}

impl<'a, 'stmt> SqliteRow<'a, 'stmt> {
    fn new(row: &'a Row<'stmt>) -> Self {
        Self {
            row,
            last_null: false,
        }
    }

    fn value(&mut self, column: &str) -> Result<ValueRef<'a>> {
        let value = self
            .row
            .get_ref(column)
            .map_err(|e| DumpError::source(format!("reading column '{}'", column), e))?;
        self.last_null = matches!(value, ValueRef::Null);
        Ok(value)
    }

    fn text(&mut self, column: &str) -> Result<Option<String>> {
        match self.value(column)? {
            ValueRef::Null => Ok(None),
            ValueRef::Integer(i) => Ok(Some(i.to_string())),
            ValueRef::Real(f) => Ok(Some(f.to_string())),
            ValueRef::Text(bytes) | ValueRef::Blob(bytes) => String::from_utf8(bytes.to_vec())
                .map(Some)
                .map_err(|e| DumpError::encoding(column, format!("invalid UTF-8 text: {}", e))),
        }
    }

    fn float(&mut self, column: &str) -> Result<f64> {
        match self.value(column)? {
            ValueRef::Null => Ok(0.0),
            ValueRef::Integer(i) => Ok(i as f64),
            ValueRef::Real(f) => Ok(f),
            ValueRef::Text(bytes) => std::str::from_utf8(bytes)
                .ok()
                .and_then(|s| s.trim().parse::<f64>().ok())
                .ok_or_else(|| DumpError::encoding(column, "text is not a floating-point number")),
            ValueRef::Blob(_) => Err(DumpError::encoding(
                column,
                "binary value in floating-point column",
            )),
        }
    }

    fn epoch(&mut self, column: &str) -> Result<Option<NaiveDateTime>> {
        let (secs, nanos) = match self.value(column)? {
            ValueRef::Null => return Ok(None),
            ValueRef::Integer(i) => (i, 0),
            ValueRef::Real(f) => (f.floor() as i64, ((f - f.floor()) * 1e9).round() as u32),
            ValueRef::Text(bytes) | ValueRef::Blob(bytes) => {
                let text = std::str::from_utf8(bytes)
                    .map_err(|e| DumpError::encoding(column, format!("invalid UTF-8 text: {}", e)))?;
                return parse_timestamp(text)
                    .map(Some)
                    .ok_or_else(|| {
                        DumpError::encoding(column, format!("unrecognised timestamp '{}'", text))
                    });
            }
        };
        DateTime::from_timestamp(secs, nanos.min(999_999_999))
            .map(|dt| Some(dt.naive_utc()))
            .ok_or_else(|| DumpError::encoding(column, format!("epoch {} out of range", secs)))
    }
}

fn parse_timestamp(text: &str) -> Option<NaiveDateTime> {
    let trimmed = text.trim();
    TIMESTAMP_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(trimmed, fmt).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

fn parse_time(text: &str) -> Option<NaiveTime> {
    let trimmed = text.trim();
    TIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveTime::parse_from_str(trimmed, fmt).ok())
        .or_else(|| parse_timestamp(trimmed).map(|ts| ts.time()))
}

impl<'a, 'stmt> RowAccess for SqliteRow<'a, 'stmt> {
    fn read_bytes(&mut self, column: &str) -> Result<Option<Vec<u8>>> {
        match self.value(column)? {
            ValueRef::Null => Ok(None),
            ValueRef::Blob(bytes) | ValueRef::Text(bytes) => Ok(Some(bytes.to_vec())),
            ValueRef::Integer(i) => Ok(Some(i.to_string().into_bytes())),
            ValueRef::Real(f) => Ok(Some(f.to_string().into_bytes())),
        }
    }

    fn open_text_stream(&mut self, column: &str) -> Result<Option<Box<dyn Read + '_>>> {
        match self.value(column)? {
            ValueRef::Null => Ok(None),
            ValueRef::Text(bytes) | ValueRef::Blob(bytes) => Ok(Some(Box::new(Cursor::new(bytes)))),
            ValueRef::Integer(i) => Ok(Some(Box::new(Cursor::new(i.to_string().into_bytes())))),
            ValueRef::Real(f) => Ok(Some(Box::new(Cursor::new(f.to_string().into_bytes())))),
        }
    }

    fn read_string(&mut self, column: &str) -> Result<Option<String>> {
        self.text(column)
    }

    fn read_time(&mut self, column: &str) -> Result<Option<NaiveTime>> {
        match self.value(column)? {
            ValueRef::Text(bytes) => {
                let text = String::from_utf8_lossy(bytes);
                parse_time(&text).map(Some).ok_or_else(|| {
                    DumpError::encoding(column, format!("unrecognised time '{}'", text))
                })
            }
            _ => Ok(self.epoch(column)?.map(|ts| ts.time())),
        }
    }

    fn read_date(&mut self, column: &str) -> Result<Option<NaiveDate>> {
        Ok(self.epoch(column)?.map(|ts| ts.date()))
    }

    fn read_timestamp(&mut self, column: &str) -> Result<Option<NaiveDateTime>> {
        self.epoch(column)
    }

    fn read_decimal(&mut self, column: &str) -> Result<Option<Decimal>> {
        match self.value(column)? {
            ValueRef::Null => Ok(None),
            ValueRef::Integer(i) => Ok(Some(Decimal::from(i))),
            ValueRef::Real(f) => Decimal::from_str(&f.to_string())
                .map(Some)
                .map_err(|e| DumpError::encoding(column, format!("{} is not a decimal: {}", f, e))),
            ValueRef::Text(bytes) => {
                let text = String::from_utf8_lossy(bytes);
                let trimmed = text.trim();
                Decimal::from_str(trimmed)
                    .or_else(|_| Decimal::from_scientific(trimmed))
                    .map(Some)
                    .map_err(|e| {
                        DumpError::encoding(column, format!("'{}' is not a decimal: {}", trimmed, e))
                    })
            }
            ValueRef::Blob(_) => Err(DumpError::encoding(column, "binary value in decimal column")),
        }
    }

    fn read_f32(&mut self, column: &str) -> Result<f32> {
        Ok(self.float(column)? as f32)
    }

    fn read_f64(&mut self, column: &str) -> Result<f64> {
        self.float(column)
    }

    fn was_null(&self) -> bool {
        self.last_null
    }

    fn read_value(&mut self, column: &str) -> Result<Option<String>> {
        match self.value(column)? {
            ValueRef::Null => Ok(None),
            ValueRef::Integer(i) => Ok(Some(i.to_string())),
            ValueRef::Real(f) => Ok(Some(format!("{:?}", f))),
            ValueRef::Text(bytes) => Ok(Some(String::from_utf8_lossy(bytes).into_owned())),
            ValueRef::Blob(_) => Err(DumpError::encoding(
                column,
                "binary value in a column without a binary type",
            )),
        }
    }
}
