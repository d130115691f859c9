// ABOUTME: Converts single cells into MySQL-safe literal tokens for VALUES tuples
// ABOUTME: Handles NULLs, hex binary, escaped strings, temporal text, scaled decimals, and floats

use crate::error::{DumpError, Result};
use crate::schema::{Column, ColumnType};
use crate::source::RowAccess;
use chrono::{NaiveDateTime, Timelike};
use rust_decimal::{Decimal, RoundingStrategy};
use std::io::Read;

pub const NULL_LITERAL: &str = "NULL";

/// Encode the cell of `column` in the current row as a literal token.
///
/// NULL always renders as the bare `NULL` keyword, whatever the column type.
/// Strings and temporal values are single-quoted and escaped, binary data is
/// written as an unquoted `0x` hex literal, and numbers are unquoted.
///
/// # Errors
///
/// Returns `DumpError::Encoding` when a value cannot be read or rendered, for
/// example when a large object stream fails mid-read. Such failures are never
/// replaced by `NULL`.
pub fn encode_cell(column: &Column, row: &mut dyn RowAccess) -> Result<String> {
    let name = column.name();

    let token = match column.column_type() {
        ColumnType::Binary => match row.read_bytes(name)? {
            Some(bytes) => encode_binary(&bytes),
            None => NULL_LITERAL.to_string(),
        },

        ColumnType::Clob => match read_clob(row, name)? {
            Some(text) => quote_string(&text),
            None => NULL_LITERAL.to_string(),
        },

        ColumnType::Char => match row.read_string(name)? {
            Some(text) => quote_string(&text),
            None => NULL_LITERAL.to_string(),
        },

        ColumnType::Time => match row.read_time(name)? {
            Some(time) => quote_string(&time.format("%H:%M:%S").to_string()),
            None => NULL_LITERAL.to_string(),
        },

        ColumnType::Date => match row.read_date(name)? {
            Some(date) => quote_string(&date.format("%Y-%m-%d").to_string()),
            None => NULL_LITERAL.to_string(),
        },

        ColumnType::Timestamp => match row.read_timestamp(name)? {
            Some(ts) => quote_string(&format_timestamp(&ts)),
            None => NULL_LITERAL.to_string(),
        },

        ColumnType::Numeric => match row.read_decimal(name)? {
            Some(value) => format_decimal(value, column.scale()),
            None => NULL_LITERAL.to_string(),
        },

        ColumnType::Real => {
            let value = row.read_f32(name)?;
            if row.was_null() {
                NULL_LITERAL.to_string()
            } else {
                format!("{:?}", value)
            }
        }

        ColumnType::Double => {
            let value = row.read_f64(name)?;
            if row.was_null() {
                NULL_LITERAL.to_string()
            } else {
                format!("{:?}", value)
            }
        }

        ColumnType::Other => match row.read_value(name)? {
            Some(text) if is_numeric_literal(&text) => text,
            Some(text) => quote_string(&text),
            None => NULL_LITERAL.to_string(),
        },
    };

    Ok(token)
}

/// Encode every column of the current row as a parenthesised tuple
pub fn encode_row(columns: &[Column], row: &mut dyn RowAccess) -> Result<String> {
    let mut tuple = String::from("(");
    for (idx, column) in columns.iter().enumerate() {
        if idx > 0 {
            tuple.push(',');
        }
        tuple.push_str(&encode_cell(column, row)?);
    }
    tuple.push(')');
    Ok(tuple)
}

/// Hex literal for binary data; empty payloads are treated as NULL
///
/// # Examples
///
/// ```
/// # use rowdump::codec::encode_binary;
/// assert_eq!(encode_binary(b"a"), "0x61");
/// assert_eq!(encode_binary(b"\n"), "0x0A");
/// assert_eq!(encode_binary(b""), "NULL");
/// ```
pub fn encode_binary(bytes: &[u8]) -> String {
    if bytes.is_empty() {
        return NULL_LITERAL.to_string();
    }
    format!("0x{}", hex::encode_upper(bytes))
}

fn read_clob(row: &mut dyn RowAccess, column: &str) -> Result<Option<String>> {
    let Some(mut stream) = row.open_text_stream(column)? else {
        return Ok(None);
    };
    let mut text = String::new();
    stream
        .read_to_string(&mut text)
        .map_err(|e| DumpError::encoding(column, format!("could not read character stream: {}", e)))?;
    Ok(Some(text))
}

/// True for text that MySQL reads back as a bare number.
///
/// Columns of unrecognised type can hold arbitrary text in SQLite; anything
/// else is quoted so a stored value can never end its tuple early.
fn is_numeric_literal(text: &str) -> bool {
    !text.is_empty()
        && text
            .bytes()
            .all(|b| b.is_ascii_digit() || matches!(b, b'+' | b'-' | b'.' | b'e' | b'E'))
        && text.parse::<f64>().is_ok()
}

/// Wrap an escaped payload in single quotes
pub fn quote_string(raw: &str) -> String {
    format!("'{}'", escape_string(raw))
}

/// Escape MySQL string-literal special characters.
///
/// The backslash is doubled first so later rules never see backslashes they
/// introduced themselves.
///
/// # Examples
///
/// ```
/// # use rowdump::codec::escape_string;
/// assert_eq!(escape_string("'Single quotes'"), "\\'Single quotes\\'");
/// assert_eq!(escape_string("Tab\t"), "Tab\\t");
/// assert_eq!(escape_string("back\\slash"), "back\\\\slash");
/// ```
pub fn escape_string(raw: &str) -> String {
    raw.replace('\\', "\\\\")
        .replace('\u{0}', "\\0")
        .replace('\t', "\\t")
        .replace('\u{8}', "\\b")
        .replace('\n', "\\n")
        .replace('\r', "\\r")
        .replace('\u{1a}', "\\Z")
        .replace('\'', "\\'")
}

/// `YYYY-MM-DD HH:MM:SS.f` with the fraction trimmed to at least one digit
fn format_timestamp(ts: &NaiveDateTime) -> String {
    let nanos = ts.nanosecond() % 1_000_000_000;
    let digits = format!("{:09}", nanos);
    let fraction = digits.trim_end_matches('0');
    let fraction = if fraction.is_empty() { "0" } else { fraction };
    format!("{}.{}", ts.format("%Y-%m-%d %H:%M:%S"), fraction)
}

/// Render at the declared scale, keeping trailing zeros
fn format_decimal(value: Decimal, scale: Option<u32>) -> String {
    match scale {
        Some(scale) => {
            let scale = scale.min(28);
            let mut scaled = value.round_dp_with_strategy(scale, RoundingStrategy::MidpointAwayFromZero);
            scaled.rescale(scale);
            scaled.to_string()
        }
        None => value.to_string(),
    }
}
