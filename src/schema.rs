// ABOUTME: Table and column descriptors for exportable tables
// ABOUTME: Resolves export names and builds statement text without further catalog access

use crate::error::Result;
use crate::source::{ColumnInfo, SourceDatabase};
use crate::table_rules::{TableRules, EXCLUDE_SENTINEL};

/// Closed set of type families the value codec distinguishes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColumnType {
    /// BINARY, VARBINARY, BLOB
    Binary,
    /// Character large objects
    Clob,
    /// CHAR, VARCHAR, long text
    Char,
    Time,
    Date,
    Timestamp,
    /// NUMERIC, DECIMAL
    Numeric,
    /// REAL, FLOAT
    Real,
    Double,
    /// INTEGER family, BOOLEAN, BIGINT and anything unrecognised
    Other,
}

impl ColumnType {
    /// Map a declared SQL type name to its type family.
    ///
    /// Matching is case-insensitive and ignores length/precision parameters.
    ///
    /// # Examples
    ///
    /// ```
    /// # use rowdump::schema::ColumnType;
    /// assert_eq!(ColumnType::from_declared("decimal(10,2)"), ColumnType::Numeric);
    /// assert_eq!(ColumnType::from_declared("VARCHAR(20)"), ColumnType::Char);
    /// assert_eq!(ColumnType::from_declared("BIGINT"), ColumnType::Other);
    /// ```
    pub fn from_declared(declared: &str) -> Self {
        let upper = declared.trim().to_uppercase();
        if upper.ends_with("FOR BIT DATA") {
            return ColumnType::Binary;
        }
        let base = match upper.find('(') {
            Some(idx) => upper[..idx].trim_end(),
            None => upper.as_str(),
        };

        match base {
            "BINARY" | "VARBINARY" | "BLOB" | "BINARY LARGE OBJECT" | "LONGBLOB"
            | "MEDIUMBLOB" | "TINYBLOB" | "BYTEA" => ColumnType::Binary,
            "CLOB" | "NCLOB" | "CHARACTER LARGE OBJECT" | "LONGTEXT" | "MEDIUMTEXT" => {
                ColumnType::Clob
            }
            "CHAR" | "CHARACTER" | "NCHAR" | "VARCHAR" | "NVARCHAR" | "CHARACTER VARYING"
            | "VARYING CHARACTER" | "NATIVE CHARACTER" | "LONG VARCHAR" | "LONGVARCHAR"
            | "LONGNVARCHAR" | "TEXT" | "TINYTEXT" | "STRING" => ColumnType::Char,
            "TIME" => ColumnType::Time,
            "DATE" => ColumnType::Date,
            "TIMESTAMP" | "DATETIME" => ColumnType::Timestamp,
            "NUMERIC" | "DECIMAL" | "DEC" => ColumnType::Numeric,
            "REAL" | "FLOAT" => ColumnType::Real,
            "DOUBLE" | "DOUBLE PRECISION" => ColumnType::Double,
            _ => affinity_family(base),
        }
    }
}

/// SQLite's column affinity rules for type names outside the known set
fn affinity_family(upper: &str) -> ColumnType {
    if upper.contains("INT") {
        ColumnType::Other
    } else if upper.contains("CHAR") || upper.contains("CLOB") || upper.contains("TEXT") {
        ColumnType::Char
    } else if upper.contains("BLOB") {
        ColumnType::Binary
    } else if upper.contains("DOUB") {
        ColumnType::Double
    } else if upper.contains("REAL") || upper.contains("FLOA") {
        ColumnType::Real
    } else {
        ColumnType::Other
    }
}

/// One column of an exportable table. Immutable after construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    name: String,
    column_type: ColumnType,
    scale: Option<u32>,
}

impl Column {
    pub fn new(name: impl Into<String>, column_type: ColumnType) -> Self {
        Self {
            name: name.into(),
            column_type,
            scale: None,
        }
    }

    /// Declared scale for exact numeric columns
    pub fn with_scale(mut self, scale: u32) -> Self {
        self.scale = Some(scale);
        self
    }

    /// Build a descriptor from catalog metadata
    pub fn from_info(info: &ColumnInfo) -> Self {
        let column_type = ColumnType::from_declared(&info.declared_type);
        let scale = match column_type {
            ColumnType::Numeric => declared_scale(&info.declared_type),
            _ => None,
        };
        Self {
            name: info.name.clone(),
            column_type,
            scale,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn column_type(&self) -> ColumnType {
        self.column_type
    }

    pub fn scale(&self) -> Option<u32> {
        self.scale
    }
}

/// Scale of `NUMERIC(p,s)`; `NUMERIC(p)` has scale 0, bare `NUMERIC` has none
fn declared_scale(declared: &str) -> Option<u32> {
    let open = declared.find('(')?;
    let close = declared[open..].find(')')? + open;
    let params = &declared[open + 1..close];
    match params.split_once(',') {
        Some((_, scale)) => scale.trim().parse().ok(),
        None => params.trim().parse::<u32>().ok().map(|_| 0),
    }
}

/// An exportable table with its resolved export name.
///
/// Built once per dump and read-only afterwards. Column order matches the
/// projection order of [`Table::select_query`].
#[derive(Debug, Clone)]
pub struct Table {
    source_name: String,
    resolved_name: String,
    columns: Vec<Column>,
}

impl Table {
    pub fn new(source_name: impl Into<String>, columns: Vec<Column>, rules: &TableRules) -> Self {
        let source_name = source_name.into();
        let resolved_name = rules.resolve_name(&source_name);
        Self {
            source_name,
            resolved_name,
            columns,
        }
    }

    pub fn source_name(&self) -> &str {
        &self.source_name
    }

    /// Export name after rename/exclude rules
    pub fn name(&self) -> &str {
        &self.resolved_name
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn is_skipped(&self) -> bool {
        self.resolved_name == EXCLUDE_SENTINEL
    }

    pub fn select_query(&self, schema: &str) -> String {
        format!(
            "SELECT * FROM {}.{}",
            quote_source_ident(schema),
            quote_source_ident(&self.source_name)
        )
    }

    pub fn count_query(&self, schema: &str) -> String {
        format!(
            "SELECT COUNT(*) FROM {}.{}",
            quote_source_ident(schema),
            quote_source_ident(&self.source_name)
        )
    }

    pub fn lock_statement(&self) -> String {
        format!("LOCK TABLES `{}` WRITE;", self.resolved_name.replace('`', "``"))
    }

    pub fn unlock_statement(&self) -> &'static str {
        "UNLOCK TABLES;"
    }

    pub fn truncate_statement(&self) -> String {
        format!("TRUNCATE TABLE {};", self.resolved_name)
    }

    /// First line of an INSERT statement; tuples follow on their own lines
    pub fn insert_prefix(&self) -> String {
        format!("INSERT INTO {} VALUES", self.resolved_name)
    }
}

fn quote_source_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Describe every table of `schema`, in discovery order
pub fn build_tables(
    source: &dyn SourceDatabase,
    schema: &str,
    rules: &TableRules,
) -> Result<Vec<Table>> {
    let names = source.list_tables(schema)?;
    tracing::info!("Discovered {} table(s) in schema '{}'", names.len(), schema);

    let mut tables = Vec::with_capacity(names.len());
    for name in names {
        let columns = source
            .list_columns(schema, &name)?
            .iter()
            .map(Column::from_info)
            .collect::<Vec<_>>();
        let table = Table::new(name, columns, rules);
        tracing::debug!(
            "Table '{}' resolves to '{}' with {} column(s)",
            table.source_name(),
            table.name(),
            table.columns().len()
        );
        tables.push(table);
    }

    Ok(tables)
}
