// ABOUTME: Parses dump configuration files and builds the export policy
// ABOUTME: Converts TOML format into validated DumpConfig and ExportPolicy values

use crate::error::DumpError;
use crate::table_rules::TableRules;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::num::NonZeroUsize;

pub const DEFAULT_SCHEMA: &str = "main";
pub const DEFAULT_MAX_ROWS_PER_INSERT: usize = 200;

#[derive(Debug, Deserialize, Default)]
struct DumpConfigFile {
    #[serde(default)]
    source: SourceSection,
    #[serde(default)]
    output: OutputSection,
    /// Source table name -> replacement name or the exclusion sentinel
    #[serde(default)]
    tables: BTreeMap<String, String>,
}

#[derive(Debug, Deserialize, Default)]
struct SourceSection {
    path: Option<String>,
    schema: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct OutputSection {
    path: Option<String>,
    truncate_tables: Option<bool>,
    max_rows_per_insert: Option<usize>,
    queue_capacity: Option<usize>,
}

/// Everything the dump pipeline consumes from configuration.
///
/// Passed explicitly into the schema model and the coordinator so several
/// dumps with different policies can run in one process.
#[derive(Debug, Clone)]
pub struct ExportPolicy {
    pub schema: String,
    pub rules: TableRules,
    pub truncate: bool,
    pub max_rows_per_insert: NonZeroUsize,
}

impl Default for ExportPolicy {
    fn default() -> Self {
        Self {
            schema: DEFAULT_SCHEMA.to_string(),
            rules: TableRules::default(),
            truncate: false,
            max_rows_per_insert: NonZeroUsize::new(DEFAULT_MAX_ROWS_PER_INSERT)
                .unwrap_or(NonZeroUsize::MIN),
        }
    }
}

impl ExportPolicy {
    pub fn with_max_rows_per_insert(mut self, max_rows: usize) -> crate::error::Result<Self> {
        self.max_rows_per_insert = NonZeroUsize::new(max_rows).ok_or_else(|| {
            DumpError::config("max_rows_per_insert must be a positive integer")
        })?;
        Ok(self)
    }
}

/// Loaded configuration before CLI overrides are applied
#[derive(Debug, Clone, Default)]
pub struct DumpConfig {
    pub source_path: Option<String>,
    pub output_path: Option<String>,
    pub schema: Option<String>,
    pub truncate_tables: Option<bool>,
    pub max_rows_per_insert: Option<usize>,
    pub queue_capacity: Option<usize>,
    pub rules: TableRules,
}

impl DumpConfig {
    /// Build the policy, validating the values that must hold before dumping
    pub fn to_policy(&self) -> crate::error::Result<ExportPolicy> {
        let schema = self
            .schema
            .clone()
            .unwrap_or_else(|| DEFAULT_SCHEMA.to_string());
        if schema.trim().is_empty() {
            return Err(DumpError::config("schema name cannot be empty"));
        }

        ExportPolicy {
            schema,
            rules: self.rules.clone(),
            truncate: self.truncate_tables.unwrap_or(false),
            ..ExportPolicy::default()
        }
        .with_max_rows_per_insert(
            self.max_rows_per_insert
                .unwrap_or(DEFAULT_MAX_ROWS_PER_INSERT),
        )
    }

    /// `None` means an unbounded queue
    pub fn queue_capacity(&self) -> crate::error::Result<Option<NonZeroUsize>> {
        match self.queue_capacity {
            None => Ok(None),
            Some(capacity) => NonZeroUsize::new(capacity)
                .map(Some)
                .ok_or_else(|| DumpError::config("queue_capacity must be a positive integer")),
        }
    }
}

pub fn parse_dump_config(raw: &str) -> Result<DumpConfig> {
    let parsed: DumpConfigFile = toml::from_str(raw).context("Failed to parse TOML config")?;

    let mut rules = TableRules::default();
    for (table, target) in parsed.tables {
        rules.add_rename(&table, &target)?;
    }

    Ok(DumpConfig {
        source_path: parsed.source.path,
        output_path: parsed.output.path,
        schema: parsed.source.schema,
        truncate_tables: parsed.output.truncate_tables,
        max_rows_per_insert: parsed.output.max_rows_per_insert,
        queue_capacity: parsed.output.queue_capacity,
        rules,
    })
}

pub fn load_dump_config_from_file(path: &str) -> Result<DumpConfig> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file at {}", path))?;
    parse_dump_config(&raw).with_context(|| format!("Invalid config file at {}", path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table_rules::{TableRule, EXCLUDE_SENTINEL};
    use tempfile::NamedTempFile;

    #[test]
    fn parse_sample_config() {
        let mut tmp = NamedTempFile::new().unwrap();
        let contents = r#"
            [source]
            path = "app.db"
            schema = "main"

            [output]
            path = "dump.sql"
            truncate_tables = true
            max_rows_per_insert = 50
            queue_capacity = 1024

            [tables]
            legacy_audit = "--exclude--"
            customer = "CLIENTS"
        "#;
        use std::io::Write;
        write!(tmp, "{}", contents).unwrap();

        let config = load_dump_config_from_file(tmp.path().to_str().unwrap()).unwrap();
        assert_eq!(config.source_path.as_deref(), Some("app.db"));
        assert_eq!(config.output_path.as_deref(), Some("dump.sql"));

        let policy = config.to_policy().unwrap();
        assert!(policy.truncate);
        assert_eq!(policy.max_rows_per_insert.get(), 50);
        assert_eq!(policy.rules.resolve_name("LEGACY_AUDIT"), EXCLUDE_SENTINEL);
        assert_eq!(
            policy.rules.rule_for_table("customer"),
            Some(&TableRule::Rename("CLIENTS".to_string()))
        );
        assert_eq!(config.queue_capacity().unwrap().map(|c| c.get()), Some(1024));
    }

    #[test]
    fn defaults_apply_to_empty_config() {
        let config = parse_dump_config("").unwrap();
        let policy = config.to_policy().unwrap();
        assert_eq!(policy.schema, DEFAULT_SCHEMA);
        assert!(!policy.truncate);
        assert_eq!(policy.max_rows_per_insert.get(), DEFAULT_MAX_ROWS_PER_INSERT);
        assert!(config.queue_capacity().unwrap().is_none());
    }

    #[test]
    fn zero_batch_size_is_rejected() {
        let config = parse_dump_config("[output]\nmax_rows_per_insert = 0\n").unwrap();
        assert!(matches!(config.to_policy(), Err(DumpError::Config(_))));
    }

    #[test]
    fn zero_queue_capacity_is_rejected() {
        let config = parse_dump_config("[output]\nqueue_capacity = 0\n").unwrap();
        assert!(matches!(config.queue_capacity(), Err(DumpError::Config(_))));
    }

    #[test]
    fn empty_rename_target_is_rejected() {
        assert!(parse_dump_config("[tables]\norders = \"\"\n").is_err());
    }

    #[test]
    fn empty_schema_is_rejected() {
        let config = parse_dump_config("[source]\nschema = \"  \"\n").unwrap();
        assert!(config.to_policy().is_err());
    }
}
