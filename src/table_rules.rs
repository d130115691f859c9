// ABOUTME: Per-table rename and exclusion rules applied while resolving export names
// ABOUTME: Supports CLI/config inputs with case-insensitive source table matching

use anyhow::{bail, Context, Result};
use std::collections::BTreeMap;

/// Reserved rename target marking a table to be skipped entirely.
pub const EXCLUDE_SENTINEL: &str = "--exclude--";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TableRule {
    Rename(String),
    Exclude,
}

impl TableRule {
    /// Interpret a raw rename target, where the sentinel means exclusion
    pub fn parse(target: &str) -> Result<Self> {
        let trimmed = target.trim();
        if trimmed.is_empty() {
            bail!("Rename target cannot be empty");
        }
        if trimmed == EXCLUDE_SENTINEL {
            Ok(TableRule::Exclude)
        } else {
            Ok(TableRule::Rename(trimmed.to_string()))
        }
    }

    /// Name a table resolves to under this rule
    pub fn target(&self) -> &str {
        match self {
            TableRule::Rename(name) => name,
            TableRule::Exclude => EXCLUDE_SENTINEL,
        }
    }
}

/// Rename/exclude policy keyed by source table name.
///
/// Keys are matched case-insensitively because catalogs commonly report
/// unquoted identifiers in upper case while users write them in any case.
#[derive(Debug, Clone, Default)]
pub struct TableRules {
    rules: BTreeMap<String, TableRule>,
}

impl TableRules {
    pub fn add_rule(&mut self, table: &str, rule: TableRule) -> Result<()> {
        let key = normalize_key(table)?;
        if let Some(existing) = self.rules.get(&key) {
            if existing != &rule {
                tracing::debug!(
                    "Overriding rule for table '{}': {} -> {}",
                    table,
                    existing.target(),
                    rule.target()
                );
            }
        }
        self.rules.insert(key, rule);
        Ok(())
    }

    pub fn add_rename(&mut self, table: &str, target: &str) -> Result<()> {
        let rule = TableRule::parse(target)
            .with_context(|| format!("Invalid rename rule for table '{}'", table))?;
        self.add_rule(table, rule)
    }

    pub fn add_exclude(&mut self, table: &str) -> Result<()> {
        self.add_rule(table, TableRule::Exclude)
    }

    /// Apply `old=new` specifications from the command line
    pub fn apply_rename_cli(&mut self, specs: &[String]) -> Result<()> {
        for spec in specs {
            let (table, target) = spec
                .split_once('=')
                .with_context(|| format!("Rename '{}' missing '=' separator", spec))?;
            self.add_rename(table, target)?;
        }
        Ok(())
    }

    pub fn apply_exclude_cli(&mut self, specs: &[String]) -> Result<()> {
        for spec in specs {
            self.add_exclude(spec)?;
        }
        Ok(())
    }

    pub fn rule_for_table(&self, table: &str) -> Option<&TableRule> {
        self.rules.get(&table.trim().to_lowercase())
    }

    /// Resolved export name: the rename target, the exclusion sentinel, or
    /// the upper-cased source name when no rule exists.
    pub fn resolve_name(&self, table: &str) -> String {
        match self.rule_for_table(table) {
            Some(rule) => rule.target().to_string(),
            None => table.to_uppercase(),
        }
    }
}

fn normalize_key(table: &str) -> Result<String> {
    let trimmed = table.trim();
    if trimmed.is_empty() {
        bail!("Table name cannot be empty");
    }
    Ok(trimmed.to_lowercase())
}
