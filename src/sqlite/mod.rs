// ABOUTME: SQLite source database for dump export
// ABOUTME: Validates database file paths and opens read-only connections

pub mod reader;

pub use reader::SqliteSource;

use anyhow::{bail, Context, Result};
use rusqlite::{Connection, OpenFlags};
use std::path::{Path, PathBuf};

/// File extensions accepted as SQLite databases
pub const SQLITE_EXTENSIONS: &[&str] = &["db", "sqlite", "sqlite3"];

/// Resolve `path` to an existing SQLite database file.
///
/// The path is canonicalized, so `..` segments and symlinks are resolved
/// before the checks run. Only regular files with one of
/// [`SQLITE_EXTENSIONS`] are accepted, which keeps arbitrary system files
/// like `/etc/passwd` out of reach.
///
/// # Examples
///
/// ```no_run
/// # use rowdump::sqlite::validate_sqlite_path;
/// assert!(validate_sqlite_path("app.db").is_ok());
/// assert!(validate_sqlite_path("../../../etc/passwd").is_err());
/// ```
pub fn validate_sqlite_path(path: &str) -> Result<PathBuf> {
    if path.trim().is_empty() {
        bail!("SQLite file path cannot be empty");
    }

    let canonical = Path::new(path)
        .canonicalize()
        .with_context(|| format!("Cannot resolve SQLite file '{}' (missing or unreadable)", path))?;

    if !canonical.is_file() {
        bail!("'{}' is not a regular file", path);
    }
    check_extension(&canonical)?;

    tracing::debug!("Validated SQLite path: {}", canonical.display());
    Ok(canonical)
}

fn check_extension(path: &Path) -> Result<()> {
    match path.extension().and_then(|ext| ext.to_str()) {
        Some(ext) if SQLITE_EXTENSIONS.contains(&ext) => Ok(()),
        Some(ext) => bail!(
            "Invalid SQLite file extension '{}' (expected one of: {})",
            ext,
            SQLITE_EXTENSIONS.join(", ")
        ),
        None => bail!(
            "SQLite file '{}' has no extension (expected one of: {})",
            path.display(),
            SQLITE_EXTENSIONS.join(", ")
        ),
    }
}

/// Open a validated SQLite database without write access.
///
/// A trivial query runs right away so a corrupt or non-SQLite file fails
/// here rather than midway through a dump.
pub fn open_sqlite(path: &str) -> Result<Connection> {
    let canonical = validate_sqlite_path(path)?;
    tracing::info!("Opening SQLite database: {}", canonical.display());

    let conn = Connection::open_with_flags(&canonical, OpenFlags::SQLITE_OPEN_READ_ONLY)
        .with_context(|| format!("Failed to open SQLite database: {}", canonical.display()))?;

    conn.query_row("SELECT count(*) FROM sqlite_master", [], |row| {
        row.get::<_, i64>(0)
    })
    .with_context(|| format!("'{}' is not a readable SQLite database", canonical.display()))?;

    Ok(conn)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;

    #[test]
    fn test_empty_path_is_rejected() {
        let err = validate_sqlite_path("  ").unwrap_err();
        assert!(err.to_string().contains("cannot be empty"));
    }

    #[test]
    fn test_missing_file_is_rejected() {
        assert!(validate_sqlite_path("/nonexistent/database.db").is_err());
    }

    #[test]
    fn test_extension_rules() {
        let dir = tempfile::tempdir().unwrap();

        let bare = dir.path().join("source_no_ext");
        File::create(&bare).unwrap();
        let err = validate_sqlite_path(bare.to_str().unwrap()).unwrap_err();
        assert!(err.to_string().contains("no extension"));

        let text = dir.path().join("source.txt");
        File::create(&text).unwrap();
        let err = validate_sqlite_path(text.to_str().unwrap()).unwrap_err();
        assert!(err.to_string().contains("Invalid SQLite file extension"));

        for ext in SQLITE_EXTENSIONS {
            let file = dir.path().join(format!("source.{}", ext));
            File::create(&file).unwrap();
            assert!(
                validate_sqlite_path(file.to_str().unwrap()).is_ok(),
                ".{} should be accepted",
                ext
            );
        }
    }

    #[test]
    fn test_directory_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("looks_like.db");
        std::fs::create_dir(&nested).unwrap();
        let err = validate_sqlite_path(nested.to_str().unwrap()).unwrap_err();
        assert!(err.to_string().contains("not a regular file"));
    }

    #[test]
    fn test_garbage_file_fails_to_open() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("garbage.db");
        std::fs::write(&path, b"definitely not a sqlite header, just text padding out a page")
            .unwrap();
        assert!(open_sqlite(path.to_str().unwrap()).is_err());
    }

    #[test]
    fn test_connection_is_read_only() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("readonly.db");
        {
            let conn = Connection::open(&path).unwrap();
            conn.execute("CREATE TABLE test (id INTEGER)", []).unwrap();
        }

        let conn = open_sqlite(path.to_str().unwrap()).unwrap();
        assert!(conn.execute("INSERT INTO test VALUES (1)", []).is_err());
    }
}
