use crate::billing::BillingStore;
use crate::catalog::CatalogStore;
use crate::error::{IcdError, Result};
use rusqlite::Connection;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

/// Owned handle to the local SQLite store.
///
/// Opened once per process and injected into the loader and services.
/// The connection sits behind a mutex so the handle can be shared, but
/// every operation still runs to completion on the calling thread.
pub struct Store {
    conn: Mutex<Connection>,
    path: Option<PathBuf>,
}

impl Store {
    /// Open (or create) a file-backed store and make sure the schema exists
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        // Enable WAL mode for crash recovery
        conn.pragma_update(None, "journal_mode", "WAL")?;
        setup_database(&conn)?;
        tracing::debug!(path = %path.display(), "store opened");

        Ok(Self {
            conn: Mutex::new(conn),
            path: Some(path.to_path_buf()),
        })
    }

    /// In-memory store, used by tests and dry runs
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        setup_database(&conn)?;

        Ok(Self {
            conn: Mutex::new(conn),
            path: None,
        })
    }

    /// File backing this store, `None` for in-memory stores
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn catalog(&self) -> CatalogStore<'_> {
        CatalogStore::new(self)
    }

    pub fn billing(&self) -> BillingStore<'_> {
        BillingStore::new(self)
    }

    /// Close the connection, surfacing any error SQLite reports on close
    pub fn close(self) -> Result<()> {
        let conn = self.conn.into_inner().map_err(|_| IcdError::StoreLock)?;
        conn.close().map_err(|(_, e)| IcdError::Storage(e))?;
        tracing::debug!("store closed");
        Ok(())
    }

    pub(crate) fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| IcdError::StoreLock)
    }
}

pub fn setup_database(conn: &Connection) -> Result<()> {
    // ==========================================================================
    // Catalog table (loaded once from the code file)
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS icd_codes (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            diagnosis TEXT NOT NULL,
            icd_code TEXT NOT NULL
        )",
        [],
    )?;

    // ==========================================================================
    // Billing line items
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS billing_services (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            icd_code TEXT NOT NULL,
            service_name TEXT NOT NULL,
            billing_code TEXT NOT NULL UNIQUE,
            price REAL NOT NULL,
            created_at TEXT NOT NULL
        )",
        [],
    )?;

    // ==========================================================================
    // Indexes
    // ==========================================================================
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_icd_codes_code ON icd_codes(icd_code)",
        [],
    )?;

    Ok(())
}

/// Escape LIKE wildcards so user input is matched literally
pub(crate) fn like_pattern(term: &str) -> String {
    let mut pattern = String::with_capacity(term.len() + 2);
    pattern.push('%');
    for ch in term.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(ch);
    }
    pattern.push('%');
    pattern
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_setup_database_is_repeatable() {
        let conn = Connection::open_in_memory().unwrap();
        setup_database(&conn).unwrap();
        setup_database(&conn).unwrap();

        let tables: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master
                 WHERE type = 'table' AND name IN ('icd_codes', 'billing_services')",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(tables, 2);
    }

    #[test]
    fn test_file_store_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("icd_codes.db");

        let store = Store::open(&db_path).unwrap();
        store
            .billing()
            .insert(&crate::billing::NewBillingItem {
                code: "E11.9".to_string(),
                service_name: "Office Visit".to_string(),
                billing_code: "99213".to_string(),
                price: 125.0,
            })
            .unwrap();
        assert_eq!(store.path(), Some(db_path.as_path()));
        store.close().unwrap();

        let reopened = Store::open(&db_path).unwrap();
        assert_eq!(reopened.billing().count().unwrap(), 1);
    }

    #[test]
    fn test_like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern("diabetes"), "%diabetes%");
        assert_eq!(like_pattern("50%_off"), "%50\\%\\_off%");
        assert_eq!(like_pattern("a\\b"), "%a\\\\b%");
    }
}
