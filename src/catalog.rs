use crate::db::{like_pattern, Store};
use crate::error::Result;
use rusqlite::params;
use serde::{Deserialize, Serialize};

/// Catalog row as parsed from the code file, before it has an id
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewCatalogEntry {
    pub diagnosis: String,
    pub code: String,
}

/// Stored catalog row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub id: i64,
    pub diagnosis: String,
    pub code: String,
}

/// A (diagnosis, code) pair returned by lookups
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CodeMatch {
    pub diagnosis: String,
    pub code: String,
}

impl CodeMatch {
    pub fn new(diagnosis: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            diagnosis: diagnosis.into(),
            code: code.into(),
        }
    }
}

/// Catalog of diagnosis descriptions and their ICD codes.
/// Append-only: there is no update or delete path.
pub struct CatalogStore<'a> {
    store: &'a Store,
}

impl<'a> CatalogStore<'a> {
    pub(crate) fn new(store: &'a Store) -> Self {
        Self { store }
    }

    /// Case-insensitive substring match on the diagnosis text.
    /// Identical (diagnosis, code) pairs collapse to one row.
    pub fn find_by_diagnosis_substring(&self, term: &str) -> Result<Vec<CodeMatch>> {
        let conn = self.store.lock()?;
        let mut stmt = conn.prepare_cached(
            "SELECT DISTINCT diagnosis, icd_code
             FROM icd_codes
             WHERE LOWER(diagnosis) LIKE ?1 ESCAPE '\\'",
        )?;

        let matches = stmt
            .query_map([like_pattern(&term.to_lowercase())], |row| {
                Ok(CodeMatch {
                    diagnosis: row.get(0)?,
                    code: row.get(1)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(matches)
    }

    /// Append entries in a single transaction. Rows are never rejected.
    pub fn insert_many(&self, entries: &[NewCatalogEntry]) -> Result<usize> {
        let mut conn = self.store.lock()?;
        let tx = conn.transaction()?;
        {
            let mut stmt =
                tx.prepare("INSERT INTO icd_codes (diagnosis, icd_code) VALUES (?1, ?2)")?;
            for entry in entries {
                stmt.execute(params![entry.diagnosis, entry.code])?;
            }
        }
        tx.commit()?;

        tracing::debug!(rows = entries.len(), "catalog entries inserted");
        Ok(entries.len())
    }

    pub fn count(&self) -> Result<i64> {
        let conn = self.store.lock()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM icd_codes", [], |row| row.get(0))?;
        Ok(count)
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.count()? == 0)
    }

    /// All entries carrying exactly this code, in load order
    pub fn get_by_code(&self, code: &str) -> Result<Vec<CatalogEntry>> {
        let conn = self.store.lock()?;
        let mut stmt = conn.prepare(
            "SELECT id, diagnosis, icd_code FROM icd_codes WHERE icd_code = ?1 ORDER BY id",
        )?;

        let entries = stmt
            .query_map([code], |row| {
                Ok(CatalogEntry {
                    id: row.get(0)?,
                    diagnosis: row.get(1)?,
                    code: row.get(2)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(entries)
    }
}
