// Code catalog loader
// Reads `<code><whitespace><description>` lines into the catalog table

use crate::catalog::{CatalogStore, NewCatalogEntry};
use crate::error::IcdError;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// Result of a load run. The run never fails outright: problems are
/// reported through `error` after whatever could be read was inserted.
#[derive(Debug, Default)]
pub struct LoadOutcome {
    /// Rows appended to the catalog
    pub inserted: usize,
    /// Non-blank lines that did not split into code + description
    pub skipped: usize,
    pub error: Option<IcdError>,
}

impl LoadOutcome {
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Lines parsed from a reader, plus the read error that stopped it (if any)
#[derive(Debug, Default)]
pub struct ParsedCatalog {
    pub entries: Vec<NewCatalogEntry>,
    pub skipped: usize,
    pub read_error: Option<std::io::Error>,
}

/// Parse one line. Splits on the first run of whitespace; the code comes
/// first in the file but the entry stores (diagnosis, code).
pub fn parse_line(line: &str) -> Option<NewCatalogEntry> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }

    let (code, description) = line.split_once(char::is_whitespace)?;
    let description = description.trim();
    if description.is_empty() {
        return None;
    }

    Some(NewCatalogEntry {
        diagnosis: description.to_string(),
        code: code.trim().to_string(),
    })
}

/// Parse every line of `reader`, stopping at the first read error.
/// Lines before the failure are kept.
pub fn parse_reader<R: BufRead>(reader: R) -> ParsedCatalog {
    let mut parsed = ParsedCatalog::default();

    for line in reader.lines() {
        let line = match line {
            Ok(line) => line,
            Err(e) => {
                parsed.read_error = Some(e);
                break;
            }
        };

        if line.trim().is_empty() {
            continue;
        }

        match parse_line(&line) {
            Some(entry) => parsed.entries.push(entry),
            None => parsed.skipped += 1,
        }
    }

    parsed
}

/// Bulk loader for the code catalog.
///
/// Not idempotent: every call appends all parsed rows again, so callers
/// run it once per store (the CLI host checks `CatalogStore::is_empty`).
pub struct CatalogLoader<'a> {
    catalog: CatalogStore<'a>,
}

impl<'a> CatalogLoader<'a> {
    pub fn new(catalog: CatalogStore<'a>) -> Self {
        Self { catalog }
    }

    pub fn load(&self, source_path: &Path) -> LoadOutcome {
        tracing::info!(path = %source_path.display(), "loading code catalog");

        let file = match File::open(source_path) {
            Ok(file) => file,
            Err(source) => {
                let error = IcdError::Io {
                    path: source_path.to_path_buf(),
                    source,
                };
                tracing::error!(error = %error, "error loading data from file");
                return LoadOutcome {
                    error: Some(error),
                    ..LoadOutcome::default()
                };
            }
        };

        let parsed = parse_reader(BufReader::new(file));
        let mut outcome = LoadOutcome {
            skipped: parsed.skipped,
            ..LoadOutcome::default()
        };

        match self.catalog.insert_many(&parsed.entries) {
            Ok(inserted) => outcome.inserted = inserted,
            Err(error) => {
                tracing::error!(error = %error, "error inserting catalog entries");
                outcome.error = Some(error);
                return outcome;
            }
        }

        if let Some(source) = parsed.read_error {
            let error = IcdError::Io {
                path: source_path.to_path_buf(),
                source,
            };
            tracing::error!(
                error = %error,
                inserted = outcome.inserted,
                "catalog read stopped early; rows before the failure were kept"
            );
            outcome.error = Some(error);
            return outcome;
        }

        tracing::info!(
            inserted = outcome.inserted,
            skipped = outcome.skipped,
            "code catalog loaded"
        );
        outcome
    }
}
