// ICD Reference - Core Library
// Code catalog loading, diagnosis search and billing entry over SQLite

pub mod billing;
pub mod catalog;
pub mod config;
pub mod db;
pub mod error;
pub mod loader;
pub mod logging;
pub mod query;

// Re-export commonly used types
pub use billing::{
    validate_submission, BillingEntryService, BillingItem, BillingStore, NewBillingItem,
};
pub use catalog::{CatalogEntry, CatalogStore, CodeMatch, NewCatalogEntry};
pub use config::AppConfig;
pub use db::{setup_database, Store};
pub use error::{BillingField, IcdError, Result, ValidationError};
pub use loader::{parse_line, parse_reader, CatalogLoader, LoadOutcome, ParsedCatalog};
pub use logging::init_logging;
pub use query::{split_terms, MatchResult, QueryService, SearchResults, NO_MATCH_MESSAGE};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
