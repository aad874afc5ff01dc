use crate::catalog::CodeMatch;
use crate::db::{like_pattern, Store};
use crate::error::{BillingField, IcdError, Result, ValidationError};
use chrono::{DateTime, Utc};
use rusqlite::params;
use serde::{Deserialize, Serialize};

/// Billing line item ready to insert
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewBillingItem {
    /// ICD code, stored as free text (no link to the catalog is enforced)
    pub code: String,
    pub service_name: String,
    pub billing_code: String,
    pub price: f64,
}

/// Stored billing line item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BillingItem {
    pub id: i64,
    pub code: String,
    pub service_name: String,
    pub billing_code: String,
    pub price: f64,
    pub created_at: DateTime<Utc>,
}

// ============================================================================
// BILLING STORE
// ============================================================================

pub struct BillingStore<'a> {
    store: &'a Store,
}

impl<'a> BillingStore<'a> {
    pub(crate) fn new(store: &'a Store) -> Self {
        Self { store }
    }

    /// Look up catalog rows whose diagnosis or code contains `term`.
    /// Used to find a code before billing it; duplicates are not collapsed.
    pub fn find_by_substring(&self, term: &str) -> Result<Vec<CodeMatch>> {
        let conn = self.store.lock()?;
        let mut stmt = conn.prepare_cached(
            "SELECT diagnosis, icd_code
             FROM icd_codes
             WHERE LOWER(diagnosis) LIKE ?1 ESCAPE '\\'
                OR LOWER(icd_code) LIKE ?1 ESCAPE '\\'
             ORDER BY id",
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

    /// Insert an item and return its id.
    /// A billing code that already exists yields `IcdError::Conflict`.
    pub fn insert(&self, item: &NewBillingItem) -> Result<i64> {
        let conn = self.store.lock()?;
        let result = conn.execute(
            "INSERT INTO billing_services (icd_code, service_name, billing_code, price, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                item.code,
                item.service_name,
                item.billing_code,
                item.price,
                Utc::now().to_rfc3339(),
            ],
        );

        match result {
            Ok(_) => Ok(conn.last_insert_rowid()),
            // Only the UNIQUE(billing_code) constraint is a conflict; NOT NULL
            // and other constraint failures stay storage errors
            Err(rusqlite::Error::SqliteFailure(err, _))
                if err.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE =>
            {
                Err(IcdError::Conflict {
                    billing_code: item.billing_code.clone(),
                })
            }
            Err(e) => Err(e.into()),
        }
    }

    pub fn count(&self) -> Result<i64> {
        let conn = self.store.lock()?;
        let count: i64 =
            conn.query_row("SELECT COUNT(*) FROM billing_services", [], |row| row.get(0))?;
        Ok(count)
    }

    /// All billing items, oldest first
    pub fn list(&self) -> Result<Vec<BillingItem>> {
        let conn = self.store.lock()?;
        let mut stmt = conn.prepare(
            "SELECT id, icd_code, service_name, billing_code, price, created_at
             FROM billing_services
             ORDER BY id",
        )?;

        let items = stmt
            .query_map([], row_to_item)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(items)
    }

    pub fn get(&self, id: i64) -> Result<Option<BillingItem>> {
        let conn = self.store.lock()?;
        let mut stmt = conn.prepare(
            "SELECT id, icd_code, service_name, billing_code, price, created_at
             FROM billing_services
             WHERE id = ?1",
        )?;

        let mut rows = stmt.query_map([id], row_to_item)?;
        let item = rows.next().transpose()?;
        Ok(item)
    }
}

fn row_to_item(row: &rusqlite::Row<'_>) -> rusqlite::Result<BillingItem> {
    let created_at_str: String = row.get(5)?;
    let created_at = DateTime::parse_from_rfc3339(&created_at_str)
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(5, rusqlite::types::Type::Text, Box::new(e))
        })?
        .with_timezone(&Utc);

    Ok(BillingItem {
        id: row.get(0)?,
        code: row.get(1)?,
        service_name: row.get(2)?,
        billing_code: row.get(3)?,
        price: row.get(4)?,
        created_at,
    })
}

// ============================================================================
// BILLING ENTRY SERVICE
// ============================================================================

/// Validates raw form input and persists it as a billing item
pub struct BillingEntryService<'a> {
    billing: BillingStore<'a>,
}

impl<'a> BillingEntryService<'a> {
    pub fn new(billing: BillingStore<'a>) -> Self {
        Self { billing }
    }

    /// Validate and store one line item, returning the new row id.
    ///
    /// All inputs are trimmed. Validation failures never reach the store.
    /// Clearing the form afterwards is the caller's job.
    pub fn submit(
        &self,
        icd_code: &str,
        service_name: &str,
        billing_code: &str,
        price_text: &str,
    ) -> Result<i64> {
        let item = validate_submission(icd_code, service_name, billing_code, price_text)?;

        match self.billing.insert(&item) {
            Ok(id) => {
                tracing::info!(id, billing_code = %item.billing_code, "billing details saved");
                Ok(id)
            }
            Err(e) if e.is_conflict() => {
                tracing::warn!(billing_code = %item.billing_code, "duplicate billing code rejected");
                Err(e)
            }
            Err(e) => {
                tracing::error!(error = %e, "error saving billing details");
                Err(e)
            }
        }
    }

    /// Find catalog codes to bill against, by diagnosis text or code
    pub fn lookup(&self, query: &str) -> Result<Vec<CodeMatch>> {
        let query = query.trim();
        if query.is_empty() {
            return Err(ValidationError::EmptyLookup.into());
        }

        self.billing.find_by_substring(query).map_err(|e| {
            tracing::error!(error = %e, "error during ICD code lookup");
            e
        })
    }
}

/// Check the four form fields and build the item to insert
pub fn validate_submission(
    icd_code: &str,
    service_name: &str,
    billing_code: &str,
    price_text: &str,
) -> std::result::Result<NewBillingItem, ValidationError> {
    let fields = [
        (BillingField::IcdCode, icd_code.trim()),
        (BillingField::ServiceName, service_name.trim()),
        (BillingField::BillingCode, billing_code.trim()),
        (BillingField::Price, price_text.trim()),
    ];
    if let Some((field, _)) = fields.iter().find(|(_, value)| value.is_empty()) {
        return Err(ValidationError::MissingField(*field));
    }

    let price_text = price_text.trim();
    let price: f64 = price_text
        .parse()
        .map_err(|_| ValidationError::InvalidPrice(price_text.to_string()))?;
    if !price.is_finite() {
        return Err(ValidationError::InvalidPrice(price_text.to_string()));
    }

    Ok(NewBillingItem {
        code: icd_code.trim().to_string(),
        service_name: service_name.trim().to_string(),
        billing_code: billing_code.trim().to_string(),
        price,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::NewCatalogEntry;

    fn store_with_catalog() -> Store {
        let store = Store::open_in_memory().unwrap();
        store
            .catalog()
            .insert_many(&[
                NewCatalogEntry {
                    diagnosis: "Type 2 diabetes mellitus without complications".to_string(),
                    code: "E11.9".to_string(),
                },
                NewCatalogEntry {
                    diagnosis: "Essential (primary) hypertension".to_string(),
                    code: "I10".to_string(),
                },
            ])
            .unwrap();
        store
    }

    #[test]
    fn test_submit_returns_new_id() {
        let store = Store::open_in_memory().unwrap();
        let service = BillingEntryService::new(store.billing());

        let id = service.submit("E11.9", "Office Visit", "99213", "125.00").unwrap();
        assert_eq!(id, 1);

        let item = store.billing().get(id).unwrap().unwrap();
        assert_eq!(item.code, "E11.9");
        assert_eq!(item.service_name, "Office Visit");
        assert_eq!(item.price, 125.0);
    }

    #[test]
    fn test_duplicate_billing_code_is_conflict_and_leaves_count() {
        let store = Store::open_in_memory().unwrap();
        let service = BillingEntryService::new(store.billing());

        service.submit("E11.9", "Office Visit", "99213", "125.00").unwrap();
        let err = service.submit("I10", "Follow-up", "99213", "80").unwrap_err();

        assert!(matches!(err, IcdError::Conflict { ref billing_code } if billing_code == "99213"));
        assert_eq!(store.billing().count().unwrap(), 1);
    }

    #[test]
    fn test_not_null_violation_is_storage_not_conflict() {
        let store = Store::open_in_memory().unwrap();

        // SQLite binds NaN as NULL, tripping `price REAL NOT NULL`
        let err = store
            .billing()
            .insert(&NewBillingItem {
                code: "E11.9".to_string(),
                service_name: "Office Visit".to_string(),
                billing_code: "1".to_string(),
                price: f64::NAN,
            })
            .unwrap_err();

        assert!(err.is_storage());
        assert!(!err.is_conflict());
        assert_eq!(store.billing().count().unwrap(), 0);
    }

    #[test]
    fn test_invalid_price_rejected_before_store() {
        let store = Store::open_in_memory().unwrap();
        let service = BillingEntryService::new(store.billing());

        let err = service.submit("E11.9", "Office Visit", "99213", "twelve").unwrap_err();
        assert!(matches!(
            err,
            IcdError::Validation(ValidationError::InvalidPrice(_))
        ));
        assert_eq!(store.billing().count().unwrap(), 0);
    }

    #[test]
    fn test_missing_field_after_trim() {
        let err = validate_submission("E11.9", "   ", "99213", "10").unwrap_err();
        assert_eq!(err, ValidationError::MissingField(BillingField::ServiceName));

        let err = validate_submission("", "", "", "").unwrap_err();
        assert_eq!(err, ValidationError::MissingField(BillingField::IcdCode));
    }

    #[test]
    fn test_validate_trims_and_rejects_non_finite() {
        let item = validate_submission(" E11.9 ", " Office Visit ", " 99213 ", " 1e2 ").unwrap();
        assert_eq!(item.code, "E11.9");
        assert_eq!(item.billing_code, "99213");
        assert_eq!(item.price, 100.0);

        assert!(validate_submission("E11.9", "Visit", "1", "NaN").is_err());
        assert!(validate_submission("E11.9", "Visit", "1", "inf").is_err());
    }

    #[test]
    fn test_lookup_matches_code_or_diagnosis() {
        let store = store_with_catalog();
        let service = BillingEntryService::new(store.billing());

        let by_code = service.lookup("e11").unwrap();
        assert_eq!(by_code, vec![CodeMatch::new(
            "Type 2 diabetes mellitus without complications",
            "E11.9"
        )]);

        let by_text = service.lookup("Hypertension").unwrap();
        assert_eq!(by_text.len(), 1);
        assert_eq!(by_text[0].code, "I10");

        assert!(service.lookup("asthma").unwrap().is_empty());
    }

    #[test]
    fn test_lookup_rejects_blank_query() {
        let store = store_with_catalog();
        let service = BillingEntryService::new(store.billing());

        let err = service.lookup("  ").unwrap_err();
        assert!(matches!(err, IcdError::Validation(ValidationError::EmptyLookup)));
    }

    #[test]
    fn test_list_returns_items_in_insert_order() {
        let store = Store::open_in_memory().unwrap();
        let service = BillingEntryService::new(store.billing());
        service.submit("E11.9", "Office Visit", "99213", "125").unwrap();
        service.submit("I10", "Follow-up", "99212", "80.5").unwrap();

        let items = store.billing().list().unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].billing_code, "99213");
        assert_eq!(items[1].price, 80.5);
    }
}
