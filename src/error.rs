// Error types for the catalog, billing and query layers
//
// Expected outcomes (bad input, duplicate billing code) and unexpected
// storage faults are separate variants so the host can render each one.

use std::path::PathBuf;
use thiserror::Error;

/// Library result type
pub type Result<T> = std::result::Result<T, IcdError>;

/// Generic message shown for any storage fault; details go to the log only
pub const GENERIC_STORAGE_MESSAGE: &str = "An unexpected storage error occurred.";

#[derive(Error, Debug)]
pub enum IcdError {
    /// Malformed or missing user input. No state change.
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Billing code already present. No state change.
    #[error("billing code '{billing_code}' already exists")]
    Conflict { billing_code: String },

    /// Underlying SQLite failure
    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    /// The connection mutex was poisoned by a panic in another caller
    #[error("storage error: connection lock poisoned")]
    StoreLock,

    /// Reading a source file failed
    #[error("I/O error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("configuration error: {message}")]
    Configuration { message: String },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// User input problems detected before the store is touched
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("search input is empty")]
    EmptyQuery,

    #[error("lookup input is empty")]
    EmptyLookup,

    #[error("missing field: {0}")]
    MissingField(BillingField),

    #[error("price '{0}' is not a valid number")]
    InvalidPrice(String),
}

/// Fields of a billing submission, for pointing at the missing one
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BillingField {
    IcdCode,
    ServiceName,
    BillingCode,
    Price,
}

impl BillingField {
    pub fn as_str(&self) -> &'static str {
        match self {
            BillingField::IcdCode => "ICD code",
            BillingField::ServiceName => "service name",
            BillingField::BillingCode => "billing code",
            BillingField::Price => "price",
        }
    }
}

impl std::fmt::Display for BillingField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl IcdError {
    /// Message for the presentation layer. Every failure path ends here.
    pub fn user_message(&self) -> String {
        match self {
            IcdError::Validation(ValidationError::EmptyQuery) => {
                "⚠ Please enter a diagnosis.".to_string()
            }
            IcdError::Validation(ValidationError::EmptyLookup) => {
                "⚠ Please enter a diagnosis or ICD code.".to_string()
            }
            IcdError::Validation(ValidationError::MissingField(_)) => {
                "⚠ Please fill all fields.".to_string()
            }
            IcdError::Validation(ValidationError::InvalidPrice(_)) => {
                "⚠ Price must be a valid number.".to_string()
            }
            IcdError::Conflict { .. } => "⚠ Error: Billing code must be unique.".to_string(),
            IcdError::Storage(_) | IcdError::StoreLock => {
                format!("❌ {}", GENERIC_STORAGE_MESSAGE)
            }
            IcdError::Io { path, .. } => {
                format!("❌ Could not read {}.", path.display())
            }
            IcdError::Configuration { message } => format!("❌ Configuration problem: {}", message),
            IcdError::Serialization(_) => "❌ Could not render the results.".to_string(),
        }
    }

    /// True for expected, recoverable outcomes (bad input, duplicate code)
    pub fn is_user_error(&self) -> bool {
        matches!(self, IcdError::Validation(_) | IcdError::Conflict { .. })
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, IcdError::Conflict { .. })
    }

    pub fn is_storage(&self) -> bool {
        matches!(self, IcdError::Storage(_) | IcdError::StoreLock)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_messages_are_specific_for_expected_errors() {
        let missing: IcdError = ValidationError::MissingField(BillingField::Price).into();
        assert_eq!(missing.user_message(), "⚠ Please fill all fields.");

        let price: IcdError = ValidationError::InvalidPrice("abc".to_string()).into();
        assert_eq!(price.user_message(), "⚠ Price must be a valid number.");

        let conflict = IcdError::Conflict {
            billing_code: "99213".to_string(),
        };
        assert_eq!(conflict.user_message(), "⚠ Error: Billing code must be unique.");
        assert!(conflict.is_user_error());
        assert!(conflict.is_conflict());
    }

    #[test]
    fn test_storage_errors_render_generic_message() {
        let err = IcdError::Storage(rusqlite::Error::InvalidQuery);
        assert!(err.is_storage());
        assert!(!err.is_user_error());
        assert!(err.user_message().contains(GENERIC_STORAGE_MESSAGE));
        // Detail stays in Display for logging
        assert!(err.to_string().starts_with("storage error"));
    }
}
