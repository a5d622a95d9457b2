//! Error types for the catastro-registry library.
//!
//! Validation helpers never fail loudly (they return `bool` / `Option`); this
//! module covers the repository boundary, where the cause of a failure matters.

use thiserror::Error;

/// Errors that can occur in the cadastre registry.
#[derive(Error, Debug)]
pub enum CatastroError {
    /// The SQLite store could not be opened or reached
    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),

    /// Insert or update collided with the (identity number, role code) uniqueness constraint
    #[error("Duplicate record: owner {identity_number} already registers role {property_role_code}")]
    DuplicateRecord {
        /// Owner identity number of the rejected record
        identity_number: String,
        /// Property role code of the rejected record
        property_role_code: String,
    },

    /// Referenced property id does not exist
    #[error("Property not found: {0}")]
    PropertyNotFound(i64),

    /// Photo index outside the property's photo list
    #[error("Photo index {index} out of range for property {property_id} ({len} photos)")]
    PhotoIndexOutOfRange {
        /// Owning property
        property_id: i64,
        /// Requested index
        index: usize,
        /// Number of photos currently stored
        len: usize,
    },

    /// Page or page size below 1
    #[error("Invalid pagination: page {page}, page size {page_size} (both must be at least 1)")]
    InvalidPagination {
        /// Requested page
        page: u32,
        /// Requested page size
        page_size: u32,
    },

    /// A record field failed form validation
    #[error("Invalid {field}: {reason}")]
    InvalidField {
        /// Field name
        field: &'static str,
        /// Human-readable reason
        reason: String,
    },

    /// One or more photo files could not be removed after the records were deleted
    #[error("{failed} photo file(s) could not be removed")]
    PartialCleanupFailure {
        /// Number of files left behind
        failed: usize,
    },

    /// Any other database error
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Convenience type alias for Result with `CatastroError`
pub type Result<T> = std::result::Result<T, CatastroError>;

impl CatastroError {
    /// Shorthand for an [`CatastroError::InvalidField`]
    pub fn invalid_field(field: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidField {
            field,
            reason: reason.into(),
        }
    }
}

impl From<config::ConfigError> for CatastroError {
    fn from(err: config::ConfigError) -> Self {
        Self::InvalidConfig(err.to_string())
    }
}

/// True when the error is SQLite's UNIQUE constraint violation
pub(crate) fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _)
            if e.code == rusqlite::ErrorCode::ConstraintViolation
                && e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
    )
}
