use thiserror::Error;

use crate::validate::ValidationError;

/// All device-layer errors. Validation failures are kept as their own type so
/// callers can show them to the user verbatim.
#[derive(Debug, Error)]
pub enum DeviceError {
    #[error("Invalid device: {0}")]
    Validation(#[from] ValidationError),

    #[error("Device not found: {0}")]
    NotFound(String),

    #[error("Database error: {0}")]
    DatabaseError(#[from] rusqlite::Error),

    /// A stored device list that no longer parses.
    #[error("Corrupt device list for user {user}: {source}")]
    Corrupt {
        user: u64,
        #[source]
        source: serde_json::Error,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Catalog error: {0}")]
    Catalog(#[from] autotss_catalog::CatalogError),

    #[error(transparent)]
    Core(#[from] autotss_core::AutotssError),
}

pub type Result<T> = std::result::Result<T, DeviceError>;
