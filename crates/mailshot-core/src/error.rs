//! Error types for the core library.

use thiserror::Error;

use crate::campaigns::CampaignStatus;

/// Errors that can occur in core operations.
///
/// Per-record rejections (bad format, duplicates, unsubscribes, ...) are not
/// errors; they are reported as [`Outcome`](crate::Outcome) values.
#[derive(Debug, Error)]
pub enum Error {
    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP request to the delivery provider failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// A campaign with this name already exists.
    #[error("Campaign already exists: {0}")]
    NameConflict(String),

    /// Campaign not found.
    #[error("Campaign not found: {0}")]
    CampaignNotFound(String),

    /// Campaign is in a status that does not allow the requested operation.
    #[error("Campaign '{name}' has invalid status: {status}")]
    InvalidStatus {
        /// Campaign name.
        name: String,
        /// Status the campaign was found in.
        status: CampaignStatus,
    },

    /// Contact not found in the master list.
    #[error("Contact not found: {0}")]
    ContactNotFound(String),

    /// Day count outside the supported range.
    #[error("Day count out of range: {0}")]
    InvalidDays(i64),

    /// Stored value could not be decoded.
    #[error("Corrupt record: {0}")]
    Corrupt(String),

    /// Delivery provider rejected a request.
    #[error("Provider error: {0}")]
    Provider(String),
}

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;
