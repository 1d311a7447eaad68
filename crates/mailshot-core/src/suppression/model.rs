//! Suppression data models.

use chrono::{DateTime, Utc};

/// An address that asked not to be emailed again.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnsubscribeRecord {
    /// Email address (unique, lower-cased).
    pub email: String,
    /// Where the unsubscribe came from (e.g. "sendgrid", "manual").
    pub source: String,
    /// When it was recorded.
    pub created_at: DateTime<Utc>,
}

/// A domain that belongs to a current customer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExistingCustomerRecord {
    /// Customer domain (unique, lower-cased).
    pub domain: String,
    /// Where the record came from.
    pub source: String,
    /// When it was recorded.
    pub added_at: DateTime<Utc>,
}
