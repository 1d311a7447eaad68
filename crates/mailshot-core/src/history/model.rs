//! Send history data models.

use std::fmt;

use chrono::{DateTime, Utc};

/// What happened to a recipient during a send run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HistoryStatus {
    /// Provider accepted the message.
    Sent,
    /// Provider reported a failure.
    Failed,
    /// Recipient was not eligible; no send was attempted.
    Skipped,
}

impl HistoryStatus {
    /// Parse from database string representation.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "sent" => Some(Self::Sent),
            "failed" => Some(Self::Failed),
            "skipped" => Some(Self::Skipped),
            _ => None,
        }
    }

    /// Convert to database string representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Sent => "sent",
            Self::Failed => "failed",
            Self::Skipped => "skipped",
        }
    }
}

impl fmt::Display for HistoryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One entry in the send history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailHistoryRecord {
    /// Row id, `None` until stored.
    pub id: Option<i64>,
    /// Recipient address.
    pub contact_email: String,
    /// Campaign the attempt belonged to.
    pub campaign_name: String,
    /// When the attempt (or skip) happened.
    pub sent_at: DateTime<Utc>,
    /// Outcome.
    pub status: HistoryStatus,
    /// Skip reason or provider error.
    pub detail: Option<String>,
}

impl EmailHistoryRecord {
    /// Creates an unsaved record.
    #[must_use]
    pub fn new(
        contact_email: impl Into<String>,
        campaign_name: impl Into<String>,
        sent_at: DateTime<Utc>,
        status: HistoryStatus,
        detail: Option<String>,
    ) -> Self {
        Self {
            id: None,
            contact_email: contact_email.into(),
            campaign_name: campaign_name.into(),
            sent_at,
            status,
            detail,
        }
    }
}
