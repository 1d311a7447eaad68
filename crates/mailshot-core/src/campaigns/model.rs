//! Campaign data models.

use std::fmt;

use chrono::{DateTime, Utc};

use crate::stats::Tally;

/// Lifecycle of a campaign.
///
/// `building → ready → sending → completed | completed_with_errors | failed`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CampaignStatus {
    /// Recipient list is being assembled.
    #[default]
    Building,
    /// Recipient list is final; nothing sent yet.
    Ready,
    /// A send run is in progress (or was interrupted).
    Sending,
    /// Send run finished with no delivery failures.
    Completed,
    /// Send run finished; some deliveries failed.
    CompletedWithErrors,
    /// Send run was aborted by a system error.
    Failed,
}

impl CampaignStatus {
    /// Parse from database string representation.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "building" => Some(Self::Building),
            "ready" => Some(Self::Ready),
            "sending" => Some(Self::Sending),
            "completed" => Some(Self::Completed),
            "completed_with_errors" => Some(Self::CompletedWithErrors),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }

    /// Convert to database string representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Building => "building",
            Self::Ready => "ready",
            Self::Sending => "sending",
            Self::Completed => "completed",
            Self::CompletedWithErrors => "completed_with_errors",
            Self::Failed => "failed",
        }
    }

    /// Whether a send run may start (or resume) from this status.
    ///
    /// Interrupted and failed runs resume; recipients already sent are
    /// held back by the cooldown.
    #[must_use]
    pub const fn can_send(&self) -> bool {
        matches!(self, Self::Ready | Self::Sending | Self::Failed)
    }

    /// Whether a send run has finished for this campaign.
    #[must_use]
    pub const fn is_completed(&self) -> bool {
        matches!(self, Self::Completed | Self::CompletedWithErrors)
    }
}

impl fmt::Display for CampaignStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A named campaign and its recipient list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Campaign {
    /// Unique name.
    pub name: String,
    /// Current status.
    pub status: CampaignStatus,
    /// Recipients in selection order, without duplicates.
    pub recipients: Vec<String>,
    /// Outcome counts from the build.
    pub build_stats: Tally,
    /// Outcome counts from the most recent send run.
    pub send_stats: Option<Tally>,
    /// When the campaign was created.
    pub created_at: DateTime<Utc>,
    /// When the last send run finished.
    pub completed_at: Option<DateTime<Utc>>,
}

impl Campaign {
    /// Number of recipients.
    #[must_use]
    pub fn total_recipients(&self) -> usize {
        self.recipients.len()
    }
}
