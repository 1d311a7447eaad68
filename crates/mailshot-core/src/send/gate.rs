//! Dispatch-time eligibility.
//!
//! Acceptance at build time says nothing about the moment of sending: an
//! address may have unsubscribed, become a customer, or been emailed by
//! another campaign since. Every recipient is re-checked here, in order:
//!
//! 1. format
//! 2. unsubscribed
//! 3. existing customer (domain)
//! 4. cooldown
//!
//! The first failing check is the reason attributed to the recipient.

use chrono::{DateTime, Utc};
use tracing::debug;

use super::frequency::FrequencyTracker;
use crate::Result;
use crate::delivery::DeliveryResult;
use crate::domain::EmailAddress;
use crate::history::{EmailHistoryRecord, HistoryRepository, HistoryStatus};
use crate::stats::{Outcome, Rejection};
use crate::suppression::{CustomerRepository, UnsubscribeRepository};

/// Whether a recipient may be sent to right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Eligibility {
    /// All checks passed.
    Eligible,
    /// Recipient must be skipped this run.
    Skipped(Rejection),
}

impl Eligibility {
    /// Returns true if the recipient may be sent to.
    #[must_use]
    pub const fn is_eligible(&self) -> bool {
        matches!(self, Self::Eligible)
    }
}

/// Re-validates recipients at dispatch time and records what happened to them.
///
/// The gate never talks to the delivery provider.
#[derive(Debug, Clone)]
pub struct SendEligibilityGate {
    unsubscribes: UnsubscribeRepository,
    customers: CustomerRepository,
    history: HistoryRepository,
    frequency: FrequencyTracker,
}

impl SendEligibilityGate {
    /// Creates a gate.
    #[must_use]
    pub const fn new(
        unsubscribes: UnsubscribeRepository,
        customers: CustomerRepository,
        history: HistoryRepository,
        frequency: FrequencyTracker,
    ) -> Self {
        Self {
            unsubscribes,
            customers,
            history,
            frequency,
        }
    }

    /// The tracker used for the cooldown check.
    #[must_use]
    pub const fn frequency(&self) -> &FrequencyTracker {
        &self.frequency
    }

    /// Decide whether `email` may be sent to at `now`.
    ///
    /// # Errors
    ///
    /// Returns an error if a database query fails.
    pub async fn check(&self, email: &str, now: DateTime<Utc>) -> Result<Eligibility> {
        let Ok(address) = EmailAddress::parse(email) else {
            return Ok(Eligibility::Skipped(Rejection::FormatError));
        };

        if self.unsubscribes.contains(address.as_str()).await? {
            return Ok(Eligibility::Skipped(Rejection::Unsubscribed));
        }

        if self.customers.contains_domain(address.domain()).await? {
            return Ok(Eligibility::Skipped(Rejection::ExistingCustomer));
        }

        if self
            .frequency
            .is_within_cooldown(address.as_str(), now)
            .await?
        {
            return Ok(Eligibility::Skipped(Rejection::FrequencyBlocked));
        }

        Ok(Eligibility::Eligible)
    }

    /// Log a skipped recipient in the send history.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn record_skip(
        &self,
        email: &str,
        campaign: &str,
        reason: Rejection,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let record = EmailHistoryRecord::new(
            normalized(email),
            campaign,
            now,
            HistoryStatus::Skipped,
            Some(reason.describe().to_string()),
        );
        self.history.append(&record).await?;
        debug!(%email, campaign, %reason, "Recorded skip");
        Ok(())
    }

    /// Log a send attempt and, on success only, advance the last-send time.
    ///
    /// Returns the outcome to count for this recipient.
    ///
    /// # Errors
    ///
    /// Returns an error if a database query fails.
    pub async fn record_attempt(
        &self,
        email: &str,
        campaign: &str,
        result: &DeliveryResult,
        now: DateTime<Utc>,
    ) -> Result<Outcome> {
        let email = normalized(email);
        let (status, detail, outcome) = match result {
            DeliveryResult::Delivered => (HistoryStatus::Sent, None, Outcome::Sent),
            DeliveryResult::Failed(detail) => (
                HistoryStatus::Failed,
                Some(detail.clone()),
                Outcome::DeliveryFailure,
            ),
        };

        let record = EmailHistoryRecord::new(&email, campaign, now, status, detail);
        self.history.append(&record).await?;

        if result.is_delivered() {
            self.frequency.record_send(&email, now).await?;
        }
        debug!(%email, campaign, %status, "Recorded send attempt");

        Ok(outcome)
    }
}

/// Lower-cased, trimmed form used as the history key, even for malformed input.
fn normalized(email: &str) -> String {
    email.trim().to_lowercase()
}
