//! Minimum interval between two sends to the same address.
//!
//! Tracked per exact address. Two contacts on one business domain have
//! independent cooldowns.

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info};

use crate::contacts::ContactRepository;
use crate::history::HistoryRepository;
use crate::{Error, Result};

/// Default cooldown, in days.
pub const DEFAULT_MIN_INTERVAL_DAYS: i64 = 14;

/// Largest day count accepted for a cooldown or a forced override.
pub const MAX_INTERVAL_DAYS: i64 = 36_500;

/// Converts a day count into a duration.
///
/// # Errors
///
/// Returns [`Error::InvalidDays`] if `days` is negative or larger than
/// [`MAX_INTERVAL_DAYS`].
pub fn interval_from_days(days: i64) -> Result<Duration> {
    if !(0..=MAX_INTERVAL_DAYS).contains(&days) {
        return Err(Error::InvalidDays(days));
    }
    Duration::try_days(days).ok_or(Error::InvalidDays(days))
}

fn days_before(now: DateTime<Utc>, days: i64) -> Result<DateTime<Utc>> {
    now.checked_sub_signed(interval_from_days(days)?)
        .ok_or(Error::InvalidDays(days))
}

/// Returns true if a send at `last_sent` still blocks a send at `now`.
///
/// Never sent means never blocked.
#[must_use]
pub fn within_cooldown(
    last_sent: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
    min_interval: Duration,
) -> bool {
    last_sent.is_some_and(|last| now - last < min_interval)
}

/// Answers cooldown questions from stored send timestamps.
#[derive(Debug, Clone)]
pub struct FrequencyTracker {
    contacts: ContactRepository,
    history: HistoryRepository,
    min_interval: Duration,
}

impl FrequencyTracker {
    /// Creates a tracker with the given cooldown.
    #[must_use]
    pub const fn new(
        contacts: ContactRepository,
        history: HistoryRepository,
        min_interval: Duration,
    ) -> Self {
        Self {
            contacts,
            history,
            min_interval,
        }
    }

    /// The configured cooldown.
    #[must_use]
    pub const fn min_interval(&self) -> Duration {
        self.min_interval
    }

    /// Last successful send to `email`.
    ///
    /// Master-list contacts answer from `last_email_sent`; other addresses
    /// fall back to the newest `sent` history entry.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn last_sent(&self, email: &str) -> Result<Option<DateTime<Utc>>> {
        match self.contacts.get(email).await? {
            Some(contact) => Ok(contact.last_email_sent),
            None => self.history.last_sent(email).await,
        }
    }

    /// Returns true if `email` was sent to less than the cooldown ago.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn is_within_cooldown(&self, email: &str, now: DateTime<Utc>) -> Result<bool> {
        let last_sent = self.last_sent(email).await?;
        let blocked = within_cooldown(last_sent, now, self.min_interval);
        if blocked {
            debug!(%email, ?last_sent, "Inside cooldown window");
        }
        Ok(blocked)
    }

    /// Move the stored send timestamp forward after a successful send.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn record_send(&self, email: &str, sent_at: DateTime<Utc>) -> Result<()> {
        self.contacts.advance_last_sent(email, sent_at).await?;
        Ok(())
    }

    /// Debug override: set a contact's last send to `days_ago` days before `now`.
    ///
    /// Bypasses every other rule, including forward-only movement.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ContactNotFound`] if the address is not in the master
    /// list, [`Error::InvalidDays`] if `days_ago` is out of range, or an error
    /// if the database query fails.
    pub async fn force_last_sent(
        &self,
        email: &str,
        days_ago: i64,
        now: DateTime<Utc>,
    ) -> Result<DateTime<Utc>> {
        let when = days_before(now, days_ago)?;
        if !self.contacts.force_last_sent(email, when).await? {
            return Err(Error::ContactNotFound(email.to_string()));
        }
        info!(%email, days_ago, %when, "Forced last send date");
        Ok(when)
    }

    /// Debug override for every contact that has been emailed.
    ///
    /// Returns the number of contacts changed.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidDays`] if `days_ago` is out of range, or an
    /// error if the database query fails.
    pub async fn force_all_last_sent(&self, days_ago: i64, now: DateTime<Utc>) -> Result<u64> {
        let when = days_before(now, days_ago)?;
        let changed = self.contacts.force_all_last_sent(when).await?;
        info!(changed, days_ago, %when, "Forced last send date on emailed contacts");
        Ok(changed)
    }
}
