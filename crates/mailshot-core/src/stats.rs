//! Per-record outcomes and the per-run statistics accumulator.

use std::collections::BTreeMap;
use std::fmt;

use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer, de};

/// Reason a record was turned away by one of the engine's rule sets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Rejection {
    /// Malformed address.
    FormatError,
    /// Identical address already present in the relevant scope.
    ExactDuplicate,
    /// Another address already occupies this business domain.
    DomainConflict,
    /// Domain belongs to a current customer.
    ExistingCustomer,
    /// Address has unsubscribed.
    Unsubscribed,
    /// Address was emailed inside the cooldown window.
    FrequencyBlocked,
}

impl Rejection {
    /// Human-readable reason, used as history detail.
    #[must_use]
    pub const fn describe(&self) -> &'static str {
        match self {
            Self::FormatError => "Invalid email format",
            Self::ExactDuplicate => "Duplicate email",
            Self::DomainConflict => "Domain already has a contact",
            Self::ExistingCustomer => "Existing customer",
            Self::Unsubscribed => "Unsubscribed",
            Self::FrequencyBlocked => "Frequency limit",
        }
    }
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.describe())
    }
}

/// Every outcome a batch operation can attribute a record to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    /// Contact entered the master list.
    Admitted,
    /// Address entered a campaign's recipient list.
    Included,
    /// Email was handed to and accepted by the delivery provider.
    Sent,
    /// Delivery provider reported a failure.
    DeliveryFailure,
    /// Record was rejected or skipped.
    Rejected(Rejection),
}

impl From<Rejection> for Outcome {
    fn from(reason: Rejection) -> Self {
        Self::Rejected(reason)
    }
}

impl Outcome {
    /// Every outcome, in label order of the stored snapshot.
    pub const ALL: [Self; 10] = [
        Self::Admitted,
        Self::Included,
        Self::Sent,
        Self::DeliveryFailure,
        Self::Rejected(Rejection::FormatError),
        Self::Rejected(Rejection::ExactDuplicate),
        Self::Rejected(Rejection::DomainConflict),
        Self::Rejected(Rejection::ExistingCustomer),
        Self::Rejected(Rejection::Unsubscribed),
        Self::Rejected(Rejection::FrequencyBlocked),
    ];

    /// Stable label, used as the map key in stored snapshots.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Admitted => "admitted",
            Self::Included => "included",
            Self::Sent => "sent",
            Self::DeliveryFailure => "delivery_failure",
            Self::Rejected(Rejection::FormatError) => "rejected:format_error",
            Self::Rejected(Rejection::ExactDuplicate) => "rejected:exact_duplicate",
            Self::Rejected(Rejection::DomainConflict) => "rejected:domain_conflict",
            Self::Rejected(Rejection::ExistingCustomer) => "rejected:existing_customer",
            Self::Rejected(Rejection::Unsubscribed) => "rejected:unsubscribed",
            Self::Rejected(Rejection::FrequencyBlocked) => "rejected:frequency_blocked",
        }
    }

    /// Parse a stored label.
    #[must_use]
    pub fn from_label(label: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|outcome| outcome.label() == label)
    }
}

/// Counts of outcomes for one run.
///
/// Each batch operation owns its own tally and returns it to the caller.
/// Stored as a flat JSON object of label to count; `{}` is an empty tally.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Tally {
    counts: BTreeMap<Outcome, u64>,
}

impl Tally {
    /// Creates an empty tally.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Counts one record.
    pub fn record(&mut self, outcome: impl Into<Outcome>) {
        *self.counts.entry(outcome.into()).or_insert(0) += 1;
    }

    /// Number of records attributed to `outcome`.
    #[must_use]
    pub fn count(&self, outcome: impl Into<Outcome>) -> u64 {
        self.counts.get(&outcome.into()).copied().unwrap_or(0)
    }

    /// Number of records counted so far.
    #[must_use]
    pub fn total(&self) -> u64 {
        self.counts.values().sum()
    }

    /// Number of rejected or skipped records.
    #[must_use]
    pub fn rejected(&self) -> u64 {
        self.counts
            .iter()
            .filter(|(outcome, _)| matches!(outcome, Outcome::Rejected(_)))
            .map(|(_, v)| v)
            .sum()
    }

    /// Iterates over non-zero counts, keyed by outcome label.
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, u64)> + '_ {
        self.counts.iter().map(|(k, v)| (k.label(), *v))
    }
}

impl Serialize for Tally {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.counts.len()))?;
        for (label, count) in self.iter() {
            map.serialize_entry(label, &count)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for Tally {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let labels = BTreeMap::<String, u64>::deserialize(deserializer)?;
        let counts = labels
            .into_iter()
            .map(|(label, count)| {
                Outcome::from_label(&label)
                    .map(|outcome| (outcome, count))
                    .ok_or_else(|| {
                        <D::Error as de::Error>::custom(format!("unknown outcome '{label}'"))
                    })
            })
            .collect::<Result<_, _>>()?;
        Ok(Self { counts })
    }
}
