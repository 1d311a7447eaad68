//! Master-list admission rules.
//!
//! - An address may appear in the master list once.
//! - Provider domains admit any number of distinct addresses.
//! - A business domain holds at most one address.

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use super::model::{Contact, ContactCandidate};
use super::repository::ContactRepository;
use crate::domain::{DomainClass, DomainClassifier, EmailAddress};
use crate::stats::{Outcome, Rejection, Tally};
use crate::{Error, Result};

/// Result of offering one candidate to the master list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// Contact was stored.
    Admitted,
    /// Contact was turned away; nothing was stored.
    Rejected(Rejection),
}

impl From<Admission> for Outcome {
    fn from(admission: Admission) -> Self {
        match admission {
            Admission::Admitted => Self::Admitted,
            Admission::Rejected(reason) => Self::Rejected(reason),
        }
    }
}

/// Statistics for one imported batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AdmissionReport {
    /// Outcome counts, one per candidate.
    pub tally: Tally,
    /// Exact duplicates whose business metadata was refreshed.
    pub refreshed: u64,
}

/// Applies admission rules to the master contact list.
pub struct ContactRegistry<'a> {
    contacts: ContactRepository,
    classifier: &'a DomainClassifier,
}

impl<'a> ContactRegistry<'a> {
    /// Creates a registry over a contact repository.
    #[must_use]
    pub const fn new(contacts: ContactRepository, classifier: &'a DomainClassifier) -> Self {
        Self {
            contacts,
            classifier,
        }
    }

    /// Offer one candidate to the master list.
    ///
    /// Rejections are returned as values; only storage failures are errors.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn admit(&self, candidate: &ContactCandidate, now: DateTime<Utc>) -> Result<Admission> {
        let Ok((address, class)) = self.classifier.classify_str(&candidate.email) else {
            debug!(email = %candidate.email, "Rejected malformed address");
            return Ok(Admission::Rejected(Rejection::FormatError));
        };

        if self.contacts.exists(address.as_str()).await? {
            debug!(email = %address, "Rejected exact duplicate");
            return Ok(Admission::Rejected(Rejection::ExactDuplicate));
        }

        if class == DomainClass::Business
            && let Some(occupant) = self
                .contacts
                .domain_occupant(address.domain(), address.as_str())
                .await?
        {
            debug!(email = %address, %occupant, "Rejected business domain conflict");
            return Ok(Admission::Rejected(Rejection::DomainConflict));
        }

        let contact = Contact::new(&address, candidate.business.clone(), &candidate.source, now);
        self.contacts.insert(&contact).await?;
        debug!(email = %address, ?class, "Admitted contact");

        Ok(Admission::Admitted)
    }

    /// Offer a batch of candidates in order.
    ///
    /// With `refresh_existing`, exact duplicates still count as rejected but
    /// have their business metadata merged into the stored contact.
    ///
    /// # Errors
    ///
    /// Returns an error if a database query fails; candidates processed
    /// before the failure stay stored.
    pub async fn admit_batch(
        &self,
        candidates: &[ContactCandidate],
        now: DateTime<Utc>,
        refresh_existing: bool,
    ) -> Result<AdmissionReport> {
        let mut report = AdmissionReport::default();

        for candidate in candidates {
            let admission = self.admit(candidate, now).await?;
            if admission == Admission::Rejected(Rejection::ExactDuplicate)
                && refresh_existing
                && self.refresh(candidate).await?
            {
                report.refreshed += 1;
            }
            report.tally.record(admission);
        }

        info!(
            processed = report.tally.total(),
            admitted = report.tally.count(Outcome::Admitted),
            rejected = report.tally.rejected(),
            refreshed = report.refreshed,
            "Contact import finished"
        );

        Ok(report)
    }

    /// Merge a candidate's business metadata into the stored contact.
    ///
    /// Never changes the address, domain or send history. Returns `true` if
    /// the stored metadata changed.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn refresh(&self, candidate: &ContactCandidate) -> Result<bool> {
        let Ok(address) = EmailAddress::parse(&candidate.email) else {
            return Ok(false);
        };
        let Some(mut contact) = self.contacts.get(address.as_str()).await? else {
            return Ok(false);
        };

        if !contact.business.merge(&candidate.business) {
            return Ok(false);
        }
        self.contacts
            .update_business(&contact.email, &contact.business)
            .await
    }

    /// Flag a contact as inactive. Contacts are never deleted.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ContactNotFound`] if the address is not in the master
    /// list, or an error if the database query fails.
    pub async fn deactivate(&self, email: &str) -> Result<()> {
        if self.contacts.set_active(email, false).await? {
            info!(%email, "Deactivated contact");
            Ok(())
        } else {
            Err(Error::ContactNotFound(email.to_string()))
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::Store;
    use crate::contacts::BusinessInfo;

    async fn setup() -> (Store, DomainClassifier) {
        let store = Store::in_memory().await.unwrap();
        let classifier = store.provider_domains().load_classifier().await.unwrap();
        (store, classifier)
    }

    #[tokio::test]
    async fn test_provider_domain_admits_distinct_addresses() {
        let (store, classifier) = setup().await;
        let registry = ContactRegistry::new(store.contacts(), &classifier);
        let now = Utc::now();

        for email in ["john@gmail.com", "jane@gmail.com", "bob@gmail.com"] {
            let outcome = registry
                .admit(&ContactCandidate::new(email, "test"), now)
                .await
                .unwrap();
            assert_eq!(outcome, Admission::Admitted);
        }

        let outcome = registry
            .admit(&ContactCandidate::new("JOHN@gmail.com", "test"), now)
            .await
            .unwrap();
        assert_eq!(outcome, Admission::Rejected(Rejection::ExactDuplicate));
    }

    #[tokio::test]
    async fn test_business_domain_admits_one_address() {
        let (store, classifier) = setup().await;
        let registry = ContactRegistry::new(store.contacts(), &classifier);
        let now = Utc::now();

        let first = registry
            .admit(&ContactCandidate::new("john@acme.com", "test"), now)
            .await
            .unwrap();
        let second = registry
            .admit(&ContactCandidate::new("jane@acme.com", "test"), now)
            .await
            .unwrap();
        let again = registry
            .admit(&ContactCandidate::new("john@acme.com", "test"), now)
            .await
            .unwrap();

        assert_eq!(first, Admission::Admitted);
        assert_eq!(second, Admission::Rejected(Rejection::DomainConflict));
        assert_eq!(again, Admission::Rejected(Rejection::ExactDuplicate));
        assert!(store.contacts().get("jane@acme.com").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_malformed_address_is_format_error() {
        let (store, classifier) = setup().await;
        let registry = ContactRegistry::new(store.contacts(), &classifier);

        let outcome = registry
            .admit(&ContactCandidate::new("not-an-address", "test"), Utc::now())
            .await
            .unwrap();
        assert_eq!(outcome, Admission::Rejected(Rejection::FormatError));
        assert_eq!(store.contacts().count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_batch_tally_and_refresh() {
        let (store, classifier) = setup().await;
        let registry = ContactRegistry::new(store.contacts(), &classifier);
        let now = Utc::now();

        let batch = vec![
            ContactCandidate::new("john@acme.com", "batch1"),
            ContactCandidate::new("jane@acme.com", "batch1"),
            ContactCandidate::new("", "batch1"),
            ContactCandidate::new("john@acme.com", "batch1").with_business(BusinessInfo {
                business_name: Some("Acme Ltd".into()),
                ..BusinessInfo::default()
            }),
        ];

        let report = registry.admit_batch(&batch, now, true).await.unwrap();
        assert_eq!(report.tally.total(), 4);
        assert_eq!(report.tally.count(Outcome::Admitted), 1);
        assert_eq!(report.tally.count(Rejection::DomainConflict), 1);
        assert_eq!(report.tally.count(Rejection::FormatError), 1);
        assert_eq!(report.tally.count(Rejection::ExactDuplicate), 1);
        assert_eq!(report.refreshed, 1);

        let stored = store.contacts().get("john@acme.com").await.unwrap().unwrap();
        assert_eq!(stored.business.business_name.as_deref(), Some("Acme Ltd"));
        assert_eq!(stored.source, "batch1");
    }

    #[tokio::test]
    async fn test_inactive_contact_still_occupies_domain() {
        let (store, classifier) = setup().await;
        let registry = ContactRegistry::new(store.contacts(), &classifier);
        let now = Utc::now();

        registry
            .admit(&ContactCandidate::new("john@acme.com", "test"), now)
            .await
            .unwrap();
        registry.deactivate("john@acme.com").await.unwrap();

        let outcome = registry
            .admit(&ContactCandidate::new("jane@acme.com", "test"), now)
            .await
            .unwrap();
        assert_eq!(outcome, Admission::Rejected(Rejection::DomainConflict));

        assert!(matches!(
            registry.deactivate("ghost@acme.com").await,
            Err(Error::ContactNotFound(_))
        ));
    }
}
