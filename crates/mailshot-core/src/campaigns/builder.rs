//! Campaign-scoped recipient selection.
//!
//! These rules are looser than master-list admission: an address already in
//! another campaign may be selected again, and only addresses selected for
//! *this* campaign count as duplicates or domain conflicts.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use super::repository::CampaignRepository;
use crate::contacts::ContactCandidate;
use crate::domain::{DomainClass, DomainClassifier};
use crate::stats::{Outcome, Rejection, Tally};
use crate::suppression::CustomerRepository;
use crate::{Error, Result};

/// Result of offering one candidate to a campaign.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Inclusion {
    /// Address was added to the recipient list.
    Included,
    /// Address was left out.
    Rejected(Rejection),
}

impl From<Inclusion> for Outcome {
    fn from(inclusion: Inclusion) -> Self {
        match inclusion {
            Inclusion::Included => Self::Included,
            Inclusion::Rejected(reason) => Self::Rejected(reason),
        }
    }
}

/// Result of building one campaign.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildReport {
    /// Campaign name.
    pub name: String,
    /// Accepted recipients, in batch order.
    pub recipients: Vec<String>,
    /// Outcome counts, one per candidate. Stored with the campaign.
    pub tally: Tally,
}

impl BuildReport {
    /// A campaign with no recipients is created but sends nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.recipients.is_empty()
    }
}

/// Selection state for one campaign under construction.
#[derive(Debug, Default)]
struct Selection {
    emails: HashSet<String>,
    business_domains: HashMap<String, String>,
    ordered: Vec<String>,
}

/// Builds campaigns from candidate batches.
pub struct CampaignBuilder<'a> {
    campaigns: CampaignRepository,
    customers: CustomerRepository,
    classifier: &'a DomainClassifier,
}

impl<'a> CampaignBuilder<'a> {
    /// Creates a builder.
    #[must_use]
    pub const fn new(
        campaigns: CampaignRepository,
        customers: CustomerRepository,
        classifier: &'a DomainClassifier,
    ) -> Self {
        Self {
            campaigns,
            customers,
            classifier,
        }
    }

    /// Build and persist a campaign named `name` from `candidates`.
    ///
    /// Each candidate passes format validation, the existing-customer check
    /// and campaign-scoped dedup, in that order. The campaign is stored as
    /// `ready` even if no candidate was accepted.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NameConflict`] before processing any candidate if the
    /// name is taken, or an error if a database query fails. Nothing is
    /// stored for a build that fails, so the name can be used again.
    pub async fn build(
        &self,
        name: &str,
        candidates: &[ContactCandidate],
        now: DateTime<Utc>,
    ) -> Result<BuildReport> {
        if self.campaigns.exists(name).await? {
            warn!(campaign = name, "Campaign name already in use");
            return Err(Error::NameConflict(name.to_string()));
        }

        let mut selection = Selection::default();
        let mut tally = Tally::new();

        for candidate in candidates {
            let inclusion = self.consider(&mut selection, candidate).await?;
            tally.record(inclusion);
        }

        self.campaigns
            .create(name, &selection.ordered, &tally, now)
            .await?;

        if selection.ordered.is_empty() {
            warn!(campaign = name, "Campaign built with no recipients");
        }
        info!(
            campaign = name,
            processed = tally.total(),
            recipients = selection.ordered.len(),
            rejected = tally.rejected(),
            "Campaign built"
        );

        Ok(BuildReport {
            name: name.to_string(),
            recipients: selection.ordered,
            tally,
        })
    }

    async fn consider(
        &self,
        selection: &mut Selection,
        candidate: &ContactCandidate,
    ) -> Result<Inclusion> {
        let Ok((address, class)) = self.classifier.classify_str(&candidate.email) else {
            debug!(email = %candidate.email, "Skipped malformed address");
            return Ok(Inclusion::Rejected(Rejection::FormatError));
        };

        if self.customers.contains_domain(address.domain()).await? {
            debug!(email = %address, "Skipped existing customer");
            return Ok(Inclusion::Rejected(Rejection::ExistingCustomer));
        }

        if selection.emails.contains(address.as_str()) {
            debug!(email = %address, "Skipped duplicate within campaign");
            return Ok(Inclusion::Rejected(Rejection::ExactDuplicate));
        }

        if class == DomainClass::Business {
            if let Some(selected) = selection.business_domains.get(address.domain()) {
                debug!(email = %address, %selected, "Skipped second address on business domain");
                return Ok(Inclusion::Rejected(Rejection::DomainConflict));
            }
            selection
                .business_domains
                .insert(address.domain().to_string(), address.as_str().to_string());
        }

        selection.emails.insert(address.as_str().to_string());
        selection.ordered.push(address.into_string());
        Ok(Inclusion::Included)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::Store;
    use crate::campaigns::CampaignStatus;
    use sqlx::sqlite::SqlitePoolOptions;

    fn batch(emails: &[&str]) -> Vec<ContactCandidate> {
        emails
            .iter()
            .map(|e| ContactCandidate::new(*e, "test"))
            .collect()
    }

    async fn setup() -> (Store, DomainClassifier) {
        let store = Store::in_memory().await.unwrap();
        let classifier = store.provider_domains().load_classifier().await.unwrap();
        (store, classifier)
    }

    #[tokio::test]
    async fn test_campaign_scoped_dedup() {
        let (store, classifier) = setup().await;
        let builder = CampaignBuilder::new(store.campaigns(), store.customers(), &classifier);

        let report = builder
            .build(
                "spring",
                &batch(&[
                    "john@gmail.com",
                    "jane@gmail.com",
                    "JOHN@gmail.com",
                    "john@acme.com",
                    "jane@acme.com",
                    "john@acme.com",
                    "broken",
                ]),
                Utc::now(),
            )
            .await
            .unwrap();

        assert_eq!(
            report.recipients,
            vec!["john@gmail.com", "jane@gmail.com", "john@acme.com"]
        );
        assert_eq!(report.tally.count(Outcome::Included), 3);
        assert_eq!(report.tally.count(Rejection::ExactDuplicate), 2);
        assert_eq!(report.tally.count(Rejection::DomainConflict), 1);
        assert_eq!(report.tally.count(Rejection::FormatError), 1);

        let stored = store.campaigns().get("spring").await.unwrap().unwrap();
        assert_eq!(stored.status, CampaignStatus::Ready);
        assert_eq!(stored.recipients, report.recipients);
        assert_eq!(stored.build_stats, report.tally);
    }

    #[tokio::test]
    async fn test_same_address_allowed_across_campaigns() {
        let (store, classifier) = setup().await;
        let builder = CampaignBuilder::new(store.campaigns(), store.customers(), &classifier);
        let now = Utc::now();

        let first = builder
            .build("one", &batch(&["john@acme.com"]), now)
            .await
            .unwrap();
        let second = builder
            .build("two", &batch(&["john@acme.com"]), now)
            .await
            .unwrap();

        assert_eq!(first.recipients, vec!["john@acme.com"]);
        assert_eq!(second.recipients, vec!["john@acme.com"]);
    }

    #[tokio::test]
    async fn test_existing_customer_checked_for_provider_domains_too() {
        let (store, classifier) = setup().await;
        store
            .customers()
            .add("acme.com", "crm", Utc::now())
            .await
            .unwrap();
        store
            .customers()
            .add("gmail.com", "crm", Utc::now())
            .await
            .unwrap();
        let builder = CampaignBuilder::new(store.campaigns(), store.customers(), &classifier);

        let report = builder
            .build(
                "spring",
                &batch(&["john@acme.com", "jane@gmail.com", "bob@globex.com"]),
                Utc::now(),
            )
            .await
            .unwrap();

        assert_eq!(report.recipients, vec!["bob@globex.com"]);
        assert_eq!(report.tally.count(Rejection::ExistingCustomer), 2);
    }

    #[tokio::test]
    async fn test_name_conflict_leaves_campaign_untouched() {
        let (store, classifier) = setup().await;
        let builder = CampaignBuilder::new(store.campaigns(), store.customers(), &classifier);
        let now = Utc::now();

        builder
            .build("spring", &batch(&["john@acme.com"]), now)
            .await
            .unwrap();
        let err = builder
            .build("spring", &batch(&["bob@globex.com"]), now)
            .await
            .unwrap_err();

        assert!(matches!(err, Error::NameConflict(_)));
        let stored = store.campaigns().get("spring").await.unwrap().unwrap();
        assert_eq!(stored.recipients, vec!["john@acme.com"]);
    }

    #[tokio::test]
    async fn test_failed_build_leaves_name_free() {
        let (store, classifier) = setup().await;
        let unreachable = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        let broken = CampaignBuilder::new(
            store.campaigns(),
            CustomerRepository::new(unreachable),
            &classifier,
        );

        let err = broken
            .build("spring", &batch(&["john@acme.com"]), Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Database(_)));
        assert!(!store.campaigns().exists("spring").await.unwrap());
        assert!(store.campaigns().list().await.unwrap().is_empty());

        let builder = CampaignBuilder::new(store.campaigns(), store.customers(), &classifier);
        let report = builder
            .build("spring", &batch(&["john@acme.com"]), Utc::now())
            .await
            .unwrap();
        assert_eq!(report.recipients, vec!["john@acme.com"]);
    }

    #[tokio::test]
    async fn test_empty_campaign_is_created() {
        let (store, classifier) = setup().await;
        let builder = CampaignBuilder::new(store.campaigns(), store.customers(), &classifier);

        let report = builder
            .build("empty", &batch(&["nope"]), Utc::now())
            .await
            .unwrap();

        assert!(report.is_empty());
        let stored = store.campaigns().get("empty").await.unwrap().unwrap();
        assert_eq!(stored.status, CampaignStatus::Ready);
    }
}
