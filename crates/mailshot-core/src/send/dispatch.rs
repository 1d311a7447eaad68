//! One send run over a campaign's recipient list.

use tracing::{error, info, warn};

use super::gate::{Eligibility, SendEligibilityGate};
use crate::campaigns::{CampaignRepository, CampaignStatus};
use crate::delivery::{Delivery, MessageTemplate};
use crate::stats::{Outcome, Tally};
use crate::time::Clock;
use crate::{Error, Result};

/// Result of one send run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendReport {
    /// Campaign name.
    pub name: String,
    /// Per-recipient outcome counts.
    pub tally: Tally,
    /// Campaign status after the run.
    pub status: CampaignStatus,
}

impl SendReport {
    /// Number of messages the provider accepted.
    #[must_use]
    pub fn sent(&self) -> u64 {
        self.tally.count(Outcome::Sent)
    }

    /// Number of attempts the provider did not accept.
    #[must_use]
    pub fn failed(&self) -> u64 {
        self.tally.count(Outcome::DeliveryFailure)
    }

    /// Number of recipients skipped by the eligibility gate.
    #[must_use]
    pub fn skipped(&self) -> u64 {
        self.tally.rejected()
    }
}

/// Walks a campaign's recipients in order, gating and delivering each one.
///
/// Recipients are processed sequentially. A delivery failure is recorded and
/// the run continues; a storage error aborts the run and marks the campaign
/// `failed` so it can be resumed.
pub struct CampaignDispatcher<'a, D, C> {
    campaigns: CampaignRepository,
    gate: &'a SendEligibilityGate,
    delivery: &'a D,
    template: &'a MessageTemplate,
    clock: &'a C,
}

impl<'a, D: Delivery, C: Clock> CampaignDispatcher<'a, D, C> {
    /// Creates a dispatcher.
    #[must_use]
    pub const fn new(
        campaigns: CampaignRepository,
        gate: &'a SendEligibilityGate,
        delivery: &'a D,
        template: &'a MessageTemplate,
        clock: &'a C,
    ) -> Self {
        Self {
            campaigns,
            gate,
            delivery,
            template,
            clock,
        }
    }

    /// Send campaign `name`.
    ///
    /// Recipients already sent to by an earlier, interrupted run are caught
    /// by the cooldown check and skipped.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CampaignNotFound`] or [`Error::InvalidStatus`] before
    /// anything is sent, or a storage error that aborted the run.
    pub async fn run(&self, name: &str) -> Result<SendReport> {
        let campaign = self
            .campaigns
            .get(name)
            .await?
            .ok_or_else(|| Error::CampaignNotFound(name.to_string()))?;

        if !campaign.status.can_send() {
            return Err(Error::InvalidStatus {
                name: name.to_string(),
                status: campaign.status,
            });
        }

        if campaign.recipients.is_empty() {
            warn!(campaign = name, "Campaign has no recipients, nothing to send");
            return Ok(SendReport {
                name: name.to_string(),
                tally: Tally::new(),
                status: campaign.status,
            });
        }

        self.campaigns
            .set_status(name, CampaignStatus::Sending)
            .await?;
        info!(
            campaign = name,
            recipients = campaign.recipients.len(),
            "Sending campaign"
        );

        let mut tally = Tally::new();
        match self.send_all(name, &campaign.recipients, &mut tally).await {
            Ok(()) => {
                let status = if tally.count(Outcome::DeliveryFailure) > 0 {
                    CampaignStatus::CompletedWithErrors
                } else {
                    CampaignStatus::Completed
                };
                self.campaigns
                    .finish_send(name, status, &tally, self.clock.now())
                    .await?;

                info!(
                    campaign = name,
                    sent = tally.count(Outcome::Sent),
                    failed = tally.count(Outcome::DeliveryFailure),
                    skipped = tally.rejected(),
                    %status,
                    "Campaign send finished"
                );
                Ok(SendReport {
                    name: name.to_string(),
                    tally,
                    status,
                })
            }
            Err(e) => {
                error!(campaign = name, error = %e, "Send run aborted");
                if let Err(mark) = self
                    .campaigns
                    .finish_send(name, CampaignStatus::Failed, &tally, self.clock.now())
                    .await
                {
                    error!(campaign = name, error = %mark, "Could not mark campaign failed");
                }
                Err(e)
            }
        }
    }

    async fn send_all(&self, name: &str, recipients: &[String], tally: &mut Tally) -> Result<()> {
        for email in recipients {
            let now = self.clock.now();
            match self.gate.check(email, now).await? {
                Eligibility::Skipped(reason) => {
                    self.gate.record_skip(email, name, reason, now).await?;
                    tally.record(reason);
                }
                Eligibility::Eligible => {
                    let result = self.delivery.deliver(&self.template.to(email.as_str())).await;
                    let outcome = self
                        .gate
                        .record_attempt(email, name, &result, self.clock.now())
                        .await?;
                    tally.record(outcome);
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::HashSet;
    use std::sync::Mutex;

    use chrono::{Duration, TimeZone, Utc};

    use super::*;
    use crate::Store;
    use crate::campaigns::CampaignBuilder;
    use crate::contacts::ContactCandidate;
    use crate::delivery::{DeliveryResult, OutgoingEmail};
    use crate::send::FrequencyTracker;
    use crate::stats::Rejection;
    use crate::time::ManualClock;

    #[derive(Default)]
    struct Recorder {
        sent: Mutex<Vec<String>>,
        failing: HashSet<String>,
    }

    impl Delivery for Recorder {
        async fn deliver(&self, email: &OutgoingEmail) -> DeliveryResult {
            self.sent.lock().unwrap().push(email.to.clone());
            if self.failing.contains(&email.to) {
                DeliveryResult::Failed("Status code: 500".into())
            } else {
                DeliveryResult::Delivered
            }
        }
    }

    fn gate(store: &Store) -> SendEligibilityGate {
        let frequency =
            FrequencyTracker::new(store.contacts(), store.history(), Duration::days(14));
        SendEligibilityGate::new(
            store.unsubscribes(),
            store.customers(),
            store.history(),
            frequency,
        )
    }

    async fn build(store: &Store, name: &str, emails: &[&str]) {
        let classifier = store.provider_domains().load_classifier().await.unwrap();
        let candidates: Vec<_> = emails
            .iter()
            .map(|e| ContactCandidate::new(*e, "test"))
            .collect();
        CampaignBuilder::new(store.campaigns(), store.customers(), &classifier)
            .build(name, &candidates, Utc::now())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_run_counts_each_outcome() {
        let store = Store::in_memory().await.unwrap();
        let clock = ManualClock::new(Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap());
        build(&store, "spring", &["a@one.com", "b@two.com", "c@three.com"]).await;
        store
            .unsubscribes()
            .add("c@three.com", "manual", clock.now())
            .await
            .unwrap();

        let gate = gate(&store);
        let delivery = Recorder {
            failing: HashSet::from(["b@two.com".to_string()]),
            ..Recorder::default()
        };
        let template = MessageTemplate::new("me@vendor.com", "Hi", "Hello");
        let dispatcher =
            CampaignDispatcher::new(store.campaigns(), &gate, &delivery, &template, &clock);

        let report = dispatcher.run("spring").await.unwrap();
        assert_eq!(report.sent(), 1);
        assert_eq!(report.failed(), 1);
        assert_eq!(report.tally.count(Rejection::Unsubscribed), 1);
        assert_eq!(report.status, CampaignStatus::CompletedWithErrors);
        assert_eq!(
            *delivery.sent.lock().unwrap(),
            vec!["a@one.com", "b@two.com"]
        );

        let stored = store.campaigns().get("spring").await.unwrap().unwrap();
        assert_eq!(stored.status, CampaignStatus::CompletedWithErrors);
        assert_eq!(stored.send_stats, Some(report.tally));
        assert_eq!(stored.completed_at, Some(clock.now()));
    }

    #[tokio::test]
    async fn test_completed_campaign_is_not_resent() {
        let store = Store::in_memory().await.unwrap();
        let clock = ManualClock::new(Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap());
        build(&store, "spring", &["a@one.com"]).await;

        let gate = gate(&store);
        let delivery = Recorder::default();
        let template = MessageTemplate::new("me@vendor.com", "Hi", "Hello");
        let dispatcher =
            CampaignDispatcher::new(store.campaigns(), &gate, &delivery, &template, &clock);

        let report = dispatcher.run("spring").await.unwrap();
        assert_eq!(report.status, CampaignStatus::Completed);

        let err = dispatcher.run("spring").await.unwrap_err();
        assert!(matches!(
            err,
            Error::InvalidStatus {
                status: CampaignStatus::Completed,
                ..
            }
        ));
        assert!(matches!(
            dispatcher.run("missing").await.unwrap_err(),
            Error::CampaignNotFound(_)
        ));
    }

    #[tokio::test]
    async fn test_empty_campaign_sends_nothing() {
        let store = Store::in_memory().await.unwrap();
        let clock = ManualClock::new(Utc::now());
        build(&store, "empty", &["not-an-address"]).await;

        let gate = gate(&store);
        let delivery = Recorder::default();
        let template = MessageTemplate::new("me@vendor.com", "Hi", "Hello");
        let dispatcher =
            CampaignDispatcher::new(store.campaigns(), &gate, &delivery, &template, &clock);

        let report = dispatcher.run("empty").await.unwrap();
        assert_eq!(report.tally.total(), 0);
        assert_eq!(report.status, CampaignStatus::Ready);
        assert!(delivery.sent.lock().unwrap().is_empty());
    }
}
