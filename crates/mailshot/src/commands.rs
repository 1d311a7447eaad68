//! Subcommand handlers.

use std::io::{self, Write};
use std::path::Path;

use anyhow::{Context, bail};
use mailshot_core::{
    Batch, CampaignBuilder, CampaignDispatcher, Clock, ContactRegistry, EmailAddress,
    FrequencyTracker, SendEligibilityGate, SendGridClient, Store, SystemClock, Tally,
    interval_from_days, load_batch, sync_unsubscribes,
};
use tracing::info;

use crate::config::Config;

/// Source tag for records entered by hand.
const MANUAL_SOURCE: &str = "manual";

/// Source tag for the provider's suppression list.
const SENDGRID_SOURCE: &str = "sendgrid";

fn print_tally(tally: &Tally) {
    for (label, count) in tally.iter() {
        println!("  {label:<28} {count}");
    }
    println!("  {:<28} {}", "total", tally.total());
}

fn print_skipped(batch: &Batch) {
    if batch.missing_email > 0 {
        println!("  {:<28} {}", "missing email", batch.missing_email);
    }
    if batch.malformed > 0 {
        println!("  {:<28} {}", "malformed record", batch.malformed);
    }
}

fn tracker(store: &Store, interval_days: i64) -> anyhow::Result<FrequencyTracker> {
    let interval = interval_from_days(interval_days)
        .with_context(|| format!("invalid cooldown of {interval_days} days"))?;
    Ok(FrequencyTracker::new(store.contacts(), store.history(), interval))
}

fn sendgrid(config: &Config) -> anyhow::Result<SendGridClient> {
    Ok(SendGridClient::new(config.api_key()?).with_base_url(&config.sendgrid_base_url))
}

/// Admit a batch file into the master contact list.
pub async fn import(store: &Store, file: &Path, source: &str, refresh: bool) -> anyhow::Result<()> {
    let batch = load_batch(file, source)
        .with_context(|| format!("loading batch {}", file.display()))?;
    let classifier = store.provider_domains().load_classifier().await?;
    let registry = ContactRegistry::new(store.contacts(), &classifier);

    let report = registry
        .admit_batch(&batch.candidates, SystemClock.now(), refresh)
        .await?;

    println!("Imported {}", file.display());
    print_tally(&report.tally);
    print_skipped(&batch);
    if refresh {
        println!("  {:<28} {}", "refreshed", report.refreshed);
    }
    Ok(())
}

/// Build a campaign from a batch file.
pub async fn build(store: &Store, campaign: &str, file: &Path, source: &str) -> anyhow::Result<()> {
    let batch = load_batch(file, source)
        .with_context(|| format!("loading batch {}", file.display()))?;
    let classifier = store.provider_domains().load_classifier().await?;
    let builder = CampaignBuilder::new(store.campaigns(), store.customers(), &classifier);

    let report = builder
        .build(campaign, &batch.candidates, SystemClock.now())
        .await?;

    println!(
        "Campaign '{}' built with {} recipients",
        report.name,
        report.recipients.len()
    );
    print_tally(&report.tally);
    print_skipped(&batch);
    Ok(())
}

/// Run the eligibility gate and send a campaign.
pub async fn send(
    store: &Store,
    config: &Config,
    campaign: &str,
    frequency_days: Option<i64>,
) -> anyhow::Result<()> {
    let template = config.template()?;
    let client = sendgrid(config)?;
    let interval_days = frequency_days.unwrap_or(config.min_interval_days);

    let gate = SendEligibilityGate::new(
        store.unsubscribes(),
        store.customers(),
        store.history(),
        tracker(store, interval_days)?,
    );
    let clock = SystemClock;
    let dispatcher = CampaignDispatcher::new(store.campaigns(), &gate, &client, &template, &clock);

    info!(campaign, interval_days, "Starting send run");
    let report = dispatcher.run(campaign).await?;

    println!("Campaign '{}' is now {}", report.name, report.status);
    print_tally(&report.tally);
    Ok(())
}

/// Debug override for the last-send timestamp.
pub async fn set_last_sent(
    store: &Store,
    config: &Config,
    email: Option<&str>,
    days: i64,
) -> anyhow::Result<()> {
    let tracker = tracker(store, config.min_interval_days)?;
    let now = SystemClock.now();

    match email {
        Some(email) => {
            let when = tracker.force_last_sent(email, days, now).await?;
            println!("Set last send for {email} to {when}");
        }
        None => {
            let changed = tracker.force_all_last_sent(days, now).await?;
            println!("Set last send to {days} days ago for {changed} contacts");
        }
    }
    Ok(())
}

/// Pull the provider's unsubscribe list into the local store.
pub async fn sync(store: &Store, config: &Config) -> anyhow::Result<()> {
    let client = sendgrid(config)?;
    let upstream = client
        .fetch_unsubscribes()
        .await
        .context("fetching unsubscribes from SendGrid")?;

    let report = sync_unsubscribes(
        &upstream,
        &store.unsubscribes(),
        SENDGRID_SOURCE,
        SystemClock.now(),
    )
    .await?;

    println!("Unsubscribe sync complete");
    println!("  {:<28} {}", "added", report.added);
    println!("  {:<28} {}", "unchanged", report.unchanged);
    println!("  {:<28} {}", "invalid", report.invalid);
    println!("  {:<28} {}", "no longer listed upstream", report.stale);
    Ok(())
}

/// Record a manual unsubscribe.
pub async fn unsubscribe(store: &Store, email: &str) -> anyhow::Result<()> {
    let address = EmailAddress::parse(email).with_context(|| format!("invalid address {email}"))?;
    if store
        .unsubscribes()
        .add(address.as_str(), MANUAL_SOURCE, SystemClock.now())
        .await?
    {
        println!("Unsubscribed {address}");
    } else {
        println!("{address} was already unsubscribed");
    }
    Ok(())
}

/// Add a domain to the provider set.
pub async fn add_provider(store: &Store, domain: &str) -> anyhow::Result<()> {
    let domain = validated_domain(domain)?;
    if store
        .provider_domains()
        .add(&domain, SystemClock.now())
        .await?
    {
        println!("Added provider domain {domain}");
    } else {
        println!("{domain} is already a provider domain");
    }
    Ok(())
}

/// Record a customer domain.
pub async fn add_customer(store: &Store, domain: &str, source: &str) -> anyhow::Result<()> {
    let domain = validated_domain(domain)?;
    if store
        .customers()
        .add(&domain, source, SystemClock.now())
        .await?
    {
        println!("Added customer domain {domain}");
    } else {
        println!("{domain} is already a customer domain");
    }
    Ok(())
}

/// Flag a master-list contact as inactive.
pub async fn deactivate(store: &Store, email: &str) -> anyhow::Result<()> {
    let classifier = store.provider_domains().load_classifier().await?;
    ContactRegistry::new(store.contacts(), &classifier)
        .deactivate(&email.trim().to_lowercase())
        .await?;
    println!("Deactivated {email}");
    Ok(())
}

/// Remove every campaign record. Send history is kept.
pub async fn delete_campaigns(store: &Store, force: bool) -> anyhow::Result<()> {
    let campaigns = store.campaigns().list().await?;
    if campaigns.is_empty() {
        println!("No campaigns to delete.");
        return Ok(());
    }

    println!("Campaigns:");
    for campaign in &campaigns {
        println!("  {} ({})", campaign.name, campaign.status);
    }

    if !force {
        print!("Delete all {} campaigns? [y/N] ", campaigns.len());
        io::stdout().flush()?;

        let mut input = String::new();
        io::stdin().read_line(&mut input)?;

        if !matches!(input.trim().to_lowercase().as_str(), "y" | "yes") {
            println!("Cancelled.");
            return Ok(());
        }
    }

    let deleted = store.campaigns().delete_all().await?;
    println!("Deleted {deleted} campaigns");
    Ok(())
}

/// Normalizes a bare domain, reusing address validation for its rules.
fn validated_domain(domain: &str) -> anyhow::Result<String> {
    let domain = domain.trim().trim_start_matches('@');
    match EmailAddress::parse(&format!("postmaster@{domain}")) {
        Ok(address) => Ok(address.domain().to_string()),
        Err(e) => bail!("invalid domain {domain}: {e}"),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_validated_domain() {
        assert_eq!(validated_domain(" Acme.COM ").unwrap(), "acme.com");
        assert_eq!(validated_domain("@gmail.com").unwrap(), "gmail.com");
        assert!(validated_domain("").is_err());
        assert!(validated_domain("no spaces.com").is_err());
    }

    #[tokio::test]
    async fn test_manual_records() {
        let store = Store::in_memory().await.unwrap();

        unsubscribe(&store, "Gone@Example.com").await.unwrap();
        add_customer(&store, "Customer.com", MANUAL_SOURCE).await.unwrap();
        add_provider(&store, "mail.example").await.unwrap();

        assert!(store.unsubscribes().contains("gone@example.com").await.unwrap());
        assert!(store.customers().contains_domain("customer.com").await.unwrap());
        assert!(
            store
                .provider_domains()
                .list()
                .await
                .unwrap()
                .contains(&"mail.example".to_string())
        );
        assert!(unsubscribe(&store, "not-an-address").await.is_err());
    }

    #[tokio::test]
    async fn test_set_last_sent_rejects_huge_day_counts() {
        let store = Store::in_memory().await.unwrap();
        let config = Config::default();

        assert!(
            set_last_sent(&store, &config, None, 1_000_000_000_000)
                .await
                .is_err()
        );

        let config = Config {
            min_interval_days: i64::MAX,
            ..Config::default()
        };
        assert!(tracker(&store, config.min_interval_days).is_err());
    }

    #[tokio::test]
    async fn test_forced_delete() {
        let store = Store::in_memory().await.unwrap();
        store
            .campaigns()
            .create("june", &[], &Tally::new(), SystemClock.now())
            .await
            .unwrap();

        delete_campaigns(&store, true).await.unwrap();
        assert!(store.campaigns().list().await.unwrap().is_empty());
    }
}
