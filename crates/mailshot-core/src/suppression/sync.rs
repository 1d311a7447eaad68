//! Import of the delivery provider's unsubscribe list.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use super::repository::UnsubscribeRepository;
use crate::Result;
use crate::domain::EmailAddress;

/// Result of one unsubscribe sync.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    /// Addresses newly recorded.
    pub added: u64,
    /// Upstream addresses already recorded.
    pub unchanged: u64,
    /// Upstream entries that are not valid addresses.
    pub invalid: u64,
    /// Local records the provider no longer lists. They stay recorded.
    pub stale: u64,
}

/// Record every upstream unsubscribe that is not yet known locally.
///
/// Local records missing upstream are counted as stale and kept: an
/// unsubscribe is permanent once recorded.
///
/// # Errors
///
/// Returns an error if a database query fails.
pub async fn sync_unsubscribes(
    upstream: &HashSet<String>,
    repo: &UnsubscribeRepository,
    source: &str,
    now: DateTime<Utc>,
) -> Result<SyncReport> {
    let mut report = SyncReport::default();
    let mut normalized = HashSet::with_capacity(upstream.len());

    for raw in upstream {
        let Ok(address) = EmailAddress::parse(raw) else {
            warn!(entry = %raw, "Ignoring invalid upstream unsubscribe");
            report.invalid += 1;
            continue;
        };

        if repo.add(address.as_str(), source, now).await? {
            report.added += 1;
        } else {
            report.unchanged += 1;
        }
        normalized.insert(address.into_string());
    }

    let local = repo.emails().await?;
    report.stale = local.difference(&normalized).count() as u64;

    info!(
        added = report.added,
        unchanged = report.unchanged,
        invalid = report.invalid,
        stale = report.stale,
        total = local.len(),
        "Unsubscribe sync complete"
    );

    Ok(report)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::Store;

    #[tokio::test]
    async fn test_sync_adds_and_never_removes() {
        let store = Store::in_memory().await.unwrap();
        let repo = store.unsubscribes();
        let now = Utc::now();

        repo.add("old@example.com", "manual", now).await.unwrap();
        repo.add("kept@example.com", "manual", now).await.unwrap();

        let upstream: HashSet<String> = ["KEPT@example.com", "new@example.com", "garbage"]
            .into_iter()
            .map(String::from)
            .collect();

        let report = sync_unsubscribes(&upstream, &repo, "sendgrid", now)
            .await
            .unwrap();

        assert_eq!(
            report,
            SyncReport {
                added: 1,
                unchanged: 1,
                invalid: 1,
                stale: 1,
            }
        );
        assert!(repo.contains("old@example.com").await.unwrap());
        assert!(repo.contains("new@example.com").await.unwrap());
    }
}
