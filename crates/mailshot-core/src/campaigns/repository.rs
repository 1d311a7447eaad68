//! Campaign storage repository.

use chrono::{DateTime, Utc};
use sqlx::Row;
use sqlx::sqlite::{SqlitePool, SqliteRow};
use tracing::debug;

use super::model::{Campaign, CampaignStatus};
use crate::stats::Tally;
use crate::{Error, Result, time};

/// Repository for campaigns and their recipient lists.
#[derive(Debug, Clone)]
pub struct CampaignRepository {
    pool: SqlitePool,
}

impl CampaignRepository {
    pub(crate) const fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Initialize database schema.
    pub(crate) async fn initialize(&self) -> Result<()> {
        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS campaigns (
                name TEXT PRIMARY KEY NOT NULL,
                status TEXT NOT NULL DEFAULT 'building',
                build_stats TEXT NOT NULL DEFAULT '{}',
                send_stats TEXT,
                created_at TEXT NOT NULL,
                completed_at TEXT
            )
            ",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_campaigns_status ON campaigns(status)")
            .execute(&self.pool)
            .await?;

        // Composite key keeps a recipient list free of duplicates
        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS campaign_recipients (
                campaign_name TEXT NOT NULL,
                position INTEGER NOT NULL,
                email TEXT NOT NULL,
                PRIMARY KEY (campaign_name, email)
            )
            ",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Returns true if a campaign with this name exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn exists(&self, name: &str) -> Result<bool> {
        let row = sqlx::query("SELECT 1 FROM campaigns WHERE name = ?")
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.is_some())
    }

    /// Store a built campaign with its recipient list and build statistics.
    ///
    /// The campaign row and every recipient are written in one transaction,
    /// so a failed build leaves no trace and the name stays free.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NameConflict`] if the name is taken, or an error if
    /// the database query fails, including when the list contains a
    /// duplicate address.
    pub async fn create(
        &self,
        name: &str,
        recipients: &[String],
        stats: &Tally,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            "INSERT INTO campaigns (name, status, build_stats, created_at) VALUES (?, 'ready', ?, ?)",
        )
        .bind(name)
        .bind(serde_json::to_string(stats)?)
        .bind(time::encode(now))
        .execute(&mut *tx)
        .await;

        match result {
            Ok(_) => {}
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
                return Err(Error::NameConflict(name.to_string()));
            }
            Err(e) => return Err(e.into()),
        }

        for (position, email) in recipients.iter().enumerate() {
            sqlx::query(
                "INSERT INTO campaign_recipients (campaign_name, position, email) VALUES (?, ?, ?)",
            )
            .bind(name)
            .bind(i64::try_from(position).unwrap_or(i64::MAX))
            .bind(email)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        debug!(campaign = name, recipients = recipients.len(), "Campaign ready");
        Ok(())
    }

    /// Get a campaign with its recipients.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails or the row is corrupt.
    pub async fn get(&self, name: &str) -> Result<Option<Campaign>> {
        let row = sqlx::query(
            r"
            SELECT name, status, build_stats, send_stats, created_at, completed_at
            FROM campaigns
            WHERE name = ?
            ",
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let mut campaign = row_to_campaign(&row)?;
        campaign.recipients = self.recipients(name).await?;
        Ok(Some(campaign))
    }

    /// Recipient list in selection order.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn recipients(&self, name: &str) -> Result<Vec<String>> {
        let rows = sqlx::query(
            "SELECT email FROM campaign_recipients WHERE campaign_name = ? ORDER BY position ASC",
        )
        .bind(name)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(|r| r.get("email")).collect())
    }

    /// Update a campaign's status.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CampaignNotFound`] if no such campaign exists, or an
    /// error if the database query fails.
    pub async fn set_status(&self, name: &str, status: CampaignStatus) -> Result<()> {
        let result = sqlx::query("UPDATE campaigns SET status = ? WHERE name = ?")
            .bind(status.as_str())
            .bind(name)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(Error::CampaignNotFound(name.to_string()));
        }
        debug!(campaign = name, %status, "Campaign status changed");
        Ok(())
    }

    /// Record the end of a send run.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CampaignNotFound`] if no such campaign exists, or an
    /// error if the database query fails.
    pub async fn finish_send(
        &self,
        name: &str,
        status: CampaignStatus,
        stats: &Tally,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let completed_at = status.is_completed().then(|| time::encode(now));
        let result = sqlx::query(
            r"
            UPDATE campaigns
            SET status = ?, send_stats = ?, completed_at = COALESCE(?, completed_at)
            WHERE name = ?
            ",
        )
        .bind(status.as_str())
        .bind(serde_json::to_string(stats)?)
        .bind(completed_at)
        .bind(name)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(Error::CampaignNotFound(name.to_string()));
        }
        Ok(())
    }

    /// All campaigns, newest first, without recipient lists.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails or a row is corrupt.
    pub async fn list(&self) -> Result<Vec<Campaign>> {
        let rows = sqlx::query(
            r"
            SELECT name, status, build_stats, send_stats, created_at, completed_at
            FROM campaigns
            ORDER BY created_at DESC, name ASC
            ",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_campaign).collect()
    }

    /// Delete every campaign and recipient list. History is kept.
    ///
    /// Returns the number of campaigns removed.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn delete_all(&self) -> Result<u64> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM campaign_recipients")
            .execute(&mut *tx)
            .await?;
        let result = sqlx::query("DELETE FROM campaigns")
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        Ok(result.rows_affected())
    }
}

fn row_to_campaign(row: &SqliteRow) -> Result<Campaign> {
    let status: String = row.get("status");
    let build_stats: String = row.get("build_stats");
    let send_stats: Option<String> = row.get("send_stats");
    let created_at: String = row.get("created_at");
    let completed_at: Option<String> = row.get("completed_at");

    Ok(Campaign {
        name: row.get("name"),
        status: CampaignStatus::parse(&status)
            .ok_or_else(|| Error::Corrupt(format!("campaign status '{status}'")))?,
        recipients: Vec::new(),
        build_stats: serde_json::from_str(&build_stats)?,
        send_stats: send_stats.as_deref().map(serde_json::from_str).transpose()?,
        created_at: time::decode(&created_at)?,
        completed_at: time::decode_opt(completed_at.as_deref())?,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::Store;
    use crate::stats::{Outcome, Rejection};

    #[tokio::test]
    async fn test_create_stores_ready_campaign() {
        let store = Store::in_memory().await.unwrap();
        let repo = store.campaigns();

        let mut stats = Tally::new();
        stats.record(Outcome::Included);
        stats.record(Outcome::Included);
        stats.record(Rejection::DomainConflict);
        let recipients = vec!["b@gmail.com".to_string(), "a@acme.com".to_string()];
        repo.create("spring", &recipients, &stats, Utc::now())
            .await
            .unwrap();

        let ready = repo.get("spring").await.unwrap().unwrap();
        assert_eq!(ready.status, CampaignStatus::Ready);
        assert_eq!(ready.recipients, recipients);
        assert_eq!(ready.build_stats, stats);
        assert!(ready.send_stats.is_none());
    }

    #[tokio::test]
    async fn test_name_conflict() {
        let store = Store::in_memory().await.unwrap();
        let repo = store.campaigns();

        repo.create("spring", &[], &Tally::new(), Utc::now())
            .await
            .unwrap();
        assert!(matches!(
            repo.create("spring", &[], &Tally::new(), Utc::now()).await,
            Err(Error::NameConflict(name)) if name == "spring"
        ));
    }

    #[tokio::test]
    async fn test_duplicate_recipient_rolls_back_campaign() {
        let store = Store::in_memory().await.unwrap();
        let repo = store.campaigns();

        let recipients = vec!["a@gmail.com".to_string(), "a@gmail.com".to_string()];
        assert!(
            repo.create("dup", &recipients, &Tally::new(), Utc::now())
                .await
                .is_err()
        );
        assert!(!repo.exists("dup").await.unwrap());
        assert!(repo.recipients("dup").await.unwrap().is_empty());

        repo.create("dup", &recipients[..1], &Tally::new(), Utc::now())
            .await
            .unwrap();
        assert_eq!(repo.recipients("dup").await.unwrap(), vec!["a@gmail.com"]);
    }

    #[tokio::test]
    async fn test_row_with_default_stats_is_readable() {
        let store = Store::in_memory().await.unwrap();
        let repo = store.campaigns();

        sqlx::query("INSERT INTO campaigns (name, created_at) VALUES ('legacy', ?)")
            .bind(time::encode(Utc::now()))
            .execute(&repo.pool)
            .await
            .unwrap();

        let legacy = repo.get("legacy").await.unwrap().unwrap();
        assert_eq!(legacy.status, CampaignStatus::Building);
        assert_eq!(legacy.build_stats, Tally::new());
        assert_eq!(repo.list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_finish_send_and_delete_all() {
        let store = Store::in_memory().await.unwrap();
        let repo = store.campaigns();
        let now = Utc::now();

        repo.create("spring", &["a@gmail.com".to_string()], &Tally::new(), now)
            .await
            .unwrap();

        let mut stats = Tally::new();
        stats.record(Outcome::Sent);
        repo.finish_send("spring", CampaignStatus::Completed, &stats, now)
            .await
            .unwrap();

        let done = repo.get("spring").await.unwrap().unwrap();
        assert_eq!(done.status, CampaignStatus::Completed);
        assert_eq!(done.send_stats, Some(stats));
        assert!(done.completed_at.is_some());

        assert!(matches!(
            repo.set_status("ghost", CampaignStatus::Sending).await,
            Err(Error::CampaignNotFound(_))
        ));

        assert_eq!(repo.delete_all().await.unwrap(), 1);
        assert!(repo.list().await.unwrap().is_empty());
        assert!(repo.recipients("spring").await.unwrap().is_empty());
    }
}
