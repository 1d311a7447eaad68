//! Send history storage.

use chrono::{DateTime, Utc};
use sqlx::Row;
use sqlx::sqlite::{SqlitePool, SqliteRow};

use super::model::{EmailHistoryRecord, HistoryStatus};
use crate::{Error, Result, time};

/// Repository for the append-only send history.
#[derive(Debug, Clone)]
pub struct HistoryRepository {
    pool: SqlitePool,
}

impl HistoryRepository {
    pub(crate) const fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Initialize database schema.
    pub(crate) async fn initialize(&self) -> Result<()> {
        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS email_history (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                contact_email TEXT NOT NULL,
                campaign_name TEXT NOT NULL,
                sent_at TEXT NOT NULL,
                status TEXT NOT NULL,
                detail TEXT
            )
            ",
        )
        .execute(&self.pool)
        .await?;

        for (name, column) in [
            ("idx_history_email", "contact_email"),
            ("idx_history_campaign", "campaign_name"),
            ("idx_history_sent_at", "sent_at"),
        ] {
            sqlx::query(&format!(
                "CREATE INDEX IF NOT EXISTS {name} ON email_history({column})"
            ))
            .execute(&self.pool)
            .await?;
        }

        Ok(())
    }

    /// Append a record, returning its row id.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn append(&self, record: &EmailHistoryRecord) -> Result<i64> {
        let result = sqlx::query(
            r"
            INSERT INTO email_history (contact_email, campaign_name, sent_at, status, detail)
            VALUES (?, ?, ?, ?, ?)
            ",
        )
        .bind(&record.contact_email)
        .bind(&record.campaign_name)
        .bind(time::encode(record.sent_at))
        .bind(record.status.as_str())
        .bind(&record.detail)
        .execute(&self.pool)
        .await?;

        Ok(result.last_insert_rowid())
    }

    /// Newest successful send to an exact address.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails or the value is corrupt.
    pub async fn last_sent(&self, email: &str) -> Result<Option<DateTime<Utc>>> {
        let latest: Option<String> = sqlx::query_scalar(
            "SELECT MAX(sent_at) FROM email_history WHERE contact_email = ? AND status = 'sent'",
        )
        .bind(email)
        .fetch_one(&self.pool)
        .await?;

        time::decode_opt(latest.as_deref())
    }

    /// All records for a campaign, in insertion order.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails or a row is corrupt.
    pub async fn for_campaign(&self, campaign_name: &str) -> Result<Vec<EmailHistoryRecord>> {
        let rows = sqlx::query(
            r"
            SELECT id, contact_email, campaign_name, sent_at, status, detail
            FROM email_history
            WHERE campaign_name = ?
            ORDER BY id ASC
            ",
        )
        .bind(campaign_name)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_record).collect()
    }

    /// All records for an address, in insertion order.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails or a row is corrupt.
    pub async fn for_contact(&self, email: &str) -> Result<Vec<EmailHistoryRecord>> {
        let rows = sqlx::query(
            r"
            SELECT id, contact_email, campaign_name, sent_at, status, detail
            FROM email_history
            WHERE contact_email = ?
            ORDER BY id ASC
            ",
        )
        .bind(email.trim().to_lowercase())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_record).collect()
    }
}

fn row_to_record(row: &SqliteRow) -> Result<EmailHistoryRecord> {
    let sent_at: String = row.get("sent_at");
    let status: String = row.get("status");

    Ok(EmailHistoryRecord {
        id: Some(row.get("id")),
        contact_email: row.get("contact_email"),
        campaign_name: row.get("campaign_name"),
        sent_at: time::decode(&sent_at)?,
        status: HistoryStatus::parse(&status)
            .ok_or_else(|| Error::Corrupt(format!("history status '{status}'")))?,
        detail: row.get("detail"),
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::Store;
    use chrono::{Duration, TimeZone};

    #[tokio::test]
    async fn test_last_sent_ignores_failures_and_skips() {
        let store = Store::in_memory().await.unwrap();
        let repo = store.history();
        let t0 = Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap();

        assert_eq!(repo.last_sent("x@y.com").await.unwrap(), None);

        for (offset, status) in [
            (0, HistoryStatus::Sent),
            (1, HistoryStatus::Failed),
            (2, HistoryStatus::Skipped),
        ] {
            let record = EmailHistoryRecord::new(
                "x@y.com",
                "spring",
                t0 + Duration::days(offset),
                status,
                None,
            );
            repo.append(&record).await.unwrap();
        }

        assert_eq!(repo.last_sent("x@y.com").await.unwrap(), Some(t0));
        let records = repo.for_campaign("spring").await.unwrap();
        assert_eq!(records.len(), 3);
        assert_eq!(records[1].status, HistoryStatus::Failed);
        assert_eq!(repo.for_contact("X@Y.com").await.unwrap().len(), 3);
    }
}
