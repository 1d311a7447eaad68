//! Contact storage repository.

use chrono::{DateTime, Utc};
use sqlx::Row;
use sqlx::sqlite::{SqlitePool, SqliteRow};

use super::model::{BusinessInfo, Contact};
use crate::{Result, time};

/// Repository for the master contact list.
#[derive(Debug, Clone)]
pub struct ContactRepository {
    pool: SqlitePool,
}

impl ContactRepository {
    pub(crate) const fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Initialize database schema.
    pub(crate) async fn initialize(&self) -> Result<()> {
        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS contacts (
                email TEXT PRIMARY KEY NOT NULL,
                domain TEXT NOT NULL,
                business TEXT NOT NULL DEFAULT '{}',
                source TEXT NOT NULL DEFAULT '',
                last_email_sent TEXT,
                active INTEGER NOT NULL DEFAULT 1,
                added_at TEXT NOT NULL
            )
            ",
        )
        .execute(&self.pool)
        .await?;

        // Domain occupancy lookups during admission
        sqlx::query("CREATE INDEX IF NOT EXISTS idx_contacts_domain ON contacts(domain)")
            .execute(&self.pool)
            .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_contacts_last_sent ON contacts(last_email_sent)",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Get a contact by (normalized) email.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails or the row is corrupt.
    pub async fn get(&self, email: &str) -> Result<Option<Contact>> {
        let row = sqlx::query(
            r"
            SELECT email, domain, business, source, last_email_sent, active, added_at
            FROM contacts
            WHERE email = ?
            ",
        )
        .bind(email.trim().to_lowercase())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(row_to_contact).transpose()
    }

    /// Returns true if the exact address is in the master list.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn exists(&self, email: &str) -> Result<bool> {
        let row = sqlx::query("SELECT 1 FROM contacts WHERE email = ?")
            .bind(email.trim().to_lowercase())
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.is_some())
    }

    /// Find an address other than `email` that already occupies `domain`.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn domain_occupant(&self, domain: &str, email: &str) -> Result<Option<String>> {
        let row = sqlx::query(
            r"
            SELECT email FROM contacts
            WHERE domain = ? AND email != ?
            ORDER BY added_at ASC
            LIMIT 1
            ",
        )
        .bind(domain)
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| r.get("email")))
    }

    /// Insert a new contact.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails, including when the
    /// email is already present.
    pub async fn insert(&self, contact: &Contact) -> Result<()> {
        sqlx::query(
            r"
            INSERT INTO contacts
                (email, domain, business, source, last_email_sent, active, added_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            ",
        )
        .bind(&contact.email)
        .bind(&contact.domain)
        .bind(serde_json::to_string(&contact.business)?)
        .bind(&contact.source)
        .bind(contact.last_email_sent.map(time::encode))
        .bind(contact.active)
        .bind(time::encode(contact.added_at))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Replace a contact's business metadata.
    ///
    /// Returns `false` if the contact does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn update_business(&self, email: &str, business: &BusinessInfo) -> Result<bool> {
        let result = sqlx::query("UPDATE contacts SET business = ? WHERE email = ?")
            .bind(serde_json::to_string(business)?)
            .bind(email)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Set the active flag.
    ///
    /// Returns `false` if the contact does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn set_active(&self, email: &str, active: bool) -> Result<bool> {
        let result = sqlx::query("UPDATE contacts SET active = ? WHERE email = ?")
            .bind(active)
            .bind(email.trim().to_lowercase())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Move `last_email_sent` forward to `sent_at`.
    ///
    /// An older `sent_at` than the stored value leaves the contact unchanged.
    /// Returns `true` if the timestamp moved.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn advance_last_sent(&self, email: &str, sent_at: DateTime<Utc>) -> Result<bool> {
        let sent_at = time::encode(sent_at);
        let result = sqlx::query(
            r"
            UPDATE contacts SET last_email_sent = ?
            WHERE email = ? AND (last_email_sent IS NULL OR last_email_sent < ?)
            ",
        )
        .bind(&sent_at)
        .bind(email)
        .bind(&sent_at)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Overwrite `last_email_sent` unconditionally.
    ///
    /// Returns `false` if the contact does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn force_last_sent(&self, email: &str, sent_at: DateTime<Utc>) -> Result<bool> {
        let result = sqlx::query("UPDATE contacts SET last_email_sent = ? WHERE email = ?")
            .bind(time::encode(sent_at))
            .bind(email.trim().to_lowercase())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Overwrite `last_email_sent` on every contact that has one.
    ///
    /// Returns the number of contacts changed.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn force_all_last_sent(&self, sent_at: DateTime<Utc>) -> Result<u64> {
        let result = sqlx::query(
            "UPDATE contacts SET last_email_sent = ? WHERE last_email_sent IS NOT NULL",
        )
        .bind(time::encode(sent_at))
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    /// Number of contacts in the master list.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn count(&self) -> Result<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM contacts")
            .fetch_one(&self.pool)
            .await?;

        Ok(u64::try_from(count).unwrap_or(0))
    }

    /// All contacts on a domain, oldest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails or a row is corrupt.
    pub async fn list_by_domain(&self, domain: &str) -> Result<Vec<Contact>> {
        let rows = sqlx::query(
            r"
            SELECT email, domain, business, source, last_email_sent, active, added_at
            FROM contacts
            WHERE domain = ?
            ORDER BY added_at ASC, email ASC
            ",
        )
        .bind(domain.trim().to_lowercase())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_contact).collect()
    }
}

fn row_to_contact(row: &SqliteRow) -> Result<Contact> {
    let business: String = row.get("business");
    let last_email_sent: Option<String> = row.get("last_email_sent");
    let added_at: String = row.get("added_at");

    Ok(Contact {
        email: row.get("email"),
        domain: row.get("domain"),
        business: serde_json::from_str(&business)?,
        source: row.get("source"),
        last_email_sent: time::decode_opt(last_email_sent.as_deref())?,
        active: row.get("active"),
        added_at: time::decode(&added_at)?,
    })
}
