//! Unsubscribe and existing-customer storage.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use sqlx::Row;
use sqlx::sqlite::SqlitePool;
use tracing::debug;

use super::model::{ExistingCustomerRecord, UnsubscribeRecord};
use crate::{Result, time};

/// Repository for unsubscribe records.
///
/// Records are never removed.
#[derive(Debug, Clone)]
pub struct UnsubscribeRepository {
    pool: SqlitePool,
}

impl UnsubscribeRepository {
    pub(crate) const fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Initialize database schema.
    pub(crate) async fn initialize(&self) -> Result<()> {
        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS unsubscribes (
                email TEXT PRIMARY KEY NOT NULL,
                source TEXT NOT NULL DEFAULT '',
                created_at TEXT NOT NULL
            )
            ",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Record an unsubscribe.
    ///
    /// Returns `false` if the address was already unsubscribed; the first
    /// record is kept.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn add(&self, email: &str, source: &str, now: DateTime<Utc>) -> Result<bool> {
        let email = email.trim().to_lowercase();
        let result = sqlx::query(
            "INSERT OR IGNORE INTO unsubscribes (email, source, created_at) VALUES (?, ?, ?)",
        )
        .bind(&email)
        .bind(source)
        .bind(time::encode(now))
        .execute(&self.pool)
        .await?;

        let added = result.rows_affected() > 0;
        debug!(%email, added, "Recorded unsubscribe");
        Ok(added)
    }

    /// Returns true if the exact address is unsubscribed.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn contains(&self, email: &str) -> Result<bool> {
        let row = sqlx::query("SELECT 1 FROM unsubscribes WHERE email = ?")
            .bind(email.trim().to_lowercase())
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.is_some())
    }

    /// Get the record for an address.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails or the row is corrupt.
    pub async fn get(&self, email: &str) -> Result<Option<UnsubscribeRecord>> {
        let row = sqlx::query("SELECT email, source, created_at FROM unsubscribes WHERE email = ?")
            .bind(email.trim().to_lowercase())
            .fetch_optional(&self.pool)
            .await?;

        row.map(|r| {
            let created_at: String = r.get("created_at");
            Ok(UnsubscribeRecord {
                email: r.get("email"),
                source: r.get("source"),
                created_at: time::decode(&created_at)?,
            })
        })
        .transpose()
    }

    /// All unsubscribed addresses.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn emails(&self) -> Result<HashSet<String>> {
        let rows = sqlx::query("SELECT email FROM unsubscribes")
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.iter().map(|r| r.get("email")).collect())
    }
}

/// Repository for existing-customer domains.
#[derive(Debug, Clone)]
pub struct CustomerRepository {
    pool: SqlitePool,
}

impl CustomerRepository {
    pub(crate) const fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Initialize database schema.
    pub(crate) async fn initialize(&self) -> Result<()> {
        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS existing_customers (
                domain TEXT PRIMARY KEY NOT NULL,
                source TEXT NOT NULL DEFAULT '',
                added_at TEXT NOT NULL
            )
            ",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Record a customer domain.
    ///
    /// Returns `false` if the domain was already recorded.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn add(&self, domain: &str, source: &str, now: DateTime<Utc>) -> Result<bool> {
        let result = sqlx::query(
            "INSERT OR IGNORE INTO existing_customers (domain, source, added_at) VALUES (?, ?, ?)",
        )
        .bind(domain.trim().to_lowercase())
        .bind(source)
        .bind(time::encode(now))
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Returns true if the domain belongs to a current customer.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn contains_domain(&self, domain: &str) -> Result<bool> {
        let row = sqlx::query("SELECT 1 FROM existing_customers WHERE domain = ?")
            .bind(domain.trim().to_lowercase())
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.is_some())
    }

    /// All customer records, alphabetically.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails or a row is corrupt.
    pub async fn list(&self) -> Result<Vec<ExistingCustomerRecord>> {
        let rows = sqlx::query(
            "SELECT domain, source, added_at FROM existing_customers ORDER BY domain ASC",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|r| {
                let added_at: String = r.get("added_at");
                Ok(ExistingCustomerRecord {
                    domain: r.get("domain"),
                    source: r.get("source"),
                    added_at: time::decode(&added_at)?,
                })
            })
            .collect()
    }
}
