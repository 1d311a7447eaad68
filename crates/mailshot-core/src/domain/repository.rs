//! Provider domain storage.

use chrono::{DateTime, Utc};
use sqlx::Row;
use sqlx::sqlite::SqlitePool;
use tracing::debug;

use super::classifier::DomainClassifier;
use crate::{Result, time};

/// Public webmail domains seeded into a fresh database.
pub const DEFAULT_PROVIDER_DOMAINS: &[&str] = &[
    "aol.com",
    "gmail.com",
    "googlemail.com",
    "gmx.com",
    "gmx.net",
    "hotmail.com",
    "hotmail.co.uk",
    "icloud.com",
    "live.com",
    "mail.com",
    "me.com",
    "msn.com",
    "outlook.com",
    "protonmail.com",
    "proton.me",
    "yahoo.com",
    "yahoo.co.uk",
    "yandex.com",
    "zoho.com",
];

/// Repository for the append-only provider domain set.
#[derive(Debug, Clone)]
pub struct ProviderDomainRepository {
    pool: SqlitePool,
}

impl ProviderDomainRepository {
    pub(crate) const fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Initialize database schema and seed the default provider list.
    pub(crate) async fn initialize(&self) -> Result<()> {
        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS provider_domains (
                domain TEXT PRIMARY KEY NOT NULL,
                added_at TEXT NOT NULL
            )
            ",
        )
        .execute(&self.pool)
        .await?;

        let now = time::encode(Utc::now());
        for domain in DEFAULT_PROVIDER_DOMAINS {
            sqlx::query("INSERT OR IGNORE INTO provider_domains (domain, added_at) VALUES (?, ?)")
                .bind(*domain)
                .bind(&now)
                .execute(&self.pool)
                .await?;
        }

        Ok(())
    }

    /// Record a newly validated provider domain.
    ///
    /// Returns `false` if the domain was already known.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn add(&self, domain: &str, now: DateTime<Utc>) -> Result<bool> {
        let domain = domain.trim().to_lowercase();
        let result =
            sqlx::query("INSERT OR IGNORE INTO provider_domains (domain, added_at) VALUES (?, ?)")
                .bind(&domain)
                .bind(time::encode(now))
                .execute(&self.pool)
                .await?;

        let added = result.rows_affected() > 0;
        debug!(%domain, added, "Recorded provider domain");
        Ok(added)
    }

    /// List all provider domains, alphabetically.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn list(&self) -> Result<Vec<String>> {
        let rows = sqlx::query("SELECT domain FROM provider_domains ORDER BY domain ASC")
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.iter().map(|row| row.get("domain")).collect())
    }

    /// Load the provider set into a classifier for one run.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn load_classifier(&self) -> Result<DomainClassifier> {
        let domains = self.list().await?;
        debug!(count = domains.len(), "Loaded provider domains");
        Ok(DomainClassifier::new(domains))
    }
}
