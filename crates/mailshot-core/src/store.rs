//! `SQLite` storage shared by all repositories.

use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use tracing::debug;

use crate::Result;
use crate::campaigns::CampaignRepository;
use crate::contacts::ContactRepository;
use crate::domain::ProviderDomainRepository;
use crate::history::HistoryRepository;
use crate::suppression::{CustomerRepository, UnsubscribeRepository};

/// Handle to the campaign database.
///
/// Repositories handed out by the store share one connection pool, so a
/// contact admitted through one repository is visible to all others.
#[derive(Debug, Clone)]
pub struct Store {
    pool: SqlitePool,
}

impl Store {
    /// Open (or create) the database at the given path.
    ///
    /// Creates the tables if they don't exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the database connection fails or schema creation fails.
    pub async fn open(database_path: &str) -> Result<Self> {
        let url = format!("sqlite:{database_path}?mode=rwc");
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(&url)
            .await?;

        let store = Self { pool };
        store.initialize().await?;
        debug!(path = database_path, "Opened campaign database");
        Ok(store)
    }

    /// Create an in-memory store for testing.
    ///
    /// # Errors
    ///
    /// Returns an error if the database connection fails or schema creation fails.
    pub async fn in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;

        let store = Self { pool };
        store.initialize().await?;
        Ok(store)
    }

    /// Initialize database schema.
    async fn initialize(&self) -> Result<()> {
        self.contacts().initialize().await?;
        self.campaigns().initialize().await?;
        self.history().initialize().await?;
        self.unsubscribes().initialize().await?;
        self.customers().initialize().await?;
        self.provider_domains().initialize().await?;
        Ok(())
    }

    /// Master contact list.
    #[must_use]
    pub fn contacts(&self) -> ContactRepository {
        ContactRepository::new(self.pool.clone())
    }

    /// Campaign records and recipient lists.
    #[must_use]
    pub fn campaigns(&self) -> CampaignRepository {
        CampaignRepository::new(self.pool.clone())
    }

    /// Append-only send history.
    #[must_use]
    pub fn history(&self) -> HistoryRepository {
        HistoryRepository::new(self.pool.clone())
    }

    /// Unsubscribe records.
    #[must_use]
    pub fn unsubscribes(&self) -> UnsubscribeRepository {
        UnsubscribeRepository::new(self.pool.clone())
    }

    /// Existing customer domains.
    #[must_use]
    pub fn customers(&self) -> CustomerRepository {
        CustomerRepository::new(self.pool.clone())
    }

    /// Provider domain set.
    #[must_use]
    pub fn provider_domains(&self) -> ProviderDomainRepository {
        ProviderDomainRepository::new(self.pool.clone())
    }

    /// Close the underlying pool.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}
