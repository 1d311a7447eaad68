//! `mailshot` - outbound email campaigns with deduplication and frequency control
//!
//! Imports scraped contacts into a master list, builds campaigns from contact
//! files and sends them through `SendGrid`, re-checking every recipient at
//! send time.

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

mod commands;
mod config;

use std::path::PathBuf;

use anyhow::Context;
use clap::{ArgGroup, Parser, Subcommand};
use mailshot_core::{MAX_INTERVAL_DAYS, Store};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use config::Config;

/// Outbound email campaigns with deduplication and frequency control
#[derive(Parser, Debug)]
#[command(name = "mailshot")]
#[command(about = "Build and send deduplicated email campaigns", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to the JSON config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Path to the SQLite database (overrides config and environment)
    #[arg(short, long, global = true)]
    database: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Admit a contact file into the master list
    Import {
        /// JSON file with one record or an array of records
        #[arg(short, long)]
        file: PathBuf,

        /// Tag recorded with each contact
        #[arg(long, default_value = "import")]
        source: String,

        /// Merge business details into contacts that already exist
        #[arg(long)]
        refresh: bool,
    },
    /// Build a campaign from a contact file
    Build {
        /// Campaign name (must be new)
        #[arg(long)]
        campaign: String,

        /// JSON file with one record or an array of records
        #[arg(short, long)]
        file: PathBuf,

        /// Tag recorded with each candidate
        #[arg(long, default_value = "campaign")]
        source: String,
    },
    /// Send a built campaign
    Send {
        /// Campaign name
        #[arg(long)]
        campaign: String,

        /// Minimum days between two sends to one address
        #[arg(long, value_parser = clap::value_parser!(i64).range(0..=MAX_INTERVAL_DAYS))]
        frequency_days: Option<i64>,
    },
    /// Override the last-send date (for testing cooldowns)
    #[command(group(ArgGroup::new("target").required(true).args(["email", "all"])))]
    SetLastSent {
        /// Contact to change
        #[arg(long)]
        email: Option<String>,

        /// Change every contact that has been emailed
        #[arg(long)]
        all: bool,

        /// How many days ago the last send should be
        #[arg(
            long,
            default_value = "15",
            value_parser = clap::value_parser!(i64).range(0..=MAX_INTERVAL_DAYS)
        )]
        days: i64,
    },
    /// Pull the SendGrid unsubscribe list
    SyncUnsubscribes,
    /// Record an unsubscribe by hand
    Unsubscribe {
        /// Address to unsubscribe
        email: String,
    },
    /// Treat a domain as a mailbox provider
    AddProvider {
        /// Domain, e.g. `fastmail.com`
        domain: String,
    },
    /// Exclude a customer domain from campaigns
    AddCustomer {
        /// Customer domain
        domain: String,

        /// Tag recorded with the domain
        #[arg(long, default_value = "manual")]
        source: String,
    },
    /// Flag a master-list contact as inactive
    Deactivate {
        /// Contact address
        email: String,
    },
    /// Delete every campaign record (send history is kept)
    DeleteCampaigns {
        /// Skip confirmation prompt
        #[arg(long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "mailshot=info,mailshot_core=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(database) = cli.database {
        config.database_path = Some(database);
    }

    let database_path = config.database_path();
    if let Some(parent) = database_path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating {}", parent.display()))?;
    }
    let database = database_path
        .to_str()
        .context("database path is not valid UTF-8")?;

    info!(database, "Opening campaign database");
    let store = Store::open(database).await?;

    let result = run(&store, &config, cli.command).await;
    store.close().await;
    result
}

async fn run(store: &Store, config: &Config, command: Commands) -> anyhow::Result<()> {
    match command {
        Commands::Import {
            file,
            source,
            refresh,
        } => commands::import(store, &file, &source, refresh).await,
        Commands::Build {
            campaign,
            file,
            source,
        } => commands::build(store, &campaign, &file, &source).await,
        Commands::Send {
            campaign,
            frequency_days,
        } => commands::send(store, config, &campaign, frequency_days).await,
        Commands::SetLastSent { email, all: _, days } => {
            commands::set_last_sent(store, config, email.as_deref(), days).await
        }
        Commands::SyncUnsubscribes => commands::sync(store, config).await,
        Commands::Unsubscribe { email } => commands::unsubscribe(store, &email).await,
        Commands::AddProvider { domain } => commands::add_provider(store, &domain).await,
        Commands::AddCustomer { domain, source } => {
            commands::add_customer(store, &domain, &source).await
        }
        Commands::Deactivate { email } => commands::deactivate(store, &email).await,
        Commands::DeleteCampaigns { force } => commands::delete_campaigns(store, force).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_set_last_sent_needs_a_target() {
        assert!(Cli::try_parse_from(["mailshot", "set-last-sent"]).is_err());
        assert!(
            Cli::try_parse_from(["mailshot", "set-last-sent", "--email", "a@b.com", "--all"])
                .is_err()
        );

        let cli = Cli::try_parse_from(["mailshot", "set-last-sent", "--all"]).unwrap_or_else(|e| {
            panic!("{e}");
        });
        assert!(matches!(
            cli.command,
            Commands::SetLastSent {
                email: None,
                all: true,
                days: 15
            }
        ));
    }

    #[test]
    fn test_day_counts_are_bounded() {
        let rejected: [&[&str]; 3] = [
            &["mailshot", "set-last-sent", "--all", "--days", "99999999"],
            &["mailshot", "set-last-sent", "--all", "--days=-1"],
            &["mailshot", "send", "--campaign", "june", "--frequency-days", "1000000000000"],
        ];
        for args in rejected {
            assert!(Cli::try_parse_from(args).is_err(), "{args:?}");
        }

        let cli = Cli::try_parse_from([
            "mailshot",
            "send",
            "--campaign",
            "june",
            "--frequency-days",
            "0",
        ])
        .unwrap_or_else(|e| panic!("{e}"));
        assert!(matches!(
            cli.command,
            Commands::Send {
                frequency_days: Some(0),
                ..
            }
        ));
    }
}
