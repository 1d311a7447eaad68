//! Command-line configuration.
//!
//! Read from a JSON file, then overridden from the environment:
//!
//! | Variable                     | Field               |
//! |------------------------------|---------------------|
//! | `MAILSHOT_DATABASE`          | `database_path`     |
//! | `SENDGRID_API_KEY`           | `sendgrid_api_key`  |
//! | `DEFAULT_FROM_EMAIL`         | `sender`            |
//! | `MAILSHOT_MIN_INTERVAL_DAYS` | `min_interval_days` |

use std::path::{Path, PathBuf};

use anyhow::{Context, bail};
use mailshot_core::{
    DEFAULT_MIN_INTERVAL_DAYS, MAX_INTERVAL_DAYS, MessageTemplate, delivery::DEFAULT_SENDGRID_URL,
};
use serde::{Deserialize, Serialize};

/// Settings for one invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Database file. Defaults to the user data directory.
    pub database_path: Option<PathBuf>,
    /// Minimum days between two sends to one address.
    pub min_interval_days: i64,
    /// Sender address for campaign mail.
    pub sender: Option<String>,
    /// Subject line.
    pub subject: String,
    /// Plain text body.
    pub body_text: String,
    /// Optional HTML body.
    pub body_html: Option<String>,
    /// `SendGrid` API key.
    pub sendgrid_api_key: Option<String>,
    /// `SendGrid` API endpoint.
    pub sendgrid_base_url: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_path: None,
            min_interval_days: DEFAULT_MIN_INTERVAL_DAYS,
            sender: None,
            subject: "Hello from our team".to_string(),
            body_text: "Hello,\n\nWe would love to work with you.\n".to_string(),
            body_html: None,
            sendgrid_api_key: None,
            sendgrid_base_url: DEFAULT_SENDGRID_URL.to_string(),
        }
    }
}

impl Config {
    /// Default config file location.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("mailshot")
            .join("config.json")
    }

    /// Load from `path`, or from the default location when `None`.
    ///
    /// An explicit path must exist; a missing default file yields the
    /// defaults.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let (path, required) = match path {
            Some(path) => (path.to_path_buf(), true),
            None => (Self::default_path(), false),
        };

        let mut config = if path.exists() {
            let contents = std::fs::read_to_string(&path)
                .with_context(|| format!("reading config {}", path.display()))?;
            serde_json::from_str(&contents)
                .with_context(|| format!("parsing config {}", path.display()))?
        } else if required {
            bail!("config file not found: {}", path.display());
        } else {
            Self::default()
        };

        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Apply environment overrides using `lookup` to read variables, then
    /// validate the result.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<()> {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(path) = var("MAILSHOT_DATABASE") {
            self.database_path = Some(PathBuf::from(path));
        }
        if let Some(key) = var("SENDGRID_API_KEY") {
            self.sendgrid_api_key = Some(key);
        }
        if let Some(sender) = var("DEFAULT_FROM_EMAIL") {
            self.sender = Some(sender);
        }
        if let Some(days) = var("MAILSHOT_MIN_INTERVAL_DAYS") {
            self.min_interval_days = days
                .trim()
                .parse()
                .with_context(|| format!("invalid MAILSHOT_MIN_INTERVAL_DAYS: {days}"))?;
        }
        self.validate()
    }

    /// Reject values the engine cannot use.
    pub fn validate(&self) -> anyhow::Result<()> {
        if !(0..=MAX_INTERVAL_DAYS).contains(&self.min_interval_days) {
            bail!(
                "min_interval_days must be between 0 and {MAX_INTERVAL_DAYS}, got {}",
                self.min_interval_days
            );
        }
        Ok(())
    }

    /// Database path, falling back to the user data directory.
    pub fn database_path(&self) -> PathBuf {
        self.database_path.clone().unwrap_or_else(|| {
            dirs::data_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("mailshot")
                .join("mailshot.db")
        })
    }

    /// API key, required by every command that talks to `SendGrid`.
    pub fn api_key(&self) -> anyhow::Result<&str> {
        self.sendgrid_api_key
            .as_deref()
            .context("SENDGRID_API_KEY is not set")
    }

    /// Message template for a send run.
    pub fn template(&self) -> anyhow::Result<MessageTemplate> {
        let sender = self
            .sender
            .as_deref()
            .context("no sender configured (set DEFAULT_FROM_EMAIL)")?;
        let template = MessageTemplate::new(sender, &self.subject, &self.body_text);
        Ok(match &self.body_html {
            Some(html) => template.with_html(html),
            None => template,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn env(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key: &str| vars.get(key).cloned()
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"sender": "sales@vendor.com", "min_interval_days": 7}}"#).unwrap();

        let contents = std::fs::read_to_string(file.path()).unwrap();
        let config: Config = serde_json::from_str(&contents).unwrap();
        assert_eq!(config.sender.as_deref(), Some("sales@vendor.com"));
        assert_eq!(config.min_interval_days, 7);
        assert_eq!(config.sendgrid_base_url, DEFAULT_SENDGRID_URL);
    }

    #[test]
    fn test_env_overrides_file() {
        let mut config = Config {
            sender: Some("file@vendor.com".to_string()),
            ..Config::default()
        };
        config
            .apply_env(env(&[
                ("DEFAULT_FROM_EMAIL", "env@vendor.com"),
                ("SENDGRID_API_KEY", "SG.key"),
                ("MAILSHOT_MIN_INTERVAL_DAYS", "30"),
                ("MAILSHOT_DATABASE", "/tmp/m.db"),
            ]))
            .unwrap();

        assert_eq!(config.sender.as_deref(), Some("env@vendor.com"));
        assert_eq!(config.api_key().unwrap(), "SG.key");
        assert_eq!(config.min_interval_days, 30);
        assert_eq!(config.database_path(), PathBuf::from("/tmp/m.db"));
    }

    #[test]
    fn test_blank_env_is_ignored() {
        let mut config = Config::default();
        config.apply_env(env(&[("SENDGRID_API_KEY", "  ")])).unwrap();
        assert!(config.api_key().is_err());
    }

    #[test]
    fn test_bad_interval_is_an_error() {
        let mut config = Config::default();
        assert!(
            config
                .apply_env(env(&[("MAILSHOT_MIN_INTERVAL_DAYS", "soon")]))
                .is_err()
        );
    }

    #[test]
    fn test_interval_out_of_range_is_an_error() {
        for days in ["1000000000000", "-3", "36501"] {
            let mut config = Config::default();
            assert!(
                config
                    .apply_env(env(&[("MAILSHOT_MIN_INTERVAL_DAYS", days)]))
                    .is_err(),
                "{days}"
            );
        }
    }

    #[test]
    fn test_file_interval_out_of_range_is_an_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"min_interval_days": 9223372036854775807}}"#).unwrap();
        assert!(Config::load(Some(file.path())).is_err());
    }

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(Config::load(Some(dir.path().join("nope.json").as_path())).is_err());
    }

    #[test]
    fn test_template_requires_sender() {
        assert!(Config::default().template().is_err());

        let config = Config {
            sender: Some("sales@vendor.com".to_string()),
            body_html: Some("<p>Hi</p>".to_string()),
            ..Config::default()
        };
        let template = config.template().unwrap();
        assert_eq!(template.from, "sales@vendor.com");
        assert_eq!(template.html.as_deref(), Some("<p>Hi</p>"));
    }
}
