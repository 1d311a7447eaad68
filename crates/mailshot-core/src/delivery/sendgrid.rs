//! `SendGrid` v3 HTTP API client.

use std::collections::HashSet;

use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::{Delivery, DeliveryResult, OutgoingEmail};
use crate::{Error, Result};

/// Production API endpoint.
pub const DEFAULT_SENDGRID_URL: &str = "https://api.sendgrid.com";

/// Page size for the suppression list; the API maximum.
const UNSUBSCRIBE_PAGE_SIZE: usize = 500;

#[derive(Debug, Serialize)]
struct MailSend<'a> {
    personalizations: [Personalization<'a>; 1],
    from: Mailbox<'a>,
    subject: &'a str,
    content: Vec<Content<'a>>,
}

#[derive(Debug, Serialize)]
struct Personalization<'a> {
    to: [Mailbox<'a>; 1],
}

#[derive(Debug, Serialize)]
struct Mailbox<'a> {
    email: &'a str,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    value: &'a str,
}

#[derive(Debug, Deserialize)]
struct Suppression {
    email: String,
}

impl<'a> MailSend<'a> {
    fn new(email: &'a OutgoingEmail) -> Self {
        // Plain text must come before HTML
        let mut content = vec![Content {
            kind: "text/plain",
            value: &email.text,
        }];
        if let Some(html) = &email.html {
            content.push(Content {
                kind: "text/html",
                value: html,
            });
        }

        Self {
            personalizations: [Personalization {
                to: [Mailbox { email: &email.to }],
            }],
            from: Mailbox { email: &email.from },
            subject: &email.subject,
            content,
        }
    }
}

/// Client for the `SendGrid` mail-send and suppression APIs.
#[derive(Debug, Clone)]
pub struct SendGridClient {
    api_key: String,
    base_url: String,
    http_client: Client,
}

impl SendGridClient {
    /// Creates a client for the production API.
    #[must_use]
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_SENDGRID_URL.to_string(),
            http_client: Client::new(),
        }
    }

    /// Points the client at another endpoint.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// Send one message. `202 Accepted` is the only success status.
    ///
    /// # Errors
    ///
    /// Returns an error if the request could not be made.
    pub async fn send(&self, email: &OutgoingEmail) -> Result<StatusCode> {
        let response = self
            .http_client
            .post(self.url("/v3/mail/send"))
            .bearer_auth(&self.api_key)
            .json(&MailSend::new(email))
            .send()
            .await?;

        Ok(response.status())
    }

    /// Fetch every address on the provider's unsubscribe list.
    ///
    /// # Errors
    ///
    /// Returns an error if a request fails or the provider answers with a
    /// non-success status.
    pub async fn fetch_unsubscribes(&self) -> Result<HashSet<String>> {
        let mut all = HashSet::new();
        let mut offset = 0usize;

        loop {
            let response = self
                .http_client
                .get(self.url("/v3/suppression/unsubscribes"))
                .bearer_auth(&self.api_key)
                .query(&[("limit", UNSUBSCRIBE_PAGE_SIZE), ("offset", offset)])
                .send()
                .await?;

            if !response.status().is_success() {
                let status = response.status();
                let body = response.text().await.unwrap_or_default();
                return Err(Error::Provider(format!("{status}: {body}")));
            }

            let page: Vec<Suppression> = response.json().await?;
            let count = page.len();
            all.extend(page.into_iter().map(|s| s.email));
            debug!(offset, count, "Fetched unsubscribe page");

            if count < UNSUBSCRIBE_PAGE_SIZE {
                break;
            }
            offset += count;
        }

        Ok(all)
    }
}

impl Delivery for SendGridClient {
    async fn deliver(&self, email: &OutgoingEmail) -> DeliveryResult {
        match self.send(email).await {
            Ok(StatusCode::ACCEPTED) => DeliveryResult::Delivered,
            Ok(status) => {
                warn!(to = %email.to, %status, "Unexpected status from provider");
                DeliveryResult::Failed(format!("Status code: {}", status.as_u16()))
            }
            Err(e) => {
                warn!(to = %email.to, error = %e, "Delivery request failed");
                DeliveryResult::Failed(e.to_string())
            }
        }
    }
}
