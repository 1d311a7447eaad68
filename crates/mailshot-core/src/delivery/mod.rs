//! The delivery collaborator: hands one message to a provider, once.
//!
//! The engine treats delivery as a black box with two outcomes. There is no
//! retry; a failure is recorded and the run moves on.

mod sendgrid;

use std::future::Future;

pub use sendgrid::{DEFAULT_SENDGRID_URL, SendGridClient};

/// A single message addressed to one recipient.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingEmail {
    /// Sender address.
    pub from: String,
    /// Recipient address.
    pub to: String,
    /// Subject line.
    pub subject: String,
    /// Plain text body.
    pub text: String,
    /// Optional HTML body.
    pub html: Option<String>,
}

/// Sender, subject and body shared by every message of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageTemplate {
    /// Sender address.
    pub from: String,
    /// Subject line.
    pub subject: String,
    /// Plain text body.
    pub text: String,
    /// Optional HTML body.
    pub html: Option<String>,
}

impl MessageTemplate {
    /// Creates a plain-text template.
    #[must_use]
    pub fn new(
        from: impl Into<String>,
        subject: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        Self {
            from: from.into(),
            subject: subject.into(),
            text: text.into(),
            html: None,
        }
    }

    /// Adds an HTML body.
    #[must_use]
    pub fn with_html(mut self, html: impl Into<String>) -> Self {
        self.html = Some(html.into());
        self
    }

    /// Addresses the template to one recipient.
    #[must_use]
    pub fn to(&self, recipient: impl Into<String>) -> OutgoingEmail {
        OutgoingEmail {
            from: self.from.clone(),
            to: recipient.into(),
            subject: self.subject.clone(),
            text: self.text.clone(),
            html: self.html.clone(),
        }
    }
}

/// Outcome reported by the provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryResult {
    /// Provider accepted the message.
    Delivered,
    /// Provider did not accept the message.
    Failed(String),
}

impl DeliveryResult {
    /// Returns true if the message was accepted.
    #[must_use]
    pub const fn is_delivered(&self) -> bool {
        matches!(self, Self::Delivered)
    }
}

/// A transport that makes one delivery attempt per call.
pub trait Delivery {
    /// Attempt to deliver `email`. Errors are folded into [`DeliveryResult::Failed`].
    fn deliver(&self, email: &OutgoingEmail) -> impl Future<Output = DeliveryResult> + Send;
}
