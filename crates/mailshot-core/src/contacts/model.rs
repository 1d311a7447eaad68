//! Contact data models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::EmailAddress;

/// Business metadata carried with a contact.
///
/// Stored as supplied; none of the fields are validated.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusinessInfo {
    /// Trading name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub business_name: Option<String>,
    /// Contact's first name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    /// Contact's surname.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub surname: Option<String>,
    /// Postal address.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    /// Phone number.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    /// Tax or company registration number.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tax_id: Option<String>,
    /// Website the record was found on.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl BusinessInfo {
    /// Overwrite fields with the non-empty values from `newer`.
    ///
    /// Returns true if anything changed.
    pub fn merge(&mut self, newer: &Self) -> bool {
        let mut changed = false;
        for (field, value) in [
            (&mut self.business_name, &newer.business_name),
            (&mut self.first_name, &newer.first_name),
            (&mut self.surname, &newer.surname),
            (&mut self.address, &newer.address),
            (&mut self.phone, &newer.phone),
            (&mut self.tax_id, &newer.tax_id),
            (&mut self.url, &newer.url),
        ] {
            if let Some(v) = value.as_deref().map(str::trim).filter(|v| !v.is_empty())
                && field.as_deref() != Some(v)
            {
                *field = Some(v.to_string());
                changed = true;
            }
        }
        changed
    }
}

/// A contact as supplied by a batch, before any rule has been applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContactCandidate {
    /// Raw email address, unvalidated.
    pub email: String,
    /// Business metadata.
    pub business: BusinessInfo,
    /// Tag naming where the record came from.
    pub source: String,
}

impl ContactCandidate {
    /// Creates a candidate with no business metadata.
    #[must_use]
    pub fn new(email: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            business: BusinessInfo::default(),
            source: source.into(),
        }
    }

    /// Attaches business metadata.
    #[must_use]
    pub fn with_business(mut self, business: BusinessInfo) -> Self {
        self.business = business;
        self
    }
}

/// A contact in the master list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Contact {
    /// Email address (unique, lower-cased).
    pub email: String,
    /// Domain part of the address.
    pub domain: String,
    /// Business metadata.
    pub business: BusinessInfo,
    /// Tag naming where the record came from.
    pub source: String,
    /// When the contact was last sent an email successfully.
    pub last_email_sent: Option<DateTime<Utc>>,
    /// Inactive contacts are kept but flagged.
    pub active: bool,
    /// When the contact entered the master list.
    pub added_at: DateTime<Utc>,
}

impl Contact {
    /// Creates a fresh, never-emailed contact.
    #[must_use]
    pub fn new(
        address: &EmailAddress,
        business: BusinessInfo,
        source: impl Into<String>,
        added_at: DateTime<Utc>,
    ) -> Self {
        Self {
            email: address.as_str().to_string(),
            domain: address.domain().to_string(),
            business,
            source: source.into(),
            last_email_sent: None,
            active: true,
            added_at,
        }
    }

    /// Display name for logs, e.g. "Jane Doe (Acme Ltd)".
    #[must_use]
    pub fn display_name(&self) -> String {
        let person = [self.business.first_name.as_deref(), self.business.surname.as_deref()]
            .into_iter()
            .flatten()
            .collect::<Vec<_>>()
            .join(" ");

        match (person.is_empty(), self.business.business_name.as_deref()) {
            (true, Some(company)) => company.to_string(),
            (false, Some(company)) => format!("{person} ({company})"),
            (false, None) => person,
            (true, None) => self.email.clone(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_new_contact_is_active_and_never_emailed() {
        let addr = EmailAddress::parse("Jane@Acme.com").unwrap();
        let contact = Contact::new(&addr, BusinessInfo::default(), "scrape", Utc::now());
        assert_eq!(contact.email, "jane@acme.com");
        assert_eq!(contact.domain, "acme.com");
        assert!(contact.active);
        assert!(contact.last_email_sent.is_none());
    }

    #[test]
    fn test_merge_keeps_existing_when_newer_is_blank() {
        let mut info = BusinessInfo {
            business_name: Some("Acme".into()),
            phone: Some("123".into()),
            ..BusinessInfo::default()
        };
        let newer = BusinessInfo {
            business_name: Some("  ".into()),
            phone: Some("456".into()),
            url: Some("https://acme.example".into()),
            ..BusinessInfo::default()
        };

        assert!(info.merge(&newer));
        assert_eq!(info.business_name.as_deref(), Some("Acme"));
        assert_eq!(info.phone.as_deref(), Some("456"));
        assert_eq!(info.url.as_deref(), Some("https://acme.example"));
        assert!(!info.merge(&newer));
    }

    #[test]
    fn test_display_name() {
        let addr = EmailAddress::parse("jane@acme.com").unwrap();
        let mut contact = Contact::new(&addr, BusinessInfo::default(), "", Utc::now());
        assert_eq!(contact.display_name(), "jane@acme.com");

        contact.business.business_name = Some("Acme".into());
        assert_eq!(contact.display_name(), "Acme");

        contact.business.first_name = Some("Jane".into());
        contact.business.surname = Some("Doe".into());
        assert_eq!(contact.display_name(), "Jane Doe (Acme)");
    }
}
