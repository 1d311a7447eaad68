//! Provider vs. business domain classification.

use std::collections::HashSet;

use super::address::{AddressError, EmailAddress};

/// Classification of an address's domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DomainClass {
    /// Shared mailbox domain (public webmail); many unrelated people.
    Provider,
    /// Presumed to belong to a single organization.
    Business,
}

impl DomainClass {
    /// Returns true for provider domains.
    #[must_use]
    pub const fn is_provider(&self) -> bool {
        matches!(self, Self::Provider)
    }
}

/// Classifies domains against a fixed set of provider domains.
///
/// Built once per run from the provider domain table and read-only afterwards.
#[derive(Debug, Clone, Default)]
pub struct DomainClassifier {
    providers: HashSet<String>,
}

impl DomainClassifier {
    /// Creates a classifier from a set of provider domains.
    ///
    /// Domains are trimmed and lower-cased.
    #[must_use]
    pub fn new<I, S>(providers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            providers: providers
                .into_iter()
                .map(|d| d.as_ref().trim().to_lowercase())
                .filter(|d| !d.is_empty())
                .collect(),
        }
    }

    /// Classifies a validated address.
    #[must_use]
    pub fn classify(&self, address: &EmailAddress) -> DomainClass {
        self.classify_domain(address.domain())
    }

    /// Classifies a bare domain.
    #[must_use]
    pub fn classify_domain(&self, domain: &str) -> DomainClass {
        if self.providers.contains(&domain.trim().to_lowercase()) {
            DomainClass::Provider
        } else {
            DomainClass::Business
        }
    }

    /// Validates a raw address and classifies it.
    ///
    /// # Errors
    ///
    /// Returns an [`AddressError`] if the address is malformed.
    pub fn classify_str(&self, raw: &str) -> Result<(EmailAddress, DomainClass), AddressError> {
        let address = EmailAddress::parse(raw)?;
        let class = self.classify(&address);
        Ok((address, class))
    }

    /// Number of known provider domains.
    #[must_use]
    pub fn provider_count(&self) -> usize {
        self.providers.len()
    }
}
