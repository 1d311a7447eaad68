//! Validated, normalized email addresses.

use std::fmt;

/// Why an address failed format validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum AddressError {
    /// Address is empty.
    #[error("email address is empty")]
    Empty,
    /// Address has no `@`.
    #[error("email address has no '@'")]
    MissingAt,
    /// Address has more than one `@`.
    #[error("email address has more than one '@'")]
    MultipleAt,
    /// Nothing before the `@`.
    #[error("email address has an empty local part")]
    EmptyLocalPart,
    /// Nothing after the `@`.
    #[error("email address has an empty domain")]
    EmptyDomain,
    /// Domain has no dot or an empty label.
    #[error("email address has an invalid domain")]
    InvalidDomain,
    /// Address contains whitespace.
    #[error("email address contains whitespace")]
    Whitespace,
}

/// An email address that passed format validation.
///
/// The address is trimmed and lower-cased; two addresses that differ only in
/// case are the same address.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EmailAddress {
    address: String,
    at: usize,
}

impl EmailAddress {
    /// Validates and normalizes a raw address.
    ///
    /// # Errors
    ///
    /// Returns an [`AddressError`] describing the first format problem found.
    pub fn parse(raw: &str) -> Result<Self, AddressError> {
        let address = raw.trim().to_lowercase();

        if address.is_empty() {
            return Err(AddressError::Empty);
        }
        if address.chars().any(char::is_whitespace) {
            return Err(AddressError::Whitespace);
        }

        let at = address.find('@').ok_or(AddressError::MissingAt)?;
        if address[at + 1..].contains('@') {
            return Err(AddressError::MultipleAt);
        }

        let local = &address[..at];
        let domain = &address[at + 1..];

        if local.is_empty() {
            return Err(AddressError::EmptyLocalPart);
        }
        if domain.is_empty() {
            return Err(AddressError::EmptyDomain);
        }
        if !domain.contains('.') || domain.split('.').any(str::is_empty) {
            return Err(AddressError::InvalidDomain);
        }

        Ok(Self { address, at })
    }

    /// The full normalized address.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.address
    }

    /// The part before the `@`.
    #[must_use]
    pub fn local_part(&self) -> &str {
        &self.address[..self.at]
    }

    /// The part after the `@`.
    #[must_use]
    pub fn domain(&self) -> &str {
        &self.address[self.at + 1..]
    }

    /// Consumes the address, returning the normalized string.
    #[must_use]
    pub fn into_string(self) -> String {
        self.address
    }
}

impl fmt::Display for EmailAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.address)
    }
}

impl AsRef<str> for EmailAddress {
    fn as_ref(&self) -> &str {
        &self.address
    }
}

impl std::str::FromStr for EmailAddress {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
