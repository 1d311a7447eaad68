//! Address validation and provider/business domain classification.
//!
//! The classifier is the single source of truth for whether a domain hosts
//! many unrelated mailboxes (provider) or belongs to one organization
//! (business). Master-list admission and campaign building both consult it.

mod address;
mod classifier;
mod repository;

pub use address::{AddressError, EmailAddress};
pub use classifier::{DomainClass, DomainClassifier};
pub use repository::{DEFAULT_PROVIDER_DOMAINS, ProviderDomainRepository};
