//! Addresses and domains that must never be contacted.
//!
//! - **Unsubscribes**: a permanent veto on an exact address.
//! - **Existing customers**: a domain already served, exempt from campaigns.

mod model;
mod repository;
mod sync;

pub use model::{ExistingCustomerRecord, UnsubscribeRecord};
pub use repository::{CustomerRepository, UnsubscribeRepository};
pub use sync::{SyncReport, sync_unsubscribes};
