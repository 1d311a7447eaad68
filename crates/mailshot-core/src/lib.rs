//! # mailshot-core
//!
//! Campaign eligibility and deduplication engine for outbound email.
//!
//! This crate provides:
//! - Email address validation and provider/business domain classification
//! - The master contact list and its admission rules
//! - Campaign building with campaign-scoped deduplication
//! - Dispatch-time eligibility: unsubscribes, existing customers, cooldowns
//! - Send runs through a pluggable [`Delivery`] (`SendGrid` included)
//! - Local storage (`SQLite`)

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod batch;
pub mod campaigns;
pub mod contacts;
pub mod delivery;
pub mod domain;
mod error;
pub mod history;
pub mod send;
mod stats;
mod store;
pub mod suppression;
mod time;

pub use batch::{Batch, load_batch, parse_batch};
pub use campaigns::{BuildReport, Campaign, CampaignBuilder, CampaignRepository, CampaignStatus};
pub use contacts::{
    Admission, AdmissionReport, BusinessInfo, Contact, ContactCandidate, ContactRegistry,
    ContactRepository,
};
pub use delivery::{
    Delivery, DeliveryResult, MessageTemplate, OutgoingEmail, SendGridClient,
};
pub use domain::{DomainClass, DomainClassifier, EmailAddress, ProviderDomainRepository};
pub use error::{Error, Result};
pub use history::{EmailHistoryRecord, HistoryRepository, HistoryStatus};
pub use send::{
    CampaignDispatcher, DEFAULT_MIN_INTERVAL_DAYS, Eligibility, FrequencyTracker,
    MAX_INTERVAL_DAYS, SendEligibilityGate, SendReport, interval_from_days,
};
pub use stats::{Outcome, Rejection, Tally};
pub use store::Store;
pub use suppression::{
    CustomerRepository, SyncReport, UnsubscribeRepository, sync_unsubscribes,
};
pub use time::{Clock, ManualClock, SystemClock};
