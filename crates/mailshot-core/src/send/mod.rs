//! Dispatch-time eligibility, frequency control and the send run itself.

mod dispatch;
mod frequency;
mod gate;

pub use dispatch::{CampaignDispatcher, SendReport};
pub use frequency::{
    DEFAULT_MIN_INTERVAL_DAYS, FrequencyTracker, MAX_INTERVAL_DAYS, interval_from_days,
    within_cooldown,
};
pub use gate::{Eligibility, SendEligibilityGate};
