//! Campaign records and campaign-scoped recipient selection.

mod builder;
mod model;
mod repository;

pub use builder::{BuildReport, CampaignBuilder, Inclusion};
pub use model::{Campaign, CampaignStatus};
pub use repository::CampaignRepository;
