//! Master contact list and its admission rules.

mod model;
mod registry;
mod repository;

pub use model::{BusinessInfo, Contact, ContactCandidate};
pub use registry::{Admission, AdmissionReport, ContactRegistry};
pub use repository::ContactRepository;
