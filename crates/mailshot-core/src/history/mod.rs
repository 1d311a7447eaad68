//! Append-only log of send attempts and send-time skips.

mod model;
mod repository;

pub use model::{EmailHistoryRecord, HistoryStatus};
pub use repository::HistoryRepository;
