//! The progress core: aggregate model, roll-up ledger, scoring, badges,
//! persistence and the service facade

pub mod badges;
pub mod ledger;
pub mod model;
pub mod scoring;
pub mod service;
pub mod store;
pub mod views;

pub use model::UserProgress;
pub use service::ProgressService;
pub use store::{JsonProgressStore, MemoryProgressStore, ProgressStore};
