//! Ulpan - progress aggregation and scoring for a language-learning platform
//!
//! One canonical progress aggregate per user, with monotonic score
//! roll-ups (task -> level -> topic -> total), idempotent learned-word
//! tracking, and badge/rank derivation from configurable threshold
//! tables. Content generation and HTTP handling live outside this crate;
//! request handlers call into [`progress::ProgressService`] with an
//! already-authenticated user id.

pub mod catalog;
pub mod config;
pub mod error;
pub mod legacy;
pub mod progress;

pub use config::AppConfig;
pub use error::ProgressError;
pub use progress::{ProgressService, UserProgress};
