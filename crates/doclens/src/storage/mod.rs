//! Persistent storage

pub mod feedback;

pub use feedback::{FeedbackStore, SqliteFeedbackStore, StoredFeedback};
