//! Grounded answer generation

pub mod answerer;
pub mod messages;
pub mod prompt;

pub use answerer::{AnswerOutcome, AnswerStage, Answerer, AnswererOptions};
pub use prompt::PromptBuilder;
