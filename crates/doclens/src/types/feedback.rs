//! Answer records and user ratings

use serde::{Deserialize, Serialize};

use super::query::Language;

/// Five-level satisfaction scale
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Rating {
    VeryDissatisfied,
    Dissatisfied,
    Neutral,
    Satisfied,
    VerySatisfied,
}

impl Rating {
    /// Label stored in the feedback table
    pub fn label(&self) -> &'static str {
        match self {
            Self::VeryDissatisfied => "very_dissatisfied",
            Self::Dissatisfied => "dissatisfied",
            Self::Neutral => "neutral",
            Self::Satisfied => "satisfied",
            Self::VerySatisfied => "very_satisfied",
        }
    }

    /// Parse a stored label
    pub fn from_label(label: &str) -> Option<Self> {
        match label {
            "very_dissatisfied" => Some(Self::VeryDissatisfied),
            "dissatisfied" => Some(Self::Dissatisfied),
            "neutral" => Some(Self::Neutral),
            "satisfied" => Some(Self::Satisfied),
            "very_satisfied" => Some(Self::VerySatisfied),
            _ => None,
        }
    }
}

/// A question/answer pair handed to the feedback store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnswerRecord {
    pub question: String,
    pub answer: String,
    pub lang: Language,
    #[serde(default)]
    pub rating: Option<Rating>,
}
