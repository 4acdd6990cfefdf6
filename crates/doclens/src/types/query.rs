//! Query request types

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::Error;

/// Answer language offered to users
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[default]
    Fr,
    En,
    Es,
    Ar,
}

impl Language {
    /// All supported languages
    pub const ALL: [Language; 4] = [Language::Fr, Language::En, Language::Es, Language::Ar];

    /// ISO 639-1 code
    pub fn code(&self) -> &'static str {
        match self {
            Self::Fr => "fr",
            Self::En => "en",
            Self::Es => "es",
            Self::Ar => "ar",
        }
    }

    /// English name, used in generation instructions
    pub fn english_name(&self) -> &'static str {
        match self {
            Self::Fr => "French",
            Self::En => "English",
            Self::Es => "Spanish",
            Self::Ar => "Arabic",
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Language {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "fr" | "french" | "français" => Ok(Self::Fr),
            "en" | "english" => Ok(Self::En),
            "es" | "spanish" | "español" => Ok(Self::Es),
            "ar" | "arabic" => Ok(Self::Ar),
            other => Err(Error::invalid_config(format!("unsupported language '{}'", other))),
        }
    }
}

/// Query request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryRequest {
    /// The question to answer
    pub question: String,

    /// Answer language (default: fr)
    #[serde(default)]
    pub lang: Language,

    /// Number of chunks to retrieve (default: `retrieval.default_k`)
    #[serde(default)]
    pub k: Option<usize>,
}

/// Query response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryResponse {
    /// Answer text, possibly a degraded message
    pub answer: String,
    /// Language the answer was requested in
    pub lang: Language,
}
