use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Difficulty::Easy => write!(f, "easy"),
            Difficulty::Medium => write!(f, "medium"),
            Difficulty::Hard => write!(f, "hard"),
        }
    }
}

impl FromStr for Difficulty {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "easy" => Ok(Difficulty::Easy),
            "medium" => Ok(Difficulty::Medium),
            "hard" => Ok(Difficulty::Hard),
            other => Err(format!("unknown difficulty: {}", other)),
        }
    }
}

/// A classified claim supplied by the headline source. Immutable for the
/// round in which it is active.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Headline {
    pub id: String,
    pub text: String,
    pub is_true: bool,
    pub difficulty: Difficulty,
    pub category: String,
    #[serde(default)]
    pub explanation: Option<String>,
}

/// The part of a headline every player may see before the round resolves.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicHeadline {
    pub id: String,
    pub text: String,
    pub difficulty: Difficulty,
    pub category: String,
}

impl From<&Headline> for PublicHeadline {
    fn from(headline: &Headline) -> Self {
        PublicHeadline {
            id: headline.id.clone(),
            text: headline.text.clone(),
            difficulty: headline.difficulty,
            category: headline.category.clone(),
        }
    }
}
