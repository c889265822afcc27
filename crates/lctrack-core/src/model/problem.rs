//! Problem - a practice problem in the local catalog
//!
//! Each problem carries:
//! - Catalog metadata (id, slug, title, difficulty)
//! - Whether it is part of the active study set
//! - Its cached SM-2 scheduling state

use serde::{Deserialize, Serialize};

use crate::sm2::SchedulingState;

// ============================================================================
// DIFFICULTY
// ============================================================================

/// Catalog difficulty of a problem
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    #[default]
    Easy,
    Medium,
    Hard,
}

impl Difficulty {
    /// Convert to string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Difficulty::Easy => "Easy",
            Difficulty::Medium => "Medium",
            Difficulty::Hard => "Hard",
        }
    }

    /// Integer code stored in the database (0 = Easy, 2 = Hard)
    pub fn code(&self) -> i64 {
        match self {
            Difficulty::Easy => 0,
            Difficulty::Medium => 1,
            Difficulty::Hard => 2,
        }
    }

    /// Inverse of `code`
    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(Difficulty::Easy),
            1 => Some(Difficulty::Medium),
            2 => Some(Difficulty::Hard),
            _ => None,
        }
    }
}

impl std::fmt::Display for Difficulty {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Difficulty {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "easy" => Ok(Difficulty::Easy),
            "medium" => Ok(Difficulty::Medium),
            "hard" => Ok(Difficulty::Hard),
            _ => Err(format!("Unknown difficulty: {}", s)),
        }
    }
}

// ============================================================================
// PROBLEM
// ============================================================================

/// A problem with its scheduling state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Problem {
    /// Catalog identifier (the problem number)
    pub id: i64,
    /// URL slug, unique
    pub slug: String,
    /// Display title
    pub title: String,
    pub difficulty: Difficulty,
    /// Part of the active study set
    pub active: bool,
    /// Cached projection of the entry history
    pub state: SchedulingState,
}

/// Input for registering a problem
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewProblem {
    pub id: i64,
    pub slug: String,
    /// Defaults to a title derived from the slug when absent
    pub title: Option<String>,
    pub difficulty: Difficulty,
    pub active: bool,
}

impl NewProblem {
    /// Title to store: the given one, or the slug with words capitalised
    pub fn display_title(&self) -> String {
        match &self.title {
            Some(title) if !title.trim().is_empty() => title.trim().to_string(),
            _ => title_from_slug(&self.slug),
        }
    }
}

/// Lower-case, hyphen separated slug for a title
pub fn slugify(title: &str) -> String {
    let cleaned: String = title
        .to_lowercase()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '-' || c.is_whitespace())
        .collect();
    cleaned.split_whitespace().collect::<Vec<_>>().join("-")
}

/// "two-sum" -> "Two Sum"
pub fn title_from_slug(slug: &str) -> String {
    slug.split('-')
        .filter(|w| !w.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
