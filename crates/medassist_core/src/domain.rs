//! crates/medassist_core/src/domain.rs
//!
//! Defines the pure, core data structures for the application.
//! These structs are independent of any database driver or HTTP framework.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

//=========================================================================================
// Users and Roles
//=========================================================================================

/// The role of an account. Determines the quota ceilings, never the counter layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Free,
    Premium,
    Test,
    Admin,
}

impl Role {
    pub const ALL: [Role; 4] = [Role::Free, Role::Premium, Role::Test, Role::Admin];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Free => "free",
            Role::Premium => "premium",
            Role::Test => "test",
            Role::Admin => "admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("Unknown role: {0}")]
pub struct UnknownRole(pub String);

impl FromStr for Role {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "free" => Ok(Role::Free),
            "premium" => Ok(Role::Premium),
            "test" => Ok(Role::Test),
            "admin" => Ok(Role::Admin),
            other => Err(UnknownRole(other.to_string())),
        }
    }
}

/// A registered account as seen by the core.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserAccount {
    pub id: Uuid,
    pub email: String,
    pub role: Role,
    pub enabled: bool,
    pub created_at: DateTime<Utc>,
}

// Only used internally for login/signup - contains sensitive data
#[derive(Debug, Clone)]
pub struct UserCredentials {
    pub user_id: Uuid,
    pub email: String,
    pub hashed_password: String,
    pub enabled: bool,
}

//=========================================================================================
// Bibliographic Data
//=========================================================================================

/// A single article returned by a bibliographic source, normalized across backends.
///
/// Constructed once from a search response and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BibliographicArticle {
    pub id: String,
    pub pmid: Option<String>,
    pub title: String,
    /// Free text, e.g. "Smith J, Doe A" or "John Smith, Ana Doe".
    pub authors: String,
    pub abstract_text: String,
    pub journal: String,
    pub publication_year: Option<i32>,
    pub doi: Option<String>,
    pub url: String,
}

/// Inclusive range of publication years accepted for one search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicationWindow {
    pub from_year: i32,
    pub to_year: i32,
}

impl PublicationWindow {
    /// Number of years before the current one that are still accepted.
    pub const LOOKBACK_YEARS: i32 = 3;

    /// The window `[year - 3, year]`.
    pub fn ending_in(year: i32) -> Self {
        Self {
            from_year: year - Self::LOOKBACK_YEARS,
            to_year: year,
        }
    }

    pub fn contains(&self, year: i32) -> bool {
        (self.from_year..=self.to_year).contains(&year)
    }
}

/// What a bibliographic backend is asked for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BibliographicQuery {
    pub keywords: Vec<String>,
    pub window: PublicationWindow,
    pub max_results: usize,
}

impl BibliographicQuery {
    /// Joins the keywords with AND, quoting multi-word phrases.
    pub fn terms_expression(&self) -> String {
        self.keywords
            .iter()
            .map(|k| k.trim().replace('"', ""))
            .filter(|k| !k.is_empty())
            .map(|k| {
                if k.contains(char::is_whitespace) {
                    format!("\"{}\"", k)
                } else {
                    k
                }
            })
            .collect::<Vec<_>>()
            .join(" AND ")
    }
}

/// The bundle of translated query, keywords and retrieved articles for one question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchContext {
    pub original_query: String,
    pub translated_query: String,
    pub keywords: Vec<String>,
    pub articles: Vec<BibliographicArticle>,
}

//=========================================================================================
// Conversation Data
//=========================================================================================

/// One prior exchange sent back by the client as conversation context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub prompt: String,
    pub answer: String,
}

/// A persisted question-and-answer exchange.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryRecord {
    pub id: Uuid,
    pub user_id: Option<Uuid>,
    pub prompt: String,
    pub response: Option<String>,
    pub summary: Option<String>,
    pub model: String,
    pub created_at: DateTime<Utc>,
    pub bibliographic_references: Option<SearchContext>,
    pub keywords: Vec<String>,
    pub translated_query: Option<String>,
}

/// Counts of a user's queries inside the current day and month windows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct UsageCounters {
    pub user_id: Uuid,
    pub daily_count: u64,
    pub monthly_count: u64,
}
