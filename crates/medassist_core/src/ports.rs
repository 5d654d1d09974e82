//! crates/medassist_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the application's core logic.
//! These traits form the boundary of the hexagonal architecture, keeping the core
//! independent of the database, the inference endpoint and the bibliographic APIs.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::{
    BibliographicArticle, BibliographicQuery, ChatTurn, QueryRecord, Role, UserAccount,
    UserCredentials,
};

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services (e.g., database, network).
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
    #[error("Unauthorized")]
    Unauthorized,
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

#[async_trait]
pub trait DatabaseService: Send + Sync {
    // --- Accounts ---
    async fn create_user_with_email(
        &self,
        email: &str,
        hashed_password: &str,
    ) -> PortResult<UserAccount>;

    async fn get_user_by_email(&self, email: &str) -> PortResult<UserCredentials>;

    async fn get_user(&self, user_id: Uuid) -> PortResult<UserAccount>;

    async fn list_users(&self) -> PortResult<Vec<UserAccount>>;

    async fn update_user_role(&self, user_id: Uuid, role: Role) -> PortResult<UserAccount>;

    async fn set_user_enabled(&self, user_id: Uuid, enabled: bool) -> PortResult<UserAccount>;

    /// Removes the account together with its sessions and stored queries.
    async fn delete_user(&self, user_id: Uuid) -> PortResult<()>;

    // --- Auth sessions ---
    async fn create_auth_session(
        &self,
        session_id: &str,
        user_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> PortResult<()>;

    async fn validate_auth_session(&self, session_id: &str) -> PortResult<Uuid>;

    async fn delete_auth_session(&self, session_id: &str) -> PortResult<()>;

    // --- Queries ---
    async fn save_query(&self, record: &QueryRecord) -> PortResult<()>;

    async fn get_query(&self, query_id: Uuid) -> PortResult<QueryRecord>;

    async fn update_query_summary(&self, query_id: Uuid, summary: &str) -> PortResult<()>;

    async fn list_queries_for_user(&self, user_id: Uuid, limit: i64)
        -> PortResult<Vec<QueryRecord>>;

    /// Counts the user's stored queries with `from <= created_at < to`.
    async fn count_queries_between(
        &self,
        user_id: Uuid,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> PortResult<u64>;
}

/// What the primary inference call receives.
#[derive(Debug, Clone)]
pub struct AnswerRequest {
    pub prompt: String,
    pub model: String,
    pub history: Vec<ChatTurn>,
    pub articles: Vec<BibliographicArticle>,
}

#[async_trait]
pub trait AnswerGenerationService: Send + Sync {
    /// Produces the assistant's answer for a clinical question.
    async fn generate_answer(&self, request: &AnswerRequest) -> PortResult<String>;
}

#[async_trait]
pub trait TranslationService: Send + Sync {
    /// Translates clinical text into English.
    async fn translate_to_english(&self, text: &str) -> PortResult<String>;
}

#[async_trait]
pub trait KeywordGenerationService: Send + Sync {
    /// Returns the raw generator output: medical terms separated by commas or newlines.
    async fn generate_keywords(&self, english_text: &str) -> PortResult<String>;
}

#[async_trait]
pub trait BibliographicSearchService: Send + Sync {
    /// Queries a biomedical index. Results come back most-relevant-first.
    async fn search(&self, query: &BibliographicQuery) -> PortResult<Vec<BibliographicArticle>>;
}

#[async_trait]
pub trait SummaryService: Send + Sync {
    /// Generates a short summary of a stored exchange.
    async fn summarize(&self, record: &QueryRecord) -> PortResult<String>;
}

#[async_trait]
pub trait SuggestionService: Send + Sync {
    /// Returns raw follow-up suggestions, one per line.
    async fn suggest_follow_ups(&self, prompt: &str, answer: &str) -> PortResult<String>;
}

/// A best-effort key-value store for client-local state (guest counters, cached
/// transcripts). Nothing stored here is authoritative.
#[async_trait]
pub trait LocalStore: Send + Sync {
    async fn get(&self, key: &str) -> PortResult<Option<String>>;

    async fn set(&self, key: &str, value: String) -> PortResult<()>;

    async fn remove(&self, key: &str) -> PortResult<()>;
}
