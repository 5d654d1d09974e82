//! services/api/src/web/protocol.rs
//!
//! Defines the JSON payloads exchanged between the browser client and the API server.

use chrono::{DateTime, Utc};
use medassist_core::domain::{
    BibliographicArticle, ChatTurn, QueryRecord, Role, SearchContext, UsageCounters, UserAccount,
};
use medassist_core::orchestrator::{AskRequest, TurnOutcome};
use medassist_core::quota::RoleCeilings;
use medassist_core::render::TermReference;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

//=========================================================================================
// Payloads Sent FROM the Client
//=========================================================================================

/// A previous exchange the client wants the model to see.
#[derive(Deserialize, Serialize, Debug, Clone, ToSchema)]
pub struct ChatTurnPayload {
    pub prompt: String,
    pub answer: String,
}

/// A question, with the turns before it.
#[derive(Deserialize, Debug, ToSchema)]
pub struct AskQueryRequest {
    pub prompt: String,
    #[serde(default)]
    pub history: Vec<ChatTurnPayload>,
    /// One of the allowed models; the default model when omitted.
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default = "default_true")]
    pub use_literature: bool,
}

fn default_true() -> bool {
    true
}

impl From<AskQueryRequest> for AskRequest {
    fn from(body: AskQueryRequest) -> Self {
        AskRequest {
            prompt: body.prompt,
            history: body
                .history
                .into_iter()
                .map(|t| ChatTurn {
                    prompt: t.prompt,
                    answer: t.answer,
                })
                .collect(),
            model: body.model,
            use_literature: body.use_literature,
        }
    }
}

#[derive(Deserialize, Debug, ToSchema)]
pub struct UpdateRoleRequest {
    /// `free`, `premium`, `test` or `admin`.
    pub role: String,
}

#[derive(Deserialize, Debug, ToSchema)]
pub struct UpdateEnabledRequest {
    pub enabled: bool,
}

//=========================================================================================
// Payloads Sent FROM the Server
//=========================================================================================

#[derive(Serialize, Debug, Clone, ToSchema)]
pub struct ArticleResponse {
    pub id: String,
    pub pmid: Option<String>,
    pub title: String,
    pub authors: String,
    pub abstract_text: String,
    pub journal: String,
    pub publication_year: Option<i32>,
    pub doi: Option<String>,
    pub url: String,
}

impl From<&BibliographicArticle> for ArticleResponse {
    fn from(a: &BibliographicArticle) -> Self {
        Self {
            id: a.id.clone(),
            pmid: a.pmid.clone(),
            title: a.title.clone(),
            authors: a.authors.clone(),
            abstract_text: a.abstract_text.clone(),
            journal: a.journal.clone(),
            publication_year: a.publication_year,
            doi: a.doi.clone(),
            url: a.url.clone(),
        }
    }
}

/// What the literature search saw and found for a question.
#[derive(Serialize, Debug, Clone, ToSchema)]
pub struct SearchContextResponse {
    pub original_query: String,
    pub translated_query: String,
    pub keywords: Vec<String>,
    pub articles: Vec<ArticleResponse>,
}

impl From<&SearchContext> for SearchContextResponse {
    fn from(c: &SearchContext) -> Self {
        Self {
            original_query: c.original_query.clone(),
            translated_query: c.translated_query.clone(),
            keywords: c.keywords.clone(),
            articles: c.articles.iter().map(ArticleResponse::from).collect(),
        }
    }
}

/// A medical term highlighted in the rendered answer.
#[derive(Serialize, Debug, Clone, ToSchema)]
pub struct TermReferenceResponse {
    pub term: String,
    pub display: String,
    pub definition: String,
    pub citation: String,
}

impl From<&TermReference> for TermReferenceResponse {
    fn from(r: &TermReference) -> Self {
        Self {
            term: r.term.clone(),
            display: r.display.clone(),
            definition: r.definition.clone(),
            citation: r.citation.clone(),
        }
    }
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq, ToSchema)]
pub struct UsageResponse {
    pub role: String,
    pub daily_count: u64,
    pub monthly_count: u64,
    /// `null` means no ceiling.
    pub daily_ceiling: Option<u64>,
    pub monthly_ceiling: Option<u64>,
}

impl UsageResponse {
    pub fn new(role: Role, counters: UsageCounters, ceilings: RoleCeilings) -> Self {
        Self {
            role: role.as_str().to_string(),
            daily_count: counters.daily_count,
            monthly_count: counters.monthly_count,
            daily_ceiling: ceilings.daily,
            monthly_ceiling: ceilings.monthly,
        }
    }
}

/// A completed turn.
#[derive(Serialize, Debug, ToSchema)]
pub struct QueryResponse {
    pub query_id: Uuid,
    /// The raw model output.
    pub answer: String,
    /// Sanitized HTML with citation links and term highlights.
    pub rendered_html: String,
    pub references: Vec<TermReferenceResponse>,
    pub search_context: Option<SearchContextResponse>,
    /// False when the answer could not be stored.
    pub persisted: bool,
    /// Counters at admission, for signed-in users.
    pub usage: Option<UsageResponse>,
    /// Guest questions left, for guests.
    pub guest_queries_remaining: Option<u32>,
}

impl QueryResponse {
    pub fn from_outcome(outcome: &TurnOutcome, usage: Option<UsageResponse>) -> Self {
        Self {
            query_id: outcome.record.id,
            answer: outcome.record.response.clone().unwrap_or_default(),
            rendered_html: outcome.rendered.html.clone(),
            references: outcome
                .rendered
                .references
                .iter()
                .map(TermReferenceResponse::from)
                .collect(),
            search_context: outcome.search_context.as_ref().map(SearchContextResponse::from),
            persisted: outcome.persisted,
            usage,
            guest_queries_remaining: None,
        }
    }
}

#[derive(Serialize, Debug, ToSchema)]
pub struct SuggestionsResponse {
    pub query_id: Uuid,
    pub suggestions: Vec<String>,
}

/// One stored exchange in the caller's history.
#[derive(Serialize, Debug, ToSchema)]
pub struct QueryHistoryItem {
    pub id: Uuid,
    pub prompt: String,
    pub response: Option<String>,
    pub summary: Option<String>,
    pub model: String,
    pub keywords: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl From<QueryRecord> for QueryHistoryItem {
    fn from(r: QueryRecord) -> Self {
        Self {
            id: r.id,
            prompt: r.prompt,
            response: r.response,
            summary: r.summary,
            model: r.model,
            keywords: r.keywords,
            created_at: r.created_at,
        }
    }
}

#[derive(Serialize, Debug, ToSchema)]
pub struct ConversationResponse {
    pub turns: Vec<ChatTurnPayload>,
}

impl From<Vec<ChatTurn>> for ConversationResponse {
    fn from(turns: Vec<ChatTurn>) -> Self {
        Self {
            turns: turns
                .into_iter()
                .map(|t| ChatTurnPayload {
                    prompt: t.prompt,
                    answer: t.answer,
                })
                .collect(),
        }
    }
}

#[derive(Serialize, Debug, ToSchema)]
pub struct AdminUserResponse {
    pub id: Uuid,
    pub email: String,
    pub role: String,
    pub enabled: bool,
    pub created_at: DateTime<Utc>,
    /// Missing when the counters could not be read.
    pub usage: Option<UsageResponse>,
}

impl AdminUserResponse {
    pub fn new(account: UserAccount, usage: Option<UsageResponse>) -> Self {
        Self {
            id: account.id,
            email: account.email,
            role: account.role.as_str().to_string(),
            enabled: account.enabled,
            created_at: account.created_at,
            usage,
        }
    }
}

#[derive(Serialize, Debug, ToSchema)]
pub struct RoleCeilingsResponse {
    pub role: String,
    pub daily: Option<u64>,
    pub monthly: Option<u64>,
}

#[derive(Serialize, Debug, ToSchema)]
pub struct QuotaPolicyResponse {
    pub roles: Vec<RoleCeilingsResponse>,
    pub guest_limit: u32,
    pub utc_offset_minutes: i32,
}
