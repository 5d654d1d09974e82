//! services/api/src/web/rest.rs
//!
//! Contains the Axum handlers for the question endpoints and the master
//! definition for the OpenAPI specification.

use crate::error::{port_error_response, turn_error_response};
use crate::web::{admin, auth, protocol::*, state::AppState};
use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Json},
    Extension,
};
use chrono::Utc;
use medassist_core::domain::{UsageCounters, UserAccount};
use medassist_core::guest::TranscriptOwner;
use medassist_core::orchestrator::{Requester, TurnError, TurnOutcome};
use std::sync::Arc;
use tracing::{error, info, warn};
use utoipa::OpenApi;
use uuid::Uuid;

/// How many past exchanges `GET /queries` returns.
pub const HISTORY_LIMIT: i64 = 50;

pub const GUEST_ID_HEADER: &str = "x-guest-id";

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        auth::signup_handler,
        auth::login_handler,
        auth::logout_handler,
        ask_query_handler,
        guest_query_handler,
        suggestions_handler,
        list_queries_handler,
        usage_handler,
        conversation_handler,
        admin::list_users_handler,
        admin::update_role_handler,
        admin::update_enabled_handler,
        admin::delete_user_handler,
        admin::quota_policy_handler,
    ),
    components(
        schemas(
            auth::SignupRequest, auth::LoginRequest, auth::AuthResponse,
            AskQueryRequest, ChatTurnPayload, QueryResponse, ArticleResponse,
            SearchContextResponse, TermReferenceResponse, UsageResponse,
            SuggestionsResponse, QueryHistoryItem, ConversationResponse,
            UpdateRoleRequest, UpdateEnabledRequest, AdminUserResponse,
            RoleCeilingsResponse, QuotaPolicyResponse
        )
    ),
    tags(
        (name = "Medical Assistant API", description = "Clinical questions answered with recent literature.")
    )
)]
pub struct ApiDoc;

//=========================================================================================
// Helpers
//=========================================================================================

fn log_turn_failure(err: &TurnError) {
    match err {
        TurnError::Generation(e) => error!("turn failed: {}", e),
        TurnError::Quota(medassist_core::quota::QuotaError::Backend(e)) => {
            error!("quota check failed: {}", e)
        }
        other => info!("turn rejected: {}", other),
    }
}

/// Usage after the admitted question, which counts once it is stored.
fn usage_after_turn(state: &AppState, account: &UserAccount, outcome: &TurnOutcome) -> Option<UsageResponse> {
    let counters = outcome.usage_at_admission?;
    let added = u64::from(outcome.persisted);
    let ceilings = state.orchestrator.ledger().policy().ceilings(account.role);
    Some(UsageResponse::new(
        account.role,
        UsageCounters {
            daily_count: counters.daily_count + added,
            monthly_count: counters.monthly_count + added,
            ..counters
        },
        ceilings,
    ))
}

/// Summarizes the stored exchange without holding up the response.
fn spawn_summary(state: &AppState, outcome: &TurnOutcome) {
    if !outcome.persisted {
        return;
    }
    let orchestrator = state.orchestrator.clone();
    let record = outcome.record.clone();
    tokio::spawn(async move {
        orchestrator.summarize(&record).await;
    });
}

//=========================================================================================
// Question Handlers
//=========================================================================================

/// Ask a question as the signed-in user.
///
/// The question is checked against the role's daily and monthly ceilings before any
/// model call. Literature search is best effort; only the answer itself is required.
#[utoipa::path(
    post,
    path = "/queries",
    request_body = AskQueryRequest,
    responses(
        (status = 200, description = "Answer generated", body = QueryResponse),
        (status = 400, description = "Empty or too long prompt, or model not allowed"),
        (status = 401, description = "Not signed in"),
        (status = 403, description = "Account disabled"),
        (status = 429, description = "Daily or monthly limit reached"),
        (status = 502, description = "The language model failed")
    )
)]
pub async fn ask_query_handler(
    State(state): State<Arc<AppState>>,
    Extension(account): Extension<UserAccount>,
    Json(body): Json<AskQueryRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let requester = Requester::User(account.clone());
    let outcome = state
        .orchestrator
        .ask(&requester, body.into(), Utc::now())
        .await
        .map_err(|e| {
            log_turn_failure(&e);
            turn_error_response(&e)
        })?;

    spawn_summary(&state, &outcome);
    let usage = usage_after_turn(&state, &account, &outcome);
    Ok((StatusCode::OK, Json(QueryResponse::from_outcome(&outcome, usage))))
}

/// Ask a question without an account.
///
/// Guests are identified by a client-generated `x-guest-id` and get a small
/// lifetime number of questions.
#[utoipa::path(
    post,
    path = "/guest/queries",
    request_body = AskQueryRequest,
    responses(
        (status = 200, description = "Answer generated", body = QueryResponse),
        (status = 400, description = "Missing guest id or invalid question"),
        (status = 429, description = "Guest limit reached"),
        (status = 502, description = "The language model failed")
    ),
    params(
        ("x-guest-id" = String, Header, description = "A client-generated guest identifier.")
    )
)]
pub async fn guest_query_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<AskQueryRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let guest_id = headers
        .get(GUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .ok_or_else(|| {
            (
                StatusCode::BAD_REQUEST,
                format!("{} header is required", GUEST_ID_HEADER),
            )
        })?
        .to_string();

    let outcome = state
        .orchestrator
        .ask(&Requester::Guest(guest_id.clone()), body.into(), Utc::now())
        .await
        .map_err(|e| {
            log_turn_failure(&e);
            turn_error_response(&e)
        })?;

    spawn_summary(&state, &outcome);
    let guests = state.orchestrator.guests();
    let remaining = guests.limit().saturating_sub(guests.used(&guest_id).await);
    let mut response = QueryResponse::from_outcome(&outcome, None);
    response.guest_queries_remaining = Some(remaining);
    Ok((StatusCode::OK, Json(response)))
}

/// Suggest follow-up questions for a stored exchange.
///
/// Generator failures yield an empty list.
#[utoipa::path(
    post,
    path = "/queries/{id}/suggestions",
    responses(
        (status = 200, description = "Suggestions generated", body = SuggestionsResponse),
        (status = 404, description = "No such query for this user")
    ),
    params(
        ("id" = Uuid, Path, description = "The query id.")
    )
)]
pub async fn suggestions_handler(
    State(state): State<Arc<AppState>>,
    Extension(account): Extension<UserAccount>,
    Path(query_id): Path<Uuid>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let record = state
        .db
        .get_query(query_id)
        .await
        .map_err(|e| port_error_response(&e, "load the query"))?;
    if record.user_id != Some(account.id) {
        warn!(%query_id, user_id = %account.id, "suggestions requested for another user's query");
        return Err((StatusCode::NOT_FOUND, format!("Query {} not found", query_id)));
    }

    let suggestions = state.orchestrator.suggest_follow_ups(&record).await;
    Ok(Json(SuggestionsResponse {
        query_id,
        suggestions,
    }))
}

/// The caller's past questions, newest first.
#[utoipa::path(
    get,
    path = "/queries",
    responses(
        (status = 200, description = "History", body = [QueryHistoryItem])
    )
)]
pub async fn list_queries_handler(
    State(state): State<Arc<AppState>>,
    Extension(account): Extension<UserAccount>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let records = state
        .db
        .list_queries_for_user(account.id, HISTORY_LIMIT)
        .await
        .map_err(|e| {
            error!("Failed to list queries: {:?}", e);
            port_error_response(&e, "list queries")
        })?;
    let items: Vec<QueryHistoryItem> = records.into_iter().map(QueryHistoryItem::from).collect();
    Ok(Json(items))
}

/// Questions used today and this month against the role's ceilings.
#[utoipa::path(
    get,
    path = "/usage",
    responses(
        (status = 200, description = "Usage counters", body = UsageResponse),
        (status = 503, description = "Counters unavailable")
    )
)]
pub async fn usage_handler(
    State(state): State<Arc<AppState>>,
    Extension(account): Extension<UserAccount>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let ledger = state.orchestrator.ledger();
    let counters = ledger.counters(account.id, Utc::now()).await.map_err(|e| {
        error!("Failed to count usage: {:?}", e);
        (
            StatusCode::SERVICE_UNAVAILABLE,
            "Usage is not available right now".to_string(),
        )
    })?;
    let ceilings = ledger.policy().ceilings(account.role);
    Ok(Json(UsageResponse::new(account.role, counters, ceilings)))
}

/// The most recent conversation, as cached on the server.
#[utoipa::path(
    get,
    path = "/conversation",
    responses(
        (status = 200, description = "Cached transcript", body = ConversationResponse)
    )
)]
pub async fn conversation_handler(
    State(state): State<Arc<AppState>>,
    Extension(account): Extension<UserAccount>,
) -> impl IntoResponse {
    let turns = state
        .orchestrator
        .transcripts()
        .load(&TranscriptOwner::User(account.id))
        .await;
    Json(ConversationResponse::from(turns))
}
