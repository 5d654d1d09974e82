//! crates/medassist_core/src/orchestrator.rs
//!
//! Sequences one conversation turn:
//! validate -> admit (quota or guest throttle) -> literature context -> answer ->
//! persist -> render. Summary and follow-up suggestions are separate calls the
//! caller runs after the answer has been delivered.
//!
//! Only validation, admission and the answer call can fail a turn. Everything else
//! degrades and is logged.

use chrono::{DateTime, FixedOffset, Utc};
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::domain::{ChatTurn, QueryRecord, SearchContext, UsageCounters, UserAccount};
use crate::enrichment::{build_search_context, EnrichmentServices};
use crate::guest::{GuestLimitReached, GuestThrottle, TranscriptCache, TranscriptOwner};
use crate::ports::{
    AnswerGenerationService, AnswerRequest, BibliographicSearchService, DatabaseService,
    KeywordGenerationService, LocalStore, PortError, SuggestionService, SummaryService,
    TranslationService,
};
use crate::quota::{QuotaError, QuotaLedger, QuotaPolicy};
use crate::render::{render_answer, RenderedAnswer};

pub const MAX_SUGGESTIONS: usize = 3;

//=========================================================================================
// Inputs and Outputs
//=========================================================================================

/// Who is asking.
#[derive(Debug, Clone)]
pub enum Requester {
    User(UserAccount),
    /// An anonymous visitor, identified by a client-generated id.
    Guest(String),
}

impl Requester {
    fn user_id(&self) -> Option<Uuid> {
        match self {
            Requester::User(account) => Some(account.id),
            Requester::Guest(_) => None,
        }
    }

    fn transcript_owner(&self) -> TranscriptOwner {
        match self {
            Requester::User(account) => TranscriptOwner::User(account.id),
            Requester::Guest(id) => TranscriptOwner::Guest(id.clone()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AskRequest {
    pub prompt: String,
    pub history: Vec<ChatTurn>,
    pub model: Option<String>,
    pub use_literature: bool,
}

impl AskRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            history: Vec::new(),
            model: None,
            use_literature: true,
        }
    }
}

#[derive(Debug, Clone)]
pub struct TurnOutcome {
    pub record: QueryRecord,
    pub search_context: Option<SearchContext>,
    pub rendered: RenderedAnswer,
    /// False when the answer was delivered but could not be stored.
    pub persisted: bool,
    /// Counters observed when the question was admitted (users only).
    pub usage_at_admission: Option<UsageCounters>,
}

/// Summary and suggestions for a finished turn. Either may be missing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FollowUps {
    pub summary: Option<String>,
    pub suggestions: Vec<String>,
}

//=========================================================================================
// Errors
//=========================================================================================

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Please write a question before sending.")]
    EmptyPrompt,
    #[error("The question is too long (maximum {max} characters).")]
    PromptTooLong { max: usize },
    #[error("Model '{0}' is not available.")]
    ModelNotAllowed(String),
}

#[derive(Debug, thiserror::Error)]
pub enum TurnError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Quota(#[from] QuotaError),
    #[error(transparent)]
    GuestLimit(#[from] GuestLimitReached),
    #[error("This account is disabled.")]
    AccountDisabled,
    #[error("The assistant could not answer right now. Please try again.")]
    Generation(#[source] PortError),
}

//=========================================================================================
// Construction
//=========================================================================================

/// Every collaborator the orchestrator talks to.
#[derive(Clone)]
pub struct ConversationServices {
    pub db: Arc<dyn DatabaseService>,
    pub answers: Arc<dyn AnswerGenerationService>,
    pub translator: Arc<dyn TranslationService>,
    pub keywords: Arc<dyn KeywordGenerationService>,
    pub search: Arc<dyn BibliographicSearchService>,
    pub summaries: Arc<dyn SummaryService>,
    pub suggestions: Arc<dyn SuggestionService>,
    pub local_store: Arc<dyn LocalStore>,
}

#[derive(Debug, Clone)]
pub struct OrchestratorSettings {
    pub default_model: String,
    /// Models a client may pick. The default model is always allowed.
    pub allowed_models: Vec<String>,
    pub max_prompt_chars: usize,
    pub quota_policy: QuotaPolicy,
    pub calendar_offset: FixedOffset,
    pub guest_limit: u32,
}

pub struct ConversationOrchestrator {
    services: ConversationServices,
    ledger: QuotaLedger,
    guests: GuestThrottle,
    transcripts: TranscriptCache,
    settings: OrchestratorSettings,
}

impl ConversationOrchestrator {
    pub fn new(services: ConversationServices, settings: OrchestratorSettings) -> Self {
        let ledger = QuotaLedger::new(
            services.db.clone(),
            settings.quota_policy.clone(),
            settings.calendar_offset,
        );
        let guests = GuestThrottle::new(services.local_store.clone(), settings.guest_limit);
        let transcripts = TranscriptCache::new(services.local_store.clone());
        Self {
            services,
            ledger,
            guests,
            transcripts,
            settings,
        }
    }

    pub fn ledger(&self) -> &QuotaLedger {
        &self.ledger
    }

    pub fn guests(&self) -> &GuestThrottle {
        &self.guests
    }

    pub fn transcripts(&self) -> &TranscriptCache {
        &self.transcripts
    }

    //=====================================================================================
    // The Turn
    //=====================================================================================

    /// Checks the request before any network call; returns the trimmed prompt and
    /// the model to use.
    pub fn validate(&self, request: &AskRequest) -> Result<(String, String), ValidationError> {
        let prompt = request.prompt.trim();
        if prompt.is_empty() {
            return Err(ValidationError::EmptyPrompt);
        }
        if prompt.chars().count() > self.settings.max_prompt_chars {
            return Err(ValidationError::PromptTooLong {
                max: self.settings.max_prompt_chars,
            });
        }

        let model = match request.model.as_deref().map(str::trim) {
            None | Some("") => self.settings.default_model.clone(),
            Some(m) if m == self.settings.default_model => m.to_string(),
            Some(m) if self.settings.allowed_models.iter().any(|a| a == m) => m.to_string(),
            Some(m) => return Err(ValidationError::ModelNotAllowed(m.to_string())),
        };

        Ok((prompt.to_string(), model))
    }

    pub async fn ask(
        &self,
        requester: &Requester,
        request: AskRequest,
        now: DateTime<Utc>,
    ) -> Result<TurnOutcome, TurnError> {
        let started = Instant::now();
        let (prompt, model) = self.validate(&request)?;

        // --- Admission ---
        let usage_at_admission = match requester {
            Requester::User(account) => {
                if !account.enabled {
                    return Err(TurnError::AccountDisabled);
                }
                Some(self.ledger.check_and_reserve(account, now).await?)
            }
            Requester::Guest(guest_id) => {
                self.guests.check(guest_id).await?;
                None
            }
        };

        // --- Literature context (best effort) ---
        let search_context = if request.use_literature {
            let services = EnrichmentServices {
                translator: self.services.translator.as_ref(),
                keywords: self.services.keywords.as_ref(),
                search: self.services.search.as_ref(),
            };
            Some(build_search_context(services, &prompt, now).await)
        } else {
            None
        };
        let articles = search_context
            .as_ref()
            .map(|c| c.articles.clone())
            .unwrap_or_default();

        // --- Primary answer (fatal on failure) ---
        let answer_request = AnswerRequest {
            prompt: prompt.clone(),
            model: model.clone(),
            history: request.history,
            articles: articles.clone(),
        };
        let llm_started = Instant::now();
        let answer = self
            .services
            .answers
            .generate_answer(&answer_request)
            .await
            .map_err(|e| {
                error!("answer generation failed: {}", e);
                TurnError::Generation(e)
            })?;
        info!("⏱️ answer generation took: {:?}", llm_started.elapsed());

        // --- Persist (best effort) ---
        let record = QueryRecord {
            id: Uuid::new_v4(),
            user_id: requester.user_id(),
            prompt: prompt.clone(),
            response: Some(answer.clone()),
            summary: None,
            model,
            created_at: now,
            keywords: search_context
                .as_ref()
                .map(|c| c.keywords.clone())
                .unwrap_or_default(),
            translated_query: search_context.as_ref().map(|c| c.translated_query.clone()),
            bibliographic_references: search_context.clone(),
        };
        let persisted = match self.services.db.save_query(&record).await {
            Ok(()) => true,
            Err(e) => {
                error!(query_id = %record.id, "failed to store query, answer is still returned: {}", e);
                false
            }
        };

        if let Requester::Guest(guest_id) = requester {
            self.guests.record(guest_id).await;
        }
        self.transcripts
            .append(
                &requester.transcript_owner(),
                ChatTurn {
                    prompt,
                    answer: answer.clone(),
                },
            )
            .await;

        let rendered = render_answer(&answer, &articles);
        info!(
            query_id = %record.id,
            persisted,
            articles = articles.len(),
            citations = rendered.citations_linked,
            "⏱️ turn completed in {:?}",
            started.elapsed()
        );

        Ok(TurnOutcome {
            record,
            search_context,
            rendered,
            persisted,
            usage_at_admission,
        })
    }

    //=====================================================================================
    // Follow-ups
    //=====================================================================================

    /// Generates and stores a summary of a stored exchange. Failures are logged and
    /// yield `None`.
    pub async fn summarize(&self, record: &QueryRecord) -> Option<String> {
        let summary = match self.services.summaries.summarize(record).await {
            Ok(s) if !s.trim().is_empty() => s.trim().to_string(),
            Ok(_) => {
                warn!(query_id = %record.id, "summary generator returned nothing");
                return None;
            }
            Err(e) => {
                warn!(query_id = %record.id, "summary generation failed: {}", e);
                return None;
            }
        };

        if let Err(e) = self
            .services
            .db
            .update_query_summary(record.id, &summary)
            .await
        {
            error!(query_id = %record.id, "failed to store summary: {}", e);
        }
        Some(summary)
    }

    /// Follow-up questions for an exchange; empty when the generator fails.
    pub async fn suggest_follow_ups(&self, record: &QueryRecord) -> Vec<String> {
        let answer = record.response.as_deref().unwrap_or_default();
        match self
            .services
            .suggestions
            .suggest_follow_ups(&record.prompt, answer)
            .await
        {
            Ok(raw) => parse_suggestions(&raw),
            Err(e) => {
                warn!(query_id = %record.id, "suggestion generation failed: {}", e);
                Vec::new()
            }
        }
    }

    /// Runs summary and suggestions concurrently; each failure is isolated.
    pub async fn follow_ups(&self, record: &QueryRecord) -> FollowUps {
        let (summary, suggestions) =
            futures::join!(self.summarize(record), self.suggest_follow_ups(record));
        FollowUps {
            summary,
            suggestions,
        }
    }
}

/// One suggestion per line, list markers removed, at most three.
pub fn parse_suggestions(raw: &str) -> Vec<String> {
    raw.lines()
        .map(|line| {
            let line = line
                .trim()
                .trim_start_matches(|c: char| c == '-' || c == '*' || c == '•')
                .trim_start();
            let line = match line.find(|c: char| c == '.' || c == ')') {
                Some(pos) if pos > 0 && line[..pos].chars().all(|c| c.is_ascii_digit()) => {
                    line[pos + 1..].trim_start()
                }
                _ => line,
            };
            line.trim_matches('"').trim().to_string()
        })
        .filter(|line| !line.is_empty() && !line.ends_with(':'))
        .take(MAX_SUGGESTIONS)
        .collect()
}
