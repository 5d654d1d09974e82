//! crates/medassist_core/src/testing.rs
//!
//! In-memory implementations of every port, shared by unit tests, the end-to-end
//! test and the API crate's handler tests. All state sits behind a `Mutex` so the
//! fakes can be scripted after being handed to the orchestrator.

use async_trait::async_trait;
use chrono::{DateTime, Offset, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use uuid::Uuid;

use crate::domain::{
    BibliographicArticle, BibliographicQuery, QueryRecord, Role, UserAccount, UserCredentials,
};
use crate::orchestrator::{ConversationOrchestrator, ConversationServices, OrchestratorSettings};
use crate::ports::{
    AnswerGenerationService, AnswerRequest, BibliographicSearchService, DatabaseService,
    KeywordGenerationService, LocalStore, PortError, PortResult, SuggestionService,
    SummaryService, TranslationService,
};
use crate::quota::QuotaPolicy;

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn injected(what: &str) -> PortError {
    PortError::Unexpected(format!("injected {} failure", what))
}

//=========================================================================================
// Builders
//=========================================================================================

pub fn account(role: Role) -> UserAccount {
    let id = Uuid::new_v4();
    UserAccount {
        id,
        email: format!("{}-{}@example.org", role, id.simple()),
        role,
        enabled: true,
        created_at: Utc::now(),
    }
}

/// A PubMed-style article whose URL contains the id.
pub fn article(id: &str, title: &str, year: i32) -> BibliographicArticle {
    BibliographicArticle {
        id: id.to_string(),
        pmid: Some(id.to_string()),
        title: title.to_string(),
        authors: "Doe J, Roe R".to_string(),
        abstract_text: String::new(),
        journal: "J Orthop Res".to_string(),
        publication_year: Some(year),
        doi: None,
        url: format!("https://pubmed.ncbi.nlm.nih.gov/{}/", id),
    }
}

//=========================================================================================
// Database
//=========================================================================================

#[derive(Default)]
struct DbState {
    users: HashMap<Uuid, (UserAccount, String)>,
    sessions: HashMap<String, (Uuid, DateTime<Utc>)>,
    queries: Vec<QueryRecord>,
    fail_counts: bool,
    fail_saves: bool,
}

#[derive(Default)]
pub struct FakeDatabase {
    state: Mutex<DbState>,
}

impl FakeDatabase {
    /// Stores a minimal record created at `when`.
    pub fn insert_query_at(&self, user_id: Option<Uuid>, when: DateTime<Utc>) {
        lock(&self.state).queries.push(QueryRecord {
            id: Uuid::new_v4(),
            user_id,
            prompt: "seeded".to_string(),
            response: Some("seeded".to_string()),
            summary: None,
            model: "seeded".to_string(),
            created_at: when,
            bibliographic_references: None,
            keywords: Vec::new(),
            translated_query: None,
        });
    }

    /// Registers an account directly, bypassing signup.
    pub fn insert_user(&self, account: UserAccount, hashed_password: &str) {
        lock(&self.state)
            .users
            .insert(account.id, (account, hashed_password.to_string()));
    }

    pub fn fail_counts(&self) {
        lock(&self.state).fail_counts = true;
    }

    pub fn fail_saves(&self) {
        lock(&self.state).fail_saves = true;
    }

    pub fn stored_queries(&self) -> Vec<QueryRecord> {
        lock(&self.state).queries.clone()
    }
}

#[async_trait]
impl DatabaseService for FakeDatabase {
    async fn create_user_with_email(
        &self,
        email: &str,
        hashed_password: &str,
    ) -> PortResult<UserAccount> {
        let mut state = lock(&self.state);
        if state.users.values().any(|(u, _)| u.email == email) {
            return Err(PortError::Unexpected(format!("email {} already registered", email)));
        }
        let account = UserAccount {
            id: Uuid::new_v4(),
            email: email.to_string(),
            role: Role::Free,
            enabled: true,
            created_at: Utc::now(),
        };
        state
            .users
            .insert(account.id, (account.clone(), hashed_password.to_string()));
        Ok(account)
    }

    async fn get_user_by_email(&self, email: &str) -> PortResult<UserCredentials> {
        lock(&self.state)
            .users
            .values()
            .find(|(u, _)| u.email == email)
            .map(|(u, hash)| UserCredentials {
                user_id: u.id,
                email: u.email.clone(),
                hashed_password: hash.clone(),
                enabled: u.enabled,
            })
            .ok_or_else(|| PortError::NotFound(format!("user {}", email)))
    }

    async fn get_user(&self, user_id: Uuid) -> PortResult<UserAccount> {
        lock(&self.state)
            .users
            .get(&user_id)
            .map(|(u, _)| u.clone())
            .ok_or_else(|| PortError::NotFound(format!("user {}", user_id)))
    }

    async fn list_users(&self) -> PortResult<Vec<UserAccount>> {
        let mut users: Vec<_> = lock(&self.state)
            .users
            .values()
            .map(|(u, _)| u.clone())
            .collect();
        users.sort_by_key(|u| u.created_at);
        Ok(users)
    }

    async fn update_user_role(&self, user_id: Uuid, role: Role) -> PortResult<UserAccount> {
        let mut state = lock(&self.state);
        let (user, _) = state
            .users
            .get_mut(&user_id)
            .ok_or_else(|| PortError::NotFound(format!("user {}", user_id)))?;
        user.role = role;
        Ok(user.clone())
    }

    async fn set_user_enabled(&self, user_id: Uuid, enabled: bool) -> PortResult<UserAccount> {
        let mut state = lock(&self.state);
        let (user, _) = state
            .users
            .get_mut(&user_id)
            .ok_or_else(|| PortError::NotFound(format!("user {}", user_id)))?;
        user.enabled = enabled;
        Ok(user.clone())
    }

    async fn delete_user(&self, user_id: Uuid) -> PortResult<()> {
        let mut state = lock(&self.state);
        if state.users.remove(&user_id).is_none() {
            return Err(PortError::NotFound(format!("user {}", user_id)));
        }
        state.sessions.retain(|_, (owner, _)| *owner != user_id);
        state.queries.retain(|q| q.user_id != Some(user_id));
        Ok(())
    }

    async fn create_auth_session(
        &self,
        session_id: &str,
        user_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> PortResult<()> {
        lock(&self.state)
            .sessions
            .insert(session_id.to_string(), (user_id, expires_at));
        Ok(())
    }

    async fn validate_auth_session(&self, session_id: &str) -> PortResult<Uuid> {
        match lock(&self.state).sessions.get(session_id) {
            Some((user_id, expires_at)) if *expires_at > Utc::now() => Ok(*user_id),
            _ => Err(PortError::Unauthorized),
        }
    }

    async fn delete_auth_session(&self, session_id: &str) -> PortResult<()> {
        lock(&self.state).sessions.remove(session_id);
        Ok(())
    }

    async fn save_query(&self, record: &QueryRecord) -> PortResult<()> {
        let mut state = lock(&self.state);
        if state.fail_saves {
            return Err(injected("save"));
        }
        state.queries.push(record.clone());
        Ok(())
    }

    async fn get_query(&self, query_id: Uuid) -> PortResult<QueryRecord> {
        lock(&self.state)
            .queries
            .iter()
            .find(|q| q.id == query_id)
            .cloned()
            .ok_or_else(|| PortError::NotFound(format!("query {}", query_id)))
    }

    async fn update_query_summary(&self, query_id: Uuid, summary: &str) -> PortResult<()> {
        let mut state = lock(&self.state);
        let record = state
            .queries
            .iter_mut()
            .find(|q| q.id == query_id)
            .ok_or_else(|| PortError::NotFound(format!("query {}", query_id)))?;
        record.summary = Some(summary.to_string());
        Ok(())
    }

    async fn list_queries_for_user(
        &self,
        user_id: Uuid,
        limit: i64,
    ) -> PortResult<Vec<QueryRecord>> {
        let mut records: Vec<_> = lock(&self.state)
            .queries
            .iter()
            .filter(|q| q.user_id == Some(user_id))
            .cloned()
            .collect();
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        records.truncate(limit.max(0) as usize);
        Ok(records)
    }

    async fn count_queries_between(
        &self,
        user_id: Uuid,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> PortResult<u64> {
        let state = lock(&self.state);
        if state.fail_counts {
            return Err(injected("count"));
        }
        Ok(state
            .queries
            .iter()
            .filter(|q| q.user_id == Some(user_id) && q.created_at >= from && q.created_at < to)
            .count() as u64)
    }
}

//=========================================================================================
// Generative collaborators
//=========================================================================================

/// Scripted reply shared by the text-producing fakes.
#[derive(Debug, Clone)]
enum Script {
    Echo(&'static str),
    Reply(String),
    Fail,
}

impl Script {
    fn run(&self, input: &str, what: &str) -> PortResult<String> {
        match self {
            Script::Echo(prefix) => Ok(format!("{}{}", prefix, input)),
            Script::Reply(reply) => Ok(reply.clone()),
            Script::Fail => Err(injected(what)),
        }
    }
}

macro_rules! scripted_fake {
    ($name:ident, $default:expr) => {
        pub struct $name {
            script: Mutex<Script>,
            calls: Mutex<usize>,
        }

        impl Default for $name {
            fn default() -> Self {
                Self {
                    script: Mutex::new($default),
                    calls: Mutex::new(0),
                }
            }
        }

        impl $name {
            pub fn replying(reply: &str) -> Self {
                let fake = Self::default();
                fake.set_reply(reply);
                fake
            }

            pub fn failing() -> Self {
                let fake = Self::default();
                fake.fail();
                fake
            }

            pub fn set_reply(&self, reply: &str) {
                *lock(&self.script) = Script::Reply(reply.to_string());
            }

            pub fn fail(&self) {
                *lock(&self.script) = Script::Fail;
            }

            pub fn calls(&self) -> usize {
                *lock(&self.calls)
            }

            fn run(&self, input: &str, what: &str) -> PortResult<String> {
                *lock(&self.calls) += 1;
                let script = lock(&self.script).clone();
                script.run(input, what)
            }
        }
    };
}

scripted_fake!(FakeTranslator, Script::Echo("translated: "));
scripted_fake!(FakeKeywordGenerator, Script::Reply("osteoarthritis, knee".to_string()));
scripted_fake!(FakeSummarizer, Script::Reply("Summary of the exchange".to_string()));
scripted_fake!(
    FakeSuggester,
    Script::Reply("What are the risks?\nWhen should I see a surgeon?".to_string())
);

/// Answers with a fixed reply and remembers the last request.
pub struct FakeAnswerer {
    script: Mutex<Script>,
    requests: Mutex<Vec<AnswerRequest>>,
}

impl Default for FakeAnswerer {
    fn default() -> Self {
        Self {
            script: Mutex::new(Script::Reply("Answer from the assistant.".to_string())),
            requests: Mutex::new(Vec::new()),
        }
    }
}

impl FakeAnswerer {
    pub fn set_reply(&self, reply: &str) {
        *lock(&self.script) = Script::Reply(reply.to_string());
    }

    pub fn fail(&self) {
        *lock(&self.script) = Script::Fail;
    }

    pub fn calls(&self) -> usize {
        lock(&self.requests).len()
    }

    pub fn last_request(&self) -> Option<AnswerRequest> {
        lock(&self.requests).last().cloned()
    }
}

#[async_trait]
impl TranslationService for FakeTranslator {
    async fn translate_to_english(&self, text: &str) -> PortResult<String> {
        self.run(text, "translation")
    }
}

#[async_trait]
impl KeywordGenerationService for FakeKeywordGenerator {
    async fn generate_keywords(&self, english_text: &str) -> PortResult<String> {
        self.run(english_text, "keyword")
    }
}

#[async_trait]
impl SummaryService for FakeSummarizer {
    async fn summarize(&self, record: &QueryRecord) -> PortResult<String> {
        self.run(&record.prompt, "summary")
    }
}

#[async_trait]
impl SuggestionService for FakeSuggester {
    async fn suggest_follow_ups(&self, prompt: &str, _answer: &str) -> PortResult<String> {
        self.run(prompt, "suggestion")
    }
}

#[async_trait]
impl AnswerGenerationService for FakeAnswerer {
    async fn generate_answer(&self, request: &AnswerRequest) -> PortResult<String> {
        lock(&self.requests).push(request.clone());
        let script = lock(&self.script).clone();
        script.run(&request.prompt, "answer")
    }
}

//=========================================================================================
// Bibliographic search
//=========================================================================================

#[derive(Default)]
pub struct FakeSearch {
    results: Mutex<Vec<BibliographicArticle>>,
    failing: Mutex<bool>,
    last_query: Mutex<Option<BibliographicQuery>>,
}

impl FakeSearch {
    pub fn returning(articles: Vec<BibliographicArticle>) -> Self {
        let search = Self::default();
        search.set_results(articles);
        search
    }

    pub fn failing() -> Self {
        let search = Self::default();
        search.fail();
        search
    }

    pub fn set_results(&self, articles: Vec<BibliographicArticle>) {
        *lock(&self.results) = articles;
    }

    pub fn fail(&self) {
        *lock(&self.failing) = true;
    }

    pub fn last_query(&self) -> Option<BibliographicQuery> {
        lock(&self.last_query).clone()
    }
}

#[async_trait]
impl BibliographicSearchService for FakeSearch {
    async fn search(&self, query: &BibliographicQuery) -> PortResult<Vec<BibliographicArticle>> {
        *lock(&self.last_query) = Some(query.clone());
        if *lock(&self.failing) {
            return Err(injected("search"));
        }
        Ok(lock(&self.results).clone())
    }
}

//=========================================================================================
// Local store
//=========================================================================================

#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
    failing: Mutex<bool>,
}

impl MemoryStore {
    /// Synchronous read for assertions.
    pub fn get_now(&self, key: &str) -> Option<String> {
        lock(&self.entries).get(key).cloned()
    }

    pub fn fail_all(&self) {
        *lock(&self.failing) = true;
    }

    fn check(&self) -> PortResult<()> {
        if *lock(&self.failing) {
            Err(injected("local store"))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl LocalStore for MemoryStore {
    async fn get(&self, key: &str) -> PortResult<Option<String>> {
        self.check()?;
        Ok(lock(&self.entries).get(key).cloned())
    }

    async fn set(&self, key: &str, value: String) -> PortResult<()> {
        self.check()?;
        lock(&self.entries).insert(key.to_string(), value);
        Ok(())
    }

    async fn remove(&self, key: &str) -> PortResult<()> {
        self.check()?;
        lock(&self.entries).remove(key);
        Ok(())
    }
}

//=========================================================================================
// Wiring
//=========================================================================================

/// Every fake, kept as concrete handles so tests can script them after wiring.
#[derive(Clone, Default)]
pub struct Fakes {
    pub db: Arc<FakeDatabase>,
    pub answers: Arc<FakeAnswerer>,
    pub translator: Arc<FakeTranslator>,
    pub keywords: Arc<FakeKeywordGenerator>,
    pub search: Arc<FakeSearch>,
    pub summaries: Arc<FakeSummarizer>,
    pub suggestions: Arc<FakeSuggester>,
    pub store: Arc<MemoryStore>,
}

impl Fakes {
    pub fn services(&self) -> ConversationServices {
        ConversationServices {
            db: self.db.clone(),
            answers: self.answers.clone(),
            translator: self.translator.clone(),
            keywords: self.keywords.clone(),
            search: self.search.clone(),
            summaries: self.summaries.clone(),
            suggestions: self.suggestions.clone(),
            local_store: self.store.clone(),
        }
    }

    pub fn settings(&self) -> OrchestratorSettings {
        OrchestratorSettings {
            default_model: "gpt-4o".to_string(),
            allowed_models: vec!["gpt-4o-mini".to_string()],
            max_prompt_chars: 4000,
            quota_policy: QuotaPolicy::default(),
            calendar_offset: Utc.fix(),
            guest_limit: crate::guest::DEFAULT_GUEST_LIMIT,
        }
    }

    pub fn orchestrator(&self) -> ConversationOrchestrator {
        ConversationOrchestrator::new(self.services(), self.settings())
    }
}
