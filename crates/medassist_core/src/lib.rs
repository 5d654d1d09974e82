pub mod domain;
pub mod enrichment;
pub mod guest;
pub mod orchestrator;
pub mod ports;
pub mod quota;
pub mod render;
#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use domain::{
    BibliographicArticle, BibliographicQuery, ChatTurn, PublicationWindow, QueryRecord, Role,
    SearchContext, UsageCounters, UserAccount, UserCredentials,
};
pub use orchestrator::{
    AskRequest, ConversationOrchestrator, ConversationServices, FollowUps, OrchestratorSettings,
    Requester, TurnError, TurnOutcome, ValidationError,
};
pub use ports::{
    AnswerGenerationService, AnswerRequest, BibliographicSearchService, DatabaseService,
    KeywordGenerationService, LocalStore, PortError, PortResult, SuggestionService,
    SummaryService, TranslationService,
};
pub use quota::{QuotaError, QuotaLedger, QuotaPolicy, QuotaWindow, RoleCeilings};
pub use render::{render_answer, RenderedAnswer};
