//! crates/medassist_core/src/enrichment/mod.rs
//!
//! Best-effort stages that build the literature context of a question:
//! translate -> extract keywords -> search. None of them can fail the request;
//! a failed stage hands back its fallback value marked as degraded.

pub mod keywords;
pub mod literature;
pub mod translation;

use chrono::{DateTime, Datelike, Utc};
use tracing::info;

use crate::domain::SearchContext;
use crate::ports::{BibliographicSearchService, KeywordGenerationService, TranslationService};

pub use keywords::{extract_keywords, fallback_keywords, parse_keywords};
pub use literature::search_literature;
pub use translation::translate;

/// Result of a best-effort stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageOutcome<T> {
    /// The collaborator answered and its output was usable.
    Complete(T),
    /// The collaborator failed; the value is the stage's fallback.
    Degraded(T),
}

impl<T> StageOutcome<T> {
    pub fn is_degraded(&self) -> bool {
        matches!(self, StageOutcome::Degraded(_))
    }

    pub fn value(&self) -> &T {
        match self {
            StageOutcome::Complete(v) | StageOutcome::Degraded(v) => v,
        }
    }

    pub fn into_value(self) -> T {
        match self {
            StageOutcome::Complete(v) | StageOutcome::Degraded(v) => v,
        }
    }
}

/// The three collaborators the literature chain talks to.
#[derive(Clone, Copy)]
pub struct EnrichmentServices<'a> {
    pub translator: &'a dyn TranslationService,
    pub keywords: &'a dyn KeywordGenerationService,
    pub search: &'a dyn BibliographicSearchService,
}

/// Runs the whole chain for one question. Always returns a context; with every
/// collaborator down it holds the original text, fallback keywords and no articles.
pub async fn build_search_context(
    services: EnrichmentServices<'_>,
    question: &str,
    now: DateTime<Utc>,
) -> SearchContext {
    let translated = translate(services.translator, question).await;
    let keywords = extract_keywords(services.keywords, translated.value()).await;
    let articles = search_literature(services.search, keywords.value(), now.year()).await;

    info!(
        translation_degraded = translated.is_degraded(),
        keywords_degraded = keywords.is_degraded(),
        articles = articles.value().len(),
        "literature context assembled"
    );

    SearchContext {
        original_query: question.to_string(),
        translated_query: translated.into_value(),
        keywords: keywords.into_value(),
        articles: articles.into_value(),
    }
}
