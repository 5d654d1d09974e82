//! services/api/src/adapters/europe_pmc.rs
//!
//! Implements `BibliographicSearchService` against the Europe PMC REST search.
//! Results come back as JSON with inline abstracts, which are cut to
//! [`ABSTRACT_PREVIEW_CHARS`] characters.

use async_trait::async_trait;
use medassist_core::domain::{BibliographicArticle, BibliographicQuery};
use medassist_core::ports::{BibliographicSearchService, PortError, PortResult};
use serde::Deserialize;
use tracing::debug;

pub const ABSTRACT_PREVIEW_CHARS: usize = 200;

//=========================================================================================
// Response Shape
//=========================================================================================

#[derive(Deserialize)]
struct SearchResponse {
    #[serde(rename = "resultList", default)]
    result_list: ResultList,
}

#[derive(Deserialize, Default)]
struct ResultList {
    #[serde(default)]
    result: Vec<EuropePmcResult>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct EuropePmcResult {
    id: String,
    #[serde(default)]
    source: Option<String>,
    #[serde(default)]
    pmid: Option<String>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    author_string: Option<String>,
    #[serde(default)]
    abstract_text: Option<String>,
    #[serde(default)]
    journal_title: Option<String>,
    #[serde(default)]
    journal_info: Option<JournalInfo>,
    #[serde(default)]
    pub_year: Option<String>,
    #[serde(default)]
    doi: Option<String>,
}

#[derive(Deserialize)]
struct JournalInfo {
    #[serde(default)]
    journal: Option<Journal>,
}

#[derive(Deserialize)]
struct Journal {
    #[serde(default)]
    title: Option<String>,
}

impl EuropePmcResult {
    fn into_article(self) -> Option<BibliographicArticle> {
        let title = self.title?.trim().to_string();
        if title.is_empty() {
            return None;
        }
        let pmid = self.pmid.filter(|p| !p.trim().is_empty());
        let url = match &pmid {
            Some(pmid) => format!("https://pubmed.ncbi.nlm.nih.gov/{}/", pmid),
            None => format!(
                "https://europepmc.org/article/{}/{}",
                self.source.as_deref().unwrap_or("MED"),
                self.id
            ),
        };
        let journal = self
            .journal_info
            .and_then(|info| info.journal)
            .and_then(|j| j.title)
            .or(self.journal_title)
            .unwrap_or_default();

        Some(BibliographicArticle {
            id: self.id,
            pmid,
            title,
            authors: self.author_string.unwrap_or_default().trim().to_string(),
            abstract_text: preview(self.abstract_text.as_deref().unwrap_or_default()),
            journal,
            publication_year: self.pub_year.and_then(|y| y.trim().parse().ok()),
            doi: self.doi.filter(|d| !d.trim().is_empty()),
            url,
        })
    }
}

/// Cuts an abstract to the preview length, marking the cut with an ellipsis.
pub fn preview(text: &str) -> String {
    let text = text.trim();
    if text.chars().count() <= ABSTRACT_PREVIEW_CHARS {
        return text.to_string();
    }
    let cut: String = text.chars().take(ABSTRACT_PREVIEW_CHARS).collect();
    format!("{}...", cut.trim_end())
}

/// Parses a Europe PMC search response body.
pub fn parse_search_response(body: &str) -> PortResult<Vec<BibliographicArticle>> {
    let response: SearchResponse = serde_json::from_str(body)
        .map_err(|e| PortError::Unexpected(format!("invalid Europe PMC response: {}", e)))?;
    Ok(response
        .result_list
        .result
        .into_iter()
        .filter_map(EuropePmcResult::into_article)
        .collect())
}

/// The Europe PMC query syntax for the keywords and the year window.
pub fn build_query(query: &BibliographicQuery) -> String {
    format!(
        "({}) AND PUB_YEAR:[{} TO {}]",
        query.terms_expression(),
        query.window.from_year,
        query.window.to_year
    )
}

//=========================================================================================
// The Adapter
//=========================================================================================

#[derive(Clone)]
pub struct EuropePmcAdapter {
    http: reqwest::Client,
    base_url: String,
}

impl EuropePmcAdapter {
    pub fn new(http: reqwest::Client, base_url: String) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl BibliographicSearchService for EuropePmcAdapter {
    async fn search(&self, query: &BibliographicQuery) -> PortResult<Vec<BibliographicArticle>> {
        let search_query = build_query(query);
        let page_size = query.max_results.to_string();
        debug!(query = %search_query, "searching Europe PMC");

        let response = self
            .http
            .get(format!("{}/search", self.base_url))
            .query(&[
                ("query", search_query.as_str()),
                ("format", "json"),
                ("resultType", "core"),
                ("pageSize", page_size.as_str()),
            ])
            .send()
            .await
            .map_err(|e| PortError::Unexpected(format!("Europe PMC request failed: {}", e)))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| PortError::Unexpected(format!("Europe PMC body unreadable: {}", e)))?;
        if !status.is_success() {
            return Err(PortError::Unexpected(format!(
                "Europe PMC returned status {}",
                status
            )));
        }

        let mut articles = parse_search_response(&body)?;
        articles.truncate(query.max_results);
        Ok(articles)
    }
}
