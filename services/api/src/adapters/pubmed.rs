//! services/api/src/adapters/pubmed.rs
//!
//! Implements `BibliographicSearchService` with NCBI E-utilities: `esearch` returns
//! the PMIDs for the query and year window, `efetch` returns the records as XML.
//! Abstracts are kept whole.

use async_trait::async_trait;
use medassist_core::domain::{BibliographicArticle, BibliographicQuery};
use medassist_core::ports::{BibliographicSearchService, PortError, PortResult};
use quick_xml::{events::Event, Reader as XmlReader};
use serde::Deserialize;
use tracing::debug;

const MAX_AUTHORS: usize = 3;

//=========================================================================================
// esearch (JSON)
//=========================================================================================

#[derive(Deserialize)]
struct ESearchResponse {
    esearchresult: ESearchResult,
}

#[derive(Deserialize)]
struct ESearchResult {
    #[serde(default)]
    idlist: Vec<String>,
}

pub fn parse_esearch(body: &str) -> PortResult<Vec<String>> {
    let response: ESearchResponse = serde_json::from_str(body)
        .map_err(|e| PortError::Unexpected(format!("invalid esearch response: {}", e)))?;
    Ok(response.esearchresult.idlist)
}

//=========================================================================================
// efetch (XML)
//=========================================================================================

#[derive(Default)]
struct ArticleDraft {
    pmid: String,
    title: String,
    abstract_text: String,
    abstracts_seen: usize,
    journal: String,
    year: Option<i32>,
    medline_date: String,
    doi: Option<String>,
    authors: Vec<String>,
}

impl ArticleDraft {
    fn finish(self) -> Option<BibliographicArticle> {
        let pmid = self.pmid.trim().to_string();
        let title = collapse_whitespace(&self.title);
        if pmid.is_empty() || title.is_empty() {
            return None;
        }
        let year = self.year.or_else(|| leading_year(&self.medline_date));
        Some(BibliographicArticle {
            id: pmid.clone(),
            url: format!("https://pubmed.ncbi.nlm.nih.gov/{}/", pmid),
            pmid: Some(pmid),
            title,
            authors: self.authors.join(", "),
            abstract_text: collapse_whitespace(&self.abstract_text),
            journal: collapse_whitespace(&self.journal),
            publication_year: year,
            doi: self.doi.map(|d| d.trim().to_string()).filter(|d| !d.is_empty()),
        })
    }
}

#[derive(Default)]
struct AuthorDraft {
    fore_name: String,
    last_name: String,
    collective_name: String,
}

impl AuthorDraft {
    /// "First Last", or the collective name for group authors.
    fn display(&self) -> Option<String> {
        let full = format!("{} {}", self.fore_name.trim(), self.last_name.trim());
        let full = full.trim();
        if !full.is_empty() {
            Some(full.to_string())
        } else if !self.collective_name.trim().is_empty() {
            Some(self.collective_name.trim().to_string())
        } else {
            None
        }
    }
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// "2023 Jan-Feb" -> 2023.
fn leading_year(text: &str) -> Option<i32> {
    let digits: String = text.trim().chars().take(4).collect();
    if digits.len() == 4 && digits.chars().all(|c| c.is_ascii_digit()) {
        digits.parse().ok()
    } else {
        None
    }
}

fn inside(path: &[Vec<u8>], name: &[u8]) -> bool {
    path.iter().any(|p| p.as_slice() == name)
}

fn leaf_is(path: &[Vec<u8>], parent: &[u8], leaf: &[u8]) -> bool {
    path.len() >= 2
        && path[path.len() - 1].as_slice() == leaf
        && path[path.len() - 2].as_slice() == parent
}

#[derive(Clone, Copy)]
struct DoiFlags {
    elocation: bool,
    article_id: bool,
}

/// Routes a text node to the draft field named by the current element path.
fn absorb_text(
    draft: &mut ArticleDraft,
    author: Option<&mut AuthorDraft>,
    path: &[Vec<u8>],
    doi: DoiFlags,
    text: &str,
) {
    let leaf: &[u8] = path.last().map(|p| p.as_slice()).unwrap_or_default();

    if inside(path, b"ArticleTitle") {
        draft.title.push_str(text);
    } else if inside(path, b"AbstractText") {
        if draft.abstracts_seen == 1 {
            draft.abstract_text.push_str(text);
        }
    } else if leaf_is(path, b"MedlineCitation", b"PMID") {
        if draft.pmid.is_empty() {
            draft.pmid.push_str(text);
        }
    } else if leaf_is(path, b"Journal", b"Title") {
        draft.journal.push_str(text);
    } else if leaf_is(path, b"PubDate", b"Year") && inside(path, b"JournalIssue") {
        draft.year = text.trim().parse().ok();
    } else if leaf_is(path, b"PubDate", b"MedlineDate") {
        draft.medline_date.push_str(text);
    } else if leaf == b"ELocationID" {
        if doi.elocation && draft.doi.is_none() {
            draft.doi = Some(text.to_string());
        }
    } else if leaf == b"ArticleId" {
        if doi.article_id && draft.doi.is_none() {
            draft.doi = Some(text.to_string());
        }
    } else if let Some(a) = author {
        match leaf {
            b"ForeName" => a.fore_name.push_str(text),
            b"LastName" => a.last_name.push_str(text),
            b"CollectiveName" => a.collective_name.push_str(text),
            _ => {}
        }
    }
}

/// Extracts articles from a `PubmedArticleSet` document, in document order.
pub fn parse_efetch(xml: &str) -> PortResult<Vec<BibliographicArticle>> {
    let mut reader = XmlReader::from_str(xml);
    let mut buf = Vec::new();
    let mut path: Vec<Vec<u8>> = Vec::new();
    let mut articles = Vec::new();
    let mut current: Option<ArticleDraft> = None;
    let mut author: Option<AuthorDraft> = None;
    let mut elocation_is_doi = false;
    let mut article_id_is_doi = false;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => {
                let name = e.name().as_ref().to_vec();
                match name.as_slice() {
                    b"PubmedArticle" => current = Some(ArticleDraft::default()),
                    b"Author" => author = Some(AuthorDraft::default()),
                    b"AbstractText" => {
                        if let Some(draft) = current.as_mut() {
                            draft.abstracts_seen += 1;
                        }
                    }
                    b"ELocationID" | b"ArticleId" => {
                        let is_doi = e.attributes().flatten().any(|a| {
                            matches!(a.key.as_ref(), b"EIdType" | b"IdType")
                                && a.value.as_ref() == b"doi"
                        });
                        if name.as_slice() == b"ELocationID" {
                            elocation_is_doi = is_doi;
                        } else {
                            article_id_is_doi = is_doi;
                        }
                    }
                    _ => {}
                }
                path.push(name);
            }
            Ok(Event::Text(e)) => {
                if let Some(draft) = current.as_mut() {
                    let text = e.unescape().map_err(|err| {
                        PortError::Unexpected(format!("invalid efetch text: {}", err))
                    })?;
                    let flags = DoiFlags {
                        elocation: elocation_is_doi,
                        article_id: article_id_is_doi,
                    };
                    absorb_text(draft, author.as_mut(), &path, flags, text.as_ref());
                }
            }
            Ok(Event::End(ref e)) => {
                match e.name().as_ref() {
                    b"Author" => {
                        if let (Some(draft), Some(a)) = (current.as_mut(), author.take()) {
                            if draft.authors.len() < MAX_AUTHORS {
                                if let Some(name) = a.display() {
                                    draft.authors.push(name);
                                }
                            }
                        }
                    }
                    b"PubmedArticle" => {
                        if let Some(article) = current.take().and_then(ArticleDraft::finish) {
                            articles.push(article);
                        }
                    }
                    _ => {}
                }
                path.pop();
            }
            Ok(Event::Eof) => break,
            Err(err) => {
                return Err(PortError::Unexpected(format!(
                    "failed to parse efetch XML: {}",
                    err
                )))
            }
            _ => {}
        }
        buf.clear();
    }

    Ok(articles)
}

//=========================================================================================
// The Adapter
//=========================================================================================

#[derive(Clone)]
pub struct PubMedAdapter {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl PubMedAdapter {
    pub fn new(http: reqwest::Client, base_url: String, api_key: Option<String>) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        }
    }

    async fn get_text(&self, endpoint: &str, params: &[(&str, String)]) -> PortResult<String> {
        let mut request = self
            .http
            .get(format!("{}/{}", self.base_url, endpoint))
            .query(params);
        if let Some(key) = &self.api_key {
            request = request.query(&[("api_key", key)]);
        }
        let response = request
            .send()
            .await
            .map_err(|e| PortError::Unexpected(format!("{} request failed: {}", endpoint, e)))?;
        let status = response.status();
        if !status.is_success() {
            return Err(PortError::Unexpected(format!(
                "{} returned status {}",
                endpoint, status
            )));
        }
        response
            .text()
            .await
            .map_err(|e| PortError::Unexpected(format!("{} body unreadable: {}", endpoint, e)))
    }
}

#[async_trait]
impl BibliographicSearchService for PubMedAdapter {
    async fn search(&self, query: &BibliographicQuery) -> PortResult<Vec<BibliographicArticle>> {
        let term = query.terms_expression();
        debug!(term = %term, "searching PubMed");

        let ids_body = self
            .get_text(
                "esearch.fcgi",
                &[
                    ("db", "pubmed".to_string()),
                    ("term", term),
                    ("retmode", "json".to_string()),
                    ("retmax", query.max_results.to_string()),
                    ("sort", "relevance".to_string()),
                    ("datetype", "pdat".to_string()),
                    ("mindate", query.window.from_year.to_string()),
                    ("maxdate", query.window.to_year.to_string()),
                ],
            )
            .await?;
        let ids = parse_esearch(&ids_body)?;
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let xml = self
            .get_text(
                "efetch.fcgi",
                &[
                    ("db", "pubmed".to_string()),
                    ("id", ids.join(",")),
                    ("retmode", "xml".to_string()),
                ],
            )
            .await?;
        let mut articles = parse_efetch(&xml)?;

        // efetch does not promise relevance order.
        articles.sort_by_key(|a| ids.iter().position(|id| *id == a.id).unwrap_or(usize::MAX));
        articles.truncate(query.max_results);
        Ok(articles)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EFETCH_FIXTURE: &str = r#"<?xml version="1.0" ?>
<!DOCTYPE PubmedArticleSet PUBLIC "-//NLM//DTD PubMedArticle, 1st January 2024//EN" "https://dtd.nlm.nih.gov/ncbi/pubmed/out/pubmed_240101.dtd">
<PubmedArticleSet>
  <PubmedArticle>
    <MedlineCitation Status="MEDLINE" Owner="NLM">
      <PMID Version="1">35012345</PMID>
      <Article PubModel="Print">
        <Journal>
          <JournalIssue CitedMedium="Internet">
            <Volume>53</Volume>
            <PubDate><Year>2022</Year><Month>Mar</Month></PubDate>
          </JournalIssue>
          <Title>Injury</Title>
        </Journal>
        <ArticleTitle>Management of <i>distal radius</i> fractures &amp; outcomes.</ArticleTitle>
        <ELocationID EIdType="pii" ValidYN="Y">S0020-1383(22)00001-1</ELocationID>
        <ELocationID EIdType="doi" ValidYN="Y">10.1016/j.injury.2022.01.001</ELocationID>
        <Abstract>
          <AbstractText Label="BACKGROUND">Distal radius fractures are common.</AbstractText>
          <AbstractText Label="METHODS">We reviewed 200 cases.</AbstractText>
        </Abstract>
        <AuthorList CompleteYN="Y">
          <Author ValidYN="Y"><LastName>Ruiz</LastName><ForeName>Ana</ForeName><Initials>A</Initials></Author>
          <Author ValidYN="Y"><LastName>Smith</LastName><ForeName>John</ForeName></Author>
          <Author ValidYN="Y"><CollectiveName>Hand Trauma Group</CollectiveName></Author>
          <Author ValidYN="Y"><LastName>Late</LastName><ForeName>Fourth</ForeName></Author>
        </AuthorList>
      </Article>
    </MedlineCitation>
    <PubmedData>
      <ArticleIdList>
        <ArticleId IdType="pubmed">35012345</ArticleId>
      </ArticleIdList>
    </PubmedData>
  </PubmedArticle>
  <PubmedArticle>
    <MedlineCitation Status="PubMed-not-MEDLINE" Owner="NLM">
      <PMID Version="1">36000001</PMID>
      <Article PubModel="Electronic">
        <Journal>
          <JournalIssue CitedMedium="Internet">
            <PubDate><MedlineDate>2023 Jan-Feb</MedlineDate></PubDate>
          </JournalIssue>
          <Title>Journal of Orthopaedic Surgery</Title>
        </Journal>
        <ArticleTitle>Hip arthroplasty in the elderly</ArticleTitle>
      </Article>
      <CommentsCorrectionsList>
        <CommentsCorrections RefType="Cites"><PMID Version="1">11111111</PMID></CommentsCorrections>
      </CommentsCorrectionsList>
    </MedlineCitation>
    <PubmedData>
      <ArticleIdList>
        <ArticleId IdType="pubmed">36000001</ArticleId>
        <ArticleId IdType="doi">10.1177/joa.2023.1</ArticleId>
      </ArticleIdList>
    </PubmedData>
  </PubmedArticle>
</PubmedArticleSet>"#;

    #[test]
    fn extracts_the_structured_fields() {
        let articles = parse_efetch(EFETCH_FIXTURE).unwrap();
        assert_eq!(articles.len(), 2);

        let first = &articles[0];
        assert_eq!(first.pmid.as_deref(), Some("35012345"));
        assert_eq!(first.title, "Management of distal radius fractures & outcomes.");
        assert_eq!(first.journal, "Injury");
        assert_eq!(first.publication_year, Some(2022));
        assert_eq!(first.doi.as_deref(), Some("10.1016/j.injury.2022.01.001"));
        assert_eq!(first.abstract_text, "Distal radius fractures are common.");
        assert_eq!(first.authors, "Ana Ruiz, John Smith, Hand Trauma Group");
        assert_eq!(first.url, "https://pubmed.ncbi.nlm.nih.gov/35012345/");
    }

    #[test]
    fn falls_back_to_medline_date_and_article_id_doi() {
        let articles = parse_efetch(EFETCH_FIXTURE).unwrap();
        let second = &articles[1];
        assert_eq!(second.pmid.as_deref(), Some("36000001"));
        assert_eq!(second.publication_year, Some(2023));
        assert_eq!(second.doi.as_deref(), Some("10.1177/joa.2023.1"));
        assert_eq!(second.abstract_text, "");
        assert_eq!(second.authors, "");
    }

    #[test]
    fn long_abstracts_are_not_truncated() {
        let long = "b".repeat(1200);
        let xml = EFETCH_FIXTURE.replace("Distal radius fractures are common.", &long);
        let articles = parse_efetch(&xml).unwrap();
        assert_eq!(articles[0].abstract_text, long);
    }

    #[test]
    fn parses_esearch_ids() {
        let body = r#"{"header":{"type":"esearch"},"esearchresult":{"count":"2","retmax":"2","idlist":["35012345","36000001"]}}"#;
        assert_eq!(parse_esearch(body).unwrap(), vec!["35012345", "36000001"]);
        assert!(parse_esearch("not json").is_err());
    }

    #[test]
    fn truncated_xml_is_an_error_or_partial() {
        let cut = &EFETCH_FIXTURE[..EFETCH_FIXTURE.find("<PubmedData>").unwrap()];
        // The unfinished article is never emitted.
        match parse_efetch(cut) {
            Ok(articles) => assert!(articles.is_empty()),
            Err(PortError::Unexpected(_)) => {}
            Err(other) => panic!("unexpected error kind: {}", other),
        }
    }
}
