//! Bibliographic lookup restricted to recent publications.

use std::collections::HashSet;
use tracing::{debug, warn};

use super::StageOutcome;
use crate::domain::{BibliographicArticle, BibliographicQuery, PublicationWindow};
use crate::ports::BibliographicSearchService;

pub const MAX_ARTICLES: usize = 10;

/// Searches for `keywords` published in `[current_year - 3, current_year]`.
///
/// Articles the backend returns outside of that window, or without a year, are
/// dropped. Transport and parse failures give an empty list.
pub async fn search_literature(
    service: &dyn BibliographicSearchService,
    keywords: &[String],
    current_year: i32,
) -> StageOutcome<Vec<BibliographicArticle>> {
    if keywords.is_empty() {
        warn!("literature search skipped: no keywords");
        return StageOutcome::Degraded(Vec::new());
    }

    let query = BibliographicQuery {
        keywords: keywords.to_vec(),
        window: PublicationWindow::ending_in(current_year),
        max_results: MAX_ARTICLES,
    };

    match service.search(&query).await {
        Ok(articles) => StageOutcome::Complete(within_window(articles, query.window)),
        Err(e) => {
            warn!("literature search unavailable, continuing without references: {}", e);
            StageOutcome::Degraded(Vec::new())
        }
    }
}

/// Keeps backend order, drops out-of-window and repeated articles, caps the list.
pub fn within_window(
    articles: Vec<BibliographicArticle>,
    window: PublicationWindow,
) -> Vec<BibliographicArticle> {
    let received = articles.len();
    let mut seen = HashSet::new();
    let kept: Vec<BibliographicArticle> = articles
        .into_iter()
        .filter(|a| a.publication_year.is_some_and(|y| window.contains(y)))
        .filter(|a| seen.insert(a.id.clone()))
        .take(MAX_ARTICLES)
        .collect();

    if kept.len() < received {
        debug!(
            received,
            kept = kept.len(),
            from_year = window.from_year,
            to_year = window.to_year,
            "filtered bibliographic results"
        );
    }
    kept
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{article, FakeSearch};
    use futures::executor::block_on;

    #[test]
    fn requests_the_three_year_window() {
        let search = FakeSearch::returning(vec![]);
        block_on(search_literature(&search, &["hip".to_string()], 2026));
        let query = search.last_query().unwrap();
        assert_eq!(query.window, PublicationWindow { from_year: 2023, to_year: 2026 });
        assert_eq!(query.max_results, MAX_ARTICLES);
    }

    #[test]
    fn drops_articles_outside_the_window() {
        let mut undated = article("4", "Undated study", 2024);
        undated.publication_year = None;
        let search = FakeSearch::returning(vec![
            article("1", "Old study", 2019),
            article("2", "Recent study", 2024),
            article("3", "Future study", 2027),
            undated,
            article("5", "Edge study", 2023),
        ]);
        let outcome = block_on(search_literature(&search, &["hip".to_string()], 2026));
        let titles: Vec<_> = outcome.value().iter().map(|a| a.title.as_str()).collect();
        assert_eq!(titles, vec!["Recent study", "Edge study"]);
    }

    #[test]
    fn caps_results_and_removes_duplicates() {
        let mut articles: Vec<_> = (0..15)
            .map(|i| article(&i.to_string(), &format!("Study {}", i), 2025))
            .collect();
        articles.insert(1, article("0", "Study 0 again", 2025));
        let kept = within_window(articles, PublicationWindow::ending_in(2026));
        assert_eq!(kept.len(), MAX_ARTICLES);
        assert_eq!(kept[1].title, "Study 1");
    }

    #[test]
    fn backend_failure_gives_empty_list() {
        let search = FakeSearch::failing();
        let outcome = block_on(search_literature(&search, &["knee".to_string()], 2026));
        assert!(outcome.is_degraded());
        assert!(outcome.value().is_empty());
    }
}
