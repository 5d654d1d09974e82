//! Links article titles quoted in a model answer to the article pages.
//!
//! The input is never mutated in place. Each (pattern, article) pair proposes one
//! span; spans that intersect an already linked range are dropped, and the output
//! is assembled once at the end.

use regex::{Regex, RegexBuilder};
use std::ops::Range;
use tracing::debug;

use super::escape_attr;
use crate::domain::BibliographicArticle;

/// Headings relabelled when at least one emitted link points at PubMed.
const REFERENCE_HEADINGS: [(&str, &str); 2] = [
    ("Referencias:", "Referencias de PubMed:"),
    ("References:", "PubMed References:"),
];

const OPEN_QUOTE: &str = "[\"“«]";
const CLOSE_QUOTE: &str = "[\"”»]";
const YEAR: &str = r"\s*\(\d{4}\)";

/// How a title may appear in the text, most specific first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TitlePattern {
    QuotedWithYear,
    BareWithYear,
    Quoted,
    Bare,
}

impl TitlePattern {
    pub const ORDER: [TitlePattern; 4] = [
        TitlePattern::QuotedWithYear,
        TitlePattern::BareWithYear,
        TitlePattern::Quoted,
        TitlePattern::Bare,
    ];

    /// Builds a case-insensitive regex whose first group is the title span.
    fn regex(&self, title: &str) -> Option<Regex> {
        let escaped = regex::escape(title);
        let starts_word = title.chars().next().is_some_and(char::is_alphanumeric);
        let ends_word = title.chars().last().is_some_and(char::is_alphanumeric);
        let lead = if starts_word { r"\b" } else { "" };
        let trail = if ends_word { r"\b" } else { "" };
        let source = match self {
            TitlePattern::QuotedWithYear => format!("{OPEN_QUOTE}({escaped}){CLOSE_QUOTE}{YEAR}"),
            TitlePattern::BareWithYear => format!("{lead}({escaped}){YEAR}"),
            TitlePattern::Quoted => format!("{OPEN_QUOTE}({escaped}){CLOSE_QUOTE}"),
            TitlePattern::Bare => format!("{lead}({escaped}){trail}"),
        };
        RegexBuilder::new(&source)
            .case_insensitive(true)
            .build()
            .ok()
    }
}

/// Sorted, non-overlapping byte ranges that are already inside an anchor.
#[derive(Debug, Default, Clone)]
pub struct LinkedRanges {
    ranges: Vec<Range<usize>>,
}

impl LinkedRanges {
    pub fn intersects(&self, candidate: &Range<usize>) -> bool {
        self.ranges
            .iter()
            .any(|r| r.start < candidate.end && candidate.start < r.end)
    }

    pub fn insert(&mut self, range: Range<usize>) {
        let at = self
            .ranges
            .iter()
            .position(|r| r.start > range.start)
            .unwrap_or(self.ranges.len());
        self.ranges.insert(at, range);
    }
}

#[derive(Debug, Clone)]
struct PlannedLink<'a> {
    span: Range<usize>,
    article: &'a BibliographicArticle,
}

/// The outcome of one linking pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkedText {
    pub html: String,
    pub links_emitted: usize,
}

/// Rewrites the first unlinked occurrence of each article title, per pattern, into
/// an anchor. Anchors already present in `text` are respected.
pub fn link_citations(text: &str, articles: &[BibliographicArticle]) -> LinkedText {
    let mut linked = existing_anchors(text);
    let mut planned: Vec<PlannedLink<'_>> = Vec::new();

    for article in articles {
        let title = match_title(&article.title);
        if title.is_empty() || article.url.trim().is_empty() {
            continue;
        }

        for pattern in TitlePattern::ORDER {
            let Some(re) = pattern.regex(title) else {
                continue;
            };
            let Some(span) = re.captures(text).and_then(|c| c.get(1)).map(|m| m.range()) else {
                continue;
            };
            if linked.intersects(&span) {
                debug!(article = %article.id, ?pattern, "title occurrence already linked, skipping");
                continue;
            }
            linked.insert(span.clone());
            planned.push(PlannedLink { span, article });
        }
    }

    planned.sort_by_key(|p| p.span.start);

    let mut html = String::with_capacity(text.len() + planned.len() * 96);
    let mut cursor = 0;
    for link in &planned {
        html.push_str(&text[cursor..link.span.start]);
        html.push_str(&anchor(link.article, &text[link.span.clone()]));
        cursor = link.span.end;
    }
    html.push_str(&text[cursor..]);

    if planned
        .iter()
        .any(|p| p.article.url.to_lowercase().contains("pubmed"))
    {
        html = relabel_reference_headings(&html);
    }

    LinkedText {
        html,
        links_emitted: planned.len(),
    }
}

/// Titles from PubMed usually end with a period that models drop when quoting.
fn match_title(title: &str) -> &str {
    title.trim().trim_end_matches('.').trim_end()
}

fn anchor(article: &BibliographicArticle, label: &str) -> String {
    format!(
        "<a href=\"{}\" target=\"_blank\" rel=\"noopener noreferrer\" class=\"citation-link\" title=\"{}\">{}</a>",
        escape_attr(&article.url),
        escape_attr(article.title.trim()),
        label
    )
}

fn existing_anchors(text: &str) -> LinkedRanges {
    let mut ranges = LinkedRanges::default();
    if let Ok(re) = RegexBuilder::new(r"<a\b[^>]*>.*?</a\s*>")
        .case_insensitive(true)
        .dot_matches_new_line(true)
        .build()
    {
        for m in re.find_iter(text) {
            ranges.insert(m.range());
        }
    }
    ranges
}

/// Relabels each heading once; headings already carrying the PubMed label are kept.
fn relabel_reference_headings(html: &str) -> String {
    REFERENCE_HEADINGS.iter().fold(html.to_string(), |acc, (from, to)| {
        let source = format!("{}|{}", regex::escape(to), regex::escape(from));
        match Regex::new(&source) {
            Ok(re) => re
                .replace_all(&acc, |caps: &regex::Captures<'_>| {
                    if &caps[0] == *from {
                        (*to).to_string()
                    } else {
                        caps[0].to_string()
                    }
                })
                .into_owned(),
            Err(_) => acc,
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::article;

    fn count(haystack: &str, needle: &str) -> usize {
        haystack.matches(needle).count()
    }

    #[test]
    fn links_only_the_first_bare_mention() {
        let hv = article("1", "Prevalence of hallux valgus", 2024);
        let text = "Prevalence of hallux valgus is high. Later, Prevalence of hallux valgus is cited again.";
        let out = link_citations(text, &[hv.clone()]);

        assert_eq!(out.links_emitted, 1);
        assert_eq!(count(&out.html, "<a "), 1);
        assert!(out.html.starts_with(&format!(
            "<a href=\"{}\" target=\"_blank\" rel=\"noopener noreferrer\" class=\"citation-link\" title=\"Prevalence of hallux valgus\">Prevalence of hallux valgus</a> is high.",
            hv.url
        )));
        assert!(out.html.ends_with("Later, Prevalence of hallux valgus is cited again."));
    }

    #[test]
    fn quoted_title_with_year_gets_a_single_anchor_inside_the_quotes() {
        let hv = article("1", "Prevalence of hallux valgus", 2024);
        let out = link_citations("See \"Prevalence of hallux valgus\" (2010).", &[hv.clone()]);

        assert_eq!(out.links_emitted, 1);
        assert_eq!(count(&out.html, "<a "), 1);
        assert_eq!(count(&out.html, "</a>"), 1);
        assert!(out
            .html
            .contains("\">Prevalence of hallux valgus</a>\" (2010)."));
        assert!(out.html.starts_with("See \"<a href="));
    }

    #[test]
    fn unquoted_title_with_year_keeps_the_year_outside() {
        let a = article("7", "Ankle sprain rehabilitation", 2025);
        let out = link_citations("As shown in Ankle sprain rehabilitation (2025), early loading helps.", &[a]);
        assert!(out.html.contains(">Ankle sprain rehabilitation</a> (2025), early"));
        assert_eq!(out.links_emitted, 1);
    }

    #[test]
    fn matching_ignores_case_and_trailing_period() {
        let a = article("2", "Total hip arthroplasty outcomes.", 2024);
        let out = link_citations("Results from total hip arthroplasty outcomes were good.", &[a]);
        assert!(out.html.contains(">total hip arthroplasty outcomes</a> were good."));
    }

    #[test]
    fn bare_titles_need_word_boundaries() {
        let a = article("3", "Gait", 2024);
        let out = link_citations("Gaiters are not related.", &[a]);
        assert_eq!(out.links_emitted, 0);
        assert_eq!(out.html, "Gaiters are not related.");
    }

    #[test]
    fn existing_anchors_are_not_relinked() {
        let a = article("4", "Meniscus repair", 2024);
        let text = "<a href=\"https://example.org\">Meniscus repair</a> and Meniscus repair again.";
        let out = link_citations(text, &[a]);
        // The bare pattern's first hit is inside the existing anchor, so it is skipped.
        assert_eq!(out.links_emitted, 0);
        assert_eq!(out.html, text);
    }

    #[test]
    fn titles_are_treated_as_literals() {
        let a = article("5", "Is C++ (or [x]) *useful*?", 2024);
        let text = "They cite \"Is C++ (or [x]) *useful*?\" (2024) today.";
        let out = link_citations(text, &[a]);
        assert_eq!(out.links_emitted, 1);
        assert!(out.html.contains(">Is C++ (or [x]) *useful*?</a>\" (2024)"));
    }

    #[test]
    fn overlapping_titles_from_different_articles_link_once() {
        let long = article("6", "Distal radius fractures in the elderly", 2024);
        let short = article("8", "Distal radius fractures", 2024);
        let out = link_citations(
            "Read \"Distal radius fractures in the elderly\" (2024).",
            &[long, short],
        );
        assert_eq!(out.links_emitted, 1);
        assert_eq!(count(&out.html, "<a "), 1);
    }

    #[test]
    fn relabels_reference_heading_for_pubmed_links() {
        let a = article("9", "Scoliosis bracing", 2024);
        let out = link_citations("Summary.\n\nReferencias:\n1. \"Scoliosis bracing\" (2024)", &[a]);
        assert!(out.html.contains("Referencias de PubMed:"));
        assert!(!out.html.contains("\nReferencias:"));
    }

    #[test]
    fn keeps_heading_without_pubmed_links() {
        let mut a = article("10", "Scoliosis bracing", 2024);
        a.url = "https://europepmc.org/article/PMC/PMC10".to_string();
        let out = link_citations("Referencias:\n\"Scoliosis bracing\"", &[a]);
        assert!(out.html.starts_with("Referencias:\n"));
        assert_eq!(out.links_emitted, 1);
    }

    #[test]
    fn heading_stays_when_nothing_is_linked() {
        let a = article("11", "Unmentioned title", 2024);
        let out = link_citations("Referencias:\nnone", &[a]);
        assert_eq!(out.html, "Referencias:\nnone");
    }

    #[test]
    fn titles_inside_longer_words_are_not_linked() {
        let a = article("12", "Gait analysis", 2024);
        let text = "Biogait analysis (2024) is unrelated.";
        let out = link_citations(text, &[a]);
        assert_eq!(out.links_emitted, 0);
        assert_eq!(out.html, text);
    }

    #[test]
    fn relabels_english_heading_once() {
        let a = article("13", "Scoliosis bracing", 2024);
        let out = link_citations("Summary.\n\nReferences:\n1. \"Scoliosis bracing\" (2024)", &[a.clone()]);
        assert!(out.html.contains("\nPubMed References:\n"));
        assert!(!out.html.contains("\nReferences:"));

        let out = link_citations("PubMed References:\n\"Scoliosis bracing\" (2024)", &[a]);
        assert!(out.html.starts_with("PubMed References:\n"));
        assert!(!out.html.contains("PubMed PubMed"));
    }

    #[test]
    fn linked_ranges_detect_overlap() {
        let mut ranges = LinkedRanges::default();
        ranges.insert(10..20);
        ranges.insert(0..5);
        assert!(ranges.intersects(&(15..25)));
        assert!(ranges.intersects(&(4..6)));
        assert!(!ranges.intersects(&(5..10)));
        assert!(!ranges.intersects(&(20..30)));
    }
}
