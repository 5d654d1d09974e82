//! Wraps the first occurrence of each medical term in an inspectable span.
//!
//! Runs on rendered HTML and only touches text outside of tags. It does not look at
//! citation anchors: a term may be annotated inside a linked title.

use regex::{Regex, RegexBuilder};
use serde::Serialize;
use std::collections::HashMap;
use std::ops::Range;
use std::sync::OnceLock;

use super::escape_attr;
use super::vocabulary::{self, TermInfo, TermSource};

/// One entry of the per-message reference list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TermReference {
    /// Lowercased identifier, also used as the span's `data-term`.
    pub term: String,
    /// The term as matched, title-cased for display.
    pub display: String,
    pub definition: String,
    pub citation: String,
    pub source: TermSource,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnnotatedText {
    pub html: String,
    pub references: Vec<TermReference>,
}

fn word_regex() -> &'static Regex {
    static WORD: OnceLock<Regex> = OnceLock::new();
    WORD.get_or_init(|| Regex::new(r"[\p{L}][\p{L}\p{N}]*").expect("static regex"))
}

fn tag_regex() -> &'static Regex {
    static TAG: OnceLock<Regex> = OnceLock::new();
    TAG.get_or_init(|| Regex::new(r"<[^>]*>").expect("static regex"))
}

fn whole_word(term: &str) -> Option<Regex> {
    RegexBuilder::new(&format!(r"\b{}\b", regex::escape(term)))
        .case_insensitive(true)
        .build()
        .ok()
}

/// Acronyms only match in their uppercase form; "tc" in prose is not "TC".
fn term_regex(info: &TermInfo) -> Option<Regex> {
    match info.source {
        TermSource::Acronym => {
            Regex::new(&format!(r"\b{}\b", regex::escape(&info.key.to_uppercase()))).ok()
        }
        _ => whole_word(&info.key),
    }
}

/// Finds candidate terms: dictionary phrases first, then every word the
/// classifier accepts. Keyed by the lowercased term.
pub fn detect_terms(text: &str) -> HashMap<String, TermInfo> {
    let blocked = tag_ranges(text);
    let mut found: HashMap<String, TermInfo> = HashMap::new();

    for phrase in vocabulary::dictionary_terms() {
        let Some(re) = whole_word(phrase) else {
            continue;
        };
        if re.find_iter(text).any(|m| !overlaps(&blocked, &m.range())) {
            if let Some(info) = vocabulary::lookup(phrase) {
                found.insert(info.key.clone(), info);
            }
        }
    }

    for m in word_regex().find_iter(text) {
        if overlaps(&blocked, &m.range()) {
            continue;
        }
        if let Some(info) = vocabulary::classify(m.as_str()) {
            found.entry(info.key.clone()).or_insert(info);
        }
    }

    found
}

/// Annotates `html` and returns the consolidated reference list, in order of first
/// appearance in the text.
pub fn annotate_terms(html: &str) -> AnnotatedText {
    let mut candidates: Vec<TermInfo> = detect_terms(html).into_values().collect();
    // Longest first so a phrase is not pre-empted by one of its words.
    candidates.sort_by(|a, b| {
        b.key
            .chars()
            .count()
            .cmp(&a.key.chars().count())
            .then_with(|| a.key.cmp(&b.key))
    });

    let mut taken = tag_ranges(html);
    let mut wraps: Vec<(Range<usize>, TermInfo)> = Vec::new();

    for info in candidates {
        let Some(re) = term_regex(&info) else {
            continue;
        };
        let first_free = re
            .find_iter(html)
            .map(|m| m.range())
            .find(|r| !overlaps(&taken, r));
        if let Some(range) = first_free {
            taken.push(range.clone());
            wraps.push((range, info));
        }
    }

    wraps.sort_by_key(|(range, _)| range.start);

    let mut out = String::with_capacity(html.len() + wraps.len() * 128);
    let mut references = Vec::with_capacity(wraps.len());
    let mut cursor = 0;
    for (range, info) in wraps {
        let matched = &html[range.clone()];
        let display = match info.source {
            TermSource::Acronym => matched.to_string(),
            _ => vocabulary::title_case(&matched.to_lowercase()),
        };
        out.push_str(&html[cursor..range.start]);
        out.push_str(&format!(
            "<span class=\"medical-term\" data-term=\"{}\" data-definition=\"{}\" data-citation=\"{}\" title=\"{}: {}\">{}</span>",
            escape_attr(&info.key),
            escape_attr(&info.definition),
            escape_attr(&info.citation),
            escape_attr(&display),
            escape_attr(&info.definition),
            matched
        ));
        cursor = range.end;
        references.push(TermReference {
            term: info.key,
            display,
            definition: info.definition,
            citation: info.citation,
            source: info.source,
        });
    }
    out.push_str(&html[cursor..]);

    AnnotatedText {
        html: out,
        references,
    }
}

fn tag_ranges(html: &str) -> Vec<Range<usize>> {
    tag_regex().find_iter(html).map(|m| m.range()).collect()
}

fn overlaps(ranges: &[Range<usize>], candidate: &Range<usize>) -> bool {
    ranges
        .iter()
        .any(|r| r.start < candidate.end && candidate.start < r.end)
}
