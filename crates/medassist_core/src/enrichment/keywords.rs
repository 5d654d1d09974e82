//! Derives bibliographic search terms from an English question.

use tracing::warn;

use super::StageOutcome;
use crate::ports::KeywordGenerationService;

pub const MAX_KEYWORDS: usize = 5;
pub const MAX_KEYWORD_CHARS: usize = 30;
const MAX_FALLBACK_MATCHES: usize = 3;

/// Terms appended by the fallback so the list is never empty.
pub const FILLER_TERMS: [&str; 2] = ["medical", "treatment"];

/// Common trauma and orthopedic vocabulary scanned by the fallback.
const FALLBACK_TERMS: &[&str] = &[
    "fracture",
    "distal radius",
    "hip",
    "knee",
    "shoulder",
    "ankle",
    "wrist",
    "elbow",
    "spine",
    "femur",
    "tibia",
    "humerus",
    "clavicle",
    "ligament",
    "tendon",
    "meniscus",
    "cartilage",
    "osteoporosis",
    "osteoarthritis",
    "arthritis",
    "arthroplasty",
    "dislocation",
    "sprain",
    "hallux valgus",
    "scoliosis",
    "low back pain",
    "rotator cuff",
    "trauma",
    "orthopedic",
];

/// Runs the generative path and falls back to [`fallback_keywords`] on any failure
/// or when the generator output yields no usable term.
pub async fn extract_keywords(
    service: &dyn KeywordGenerationService,
    english_text: &str,
) -> StageOutcome<Vec<String>> {
    match service.generate_keywords(english_text).await {
        Ok(raw) => {
            let parsed = parse_keywords(&raw);
            if parsed.is_empty() {
                warn!("keyword generator returned nothing usable, using dictionary fallback");
                StageOutcome::Degraded(fallback_keywords(english_text))
            } else {
                StageOutcome::Complete(parsed)
            }
        }
        Err(e) => {
            warn!("keyword generator unavailable, using dictionary fallback: {}", e);
            StageOutcome::Degraded(fallback_keywords(english_text))
        }
    }
}

/// Splits generator output on commas and newlines and keeps at most five clean terms.
pub fn parse_keywords(raw: &str) -> Vec<String> {
    let mut keywords: Vec<String> = Vec::new();
    for piece in raw.split(|c| c == ',' || c == '\n') {
        let term = clean_term(piece);
        if term.is_empty() || term.chars().count() > MAX_KEYWORD_CHARS || term.contains(':') {
            continue;
        }
        if keywords.iter().any(|k| k.eq_ignore_ascii_case(&term)) {
            continue;
        }
        keywords.push(term);
        if keywords.len() == MAX_KEYWORDS {
            break;
        }
    }
    keywords
}

fn clean_term(piece: &str) -> String {
    let trimmed = piece.trim();
    // List markers such as "-", "*" or "1." that generators like to add.
    let without_marker = trimmed
        .trim_start_matches(|c: char| c == '-' || c == '*' || c == '•')
        .trim_start();
    let without_number = match without_marker.split_once(". ") {
        Some((n, rest)) if n.chars().all(|c| c.is_ascii_digit()) && !n.is_empty() => rest,
        _ => without_marker,
    };
    without_number
        .trim()
        .trim_matches(|c: char| c == '"' || c == '\'' || c == '.')
        .trim()
        .to_string()
}

/// Deterministic extraction: up to three known terms found in `text` (whole words,
/// case-insensitive), followed by the filler terms.
pub fn fallback_keywords(text: &str) -> Vec<String> {
    let normalized: String = text
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect();
    let haystack = format!(" {} ", normalized.split_whitespace().collect::<Vec<_>>().join(" "));

    let mut keywords: Vec<String> = FALLBACK_TERMS
        .iter()
        .filter(|term| haystack.contains(&format!(" {} ", term)))
        .take(MAX_FALLBACK_MATCHES)
        .map(|term| term.to_string())
        .collect();
    keywords.extend(FILLER_TERMS.iter().map(|t| t.to_string()));
    keywords
}
