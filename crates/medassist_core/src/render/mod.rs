//! crates/medassist_core/src/render/mod.rs
//!
//! Turns a raw model answer into the HTML shown to the clinician:
//! citation linking, then allow-list sanitizing, then medical term annotation.

pub mod citations;
pub mod sanitize;
pub mod terms;
pub mod vocabulary;

use serde::Serialize;

use crate::domain::BibliographicArticle;

pub use citations::{link_citations, LinkedText, TitlePattern};
pub use sanitize::sanitize_html;
pub use terms::{annotate_terms, AnnotatedText, TermReference};
pub use vocabulary::{classify, TermInfo, TermSource};

/// A fully rendered assistant message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenderedAnswer {
    pub html: String,
    /// Consolidated term references, rendered once per message.
    pub references: Vec<TermReference>,
    pub citations_linked: usize,
}

pub fn render_answer(answer: &str, articles: &[BibliographicArticle]) -> RenderedAnswer {
    let linked = link_citations(answer, articles);
    let clean = sanitize_html(&linked.html);
    let annotated = annotate_terms(&clean);
    RenderedAnswer {
        html: annotated.html,
        references: annotated.references,
        citations_linked: linked.links_emitted,
    }
}

/// Escapes a value for use inside a double-quoted HTML attribute.
pub(crate) fn escape_attr(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::article;

    #[test]
    fn escapes_attribute_values() {
        assert_eq!(escape_attr("a \"b\" & <c>"), "a &quot;b&quot; &amp; &lt;c&gt;");
    }

    #[test]
    fn rendering_strips_scripts_from_model_output() {
        let a = article("1", "Prevalence of hallux valgus", 2024);
        let rendered = render_answer(
            "<script>steal()</script>\"Prevalence of hallux valgus\" (2024)",
            &[a.clone()],
        );
        assert!(!rendered.html.contains("<script"));
        assert_eq!(rendered.citations_linked, 1);
        assert!(rendered.html.contains(&format!("href=\"{}\"", a.url)));
    }

    #[test]
    fn terms_inside_linked_titles_are_annotated() {
        let a = article("1", "Prevalence of hallux valgus", 2024);
        let rendered = render_answer("\"Prevalence of hallux valgus\" (2024)", &[a]);
        assert_eq!(rendered.references.len(), 1);
        assert_eq!(rendered.references[0].term, "hallux valgus");
        assert!(rendered
            .html
            .contains("<span class=\"medical-term\" data-term=\"hallux valgus\""));
    }
}
