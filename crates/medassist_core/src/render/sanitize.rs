//! Allow-list HTML cleaning for model-origin text.

use std::collections::{HashMap, HashSet};

const ALLOWED_TAGS: [&str; 17] = [
    "b", "strong", "i", "em", "u", "br", "p", "ul", "ol", "li", "h1", "h2", "h3", "code", "pre",
    "blockquote", "a",
];

const ANCHOR_ATTRIBUTES: [&str; 5] = ["href", "title", "target", "rel", "class"];

/// Strips every tag and attribute outside the allow-list. Disallowed markup is
/// removed, not escaped; `<script>` and `<style>` lose their content too.
pub fn sanitize_html(html: &str) -> String {
    let mut builder = ammonia::Builder::default();
    builder
        .tags(HashSet::from(ALLOWED_TAGS))
        .tag_attributes(HashMap::from([("a", HashSet::from(ANCHOR_ATTRIBUTES))]))
        .generic_attributes(HashSet::new())
        .link_rel(None);
    builder.clean(html).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn removes_script_tags_and_their_content() {
        let out = sanitize_html("Hello<script>alert('x')</script> <b>world</b>");
        assert!(!out.contains("<script"));
        assert!(!out.contains("alert"));
        assert!(out.contains("<b>world</b>"));
    }

    #[test]
    fn keeps_citation_anchor_attributes() {
        let input = "<a href=\"https://pubmed.ncbi.nlm.nih.gov/1/\" target=\"_blank\" rel=\"noopener noreferrer\" class=\"citation-link\" title=\"T\">T</a>";
        let out = sanitize_html(input);
        for attr in ["href=", "target=\"_blank\"", "rel=\"noopener noreferrer\"", "class=\"citation-link\"", "title=\"T\""] {
            assert!(out.contains(attr), "missing {} in {}", attr, out);
        }
    }

    #[test]
    fn strips_disallowed_tags_and_attributes() {
        let out = sanitize_html("<div onclick=\"x()\"><p style=\"color:red\">Text</p><img src=x onerror=y></div>");
        assert_eq!(out, "<p>Text</p>");
    }

    #[test]
    fn drops_javascript_urls() {
        let out = sanitize_html("<a href=\"javascript:alert(1)\">x</a>");
        assert!(!out.contains("javascript:"));
    }
}
