//! A full turn through the orchestrator with every collaborator simulated.

use chrono::{DateTime, Utc};
use futures::executor::block_on;

use medassist_core::domain::{BibliographicArticle, Role};
use medassist_core::testing::{account, Fakes};
use medassist_core::{AskRequest, Requester};

fn at(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
}

fn distal_radius_article() -> BibliographicArticle {
    BibliographicArticle {
        id: "35012345".to_string(),
        pmid: Some("35012345".to_string()),
        title: "Management of distal radius fractures".to_string(),
        authors: "Ana Ruiz, John Smith".to_string(),
        abstract_text: "Distal radius fractures are common.".to_string(),
        journal: "Injury".to_string(),
        publication_year: Some(2022),
        doi: Some("10.1016/j.injury.2022.01.001".to_string()),
        url: "https://pubmed.ncbi.nlm.nih.gov/35012345/".to_string(),
    }
}

#[test]
fn spanish_question_is_answered_with_one_linked_citation() {
    let fakes = Fakes::default();
    fakes
        .translator
        .set_reply("management of distal radius fracture");
    fakes
        .keywords
        .set_reply("distal radius fracture, management, orthopedic");
    fakes.search.set_results(vec![distal_radius_article()]);
    fakes.answers.set_reply(
        "Segun \"Management of distal radius fractures\" (2022), la mayoria se tratan con yeso.",
    );

    let orchestrator = fakes.orchestrator();
    let user = account(Role::Premium);
    let outcome = block_on(orchestrator.ask(
        &Requester::User(user.clone()),
        AskRequest::new("manejo de fractura de radio distal"),
        at("2025-06-01T10:00:00Z"),
    ))
    .unwrap();

    // Enrichment chain.
    let query = fakes.search.last_query().unwrap();
    assert_eq!(
        query.keywords,
        vec!["distal radius fracture", "management", "orthopedic"]
    );
    assert_eq!(query.window.from_year, 2022);
    assert_eq!(query.window.to_year, 2025);
    let context = outcome.search_context.as_ref().unwrap();
    assert_eq!(context.translated_query, "management of distal radius fracture");
    assert_eq!(context.articles, vec![distal_radius_article()]);

    // The model saw the article.
    let request = fakes.answers.last_request().unwrap();
    assert_eq!(request.articles.len(), 1);

    // Exactly one anchor, wrapping only the title.
    let html = &outcome.rendered.html;
    assert_eq!(html.matches("<a ").count(), 1, "{}", html);
    assert!(html.contains("\"<a href=\"https://pubmed.ncbi.nlm.nih.gov/35012345/\""));
    assert!(html.contains(">Management of distal radius fractures</a>\" (2022)"));
    assert_eq!(outcome.rendered.citations_linked, 1);

    // Persisted with its context.
    assert!(outcome.persisted);
    let stored = fakes.db.stored_queries();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].user_id, Some(user.id));
    assert_eq!(
        stored[0].translated_query.as_deref(),
        Some("management of distal radius fracture")
    );
    assert_eq!(stored[0].bibliographic_references.as_ref(), Some(context));
}

#[test]
fn turn_survives_with_every_enrichment_collaborator_down() {
    let fakes = Fakes::default();
    fakes.translator.fail();
    fakes.keywords.fail();
    fakes.search.fail();
    fakes.answers.set_reply("Inmovilizacion y control radiologico.");

    let outcome = block_on(fakes.orchestrator().ask(
        &Requester::Guest("guest-42".to_string()),
        AskRequest::new("fractura de muñeca en adulto"),
        at("2025-06-01T10:00:00Z"),
    ))
    .unwrap();

    let context = outcome.search_context.unwrap();
    assert_eq!(context.translated_query, "fractura de muñeca en adulto");
    assert_eq!(context.keywords, vec!["medical", "treatment"]);
    assert!(context.articles.is_empty());
    assert_eq!(
        outcome.record.response.as_deref(),
        Some("Inmovilizacion y control radiologico.")
    );
    assert_eq!(outcome.record.user_id, None);
}
