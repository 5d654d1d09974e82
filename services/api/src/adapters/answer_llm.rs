//! services/api/src/adapters/answer_llm.rs
//!
//! This module contains the adapter for the primary answering LLM.
//! It implements the `AnswerGenerationService` port from the `core` crate.

const SYSTEM_INSTRUCTIONS: &str = r#"You are a clinical assistant for physicians specialised in orthopaedic surgery and traumatology.

Scope:
- Answer only questions about traumatology, orthopaedics, musculoskeletal medicine and closely related clinical practice (diagnosis, imaging, surgical and conservative treatment, rehabilitation, complications).
- If a question is outside that scope, politely say that you can only help with trauma and orthopaedic questions and do not answer it.
- Answer in the language of the question.

Style:
- Be precise and evidence-based. Prefer current guidelines and high-quality studies.
- Use short paragraphs or lists. Plain text or simple HTML (<b>, <i>, <ul>, <li>, <p>) only.
- Do not invent studies, authors, numbers or references.

Literature:
- You may receive a list of RECENT ARTICLES. When you rely on one of them, cite it by its exact title in double quotes followed by the publication year in parentheses, for example: "Exact article title" (2024).
- Never alter the wording of a title you cite.
- If you cited any article, end the answer with a section headed exactly "Referencias:" (or "References:" when answering in English) listing each cited article as: "Exact article title" (year).
- If no article is relevant, answer from general knowledge and omit the references section."#;

/// At most this many abstract characters per article are sent as context.
const MAX_CONTEXT_ABSTRACT_CHARS: usize = 600;

use async_openai::{
    config::OpenAIConfig,
    types::{ChatCompletionRequestAssistantMessageArgs, ChatCompletionRequestMessage},
    Client,
};
use async_trait::async_trait;
use medassist_core::domain::BibliographicArticle;
use medassist_core::ports::{AnswerGenerationService, AnswerRequest, PortError, PortResult};
use tracing::debug;

use super::llm::{complete, system_message, user_message};

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements `AnswerGenerationService` using an OpenAI-compatible LLM.
#[derive(Clone)]
pub struct OpenAiAnswerAdapter {
    client: Client<OpenAIConfig>,
}

impl OpenAiAnswerAdapter {
    /// Creates a new `OpenAiAnswerAdapter`. The model is chosen per request.
    pub fn new(client: Client<OpenAIConfig>) -> Self {
        Self { client }
    }
}

/// Formats the retrieved articles as a numbered context block.
pub fn articles_context(articles: &[BibliographicArticle]) -> Option<String> {
    if articles.is_empty() {
        return None;
    }
    let mut out = String::from("RECENT ARTICLES:\n");
    for (i, article) in articles.iter().enumerate() {
        let year = article
            .publication_year
            .map(|y| y.to_string())
            .unwrap_or_else(|| "n.d.".to_string());
        let abstract_text: String = article
            .abstract_text
            .chars()
            .take(MAX_CONTEXT_ABSTRACT_CHARS)
            .collect();
        out.push_str(&format!(
            "{}. \"{}\" ({}). {}. {}\n   {}\n",
            i + 1,
            article.title,
            year,
            article.authors,
            article.journal,
            abstract_text
        ));
    }
    Some(out)
}

fn build_messages(request: &AnswerRequest) -> PortResult<Vec<ChatCompletionRequestMessage>> {
    let mut messages = vec![system_message(SYSTEM_INSTRUCTIONS)?];
    if let Some(context) = articles_context(&request.articles) {
        messages.push(system_message(context)?);
    }
    for turn in &request.history {
        messages.push(user_message(turn.prompt.clone())?);
        messages.push(
            ChatCompletionRequestAssistantMessageArgs::default()
                .content(turn.answer.clone())
                .build()
                .map_err(|e| PortError::Unexpected(e.to_string()))?
                .into(),
        );
    }
    messages.push(user_message(request.prompt.clone())?);
    Ok(messages)
}

//=========================================================================================
// `AnswerGenerationService` Trait Implementation
//=========================================================================================

#[async_trait]
impl AnswerGenerationService for OpenAiAnswerAdapter {
    async fn generate_answer(&self, request: &AnswerRequest) -> PortResult<String> {
        debug!(
            model = %request.model,
            history = request.history.len(),
            articles = request.articles.len(),
            "requesting answer"
        );
        let messages = build_messages(request)?;
        let answer = complete(&self.client, &request.model, messages, 1500, 0.3).await?;
        if answer.is_empty() {
            return Err(PortError::Unexpected("LLM returned an empty answer".to_string()));
        }
        Ok(answer)
    }
}
