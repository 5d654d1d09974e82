//! services/api/src/adapters/keywords_llm.rs
//!
//! Implements the `KeywordGenerationService` port. Parsing and validation of the
//! reply happen in the core.

use async_openai::{config::OpenAIConfig, Client};
use async_trait::async_trait;
use medassist_core::ports::{KeywordGenerationService, PortResult};

use super::llm::{complete, system_message, user_message};

const KEYWORD_INSTRUCTIONS: &str = "You extract search terms for PubMed. Given a clinical \
question in English, return between 3 and 5 short medical terms (MeSH-style where possible), \
separated by commas. No numbering, no explanations, no other text.";

#[derive(Clone)]
pub struct OpenAiKeywordAdapter {
    client: Client<OpenAIConfig>,
    model: String,
}

impl OpenAiKeywordAdapter {
    pub fn new(client: Client<OpenAIConfig>, model: String) -> Self {
        Self { client, model }
    }
}

#[async_trait]
impl KeywordGenerationService for OpenAiKeywordAdapter {
    async fn generate_keywords(&self, english_text: &str) -> PortResult<String> {
        let messages = vec![
            system_message(KEYWORD_INSTRUCTIONS)?,
            user_message(english_text)?,
        ];
        complete(&self.client, &self.model, messages, 60, 0.2).await
    }
}
