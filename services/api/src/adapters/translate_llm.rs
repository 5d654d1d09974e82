//! services/api/src/adapters/translate_llm.rs
//!
//! Implements the `TranslationService` port with a small chat model.

use async_openai::{config::OpenAIConfig, Client};
use async_trait::async_trait;
use medassist_core::ports::{PortResult, TranslationService};

use super::llm::{complete, system_message, user_message};

const TRANSLATION_INSTRUCTIONS: &str = "You translate clinical questions into English for a \
biomedical literature search. Keep medical terminology precise. If the text is already in \
English, return it unchanged. Respond with ONLY the translation, no quotes, no explanation.";

#[derive(Clone)]
pub struct OpenAiTranslationAdapter {
    client: Client<OpenAIConfig>,
    model: String,
}

impl OpenAiTranslationAdapter {
    pub fn new(client: Client<OpenAIConfig>, model: String) -> Self {
        Self { client, model }
    }
}

#[async_trait]
impl TranslationService for OpenAiTranslationAdapter {
    async fn translate_to_english(&self, text: &str) -> PortResult<String> {
        let messages = vec![
            system_message(TRANSLATION_INSTRUCTIONS)?,
            user_message(text)?,
        ];
        complete(&self.client, &self.model, messages, 300, 0.0).await
    }
}
