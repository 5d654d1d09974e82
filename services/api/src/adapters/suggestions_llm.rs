//! services/api/src/adapters/suggestions_llm.rs
//!
//! Implements the `SuggestionService` port. The reply is returned raw; the core
//! splits it into individual suggestions.

use async_openai::{config::OpenAIConfig, Client};
use async_trait::async_trait;
use medassist_core::ports::{PortResult, SuggestionService};

use super::llm::{complete, system_message, user_message};

const SUGGESTION_INSTRUCTIONS: &str = "You propose follow-up questions a physician might ask \
next about a trauma or orthopaedic case. Return exactly 3 short questions in the language of \
the original question, one per line, with no numbering and no other text.";

#[derive(Clone)]
pub struct OpenAiSuggestionAdapter {
    client: Client<OpenAIConfig>,
    model: String,
}

impl OpenAiSuggestionAdapter {
    pub fn new(client: Client<OpenAIConfig>, model: String) -> Self {
        Self { client, model }
    }
}

#[async_trait]
impl SuggestionService for OpenAiSuggestionAdapter {
    async fn suggest_follow_ups(&self, prompt: &str, answer: &str) -> PortResult<String> {
        let messages = vec![
            system_message(SUGGESTION_INSTRUCTIONS)?,
            user_message(format!("QUESTION: {}\n\nANSWER: {}", prompt, answer))?,
        ];
        complete(&self.client, &self.model, messages, 150, 0.7).await
    }
}
