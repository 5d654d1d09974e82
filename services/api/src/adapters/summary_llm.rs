//! services/api/src/adapters/summary_llm.rs
//!
//! This module contains the adapter for the summarizing LLM.
//! It implements the `SummaryService` port from the `core` crate.

use async_openai::{config::OpenAIConfig, Client};
use async_trait::async_trait;
use medassist_core::{
    domain::QueryRecord,
    ports::{PortError, PortResult, SummaryService},
};

use super::llm::{complete, system_message, user_message};

const SUMMARY_INSTRUCTIONS: &str = "You summarise a clinical question and its answer for a \
physician's history list. Write one or two sentences in the language of the question that \
capture the clinical problem and the key recommendation. No preamble.";

/// An adapter that implements `SummaryService` using an OpenAI-compatible LLM.
#[derive(Clone)]
pub struct OpenAiSummaryAdapter {
    client: Client<OpenAIConfig>,
    model: String,
}

impl OpenAiSummaryAdapter {
    /// Creates a new `OpenAiSummaryAdapter`.
    pub fn new(client: Client<OpenAIConfig>, model: String) -> Self {
        Self { client, model }
    }
}

#[async_trait]
impl SummaryService for OpenAiSummaryAdapter {
    async fn summarize(&self, record: &QueryRecord) -> PortResult<String> {
        let answer = record
            .response
            .as_deref()
            .ok_or_else(|| PortError::Unexpected(format!("query {} has no answer", record.id)))?;
        let messages = vec![
            system_message(SUMMARY_INSTRUCTIONS)?,
            user_message(format!("QUESTION: {}\n\nANSWER: {}", record.prompt, answer))?,
        ];
        complete(&self.client, &self.model, messages, 120, 0.3).await
    }
}
