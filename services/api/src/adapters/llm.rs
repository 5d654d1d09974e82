//! services/api/src/adapters/llm.rs
//!
//! Shared plumbing for the adapters that talk to the OpenAI-compatible chat
//! completions endpoint.

use async_openai::{
    config::OpenAIConfig,
    error::OpenAIError,
    types::{
        ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
        ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequestArgs,
    },
    Client,
};
use medassist_core::ports::{PortError, PortResult};

/// Builds the client for the configured endpoint.
pub fn build_client(api_key: &str, api_base: Option<&str>) -> Client<OpenAIConfig> {
    let mut config = OpenAIConfig::new().with_api_key(api_key);
    if let Some(base) = api_base {
        config = config.with_api_base(base);
    }
    Client::with_config(config)
}

pub fn system_message(content: impl Into<String>) -> PortResult<ChatCompletionRequestMessage> {
    let content: String = content.into();
    Ok(ChatCompletionRequestSystemMessageArgs::default()
        .content(content)
        .build()
        .map_err(|e| PortError::Unexpected(e.to_string()))?
        .into())
}

pub fn user_message(content: impl Into<String>) -> PortResult<ChatCompletionRequestMessage> {
    let content: String = content.into();
    Ok(ChatCompletionRequestUserMessageArgs::default()
        .content(content)
        .build()
        .map_err(|e| PortError::Unexpected(e.to_string()))?
        .into())
}

/// Sends one chat completion and returns the trimmed text of the first choice.
pub async fn complete(
    client: &Client<OpenAIConfig>,
    model: &str,
    messages: Vec<ChatCompletionRequestMessage>,
    max_tokens: u32,
    temperature: f32,
) -> PortResult<String> {
    let request = CreateChatCompletionRequestArgs::default()
        .model(model)
        .messages(messages)
        .max_tokens(max_tokens)
        .temperature(temperature)
        .build()
        .map_err(|e| PortError::Unexpected(e.to_string()))?;

    // Manually map the error, which respects the orphan rule.
    let response = client
        .chat()
        .create(request)
        .await
        .map_err(|e: OpenAIError| PortError::Unexpected(e.to_string()))?;

    let content = response
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .ok_or_else(|| PortError::Unexpected("LLM returned no text content".to_string()))?;

    Ok(content.trim().to_string())
}
