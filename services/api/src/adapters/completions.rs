//! services/api/src/adapters/completions.rs
//!
//! This module contains the adapter for the OpenAI-compatible completion
//! provider (pointed at OpenRouter). It implements the `CompletionService`
//! port from the `core` crate.

use async_openai::{
    config::OpenAIConfig,
    error::OpenAIError,
    types::chat::{
        ChatCompletionRequestAssistantMessageArgs, ChatCompletionRequestMessage,
        ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
        CreateChatCompletionRequestArgs,
    },
    Client,
};
use async_trait::async_trait;
use pettrack_core::{
    domain::{ChatRole, ChatTurn},
    ports::{CompletionOptions, CompletionService, PortError, PortResult},
};

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements `CompletionService` against any OpenAI-compatible
/// chat completion endpoint.
///
/// The HTTP client is rebuilt per call because the API key is admin-managed
/// data resolved per request, not a process-lifetime setting.
#[derive(Clone)]
pub struct OpenRouterCompletions {
    base_url: String,
}

impl OpenRouterCompletions {
    /// Creates a new `OpenRouterCompletions` targeting the given base URL.
    pub fn new(base_url: String) -> Self {
        Self { base_url }
    }
}

//=========================================================================================
// `CompletionService` Trait Implementation
//=========================================================================================

#[async_trait]
impl CompletionService for OpenRouterCompletions {
    async fn complete(
        &self,
        api_key: &str,
        system_prompt: &str,
        history: &[ChatTurn],
        options: &CompletionOptions,
    ) -> PortResult<String> {
        let config = OpenAIConfig::new()
            .with_api_key(api_key)
            .with_api_base(&self.base_url);
        let client = Client::with_config(config);

        let mut messages: Vec<ChatCompletionRequestMessage> =
            Vec::with_capacity(history.len() + 1);
        messages.push(
            ChatCompletionRequestSystemMessageArgs::default()
                .content(system_prompt)
                .build()
                .map_err(|e| PortError::Unexpected(e.to_string()))?
                .into(),
        );
        for turn in history {
            let message = match turn.role {
                ChatRole::User => ChatCompletionRequestUserMessageArgs::default()
                    .content(turn.content.as_str())
                    .build()
                    .map_err(|e| PortError::Unexpected(e.to_string()))?
                    .into(),
                ChatRole::Assistant => ChatCompletionRequestAssistantMessageArgs::default()
                    .content(turn.content.as_str())
                    .build()
                    .map_err(|e| PortError::Unexpected(e.to_string()))?
                    .into(),
            };
            messages.push(message);
        }

        let request = CreateChatCompletionRequestArgs::default()
            .model(&options.model)
            .messages(messages)
            .temperature(options.temperature)
            .max_tokens(options.max_tokens)
            .build()
            .map_err(|e| PortError::Unexpected(e.to_string()))?;

        // Call the API and manually map the error if it occurs, which respects the orphan rule.
        let response = client
            .chat()
            .create(request)
            .await
            .map_err(|e: OpenAIError| PortError::Provider(e.to_string()))?;

        // Extract the text content from the first choice in the response.
        if let Some(choice) = response.choices.into_iter().next() {
            if let Some(content) = choice.message.content {
                Ok(content)
            } else {
                Err(PortError::Provider(
                    "Completion response contained no text content.".to_string(),
                ))
            }
        } else {
            Err(PortError::Provider(
                "Completion provider returned no choices in its response.".to_string(),
            ))
        }
    }
}
