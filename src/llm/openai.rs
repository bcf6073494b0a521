//! OpenAI chat completions implementation.

use super::{ChatMessage, CompletionRequest, LanguageModel, Role, TokenStream};
use crate::error::{Result, ShopwrightError};
use async_openai::config::OpenAIConfig;
use async_openai::types::{
    ChatCompletionRequestAssistantMessageArgs, ChatCompletionRequestMessage,
    ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
    CreateChatCompletionRequest, CreateChatCompletionRequestArgs,
};
use async_openai::Client;
use async_trait::async_trait;
use futures::StreamExt;
use tracing::{debug, instrument};

/// OpenAI-backed chat model.
pub struct OpenAIChat {
    client: Client<OpenAIConfig>,
}

impl OpenAIChat {
    pub fn new(client: Client<OpenAIConfig>) -> Self {
        Self { client }
    }

    fn build_request(&self, request: &CompletionRequest) -> Result<CreateChatCompletionRequest> {
        let mut messages: Vec<ChatCompletionRequestMessage> = Vec::with_capacity(request.messages.len() + 1);
        messages.push(
            ChatCompletionRequestSystemMessageArgs::default()
                .content(request.system.clone())
                .build()
                .map_err(|e| ShopwrightError::OpenAI(e.to_string()))?
                .into(),
        );
        for message in &request.messages {
            messages.push(to_openai_message(message)?);
        }

        let mut args = CreateChatCompletionRequestArgs::default();
        args.model(&request.model).messages(messages);
        if let Some(temperature) = request.temperature {
            args.temperature(temperature);
        }
        args.build().map_err(|e| ShopwrightError::OpenAI(e.to_string()))
    }
}

fn to_openai_message(message: &ChatMessage) -> Result<ChatCompletionRequestMessage> {
    let converted = match message.role {
        Role::User => ChatCompletionRequestUserMessageArgs::default()
            .content(message.content.clone())
            .build()
            .map_err(|e| ShopwrightError::OpenAI(e.to_string()))?
            .into(),
        Role::Assistant => ChatCompletionRequestAssistantMessageArgs::default()
            .content(message.content.clone())
            .build()
            .map_err(|e| ShopwrightError::OpenAI(e.to_string()))?
            .into(),
        Role::System => ChatCompletionRequestSystemMessageArgs::default()
            .content(message.content.clone())
            .build()
            .map_err(|e| ShopwrightError::OpenAI(e.to_string()))?
            .into(),
    };
    Ok(converted)
}

#[async_trait]
impl LanguageModel for OpenAIChat {
    #[instrument(skip(self, request), fields(kind = %request.kind, model = %request.model))]
    async fn complete(&self, request: CompletionRequest) -> Result<String> {
        let openai_request = self.build_request(&request)?;

        let response = self.client.chat().create(openai_request).await.map_err(|e| {
            ShopwrightError::OpenAI(format!("Failed to generate response: {}", e))
        })?;

        let reply = response
            .choices
            .first()
            .and_then(|c| c.message.content.clone())
            .ok_or_else(|| ShopwrightError::OpenAI("Empty response from LLM".to_string()))?;

        debug!("Completion returned {} chars", reply.len());
        Ok(reply)
    }

    #[instrument(skip(self, request), fields(kind = %request.kind, model = %request.model))]
    async fn stream(&self, request: CompletionRequest) -> Result<TokenStream> {
        let openai_request = self.build_request(&request)?;

        let stream = self
            .client
            .chat()
            .create_stream(openai_request)
            .await
            .map_err(|e| ShopwrightError::OpenAI(format!("Failed to start stream: {}", e)))?;

        let tokens = stream.filter_map(|item| async move {
            match item {
                Ok(response) => {
                    let text: String = response
                        .choices
                        .iter()
                        .filter_map(|c| c.delta.content.as_deref())
                        .collect();
                    if text.is_empty() {
                        None
                    } else {
                        Some(Ok(text))
                    }
                }
                Err(e) => Some(Err(ShopwrightError::OpenAI(format!("Stream error: {}", e)))),
            }
        });

        Ok(Box::pin(tokens))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{OpenAISettings, PromptKind, Prompts};
    use crate::llm::vars;
    use crate::openai::create_client;
    use futures::TryStreamExt;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn chat_for(server: &MockServer) -> OpenAIChat {
        let settings = OpenAISettings {
            api_base: Some(server.uri()),
            api_key: Some("test-key".to_string()),
            ..OpenAISettings::default()
        };
        OpenAIChat::new(create_client(&settings).unwrap())
    }

    fn greeting_request() -> CompletionRequest {
        CompletionRequest::from_template(
            &Prompts::default(),
            PromptKind::Greeting,
            "gpt-4o-2024-11-20",
            &vars([]),
            &[],
        )
    }

    #[tokio::test]
    async fn test_complete_sends_system_and_user_messages() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(body_partial_json(json!({
                "model": "gpt-4o-2024-11-20",
                "messages": [
                    { "role": "system", "content": "You are Jason Bent's woodworking AI assistant." },
                    { "role": "user", "content": "Generate a friendly greeting as Jason Bent's woodworking AI assistant." }
                ]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "chatcmpl-1",
                "object": "chat.completion",
                "created": 1700000000,
                "model": "gpt-4o-2024-11-20",
                "choices": [{
                    "index": 0,
                    "message": { "role": "assistant", "content": "Hey there, fellow woodworker!" },
                    "finish_reason": "stop"
                }]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let reply = chat_for(&server).complete(greeting_request()).await.unwrap();
        assert_eq!(reply, "Hey there, fellow woodworker!");
    }

    #[tokio::test]
    async fn test_stream_yields_delta_content_in_order() {
        let server = MockServer::start().await;
        let chunk = |content: &str| {
            json!({
                "id": "chatcmpl-2",
                "object": "chat.completion.chunk",
                "created": 1700000000,
                "model": "gpt-4o-2024-11-20",
                "choices": [{ "index": 0, "delta": { "content": content }, "finish_reason": null }]
            })
        };
        let body = format!(
            "data: {}\n\ndata: {}\n\ndata: [DONE]\n\n",
            chunk("Hello"),
            chunk(" there")
        );
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(body_partial_json(json!({ "stream": true })))
            .respond_with(
                ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"),
            )
            .mount(&server)
            .await;

        let stream = chat_for(&server).stream(greeting_request()).await.unwrap();
        let tokens: Vec<String> = stream.try_collect().await.unwrap();
        assert_eq!(tokens, vec!["Hello".to_string(), " there".to_string()]);
    }
}
