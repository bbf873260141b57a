//! Chat completion client (OpenAI-style API).
//!
//! Completions are POST requests with side effects on the provider's usage
//! accounting, so they are never cached and the pipeline only retries them
//! on transient failures.

use std::sync::Arc;

use serde_json::{json, Map, Value};

use wordlens_commons::ApiError;

use crate::config::constants::{env_vars, services, urls};
use crate::config::PipelineConfig;
use crate::pipeline::{ApiOperation, RequestPipeline};
use crate::services::{resolve_api_key, resolve_base_url};
use crate::transport::{HttpTransport, Transport};

const SERVICE_NAME: &str = "chat";

/// One message in a conversation.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatMessage {
    pub role: String,
    pub content: Value,
}

impl ChatMessage {
    pub fn system(text: impl Into<String>) -> Self {
        Self {
            role: "system".to_owned(),
            content: Value::String(text.into()),
        }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: "user".to_owned(),
            content: Value::String(text.into()),
        }
    }

    /// A user message carrying both text and an image reference, in the
    /// multi-part content format vision models expect.
    pub fn user_with_image(text: impl Into<String>, image_url: impl Into<String>) -> Self {
        Self {
            role: "user".to_owned(),
            content: json!([
                {"type": "text", "text": text.into()},
                {"type": "image_url", "image_url": {"url": image_url.into()}}
            ]),
        }
    }
}

/// Token usage statistics reported by the provider.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// Parsed completion.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatCompletion {
    pub content: String,
    pub model: String,
    pub finish_reason: Option<String>,
    pub usage: Option<TokenUsage>,
}

pub struct ChatClient {
    api_key: String,
    base_url: String,
    model: String,
    pipeline: RequestPipeline,
}

impl ChatClient {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self::from_config(Some(api_key.into()), None, None, None)
    }

    pub fn from_config(
        api_key: Option<String>,
        model: Option<String>,
        base_url: Option<String>,
        config: Option<PipelineConfig>,
    ) -> Self {
        Self::with_transport(
            api_key,
            model,
            base_url,
            Arc::new(HttpTransport::new()),
            config,
        )
    }

    pub fn with_transport(
        api_key: Option<String>,
        model: Option<String>,
        base_url: Option<String>,
        transport: Arc<dyn Transport>,
        config: Option<PipelineConfig>,
    ) -> Self {
        let api_key = resolve_api_key(api_key, env_vars::CHAT_API_KEY).unwrap_or_default();
        let base_url = resolve_base_url(urls::CHAT_API_BASE, base_url, env_vars::CHAT_BASE_URL);
        let model = model
            .filter(|model| !model.is_empty())
            .unwrap_or_else(|| services::CHAT_DEFAULT_MODEL.to_owned());
        let config = config.unwrap_or_default();
        Self {
            api_key,
            base_url,
            model,
            pipeline: RequestPipeline::new(SERVICE_NAME, transport, &config),
        }
    }

    pub fn pipeline(&self) -> &RequestPipeline {
        &self.pipeline
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Run one chat completion over the given messages.
    pub async fn complete(&self, messages: &[ChatMessage]) -> Result<ChatCompletion, ApiError> {
        let payload = self.build_payload(messages);
        let operation = ApiOperation::post(
            format!("{}/chat/completions", self.base_url),
            payload,
        )
        .header("Authorization", format!("Bearer {}", self.api_key))
        .cacheable(false);

        let response = self.pipeline.execute(operation).await?;
        parse_completion(&response.json()?)
    }

    /// Describe an image in the learner's target language. Convenience
    /// wrapper over [`ChatClient::complete`].
    pub async fn describe_image(
        &self,
        image_url: &str,
        prompt: &str,
    ) -> Result<String, ApiError> {
        let messages = [ChatMessage::user_with_image(prompt, image_url)];
        let completion = self.complete(&messages).await?;
        Ok(completion.content)
    }

    fn build_payload(&self, messages: &[ChatMessage]) -> Value {
        let mut payload = Map::new();
        payload.insert("model".to_owned(), Value::String(self.model.clone()));
        payload.insert(
            "messages".to_owned(),
            Value::Array(
                messages
                    .iter()
                    .map(|message| {
                        json!({
                            "role": message.role,
                            "content": message.content,
                        })
                    })
                    .collect(),
            ),
        );
        payload.insert(
            "max_tokens".to_owned(),
            Value::Number(services::CHAT_MAX_TOKENS.into()),
        );
        Value::Object(payload)
    }
}

fn parse_completion(value: &Value) -> Result<ChatCompletion, ApiError> {
    let choice = value
        .get("choices")
        .and_then(|choices| choices.as_array())
        .and_then(|choices| choices.first())
        .ok_or_else(|| ApiError::Decode {
            message: "completion payload missing 'choices'".to_owned(),
            metadata: None,
        })?;

    let content = choice
        .get("message")
        .and_then(|message| message.get("content"))
        .and_then(Value::as_str)
        .unwrap_or_default()
        .trim()
        .to_owned();

    let usage = value.get("usage").map(|usage| TokenUsage {
        prompt_tokens: usage
            .get("prompt_tokens")
            .and_then(Value::as_u64)
            .unwrap_or(0) as u32,
        completion_tokens: usage
            .get("completion_tokens")
            .and_then(Value::as_u64)
            .unwrap_or(0) as u32,
        total_tokens: usage
            .get("total_tokens")
            .and_then(Value::as_u64)
            .unwrap_or(0) as u32,
    });

    Ok(ChatCompletion {
        content,
        model: value
            .get("model")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_owned(),
        finish_reason: choice
            .get("finish_reason")
            .and_then(Value::as_str)
            .map(str::to_owned),
        usage,
    })
}
