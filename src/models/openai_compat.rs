//! OpenAI-compatible chat completions provider.
//!
//! Works with any API that implements the OpenAI chat completions
//! interface: Groq (the default), OpenRouter, Ollama, Together, vLLM,
//! LM Studio, etc.
//!
//! Config example:
//! ```yaml
//! model:
//!   endpoint: https://api.groq.com/openai/v1/chat/completions
//!   model: llama-3.3-70b-versatile
//!   api_key: $GROQ_API_KEY
//! ```

use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};

use super::{ChatMessage, ModelProvider, ProviderResponse, TokenUsage};

/// Provider that talks to any OpenAI-compatible chat completions API.
pub struct OpenAICompatProvider {
    api_key: String,
    endpoint: String,
    model: String,
    client: Client,
}

impl OpenAICompatProvider {
    /// Create a provider with explicit configuration.
    ///
    /// `api_key` may be empty for local servers that don't require auth.
    /// `timeout` of `None` lets a request wait indefinitely.
    pub fn new(
        endpoint: String,
        api_key: String,
        model: String,
        timeout: Option<Duration>,
    ) -> anyhow::Result<Self> {
        let mut builder = Client::builder().connect_timeout(Duration::from_secs(10));
        if let Some(t) = timeout {
            builder = builder.timeout(t);
        }
        Ok(Self {
            api_key,
            endpoint,
            model,
            client: builder.build().context("failed to build HTTP client")?,
        })
    }

    async fn post(&self, body: &Value) -> anyhow::Result<Value> {
        let mut req = self.client.post(&self.endpoint).json(body);
        if !self.api_key.is_empty() {
            req = req.bearer_auth(&self.api_key);
        }
        let resp = req.send().await?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            anyhow::bail!("completion API returned {status}: {text}");
        }

        Ok(resp.json().await?)
    }
}

#[async_trait]
impl ModelProvider for OpenAICompatProvider {
    async fn send_chat(&self, messages: &[ChatMessage]) -> anyhow::Result<String> {
        let body = json!({
            "model": self.model,
            "messages": super::serialize_messages(messages),
        });

        let json = self.post(&body).await?;
        if let Some(usage) = super::parse_token_usage(&json) {
            tracing::debug!(
                prompt_tokens = usage.prompt_tokens,
                completion_tokens = usage.completion_tokens,
                "completion usage"
            );
        }
        Ok(super::parse_content(&json))
    }

    async fn send_chat_with_functions(
        &self,
        messages: &[ChatMessage],
        functions: &[Value],
    ) -> anyhow::Result<(ProviderResponse, Option<TokenUsage>)> {
        let mut body = json!({
            "model": self.model,
            "messages": super::serialize_messages(messages),
        });

        if !functions.is_empty() {
            body["tools"] = Value::Array(functions.to_vec());
            body["tool_choice"] = json!("auto");
        }

        let json = self.post(&body).await?;
        let usage = super::parse_token_usage(&json);
        Ok((super::parse_response(&json), usage))
    }
}
