//! Completion-service abstractions.
//!
//! Defines the [`ModelProvider`] trait, the [`ChatMessage`] type, the
//! tagged [`ProviderResponse`] and the concrete
//! [`OpenAICompatProvider`] used to talk to Groq (or any other
//! OpenAI-compatible chat completions API).

pub mod openai_compat;

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

pub use openai_compat::OpenAICompatProvider;

// ---------------------------------------------------------------------------
// ChatMessage – shared message representation
// ---------------------------------------------------------------------------

/// A single chat message with a role and content.
///
/// Optionally carries tool-calling metadata so that `tool` role
/// messages and assistant `tool_calls` responses are serialised
/// correctly for the API.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
    /// For assistant messages that invoke tools: the raw
    /// OpenAI-format `tool_calls` array.
    pub tool_calls: Option<Vec<Value>>,
    /// For `role: "tool"` messages: the id of the tool call
    /// this result corresponds to.
    pub tool_call_id: Option<String>,
}

impl ChatMessage {
    /// Convenience constructor for a plain message (no tool metadata).
    pub fn new(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: content.into(),
            tool_calls: None,
            tool_call_id: None,
        }
    }

    /// Assistant message echoing the invocations the model asked for.
    pub fn assistant_tool_calls(content: impl Into<String>, calls: &[ToolInvocation]) -> Self {
        Self {
            role: "assistant".into(),
            content: content.into(),
            tool_calls: Some(calls.iter().map(ToolInvocation::to_api_json).collect()),
            tool_call_id: None,
        }
    }

    /// `tool` message carrying a result, correlated by invocation id.
    pub fn tool_result(call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: "tool".into(),
            content: content.into(),
            tool_calls: None,
            tool_call_id: Some(call_id.into()),
        }
    }
}

/// Serialise a slice of [`ChatMessage`]s into the OpenAI-compatible
/// JSON array format, including `tool_calls` and `tool_call_id` when
/// present.
pub fn serialize_messages(messages: &[ChatMessage]) -> Vec<Value> {
    messages
        .iter()
        .map(|m| {
            let mut msg = json!({ "role": m.role });
            if let Some(ref tcs) = m.tool_calls {
                msg["tool_calls"] = json!(tcs);
                // Assistant messages that carry tool_calls expect null
                // content when there is no text.
                if m.content.is_empty() {
                    msg["content"] = Value::Null;
                } else {
                    msg["content"] = json!(m.content);
                }
            } else {
                msg["content"] = json!(m.content);
            }
            if let Some(ref tcid) = m.tool_call_id {
                msg["tool_call_id"] = json!(tcid);
            }
            msg
        })
        .collect()
}

// ---------------------------------------------------------------------------
// ProviderResponse – function-calling aware response
// ---------------------------------------------------------------------------

/// Token usage statistics returned by the API.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TokenUsage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
}

/// One tool invocation requested by the model.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolInvocation {
    /// Correlation id assigned by the API; echoed on the result message.
    pub id: String,
    pub name: String,
    /// Raw JSON argument payload, possibly malformed.
    pub arguments: String,
}

impl ToolInvocation {
    /// Render as an entry of an assistant message's `tool_calls` array.
    pub fn to_api_json(&self) -> Value {
        json!({
            "id": self.id,
            "type": "function",
            "function": {
                "name": self.name,
                "arguments": self.arguments,
            }
        })
    }
}

/// Response from a model: either plain text or an ordered list of tool
/// invocations.
#[derive(Debug, Clone, PartialEq)]
pub enum ProviderResponse {
    /// Plain text reply from the model (absent content is `""`).
    Final(String),
    /// The model wants to invoke one or more tools.  `content` is any
    /// text that accompanied the calls.
    ToolCalls {
        content: String,
        calls: Vec<ToolInvocation>,
    },
}

/// Extract token usage statistics from a chat completion response.
pub fn parse_token_usage(json: &Value) -> Option<TokenUsage> {
    let usage = json.get("usage")?;
    Some(TokenUsage {
        prompt_tokens: usage["prompt_tokens"].as_u64().unwrap_or(0),
        completion_tokens: usage["completion_tokens"].as_u64().unwrap_or(0),
        total_tokens: usage["total_tokens"].as_u64().unwrap_or(0),
    })
}

/// Text content of the first choice; absent or null content is `""`.
pub fn parse_content(json: &Value) -> String {
    json["choices"][0]["message"]["content"]
        .as_str()
        .unwrap_or("")
        .to_string()
}

/// Parse a chat completion response into a [`ProviderResponse`].
///
/// Entries of `tool_calls` without a function name are skipped.  Calls
/// without an id get a generated one so the result message can still
/// be correlated.
pub fn parse_response(json: &Value) -> ProviderResponse {
    let content = parse_content(json);
    let calls: Vec<ToolInvocation> = json["choices"][0]["message"]["tool_calls"]
        .as_array()
        .map(|tool_calls| {
            tool_calls
                .iter()
                .filter_map(|tc| {
                    let func = tc.get("function")?;
                    let name = func.get("name")?.as_str()?.to_string();
                    let arguments = func
                        .get("arguments")
                        .and_then(|a| a.as_str())
                        .unwrap_or("{}")
                        .to_string();
                    let id = tc
                        .get("id")
                        .and_then(|i| i.as_str())
                        .filter(|i| !i.is_empty())
                        .map(String::from)
                        .unwrap_or_else(|| format!("call_{}", uuid::Uuid::new_v4().simple()));
                    Some(ToolInvocation { id, name, arguments })
                })
                .collect()
        })
        .unwrap_or_default();

    if calls.is_empty() {
        ProviderResponse::Final(content)
    } else {
        ProviderResponse::ToolCalls { content, calls }
    }
}

// ---------------------------------------------------------------------------
// ModelProvider trait
// ---------------------------------------------------------------------------

/// Trait implemented by every completion backend.
#[async_trait]
pub trait ModelProvider: Send + Sync {
    /// Send a sequence of chat messages and return the assistant's reply.
    async fn send_chat(&self, messages: &[ChatMessage]) -> anyhow::Result<String>;

    /// Send chat messages together with a tool catalog, letting the
    /// model choose whether to call one.
    async fn send_chat_with_functions(
        &self,
        messages: &[ChatMessage],
        functions: &[Value],
    ) -> anyhow::Result<(ProviderResponse, Option<TokenUsage>)>;
}

/// Build the configured provider.
pub fn build_provider(cfg: &crate::config::ModelConfig) -> anyhow::Result<Arc<dyn ModelProvider>> {
    let provider = OpenAICompatProvider::new(
        cfg.endpoint.clone(),
        cfg.api_key()?,
        cfg.model.clone(),
        cfg.timeout(),
    )?;
    tracing::debug!(endpoint = %cfg.endpoint, model = %cfg.model, "model provider built");
    Ok(Arc::new(provider))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_reply_is_final() {
        let resp = json!({
            "choices": [{ "message": { "role": "assistant", "content": "Hi there!" } }]
        });
        assert_eq!(parse_response(&resp), ProviderResponse::Final("Hi there!".into()));
    }

    #[test]
    fn null_content_normalizes_to_empty() {
        let resp = json!({
            "choices": [{ "message": { "role": "assistant", "content": null } }]
        });
        assert_eq!(parse_response(&resp), ProviderResponse::Final(String::new()));
        assert_eq!(parse_response(&json!({ "choices": [] })), ProviderResponse::Final(String::new()));
    }

    #[test]
    fn tool_calls_keep_order_and_ids() {
        let resp = json!({
            "choices": [{
                "message": {
                    "role": "assistant",
                    "content": null,
                    "tool_calls": [
                        { "id": "call_1", "type": "function",
                          "function": { "name": "query_tuition", "arguments": "{\"studentNo\":\"S1\"}" } },
                        { "id": "call_2", "type": "function",
                          "function": { "name": "get_unpaid_tuition", "arguments": "{}" } }
                    ]
                }
            }]
        });
        match parse_response(&resp) {
            ProviderResponse::ToolCalls { content, calls } => {
                assert!(content.is_empty());
                assert_eq!(calls.len(), 2);
                assert_eq!(calls[0].id, "call_1");
                assert_eq!(calls[0].name, "query_tuition");
                assert_eq!(calls[1].name, "get_unpaid_tuition");
            }
            other => panic!("expected ToolCalls, got {other:?}"),
        }
    }

    #[test]
    fn missing_id_is_generated() {
        let resp = json!({
            "choices": [{ "message": { "tool_calls": [
                { "function": { "name": "add_student" } }
            ] } }]
        });
        let ProviderResponse::ToolCalls { calls, .. } = parse_response(&resp) else {
            panic!("expected ToolCalls");
        };
        assert!(calls[0].id.starts_with("call_"));
        assert_eq!(calls[0].arguments, "{}");
    }

    #[test]
    fn serialize_tool_exchange() {
        let call = ToolInvocation {
            id: "call_9".into(),
            name: "pay_tuition".into(),
            arguments: "{\"amount\":100}".into(),
        };
        let msgs = vec![
            ChatMessage::new("system", "sys"),
            ChatMessage::assistant_tool_calls("", std::slice::from_ref(&call)),
            ChatMessage::tool_result("call_9", "{\"ok\":true}"),
        ];
        let out = serialize_messages(&msgs);
        assert_eq!(out[0]["content"], "sys");
        assert!(out[1]["content"].is_null());
        assert_eq!(out[1]["tool_calls"][0]["function"]["name"], "pay_tuition");
        assert_eq!(out[1]["tool_calls"][0]["type"], "function");
        assert_eq!(out[2]["role"], "tool");
        assert_eq!(out[2]["tool_call_id"], "call_9");
    }

    #[test]
    fn usage_is_parsed() {
        let resp = json!({ "usage": { "prompt_tokens": 10, "completion_tokens": 5, "total_tokens": 15 } });
        assert_eq!(
            parse_token_usage(&resp),
            Some(TokenUsage { prompt_tokens: 10, completion_tokens: 5, total_tokens: 15 })
        );
        assert_eq!(parse_token_usage(&json!({})), None);
    }
}
