//! Conversation orchestrator: one chat turn as a three-stage pipeline.
//!
//! ```text
//! extract ──► act ──► synthesize
//! ```
//!
//! * **extract** asks the model, with the tool catalog attached, what
//!   to do.  A plain reply ends the turn.
//! * **act** resolves the first invocation into a typed call,
//!   reconciles it with session memory and dispatches it.
//! * **synthesize** hands the backend result back to the model and
//!   returns its wording of it.
//!
//! Each stage returns an immutable value consumed by the next.

use std::sync::Arc;

use reqwest::header::HeaderValue;
use serde_json::{json, Value};
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::dispatch::Dispatcher;
use crate::error::{DispatchError, ToolError, TurnError};
use crate::models::{ChatMessage, ModelProvider, ProviderResponse, ToolInvocation};
use crate::reconcile;
use crate::session::{SessionContext, SessionStore};
use crate::tools::{self, ToolCall};

/// Identity an authenticated caller may attach to a turn.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StudentIdentity {
    pub student_no: Option<String>,
    pub full_name: Option<String>,
}

/// One inbound chat turn.
#[derive(Debug, Clone)]
pub struct TurnRequest {
    pub session_key: String,
    pub prompt: String,
    /// Raw `Authorization` header value, forwarded byte for byte.
    pub authorization: Option<HeaderValue>,
    pub identity: StudentIdentity,
}

/// Outcome of the extract stage.
#[derive(Debug, Clone, PartialEq)]
pub enum Extraction {
    /// The model answered directly; no tool is needed.
    Reply(String),
    /// The model asked for a tool.  `assistant` is its message,
    /// echoed back during synthesis.
    Invoke {
        assistant: ChatMessage,
        invocation: ToolInvocation,
    },
}

/// Outcome of the act stage.
#[derive(Debug, Clone, PartialEq)]
pub struct Action {
    pub assistant: ChatMessage,
    pub invocation: ToolInvocation,
    /// Backend Call Result (or an `{"error": …}` value when the call
    /// could not be made).  Never inspected, only forwarded.
    pub result: Value,
}

const SYNONYM_NOTE: &str = "Note: \"Add tuition\" means the same as \"add new tuition\".";

/// Build the system prompt for the current session context.
pub fn system_prompt(ctx: &SessionContext) -> String {
    match ctx.student_no {
        Some(ref student_no) => {
            let who = match ctx.full_name {
                Some(ref name) => format!("{name} ({student_no})"),
                None => student_no.clone(),
            };
            format!(
                "You are a university tuition assistant.\n\
                 The logged-in user is: {who}.\n\
                 Respond clearly and concisely to tuition queries or admin actions.\n\
                 {SYNONYM_NOTE}"
            )
        }
        None => format!(
            "You are a university tuition assistant.\n\
             Greet the user.\n\
             If user asks, tell a joke or make a casual conversation.\n\
             Respond clearly and concisely.\n\
             Currently no user is logged in.\n\
             {SYNONYM_NOTE}"
        ),
    }
}

/// Only the first invocation of a turn is honored; the rest are
/// dropped.  Returns the chosen invocation and how many were ignored.
pub fn first_invocation(calls: &[ToolInvocation]) -> Option<(ToolInvocation, usize)> {
    calls
        .first()
        .map(|first| (first.clone(), calls.len() - 1))
}

/// Drives chat turns against a completion service and the backend.
pub struct Orchestrator {
    provider: Arc<dyn ModelProvider>,
    dispatcher: Dispatcher,
    sessions: Arc<SessionStore>,
}

impl Orchestrator {
    pub fn new(
        provider: Arc<dyn ModelProvider>,
        dispatcher: Dispatcher,
        sessions: Arc<SessionStore>,
    ) -> Self {
        Self {
            provider,
            dispatcher,
            sessions,
        }
    }

    /// Wire a provider and dispatcher from configuration around an
    /// existing session store.
    pub fn from_config(cfg: &Config, sessions: Arc<SessionStore>) -> anyhow::Result<Self> {
        let provider = crate::models::build_provider(&cfg.model)?;
        let dispatcher = Dispatcher::new(cfg.backend.base_url.clone(), cfg.backend.timeout())?;
        Ok(Self::new(provider, dispatcher, sessions))
    }

    pub fn sessions(&self) -> &Arc<SessionStore> {
        &self.sessions
    }

    /// Run one turn and return the reply text.
    ///
    /// An empty prompt fails with [`TurnError::InvalidRequest`] before
    /// anything else happens.  Whitespace is a prompt like any other.  Any downstream failure is logged and
    /// surfaced as [`TurnError::OrchestrationFailure`].
    pub async fn handle_turn(&self, req: TurnRequest) -> Result<String, TurnError> {
        if req.prompt.is_empty() {
            return Err(TurnError::InvalidRequest("Prompt is required".into()));
        }
        let key = req.session_key.as_str();

        let ctx = self.apply_identity(key, &req.identity);
        let base = vec![
            ChatMessage::new("system", system_prompt(&ctx)),
            ChatMessage::new("user", req.prompt.clone()),
        ];

        let result = self
            .run_stages(key, &base, req.authorization.as_ref())
            .await;
        if let Err(TurnError::OrchestrationFailure(ref e)) = result {
            error!(session = %key, error = ?e, "turn failed");
        }
        result
    }

    async fn run_stages(
        &self,
        key: &str,
        base: &[ChatMessage],
        authorization: Option<&HeaderValue>,
    ) -> Result<String, TurnError> {
        match self.extract(base).await? {
            Extraction::Reply(text) => {
                debug!(session = %key, "model replied without a tool call");
                Ok(text)
            }
            Extraction::Invoke {
                assistant,
                invocation,
            } => {
                let action = self.act(key, assistant, invocation, authorization).await?;
                self.synthesize(base, &action).await
            }
        }
    }

    /// Write the caller's identity hint into the session and return the
    /// resulting context.
    fn apply_identity(&self, key: &str, identity: &StudentIdentity) -> SessionContext {
        let hint = SessionContext {
            student_no: identity.student_no.clone().filter(|s| !s.trim().is_empty()),
            full_name: identity.full_name.clone().filter(|s| !s.trim().is_empty()),
            term: None,
        };
        if hint.is_empty() {
            self.sessions.get_or_create(key)
        } else {
            self.sessions.update(key, &hint)
        }
    }

    /// Stage 1: ask the model what to do, tools enabled.
    pub async fn extract(&self, base: &[ChatMessage]) -> Result<Extraction, TurnError> {
        let (response, usage) = self
            .provider
            .send_chat_with_functions(base, tools::function_defs())
            .await
            .map_err(|e| TurnError::failure(e.context("extraction completion failed")))?;

        if let Some(u) = usage {
            debug!(
                prompt_tokens = u.prompt_tokens,
                completion_tokens = u.completion_tokens,
                total_tokens = u.total_tokens,
                "extraction usage"
            );
        }

        Ok(match response {
            ProviderResponse::Final(text) => Extraction::Reply(text),
            ProviderResponse::ToolCalls { content, calls } => match first_invocation(&calls) {
                Some((invocation, ignored)) => {
                    if ignored > 0 {
                        warn!(
                            tool = %invocation.name,
                            ignored,
                            "model requested several tools; only the first is honored"
                        );
                    }
                    Extraction::Invoke {
                        assistant: ChatMessage::assistant_tool_calls(
                            content,
                            std::slice::from_ref(&invocation),
                        ),
                        invocation,
                    }
                }
                None => Extraction::Reply(content),
            },
        })
    }

    /// Stage 2: resolve, reconcile and dispatch the invocation.
    pub async fn act(
        &self,
        session_key: &str,
        assistant: ChatMessage,
        invocation: ToolInvocation,
        authorization: Option<&HeaderValue>,
    ) -> Result<Action, TurnError> {
        let result = match ToolCall::from_invocation(&invocation.name, &invocation.arguments) {
            Err(e @ ToolError::UnknownTool(_)) => return Err(TurnError::failure(e)),
            Err(e @ ToolError::InvalidArguments { .. }) => {
                reconcile::record_supplied(
                    &self.sessions,
                    session_key,
                    &invocation.name,
                    &invocation.arguments,
                );
                warn!(session = %session_key, error = %e, "feeding argument error back to the model");
                json!({ "error": e.to_string() })
            }
            Ok(call) => {
                let reconciled = reconcile::reconcile(&self.sessions, session_key, call);
                info!(session = %session_key, tool = reconciled.call.name(), "invoking tool");
                match self.dispatcher.dispatch(&reconciled.call, authorization).await {
                    Ok(v) => v,
                    Err(e @ DispatchError::MissingArguments { .. }) => {
                        warn!(session = %session_key, error = %e, "feeding missing arguments back to the model");
                        json!({ "error": e.to_string() })
                    }
                    Err(e @ DispatchError::Network(_)) => return Err(TurnError::failure(e)),
                }
            }
        };

        Ok(Action {
            assistant,
            invocation,
            result,
        })
    }

    /// Stage 3: let the model phrase the tool result.
    pub async fn synthesize(&self, base: &[ChatMessage], action: &Action) -> Result<String, TurnError> {
        let payload = serde_json::to_string(&action.result).map_err(TurnError::failure)?;

        let mut messages = base.to_vec();
        messages.push(action.assistant.clone());
        messages.push(ChatMessage::tool_result(action.invocation.id.clone(), payload));

        self.provider
            .send_chat(&messages)
            .await
            .map_err(|e| TurnError::failure(e.context("synthesis completion failed")))
    }
}
