//! Error taxonomy for a conversational turn.
//!
//! Only two outcomes are visible to callers: the request was malformed
//! ([`TurnError::InvalidRequest`]) or something downstream broke
//! ([`TurnError::OrchestrationFailure`]).  Tool- and dispatch-level
//! errors are collapsed into the latter by the orchestrator unless they
//! are fed back to the model as a tool result.

/// Failure of a single `handle_turn` call.
#[derive(Debug, thiserror::Error)]
pub enum TurnError {
    /// The inbound request is unusable (e.g. empty prompt).  No side
    /// effects have happened.
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    /// A completion call, the backend call, or tool resolution failed.
    #[error("orchestration failure")]
    OrchestrationFailure(#[source] anyhow::Error),
}

impl TurnError {
    pub fn failure(err: impl Into<anyhow::Error>) -> Self {
        TurnError::OrchestrationFailure(err.into())
    }
}

/// Problems resolving a model-issued tool invocation into a typed call.
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    /// The model invoked something outside the declared catalog.
    #[error("unknown tool: {0}")]
    UnknownTool(String),
    /// Arguments are present but have the wrong shape (e.g. a
    /// non-numeric amount).
    #[error("invalid arguments for {tool}: {reason}")]
    InvalidArguments { tool: String, reason: String },
}

/// Problems executing a resolved tool call against the backend.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    /// Required fields are still absent after session inheritance.
    #[error("{tool}: missing required argument(s): {}", .fields.join(", "))]
    MissingArguments {
        tool: &'static str,
        fields: Vec<&'static str>,
    },
    /// The backend could not be reached or the body could not be read.
    #[error("backend request failed: {0}")]
    Network(#[from] reqwest::Error),
}
