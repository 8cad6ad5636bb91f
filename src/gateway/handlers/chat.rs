use axum::{
    body::Bytes,
    extract::State,
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{Map, Value};
use tracing::{debug, warn};

use super::super::AppState;
use crate::error::TurnError;
use crate::orchestrator::{StudentIdentity, TurnRequest};
use crate::tools::parsing::opt_string;

/// Session key used when the client sends no `sessionId`.  All such
/// callers share one session.
pub(crate) const DEFAULT_SESSION: &str = "default";

/// Body of `POST /api/chat`.  Every field is optional so that a missing
/// prompt is reported as such rather than as a decode failure.
#[derive(Debug, Default)]
pub(crate) struct ChatBody {
    prompt: Option<String>,
    session_id: Option<String>,
    student_no: Option<String>,
    full_name: Option<String>,
}

impl ChatBody {
    /// Decode leniently, field by field.  Numbers are accepted where a
    /// string is expected; a field of any other type is dropped on its
    /// own.  Only a body that is not a JSON object reads as empty.
    pub(crate) fn parse(raw: &[u8]) -> Self {
        let fields = match serde_json::from_slice::<Value>(raw) {
            Ok(Value::Object(map)) => map,
            _ => return Self::default(),
        };
        Self {
            prompt: prompt_field(&fields),
            session_id: lenient(&fields, "sessionId"),
            student_no: lenient(&fields, "studentNo"),
            full_name: lenient(&fields, "fullName"),
        }
    }

    pub(crate) fn into_turn(self, authorization: Option<HeaderValue>) -> TurnRequest {
        TurnRequest {
            session_key: self
                .session_id
                .unwrap_or_else(|| DEFAULT_SESSION.to_string()),
            prompt: self.prompt.unwrap_or_default(),
            authorization,
            identity: StudentIdentity {
                student_no: self.student_no,
                full_name: self.full_name,
            },
        }
    }
}

fn lenient(fields: &Map<String, Value>, key: &str) -> Option<String> {
    opt_string(fields, key).unwrap_or_else(|reason| {
        warn!(%reason, "ignoring chat body field");
        None
    })
}

/// The prompt is taken as sent: it is not trimmed.
fn prompt_field(fields: &Map<String, Value>) -> Option<String> {
    match fields.get("prompt")? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// `POST /api/chat`
pub(crate) async fn api_chat(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let authorization = headers.get(header::AUTHORIZATION).cloned();

    let turn = ChatBody::parse(&body).into_turn(authorization);
    debug!(session = %turn.session_key, "chat turn received");

    match state.orchestrator.handle_turn(turn).await {
        Ok(output) => Json(serde_json::json!({ "output": output })).into_response(),
        Err(e) => error_response(&e),
    }
}

fn error_response(err: &TurnError) -> Response {
    let (status, message) = match err {
        TurnError::InvalidRequest(msg) => (StatusCode::BAD_REQUEST, msg.as_str()),
        TurnError::OrchestrationFailure(_) => {
            (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
        }
    };
    (status, Json(serde_json::json!({ "error": message }))).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_session_id_uses_shared_key() {
        let turn = ChatBody::parse(br#"{"prompt":"hi"}"#).into_turn(None);
        assert_eq!(turn.session_key, DEFAULT_SESSION);
        assert_eq!(turn.prompt, "hi");
    }

    #[test]
    fn camel_case_fields_are_read() {
        let turn = ChatBody::parse(
            br#"{"prompt":"hi","sessionId":"abc","studentNo":"S1","fullName":"Ada"}"#,
        )
        .into_turn(Some(HeaderValue::from_static("Bearer t")));
        assert_eq!(turn.session_key, "abc");
        assert_eq!(turn.identity.student_no.as_deref(), Some("S1"));
        assert_eq!(turn.identity.full_name.as_deref(), Some("Ada"));
        assert_eq!(turn.authorization, Some(HeaderValue::from_static("Bearer t")));
    }

    #[test]
    fn numeric_ids_are_read_as_strings() {
        let turn = ChatBody::parse(br#"{"prompt":"hi","sessionId":12345,"studentNo":2021001}"#)
            .into_turn(None);
        assert_eq!(turn.prompt, "hi");
        assert_eq!(turn.session_key, "12345");
        assert_eq!(turn.identity.student_no.as_deref(), Some("2021001"));
    }

    #[test]
    fn wrongly_typed_field_drops_only_itself() {
        let turn = ChatBody::parse(br#"{"prompt":"hi","sessionId":"s1","fullName":["Ada"]}"#)
            .into_turn(None);
        assert_eq!(turn.prompt, "hi");
        assert_eq!(turn.session_key, "s1");
        assert_eq!(turn.identity.full_name, None);
    }

    #[test]
    fn non_ascii_authorization_is_kept_byte_for_byte() {
        let raw = HeaderValue::from_bytes(b"Bearer caf\xe9").unwrap();
        assert!(raw.to_str().is_err());
        let turn = ChatBody::parse(br#"{"prompt":"hi"}"#).into_turn(Some(raw.clone()));
        assert_eq!(turn.authorization, Some(raw));
    }

    #[test]
    fn garbage_body_reads_as_empty_prompt() {
        let turn = ChatBody::parse(b"not json").into_turn(None);
        assert!(turn.prompt.is_empty());
    }

    #[test]
    fn failures_hide_details() {
        let resp = error_response(&TurnError::failure(anyhow::anyhow!("secret detail")));
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let resp = error_response(&TurnError::InvalidRequest("Prompt is required".into()));
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }
}
