//! Tool dispatcher: one resolved [`ToolCall`] → one backend HTTP call.
//!
//! Every route binds its arguments from the query string (the tuition
//! API reads `[FromQuery]` on all endpoints, POST included).  The
//! caller's `Authorization` value is forwarded verbatim; the backend
//! alone decides whether the caller may perform the operation.
//!
//! Whatever the backend returns is normalized to a JSON value: a
//! decodable body as-is, anything else as `{"message": <raw text>}`.

use std::time::Duration;

use anyhow::Context;
use reqwest::header::{HeaderValue, AUTHORIZATION};
use reqwest::{Client, Method};
use serde_json::{json, Value};
use tracing::{debug, info};

use crate::error::DispatchError;
use crate::tools::parsing::format_number;
use crate::tools::ToolCall;

/// Page requested when the model gives none.
pub const DEFAULT_PAGE: u32 = 1;
/// Page size requested when the model gives none.
pub const DEFAULT_PAGE_SIZE: u32 = 10;

/// Method and path (relative to the backend base URL) for a tool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    pub method: Method,
    pub path: &'static str,
}

const QUERY_TUITION_ROUTE: Route = Route { method: Method::GET, path: "/mobile/query-tuition" };
const PAY_TUITION_ROUTE: Route = Route { method: Method::POST, path: "/bank/pay-tuition" };
const ADD_STUDENT_ROUTE: Route = Route { method: Method::POST, path: "/admin/add-student" };
const ADD_TUITION_ROUTE: Route = Route { method: Method::POST, path: "/admin/add-tuition" };
const UNPAID_ROUTE: Route = Route { method: Method::GET, path: "/admin/unpaid" };

/// Route for a resolved call.
pub fn route(call: &ToolCall) -> Route {
    match call {
        ToolCall::QueryTuition(_) => QUERY_TUITION_ROUTE,
        ToolCall::PayTuition(_) => PAY_TUITION_ROUTE,
        ToolCall::AddStudent(_) => ADD_STUDENT_ROUTE,
        ToolCall::AddTuition(_) => ADD_TUITION_ROUTE,
        ToolCall::GetUnpaidTuition(_) => UNPAID_ROUTE,
    }
}

/// Query-string pairs for a call, in a stable order.  Optional values
/// are omitted when absent; paging falls back to the defaults.
pub fn query_pairs(call: &ToolCall) -> Vec<(&'static str, String)> {
    let mut pairs = Vec::new();
    let mut push = |k: &'static str, v: Option<String>| {
        if let Some(v) = v {
            pairs.push((k, v));
        }
    };
    match call {
        ToolCall::QueryTuition(a) => {
            push("studentNo", a.student_no.clone());
            push("term", a.term.clone());
        }
        ToolCall::PayTuition(a) => {
            push("studentNo", a.student_no.clone());
            push("term", a.term.clone());
            push("amount", a.amount.map(format_number));
        }
        ToolCall::AddStudent(a) => {
            push("studentNo", a.student_no.clone());
            push("fullName", a.full_name.clone());
        }
        ToolCall::AddTuition(a) => {
            push("studentNo", a.student_no.clone());
            push("term", a.term.clone());
            push("totalAmount", a.total_amount.map(format_number));
        }
        ToolCall::GetUnpaidTuition(a) => {
            push("page", Some(a.page.unwrap_or(DEFAULT_PAGE).to_string()));
            push("pageSize", Some(a.page_size.unwrap_or(DEFAULT_PAGE_SIZE).to_string()));
        }
    }
    pairs
}

/// Decode a backend body, wrapping undecodable text as `{message}`.
pub fn normalize_body(text: &str) -> Value {
    serde_json::from_str(text).unwrap_or_else(|_| json!({ "message": text }))
}

/// HTTP client for the tuition backend.
#[derive(Clone)]
pub struct Dispatcher {
    client: Client,
    base_url: String,
}

impl Dispatcher {
    /// Create a dispatcher for `base_url` (e.g. `http://localhost:5025/api/v1`).
    pub fn new(base_url: impl Into<String>, timeout: Option<Duration>) -> anyhow::Result<Self> {
        let mut builder = Client::builder().connect_timeout(Duration::from_secs(10));
        if let Some(t) = timeout {
            builder = builder.timeout(t);
        }
        Ok(Self {
            client: builder.build().context("failed to build HTTP client")?,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Execute `call` against the backend.
    ///
    /// Fails with [`DispatchError::MissingArguments`] (no request sent)
    /// when required fields are absent, and [`DispatchError::Network`]
    /// when the backend cannot be reached.  Non-success statuses are
    /// not errors: their body is the result.
    pub async fn dispatch(
        &self,
        call: &ToolCall,
        authorization: Option<&HeaderValue>,
    ) -> Result<Value, DispatchError> {
        let missing = call.missing_required();
        if !missing.is_empty() {
            return Err(DispatchError::MissingArguments {
                tool: call.name(),
                fields: missing,
            });
        }

        let Route { method, path } = route(call);
        let url = format!("{}{}", self.base_url, path);

        let mut req = self.client.request(method, &url).query(&query_pairs(call));
        if let Some(auth) = authorization {
            req = req.header(AUTHORIZATION, auth.clone());
        }

        debug!(tool = call.name(), %url, "dispatching backend call");
        let resp = req.send().await?;
        let status = resp.status();
        let text = resp.text().await?;
        info!(tool = call.name(), status = status.as_u16(), "backend call completed");

        Ok(normalize_body(&text))
    }
}
