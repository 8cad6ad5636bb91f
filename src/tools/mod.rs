//! Tool catalog and typed tool calls.
//!
//! The **catalog** is a static list of [`ToolSpec`]s (name,
//! description, ordered parameter schema) handed verbatim to the
//! completion service via [`function_defs()`].
//!
//! A model-issued invocation is turned into a [`ToolCall`] by
//! [`ToolCall::from_invocation`]: one typed record per tool, every
//! field optional at this stage.  Required-field checks happen later,
//! in the dispatcher, once session inheritance has filled the gaps.

pub mod parsing;

use once_cell::sync::Lazy;
use serde_json::{json, Map, Value};

use crate::error::ToolError;
use parsing::{opt_number, opt_positive, opt_string};

// ── Catalog ──────────────────────────────────────────────────

/// JSON type of a tool parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    String,
    Number,
}

impl ParamKind {
    fn json_type(self) -> &'static str {
        match self {
            ParamKind::String => "string",
            ParamKind::Number => "number",
        }
    }
}

/// One declared parameter of a tool.
#[derive(Debug, Clone, Copy)]
pub struct ParamSpec {
    pub name: &'static str,
    pub kind: ParamKind,
    pub required: bool,
}

const fn param(name: &'static str, kind: ParamKind, required: bool) -> ParamSpec {
    ParamSpec { name, kind, required }
}

/// Metadata describing one invocable backend operation.
#[derive(Debug, Clone, Copy)]
pub struct ToolSpec {
    pub name: &'static str,
    /// Consumed by the model, not by code.
    pub description: &'static str,
    pub params: &'static [ParamSpec],
}

impl ToolSpec {
    /// JSON Schema object for the parameters, in declaration order.
    pub fn args_schema(&self) -> Value {
        let mut properties = Map::new();
        for p in self.params {
            properties.insert(p.name.to_string(), json!({ "type": p.kind.json_type() }));
        }
        let mut schema = json!({ "type": "object", "properties": properties });
        let required: Vec<&str> = self
            .params
            .iter()
            .filter(|p| p.required)
            .map(|p| p.name)
            .collect();
        if !required.is_empty() {
            schema["required"] = json!(required);
        }
        schema
    }

    /// Names of the required parameters.
    pub fn required(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.params.iter().filter(|p| p.required).map(|p| p.name)
    }
}

pub const QUERY_TUITION: &str = "query_tuition";
pub const PAY_TUITION: &str = "pay_tuition";
pub const ADD_STUDENT: &str = "add_student";
pub const ADD_TUITION: &str = "add_tuition";
pub const GET_UNPAID_TUITION: &str = "get_unpaid_tuition";

/// The full tool catalog.
pub static CATALOG: [ToolSpec; 5] = [
    ToolSpec {
        name: QUERY_TUITION,
        description: "Get tuition information for a student and optionally a term",
        params: &[
            param("studentNo", ParamKind::String, true),
            param("term", ParamKind::String, false),
        ],
    },
    ToolSpec {
        name: PAY_TUITION,
        description: "Pay tuition for a student for a specific term",
        params: &[
            param("studentNo", ParamKind::String, true),
            param("term", ParamKind::String, true),
            param("amount", ParamKind::Number, true),
        ],
    },
    ToolSpec {
        name: ADD_STUDENT,
        description: "Add a new student (admin only)",
        params: &[
            param("studentNo", ParamKind::String, true),
            param("fullName", ParamKind::String, true),
        ],
    },
    ToolSpec {
        name: ADD_TUITION,
        description: "Add tuition for a student and term (admin only)",
        params: &[
            param("studentNo", ParamKind::String, true),
            param("term", ParamKind::String, true),
            param("totalAmount", ParamKind::Number, true),
        ],
    },
    ToolSpec {
        name: GET_UNPAID_TUITION,
        description: "Get unpaid tuition list with pagination (admin only)",
        params: &[
            param("page", ParamKind::Number, false),
            param("pageSize", ParamKind::Number, false),
        ],
    },
];

/// Look up a tool specification by name.
pub fn find_tool(name: &str) -> Option<&'static ToolSpec> {
    CATALOG.iter().find(|t| t.name == name)
}

static FUNCTION_DEFS: Lazy<Vec<Value>> = Lazy::new(|| {
    CATALOG
        .iter()
        .map(|t| {
            json!({
                "type": "function",
                "function": {
                    "name": t.name,
                    "description": t.description,
                    "parameters": t.args_schema(),
                }
            })
        })
        .collect()
});

/// Tool definitions in the chat-completions `tools` format.
pub fn function_defs() -> &'static [Value] {
    &FUNCTION_DEFS
}

// ── Typed tool calls ─────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryTuitionArgs {
    pub student_no: Option<String>,
    pub term: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PayTuitionArgs {
    pub student_no: Option<String>,
    pub term: Option<String>,
    pub amount: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AddStudentArgs {
    pub student_no: Option<String>,
    pub full_name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AddTuitionArgs {
    pub student_no: Option<String>,
    pub term: Option<String>,
    pub total_amount: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct GetUnpaidTuitionArgs {
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

/// A model invocation resolved against the catalog.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolCall {
    QueryTuition(QueryTuitionArgs),
    PayTuition(PayTuitionArgs),
    AddStudent(AddStudentArgs),
    AddTuition(AddTuitionArgs),
    GetUnpaidTuition(GetUnpaidTuitionArgs),
}

/// Mutable handles on the session-inheritable fields a call declares.
/// A `None` slot means the tool has no such parameter.
#[derive(Default)]
pub struct SessionSlots<'a> {
    pub student_no: Option<&'a mut Option<String>>,
    pub full_name: Option<&'a mut Option<String>>,
    pub term: Option<&'a mut Option<String>>,
}

impl ToolCall {
    /// Resolve a tool name and its raw argument payload.
    ///
    /// Fails with [`ToolError::UnknownTool`] for names outside the
    /// catalog and [`ToolError::InvalidArguments`] when a present field
    /// has an unusable type.  Missing fields are not an error here.
    pub fn from_invocation(name: &str, raw_arguments: &str) -> Result<ToolCall, ToolError> {
        let spec = find_tool(name).ok_or_else(|| ToolError::UnknownTool(name.to_string()))?;
        let args = parsing::parse_arguments(raw_arguments);
        Self::from_args(spec.name, &args).map_err(|reason| ToolError::InvalidArguments {
            tool: spec.name.to_string(),
            reason,
        })
    }

    fn from_args(name: &str, a: &Map<String, Value>) -> Result<ToolCall, String> {
        Ok(match name {
            QUERY_TUITION => ToolCall::QueryTuition(QueryTuitionArgs {
                student_no: opt_string(a, "studentNo")?,
                term: opt_string(a, "term")?,
            }),
            PAY_TUITION => ToolCall::PayTuition(PayTuitionArgs {
                student_no: opt_string(a, "studentNo")?,
                term: opt_string(a, "term")?,
                amount: opt_number(a, "amount")?,
            }),
            ADD_STUDENT => ToolCall::AddStudent(AddStudentArgs {
                student_no: opt_string(a, "studentNo")?,
                full_name: opt_string(a, "fullName")?,
            }),
            ADD_TUITION => ToolCall::AddTuition(AddTuitionArgs {
                student_no: opt_string(a, "studentNo")?,
                term: opt_string(a, "term")?,
                total_amount: opt_number(a, "totalAmount")?,
            }),
            GET_UNPAID_TUITION => ToolCall::GetUnpaidTuition(GetUnpaidTuitionArgs {
                page: opt_positive(a, "page")?,
                page_size: opt_positive(a, "pageSize")?,
            }),
            other => return Err(format!("no argument mapping for {other}")),
        })
    }

    /// Catalog name of this call.
    pub fn name(&self) -> &'static str {
        match self {
            ToolCall::QueryTuition(_) => QUERY_TUITION,
            ToolCall::PayTuition(_) => PAY_TUITION,
            ToolCall::AddStudent(_) => ADD_STUDENT,
            ToolCall::AddTuition(_) => ADD_TUITION,
            ToolCall::GetUnpaidTuition(_) => GET_UNPAID_TUITION,
        }
    }

    /// The catalog entry for this call.
    pub fn spec(&self) -> &'static ToolSpec {
        let index = match self {
            ToolCall::QueryTuition(_) => 0,
            ToolCall::PayTuition(_) => 1,
            ToolCall::AddStudent(_) => 2,
            ToolCall::AddTuition(_) => 3,
            ToolCall::GetUnpaidTuition(_) => 4,
        };
        &CATALOG[index]
    }

    /// Session-inheritable fields declared by this tool.
    pub fn session_slots(&mut self) -> SessionSlots<'_> {
        match self {
            ToolCall::QueryTuition(a) => SessionSlots {
                student_no: Some(&mut a.student_no),
                term: Some(&mut a.term),
                ..Default::default()
            },
            ToolCall::PayTuition(a) => SessionSlots {
                student_no: Some(&mut a.student_no),
                term: Some(&mut a.term),
                ..Default::default()
            },
            ToolCall::AddStudent(a) => SessionSlots {
                student_no: Some(&mut a.student_no),
                full_name: Some(&mut a.full_name),
                ..Default::default()
            },
            ToolCall::AddTuition(a) => SessionSlots {
                student_no: Some(&mut a.student_no),
                term: Some(&mut a.term),
                ..Default::default()
            },
            ToolCall::GetUnpaidTuition(_) => SessionSlots::default(),
        }
    }

    /// Whether the parameter `param` currently has a value.
    pub fn has(&self, param: &str) -> bool {
        match (self, param) {
            (ToolCall::QueryTuition(a), "studentNo") => a.student_no.is_some(),
            (ToolCall::QueryTuition(a), "term") => a.term.is_some(),
            (ToolCall::PayTuition(a), "studentNo") => a.student_no.is_some(),
            (ToolCall::PayTuition(a), "term") => a.term.is_some(),
            (ToolCall::PayTuition(a), "amount") => a.amount.is_some(),
            (ToolCall::AddStudent(a), "studentNo") => a.student_no.is_some(),
            (ToolCall::AddStudent(a), "fullName") => a.full_name.is_some(),
            (ToolCall::AddTuition(a), "studentNo") => a.student_no.is_some(),
            (ToolCall::AddTuition(a), "term") => a.term.is_some(),
            (ToolCall::AddTuition(a), "totalAmount") => a.total_amount.is_some(),
            (ToolCall::GetUnpaidTuition(a), "page") => a.page.is_some(),
            (ToolCall::GetUnpaidTuition(a), "pageSize") => a.page_size.is_some(),
            _ => false,
        }
    }

    /// Required parameters that are still absent.
    pub fn missing_required(&self) -> Vec<&'static str> {
        self.spec().required().filter(|p| !self.has(p)).collect()
    }
}
