//! Argument reconciliation: merge a tool call with session memory.
//!
//! For each session-inheritable field the tool declares (`studentNo`,
//! `fullName`, `term`):
//!
//! 1. a value supplied by the model wins and is written to the session;
//! 2. otherwise a remembered session value is copied into the call;
//! 3. otherwise the field stays absent.
//!
//! Other fields (amounts, paging) are never touched.

use crate::session::{SessionContext, SessionStore};
use crate::tools::parsing::{opt_string, parse_arguments};
use crate::tools::{find_tool, ToolCall};

/// Result of reconciling one call: the effective call plus the fields
/// the model supplied (and which were therefore written back).
#[derive(Debug, Clone, PartialEq)]
pub struct Reconciled {
    pub call: ToolCall,
    pub written: SessionContext,
}

/// Fill `call` from `ctx` where the model omitted a field, and collect
/// the model-supplied fields.  Pure: does not touch any store.
pub fn merge_with_context(mut call: ToolCall, ctx: &SessionContext) -> Reconciled {
    let mut written = SessionContext::default();
    {
        let slots = call.session_slots();
        fill(slots.student_no, &ctx.student_no, &mut written.student_no);
        fill(slots.full_name, &ctx.full_name, &mut written.full_name);
        fill(slots.term, &ctx.term, &mut written.term);
    }
    Reconciled { call, written }
}

fn fill(slot: Option<&mut Option<String>>, remembered: &Option<String>, written: &mut Option<String>) {
    let Some(slot) = slot else { return };
    match slot.clone() {
        Some(supplied) => *written = Some(supplied),
        None => *slot = remembered.clone(),
    }
}

/// Reconcile `call` against the session `key` and write the
/// model-supplied values back into the store.
///
/// The write happens before dispatch and is not rolled back if the
/// dispatch later fails.
pub fn reconcile(store: &SessionStore, key: &str, call: ToolCall) -> Reconciled {
    let ctx = store.get_or_create(key);
    let reconciled = merge_with_context(call, &ctx);
    if !reconciled.written.is_empty() {
        store.update(key, &reconciled.written);
    }
    tracing::debug!(
        session = %key,
        tool = reconciled.call.name(),
        written = ?reconciled.written,
        "arguments reconciled"
    );
    reconciled
}

/// Record the session fields the model supplied in a payload that could
/// not be resolved into a call (for example an unusable amount).
///
/// Only fields the tool declares are read, and a field of the wrong type
/// is skipped on its own.  Returns what was written.
pub fn record_supplied(store: &SessionStore, key: &str, tool: &str, raw_arguments: &str) -> SessionContext {
    let Some(spec) = find_tool(tool) else {
        return SessionContext::default();
    };
    let args = parse_arguments(raw_arguments);
    let supplied = |field: &str| {
        spec.params
            .iter()
            .any(|p| p.name == field)
            .then(|| opt_string(&args, field).ok().flatten())
            .flatten()
    };
    let written = SessionContext {
        student_no: supplied("studentNo"),
        full_name: supplied("fullName"),
        term: supplied("term"),
    };
    if !written.is_empty() {
        store.update(key, &written);
    }
    tracing::debug!(session = %key, tool, written = ?written, "recorded supplied fields");
    written
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::{AddStudentArgs, GetUnpaidTuitionArgs, PayTuitionArgs, QueryTuitionArgs};

    fn remembered() -> SessionContext {
        SessionContext {
            student_no: Some("S1".into()),
            full_name: Some("Ada Lovelace".into()),
            term: Some("2024-Fall".into()),
        }
    }

    #[test]
    fn omitted_term_is_inherited() {
        let call = ToolCall::PayTuition(PayTuitionArgs {
            student_no: None,
            term: None,
            amount: Some(100.0),
        });
        let r = merge_with_context(call, &remembered());
        assert_eq!(
            r.call,
            ToolCall::PayTuition(PayTuitionArgs {
                student_no: Some("S1".into()),
                term: Some("2024-Fall".into()),
                amount: Some(100.0),
            })
        );
        assert!(r.written.is_empty());
    }

    #[test]
    fn supplied_value_wins_and_is_written() {
        let call = ToolCall::QueryTuition(QueryTuitionArgs {
            student_no: Some("S2".into()),
            term: None,
        });
        let r = merge_with_context(call, &remembered());
        assert_eq!(
            r.call,
            ToolCall::QueryTuition(QueryTuitionArgs {
                student_no: Some("S2".into()),
                term: Some("2024-Fall".into()),
            })
        );
        assert_eq!(r.written.student_no.as_deref(), Some("S2"));
        assert_eq!(r.written.term, None);
    }

    #[test]
    fn nothing_to_inherit_leaves_absent() {
        let call = ToolCall::AddStudent(AddStudentArgs::default());
        let r = merge_with_context(call, &SessionContext::default());
        assert_eq!(r.call, ToolCall::AddStudent(AddStudentArgs::default()));
    }

    #[test]
    fn paging_is_never_inherited() {
        let call = ToolCall::GetUnpaidTuition(GetUnpaidTuitionArgs::default());
        let r = merge_with_context(call.clone(), &remembered());
        assert_eq!(r.call, call);
    }

    #[tokio::test]
    async fn reconcile_writes_back_to_store() {
        let store = SessionStore::default();
        store.update("s", &SessionContext { term: Some("2024-Fall".into()), ..Default::default() });

        let call = ToolCall::AddStudent(AddStudentArgs {
            student_no: Some("S9".into()),
            full_name: Some("Grace Hopper".into()),
        });
        reconcile(&store, "s", call);

        let ctx = store.get_or_create("s");
        assert_eq!(ctx.student_no.as_deref(), Some("S9"));
        assert_eq!(ctx.full_name.as_deref(), Some("Grace Hopper"));
        assert_eq!(ctx.term.as_deref(), Some("2024-Fall"));
    }

    #[tokio::test]
    async fn unresolvable_call_still_records_supplied_fields() {
        let store = SessionStore::default();
        store.update("s", &remembered());

        let written = record_supplied(
            &store,
            "s",
            "pay_tuition",
            r#"{"studentNo":"S2","term":"2025-Spring","amount":"lots","fullName":"Nobody"}"#,
        );
        assert_eq!(written.student_no.as_deref(), Some("S2"));
        // pay_tuition declares no fullName.
        assert_eq!(written.full_name, None);

        let ctx = store.get_or_create("s");
        assert_eq!(ctx.student_no.as_deref(), Some("S2"));
        assert_eq!(ctx.term.as_deref(), Some("2025-Spring"));
        assert_eq!(ctx.full_name.as_deref(), Some("Ada Lovelace"));
    }

    #[tokio::test]
    async fn wrongly_typed_session_field_is_skipped() {
        let store = SessionStore::default();
        let written = record_supplied(&store, "s", "query_tuition", r#"{"studentNo":"S3","term":{"x":1}}"#);
        assert_eq!(written.student_no.as_deref(), Some("S3"));
        assert_eq!(written.term, None);
    }
}
