use crate::batch::{import_roster, RosterImport, SingleNameAs};
use crate::db;
use crate::error::StoreError;
use crate::generate::{picker_for, Picker};
use crate::ipc::error::{err, ok, store_err};
use crate::ipc::types::{AppState, Request};
use crate::model::Student;
use crate::session::SessionSync;
use crate::store::{reduce, Action, Decision, Planned};
use rusqlite::Connection;
use serde::de::DeserializeOwned;
use serde_json::json;
use std::collections::HashMap;

pub type HandlerResult = Result<serde_json::Value, serde_json::Value>;

pub fn respond(result: HandlerResult) -> serde_json::Value {
    result.unwrap_or_else(|e| e)
}

pub fn required_str(req: &Request, key: &str) -> Result<String, serde_json::Value> {
    req.params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|v| v.to_string())
        .ok_or_else(|| err(&req.id, "bad_params", format!("missing {}", key), None))
}

pub fn optional_str(req: &Request, key: &str) -> Option<String> {
    req.params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|v| v.to_string())
}

pub fn flag(req: &Request, key: &str) -> bool {
    req.params
        .get(key)
        .and_then(|v| v.as_bool())
        .unwrap_or(false)
}

/// Deserializes `params[key]` into a typed value.
pub fn param<T: DeserializeOwned>(req: &Request, key: &str) -> Result<T, serde_json::Value> {
    optional_param(req, key)?
        .ok_or_else(|| err(&req.id, "bad_params", format!("missing {}", key), None))
}

pub fn optional_param<T: DeserializeOwned>(
    req: &Request,
    key: &str,
) -> Result<Option<T>, serde_json::Value> {
    match req.params.get(key) {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(v) => serde_json::from_value(v.clone()).map(Some).map_err(|e| {
            err(
                &req.id,
                "bad_params",
                format!("invalid {}: {}", key, e),
                None,
            )
        }),
    }
}

/// Optional `seed` makes variant picks reproducible.
pub fn picker(req: &Request) -> Result<Box<dyn Picker>, serde_json::Value> {
    Ok(picker_for(optional_param::<u64>(req, "seed")?))
}

pub fn db_conn<'a>(state: &'a AppState, req: &Request) -> Result<&'a Connection, serde_json::Value> {
    state
        .db
        .as_ref()
        .ok_or_else(|| store_err(&req.id, &StoreError::NoWorkspace))
}

pub fn domain<T>(req: &Request, result: crate::error::Result<T>) -> Result<T, serde_json::Value> {
    result.map_err(|e| {
        tracing::debug!(method = %req.method, code = e.code(), "request rejected: {e}");
        store_err(&req.id, &e)
    })
}

/// Applies one transition and persists it. The in-memory document only
/// changes once the save has succeeded.
pub fn commit(state: &mut AppState, req: &Request, action: Action) -> Result<(), serde_json::Value> {
    let label = action.label();
    let next = reduce(state.doc.clone(), action);
    let conn = db_conn(state, req)?;
    if let Err(e) = db::save_document(conn, &next) {
        tracing::error!(action = label, "failed to persist document: {e:#}");
        return Err(err(&req.id, "db_save_failed", format!("{e:#}"), None));
    }
    state.doc = next;
    tracing::info!(action = label, method = %req.method, "state transition applied");
    sync_session(state, req);
    Ok(())
}

/// Keeps an open writing session in step with the committed document.
fn sync_session(state: &mut AppState, req: &Request) {
    let Some(session) = state.session.as_mut() else {
        return;
    };
    let seed = req.params.get("seed").and_then(|v| v.as_u64());
    let mut picker = picker_for(seed);
    match session.sync(&state.doc, picker.as_mut()) {
        SessionSync::Unchanged => {}
        SessionSync::Refreshed => {
            tracing::debug!(method = %req.method, "writing session refreshed")
        }
        SessionSync::Closed => {
            tracing::info!(method = %req.method, "writing session closed");
            state.session = None;
        }
    }
}

pub fn decision_response(req: &Request, decision: &Decision) -> serde_json::Value {
    tracing::debug!(method = %req.method, "awaiting decision");
    ok(&req.id, json!({ "applied": false, "decision": decision }))
}

/// Commits a planned action, or answers with the pending decision.
pub fn apply_planned(
    state: &mut AppState,
    req: &Request,
    planned: Planned,
) -> HandlerResult {
    match planned {
        Planned::Apply(action) => {
            commit(state, req, action)?;
            Ok(ok(&req.id, json!({ "applied": true })))
        }
        Planned::NeedsDecision(decision) => Ok(decision_response(req, &decision)),
    }
}

/// Resolves a pasted roster with the request's `singleNames` decisions.
/// `Err` is the response to send as is: an error, or the pending decision.
pub fn roster_students(
    req: &Request,
    text: &str,
) -> Result<(Vec<Student>, bool), serde_json::Value> {
    let decisions: HashMap<usize, SingleNameAs> =
        optional_param(req, "singleNames")?.unwrap_or_default();
    match import_roster(text, &decisions) {
        RosterImport::NoValidData => Err(store_err(&req.id, &StoreError::NoValidData)),
        RosterImport::NeedsDecision(pending) => Err(decision_response(
            req,
            &Decision::ResolveSingleNames { pending },
        )),
        RosterImport::Ready {
            students,
            from_header,
        } => Ok((students, from_header)),
    }
}
