use crate::error::StoreError;
use crate::ipc::error::{ok, store_err};
use crate::ipc::helpers::{
    commit, decision_response, domain, flag, optional_param, param, picker, required_str, respond,
    HandlerResult,
};
use crate::ipc::types::{AppState, Request};
use crate::model::SectionAnswer;
use crate::session::{Direction, Navigation, WritingSession};
use crate::store::Decision;
use serde_json::json;

fn session_view(req: &Request, session: &WritingSession) -> serde_json::Value {
    ok(&req.id, json!({ "session": session.view() }))
}

fn no_session(req: &Request) -> serde_json::Value {
    store_err(&req.id, &StoreError::NoSession)
}

/// Unsaved answers in the open session block replacing or closing it.
fn guard_unsaved(state: &AppState, req: &Request) -> Option<serde_json::Value> {
    let session = state.session.as_ref()?;
    if session.is_dirty() && !flag(req, "discard") {
        return Some(decision_response(
            req,
            &Decision::UnsavedChanges {
                student_id: session.current().id.clone(),
            },
        ));
    }
    None
}

fn handle_writer_open(state: &mut AppState, req: &Request) -> HandlerResult {
    let class_id = required_str(req, "classId")?;
    let template_id = required_str(req, "templateId")?;
    let selected: Option<Vec<String>> = optional_param(req, "studentIds")?;
    let mut picker = picker(req)?;
    if let Some(pending) = guard_unsaved(state, req) {
        return Ok(pending);
    }

    let session = domain(
        req,
        WritingSession::open(
            &state.doc,
            &class_id,
            &template_id,
            selected.as_deref(),
            picker.as_mut(),
        ),
    )?;
    tracing::debug!(class_id = %class_id, template_id = %template_id, "writing session opened");
    let resp = session_view(req, &session);
    state.session = Some(session);
    Ok(resp)
}

fn handle_writer_answer(state: &mut AppState, req: &Request) -> HandlerResult {
    let section_id = required_str(req, "sectionId")?;
    let answer: SectionAnswer = param(req, "answer")?;
    let mut picker = picker(req)?;
    let session = state.session.as_mut().ok_or_else(|| no_session(req))?;
    domain(req, session.record(&section_id, answer, picker.as_mut()))?;
    Ok(session_view(req, session))
}

/// Re-rolls variant picks for the current answers.
fn handle_writer_preview(state: &mut AppState, req: &Request) -> HandlerResult {
    let mut picker = picker(req)?;
    let session = state.session.as_mut().ok_or_else(|| no_session(req))?;
    session.regenerate(picker.as_mut());
    Ok(session_view(req, session))
}

fn handle_writer_save(state: &mut AppState, req: &Request) -> HandlerResult {
    let session = state.session.as_ref().ok_or_else(|| no_session(req))?;
    let action = domain(req, session.save_action(&state.doc, chrono::Utc::now()))?;
    commit(state, req, action)?;

    let session = state.session.as_mut().ok_or_else(|| no_session(req))?;
    session.mark_saved();
    let student = session.current();
    let report_id = state
        .doc
        .report_for(&student.id, session.template_id(), session.class_id())
        .map(|r| r.id.clone());
    Ok(ok(
        &req.id,
        json!({ "applied": true, "reportId": report_id, "session": session.view() }),
    ))
}

fn handle_writer_navigate(state: &mut AppState, req: &Request) -> HandlerResult {
    let direction: Direction = param(req, "direction")?;
    let mut picker = picker(req)?;
    let session = state.session.as_mut().ok_or_else(|| no_session(req))?;
    match session.navigate(direction, flag(req, "discard"), &state.doc, picker.as_mut()) {
        Navigation::Moved => Ok(ok(
            &req.id,
            json!({ "moved": true, "session": session.view() }),
        )),
        Navigation::AtBoundary => Ok(ok(
            &req.id,
            json!({ "moved": false, "atBoundary": true, "session": session.view() }),
        )),
        Navigation::NeedsConfirmation(decision) => Ok(decision_response(req, &decision)),
    }
}

fn handle_writer_close(state: &mut AppState, req: &Request) -> HandlerResult {
    if state.session.is_none() {
        return Ok(ok(&req.id, json!({ "closed": false })));
    }
    if let Some(pending) = guard_unsaved(state, req) {
        return Ok(pending);
    }
    state.session = None;
    Ok(ok(&req.id, json!({ "closed": true })))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "writer.open" => Some(respond(handle_writer_open(state, req))),
        "writer.answer" => Some(respond(handle_writer_answer(state, req))),
        "writer.preview" => Some(respond(handle_writer_preview(state, req))),
        "writer.save" => Some(respond(handle_writer_save(state, req))),
        "writer.navigate" => Some(respond(handle_writer_navigate(state, req))),
        "writer.close" => Some(respond(handle_writer_close(state, req))),
        _ => None,
    }
}
