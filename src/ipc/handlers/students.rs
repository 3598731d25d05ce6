use crate::error::StoreError;
use crate::ipc::error::{ok, store_err};
use crate::ipc::handlers::classes::StudentInput;
use crate::ipc::helpers::{
    apply_planned, commit, domain, flag, param, required_str, respond, roster_students,
    HandlerResult,
};
use crate::ipc::types::{AppState, Request};
use crate::model::Class;
use crate::store::{plan_delete, Action, DeleteTarget};
use crate::validate;
use serde::Deserialize;
use serde_json::json;

fn class_for_edit(state: &AppState, req: &Request, class_id: &str) -> Result<Class, serde_json::Value> {
    domain(
        req,
        state
            .doc
            .class(class_id)
            .cloned()
            .ok_or_else(|| StoreError::not_found("class", class_id)),
    )
}

fn handle_students_add(state: &mut AppState, req: &Request) -> HandlerResult {
    let class_id = required_str(req, "classId")?;
    let input: StudentInput = param(req, "student")?;
    let student = domain(req, input.into_student())?;
    let student_id = student.id.clone();

    let mut class = class_for_edit(state, req, &class_id)?;
    class.students.push(student);
    commit(state, req, Action::UpdateClass(class))?;
    Ok(ok(&req.id, json!({ "applied": true, "studentId": student_id })))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StudentPatch {
    first_name: Option<String>,
    last_name: Option<String>,
    student_id: Option<String>,
    email: Option<String>,
}

fn handle_students_update(state: &mut AppState, req: &Request) -> HandlerResult {
    let class_id = required_str(req, "classId")?;
    let student_id = required_str(req, "studentId")?;
    let patch: StudentPatch = param(req, "patch")?;

    let mut class = class_for_edit(state, req, &class_id)?;
    let Some(slot) = class.students.iter_mut().find(|s| s.id == student_id) else {
        return Err(store_err(
            &req.id,
            &StoreError::not_found("student", &student_id),
        ));
    };
    let mut edited = slot.clone();
    if let Some(v) = patch.first_name {
        edited.first_name = v;
    }
    if let Some(v) = patch.last_name {
        edited.last_name = v;
    }
    if patch.student_id.is_some() {
        edited.student_id = patch.student_id;
    }
    if patch.email.is_some() {
        edited.email = patch.email;
    }
    *slot = domain(req, validate::student(edited))?;

    commit(state, req, Action::UpdateClass(class))?;
    Ok(ok(&req.id, json!({ "applied": true })))
}

fn handle_students_delete(state: &mut AppState, req: &Request) -> HandlerResult {
    let class_id = required_str(req, "classId")?;
    let student_id = required_str(req, "studentId")?;
    let planned = domain(
        req,
        plan_delete(
            &state.doc,
            DeleteTarget::Student {
                class_id,
                student_id,
            },
            flag(req, "confirm"),
        ),
    )?;
    apply_planned(state, req, planned)
}

/// Appends a pasted roster to a class. Single-name lines need a decision
/// each, keyed by line index in `singleNames`.
fn handle_students_import_roster(state: &mut AppState, req: &Request) -> HandlerResult {
    let class_id = required_str(req, "classId")?;
    let text = required_str(req, "text")?;
    let mut class = class_for_edit(state, req, &class_id)?;
    let (students, from_header) = roster_students(req, &text)?;

    let imported = students.len();
    class.students.extend(students);
    commit(state, req, Action::UpdateClass(class))?;
    tracing::info!(class_id = %class_id, imported, "roster imported");
    Ok(ok(
        &req.id,
        json!({
            "applied": true,
            "imported": imported,
            "fromHeader": from_header,
        }),
    ))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "students.add" => Some(respond(handle_students_add(state, req))),
        "students.update" => Some(respond(handle_students_update(state, req))),
        "students.delete" => Some(respond(handle_students_delete(state, req))),
        "students.importRoster" => Some(respond(handle_students_import_roster(state, req))),
        _ => None,
    }
}
