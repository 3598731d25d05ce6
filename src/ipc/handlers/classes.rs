use crate::error::StoreError;
use crate::ipc::error::{ok, store_err};
use crate::ipc::helpers::{
    apply_planned, commit, domain, flag, optional_param, required_str, respond, roster_students,
    HandlerResult,
};
use crate::ipc::types::{AppState, Request};
use crate::model::{new_id, Class, Student};
use crate::store::{plan_delete, Action, DeleteTarget};
use crate::validate;
use serde::Deserialize;
use serde_json::json;

/// Student fields as the add/create forms submit them.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentInput {
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub student_id: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

impl StudentInput {
    pub fn into_student(self) -> crate::error::Result<Student> {
        let mut s = Student::new(self.first_name, self.last_name);
        s.student_id = self.student_id;
        s.email = self.email;
        validate::student(s)
    }
}

fn handle_classes_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let classes: Vec<serde_json::Value> = state
        .doc
        .classes
        .iter()
        .map(|c| {
            json!({
                "id": c.id,
                "name": c.name,
                "createdAt": c.created_at,
                "studentCount": c.students.len(),
                "reportCount": state.doc.reports.iter().filter(|r| r.class_id == c.id).count(),
            })
        })
        .collect();
    ok(&req.id, json!({ "classes": classes }))
}

fn handle_classes_open(state: &mut AppState, req: &Request) -> HandlerResult {
    let class_id = required_str(req, "classId")?;
    let class = domain(
        req,
        state
            .doc
            .class(&class_id)
            .ok_or_else(|| StoreError::not_found("class", &class_id)),
    )?;
    Ok(ok(&req.id, json!({ "class": class })))
}

/// Creates a class from typed-in students and/or a pasted roster. A class
/// needs at least one student.
fn handle_classes_create(state: &mut AppState, req: &Request) -> HandlerResult {
    let name = domain(req, validate::class_name(&required_str(req, "name")?))?;
    let inputs: Vec<StudentInput> = optional_param(req, "students")?.unwrap_or_default();
    let mut students = Vec::new();
    for input in inputs {
        students.push(domain(req, input.into_student())?);
    }

    if let Some(text) = optional_param::<String>(req, "roster")? {
        let (imported, _) = roster_students(req, &text)?;
        students.extend(imported);
    }

    if students.is_empty() {
        return Err(store_err(
            &req.id,
            &StoreError::invalid("please add at least one student to the class"),
        ));
    }

    let class = Class {
        id: new_id(),
        name,
        students,
        created_at: chrono::Utc::now(),
    };
    let class_id = class.id.clone();
    let student_count = class.students.len();
    commit(state, req, Action::AddClass(class))?;
    Ok(ok(
        &req.id,
        json!({ "applied": true, "classId": class_id, "studentCount": student_count }),
    ))
}

fn handle_classes_rename(state: &mut AppState, req: &Request) -> HandlerResult {
    let class_id = required_str(req, "classId")?;
    let name = domain(req, validate::class_name(&required_str(req, "name")?))?;
    let mut class = domain(
        req,
        state
            .doc
            .class(&class_id)
            .cloned()
            .ok_or_else(|| StoreError::not_found("class", &class_id)),
    )?;
    class.name = name;
    commit(state, req, Action::UpdateClass(class))?;
    Ok(ok(&req.id, json!({ "applied": true })))
}

fn handle_classes_delete(state: &mut AppState, req: &Request) -> HandlerResult {
    let id = required_str(req, "classId")?;
    let planned = domain(
        req,
        plan_delete(
            &state.doc,
            DeleteTarget::Class { id },
            flag(req, "confirm"),
        ),
    )?;
    apply_planned(state, req, planned)
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "classes.list" => Some(handle_classes_list(state, req)),
        "classes.open" => Some(respond(handle_classes_open(state, req))),
        "classes.create" => Some(respond(handle_classes_create(state, req))),
        "classes.rename" => Some(respond(handle_classes_rename(state, req))),
        "classes.delete" => Some(respond(handle_classes_delete(state, req))),
        _ => None,
    }
}
