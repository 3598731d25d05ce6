use crate::backup;
use crate::error::StoreError;
use crate::generate::generate_report;
use crate::ipc::error::{err, ok, store_err};
use crate::ipc::helpers::{
    apply_planned, commit, domain, flag, optional_param, optional_str, picker, required_str,
    respond, HandlerResult,
};
use crate::ipc::types::{AppState, Request};
use crate::model::{Answers, Document, Report, Student};
use crate::store::{plan_delete, Action, DeleteTarget};
use serde_json::json;
use std::path::PathBuf;

fn find_student<'a>(
    doc: &'a Document,
    class_id: &str,
    student_id: &str,
) -> crate::error::Result<&'a Student> {
    doc.class(class_id)
        .ok_or_else(|| StoreError::not_found("class", class_id))?
        .student(student_id)
        .ok_or_else(|| StoreError::not_found("student", student_id))
}

fn find_report<'a>(doc: &'a Document, report_id: &str) -> crate::error::Result<&'a Report> {
    doc.reports
        .iter()
        .find(|r| r.id == report_id)
        .ok_or_else(|| StoreError::not_found("report", report_id))
}

fn report_json(doc: &Document, report: &Report) -> serde_json::Value {
    let student = doc
        .class(&report.class_id)
        .and_then(|c| c.student(&report.student_id));
    let template = doc.template(&report.template_id);
    json!({
        "id": report.id,
        "studentId": report.student_id,
        "templateId": report.template_id,
        "classId": report.class_id,
        "studentName": student.map(Student::display_name),
        "templateName": template.map(|t| t.name.as_str()),
        "content": report.content,
        "createdAt": report.created_at,
        "updatedAt": report.updated_at,
    })
}

/// Renders report text without storing it.
fn handle_reports_generate(state: &mut AppState, req: &Request) -> HandlerResult {
    let template_id = required_str(req, "templateId")?;
    let class_id = required_str(req, "classId")?;
    let student_id = required_str(req, "studentId")?;
    let answers: Answers = optional_param(req, "answers")?.unwrap_or_default();
    let mut picker = picker(req)?;

    let template = domain(
        req,
        state
            .doc
            .template(&template_id)
            .ok_or_else(|| StoreError::not_found("template", &template_id)),
    )?;
    let student = domain(req, find_student(&state.doc, &class_id, &student_id))?;
    let content = generate_report(template, student, &answers, picker.as_mut());
    Ok(ok(&req.id, json!({ "content": content })))
}

fn handle_reports_save(state: &mut AppState, req: &Request) -> HandlerResult {
    let template_id = required_str(req, "templateId")?;
    let class_id = required_str(req, "classId")?;
    let student_id = required_str(req, "studentId")?;
    let content = required_str(req, "content")?;
    domain(req, find_student(&state.doc, &class_id, &student_id))?;
    if state.doc.template(&template_id).is_none() {
        return Err(store_err(
            &req.id,
            &StoreError::not_found("template", &template_id),
        ));
    }

    let created = state
        .doc
        .report_for(&student_id, &template_id, &class_id)
        .is_none();
    commit(
        state,
        req,
        Action::UpsertReport {
            student_id: student_id.clone(),
            template_id: template_id.clone(),
            class_id: class_id.clone(),
            content,
            now: chrono::Utc::now(),
        },
    )?;
    let report_id = state
        .doc
        .report_for(&student_id, &template_id, &class_id)
        .map(|r| r.id.clone());
    Ok(ok(
        &req.id,
        json!({ "applied": true, "reportId": report_id, "created": created }),
    ))
}

fn handle_reports_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let class_id = optional_str(req, "classId");
    let template_id = optional_str(req, "templateId");
    let student_id = optional_str(req, "studentId");
    let matches = |actual: &str, wanted: &Option<String>| {
        wanted.as_deref().map_or(true, |w| w == actual)
    };

    let reports: Vec<serde_json::Value> = state
        .doc
        .reports
        .iter()
        .filter(|r| {
            matches(&r.class_id, &class_id)
                && matches(&r.template_id, &template_id)
                && matches(&r.student_id, &student_id)
        })
        .map(|r| report_json(&state.doc, r))
        .collect();
    ok(&req.id, json!({ "reports": reports }))
}

/// Looks a report up by id, or by its (student, template, class) triple.
fn handle_reports_get(state: &mut AppState, req: &Request) -> HandlerResult {
    let report = match optional_str(req, "reportId") {
        Some(id) => domain(req, find_report(&state.doc, &id))?,
        None => {
            let student_id = required_str(req, "studentId")?;
            let template_id = required_str(req, "templateId")?;
            let class_id = required_str(req, "classId")?;
            domain(
                req,
                state
                    .doc
                    .report_for(&student_id, &template_id, &class_id)
                    .ok_or_else(|| StoreError::not_found("report", &student_id)),
            )?
        }
    };
    Ok(ok(
        &req.id,
        json!({ "report": report_json(&state.doc, report) }),
    ))
}

fn handle_reports_delete(state: &mut AppState, req: &Request) -> HandlerResult {
    let id = required_str(req, "reportId")?;
    let planned = domain(
        req,
        plan_delete(
            &state.doc,
            DeleteTarget::Report { id },
            flag(req, "confirm"),
        ),
    )?;
    apply_planned(state, req, planned)
}

fn handle_reports_export_text(state: &mut AppState, req: &Request) -> HandlerResult {
    let report_id = required_str(req, "reportId")?;
    let out_dir = PathBuf::from(required_str(req, "outDir")?);
    let report = domain(req, find_report(&state.doc, &report_id))?;
    let student = domain(
        req,
        find_student(&state.doc, &report.class_id, &report.student_id),
    )?;

    let path = backup::export_report_text(report, student, &out_dir)
        .map_err(|e| err(&req.id, "export_failed", format!("{e:#}"), None))?;
    tracing::info!(path = %path.display(), "report exported");
    Ok(ok(&req.id, json!({ "path": path.to_string_lossy() })))
}

/// Zips every report of a class, optionally limited to one template.
/// Reports whose student has left the class are skipped.
fn handle_reports_export_class(state: &mut AppState, req: &Request) -> HandlerResult {
    let class_id = required_str(req, "classId")?;
    let template_id = optional_str(req, "templateId");
    let out_path = PathBuf::from(required_str(req, "outPath")?);
    let class = domain(
        req,
        state
            .doc
            .class(&class_id)
            .ok_or_else(|| StoreError::not_found("class", &class_id)),
    )?;

    let pairs: Vec<(&Report, &Student)> = state
        .doc
        .reports
        .iter()
        .filter(|r| r.class_id == class_id)
        .filter(|r| template_id.as_deref().map_or(true, |t| r.template_id == t))
        .filter_map(|r| class.student(&r.student_id).map(|s| (r, s)))
        .collect();
    if pairs.is_empty() {
        return Err(store_err(&req.id, &StoreError::NoValidData));
    }

    let count = backup::export_class_reports(&pairs, &out_path)
        .map_err(|e| err(&req.id, "export_failed", format!("{e:#}"), None))?;
    tracing::info!(out = %out_path.display(), count, "class reports exported");
    Ok(ok(
        &req.id,
        json!({ "outPath": out_path.to_string_lossy(), "count": count }),
    ))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "reports.generate" => Some(respond(handle_reports_generate(state, req))),
        "reports.save" => Some(respond(handle_reports_save(state, req))),
        "reports.list" => Some(handle_reports_list(state, req)),
        "reports.get" => Some(respond(handle_reports_get(state, req))),
        "reports.delete" => Some(respond(handle_reports_delete(state, req))),
        "reports.exportText" => Some(respond(handle_reports_export_text(state, req))),
        "reports.exportClass" => Some(respond(handle_reports_export_class(state, req))),
        _ => None,
    }
}
