use crate::backup;
use crate::db;
use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{commit, db_conn, required_str, respond, HandlerResult};
use crate::ipc::types::{AppState, Request};
use crate::model::Document;
use crate::store::Action;
use serde_json::json;
use std::path::PathBuf;

fn counts(doc: &Document) -> serde_json::Value {
    json!({
        "templates": doc.templates.len(),
        "classes": doc.classes.len(),
        "reports": doc.reports.len(),
    })
}

fn handle_health(state: &mut AppState, req: &Request) -> serde_json::Value {
    ok(
        &req.id,
        json!({
            "version": env!("CARGO_PKG_VERSION"),
            "workspacePath": state.workspace.as_ref().map(|p| p.to_string_lossy().to_string()),
            "sessionOpen": state.session.is_some(),
        }),
    )
}

pub fn select_workspace(state: &mut AppState, path: PathBuf) -> anyhow::Result<()> {
    let conn = db::open_db(&path)?;
    let doc = db::load_document(&conn)?.unwrap_or_default();
    tracing::info!(
        workspace = %path.display(),
        classes = doc.classes.len(),
        templates = doc.templates.len(),
        "workspace opened"
    );
    state.workspace = Some(path);
    state.db = Some(conn);
    state.doc = doc;
    state.session = None;
    Ok(())
}

fn handle_workspace_select(state: &mut AppState, req: &Request) -> HandlerResult {
    let path = PathBuf::from(required_str(req, "path")?);
    if let Err(e) = select_workspace(state, path.clone()) {
        return Err(err(&req.id, "db_open_failed", format!("{e:#}"), None));
    }
    Ok(ok(
        &req.id,
        json!({ "workspacePath": path.to_string_lossy(), "counts": counts(&state.doc) }),
    ))
}

fn handle_export_bundle(state: &mut AppState, req: &Request) -> HandlerResult {
    db_conn(state, req)?;
    let out_path = PathBuf::from(required_str(req, "outPath")?);
    let text = serde_json::to_string(&state.doc)
        .map_err(|e| err(&req.id, "export_failed", e.to_string(), None))?;
    let summary = backup::export_workspace_bundle(&text, &out_path)
        .map_err(|e| err(&req.id, "export_failed", format!("{e:#}"), None))?;
    tracing::info!(out = %out_path.display(), "workspace bundle exported");
    Ok(ok(
        &req.id,
        json!({
            "outPath": out_path.to_string_lossy(),
            "bundleFormat": summary.bundle_format,
            "entryCount": summary.entry_count,
            "sha256": summary.sha256,
        }),
    ))
}

fn handle_import_bundle(state: &mut AppState, req: &Request) -> HandlerResult {
    db_conn(state, req)?;
    let in_path = PathBuf::from(required_str(req, "inPath")?);
    let imported = backup::import_workspace_bundle(&in_path)
        .map_err(|e| err(&req.id, "import_failed", format!("{e:#}"), None))?;
    let (doc, degraded) = Document::from_json_lenient(&imported.document_json)
        .map_err(|e| err(&req.id, "import_failed", format!("{e:#}"), None))?;
    for field in &degraded {
        tracing::warn!(field, "imported field failed to parse; loading it as empty");
    }

    commit(state, req, Action::Load(doc))?;
    state.session = None;
    Ok(ok(
        &req.id,
        json!({
            "bundleFormatDetected": imported.bundle_format_detected,
            "degradedFields": degraded,
            "counts": counts(&state.doc),
        }),
    ))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "health" => Some(handle_health(state, req)),
        "workspace.select" => Some(respond(handle_workspace_select(state, req))),
        "workspace.exportBundle" => Some(respond(handle_export_bundle(state, req))),
        "workspace.importBundle" => Some(respond(handle_import_bundle(state, req))),
        _ => None,
    }
}
