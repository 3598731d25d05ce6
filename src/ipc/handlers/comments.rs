use crate::batch::{import_variants, MergePolicy, Separator, VariantImport};
use crate::error::StoreError;
use crate::ipc::error::{err, ok, store_err};
use crate::ipc::helpers::{
    apply_planned, decision_response, domain, flag, optional_param, param, required_str, respond,
    HandlerResult,
};
use crate::ipc::types::{AppState, Request};
use crate::model::{AssessmentComment, CommentEntry, CommentKind};
use crate::store::{plan_comment_save, plan_delete, DeleteTarget, Decision};
use serde_json::json;

const ALL_KINDS: [CommentKind; 5] = [
    CommentKind::Rated,
    CommentKind::Standard,
    CommentKind::Assessment,
    CommentKind::Personalised,
    CommentKind::NextSteps,
];

fn handle_comments_list(state: &mut AppState, req: &Request) -> HandlerResult {
    let to_json = |kind: CommentKind| {
        state
            .doc
            .comments_json(kind)
            .map_err(|e| err(&req.id, "serialize_failed", e.to_string(), None))
    };
    if let Some(kind) = optional_param::<CommentKind>(req, "kind")? {
        return Ok(ok(&req.id, json!({ "kind": kind, "comments": to_json(kind)? })));
    }
    let mut all = serde_json::Map::new();
    for kind in ALL_KINDS {
        all.insert(kind.as_str().to_string(), to_json(kind)?);
    }
    Ok(ok(&req.id, serde_json::Value::Object(all)))
}

/// Saves one comment-bank entity. An existing name needs `overwrite`.
fn handle_comments_save(state: &mut AppState, req: &Request) -> HandlerResult {
    let entry: CommentEntry = param(req, "entry")?;
    let planned = domain(
        req,
        plan_comment_save(&state.doc, entry, flag(req, "overwrite")),
    )?;
    apply_planned(state, req, planned)
}

fn handle_comments_delete(state: &mut AppState, req: &Request) -> HandlerResult {
    let kind: CommentKind = param(req, "kind")?;
    let name = required_str(req, "name")?;
    let planned = domain(
        req,
        plan_delete(
            &state.doc,
            DeleteTarget::Comment { kind, name },
            flag(req, "confirm"),
        ),
    )?;
    apply_planned(state, req, planned)
}

/// Splits pasted text into variants for one builder bucket. Nothing is
/// stored; the result feeds the builder before `comments.save`.
fn handle_comments_batch_parse(_state: &mut AppState, req: &Request) -> HandlerResult {
    let text = required_str(req, "text")?;
    let separator: Separator = param(req, "separator")?;
    let existing: Vec<String> = optional_param(req, "existing")?.unwrap_or_default();
    let policy: Option<MergePolicy> = optional_param(req, "policy")?;

    match import_variants(&existing, &text, separator, policy) {
        VariantImport::NoValidData => Err(store_err(&req.id, &StoreError::NoValidData)),
        VariantImport::NeedsDecision { parsed, existing } => Ok(decision_response(
            req,
            &Decision::ChooseMergePolicy {
                parsed,
                existing_count: existing,
            },
        )),
        VariantImport::Ready(variants) => Ok(ok(
            &req.id,
            json!({ "applied": true, "count": variants.len(), "variants": variants }),
        )),
    }
}

fn handle_default_assessment(_state: &mut AppState, req: &Request) -> serde_json::Value {
    ok(
        &req.id,
        json!({ "comment": AssessmentComment::builtin_default() }),
    )
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "comments.list" => Some(respond(handle_comments_list(state, req))),
        "comments.save" => Some(respond(handle_comments_save(state, req))),
        "comments.delete" => Some(respond(handle_comments_delete(state, req))),
        "comments.batchParse" => Some(respond(handle_comments_batch_parse(state, req))),
        "comments.defaultAssessment" => Some(handle_default_assessment(state, req)),
        _ => None,
    }
}
