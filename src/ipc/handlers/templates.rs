use crate::error::StoreError;
use crate::ipc::error::{ok, store_err};
use crate::ipc::helpers::{
    apply_planned, commit, domain, flag, optional_param, optional_str, param, required_str,
    respond, HandlerResult,
};
use crate::ipc::types::{AppState, Request};
use crate::model::{new_id, CommentKind, Document, SectionBody, Template, TemplateSection};
use crate::store::{plan_delete, Action, DeleteTarget};
use crate::validate;
use serde::Deserialize;
use serde_json::json;

/// A section as the template builder requests it: a type, plus the saved
/// comment to snapshot for configurable types.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SectionSpec {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    comment_name: Option<String>,
}

fn comment_kind_for(section_type: &str) -> Option<CommentKind> {
    match section_type {
        "rated-comment" => Some(CommentKind::Rated),
        "standard-comment" => Some(CommentKind::Standard),
        "assessment-comment" => Some(CommentKind::Assessment),
        "personalised-comment" => Some(CommentKind::Personalised),
        "next-steps" => Some(CommentKind::NextSteps),
        _ => None,
    }
}

fn build_section(doc: &Document, spec: &SectionSpec) -> crate::error::Result<TemplateSection> {
    let body = match spec.kind.as_str() {
        "optional-additional-comment" => SectionBody::OptionalAdditionalComment {},
        "new-line" => SectionBody::NewLine {},
        other => {
            let kind = comment_kind_for(other)
                .ok_or_else(|| StoreError::invalid(format!("unknown section type: {other}")))?;
            let name = spec
                .comment_name
                .as_deref()
                .ok_or_else(|| StoreError::invalid(format!("{other} sections need a commentName")))?;
            let entry = doc
                .comment_entry(kind, name)
                .ok_or_else(|| StoreError::not_found(kind.as_str(), name))?;
            SectionBody::from_entry(entry)
        }
    };
    Ok(TemplateSection::new(body))
}

fn template_for_edit(
    state: &AppState,
    req: &Request,
    template_id: &str,
) -> Result<Template, serde_json::Value> {
    domain(
        req,
        state
            .doc
            .template(template_id)
            .cloned()
            .ok_or_else(|| StoreError::not_found("template", template_id)),
    )
}

fn section_index(
    req: &Request,
    template: &Template,
    section_id: &str,
) -> Result<usize, serde_json::Value> {
    template
        .sections
        .iter()
        .position(|s| s.id == section_id)
        .ok_or_else(|| store_err(&req.id, &StoreError::not_found("section", section_id)))
}

fn handle_templates_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let templates: Vec<serde_json::Value> = state
        .doc
        .templates
        .iter()
        .map(|t| {
            json!({
                "id": t.id,
                "name": t.name,
                "createdAt": t.created_at,
                "sectionCount": t.sections.len(),
            })
        })
        .collect();
    ok(&req.id, json!({ "templates": templates }))
}

fn handle_templates_open(state: &mut AppState, req: &Request) -> HandlerResult {
    let template_id = required_str(req, "templateId")?;
    let template = template_for_edit(state, req, &template_id)?;
    Ok(ok(&req.id, json!({ "template": template })))
}

fn handle_templates_create(state: &mut AppState, req: &Request) -> HandlerResult {
    let name = domain(req, validate::template_name(&required_str(req, "name")?))?;
    let specs: Vec<SectionSpec> = optional_param(req, "sections")?.unwrap_or_default();
    let mut sections = Vec::with_capacity(specs.len());
    for spec in &specs {
        sections.push(domain(req, build_section(&state.doc, spec))?);
    }

    let template = Template {
        id: new_id(),
        name,
        sections,
        created_at: chrono::Utc::now(),
    };
    let template_id = template.id.clone();
    commit(state, req, Action::AddTemplate(template))?;
    Ok(ok(&req.id, json!({ "applied": true, "templateId": template_id })))
}

fn handle_templates_rename(state: &mut AppState, req: &Request) -> HandlerResult {
    let template_id = required_str(req, "templateId")?;
    let name = domain(req, validate::template_name(&required_str(req, "name")?))?;
    let mut template = template_for_edit(state, req, &template_id)?;
    template.name = name;
    commit(state, req, Action::UpdateTemplate(template))?;
    Ok(ok(&req.id, json!({ "applied": true })))
}

fn handle_templates_delete(state: &mut AppState, req: &Request) -> HandlerResult {
    let id = required_str(req, "templateId")?;
    let planned = domain(
        req,
        plan_delete(
            &state.doc,
            DeleteTarget::Template { id },
            flag(req, "confirm"),
        ),
    )?;
    apply_planned(state, req, planned)
}

fn handle_sections_add(state: &mut AppState, req: &Request) -> HandlerResult {
    let template_id = required_str(req, "templateId")?;
    let spec = SectionSpec {
        kind: required_str(req, "type")?,
        comment_name: optional_str(req, "commentName"),
    };
    let position: Option<usize> = optional_param(req, "position")?;
    let mut template = template_for_edit(state, req, &template_id)?;
    let section = domain(req, build_section(&state.doc, &spec))?;
    let section_id = section.id.clone();

    let at = position
        .unwrap_or(template.sections.len())
        .min(template.sections.len());
    template.sections.insert(at, section);
    commit(state, req, Action::UpdateTemplate(template))?;
    Ok(ok(
        &req.id,
        json!({ "applied": true, "sectionId": section_id, "position": at }),
    ))
}

fn handle_sections_remove(state: &mut AppState, req: &Request) -> HandlerResult {
    let template_id = required_str(req, "templateId")?;
    let section_id = required_str(req, "sectionId")?;
    let mut template = template_for_edit(state, req, &template_id)?;
    let idx = section_index(req, &template, &section_id)?;
    template.sections.remove(idx);
    commit(state, req, Action::UpdateTemplate(template))?;
    Ok(ok(&req.id, json!({ "applied": true })))
}

fn handle_sections_move(state: &mut AppState, req: &Request) -> HandlerResult {
    let template_id = required_str(req, "templateId")?;
    let section_id = required_str(req, "sectionId")?;
    let to_index: usize = param(req, "toIndex")?;
    let mut template = template_for_edit(state, req, &template_id)?;
    let from = section_index(req, &template, &section_id)?;

    let section = template.sections.remove(from);
    let to = to_index.min(template.sections.len());
    template.sections.insert(to, section);
    commit(state, req, Action::UpdateTemplate(template))?;
    Ok(ok(&req.id, json!({ "applied": true, "position": to })))
}

fn handle_sections_set_heading(state: &mut AppState, req: &Request) -> HandlerResult {
    let template_id = required_str(req, "templateId")?;
    let section_id = required_str(req, "sectionId")?;
    let show: Option<bool> = optional_param(req, "showHeading")?;
    let text = optional_str(req, "headingText");
    let mut template = template_for_edit(state, req, &template_id)?;
    let idx = section_index(req, &template, &section_id)?;

    let section = &mut template.sections[idx];
    let type_name = section.body.type_name();
    let Some(heading) = section.body.heading_mut() else {
        return Err(store_err(
            &req.id,
            &StoreError::invalid(format!("{type_name} sections have no heading")),
        ));
    };
    if let Some(show) = show {
        heading.show_heading = show;
    }
    if let Some(text) = text {
        heading.heading_text = text;
    }
    let heading = heading.clone();
    commit(state, req, Action::UpdateTemplate(template))?;
    Ok(ok(&req.id, json!({ "applied": true, "heading": heading })))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "templates.list" => Some(handle_templates_list(state, req)),
        "templates.open" => Some(respond(handle_templates_open(state, req))),
        "templates.create" => Some(respond(handle_templates_create(state, req))),
        "templates.rename" => Some(respond(handle_templates_rename(state, req))),
        "templates.delete" => Some(respond(handle_templates_delete(state, req))),
        "templates.sections.add" => Some(respond(handle_sections_add(state, req))),
        "templates.sections.remove" => Some(respond(handle_sections_remove(state, req))),
        "templates.sections.move" => Some(respond(handle_sections_move(state, req))),
        "templates.sections.setHeading" => Some(respond(handle_sections_set_heading(state, req))),
        _ => None,
    }
}
