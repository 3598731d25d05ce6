use crate::batch::PendingName;
use crate::error::{Result, StoreError};
use crate::model::{
    new_id, Class, CommentEntry, CommentKind, Document, Named, Report, Template,
};
use crate::validate;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Every state transition the document goes through.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    AddTemplate(Template),
    UpdateTemplate(Template),
    DeleteTemplate { id: String },
    AddClass(Class),
    UpdateClass(Class),
    /// Also removes every report written for the class.
    DeleteClass { id: String },
    /// Replaces the report for the triple, or inserts one.
    UpsertReport {
        student_id: String,
        template_id: String,
        class_id: String,
        content: String,
        now: DateTime<Utc>,
    },
    DeleteReport { id: String },
    /// Upserts by name within the entry's category.
    SaveComment(CommentEntry),
    DeleteComment { kind: CommentKind, name: String },
    Load(Document),
}

impl Action {
    pub fn label(&self) -> &'static str {
        match self {
            Action::AddTemplate(_) => "add_template",
            Action::UpdateTemplate(_) => "update_template",
            Action::DeleteTemplate { .. } => "delete_template",
            Action::AddClass(_) => "add_class",
            Action::UpdateClass(_) => "update_class",
            Action::DeleteClass { .. } => "delete_class",
            Action::UpsertReport { .. } => "upsert_report",
            Action::DeleteReport { .. } => "delete_report",
            Action::SaveComment(_) => "save_comment",
            Action::DeleteComment { .. } => "delete_comment",
            Action::Load(_) => "load",
        }
    }
}

pub fn reduce(mut doc: Document, action: Action) -> Document {
    match action {
        Action::AddTemplate(t) => doc.templates.push(t),
        Action::UpdateTemplate(t) => replace_by_id(&mut doc.templates, t, |x| &x.id),
        Action::DeleteTemplate { id } => doc.templates.retain(|t| t.id != id),
        Action::AddClass(c) => doc.classes.push(c),
        Action::UpdateClass(c) => replace_by_id(&mut doc.classes, c, |x| &x.id),
        Action::DeleteClass { id } => {
            doc.classes.retain(|c| c.id != id);
            doc.reports.retain(|r| r.class_id != id);
        }
        Action::UpsertReport {
            student_id,
            template_id,
            class_id,
            content,
            now,
        } => {
            match doc
                .reports
                .iter_mut()
                .find(|r| r.is_for(&student_id, &template_id, &class_id))
            {
                Some(existing) => {
                    existing.content = content;
                    existing.updated_at = now;
                }
                None => doc.reports.push(Report {
                    id: new_id(),
                    student_id,
                    template_id,
                    class_id,
                    content,
                    created_at: now,
                    updated_at: now,
                }),
            }
        }
        Action::DeleteReport { id } => doc.reports.retain(|r| r.id != id),
        Action::SaveComment(entry) => match entry {
            CommentEntry::Rated(c) => upsert_named(&mut doc.saved_rated_comments, c),
            CommentEntry::Standard(c) => upsert_named(&mut doc.saved_standard_comments, c),
            CommentEntry::Assessment(c) => upsert_named(&mut doc.saved_assessment_comments, c),
            CommentEntry::Personalised(c) => {
                upsert_named(&mut doc.saved_personalised_comments, c)
            }
            CommentEntry::NextSteps(c) => upsert_named(&mut doc.saved_next_steps_comments, c),
        },
        Action::DeleteComment { kind, name } => match kind {
            CommentKind::Rated => remove_named(&mut doc.saved_rated_comments, &name),
            CommentKind::Standard => remove_named(&mut doc.saved_standard_comments, &name),
            CommentKind::Assessment => remove_named(&mut doc.saved_assessment_comments, &name),
            CommentKind::Personalised => {
                remove_named(&mut doc.saved_personalised_comments, &name)
            }
            CommentKind::NextSteps => remove_named(&mut doc.saved_next_steps_comments, &name),
        },
        Action::Load(loaded) => doc = loaded,
    }
    doc
}

fn replace_by_id<T>(list: &mut [T], item: T, id: impl Fn(&T) -> &String) {
    if let Some(pos) = list.iter().position(|x| id(x) == id(&item)) {
        list[pos] = item;
    }
}

fn upsert_named<T: Named>(list: &mut Vec<T>, item: T) {
    match list.iter_mut().find(|x| x.name() == item.name()) {
        Some(slot) => *slot = item,
        None => list.push(item),
    }
}

fn remove_named<T: Named>(list: &mut Vec<T>, name: &str) {
    list.retain(|x| x.name() != name);
}

/// A question the caller must answer before anything is applied.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Decision {
    #[serde(rename_all = "camelCase")]
    ConfirmOverwrite { category: CommentKind, name: String },
    #[serde(rename_all = "camelCase")]
    ConfirmDelete {
        target: &'static str,
        id: String,
        name: String,
        cascaded_reports: usize,
    },
    #[serde(rename_all = "camelCase")]
    ChooseMergePolicy {
        parsed: Vec<String>,
        existing_count: usize,
    },
    #[serde(rename_all = "camelCase")]
    ResolveSingleNames { pending: Vec<PendingName> },
    #[serde(rename_all = "camelCase")]
    UnsavedChanges { student_id: String },
}

#[derive(Debug, Clone, PartialEq)]
pub enum Planned {
    Apply(Action),
    NeedsDecision(Decision),
}

/// Validates a comment and decides whether it can be saved as is.
pub fn plan_comment_save(doc: &Document, entry: CommentEntry, overwrite: bool) -> Result<Planned> {
    let entry = validate::comment(entry)?;
    if doc.has_comment(entry.kind(), entry.name()) && !overwrite {
        return Ok(Planned::NeedsDecision(Decision::ConfirmOverwrite {
            category: entry.kind(),
            name: entry.name().to_string(),
        }));
    }
    Ok(Planned::Apply(Action::SaveComment(entry)))
}

#[derive(Debug, Clone, PartialEq)]
pub enum DeleteTarget {
    Class { id: String },
    Template { id: String },
    Comment { kind: CommentKind, name: String },
    Student { class_id: String, student_id: String },
    Report { id: String },
}

pub fn plan_delete(doc: &Document, target: DeleteTarget, confirm: bool) -> Result<Planned> {
    let (decision, action) = match target {
        DeleteTarget::Class { id } => {
            let class = doc
                .class(&id)
                .ok_or_else(|| StoreError::not_found("class", &id))?;
            let cascaded = doc.reports.iter().filter(|r| r.class_id == id).count();
            (
                Decision::ConfirmDelete {
                    target: "class",
                    id: id.clone(),
                    name: class.name.clone(),
                    cascaded_reports: cascaded,
                },
                Action::DeleteClass { id },
            )
        }
        DeleteTarget::Template { id } => {
            let template = doc
                .template(&id)
                .ok_or_else(|| StoreError::not_found("template", &id))?;
            (
                Decision::ConfirmDelete {
                    target: "template",
                    id: id.clone(),
                    name: template.name.clone(),
                    cascaded_reports: 0,
                },
                Action::DeleteTemplate { id },
            )
        }
        DeleteTarget::Comment { kind, name } => {
            if !doc.has_comment(kind, &name) {
                return Err(StoreError::not_found(kind.as_str(), &name));
            }
            (
                Decision::ConfirmDelete {
                    target: kind.as_str(),
                    id: name.clone(),
                    name: name.clone(),
                    cascaded_reports: 0,
                },
                Action::DeleteComment { kind, name },
            )
        }
        DeleteTarget::Student {
            class_id,
            student_id,
        } => {
            let class = doc
                .class(&class_id)
                .ok_or_else(|| StoreError::not_found("class", &class_id))?;
            let student = class
                .student(&student_id)
                .ok_or_else(|| StoreError::not_found("student", &student_id))?;
            let decision = Decision::ConfirmDelete {
                target: "student",
                id: student_id.clone(),
                name: student.display_name(),
                cascaded_reports: 0,
            };
            let mut updated = class.clone();
            updated.students.retain(|s| s.id != student_id);
            (decision, Action::UpdateClass(updated))
        }
        DeleteTarget::Report { id } => {
            if !doc.reports.iter().any(|r| r.id == id) {
                return Err(StoreError::not_found("report", &id));
            }
            (
                Decision::ConfirmDelete {
                    target: "report",
                    id: id.clone(),
                    name: id.clone(),
                    cascaded_reports: 0,
                },
                Action::DeleteReport { id },
            )
        }
    };

    if confirm {
        Ok(Planned::Apply(action))
    } else {
        Ok(Planned::NeedsDecision(decision))
    }
}
