use crate::error::{Result, StoreError};
use crate::model::{
    AssessmentComment, CommentEntry, NextStepsComment, PersonalisedComment, RatedComment,
    StandardComment, Student, DEFAULT_BUCKET,
};
use std::collections::BTreeMap;

fn required(value: &str, what: &str) -> Result<String> {
    let v = value.trim();
    if v.is_empty() {
        return Err(StoreError::invalid(format!("please enter a {what}")));
    }
    Ok(v.to_string())
}

fn keep_non_blank(variants: &mut Vec<String>) {
    variants.retain(|v| !v.trim().is_empty());
}

fn optional(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

pub fn class_name(name: &str) -> Result<String> {
    required(name, "class name")
}

pub fn template_name(name: &str) -> Result<String> {
    required(name, "template name")
}

/// Manual student entry: both names required, optional fields blank-to-absent.
pub fn student(mut s: Student) -> Result<Student> {
    let first = s.first_name.trim();
    let last = s.last_name.trim();
    if first.is_empty() || last.is_empty() {
        return Err(StoreError::invalid(
            "please enter both first name and last name",
        ));
    }
    s.first_name = first.to_string();
    s.last_name = last.to_string();
    s.student_id = optional(s.student_id);
    s.email = optional(s.email);
    Ok(s)
}

/// Normalises a comment-bank entity for saving: names trimmed, blank
/// variants dropped, and every bucket the category requires still filled.
pub fn comment(entry: CommentEntry) -> Result<CommentEntry> {
    Ok(match entry {
        CommentEntry::Rated(c) => CommentEntry::Rated(rated(c)?),
        CommentEntry::Standard(c) => CommentEntry::Standard(standard(c)?),
        CommentEntry::Assessment(c) => CommentEntry::Assessment(assessment(c)?),
        CommentEntry::Personalised(c) => CommentEntry::Personalised(personalised(c)?),
        CommentEntry::NextSteps(c) => CommentEntry::NextSteps(next_steps(c)?),
    })
}

fn rated(mut c: RatedComment) -> Result<RatedComment> {
    c.name = required(&c.name, "name for this rated comment")?;
    for (key, bucket) in c.comments.iter_mut() {
        keep_non_blank(bucket);
        if bucket.is_empty() {
            return Err(StoreError::invalid(format!(
                "please add at least one comment for each rating level (missing {key})"
            )));
        }
    }
    Ok(c)
}

fn standard(mut c: StandardComment) -> Result<StandardComment> {
    let name = c.name.trim();
    let text = c.comment.trim();
    if name.is_empty() || text.is_empty() {
        return Err(StoreError::invalid("please enter both a name and comment text"));
    }
    c.name = name.to_string();
    c.comment = text.to_string();
    Ok(c)
}

fn assessment(mut c: AssessmentComment) -> Result<AssessmentComment> {
    c.name = required(&c.name, "name for this assessment comment")?;
    if let Some(max) = c.max_score {
        if !(max.is_finite() && max > 0.0) {
            return Err(StoreError::invalid("maximum score must be greater than zero"));
        }
    }
    for (key, bucket) in c.comments.iter_mut() {
        keep_non_blank(bucket);
        if bucket.is_empty() {
            return Err(StoreError::invalid(format!(
                "please add at least one comment for each performance level (missing {key})"
            )));
        }
    }
    Ok(c)
}

fn prune_buckets(comments: BTreeMap<String, Vec<String>>) -> BTreeMap<String, Vec<String>> {
    comments
        .into_iter()
        .map(|(heading, mut variants)| {
            keep_non_blank(&mut variants);
            (heading, variants)
        })
        .filter(|(_, variants)| !variants.is_empty())
        .collect()
}

fn personalised(mut c: PersonalisedComment) -> Result<PersonalisedComment> {
    c.name = required(&c.name, "name for this personalised comment")?;
    c.instruction = required(
        &c.instruction,
        "instruction for what personalised information to enter",
    )?;

    let headings: Vec<String> = c
        .headings
        .take()
        .unwrap_or_default()
        .into_iter()
        .filter(|h| !h.trim().is_empty())
        .collect();
    c.comments = prune_buckets(std::mem::take(&mut c.comments));

    if headings.is_empty() {
        if !c.comments.contains_key(DEFAULT_BUCKET) {
            return Err(StoreError::invalid("please add at least one comment option"));
        }
        c.headings = None;
    } else {
        if headings.iter().any(|h| !c.comments.contains_key(h)) {
            return Err(StoreError::invalid(
                "please add at least one comment for each heading, or remove empty headings",
            ));
        }
        c.headings = Some(headings);
    }
    Ok(c)
}

fn next_steps(mut c: NextStepsComment) -> Result<NextStepsComment> {
    c.name = required(&c.name, "name for this next steps comment")?;
    c.headings.retain(|h| !h.trim().is_empty());
    if c.headings.is_empty() {
        return Err(StoreError::invalid("please add at least one focus area"));
    }
    c.comments = prune_buckets(std::mem::take(&mut c.comments));
    if c.headings.iter().any(|h| !c.comments.contains_key(h)) {
        return Err(StoreError::invalid(
            "please add at least one next step for each focus area, or remove empty focus areas",
        ));
    }
    Ok(c)
}
