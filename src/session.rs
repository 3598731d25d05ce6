use crate::error::{Result, StoreError};
use crate::generate::{generate_report, Picker};
use crate::model::{Answers, Document, SectionAnswer, Student, Template};
use crate::store::{Action, Decision};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Direction {
    Next,
    Previous,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Navigation {
    Moved,
    AtBoundary,
    NeedsConfirmation(Decision),
}

/// Outcome of reconciling an open session with a changed document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionSync {
    Unchanged,
    Refreshed,
    /// The class or template is gone, or no selected student is left.
    Closed,
}

/// One teacher working through a class's students with one template.
#[derive(Debug, Clone)]
pub struct WritingSession {
    class_id: String,
    template: Template,
    selected: Option<Vec<String>>,
    students: Vec<Student>,
    index: usize,
    answers: Answers,
    preview: String,
    dirty: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionView<'a> {
    pub class_id: &'a str,
    pub template_id: &'a str,
    pub student: &'a Student,
    pub position: usize,
    pub total: usize,
    pub has_previous: bool,
    pub has_next: bool,
    pub answers: &'a Answers,
    pub preview: &'a str,
    pub dirty: bool,
}

impl WritingSession {
    /// Opens on the first student. `selected` narrows the class to those
    /// student ids, keeping class order.
    pub fn open(
        doc: &Document,
        class_id: &str,
        template_id: &str,
        selected: Option<&[String]>,
        picker: &mut dyn Picker,
    ) -> Result<Self> {
        let class = doc
            .class(class_id)
            .ok_or_else(|| StoreError::not_found("class", class_id))?;
        let template = doc
            .template(template_id)
            .ok_or_else(|| StoreError::not_found("template", template_id))?;
        let students: Vec<Student> = match selected {
            Some(ids) => {
                if let Some(missing) = ids.iter().find(|id| class.student(id).is_none()) {
                    return Err(StoreError::not_found("student", missing.as_str()));
                }
                class
                    .students
                    .iter()
                    .filter(|s| ids.contains(&s.id))
                    .cloned()
                    .collect()
            }
            None => class.students.clone(),
        };
        if students.is_empty() {
            return Err(StoreError::invalid("select at least one student to write for"));
        }

        let mut session = WritingSession {
            class_id: class.id.clone(),
            template: template.clone(),
            selected: selected.map(<[String]>::to_vec),
            students,
            index: 0,
            answers: Answers::new(),
            preview: String::new(),
            dirty: false,
        };
        session.load_student(doc, picker);
        Ok(session)
    }

    pub fn current(&self) -> &Student {
        &self.students[self.index]
    }

    pub fn class_id(&self) -> &str {
        &self.class_id
    }

    pub fn template_id(&self) -> &str {
        &self.template.id
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn preview(&self) -> &str {
        &self.preview
    }

    pub fn view(&self) -> SessionView<'_> {
        SessionView {
            class_id: &self.class_id,
            template_id: &self.template.id,
            student: self.current(),
            position: self.index + 1,
            total: self.students.len(),
            has_previous: self.index > 0,
            has_next: self.index + 1 < self.students.len(),
            answers: &self.answers,
            preview: &self.preview,
            dirty: self.dirty,
        }
    }

    fn load_student(&mut self, doc: &Document, picker: &mut dyn Picker) {
        self.answers.clear();
        self.dirty = false;
        let stored = doc.report_for(&self.current().id, &self.template.id, &self.class_id);
        self.preview = match stored {
            Some(report) => report.content.clone(),
            None => generate_report(&self.template, self.current(), &self.answers, picker),
        };
    }

    /// Records the answer for one section and regenerates the preview.
    pub fn record(
        &mut self,
        section_id: &str,
        answer: SectionAnswer,
        picker: &mut dyn Picker,
    ) -> Result<()> {
        if self.template.section(section_id).is_none() {
            return Err(StoreError::not_found("section", section_id));
        }
        self.answers.insert(section_id.to_string(), answer);
        self.dirty = true;
        self.regenerate(picker);
        Ok(())
    }

    pub fn regenerate(&mut self, picker: &mut dyn Picker) {
        self.preview = generate_report(&self.template, self.current(), &self.answers, picker);
    }

    /// The upsert for the current student's preview. The student and the
    /// template must still exist in `doc`.
    pub fn save_action(&self, doc: &Document, now: DateTime<Utc>) -> Result<Action> {
        let student_id = &self.current().id;
        doc.class(&self.class_id)
            .ok_or_else(|| StoreError::not_found("class", &self.class_id))?
            .student(student_id)
            .ok_or_else(|| StoreError::not_found("student", student_id))?;
        if doc.template(&self.template.id).is_none() {
            return Err(StoreError::not_found("template", &self.template.id));
        }
        Ok(Action::UpsertReport {
            student_id: student_id.clone(),
            template_id: self.template.id.clone(),
            class_id: self.class_id.clone(),
            content: self.preview.clone(),
            now,
        })
    }

    /// Re-reads the template and students from `doc` after a transition.
    ///
    /// Answers for sections that no longer exist are dropped. If the current
    /// student was removed the session moves to the student now at that
    /// position, starting from a clean slate.
    pub fn sync(&mut self, doc: &Document, picker: &mut dyn Picker) -> SessionSync {
        let (Some(class), Some(template)) =
            (doc.class(&self.class_id), doc.template(&self.template.id))
        else {
            return SessionSync::Closed;
        };
        let students: Vec<Student> = class
            .students
            .iter()
            .filter(|s| self.selected.as_ref().map_or(true, |ids| ids.contains(&s.id)))
            .cloned()
            .collect();
        if students.is_empty() {
            return SessionSync::Closed;
        }
        if *template == self.template && students == self.students {
            return SessionSync::Unchanged;
        }

        let current_id = self.current().id.clone();
        self.template = template.clone();
        self.students = students;
        let template = &self.template;
        self.answers.retain(|section_id, _| template.section(section_id).is_some());

        match self.students.iter().position(|s| s.id == current_id) {
            Some(idx) if self.dirty => {
                self.index = idx;
                self.regenerate(picker);
            }
            Some(idx) => {
                self.index = idx;
                self.load_student(doc, picker);
            }
            None => {
                self.index = self.index.min(self.students.len() - 1);
                self.load_student(doc, picker);
            }
        }
        SessionSync::Refreshed
    }

    pub fn mark_saved(&mut self) {
        self.dirty = false;
    }

    /// Moves to the neighbouring student. Unsaved answers block the move
    /// unless `discard` is set.
    pub fn navigate(
        &mut self,
        direction: Direction,
        discard: bool,
        doc: &Document,
        picker: &mut dyn Picker,
    ) -> Navigation {
        let target = match direction {
            Direction::Next if self.index + 1 < self.students.len() => self.index + 1,
            Direction::Previous if self.index > 0 => self.index - 1,
            _ => return Navigation::AtBoundary,
        };
        if self.dirty && !discard {
            return Navigation::NeedsConfirmation(Decision::UnsavedChanges {
                student_id: self.current().id.clone(),
            });
        }
        self.index = target;
        self.load_student(doc, picker);
        Navigation::Moved
    }
}
