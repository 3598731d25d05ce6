use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Bucket key used by personalised comments that define no headings.
pub const DEFAULT_BUCKET: &str = "default";

pub fn new_id() -> String {
    Uuid::new_v4().to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Student {
    pub id: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub student_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

impl Student {
    pub fn new(first_name: impl Into<String>, last_name: impl Into<String>) -> Self {
        Student {
            id: new_id(),
            first_name: first_name.into(),
            last_name: last_name.into(),
            student_id: None,
            email: None,
        }
    }

    pub fn display_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Class {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub students: Vec<Student>,
    // Documents written before classes carried a timestamp load as the epoch.
    #[serde(default)]
    pub created_at: DateTime<Utc>,
}

impl Class {
    pub fn student(&self, student_id: &str) -> Option<&Student> {
        self.students.iter().find(|s| s.id == student_id)
    }
}

/// Rating a teacher can pick for a rated section.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Rating {
    Excellent,
    Good,
    Satisfactory,
    NeedsImprovement,
}

/// What the answer form captures: a rating, or the explicit "no comment" choice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RatingChoice {
    #[serde(rename = "excellent")]
    Excellent,
    #[serde(rename = "good")]
    Good,
    #[serde(rename = "satisfactory")]
    Satisfactory,
    #[serde(rename = "needsImprovement")]
    NeedsImprovement,
    #[serde(rename = "no-comment")]
    NoComment,
}

impl RatingChoice {
    pub fn rating(self) -> Option<Rating> {
        match self {
            RatingChoice::Excellent => Some(Rating::Excellent),
            RatingChoice::Good => Some(Rating::Good),
            RatingChoice::Satisfactory => Some(Rating::Satisfactory),
            RatingChoice::NeedsImprovement => Some(Rating::NeedsImprovement),
            RatingChoice::NoComment => None,
        }
    }
}

/// Performance band of an assessment section; the four ratings plus "not completed".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AssessmentBand {
    Excellent,
    Good,
    Satisfactory,
    NeedsImprovement,
    NotCompleted,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RatedBuckets {
    pub excellent: Vec<String>,
    pub good: Vec<String>,
    pub satisfactory: Vec<String>,
    pub needs_improvement: Vec<String>,
}

impl RatedBuckets {
    pub fn bucket(&self, rating: Rating) -> &[String] {
        match rating {
            Rating::Excellent => &self.excellent,
            Rating::Good => &self.good,
            Rating::Satisfactory => &self.satisfactory,
            Rating::NeedsImprovement => &self.needs_improvement,
        }
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&'static str, &mut Vec<String>)> {
        [
            ("excellent", &mut self.excellent),
            ("good", &mut self.good),
            ("satisfactory", &mut self.satisfactory),
            ("needsImprovement", &mut self.needs_improvement),
        ]
        .into_iter()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AssessmentBuckets {
    pub excellent: Vec<String>,
    pub good: Vec<String>,
    pub satisfactory: Vec<String>,
    pub needs_improvement: Vec<String>,
    pub not_completed: Vec<String>,
}

impl AssessmentBuckets {
    pub fn bucket(&self, band: AssessmentBand) -> &[String] {
        match band {
            AssessmentBand::Excellent => &self.excellent,
            AssessmentBand::Good => &self.good,
            AssessmentBand::Satisfactory => &self.satisfactory,
            AssessmentBand::NeedsImprovement => &self.needs_improvement,
            AssessmentBand::NotCompleted => &self.not_completed,
        }
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&'static str, &mut Vec<String>)> {
        [
            ("excellent", &mut self.excellent),
            ("good", &mut self.good),
            ("satisfactory", &mut self.satisfactory),
            ("needsImprovement", &mut self.needs_improvement),
            ("notCompleted", &mut self.not_completed),
        ]
        .into_iter()
    }
}

/// Comment-bank entities are keyed by name within their category.
pub trait Named {
    fn name(&self) -> &str;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RatedComment {
    pub name: String,
    #[serde(default)]
    pub comments: RatedBuckets,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StandardComment {
    pub name: String,
    #[serde(default)]
    pub comment: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ScoreType {
    OutOf,
    Percentage,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssessmentComment {
    pub name: String,
    pub score_type: ScoreType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_score: Option<f64>,
    #[serde(default)]
    pub comments: AssessmentBuckets,
}

impl AssessmentComment {
    /// Built-in assessment comment offered before any have been saved.
    pub fn builtin_default() -> Self {
        let owned = |v: [&str; 2]| v.iter().map(|s| s.to_string()).collect::<Vec<_>>();
        AssessmentComment {
            name: "Default Assessment Comment".to_string(),
            score_type: ScoreType::OutOf,
            max_score: Some(100.0),
            comments: AssessmentBuckets {
                excellent: owned([
                    "[Name] achieved an excellent score of [Score] demonstrating outstanding understanding.",
                    "[Name] scored [Score] which reflects exceptional performance and mastery of the subject.",
                ]),
                good: owned([
                    "[Name] achieved a good score of [Score] showing solid understanding of the material.",
                    "[Name] scored [Score] demonstrating good progress and comprehension.",
                ]),
                satisfactory: owned([
                    "[Name] achieved a satisfactory score of [Score] meeting the expected standards.",
                    "[Name] scored [Score] showing adequate understanding of the key concepts.",
                ]),
                needs_improvement: owned([
                    "[Name] scored [Score] which indicates areas requiring further development.",
                    "[Name] achieved [Score] and would benefit from additional practice and support.",
                ]),
                not_completed: owned([
                    "[Name] did not complete this assessment and will need to arrange a makeup opportunity.",
                    "This assessment was not completed by [Name] and should be rescheduled.",
                ]),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersonalisedComment {
    pub name: String,
    #[serde(default)]
    pub instruction: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub headings: Option<Vec<String>>,
    #[serde(default)]
    pub comments: BTreeMap<String, Vec<String>>,
}

impl PersonalisedComment {
    pub fn has_headings(&self) -> bool {
        self.headings.as_ref().is_some_and(|h| !h.is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NextStepsComment {
    pub name: String,
    #[serde(default)]
    pub headings: Vec<String>,
    #[serde(default)]
    pub comments: BTreeMap<String, Vec<String>>,
}

impl Named for RatedComment {
    fn name(&self) -> &str {
        &self.name
    }
}

impl Named for StandardComment {
    fn name(&self) -> &str {
        &self.name
    }
}

impl Named for AssessmentComment {
    fn name(&self) -> &str {
        &self.name
    }
}

impl Named for PersonalisedComment {
    fn name(&self) -> &str {
        &self.name
    }
}

impl Named for NextStepsComment {
    fn name(&self) -> &str {
        &self.name
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CommentKind {
    Rated,
    Standard,
    Assessment,
    Personalised,
    NextSteps,
}

impl CommentKind {
    pub fn as_str(self) -> &'static str {
        match self {
            CommentKind::Rated => "rated",
            CommentKind::Standard => "standard",
            CommentKind::Assessment => "assessment",
            CommentKind::Personalised => "personalised",
            CommentKind::NextSteps => "nextSteps",
        }
    }
}

/// One comment-bank entity of any category, as submitted for save.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "comment", rename_all = "camelCase")]
pub enum CommentEntry {
    Rated(RatedComment),
    Standard(StandardComment),
    Assessment(AssessmentComment),
    Personalised(PersonalisedComment),
    NextSteps(NextStepsComment),
}

impl CommentEntry {
    pub fn kind(&self) -> CommentKind {
        match self {
            CommentEntry::Rated(_) => CommentKind::Rated,
            CommentEntry::Standard(_) => CommentKind::Standard,
            CommentEntry::Assessment(_) => CommentKind::Assessment,
            CommentEntry::Personalised(_) => CommentKind::Personalised,
            CommentEntry::NextSteps(_) => CommentKind::NextSteps,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            CommentEntry::Rated(c) => c.name(),
            CommentEntry::Standard(c) => c.name(),
            CommentEntry::Assessment(c) => c.name(),
            CommentEntry::Personalised(c) => c.name(),
            CommentEntry::NextSteps(c) => c.name(),
        }
    }
}

/// Per-template display override for a section heading.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HeadingConfig {
    pub show_heading: bool,
    pub heading_text: String,
}

impl HeadingConfig {
    /// New sections show their entity name as heading.
    pub fn for_name(name: &str) -> Self {
        HeadingConfig {
            show_heading: !name.is_empty(),
            heading_text: name.to_string(),
        }
    }

    pub fn line(&self) -> Option<&str> {
        if self.show_heading && !self.heading_text.is_empty() {
            Some(&self.heading_text)
        } else {
            None
        }
    }
}

/// Snapshot of a comment-bank entity embedded in a template section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Configured<T> {
    #[serde(flatten)]
    pub entity: T,
    #[serde(flatten)]
    pub heading: HeadingConfig,
}

impl<T: Named> Configured<T> {
    pub fn new(entity: T) -> Self {
        let heading = HeadingConfig::for_name(entity.name());
        Configured { entity, heading }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "kebab-case")]
pub enum SectionBody {
    RatedComment(Configured<RatedComment>),
    StandardComment(Configured<StandardComment>),
    AssessmentComment(Configured<AssessmentComment>),
    PersonalisedComment(Configured<PersonalisedComment>),
    OptionalAdditionalComment {},
    NextSteps(Configured<NextStepsComment>),
    NewLine {},
}

impl SectionBody {
    pub fn from_entry(entry: CommentEntry) -> Self {
        match entry {
            CommentEntry::Rated(c) => SectionBody::RatedComment(Configured::new(c)),
            CommentEntry::Standard(c) => SectionBody::StandardComment(Configured::new(c)),
            CommentEntry::Assessment(c) => SectionBody::AssessmentComment(Configured::new(c)),
            CommentEntry::Personalised(c) => SectionBody::PersonalisedComment(Configured::new(c)),
            CommentEntry::NextSteps(c) => SectionBody::NextSteps(Configured::new(c)),
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            SectionBody::RatedComment(_) => "rated-comment",
            SectionBody::StandardComment(_) => "standard-comment",
            SectionBody::AssessmentComment(_) => "assessment-comment",
            SectionBody::PersonalisedComment(_) => "personalised-comment",
            SectionBody::OptionalAdditionalComment {} => "optional-additional-comment",
            SectionBody::NextSteps(_) => "next-steps",
            SectionBody::NewLine {} => "new-line",
        }
    }

    pub fn heading_mut(&mut self) -> Option<&mut HeadingConfig> {
        match self {
            SectionBody::RatedComment(c) => Some(&mut c.heading),
            SectionBody::StandardComment(c) => Some(&mut c.heading),
            SectionBody::AssessmentComment(c) => Some(&mut c.heading),
            SectionBody::PersonalisedComment(c) => Some(&mut c.heading),
            SectionBody::NextSteps(c) => Some(&mut c.heading),
            SectionBody::OptionalAdditionalComment {} | SectionBody::NewLine {} => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateSection {
    pub id: String,
    #[serde(flatten)]
    pub body: SectionBody,
}

impl TemplateSection {
    pub fn new(body: SectionBody) -> Self {
        TemplateSection { id: new_id(), body }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Template {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub sections: Vec<TemplateSection>,
    #[serde(default)]
    pub created_at: DateTime<Utc>,
}

impl Template {
    pub fn section(&self, section_id: &str) -> Option<&TemplateSection> {
        self.sections.iter().find(|s| s.id == section_id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    pub id: String,
    pub student_id: String,
    pub template_id: String,
    pub class_id: String,
    pub content: String,
    #[serde(default)]
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub updated_at: DateTime<Utc>,
}

impl Report {
    pub fn is_for(&self, student_id: &str, template_id: &str, class_id: &str) -> bool {
        self.student_id == student_id && self.template_id == template_id && self.class_id == class_id
    }
}

/// Teacher input for one section while writing one student's report.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SectionAnswer {
    pub rating: Option<RatingChoice>,
    pub additional_comment: Option<String>,
    pub show_optional: bool,
    pub selected_heading: Option<String>,
    pub personalised_info: Option<String>,
    pub assessment_score: Option<f64>,
    pub assessment_out_of: Option<f64>,
    pub assessment_percentage: Option<f64>,
    pub not_completed: bool,
}

/// Answers keyed by section id.
pub type Answers = BTreeMap<String, SectionAnswer>;

/// The whole persisted application state.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    #[serde(default)]
    pub templates: Vec<Template>,
    #[serde(default)]
    pub classes: Vec<Class>,
    #[serde(default)]
    pub reports: Vec<Report>,
    #[serde(default)]
    pub saved_rated_comments: Vec<RatedComment>,
    #[serde(default)]
    pub saved_standard_comments: Vec<StandardComment>,
    #[serde(default)]
    pub saved_assessment_comments: Vec<AssessmentComment>,
    #[serde(default)]
    pub saved_personalised_comments: Vec<PersonalisedComment>,
    #[serde(default)]
    pub saved_next_steps_comments: Vec<NextStepsComment>,
}

impl Document {
    /// Parses a stored document field by field. A missing field is empty; a field
    /// that fails to parse is also empty and its key is returned in the second slot.
    pub fn from_json_lenient(text: &str) -> anyhow::Result<(Document, Vec<&'static str>)> {
        let value: serde_json::Value = serde_json::from_str(text)?;
        let Some(obj) = value.as_object() else {
            anyhow::bail!("stored document is not a JSON object");
        };

        let mut degraded = Vec::new();
        let doc = Document {
            templates: lenient_field(obj, "templates", &mut degraded),
            classes: lenient_field(obj, "classes", &mut degraded),
            reports: lenient_field(obj, "reports", &mut degraded),
            saved_rated_comments: lenient_field(obj, "savedRatedComments", &mut degraded),
            saved_standard_comments: lenient_field(obj, "savedStandardComments", &mut degraded),
            saved_assessment_comments: lenient_field(
                obj,
                "savedAssessmentComments",
                &mut degraded,
            ),
            saved_personalised_comments: lenient_field(
                obj,
                "savedPersonalisedComments",
                &mut degraded,
            ),
            saved_next_steps_comments: lenient_field(
                obj,
                "savedNextStepsComments",
                &mut degraded,
            ),
        };
        Ok((doc, degraded))
    }

    pub fn class(&self, class_id: &str) -> Option<&Class> {
        self.classes.iter().find(|c| c.id == class_id)
    }

    pub fn template(&self, template_id: &str) -> Option<&Template> {
        self.templates.iter().find(|t| t.id == template_id)
    }

    pub fn report_for(&self, student_id: &str, template_id: &str, class_id: &str) -> Option<&Report> {
        self.reports
            .iter()
            .find(|r| r.is_for(student_id, template_id, class_id))
    }

    pub fn has_comment(&self, kind: CommentKind, name: &str) -> bool {
        match kind {
            CommentKind::Rated => contains_named(&self.saved_rated_comments, name),
            CommentKind::Standard => contains_named(&self.saved_standard_comments, name),
            CommentKind::Assessment => contains_named(&self.saved_assessment_comments, name),
            CommentKind::Personalised => contains_named(&self.saved_personalised_comments, name),
            CommentKind::NextSteps => contains_named(&self.saved_next_steps_comments, name),
        }
    }

    /// Snapshot of a saved comment. The built-in assessment comment resolves
    /// by name until one is saved under that name.
    pub fn comment_entry(&self, kind: CommentKind, name: &str) -> Option<CommentEntry> {
        match kind {
            CommentKind::Rated => {
                find_named(&self.saved_rated_comments, name).map(CommentEntry::Rated)
            }
            CommentKind::Standard => {
                find_named(&self.saved_standard_comments, name).map(CommentEntry::Standard)
            }
            CommentKind::Assessment => find_named(&self.saved_assessment_comments, name)
                .or_else(|| {
                    let builtin = AssessmentComment::builtin_default();
                    (builtin.name == name).then_some(builtin)
                })
                .map(CommentEntry::Assessment),
            CommentKind::Personalised => {
                find_named(&self.saved_personalised_comments, name).map(CommentEntry::Personalised)
            }
            CommentKind::NextSteps => {
                find_named(&self.saved_next_steps_comments, name).map(CommentEntry::NextSteps)
            }
        }
    }

    pub fn comments_json(&self, kind: CommentKind) -> serde_json::Result<serde_json::Value> {
        match kind {
            CommentKind::Rated => serde_json::to_value(&self.saved_rated_comments),
            CommentKind::Standard => serde_json::to_value(&self.saved_standard_comments),
            CommentKind::Assessment => serde_json::to_value(&self.saved_assessment_comments),
            CommentKind::Personalised => serde_json::to_value(&self.saved_personalised_comments),
            CommentKind::NextSteps => serde_json::to_value(&self.saved_next_steps_comments),
        }
    }
}

fn contains_named<T: Named>(list: &[T], name: &str) -> bool {
    list.iter().any(|c| c.name() == name)
}

fn find_named<T: Named + Clone>(list: &[T], name: &str) -> Option<T> {
    list.iter().find(|c| c.name() == name).cloned()
}

fn lenient_field<T: DeserializeOwned>(
    obj: &serde_json::Map<String, serde_json::Value>,
    key: &'static str,
    degraded: &mut Vec<&'static str>,
) -> Vec<T> {
    match obj.get(key) {
        None | Some(serde_json::Value::Null) => Vec::new(),
        Some(v) => match serde_json::from_value(v.clone()) {
            Ok(items) => items,
            Err(_) => {
                degraded.push(key);
                Vec::new()
            }
        },
    }
}
