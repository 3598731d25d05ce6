use crate::model::{
    Answers, AssessmentBand, AssessmentComment, Configured, HeadingConfig, NextStepsComment,
    PersonalisedComment, RatedComment, ScoreType, SectionAnswer, SectionBody, StandardComment,
    Student, Template, DEFAULT_BUCKET,
};
use crate::substitute::{fill_token, substitute, PERSONALISED_TOKEN, SCORE_TOKEN};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Percent thresholds for the assessment bands, highest first.
const BAND_EXCELLENT: f64 = 80.0;
const BAND_GOOD: f64 = 65.0;
const BAND_SATISFACTORY: f64 = 50.0;

/// Source of the index used to pick one variant out of a bucket.
pub trait Picker {
    /// Returns an index in `0..len`. Never called with `len == 0`.
    fn pick(&mut self, len: usize) -> usize;
}

pub struct ThreadRngPicker;

impl Picker for ThreadRngPicker {
    fn pick(&mut self, len: usize) -> usize {
        rand::thread_rng().gen_range(0..len)
    }
}

/// Reproducible picks, used when a preview asks for a seed.
pub struct SeededPicker(StdRng);

impl SeededPicker {
    pub fn new(seed: u64) -> Self {
        SeededPicker(StdRng::seed_from_u64(seed))
    }
}

impl Picker for SeededPicker {
    fn pick(&mut self, len: usize) -> usize {
        self.0.gen_range(0..len)
    }
}

pub fn picker_for(seed: Option<u64>) -> Box<dyn Picker> {
    match seed {
        Some(s) => Box::new(SeededPicker::new(s)),
        None => Box::new(ThreadRngPicker),
    }
}

/// Builds the report text for one student from a template and that student's answers.
///
/// Output starts with the student's full name and a blank line, then each
/// section in template order; the result is trimmed. Only the variant picks
/// depend on `picker`.
pub fn generate_report(
    template: &Template,
    student: &Student,
    answers: &Answers,
    picker: &mut dyn Picker,
) -> String {
    let blank = SectionAnswer::default();
    let mut out = format!("{} {}\n\n", student.first_name, student.last_name);

    for section in &template.sections {
        let answer = answers.get(&section.id).unwrap_or(&blank);
        match &section.body {
            SectionBody::RatedComment(cfg) => rated(&mut out, cfg, answer, student, picker),
            SectionBody::StandardComment(cfg) => standard(&mut out, cfg, answer, student),
            SectionBody::AssessmentComment(cfg) => {
                assessment(&mut out, cfg, answer, student, picker)
            }
            SectionBody::PersonalisedComment(cfg) => {
                personalised(&mut out, cfg, answer, student, picker)
            }
            SectionBody::NextSteps(cfg) => next_steps(&mut out, cfg, answer, student, picker),
            SectionBody::OptionalAdditionalComment {} => {
                if answer.show_optional {
                    if let Some(text) = non_blank(answer.additional_comment.as_deref()) {
                        out.push_str(text);
                        out.push_str("\n\n");
                    }
                }
            }
            SectionBody::NewLine {} => out.push('\n'),
        }
    }

    out.trim().to_string()
}

fn non_blank(text: Option<&str>) -> Option<&str> {
    text.map(str::trim).filter(|t| !t.is_empty())
}

fn push_heading(out: &mut String, heading: &HeadingConfig) {
    if let Some(line) = heading.line() {
        out.push_str(line);
        out.push('\n');
    }
}

fn pick_variant<'a>(bucket: &'a [String], picker: &mut dyn Picker) -> Option<&'a str> {
    if bucket.is_empty() {
        return None;
    }
    let idx = picker.pick(bucket.len()).min(bucket.len() - 1);
    Some(bucket[idx].as_str())
}

/// The shared section shape: heading, one resolved variant, any
/// additional comment, then a blank line. `fills` are applied after `[Name]`.
fn push_picked(
    out: &mut String,
    heading: &HeadingConfig,
    bucket: &[String],
    fills: &[(&str, &str)],
    answer: &SectionAnswer,
    student: &Student,
    picker: &mut dyn Picker,
) {
    push_heading(out, heading);
    if let Some(variant) = pick_variant(bucket, picker) {
        let mut line = substitute(variant, student);
        for (token, value) in fills {
            line = fill_token(&line, token, value);
        }
        out.push_str(&line);
        out.push('\n');
    }
    if let Some(extra) = non_blank(answer.additional_comment.as_deref()) {
        out.push_str(extra);
        out.push('\n');
    }
    out.push('\n');
}

fn rated(
    out: &mut String,
    cfg: &Configured<RatedComment>,
    answer: &SectionAnswer,
    student: &Student,
    picker: &mut dyn Picker,
) {
    let Some(rating) = answer.rating.and_then(|c| c.rating()) else {
        return;
    };
    let bucket = cfg.entity.comments.bucket(rating);
    push_picked(out, &cfg.heading, bucket, &[], answer, student, picker);
}

fn standard(
    out: &mut String,
    cfg: &Configured<StandardComment>,
    answer: &SectionAnswer,
    student: &Student,
) {
    push_heading(out, &cfg.heading);
    if let Some(edited) = non_blank(answer.additional_comment.as_deref()) {
        out.push_str(edited);
        out.push_str("\n\n");
    } else if !cfg.entity.comment.is_empty() {
        out.push_str(&substitute(&cfg.entity.comment, student));
        out.push_str("\n\n");
    }
}

fn assessment(
    out: &mut String,
    cfg: &Configured<AssessmentComment>,
    answer: &SectionAnswer,
    student: &Student,
    picker: &mut dyn Picker,
) {
    if answer.rating.is_some_and(|c| c.rating().is_none()) {
        return;
    }
    let Some((band, score)) = assessment_band(&cfg.entity, answer) else {
        return;
    };
    let bucket = cfg.entity.comments.bucket(band);
    let score = score.unwrap_or_default();
    push_picked(
        out,
        &cfg.heading,
        bucket,
        &[(SCORE_TOKEN, score.as_str())],
        answer,
        student,
        picker,
    );
}

fn personalised(
    out: &mut String,
    cfg: &Configured<PersonalisedComment>,
    answer: &SectionAnswer,
    student: &Student,
    picker: &mut dyn Picker,
) {
    let Some(info) = non_blank(answer.personalised_info.as_deref()) else {
        return;
    };
    let key = if cfg.entity.has_headings() {
        let Some(selected) = answer.selected_heading.as_deref() else {
            return;
        };
        selected
    } else {
        DEFAULT_BUCKET
    };
    let Some(bucket) = cfg.entity.comments.get(key) else {
        return;
    };
    push_picked(
        out,
        &cfg.heading,
        bucket,
        &[(PERSONALISED_TOKEN, info)],
        answer,
        student,
        picker,
    );
}

fn next_steps(
    out: &mut String,
    cfg: &Configured<NextStepsComment>,
    answer: &SectionAnswer,
    student: &Student,
    picker: &mut dyn Picker,
) {
    let Some(selected) = answer.selected_heading.as_deref() else {
        return;
    };
    if !cfg.entity.headings.iter().any(|h| h == selected) {
        return;
    }
    let bucket = cfg
        .entity
        .comments
        .get(selected)
        .map(Vec::as_slice)
        .unwrap_or(&[]);
    push_picked(out, &cfg.heading, bucket, &[], answer, student, picker);
}

/// Maps an assessment answer to its band and the text that fills `[Score]`.
///
/// `notCompleted` wins over any score. Out-of scores use the answer's
/// denominator, falling back to the comment's `maxScore`. Returns `None` when
/// no usable score was entered.
pub fn assessment_band(
    comment: &AssessmentComment,
    answer: &SectionAnswer,
) -> Option<(AssessmentBand, Option<String>)> {
    if answer.not_completed {
        return Some((AssessmentBand::NotCompleted, None));
    }

    let (percent, shown) = match comment.score_type {
        ScoreType::Percentage => {
            let p = answer.assessment_percentage?;
            (p, format!("{p}%"))
        }
        ScoreType::OutOf => {
            let score = answer.assessment_score?;
            let out_of = answer.assessment_out_of.or(comment.max_score)?;
            if out_of <= 0.0 {
                return None;
            }
            (100.0 * score / out_of, format!("{score}/{out_of}"))
        }
    };
    if !percent.is_finite() {
        return None;
    }

    let band = if percent >= BAND_EXCELLENT {
        AssessmentBand::Excellent
    } else if percent >= BAND_GOOD {
        AssessmentBand::Good
    } else if percent >= BAND_SATISFACTORY {
        AssessmentBand::Satisfactory
    } else {
        AssessmentBand::NeedsImprovement
    };
    Some((band, Some(shown)))
}

#[cfg(test)]
pub(crate) struct FixedPicker(pub usize);

#[cfg(test)]
impl Picker for FixedPicker {
    fn pick(&mut self, _len: usize) -> usize {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AssessmentBuckets, RatedBuckets, RatingChoice, TemplateSection};
    use chrono::Utc;
    use std::collections::BTreeMap;

    fn ada() -> Student {
        Student::new("Ada", "Lovelace")
    }

    fn template(sections: Vec<TemplateSection>) -> Template {
        Template {
            id: "t1".to_string(),
            name: "Term 1".to_string(),
            sections,
            created_at: Utc::now(),
        }
    }

    fn section(id: &str, body: SectionBody) -> TemplateSection {
        TemplateSection {
            id: id.to_string(),
            body,
        }
    }

    fn rated_section(id: &str, show_heading: bool) -> TemplateSection {
        let mut cfg = Configured::new(RatedComment {
            name: "Effort".to_string(),
            comments: RatedBuckets {
                excellent: vec!["[Name] shines.".to_string()],
                good: vec!["X [Name]".to_string(), "Y [Name]".to_string()],
                satisfactory: vec![],
                needs_improvement: vec!["[Name] must focus.".to_string()],
            },
        });
        cfg.heading.show_heading = show_heading;
        section(id, SectionBody::RatedComment(cfg))
    }

    fn answer(f: impl FnOnce(&mut SectionAnswer)) -> SectionAnswer {
        let mut a = SectionAnswer::default();
        f(&mut a);
        a
    }

    fn answers(items: Vec<(&str, SectionAnswer)>) -> Answers {
        items
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect::<BTreeMap<_, _>>()
    }

    #[test]
    fn empty_template_is_just_the_name() {
        let out = generate_report(&template(vec![]), &ada(), &Answers::new(), &mut FixedPicker(0));
        assert_eq!(out, "Ada Lovelace");
    }

    #[test]
    fn rated_picks_exactly_one_member_of_the_bucket() {
        let t = template(vec![rated_section("r", false)]);
        let a = answers(vec![("r", answer(|a| a.rating = Some(RatingChoice::Good)))]);
        for _ in 0..20 {
            let out = generate_report(&t, &ada(), &a, &mut ThreadRngPicker);
            let lines: Vec<&str> = out.lines().collect();
            let x = lines.contains(&"X Ada");
            let y = lines.contains(&"Y Ada");
            assert!(x ^ y, "expected exactly one variant in {out:?}");
            assert_eq!(lines.len(), 3);
        }
    }

    #[test]
    fn rated_full_layout_with_fixed_picker() {
        let t = template(vec![rated_section("r", true), rated_section("r2", false)]);
        let a = answers(vec![
            (
                "r",
                answer(|a| {
                    a.rating = Some(RatingChoice::Good);
                    a.additional_comment = Some("  Keep it up.  ".to_string());
                }),
            ),
            ("r2", answer(|a| a.rating = Some(RatingChoice::Excellent))),
        ]);
        let out = generate_report(&t, &ada(), &a, &mut FixedPicker(1));
        assert_eq!(
            out,
            "Ada Lovelace\n\nEffort\nY Ada\nKeep it up.\n\nAda shines."
        );
    }

    #[test]
    fn no_comment_rating_emits_nothing() {
        let t = template(vec![rated_section("r", true), rated_section("r2", false)]);
        let a = answers(vec![
            ("r", answer(|a| a.rating = Some(RatingChoice::NoComment))),
            ("r2", answer(|a| a.rating = Some(RatingChoice::Excellent))),
        ]);
        let out = generate_report(&t, &ada(), &a, &mut FixedPicker(0));
        assert_eq!(out, "Ada Lovelace\n\nAda shines.");
        assert!(!out.contains("Effort"));
    }

    #[test]
    fn unanswered_rated_section_is_skipped() {
        let t = template(vec![rated_section("r", true)]);
        let out = generate_report(&t, &ada(), &Answers::new(), &mut FixedPicker(0));
        assert_eq!(out, "Ada Lovelace");
    }

    #[test]
    fn empty_bucket_still_emits_heading_and_extra_text() {
        let t = template(vec![rated_section("r", true)]);
        let a = answers(vec![(
            "r",
            answer(|a| {
                a.rating = Some(RatingChoice::Satisfactory);
                a.additional_comment = Some("Teacher note".to_string());
            }),
        )]);
        let out = generate_report(&t, &ada(), &a, &mut FixedPicker(0));
        assert_eq!(out, "Ada Lovelace\n\nEffort\nTeacher note");
    }

    #[test]
    fn standard_prefers_edited_text() {
        let cfg = Configured::new(StandardComment {
            name: "Intro".to_string(),
            comment: "[Name] joined the class.".to_string(),
        });
        let t = template(vec![
            section("s1", SectionBody::StandardComment(cfg.clone())),
            section("s2", SectionBody::StandardComment(cfg)),
        ]);
        let a = answers(vec![(
            "s1",
            answer(|a| a.additional_comment = Some(" Edited for Ada. ".to_string())),
        )]);
        let out = generate_report(&t, &ada(), &a, &mut FixedPicker(0));
        assert_eq!(
            out,
            "Ada Lovelace\n\nIntro\nEdited for Ada.\n\nIntro\nAda joined the class."
        );
    }

    #[test]
    fn optional_comment_needs_flag_and_text() {
        let t = template(vec![
            section("o1", SectionBody::OptionalAdditionalComment {}),
            section("o2", SectionBody::OptionalAdditionalComment {}),
            section("o3", SectionBody::OptionalAdditionalComment {}),
        ]);
        let a = answers(vec![
            (
                "o1",
                answer(|a| a.additional_comment = Some("hidden".to_string())),
            ),
            (
                "o2",
                answer(|a| {
                    a.show_optional = true;
                    a.additional_comment = Some("   ".to_string());
                }),
            ),
            (
                "o3",
                answer(|a| {
                    a.show_optional = true;
                    a.additional_comment = Some("Shown.".to_string());
                }),
            ),
        ]);
        let out = generate_report(&t, &ada(), &a, &mut FixedPicker(0));
        assert_eq!(out, "Ada Lovelace\n\nShown.");
    }

    #[test]
    fn new_line_always_adds_one_blank_line() {
        let std_cfg = Configured::new(StandardComment {
            name: String::new(),
            comment: "A".to_string(),
        });
        let t = template(vec![
            section("a", SectionBody::StandardComment(std_cfg.clone())),
            section("n", SectionBody::NewLine {}),
            section("b", SectionBody::StandardComment(std_cfg)),
        ]);
        let a = answers(vec![(
            "n",
            answer(|a| {
                a.rating = Some(RatingChoice::Good);
                a.additional_comment = Some("ignored".to_string());
            }),
        )]);
        let out = generate_report(&t, &ada(), &a, &mut FixedPicker(0));
        assert_eq!(out, "Ada Lovelace\n\nA\n\n\nA");
    }

    fn assessment_cfg(score_type: ScoreType) -> Configured<AssessmentComment> {
        let mut cfg = Configured::new(AssessmentComment {
            name: "Unit test".to_string(),
            score_type,
            max_score: Some(20.0),
            comments: AssessmentBuckets {
                excellent: vec!["[Name] scored [Score], excellent.".to_string()],
                good: vec!["[Name] scored [Score], good.".to_string()],
                satisfactory: vec!["[Name] scored [Score], fine.".to_string()],
                needs_improvement: vec!["[Name] scored [Score], low.".to_string()],
                not_completed: vec!["[Name] missed it.".to_string()],
            },
        });
        cfg.heading.show_heading = false;
        cfg
    }

    #[test]
    fn assessment_bands_from_out_of_scores() {
        let cfg = assessment_cfg(ScoreType::OutOf);
        let t = template(vec![section("a", SectionBody::AssessmentComment(cfg))]);
        let run = |score: f64| {
            let a = answers(vec![("a", answer(|a| a.assessment_score = Some(score)))]);
            generate_report(&t, &ada(), &a, &mut FixedPicker(0))
        };
        assert_eq!(run(17.0), "Ada Lovelace\n\nAda scored 17/20, excellent.");
        assert_eq!(run(13.0), "Ada Lovelace\n\nAda scored 13/20, good.");
        assert_eq!(run(10.0), "Ada Lovelace\n\nAda scored 10/20, fine.");
        assert_eq!(run(9.5), "Ada Lovelace\n\nAda scored 9.5/20, low.");
    }

    #[test]
    fn assessment_answer_denominator_overrides_max_score() {
        let cfg = assessment_cfg(ScoreType::OutOf);
        let a = answer(|a| {
            a.assessment_score = Some(40.0);
            a.assessment_out_of = Some(50.0);
        });
        assert_eq!(
            assessment_band(&cfg.entity, &a),
            Some((AssessmentBand::Excellent, Some("40/50".to_string())))
        );
    }

    #[test]
    fn assessment_percentage_and_not_completed() {
        let cfg = assessment_cfg(ScoreType::Percentage);
        let pct = answer(|a| a.assessment_percentage = Some(64.5));
        assert_eq!(
            assessment_band(&cfg.entity, &pct),
            Some((AssessmentBand::Satisfactory, Some("64.5%".to_string())))
        );

        let missed = answer(|a| {
            a.not_completed = true;
            a.assessment_percentage = Some(99.0);
        });
        assert_eq!(
            assessment_band(&cfg.entity, &missed),
            Some((AssessmentBand::NotCompleted, None))
        );

        let t = template(vec![section("a", SectionBody::AssessmentComment(cfg))]);
        let out = generate_report(
            &t,
            &ada(),
            &answers(vec![("a", missed)]),
            &mut FixedPicker(0),
        );
        assert_eq!(out, "Ada Lovelace\n\nAda missed it.");
    }

    #[test]
    fn percentage_assessment_reads_only_the_percentage() {
        let cfg = assessment_cfg(ScoreType::Percentage);
        let t = template(vec![section("a", SectionBody::AssessmentComment(cfg))]);
        let raw_only = answers(vec![("a", answer(|a| a.assessment_score = Some(90.0)))]);
        let out = generate_report(&t, &ada(), &raw_only, &mut FixedPicker(0));
        assert_eq!(out, "Ada Lovelace");

        let both = answers(vec![(
            "a",
            answer(|a| {
                a.assessment_score = Some(90.0);
                a.assessment_percentage = Some(70.0);
            }),
        )]);
        let out = generate_report(&t, &ada(), &both, &mut FixedPicker(0));
        assert_eq!(out, "Ada Lovelace\n\nAda scored 70%, good.");
    }

    #[test]
    fn assessment_without_score_or_with_no_comment_is_skipped() {
        let cfg = assessment_cfg(ScoreType::OutOf);
        assert_eq!(assessment_band(&cfg.entity, &SectionAnswer::default()), None);

        let t = template(vec![section("a", SectionBody::AssessmentComment(cfg))]);
        let a = answers(vec![(
            "a",
            answer(|a| {
                a.rating = Some(RatingChoice::NoComment);
                a.assessment_score = Some(20.0);
            }),
        )]);
        let out = generate_report(&t, &ada(), &a, &mut FixedPicker(0));
        assert_eq!(out, "Ada Lovelace");
    }

    #[test]
    fn personalised_fills_info_and_uses_default_bucket() {
        let mut comments = BTreeMap::new();
        comments.insert(
            DEFAULT_BUCKET.to_string(),
            vec!["[Name] aims for [personalised information].".to_string()],
        );
        let cfg = Configured::new(PersonalisedComment {
            name: "Target".to_string(),
            instruction: "Enter the target grade".to_string(),
            headings: None,
            comments,
        });
        let t = template(vec![section("p", SectionBody::PersonalisedComment(cfg))]);

        let out = generate_report(&t, &ada(), &Answers::new(), &mut FixedPicker(0));
        assert_eq!(out, "Ada Lovelace");

        let a = answers(vec![(
            "p",
            answer(|a| a.personalised_info = Some(" an A ".to_string())),
        )]);
        let out = generate_report(&t, &ada(), &a, &mut FixedPicker(0));
        assert_eq!(out, "Ada Lovelace\n\nTarget\nAda aims for an A.");
    }

    #[test]
    fn personalised_with_headings_uses_selected_bucket() {
        let mut comments = BTreeMap::new();
        comments.insert("Realistic".to_string(), vec!["R [personalised information]".to_string()]);
        comments.insert("Aspirational".to_string(), vec!["A [personalised information]".to_string()]);
        let mut cfg = Configured::new(PersonalisedComment {
            name: "Goal".to_string(),
            instruction: "Enter a goal".to_string(),
            headings: Some(vec!["Realistic".to_string(), "Aspirational".to_string()]),
            comments,
        });
        cfg.heading.show_heading = false;
        let t = template(vec![section("p", SectionBody::PersonalisedComment(cfg))]);

        let unselected = answers(vec![(
            "p",
            answer(|a| a.personalised_info = Some("B".to_string())),
        )]);
        assert_eq!(
            generate_report(&t, &ada(), &unselected, &mut FixedPicker(0)),
            "Ada Lovelace"
        );

        let a = answers(vec![(
            "p",
            answer(|a| {
                a.personalised_info = Some("B".to_string());
                a.selected_heading = Some("Aspirational".to_string());
            }),
        )]);
        assert_eq!(
            generate_report(&t, &ada(), &a, &mut FixedPicker(0)),
            "Ada Lovelace\n\nA B"
        );
    }

    #[test]
    fn next_steps_requires_a_known_heading() {
        let mut comments = BTreeMap::new();
        comments.insert(
            "Reading".to_string(),
            vec!["[Name] should read daily.".to_string(), "[Name] should read aloud.".to_string()],
        );
        let cfg = Configured::new(NextStepsComment {
            name: "Next Steps".to_string(),
            headings: vec!["Reading".to_string()],
            comments,
        });
        let t = template(vec![section("n", SectionBody::NextSteps(cfg))]);

        let unknown = answers(vec![(
            "n",
            answer(|a| a.selected_heading = Some("Maths".to_string())),
        )]);
        assert_eq!(
            generate_report(&t, &ada(), &unknown, &mut FixedPicker(0)),
            "Ada Lovelace"
        );

        let a = answers(vec![(
            "n",
            answer(|a| a.selected_heading = Some("Reading".to_string())),
        )]);
        assert_eq!(
            generate_report(&t, &ada(), &a, &mut FixedPicker(1)),
            "Ada Lovelace\n\nNext Steps\nAda should read aloud."
        );
    }

    #[test]
    fn seeded_picker_is_reproducible() {
        let t = template(vec![rated_section("r", false)]);
        let a = answers(vec![("r", answer(|a| a.rating = Some(RatingChoice::Good)))]);
        let first = generate_report(&t, &ada(), &a, &mut SeededPicker::new(7));
        let second = generate_report(&t, &ada(), &a, &mut SeededPicker::new(7));
        assert_eq!(first, second);
    }
}
