//! Answer Collector: materializes the ordered question/answer sequence
//! for one application against its program definition.
//!
//! Every question the applicant was shown appears exactly once in the
//! output. Unanswered questions carry an explicit absent marker rather
//! than being omitted, so every application of a program exports the
//! same column set. A stored answer whose shape no longer matches the
//! question's current type (the question changed between versions)
//! also collapses to the absent marker instead of failing the export.

use crate::applications::{AnswerValue, Application, StoredAnswer};
use crate::program::{ProgramDefinition, QuestionDefinition, QuestionType};

/// One question/answer pair in an application's review view.
#[derive(Debug, Clone, PartialEq)]
pub struct AnswerData {
    pub question_id: u64,
    pub question_name: String,
    pub question_type: QuestionType,
    /// `None` is the absent marker for unanswered questions.
    pub value: Option<AnswerValue>,
    pub answer_text: String,
    /// Set for file-upload answers; renderers turn it into a link.
    pub file_key: Option<String>,
    pub answered_at_millis: Option<i64>,
}

/// Collect the full ordered answer sequence for `application`.
pub fn collect(program: &ProgramDefinition, application: &Application) -> Vec<AnswerData> {
    program
        .top_level_questions()
        .into_iter()
        .map(|question| answer_for(question, application.answers.get(&question.name)))
        .collect()
}

fn answer_for(question: &QuestionDefinition, stored: Option<&StoredAnswer>) -> AnswerData {
    let matched = stored.filter(|stored| shape_matches(question.question_type, &stored.value));
    let value = matched.map(|stored| stored.value.clone());
    let file_key = match &value {
        Some(AnswerValue::FileUpload { file_key }) => Some(file_key.clone()),
        _ => None,
    };
    AnswerData {
        question_id: question.id,
        question_name: question.name.clone(),
        question_type: question.question_type,
        answer_text: value.as_ref().map(render_text).unwrap_or_else(|| "-".to_string()),
        file_key,
        answered_at_millis: matched.map(|stored| stored.answered_at_millis),
        value,
    }
}

/// Whether a stored payload still fits the question's declared type.
pub fn shape_matches(question_type: QuestionType, value: &AnswerValue) -> bool {
    matches!(
        (question_type, value),
        (QuestionType::Name, AnswerValue::Name { .. })
            | (QuestionType::Address, AnswerValue::Address { .. })
            | (QuestionType::Text, AnswerValue::Text { .. })
            | (QuestionType::Email, AnswerValue::Email { .. })
            | (QuestionType::Date, AnswerValue::Date { .. })
            | (QuestionType::Number, AnswerValue::Number { .. })
            | (QuestionType::Currency, AnswerValue::Currency { .. })
            | (QuestionType::FileUpload, AnswerValue::FileUpload { .. })
            | (QuestionType::Checkbox, AnswerValue::MultiSelect { .. })
            | (QuestionType::Dropdown, AnswerValue::SingleSelect { .. })
            | (QuestionType::Radio, AnswerValue::SingleSelect { .. })
            | (QuestionType::Enumerator, AnswerValue::Entities { .. })
    )
}

/// Human-readable rendering used by the PDF renderer and review views.
pub fn render_text(value: &AnswerValue) -> String {
    match value {
        AnswerValue::Name {
            first,
            middle,
            last,
        } => match middle {
            Some(middle) => format!("{first} {middle} {last}"),
            None => format!("{first} {last}"),
        },
        AnswerValue::Address {
            street,
            line2,
            city,
            state,
            zip,
        } => match line2 {
            Some(line2) => format!("{street}, {line2}, {city}, {state} {zip}"),
            None => format!("{street}, {city}, {state} {zip}"),
        },
        AnswerValue::Text { text } => text.clone(),
        AnswerValue::Email { email } => email.clone(),
        AnswerValue::Date { date } => date.format("%Y-%m-%d").to_string(),
        AnswerValue::Number { number } => number.to_string(),
        AnswerValue::Currency { cents } => format_dollars(*cents),
        AnswerValue::FileUpload { file_key } => file_key.clone(),
        AnswerValue::MultiSelect { selections } => selections.join(", "),
        AnswerValue::SingleSelect { selection } => selection.clone(),
        AnswerValue::Entities { entities } => entities
            .iter()
            .map(|entity| entity.entity_name.as_str())
            .collect::<Vec<_>>()
            .join(", "),
    }
}

/// Render cents as a plain dollars string, e.g. `123456` -> `1234.56`.
pub fn format_dollars(cents: i64) -> String {
    let sign = if cents < 0 { "-" } else { "" };
    let cents = cents.unsigned_abs();
    format!("{sign}{}.{:02}", cents / 100, cents % 100)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::applications::EntityAnswers;
    use crate::program::{BlockDefinition, LifecycleStage};
    use chrono::{NaiveDate, TimeZone, Utc};
    use std::collections::BTreeMap;

    fn question(id: u64, name: &str, question_type: QuestionType) -> QuestionDefinition {
        QuestionDefinition {
            id,
            name: name.to_string(),
            question_type,
        }
    }

    fn program() -> ProgramDefinition {
        let mut questions = BTreeMap::new();
        questions.insert(1, question(1, "applicant_name", QuestionType::Name));
        questions.insert(2, question(2, "applicant_birth_date", QuestionType::Date));
        questions.insert(3, question(3, "applicant_email_address", QuestionType::Email));
        questions.insert(4, question(4, "monthly_income", QuestionType::Currency));
        ProgramDefinition {
            id: 5,
            admin_name: "food-assistance".to_string(),
            version: 1,
            lifecycle: LifecycleStage::Active,
            blocks: vec![BlockDefinition {
                id: 1,
                name: "Screen 1".to_string(),
                description: String::new(),
                question_ids: vec![1, 2, 3, 4],
                enumerator_block_id: None,
                visibility: None,
            }],
            questions,
        }
    }

    fn stored(value: AnswerValue) -> StoredAnswer {
        StoredAnswer {
            value,
            answered_at_millis: 1_700_000_000_000,
        }
    }

    fn application(answers: BTreeMap<String, StoredAnswer>) -> Application {
        Application {
            id: 42,
            applicant_id: 7,
            applicant_name: "Alice Appleton".to_string(),
            program_id: 5,
            program_name: "food-assistance".to_string(),
            language: "en-US".to_string(),
            create_time: Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap(),
            submit_time: Utc.with_ymd_and_hms(2024, 3, 2, 9, 0, 0).unwrap(),
            submitter_email: None,
            latest_status: None,
            answers,
        }
    }

    #[test]
    fn output_length_is_answered_plus_unanswered() {
        let mut answers = BTreeMap::new();
        answers.insert(
            "applicant_name".to_string(),
            stored(AnswerValue::Name {
                first: "Alice".to_string(),
                middle: None,
                last: "Appleton".to_string(),
            }),
        );
        answers.insert(
            "applicant_birth_date".to_string(),
            stored(AnswerValue::Date {
                date: NaiveDate::from_ymd_opt(1980, 1, 1).unwrap(),
            }),
        );

        let collected = collect(&program(), &application(answers));

        assert_eq!(collected.len(), 4);
        let absent: Vec<&str> = collected
            .iter()
            .filter(|answer| answer.value.is_none())
            .map(|answer| answer.question_name.as_str())
            .collect();
        assert_eq!(absent, vec!["applicant_email_address", "monthly_income"]);
    }

    #[test]
    fn unanswered_question_has_absent_marker_not_omission() {
        let collected = collect(&program(), &application(BTreeMap::new()));
        assert_eq!(collected.len(), 4);
        for answer in &collected {
            assert!(answer.value.is_none());
            assert_eq!(answer.answer_text, "-");
            assert!(answer.answered_at_millis.is_none());
        }
    }

    #[test]
    fn type_mismatch_collapses_to_absent_marker() {
        let mut answers = BTreeMap::new();
        // The question is Currency now but the stored answer predates
        // the type change.
        answers.insert(
            "monthly_income".to_string(),
            stored(AnswerValue::Text {
                text: "lots".to_string(),
            }),
        );
        let collected = collect(&program(), &application(answers));
        let income = collected
            .iter()
            .find(|answer| answer.question_name == "monthly_income")
            .expect("present");
        assert!(income.value.is_none());
    }

    #[test]
    fn file_upload_exposes_file_key() {
        let mut questions = BTreeMap::new();
        questions.insert(9, question(9, "proof_of_income", QuestionType::FileUpload));
        let mut program = program();
        program.questions = questions;
        program.blocks[0].question_ids = vec![9];

        let mut answers = BTreeMap::new();
        answers.insert(
            "proof_of_income".to_string(),
            stored(AnswerValue::FileUpload {
                file_key: "my-file-key".to_string(),
            }),
        );
        let collected = collect(&program, &application(answers));
        assert_eq!(collected[0].file_key.as_deref(), Some("my-file-key"));
    }

    #[test]
    fn render_text_covers_composite_variants() {
        assert_eq!(
            render_text(&AnswerValue::Name {
                first: "Alice".to_string(),
                middle: Some("B".to_string()),
                last: "Appleton".to_string(),
            }),
            "Alice B Appleton"
        );
        assert_eq!(
            render_text(&AnswerValue::Address {
                street: "street st".to_string(),
                line2: Some("apt 100".to_string()),
                city: "city".to_string(),
                state: "AB".to_string(),
                zip: "54321".to_string(),
            }),
            "street st, apt 100, city, AB 54321"
        );
        assert_eq!(
            render_text(&AnswerValue::MultiSelect {
                selections: vec!["toaster".to_string(), "pepper grinder".to_string()],
            }),
            "toaster, pepper grinder"
        );
        assert_eq!(
            render_text(&AnswerValue::Entities {
                entities: vec![EntityAnswers {
                    entity_name: "James".to_string(),
                    answers: BTreeMap::new(),
                }],
            }),
            "James"
        );
        assert_eq!(format_dollars(123_456), "1234.56");
        assert_eq!(format_dollars(-50), "-0.50");
    }
}
