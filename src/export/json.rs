//! JSON renderer: one array entry per application with fixed top-level
//! metadata and a nested `application` object keyed by question name.
//!
//! Output is stable: keys serialize in sorted order and timestamps use
//! a fixed UTC format, so the same input always yields identical
//! bytes.

use super::{collector, file_url};
use crate::applications::{AnswerValue, Application};
use crate::program::{ProgramDefinition, QuestionDefinition, QuestionType};
use chrono::{DateTime, Utc};
use serde_json::{json, Map, Value};

pub struct JsonExporter {
    base_url: String,
    status_tracking_enabled: bool,
}

impl JsonExporter {
    pub fn new(base_url: impl Into<String>, status_tracking_enabled: bool) -> Self {
        Self {
            base_url: base_url.into(),
            status_tracking_enabled,
        }
    }

    /// Render the batch in its given order.
    pub fn export(
        &self,
        program: &ProgramDefinition,
        applications: &[Application],
    ) -> Result<String, serde_json::Error> {
        let entries: Vec<Value> = applications
            .iter()
            .map(|application| self.entry(program, application))
            .collect();
        serde_json::to_string_pretty(&Value::Array(entries))
    }

    fn entry(&self, program: &ProgramDefinition, application: &Application) -> Value {
        let mut entry = Map::new();
        entry.insert("program_name".into(), json!(application.program_name));
        entry.insert("program_version_id".into(), json!(application.program_id));
        entry.insert("applicant_id".into(), json!(application.applicant_id));
        entry.insert("application_id".into(), json!(application.id));
        entry.insert("language".into(), json!(application.language));
        entry.insert(
            "submitter_email".into(),
            json!(application
                .submitter_email
                .clone()
                .unwrap_or_else(|| "Applicant".to_string())),
        );
        entry.insert(
            "create_time".into(),
            json!(format_export_time(application.create_time)),
        );
        entry.insert(
            "submit_time".into(),
            json!(format_export_time(application.submit_time)),
        );
        if self.status_tracking_enabled {
            entry.insert("status".into(), json!(application.latest_status));
        }

        let mut answers = Map::new();
        for answer in collector::collect(program, application) {
            let Some(question) = program.question(answer.question_id) else {
                continue;
            };
            answers.insert(
                answer.question_name.clone(),
                self.value_json(program, question, answer.value.as_ref()),
            );
        }
        entry.insert("application".into(), Value::Object(answers));
        Value::Object(entry)
    }

    fn value_json(
        &self,
        program: &ProgramDefinition,
        question: &QuestionDefinition,
        value: Option<&AnswerValue>,
    ) -> Value {
        let Some(value) = value else {
            return absent_json(question.question_type);
        };
        match value {
            AnswerValue::Name {
                first,
                middle,
                last,
            } => json!({
                "first_name": first,
                "middle_name": middle,
                "last_name": last,
            }),
            AnswerValue::Address {
                street,
                line2,
                city,
                state,
                zip,
            } => json!({
                "street": street,
                "line2": line2,
                "city": city,
                "state": state,
                "zip": zip,
            }),
            AnswerValue::Text { text } => json!({ "text": text }),
            AnswerValue::Email { email } => json!({ "email": email }),
            AnswerValue::Date { date } => json!({ "date": date.format("%Y-%m-%d").to_string() }),
            AnswerValue::Number { number } => json!({ "number": number }),
            AnswerValue::Currency { cents } => {
                json!({ "currency_dollars": *cents as f64 / 100.0 })
            }
            AnswerValue::FileUpload { file_key } => json!({
                "file_key": file_url(&self.base_url, program.id, file_key),
            }),
            AnswerValue::MultiSelect { selections } => json!({ "selections": selections }),
            AnswerValue::SingleSelect { selection } => json!({ "selection": selection }),
            AnswerValue::Entities { entities } => {
                let children = program
                    .block_of_question(question.id)
                    .map(|block| program.repeated_questions(block.id))
                    .unwrap_or_default();
                let groups: Vec<Value> = entities
                    .iter()
                    .map(|entity| {
                        let mut group = Map::new();
                        group.insert("entity_name".into(), json!(entity.entity_name));
                        for &child in &children {
                            let nested = entity
                                .answers
                                .get(&child.name)
                                .filter(|stored| {
                                    collector::shape_matches(child.question_type, &stored.value)
                                })
                                .map(|stored| &stored.value);
                            group.insert(
                                child.name.clone(),
                                self.value_json(program, child, nested),
                            );
                        }
                        Value::Object(group)
                    })
                    .collect();
                Value::Array(groups)
            }
        }
    }
}

/// The type-shaped object an unanswered question renders to: same keys
/// as an answered one, every field null. Unanswered enumerators render
/// an empty array.
fn absent_json(question_type: QuestionType) -> Value {
    match question_type {
        QuestionType::Name => json!({
            "first_name": null,
            "middle_name": null,
            "last_name": null,
        }),
        QuestionType::Address => json!({
            "street": null,
            "line2": null,
            "city": null,
            "state": null,
            "zip": null,
        }),
        QuestionType::Text => json!({ "text": null }),
        QuestionType::Email => json!({ "email": null }),
        QuestionType::Date => json!({ "date": null }),
        QuestionType::Number => json!({ "number": null }),
        QuestionType::Currency => json!({ "currency_dollars": null }),
        QuestionType::FileUpload => json!({ "file_key": null }),
        QuestionType::Checkbox => json!({ "selections": null }),
        QuestionType::Dropdown | QuestionType::Radio => json!({ "selection": null }),
        QuestionType::Enumerator => json!([]),
    }
}

/// Fixed-locale export timestamp, e.g. `2022/04/09 3:07:02 AM UTC`.
pub fn format_export_time(time: DateTime<Utc>) -> String {
    time.format("%Y/%m/%d %-I:%M:%S %p UTC").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn export_time_uses_twelve_hour_clock() {
        let morning = Utc.with_ymd_and_hms(2022, 4, 9, 3, 7, 2).unwrap();
        assert_eq!(format_export_time(morning), "2022/04/09 3:07:02 AM UTC");
        let afternoon = Utc.with_ymd_and_hms(2022, 12, 9, 14, 30, 30).unwrap();
        assert_eq!(format_export_time(afternoon), "2022/12/09 2:30:30 PM UTC");
    }

    #[test]
    fn absent_json_shapes_match_answered_shapes() {
        let name = absent_json(QuestionType::Name);
        assert!(name.get("first_name").unwrap().is_null());
        assert!(name.get("middle_name").unwrap().is_null());
        assert!(name.get("last_name").unwrap().is_null());

        assert!(absent_json(QuestionType::Enumerator)
            .as_array()
            .unwrap()
            .is_empty());
        assert!(absent_json(QuestionType::Currency)
            .get("currency_dollars")
            .unwrap()
            .is_null());
    }
}
