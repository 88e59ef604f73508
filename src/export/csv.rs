//! CSV renderer: one row per application, one column per leaf answer
//! field.
//!
//! The column set is the union of every question across the program's
//! versions (oldest first, first-seen order), so a batch that mixes
//! applications submitted against different versions never drops a
//! cell. Enumerator questions expand to one column group per entity,
//! up to the largest entity count observed in the batch. Answers with
//! no matching column value render as empty cells.

use super::{collector, file_url, json::format_export_time};
use crate::applications::{AnswerValue, Application, EntityAnswers, StoredAnswer};
use crate::program::{ProgramDefinition, QuestionDefinition, QuestionType};

pub struct CsvExporter {
    base_url: String,
    status_tracking_enabled: bool,
}

/// Which stored field a single column reads.
#[derive(Debug, Clone, Copy, PartialEq)]
enum LeafField {
    First,
    Middle,
    Last,
    Street,
    Line2,
    City,
    State,
    Zip,
    /// Single-valued types: the whole answer renders into one cell.
    Whole,
}

#[derive(Debug, Clone, PartialEq)]
enum ColumnValue {
    ApplicantId,
    ApplicationId,
    ApplicantName,
    Language,
    SubmitTime,
    SubmitterEmail,
    Status,
    Answer {
        question: String,
        question_type: QuestionType,
        field: LeafField,
    },
    EntityName {
        question: String,
        index: usize,
    },
    EntityAnswer {
        question: String,
        index: usize,
        child: String,
        child_type: QuestionType,
        field: LeafField,
    },
}

#[derive(Debug, Clone, PartialEq)]
struct Column {
    header: String,
    value: ColumnValue,
}

impl CsvExporter {
    pub fn new(base_url: impl Into<String>, status_tracking_enabled: bool) -> Self {
        Self {
            base_url: base_url.into(),
            status_tracking_enabled,
        }
    }

    /// Render the batch. `versions` is every version of the program the
    /// batch may span, oldest first; the current version is last.
    pub fn export(
        &self,
        versions: &[ProgramDefinition],
        applications: &[Application],
    ) -> Result<Vec<u8>, csv::Error> {
        let columns = self.columns(versions, applications);
        let mut writer = csv::Writer::from_writer(Vec::new());
        writer.write_record(columns.iter().map(|column| column.header.as_str()))?;
        for application in applications {
            let program = versions
                .iter()
                .find(|version| version.id == application.program_id)
                .or_else(|| versions.last());
            let row: Vec<String> = columns
                .iter()
                .map(|column| self.cell(&column.value, program, application))
                .collect();
            writer.write_record(&row)?;
        }
        writer
            .into_inner()
            .map_err(|err| csv::Error::from(err.into_error()))
    }

    fn columns(
        &self,
        versions: &[ProgramDefinition],
        applications: &[Application],
    ) -> Vec<Column> {
        let mut columns = vec![
            metadata("Applicant ID", ColumnValue::ApplicantId),
            metadata("Application ID", ColumnValue::ApplicationId),
            metadata("Applicant Name", ColumnValue::ApplicantName),
            metadata("Language", ColumnValue::Language),
            metadata("Submit Time", ColumnValue::SubmitTime),
            metadata("Submitter Email", ColumnValue::SubmitterEmail),
        ];
        if self.status_tracking_enabled {
            columns.push(metadata("Status", ColumnValue::Status));
        }

        let mut seen: Vec<String> = Vec::new();
        for version in versions {
            for question in version.top_level_questions() {
                if seen.iter().any(|name| name == &question.name) {
                    continue;
                }
                seen.push(question.name.clone());
                push_question_columns(&mut columns, question, applications, versions);
            }
        }
        columns
    }

    fn cell(
        &self,
        value: &ColumnValue,
        program: Option<&ProgramDefinition>,
        application: &Application,
    ) -> String {
        match value {
            ColumnValue::ApplicantId => application.applicant_id.to_string(),
            ColumnValue::ApplicationId => application.id.to_string(),
            ColumnValue::ApplicantName => application.applicant_name.clone(),
            ColumnValue::Language => application.language.clone(),
            ColumnValue::SubmitTime => format_export_time(application.submit_time),
            ColumnValue::SubmitterEmail => application
                .submitter_email
                .clone()
                .unwrap_or_else(|| "Applicant".to_string()),
            ColumnValue::Status => application.latest_status.clone().unwrap_or_default(),
            ColumnValue::Answer {
                question,
                question_type,
                field,
            } => {
                match answered(application.answers.get(question.as_str()), *question_type) {
                    Some(value) => self.leaf_cell(value, *field, program),
                    None => String::new(),
                }
            }
            ColumnValue::EntityName { question, index } => {
                match entity(application.answers.get(question.as_str()), *index) {
                    Some(entity) => entity.entity_name.clone(),
                    None => String::new(),
                }
            }
            ColumnValue::EntityAnswer {
                question,
                index,
                child,
                child_type,
                field,
            } => {
                let stored = entity(application.answers.get(question.as_str()), *index)
                    .and_then(|entity| entity.answers.get(child.as_str()));
                match answered(stored, *child_type) {
                    Some(value) => self.leaf_cell(value, *field, program),
                    None => String::new(),
                }
            }
        }
    }

    fn leaf_cell(
        &self,
        value: &AnswerValue,
        field: LeafField,
        program: Option<&ProgramDefinition>,
    ) -> String {
        match (value, field) {
            (AnswerValue::Name { first, .. }, LeafField::First) => first.clone(),
            (AnswerValue::Name { middle, .. }, LeafField::Middle) => {
                middle.clone().unwrap_or_default()
            }
            (AnswerValue::Name { last, .. }, LeafField::Last) => last.clone(),
            (AnswerValue::Address { street, .. }, LeafField::Street) => street.clone(),
            (AnswerValue::Address { line2, .. }, LeafField::Line2) => {
                line2.clone().unwrap_or_default()
            }
            (AnswerValue::Address { city, .. }, LeafField::City) => city.clone(),
            (AnswerValue::Address { state, .. }, LeafField::State) => state.clone(),
            (AnswerValue::Address { zip, .. }, LeafField::Zip) => zip.clone(),
            (AnswerValue::FileUpload { file_key }, LeafField::Whole) => match program {
                Some(program) => file_url(&self.base_url, program.id, file_key),
                None => file_key.clone(),
            },
            (value, LeafField::Whole) => collector::render_text(value),
            _ => String::new(),
        }
    }
}

fn metadata(header: &str, value: ColumnValue) -> Column {
    Column {
        header: header.to_string(),
        value,
    }
}

fn push_question_columns(
    columns: &mut Vec<Column>,
    question: &QuestionDefinition,
    applications: &[Application],
    versions: &[ProgramDefinition],
) {
    match question.question_type {
        QuestionType::Enumerator => {
            let children = enumerator_children(versions, &question.name);
            let entities = max_entity_count(applications, &question.name);
            for index in 0..entities {
                columns.push(Column {
                    header: format!("{} - {} (entity name)", question.name, index + 1),
                    value: ColumnValue::EntityName {
                        question: question.name.clone(),
                        index,
                    },
                });
                for child in &children {
                    for (suffix, field) in leaf_fields(child.question_type) {
                        columns.push(Column {
                            header: format!(
                                "{} - {} - {}{}",
                                question.name,
                                index + 1,
                                child.name,
                                suffix
                            ),
                            value: ColumnValue::EntityAnswer {
                                question: question.name.clone(),
                                index,
                                child: child.name.clone(),
                                child_type: child.question_type,
                                field,
                            },
                        });
                    }
                }
            }
        }
        _ => {
            for (suffix, field) in leaf_fields(question.question_type) {
                columns.push(Column {
                    header: format!("{}{}", question.name, suffix),
                    value: ColumnValue::Answer {
                        question: question.name.clone(),
                        question_type: question.question_type,
                        field,
                    },
                });
            }
        }
    }
}

/// The column suffixes and stored fields one question expands to.
fn leaf_fields(question_type: QuestionType) -> Vec<(&'static str, LeafField)> {
    match question_type {
        QuestionType::Name => vec![
            (" (first name)", LeafField::First),
            (" (middle name)", LeafField::Middle),
            (" (last name)", LeafField::Last),
        ],
        QuestionType::Address => vec![
            (" (street)", LeafField::Street),
            (" (line 2)", LeafField::Line2),
            (" (city)", LeafField::City),
            (" (state)", LeafField::State),
            (" (zip)", LeafField::Zip),
        ],
        // Nested enumerators flatten to their entity-name summary.
        _ => vec![("", LeafField::Whole)],
    }
}

/// Union of an enumerator's child questions across every version,
/// first-seen order.
fn enumerator_children(
    versions: &[ProgramDefinition],
    enumerator_name: &str,
) -> Vec<QuestionDefinition> {
    let mut children: Vec<QuestionDefinition> = Vec::new();
    for version in versions {
        let Some(enumerator) = version
            .top_level_questions()
            .into_iter()
            .find(|question| question.name == enumerator_name)
        else {
            continue;
        };
        let Some(block) = version.block_of_question(enumerator.id) else {
            continue;
        };
        for child in version.repeated_questions(block.id) {
            if !children.iter().any(|known| known.name == child.name) {
                children.push(child.clone());
            }
        }
    }
    children
}

fn max_entity_count(applications: &[Application], question_name: &str) -> usize {
    applications
        .iter()
        .filter_map(|application| application.answers.get(question_name))
        .filter_map(|stored| match &stored.value {
            AnswerValue::Entities { entities } => Some(entities.len()),
            _ => None,
        })
        .max()
        .unwrap_or(0)
}

fn answered(
    stored: Option<&StoredAnswer>,
    question_type: QuestionType,
) -> Option<&AnswerValue> {
    stored
        .map(|stored| &stored.value)
        .filter(|value| collector::shape_matches(question_type, value))
}

fn entity(stored: Option<&StoredAnswer>, index: usize) -> Option<&EntityAnswers> {
    match stored.map(|stored| &stored.value) {
        Some(AnswerValue::Entities { entities }) => entities.get(index),
        _ => None,
    }
}
