//! Submitted applications: the stored record, applicant answer
//! payloads, and the repository abstraction the export pipeline reads
//! through.

pub mod filter;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};

pub use filter::{
    parse_filter_date, select_applications, FilterError, PaginationResult, PaginationSpec,
    StatusFilter, SubmittedApplicationFilter, NO_STATUS_FILTER_OPTION,
};

/// One applicant-supplied answer payload. A closed tagged variant: the
/// renderers switch on the tag, never on runtime type inspection.
/// Enumerator answers carry their repeated-entity groups recursively.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum AnswerValue {
    Name {
        first: String,
        middle: Option<String>,
        last: String,
    },
    Address {
        street: String,
        line2: Option<String>,
        city: String,
        state: String,
        zip: String,
    },
    Text {
        text: String,
    },
    Email {
        email: String,
    },
    Date {
        date: chrono::NaiveDate,
    },
    Number {
        number: i64,
    },
    Currency {
        cents: i64,
    },
    FileUpload {
        file_key: String,
    },
    MultiSelect {
        selections: Vec<String>,
    },
    SingleSelect {
        selection: String,
    },
    Entities {
        entities: Vec<EntityAnswers>,
    },
}

/// Answers for one repeated entity of an enumerator question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityAnswers {
    pub entity_name: String,
    pub answers: BTreeMap<String, StoredAnswer>,
}

/// An answer as persisted on the application, with the wall-clock
/// moment the applicant last touched it (epoch millis).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredAnswer {
    pub value: AnswerValue,
    pub answered_at_millis: i64,
}

/// An immutable-once-submitted application. Staff may later attach a
/// status; nothing else changes after submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Application {
    pub id: u64,
    pub applicant_id: u64,
    pub applicant_name: String,
    /// Version row id of the program this was submitted against.
    pub program_id: u64,
    pub program_name: String,
    pub language: String,
    pub create_time: DateTime<Utc>,
    pub submit_time: DateTime<Utc>,
    pub submitter_email: Option<String>,
    pub latest_status: Option<String>,
    /// Keyed by question name.
    pub answers: BTreeMap<String, StoredAnswer>,
}

#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("application already exists")]
    Conflict,
    #[error("application not found")]
    NotFound,
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}

/// Storage abstraction so the export pipeline and routes can be
/// exercised against an in-memory datastore in tests.
pub trait ApplicationRepository: Send + Sync {
    fn insert(&self, application: Application) -> Result<Application, RepositoryError>;
    fn set_status(&self, id: u64, status: Option<String>) -> Result<(), RepositoryError>;
    fn fetch(&self, id: u64) -> Result<Option<Application>, RepositoryError>;
    /// Every submitted application for one program version, unordered.
    fn for_program(&self, program_id: u64) -> Result<Vec<Application>, RepositoryError>;
}

#[derive(Default, Clone)]
pub struct InMemoryApplicationRepository {
    records: Arc<Mutex<HashMap<u64, Application>>>,
}

impl ApplicationRepository for InMemoryApplicationRepository {
    fn insert(&self, application: Application) -> Result<Application, RepositoryError> {
        let mut guard = self.records.lock().expect("repository mutex poisoned");
        if guard.contains_key(&application.id) {
            return Err(RepositoryError::Conflict);
        }
        guard.insert(application.id, application.clone());
        Ok(application)
    }

    fn set_status(&self, id: u64, status: Option<String>) -> Result<(), RepositoryError> {
        let mut guard = self.records.lock().expect("repository mutex poisoned");
        match guard.get_mut(&id) {
            Some(application) => {
                application.latest_status = status;
                Ok(())
            }
            None => Err(RepositoryError::NotFound),
        }
    }

    fn fetch(&self, id: u64) -> Result<Option<Application>, RepositoryError> {
        let guard = self.records.lock().expect("repository mutex poisoned");
        Ok(guard.get(&id).cloned())
    }

    fn for_program(&self, program_id: u64) -> Result<Vec<Application>, RepositoryError> {
        let guard = self.records.lock().expect("repository mutex poisoned");
        Ok(guard
            .values()
            .filter(|application| application.program_id == program_id)
            .cloned()
            .collect())
    }
}
