//! Versioned program definitions: screens ("blocks"), their ordered
//! question references, and visibility predicates.

pub mod predicate;
pub mod service;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub use predicate::{PredicateAction, PredicateOperator, VisibilityPredicate};
pub use service::{BlockForm, ProgramForm, ProgramService};

/// Closed set of question types the portal understands. Renderers
/// switch on this tag rather than inspecting answer payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionType {
    Name,
    Address,
    Text,
    Email,
    Date,
    Number,
    Currency,
    FileUpload,
    Checkbox,
    Dropdown,
    Radio,
    Enumerator,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionDefinition {
    pub id: u64,
    /// Admin-facing name, also the export column/key name
    /// (e.g. `applicant_name`).
    pub name: String,
    pub question_type: QuestionType,
}

/// One screen of a program: an ordered set of question references plus
/// an optional visibility predicate. A block tied to an enumerator
/// block holds the questions asked once per repeated entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockDefinition {
    pub id: u64,
    pub name: String,
    pub description: String,
    pub question_ids: Vec<u64>,
    pub enumerator_block_id: Option<u64>,
    pub visibility: Option<VisibilityPredicate>,
}

impl BlockDefinition {
    pub fn is_repeated(&self) -> bool {
        self.enumerator_block_id.is_some()
    }
}

/// Where a program version sits in the draft/publish lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleStage {
    Draft,
    Active,
    Obsolete,
}

/// One version of a program. The `id` is the version row identifier
/// that applications reference; `admin_name` ties versions of the same
/// program together.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgramDefinition {
    pub id: u64,
    pub admin_name: String,
    pub version: u64,
    pub lifecycle: LifecycleStage,
    pub blocks: Vec<BlockDefinition>,
    pub questions: BTreeMap<u64, QuestionDefinition>,
}

impl ProgramDefinition {
    pub fn is_draft(&self) -> bool {
        self.lifecycle == LifecycleStage::Draft
    }

    pub fn block(&self, block_id: u64) -> Result<&BlockDefinition, ProgramError> {
        self.blocks
            .iter()
            .find(|block| block.id == block_id)
            .ok_or(ProgramError::BlockNotFound {
                program_id: self.id,
                block_id,
            })
    }

    pub fn last_block(&self) -> Result<&BlockDefinition, ProgramError> {
        self.blocks
            .last()
            .ok_or(ProgramError::ProgramNeedsABlock(self.id))
    }

    pub fn question(&self, question_id: u64) -> Option<&QuestionDefinition> {
        self.questions.get(&question_id)
    }

    /// Questions of top-level blocks in screen order. Questions that
    /// live on repeated blocks are reached through their enumerator
    /// question instead.
    pub fn top_level_questions(&self) -> Vec<&QuestionDefinition> {
        self.blocks
            .iter()
            .filter(|block| !block.is_repeated())
            .flat_map(|block| block.question_ids.iter())
            .filter_map(|id| self.questions.get(id))
            .collect()
    }

    /// Questions asked per entity of the enumerator question hosted on
    /// `enumerator_block_id`, in screen order.
    pub fn repeated_questions(&self, enumerator_block_id: u64) -> Vec<&QuestionDefinition> {
        self.blocks
            .iter()
            .filter(|block| block.enumerator_block_id == Some(enumerator_block_id))
            .flat_map(|block| block.question_ids.iter())
            .filter_map(|id| self.questions.get(id))
            .collect()
    }

    /// The block hosting `question_id`, if any.
    pub fn block_of_question(&self, question_id: u64) -> Option<&BlockDefinition> {
        self.blocks
            .iter()
            .find(|block| block.question_ids.contains(&question_id))
    }
}

/// Direction for adjacent block reordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Up,
    Down,
}

#[derive(Debug, thiserror::Error)]
pub enum ProgramError {
    #[error("program {0} not found")]
    ProgramNotFound(u64),
    #[error("block {block_id} not found in program {program_id}")]
    BlockNotFound { program_id: u64, block_id: u64 },
    #[error("program {0} must have at least one screen")]
    ProgramNeedsABlock(u64),
    #[error("program {0} is not a draft and cannot be edited")]
    ProgramNotDraft(u64),
    #[error("{0}")]
    IllegalPredicateOrdering(String),
    #[error("{0}")]
    Validation(String),
}

/// Collapse a list of validation messages into the single toast-style
/// message surfaced to the caller.
pub fn join_errors(errors: &[String]) -> String {
    errors.join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn question(id: u64, name: &str, question_type: QuestionType) -> QuestionDefinition {
        QuestionDefinition {
            id,
            name: name.to_string(),
            question_type,
        }
    }

    fn program_with_enumerator() -> ProgramDefinition {
        let mut questions = BTreeMap::new();
        questions.insert(1, question(1, "applicant_name", QuestionType::Name));
        questions.insert(2, question(2, "household_members", QuestionType::Enumerator));
        questions.insert(3, question(3, "household_members_name", QuestionType::Name));

        ProgramDefinition {
            id: 10,
            admin_name: "food-assistance".to_string(),
            version: 1,
            lifecycle: LifecycleStage::Draft,
            blocks: vec![
                BlockDefinition {
                    id: 1,
                    name: "Screen 1".to_string(),
                    description: "applicant".to_string(),
                    question_ids: vec![1],
                    enumerator_block_id: None,
                    visibility: None,
                },
                BlockDefinition {
                    id: 2,
                    name: "Screen 2".to_string(),
                    description: "household".to_string(),
                    question_ids: vec![2],
                    enumerator_block_id: None,
                    visibility: None,
                },
                BlockDefinition {
                    id: 3,
                    name: "Screen 3".to_string(),
                    description: "member names".to_string(),
                    question_ids: vec![3],
                    enumerator_block_id: Some(2),
                    visibility: None,
                },
            ],
            questions,
        }
    }

    #[test]
    fn top_level_questions_skip_repeated_blocks() {
        let program = program_with_enumerator();
        let names: Vec<&str> = program
            .top_level_questions()
            .iter()
            .map(|q| q.name.as_str())
            .collect();
        assert_eq!(names, vec!["applicant_name", "household_members"]);
    }

    #[test]
    fn repeated_questions_resolve_by_enumerator_block() {
        let program = program_with_enumerator();
        let names: Vec<&str> = program
            .repeated_questions(2)
            .iter()
            .map(|q| q.name.as_str())
            .collect();
        assert_eq!(names, vec!["household_members_name"]);
    }

    #[test]
    fn block_lookup_reports_missing_blocks() {
        let program = program_with_enumerator();
        assert!(program.block(1).is_ok());
        match program.block(99) {
            Err(ProgramError::BlockNotFound { block_id: 99, .. }) => {}
            other => panic!("expected block not found, got {other:?}"),
        }
    }

    #[test]
    fn join_errors_produces_single_message() {
        let joined = join_errors(&[
            "screen name is required".to_string(),
            "screen description is required".to_string(),
        ]);
        assert_eq!(
            joined,
            "screen name is required; screen description is required"
        );
    }
}
