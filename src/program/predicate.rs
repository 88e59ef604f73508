//! Visibility predicates and the ordering invariant enforced on every
//! block mutation: a predicate may only reference questions defined on
//! screens strictly before its own, and a repeated screen must come
//! after its enumerator screen.

use super::{BlockDefinition, ProgramDefinition, ProgramError};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PredicateAction {
    ShowBlock,
    HideBlock,
    Eligible,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PredicateOperator {
    Equals,
    NotEquals,
    Contains,
}

/// A condition on an earlier answer that controls whether a screen is
/// shown (or counts toward eligibility).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisibilityPredicate {
    pub question_id: u64,
    pub operator: PredicateOperator,
    pub value: String,
    pub action: PredicateAction,
}

/// Validate a proposed block order for `program`. Returns the full
/// list of violations joined into one message so an admin sees every
/// problem with a reorder or deletion at once.
pub fn validate_block_order(
    program: &ProgramDefinition,
    blocks: &[BlockDefinition],
) -> Result<(), ProgramError> {
    let mut seen_questions: HashSet<u64> = HashSet::new();
    let mut seen_blocks: HashSet<u64> = HashSet::new();
    let mut violations: Vec<String> = Vec::new();

    for block in blocks {
        if let Some(enumerator_id) = block.enumerator_block_id {
            if !seen_blocks.contains(&enumerator_id) {
                violations.push(format!(
                    "screen '{}' repeats entities of screen {} which is no longer ordered before it",
                    block.name, enumerator_id
                ));
            }
        }

        if let Some(predicate) = &block.visibility {
            if !seen_questions.contains(&predicate.question_id) {
                let question_name = program
                    .question(predicate.question_id)
                    .map(|question| question.name.clone())
                    .unwrap_or_else(|| format!("#{}", predicate.question_id));
                violations.push(format!(
                    "screen '{}' has a condition on question '{}' which is not asked on an earlier screen",
                    block.name, question_name
                ));
            }
        }

        seen_blocks.insert(block.id);
        seen_questions.extend(block.question_ids.iter().copied());
    }

    if violations.is_empty() {
        Ok(())
    } else {
        Err(ProgramError::IllegalPredicateOrdering(super::join_errors(
            &violations,
        )))
    }
}
