//! In-memory program store and the draft-editing operations exposed to
//! the admin surface. Every block mutation is validated against the
//! predicate-ordering invariant before it is committed; a rejected
//! mutation leaves the stored program untouched.

use super::predicate::{validate_block_order, VisibilityPredicate};
use super::{
    join_errors, BlockDefinition, Direction, LifecycleStage, ProgramDefinition, ProgramError,
    QuestionDefinition,
};
use serde::{Deserialize, Serialize};
use std::sync::Mutex;
use tracing::info;

/// Form payload for creating or renaming a program.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgramForm {
    pub admin_name: String,
    pub description: String,
}

/// Form payload for updating a screen.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockForm {
    pub name: String,
    pub description: String,
}

#[derive(Debug, Default)]
struct ProgramStore {
    programs: Vec<ProgramDefinition>,
    next_program_id: u64,
    next_block_id: u64,
}

/// Owns every program version. Shared across requests behind an `Arc`;
/// the interior mutex scopes each operation to one critical section.
#[derive(Debug)]
pub struct ProgramService {
    store: Mutex<ProgramStore>,
}

impl Default for ProgramService {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgramService {
    pub fn new() -> Self {
        Self {
            store: Mutex::new(ProgramStore {
                programs: Vec::new(),
                next_program_id: 1,
                next_block_id: 1,
            }),
        }
    }

    /// Create a new draft program with one empty screen. Validation
    /// problems are collected and joined rather than failing on the
    /// first.
    pub fn create_program(&self, form: ProgramForm) -> Result<ProgramDefinition, ProgramError> {
        let mut errors = Vec::new();
        let admin_name = form.admin_name.trim().to_string();
        if admin_name.is_empty() {
            errors.push("program admin name is required".to_string());
        }
        if form.description.trim().is_empty() {
            errors.push("program description is required".to_string());
        }

        let mut store = self.store.lock().expect("program store mutex poisoned");
        if store
            .programs
            .iter()
            .any(|program| program.admin_name == admin_name && program.is_draft())
        {
            errors.push(format!("a draft named '{admin_name}' already exists"));
        }
        if !errors.is_empty() {
            return Err(ProgramError::Validation(join_errors(&errors)));
        }

        let id = store.next_program_id;
        store.next_program_id += 1;
        let block_id = store.next_block_id;
        store.next_block_id += 1;

        let program = ProgramDefinition {
            id,
            admin_name,
            version: 1,
            lifecycle: LifecycleStage::Draft,
            blocks: vec![BlockDefinition {
                id: block_id,
                name: "Screen 1".to_string(),
                description: form.description.trim().to_string(),
                question_ids: Vec::new(),
                enumerator_block_id: None,
                visibility: None,
            }],
            questions: Default::default(),
        };
        store.programs.push(program.clone());
        info!(program_id = program.id, name = %program.admin_name, "created draft program");
        Ok(program)
    }

    pub fn get_program(&self, program_id: u64) -> Result<ProgramDefinition, ProgramError> {
        let store = self.store.lock().expect("program store mutex poisoned");
        store
            .programs
            .iter()
            .find(|program| program.id == program_id)
            .cloned()
            .ok_or(ProgramError::ProgramNotFound(program_id))
    }

    /// Every stored version of the named program, oldest first. The
    /// CSV renderer unions question columns across these.
    pub fn versions_of(&self, admin_name: &str) -> Vec<ProgramDefinition> {
        let store = self.store.lock().expect("program store mutex poisoned");
        let mut versions: Vec<ProgramDefinition> = store
            .programs
            .iter()
            .filter(|program| program.admin_name == admin_name)
            .cloned()
            .collect();
        versions.sort_by_key(|program| program.version);
        versions
    }

    pub fn add_block(&self, program_id: u64) -> Result<(ProgramDefinition, u64), ProgramError> {
        self.add_block_inner(program_id, None)
    }

    /// Add a screen repeating the entities of `enumerator_block_id`.
    pub fn add_repeated_block(
        &self,
        program_id: u64,
        enumerator_block_id: u64,
    ) -> Result<(ProgramDefinition, u64), ProgramError> {
        self.add_block_inner(program_id, Some(enumerator_block_id))
    }

    fn add_block_inner(
        &self,
        program_id: u64,
        enumerator_block_id: Option<u64>,
    ) -> Result<(ProgramDefinition, u64), ProgramError> {
        let mut store = self.store.lock().expect("program store mutex poisoned");
        let block_id = store.next_block_id;
        let program = find_draft_mut(&mut store.programs, program_id)?;

        if let Some(enumerator_id) = enumerator_block_id {
            if !program.blocks.iter().any(|block| block.id == enumerator_id) {
                return Err(ProgramError::BlockNotFound {
                    program_id,
                    block_id: enumerator_id,
                });
            }
        }

        let ordinal = program.blocks.len() + 1;
        program.blocks.push(BlockDefinition {
            id: block_id,
            name: format!("Screen {ordinal}"),
            description: String::new(),
            question_ids: Vec::new(),
            enumerator_block_id,
            visibility: None,
        });
        let snapshot = program.clone();
        store.next_block_id += 1;
        Ok((snapshot, block_id))
    }

    /// Update a screen's name and description. Field problems are
    /// aggregated into one joined message.
    pub fn update_block(
        &self,
        program_id: u64,
        block_id: u64,
        form: BlockForm,
    ) -> Result<ProgramDefinition, ProgramError> {
        let mut errors = Vec::new();
        if form.name.trim().is_empty() {
            errors.push("screen name is required".to_string());
        }
        if form.description.trim().is_empty() {
            errors.push("screen description is required".to_string());
        }
        if !errors.is_empty() {
            return Err(ProgramError::Validation(join_errors(&errors)));
        }

        let mut store = self.store.lock().expect("program store mutex poisoned");
        let program = find_draft_mut(&mut store.programs, program_id)?;
        let block = program
            .blocks
            .iter_mut()
            .find(|block| block.id == block_id)
            .ok_or(ProgramError::BlockNotFound {
                program_id,
                block_id,
            })?;
        block.name = form.name.trim().to_string();
        block.description = form.description.trim().to_string();
        Ok(program.clone())
    }

    /// Attach a question definition to a screen.
    pub fn add_question(
        &self,
        program_id: u64,
        block_id: u64,
        question: QuestionDefinition,
    ) -> Result<ProgramDefinition, ProgramError> {
        let mut store = self.store.lock().expect("program store mutex poisoned");
        let program = find_draft_mut(&mut store.programs, program_id)?;
        let question_id = question.id;
        program.questions.insert(question_id, question);
        let block = program
            .blocks
            .iter_mut()
            .find(|block| block.id == block_id)
            .ok_or(ProgramError::BlockNotFound {
                program_id,
                block_id,
            })?;
        block.question_ids.push(question_id);
        Ok(program.clone())
    }

    /// Set or clear a screen's visibility predicate. The proposed
    /// predicate must reference a question asked on an earlier screen.
    pub fn set_block_visibility(
        &self,
        program_id: u64,
        block_id: u64,
        visibility: Option<VisibilityPredicate>,
    ) -> Result<ProgramDefinition, ProgramError> {
        let mut store = self.store.lock().expect("program store mutex poisoned");
        let program = find_draft_mut(&mut store.programs, program_id)?;

        let mut proposed = program.blocks.clone();
        let block = proposed
            .iter_mut()
            .find(|block| block.id == block_id)
            .ok_or(ProgramError::BlockNotFound {
                program_id,
                block_id,
            })?;
        block.visibility = visibility;
        validate_block_order(program, &proposed)?;

        program.blocks = proposed;
        Ok(program.clone())
    }

    /// Swap a screen with its neighbor. Rejected when the new order
    /// breaks predicate ordering or enumerator nesting.
    pub fn move_block(
        &self,
        program_id: u64,
        block_id: u64,
        direction: Direction,
    ) -> Result<ProgramDefinition, ProgramError> {
        let mut store = self.store.lock().expect("program store mutex poisoned");
        let program = find_draft_mut(&mut store.programs, program_id)?;
        let index = program
            .blocks
            .iter()
            .position(|block| block.id == block_id)
            .ok_or(ProgramError::BlockNotFound {
                program_id,
                block_id,
            })?;

        let target = match direction {
            Direction::Up if index > 0 => index - 1,
            Direction::Down if index + 1 < program.blocks.len() => index + 1,
            // Already at the edge; nothing to do.
            _ => return Ok(program.clone()),
        };

        let mut proposed = program.blocks.clone();
        proposed.swap(index, target);
        validate_block_order(program, &proposed)?;

        program.blocks = proposed;
        Ok(program.clone())
    }

    /// Delete a screen. The remaining order is re-validated, and a
    /// program must keep at least one screen.
    pub fn delete_block(
        &self,
        program_id: u64,
        block_id: u64,
    ) -> Result<ProgramDefinition, ProgramError> {
        let mut store = self.store.lock().expect("program store mutex poisoned");
        let program = find_draft_mut(&mut store.programs, program_id)?;
        let index = program
            .blocks
            .iter()
            .position(|block| block.id == block_id)
            .ok_or(ProgramError::BlockNotFound {
                program_id,
                block_id,
            })?;
        if program.blocks.len() == 1 {
            return Err(ProgramError::ProgramNeedsABlock(program_id));
        }

        let mut proposed = program.blocks.clone();
        proposed.remove(index);
        validate_block_order(program, &proposed)?;

        program.blocks = proposed;
        Ok(program.clone())
    }

    /// Create a draft from an existing version, or hand back the
    /// existing draft when one is already open for the same program.
    pub fn new_draft_of(&self, program_id: u64) -> Result<ProgramDefinition, ProgramError> {
        let mut store = self.store.lock().expect("program store mutex poisoned");
        let source = store
            .programs
            .iter()
            .find(|program| program.id == program_id)
            .cloned()
            .ok_or(ProgramError::ProgramNotFound(program_id))?;

        if let Some(existing) = store
            .programs
            .iter()
            .find(|program| program.admin_name == source.admin_name && program.is_draft())
        {
            return Ok(existing.clone());
        }

        let id = store.next_program_id;
        store.next_program_id += 1;
        let mut draft = source;
        draft.id = id;
        draft.version += 1;
        draft.lifecycle = LifecycleStage::Draft;
        store.programs.push(draft.clone());
        Ok(draft)
    }

    /// Publish every draft: drafts become active, prior active versions
    /// of the same programs become obsolete.
    pub fn publish(&self) -> Result<Vec<ProgramDefinition>, ProgramError> {
        let mut store = self.store.lock().expect("program store mutex poisoned");
        let draft_names: Vec<String> = store
            .programs
            .iter()
            .filter(|program| program.is_draft())
            .map(|program| program.admin_name.clone())
            .collect();

        for program in store.programs.iter_mut() {
            if program.lifecycle == LifecycleStage::Active
                && draft_names.contains(&program.admin_name)
            {
                program.lifecycle = LifecycleStage::Obsolete;
            }
        }
        let mut published = Vec::new();
        for program in store.programs.iter_mut() {
            if program.is_draft() {
                program.lifecycle = LifecycleStage::Active;
                published.push(program.clone());
            }
        }
        info!(count = published.len(), "published draft programs");
        Ok(published)
    }
}

fn find_draft_mut(
    programs: &mut [ProgramDefinition],
    program_id: u64,
) -> Result<&mut ProgramDefinition, ProgramError> {
    let program = programs
        .iter_mut()
        .find(|program| program.id == program_id)
        .ok_or(ProgramError::ProgramNotFound(program_id))?;
    if !program.is_draft() {
        return Err(ProgramError::ProgramNotDraft(program_id));
    }
    Ok(program)
}
