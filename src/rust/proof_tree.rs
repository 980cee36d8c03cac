// SPDX-FileCopyrightText: 2025 ECHIDNA Project Team
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Proof history
//!
//! Steps and proof states live in two arenas and refer to each other by
//! index. The accepted steps form a linear history with a cursor: moving
//! the cursor back hides steps without forgetting them, and a new step
//! after an undo drops the hidden tail from the history (but not from the
//! arena). Failed steps are kept in the arena only.

use serde::{Deserialize, Serialize};

use crate::error::StepError;
use crate::proof_state::ProofState;
use crate::tactic::builders::UserAction;
use crate::tactic::code::TacticCode;

pub type StepId = usize;
pub type StateId = usize;

/// Status of a sub-goal branch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BranchStatus {
    Active,
    Pending,
    Solved,
}

/// A labelled sub-goal created by a step
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BranchLabel {
    pub label: String,
    pub status: BranchStatus,
}

impl BranchLabel {
    pub fn active(label: impl Into<String>) -> Self {
        BranchLabel {
            label: label.into(),
            status: BranchStatus::Active,
        }
    }

    pub fn pending(label: impl Into<String>) -> Self {
        BranchLabel {
            label: label.into(),
            status: BranchStatus::Pending,
        }
    }
}

/// One sealed step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProofStep {
    pub id: StepId,
    pub action: UserAction,
    /// Code as built, with `or_else` nodes numbered
    pub code: Option<TacticCode>,
    /// Code with the alternatives that fired
    pub effective_code: Option<TacticCode>,
    /// Source submitted to the prover, kept for inspection
    pub submitted: Option<String>,
    pub before: StateId,
    /// `None` when the step failed
    pub after: Option<StateId>,
    pub goal_index: usize,
    pub total_goals: usize,
    /// Counter used to mint hypothesis names, after this step
    pub property_counter: usize,
    pub success_msg: Option<String>,
    pub error: Option<StepError>,
    /// Sub-goals this step created
    pub branches: Vec<BranchLabel>,
    /// Labels of the open goals after this step, current goal first
    pub goal_stack: Vec<String>,
    pub parent: Option<StepId>,
    pub children: Vec<StepId>,
    pub completes_proof: bool,
}

impl ProofStep {
    pub fn new(action: UserAction, before: StateId) -> Self {
        ProofStep {
            id: 0,
            action,
            code: None,
            effective_code: None,
            submitted: None,
            before,
            after: None,
            goal_index: 0,
            total_goals: 0,
            property_counter: 0,
            success_msg: None,
            error: None,
            branches: Vec::new(),
            goal_stack: Vec::new(),
            parent: None,
            children: Vec::new(),
            completes_proof: false,
        }
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

/// Cursor move: relative or absolute (number of visible steps)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CursorMove {
    Delta(isize),
    Index(usize),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProofTree {
    states: Vec<ProofState>,
    steps: Vec<ProofStep>,
    initial_goal_stack: Vec<String>,
    history: Vec<StepId>,
    cursor: usize,
}

impl ProofTree {
    pub fn new(initial: ProofState) -> Self {
        let initial_goal_stack = (0..initial.goal_count())
            .map(|i| {
                if i == 0 {
                    "Main goal".to_string()
                } else {
                    format!("Goal {}", i + 1)
                }
            })
            .collect();
        ProofTree {
            states: vec![initial],
            steps: Vec::new(),
            initial_goal_stack,
            history: Vec::new(),
            cursor: 0,
        }
    }

    pub fn initial_state(&self) -> &ProofState {
        &self.states[0]
    }

    pub fn state(&self, id: StateId) -> Option<&ProofState> {
        self.states.get(id)
    }

    pub fn step(&self, id: StepId) -> Option<&ProofStep> {
        self.steps.get(id)
    }

    pub fn steps(&self) -> &[ProofStep] {
        &self.steps
    }

    /// Id the next recorded step will get
    pub fn next_step_id(&self) -> StepId {
        self.steps.len()
    }

    pub fn push_state(&mut self, state: ProofState) -> StateId {
        self.states.push(state);
        self.states.len() - 1
    }

    /// Number of visible steps
    pub fn history_cursor(&self) -> usize {
        self.cursor
    }

    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    /// Visible accepted steps, oldest first
    pub fn accepted(&self) -> impl Iterator<Item = &ProofStep> {
        self.history[..self.cursor]
            .iter()
            .filter_map(|id| self.steps.get(*id))
    }

    pub fn is_accepted(&self, id: StepId) -> bool {
        self.history[..self.cursor].contains(&id)
    }

    pub fn current_step(&self) -> Option<&ProofStep> {
        self.cursor
            .checked_sub(1)
            .and_then(|i| self.history.get(i))
            .and_then(|id| self.steps.get(*id))
    }

    pub fn current_state_id(&self) -> StateId {
        self.current_step().and_then(|s| s.after).unwrap_or(0)
    }

    pub fn current_state(&self) -> &ProofState {
        self.states
            .get(self.current_state_id())
            .unwrap_or(&self.states[0])
    }

    pub fn goal_stack(&self) -> &[String] {
        match self.current_step() {
            Some(step) => &step.goal_stack,
            None => &self.initial_goal_stack,
        }
    }

    pub fn property_counter(&self) -> usize {
        self.current_step().map_or(0, |s| s.property_counter)
    }

    pub fn is_complete(&self) -> bool {
        self.current_step().is_some_and(|s| s.completes_proof)
            || self.current_state().is_complete()
    }

    fn insert(&mut self, mut step: ProofStep) -> StepId {
        let id = self.steps.len();
        step.id = id;
        step.parent = self.current_step().map(|s| s.id);
        if let Some(parent) = step.parent {
            if let Some(p) = self.steps.get_mut(parent) {
                p.children.push(id);
            }
        }
        self.steps.push(step);
        id
    }

    /// Append an accepted step after the cursor; hidden steps leave the history
    pub fn record_success(&mut self, step: ProofStep) -> StepId {
        let id = self.insert(step);
        self.history.truncate(self.cursor);
        self.history.push(id);
        self.cursor = self.history.len();
        id
    }

    /// Keep a failed step in the arena without touching the history
    pub fn record_failure(&mut self, mut step: ProofStep) -> StepId {
        let id = self.steps.len();
        step.id = id;
        step.parent = self.current_step().map(|s| s.id);
        self.steps.push(step);
        id
    }

    pub fn can_undo(&self) -> bool {
        self.cursor > 0
    }

    pub fn can_redo(&self) -> bool {
        self.cursor < self.history.len()
    }

    pub fn undo(&mut self) -> bool {
        if self.can_undo() {
            self.cursor -= 1;
            true
        } else {
            false
        }
    }

    pub fn redo(&mut self) -> bool {
        if self.can_redo() {
            self.cursor += 1;
            true
        } else {
            false
        }
    }

    /// Back to the initial state
    pub fn rewind(&mut self) {
        self.cursor = 0;
    }

    /// Make `id` the current step; false when it is not in the history
    pub fn go_to(&mut self, id: StepId) -> bool {
        match self.history.iter().position(|s| *s == id) {
            Some(pos) => {
                self.cursor = pos + 1;
                true
            }
            None => false,
        }
    }

    /// Move the cursor, clamped to the history; returns the new cursor
    pub fn move_cursor(&mut self, m: CursorMove) -> usize {
        let target = match m {
            CursorMove::Delta(d) => (self.cursor as isize + d).max(0) as usize,
            CursorMove::Index(i) => i,
        };
        self.cursor = target.min(self.history.len());
        self.cursor
    }
}
