// SPDX-FileCopyrightText: 2025 ECHIDNA Project Team
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Proof states, goals and their diff
//!
//! A [`ProofState`] is the ordered list of goals the prover reports after a
//! step. Context entries do not point back to the state that owns them;
//! they carry a [`ContextPosition`] (step index, position) instead.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

use crate::math_object::{render, Format, MathObject};

/// How a context entry relates to the previous step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContextTag {
    New,
    Modified,
    #[default]
    Unchanged,
}

/// Arena coordinates of a context entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ContextPosition {
    /// Step whose resulting state holds the entry, `None` for the initial state
    pub step_index: Option<usize>,
    /// Goal within that state
    pub goal: usize,
    /// Position within the goal's context
    pub index: usize,
}

/// A local constant of the context (an object or a hypothesis)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextMathObject {
    pub math_object: MathObject,
    /// Step in which the entry first appeared, `None` for the initial state
    pub origin: Option<usize>,
    pub tag: ContextTag,
    pub position: ContextPosition,
}

impl ContextMathObject {
    pub fn new(math_object: MathObject) -> Self {
        ContextMathObject {
            math_object,
            origin: None,
            tag: ContextTag::Unchanged,
            position: ContextPosition::default(),
        }
    }

    pub fn name(&self) -> &str {
        self.math_object.name().unwrap_or_default()
    }

    pub fn identifier(&self) -> Option<&str> {
        self.math_object.identifier()
    }

    pub fn math_type(&self) -> &MathObject {
        self.math_object.math_type()
    }

    /// Hypotheses are entries whose type is a proposition
    pub fn is_prop(&self) -> bool {
        self.math_type().is_prop()
    }

    /// `name : type` in the given format
    pub fn display(&self, format: Format) -> String {
        format!("{} : {}", self.name(), render(self.math_type(), format, None))
    }

    /// Same entry: identical identifier, or same name when identifiers are absent
    fn same_entry(&self, other: &ContextMathObject) -> bool {
        match (self.identifier(), other.identifier()) {
            (Some(a), Some(b)) => a == b,
            _ => self.name() == other.name(),
        }
    }
}

impl fmt::Display for ContextMathObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display(Format::Utf8))
    }
}

/// One goal: a context and a target
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Goal {
    /// Objects first, then propositions
    pub context: Vec<ContextMathObject>,
    pub target: MathObject,
    /// The prover's own rendering of the target, when supplied
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_pp: Option<String>,
}

impl Goal {
    pub fn new(context: Vec<ContextMathObject>, target: MathObject) -> Self {
        Goal {
            context,
            target,
            target_pp: None,
        }
    }

    pub fn names(&self) -> BTreeSet<String> {
        self.context.iter().map(|c| c.name().to_string()).collect()
    }

    pub fn objects(&self) -> impl Iterator<Item = &ContextMathObject> {
        self.context.iter().filter(|c| !c.is_prop())
    }

    pub fn propositions(&self) -> impl Iterator<Item = &ContextMathObject> {
        self.context.iter().filter(|c| c.is_prop())
    }

    pub fn find_by_name(&self, name: &str) -> Option<&ContextMathObject> {
        self.context.iter().find(|c| c.name() == name)
    }

    pub fn find_by_identifier(&self, identifier: &str) -> Option<&ContextMathObject> {
        self.context
            .iter()
            .find(|c| c.identifier() == Some(identifier))
    }

    /// Context names are pairwise distinct
    pub fn has_unique_names(&self) -> bool {
        self.names().len() == self.context.len()
    }

    /// Display of the whole goal, one context entry per line then `⊢ target`
    pub fn display(&self, format: Format) -> String {
        let mut lines: Vec<String> = self.context.iter().map(|c| c.display(format)).collect();
        lines.push(format!("⊢ {}", render(&self.target, format, None)));
        lines.join("\n")
    }
}

/// The goals reported after a step; empty once the proof is complete
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofState {
    pub goals: Vec<Goal>,
}

impl ProofState {
    pub fn new(goals: Vec<Goal>) -> Self {
        ProofState { goals }
    }

    pub fn main_goal(&self) -> Option<&Goal> {
        self.goals.first()
    }

    pub fn goal_count(&self) -> usize {
        self.goals.len()
    }

    pub fn is_complete(&self) -> bool {
        self.goals.is_empty()
    }

    /// Record arena coordinates of every context entry
    pub fn anchor(&mut self, step_index: Option<usize>) {
        for (g, goal) in self.goals.iter_mut().enumerate() {
            for (i, entry) in goal.context.iter_mut().enumerate() {
                entry.position = ContextPosition {
                    step_index,
                    goal: g,
                    index: i,
                };
            }
        }
    }

    /// Tag entries new/modified/unchanged against `previous` and set origins
    ///
    /// `step_index` is the step producing this state.
    pub fn tag_against(&mut self, previous: &ProofState, step_index: Option<usize>) {
        let delta = self.goal_count() as isize - previous.goal_count() as isize;
        for (i, goal) in self.goals.iter_mut().enumerate() {
            let old = matching_goal(i, delta).and_then(|j| previous.goals.get(j));
            for entry in goal.context.iter_mut() {
                let before = old.and_then(|g| g.context.iter().find(|c| c.same_entry(entry)));
                match before {
                    Some(b) if b.math_type().alpha_eq(entry.math_type()) => {
                        entry.tag = ContextTag::Unchanged;
                        entry.origin = b.origin;
                    }
                    Some(_) => {
                        entry.tag = ContextTag::Modified;
                        entry.origin = step_index;
                    }
                    None => {
                        entry.tag = ContextTag::New;
                        entry.origin = step_index;
                    }
                }
            }
        }
        self.anchor(step_index);
    }
}

/// Index of the goal of the previous state that new goal `index` comes from
///
/// When the step created `delta` goals they all descend from the old main
/// goal; when it closed goals the remaining ones are shifted.
pub fn matching_goal(index: usize, delta: isize) -> Option<usize> {
    if delta >= 0 {
        let d = delta as usize;
        Some(if index <= d { 0 } else { index - d })
    } else {
        Some(index + delta.unsigned_abs())
    }
}

/// Differences between a goal and the goal it descends from
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GoalDiff {
    pub context_new: Vec<ContextMathObject>,
    pub context_removed: Vec<ContextMathObject>,
    /// `(before, after)` for entries whose type changed
    pub context_modified: Vec<(ContextMathObject, ContextMathObject)>,
    pub target_changed: bool,
    /// `(old_target, new_target)` when the target changed
    pub targets: Option<(MathObject, MathObject)>,
}

/// Compare two goals; entries are matched by identifier
pub fn diff_goals(old: &Goal, new: &Goal) -> GoalDiff {
    let mut d = GoalDiff::default();
    for entry in &new.context {
        match old.context.iter().find(|c| c.same_entry(entry)) {
            None => d.context_new.push(entry.clone()),
            Some(before) if !before.math_type().alpha_eq(entry.math_type()) => {
                d.context_modified.push((before.clone(), entry.clone()))
            }
            Some(_) => {}
        }
    }
    for entry in &old.context {
        if !new.context.iter().any(|c| c.same_entry(entry)) {
            d.context_removed.push(entry.clone());
        }
    }
    if !old.target.alpha_eq(&new.target) {
        d.target_changed = true;
        d.targets = Some((old.target.clone(), new.target.clone()));
    }
    d
}

/// Per new goal, its diff against the goal it descends from
pub fn diff(old: &ProofState, new: &ProofState) -> Vec<GoalDiff> {
    let delta = new.goal_count() as isize - old.goal_count() as isize;
    new.goals
        .iter()
        .enumerate()
        .map(|(i, goal)| {
            match matching_goal(i, delta).and_then(|j| old.goals.get(j)) {
                Some(before) => diff_goals(before, goal),
                None => GoalDiff {
                    context_new: goal.context.clone(),
                    ..GoalDiff::default()
                },
            }
        })
        .collect()
}

/// How a step split its goal, as announced by the tactic builder
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubgoalKind {
    Conjunction,
    Iff,
    Cases,
    Disjunction,
    Auxiliary,
    #[default]
    Generic,
}

fn ordinal(k: usize) -> &'static str {
    match k {
        0 => "first",
        1 => "second",
        2 => "third",
        3 => "fourth",
        _ => "next",
    }
}

fn capitalised(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) => c.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Labels for the goals a step created
///
/// `after` is the new state and `delta` its goal-count increase; the first
/// `delta + 1` goals descend from the old main goal and get one label each.
pub fn subgoal_labels(
    kind: SubgoalKind,
    before: &ProofState,
    after: &ProofState,
    delta: usize,
) -> Vec<String> {
    let diffs = diff(before, after);
    (0..=delta)
        .filter_map(|k| after.goals.get(k).map(|g| (k, g)))
        .map(|(k, goal)| {
            let target = render(&goal.target, Format::Utf8, None);
            match kind {
                SubgoalKind::Conjunction => format!("Proof of {} conjunct: {}", ordinal(k), target),
                SubgoalKind::Iff => format!("Proof of {} implication: {}", ordinal(k), target),
                SubgoalKind::Disjunction => {
                    format!("{} disjunct: {}", capitalised(ordinal(k)), target)
                }
                SubgoalKind::Cases => {
                    let assumption = diffs
                        .get(k)
                        .and_then(|d| d.context_new.iter().rev().find(|c| c.is_prop()))
                        .map(|c| render(c.math_type(), Format::Utf8, None))
                        .unwrap_or(target);
                    format!("{} case: assuming {}", capitalised(ordinal(k)), assumption)
                }
                SubgoalKind::Auxiliary if k == 0 => {
                    format!("Proof of auxiliary property: {}", target)
                }
                SubgoalKind::Auxiliary | SubgoalKind::Generic => {
                    format!("Sub-goal {}: {}", k + 1, target)
                }
            }
        })
        .collect()
}
