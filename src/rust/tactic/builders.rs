// SPDX-FileCopyrightText: 2025 ECHIDNA Project Team
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Tactic builders: user actions to tactic code
//!
//! Each button inspects the selection and the main goal and either
//! produces a [`BuiltStep`], asks for more input, or rejects the action.
//! Builders never talk to the prover; whether the code works is decided
//! when the coordinator submits it.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use super::catalogue::*;
use super::code::TacticCode;
use crate::config::NamingConfig;
use crate::error::{BuildError, InputRequest};
use crate::math_object::naming::{fresh_name, hypothesis_name, primed_name};
use crate::math_object::{render, Assignment, Format, MathObject, NodeKind, Pattern};
use crate::proof_state::{ContextMathObject, Goal, SubgoalKind};
use crate::proof_tree::BranchLabel;

/// Logic buttons
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Button {
    Forall,
    Exists,
    Implies,
    And,
    Or,
    Not,
    Iff,
    Equal,
    Contradiction,
    Cases,
    Assumption,
    /// Prover code typed by the user
    Code,
}

impl Button {
    pub const ALL: &'static [Button] = &[
        Button::Forall,
        Button::Exists,
        Button::Implies,
        Button::And,
        Button::Or,
        Button::Not,
        Button::Iff,
        Button::Equal,
        Button::Contradiction,
        Button::Cases,
        Button::Assumption,
        Button::Code,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Button::Forall => "forall",
            Button::Exists => "exists",
            Button::Implies => "implies",
            Button::And => "and",
            Button::Or => "or",
            Button::Not => "not",
            Button::Iff => "iff",
            Button::Equal => "equal",
            Button::Contradiction => "contradiction",
            Button::Cases => "cases",
            Button::Assumption => "assumption",
            Button::Code => "code",
        }
    }
}

impl fmt::Display for Button {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Button {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.to_lowercase();
        Button::ALL
            .iter()
            .copied()
            .find(|b| b.name() == s)
            .ok_or_else(|| anyhow::anyhow!("Unknown button: {}", s))
    }
}

/// A free-form input: a choice index or a text
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum UserInput {
    Choice(usize),
    Text(String),
}

impl UserInput {
    pub fn as_choice(&self) -> Option<usize> {
        match self {
            UserInput::Choice(c) => Some(*c),
            UserInput::Text(t) => t.trim().parse().ok(),
        }
    }

    pub fn as_text(&self) -> String {
        match self {
            UserInput::Choice(c) => c.to_string(),
            UserInput::Text(t) => t.clone(),
        }
    }
}

/// What the user did: a selection of context entries, a button or a
/// statement, and the inputs gathered so far
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserAction {
    /// Names or identifiers of selected context entries, in selection order
    #[serde(default)]
    pub selection: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub button: Option<Button>,
    /// Library statement to apply
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub statement: Option<String>,
    #[serde(default)]
    pub inputs: Vec<UserInput>,
}

impl UserAction {
    pub fn button(button: Button) -> Self {
        UserAction {
            button: Some(button),
            ..UserAction::default()
        }
    }

    pub fn statement(name: impl Into<String>) -> Self {
        UserAction {
            statement: Some(name.into()),
            ..UserAction::default()
        }
    }

    pub fn select<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.selection.extend(names.into_iter().map(Into::into));
        self
    }

    pub fn input(mut self, input: UserInput) -> Self {
        self.inputs.push(input);
        self
    }

    pub fn text(self, text: impl Into<String>) -> Self {
        self.input(UserInput::Text(text.into()))
    }

    pub fn choice(self, choice: usize) -> Self {
        self.input(UserInput::Choice(choice))
    }

    fn text_input(&self, i: usize) -> Option<String> {
        self.inputs
            .get(i)
            .map(UserInput::as_text)
            .filter(|t| !t.trim().is_empty())
    }

    fn choice_input(&self, i: usize) -> Option<usize> {
        self.inputs.get(i).and_then(UserInput::as_choice)
    }
}

/// Code for one step plus what the proof tree needs to label it
#[derive(Debug, Clone, PartialEq)]
pub struct BuiltStep {
    pub code: TacticCode,
    pub subgoal_kind: SubgoalKind,
    /// Explicit branch labels, when the builder knows them better than the diff
    pub branches: Vec<BranchLabel>,
}

impl BuiltStep {
    fn new(code: TacticCode) -> Self {
        BuiltStep {
            code,
            subgoal_kind: SubgoalKind::Generic,
            branches: Vec::new(),
        }
    }

    fn splitting(code: TacticCode, kind: SubgoalKind) -> Self {
        BuiltStep {
            code,
            subgoal_kind: kind,
            branches: Vec::new(),
        }
    }
}

/// Everything a builder may look at
pub struct BuildContext<'a> {
    pub goal: &'a Goal,
    pub naming: &'a NamingConfig,
    /// Counter for `H1`, `H2`, ...; advanced when a name is minted
    pub property_counter: &'a mut usize,
}

impl<'a> BuildContext<'a> {
    fn names(&self) -> BTreeSet<String> {
        self.goal.names()
    }

    fn new_hypothesis(&mut self) -> String {
        let names = self.names();
        hypothesis_name(&names, self.property_counter)
    }

    fn new_object(&self, hint: &str) -> String {
        fresh_name(hint, &self.names(), self.naming.allow_double_prime)
    }

    fn selected(&self, action: &UserAction) -> Result<Vec<&'a ContextMathObject>, BuildError> {
        let goal: &'a Goal = self.goal;
        action
            .selection
            .iter()
            .map(|s| {
                goal.find_by_identifier(s)
                    .or_else(|| goal.find_by_name(s))
                    .ok_or_else(|| BuildError::wrong(format!("{} is not in the context", s)))
            })
            .collect()
    }
}

fn show(obj: &MathObject) -> String {
    render(obj, Format::Utf8, None)
}

/// Match a binary connective, returning its two operands
fn binary(obj: &MathObject, node: NodeKind) -> Option<(MathObject, MathObject)> {
    let mut a: Assignment = Pattern::node(node, vec![Pattern::metavar(0), Pattern::metavar(1)])
        .matches(obj)?;
    Some((a.remove(&0)?, a.remove(&1)?))
}

fn is_shape(obj: &MathObject, node: NodeKind) -> bool {
    match node.arity() {
        Some(3) if node.is_binder() => {
            Pattern::binder(node, Pattern::metavar(0), 0, Pattern::metavar(1))
                .matches(obj)
                .is_some()
        }
        Some(2) => binary(obj, node).is_some(),
        Some(1) => Pattern::node(node, vec![Pattern::metavar(0)]).matches(obj).is_some(),
        _ => obj.is(node),
    }
}

fn bound_name(obj: &MathObject) -> Option<String> {
    obj.bound_variable()
        .and_then(|v| v.name())
        .filter(|n| !n.is_empty())
        .map(str::to_string)
}

fn atomic(text: String) -> TacticCode {
    TacticCode::atomic(text)
}

/// Build the code for one user action on the main goal
pub fn build_step(action: &UserAction, ctx: &mut BuildContext<'_>) -> Result<BuiltStep, BuildError> {
    match (action.button, &action.statement) {
        (Some(button), _) => match button {
            Button::Forall => forall(action, ctx),
            Button::Exists => exists(action, ctx),
            Button::Implies => implies(action, ctx),
            Button::And => and(action, ctx),
            Button::Or => or(action, ctx),
            Button::Not => not(action, ctx),
            Button::Iff => iff(action, ctx),
            Button::Equal => equal(action, ctx),
            Button::Contradiction => contradiction(action, ctx),
            Button::Cases => cases(action, ctx),
            Button::Assumption => assumption(action, ctx),
            Button::Code => raw_code(action),
        },
        (None, Some(statement)) => apply_statement(statement, action, ctx),
        (None, None) => Err(BuildError::wrong("Choose a logic button or a statement")),
    }
}

fn forall(action: &UserAction, ctx: &mut BuildContext<'_>) -> Result<BuiltStep, BuildError> {
    let sel = ctx.selected(action)?;
    match sel.as_slice() {
        [] => {
            let target = &ctx.goal.target;
            if !is_shape(target, NodeKind::Forall) {
                return Err(BuildError::wrong("The target is not a universal property"));
            }
            let hint = bound_name(target).unwrap_or_else(|| "x".to_string());
            let name = ctx.new_object(&hint);
            let code = atomic(format!("{INTRO} {name}"))
                .with_success(format!("Property {name} introduced"));
            Ok(BuiltStep::new(code))
        }
        [h] => {
            if !is_shape(h.math_type(), NodeKind::Forall) {
                return Err(BuildError::wrong(format!(
                    "{} is not a universal property",
                    h.name()
                )));
            }
            let Some(term) = action.text_input(0) else {
                return Err(BuildError::NeedsMoreInput(InputRequest::text(format!(
                    "Apply {} to which object?",
                    h.name()
                ))));
            };
            let h_name = h.name().to_string();
            let new = ctx.new_hypothesis();
            let code = atomic(format!("{HAVE} {new} := {h_name} ({term})"))
                .with_success(format!("Property {new} added"));
            Ok(BuiltStep::new(code))
        }
        [a, b] => {
            let (h, x) = if is_shape(a.math_type(), NodeKind::Forall) {
                (a, b)
            } else if is_shape(b.math_type(), NodeKind::Forall) {
                (b, a)
            } else {
                return Err(BuildError::wrong("Select a universal property"));
            };
            let (h_name, x_name) = (h.name().to_string(), x.name().to_string());
            let new = ctx.new_hypothesis();
            let code = atomic(format!("{HAVE} {new} := {h_name} {x_name}"))
                .with_success(format!("Property {new} added"));
            Ok(BuiltStep::new(code))
        }
        _ => Err(BuildError::wrong("Select at most two context entries")),
    }
}

fn exists(action: &UserAction, ctx: &mut BuildContext<'_>) -> Result<BuiltStep, BuildError> {
    let sel = ctx.selected(action)?;
    match sel.as_slice() {
        [] => {
            let target = &ctx.goal.target;
            if !is_shape(target, NodeKind::Exists) && !is_shape(target, NodeKind::ExistsUnique) {
                return Err(BuildError::wrong("The target is not an existential property"));
            }
            let Some(witness) = action.text_input(0) else {
                return Err(BuildError::NeedsMoreInput(InputRequest::text(
                    "Enter a witness",
                )));
            };
            let code = atomic(format!("{USE} {witness}"))
                .with_success(format!("Now prove that {witness} suits"));
            Ok(BuiltStep::new(code))
        }
        [h] => {
            let t = h.math_type();
            if !is_shape(t, NodeKind::Exists) && !is_shape(t, NodeKind::ExistsUnique) {
                return Err(BuildError::wrong(format!(
                    "{} is not an existential property",
                    h.name()
                )));
            }
            let h_name = h.name().to_string();
            let var = ctx.new_object(&bound_name(t).unwrap_or_else(|| "x".to_string()));
            let new = ctx.new_hypothesis();
            let code = atomic(format!("{CASES} {h_name} with {var} {new}"))
                .with_success(format!("Object {var} and property {new} introduced"));
            Ok(BuiltStep::new(code))
        }
        _ => Err(BuildError::wrong("Select one existential property")),
    }
}

fn implies(action: &UserAction, ctx: &mut BuildContext<'_>) -> Result<BuiltStep, BuildError> {
    let sel = ctx.selected(action)?;
    match sel.as_slice() {
        [] => {
            if !is_shape(&ctx.goal.target, NodeKind::Implies) {
                return Err(BuildError::wrong("The target is not an implication"));
            }
            let new = ctx.new_hypothesis();
            let code = atomic(format!("{INTRO} {new}"))
                .with_success(format!("Property {new} added to the context"));
            Ok(BuiltStep::new(code))
        }
        [h] => {
            let Some((premise, _)) = binary(h.math_type(), NodeKind::Implies) else {
                return Err(BuildError::wrong(format!("{} is not an implication", h.name())));
            };
            let code = atomic(format!("{APPLY} {}", h.name()))
                .with_success(format!("Target replaced by {}", show(&premise)));
            Ok(BuiltStep::new(code))
        }
        [a, b] => {
            // The implication is whichever entry's premise is the other's type
            let fits = |h: &ContextMathObject, x: &ContextMathObject| {
                binary(h.math_type(), NodeKind::Implies)
                    .is_some_and(|(premise, _)| premise.alpha_eq(x.math_type()))
            };
            let (h, x) = if fits(a, b) {
                (a, b)
            } else if fits(b, a) {
                (b, a)
            } else {
                return Err(BuildError::wrong(
                    "Select an implication and a property matching its premise",
                ));
            };
            let (h_name, x_name) = (h.name().to_string(), x.name().to_string());
            let new = ctx.new_hypothesis();
            let code = atomic(format!("{HAVE} {new} := {h_name} {x_name}"))
                .with_success(format!("Property {new} added"));
            Ok(BuiltStep::new(code))
        }
        _ => Err(BuildError::wrong("Select at most two context entries")),
    }
}

fn and(action: &UserAction, ctx: &mut BuildContext<'_>) -> Result<BuiltStep, BuildError> {
    let sel = ctx.selected(action)?;
    match sel.as_slice() {
        [] => {
            if !is_shape(&ctx.goal.target, NodeKind::And) {
                return Err(BuildError::wrong("The target is not a conjunction"));
            }
            let code = atomic(SPLIT.to_string()).with_success("Target split");
            Ok(BuiltStep::splitting(code, SubgoalKind::Conjunction))
        }
        [h] => {
            if !is_shape(h.math_type(), NodeKind::And) {
                return Err(BuildError::wrong(format!("{} is not a conjunction", h.name())));
            }
            let h_name = h.name().to_string();
            let first = ctx.new_hypothesis();
            let second = ctx.new_hypothesis();
            let code = atomic(format!("{CASES} {h_name} with {first} {second}"))
                .with_success(format!("Property {h_name} split into {first} and {second}"));
            Ok(BuiltStep::new(code))
        }
        [a, b] => {
            if !a.is_prop() || !b.is_prop() {
                return Err(BuildError::wrong("Select two properties"));
            }
            let (a_name, b_name) = (a.name().to_string(), b.name().to_string());
            let new = ctx.new_hypothesis();
            let code = atomic(format!("{HAVE} {new} := {AND_INTRO} {a_name} {b_name}"))
                .with_success(format!("Conjunction {new} added"));
            Ok(BuiltStep::new(code))
        }
        _ => Err(BuildError::wrong("Select at most two properties")),
    }
}

fn or(action: &UserAction, ctx: &mut BuildContext<'_>) -> Result<BuiltStep, BuildError> {
    let sel = ctx.selected(action)?;
    match sel.as_slice() {
        [] => {
            let Some((p, q)) = binary(&ctx.goal.target, NodeKind::Or) else {
                return Err(BuildError::wrong("The target is not a disjunction"));
            };
            let (p, q) = (show(&p), show(&q));
            let Some(choice) = action.choice_input(0) else {
                return Err(BuildError::NeedsMoreInput(InputRequest::choice(
                    "Which property will you prove?",
                    vec![("1".to_string(), p), ("2".to_string(), q)],
                )));
            };
            let first = format!("First disjunct: {p}");
            let second = format!("Second disjunct: {q}");
            let (tactic, kept, branches) = match choice {
                1 => (LEFT, &p, vec![BranchLabel::active(first), BranchLabel::pending(second)]),
                2 => (RIGHT, &q, vec![BranchLabel::pending(first), BranchLabel::active(second)]),
                _ => return Err(BuildError::wrong("Choose 1 or 2")),
            };
            let code = atomic(tactic.to_string()).with_success(format!("Target replaced by {kept}"));
            Ok(BuiltStep {
                code,
                subgoal_kind: SubgoalKind::Disjunction,
                branches,
            })
        }
        [h] => {
            if !is_shape(h.math_type(), NodeKind::Or) {
                return Err(BuildError::wrong(format!("{} is not a disjunction", h.name())));
            }
            let h_name = h.name().to_string();
            let new = ctx.new_hypothesis();
            let code = atomic(format!("{CASES} {h_name} with {new} {new}"))
                .with_success(format!("Proof by cases on {h_name}"));
            Ok(BuiltStep::splitting(code, SubgoalKind::Cases))
        }
        _ => Err(BuildError::wrong("Select one disjunction")),
    }
}

fn not(action: &UserAction, ctx: &mut BuildContext<'_>) -> Result<BuiltStep, BuildError> {
    let sel = ctx.selected(action)?;
    match sel.as_slice() {
        [] => {
            let target = &ctx.goal.target;
            if !is_shape(target, NodeKind::Not) {
                return Err(BuildError::wrong("The target is not a negation"));
            }
            let inner_is_compound = target
                .child(0)
                .is_some_and(|p| p.node.is_quantifier() || p.node.is_prop_kind() && !p.children.is_empty());
            let new = ctx.new_hypothesis();
            let intro = atomic(format!("{INTRO} {new}"))
                .with_success(format!("Property {new} added to the context"));
            let code = if inner_is_compound {
                atomic(PUSH_NEG.to_string())
                    .with_success("Negation pushed on the target")
                    .or_else(intro)
            } else {
                intro
            };
            Ok(BuiltStep::new(code))
        }
        [h] => {
            if !is_shape(h.math_type(), NodeKind::Not) {
                return Err(BuildError::wrong(format!("{} is not a negation", h.name())));
            }
            let h_name = h.name().to_string();
            let code = atomic(format!("{PUSH_NEG} at {h_name}"))
                .with_success(format!("Negation pushed on {h_name}"));
            Ok(BuiltStep::new(code))
        }
        _ => Err(BuildError::wrong("Select one negation")),
    }
}

fn iff(action: &UserAction, ctx: &mut BuildContext<'_>) -> Result<BuiltStep, BuildError> {
    let sel = ctx.selected(action)?;
    match sel.as_slice() {
        [] => {
            if !is_shape(&ctx.goal.target, NodeKind::Iff) {
                return Err(BuildError::wrong("The target is not an equivalence"));
            }
            let code = atomic(SPLIT.to_string()).with_success("Target split into two implications");
            Ok(BuiltStep::splitting(code, SubgoalKind::Iff))
        }
        [h] => {
            if !is_shape(h.math_type(), NodeKind::Iff) {
                return Err(BuildError::wrong(format!("{} is not an equivalence", h.name())));
            }
            let h_name = h.name().to_string();
            let first = ctx.new_hypothesis();
            let second = ctx.new_hypothesis();
            let code = atomic(format!("{HAVE} {first} := {h_name}.mp"))
                .then(atomic(format!("{HAVE} {second} := {h_name}.mpr")))
                .with_success(format!("Implications {first} and {second} added"));
            Ok(BuiltStep::new(code))
        }
        _ => Err(BuildError::wrong("Select one equivalence")),
    }
}

fn equal(action: &UserAction, ctx: &mut BuildContext<'_>) -> Result<BuiltStep, BuildError> {
    let sel = ctx.selected(action)?;
    let is_eq = |c: &ContextMathObject| is_shape(c.math_type(), NodeKind::Equals) || is_shape(c.math_type(), NodeKind::Iff);
    match sel.as_slice() {
        [] => {
            if !is_shape(&ctx.goal.target, NodeKind::Equals) {
                return Err(BuildError::wrong("The target is not an equality"));
            }
            let code = atomic(REFL.to_string()).with_success("Target proved by reflexivity");
            Ok(BuiltStep::new(code))
        }
        [h] => {
            if !is_eq(h) {
                return Err(BuildError::wrong(format!("{} is not an equality", h.name())));
            }
            let h_name = h.name();
            let msg = format!("Target rewritten using {h_name}");
            let code = atomic(format!("{REWRITE} {h_name}"))
                .with_success(msg.clone())
                .or_else(atomic(format!("{REWRITE} ← {h_name}")).with_success(msg));
            Ok(BuiltStep::new(code))
        }
        [a, b] => {
            let (h, k) = if is_eq(a) {
                (a, b)
            } else if is_eq(b) {
                (b, a)
            } else {
                return Err(BuildError::wrong("Select an equality"));
            };
            let (h_name, k_name) = (h.name().to_string(), k.name().to_string());
            let rewritten = primed_name(&k_name, &ctx.names());
            let msg = format!("Property {k_name} rewritten using {h_name}");
            let rewrite = |arrow: &str| {
                TacticCode::and_then_all(vec![
                    atomic(format!("{HAVE} {rewritten} := {k_name}")),
                    atomic(format!("{REWRITE} {arrow}{h_name} at {rewritten}")),
                    atomic(format!("{CLEAR} {k_name}")),
                ])
                .with_success(msg.clone())
            };
            let code = rewrite("").or_else(rewrite("← "));
            Ok(BuiltStep::new(code))
        }
        _ => Err(BuildError::wrong("Select an equality and at most one property")),
    }
}

fn contradiction(action: &UserAction, ctx: &mut BuildContext<'_>) -> Result<BuiltStep, BuildError> {
    let sel = ctx.selected(action)?;
    match sel.as_slice() {
        [] => {
            let new = ctx.new_hypothesis();
            let code = atomic(format!("{BY_CONTRADICTION} {new}")).with_success(format!(
                "Proof by contradiction: {new} assumes the negation of the target"
            ));
            Ok(BuiltStep::new(code))
        }
        [a, b] => {
            let (a, b) = (a.name(), b.name());
            let msg = format!("Contradiction between {a} and {b}");
            let code = atomic(format!("{EXACT} {ABSURD} {a} {b}"))
                .or_else(atomic(format!("{EXACT} {ABSURD} {b} {a}")))
                .with_success(msg);
            Ok(BuiltStep::new(code))
        }
        _ => Err(BuildError::wrong("Select no property or two contradictory properties")),
    }
}

fn cases(action: &UserAction, ctx: &mut BuildContext<'_>) -> Result<BuiltStep, BuildError> {
    if !action.selection.is_empty() {
        return Err(BuildError::wrong("Proof by cases does not use a selection"));
    }
    let Some(prop) = action.text_input(0) else {
        return Err(BuildError::NeedsMoreInput(InputRequest::text(
            "Enter the property to split on",
        )));
    };
    let new = ctx.new_hypothesis();
    let code = atomic(format!("{BY_CASES} {new} : ({prop})"))
        .with_success(format!("Proof by cases on {prop}"));
    Ok(BuiltStep::splitting(code, SubgoalKind::Cases))
}

fn assumption(action: &UserAction, ctx: &mut BuildContext<'_>) -> Result<BuiltStep, BuildError> {
    let sel = ctx.selected(action)?;
    match sel.as_slice() {
        [] => {
            let code = TacticCode::or_else_all(
                atomic(ASSUMPTION.to_string()),
                [
                    atomic(CONTRADICTION.to_string()),
                    TacticCode::solve1(atomic(NORM_NUM.to_string())),
                    atomic(LINARITH.to_string()),
                ],
            )
            .with_success("Target solved");
            Ok(BuiltStep::new(code))
        }
        [h] => {
            let h_name = h.name();
            let code = atomic(format!("{EXACT} {h_name}"))
                .with_success(format!("Target solved by {h_name}"));
            Ok(BuiltStep::new(code))
        }
        _ => Err(BuildError::wrong("Select at most one property")),
    }
}

fn raw_code(action: &UserAction) -> Result<BuiltStep, BuildError> {
    let Some(text) = action.text_input(0) else {
        return Err(BuildError::NeedsMoreInput(InputRequest::text("Enter prover code")));
    };
    Ok(BuiltStep::new(atomic(text).with_success("Code applied")))
}

fn apply_statement(
    statement: &str,
    action: &UserAction,
    ctx: &mut BuildContext<'_>,
) -> Result<BuiltStep, BuildError> {
    let sel = ctx.selected(action)?;
    let names: Vec<String> = sel.iter().map(|c| c.name().to_string()).collect();
    match names.as_slice() {
        [] => {
            let code = atomic(format!("{REWRITE} {statement}"))
                .with_success(format!("Definition {statement} applied to the target"))
                .or_else(
                    atomic(format!("{APPLY} {statement}"))
                        .with_success(format!("Theorem {statement} applied to the target")),
                );
            Ok(BuiltStep::new(code))
        }
        [h] => {
            let new = ctx.new_hypothesis();
            let code = atomic(format!("{REWRITE} {statement} at {h}"))
                .with_success(format!("Definition {statement} applied to {h}"))
                .or_else(
                    atomic(format!("{HAVE} {new} := {statement} {h}"))
                        .with_success(format!("Property {new} added")),
                );
            Ok(BuiltStep::new(code))
        }
        args => {
            let new = ctx.new_hypothesis();
            let code = atomic(format!("{HAVE} {new} := {statement} {}", args.join(" ")))
                .with_success(format!("Property {new} added"));
            Ok(BuiltStep::new(code))
        }
    }
}
