// SPDX-FileCopyrightText: 2025 ECHIDNA Project Team
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Proof-state extraction from the prover's introspection dumps
//!
//! `hypo_analysis` prints the context of every goal, `targets_analysis`
//! prints the goals themselves. [`parse_proof_state`] turns both into a
//! [`ProofState`]: local constants are interned by identifier for the
//! duration of one parse, binder variables become numbered bound
//! variables, and bound variables are named against the goal's context.
//! Malformed records are skipped with a [`ParseWarning`].

pub mod tree;

use std::collections::{BTreeSet, HashMap};
use tracing::{debug, warn};

use crate::config::NamingConfig;
use crate::error::{ParseWarning, StepError};
use crate::math_object::naming::{fresh_name, name_bound_vars};
use crate::math_object::{Info, MathObject, NodeKind};
use crate::proof_state::{ContextMathObject, Goal, ProofState};
use tree::{parse_record, split_top_level, RawNode, RawRecord};

/// Header printed by the context analysis tactic
pub const CONTEXT_HEADER: &str = "context:";
/// Header printed by the target analysis tactic
pub const TARGETS_HEADER: &str = "targets:";
/// Printed instead of the targets once the proof is complete
pub const NO_GOALS: &str = "no goals";

/// A decoded proof state together with the problems met on the way
#[derive(Debug, Clone, Default)]
pub struct ParsedState {
    pub state: ProofState,
    pub warnings: Vec<ParseWarning>,
}

impl ParsedState {
    /// A state with no goals is only trusted when nothing was skipped
    pub fn into_result(self) -> Result<ProofState, StepError> {
        if self.state.goals.is_empty() && !self.warnings.is_empty() {
            let reasons: Vec<String> = self.warnings.iter().map(|w| w.to_string()).collect();
            return Err(StepError::Decoding(reasons.join("; ")));
        }
        Ok(self.state)
    }
}

/// Builds math objects from raw trees
///
/// One builder serves every goal of a state, so a local constant seen from
/// several goals decodes to the same object and bound-variable numbers
/// never collide.
struct Builder<'a> {
    interned: HashMap<String, MathObject>,
    /// identifier → (bound var number, type) for the binders being traversed
    scope: Vec<(String, u32, MathObject)>,
    next_bound: &'a mut u32,
    warnings: &'a mut Vec<ParseWarning>,
}

impl<'a> Builder<'a> {
    fn new(next_bound: &'a mut u32, warnings: &'a mut Vec<ParseWarning>) -> Self {
        Builder {
            interned: HashMap::new(),
            scope: Vec::new(),
            next_bound,
            warnings,
        }
    }

    fn info(&mut self, raw: &RawNode) -> Info {
        let mut info = Info::default();
        for (k, v) in &raw.info {
            if !info.set(k, v) {
                debug!("ignoring info key {} on {}", k, raw.tag);
            }
        }
        info
    }

    fn build(&mut self, raw: &RawNode) -> MathObject {
        let Some(kind) = NodeKind::from_tag(&raw.tag) else {
            warn!("unknown node tag {}", raw.tag);
            self.warnings
                .push(ParseWarning::new(format!("unknown node tag {}", raw.tag), &raw.tag));
            let children = raw.children.iter().map(|c| self.build(c)).collect();
            return MathObject::new(NodeKind::RawLeanCode, Info::named(&raw.tag), children, None);
        };

        if let Some(expected) = kind.arity() {
            if expected != raw.children.len() {
                self.warnings.push(ParseWarning::new(
                    format!(
                        "{} expects {} children, found {}",
                        raw.tag,
                        expected,
                        raw.children.len()
                    ),
                    &raw.tag,
                ));
            }
        }

        match kind {
            NodeKind::LocalConstant => self.local_constant(raw),
            k if k.is_binder() && raw.children.len() == 3 => self.binder(k, raw),
            _ => {
                let info = self.info(raw);
                let mut children: Vec<MathObject> =
                    raw.children.iter().map(|c| self.build(c)).collect();
                infer_number_types(&mut children);
                let math_type = inferred_type(kind, &children);
                MathObject::new(kind, info, children, math_type)
            }
        }
    }

    fn local_constant(&mut self, raw: &RawNode) -> MathObject {
        let info = self.info(raw);
        let identifier = info.identifier.clone();

        if let Some(id) = &identifier {
            if let Some((_, number, var_type)) = self.scope.iter().rev().find(|(i, _, _)| i == id) {
                let name = info.name.clone().unwrap_or_default();
                return MathObject::bound_var(name, *number, var_type.clone());
            }
        }

        match (&identifier, raw.children.first()) {
            (Some(id), _) if self.interned.contains_key(id) => {
                self.interned.get(id).cloned().unwrap_or_else(|| {
                    MathObject::new(NodeKind::LocalConstant, info.clone(), vec![], None)
                })
            }
            (id, Some(type_node)) => {
                let math_type = self.build(type_node);
                let obj = MathObject::new(NodeKind::LocalConstant, info, vec![], Some(math_type));
                if let Some(id) = id {
                    self.interned.insert(id.clone(), obj.clone());
                }
                obj
            }
            (_, None) => MathObject::new(NodeKind::LocalConstant, info, vec![], None),
        }
    }

    fn binder(&mut self, kind: NodeKind, raw: &RawNode) -> MathObject {
        let info = self.info(raw);
        let var_type = self.build(&raw.children[0]);
        let var_info = self.info(&raw.children[1]);

        let number = *self.next_bound;
        *self.next_bound += 1;
        let mut var = MathObject::bound_var(
            var_info.name.clone().unwrap_or_default(),
            number,
            var_type.clone(),
        );
        var.info.binder_info = var_info.binder_info.clone();

        let pushed = match var_info.identifier {
            Some(id) => {
                self.scope.push((id, number, var_type.clone()));
                true
            }
            None => false,
        };
        let body = self.build(&raw.children[2]);
        if pushed {
            self.scope.pop();
        }

        let math_type = if kind == NodeKind::Lambda {
            body.has_math_type()
                .then(|| MathObject::function_type(var_type.clone(), body.math_type().clone()))
        } else {
            Some(MathObject::prop())
        };
        MathObject::new(kind, info, vec![var_type, var, body], math_type)
    }

    /// A context entry from an `OBJECT`/`PROPERTY` record
    fn context_entry(&mut self, record: &RawRecord) -> Option<MathObject> {
        let mut info = self.info(&record.head);
        if info.name.is_none() {
            self.warnings
                .push(ParseWarning::new("context entry without a name", &record.head.tag));
            return None;
        }
        let math_type = self.build(&record.tail);
        if info.identifier.is_none() {
            info.identifier = info.name.clone();
        }
        let obj = MathObject::new(NodeKind::LocalConstant, info, vec![], Some(math_type));
        if let Some(id) = obj.identifier() {
            self.interned.insert(id.to_string(), obj.clone());
        }
        Some(obj)
    }
}

fn is_arithmetic(kind: NodeKind) -> bool {
    matches!(
        kind,
        NodeKind::Sum
            | NodeKind::Difference
            | NodeKind::Mult
            | NodeKind::Div
            | NodeKind::Power
            | NodeKind::Minus
    )
}

fn inferred_type(kind: NodeKind, children: &[MathObject]) -> Option<MathObject> {
    if kind.is_prop_kind() {
        return Some(MathObject::prop());
    }
    if kind.is_type_kind() && kind != NodeKind::Type && kind != NodeKind::Prop {
        return Some(MathObject::type_sort());
    }
    match kind {
        k if is_arithmetic(k) => children
            .iter()
            .find(|c| c.has_math_type())
            .map(|c| c.math_type().clone()),
        NodeKind::Application => {
            let f_type = children.first()?.math_type();
            match f_type.node {
                NodeKind::Function | NodeKind::Sequence => f_type.children.get(1).cloned(),
                _ => None,
            }
        }
        NodeKind::Union | NodeKind::Inter | NodeKind::SetDifference | NodeKind::Complement => {
            children
                .iter()
                .find(|c| c.has_math_type())
                .map(|c| c.math_type().clone())
        }
        _ => None,
    }
}

/// Give untyped numerals the type of a typed sibling
fn infer_number_types(children: &mut [MathObject]) {
    let sibling_type = children
        .iter()
        .filter(|c| c.node != NodeKind::Number && c.has_math_type())
        .map(|c| c.math_type().clone())
        .find(|t| t.node != NodeKind::Prop);
    if let Some(t) = sibling_type {
        for c in children.iter_mut() {
            assign_number_type(c, &t);
        }
    }
}

fn assign_number_type(obj: &mut MathObject, t: &MathObject) {
    if obj.has_math_type() {
        return;
    }
    if obj.node == NodeKind::Number || is_arithmetic(obj.node) {
        obj.math_type = Some(Box::new(t.clone()));
        for c in obj.children.iter_mut() {
            assign_number_type(c, t);
        }
    }
}

/// Strip a header line such as `context:` and return the rest
fn strip_header<'t>(text: &'t str, header: &str) -> &'t str {
    let trimmed = text.trim_start();
    trimmed.strip_prefix(header).unwrap_or(trimmed)
}

/// Context blocks of `hypo_analysis`, one per goal
fn context_blocks(hypo: &str) -> Vec<Vec<&str>> {
    let body = strip_header(hypo, CONTEXT_HEADER);
    split_top_level(body)
        .into_iter()
        .map(|block| {
            block
                .lines()
                .map(str::trim)
                .filter(|l| !l.is_empty())
                .collect()
        })
        .collect()
}

/// Target records of `targets_analysis`; empty for `no goals`
fn target_records(targets: &str) -> Vec<&str> {
    let body = strip_header(targets, TARGETS_HEADER).trim();
    if body.is_empty() || body.starts_with(NO_GOALS) {
        return Vec::new();
    }
    split_top_level(body)
        .into_iter()
        .map(str::trim)
        .filter(|r| !r.is_empty())
        .collect()
}

/// Decode the two analysis dumps into a proof state
pub fn parse_proof_state(hypo: &str, targets: &str, naming: &NamingConfig) -> ParsedState {
    let mut warnings = Vec::new();
    let mut next_bound = 0u32;
    let blocks = context_blocks(hypo);
    let mut goals = Vec::new();
    let mut builder = Builder::new(&mut next_bound, &mut warnings);

    for (i, record_text) in target_records(targets).into_iter().enumerate() {
        let Some(target_record) = parse_record(record_text) else {
            warn!("skipping malformed target record");
            builder
                .warnings
                .push(ParseWarning::new("malformed target record", record_text));
            continue;
        };

        let block = blocks
            .get(i)
            .or_else(|| blocks.last())
            .cloned()
            .unwrap_or_default();

        let mut context = Vec::new();
        for line in block {
            match parse_record(line) {
                Some(record) => {
                    if let Some(obj) = builder.context_entry(&record) {
                        context.push(obj);
                    }
                }
                None => {
                    warn!("skipping malformed context record");
                    builder
                        .warnings
                        .push(ParseWarning::new("malformed context record", line));
                }
            }
        }
        let target = builder.build(&target_record.tail);
        let target_pp = target_record.head.info("pp_type").map(str::to_string);

        goals.push(finish_goal(context, target, target_pp, naming));
    }

    for w in &warnings {
        debug!("parse warning: {}", w);
    }
    ParsedState {
        state: ProofState::new(goals),
        warnings,
    }
}

/// Order the context, make names unique and name bound variables
fn finish_goal(
    entries: Vec<MathObject>,
    mut target: MathObject,
    target_pp: Option<String>,
    naming: &NamingConfig,
) -> Goal {
    let (mut objects, props): (Vec<_>, Vec<_>) =
        entries.into_iter().partition(|o| !o.math_type().is_prop());
    objects.extend(props);

    // Shadowed entries keep their identifier but get a fresh display name
    let mut seen = BTreeSet::new();
    let mut renames = Vec::new();
    for obj in objects.iter_mut() {
        let name = obj.name().unwrap_or_default().to_string();
        if !seen.insert(name.clone()) {
            let all: BTreeSet<String> = seen.clone();
            let fresh = fresh_name(&name, &all, naming.allow_double_prime);
            seen.insert(fresh.clone());
            obj.info.name = Some(fresh.clone());
            if let Some(id) = obj.identifier() {
                renames.push((id.to_string(), fresh));
            }
        }
    }
    for (id, name) in &renames {
        rename_local_constant(&mut target, id, name);
        for obj in objects.iter_mut() {
            if let Some(t) = obj.math_type.as_deref_mut() {
                rename_local_constant(t, id, name);
            }
        }
    }

    let names: BTreeSet<String> = seen;
    for obj in objects.iter_mut() {
        if let Some(t) = obj.math_type.as_deref_mut() {
            name_bound_vars(t, &names, naming);
        }
    }
    name_bound_vars(&mut target, &names, naming);

    Goal {
        context: objects.into_iter().map(ContextMathObject::new).collect(),
        target,
        target_pp,
    }
}

fn rename_local_constant(obj: &mut MathObject, identifier: &str, name: &str) {
    if obj.node == NodeKind::LocalConstant && obj.identifier() == Some(identifier) {
        obj.info.name = Some(name.to_string());
    }
    for c in obj.children.iter_mut() {
        rename_local_constant(c, identifier, name);
    }
}

/// Decode a single introspection tree, as produced by
/// [`MathObject::to_introspection`]
pub fn parse_math_object(text: &str, naming: &NamingConfig) -> Result<MathObject, ParseWarning> {
    let (rest, raw) = tree::node(text.trim())
        .map_err(|e| ParseWarning::new(format!("malformed tree: {e}"), text))?;
    if !rest.trim().is_empty() {
        return Err(ParseWarning::new("trailing input after tree", rest));
    }
    let mut next_bound = 0;
    let mut warnings = Vec::new();
    let mut obj = Builder::new(&mut next_bound, &mut warnings).build(&raw);
    let free = obj.local_constant_names();
    name_bound_vars(&mut obj, &free, naming);
    Ok(obj)
}
