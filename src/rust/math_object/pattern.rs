// SPDX-FileCopyrightText: 2025 ECHIDNA Project Team
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Patterns over math objects
//!
//! A pattern is a math object with numbered holes. Matching threads an
//! [`Assignment`] of holes and pairs the pattern's bound variables with
//! the object's, so `∀ x, P x` and `∀ y, P y` match the same pattern.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::{Info, MathObject, NodeKind};

/// Metavariable number → matched object
pub type Assignment = BTreeMap<usize, MathObject>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Pattern {
    /// Same node kind, same arity, children matching; `name` constrains
    /// constants and local constants when set
    Node {
        node: NodeKind,
        name: Option<String>,
        children: Vec<Pattern>,
    },
    /// Numbered hole, optionally constrained by a pattern on its math type
    Metavar {
        number: usize,
        math_type: Option<Box<Pattern>>,
    },
    /// Bound variable of the pattern, paired with one of the object's
    Bound(u32),
    /// An object matched up to α-equivalence
    Exact(MathObject),
}

impl Pattern {
    pub fn metavar(number: usize) -> Self {
        Pattern::Metavar {
            number,
            math_type: None,
        }
    }

    pub fn typed_metavar(number: usize, math_type: Pattern) -> Self {
        Pattern::Metavar {
            number,
            math_type: Some(Box::new(math_type)),
        }
    }

    pub fn node(node: NodeKind, children: Vec<Pattern>) -> Self {
        Pattern::Node {
            node,
            name: None,
            children,
        }
    }

    pub fn constant(name: impl Into<String>) -> Self {
        Pattern::Node {
            node: NodeKind::Constant,
            name: Some(name.into()),
            children: vec![],
        }
    }

    /// Binder whose variable has type `var_type` and is referenced as `Bound(var)`
    pub fn binder(node: NodeKind, var_type: Pattern, var: u32, body: Pattern) -> Self {
        Pattern::node(node, vec![var_type, Pattern::Bound(var), body])
    }

    /// Match `obj`, returning the assignment of every metavariable
    pub fn matches(&self, obj: &MathObject) -> Option<Assignment> {
        let mut assignment = Assignment::new();
        let mut pairs = Vec::new();
        self.match_with(obj, &mut assignment, &mut pairs)
            .then_some(assignment)
    }

    /// Match and extend an existing assignment
    pub fn match_into(&self, obj: &MathObject, assignment: &mut Assignment) -> bool {
        let mut scratch = assignment.clone();
        let mut pairs = Vec::new();
        if self.match_with(obj, &mut scratch, &mut pairs) {
            *assignment = scratch;
            true
        } else {
            false
        }
    }

    fn match_with(
        &self,
        obj: &MathObject,
        assignment: &mut Assignment,
        pairs: &mut Vec<(u32, u32)>,
    ) -> bool {
        match self {
            Pattern::Exact(expected) => expected.alpha_eq(obj),

            Pattern::Bound(var) => {
                let Some(number) = obj.bound_var_number().filter(|_| obj.is_bound_var()) else {
                    return false;
                };
                pairs
                    .iter()
                    .rev()
                    .find(|(p, _)| p == var)
                    .is_some_and(|(_, o)| *o == number)
            }

            Pattern::Metavar { number, math_type } => {
                if let Some(type_pattern) = math_type {
                    if !type_pattern.match_with(obj.math_type(), assignment, pairs) {
                        return false;
                    }
                }
                match assignment.get(number) {
                    Some(previous) => previous.alpha_eq(obj),
                    None => {
                        assignment.insert(*number, obj.clone());
                        true
                    }
                }
            }

            Pattern::Node {
                node,
                name,
                children,
            } => {
                if obj.node != *node || obj.children.len() != children.len() {
                    return false;
                }
                if let Some(name) = name {
                    if obj.name() != Some(name.as_str()) {
                        return false;
                    }
                }

                let pushed = match (children.get(1), obj.bound_variable()) {
                    (Some(Pattern::Bound(var)), Some(bound)) if node.is_binder() => {
                        match bound.bound_var_number() {
                            Some(number) => {
                                pairs.push((*var, number));
                                true
                            }
                            None => return false,
                        }
                    }
                    _ => false,
                };
                let ok = children
                    .iter()
                    .zip(&obj.children)
                    .all(|(p, o)| p.match_with(o, assignment, pairs));
                if pushed {
                    pairs.pop();
                }
                ok
            }
        }
    }

    /// Build the object this pattern denotes under `assignment`
    ///
    /// Returns `None` when a metavariable is unassigned.
    pub fn apply_matching(&self, assignment: &Assignment) -> Option<MathObject> {
        self.instantiate(assignment, &mut Vec::new())
    }

    fn instantiate(
        &self,
        assignment: &Assignment,
        scope: &mut Vec<(u32, MathObject)>,
    ) -> Option<MathObject> {
        match self {
            Pattern::Exact(obj) => Some(obj.clone()),
            Pattern::Metavar { number, .. } => assignment.get(number).cloned(),
            Pattern::Bound(var) => {
                let var_type = scope
                    .iter()
                    .rev()
                    .find(|(v, _)| v == var)
                    .map(|(_, t)| t.clone())?;
                let mut bound = MathObject::bound_var("", *var, var_type);
                bound.info.name = None;
                Some(bound)
            }
            Pattern::Node {
                node,
                name,
                children,
            } => {
                let info = Info {
                    name: name.clone(),
                    ..Info::default()
                };
                let mut built = Vec::with_capacity(children.len());
                let mut pushed = false;
                for (i, child) in children.iter().enumerate() {
                    if node.is_binder() && i == 1 {
                        if let (Pattern::Bound(var), Some(var_type)) = (child, built.first()) {
                            scope.push((*var, MathObject::clone(var_type)));
                            pushed = true;
                        }
                    }
                    let obj = child.instantiate(assignment, scope);
                    match obj {
                        Some(o) => built.push(o),
                        None => {
                            if pushed {
                                scope.pop();
                            }
                            return None;
                        }
                    }
                }
                if pushed {
                    scope.pop();
                }
                let math_type = if node.is_prop_kind() {
                    Some(MathObject::prop())
                } else {
                    None
                };
                Some(MathObject::new(*node, info, built, math_type))
            }
        }
    }
}
