// SPDX-FileCopyrightText: 2025 ECHIDNA Project Team
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Tactic code trees
//!
//! A step's tactics form a small tree of combinators. Alternatives
//! (`or_else`) are numbered and instrumented with a trace so that, once
//! the prover has run the code, the alternative that actually fired can be
//! selected and the effective code recorded.

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use tracing::warn;

use super::catalogue;

/// Combinator of a [`TacticCode`] node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Combinator {
    Atomic { text: String },
    AndThen { children: Vec<TacticCode> },
    OrElse {
        #[serde(deserialize_with = "alternatives")]
        children: Vec<TacticCode>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        number: Option<usize>,
    },
    Try { child: Box<TacticCode> },
    Solve1 { child: Box<TacticCode> },
    Focus { child: Box<TacticCode> },
    Iterate { child: Box<TacticCode> },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TacticCode {
    #[serde(flatten)]
    pub combinator: Combinator,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub success_msg: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_msg: Option<String>,
}

impl TacticCode {
    fn from_combinator(combinator: Combinator) -> Self {
        TacticCode {
            combinator,
            success_msg: None,
            error_msg: None,
        }
    }

    pub fn atomic(text: impl Into<String>) -> Self {
        Self::from_combinator(Combinator::Atomic { text: text.into() })
    }

    /// Sequence; nested sequences without messages are flattened
    pub fn and_then_all(codes: Vec<TacticCode>) -> Self {
        let mut children = Vec::new();
        for code in codes {
            match code.combinator {
                Combinator::AndThen { children: inner }
                    if code.success_msg.is_none() && code.error_msg.is_none() =>
                {
                    children.extend(inner)
                }
                combinator => children.push(TacticCode {
                    combinator,
                    success_msg: code.success_msg,
                    error_msg: code.error_msg,
                }),
            }
        }
        if children.len() == 1 {
            return children.remove(0);
        }
        Self::from_combinator(Combinator::AndThen { children })
    }

    pub fn then(self, other: TacticCode) -> Self {
        Self::and_then_all(vec![self, other])
    }

    /// Alternatives `first`, then `rest` in order; nested alternatives
    /// without messages are flattened
    pub fn or_else_all(first: TacticCode, rest: impl IntoIterator<Item = TacticCode>) -> Self {
        let mut children = Vec::new();
        for code in std::iter::once(first).chain(rest) {
            match code.combinator {
                Combinator::OrElse { children: inner, .. }
                    if code.success_msg.is_none() && code.error_msg.is_none() =>
                {
                    children.extend(inner)
                }
                combinator => children.push(TacticCode {
                    combinator,
                    success_msg: code.success_msg,
                    error_msg: code.error_msg,
                }),
            }
        }
        if children.len() == 1 {
            return children.remove(0);
        }
        Self::from_combinator(Combinator::OrElse {
            children,
            number: None,
        })
    }

    pub fn or_else(self, other: TacticCode) -> Self {
        Self::or_else_all(self, [other])
    }

    pub fn try_(child: TacticCode) -> Self {
        Self::from_combinator(Combinator::Try {
            child: Box::new(child),
        })
    }

    pub fn solve1(child: TacticCode) -> Self {
        Self::from_combinator(Combinator::Solve1 {
            child: Box::new(child),
        })
    }

    pub fn focus(child: TacticCode) -> Self {
        Self::from_combinator(Combinator::Focus {
            child: Box::new(child),
        })
    }

    pub fn iterate(child: TacticCode) -> Self {
        Self::from_combinator(Combinator::Iterate {
            child: Box::new(child),
        })
    }

    pub fn with_success(mut self, msg: impl Into<String>) -> Self {
        self.success_msg = Some(msg.into());
        self
    }

    pub fn with_error(mut self, msg: impl Into<String>) -> Self {
        self.error_msg = Some(msg.into());
        self
    }

    fn children(&self) -> Vec<&TacticCode> {
        match &self.combinator {
            Combinator::Atomic { .. } => vec![],
            Combinator::AndThen { children } | Combinator::OrElse { children, .. } => {
                children.iter().collect()
            }
            Combinator::Try { child }
            | Combinator::Solve1 { child }
            | Combinator::Focus { child }
            | Combinator::Iterate { child } => vec![child.as_ref()],
        }
    }

    fn map_children(self, f: &mut impl FnMut(TacticCode) -> TacticCode) -> TacticCode {
        let combinator = match self.combinator {
            Combinator::Atomic { text } => Combinator::Atomic { text },
            Combinator::AndThen { children } => Combinator::AndThen {
                children: children.into_iter().map(&mut *f).collect(),
            },
            Combinator::OrElse { children, number } => Combinator::OrElse {
                children: children.into_iter().map(&mut *f).collect(),
                number,
            },
            Combinator::Try { child } => Combinator::Try {
                child: Box::new(f(*child)),
            },
            Combinator::Solve1 { child } => Combinator::Solve1 {
                child: Box::new(f(*child)),
            },
            Combinator::Focus { child } => Combinator::Focus {
                child: Box::new(f(*child)),
            },
            Combinator::Iterate { child } => Combinator::Iterate {
                child: Box::new(f(*child)),
            },
        };
        TacticCode {
            combinator,
            success_msg: self.success_msg,
            error_msg: self.error_msg,
        }
    }

    /// Prover source; `exclude_no_meta_vars` drops the metavariable probes
    pub fn to_source(&self, exclude_no_meta_vars: bool) -> String {
        match &self.combinator {
            Combinator::Atomic { text } => {
                if exclude_no_meta_vars && text == catalogue::NO_META_VARS {
                    String::new()
                } else {
                    text.clone()
                }
            }
            Combinator::AndThen { children } => children
                .iter()
                .map(|c| c.to_source(exclude_no_meta_vars))
                .filter(|s| !s.is_empty())
                .collect::<Vec<_>>()
                .join(", "),
            Combinator::OrElse { children, .. } => children
                .iter()
                .map(|c| format!("`[{}]", c.to_source(exclude_no_meta_vars)))
                .collect::<Vec<_>>()
                .join(" <|> "),
            Combinator::Try { child } => {
                format!("try {{ {} }}", child.to_source(exclude_no_meta_vars))
            }
            Combinator::Solve1 { child } => {
                format!("solve1 {{ {} }}", child.to_source(exclude_no_meta_vars))
            }
            Combinator::Focus { child } => {
                format!("focus {{ {} }}", child.to_source(exclude_no_meta_vars))
            }
            Combinator::Iterate { child } => {
                format!("iterate {{ {} }}", child.to_source(exclude_no_meta_vars))
            }
        }
    }

    pub fn has_or_else(&self) -> bool {
        matches!(self.combinator, Combinator::OrElse { .. })
            || self.children().into_iter().any(TacticCode::has_or_else)
    }

    /// Atomic tactic texts in order
    pub fn atoms(&self) -> Vec<&str> {
        match &self.combinator {
            Combinator::Atomic { text } => vec![text.as_str()],
            _ => self.children().into_iter().flat_map(TacticCode::atoms).collect(),
        }
    }

    /// Append the metavariable probe after every `apply`/`have`
    pub fn add_no_meta_vars(self) -> TacticCode {
        let needs_probe = matches!(
            &self.combinator,
            Combinator::Atomic { text }
                if catalogue::META_VAR_SOURCES.iter().any(|t| text.trim_start().starts_with(t))
        );
        match self.combinator {
            Combinator::Atomic { text } if needs_probe => TacticCode {
                combinator: Combinator::AndThen {
                    children: vec![
                        TacticCode::atomic(text),
                        TacticCode::atomic(catalogue::NO_META_VARS),
                    ],
                },
                success_msg: self.success_msg,
                error_msg: self.error_msg,
            },
            combinator => TacticCode {
                combinator,
                success_msg: self.success_msg,
                error_msg: self.error_msg,
            }
            .map_children(&mut TacticCode::add_no_meta_vars),
        }
    }

    /// Number the `or_else` nodes and return `(numbered, instrumented)`
    ///
    /// The instrumented copy traces `EFFECTIVE CODE n°<node>.<alt>` after
    /// each alternative; the numbered tree is kept to select alternatives.
    pub fn instrument(self) -> (TacticCode, TacticCode) {
        let mut counter = 0;
        let numbered = self.number_or_else(&mut counter);
        let instrumented = numbered.clone().with_probes();
        (numbered, instrumented)
    }

    fn number_or_else(self, counter: &mut usize) -> TacticCode {
        let mut code = self;
        if let Combinator::OrElse { number, .. } = &mut code.combinator {
            *number = Some(*counter);
            *counter += 1;
        }
        code.map_children(&mut |c| c.number_or_else(counter))
    }

    fn with_probes(self) -> TacticCode {
        let code = self.map_children(&mut TacticCode::with_probes);
        match code.combinator {
            Combinator::OrElse {
                children,
                number: Some(n),
            } => {
                let children = children
                    .into_iter()
                    .enumerate()
                    .map(|(i, alt)| {
                        let probe = TacticCode::atomic(catalogue::effective_code_probe(n, i));
                        TacticCode::from_combinator(Combinator::AndThen {
                            children: vec![alt, probe],
                        })
                    })
                    .collect();
                TacticCode {
                    combinator: Combinator::OrElse {
                        children,
                        number: Some(n),
                    },
                    success_msg: code.success_msg,
                    error_msg: code.error_msg,
                }
            }
            combinator => TacticCode {
                combinator,
                success_msg: code.success_msg,
                error_msg: code.error_msg,
            },
        }
    }

    /// Replace `or_else` node `node` by its alternative `alt`
    ///
    /// An out-of-range `alt` selects the first alternative.
    pub fn select_or_else(self, node: usize, alt: usize) -> TacticCode {
        match self.combinator {
            Combinator::OrElse {
                children,
                number: Some(n),
            } if n == node => {
                let alt = if alt < children.len() {
                    alt
                } else {
                    warn!("or_else node {} has no alternative {}", node, alt);
                    0
                };
                pick_alternative(children, alt, self.success_msg, self.error_msg)
            }
            combinator => TacticCode {
                combinator,
                success_msg: self.success_msg,
                error_msg: self.error_msg,
            }
            .map_children(&mut |c| c.select_or_else(node, alt)),
        }
    }

    fn first_or_else(&self) -> Option<usize> {
        if let Combinator::OrElse { number, .. } = &self.combinator {
            return Some(number.unwrap_or(usize::MAX));
        }
        self.children().into_iter().find_map(TacticCode::first_or_else)
    }

    /// Effective code given the probes reported by the prover
    ///
    /// Resolves `or_else` nodes outermost first; a node with no probe falls
    /// back to its first alternative.
    pub fn resolve_effective(&self, probes: &[(usize, usize)]) -> TacticCode {
        let fired: BTreeMap<usize, usize> = probes.iter().copied().collect();
        let mut code = self.clone();
        while let Some(node) = code.first_or_else() {
            if node == usize::MAX {
                // Never numbered: nothing was instrumented
                code = code.select_unnumbered();
                continue;
            }
            let alt = fired.get(&node).copied().unwrap_or_else(|| {
                warn!("no effective code reported for or_else node {}", node);
                0
            });
            code = code.select_or_else(node, alt);
        }
        code
    }

    fn select_unnumbered(self) -> TacticCode {
        match self.combinator {
            Combinator::OrElse {
                children,
                number: None,
            } => pick_alternative(children, 0, self.success_msg, self.error_msg),
            combinator => TacticCode {
                combinator,
                success_msg: self.success_msg,
                error_msg: self.error_msg,
            }
            .map_children(&mut TacticCode::select_unnumbered),
        }
    }

    /// Success message of the alternative whose source starts the effective
    /// source (or one of its `, `-separated tails), else the root's message
    pub fn success_message_for(&self, effective_source: &str) -> Option<String> {
        let mut tails = vec![effective_source];
        let mut rest = effective_source;
        while let Some(i) = rest.find(", ") {
            rest = &rest[i + 2..];
            tails.push(rest);
        }

        let mut found = None;
        self.visit_alternatives(&mut |alt| {
            if found.is_some() {
                return;
            }
            if let Some(msg) = &alt.success_msg {
                let src = alt.to_source(true);
                if !src.is_empty() && tails.iter().any(|t| t.starts_with(&src)) {
                    found = Some(msg.clone());
                }
            }
        });
        found.or_else(|| self.success_msg.clone())
    }

    fn visit_alternatives<'a>(&'a self, f: &mut impl FnMut(&'a TacticCode)) {
        if let Combinator::OrElse { children, .. } = &self.combinator {
            for c in children {
                f(c);
            }
        }
        for c in self.children() {
            c.visit_alternatives(f);
        }
    }

    /// First error message found in the tree
    pub fn error_message(&self) -> Option<String> {
        if let Some(msg) = &self.error_msg {
            return Some(msg.clone());
        }
        self.children().into_iter().find_map(TacticCode::error_message)
    }
}

/// Alternative `alt` inheriting the node's messages; no alternative at all
/// leaves an empty sequence
/// `or_else` needs at least one alternative
fn alternatives<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<TacticCode>, D::Error> {
    let children = Vec::<TacticCode>::deserialize(deserializer)?;
    if children.is_empty() {
        return Err(serde::de::Error::invalid_length(0, &"at least one alternative"));
    }
    Ok(children)
}

fn pick_alternative(
    mut children: Vec<TacticCode>,
    alt: usize,
    success_msg: Option<String>,
    error_msg: Option<String>,
) -> TacticCode {
    if alt >= children.len() {
        return TacticCode {
            combinator: Combinator::AndThen { children: Vec::new() },
            success_msg,
            error_msg,
        };
    }
    let mut chosen = children.swap_remove(alt);
    if chosen.success_msg.is_none() {
        chosen.success_msg = success_msg;
    }
    if chosen.error_msg.is_none() {
        chosen.error_msg = error_msg;
    }
    chosen
}
