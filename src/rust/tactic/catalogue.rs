// SPDX-FileCopyrightText: 2025 ECHIDNA Project Team
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Prover tactic names and message texts
//!
//! The driver composes these strings but never interprets them.

pub const INTRO: &str = "intro";
pub const APPLY: &str = "apply";
pub const HAVE: &str = "have";
pub const EXACT: &str = "exact";
pub const USE: &str = "use";
pub const CASES: &str = "cases";
pub const BY_CASES: &str = "by_cases";
pub const BY_CONTRADICTION: &str = "by_contradiction";
pub const SPLIT: &str = "split";
pub const LEFT: &str = "left";
pub const RIGHT: &str = "right";
pub const REWRITE: &str = "rw";
pub const CLEAR: &str = "clear";
pub const REFL: &str = "refl";
pub const PUSH_NEG: &str = "push_neg";
pub const ASSUMPTION: &str = "assumption";
pub const CONTRADICTION: &str = "contradiction";
pub const NORM_NUM: &str = "norm_num";
pub const LINARITH: &str = "linarith";
pub const ABSURD: &str = "absurd";
pub const AND_INTRO: &str = "and.intro";
pub const SKIP: &str = "skip";

/// Fails when the goal still contains unassigned metavariables
pub const NO_META_VARS: &str = "no_meta_vars";

/// Prints the context of every goal
pub const HYPO_ANALYSIS: &str = "hypo_analysis";

/// Prints every goal's target
pub const TARGETS_ANALYSIS: &str = "targets_analysis";

/// Tactics whose results may contain metavariables
pub const META_VAR_SOURCES: &[&str] = &[APPLY, HAVE];

/// Prefix of the trace printed when an `or_else` alternative fires
pub const EFFECTIVE_CODE: &str = "EFFECTIVE CODE n°";

/// Reported at the analysis line once every goal is closed
pub const NO_GOALS_MSG: &str = "no goals";

/// Reported at the closing `end` of an unfinished proof
pub const UNSOLVED_GOALS_MSG: &str = "unsolved goals";

/// Part of the error raised by [`NO_META_VARS`]
pub const META_VARS_MSG: &str = "metavariables";

/// `trace "<text>"`
pub fn trace(text: &str) -> String {
    format!("trace \"{}\"", text.replace('"', "\\\""))
}

/// Probe printed after alternative `alt` of `or_else` node `node`
pub fn effective_code_probe(node: usize, alt: usize) -> String {
    trace(&format!("{EFFECTIVE_CODE}{node}.{alt}"))
}

/// Decode `EFFECTIVE CODE n°<node>.<alt>` out of a prover message
pub fn parse_effective_code(text: &str) -> Option<(usize, usize)> {
    let start = text.find(EFFECTIVE_CODE)? + EFFECTIVE_CODE.len();
    let rest = &text[start..];
    let end = rest
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .unwrap_or(rest.len());
    let (node, alt) = rest[..end].split_once('.')?;
    Some((node.parse().ok()?, alt.parse().ok()?))
}
