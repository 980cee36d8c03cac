// SPDX-FileCopyrightText: 2025 ECHIDNA Project Team
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Names for bound variables and new hypotheses
//!
//! The prover hands bound variables over with whatever name the statement
//! used, or none at all. Display names are chosen here so that they never
//! clash with the context or with an enclosing binder. The search always
//! terminates: after the hint, its primes are tried, then `_0`, `_1`, ...

use std::collections::BTreeSet;

use super::{MathObject, NodeKind};
use crate::config::NamingConfig;

/// Default hints for a variable of the given type
pub fn type_hints(math_type: &MathObject) -> Vec<String> {
    let defaults: &[&str] = match math_type.node {
        NodeKind::Set => &["A", "B", "C", "E", "F"],
        NodeKind::SetFamily => &["E", "F", "G"],
        NodeKind::Function => &["f", "g", "h"],
        NodeKind::Sequence => &["u", "v", "w"],
        NodeKind::Prop => &["P", "Q", "R"],
        NodeKind::Type => &["X", "Y", "Z"],
        NodeKind::Constant | NodeKind::LocalConstant => {
            match math_type.name().unwrap_or_default() {
                "ℕ" | "ℤ" | "nat" | "int" => &["n", "m", "p", "q", "k"],
                "ℝ" | "ℚ" | "real" | "rat" => &["x", "y", "z", "t"],
                name => return hints_from_type_name(name),
            }
        }
        _ => &["x", "y", "z"],
    };
    defaults.iter().map(|s| s.to_string()).collect()
}

/// `X` gives `x, y, z`; other names give their lowercase initial
fn hints_from_type_name(name: &str) -> Vec<String> {
    let mut chars = name.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) if c.is_alphabetic() => {
            let first = c.to_lowercase().to_string();
            let mut hints = vec![first];
            for next in ["y", "z"] {
                if !hints.iter().any(|h| h == next) {
                    hints.push(next.to_string());
                }
            }
            hints
        }
        (Some(c), Some(_)) if c.is_alphabetic() => vec![c.to_lowercase().to_string()],
        _ => vec!["x".to_string(), "y".to_string(), "z".to_string()],
    }
}

/// Hint for the `index`-th variable of a group; past the end of the list,
/// continue with the letters following the last hint
fn hint_at(hints: &[String], index: usize) -> String {
    if let Some(h) = hints.get(index) {
        return h.clone();
    }
    let last = hints.last().map(String::as_str).unwrap_or("x");
    let steps = index + 1 - hints.len();
    next_letter(last, steps)
}

fn next_letter(hint: &str, steps: usize) -> String {
    let mut chars = hint.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) if c.is_ascii_alphabetic() => {
            let base = if c.is_ascii_uppercase() { b'A' } else { b'a' };
            let offset = (c as u8 - base) as usize;
            char::from(base + ((offset + steps) % 26) as u8).to_string()
        }
        _ => hint.to_string(),
    }
}

/// First free name among `hint`, `hint'`, `hint''` (if allowed), `hint_0`, `hint_1`, ...
pub fn fresh_name(hint: &str, forbidden: &BTreeSet<String>, allow_double_prime: bool) -> String {
    let mut candidates = vec![hint.to_string(), format!("{hint}'")];
    if allow_double_prime {
        candidates.push(format!("{hint}''"));
    }
    if let Some(free) = candidates.into_iter().find(|c| !forbidden.contains(c)) {
        return free;
    }
    (0..)
        .map(|i| format!("{hint}_{i}"))
        .find(|c| !forbidden.contains(c))
        .unwrap_or_else(|| hint.to_string())
}

/// Name for a rewritten copy of hypothesis `name`, e.g. `k'`
pub fn primed_name(name: &str, forbidden: &BTreeSet<String>) -> String {
    let mut taken = forbidden.clone();
    taken.insert(name.to_string());
    fresh_name(name, &taken, true)
}

/// Next hypothesis name of the form `H1`, `H2`, ...
pub fn hypothesis_name(forbidden: &BTreeSet<String>, counter: &mut usize) -> String {
    loop {
        *counter += 1;
        let candidate = format!("H{}", counter);
        if !forbidden.contains(&candidate) {
            return candidate;
        }
    }
}

/// Whether the prover's name for a variable is worth keeping
fn usable_prover_name(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_alphabetic() && c.is_ascii())
        && !name.contains('.')
        && name.chars().all(|c| c.is_alphanumeric() || c == '_' || c == '\'')
}

/// Choose a display name for one bound variable
///
/// `siblings` are the names already given to enclosing variables of the
/// same type; their count is the variable's index in the group.
pub fn choose_name(
    var_type: &MathObject,
    prover_name: Option<&str>,
    siblings: &[&str],
    forbidden: &BTreeSet<String>,
    config: &NamingConfig,
) -> String {
    if config.use_prover_names {
        if let Some(name) = prover_name.filter(|n| usable_prover_name(n)) {
            return fresh_name(name, forbidden, config.allow_double_prime);
        }
    }

    let hints = type_hints(var_type);
    // Siblings that left the default letters set the letter for the group
    let hint = match common_initial(siblings) {
        Some(initial) if hints.first() != Some(&initial) => initial,
        _ => hint_at(&hints, siblings.len()),
    };
    fresh_name(&hint, forbidden, config.allow_double_prime)
}

fn common_initial(names: &[&str]) -> Option<String> {
    let first = names.first()?.chars().next()?;
    names
        .iter()
        .all(|n| n.starts_with(first))
        .then(|| first.to_string())
}

/// Give every bound variable of `obj` a display name
///
/// Top-down: a binder's variable avoids `outer` (the goal's context
/// names), the names of enclosing bound variables and the local constants
/// occurring under it.
pub fn name_bound_vars(obj: &mut MathObject, outer: &BTreeSet<String>, config: &NamingConfig) {
    let mut scope = Vec::new();
    name_in_scope(obj, outer, &mut scope, config);
}

fn name_in_scope(
    obj: &mut MathObject,
    outer: &BTreeSet<String>,
    scope: &mut Vec<(MathObject, String)>,
    config: &NamingConfig,
) {
    let number = obj
        .bound_variable()
        .and_then(|v| v.bound_var_number())
        .filter(|_| obj.children.len() == 3);
    let Some(number) = number else {
        for c in &mut obj.children {
            name_in_scope(c, outer, scope, config);
        }
        return;
    };

    let var_type = obj.children[0].clone();
    let name = {
        let prover_name = obj.children[1].name();
        let mut forbidden = outer.clone();
        forbidden.extend(scope.iter().map(|(_, n)| n.clone()));
        forbidden.extend(obj.children[2].local_constant_names());
        let siblings: Vec<&str> = scope
            .iter()
            .filter(|(t, _)| t.alpha_eq(&var_type))
            .map(|(_, n)| n.as_str())
            .collect();
        choose_name(&var_type, prover_name, &siblings, &forbidden, config)
    };
    obj.rename_bound_var(number, &name);

    scope.push((var_type, name));
    for c in &mut obj.children {
        name_in_scope(c, outer, scope, config);
    }
    scope.pop();
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(names: &[&str]) -> BTreeSet<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    fn real() -> MathObject {
        MathObject::typed_constant("ℝ", MathObject::type_sort())
    }

    #[test]
    fn test_primes_then_indices() {
        assert_eq!(fresh_name("x", &set(&[]), true), "x");
        assert_eq!(fresh_name("x", &set(&["x"]), true), "x'");
        assert_eq!(fresh_name("x", &set(&["x", "x'"]), true), "x''");
        assert_eq!(fresh_name("x", &set(&["x", "x'", "x''"]), true), "x_0");
        assert_eq!(fresh_name("x", &set(&["x", "x'"]), false), "x_0");
        assert_eq!(
            fresh_name("x", &set(&["x", "x'", "x''", "x_0", "x_1"]), true),
            "x_2"
        );
    }

    #[test]
    fn test_type_hints() {
        assert_eq!(type_hints(&real())[0], "x");
        assert_eq!(type_hints(&MathObject::constant("ℕ"))[0], "n");
        assert_eq!(type_hints(&MathObject::set_of(real()))[0], "A");
        assert_eq!(
            type_hints(&MathObject::function_type(real(), real()))[0],
            "f"
        );
        assert_eq!(type_hints(&MathObject::constant("X")), vec!["x", "y", "z"]);
        assert_eq!(type_hints(&MathObject::constant("Y")), vec!["y", "z"]);
    }

    #[test]
    fn test_group_index_and_letter_overflow() {
        let config = NamingConfig {
            use_prover_names: false,
            ..NamingConfig::default()
        };
        let none = set(&[]);
        assert_eq!(choose_name(&real(), None, &[], &none, &config), "x");
        assert_eq!(choose_name(&real(), None, &["x"], &none, &config), "y");
        // Hints for ℝ are x, y, z, t; the fifth variable moves on to u
        assert_eq!(
            choose_name(&real(), None, &["x", "y", "z", "t"], &none, &config),
            "u"
        );
    }

    #[test]
    fn test_common_initial_is_promoted() {
        let config = NamingConfig {
            use_prover_names: false,
            ..NamingConfig::default()
        };
        let forbidden = set(&["y", "y'"]);
        assert_eq!(
            choose_name(&real(), None, &["y", "y'"], &forbidden, &config),
            "y''"
        );
        assert_eq!(choose_name(&real(), None, &["x"], &set(&["x"]), &config), "y");
    }

    #[test]
    fn test_prover_names_are_kept_when_usable() {
        let config = NamingConfig::default();
        let none = set(&[]);
        assert_eq!(choose_name(&real(), Some("ε"), &[], &none, &config), "x");
        assert_eq!(choose_name(&real(), Some("eps"), &[], &none, &config), "eps");
        assert_eq!(choose_name(&real(), Some("_x"), &[], &none, &config), "x");
        assert_eq!(
            choose_name(&real(), Some("a"), &[], &set(&["a"]), &config),
            "a'"
        );
    }

    #[test]
    fn test_hypothesis_minting() {
        let mut counter = 0;
        let forbidden = set(&["H1", "H3"]);
        assert_eq!(hypothesis_name(&forbidden, &mut counter), "H2");
        assert_eq!(hypothesis_name(&forbidden, &mut counter), "H4");
        assert_eq!(primed_name("k", &set(&[])), "k'");
        assert_eq!(primed_name("k", &set(&["k'"])), "k''");
    }

    #[test]
    fn test_name_bound_vars_avoids_context_and_outer_binders() {
        let config = NamingConfig::default();
        let x = MathObject::bound_var("x", 1, real());
        let y = MathObject::bound_var("x", 2, real());
        let inner = MathObject::binder(
            NodeKind::Forall,
            y.clone(),
            MathObject::binary(NodeKind::Less, x.clone(), y),
        );
        let mut f = MathObject::binder(NodeKind::Exists, x, inner);

        name_bound_vars(&mut f, &set(&["x"]), &config);
        let names = f.bound_var_names();
        assert!(!names.contains("x"));
        assert!(names.contains("x'"));
        assert!(names.contains("x''"));
    }
}
