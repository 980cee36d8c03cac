// SPDX-FileCopyrightText: 2025 ECHIDNA Project Team
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Common test utilities for the proofdriver test suite

#![allow(dead_code)]

use proofdriver::config::{DriverConfig, ProverConfig};
use proofdriver::{Course, ProofState, VirtualFileAssembler};

pub mod mock_lean;
pub mod scripted_checker;

/// A small course with one exercise per end-to-end scenario
pub const COURSE: &str = "\
import data.real.basic

namespace tutorial

lemma refl_forall : ∀ x : ℝ, x = x :=
begin
  sorry
end

lemma modus (A B : Prop) (H : A → B) (a : A) : B :=
begin
  sorry
end

lemma pick (P Q : Prop) (p : P) : P ∨ Q :=
begin
  sorry
end

lemma rewrite (a b : ℝ) (P : ℝ → Prop) (h : a = b) (k : P a) : P b :=
begin
  sorry
end

end tutorial
";

pub fn course() -> Course {
    Course::scan(COURSE)
}

pub fn assembler(name: &str) -> VirtualFileAssembler {
    let course = course();
    let exercise = course.exercise(name).expect("exercise in the fixture course");
    VirtualFileAssembler::new(&course, exercise).expect("valid exercise")
}

/// Configuration for tests: small pool, short startup
pub fn test_config() -> DriverConfig {
    DriverConfig {
        prover: ProverConfig {
            timeout_secs: 30,
            startup_timeout_secs: 5,
            seq_pool_capacity: 4,
            listener_capacity: 64,
            ..ProverConfig::default()
        },
        ..DriverConfig::default()
    }
}

// Introspection text builders

pub const REAL: &str = "CONSTANT¿[name:ℝ¿]";
pub const PROP: &str = "PROP";

/// Reference to a context entry whose identifier is `0.<name>`
pub fn local(name: &str) -> String {
    format!("LOCAL_CONSTANT¿[name:{name}/identifier:0.{name}¿]")
}

pub fn object(name: &str, ty: &str) -> String {
    format!("OBJECT[{}] ¿= {ty}", local(name))
}

pub fn property(name: &str, ty: &str) -> String {
    format!("PROPERTY[{}] ¿= {ty}", local(name))
}

pub fn equals(a: &str, b: &str) -> String {
    format!("PROP_EQUALS¿({a}¿, {b}¿)")
}

pub fn implies(a: &str, b: &str) -> String {
    format!("PROP_IMPLIES¿({a}¿, {b}¿)")
}

pub fn or(a: &str, b: &str) -> String {
    format!("PROP_OR¿({a}¿, {b}¿)")
}

pub fn application(f: &str, x: &str) -> String {
    format!("APPLICATION¿({f}¿, {x}¿)")
}

/// `∀ x ∈ ℝ, x = x` with the prover's own variable identifier
pub fn forall_x_eq_x() -> String {
    let x = "LOCAL_CONSTANT¿[name:x/identifier:_fresh.7¿]";
    format!("QUANT_∀¿({REAL}¿, {x}¿, {}¿)", equals(x, x))
}

/// What the two analysis tactics print for one proof state
#[derive(Debug, Clone, PartialEq)]
pub struct Dump {
    pub hypo: String,
    pub targets: String,
}

impl Dump {
    /// One goal
    pub fn goal(context: &[String], target: &str) -> Self {
        Dump::goals(&[(context.to_vec(), target.to_string())])
    }

    /// Several goals, each with its own context block
    pub fn goals(goals: &[(Vec<String>, String)]) -> Self {
        let blocks: Vec<String> = goals.iter().map(|(ctx, _)| ctx.join("\n")).collect();
        let targets: Vec<String> = goals
            .iter()
            .enumerate()
            .map(|(i, (_, t))| format!("PROPERTY[METAVAR¿[name:_m{i}¿]] ¿= {t}"))
            .collect();
        Dump {
            hypo: format!("context:\n{}", blocks.join("\n¿¿¿\n")),
            targets: format!("targets:\n{}", targets.join("\n¿¿¿\n")),
        }
    }
}

/// Assert that a proof state has no goals (is complete)
pub fn assert_proof_complete(state: &ProofState) {
    assert!(
        state.is_complete(),
        "Expected proof to be complete, but {} goals remain",
        state.goal_count()
    );
}

/// Assert that a proof state has exactly n goals
pub fn assert_goal_count(state: &ProofState, expected: usize) {
    assert_eq!(
        state.goal_count(),
        expected,
        "Expected {} goals, but found {}",
        expected,
        state.goal_count()
    );
}

/// Names of the main goal's context, in order
pub fn context_names(state: &ProofState) -> Vec<String> {
    state
        .main_goal()
        .map(|g| g.context.iter().map(|c| c.name().to_string()).collect())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixture_course_is_scanned() {
        let course = course();
        let names: Vec<&str> = course.exercises.iter().map(|e| e.lean_name.as_str()).collect();
        assert_eq!(names, vec!["refl_forall", "modus", "pick", "rewrite"]);
    }

    #[test]
    fn test_dump_blocks() {
        let dump = Dump::goals(&[
            (vec![object("x", REAL)], "PROP_TRUE".into()),
            (vec![], "PROP_FALSE".into()),
        ]);
        assert!(dump.hypo.contains("¿¿¿"));
        assert_eq!(dump.targets.matches("METAVAR").count(), 2);
    }
}
