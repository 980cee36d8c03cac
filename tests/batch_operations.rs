// SPDX-FileCopyrightText: 2025 ECHIDNA Project Team
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Batch initial states and script replay

mod common;

use common::scripted_checker::{Answer, ScriptedChecker};
use common::*;
use pretty_assertions::assert_eq;
use proofdriver::batch::{self, ReplayRecord, Script};
use proofdriver::config::NamingConfig;
use proofdriver::error::{StepError, StepErrorKind};
use proofdriver::session::protocol::{ProverMessage, Severity};
use proofdriver::{Coordinator, ExitCode, Format};

fn message(line: usize, severity: Severity, text: &str) -> ProverMessage {
    ProverMessage {
        file_name: "exercise.lean".into(),
        pos_line: line,
        pos_col: 2,
        severity,
        caption: String::new(),
        text: text.into(),
    }
}

/// Answers a batch file from the `#<seq>.<i>` markers on its analysis lines
fn batch_checker(seq: u64, answers: Vec<Result<Dump, String>>) -> ScriptedChecker {
    ScriptedChecker::raw(move |content| {
        let mut messages = Vec::new();
        for (n, line) in content.lines().enumerate() {
            let Some((_, marker)) = line.split_once(&format!("#{seq}.")) else {
                continue;
            };
            let Some(answer) = marker.trim().trim_end_matches(',').parse::<usize>().ok().and_then(|i| answers.get(i)) else {
                continue;
            };
            let is_hypo = line.trim_start().starts_with("hypo_analysis");
            match answer {
                Ok(dump) if is_hypo => messages.push(message(n + 1, Severity::Information, &dump.hypo)),
                Ok(dump) => messages.push(message(n + 1, Severity::Information, &dump.targets)),
                Err(text) if is_hypo => messages.push(message(n + 1, Severity::Error, text)),
                Err(_) => {}
            }
        }
        Ok(messages)
    })
}

fn modus_dump() -> Dump {
    Dump::goal(
        &[
            object("A", PROP),
            object("B", PROP),
            property("H", &implies(&local("A"), &local("B"))),
            object("a", &local("A")),
        ],
        &local("B"),
    )
}

#[tokio::test]
async fn test_initial_states_in_one_request() {
    let course = course();
    let seq = 3;
    let mut checker = batch_checker(
        seq,
        vec![
            Ok(Dump::goal(&[], &forall_x_eq_x())),
            Ok(modus_dump()),
            Err("unknown identifier 'or.inl'".into()),
            Ok(Dump::goal(&[], &forall_x_eq_x())),
        ],
    );
    let submissions = checker.submissions();

    let states = batch::initial_states(&mut checker, &course, &course.exercises, &NamingConfig::default(), seq)
        .await
        .unwrap();

    assert_eq!(submissions.lock().unwrap().len(), 1);
    let names: Vec<&str> = states.iter().map(|s| s.lean_name.as_str()).collect();
    assert_eq!(names, vec!["refl_forall", "modus", "pick", "rewrite"]);

    let modus = states[1].state.as_ref().unwrap();
    assert_eq!(context_names(modus), vec!["A", "B", "H", "a"]);
    assert_eq!(
        states[2].state.as_ref().unwrap_err().kind(),
        StepErrorKind::ProverRequestFailed
    );
    assert!(states[3].state.is_ok());
}

#[tokio::test]
async fn test_batch_and_live_initial_states_agree() {
    let course = course();
    let exercise = course.exercise("modus").unwrap().clone();
    let mut checker = batch_checker(0, vec![Ok(modus_dump())]);
    let states = batch::initial_states(&mut checker, &course, &[exercise], &NamingConfig::default(), 0)
        .await
        .unwrap();
    let batch_state = states[0].state.clone().unwrap();

    let live = Coordinator::start(
        ScriptedChecker::by_depth(vec![Answer::State(modus_dump())]),
        assembler("modus"),
        &test_config(),
    )
    .await
    .unwrap();
    let live_state = live.current_state();

    assert_eq!(batch_state.goal_count(), live_state.goal_count());
    let render_goal = |state: &proofdriver::ProofState| state.main_goal().unwrap().display(Format::Utf8);
    assert_eq!(render_goal(&batch_state), render_goal(live_state));
}

#[tokio::test]
async fn test_failed_batch_request_fails_every_exercise() {
    let course = course();
    let mut checker = ScriptedChecker::raw(|_| Err(proofdriver::SessionError::ChannelClosed));
    let states = batch::initial_states(&mut checker, &course, &course.exercises, &NamingConfig::default(), 0)
        .await
        .unwrap();
    assert_eq!(states.len(), 4);
    assert!(states
        .iter()
        .all(|s| matches!(s.state, Err(StepError::ProverCrashed(_)))));
}

#[tokio::test]
async fn test_missing_analysis_is_no_proof_state() {
    let course = course();
    let exercise = course.exercise("pick").unwrap().clone();
    let mut checker = ScriptedChecker::raw(|_| Ok(Vec::new()));
    let states = batch::initial_states(&mut checker, &course, &[exercise], &NamingConfig::default(), 0)
        .await
        .unwrap();
    assert_eq!(states[0].state, Err(StepError::NoProofState));
}

const SCRIPT: &str = r#"{
    "exercise": "refl_forall",
    "entries": [
        {"type": "step", "button": "forall"},
        {"type": "undo"},
        {"type": "redo"},
        {"type": "step", "button": "implies", "selection": ["nope"]},
        {"type": "undo"},
        {"type": "undo"}
    ]
}"#;

#[tokio::test]
async fn test_replay_reports_every_entry() {
    let script = Script::from_json(SCRIPT).unwrap();
    assert_eq!(script.entries.len(), 6);

    let checker = ScriptedChecker::by_depth(vec![
        Answer::State(Dump::goal(&[], &forall_x_eq_x())),
        Answer::State(Dump::goal(&[object("x", REAL)], &equals(&local("x"), &local("x")))),
    ]);
    let mut coordinator = Coordinator::start(checker, assembler(&script.exercise), &test_config())
        .await
        .unwrap();

    let mut seen = Vec::new();
    let report = batch::replay(&mut coordinator, &script.entries, |r: &ReplayRecord| {
        seen.push(r.index)
    })
    .await;

    assert_eq!(seen, vec![0, 1, 2, 3, 4, 5]);
    let summary: Vec<(bool, usize)> = report
        .records
        .iter()
        .map(|r| (r.ok, r.history_cursor))
        .collect();
    assert_eq!(
        summary,
        vec![(true, 1), (true, 0), (true, 1), (false, 1), (true, 0), (false, 0)]
    );
    assert_eq!(report.records[0].message.as_deref(), Some("Property x introduced"));
    assert_eq!(report.records[3].message.as_deref(), Some("nope is not in the context"));
    assert_eq!(report.records[5].message.as_deref(), Some("nothing to undo"));
    // The first error decides the exit code
    assert_eq!(report.exit_code, ExitCode::UserInputError);
    assert!(!report.complete);
}

#[tokio::test]
async fn test_replay_exit_code_follows_first_prover_error() {
    let script = Script::from_json(
        r#"{"exercise": "refl_forall", "entries": [
            {"type": "step", "button": "forall"},
            {"type": "go_to", "step": 7}
        ]}"#,
    )
    .unwrap();
    let checker = ScriptedChecker::by_depth(vec![
        Answer::State(Dump::goal(&[], &forall_x_eq_x())),
        Answer::Error("unknown tactic".into()),
    ]);
    let mut coordinator = Coordinator::start(checker, assembler("refl_forall"), &test_config())
        .await
        .unwrap();

    let report = batch::replay(&mut coordinator, &script.entries, |_| {}).await;
    assert!(!report.records[0].ok);
    assert_eq!(report.records[0].message.as_deref(), Some("unknown tactic"));
    assert!(!report.records[1].ok);
    assert_eq!(report.exit_code, ExitCode::ProverRequestFailed);
}
