// SPDX-FileCopyrightText: 2025 ECHIDNA Project Team
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Batch operations: initial proof states of many exercises in one prover
//! request, and replay of recorded action scripts

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{info, warn};

use crate::config::NamingConfig;
use crate::coordinator::{Coordinator, StepOutcome};
use crate::error::{ExitCode, StepError};
use crate::parsers::{parse_proof_state, CONTEXT_HEADER, TARGETS_HEADER};
use crate::proof_state::ProofState;
use crate::proof_tree::StepId;
use crate::session::protocol::{ProverMessage, Severity};
use crate::session::ProofChecker;
use crate::tactic::builders::UserAction;
use crate::virtual_file::{Analysis, BatchFile, Course, Exercise};

/// Initial state of one exercise, or why it could not be obtained
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InitialState {
    pub lean_name: String,
    pub state: Result<ProofState, StepError>,
}

#[derive(Default)]
struct Dumps {
    hypo: Option<String>,
    targets: Option<String>,
    error: Option<String>,
}

/// Attribute the messages of a batch file to its exercises
fn collect_dumps(file: &BatchFile, messages: &[ProverMessage]) -> BTreeMap<usize, Dumps> {
    let mut dumps: BTreeMap<usize, Dumps> = BTreeMap::new();
    for msg in messages {
        let Some((exercise, analysis)) = file.exercise_at(msg.pos_line) else {
            if msg.severity == Severity::Error {
                warn!(line = msg.pos_line, "error outside the analysed proofs: {}", msg.text);
            }
            continue;
        };
        let entry = dumps.entry(exercise).or_default();
        let text = msg.text.trim();
        match (msg.severity, analysis) {
            (Severity::Error, _) => {
                entry.error.get_or_insert_with(|| text.to_string());
            }
            (_, Analysis::Hypotheses) if text.starts_with(CONTEXT_HEADER) => {
                entry.hypo = Some(text.to_string())
            }
            (_, Analysis::Targets) if text.starts_with(TARGETS_HEADER) => {
                entry.targets = Some(text.to_string())
            }
            _ => {}
        }
    }
    dumps
}

/// Initial proof states of `exercises`, checked in a single file
pub async fn initial_states<C: ProofChecker>(
    checker: &mut C,
    course: &Course,
    exercises: &[Exercise],
    naming: &NamingConfig,
    seq: u64,
) -> anyhow::Result<Vec<InitialState>> {
    let file = BatchFile::build(course, exercises, seq)?;
    info!(
        "requesting initial states of {} exercises",
        file.exercise_count()
    );
    let timeout = checker.timeout();
    let messages = match checker.check(&file.content, timeout).await {
        Ok(messages) => messages,
        Err(e) => {
            let error = StepError::from(e);
            return Ok(exercises
                .iter()
                .map(|ex| InitialState {
                    lean_name: ex.lean_name.clone(),
                    state: Err(error.clone()),
                })
                .collect());
        }
    };

    let mut dumps = collect_dumps(&file, &messages);
    Ok(exercises
        .iter()
        .enumerate()
        .map(|(i, ex)| {
            let state = match dumps.remove(&i).unwrap_or_default() {
                Dumps {
                    error: Some(message),
                    ..
                } => Err(StepError::failed(message, file.lines_of(i).map(|(h, _)| h))),
                Dumps {
                    hypo: Some(hypo),
                    targets: Some(targets),
                    ..
                } => parse_proof_state(&hypo, &targets, naming).into_result(),
                _ => Err(StepError::NoProofState),
            };
            InitialState {
                lean_name: ex.lean_name.clone(),
                state,
            }
        })
        .collect())
}

/// One entry of an action script
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ScriptEntry {
    Step(UserAction),
    Undo,
    Redo,
    Rewind,
    GoTo { step: StepId },
}

/// A recorded session on one exercise
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Script {
    pub exercise: String,
    pub entries: Vec<ScriptEntry>,
}

impl Script {
    pub fn from_json(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }
}

/// What happened to one script entry
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReplayRecord {
    pub index: usize,
    pub step: Option<StepId>,
    pub ok: bool,
    pub message: Option<String>,
    pub history_cursor: usize,
}

/// Outcome of a replay; the exit code is that of the first error
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReplayReport {
    pub records: Vec<ReplayRecord>,
    pub exit_code: ExitCode,
    pub complete: bool,
}

/// Run every entry of a script, reporting each through `on_record`
pub async fn replay<C: ProofChecker>(
    coordinator: &mut Coordinator<C>,
    entries: &[ScriptEntry],
    mut on_record: impl FnMut(&ReplayRecord),
) -> ReplayReport {
    let mut records = Vec::new();
    let mut exit_code = ExitCode::Ok;

    for (index, entry) in entries.iter().enumerate() {
        let (step, result): (Option<StepId>, Result<Option<String>, (ExitCode, String)>) =
            match entry {
                ScriptEntry::Step(action) => match coordinator.step(action.clone()).await {
                    StepOutcome::Sealed(id) => (
                        Some(id),
                        Ok(coordinator
                            .proof_tree()
                            .step(id)
                            .and_then(|s| s.success_msg.clone())),
                    ),
                    StepOutcome::Failed(id) => {
                        let error = coordinator.proof_tree().step(id).and_then(|s| s.error.clone());
                        let code = error.as_ref().map_or(ExitCode::NoProofState, ExitCode::from);
                        let message = error.map_or_else(String::new, |e| e.to_string());
                        (Some(id), Err((code, message)))
                    }
                    StepOutcome::NeedsMoreInput(request) => (
                        None,
                        Err((
                            ExitCode::UserInputError,
                            format!("missing input: {}", request.prompt),
                        )),
                    ),
                    StepOutcome::WrongUserInput(reason) => {
                        (None, Err((ExitCode::UserInputError, reason)))
                    }
                },
                ScriptEntry::Undo => (None, moved(coordinator.undo().await, "nothing to undo")),
                ScriptEntry::Redo => (None, moved(coordinator.redo().await, "nothing to redo")),
                ScriptEntry::Rewind => (None, moved(coordinator.rewind().await.map(|_| true), "")),
                ScriptEntry::GoTo { step } => (
                    Some(*step),
                    moved(coordinator.go_to(*step).await, "step is not in the history"),
                ),
            };

        let record = match result {
            Ok(message) => ReplayRecord {
                index,
                step,
                ok: true,
                message,
                history_cursor: coordinator.history_cursor(),
            },
            Err((code, message)) => {
                if exit_code == ExitCode::Ok {
                    exit_code = code;
                }
                ReplayRecord {
                    index,
                    step,
                    ok: false,
                    message: Some(message),
                    history_cursor: coordinator.history_cursor(),
                }
            }
        };
        on_record(&record);
        records.push(record);
    }

    ReplayReport {
        records,
        exit_code,
        complete: coordinator.is_complete(),
    }
}

fn moved(
    result: Result<bool, StepError>,
    refusal: &str,
) -> Result<Option<String>, (ExitCode, String)> {
    match result {
        Ok(true) => Ok(None),
        Ok(false) => Err((ExitCode::UserInputError, refusal.to_string())),
        Err(e) => Err((ExitCode::from(&e), e.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tactic::builders::Button;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_script_format() {
        let text = r#"{
            "exercise": "and_swap",
            "entries": [
                {"type": "step", "button": "implies"},
                {"type": "step", "selection": ["H"], "button": "and"},
                {"type": "step", "button": "or", "inputs": [1]},
                {"type": "undo"},
                {"type": "go_to", "step": 0}
            ]
        }"#;
        let script = Script::from_json(text).unwrap();
        assert_eq!(script.entries.len(), 5);
        assert_eq!(
            script.entries[1],
            ScriptEntry::Step(UserAction::button(Button::And).select(["H"]))
        );
        assert_eq!(
            script.entries[2],
            ScriptEntry::Step(UserAction::button(Button::Or).choice(1))
        );
        assert_eq!(script.entries[4], ScriptEntry::GoTo { step: 0 });
    }

    #[test]
    fn test_dumps_are_attributed_by_line() {
        let course = Course::scan(
            "lemma a : true :=\nbegin\n  sorry\nend\nlemma b : false :=\nbegin\n  sorry\nend\n",
        );
        let file = BatchFile::build(&course, &course.exercises, 1).unwrap();
        let (h0, t0) = file.lines_of(0).unwrap();
        let (h1, _) = file.lines_of(1).unwrap();
        let msg = |line, severity, text: &str| ProverMessage {
            file_name: "f".into(),
            pos_line: line,
            pos_col: 0,
            severity,
            caption: String::new(),
            text: text.into(),
        };
        let dumps = collect_dumps(
            &file,
            &[
                msg(h0, Severity::Information, "context:"),
                msg(t0, Severity::Information, "targets:\nPROPERTY[METAVAR¿[name:_m¿]] ¿= PROP_TRUE"),
                msg(h1, Severity::Error, "type mismatch"),
                msg(1, Severity::Error, "elsewhere"),
            ],
        );
        assert!(dumps[&0].hypo.is_some() && dumps[&0].targets.is_some());
        assert_eq!(dumps[&1].error.as_deref(), Some("type mismatch"));
        assert_eq!(dumps.len(), 2);
    }
}
