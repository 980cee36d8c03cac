// SPDX-FileCopyrightText: 2025 ECHIDNA Project Team
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Step coordinator
//!
//! Drives one user step end to end: build the tactic code, submit the
//! virtual file, read the prover's messages, parse the new proof state and
//! seal the step in the proof tree. History moves re-synchronise the prover
//! with the accepted steps.

use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::config::{DriverConfig, NamingConfig};
use crate::error::{BuildError, InputRequest, StepError};
use crate::parsers::{parse_proof_state, CONTEXT_HEADER, TARGETS_HEADER};
use crate::proof_state::{subgoal_labels, ProofState, SubgoalKind};
use crate::proof_tree::{BranchLabel, BranchStatus, CursorMove, ProofStep, ProofTree, StepId};
use crate::session::protocol::{ProverMessage, Severity};
use crate::session::{ProofChecker, SessionEvent};
use crate::tactic::builders::{build_step, BuildContext, BuiltStep, UserAction};
use crate::tactic::catalogue::{
    parse_effective_code, EFFECTIVE_CODE, META_VARS_MSG, NO_GOALS_MSG, UNSOLVED_GOALS_MSG,
};
use crate::virtual_file::{VirtualFile, VirtualFileAssembler};

/// Result of [`Coordinator::step`]
#[derive(Debug, Clone, PartialEq)]
pub enum StepOutcome {
    /// Accepted and appended to the history
    Sealed(StepId),
    /// The builder wants another round-trip; nothing was recorded
    NeedsMoreInput(InputRequest),
    /// Selection or input rejected before any prover call
    WrongUserInput(String),
    /// Sealed as an error; kept in the tree but not in the history
    Failed(StepId),
}

/// A step error or rejected input, as shown to the user
#[derive(Debug, Clone, PartialEq)]
pub struct ErrorEvent {
    pub step: Option<StepId>,
    pub message: String,
}

/// Receivers for everything the coordinator announces
pub struct Subscription {
    pub proof_states: broadcast::Receiver<ProofState>,
    pub steps: broadcast::Receiver<ProofStep>,
    pub errors: broadcast::Receiver<ErrorEvent>,
    /// Prover events; running state comes as [`SessionEvent::State`]
    pub prover: broadcast::Receiver<SessionEvent>,
}

struct Channels {
    proof_states: broadcast::Sender<ProofState>,
    steps: broadcast::Sender<ProofStep>,
    errors: broadcast::Sender<ErrorEvent>,
}

impl Channels {
    fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Channels {
            proof_states: broadcast::channel(capacity).0,
            steps: broadcast::channel(capacity).0,
            errors: broadcast::channel(capacity).0,
        }
    }
}

/// What the prover said about one virtual file
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Report {
    pub hypo: Option<String>,
    pub targets: Option<String>,
    /// `(or_else node, alternative)` of every probe that fired
    pub probes: Vec<(usize, usize)>,
    /// First error inside the new lines
    pub error: Option<StepError>,
    /// The analysis found no goal left
    pub no_goals: bool,
}

impl Report {
    pub fn read(file: &VirtualFile, messages: &[ProverMessage]) -> Self {
        let mut report = Report::default();
        for msg in messages {
            let line = msg.pos_line;
            let text = msg.text.trim();

            if text.contains(EFFECTIVE_CODE) {
                match parse_effective_code(text) {
                    Some(probe) => report.probes.push(probe),
                    None => warn!("unreadable effective code probe: {}", text),
                }
                continue;
            }

            match msg.severity {
                Severity::Error if file.is_analysis_line(line) && text.contains(NO_GOALS_MSG) => {
                    report.no_goals = true;
                }
                Severity::Error if line >= file.end_line && text.contains(UNSOLVED_GOALS_MSG) => {
                    debug!("unsolved goals at the closing end, as expected");
                }
                Severity::Error if file.in_new_window(line) => {
                    if report.error.is_none() {
                        let message = if text.contains(META_VARS_MSG) {
                            format!("the step left undetermined objects: {}", text)
                        } else {
                            text.to_string()
                        };
                        report.error = Some(StepError::failed(message, Some(line)));
                    }
                }
                Severity::Error => {
                    debug!(line, "ignoring error outside the new lines: {}", text);
                }
                _ if line == file.hypo_line && text.starts_with(CONTEXT_HEADER) => {
                    report.hypo = Some(text.to_string());
                }
                _ if line == file.targets_line && text.starts_with(TARGETS_HEADER) => {
                    report.targets = Some(text.to_string());
                }
                _ => debug!(line, "ignoring prover message: {}", text),
            }
        }
        report
    }

    /// The proof state the report describes
    pub fn into_state(self, naming: &NamingConfig) -> Result<(ProofState, Vec<(usize, usize)>), StepError> {
        if let Some(error) = self.error {
            return Err(error);
        }
        if self.no_goals {
            return Ok((ProofState::default(), self.probes));
        }
        let (Some(hypo), Some(targets)) = (self.hypo, self.targets) else {
            return Err(StepError::NoProofState);
        };
        let state = parse_proof_state(&hypo, &targets, naming).into_result()?;
        Ok((state, self.probes))
    }
}

/// New goal stack after a step turned `before` into `after`
fn next_goal_stack(
    stack: &[String],
    delta: isize,
    labels: &[BranchLabel],
    after_goals: usize,
) -> Vec<String> {
    if after_goals == 0 {
        return Vec::new();
    }
    let rest = stack.get(1..).unwrap_or_default();
    let mut next: Vec<String> = if delta > 0 {
        labels.iter().map(|b| b.label.clone()).chain(rest.iter().cloned()).collect()
    } else if delta < 0 {
        stack
            .get(delta.unsigned_abs()..)
            .unwrap_or_default()
            .to_vec()
    } else {
        match labels.iter().find(|b| b.status == BranchStatus::Active) {
            Some(active) => std::iter::once(active.label.clone())
                .chain(rest.iter().cloned())
                .collect(),
            None => stack.to_vec(),
        }
    };
    // Keep one label per goal
    next.truncate(after_goals);
    while next.len() < after_goals {
        next.push(format!("Goal {}", next.len() + 1));
    }
    next
}

/// Runs the steps of one exercise
pub struct Coordinator<C: ProofChecker> {
    checker: C,
    assembler: VirtualFileAssembler,
    naming: NamingConfig,
    tree: ProofTree,
    channels: Channels,
}

impl<C: ProofChecker> Coordinator<C> {
    /// Check the bare exercise and start a proof from its initial state
    pub async fn start(
        mut checker: C,
        mut assembler: VirtualFileAssembler,
        config: &DriverConfig,
    ) -> Result<Self, StepError> {
        info!("starting proof of {}", assembler.lean_name());
        let file = assembler.live_step(&[], None);
        let messages = check_with_restart(&mut checker, &file.content).await?;
        let (mut initial, _) = Report::read(&file, &messages).into_state(&config.naming)?;
        initial.anchor(None);
        Ok(Coordinator {
            checker,
            assembler,
            naming: config.naming.clone(),
            tree: ProofTree::new(initial),
            channels: Channels::new(config.prover.listener_capacity),
        })
    }

    pub fn subscribe(&self) -> Subscription {
        Subscription {
            proof_states: self.channels.proof_states.subscribe(),
            steps: self.channels.steps.subscribe(),
            errors: self.channels.errors.subscribe(),
            prover: self.checker.events(),
        }
    }

    pub fn proof_tree(&self) -> &ProofTree {
        &self.tree
    }

    pub fn current_state(&self) -> &ProofState {
        self.tree.current_state()
    }

    pub fn current_step(&self) -> Option<&ProofStep> {
        self.tree.current_step()
    }

    pub fn history_cursor(&self) -> usize {
        self.tree.history_cursor()
    }

    pub fn is_complete(&self) -> bool {
        self.tree.is_complete()
    }

    pub fn checker(&self) -> &C {
        &self.checker
    }

    pub fn checker_mut(&mut self) -> &mut C {
        &mut self.checker
    }

    /// Prover source of the visible accepted steps
    fn accepted_sources(&self) -> Vec<String> {
        self.tree
            .accepted()
            .filter_map(|s| s.effective_code.as_ref().or(s.code.as_ref()))
            .map(|c| c.to_source(true))
            .collect()
    }

    fn notify_error(&self, step: Option<StepId>, message: String) {
        let _ = self.channels.errors.send(ErrorEvent { step, message });
    }

    /// Run one user action on the main goal
    pub async fn step(&mut self, action: UserAction) -> StepOutcome {
        let before_id = self.tree.current_state_id();
        let before = self.tree.current_state().clone();
        let Some(goal) = before.main_goal() else {
            let reason = "The proof is already complete".to_string();
            self.notify_error(None, reason.clone());
            return StepOutcome::WrongUserInput(reason);
        };

        let mut counter = self.tree.property_counter();
        let built = {
            let mut ctx = BuildContext {
                goal,
                naming: &self.naming,
                property_counter: &mut counter,
            };
            build_step(&action, &mut ctx)
        };
        let BuiltStep {
            code,
            subgoal_kind,
            branches,
        } = match built {
            Ok(built) => built,
            Err(BuildError::NeedsMoreInput(request)) => {
                debug!("builder needs more input: {}", request.prompt);
                return StepOutcome::NeedsMoreInput(request);
            }
            Err(BuildError::WrongUserInput(reason)) => {
                info!("rejected user input: {}", reason);
                self.notify_error(None, reason.clone());
                return StepOutcome::WrongUserInput(reason);
            }
        };

        let (numbered, instrumented) = code.add_no_meta_vars().instrument();
        let source = instrumented.to_source(false);
        let accepted = self.accepted_sources();
        let file = self.assembler.live_step(&accepted, Some(&source));
        info!("submitting step: {}", numbered.to_source(true));

        let mut step = ProofStep::new(action, before_id);
        step.code = Some(numbered.clone());
        step.submitted = Some(source);
        step.property_counter = counter;

        let checked = check_with_restart(&mut self.checker, &file.content)
            .await
            .and_then(|messages| Report::read(&file, &messages).into_state(&self.naming));
        let (mut after, probes) = match checked {
            Ok(result) => result,
            Err(error) => {
                let message = numbered
                    .error_message()
                    .map(|m| format!("{}: {}", m, error))
                    .unwrap_or_else(|| error.to_string());
                return self.seal_failure(step, error, message, &before);
            }
        };

        let effective = numbered.resolve_effective(&probes);
        step.success_msg = numbered.success_message_for(&effective.to_source(true));
        step.effective_code = Some(effective);

        let step_id = self.tree.next_step_id();
        after.tag_against(&before, Some(step_id));
        let delta = after.goal_count() as isize - before.goal_count() as isize;

        step.branches = if !branches.is_empty() {
            branches
        } else if delta > 0 {
            subgoal_labels(subgoal_kind, &before, &after, delta as usize)
                .into_iter()
                .enumerate()
                .map(|(k, label)| {
                    if k == 0 {
                        BranchLabel::active(label)
                    } else {
                        BranchLabel::pending(label)
                    }
                })
                .collect()
        } else {
            Vec::new()
        };
        if subgoal_kind != SubgoalKind::Generic && step.branches.is_empty() {
            debug!("{:?} step created no sub-goal", subgoal_kind);
        }
        step.goal_stack = next_goal_stack(
            self.tree.goal_stack(),
            delta,
            &step.branches,
            after.goal_count(),
        );
        step.goal_index = 0;
        step.total_goals = after.goal_count();
        step.completes_proof = after.is_complete();

        let after_id = self.tree.push_state(after.clone());
        step.after = Some(after_id);
        let id = self.tree.record_success(step.clone());
        info!(
            step = id,
            goals = after.goal_count(),
            "step sealed: {}",
            step.success_msg.as_deref().unwrap_or("ok")
        );
        if step.completes_proof {
            info!("proof complete");
        }

        let _ = self.channels.proof_states.send(after);
        if let Some(sealed) = self.tree.step(id) {
            let _ = self.channels.steps.send(sealed.clone());
        }
        StepOutcome::Sealed(id)
    }

    fn seal_failure(
        &mut self,
        mut step: ProofStep,
        error: StepError,
        message: String,
        before: &ProofState,
    ) -> StepOutcome {
        warn!("step failed: {}", message);
        step.error = Some(error);
        step.goal_stack = self.tree.goal_stack().to_vec();
        step.total_goals = before.goal_count();
        let id = self.tree.record_failure(step);
        self.notify_error(Some(id), message);
        if let Some(failed) = self.tree.step(id) {
            let _ = self.channels.steps.send(failed.clone());
        }
        // Observers get the unchanged state back
        let _ = self.channels.proof_states.send(before.clone());
        StepOutcome::Failed(id)
    }

    /// Re-submit the visible accepted steps so the prover matches the cursor
    async fn resync(&mut self) -> Result<(), StepError> {
        let accepted = self.accepted_sources();
        let file = self.assembler.live_step(&accepted, None);
        let result = check_with_restart(&mut self.checker, &file.content)
            .await
            .and_then(|messages| Report::read(&file, &messages).into_state(&self.naming));
        let expected = self.tree.current_state().goal_count();
        match result {
            Ok((state, _)) => {
                if state.goal_count() != expected {
                    warn!(
                        "re-submission gave {} goals, history says {}",
                        state.goal_count(),
                        expected
                    );
                }
                let _ = self.channels.proof_states.send(self.tree.current_state().clone());
                Ok(())
            }
            Err(error) => {
                warn!("re-submission failed: {}", error);
                self.notify_error(None, error.to_string());
                Err(error)
            }
        }
    }

    pub async fn undo(&mut self) -> Result<bool, StepError> {
        if !self.tree.undo() {
            return Ok(false);
        }
        debug!(cursor = self.tree.history_cursor(), "undo");
        self.resync().await.map(|_| true)
    }

    pub async fn redo(&mut self) -> Result<bool, StepError> {
        if !self.tree.redo() {
            return Ok(false);
        }
        debug!(cursor = self.tree.history_cursor(), "redo");
        self.resync().await.map(|_| true)
    }

    pub async fn rewind(&mut self) -> Result<(), StepError> {
        self.tree.rewind();
        self.resync().await
    }

    pub async fn go_to(&mut self, id: StepId) -> Result<bool, StepError> {
        if !self.tree.go_to(id) {
            return Ok(false);
        }
        self.resync().await.map(|_| true)
    }

    /// Move the history cursor; returns the new cursor
    pub async fn move_cursor(&mut self, m: CursorMove) -> Result<usize, StepError> {
        let before = self.tree.history_cursor();
        let after = self.tree.move_cursor(m);
        if after != before {
            self.resync().await?;
        }
        Ok(after)
    }
}

/// Check a file; a crashed prover is restarted once and the file re-sent
async fn check_with_restart<C: ProofChecker>(
    checker: &mut C,
    content: &str,
) -> Result<Vec<ProverMessage>, StepError> {
    let timeout = checker.timeout();
    match checker.check(content, timeout).await {
        Err(e) if e.is_crash() => {
            warn!("prover crashed ({}), restarting", e);
            checker
                .restart()
                .await
                .map_err(|e| StepError::ProverCrashed(e.to_string()))?;
            checker.check(content, timeout).await.map_err(|e| {
                if e.is_crash() {
                    StepError::ProverCrashed(e.to_string())
                } else {
                    e.into()
                }
            })
        }
        other => other.map_err(StepError::from),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn file() -> VirtualFile {
        VirtualFile {
            content: String::new(),
            new_lines: Some(12..=12),
            hypo_line: 13,
            targets_line: 14,
            end_line: 15,
        }
    }

    fn msg(line: usize, severity: Severity, text: &str) -> ProverMessage {
        ProverMessage {
            file_name: "exercise.lean".into(),
            pos_line: line,
            pos_col: 2,
            severity,
            caption: String::new(),
            text: text.into(),
        }
    }

    #[test]
    fn test_report_classifies_messages() {
        let messages = vec![
            msg(12, Severity::Information, "EFFECTIVE CODE n°0.1"),
            msg(3, Severity::Error, "unknown identifier 'foo'"),
            msg(13, Severity::Information, "context:\nOBJECT[...]"),
            msg(14, Severity::Information, "targets:\nPROPERTY[...]"),
            msg(15, Severity::Error, "tactic failed, there are unsolved goals"),
        ];
        let report = Report::read(&file(), &messages);
        assert_eq!(report.probes, vec![(0, 1)]);
        assert!(report.error.is_none());
        assert!(report.hypo.as_deref().is_some_and(|h| h.starts_with("context:")));
        assert!(report.targets.is_some());
        assert!(!report.no_goals);
    }

    #[test]
    fn test_report_error_in_new_lines() {
        let messages = vec![
            msg(12, Severity::Error, "apply tactic failed"),
            msg(12, Severity::Error, "second error"),
        ];
        let report = Report::read(&file(), &messages);
        assert_eq!(
            report.error,
            Some(StepError::failed("apply tactic failed", Some(12)))
        );
        assert!(matches!(
            report.into_state(&NamingConfig::default()),
            Err(StepError::ProverRequestFailed { .. })
        ));
    }

    #[test]
    fn test_report_no_goals() {
        let messages = vec![msg(13, Severity::Error, "no goals")];
        let report = Report::read(&file(), &messages);
        assert!(report.no_goals);
        let (state, _) = report.into_state(&NamingConfig::default()).unwrap();
        assert!(state.is_complete());
    }

    #[test]
    fn test_missing_analysis_is_no_proof_state() {
        let report = Report::read(&file(), &[]);
        assert_eq!(
            report.into_state(&NamingConfig::default()),
            Err(StepError::NoProofState)
        );
    }

    #[test]
    fn test_goal_stack_updates() {
        let stack = vec!["Main goal".to_string()];
        let labels = vec![
            BranchLabel::active("Proof of first conjunct: P"),
            BranchLabel::pending("Proof of second conjunct: Q"),
        ];
        let split = next_goal_stack(&stack, 1, &labels, 2);
        assert_eq!(split, vec!["Proof of first conjunct: P", "Proof of second conjunct: Q"]);

        let closed = next_goal_stack(&split, -1, &[], 1);
        assert_eq!(closed, vec!["Proof of second conjunct: Q"]);

        let chosen = vec![
            BranchLabel::pending("First disjunct: P"),
            BranchLabel::active("Second disjunct: Q"),
        ];
        assert_eq!(next_goal_stack(&stack, 0, &chosen, 1), vec!["Second disjunct: Q"]);
        assert!(next_goal_stack(&stack, -1, &[], 0).is_empty());
    }
}
