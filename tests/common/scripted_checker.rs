// SPDX-FileCopyrightText: 2025 ECHIDNA Project Team
// SPDX-License-Identifier: PMPL-1.0-or-later

//! A `ProofChecker` that answers virtual files from a script
//!
//! The responder sees the proof body of every submitted file and decides
//! what the prover would have said about it.

use async_trait::async_trait;
use proofdriver::error::{SessionError, SessionResult};
use proofdriver::session::protocol::{ProverMessage, Severity};
use proofdriver::session::{ProofChecker, SessionEvent, SessionState};
use proofdriver::tactic::catalogue::EFFECTIVE_CODE;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::broadcast;

use super::Dump;

/// A submitted live-step file, decoded
#[derive(Debug, Clone, PartialEq)]
pub struct Submission {
    pub content: String,
    /// Tactic lines between `begin` and the analysis, without the trailing comma
    pub body: Vec<String>,
    pub hypo_line: usize,
    pub targets_line: usize,
    pub end_line: usize,
}

impl Submission {
    pub fn parse(content: &str) -> Option<Self> {
        let lines: Vec<&str> = content.lines().collect();
        let hypo = lines
            .iter()
            .position(|l| l.trim_start().starts_with("hypo_analysis"))?;
        let begin = lines[..hypo].iter().rposition(|l| l.trim() == "begin")?;
        let body = lines[begin + 1..hypo]
            .iter()
            .map(|l| l.trim().trim_end_matches(',').to_string())
            .collect();
        Some(Submission {
            content: content.to_string(),
            body,
            hypo_line: hypo + 1,
            targets_line: hypo + 2,
            end_line: hypo + 3,
        })
    }

    /// Number of tactic lines
    pub fn depth(&self) -> usize {
        self.body.len()
    }

    pub fn last_step(&self) -> Option<&str> {
        self.body.last().map(String::as_str)
    }

    /// Line of the last tactic
    pub fn last_line(&self) -> usize {
        self.hypo_line - 1
    }
}

/// What the prover says about one file
#[derive(Debug, Clone, PartialEq)]
pub enum Answer {
    State(Dump),
    NoGoals,
    /// Error on the last tactic line
    Error(String),
    /// `or_else` probes `(node, alt)` that fired, then another answer
    Fired(Vec<(usize, usize)>, Box<Answer>),
    /// Never answers
    Silent,
    /// The prover dies
    Crash,
}

type Responder = Box<dyn FnMut(&str) -> SessionResult<Vec<ProverMessage>> + Send>;

pub struct ScriptedChecker {
    respond: Responder,
    submissions: Arc<Mutex<Vec<String>>>,
    restarts: Arc<AtomicUsize>,
    events: broadcast::Sender<SessionEvent>,
    timeout: Duration,
}

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

/// Prover messages for `answer` on `sub`
pub fn messages_for(sub: &Submission, answer: &Answer, timeout: Duration) -> SessionResult<Vec<ProverMessage>> {
    match answer {
        Answer::State(dump) => Ok(vec![
            message(sub.hypo_line, Severity::Information, &dump.hypo),
            message(sub.targets_line, Severity::Information, &dump.targets),
            message(
                sub.end_line,
                Severity::Error,
                "tactic failed, there are unsolved goals\nstate: ...",
            ),
        ]),
        Answer::NoGoals => Ok(vec![
            message(sub.hypo_line, Severity::Error, "no goals"),
            message(sub.targets_line, Severity::Error, "no goals"),
        ]),
        Answer::Error(text) => Ok(vec![message(sub.last_line(), Severity::Error, text)]),
        Answer::Fired(probes, rest) => {
            let mut msgs: Vec<ProverMessage> = probes
                .iter()
                .map(|(node, alt)| {
                    message(
                        sub.last_line(),
                        Severity::Information,
                        &format!("{EFFECTIVE_CODE}{node}.{alt}"),
                    )
                })
                .collect();
            msgs.extend(messages_for(sub, rest, timeout)?);
            Ok(msgs)
        }
        Answer::Silent => Err(SessionError::timeout(0, timeout)),
        Answer::Crash => Err(SessionError::ChannelClosed),
    }
}

impl ScriptedChecker {
    /// Checker answering raw file contents
    pub fn raw(respond: impl FnMut(&str) -> SessionResult<Vec<ProverMessage>> + Send + 'static) -> Self {
        let (events, _) = broadcast::channel(64);
        ScriptedChecker {
            respond: Box::new(respond),
            submissions: Arc::new(Mutex::new(Vec::new())),
            restarts: Arc::new(AtomicUsize::new(0)),
            events,
            timeout: Duration::from_secs(30),
        }
    }

    /// Checker answering decoded live-step files
    pub fn new(mut respond: impl FnMut(&Submission) -> Answer + Send + 'static) -> Self {
        let timeout = Duration::from_secs(30);
        ScriptedChecker::raw(move |content| match Submission::parse(content) {
            Some(sub) => {
                let answer = respond(&sub);
                messages_for(&sub, &answer, timeout)
            }
            None => Ok(Vec::new()),
        })
    }

    /// `answers[n]` for a proof with `n` tactic lines
    pub fn by_depth(answers: Vec<Answer>) -> Self {
        ScriptedChecker::new(move |sub| {
            answers
                .get(sub.depth())
                .cloned()
                .unwrap_or_else(|| Answer::Error("unexpected step".into()))
        })
    }

    /// Contents submitted so far
    pub fn submissions(&self) -> Arc<Mutex<Vec<String>>> {
        Arc::clone(&self.submissions)
    }

    pub fn restarts(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.restarts)
    }
}

#[async_trait]
impl ProofChecker for ScriptedChecker {
    async fn check(&mut self, content: &str, _timeout: Duration) -> SessionResult<Vec<ProverMessage>> {
        self.submissions.lock().unwrap().push(content.to_string());
        let _ = self.events.send(SessionEvent::State(SessionState::Active));
        let result = (self.respond)(content);
        if result.is_ok() {
            let _ = self.events.send(SessionEvent::State(SessionState::Ready));
        }
        result
    }

    async fn restart(&mut self) -> SessionResult<()> {
        self.restarts.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn events(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_submission_body() {
        let content = "lemma t : true :=\nbegin\n  intro x,\n  hypo_analysis,\n  targets_analysis\nend\n";
        let sub = Submission::parse(content).unwrap();
        assert_eq!(sub.body, vec!["intro x"]);
        assert_eq!(sub.hypo_line, 4);
        assert_eq!(sub.last_line(), 3);
        assert_eq!(sub.end_line, 6);
    }
}
