// SPDX-FileCopyrightText: 2025 ECHIDNA Project Team
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Error types for the proof driver
//!
//! Three layers: the prover session only ever fails with [`SessionError`],
//! tactic builders return [`BuildError`] (which is partly "ask the user
//! again" rather than a failure), and the coordinator seals failed steps
//! with a [`StepError`]. Batch tools map the latter to an [`ExitCode`].

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type for prover session operations
pub type SessionResult<T> = Result<T, SessionError>;

/// Errors surfaced by the prover session
#[derive(Debug, Error)]
pub enum SessionError {
    /// The prover could not be spawned or never became ready
    #[error("prover startup failed: {0}")]
    StartupFailed(String),

    /// No response within the deadline
    #[error("request {seq_num} timed out after {after:?}")]
    Timeout { seq_num: u64, after: Duration },

    /// The prover answered with an `error` response
    #[error("prover request failed: {0}")]
    RequestError(String),

    /// The prover exited (or the reader task stopped) while a request was in flight
    #[error("prover channel closed")]
    ChannelClosed,

    /// Writing to the prover failed
    #[error("prover I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A request could not be encoded
    #[error("failed to encode request: {0}")]
    Encode(#[from] serde_json::Error),
}

impl SessionError {
    pub fn timeout(seq_num: u64, after: Duration) -> Self {
        SessionError::Timeout { seq_num, after }
    }

    /// True when the child is gone and a restart may help
    pub fn is_crash(&self) -> bool {
        matches!(self, SessionError::ChannelClosed | SessionError::Io(_))
    }
}

/// What kind of extra input a builder wants from the user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputKind {
    /// Pick one of the offered choices
    Choice,
    /// Type a term or a proposition
    Text,
    /// Select more context items
    Selection,
}

/// A request for another round-trip with the user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputRequest {
    pub kind: InputKind,
    pub prompt: String,
    /// Offered choices, each `(key, description)`
    pub choices: Vec<(String, String)>,
}

impl InputRequest {
    pub fn choice(prompt: impl Into<String>, choices: Vec<(String, String)>) -> Self {
        InputRequest {
            kind: InputKind::Choice,
            prompt: prompt.into(),
            choices,
        }
    }

    pub fn text(prompt: impl Into<String>) -> Self {
        InputRequest {
            kind: InputKind::Text,
            prompt: prompt.into(),
            choices: Vec::new(),
        }
    }

    pub fn selection(prompt: impl Into<String>) -> Self {
        InputRequest {
            kind: InputKind::Selection,
            prompt: prompt.into(),
            choices: Vec::new(),
        }
    }
}

/// Outcome of a tactic builder that did not produce code
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BuildError {
    /// The builder needs another round-trip with the user
    #[error("more input needed: {}", .0.prompt)]
    NeedsMoreInput(InputRequest),

    /// Selection or input inconsistent with the button contract
    #[error("{0}")]
    WrongUserInput(String),
}

impl BuildError {
    pub fn wrong(reason: impl Into<String>) -> Self {
        BuildError::WrongUserInput(reason.into())
    }
}

/// Error kinds a sealed proof step can carry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepErrorKind {
    ProverRequestFailed,
    Timeout,
    Decoding,
    ProverCrashed,
    NoProofState,
}

/// Why a submitted step failed
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum StepError {
    /// The prover rejected the step (error response or error in the new lines)
    #[error("{message}")]
    ProverRequestFailed {
        message: String,
        line: Option<usize>,
    },

    /// No response within the deadline
    #[error("the prover did not answer in time")]
    Timeout,

    /// Malformed JSON or introspection text
    #[error("could not decode the prover output: {0}")]
    Decoding(String),

    /// The prover child exited and a restart did not help
    #[error("the prover crashed: {0}")]
    ProverCrashed(String),

    /// The prover answered but the analysis lines never arrived
    #[error("no proof state could be retrieved")]
    NoProofState,
}

impl StepError {
    pub fn failed(message: impl Into<String>, line: Option<usize>) -> Self {
        StepError::ProverRequestFailed {
            message: message.into(),
            line,
        }
    }

    pub fn kind(&self) -> StepErrorKind {
        match self {
            StepError::ProverRequestFailed { .. } => StepErrorKind::ProverRequestFailed,
            StepError::Timeout => StepErrorKind::Timeout,
            StepError::Decoding(_) => StepErrorKind::Decoding,
            StepError::ProverCrashed(_) => StepErrorKind::ProverCrashed,
            StepError::NoProofState => StepErrorKind::NoProofState,
        }
    }
}

impl From<SessionError> for StepError {
    fn from(e: SessionError) -> Self {
        match e {
            SessionError::Timeout { .. } => StepError::Timeout,
            SessionError::RequestError(message) => StepError::failed(message, None),
            SessionError::Encode(e) => StepError::Decoding(e.to_string()),
            SessionError::StartupFailed(m) => StepError::ProverCrashed(m),
            SessionError::ChannelClosed => StepError::ProverCrashed("channel closed".to_string()),
            SessionError::Io(e) => StepError::ProverCrashed(e.to_string()),
        }
    }
}

/// Exit codes of batch tools built on the driver
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExitCode {
    Ok = 0,
    UserInputError = 1,
    ProverRequestFailed = 2,
    Timeout = 3,
    DecodingError = 4,
    NoProofState = 5,
}

impl ExitCode {
    pub fn code(self) -> u8 {
        self as u8
    }
}

impl From<StepErrorKind> for ExitCode {
    fn from(kind: StepErrorKind) -> Self {
        match kind {
            StepErrorKind::ProverRequestFailed => ExitCode::ProverRequestFailed,
            StepErrorKind::Timeout => ExitCode::Timeout,
            StepErrorKind::Decoding => ExitCode::DecodingError,
            // A dead prover leaves nothing to inspect
            StepErrorKind::ProverCrashed | StepErrorKind::NoProofState => ExitCode::NoProofState,
        }
    }
}

impl From<&StepError> for ExitCode {
    fn from(e: &StepError) -> Self {
        e.kind().into()
    }
}

impl From<&BuildError> for ExitCode {
    fn from(_: &BuildError) -> Self {
        ExitCode::UserInputError
    }
}

/// A non-fatal problem met while decoding introspection text
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParseWarning {
    pub message: String,
    /// A bounded sample of the offending text
    pub sample: String,
}

impl ParseWarning {
    const SAMPLE_LEN: usize = 120;

    pub fn new(message: impl Into<String>, text: &str) -> Self {
        ParseWarning {
            message: message.into(),
            sample: text.chars().take(Self::SAMPLE_LEN).collect(),
        }
    }
}

impl std::fmt::Display for ParseWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} (near `{}`)", self.message, self.sample)
    }
}
