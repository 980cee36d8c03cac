// SPDX-FileCopyrightText: 2025 ECHIDNA Project Team
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Line-delimited JSON protocol spoken by the prover server

use serde::{Deserialize, Serialize};

/// Request sent to the prover, one JSON object per line
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Request {
    pub seq_num: u64,
    #[serde(flatten)]
    pub command: Command,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum Command {
    /// Replace the content of a file and re-check it
    Sync { file_name: String, content: String },
    /// Information at a position
    Info {
        file_name: String,
        line: usize,
        column: usize,
    },
}

impl Command {
    pub fn name(&self) -> &'static str {
        match self {
            Command::Sync { .. } => "sync",
            Command::Info { .. } => "info",
        }
    }
}

impl Request {
    /// Encoded request, newline-terminated
    pub fn to_line(&self) -> serde_json::Result<String> {
        let mut line = serde_json::to_string(self)?;
        line.push('\n');
        Ok(line)
    }
}

/// Message severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Information,
    Warning,
    Error,
}

/// A message attached to a file position
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProverMessage {
    pub file_name: String,
    pub pos_line: usize,
    pub pos_col: usize,
    pub severity: Severity,
    #[serde(default)]
    pub caption: String,
    pub text: String,
}

impl ProverMessage {
    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

/// A task the prover is working on
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub file_name: String,
    pub pos_line: usize,
    pub pos_col: usize,
    #[serde(default)]
    pub end_pos_line: usize,
    #[serde(default)]
    pub end_pos_col: usize,
    #[serde(default)]
    pub desc: String,
}

/// Any line the prover may print
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "response", rename_all = "snake_case")]
pub enum Response {
    Ok {
        seq_num: u64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },
    Error {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        seq_num: Option<u64>,
        message: String,
    },
    AllMessages {
        msgs: Vec<ProverMessage>,
    },
    CurrentTasks {
        is_running: bool,
        #[serde(default)]
        tasks: Vec<Task>,
    },
    #[serde(other)]
    Unknown,
}

/// Reply to a submitted request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandReply {
    pub seq_num: u64,
    pub message: Option<String>,
}

/// `ok` message when the synced content did not change
pub const FILE_UNCHANGED: &str = "file unchanged";

/// `ok` message when the synced content was accepted for checking
pub const FILE_INVALIDATED: &str = "file invalidated";
