// SPDX-FileCopyrightText: 2025 ECHIDNA Project Team
// SPDX-License-Identifier: PMPL-1.0-or-later

//! proofdriver: the proof-driving core of an interactive proof tutor
//!
//! A user action (button, selection, inputs) becomes tactic code, the code
//! is checked by a long-running prover inside a virtual copy of the
//! exercise file, and the prover's introspection dumps are parsed back into
//! a proof state that is recorded in an undoable proof tree.

pub mod batch;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod math_object;
pub mod parsers;
pub mod proof_state;
pub mod proof_tree;
pub mod session;
pub mod tactic;
pub mod virtual_file;

pub use config::{DriverConfig, NamingConfig, ProverConfig};
pub use coordinator::{Coordinator, StepOutcome};
pub use error::{BuildError, ExitCode, SessionError, StepError};
pub use math_object::{render, Format, MathObject, NodeKind};
pub use proof_state::{Goal, ProofState};
pub use proof_tree::{ProofStep, ProofTree, StepId};
pub use session::{ProofChecker, ProverSession};
pub use tactic::{Button, TacticCode, UserAction, UserInput};
pub use virtual_file::{Course, Exercise, VirtualFileAssembler};
