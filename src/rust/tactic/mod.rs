// SPDX-FileCopyrightText: 2025 ECHIDNA Project Team
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Tactic code: combinators, the tactic catalogue and the button builders

pub mod builders;
pub mod catalogue;
pub mod code;

pub use builders::{build_step, BuildContext, BuiltStep, Button, UserAction, UserInput};
pub use code::{Combinator, TacticCode};
