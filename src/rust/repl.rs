// SPDX-FileCopyrightText: 2025 ECHIDNA Project Team
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Interactive REPL for driving a proof
//!
//! Each line is a button followed by the selected context names, e.g.
//! `implies H1`; builders asking for more input are answered inline.

use anyhow::Result;
use colored::Colorize;
use proofdriver::error::{InputKind, InputRequest};
use proofdriver::session::ProofChecker;
use proofdriver::{Button, Coordinator, StepOutcome, UserAction, UserInput};
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;

use crate::output::OutputFormatter;

/// REPL state
pub struct ReplState<'a, C: ProofChecker> {
    coordinator: Coordinator<C>,
    formatter: &'a OutputFormatter,
    exercise: String,
}

impl<'a, C: ProofChecker> ReplState<'a, C> {
    pub fn new(coordinator: Coordinator<C>, formatter: &'a OutputFormatter, exercise: &str) -> Self {
        Self {
            coordinator,
            formatter,
            exercise: exercise.to_string(),
        }
    }
}

/// What the user typed
#[derive(Debug, Clone, PartialEq)]
enum Line {
    Meta(String, Vec<String>),
    Action(UserAction),
}

/// Read one input line: `:cmd args`, `apply <statement> [names]` or `<button> [names]`
fn parse_line(line: &str) -> Result<Line> {
    if let Some(rest) = line.strip_prefix(':') {
        let mut parts = rest.split_whitespace().map(str::to_string);
        let command = parts.next().unwrap_or_default().to_lowercase();
        return Ok(Line::Meta(command, parts.collect()));
    }
    let mut words = line.split_whitespace();
    let head = words.next().unwrap_or_default();
    let action = if head == "apply" {
        let statement = words
            .next()
            .ok_or_else(|| anyhow::anyhow!("Usage: apply <statement> [names]"))?;
        UserAction::statement(statement)
    } else {
        UserAction::button(head.parse::<Button>()?)
    };
    Ok(Line::Action(action.select(words)))
}

/// Start the interactive REPL
pub async fn start_repl<C: ProofChecker>(mut state: ReplState<'_, C>) -> Result<()> {
    print_welcome(&state.exercise);
    state.formatter.output_proof_state(state.coordinator.current_state())?;

    let mut rl = DefaultEditor::new()?;

    loop {
        let prompt = create_prompt(&state);
        match rl.readline(&prompt) {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                rl.add_history_entry(line)?;

                match handle_line(&mut state, &mut rl, line).await {
                    Ok(true) => {}
                    Ok(false) => break,
                    Err(e) => eprintln!("{}", format!("Error: {}", e).red()),
                }
            }
            Err(ReadlineError::Interrupted) => {
                println!("CTRL-C");
                break;
            }
            Err(ReadlineError::Eof) => {
                println!("CTRL-D");
                break;
            }
            Err(err) => {
                eprintln!("Error: {:?}", err);
                break;
            }
        }
    }

    println!("{}", "Goodbye!".cyan());
    Ok(())
}

fn print_welcome(exercise: &str) {
    println!("{}", "╔═══════════════════════════════════════════════════════════╗".cyan());
    println!("{}", "║  proofdriver interactive session                         ║".cyan().bold());
    println!("{}", "╚═══════════════════════════════════════════════════════════╝".cyan());
    println!();
    println!("Exercise: {}", exercise.green().bold());
    println!();
    print_help();
}

fn print_help() {
    println!("{}", "Actions:".yellow().bold());
    let names: Vec<&str> = Button::ALL.iter().map(|b| b.name()).collect();
    println!("  <button> [names]     - one of: {}", names.join(", "));
    println!("  apply <stmt> [names] - rewrite with or apply a statement");
    println!("{}", "Commands:".yellow().bold());
    println!("  :state               - Show current proof state");
    println!("  :history             - Show the accepted steps");
    println!("  :undo / :redo        - Move back or forward one step");
    println!("  :rewind              - Back to the initial state");
    println!("  :goto <step>         - Jump to an accepted step");
    println!("  :help                - Show this help");
    println!("  :quit                - Exit");
    println!();
}

fn create_prompt<C: ProofChecker>(state: &ReplState<'_, C>) -> String {
    let goals = state.coordinator.current_state().goal_count();
    if goals == 0 {
        format!("{}> ", state.exercise.green())
    } else {
        format!("{}[{}]> ", state.exercise.cyan(), goals.to_string().yellow())
    }
}

async fn handle_line<C: ProofChecker>(
    state: &mut ReplState<'_, C>,
    rl: &mut DefaultEditor,
    line: &str,
) -> Result<bool> {
    match parse_line(line)? {
        Line::Meta(command, args) => handle_meta_command(state, &command, &args).await,
        Line::Action(action) => {
            run_action(state, rl, action).await?;
            Ok(true)
        }
    }
}

/// Run an action, asking for more input as long as the builder wants it
async fn run_action<C: ProofChecker>(
    state: &mut ReplState<'_, C>,
    rl: &mut DefaultEditor,
    mut action: UserAction,
) -> Result<()> {
    loop {
        match state.coordinator.step(action.clone()).await {
            StepOutcome::Sealed(id) | StepOutcome::Failed(id) => {
                if let Some(step) = state.coordinator.proof_tree().step(id) {
                    state.formatter.output_step(step)?;
                }
                state
                    .formatter
                    .output_proof_state(state.coordinator.current_state())?;
                return Ok(());
            }
            StepOutcome::WrongUserInput(reason) => {
                state.formatter.warning(&reason)?;
                return Ok(());
            }
            StepOutcome::NeedsMoreInput(request) => match ask(rl, &request)? {
                Some(input) => action = action.input(input),
                None => {
                    state.formatter.info("Action cancelled")?;
                    return Ok(());
                }
            },
        }
    }
}

/// Prompt for the input a builder asked for; `None` cancels
fn ask(rl: &mut DefaultEditor, request: &InputRequest) -> Result<Option<UserInput>> {
    println!("{}", request.prompt.yellow());
    for (i, (key, description)) in request.choices.iter().enumerate() {
        println!("  {}. {} {}", i, key.bold(), description);
    }
    let answer = match rl.readline("? ") {
        Ok(answer) => answer.trim().to_string(),
        Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    if answer.is_empty() {
        return Ok(None);
    }
    Ok(Some(match request.kind {
        InputKind::Choice => match answer.parse::<usize>() {
            Ok(i) => UserInput::Choice(i),
            Err(_) => {
                let index = request
                    .choices
                    .iter()
                    .position(|(key, _)| *key == answer)
                    .ok_or_else(|| anyhow::anyhow!("Unknown choice: {}", answer))?;
                UserInput::Choice(index)
            }
        },
        InputKind::Text | InputKind::Selection => UserInput::Text(answer),
    }))
}

async fn handle_meta_command<C: ProofChecker>(
    state: &mut ReplState<'_, C>,
    command: &str,
    args: &[String],
) -> Result<bool> {
    let coordinator = &mut state.coordinator;
    match command {
        "quit" | "exit" | "q" => return Ok(false),
        "help" | "h" => print_help(),
        "state" | "s" => state.formatter.output_proof_state(coordinator.current_state())?,
        "history" => {
            let steps: Vec<_> = coordinator.proof_tree().accepted().cloned().collect();
            if steps.is_empty() {
                state.formatter.info("No steps yet")?;
            }
            for step in &steps {
                print!("{} ", format!("#{}", step.id).bright_blue());
                state.formatter.output_step(step)?;
            }
        }
        "undo" | "u" => {
            if !coordinator.undo().await? {
                state.formatter.warning("Nothing to undo")?;
            }
            state.formatter.output_proof_state(coordinator.current_state())?;
        }
        "redo" | "r" => {
            if !coordinator.redo().await? {
                state.formatter.warning("Nothing to redo")?;
            }
            state.formatter.output_proof_state(coordinator.current_state())?;
        }
        "rewind" => {
            coordinator.rewind().await?;
            state.formatter.output_proof_state(coordinator.current_state())?;
        }
        "goto" | "g" => match args.first().and_then(|s| s.parse().ok()) {
            Some(step) => {
                if !coordinator.go_to(step).await? {
                    state.formatter.warning("Step is not in the history")?;
                }
                state.formatter.output_proof_state(coordinator.current_state())?;
            }
            None => eprintln!("{}", "Usage: :goto <step>".red()),
        },
        _ => {
            eprintln!("{}", format!("Unknown command: {}", command).red());
            println!("Type :help for available commands");
        }
    }
    Ok(true)
}
