// SPDX-FileCopyrightText: 2025 ECHIDNA Project Team
// SPDX-License-Identifier: PMPL-1.0-or-later

//! proofdriver CLI - Main binary entry point
//!
//! Batch initial states, script replay, an interactive REPL and a renderer
//! for introspection trees

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use proofdriver::batch::{self, Script};
use proofdriver::parsers::parse_math_object;
use proofdriver::{
    render, Coordinator, Course, DriverConfig, ExitCode, Format, ProverSession, VirtualFileAssembler,
};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{info, info_span, warn, Instrument};
use uuid::Uuid;

mod output;
mod repl;

use output::{OutputFormat, OutputFormatter};

/// proofdriver - drive a prover server step by step from user actions
#[derive(Parser)]
#[command(name = "proofdriver")]
#[command(version, about, long_about = None)]
#[command(author = "ECHIDNA Project Team")]
struct Cli {
    /// Configuration file (TOML)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Output format (text, json)
    #[arg(long, global = true, default_value = "text")]
    format: OutputFormat,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Disable colors
    #[arg(long, global = true)]
    no_color: bool,

    /// Prover executable path (override configuration)
    #[arg(long, global = true)]
    executable: Option<PathBuf>,

    /// Library paths (added to configuration)
    #[arg(long, global = true)]
    library: Vec<PathBuf>,

    /// Per-request timeout in seconds (override configuration)
    #[arg(short, long, global = true)]
    timeout: Option<u64>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compute the initial proof state of exercises in one prover request
    InitialStates {
        /// Course source file
        course: PathBuf,

        /// Exercises to analyse (all if not specified)
        #[arg(short, long)]
        exercise: Vec<String>,
    },

    /// Replay a recorded action script on one exercise
    Replay {
        /// Course source file
        course: PathBuf,

        /// Script file (JSON)
        script: PathBuf,
    },

    /// Start interactive REPL mode on one exercise
    Interactive {
        /// Course source file
        course: PathBuf,

        /// Exercise name
        exercise: String,
    },

    /// Render an introspection tree in every display format
    Render {
        /// Tree text, e.g. `PROP_AND¿(...¿)`
        tree: String,
    },

    /// List the exercises found in a course file
    ListExercises {
        /// Course source file
        course: PathBuf,
    },
}

/// Disambiguates batch files across invocations sharing a prover
static BATCH_SEQ: AtomicU64 = AtomicU64::new(0);

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_tracing(cli.verbose);

    if cli.no_color {
        colored::control::set_override(false);
    }

    let config = load_config(&cli)?;
    let formatter = OutputFormatter::new(cli.format, config.display.clone());

    let run = Uuid::new_v4();
    let span = info_span!("run", id = %run.simple());

    let code = async {
        match cli.command {
            Commands::InitialStates { course, exercise } => {
                initial_states_command(&course, &exercise, &config, &formatter).await
            }
            Commands::Replay { course, script } => {
                replay_command(&course, &script, &config, &formatter).await
            }
            Commands::Interactive { course, exercise } => {
                interactive_command(&course, &exercise, &config, &formatter).await
            }
            Commands::Render { tree } => render_command(&tree, &config, &formatter),
            Commands::ListExercises { course } => list_command(&course, &formatter),
        }
    }
    .instrument(span)
    .await?;

    if code != ExitCode::Ok {
        std::process::exit(i32::from(code.code()));
    }
    Ok(())
}

/// Initialize tracing subscriber
fn init_tracing(verbose: bool) {
    use tracing_subscriber::filter::EnvFilter;
    use tracing_subscriber::{fmt, prelude::*};

    let filter = if verbose {
        EnvFilter::new("proofdriver=debug,info")
    } else {
        EnvFilter::new("proofdriver=info,warn")
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();
}

/// Configuration file, then command-line overrides
fn load_config(cli: &Cli) -> Result<DriverConfig> {
    let mut config = match &cli.config {
        Some(path) => DriverConfig::load(path)?,
        None => DriverConfig::default(),
    };
    if let Some(executable) = &cli.executable {
        config.prover.executable = executable.clone();
    }
    config.prover.library_paths.extend(cli.library.iter().cloned());
    if let Some(timeout) = cli.timeout {
        config.prover.timeout_secs = timeout;
    }
    Ok(config)
}

fn load_course(path: &Path) -> Result<Course> {
    let source = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read course {}", path.display()))?;
    let course = Course::scan(source);
    if course.exercises.is_empty() {
        warn!("no exercise found in {}", path.display());
    }
    Ok(course)
}

/// Start the prover behind a spinner
async fn start_prover(config: &DriverConfig, formatter: &OutputFormatter) -> Result<ProverSession> {
    let pb = create_progress_bar(formatter, "Starting prover...");
    let session = ProverSession::start(config.prover.clone()).await;
    pb.finish_and_clear();
    session.with_context(|| {
        format!(
            "Failed to start prover {}",
            config.prover.executable.display()
        )
    })
}

async fn initial_states_command(
    course_path: &Path,
    names: &[String],
    config: &DriverConfig,
    formatter: &OutputFormatter,
) -> Result<ExitCode> {
    let course = load_course(course_path)?;
    let exercises = if names.is_empty() {
        course.exercises.clone()
    } else {
        names
            .iter()
            .map(|name| {
                course
                    .exercise(name)
                    .cloned()
                    .ok_or_else(|| anyhow::anyhow!("Unknown exercise: {}", name))
            })
            .collect::<Result<Vec<_>>>()?
    };
    if exercises.is_empty() {
        formatter.warning("Nothing to analyse")?;
        return Ok(ExitCode::Ok);
    }

    let mut session = start_prover(config, formatter).await?;
    let pb = create_progress_bar(formatter, "Checking exercises...");
    let seq = BATCH_SEQ.fetch_add(1, Ordering::Relaxed);
    let states =
        batch::initial_states(&mut session, &course, &exercises, &config.naming, seq).await;
    pb.finish_and_clear();
    session.stop().await;
    let states = states?;

    formatter.output_initial_states(&states)?;
    let code = states
        .iter()
        .find_map(|s| s.state.as_ref().err())
        .map_or(ExitCode::Ok, ExitCode::from);
    info!(
        "{} of {} initial states retrieved",
        states.iter().filter(|s| s.state.is_ok()).count(),
        states.len()
    );
    Ok(code)
}

async fn replay_command(
    course_path: &Path,
    script_path: &Path,
    config: &DriverConfig,
    formatter: &OutputFormatter,
) -> Result<ExitCode> {
    let course = load_course(course_path)?;
    let text = std::fs::read_to_string(script_path)
        .with_context(|| format!("Failed to read script {}", script_path.display()))?;
    let script = Script::from_json(&text).context("Invalid script")?;
    let exercise = course
        .exercise(&script.exercise)
        .ok_or_else(|| anyhow::anyhow!("Unknown exercise: {}", script.exercise))?;
    let assembler = VirtualFileAssembler::new(&course, exercise)?;

    let session = start_prover(config, formatter).await?;
    let mut coordinator = match Coordinator::start(session, assembler, config).await {
        Ok(coordinator) => coordinator,
        Err(e) => {
            formatter.error(&format!("Cannot start {}: {}", script.exercise, e))?;
            return Ok(ExitCode::from(&e));
        }
    };
    if formatter.format() == OutputFormat::Text {
        formatter.output_proof_state(coordinator.current_state())?;
    }

    let report = batch::replay(&mut coordinator, &script.entries, |record| {
        if let Err(e) = formatter.output_record(record) {
            warn!("cannot print record {}: {}", record.index, e);
        }
    })
    .await;

    if formatter.format() == OutputFormat::Text {
        formatter.output_proof_state(coordinator.current_state())?;
    }
    formatter.output_replay_summary(&report)?;
    coordinator.checker_mut().stop().await;
    Ok(report.exit_code)
}

async fn interactive_command(
    course_path: &Path,
    name: &str,
    config: &DriverConfig,
    formatter: &OutputFormatter,
) -> Result<ExitCode> {
    let course = load_course(course_path)?;
    let exercise = course
        .exercise(name)
        .ok_or_else(|| anyhow::anyhow!("Unknown exercise: {}", name))?;
    let assembler = VirtualFileAssembler::new(&course, exercise)?;
    let session = start_prover(config, formatter).await?;
    let coordinator = Coordinator::start(session, assembler, config)
        .await
        .with_context(|| format!("Cannot start {}", name))?;

    repl::start_repl(repl::ReplState::new(coordinator, formatter, name)).await?;
    Ok(ExitCode::Ok)
}

fn render_command(tree: &str, config: &DriverConfig, formatter: &OutputFormatter) -> Result<ExitCode> {
    let obj = match parse_math_object(tree, &config.naming) {
        Ok(obj) => obj,
        Err(warning) => {
            formatter.error(&warning.to_string())?;
            return Ok(ExitCode::DecodingError);
        }
    };
    let rendered: Vec<(Format, String)> = [Format::Utf8, Format::Text, Format::Html, Format::Lean]
        .into_iter()
        .map(|format| (format, render(&obj, format, config.display.depth)))
        .collect();
    formatter.output_rendering(&rendered)?;
    Ok(ExitCode::Ok)
}

fn list_command(course_path: &Path, formatter: &OutputFormatter) -> Result<ExitCode> {
    let course = load_course(course_path)?;
    match formatter.format() {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&course.exercises)?),
        OutputFormat::Text => {
            println!("{}", "Exercises:".cyan().bold());
            for ex in &course.exercises {
                println!(
                    "  {} {}",
                    ex.lean_name.green(),
                    format!("(lines {}-{})", ex.begin_line, ex.end_line).dimmed()
                );
            }
        }
    }
    Ok(ExitCode::Ok)
}

/// Spinner on stderr; hidden when printing JSON
fn create_progress_bar(formatter: &OutputFormatter, message: &str) -> ProgressBar {
    if formatter.format() == OutputFormat::Json {
        return ProgressBar::hidden();
    }
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(message.to_string());
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    pb
}
