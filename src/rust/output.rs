// SPDX-FileCopyrightText: 2025 ECHIDNA Project Team
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Output formatting module for CLI
//!
//! Provides JSON and pretty-printed text output with colors

use anyhow::Result;
use colored::Colorize;
use proofdriver::batch::{InitialState, ReplayRecord, ReplayReport};
use proofdriver::config::DisplayConfig;
use proofdriver::proof_state::{ContextMathObject, ContextTag};
use proofdriver::{render, Format, ProofState, ProofStep};
use serde::Serialize;
use std::fmt::Display;
use std::str::FromStr;

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
}

impl FromStr for OutputFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            _ => Err(anyhow::anyhow!("Invalid output format: {}. Must be 'text' or 'json'", s)),
        }
    }
}

impl Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Text => write!(f, "text"),
            OutputFormat::Json => write!(f, "json"),
        }
    }
}

/// Output formatter for different output formats
pub struct OutputFormatter {
    format: OutputFormat,
    display: DisplayConfig,
}

impl OutputFormatter {
    pub fn new(format: OutputFormat, display: DisplayConfig) -> Self {
        Self { format, display }
    }

    pub fn format(&self) -> OutputFormat {
        self.format
    }

    /// Output a success message
    pub fn success(&self, message: &str) -> Result<()> {
        self.message("success", message, |m| m.green().bold().to_string())
    }

    /// Output an error message
    pub fn error(&self, message: &str) -> Result<()> {
        match self.format {
            OutputFormat::Text => {
                eprintln!("{} {}", "Error:".red().bold(), message.red());
            }
            OutputFormat::Json => {
                self.output_json(&JsonMessage {
                    level: "error",
                    message,
                })?;
            }
        }
        Ok(())
    }

    pub fn warning(&self, message: &str) -> Result<()> {
        self.message("warning", message, |m| {
            format!("{} {}", "Warning:".yellow().bold(), m.yellow())
        })
    }

    pub fn info(&self, message: &str) -> Result<()> {
        self.message("info", message, |m| format!("{} {}", "ℹ".blue(), m))
    }

    fn message(&self, level: &str, message: &str, styled: impl Fn(&str) -> String) -> Result<()> {
        match self.format {
            OutputFormat::Text => println!("{}", styled(message)),
            OutputFormat::Json => self.output_json(&JsonMessage { level, message })?,
        }
        Ok(())
    }

    fn object_line(&self, entry: &ContextMathObject) -> String {
        let ty = render(entry.math_type(), self.display.format, self.display.depth);
        let name = match entry.tag {
            ContextTag::New => entry.name().green().bold(),
            ContextTag::Modified => entry.name().yellow().bold(),
            ContextTag::Unchanged => entry.name().cyan(),
        };
        format!("{} : {}", name, ty)
    }

    /// Output a proof state
    pub fn output_proof_state(&self, state: &ProofState) -> Result<()> {
        match self.format {
            OutputFormat::Text => self.output_proof_state_text(state),
            OutputFormat::Json => self.output_json(state),
        }
    }

    fn output_proof_state_text(&self, state: &ProofState) -> Result<()> {
        println!();
        if state.is_complete() {
            println!("{}", "✓ No goals remaining (QED)".green().bold());
            println!();
            return Ok(());
        }

        println!("{} ({}):", "Goals".yellow().bold(), state.goal_count());
        for (i, goal) in state.goals.iter().enumerate() {
            let title = if i == 0 { "Main goal" } else { "Goal" };
            println!("\n  {} {}", title.bright_blue(), i + 1);

            let objects: Vec<_> = goal.objects().collect();
            if !objects.is_empty() {
                println!("  {}:", "Objects".cyan());
                for entry in objects {
                    println!("    {}", self.object_line(entry));
                }
            }
            let props: Vec<_> = goal.propositions().collect();
            if !props.is_empty() {
                println!("  {}:", "Properties".cyan());
                for entry in props {
                    println!("    {}", self.object_line(entry));
                }
            }

            println!("  {}", "Target:".yellow());
            println!(
                "    {}",
                render(&goal.target, self.display.format, self.display.depth)
            );
        }
        println!();
        Ok(())
    }

    /// Output a sealed step
    pub fn output_step(&self, step: &ProofStep) -> Result<()> {
        match self.format {
            OutputFormat::Json => self.output_json(step),
            OutputFormat::Text => {
                match (&step.error, &step.success_msg) {
                    (Some(error), _) => println!("{} {}", "✗".red().bold(), error.to_string().red()),
                    (None, Some(msg)) => println!("{} {}", "✓".green().bold(), msg),
                    (None, None) => println!("{}", "✓".green().bold()),
                }
                if let Some(code) = step.effective_code.as_ref().or(step.code.as_ref()) {
                    println!("  {} {}", "code:".dimmed(), code.to_source(true).dimmed());
                }
                if !step.goal_stack.is_empty() {
                    println!("  {} {}", "goals:".dimmed(), step.goal_stack.join(" | "));
                }
                Ok(())
            }
        }
    }

    /// Output the initial states of a batch
    pub fn output_initial_states(&self, states: &[InitialState]) -> Result<()> {
        if self.format == OutputFormat::Json {
            return self.output_json(&states);
        }
        for item in states {
            println!("{}", item.lean_name.bright_magenta().bold());
            match &item.state {
                Ok(state) => self.output_proof_state_text(state)?,
                Err(e) => println!("  {} {}\n", "✗".red().bold(), e.to_string().red()),
            }
        }
        Ok(())
    }

    /// Output one replayed script entry
    pub fn output_record(&self, record: &ReplayRecord) -> Result<()> {
        match self.format {
            OutputFormat::Json => self.output_json(record),
            OutputFormat::Text => {
                let mark = if record.ok { "✓".green().bold() } else { "✗".red().bold() };
                let step = record
                    .step
                    .map_or_else(String::new, |s| format!(" step {}", s));
                print!("{} [{}]{}", mark, record.index, step);
                if let Some(message) = &record.message {
                    print!(": {}", message);
                }
                println!(" {}", format!("(history {})", record.history_cursor).dimmed());
                Ok(())
            }
        }
    }

    /// Output the summary of a replay
    pub fn output_replay_summary(&self, report: &ReplayReport) -> Result<()> {
        match self.format {
            OutputFormat::Json => self.output_json(&ReplaySummary {
                exit_code: report.exit_code.code(),
                complete: report.complete,
                failed: report.records.iter().filter(|r| !r.ok).count(),
            }),
            OutputFormat::Text => {
                println!();
                if report.complete {
                    println!("{}", "✓ Proof complete".green().bold());
                } else {
                    println!("{}", "Proof incomplete".yellow());
                }
                let failed = report.records.iter().filter(|r| !r.ok).count();
                if failed > 0 {
                    println!("{} of {} entries failed", failed, report.records.len());
                }
                Ok(())
            }
        }
    }

    /// Output a rendered object in every requested format
    pub fn output_rendering(&self, rendered: &[(Format, String)]) -> Result<()> {
        match self.format {
            OutputFormat::Json => {
                let map: std::collections::BTreeMap<String, &str> = rendered
                    .iter()
                    .map(|(f, s)| (f.to_string(), s.as_str()))
                    .collect();
                self.output_json(&map)
            }
            OutputFormat::Text => {
                for (format, text) in rendered {
                    println!("{:>5}: {}", format.to_string().cyan(), text);
                }
                Ok(())
            }
        }
    }

    /// Output JSON
    fn output_json<T: Serialize + ?Sized>(&self, data: &T) -> Result<()> {
        let json = serde_json::to_string_pretty(data)?;
        println!("{}", json);
        Ok(())
    }
}

#[derive(Serialize)]
struct JsonMessage<'a> {
    level: &'a str,
    message: &'a str,
}

#[derive(Serialize)]
struct ReplaySummary {
    exit_code: u8,
    complete: bool,
    failed: usize,
}
