// SPDX-FileCopyrightText: 2025 ECHIDNA Project Team
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Virtual files
//!
//! Every check sends the prover a complete file: the course source up to
//! the exercise's `begin`, the accepted steps, the new step, the two
//! analysis tactics and whatever closes the proof and the enclosing
//! namespaces. Line numbers of the injected parts are recorded so that
//! prover messages can be attributed.

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::ops::RangeInclusive;
use tracing::{debug, warn};

use crate::tactic::catalogue::{HYPO_ANALYSIS, TARGETS_ANALYSIS};

const INDENT: &str = "  ";

/// One exercise of a course; line numbers are 1-based
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Exercise {
    pub lean_name: String,
    /// Line holding the proof's `begin`
    pub begin_line: usize,
    /// Line holding the proof's closing `end`
    pub end_line: usize,
    /// Prove the negation of the statement instead
    #[serde(default)]
    pub negate: bool,
    /// Statement text to negate
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub core_statement: Option<String>,
}

/// Course source and its exercises
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Course {
    pub source: String,
    pub exercises: Vec<Exercise>,
}

fn statement_name(line: &str) -> Option<&str> {
    let mut words = line.split_whitespace();
    let keyword = words.next()?;
    match keyword {
        "theorem" | "lemma" => words.next().map(|n| n.trim_end_matches(':')),
        "example" => Some("example"),
        _ => None,
    }
}

impl Course {
    pub fn new(source: impl Into<String>, exercises: Vec<Exercise>) -> Self {
        Course {
            source: source.into(),
            exercises,
        }
    }

    /// Course whose exercises are every `theorem`/`lemma`/`example` with a
    /// `begin ... end` proof
    pub fn scan(source: impl Into<String>) -> Self {
        let source = source.into();
        let mut exercises = Vec::new();
        let mut current: Option<(String, Option<usize>)> = None;
        let mut depth = 0usize;

        for (i, line) in source.lines().enumerate() {
            let number = i + 1;
            let trimmed = line.trim();
            if current.is_none() {
                if let Some(name) = statement_name(trimmed) {
                    current = Some((name.to_string(), None));
                }
            }
            let Some((name, begin)) = current.as_mut() else {
                continue;
            };
            if trimmed == "begin" || trimmed.ends_with(" begin") {
                if begin.is_none() {
                    *begin = Some(number);
                }
                depth += 1;
            } else if begin.is_some() && (trimmed == "end" || trimmed.starts_with("end,")) {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    if let Some(begin_line) = *begin {
                        exercises.push(Exercise {
                            lean_name: name.clone(),
                            begin_line,
                            end_line: number,
                            negate: false,
                            core_statement: None,
                        });
                    }
                    current = None;
                }
            }
        }
        Course { source, exercises }
    }

    pub fn exercise(&self, name: &str) -> Option<&Exercise> {
        self.exercises.iter().find(|e| e.lean_name == name)
    }

    fn lines(&self) -> Vec<String> {
        self.source.lines().map(str::to_string).collect()
    }

    fn check(&self, exercise: &Exercise) -> Result<()> {
        let count = self.source.lines().count();
        if exercise.begin_line == 0
            || exercise.end_line <= exercise.begin_line
            || exercise.end_line > count
        {
            bail!(
                "exercise {} has invalid proof lines {}..{} (source has {} lines)",
                exercise.lean_name,
                exercise.begin_line,
                exercise.end_line,
                count
            );
        }
        Ok(())
    }
}

/// Replace the last occurrence of `core` before `before` (exclusive, 0-based) by its negation
fn negate_statement(lines: &mut [String], before: usize, core: &str) -> bool {
    let end = before.min(lines.len());
    for line in lines[..end].iter_mut().rev() {
        if let Some(pos) = line.rfind(core) {
            line.replace_range(pos..pos + core.len(), &format!("¬ ({})", core));
            return true;
        }
    }
    false
}

fn apply_negation(lines: &mut [String], exercise: &Exercise) {
    if !exercise.negate {
        return;
    }
    match &exercise.core_statement {
        Some(core) => {
            if !negate_statement(lines, exercise.begin_line, core) {
                warn!(
                    "statement of {} not found, cannot negate it",
                    exercise.lean_name
                );
            }
        }
        None => warn!("{} is to be negated but has no core statement", exercise.lean_name),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Block {
    Namespace(String),
    Section(Option<String>),
    Proof,
}

/// `end` lines closing the namespaces and sections still open after `lines`
fn closings(lines: &[String]) -> Vec<String> {
    let mut stack = Vec::new();
    for line in lines {
        let trimmed = line.trim();
        let mut words = trimmed.split_whitespace();
        match words.next() {
            Some("namespace") => stack.push(Block::Namespace(words.next().unwrap_or("").to_string())),
            Some("section") => stack.push(Block::Section(words.next().map(str::to_string))),
            Some("end") | Some("end,") => {
                stack.pop();
            }
            _ if trimmed == "begin" || trimmed.ends_with(" begin") => stack.push(Block::Proof),
            _ => {}
        }
    }
    stack
        .iter()
        .rev()
        .filter_map(|b| match b {
            Block::Namespace(name) => Some(format!("end {}", name)),
            Block::Section(Some(name)) => Some(format!("end {}", name)),
            Block::Section(None) => Some("end".to_string()),
            Block::Proof => None,
        })
        .collect()
}

/// A file for one live step
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VirtualFile {
    pub content: String,
    /// Lines holding the new step's code
    pub new_lines: Option<RangeInclusive<usize>>,
    pub hypo_line: usize,
    pub targets_line: usize,
    /// Line of the proof's closing `end`
    pub end_line: usize,
}

impl VirtualFile {
    pub fn in_new_window(&self, line: usize) -> bool {
        self.new_lines.as_ref().is_some_and(|r| r.contains(&line))
    }

    /// Lines the analysis tactics sit on
    pub fn is_analysis_line(&self, line: usize) -> bool {
        line == self.hypo_line || line == self.targets_line
    }
}

/// Builds live-step files for one exercise
#[derive(Debug, Clone)]
pub struct VirtualFileAssembler {
    lean_name: String,
    preamble: Vec<String>,
    closings: Vec<String>,
    last_content: Option<String>,
    disambiguator: usize,
}

impl VirtualFileAssembler {
    pub fn new(course: &Course, exercise: &Exercise) -> Result<Self> {
        course.check(exercise)?;
        let mut lines = course.lines();
        apply_negation(&mut lines, exercise);
        let preamble = lines[..exercise.begin_line].to_vec();
        let closings = closings(&preamble);
        Ok(VirtualFileAssembler {
            lean_name: exercise.lean_name.clone(),
            preamble,
            closings,
            last_content: None,
            disambiguator: 0,
        })
    }

    pub fn lean_name(&self) -> &str {
        &self.lean_name
    }

    /// File running `accepted` then `new_code`, followed by the analysis
    pub fn live_step(&mut self, accepted: &[String], new_code: Option<&str>) -> VirtualFile {
        let mut lines = self.preamble.clone();
        for code in accepted.iter().filter(|c| !c.trim().is_empty()) {
            lines.push(format!("{INDENT}{code},"));
        }
        let new_lines = new_code.filter(|c| !c.trim().is_empty()).map(|code| {
            let start = lines.len() + 1;
            for part in code.lines() {
                lines.push(format!("{INDENT}{part}"));
            }
            if let Some(last) = lines.last_mut() {
                last.push(',');
            }
            start..=lines.len()
        });
        lines.push(format!("{INDENT}{HYPO_ANALYSIS},"));
        let hypo_line = lines.len();
        lines.push(format!("{INDENT}{TARGETS_ANALYSIS}"));
        let targets_line = lines.len();
        lines.push("end".to_string());
        let end_line = lines.len();
        lines.extend(self.closings.iter().cloned());

        let mut content = lines.join("\n");
        content.push('\n');
        if self.last_content.as_deref() == Some(content.as_str()) {
            self.disambiguator += 1;
            content.push_str(&format!("-- #{}\n", self.disambiguator));
            debug!("identical resubmission, disambiguated with #{}", self.disambiguator);
        }
        self.last_content = Some(content.clone());

        VirtualFile {
            content,
            new_lines,
            hypo_line,
            targets_line,
            end_line,
        }
    }
}

/// Which analysis a marker line carries
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Analysis {
    Hypotheses,
    Targets,
}

/// A file asking for the initial proof state of several exercises
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchFile {
    pub content: String,
    pub seq: u64,
    /// Injected line → (exercise index, analysis)
    by_line: BTreeMap<usize, (usize, Analysis)>,
    /// Exercise index → (hypotheses line, targets line)
    by_exercise: Vec<(usize, usize)>,
}

impl BatchFile {
    /// Replace each exercise's proof body by the two marked analysis tactics
    pub fn build(course: &Course, exercises: &[Exercise], seq: u64) -> Result<Self> {
        let mut order: Vec<usize> = (0..exercises.len()).collect();
        order.sort_by_key(|&i| exercises[i].begin_line);
        for pair in order.windows(2) {
            if exercises[pair[0]].end_line >= exercises[pair[1]].begin_line {
                bail!(
                    "exercises {} and {} overlap",
                    exercises[pair[0]].lean_name,
                    exercises[pair[1]].lean_name
                );
            }
        }

        let mut lines = course.lines();
        for exercise in exercises {
            course.check(exercise)?;
            apply_negation(&mut lines, exercise);
        }

        let mut out: Vec<String> = Vec::with_capacity(lines.len());
        let mut by_line = BTreeMap::new();
        let mut by_exercise = vec![(0, 0); exercises.len()];
        let mut next = 0;
        for &i in &order {
            let ex = &exercises[i];
            out.extend(lines[next..ex.begin_line].iter().cloned());
            let marker = format!("#{}.{}", seq, i);
            out.push(format!("{INDENT}{HYPO_ANALYSIS} {marker},"));
            let hypo = out.len();
            out.push(format!("{INDENT}{TARGETS_ANALYSIS} {marker}"));
            let targets = out.len();
            by_line.insert(hypo, (i, Analysis::Hypotheses));
            by_line.insert(targets, (i, Analysis::Targets));
            by_exercise[i] = (hypo, targets);
            // Keep the closing `end`
            next = ex.end_line - 1;
        }
        out.extend(lines[next..].iter().cloned());

        let mut content = out.join("\n");
        content.push('\n');
        Ok(BatchFile {
            content,
            seq,
            by_line,
            by_exercise,
        })
    }

    pub fn exercise_at(&self, line: usize) -> Option<(usize, Analysis)> {
        self.by_line.get(&line).copied()
    }

    pub fn lines_of(&self, exercise: usize) -> Option<(usize, usize)> {
        self.by_exercise.get(exercise).copied()
    }

    pub fn exercise_count(&self) -> usize {
        self.by_exercise.len()
    }
}
