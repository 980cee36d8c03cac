// SPDX-FileCopyrightText: 2025 ECHIDNA Project Team
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Driver configuration
//!
//! Loaded from TOML, every field has a default so an empty file is valid.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::math_object::display::Format;

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DriverConfig {
    pub prover: ProverConfig,
    pub naming: NamingConfig,
    pub display: DisplayConfig,
}

/// How to launch and talk to the prover
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ProverConfig {
    /// Path to prover executable
    pub executable: PathBuf,

    /// Additional arguments
    pub args: Vec<String>,

    /// Library search paths written to the path-file
    pub library_paths: Vec<PathBuf>,

    /// Per-request timeout in seconds
    pub timeout_secs: u64,

    /// Time allowed for the first ready state
    pub startup_timeout_secs: u64,

    /// Number of sequence numbers that may be in flight
    pub seq_pool_capacity: usize,

    /// Capacity of each event channel
    pub listener_capacity: usize,

    /// Name of the virtual file sent with every `sync`
    pub file_name: Option<String>,
}

impl Default for ProverConfig {
    fn default() -> Self {
        ProverConfig {
            executable: PathBuf::from("lean"),
            args: vec!["--json".to_string(), "--server".to_string()],
            library_paths: vec![],
            timeout_secs: 30,
            startup_timeout_secs: 60,
            seq_pool_capacity: 1024,
            listener_capacity: 1024,
            file_name: None,
        }
    }
}

impl ProverConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn startup_timeout(&self) -> Duration {
        Duration::from_secs(self.startup_timeout_secs)
    }
}

/// Bound-variable and hypothesis naming options
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct NamingConfig {
    /// Allow `x''` before falling back to indices
    pub allow_double_prime: bool,

    /// Try the name chosen by the prover before type-based hints
    pub use_prover_names: bool,
}

impl Default for NamingConfig {
    fn default() -> Self {
        NamingConfig {
            allow_double_prime: true,
            use_prover_names: true,
        }
    }
}

/// Rendering defaults
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct DisplayConfig {
    pub format: Format,
    /// Maximal nesting shown before eliding with `…`
    pub depth: Option<usize>,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        DisplayConfig {
            format: Format::Utf8,
            depth: None,
        }
    }
}

impl DriverConfig {
    pub fn from_toml_str(s: &str) -> Result<Self> {
        toml::from_str(s).context("Invalid driver configuration")
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read configuration {}", path.display()))?;
        Self::from_toml_str(&content)
    }
}
