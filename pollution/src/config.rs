//! Configuration loaded from an (optional) YAML file.

use crate::Error;
use serde::Deserialize;
use std::{fs::File, path::Path};

/// Seed used to shuffle the suite when none is provided.
pub const DEFAULT_SEED: u64 = 1542676187;

/// Configuration of the external test engine and its file protocol.
#[derive(Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(default)]
pub struct EngineConfig {
    /// Program to invoke.
    pub program: String,
    /// Arguments passed to every invocation (before any extra arguments and the test path).
    ///
    /// These must keep the engine quiet and disable any ordering it would impose itself.
    pub args: Vec<String>,
    /// Flag naming the file of identifiers to execute, in order.
    pub input_flag: String,
    /// Flag naming the file the engine writes discovered identifiers to.
    pub discovery_flag: String,
    /// Flag naming the file the engine writes per-test results to.
    pub results_flag: String,
    /// Arguments that make the engine discover (but not execute) tests.
    pub discovery_args: Vec<String>,
    /// Arguments that make the engine stop after the first failure.
    pub fail_fast_args: Vec<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            program: "python3".into(),
            args: [
                "-m",
                "pytest",
                "-p",
                "detect_test_pollution",
                "-p",
                "no:randomly",
                "--quiet",
                "--quiet",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
            input_flag: "--dtp-testids-input-file".into(),
            discovery_flag: "--dtp-testids-output-file".into(),
            results_flag: "--dtp-results-output-file".into(),
            discovery_args: vec!["--collect-only".into()],
            fail_fast_args: vec!["--maxfail=1".into()],
        }
    }
}

/// Configuration of a search.
#[derive(Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    pub engine: EngineConfig,
    /// Seed of the shuffle used while fuzzing.
    pub seed: u64,
    /// Maximum number of shuffles to try while fuzzing (unbounded if `None`).
    pub max_attempts: Option<u64>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            engine: EngineConfig::default(),
            seed: DEFAULT_SEED,
            max_attempts: None,
        }
    }
}

impl Config {
    /// Load a configuration from the YAML file at `path`.
    pub fn load(path: &Path) -> Result<Self, Error> {
        let file = File::open(path)?;
        let config: Config = serde_yaml::from_reader(file)?;
        if config.engine.program.is_empty() {
            return Err(Error::Usage("engine program must not be empty".into()));
        }
        if config.max_attempts == Some(0) {
            return Err(Error::Usage("max_attempts must be at least 1".into()));
        }
        Ok(config)
    }
}
