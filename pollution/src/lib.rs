//! Find the test that pollutes shared state and breaks another test.
//!
//! Tests that share process-wide state (globals, caches, files, environment) without cleaning
//! up can cause an otherwise-passing test to fail when they happen to run before it. This crate
//! automates the search for the responsible test:
//!
//! - [fuzz] repeatedly shuffles the suite (with a seeded, reproducible [rand::rngs::StdRng])
//!   until some ordering fails, surfacing the failing test.
//! - [bisect] takes a known failing test and the tests that ran before it and halves the
//!   candidates until a single culprit remains.
//!
//! Both consult the [oracle], which asks an [engine::Engine] to execute an ordered subset of the
//! suite. The engine is the only point of contact with the outside world: [engine::command]
//! drives an external test runner through a file-based protocol and [engine::mocks] simulates a
//! polluted suite in memory.
//!
//! # Limitations
//!
//! Only a single culprit is reported per invocation. When the first half of the candidates
//! already reproduces the failure, the second half is discarded without being tested, so a
//! second (independent) polluter is never reported.

use std::{future::Future, path::Path};
use thiserror::Error;

pub mod bisect;
pub mod config;
pub mod engine;
pub mod format;
pub mod fuzz;
pub mod oracle;
pub mod testid;

pub use testid::TestId;

/// Why a failing test could not be attributed to pollution.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Reason {
    /// The test fails even when run alone.
    FailsAlone,
    /// The test passes when run after all of the candidate tests.
    PassesWithLeading,
}

impl std::fmt::Display for Reason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Reason::FailsAlone => write!(f, "fails when run by itself"),
            Reason::PassesWithLeading => write!(f, "passes when run after the candidate tests"),
        }
    }
}

/// Errors that can occur while searching for a polluting test.
#[derive(Error, Debug)]
pub enum Error {
    #[error("invalid usage: {0}")]
    Usage(String),
    #[error("failing test was not part of discovered tests: {0}")]
    UnknownTarget(TestId),
    #[error("not reproducible: {target} {reason}")]
    NonReproducible { target: TestId, reason: Reason },
    #[error("search invariant violated: {target} unexpectedly passed after {culprit}")]
    SearchInvariantViolation { target: TestId, culprit: TestId },
    #[error("test engine failed: {0}")]
    Collaborator(String),
    #[error("no failing ordering found after {0} attempts")]
    Exhausted(u64),
    #[error("interrupted")]
    Interrupted,
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("config error: {0}")]
    Config(#[from] serde_yaml::Error),
}

/// Where the test identifiers of a suite come from.
///
/// Paths are kept as UTF-8 strings so that they can be rendered back into a command line
/// (see [format::format_command]) without loss.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Source {
    /// Discover tests under a path (file or directory) using the engine.
    Discover(String),
    /// Load pre-discovered identifiers (one per line) from a file.
    TestIds(String),
}

impl Source {
    /// Select the source from the (mutually exclusive) discovery path and identifier file.
    pub fn from_args(tests: Option<&str>, testids_file: Option<&str>) -> Result<Self, Error> {
        match (tests, testids_file) {
            (Some(path), None) => Ok(Source::Discover(path.to_string())),
            (None, Some(path)) => Ok(Source::TestIds(path.to_string())),
            (Some(_), Some(_)) => Err(Error::Usage(
                "only one of --tests or --testids-file may be provided".into(),
            )),
            (None, None) => Err(Error::Usage(
                "one of --tests or --testids-file is required".into(),
            )),
        }
    }
}

/// Load the test identifiers of a suite from `source`.
pub async fn load_tests<E: engine::Engine>(engine: &E, source: &Source) -> Result<Vec<TestId>, Error> {
    match source {
        Source::Discover(path) => {
            let tests = engine.discover(Path::new(path)).await?;
            tracing::info!(tests = tests.len(), path = path.as_str(), "discovered tests");
            Ok(tests)
        }
        Source::TestIds(path) => {
            let tests = testid::load(Path::new(path))?;
            tracing::info!(tests = tests.len(), path = path.as_str(), "pre-discovered tests");
            Ok(tests)
        }
    }
}

/// Run `operation` until it completes or `stop` resolves, whichever happens first.
///
/// If `stop` wins, `operation` is dropped mid-flight (killing any engine process it spawned and
/// removing its temporary files) and [Error::Interrupted] is returned.
pub async fn interruptible<T>(
    operation: impl Future<Output = Result<T, Error>>,
    stop: impl Future<Output = ()>,
) -> Result<T, Error> {
    tokio::select! {
        result = operation => result,
        _ = stop => Err(Error::Interrupted),
    }
}
