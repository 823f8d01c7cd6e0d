//! Drive an external test runner through a file-based protocol.
//!
//! Every invocation has the shape `<program> <args..> <extra..> <path> <flag>=<file>..`, where
//! each file lives in a temporary directory scoped to that single invocation:
//!
//! - The input file lists the identifiers to execute, one per line, in order. The engine must
//!   execute only these tests, in exactly this order.
//! - The discovery file is written by the engine with every test it would execute, one per line,
//!   in discovery order.
//! - The results file is written by the engine as a JSON object mapping each executed identifier
//!   to whether it passed, in execution order. It must be written whether or not any test failed.
//!
//! Flags are joined to their file with `=` so that engines which infer a root directory from
//! path-like arguments (like pytest) ignore them.

use crate::{
    config::EngineConfig,
    engine::{Engine, Outcomes, Run},
    testid, Error, TestId,
};
use std::{ffi::OsString, fs, path::Path, process::Stdio};
use tokio::process::Command as Process;
use tracing::{debug, warn};

/// Name of the file listing the identifiers to execute.
const INPUT_FILE: &str = "testids.txt";

/// Name of the file the engine writes discovered identifiers to.
const DISCOVERY_FILE: &str = "discovered.txt";

/// Name of the file the engine writes results to.
const RESULTS_FILE: &str = "results.json";

/// An [Engine] backed by an external program.
#[derive(Clone, Debug)]
pub struct Command {
    config: EngineConfig,
    extra: Vec<String>,
}

impl Command {
    /// Create a new engine from `config`, passing `extra` arguments to every invocation.
    pub fn new(config: EngineConfig, extra: Vec<String>) -> Self {
        Self { config, extra }
    }

    fn process(&self, path: &Path) -> Process {
        let mut process = Process::new(&self.config.program);
        process
            .args(&self.config.args)
            .args(&self.extra)
            .arg(path)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .kill_on_drop(true);
        process
    }

    fn spawn_error(&self, err: std::io::Error) -> Error {
        Error::Collaborator(format!("failed to run {}: {err}", self.config.program))
    }
}

/// Join `name` and `file` with `=`.
fn flag(name: &str, file: &Path) -> OsString {
    let mut flag = OsString::from(name);
    flag.push("=");
    flag.push(file);
    flag
}

impl Engine for Command {
    async fn discover(&self, path: &Path) -> Result<Vec<TestId>, Error> {
        let dir = tempfile::tempdir()?;
        let output = dir.path().join(DISCOVERY_FILE);

        let mut process = self.process(path);
        process
            .arg(flag(&self.config.discovery_flag, &output))
            .args(&self.config.discovery_args);
        debug!(path = ?path, "discovering tests");
        let status = process.status().await.map_err(|e| self.spawn_error(e))?;
        if !status.success() {
            return Err(Error::Collaborator(format!("discovery failed: {status}")));
        }

        testid::load(&output)
            .map_err(|e| Error::Collaborator(format!("failed to read discovered tests: {e}")))
    }

    async fn run(&self, path: &Path, order: &[TestId], fail_fast: bool) -> Result<Run, Error> {
        let dir = tempfile::tempdir()?;
        let input = dir.path().join(INPUT_FILE);
        let results = dir.path().join(RESULTS_FILE);
        testid::write(&input, order)?;

        let mut process = self.process(path);
        process
            .arg(flag(&self.config.input_flag, &input))
            .arg(flag(&self.config.results_flag, &results));
        if fail_fast {
            process.args(&self.config.fail_fast_args);
        }
        debug!(path = ?path, tests = order.len(), fail_fast, "running tests");
        let status = process.status().await.map_err(|e| self.spawn_error(e))?;

        // A non-zero exit only means some test failed, the results file decides if the run is usable
        let contents = fs::read_to_string(&results).map_err(|e| {
            warn!(%status, "engine did not write results");
            Error::Collaborator(format!("failed to read results ({status}): {e}"))
        })?;
        let outcomes = Outcomes::from_json(&contents)?;
        debug!(%status, executed = outcomes.len(), "ran tests");
        Ok(Run {
            success: status.success(),
            outcomes,
        })
    }
}
