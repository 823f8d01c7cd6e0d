//! Execute ordered subsets of a test suite.
//!
//! An [Engine] can discover the tests under a path and execute an arbitrary ordered subset of
//! them, reporting the outcome of each test that ran. Nothing else is assumed about how a
//! backend discovers or runs tests.

use crate::{Error, TestId};
use std::{future::Future, path::Path};

pub mod command;
pub mod mocks;

/// Interface that any test-execution backend must implement.
pub trait Engine {
    /// Discover all tests under `path`, in discovery order.
    fn discover(&self, path: &Path) -> impl Future<Output = Result<Vec<TestId>, Error>> + Send;

    /// Execute exactly the tests in `order` (and no others), in that order.
    ///
    /// `path` must contain every test in `order`. If `fail_fast` is set, execution stops after the
    /// first failing test and only the tests that ran are present in the returned [Outcomes].
    ///
    /// A failing test is not an error: it is reported as `false` in [Run::outcomes]. An error is
    /// only returned if the engine itself could not produce results.
    fn run(
        &self,
        path: &Path,
        order: &[TestId],
        fail_fast: bool,
    ) -> impl Future<Output = Result<Run, Error>> + Send;
}

/// Result of a single [Engine::run].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Run {
    /// Whether every executed test passed.
    pub success: bool,
    /// Outcome of each executed test, in execution order.
    pub outcomes: Outcomes,
}

/// Pass (`true`) or fail (`false`) per executed test, in execution order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Outcomes(Vec<(TestId, bool)>);

impl Outcomes {
    /// Record the outcome of `test`, replacing any earlier outcome for it.
    pub fn insert(&mut self, test: TestId, passed: bool) {
        match self.0.iter_mut().find(|(id, _)| *id == test) {
            Some((_, existing)) => *existing = passed,
            None => self.0.push((test, passed)),
        }
    }

    /// Returns the outcome of `test`, if it was executed.
    pub fn get(&self, test: &TestId) -> Option<bool> {
        self.0
            .iter()
            .find_map(|(id, passed)| (id == test).then_some(*passed))
    }

    /// Returns the last executed test and its outcome.
    pub fn last(&self) -> Option<(&TestId, bool)> {
        self.0.last().map(|(id, passed)| (id, *passed))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&TestId, bool)> {
        self.0.iter().map(|(id, passed)| (id, *passed))
    }

    /// Parse a results document: a JSON object mapping each identifier to a boolean, with keys
    /// in execution order.
    pub fn from_json(contents: &str) -> Result<Self, Error> {
        let document: serde_json::Value = serde_json::from_str(contents)
            .map_err(|e| Error::Collaborator(format!("invalid results: {e}")))?;
        let serde_json::Value::Object(map) = document else {
            return Err(Error::Collaborator("results must be an object".into()));
        };
        // Keys of a JSON object are already unique
        let mut outcomes = Vec::with_capacity(map.len());
        for (id, value) in map {
            let Some(passed) = value.as_bool() else {
                return Err(Error::Collaborator(format!(
                    "result for {id} is not a boolean: {value}"
                )));
            };
            outcomes.push((TestId::from(id), passed));
        }
        Ok(Self(outcomes))
    }
}

impl FromIterator<(TestId, bool)> for Outcomes {
    fn from_iter<I: IntoIterator<Item = (TestId, bool)>>(iter: I) -> Self {
        let mut outcomes = Self::default();
        for (id, passed) in iter {
            outcomes.insert(id, passed);
        }
        outcomes
    }
}
