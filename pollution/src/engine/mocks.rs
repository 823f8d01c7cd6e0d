//! A deterministic, in-memory [Engine] that simulates a polluted suite.

use crate::{
    engine::{Engine, Outcomes, Run},
    Error, TestId,
};
use std::{
    collections::{BTreeMap, BTreeSet},
    path::Path,
    sync::Mutex,
};

/// A simulated suite of tests.
///
/// A victim fails if any of its polluters executed earlier in the same run. A broken test fails
/// unconditionally. Every other test passes.
#[derive(Debug, Default)]
pub struct Suite {
    tests: Vec<TestId>,
    polluters: BTreeMap<TestId, BTreeSet<TestId>>,
    broken: BTreeSet<TestId>,
    history: Mutex<Vec<Vec<TestId>>>,
}

impl Suite {
    /// Create a suite with `tests` (in discovery order), all of which pass.
    pub fn new<I, T>(tests: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<TestId>,
    {
        Self {
            tests: tests.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    /// Make `victim` fail whenever `polluter` executed before it.
    pub fn pollute(mut self, polluter: impl Into<TestId>, victim: impl Into<TestId>) -> Self {
        self.polluters
            .entry(victim.into())
            .or_default()
            .insert(polluter.into());
        self
    }

    /// Make `test` fail unconditionally.
    pub fn broken(mut self, test: impl Into<TestId>) -> Self {
        self.broken.insert(test.into());
        self
    }

    /// Returns the tests of the suite, in discovery order.
    pub fn tests(&self) -> &[TestId] {
        &self.tests
    }

    /// Returns the number of runs executed so far.
    pub fn runs(&self) -> usize {
        self.history.lock().unwrap().len()
    }

    /// Returns the order of every run executed so far.
    pub fn history(&self) -> Vec<Vec<TestId>> {
        self.history.lock().unwrap().clone()
    }

    fn passes(&self, test: &TestId, executed: &BTreeSet<&TestId>) -> bool {
        if self.broken.contains(test) {
            return false;
        }
        match self.polluters.get(test) {
            Some(polluters) => !polluters.iter().any(|p| executed.contains(p)),
            None => true,
        }
    }
}

impl Engine for Suite {
    async fn discover(&self, _path: &Path) -> Result<Vec<TestId>, Error> {
        Ok(self.tests.clone())
    }

    async fn run(&self, _path: &Path, order: &[TestId], fail_fast: bool) -> Result<Run, Error> {
        self.history.lock().unwrap().push(order.to_vec());

        let mut executed = BTreeSet::new();
        let mut outcomes = Outcomes::default();
        let mut success = true;
        for test in order {
            if !self.tests.contains(test) {
                return Err(Error::Collaborator(format!("unknown test: {test}")));
            }
            let passed = self.passes(test, &executed);
            executed.insert(test);
            outcomes.insert(test.clone(), passed);
            if !passed {
                success = false;
                if fail_fast {
                    break;
                }
            }
        }
        Ok(Run { success, outcomes })
    }
}
