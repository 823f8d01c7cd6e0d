//! Identifiers of tests and the one-identifier-per-line file format.

use crate::Error;
use serde::{Deserialize, Serialize};
use std::{
    fmt,
    fs,
    path::{Component, Path, PathBuf},
};

/// Delimiter between the file containing a test and the rest of its identifier.
pub const DELIMITER: &str = "::";

/// Opaque identifier of a single test (e.g. `tests/foo.py::test_bar[param]`).
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TestId(String);

impl TestId {
    /// Returns the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the file (or module) that contains the test.
    pub fn file(&self) -> &str {
        match self.0.split_once(DELIMITER) {
            Some((file, _)) => file,
            None => &self.0,
        }
    }
}

impl fmt::Display for TestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TestId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for TestId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl AsRef<str> for TestId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Parse identifiers from `contents`, one per line (blank lines are ignored).
pub fn parse(contents: &str) -> Vec<TestId> {
    contents
        .lines()
        .filter(|line| !line.is_empty())
        .map(TestId::from)
        .collect()
}

/// Load identifiers from the file at `path`.
pub fn load(path: &Path) -> Result<Vec<TestId>, Error> {
    Ok(parse(&fs::read_to_string(path)?))
}

/// Write `ids` to the file at `path`, one per line.
pub fn write(path: &Path, ids: &[TestId]) -> Result<(), Error> {
    let mut contents = String::with_capacity(ids.iter().map(|id| id.0.len() + 1).sum());
    for id in ids {
        contents.push_str(id.as_str());
        contents.push('\n');
    }
    fs::write(path, contents)?;
    Ok(())
}

/// Compute the longest common path containing the files of all `ids`.
///
/// Returns `.` if `ids` is empty or the files share no leading component. The result is used to
/// scope every engine invocation so that re-discovery stays consistent across runs.
pub fn common_path(ids: &[TestId]) -> PathBuf {
    let mut paths = ids.iter().map(|id| Path::new(id.file()));
    let Some(first) = paths.next() else {
        return PathBuf::from(".");
    };
    let mut common: Vec<Component> = first.components().collect();
    for path in paths {
        let shared = common
            .iter()
            .zip(path.components())
            .take_while(|(a, b)| **a == *b)
            .count();
        common.truncate(shared);
    }
    if common.is_empty() {
        return PathBuf::from(".");
    }
    common.iter().collect()
}
