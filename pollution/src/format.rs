//! Render the command that bisects a failing test found while fuzzing.

use crate::{Source, TestId};
use std::borrow::Cow;

/// Name of the binary.
pub const PROGRAM: &str = "detect-test-pollution";

/// Flag naming the failing test.
pub const FAILING_TEST_FLAG: &str = "failing-test";

/// Flag naming the path tests are discovered from.
pub const TESTS_FLAG: &str = "tests";

/// Flag naming a file of pre-discovered test identifiers.
pub const TESTIDS_FILE_FLAG: &str = "testids-file";

/// Quote `arg` so that a POSIX shell reads it back as a single, literal word.
pub fn quote(arg: &str) -> Cow<'_, str> {
    if arg.is_empty() {
        return Cow::Borrowed("''");
    }
    let safe = arg
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || "_@%+=:,./-".contains(c));
    if safe {
        return Cow::Borrowed(arg);
    }
    Cow::Owned(format!("'{}'", arg.replace('\'', r#"'"'"'"#)))
}

/// Render the shell command that bisects `target` using the same test `source`.
pub fn format_command(target: &TestId, source: &Source) -> String {
    let (flag, path) = match source {
        Source::Discover(path) => (TESTS_FLAG, path),
        Source::TestIds(path) => (TESTIDS_FILE_FLAG, path),
    };
    [
        Cow::Borrowed(PROGRAM),
        Cow::Owned(format!("--{FAILING_TEST_FLAG}")),
        quote(target.as_str()),
        Cow::Owned(format!("--{flag}")),
        quote(path),
    ]
    .join(" ")
}
