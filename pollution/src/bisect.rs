//! Narrow the tests that ran before a failing test down to the one that breaks it.
//!
//! Given a `target` that passes alone but fails after some set of `leading` tests, the search
//! repeatedly splits the candidates at their midpoint (preserving order) and asks the [crate::oracle]
//! whether the target still fails after only the first half:
//!
//! - If the target passes, the first half is insufficient and the culprit is in the second half.
//! - If the target fails, the first half suffices and the second half is discarded untested.
//!
//! This finds a single sufficient culprit in `ceil(log2(n))` steps. It does not reason about
//! interactions between multiple polluters: if the second half would also (independently) break
//! the target, that is never reported.

use crate::{engine::Engine, oracle::passed_with_leading_tests, Error, Reason, TestId};
use std::path::Path;
use tracing::info;

/// Outcome of a successful bisection.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Bisection {
    /// The test that breaks the target when executed before it.
    pub culprit: TestId,
    /// Number of halving steps performed.
    pub steps: usize,
    /// Number of oracle calls made (including precondition and final checks).
    pub oracle_calls: usize,
}

/// Returns `ceil(log2(n))` (`0` for `n <= 1`).
fn log2_ceil(n: usize) -> u32 {
    if n <= 1 {
        return 0;
    }
    usize::BITS - (n - 1).leading_zeros()
}

/// Find the test in `universe` that causes `target` to fail when executed before it.
///
/// `universe` lists every known test in the order that reproduces the failure (the target itself
/// is removed before searching). Before searching, this verifies that:
///
/// 1. `target` is part of `universe` (otherwise [Error::UnknownTarget]).
/// 2. `target` passes alone (otherwise [Error::NonReproducible] with [Reason::FailsAlone]).
/// 3. `target` fails after all other tests (otherwise [Error::NonReproducible] with
///    [Reason::PassesWithLeading]).
///
/// If the single remaining candidate does not reproduce the failure, the search assumption was
/// broken (e.g. by non-determinism) and [Error::SearchInvariantViolation] is returned.
pub async fn find_culprit<E: Engine>(
    engine: &E,
    scope: &Path,
    target: &TestId,
    universe: &[TestId],
) -> Result<Bisection, Error> {
    if !universe.contains(target) {
        return Err(Error::UnknownTarget(target.clone()));
    }
    let mut oracle_calls = 0;

    info!(test = %target, "ensuring test passes by itself");
    oracle_calls += 1;
    if !passed_with_leading_tests(engine, scope, target, &[]).await? {
        return Err(Error::NonReproducible {
            target: target.clone(),
            reason: Reason::FailsAlone,
        });
    }

    let mut candidates: Vec<TestId> = universe.iter().filter(|t| *t != target).cloned().collect();

    info!(test = %target, tests = candidates.len(), "ensuring test fails with test group");
    oracle_calls += 1;
    if passed_with_leading_tests(engine, scope, target, &candidates).await? {
        return Err(Error::NonReproducible {
            target: target.clone(),
            reason: Reason::PassesWithLeading,
        });
    }

    let mut steps = 0;
    while candidates.len() > 1 {
        steps += 1;
        info!(
            step = steps,
            remaining = candidates.len(),
            estimated_steps = log2_ceil(candidates.len()),
            "bisecting"
        );
        let mid = candidates.len() / 2;
        oracle_calls += 1;
        if passed_with_leading_tests(engine, scope, target, &candidates[..mid]).await? {
            candidates.drain(..mid);
        } else {
            candidates.truncate(mid);
        }
    }

    // The loop only exits with exactly one candidate since the group was non-empty
    let culprit = candidates.swap_remove(0);
    info!(%culprit, "double checking culprit");
    oracle_calls += 1;
    if passed_with_leading_tests(engine, scope, target, std::slice::from_ref(&culprit)).await? {
        return Err(Error::SearchInvariantViolation {
            target: target.clone(),
            culprit,
        });
    }

    info!(%culprit, steps, oracle_calls, "found polluting test");
    Ok(Bisection {
        culprit,
        steps,
        oracle_calls,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{mocks::Suite, Engine, Outcomes, Run};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn ids(raw: &[&str]) -> Vec<TestId> {
        raw.iter().copied().map(TestId::from).collect()
    }

    #[test]
    fn test_log2_ceil() {
        assert_eq!(log2_ceil(0), 0);
        assert_eq!(log2_ceil(1), 0);
        assert_eq!(log2_ceil(2), 1);
        assert_eq!(log2_ceil(3), 2);
        assert_eq!(log2_ceil(4), 2);
        assert_eq!(log2_ceil(5), 3);
        assert_eq!(log2_ceil(1024), 10);
        assert_eq!(log2_ceil(1025), 11);
    }

    #[tokio::test]
    async fn test_finds_culprit() {
        let suite = Suite::new(["t::other", "t::other2", "t::k", "t::k2"]).pollute("t::k2", "t::k");
        let universe = ids(&["t::other", "t::other2", "t::k2", "t::k"]);

        let bisection = find_culprit(&suite, Path::new("t"), &TestId::from("t::k"), &universe)
            .await
            .unwrap();
        assert_eq!(bisection.culprit, TestId::from("t::k2"));
        assert_eq!(bisection.steps, 2);
        assert_eq!(bisection.oracle_calls, 5);
        assert_eq!(suite.runs(), 5);
    }

    #[tokio::test]
    async fn test_halves_preserve_order() {
        let suite = Suite::new(["t::a", "t::b", "t::c", "t::v"]).pollute("t::c", "t::v");
        let universe = ids(&["t::a", "t::b", "t::c", "t::v"]);
        find_culprit(&suite, Path::new("t"), &TestId::from("t::v"), &universe)
            .await
            .unwrap();
        assert_eq!(
            suite.history(),
            vec![
                ids(&["t::v"]),
                ids(&["t::a", "t::b", "t::c", "t::v"]),
                ids(&["t::a", "t::v"]),
                ids(&["t::b", "t::v"]),
                ids(&["t::c", "t::v"]),
            ]
        );
    }

    #[tokio::test]
    async fn test_oracle_call_bound() {
        for n in 2..=40usize {
            for culprit in 0..n - 1 {
                let names: Vec<String> = (0..n).map(|i| format!("t.py::test{i}")).collect();
                let target = TestId::from(names[n - 1].as_str());
                let polluter = TestId::from(names[culprit].as_str());
                let suite = Suite::new(names.iter().map(String::as_str))
                    .pollute(polluter.clone(), target.clone());
                let universe = suite.tests().to_vec();

                let bisection = find_culprit(&suite, Path::new("t.py"), &target, &universe)
                    .await
                    .unwrap();
                assert_eq!(bisection.culprit, polluter);
                let bound = 2 + log2_ceil(n - 1) as usize + 1;
                assert!(bisection.oracle_calls <= bound, "n={n} culprit={culprit}");
                assert_eq!(suite.runs(), bisection.oracle_calls);
            }
        }
    }

    #[tokio::test]
    async fn test_idempotent() {
        let suite = Suite::new(["t::a", "t::b", "t::c", "t::d", "t::e", "t::v"]).pollute("t::d", "t::v");
        let universe = suite.tests().to_vec();
        let target = TestId::from("t::v");
        let first = find_culprit(&suite, Path::new("t"), &target, &universe).await.unwrap();
        let second = find_culprit(&suite, Path::new("t"), &target, &universe).await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_single_candidate() {
        let suite = Suite::new(["t::a", "t::v"]).pollute("t::a", "t::v");
        let bisection = find_culprit(&suite, Path::new("t"), &TestId::from("t::v"), suite.tests())
            .await
            .unwrap();
        assert_eq!(bisection.culprit, TestId::from("t::a"));
        assert_eq!(bisection.steps, 0);
        assert_eq!(bisection.oracle_calls, 3);
    }

    #[tokio::test]
    async fn test_first_half_wins_with_multiple_polluters() {
        let suite = Suite::new(["t::a", "t::b", "t::c", "t::d", "t::v"])
            .pollute("t::a", "t::v")
            .pollute("t::d", "t::v");
        let bisection = find_culprit(&suite, Path::new("t"), &TestId::from("t::v"), suite.tests())
            .await
            .unwrap();
        assert_eq!(bisection.culprit, TestId::from("t::a"));
    }

    #[tokio::test]
    async fn test_unknown_target() {
        let suite = Suite::new(["t::a", "t::b"]);
        let result = find_culprit(&suite, Path::new("t"), &TestId::from("t::missing"), suite.tests()).await;
        assert!(matches!(result, Err(Error::UnknownTarget(t)) if t == TestId::from("t::missing")));
        assert_eq!(suite.runs(), 0);
    }

    #[tokio::test]
    async fn test_fails_alone() {
        let suite = Suite::new(["t::a", "t::b", "t::c"]).broken("t::c");
        let result = find_culprit(&suite, Path::new("t"), &TestId::from("t::c"), suite.tests()).await;
        assert!(matches!(
            result,
            Err(Error::NonReproducible {
                reason: Reason::FailsAlone,
                ..
            })
        ));
        assert_eq!(suite.runs(), 1);
    }

    #[tokio::test]
    async fn test_passes_with_leading() {
        let suite = Suite::new(["t::a", "t::b", "t::c"]);
        let result = find_culprit(&suite, Path::new("t"), &TestId::from("t::c"), suite.tests()).await;
        assert!(matches!(
            result,
            Err(Error::NonReproducible {
                reason: Reason::PassesWithLeading,
                ..
            })
        ));
        assert_eq!(suite.runs(), 2);
    }

    #[tokio::test]
    async fn test_no_leading_tests() {
        let suite = Suite::new(["t::a"]);
        let result = find_culprit(&suite, Path::new("t"), &TestId::from("t::a"), suite.tests()).await;
        assert!(matches!(
            result,
            Err(Error::NonReproducible {
                reason: Reason::PassesWithLeading,
                ..
            })
        ));
    }

    /// Fails the target whenever it runs after the full group, but never after a single test.
    struct Flaky {
        group: usize,
        runs: AtomicUsize,
    }

    impl Engine for Flaky {
        async fn discover(&self, _path: &Path) -> Result<Vec<TestId>, Error> {
            Ok(Vec::new())
        }

        async fn run(&self, _path: &Path, order: &[TestId], _fail_fast: bool) -> Result<Run, Error> {
            self.runs.fetch_add(1, Ordering::SeqCst);
            let target = order.last().cloned().unwrap();
            let leading = order.len() - 1;
            let passed = leading != self.group && leading != 2;
            let outcomes: Outcomes = [(target, passed)].into_iter().collect();
            Ok(Run {
                success: passed,
                outcomes,
            })
        }
    }

    #[tokio::test]
    async fn test_search_invariant_violation() {
        let universe = ids(&["t::a", "t::b", "t::c", "t::d", "t::v"]);
        let engine = Flaky {
            group: 4,
            runs: AtomicUsize::new(0),
        };
        let result = find_culprit(&engine, Path::new("t"), &TestId::from("t::v"), &universe).await;
        assert!(matches!(result, Err(Error::SearchInvariantViolation { .. })));
        assert_eq!(engine.runs.load(Ordering::SeqCst), 5);
    }

    #[tokio::test]
    async fn test_collaborator_failure_propagates() {
        let suite = Suite::new(["t::a", "t::v"]);
        let universe = ids(&["t::a", "t::unknown", "t::v"]);
        let result = find_culprit(&suite, Path::new("t"), &TestId::from("t::v"), &universe).await;
        assert!(matches!(result, Err(Error::Collaborator(_))));
    }
}
