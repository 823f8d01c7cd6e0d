//! Shuffle a suite until some ordering makes a test fail.
//!
//! Shuffles are drawn from a [StdRng] seeded explicitly (never from ambient entropy), so the same
//! seed against the same suite tries the same orderings and reports the same failing test.

use crate::{config::Config, engine::Engine, Error, TestId};
use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};
use std::path::Path;
use tracing::{debug, info};

/// A failing ordering found while fuzzing.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Pollution {
    /// The test that failed.
    pub target: TestId,
    /// The tests that executed before `target`, in execution order.
    pub leading: Vec<TestId>,
    /// Number of shuffles tried (including the failing one).
    pub attempts: u64,
}

/// Repeatedly shuffle `tests` and execute the whole suite until a run fails.
///
/// Each run stops after its first failure. The last test present in the results of that run is
/// the failing test. There is no limit on the number of attempts unless `config.max_attempts` is
/// set; callers that want to interrupt the search may simply drop the returned future.
pub async fn search<E: Engine>(
    engine: &E,
    scope: &Path,
    tests: &[TestId],
    config: &Config,
) -> Result<Pollution, Error> {
    let mut rng = StdRng::seed_from_u64(config.seed);
    let mut order = tests.to_vec();
    let mut attempts = 0;
    loop {
        if let Some(max) = config.max_attempts {
            if attempts >= max {
                return Err(Error::Exhausted(attempts));
            }
        }
        attempts += 1;
        info!(attempt = attempts, "running shuffled suite");

        order.shuffle(&mut rng);
        let run = engine.run(scope, &order, true).await?;
        if run.success {
            debug!(attempt = attempts, "suite passed");
            continue;
        }

        let Some((target, _)) = run.outcomes.last() else {
            return Err(Error::Collaborator("failing run reported no results".into()));
        };
        let target = target.clone();
        let leading = run
            .outcomes
            .iter()
            .map(|(id, _)| id)
            .filter(|id| **id != target)
            .cloned()
            .collect();
        info!(attempt = attempts, test = %target, "found failing test");
        return Ok(Pollution {
            target,
            leading,
            attempts,
        });
    }
}
