//! Ask an [Engine] whether a test passes after a given set of tests.

use crate::{engine::Engine, Error, TestId};
use std::path::Path;
use tracing::debug;

/// Returns whether `target` passes when executed immediately after `leading` (in order).
///
/// `scope` must contain `target` and every test in `leading`, and `leading` must not contain
/// `target`. Every call executes `leading.len() + 1` tests.
pub async fn passed_with_leading_tests<E: Engine>(
    engine: &E,
    scope: &Path,
    target: &TestId,
    leading: &[TestId],
) -> Result<bool, Error> {
    debug_assert!(!leading.contains(target), "target must not lead itself");
    let mut order = Vec::with_capacity(leading.len() + 1);
    order.extend_from_slice(leading);
    order.push(target.clone());

    let run = engine.run(scope, &order, false).await?;
    let Some(passed) = run.outcomes.get(target) else {
        return Err(Error::Collaborator(format!("no result for {target}")));
    };
    debug!(test = %target, leading = leading.len(), passed, "consulted oracle");
    Ok(passed)
}
