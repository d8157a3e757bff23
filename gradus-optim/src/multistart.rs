//! Parallel solves from several initial guesses.

use std::cmp::Ordering;

use rayon::prelude::*;

use crate::status::{SolverExitCondition, SolverStatus};

/// Outcome of one solve: its status and whatever the caller extracted from
/// the solution (typically the decision-variable values).
#[derive(Debug, Clone, PartialEq)]
pub struct MultistartResult<D> {
    pub status: SolverStatus,
    pub variables: D,
}

fn exit_rank(exit_condition: SolverExitCondition) -> u8 {
    match exit_condition {
        SolverExitCondition::Success => 0,
        SolverExitCondition::SolvedToAcceptableTolerance => 1,
        _ => 2,
    }
}

/// Lower is better; NaN after every number.
fn compare_cost(a: f64, b: f64) -> Ordering {
    match (a.is_nan(), b.is_nan()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => a.total_cmp(&b),
    }
}

fn compare_status(a: &SolverStatus, b: &SolverStatus) -> Ordering {
    exit_rank(a.exit_condition)
        .cmp(&exit_rank(b.exit_condition))
        .then_with(|| compare_cost(a.cost, b.cost))
}

/// Run `solve` on every guess in parallel and return the best result.
///
/// Results are ranked by exit condition (success, then acceptable
/// tolerance, then anything else) and then by cost. Equal results resolve to
/// the earliest guess, independent of thread scheduling. Returns `None` for
/// an empty guess list.
///
/// `solve` runs on rayon worker threads, so each call must build its own
/// [`Problem`](crate::Problem) (and with it its own arena).
pub fn multistart<G, D, F>(solve: F, initial_guesses: &[G]) -> Option<MultistartResult<D>>
where
    G: Sync,
    D: Send,
    F: Fn(&G) -> MultistartResult<D> + Sync,
{
    let results: Vec<MultistartResult<D>> = initial_guesses.par_iter().map(&solve).collect();
    tracing::debug!(starts = results.len(), "multistart finished");

    results
        .into_iter()
        .min_by(|a, b| compare_status(&a.status, &b.status))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(
        exit_condition: SolverExitCondition,
        cost: f64,
        tag: usize,
    ) -> MultistartResult<usize> {
        MultistartResult {
            status: SolverStatus {
                exit_condition,
                cost,
                ..SolverStatus::default()
            },
            variables: tag,
        }
    }

    #[test]
    fn success_beats_lower_cost_failure() {
        let outcomes = [
            (SolverExitCondition::MaxIterationsExceeded, -10.0),
            (SolverExitCondition::SolvedToAcceptableTolerance, 1.0),
            (SolverExitCondition::Success, 5.0),
            (SolverExitCondition::LocallyInfeasible, -20.0),
        ];
        let guesses: Vec<usize> = (0..outcomes.len()).collect();
        let best = multistart(|&i| result(outcomes[i].0, outcomes[i].1, i), &guesses).unwrap();
        assert_eq!(best.variables, 2);
    }

    #[test]
    fn ties_resolve_to_first_guess() {
        let guesses: Vec<usize> = (0..64).collect();
        let best = multistart(|&i| result(SolverExitCondition::Success, 1.0, i), &guesses).unwrap();
        assert_eq!(best.variables, 0);
    }

    #[test]
    fn nan_cost_ranks_last() {
        let guesses = [f64::NAN, 3.0, f64::NAN];
        let best = multistart(|&c| result(SolverExitCondition::Success, c, 0), &guesses).unwrap();
        assert_eq!(best.status.cost, 3.0);
    }

    #[test]
    fn empty_guesses() {
        let guesses: [f64; 0] = [];
        assert!(multistart(|_| result(SolverExitCondition::Success, 0.0, 0), &guesses).is_none());
    }
}
