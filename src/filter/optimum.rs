//! Optimal one-to-one filter.

use super::dispatch::FilterKind;
use super::traits::CompFilter;
use crate::internal::assignment::linear_sum_assignment;
use crate::matrix::{CompMatrix, Submatrix};
use crate::surreal::Surreal;

/// Distances are scaled to integers before solving so the assignment is
/// exact and deterministic.
const COST_SCALE: f64 = (1u64 << 24) as f64;

/// Finds the largest one-to-one matching with the smallest total distance.
///
/// Padding of the returned sum follows [`GreedyFilter`](super::GreedyFilter).
#[derive(Debug, Clone, Copy, Default)]
pub struct OptimumFilter;

impl CompFilter for OptimumFilter {
    fn filter(&self, matrix: &mut CompMatrix, sub: &Submatrix) -> Surreal {
        let edges = matrix.good_edges(sub);
        let mut cost = vec![vec![None; sub.candidates.len()]; sub.targets.len()];
        for &(t, c) in &edges {
            let (Ok(i), Ok(j)) = (sub.targets.binary_search(&t), sub.candidates.binary_search(&c)) else {
                continue;
            };
            if let Some(comp) = matrix.comparison(t, c) {
                cost[i][j] = Some((comp.distance() * COST_SCALE).round() as i64);
            }
        }

        for &(t, c) in &edges {
            if let Some(comp) = matrix.comparison_mut(t, c) {
                comp.set_filter_level(FilterKind::None);
            }
        }

        let result = linear_sum_assignment(&cost);
        let mut total = Surreal::zero();
        for a in &result.assignments {
            let (t, c) = (sub.targets[a.row_idx], sub.candidates[a.col_idx]);
            if let Some(comp) = matrix.comparison_mut(t, c) {
                comp.set_filter_level(FilterKind::SingleOptimum);
                total.add_distance(comp.distance());
            }
        }

        let unassigned = result.unmatched_rows.len().max(result.unmatched_cols.len());
        total.add_units(unassigned as i64, 0.0);
        total
    }
}
