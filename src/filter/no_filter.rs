//! Pass-through filter.

use super::traits::CompFilter;
use crate::matrix::{CompMatrix, Submatrix};
use crate::surreal::Surreal;

/// Keeps every good comparison.
///
/// Useful as a baseline: the returned sum is the component's complete sum,
/// every good distance plus one infinity unit per unconnected descriptor.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmptyFilter;

impl CompFilter for EmptyFilter {
    fn filter(&self, matrix: &mut CompMatrix, sub: &Submatrix) -> Surreal {
        matrix.submatrix_sum(sub)
    }
}
