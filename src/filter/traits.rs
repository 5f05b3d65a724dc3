//! Filter trait for the comparison matrix.

use crate::matrix::{CompMatrix, Submatrix};
use crate::surreal::Surreal;

/// A strategy that restricts the good comparisons of one connected
/// component.
///
/// Implementations mark the comparisons they keep with their
/// [`FilterKind`](super::FilterKind) and return a summary of the outcome:
/// finite distances of the kept edges in the real part, unexplained
/// descriptors as infinity units.
pub trait CompFilter {
    /// Filter the comparisons of `sub`.
    fn filter(&self, matrix: &mut CompMatrix, sub: &Submatrix) -> Surreal;
}
