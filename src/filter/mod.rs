//! Match filters that reduce a many-to-many comparison graph.
//!
//! This module provides the filter implementations:
//! - `EmptyFilter` - Keeps every good comparison
//! - `GreedyFilter` - One-to-one, cheapest edges first
//! - `OptimumFilter` - One-to-one, minimum total distance (Hungarian)
//! - `MultipleFilter` - Many-to-one through descriptor composition

mod traits;
mod dispatch;
mod no_filter;
mod greedy;
mod optimum;
mod multiple;

pub use traits::CompFilter;
pub use dispatch::FilterKind;
pub use no_filter::EmptyFilter;
pub use greedy::GreedyFilter;
pub use optimum::OptimumFilter;
pub use multiple::MultipleFilter;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::comparison::Level;
    use crate::descriptor::{Category, Descriptor, FileInformation};
    use crate::distances::{AttrMeasure, MetricDefaults, FRAMESPAN};
    use crate::attribute::ValueType;
    use crate::matrix::CompMatrix;
    use crate::scope::{Equivalencies, ScopeRules};
    use crate::span::FrameSpan;
    use std::collections::BTreeMap;
    use std::sync::Arc;

    fn scope(measure: &str) -> Arc<ScopeRules> {
        let defaults = MetricDefaults::new();
        let mut measures = BTreeMap::new();
        measures.insert(
            FRAMESPAN.to_string(),
            AttrMeasure::parse(ValueType::FrameSpan, measure, &defaults).unwrap(),
        );
        let mut scope = ScopeRules::new(Equivalencies::new());
        scope.add_descriptor(Category::Object, "PERSON", measures);
        Arc::new(scope)
    }

    fn person(id: u32, begin: u32, end: u32) -> Descriptor {
        Descriptor::new(Category::Object, "PERSON", id, FrameSpan::new(begin, end))
    }

    /// Two targets and two candidates where the cheapest edge blocks the
    /// best overall assignment.
    fn crossed() -> CompMatrix {
        let targets = vec![person(1, 0, 10), person(2, 0, 12)];
        let candidates = vec![person(10, 0, 11), person(11, 0, 20)];
        let mut m = CompMatrix::new(targets, candidates, scope("[dice .9]"), FileInformation::default());
        assert!(m.bring_to_level(Level::Detected));
        m
    }

    // ===== Filter comparison =====

    #[test]
    fn test_optimum_never_worse_than_greedy() {
        let mut greedy = crossed();
        let mut optimum = greedy.clone();

        let g = greedy.remove_duplicates(FilterKind::SingleGreedy);
        let o = optimum.remove_duplicates(FilterKind::SingleOptimum);
        assert_eq!(g.infinities, 0);
        assert_eq!(o.infinities, 0);
        assert!(o.reality <= g.reality + 1e-12);
    }

    #[test]
    fn test_empty_filter_keeps_everything() {
        let mut m = crossed();
        let before = m.good_comparison_count();
        let sum = m.remove_duplicates(FilterKind::None);
        assert_eq!(m.good_comparison_count(), before);
        assert_eq!(sum.infinities, 0);
    }

    #[test]
    fn test_filter_kind_dispatch_marks_edges() {
        let mut m = crossed();
        m.remove_duplicates(FilterKind::SingleOptimum);
        assert_eq!(m.filtered(), FilterKind::SingleOptimum);
        assert_eq!(m.good_comparison_count(), 2);
        for (_, _, comp) in m.good_comparisons() {
            assert_eq!(comp.filter_level(), FilterKind::SingleOptimum);
        }
    }
}
