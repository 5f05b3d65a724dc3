//! Greedy one-to-one filter.

use super::dispatch::FilterKind;
use super::traits::CompFilter;
use crate::matrix::{CompMatrix, Submatrix};
use crate::surreal::Surreal;

/// Accepts comparisons in order of increasing distance, skipping any whose
/// target or candidate is already taken, until the smaller side is used up.
///
/// The returned sum charges one infinity unit per leftover on the larger
/// side only, while [`CompMatrix::complete_sum`] charges every unexplained
/// target and candidate.
#[derive(Debug, Clone, Copy, Default)]
pub struct GreedyFilter;

impl CompFilter for GreedyFilter {
    fn filter(&self, matrix: &mut CompMatrix, sub: &Submatrix) -> Surreal {
        let mut edges: Vec<(usize, usize, f64)> = matrix
            .good_edges(sub)
            .into_iter()
            .filter_map(|(t, c)| matrix.comparison(t, c).map(|comp| (t, c, comp.distance())))
            .collect();
        // stable, so ties keep column-major order
        edges.sort_by(|a, b| a.2.total_cmp(&b.2));

        for &(t, c, _) in &edges {
            if let Some(comp) = matrix.comparison_mut(t, c) {
                comp.set_filter_level(FilterKind::None);
            }
        }

        let shorter = sub.targets.len().min(sub.candidates.len());
        let longer = sub.targets.len().max(sub.candidates.len());
        let mut used_targets = vec![false; matrix.target_count()];
        let mut used_candidates = vec![false; matrix.candidate_count()];
        let mut accepted = 0;
        let mut total = Surreal::zero();

        for (t, c, distance) in edges {
            if accepted >= shorter {
                break;
            }
            if used_targets[t] || used_candidates[c] {
                continue;
            }
            used_targets[t] = true;
            used_candidates[c] = true;
            accepted += 1;
            total.add_distance(distance);
            if let Some(comp) = matrix.comparison_mut(t, c) {
                comp.set_filter_level(FilterKind::SingleGreedy);
            }
        }
        total.add_units((longer - accepted) as i64, 0.0);
        total
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attribute::ValueType;
    use crate::comparison::Level;
    use crate::descriptor::{Category, Descriptor, FileInformation};
    use crate::distances::{AttrMeasure, MetricDefaults, FRAMESPAN};
    use crate::scope::{Equivalencies, ScopeRules};
    use crate::span::FrameSpan;
    use std::collections::BTreeMap;
    use std::sync::Arc;

    fn person(id: u32, begin: u32, end: u32) -> Descriptor {
        Descriptor::new(Category::Object, "PERSON", id, FrameSpan::new(begin, end))
    }

    fn detected(targets: Vec<Descriptor>, candidates: Vec<Descriptor>) -> CompMatrix {
        let defaults = MetricDefaults::new();
        let mut measures = BTreeMap::new();
        measures.insert(
            FRAMESPAN.to_string(),
            AttrMeasure::parse(ValueType::FrameSpan, "[dice .9]", &defaults).unwrap(),
        );
        let mut scope = ScopeRules::new(Equivalencies::new());
        scope.add_descriptor(Category::Object, "PERSON", measures);
        let mut m = CompMatrix::new(targets, candidates, Arc::new(scope), FileInformation::default());
        m.bring_to_level(Level::Detected);
        m
    }

    #[test]
    fn test_greedy_takes_cheapest_first() {
        let mut m = detected(
            vec![person(1, 0, 10), person(2, 0, 12)],
            vec![person(10, 0, 11), person(11, 0, 20)],
        );
        let sub = m.submatrices().remove(0);
        let total = GreedyFilter.filter(&mut m, &sub);

        // T2/C10 is the cheapest edge, leaving T1/C11.
        assert_eq!(m.comparison(1, 0).unwrap().filter_level(), FilterKind::SingleGreedy);
        assert_eq!(m.comparison(0, 1).unwrap().filter_level(), FilterKind::SingleGreedy);
        assert_eq!(m.comparison(0, 0).unwrap().filter_level(), FilterKind::None);
        assert_eq!(total.infinities, 0);
        let expected = (1.0 - 22.0 / 23.0) + (1.0 - 20.0 / 30.0);
        assert!((total.reality - expected).abs() < 1e-12);
    }

    #[test]
    fn test_greedy_matches_min_side_without_reuse() {
        let mut m = detected(
            vec![person(1, 0, 10), person(2, 0, 10), person(3, 0, 10)],
            vec![person(10, 0, 10), person(11, 1, 10)],
        );
        m.remove_duplicates(FilterKind::SingleGreedy);
        let kept: Vec<(usize, usize)> = m.good_comparisons().map(|(t, c, _)| (t, c)).collect();
        assert_eq!(kept.len(), 2);
        assert_ne!(kept[0].0, kept[1].0);
        assert_ne!(kept[0].1, kept[1].1);
        // one leftover target, one infinity unit
        assert_eq!(m.total().infinities, 1);
    }
}
