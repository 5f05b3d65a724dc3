//! Many-to-one filter built on descriptor composition.
//!
//! Turns alternate between anchoring on targets (composing candidates) and
//! anchoring on candidates (composing targets). In each turn, every anchor
//! orders its flagged edges by distance and greedily grows a composition of
//! partners, keeping a partner only if the composite is no farther from
//! the anchor than the best seen so far. The surviving edge is repointed at
//! the composite and every other edge of the anchor is dropped.

use log::debug;

use super::dispatch::FilterKind;
use super::greedy::GreedyFilter;
use super::traits::CompFilter;
use crate::descriptor::Descriptor;
use crate::matrix::{CompMatrix, Submatrix};
use crate::surreal::Surreal;
use crate::utils::warn_once;
use crate::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Anchor {
    Target,
    Candidate,
}

/// An edge of the anchor being composed.
#[derive(Debug, Clone, Copy)]
struct Member {
    column: usize,
    row: usize,
    distance: f64,
}

#[derive(Debug, Clone, Copy)]
pub struct MultipleFilter {
    /// Upper bound on turn pairs before giving up on convergence.
    pub max_iterations: usize,
}

impl Default for MultipleFilter {
    fn default() -> Self {
        Self { max_iterations: 64 }
    }
}

impl CompFilter for MultipleFilter {
    fn filter(&self, matrix: &mut CompMatrix, sub: &Submatrix) -> Surreal {
        let snapshot = matrix.snapshot(sub);
        match self.compose(matrix, sub) {
            Ok(total) => total,
            Err(err) => {
                warn_once(&format!(
                    "multiple match filter falling back to greedy matching: {}",
                    err
                ));
                matrix.restore(snapshot);
                GreedyFilter.filter(matrix, sub)
            }
        }
    }
}

impl MultipleFilter {
    fn compose(&self, matrix: &mut CompMatrix, sub: &Submatrix) -> Result<Surreal> {
        for (t, c) in matrix.good_edges(sub) {
            if let Some(comp) = matrix.comparison_mut(t, c) {
                comp.set_filter_level(FilterKind::Multiple);
            }
        }

        // Opening pair, then each iteration is a candidate turn followed by
        // the scheduled anchor. Convergence compares against the total two
        // turns back.
        let mut previous = self.turn(matrix, sub, Anchor::Target)?;
        self.turn(matrix, sub, Anchor::Candidate)?;
        let mut current;
        let mut iterations = 2;
        loop {
            iterations += 1;
            current = self.turn(matrix, sub, Anchor::Candidate)?;
            let two_ago = previous;
            previous = current;
            current = self.turn(matrix, sub, Self::closing_anchor(iterations))?;
            debug!("multiple match turn {}: {} -> {}", iterations, two_ago, current);
            if two_ago.compare(&current) != std::cmp::Ordering::Greater {
                break;
            }
            if iterations >= self.max_iterations {
                warn_once("multiple match filter stopped before converging");
                break;
            }
        }
        Ok(current)
    }

    /// Odd iterations close on targets, even ones on candidates.
    fn closing_anchor(iteration: usize) -> Anchor {
        if iteration % 2 == 1 {
            Anchor::Target
        } else {
            Anchor::Candidate
        }
    }

    /// Flagged, good edges of one anchor, nearest first. Ties keep matrix
    /// order.
    fn members(matrix: &CompMatrix, sub: &Submatrix, anchor: Anchor, index: usize) -> Vec<Member> {
        let edges: Vec<(usize, usize)> = match anchor {
            Anchor::Target => sub.candidates.iter().map(|&c| (index, c)).collect(),
            Anchor::Candidate => sub.targets.iter().map(|&t| (t, index)).collect(),
        };
        let mut members: Vec<Member> = edges
            .into_iter()
            .filter_map(|(t, c)| {
                let comp = matrix.comparison(t, c)?;
                (matrix.good_comp(comp) && comp.filter_level() == FilterKind::Multiple).then(|| Member {
                    column: t,
                    row: c,
                    distance: comp.distance(),
                })
            })
            .collect();
        members.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        members
    }

    /// The descriptor on the composed side of an edge.
    fn partner<'m>(matrix: &'m CompMatrix, anchor: Anchor, member: &Member) -> Option<&'m Descriptor> {
        let comp = matrix.comparison(member.column, member.row)?;
        Some(match anchor {
            Anchor::Target => matrix.descriptor(comp.candidate()),
            Anchor::Candidate => matrix.descriptor(comp.target()),
        })
    }

    fn trial(matrix: &CompMatrix, anchor: Anchor, ideal: &Descriptor, composed: &Descriptor) -> f64 {
        match anchor {
            Anchor::Target => matrix.trial_distance(ideal, composed),
            Anchor::Candidate => matrix.trial_distance(composed, ideal),
        }
    }

    /// One pass over every anchor of the component. The total starts with
    /// one infinity unit per anchor; each anchor that keeps an edge trades
    /// its unit for the edge's distance.
    fn turn(&self, matrix: &mut CompMatrix, sub: &Submatrix, anchor: Anchor) -> Result<Surreal> {
        let anchors = match anchor {
            Anchor::Target => &sub.targets,
            Anchor::Candidate => &sub.candidates,
        };
        let mut total = Surreal::new(anchors.len() as i64, 0.0);

        for &index in anchors {
            let members = Self::members(matrix, sub, anchor, index);
            let Some(best) = members.first().copied() else {
                continue;
            };
            if members.len() == 1 {
                total.subtract_units(1, -best.distance);
                continue;
            }

            let Some(best_comp) = matrix.comparison(best.column, best.row) else {
                continue;
            };
            let ideal = match anchor {
                Anchor::Target => matrix.descriptor(best_comp.target()).clone(),
                Anchor::Candidate => matrix.descriptor(best_comp.candidate()).clone(),
            };

            let mut included = vec![best];
            let mut best_distance = best.distance;
            for member in &members[1..] {
                let mut parts: Vec<&Descriptor> = included
                    .iter()
                    .filter_map(|m| Self::partner(matrix, anchor, m))
                    .collect();
                let Some(next) = Self::partner(matrix, anchor, member) else {
                    continue;
                };
                parts.push(next);
                let composed = match matrix.compose_all(&parts) {
                    Ok(composed) => composed,
                    Err(Error::BadData(reason)) => {
                        debug!("skipping partner: {}", reason);
                        continue;
                    }
                    Err(err) => return Err(err),
                };
                let distance = Self::trial(matrix, anchor, &ideal, &composed);
                if distance <= best_distance {
                    best_distance = distance;
                    included.push(*member);
                }
            }

            // The kept edge is the one earliest in matrix order.
            let keep = included
                .iter()
                .copied()
                .min_by_key(|m| (m.column, m.row))
                .unwrap_or(best);

            if included.len() > 1 {
                let parts: Vec<&Descriptor> = included
                    .iter()
                    .filter_map(|m| Self::partner(matrix, anchor, m))
                    .collect();
                let composed = matrix.compose_all(&parts)?;
                let Some(kept) = matrix.comparison(keep.column, keep.row) else {
                    continue;
                };
                let (kept_target, kept_candidate) = (kept.target(), kept.candidate());
                let key = matrix.insert_descriptor(composed);
                let (target, candidate) = match anchor {
                    Anchor::Target => (kept_target, key),
                    Anchor::Candidate => (key, kept_candidate),
                };
                let distance = matrix.reset_comparison(keep.column, keep.row, target, candidate);
                if let Some(comp) = matrix.comparison_mut(keep.column, keep.row) {
                    comp.set_filter_level(FilterKind::Multiple);
                }
                total.subtract_units(1, -distance);
            } else {
                total.subtract_units(1, -best.distance);
            }

            for member in &members {
                if (member.column, member.row) == (keep.column, keep.row) {
                    continue;
                }
                if let Some(comp) = matrix.comparison_mut(member.column, member.row) {
                    comp.set_filter_level(FilterKind::None);
                }
            }
        }
        Ok(total)
    }
}
