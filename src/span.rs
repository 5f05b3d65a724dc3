//! Frame spans: sets of half-open frame intervals.
//!
//! A descriptor starts out valid over one contiguous `[begin, end)` range.
//! Localization can clear individual frames from a match span, so a span is
//! stored as a sorted list of disjoint, non-adjacent intervals.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A set of frames, stored as sorted disjoint half-open intervals.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "Vec<(u32, u32)>", into = "Vec<(u32, u32)>")]
pub struct FrameSpan {
    intervals: Vec<(u32, u32)>,
}

impl FrameSpan {
    /// Create the span `[begin, end)`. An inverted or empty range gives an empty span.
    pub fn new(begin: u32, end: u32) -> Self {
        if begin < end {
            Self {
                intervals: vec![(begin, end)],
            }
        } else {
            Self::empty()
        }
    }

    /// The span covering no frames.
    pub fn empty() -> Self {
        Self {
            intervals: Vec::new(),
        }
    }

    /// The span containing exactly `frame`.
    pub fn single(frame: u32) -> Self {
        Self::new(frame, frame.saturating_add(1))
    }

    /// Build a span from arbitrary (possibly overlapping, unsorted) intervals.
    pub fn from_intervals<I>(intervals: I) -> Self
    where
        I: IntoIterator<Item = (u32, u32)>,
    {
        let mut raw: Vec<(u32, u32)> = intervals.into_iter().filter(|(b, e)| b < e).collect();
        raw.sort_unstable();
        let mut merged: Vec<(u32, u32)> = Vec::with_capacity(raw.len());
        for (b, e) in raw {
            match merged.last_mut() {
                Some(last) if b <= last.1 => last.1 = last.1.max(e),
                _ => merged.push((b, e)),
            }
        }
        Self { intervals: merged }
    }

    pub fn is_empty(&self) -> bool {
        self.intervals.is_empty()
    }

    /// True when the span is a single interval.
    pub fn is_contiguous(&self) -> bool {
        self.intervals.len() <= 1
    }

    /// Number of frames in the span.
    pub fn num_frames(&self) -> u64 {
        self.intervals.iter().map(|(b, e)| u64::from(e - b)).sum()
    }

    /// First frame of the span, if any.
    pub fn begin(&self) -> Option<u32> {
        self.intervals.first().map(|(b, _)| *b)
    }

    /// One past the last frame of the span, if any.
    pub fn end(&self) -> Option<u32> {
        self.intervals.last().map(|(_, e)| *e)
    }

    /// The intervals making up this span, in order.
    pub fn intervals(&self) -> &[(u32, u32)] {
        &self.intervals
    }

    /// Iterate over every frame in the span.
    pub fn frames(&self) -> impl Iterator<Item = u32> + '_ {
        self.intervals.iter().flat_map(|&(b, e)| b..e)
    }

    pub fn contains(&self, frame: u32) -> bool {
        self.intervals
            .binary_search_by(|&(b, e)| {
                if e <= frame {
                    std::cmp::Ordering::Less
                } else if b > frame {
                    std::cmp::Ordering::Greater
                } else {
                    std::cmp::Ordering::Equal
                }
            })
            .is_ok()
    }

    /// True if the two spans share at least one frame.
    pub fn intersects(&self, other: &FrameSpan) -> bool {
        !self.intersect(other).is_empty()
    }

    pub fn intersect(&self, other: &FrameSpan) -> FrameSpan {
        let mut out = Vec::new();
        let (mut i, mut j) = (0, 0);
        while i < self.intervals.len() && j < other.intervals.len() {
            let (ab, ae) = self.intervals[i];
            let (bb, be) = other.intervals[j];
            let b = ab.max(bb);
            let e = ae.min(be);
            if b < e {
                out.push((b, e));
            }
            if ae < be {
                i += 1;
            } else {
                j += 1;
            }
        }
        FrameSpan { intervals: out }
    }

    pub fn union(&self, other: &FrameSpan) -> FrameSpan {
        FrameSpan::from_intervals(
            self.intervals
                .iter()
                .chain(other.intervals.iter())
                .copied(),
        )
    }

    /// Frames in `self` that are not in `other`.
    pub fn minus(&self, other: &FrameSpan) -> FrameSpan {
        let mut out = Vec::new();
        for &(b, e) in &self.intervals {
            let mut start = b;
            for &(ob, oe) in &other.intervals {
                if oe <= start || ob >= e {
                    continue;
                }
                if ob > start {
                    out.push((start, ob));
                }
                start = start.max(oe);
                if start >= e {
                    break;
                }
            }
            if start < e {
                out.push((start, e));
            }
        }
        FrameSpan { intervals: out }
    }

    /// Remove the frames `[begin, end)` from the span.
    pub fn clear(&mut self, begin: u32, end: u32) {
        *self = self.minus(&FrameSpan::new(begin, end));
    }

    /// Restrict the span to `[0, frame_count)`.
    pub fn clip(&self, frame_count: u32) -> FrameSpan {
        self.intersect(&FrameSpan::new(0, frame_count))
    }

    /// Fraction of this span's frames also found in `other`.
    pub fn overlap(&self, other: &FrameSpan) -> f64 {
        let total = self.num_frames();
        if total == 0 {
            return 0.0;
        }
        self.intersect(other).num_frames() as f64 / total as f64
    }

    /// Sum of how far the outer bounds of `self` and `other` reach beyond
    /// the bounds of `inner`.
    ///
    /// Returns `None` when any of the three spans is empty.
    pub fn extents(&self, other: &FrameSpan, inner: &FrameSpan) -> Option<u64> {
        let outer_begin = self.begin()?.min(other.begin()?);
        let outer_end = self.end()?.max(other.end()?);
        let inner_begin = inner.begin()?;
        let inner_end = inner.end()?;
        Some(u64::from(inner_begin.abs_diff(outer_begin)) + u64::from(outer_end.abs_diff(inner_end)))
    }
}

impl From<Vec<(u32, u32)>> for FrameSpan {
    fn from(intervals: Vec<(u32, u32)>) -> Self {
        FrameSpan::from_intervals(intervals)
    }
}

impl From<FrameSpan> for Vec<(u32, u32)> {
    fn from(span: FrameSpan) -> Self {
        span.intervals
    }
}

impl fmt::Display for FrameSpan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.intervals.is_empty() {
            return write!(f, "[)");
        }
        let parts: Vec<String> = self
            .intervals
            .iter()
            .map(|(b, e)| format!("[{}, {})", b, e))
            .collect();
        write!(f, "{}", parts.join(" "))
    }
}
