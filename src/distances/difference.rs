//! Precomputed differences between a target value and a candidate value.
//!
//! A `Difference` is built once per pair and then handed to any number of
//! metric functions, so shared quantities (frame counts, region areas) are
//! computed only once.

use crate::attribute::{AttributeValue, Region};
use crate::span::FrameSpan;

/// Marker returned when every contributing frame or pixel is ignored, so no
/// distance can be computed. Callers skip the contribution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IgnoredValue;

/// Frame counts for a pair of spans.
#[derive(Debug, Clone, PartialEq)]
pub struct SpanDifference {
    /// Frames counted as matched.
    pub shared: u64,
    /// Frames in the target span.
    pub target: u64,
    /// Frames in the candidate span.
    pub candidate: u64,
    /// Frames between the outer bounds and the matched bounds, if any frame matched.
    pub extents: Option<u64>,
    pub equal: bool,
}

impl SpanDifference {
    /// Measure `candidate` against `target`.
    ///
    /// Frames in `blackout` never count as matched but still count toward
    /// both spans. Frames in `ignore` are removed from both spans. Fails if
    /// the candidate lies entirely inside `ignore`.
    pub fn new(
        target: &FrameSpan,
        candidate: &FrameSpan,
        blackout: Option<&FrameSpan>,
        ignore: Option<&FrameSpan>,
    ) -> Result<Self, IgnoredValue> {
        if let Some(ignore) = ignore {
            if !candidate.is_empty() && candidate.minus(ignore).is_empty() {
                return Err(IgnoredValue);
            }
        }

        let mut alpha = target.clone();
        let mut beta = candidate.clone();
        let mut matched = alpha.intersect(&beta);
        if let Some(blackout) = blackout {
            matched = matched.minus(blackout);
            alpha = alpha.union(blackout);
            beta = beta.union(blackout);
        }
        if let Some(ignore) = ignore {
            alpha = alpha.minus(ignore);
            beta = beta.minus(ignore);
            matched = matched.minus(ignore);
        }

        Ok(Self {
            shared: matched.num_frames(),
            target: alpha.num_frames(),
            candidate: beta.num_frames(),
            extents: alpha.extents(&beta, &matched),
            equal: alpha == beta,
        })
    }
}

/// Pixel counts for a pair of regions.
#[derive(Debug, Clone, PartialEq)]
pub struct RegionDifference {
    pub target: u64,
    pub candidate: u64,
    pub shared: u64,
}

impl RegionDifference {
    pub fn new(
        target: Option<&AttributeValue>,
        candidate: Option<&AttributeValue>,
        ignore: Option<&AttributeValue>,
    ) -> Result<Self, IgnoredValue> {
        let empty = Region::default();
        let t = target.and_then(|v| v.as_region()).unwrap_or(&empty);
        let c = candidate.and_then(|v| v.as_region()).unwrap_or(&empty);
        let mask = ignore.and_then(|v| v.as_region());

        let target_area = t.area_outside(mask);
        let candidate_area = c.area_outside(mask);
        if mask.is_some()
            && target_area == 0
            && candidate_area == 0
            && (t.area() > 0 || c.area() > 0)
        {
            return Err(IgnoredValue);
        }

        Ok(Self {
            target: target_area,
            candidate: candidate_area,
            shared: t.intersection(c).area_outside(mask),
        })
    }
}

/// A pair of plain values (numbers, strings, points, labels).
#[derive(Debug, Clone, PartialEq)]
pub struct ValueDifference {
    pub target: Option<AttributeValue>,
    pub candidate: Option<AttributeValue>,
}

/// Everything a metric function may look at.
#[derive(Debug, Clone, PartialEq)]
pub enum Difference {
    Span(SpanDifference),
    Region(RegionDifference),
    Value(ValueDifference),
}

impl Difference {
    /// Difference between two frame spans.
    pub fn spans(
        target: &FrameSpan,
        candidate: &FrameSpan,
        blackout: Option<&FrameSpan>,
        ignore: Option<&FrameSpan>,
    ) -> Result<Self, IgnoredValue> {
        SpanDifference::new(target, candidate, blackout, ignore).map(Difference::Span)
    }

    /// Difference between two attribute values, either of which may be
    /// missing. `ignore` only applies to regions.
    pub fn values(
        target: Option<&AttributeValue>,
        candidate: Option<&AttributeValue>,
        ignore: Option<&AttributeValue>,
    ) -> Result<Self, IgnoredValue> {
        let is_region = |v: Option<&AttributeValue>| v.map_or(false, |v| v.as_region().is_some());
        if is_region(target) || is_region(candidate) || is_region(ignore) {
            RegionDifference::new(target, candidate, ignore).map(Difference::Region)
        } else {
            Ok(Difference::Value(ValueDifference {
                target: target.cloned(),
                candidate: candidate.cloned(),
            }))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attribute::BBox;

    fn region(x: i64, y: i64, w: i64, h: i64) -> AttributeValue {
        AttributeValue::Region(Region::from_bbox(BBox::new(x, y, w, h)))
    }

    #[test]
    fn test_span_difference_plain() {
        let d = SpanDifference::new(&FrameSpan::new(1, 10), &FrameSpan::new(2, 11), None, None).unwrap();
        assert_eq!(d.shared, 8);
        assert_eq!(d.target, 9);
        assert_eq!(d.candidate, 9);
        assert_eq!(d.extents, Some(2));
        assert!(!d.equal);
    }

    #[test]
    fn test_span_difference_blackout_counts_against_both() {
        let blackout = FrameSpan::new(4, 6);
        let d = SpanDifference::new(&FrameSpan::new(0, 10), &FrameSpan::new(0, 10), Some(&blackout), None)
            .unwrap();
        assert_eq!(d.shared, 8);
        assert_eq!(d.target, 10);
        assert_eq!(d.candidate, 10);
    }

    #[test]
    fn test_span_difference_ignore() {
        let ignore = FrameSpan::new(0, 2);
        let d = SpanDifference::new(&FrameSpan::new(0, 10), &FrameSpan::new(0, 5), None, Some(&ignore))
            .unwrap();
        assert_eq!(d.shared, 3);
        assert_eq!(d.target, 8);
        assert_eq!(d.candidate, 3);

        let swallowed = SpanDifference::new(&FrameSpan::new(0, 10), &FrameSpan::new(0, 2), None, Some(&ignore));
        assert_eq!(swallowed, Err(IgnoredValue));
    }

    #[test]
    fn test_region_difference_with_mask() {
        let t = region(0, 0, 10, 10);
        let c = region(5, 0, 10, 10);
        let d = RegionDifference::new(Some(&t), Some(&c), None).unwrap();
        assert_eq!((d.target, d.candidate, d.shared), (100, 100, 50));

        let mask = region(0, 0, 5, 10);
        let d = RegionDifference::new(Some(&t), Some(&c), Some(&mask)).unwrap();
        assert_eq!((d.target, d.candidate, d.shared), (50, 100, 50));
    }

    #[test]
    fn test_region_fully_ignored() {
        let c = region(0, 0, 4, 4);
        let mask = region(0, 0, 10, 10);
        assert_eq!(RegionDifference::new(None, Some(&c), Some(&mask)), Err(IgnoredValue));
    }

    #[test]
    fn test_values_dispatch() {
        let d = Difference::values(Some(&AttributeValue::Int(1)), None, None).unwrap();
        assert!(matches!(d, Difference::Value(_)));
        let d = Difference::values(None, Some(&region(0, 0, 1, 1)), None).unwrap();
        assert!(matches!(d, Difference::Region(_)));
    }
}
