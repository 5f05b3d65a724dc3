//! Built-in metric functions.
//!
//! Every function takes a [`Difference`] and returns a distance (or, for the
//! similarity metrics, a score). A function handed the wrong kind of
//! difference returns NaN.
//!
//! Missing values: when both sides are missing the distance is 0; when one
//! side is missing, bounded distances give 1 and unbounded ones give +inf.

use super::difference::{Difference, RegionDifference, SpanDifference, ValueDifference};
use crate::attribute::AttributeValue;

fn span(d: &Difference) -> Option<&SpanDifference> {
    match d {
        Difference::Span(s) => Some(s),
        _ => None,
    }
}

fn region(d: &Difference) -> Option<&RegionDifference> {
    match d {
        Difference::Region(r) => Some(r),
        _ => None,
    }
}

fn value(d: &Difference) -> Option<&ValueDifference> {
    match d {
        Difference::Value(v) => Some(v),
        _ => None,
    }
}

// ===== Frame span metrics =====

/// `1 - 2 * shared / (target + candidate)`
pub fn span_dice(d: &Difference) -> f64 {
    span(d).map_or(f64::NAN, |s| dice(s.shared, s.target, s.candidate))
}

/// `1 - shared / target`
pub fn span_overlap(d: &Difference) -> f64 {
    span(d).map_or(f64::NAN, |s| overlap(s.shared, s.target, s.candidate))
}

/// Fraction of target frames matched.
pub fn span_recall(d: &Difference) -> f64 {
    span(d).map_or(f64::NAN, |s| ratio(s.shared, s.target))
}

/// Fraction of candidate frames matched.
pub fn span_precision(d: &Difference) -> f64 {
    span(d).map_or(f64::NAN, |s| ratio(s.shared, s.candidate))
}

/// `1 - exp(-extents)`, where extents counts the frames by which the outer
/// bounds exceed the matched bounds.
pub fn span_extent(d: &Difference) -> f64 {
    span(d).map_or(f64::NAN, |s| match s.extents {
        Some(extents) => 1.0 - (-(extents as f64)).exp(),
        None => 1.0,
    })
}

pub fn span_equality(d: &Difference) -> f64 {
    span(d).map_or(f64::NAN, |s| if s.equal { 0.0 } else { 1.0 })
}

// ===== Region metrics =====

pub fn region_dice(d: &Difference) -> f64 {
    region(d).map_or(f64::NAN, |r| match (r.target, r.candidate) {
        (0, 0) => 0.0,
        (0, _) | (_, 0) => 1.0,
        _ => dice(r.shared, r.target, r.candidate),
    })
}

pub fn region_overlap(d: &Difference) -> f64 {
    region(d).map_or(f64::NAN, |r| overlap(r.shared, r.target, r.candidate))
}

pub fn area_recall(d: &Difference) -> f64 {
    region(d).map_or(f64::NAN, |r| ratio(r.shared, r.target))
}

pub fn area_precision(d: &Difference) -> f64 {
    region(d).map_or(f64::NAN, |r| ratio(r.shared, r.candidate))
}

/// `max((A - shared) / A, (B - shared) / B)`
pub fn max_deviation(d: &Difference) -> f64 {
    region(d).map_or(f64::NAN, |r| match (r.target, r.candidate) {
        (0, 0) => 0.0,
        (0, _) | (_, 0) => 1.0,
        (t, c) => {
            let dt = (t - r.shared) as f64 / t as f64;
            let dc = (c - r.shared) as f64 / c as f64;
            dt.max(dc)
        }
    })
}

pub fn intersects(d: &Difference) -> f64 {
    region(d).map_or(f64::NAN, |r| {
        if r.shared > 0 || (r.target == 0 && r.candidate == 0) {
            0.0
        } else {
            1.0
        }
    })
}

pub fn matched_pixels(d: &Difference) -> f64 {
    region(d).map_or(f64::NAN, |r| r.shared as f64)
}

pub fn missed_pixels(d: &Difference) -> f64 {
    region(d).map_or(f64::NAN, |r| (r.target - r.shared) as f64)
}

pub fn false_pixels(d: &Difference) -> f64 {
    region(d).map_or(f64::NAN, |r| (r.candidate - r.shared) as f64)
}

pub fn region_equality(d: &Difference) -> f64 {
    region(d).map_or(f64::NAN, |r| {
        if r.shared == r.target && r.shared == r.candidate {
            0.0
        } else {
            1.0
        }
    })
}

// ===== Plain value metrics =====

pub fn value_equality(d: &Difference) -> f64 {
    value(d).map_or(f64::NAN, |v| match (&v.target, &v.candidate) {
        (None, None) => 0.0,
        (Some(a), Some(b)) if a == b => 0.0,
        _ => 1.0,
    })
}

/// Absolute numeric difference.
pub fn numeric_difference(d: &Difference) -> f64 {
    unbounded(d, |a, b| match (a.as_f64(), b.as_f64()) {
        (Some(a), Some(b)) => (a - b).abs(),
        _ => f64::NAN,
    })
}

/// Number of positions where two strings differ, plus the length difference.
pub fn hamming(d: &Difference) -> f64 {
    unbounded(d, |a, b| match (a, b) {
        (AttributeValue::Text(a), AttributeValue::Text(b)) => {
            let differing = a.chars().zip(b.chars()).filter(|(x, y)| x != y).count();
            let length = a.chars().count().abs_diff(b.chars().count());
            (differing + length) as f64
        }
        _ => f64::NAN,
    })
}

/// Edit distance between two strings.
pub fn levenshtein(d: &Difference) -> f64 {
    unbounded(d, |a, b| match (a, b) {
        (AttributeValue::Text(a), AttributeValue::Text(b)) => edit_distance(a, b) as f64,
        _ => f64::NAN,
    })
}

pub fn euclidean(d: &Difference) -> f64 {
    unbounded(d, |a, b| match (a, b) {
        (AttributeValue::Point { x: x1, y: y1 }, AttributeValue::Point { x: x2, y: y2 }) => {
            let dx = (x1 - x2) as f64;
            let dy = (y1 - y2) as f64;
            (dx * dx + dy * dy).sqrt()
        }
        _ => f64::NAN,
    })
}

pub fn manhattan(d: &Difference) -> f64 {
    unbounded(d, |a, b| match (a, b) {
        (AttributeValue::Point { x: x1, y: y1 }, AttributeValue::Point { x: x2, y: y2 }) => {
            ((x1 - x2).abs() + (y1 - y2).abs()) as f64
        }
        _ => f64::NAN,
    })
}

// ===== Helpers =====

fn dice(shared: u64, target: u64, candidate: u64) -> f64 {
    if target + candidate == 0 {
        0.0
    } else {
        1.0 - (2 * shared) as f64 / (target + candidate) as f64
    }
}

fn overlap(shared: u64, target: u64, candidate: u64) -> f64 {
    match (target, candidate) {
        (0, 0) => 0.0,
        (0, _) => 1.0,
        _ => 1.0 - shared as f64 / target as f64,
    }
}

fn ratio(part: u64, whole: u64) -> f64 {
    if whole == 0 {
        f64::NAN
    } else {
        part as f64 / whole as f64
    }
}

fn unbounded<F>(d: &Difference, f: F) -> f64
where
    F: Fn(&AttributeValue, &AttributeValue) -> f64,
{
    value(d).map_or(f64::NAN, |v| match (&v.target, &v.candidate) {
        (None, None) => 0.0,
        (Some(a), Some(b)) => f(a, b),
        _ => f64::INFINITY,
    })
}

fn edit_distance(a: &str, b: &str) -> usize {
    let b: Vec<char> = b.chars().collect();
    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0; b.len() + 1];
    for (i, ca) in a.chars().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let substitution = prev[j] + usize::from(ca != *cb);
            curr[j + 1] = substitution.min(prev[j + 1] + 1).min(curr[j] + 1);
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b.len()]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attribute::{BBox, Region};
    use crate::span::FrameSpan;
    use approx::assert_relative_eq;

    fn spans(t: (u32, u32), c: (u32, u32)) -> Difference {
        Difference::spans(&FrameSpan::new(t.0, t.1), &FrameSpan::new(c.0, c.1), None, None).unwrap()
    }

    fn regions(t: Option<BBox>, c: Option<BBox>) -> Difference {
        let t = t.map(|b| AttributeValue::Region(Region::from_bbox(b)));
        let c = c.map(|b| AttributeValue::Region(Region::from_bbox(b)));
        Difference::values(t.as_ref(), c.as_ref(), None).unwrap()
    }

    fn values(t: Option<AttributeValue>, c: Option<AttributeValue>) -> Difference {
        Difference::values(t.as_ref(), c.as_ref(), None).unwrap()
    }

    // ===== Frame span metrics =====

    #[test]
    fn test_span_dice() {
        assert_relative_eq!(span_dice(&spans((1, 10), (1, 9))), 1.0 - 16.0 / 17.0);
        assert_relative_eq!(span_dice(&spans((1, 10), (2, 11))), 1.0 - 16.0 / 18.0);
        assert_relative_eq!(span_dice(&spans((20, 30), (25, 29))), 1.0 - 8.0 / 14.0);
        assert_relative_eq!(span_dice(&spans((0, 10), (0, 10))), 0.0);
    }

    #[test]
    fn test_span_overlap_recall_precision() {
        let d = spans((0, 10), (5, 20));
        assert_relative_eq!(span_overlap(&d), 0.5);
        assert_relative_eq!(span_recall(&d), 0.5);
        assert_relative_eq!(span_precision(&d), 1.0 / 3.0);
    }

    #[test]
    fn test_span_extent_and_equality() {
        assert_relative_eq!(span_extent(&spans((0, 10), (0, 10))), 0.0);
        assert_relative_eq!(span_extent(&spans((0, 10), (0, 11))), 1.0 - (-1.0f64).exp());
        assert_relative_eq!(span_extent(&spans((0, 5), (10, 15))), 1.0);
        assert_eq!(span_equality(&spans((0, 10), (0, 10))), 0.0);
        assert_eq!(span_equality(&spans((0, 10), (0, 9))), 1.0);
    }

    // ===== Region metrics =====

    #[test]
    fn test_region_dice_special_cases() {
        let b = BBox::new(0, 0, 10, 10);
        assert_eq!(region_dice(&regions(None, None)), 0.0);
        assert_eq!(region_dice(&regions(Some(b), None)), 1.0);
        assert_relative_eq!(region_dice(&regions(Some(b), Some(BBox::new(5, 0, 10, 10)))), 0.5);
    }

    #[test]
    fn test_region_pixel_counts() {
        let d = regions(Some(BBox::new(0, 0, 10, 10)), Some(BBox::new(5, 0, 10, 10)));
        assert_eq!(matched_pixels(&d), 50.0);
        assert_eq!(missed_pixels(&d), 50.0);
        assert_eq!(false_pixels(&d), 50.0);
        assert_relative_eq!(area_recall(&d), 0.5);
        assert_relative_eq!(area_precision(&d), 0.5);
        assert_relative_eq!(max_deviation(&d), 0.5);
        assert_eq!(intersects(&d), 0.0);
        assert_eq!(region_equality(&d), 1.0);
    }

    #[test]
    fn test_region_disjoint() {
        let d = regions(Some(BBox::new(0, 0, 2, 2)), Some(BBox::new(5, 5, 2, 2)));
        assert_eq!(intersects(&d), 1.0);
        assert_relative_eq!(region_overlap(&d), 1.0);
        assert!(area_recall(&regions(None, None)).is_nan());
    }

    // ===== Plain value metrics =====

    #[test]
    fn test_string_metrics() {
        let t = |s: &str| Some(AttributeValue::Text(s.into()));
        assert_eq!(levenshtein(&values(t("kitten"), t("sitting"))), 3.0);
        assert_eq!(hamming(&values(t("abcd"), t("abxdef"))), 3.0);
        assert_eq!(levenshtein(&values(t("a"), None)), f64::INFINITY);
        assert_eq!(levenshtein(&values(None, None)), 0.0);
    }

    #[test]
    fn test_point_metrics() {
        let p = |x, y| Some(AttributeValue::Point { x, y });
        assert_relative_eq!(euclidean(&values(p(0, 0), p(3, 4))), 5.0);
        assert_relative_eq!(manhattan(&values(p(0, 0), p(3, 4))), 7.0);
    }

    #[test]
    fn test_numeric_and_equality() {
        assert_relative_eq!(
            numeric_difference(&values(Some(AttributeValue::Int(3)), Some(AttributeValue::Float(1.5)))),
            1.5
        );
        let l = |s: &str| Some(AttributeValue::Lvalue(s.into()));
        assert_eq!(value_equality(&values(l("red"), l("red"))), 0.0);
        assert_eq!(value_equality(&values(l("red"), l("blue"))), 1.0);
        assert_eq!(value_equality(&values(l("red"), None)), 1.0);
    }

    #[test]
    fn test_wrong_difference_kind_is_nan() {
        assert!(span_dice(&values(None, None)).is_nan());
        assert!(euclidean(&spans((0, 1), (0, 1))).is_nan());
    }
}
