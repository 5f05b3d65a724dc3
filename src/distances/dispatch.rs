//! Enum-based metric dispatch.
//!
//! Metrics are a closed catalogue selected by value type and name at
//! configuration time. Each carries its aggregation shape and a plain
//! function pointer, so evaluation never goes through a vtable.

use std::fmt;

use super::difference::Difference;
use super::functions::*;
use crate::attribute::ValueType;
use crate::{Error, Result};

/// A metric function.
pub type DistanceFn = fn(&Difference) -> f64;

/// How framewise evaluation aggregates a metric's values.
#[derive(Clone, Copy)]
pub enum DistanceShape {
    /// Computed once per frame on the composed target and candidate, summed.
    OverallSum(DistanceFn),
    /// Like `OverallSum`, then divided by the number of frames.
    OverallMean(DistanceFn),
    /// Each candidate measured against the composed targets.
    CandVTargs(DistanceFn),
    /// Each target measured against the composed candidates.
    TargVCands(DistanceFn),
    /// Measured in both directions.
    Balanced(DistanceFn),
}

impl DistanceShape {
    pub fn function(&self) -> DistanceFn {
        match *self {
            DistanceShape::OverallSum(f)
            | DistanceShape::OverallMean(f)
            | DistanceShape::CandVTargs(f)
            | DistanceShape::TargVCands(f)
            | DistanceShape::Balanced(f) => f,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            DistanceShape::OverallSum(_) => "overall-sum",
            DistanceShape::OverallMean(_) => "overall-mean",
            DistanceShape::CandVTargs(_) => "cand-v-targs",
            DistanceShape::TargVCands(_) => "targ-v-cands",
            DistanceShape::Balanced(_) => "balanced",
        }
    }

    /// True for shapes that measure each target against the candidates.
    pub fn per_target(&self) -> bool {
        matches!(self, DistanceShape::TargVCands(_) | DistanceShape::Balanced(_))
    }

    /// True for shapes that measure each candidate against the targets.
    pub fn per_candidate(&self) -> bool {
        matches!(self, DistanceShape::CandVTargs(_) | DistanceShape::Balanced(_))
    }
}

impl fmt::Debug for DistanceShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A named metric from the catalogue.
#[derive(Clone, Copy)]
pub struct Metric {
    pub name: &'static str,
    pub explanation: &'static str,
    /// Distances are small when values agree; similarities are large.
    pub is_distance: bool,
    pub shape: DistanceShape,
}

impl Metric {
    const fn new(
        name: &'static str,
        shape: DistanceShape,
        explanation: &'static str,
        is_distance: bool,
    ) -> Self {
        Self {
            name,
            explanation,
            is_distance,
            shape,
        }
    }

    #[inline]
    pub fn distance(&self, difference: &Difference) -> f64 {
        (self.shape.function())(difference)
    }
}

impl PartialEq for Metric {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.shape.name() == other.shape.name()
    }
}

impl fmt::Debug for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Metric")
            .field("name", &self.name)
            .field("shape", &self.shape)
            .field("is_distance", &self.is_distance)
            .finish()
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

use DistanceShape::*;

const SPAN_METRICS: &[Metric] = &[
    Metric::new("dice", Balanced(span_dice), "Dice coefficient", true),
    Metric::new("overlap", TargVCands(span_overlap), "Target overlap", true),
    Metric::new("recall", TargVCands(span_recall), "Frame recall", false),
    Metric::new("precision", CandVTargs(span_precision), "Frame precision", false),
    Metric::new("extent", Balanced(span_extent), "Extent difference", true),
    Metric::new("E", Balanced(span_equality), "Equality", true),
];

const REGION_METRICS: &[Metric] = &[
    Metric::new("dice", Balanced(region_dice), "Dice coefficient", true),
    Metric::new("maxdev", Balanced(max_deviation), "Maximum deviation", true),
    Metric::new("overlap", TargVCands(region_overlap), "Target overlap", true),
    Metric::new("arearecall", TargVCands(area_recall), "Object area recall", false),
    Metric::new("areaprecision", CandVTargs(area_precision), "Box area precision", false),
    Metric::new("intersects", Balanced(intersects), "Some shared area", true),
    Metric::new("matchedpixels", OverallSum(matched_pixels), "Pixels matched", false),
    Metric::new("missedpixels", OverallSum(missed_pixels), "Pixels missed", true),
    Metric::new("falsepixels", OverallSum(false_pixels), "False pixels", true),
    Metric::new("E", Balanced(region_equality), "Equality", true),
];

const NUMBER_METRICS: &[Metric] = &[
    Metric::new("difference", Balanced(numeric_difference), "Absolute difference", true),
    Metric::new("E", Balanced(value_equality), "Equality", true),
];

const TEXT_METRICS: &[Metric] = &[
    Metric::new("H", Balanced(hamming), "Hamming distance", true),
    Metric::new("L", Balanced(levenshtein), "Levenshtein distance", true),
    Metric::new("E", Balanced(value_equality), "Equality", true),
];

const LABEL_METRICS: &[Metric] = &[Metric::new("E", Balanced(value_equality), "Equality", true)];

const POINT_METRICS: &[Metric] = &[
    Metric::new("euclidean", Balanced(euclidean), "Euclidean distance", true),
    Metric::new("manhattan", Balanced(manhattan), "Manhattan distance", true),
    Metric::new("E", Balanced(value_equality), "Equality", true),
];

/// All metrics defined for a value type.
pub fn metrics_for(value_type: ValueType) -> &'static [Metric] {
    match value_type {
        ValueType::FrameSpan => SPAN_METRICS,
        ValueType::Region => REGION_METRICS,
        ValueType::Int | ValueType::Float => NUMBER_METRICS,
        ValueType::Text => TEXT_METRICS,
        ValueType::Bool | ValueType::Lvalue => LABEL_METRICS,
        ValueType::Point => POINT_METRICS,
    }
}

/// Look up a metric by name (case-insensitive) for a value type.
pub fn metric_by_name(value_type: ValueType, name: &str) -> Result<Metric> {
    let wanted = match name.to_ascii_lowercase().as_str() {
        "equality" | "equal" => "e".to_string(),
        "hamming" => "h".to_string(),
        "levenshtein" => "l".to_string(),
        other => other.to_string(),
    };
    metrics_for(value_type)
        .iter()
        .find(|m| m.name.eq_ignore_ascii_case(&wanted))
        .copied()
        .ok_or_else(|| {
            Error::UnknownDistance(format!(
                "'{}' is not a valid metric for {} attributes",
                name,
                value_type.name()
            ))
        })
}

/// The metric and tolerance used when a measure does not name one.
pub fn default_metric(value_type: ValueType) -> (&'static str, f64) {
    match value_type {
        ValueType::FrameSpan => ("E", 0.0),
        ValueType::Region => ("dice", 0.0),
        ValueType::Int | ValueType::Float => ("difference", 0.0),
        ValueType::Text => ("L", 0.0),
        ValueType::Bool | ValueType::Lvalue => ("E", 0.0),
        ValueType::Point => ("euclidean", 0.0),
    }
}
