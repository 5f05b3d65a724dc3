//! Distances between target and candidate attribute values.
//!
//! This module provides:
//! - `Difference` - precomputed span, region or value differences
//! - `Metric` / `DistanceShape` - the closed metric catalogue
//! - `AttrMeasure` - a metric with its tolerance and statistic
//! - `DistanceHolder` - per-frame distances for one attribute
//! - Built-in metric functions (dice, overlap, levenshtein, ...)

mod difference;
mod dispatch;
mod functions;
mod holder;
mod measure;

pub use difference::{Difference, IgnoredValue, RegionDifference, SpanDifference, ValueDifference};
pub use dispatch::{default_metric, metric_by_name, metrics_for, DistanceFn, DistanceShape, Metric};
pub use functions::*;
pub use holder::DistanceHolder;
pub use measure::{AttrMeasure, MetricDefaults, Statistic};

/// Name of the synthetic attribute holding a descriptor's frame span.
pub const FRAMESPAN: &str = " framespan";
