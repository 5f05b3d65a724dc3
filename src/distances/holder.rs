//! Run-length storage for per-frame distances of one attribute.

use std::fmt;

use super::measure::Statistic;
use crate::{Error, Result};

/// Distances recorded over frame ranges `[begin, end)`.
///
/// Statistics are weighted by run length, so a distance held over ten frames
/// counts ten times.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DistanceHolder {
    runs: Vec<(u32, u32, f64)>,
}

impl DistanceHolder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `distance` over `[begin, end)`.
    pub fn set(&mut self, begin: u32, end: u32, distance: f64) -> Result<()> {
        if begin >= end {
            return Err(Error::BadData(format!(
                "distance range [{}, {}) is empty",
                begin, end
            )));
        }
        self.runs.push((begin, end, distance));
        Ok(())
    }

    /// Record a distance over a range known to be non-empty.
    pub(crate) fn push(&mut self, begin: u32, end: u32, distance: f64) {
        debug_assert!(begin < end);
        self.runs.push((begin, end, distance));
    }

    pub fn is_empty(&self) -> bool {
        self.runs.is_empty()
    }

    fn weight(&self) -> u64 {
        self.runs.iter().map(|(b, e, _)| u64::from(e - b)).sum()
    }

    /// Frame-weighted mean.
    pub fn average(&self) -> f64 {
        let weight = self.weight();
        if weight == 0 {
            return 0.0;
        }
        let total: f64 = self
            .runs
            .iter()
            .map(|(b, e, d)| f64::from(e - b) * d)
            .sum();
        total / weight as f64
    }

    pub fn minimum(&self) -> f64 {
        self.runs
            .iter()
            .map(|r| r.2)
            .fold(None, |acc: Option<f64>, d| Some(acc.map_or(d, |a| a.min(d))))
            .unwrap_or(0.0)
    }

    pub fn maximum(&self) -> f64 {
        self.runs
            .iter()
            .map(|r| r.2)
            .fold(None, |acc: Option<f64>, d| Some(acc.map_or(d, |a| a.max(d))))
            .unwrap_or(0.0)
    }

    /// Frame-weighted median. For an even frame count, the mean of the two
    /// middle frames.
    pub fn median(&self) -> f64 {
        let weight = self.weight();
        if weight == 0 {
            return 0.0;
        }
        let mut sorted: Vec<(f64, u64)> = self
            .runs
            .iter()
            .map(|(b, e, d)| (*d, u64::from(e - b)))
            .collect();
        sorted.sort_by(|a, b| a.0.total_cmp(&b.0));

        let nth = |n: u64| -> f64 {
            let mut seen = 0;
            for (d, w) in &sorted {
                seen += w;
                if n < seen {
                    return *d;
                }
            }
            sorted.last().map_or(0.0, |s| s.0)
        };

        if weight % 2 == 0 {
            (nth(weight / 2 - 1) + nth(weight / 2)) / 2.0
        } else {
            nth(weight / 2)
        }
    }

    pub fn statistic(&self, statistic: Statistic) -> f64 {
        match statistic {
            Statistic::Mean => self.average(),
            Statistic::Minimum => self.minimum(),
            Statistic::Median => self.median(),
            Statistic::Maximum => self.maximum(),
        }
    }
}

impl fmt::Display for DistanceHolder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .runs
            .iter()
            .map(|(b, e, d)| format!("{}:{}={}", b, e, d))
            .collect();
        write!(f, "[{}]", parts.join(", "))
    }
}
