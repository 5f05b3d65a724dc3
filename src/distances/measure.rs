//! Attribute measures: a metric plus the thresholds that decide a match.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::dispatch::{default_metric, metric_by_name, Metric};
use crate::attribute::ValueType;
use crate::{Error, Result};

/// How per-frame distances are summarized at the statistical level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Statistic {
    #[default]
    Mean,
    Minimum,
    Median,
    Maximum,
}

impl Statistic {
    pub fn name(&self) -> &'static str {
        match self {
            Statistic::Mean => "mean",
            Statistic::Minimum => "minimum",
            Statistic::Median => "median",
            Statistic::Maximum => "maximum",
        }
    }
}

impl FromStr for Statistic {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "mean" => Ok(Statistic::Mean),
            "minimum" | "min" => Ok(Statistic::Minimum),
            "median" => Ok(Statistic::Median),
            "maximum" | "max" => Ok(Statistic::Maximum),
            _ => Err(Error::UnknownStatistic(s.to_string())),
        }
    }
}

impl TryFrom<String> for Statistic {
    type Error = Error;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

impl From<Statistic> for String {
    fn from(s: Statistic) -> Self {
        s.name().to_string()
    }
}

impl fmt::Display for Statistic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Fallback metrics, tolerances and statistic used when a measure leaves
/// them unspecified.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MetricDefaults {
    #[serde(default)]
    pub statistic: Statistic,
    #[serde(default)]
    pub stat_tolerance: f64,
    /// Per value type `(metric, tolerance)` replacing the built-in defaults.
    #[serde(default)]
    pub metrics: BTreeMap<ValueType, (String, f64)>,
}

impl MetricDefaults {
    pub fn new() -> Self {
        Self::default()
    }

    /// Override the default metric and tolerance for a value type.
    pub fn set_metric(&mut self, value_type: ValueType, metric: &str, tolerance: f64) -> Result<()> {
        metric_by_name(value_type, metric)?;
        self.metrics.insert(value_type, (metric.to_string(), tolerance));
        Ok(())
    }

    pub fn metric_for(&self, value_type: ValueType) -> (&str, f64) {
        match self.metrics.get(&value_type) {
            Some((name, tol)) => (name.as_str(), *tol),
            None => default_metric(value_type),
        }
    }
}

/// A metric, its tolerance, and the statistic checked at the statistical level.
#[derive(Debug, Clone, PartialEq)]
pub struct AttrMeasure {
    pub metric: Metric,
    pub tolerance: f64,
    pub statistic: Statistic,
    pub stat_tolerance: f64,
}

impl AttrMeasure {
    pub fn new(metric: Metric, tolerance: f64) -> Self {
        Self {
            metric,
            tolerance,
            statistic: Statistic::Mean,
            stat_tolerance: 0.0,
        }
    }

    /// The default measure for a value type.
    pub fn default_for(value_type: ValueType, defaults: &MetricDefaults) -> Result<Self> {
        Self::parse(value_type, "", defaults)
    }

    /// Parse measure text such as `[dice .5]`.
    ///
    /// Tokens, all optional: metric name, tolerance, statistic, statistic
    /// tolerance. `-` stands for the default. A leading token that starts
    /// with a digit or `.` is taken as the tolerance.
    pub fn parse(value_type: ValueType, text: &str, defaults: &MetricDefaults) -> Result<Self> {
        let trimmed = text.trim();
        let inner = match (trimmed.starts_with('['), trimmed.ends_with(']')) {
            (true, true) => &trimmed[1..trimmed.len() - 1],
            (false, false) => trimmed,
            _ => {
                return Err(Error::ImproperMetric(format!(
                    "unbalanced brackets in '{}'",
                    text
                )))
            }
        };
        let mut tokens: Vec<&str> = inner.split_whitespace().collect();
        if tokens.len() > 4 {
            return Err(Error::ImproperMetric(format!("too many tokens in '{}'", text)));
        }
        if tokens
            .first()
            .map_or(false, |t| t.starts_with(|c: char| c.is_ascii_digit() || c == '.'))
        {
            tokens.insert(0, "-");
        }

        let (default_name, default_tol) = defaults.metric_for(value_type);
        let metric = match tokens.first() {
            None | Some(&"-") => metric_by_name(value_type, default_name)?,
            Some(name) => metric_by_name(value_type, name)?,
        };
        let tolerance = match tokens.get(1) {
            None | Some(&"-") => default_tol,
            Some(t) => parse_number(t, text)?,
        };
        let statistic = match tokens.get(2) {
            None | Some(&"-") => defaults.statistic,
            Some(s) => s.parse()?,
        };
        let stat_tolerance = match tokens.get(3) {
            None | Some(&"-") => defaults.stat_tolerance,
            Some(t) => parse_number(t, text)?,
        };

        Ok(Self {
            metric,
            tolerance,
            statistic,
            stat_tolerance,
        })
    }

    /// Whether a distance passes this measure's threshold.
    ///
    /// Distances pass when at most the tolerance, except that a tolerance of
    /// exactly 1 accepts anything strictly below 1. Similarities pass when at
    /// least the tolerance. NaN never passes.
    pub fn thresh(&self, value: f64) -> bool {
        if self.metric.is_distance {
            if self.tolerance == 1.0 {
                value < 1.0
            } else {
                value <= self.tolerance
            }
        } else {
            self.tolerance <= value
        }
    }
}

impl fmt::Display for AttrMeasure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{} {} {} {}]",
            self.metric.name, self.tolerance, self.statistic, self.stat_tolerance
        )
    }
}

fn parse_number(token: &str, text: &str) -> Result<f64> {
    token
        .parse::<f64>()
        .map_err(|_| Error::ImproperMetric(format!("'{}' is not a number in '{}'", token, text)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn defaults() -> MetricDefaults {
        MetricDefaults::new()
    }

    // ===== Parsing =====

    #[test]
    fn test_parse_bracketed() {
        let m = AttrMeasure::parse(ValueType::Region, "[dice .5]", &defaults()).unwrap();
        assert_eq!(m.metric.name, "dice");
        assert_eq!(m.tolerance, 0.5);
        assert_eq!(m.statistic, Statistic::Mean);
    }

    #[test]
    fn test_parse_defaults_and_dashes() {
        let m = AttrMeasure::parse(ValueType::FrameSpan, "", &defaults()).unwrap();
        assert_eq!(m.metric.name, "E");
        assert_eq!(m.tolerance, 0.0);

        let m = AttrMeasure::parse(ValueType::Text, "[- 2]", &defaults()).unwrap();
        assert_eq!(m.metric.name, "L");
        assert_eq!(m.tolerance, 2.0);

        let m = AttrMeasure::parse(ValueType::FrameSpan, ".3", &defaults()).unwrap();
        assert_eq!(m.metric.name, "E");
        assert_eq!(m.tolerance, 0.3);
    }

    #[test]
    fn test_parse_statistic_tokens() {
        let m = AttrMeasure::parse(ValueType::Region, "[dice .5 MEDIAN .2]", &defaults()).unwrap();
        assert_eq!(m.statistic, Statistic::Median);
        assert_eq!(m.stat_tolerance, 0.2);
    }

    #[test]
    fn test_parse_errors() {
        let d = defaults();
        assert!(matches!(
            AttrMeasure::parse(ValueType::Region, "[dice .5", &d),
            Err(Error::ImproperMetric(_))
        ));
        assert!(matches!(
            AttrMeasure::parse(ValueType::Region, "[dice abc]", &d),
            Err(Error::ImproperMetric(_))
        ));
        assert!(matches!(
            AttrMeasure::parse(ValueType::Region, "[dice .5 average]", &d),
            Err(Error::UnknownStatistic(_))
        ));
        assert!(matches!(
            AttrMeasure::parse(ValueType::Text, "[dice]", &d),
            Err(Error::UnknownDistance(_))
        ));
    }

    #[test]
    fn test_defaults_override() {
        let mut d = defaults();
        d.set_metric(ValueType::FrameSpan, "dice", 0.3).unwrap();
        d.statistic = Statistic::Maximum;
        let m = AttrMeasure::default_for(ValueType::FrameSpan, &d).unwrap();
        assert_eq!(m.metric.name, "dice");
        assert_eq!(m.tolerance, 0.3);
        assert_eq!(m.statistic, Statistic::Maximum);

        assert!(d.set_metric(ValueType::FrameSpan, "levenshtein", 0.0).is_err());
    }

    // ===== Threshold =====

    #[test]
    fn test_thresh_distance() {
        let m = AttrMeasure::parse(ValueType::Region, "[dice .5]", &defaults()).unwrap();
        assert!(m.thresh(0.5));
        assert!(!m.thresh(0.51));
        assert!(!m.thresh(f64::NAN));

        let one = AttrMeasure::parse(ValueType::Region, "[dice 1]", &defaults()).unwrap();
        assert!(one.thresh(0.999));
        assert!(!one.thresh(1.0));
    }

    #[test]
    fn test_thresh_similarity() {
        let m = AttrMeasure::parse(ValueType::Region, "[arearecall .75]", &defaults()).unwrap();
        assert!(m.thresh(0.75));
        assert!(m.thresh(1.0));
        assert!(!m.thresh(0.5));
    }

    #[test]
    fn test_statistic_names() {
        assert_eq!("Minimum".parse::<Statistic>().unwrap(), Statistic::Minimum);
        assert!("mode".parse::<Statistic>().is_err());
        let s: Statistic = serde_json::from_str("\"median\"").unwrap();
        assert_eq!(s, Statistic::Median);
    }
}
