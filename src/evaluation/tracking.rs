//! Tracking evaluation: per-track attribute distances.
//!
//! Targets are first paired with candidates that agree on every key
//! attribute. Whatever is left over goes through a detection-level
//! comparison matrix filtered greedily.

use std::fmt;
use std::sync::Arc;

use log::debug;

use super::{Evaluation, FileData, Information};
use crate::attribute::{Attribute, AttributeValue};
use crate::comparison::Level;
use crate::descriptor::Descriptor;
use crate::distances::{AttrMeasure, Difference, Metric, FRAMESPAN};
use crate::filter::FilterKind;
use crate::matrix::CompMatrix;
use crate::report::Report;
use crate::scope::ScopeRules;
use crate::span::FrameSpan;
use crate::Result;

/// What to compute for one attribute in tracking evaluation.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TrackMeasure {
    /// Tracks are identified by exact agreement on their key attributes.
    pub key: bool,
    /// Metrics averaged over the frames both tracks share.
    pub metrics: Vec<Metric>,
    /// Measure used when falling back to object matching.
    pub measure: Option<AttrMeasure>,
}

#[derive(Debug, Clone, PartialEq)]
struct TrackValue {
    attribute: String,
    metric: Metric,
    value: Option<f64>,
}

impl TrackValue {
    fn same_key(&self, attribute: &str, metric: &Metric) -> bool {
        self.attribute == attribute && self.metric.name == metric.name
    }
}

/// Sum two optional values. A missing or NaN side adopts the other.
fn smart_add(a: Option<f64>, b: Option<f64>) -> f64 {
    match (a, b) {
        (None, None) => 0.0,
        (Some(v), None) | (None, Some(v)) => v,
        (Some(a), Some(b)) if a.is_nan() => b,
        (Some(a), Some(b)) if b.is_nan() => a,
        (Some(a), Some(b)) => a + b,
    }
}

/// Attribute distances for one track, or summed over several.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TrackingInformation {
    ids: Vec<String>,
    overlaps: bool,
    values: Vec<TrackValue>,
}

impl TrackingInformation {
    /// An empty sum.
    pub fn empty() -> Self {
        Self::default()
    }

    /// A track with no values yet.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            ids: vec![id.into()],
            overlaps: false,
            values: Vec::new(),
        }
    }

    pub fn ids(&self) -> &[String] {
        &self.ids
    }

    /// Whether any matched track contributed values.
    pub fn overlaps(&self) -> bool {
        self.overlaps
    }

    pub fn set_value(&mut self, attribute: &str, metric: Metric, value: f64) {
        self.overlaps = true;
        match self.values.iter_mut().find(|v| v.same_key(attribute, &metric)) {
            Some(slot) => slot.value = Some(value),
            None => self.values.push(TrackValue {
                attribute: attribute.to_string(),
                metric,
                value: Some(value),
            }),
        }
    }

    fn raw_value(&self, attribute: &str, metric: &Metric) -> Option<f64> {
        self.values
            .iter()
            .find(|v| v.same_key(attribute, metric))
            .and_then(|v| v.value)
    }

    /// The value averaged over the ids in this information.
    pub fn value(&self, attribute: &str, metric_name: &str) -> Option<f64> {
        let slot = self
            .values
            .iter()
            .find(|v| v.attribute == attribute && v.metric.name == metric_name)?;
        Some(slot.value.unwrap_or(0.0) / self.ids.len().max(1) as f64)
    }

    fn is_all_finite(&self) -> bool {
        self.values
            .iter()
            .filter_map(|v| v.value)
            .all(|v| v < f64::INFINITY)
    }

    fn averages(&self) -> Vec<f64> {
        self.values
            .iter()
            .map(|v| {
                if self.overlaps {
                    v.value.unwrap_or(0.0) / self.ids.len().max(1) as f64
                } else {
                    0.0
                }
            })
            .collect()
    }
}

impl Information for TrackingInformation {
    /// Infinite values make a track unusable, so such tracks are not added.
    fn add(&mut self, other: &Self) {
        if !other.is_all_finite() || other.ids.is_empty() {
            return;
        }
        if self.ids.is_empty() {
            *self = other.clone();
            return;
        }
        self.overlaps |= other.overlaps;
        self.ids.extend(other.ids.iter().cloned());

        let mut keys: Vec<(String, Metric)> = self
            .values
            .iter()
            .map(|v| (v.attribute.clone(), v.metric))
            .collect();
        for v in &other.values {
            if !keys.iter().any(|(a, m)| v.same_key(a, m)) {
                keys.push((v.attribute.clone(), v.metric));
            }
        }
        for (attribute, metric) in keys {
            let sum = smart_add(
                self.raw_value(&attribute, &metric),
                other.raw_value(&attribute, &metric),
            );
            self.set_value(&attribute, metric, sum);
        }
    }

    fn has_information(&self) -> bool {
        !self.ids.is_empty()
    }

    fn layout(&self) -> String {
        self.values
            .iter()
            .map(|v| format!("{}:{}", v.attribute.trim(), v.metric.name))
            .collect::<Vec<_>>()
            .join(" ")
    }

    fn to_verbose(&self) -> String {
        let mut out = match (self.overlaps, self.ids.as_slice()) {
            (true, [id]) => format!("For object {}\n", id),
            (true, _) => "For all objects\n".to_string(),
            (false, [id]) => format!("For object {}, no match was found\n", id),
            (false, _) => "For all objects, no temporal overlaps were found\n".to_string(),
        };
        for (v, avg) in self.values.iter().zip(self.averages()) {
            out.push_str(&format!("{}: {}\n", v.metric.explanation, avg));
        }
        out
    }
}

impl fmt::Display for TrackingInformation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.ids.as_slice() {
            [id] => write!(f, "{}", id)?,
            _ => f.write_str("TOTAL")?,
        }
        for avg in self.averages() {
            write!(f, " {}", avg)?;
        }
        Ok(())
    }
}

/// The value of an attribute at a frame; static values hold everywhere.
fn value_at<'a>(attribute: Option<&'a Attribute>, frame: Option<u32>) -> Option<&'a AttributeValue> {
    let attribute = attribute?;
    match frame {
        Some(frame) => attribute.value_at(frame),
        None => attribute.first_value(),
    }
}

/// Tracks every target against its best candidate.
#[derive(Debug, Clone)]
pub struct TrackingEvaluation {
    scope: Arc<ScopeRules<TrackMeasure>>,
    object_scope: Arc<ScopeRules>,
}

impl TrackingEvaluation {
    pub fn new(scope: Arc<ScopeRules<TrackMeasure>>) -> Self {
        let object_scope = scope.map_measures(|_, m| m.measure.clone());
        Self {
            scope,
            object_scope: Arc::new(object_scope),
        }
    }

    /// Agreement on every key attribute, compared at the target's first frame.
    fn keys_agree(&self, target: &Descriptor, candidate: &Descriptor, keys: &[&str]) -> bool {
        let eq = self.scope.equivalencies();
        let frame = target.span.begin();
        keys.iter().all(|key| {
            value_at(target.attribute(key, eq), frame) == value_at(candidate.attribute(key, eq), frame)
        })
    }

    /// One information per track: key matches first, then the fallback
    /// matrix, then one unmatched entry per target left over.
    pub fn track_information(&self, data: &FileData) -> Result<Vec<TrackingInformation>> {
        let mut remaining: Vec<usize> = (0..data.candidates.len())
            .filter(|&c| self.scope.in_scope(&data.candidates[c]))
            .collect();
        let mut matched = Vec::new();
        let mut missed = Vec::new();

        for (t, target) in data.targets.iter().enumerate() {
            let Some(measures) = self.scope.measures_for(target) else {
                continue;
            };
            let keys: Vec<&str> = measures
                .iter()
                .filter(|(name, m)| m.key && name.as_str() != FRAMESPAN)
                .map(|(name, _)| name.as_str())
                .collect();
            if keys.is_empty() {
                missed.push(t);
                continue;
            }
            let before = matched.len();
            remaining.retain(|&c| {
                let candidate = &data.candidates[c];
                if self.scope.comparable(target, candidate) && self.keys_agree(target, candidate, &keys) {
                    matched.push((t, c));
                    false
                } else {
                    true
                }
            });
            if matched.len() == before {
                missed.push(t);
            }
        }

        let mut infos = Vec::new();
        for &(t, c) in &matched {
            let (target, candidate) = (&data.targets[t], &data.candidates[c]);
            match (target.span.begin(), target.span.end()) {
                (Some(begin), Some(end)) if target.span.num_frames() > 1 && candidate.span.num_frames() > 1 => {
                    infos.extend(self.track(target, candidate, begin + 1, end));
                }
                _ => debug!("skipping single frame track {}", target.id_label()),
            }
        }

        if missed.is_empty() {
            return Ok(infos);
        }
        if remaining.is_empty() {
            infos.extend(missed.iter().map(|&t| TrackingInformation::new(data.targets[t].id_label())));
            return Ok(infos);
        }

        let mut matrix = CompMatrix::new(
            missed.iter().map(|&t| data.targets[t].clone()).collect(),
            remaining.iter().map(|&c| data.candidates[c].clone()).collect(),
            Arc::clone(&self.object_scope),
            data.file.clone(),
        );
        if matrix.bring_to_level(Level::Detected) {
            matrix.remove_duplicates(FilterKind::SingleGreedy);
        }
        for column in 0..matrix.target_count() {
            let good = matrix.good_comparisons().find(|(t, _, _)| *t == column);
            let info = match good {
                Some((_, _, comp)) => {
                    let target = matrix.descriptor(comp.target());
                    let candidate = matrix.descriptor(comp.candidate());
                    let begin = target.span.begin().unwrap_or(0);
                    let end = target.span.end().unwrap_or(begin);
                    self.track(target, candidate, begin, end)
                        .unwrap_or_else(|| TrackingInformation::new(target.id_label()))
                }
                None => TrackingInformation::new(matrix.target(column).id_label()),
            };
            infos.push(info);
        }
        Ok(infos)
    }

    /// Average each metric over the frames in `[start, end)` both tracks
    /// share. The frame span is compared once, ignoring frames before
    /// `start`. `None` when an attribute has no shared frame to average.
    fn track(&self, target: &Descriptor, candidate: &Descriptor, start: u32, end: u32) -> Option<TrackingInformation> {
        let eq = self.scope.equivalencies();
        let mut info = TrackingInformation::new(target.id_label());
        let Some(measures) = self.scope.measures_for(target) else {
            return Some(info);
        };
        let shared = target.span.intersect(&candidate.span);
        let ignore = target
            .span
            .begin()
            .filter(|&begin| start > begin)
            .map(|begin| FrameSpan::new(begin, start));

        for (name, measure) in measures.iter().filter(|(_, m)| !m.metrics.is_empty()) {
            if name == FRAMESPAN {
                let diff = Difference::spans(&target.span, &candidate.span, None, ignore.as_ref());
                for metric in &measure.metrics {
                    let d = diff.as_ref().map_or(f64::NAN, |diff| metric.distance(diff));
                    info.set_value(name, *metric, d);
                }
                continue;
            }

            let (t_attr, c_attr) = (target.attribute(name, eq), candidate.attribute(name, eq));
            let mut sums = vec![0.0; measure.metrics.len()];
            let mut frames = 0u32;
            for frame in (start..end).filter(|&f| shared.contains(f)) {
                let tv = value_at(t_attr, Some(frame));
                let cv = value_at(c_attr, Some(frame));
                match Difference::values(tv, cv, None) {
                    Ok(diff) => {
                        frames += 1;
                        for (sum, metric) in sums.iter_mut().zip(&measure.metrics) {
                            *sum += metric.distance(&diff);
                        }
                    }
                    Err(_) => debug!("ignored value for '{}' at frame {}", name, frame),
                }
            }
            if frames == 0 {
                debug!("no shared frames for '{}' on track {}", name, target.id_label());
                return None;
            }
            for (sum, metric) in sums.iter().zip(&measure.metrics) {
                info.set_value(name, *metric, sum / frames as f64);
            }
        }
        Some(info)
    }
}

impl Evaluation for TrackingEvaluation {
    type Info = TrackingInformation;

    fn name(&self) -> &'static str {
        "Tracking Evaluation"
    }

    fn empty_information(&self) -> TrackingInformation {
        TrackingInformation::empty()
    }

    fn evaluate(&self, data: &FileData, _report: &mut Report) -> Result<TrackingInformation> {
        let mut total = TrackingInformation::empty();
        for info in self.track_information(data)? {
            total.add(&info);
        }
        Ok(total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attribute::{BBox, Region, ValueType};
    use crate::descriptor::{Category, FileInformation};
    use crate::distances::{metric_by_name, MetricDefaults};
    use crate::scope::Equivalencies;
    use approx::assert_relative_eq;
    use std::collections::BTreeMap;

    fn scope() -> Arc<ScopeRules<TrackMeasure>> {
        let defaults = MetricDefaults::new();
        let mut measures = BTreeMap::new();
        measures.insert(
            FRAMESPAN.to_string(),
            TrackMeasure {
                key: false,
                metrics: vec![metric_by_name(ValueType::FrameSpan, "dice").unwrap()],
                measure: Some(AttrMeasure::parse(ValueType::FrameSpan, "[dice .5]", &defaults).unwrap()),
            },
        );
        measures.insert(
            "name".to_string(),
            TrackMeasure {
                key: true,
                ..Default::default()
            },
        );
        measures.insert(
            "box".to_string(),
            TrackMeasure {
                key: false,
                metrics: vec![metric_by_name(ValueType::Region, "dice").unwrap()],
                measure: None,
            },
        );
        let mut scope = ScopeRules::new(Equivalencies::new());
        scope.add_descriptor(Category::Object, "PERSON", measures);
        Arc::new(scope)
    }

    fn person(id: u32, begin: u32, end: u32, name: &str, x: i64) -> Descriptor {
        let label = AttributeValue::Lvalue(name.to_string());
        let area = AttributeValue::Region(Region::from_bbox(BBox::new(x, 0, 10, 10)));
        Descriptor::new(Category::Object, "PERSON", id, FrameSpan::new(begin, end))
            .with_attribute("name", Attribute::Static(Some(label)))
            .with_attribute("box", Attribute::Static(Some(area)))
    }

    // ===== Information =====

    #[test]
    fn test_smart_add_skips_nan_and_missing() {
        assert_eq!(smart_add(None, None), 0.0);
        assert_eq!(smart_add(Some(1.5), None), 1.5);
        assert_eq!(smart_add(Some(f64::NAN), Some(2.0)), 2.0);
        assert_eq!(smart_add(Some(1.0), Some(2.0)), 3.0);
    }

    #[test]
    fn test_add_ignores_infinite_tracks() {
        let dice = metric_by_name(ValueType::FrameSpan, "dice").unwrap();
        let mut a = TrackingInformation::new("1");
        a.set_value(FRAMESPAN, dice, 0.5);
        let mut b = TrackingInformation::new("2");
        b.set_value(FRAMESPAN, dice, f64::INFINITY);
        a.add(&b);
        assert_eq!(a.ids(), ["1"]);

        let mut c = TrackingInformation::new("3");
        c.set_value(FRAMESPAN, dice, 0.25);
        a.add(&c);
        assert_eq!(a.to_string(), "TOTAL 0.375");
        assert_eq!(a.layout(), "framespan:dice");
    }

    #[test]
    fn test_unmatched_renders_zeros() {
        let info = TrackingInformation::new("7");
        assert!(!info.overlaps());
        assert_eq!(info.to_string(), "7");
        assert!(info.to_verbose().contains("no match was found"));
    }

    // ===== Evaluation =====

    #[test]
    fn test_key_match_then_fallback_then_unmatched() {
        let eval = TrackingEvaluation::new(scope());
        let data = FileData::new(
            FileInformation::new("clip"),
            vec![
                person(1, 0, 4, "bob", 0),
                person(2, 10, 20, "al", 0),
                person(3, 30, 31, "x", 0),
            ],
            vec![person(11, 0, 4, "bob", 0), person(12, 10, 20, "zed", 5)],
        );
        let tracks = eval.track_information(&data).unwrap();
        assert_eq!(tracks.len(), 3);

        assert_eq!(tracks[0].ids(), ["1"]);
        assert_eq!(tracks[0].value(FRAMESPAN, "dice"), Some(0.0));
        assert_eq!(tracks[0].value("box", "dice"), Some(0.0));

        assert_eq!(tracks[1].ids(), ["2"]);
        assert_relative_eq!(tracks[1].value("box", "dice").unwrap(), 0.5);

        assert_eq!(tracks[2].ids(), ["3"]);
        assert!(!tracks[2].overlaps());

        let total = eval.evaluate(&data, &mut Report::new()).unwrap();
        assert_eq!(total.ids().len(), 3);
        assert_relative_eq!(total.value("box", "dice").unwrap(), 0.5 / 3.0);
    }

    #[test]
    fn test_key_pair_without_later_shared_frames_is_skipped() {
        // The tracks only share the target's first frame.
        let eval = TrackingEvaluation::new(scope());
        let target = person(1, 5, 10, "bob", 0);
        let candidate = person(11, 0, 6, "bob", 0);
        assert!(eval.track(&target, &candidate, 6, 10).is_none());
        assert!(eval.track(&target, &candidate, 5, 10).is_some());

        let data = FileData::new(FileInformation::new("clip"), vec![target], vec![candidate]);
        assert!(eval.track_information(&data).unwrap().is_empty());
        let total = eval.evaluate(&data, &mut Report::new()).unwrap();
        assert!(total.value("box", "dice").map_or(true, |v| !v.is_nan()));
    }
}
