//! Framewise evaluation: every frame on its own, ignoring descriptor
//! continuity.
//!
//! For each frame and descriptor type, the visible targets are composed into
//! one aggregate and the counted candidates into another. Targets hidden by
//! the output filter, and candidates outside it, form a don't-care aggregate
//! whose area is ignored. A visible candidate is dropped entirely when it
//! matches some don't-care target under the attribute's don't-care measure.

use std::fmt;
use std::sync::Arc;

use log::debug;

use super::{Evaluation, FileData, Information};
use crate::attribute::AttributeValue;
use crate::descriptor::Descriptor;
use crate::distances::{AttrMeasure, Difference, DistanceShape, Metric, FRAMESPAN};
use crate::report::Report;
use crate::scope::{DescriptorScope, Equivalencies, ScopeRules};
use crate::utils::warn_once;
use crate::{Error, Result};

/// What to compute for one attribute in framewise evaluation.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FrameMeasure {
    /// Metrics aggregated according to their shape.
    pub metrics: Vec<Metric>,
    /// Thresholded metrics reported as the fraction of comparisons passing.
    pub localizers: Vec<AttrMeasure>,
    /// Candidates within this measure of a don't-care target are ignored.
    pub dont_care: Option<AttrMeasure>,
}

/// One output field of a [`FramewiseInformation`].
#[derive(Debug, Clone, PartialEq)]
pub enum FrameColumn {
    Metric {
        descriptor: String,
        attribute: String,
        metric: Metric,
    },
    Localizer {
        descriptor: String,
        attribute: String,
        measure: AttrMeasure,
    },
}

impl FrameColumn {
    fn belongs_to(&self, descriptor_type: &str, attribute_name: &str) -> bool {
        let (d, a) = match self {
            FrameColumn::Metric {
                descriptor, attribute, ..
            }
            | FrameColumn::Localizer {
                descriptor, attribute, ..
            } => (descriptor, attribute),
        };
        d == descriptor_type && a == attribute_name
    }

    fn label(&self) -> String {
        match self {
            FrameColumn::Metric { metric, .. } => metric.name.to_string(),
            FrameColumn::Localizer { measure, .. } => format!("{}@{}", measure.metric.name, measure.tolerance),
        }
    }

    fn explanation(&self) -> String {
        match self {
            FrameColumn::Metric { metric, .. } => metric.explanation.to_string(),
            FrameColumn::Localizer { measure, .. } => format!("Localized {}", measure.metric.explanation),
        }
    }
}

/// A running `hits / count` ratio.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PartialSum {
    pub hits: f64,
    pub count: f64,
}

impl PartialSum {
    pub fn add(&mut self, hits: f64, count: f64) {
        self.hits += hits;
        self.count += count;
    }

    pub fn average(&self) -> Option<f64> {
        (self.count != 0.0).then(|| self.hits / self.count)
    }
}

impl fmt::Display for PartialSum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.average() {
            Some(avg) => write!(f, "{}", avg),
            None => f.write_str("undefined"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum FrameValue {
    Number(f64),
    List(Vec<f64>),
    Partial(PartialSum),
}

impl FrameValue {
    fn merge(&mut self, other: &FrameValue) {
        match (self, other) {
            (FrameValue::Number(a), FrameValue::Number(b)) => *a += b,
            (FrameValue::List(a), FrameValue::List(b)) => a.extend_from_slice(b),
            (FrameValue::Partial(a), FrameValue::Partial(b)) => a.add(b.hits, b.count),
            (a, b) => debug!("mismatched framewise values {:?} and {:?}", a, b),
        }
    }
}

fn average_ignoring_nan(values: &[f64]) -> Option<f64> {
    let finite: Vec<f64> = values.iter().copied().filter(|v| !v.is_nan()).collect();
    (!finite.is_empty()).then(|| finite.iter().sum::<f64>() / finite.len() as f64)
}

fn undefined_or<T: ToString>(value: Option<T>) -> String {
    value.map_or_else(|| "undefined".to_string(), |v| v.to_string())
}

/// Object counts, frame counts and per-column values summed over frames.
#[derive(Debug, Clone, PartialEq)]
pub struct FramewiseInformation {
    columns: Arc<[FrameColumn]>,
    values: Vec<Option<FrameValue>>,
    truth_objects: u64,
    result_objects: u64,
    frame_count: u64,
    detected_frames: u64,
    missed_frames: u64,
    false_frames: u64,
}

impl FramewiseInformation {
    pub fn new(columns: Arc<[FrameColumn]>) -> Self {
        let values = vec![None; columns.len()];
        Self {
            columns,
            values,
            truth_objects: 0,
            result_objects: 0,
            frame_count: 0,
            detected_frames: 0,
            missed_frames: 0,
            false_frames: 0,
        }
    }

    pub fn columns(&self) -> &[FrameColumn] {
        &self.columns
    }

    pub fn truth_objects(&self) -> u64 {
        self.truth_objects
    }

    pub fn result_objects(&self) -> u64 {
        self.result_objects
    }

    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    /// Frames with both targets and candidates.
    pub fn detected_frames(&self) -> u64 {
        self.detected_frames
    }

    /// Frames with targets only.
    pub fn missed_frames(&self) -> u64 {
        self.missed_frames
    }

    /// Frames with candidates only.
    pub fn false_frames(&self) -> u64 {
        self.false_frames
    }

    /// `2 min(t, r) / (t + r)` over the object counts.
    pub fn object_count_accuracy(&self) -> Option<f64> {
        let (t, r) = (self.truth_objects, self.result_objects);
        (t + r > 0).then(|| 2.0 * t.min(r) as f64 / (t + r) as f64)
    }

    /// `t / r`, capped at 1.
    pub fn object_count_precision(&self) -> Option<f64> {
        let (t, r) = (self.truth_objects, self.result_objects);
        (r > 0).then(|| if t < r { t as f64 / r as f64 } else { 1.0 })
    }

    /// `r / t`, capped at 1.
    pub fn object_count_recall(&self) -> Option<f64> {
        let (t, r) = (self.truth_objects, self.result_objects);
        (t > 0).then(|| if r < t { r as f64 / t as f64 } else { 1.0 })
    }

    /// The rendered value of one column.
    pub fn value(&self, index: usize) -> Option<f64> {
        let column = self.columns.get(index)?;
        match (column, self.values.get(index)?.as_ref()?) {
            (FrameColumn::Metric { metric, .. }, FrameValue::Number(n)) => match metric.shape {
                DistanceShape::OverallMean(_) => Some(n / self.frame_count as f64),
                _ => Some(*n),
            },
            (_, FrameValue::List(values)) => average_ignoring_nan(values),
            (_, FrameValue::Partial(sum)) => sum.average(),
            _ => None,
        }
    }

    fn set_overall(&mut self, index: usize, value: f64) {
        self.values[index] = Some(FrameValue::Number(value));
    }

    fn push_value(&mut self, index: usize, value: f64) {
        match &mut self.values[index] {
            Some(FrameValue::List(list)) => list.push(value),
            slot => *slot = Some(FrameValue::List(vec![value])),
        }
    }

    fn count_localized(&mut self, index: usize, passed: bool) {
        let hit = if passed { 1.0 } else { 0.0 };
        match &mut self.values[index] {
            Some(FrameValue::Partial(sum)) => sum.add(hit, 1.0),
            slot => *slot = Some(FrameValue::Partial(PartialSum { hits: hit, count: 1.0 })),
        }
    }

    fn render(&self, verbose: bool) -> String {
        let mut out = String::new();
        let mut field = |label: &str, value: String| {
            if verbose {
                out.push_str(label);
                out.push_str(": ");
                out.push_str(&value);
                out.push('\n');
            } else {
                if !out.is_empty() {
                    out.push(' ');
                }
                out.push_str(&value);
            }
        };
        field("Detection Accuracy", undefined_or(self.object_count_accuracy()));
        field("Object Count Recall", undefined_or(self.object_count_recall()));
        field("Object Count Precision", undefined_or(self.object_count_precision()));
        for (i, column) in self.columns.iter().enumerate() {
            field(&column.explanation(), undefined_or(self.value(i)));
        }
        if verbose {
            out.push_str(&format!(
                "Frames: {} detected, {} missed, {} false of {}\n",
                self.detected_frames, self.missed_frames, self.false_frames, self.frame_count
            ));
        }
        out
    }
}

impl Information for FramewiseInformation {
    fn add(&mut self, other: &Self) {
        if self.columns.is_empty() && !other.columns.is_empty() {
            self.columns = Arc::clone(&other.columns);
            self.values = vec![None; other.values.len()];
        }
        self.truth_objects += other.truth_objects;
        self.result_objects += other.result_objects;
        self.frame_count += other.frame_count;
        self.detected_frames += other.detected_frames;
        self.missed_frames += other.missed_frames;
        self.false_frames += other.false_frames;
        for (mine, theirs) in self.values.iter_mut().zip(&other.values) {
            match (mine.as_mut(), theirs) {
                (_, None) => {}
                (None, Some(v)) => *mine = Some(v.clone()),
                (Some(m), Some(v)) => m.merge(v),
            }
        }
    }

    fn has_information(&self) -> bool {
        self.frame_count > 0
    }

    fn layout(&self) -> String {
        let mut layout = "OBJ_COUNT_ACC OBJ_COUNT_RECALL OBJ_COUNT_PRECISION".to_string();
        for column in self.columns.iter() {
            layout.push(' ');
            layout.push_str(&column.label());
        }
        layout
    }

    fn to_verbose(&self) -> String {
        self.render(true)
    }
}

impl fmt::Display for FramewiseInformation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render(false))
    }
}

/// Per-frame evaluation over the descriptor types of a framewise scope.
#[derive(Debug, Clone)]
pub struct FramewiseEvaluation {
    scope: Arc<ScopeRules<FrameMeasure>>,
    columns: Arc<[FrameColumn]>,
}

fn attribute_value<'a>(
    descriptor: Option<&'a Descriptor>,
    name: &str,
    frame: u32,
    equivalencies: &Equivalencies,
) -> Option<&'a AttributeValue> {
    descriptor?.attribute(name, equivalencies)?.value_at(frame)
}

/// Compose `single` into the running aggregate. An attribute that cannot
/// be composed leaves the aggregate as it was.
fn combine(so_far: Option<Descriptor>, single: &Descriptor, attributes: &[&str]) -> Result<Option<Descriptor>> {
    let Some(so_far) = so_far else {
        return Ok(Some(single.clone()));
    };
    match so_far.compose(single, attributes) {
        Ok(composed) => Ok(Some(composed)),
        Err(Error::Uncomposable(reason)) => {
            warn_once(&format!("framewise evaluation skipped a composition: {}", reason));
            Ok(Some(so_far))
        }
        Err(err) => Err(err),
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Direction {
    TargetsVsCandidates,
    CandidatesVsTargets,
}

impl Direction {
    fn accepts(self, shape: &DistanceShape) -> bool {
        match self {
            Direction::TargetsVsCandidates => shape.per_target(),
            Direction::CandidatesVsTargets => shape.per_candidate(),
        }
    }
}

impl FramewiseEvaluation {
    pub fn new(scope: Arc<ScopeRules<FrameMeasure>>) -> Self {
        let mut columns = Vec::new();
        for rule in scope.descriptors() {
            let descriptor = format!("{} {}", rule.category, rule.name);
            for (attribute, measure) in rule.measures.iter().filter(|(name, _)| name.as_str() != FRAMESPAN) {
                for metric in &measure.metrics {
                    columns.push(FrameColumn::Metric {
                        descriptor: descriptor.clone(),
                        attribute: attribute.clone(),
                        metric: *metric,
                    });
                }
                for localizer in &measure.localizers {
                    columns.push(FrameColumn::Localizer {
                        descriptor: descriptor.clone(),
                        attribute: attribute.clone(),
                        measure: localizer.clone(),
                    });
                }
            }
        }
        Self {
            scope,
            columns: columns.into(),
        }
    }

    pub fn columns(&self) -> &[FrameColumn] {
        &self.columns
    }

    /// Information for every frame that had something to measure.
    pub fn frame_information(&self, data: &FileData) -> Result<Vec<(u32, FramewiseInformation)>> {
        let Some(highest) = data.highest_frame() else {
            return Ok(Vec::new());
        };
        let mut frames = Vec::new();
        for frame in 0..=highest {
            let info = self.evaluate_frame(data, frame)?;
            if info.has_information() {
                frames.push((frame, info));
            }
        }
        Ok(frames)
    }

    fn evaluate_frame(&self, data: &FileData, frame: u32) -> Result<FramewiseInformation> {
        let eq = self.scope.equivalencies();
        let targets: Vec<Descriptor> = data.targets.iter().filter_map(|d| d.crop_to_frame(frame)).collect();
        let candidates: Vec<Descriptor> = data.candidates.iter().filter_map(|d| d.crop_to_frame(frame)).collect();

        let mut info = FramewiseInformation::new(Arc::clone(&self.columns));
        let mut target_objects = 0;
        let mut candidate_objects = 0;

        for rule in self.scope.descriptors() {
            let in_rule = |d: &Descriptor| d.category == rule.category && eq.names_match(&rule.name, &d.name);
            let attributes: Vec<&str> = rule
                .measures
                .keys()
                .map(String::as_str)
                .filter(|name| *name != FRAMESPAN)
                .collect();

            let mut target_desc = None;
            let mut candidate_desc = None;
            let mut dont_care_desc = None;
            let mut counted_targets = Vec::new();
            let mut counted_candidates = Vec::new();
            let mut dont_cares = Vec::new();

            for target in targets.iter().filter(|&d| in_rule(d)) {
                if self.scope.is_outputable_target(target) {
                    target_objects += 1;
                    counted_targets.push(target);
                    target_desc = combine(target_desc, target, &attributes)?;
                } else {
                    dont_cares.push(target);
                    dont_care_desc = combine(dont_care_desc, target, &attributes)?;
                }
            }

            for candidate in candidates.iter().filter(|&d| in_rule(d)) {
                if !self.scope.is_outputable_candidate(candidate) {
                    dont_care_desc = combine(dont_care_desc, candidate, &attributes)?;
                } else if !self.explained_by_dont_care(rule, candidate, &dont_cares, frame) {
                    candidate_objects += 1;
                    counted_candidates.push(candidate);
                    candidate_desc = combine(candidate_desc, candidate, &attributes)?;
                }
            }

            if target_desc.is_none() && candidate_desc.is_none() {
                continue;
            }
            info.frame_count = 1;

            let descriptor_type = format!("{} {}", rule.category, rule.name);
            for attribute in &attributes {
                let t = attribute_value(target_desc.as_ref(), attribute, frame, eq);
                let c = attribute_value(candidate_desc.as_ref(), attribute, frame, eq);
                let dc = attribute_value(dont_care_desc.as_ref(), attribute, frame, eq);

                match Difference::values(t, c, dc) {
                    Ok(diff) => self.set_overalls(&mut info, &descriptor_type, attribute, &diff),
                    Err(_) => {
                        warn_once("framewise evaluation ignored all data in a frame");
                    }
                }

                for target in &counted_targets {
                    let t_curr = attribute_value(Some(*target), attribute, frame, eq);
                    if t_curr.is_none() && c.is_none() {
                        continue;
                    }
                    if let Ok(diff) = Difference::values(t_curr, c, dc) {
                        self.add_directed(&mut info, &descriptor_type, attribute, &diff, Direction::TargetsVsCandidates);
                    }
                }
                for candidate in &counted_candidates {
                    let c_curr = attribute_value(Some(*candidate), attribute, frame, eq);
                    if c_curr.is_none() && t.is_none() {
                        continue;
                    }
                    if let Ok(diff) = Difference::values(t, c_curr, dc) {
                        self.add_directed(&mut info, &descriptor_type, attribute, &diff, Direction::CandidatesVsTargets);
                    }
                }
            }
        }

        info.truth_objects = target_objects;
        info.result_objects = candidate_objects;
        if info.frame_count > 0 {
            match (target_objects > 0, candidate_objects > 0) {
                (true, true) => info.detected_frames = 1,
                (true, false) => info.missed_frames = 1,
                (false, true) => info.false_frames = 1,
                (false, false) => {}
            }
        }
        Ok(info)
    }

    /// Quadratic search: does any don't-care target match this candidate
    /// under some attribute's don't-care measure?
    fn explained_by_dont_care(
        &self,
        rule: &DescriptorScope<FrameMeasure>,
        candidate: &Descriptor,
        dont_cares: &[&Descriptor],
        frame: u32,
    ) -> bool {
        let eq = self.scope.equivalencies();
        rule.measures.iter().any(|(attribute, measure)| {
            let Some(dc_measure) = &measure.dont_care else {
                return false;
            };
            let c = attribute_value(Some(candidate), attribute, frame, eq);
            dont_cares.iter().any(|target| {
                let t = attribute_value(Some(*target), attribute, frame, eq);
                Difference::values(t, c, None)
                    .map_or(false, |diff| dc_measure.thresh(dc_measure.metric.distance(&diff)))
            })
        })
    }

    fn set_overalls(&self, info: &mut FramewiseInformation, descriptor_type: &str, attribute: &str, diff: &Difference) {
        for (i, column) in self.columns.iter().enumerate() {
            if !column.belongs_to(descriptor_type, attribute) {
                continue;
            }
            if let FrameColumn::Metric { metric, .. } = column {
                if matches!(metric.shape, DistanceShape::OverallSum(_) | DistanceShape::OverallMean(_)) {
                    info.set_overall(i, metric.distance(diff));
                }
            }
        }
    }

    fn add_directed(
        &self,
        info: &mut FramewiseInformation,
        descriptor_type: &str,
        attribute: &str,
        diff: &Difference,
        direction: Direction,
    ) {
        for (i, column) in self.columns.iter().enumerate() {
            if !column.belongs_to(descriptor_type, attribute) {
                continue;
            }
            match column {
                FrameColumn::Metric { metric, .. } if direction.accepts(&metric.shape) => {
                    let d = metric.distance(diff);
                    if !d.is_nan() {
                        info.push_value(i, d);
                    }
                }
                FrameColumn::Localizer { measure, .. } if direction.accepts(&measure.metric.shape) => {
                    let d = measure.metric.distance(diff);
                    if !d.is_nan() {
                        info.count_localized(i, measure.thresh(d));
                    }
                }
                _ => {}
            }
        }
    }
}

impl Evaluation for FramewiseEvaluation {
    type Info = FramewiseInformation;

    fn name(&self) -> &'static str {
        "Framewise Evaluation"
    }

    fn empty_information(&self) -> FramewiseInformation {
        FramewiseInformation::new(Arc::clone(&self.columns))
    }

    fn evaluate(&self, data: &FileData, _report: &mut Report) -> Result<FramewiseInformation> {
        let mut total = self.empty_information();
        for (_, info) in self.frame_information(data)? {
            total.add(&info);
        }
        Ok(total)
    }
}
