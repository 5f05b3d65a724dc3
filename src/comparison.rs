//! A single target/candidate edge and its level state machine.
//!
//! A comparison starts at `Started` (or `Uncomparable` for mismatched
//! categories) and is promoted one level at a time by `try_match`,
//! `detect`, `localize` and `statistical`. A failed transition leaves the
//! level where it was and sets the distance to +inf. Calling a transition
//! out of order is a programming error and panics.

use std::fmt;

use log::debug;

use crate::descriptor::{DescKey, Descriptor, DescriptorArena, FileInformation};
use crate::distances::{AttrMeasure, Difference, DistanceHolder, Statistic, FRAMESPAN};
use crate::filter::FilterKind;
use crate::scope::{Equivalencies, ScopeRules};
use crate::span::FrameSpan;

/// How far a comparison has progressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Level {
    Uncomparable = -2,
    Started = -1,
    Matched = 0,
    Detected = 1,
    Localized = 2,
    Statisticed = 3,
    Complete = 4,
}

impl Level {
    pub fn value(self) -> i8 {
        self as i8
    }

    pub fn from_value(value: i8) -> Option<Level> {
        match value {
            -2 => Some(Level::Uncomparable),
            -1 => Some(Level::Started),
            0 => Some(Level::Matched),
            1 => Some(Level::Detected),
            2 => Some(Level::Localized),
            3 => Some(Level::Statisticed),
            4 => Some(Level::Complete),
            _ => None,
        }
    }

    pub fn next(self) -> Option<Level> {
        Level::from_value(self.value() + 1)
    }

    pub fn previous(self) -> Option<Level> {
        Level::from_value(self.value() - 1)
    }

    pub fn name(self) -> &'static str {
        match self {
            Level::Uncomparable => "UNCOMPARABLE",
            Level::Started => "STARTED",
            Level::Matched => "MATCHED",
            Level::Detected => "DETECTED",
            Level::Localized => "LOCALIZED",
            Level::Statisticed => "STATISTICED",
            Level::Complete => "COMPLETE",
        }
    }
}

impl fmt::Display for Level {
    /// Right-justified to the width of the longest name.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:>12}", self.name())
    }
}

fn stat_index(statistic: Statistic) -> usize {
    match statistic {
        Statistic::Mean => 0,
        Statistic::Minimum => 1,
        Statistic::Median => 2,
        Statistic::Maximum => 3,
    }
}

/// One edge of the comparison matrix.
#[derive(Debug, Clone, PartialEq)]
pub struct Comparison {
    target: DescKey,
    candidate: DescKey,
    level: Level,
    filter_level: FilterKind,
    distance: f64,
    match_span: FrameSpan,
    union_span: FrameSpan,
    attribute_distances: Vec<(String, DistanceHolder)>,
    statistics: [f64; 4],
}

impl Comparison {
    pub fn new(
        target: DescKey,
        candidate: DescKey,
        arena: &DescriptorArena,
        equivalencies: &Equivalencies,
    ) -> Self {
        let mut comparison = Self {
            target,
            candidate,
            level: Level::Uncomparable,
            filter_level: FilterKind::None,
            distance: f64::INFINITY,
            match_span: FrameSpan::empty(),
            union_span: FrameSpan::empty(),
            attribute_distances: Vec::new(),
            statistics: [0.0; 4],
        };
        comparison.reset(target, candidate, arena, equivalencies);
        comparison
    }

    /// Point the comparison at a (possibly new) pair and start over.
    pub fn reset(
        &mut self,
        target: DescKey,
        candidate: DescKey,
        arena: &DescriptorArena,
        equivalencies: &Equivalencies,
    ) {
        self.target = target;
        self.candidate = candidate;
        self.filter_level = FilterKind::None;
        self.attribute_distances.clear();
        self.statistics = [0.0; 4];

        let (t, c) = (&arena[target], &arena[candidate]);
        if t.same_category_as(c, equivalencies) {
            self.level = Level::Started;
            self.distance = 1.0;
            self.match_span = t.span.intersect(&c.span);
            self.union_span = t.span.union(&c.span);
        } else {
            self.level = Level::Uncomparable;
            self.distance = f64::INFINITY;
            self.match_span = FrameSpan::empty();
            self.union_span = FrameSpan::empty();
        }
    }

    pub fn target(&self) -> DescKey {
        self.target
    }

    pub fn candidate(&self) -> DescKey {
        self.candidate
    }

    pub fn level(&self) -> Level {
        self.level
    }

    pub fn filter_level(&self) -> FilterKind {
        self.filter_level
    }

    pub fn set_filter_level(&mut self, kind: FilterKind) {
        self.filter_level = kind;
    }

    pub fn distance(&self) -> f64 {
        self.distance
    }

    pub fn match_span(&self) -> &FrameSpan {
        &self.match_span
    }

    pub fn union_span(&self) -> &FrameSpan {
        &self.union_span
    }

    /// Average distance recorded for an attribute, 0 if it was not measured.
    pub fn distance_for(&self, attribute: &str) -> f64 {
        self.attribute_distances
            .iter()
            .find(|(name, _)| name == attribute)
            .map_or(0.0, |(_, holder)| holder.average())
    }

    pub fn attribute_distances(&self) -> &[(String, DistanceHolder)] {
        &self.attribute_distances
    }

    /// Value of a statistic computed at the statistical level.
    pub fn statistic(&self, statistic: Statistic) -> f64 {
        self.statistics[stat_index(statistic)]
    }

    fn fail(&mut self, stage: &str) -> bool {
        debug!(
            "comparison {:?}/{:?} failed {} at level {}",
            self.target,
            self.candidate,
            stage,
            self.level.name()
        );
        self.distance = f64::INFINITY;
        false
    }

    fn span_measure<'s>(scope: &'s ScopeRules, target: &Descriptor) -> Option<&'s AttrMeasure> {
        scope.span_measure(target)
    }

    /// Compare frame spans. Succeeds for any comparable pair with at least
    /// one shared frame; no threshold is applied yet.
    pub fn try_match(&mut self, arena: &DescriptorArena, scope: &ScopeRules) -> bool {
        let (t, c) = (&arena[self.target], &arena[self.candidate]);
        if self.level == Level::Uncomparable || !scope.comparable(t, c) {
            return self.fail("match: not comparable");
        }
        if !t.span.intersects(&c.span) {
            return self.fail("match: no shared frames");
        }
        let Some(measure) = Self::span_measure(scope, t) else {
            return self.fail("match: no frame span measure");
        };
        match Difference::spans(&t.span, &c.span, None, None) {
            Ok(d) => self.distance = measure.metric.distance(&d),
            Err(_) => return self.fail("match: span ignored"),
        }
        self.level = Level::Matched;
        true
    }

    /// Apply the frame span threshold, with spans clipped to the file.
    pub fn detect(
        &mut self,
        arena: &DescriptorArena,
        scope: &ScopeRules,
        file: &FileInformation,
    ) -> bool {
        assert_eq!(
            self.level,
            Level::Matched,
            "detection can only follow matching"
        );
        let (t, c) = (&arena[self.target], &arena[self.candidate]);
        let Some(measure) = Self::span_measure(scope, t) else {
            return self.fail("detect: no frame span measure");
        };
        let t_span = file.clip(&t.span);
        let c_span = file.clip(&c.span);
        let d = match Difference::spans(&t_span, &c_span, None, None) {
            Ok(d) => measure.metric.distance(&d),
            Err(_) => return self.fail("detect: span ignored"),
        };
        if !measure.thresh(d) {
            return self.fail("detect: frame span threshold");
        }
        self.distance = d;
        self.match_span = t_span.intersect(&c_span);
        self.level = Level::Detected;
        true
    }

    /// Measure every in-scope attribute, shrinking the match span to the
    /// frames where each passes its threshold.
    pub fn localize(
        &mut self,
        arena: &DescriptorArena,
        scope: &ScopeRules,
        file: &FileInformation,
    ) -> bool {
        assert_eq!(
            self.level,
            Level::Detected,
            "localization can only follow detection"
        );
        let (t, c) = (&arena[self.target], &arena[self.candidate]);
        let Some(measures) = scope.measures_for(t) else {
            return self.fail("localize: descriptor out of scope");
        };
        let equivalencies = scope.equivalencies();
        self.attribute_distances.clear();

        for (name, measure) in measures.iter().filter(|(name, _)| name.as_str() != FRAMESPAN) {
            let t_attr = t.attribute(name, equivalencies);
            let c_attr = c.attribute(name, equivalencies);
            if t_attr.is_none() && c_attr.is_none() {
                continue;
            }

            let mut holder = DistanceHolder::new();
            let dynamic = t_attr.map_or(false, |a| a.is_dynamic()) || c_attr.map_or(false, |a| a.is_dynamic());
            if dynamic {
                let union = t.span.union(&c.span);
                let mut cuts: Vec<u32> = Vec::new();
                for span in [&t.span, &c.span] {
                    cuts.extend(span.intervals().iter().flat_map(|&(b, e)| [b, e]));
                }
                for attr in [t_attr, c_attr].into_iter().flatten() {
                    cuts.extend(attr.breakpoints());
                }
                cuts.sort_unstable();
                cuts.dedup();

                for w in cuts.windows(2) {
                    let (begin, end) = (w[0], w[1]);
                    if !union.contains(begin) {
                        continue;
                    }
                    let tv = t_attr.filter(|_| t.span.contains(begin)).and_then(|a| a.value_at(begin));
                    let cv = c_attr.filter(|_| c.span.contains(begin)).and_then(|a| a.value_at(begin));
                    if tv.is_none() && cv.is_none() {
                        continue;
                    }
                    let Ok(diff) = Difference::values(tv, cv, None) else {
                        debug!("ignored value for '{}' over [{}, {})", name, begin, end);
                        continue;
                    };
                    let d = measure.metric.distance(&diff);
                    if d.is_nan() {
                        debug!("no information for '{}' over [{}, {})", name, begin, end);
                        continue;
                    }
                    holder.push(begin, end, d);
                    if !measure.thresh(d) {
                        self.match_span.clear(begin, end);
                    }
                }
            } else {
                let tv = t_attr.and_then(|a| a.first_value());
                let cv = c_attr.and_then(|a| a.first_value());
                let d = Difference::values(tv, cv, None)
                    .map_or(f64::NAN, |diff| measure.metric.distance(&diff));
                if d.is_nan() {
                    debug!("no information for '{}'", name);
                } else {
                    holder.push(0, 1, d);
                    if !measure.thresh(d) {
                        self.match_span = FrameSpan::empty();
                    }
                }
            }
            self.attribute_distances.push((name.clone(), holder));
        }

        let Some(span_measure) = Self::span_measure(scope, t) else {
            return self.fail("localize: no frame span measure");
        };
        let blackout = file.clip(&self.union_span).minus(&self.match_span);
        let d = match Difference::spans(&file.clip(&t.span), &file.clip(&c.span), Some(&blackout), None) {
            Ok(diff) => span_measure.metric.distance(&diff),
            Err(_) => return self.fail("localize: span ignored"),
        };
        if self.match_span.is_empty() || !span_measure.thresh(d) {
            return self.fail("localize: no frames survived");
        }
        self.distance = d;
        self.level = Level::Localized;
        true
    }

    /// Summarize attribute distances with the frame span measure's statistic.
    pub fn statistical(&mut self, arena: &DescriptorArena, scope: &ScopeRules) -> bool {
        assert_eq!(
            self.level,
            Level::Localized,
            "statistical match can only follow localization"
        );
        let Some(measure) = Self::span_measure(scope, &arena[self.target]) else {
            return self.fail("statistical: no frame span measure");
        };
        let statistic = measure.statistic;
        let tolerance = measure.stat_tolerance;

        let mut score = 0.0;
        let mut statistics = [0.0; 4];
        for (_, holder) in &self.attribute_distances {
            score += holder.average();
            statistics[stat_index(Statistic::Minimum)] = holder.minimum();
            statistics[stat_index(Statistic::Median)] = holder.median();
            statistics[stat_index(Statistic::Maximum)] = holder.maximum();
        }
        statistics[stat_index(Statistic::Mean)] = score;
        self.statistics = statistics;

        let d = statistics[stat_index(statistic)];
        if !(d < 1.0) {
            return self.fail("statistical: distance");
        }
        if self
            .attribute_distances
            .iter()
            .any(|(_, holder)| !(holder.statistic(statistic) <= tolerance))
        {
            return self.fail("statistical: attribute statistic");
        }
        self.distance = d;
        self.level = Level::Statisticed;
        true
    }

    /// Run the transitions from the current level up to `level`, stopping at
    /// the first failure.
    pub fn take_to_level(
        &mut self,
        level: Level,
        arena: &DescriptorArena,
        scope: &ScopeRules,
        file: &FileInformation,
    ) -> bool {
        while self.level < level {
            let ok = match self.level {
                Level::Started => self.try_match(arena, scope),
                Level::Matched => self.detect(arena, scope, file),
                Level::Detected => self.localize(arena, scope, file),
                Level::Localized => self.statistical(arena, scope),
                Level::Uncomparable | Level::Statisticed | Level::Complete => false,
            };
            if !ok {
                return false;
            }
        }
        self.distance < f64::INFINITY
    }

    /// Per-attribute statistics in measure order, for reporting.
    pub fn distances_line(&self, statistic: Statistic) -> String {
        self.attribute_distances
            .iter()
            .map(|(_, holder)| holder.statistic(statistic).to_string())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl fmt::Display for Comparison {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DISTANCE: {}, LEVEL: {}", self.distance, self.level.name())
    }
}
