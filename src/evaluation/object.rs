//! Object evaluation: precision and recall of whole descriptors.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use log::debug;

use super::{Evaluation, FileData, Information};
use crate::comparison::Level;
use crate::filter::FilterKind;
use crate::matrix::CompMatrix;
use crate::report::Report;
use crate::scope::ScopeRules;
use crate::utils::{format_ratio, ratio};
use crate::{Error, Result};

/// Hit and missed counts for one descriptor type.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PrecisionRecall {
    pub targets_hit: u64,
    pub targets_missed: u64,
    pub candidates_hit: u64,
    pub candidates_missed: u64,
}

impl PrecisionRecall {
    pub fn add_this(&mut self, other: &PrecisionRecall) {
        self.targets_hit += other.targets_hit;
        self.targets_missed += other.targets_missed;
        self.candidates_hit += other.candidates_hit;
        self.candidates_missed += other.candidates_missed;
    }

    pub fn target_count(&self) -> u64 {
        self.targets_hit + self.targets_missed
    }

    pub fn candidate_count(&self) -> u64 {
        self.candidates_hit + self.candidates_missed
    }

    /// Fraction of candidates that hit a target.
    pub fn precision(&self) -> Option<f64> {
        ratio(self.candidates_hit as f64, self.candidate_count() as f64)
    }

    /// Fraction of targets that were hit.
    pub fn recall(&self) -> Option<f64> {
        ratio(self.targets_hit as f64, self.target_count() as f64)
    }

    fn verbose_into(&self, name: &str, out: &mut String) {
        let percent = |hit: u64, total: u64| {
            if total > 0 {
                (hit * 100 / total).to_string()
            } else {
                "-".to_string()
            }
        };
        out.push_str(&format!(
            "\nFor {}: Precision is {} %  ({}/{})\n",
            name,
            percent(self.candidates_hit, self.candidate_count()),
            self.candidates_hit,
            self.candidate_count()
        ));
        out.push_str(&format!(
            "For {}: Recall is {} %  ({}/{})\n",
            name,
            percent(self.targets_hit, self.target_count()),
            self.targets_hit,
            self.target_count()
        ));
    }
}

impl fmt::Display for PrecisionRecall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} {}",
            self.target_count(),
            self.candidate_count(),
            format_ratio(self.precision()),
            format_ratio(self.recall())
        )
    }
}

/// Precision and recall keyed by `"CATEGORY NAME"`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ObjectInformation {
    counts: BTreeMap<String, PrecisionRecall>,
}

impl ObjectInformation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, descriptor_type: impl Into<String>, counts: PrecisionRecall) {
        self.counts.insert(descriptor_type.into(), counts);
    }

    pub fn get(&self, descriptor_type: &str) -> Option<&PrecisionRecall> {
        self.counts.get(descriptor_type)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &PrecisionRecall)> + '_ {
        self.counts.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Counts summed over every descriptor type.
    pub fn total(&self) -> PrecisionRecall {
        let mut total = PrecisionRecall::default();
        for counts in self.counts.values() {
            total.add_this(counts);
        }
        total
    }
}

impl Information for ObjectInformation {
    fn add(&mut self, other: &Self) {
        for (name, counts) in &other.counts {
            self.counts.entry(name.clone()).or_default().add_this(counts);
        }
    }

    fn has_information(&self) -> bool {
        !self.counts.is_empty()
    }

    fn layout(&self) -> String {
        "DESC_NAME TARGET_COUNT CANDIDATE_COUNT PRECISION RECALL".to_string()
    }

    fn to_verbose(&self) -> String {
        let mut out = String::new();
        for (name, counts) in &self.counts {
            counts.verbose_into(name, &mut out);
        }
        self.total().verbose_into("TOTAL", &mut out);
        out
    }
}

impl fmt::Display for ObjectInformation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (name, counts) in &self.counts {
            writeln!(f, "{} {}", name, counts)?;
        }
        writeln!(f, "TOTAL {}", self.total())
    }
}

/// Drives a comparison matrix up to the configured level, reporting the
/// targets and candidates lost at each level, then optionally filters it
/// down to one-to-one (or composed) matches.
#[derive(Debug, Clone)]
pub struct ObjectEvaluation {
    scope: Arc<ScopeRules>,
    level: Level,
    target_match: FilterKind,
}

impl ObjectEvaluation {
    /// # Errors
    ///
    /// If `level` is not one of matched, detected, localized or statisticed.
    pub fn new(scope: Arc<ScopeRules>, level: Level, target_match: FilterKind) -> Result<Self> {
        if level < Level::Matched || level > Level::Statisticed {
            return Err(Error::InvalidConfig(format!(
                "object evaluation level must be between 0 and 3, got {}",
                level.value()
            )));
        }
        Ok(Self {
            scope,
            level,
            target_match,
        })
    }

    pub fn level(&self) -> Level {
        self.level
    }

    pub fn target_match(&self) -> FilterKind {
        self.target_match
    }

    pub fn scope(&self) -> &ScopeRules {
        &self.scope
    }

    /// Build the matrix for one file and run it through every level and the
    /// filter. The matrix is returned for inspection.
    pub fn run_matrix(&self, data: &FileData, report: &mut Report) -> CompMatrix {
        let mut matrix = CompMatrix::new(
            data.targets.clone(),
            data.candidates.clone(),
            Arc::clone(&self.scope),
            data.file.clone(),
        );

        let mut level = Level::Matched;
        loop {
            let continuable = matrix.bring_to_level(level);
            matrix.report_false_and_missed(report);
            if !continuable {
                debug!("{}: nothing survived {}", data.file.name, level.name());
                break;
            }
            match level.next() {
                Some(next) if next <= self.level => level = next,
                _ => break,
            }
        }

        if self.target_match != FilterKind::None && matrix.is_continuable() {
            matrix.remove_duplicates(self.target_match);
            matrix.report_false_and_missed(report);
        }
        matrix.report_candidates(report);
        matrix
    }
}

impl Evaluation for ObjectEvaluation {
    type Info = ObjectInformation;

    fn name(&self) -> &'static str {
        "Object Evaluation"
    }

    fn empty_information(&self) -> ObjectInformation {
        ObjectInformation::new()
    }

    fn evaluate(&self, data: &FileData, report: &mut Report) -> Result<ObjectInformation> {
        let matrix = self.run_matrix(data, report);
        let mut info = ObjectInformation::new();
        for rule in self.scope.descriptors() {
            let mut counts = PrecisionRecall::default();
            matrix.add_pr_info(rule.category, &rule.name, &mut counts);
            info.set(format!("{} {}", rule.category, rule.name), counts);
        }
        Ok(info)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attribute::ValueType;
    use crate::descriptor::{Category, Descriptor, FileInformation};
    use crate::distances::{AttrMeasure, MetricDefaults, FRAMESPAN};
    use crate::report::ReportKind;
    use crate::scope::Equivalencies;
    use crate::span::FrameSpan;
    use approx::assert_relative_eq;
    use std::collections::BTreeMap;

    fn scope() -> Arc<ScopeRules> {
        let defaults = MetricDefaults::new();
        let mut measures = BTreeMap::new();
        measures.insert(
            FRAMESPAN.to_string(),
            AttrMeasure::parse(ValueType::FrameSpan, "[dice .5]", &defaults).unwrap(),
        );
        let mut scope = ScopeRules::new(Equivalencies::new());
        scope.add_descriptor(Category::Object, "PERSON", measures);
        Arc::new(scope)
    }

    fn person(id: u32, begin: u32, end: u32) -> Descriptor {
        Descriptor::new(Category::Object, "PERSON", id, FrameSpan::new(begin, end))
    }

    // ===== PrecisionRecall =====

    #[test]
    fn test_precision_recall_rendering() {
        let counts = PrecisionRecall {
            targets_hit: 1,
            targets_missed: 1,
            candidates_hit: 3,
            candidates_missed: 1,
        };
        assert_relative_eq!(counts.precision().unwrap(), 0.75);
        assert_relative_eq!(counts.recall().unwrap(), 0.5);
        assert_eq!(counts.to_string(), "2 4 0.75 0.5");
        assert_eq!(PrecisionRecall::default().to_string(), "0 0 - -");
    }

    #[test]
    fn test_verbose_uses_integer_percentages() {
        let mut info = ObjectInformation::new();
        info.set(
            "OBJECT PERSON",
            PrecisionRecall {
                targets_hit: 2,
                targets_missed: 1,
                candidates_hit: 2,
                candidates_missed: 0,
            },
        );
        let text = info.to_verbose();
        assert!(text.contains("For OBJECT PERSON: Precision is 100 %  (2/2)"));
        assert!(text.contains("For OBJECT PERSON: Recall is 66 %  (2/3)"));
        assert!(text.contains("For TOTAL: Recall is 66 %"));
    }

    // ===== Evaluation =====

    #[test]
    fn test_level_out_of_range_rejected() {
        assert!(ObjectEvaluation::new(scope(), Level::Complete, FilterKind::None).is_err());
        assert!(ObjectEvaluation::new(scope(), Level::Started, FilterKind::None).is_err());
    }

    #[test]
    fn test_evaluate_counts_hits_and_reports() {
        let eval = ObjectEvaluation::new(scope(), Level::Detected, FilterKind::SingleGreedy).unwrap();
        let data = FileData::new(
            FileInformation::new("clip"),
            vec![person(1, 0, 10), person(2, 100, 110)],
            vec![person(3, 0, 10), person(4, 0, 9), person(5, 300, 310)],
        );
        let mut report = Report::new();
        let info = eval.evaluate(&data, &mut report).unwrap();

        let counts = info.get("OBJECT PERSON").unwrap();
        assert_eq!(counts.targets_hit, 1);
        assert_eq!(counts.targets_missed, 1);
        assert_eq!(counts.candidates_hit, 1);
        assert_eq!(counts.candidates_missed, 2);

        // candidate 4 loses to 3 in the filter
        let falses: Vec<_> = report.of_kind(ReportKind::False).collect();
        assert!(falses.iter().any(|e| e.filtered && e.line.contains("PERSON 4")));
        assert_eq!(report.of_kind(ReportKind::Detect).count(), 1);
    }

    #[test]
    fn test_information_add_merges_types() {
        let mut a = ObjectInformation::new();
        a.set("OBJECT PERSON", PrecisionRecall { targets_hit: 1, ..Default::default() });
        let mut b = ObjectInformation::new();
        b.set("OBJECT PERSON", PrecisionRecall { targets_missed: 2, ..Default::default() });
        b.set("OBJECT CAR", PrecisionRecall { candidates_hit: 1, ..Default::default() });
        a.add(&b);
        assert_eq!(a.get("OBJECT PERSON").unwrap().target_count(), 3);
        assert_eq!(a.total().candidates_hit, 1);
        assert!(a.to_string().ends_with("TOTAL 3 1 1 0.3333333333333333\n"));
    }
}
