//! Evaluation scope: which descriptors and attributes take part, how their
//! names translate between target and candidate schemas, and which of them
//! appear in the output.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::attribute::AttributeValue;
use crate::descriptor::{Category, Descriptor};
use crate::distances::{AttrMeasure, FRAMESPAN};

pub use crate::distances::MetricDefaults;

/// Name translations from candidate schema names to target schema names.
///
/// Used for both descriptor names and attribute names.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Equivalencies {
    map: BTreeMap<String, BTreeSet<String>>,
}

impl Equivalencies {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `candidate_name` means `target_name`.
    pub fn add(&mut self, candidate_name: impl Into<String>, target_name: impl Into<String>) {
        self.map
            .entry(candidate_name.into())
            .or_default()
            .insert(target_name.into());
    }

    /// True if `from` was declared equivalent to `to`.
    pub fn is_equivalent(&self, from: &str, to: &str) -> bool {
        self.map.get(from).map_or(false, |targets| targets.contains(to))
    }

    /// Equal names, or names equivalent in either direction.
    pub fn names_match(&self, a: &str, b: &str) -> bool {
        a == b || self.is_equivalent(a, b) || self.is_equivalent(b, a)
    }
}

/// One condition on a descriptor for it to be reported.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "rule", rename_all = "snake_case")]
pub enum FilterRule {
    AttributeEquals { attribute: String, value: AttributeValue },
    AttributeNotEquals { attribute: String, value: AttributeValue },
    MinFrames { frames: u64 },
}

impl FilterRule {
    pub fn meets(&self, descriptor: &Descriptor, equivalencies: &Equivalencies) -> bool {
        let first_value = |name: &str| {
            descriptor
                .attribute(name, equivalencies)
                .and_then(|a| match descriptor.span.begin() {
                    Some(frame) if a.is_dynamic() => a.value_at(frame),
                    _ => a.first_value(),
                })
        };
        match self {
            FilterRule::AttributeEquals { attribute, value } => first_value(attribute) == Some(value),
            FilterRule::AttributeNotEquals { attribute, value } => first_value(attribute) != Some(value),
            FilterRule::MinFrames { frames } => descriptor.span.num_frames() >= *frames,
        }
    }
}

/// A conjunction of [`FilterRule`]s.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OutputFilter {
    rules: Vec<FilterRule>,
}

impl OutputFilter {
    pub fn new(rules: Vec<FilterRule>) -> Self {
        Self { rules }
    }

    pub fn meets(&self, descriptor: &Descriptor, equivalencies: &Equivalencies) -> bool {
        self.rules.iter().all(|r| r.meets(descriptor, equivalencies))
    }
}

/// Measures configured for one descriptor type.
#[derive(Debug, Clone, PartialEq)]
pub struct DescriptorScope<M> {
    pub category: Category,
    pub name: String,
    /// Per attribute measures, including the synthetic frame span attribute.
    pub measures: BTreeMap<String, M>,
}

/// The descriptor types and measures taking part in an evaluation.
///
/// `M` is the per-attribute measure type: [`AttrMeasure`] for object
/// evaluation, richer types for tracking and framewise evaluation.
#[derive(Debug, Clone, PartialEq)]
pub struct ScopeRules<M = AttrMeasure> {
    equivalencies: Equivalencies,
    descriptors: Vec<DescriptorScope<M>>,
    target_filter: Option<OutputFilter>,
    candidate_filter: Option<OutputFilter>,
}

impl<M> ScopeRules<M> {
    pub fn new(equivalencies: Equivalencies) -> Self {
        Self {
            equivalencies,
            descriptors: Vec::new(),
            target_filter: None,
            candidate_filter: None,
        }
    }

    /// Add a descriptor type with its attribute measures.
    pub fn add_descriptor(
        &mut self,
        category: Category,
        name: impl Into<String>,
        measures: BTreeMap<String, M>,
    ) {
        self.descriptors.push(DescriptorScope {
            category,
            name: name.into(),
            measures,
        });
    }

    pub fn set_target_filter(&mut self, filter: OutputFilter) {
        self.target_filter = Some(filter);
    }

    pub fn set_candidate_filter(&mut self, filter: OutputFilter) {
        self.candidate_filter = Some(filter);
    }

    pub fn equivalencies(&self) -> &Equivalencies {
        &self.equivalencies
    }

    pub fn descriptors(&self) -> &[DescriptorScope<M>] {
        &self.descriptors
    }

    /// Whether a target and a candidate may be compared at all.
    pub fn comparable(&self, target: &Descriptor, candidate: &Descriptor) -> bool {
        target.same_category_as(candidate, &self.equivalencies)
    }

    /// The configured descriptor type matching `descriptor`.
    pub fn rules_for(&self, descriptor: &Descriptor) -> Option<&DescriptorScope<M>> {
        self.descriptors.iter().find(|d| {
            d.category == descriptor.category
                && self.equivalencies.names_match(&d.name, &descriptor.name)
        })
    }

    pub fn in_scope(&self, descriptor: &Descriptor) -> bool {
        self.rules_for(descriptor).is_some()
    }

    pub fn is_outputable_target(&self, descriptor: &Descriptor) -> bool {
        self.in_scope(descriptor)
            && self
                .target_filter
                .as_ref()
                .map_or(true, |f| f.meets(descriptor, &self.equivalencies))
    }

    pub fn is_outputable_candidate(&self, descriptor: &Descriptor) -> bool {
        self.in_scope(descriptor)
            && self
                .candidate_filter
                .as_ref()
                .map_or(true, |f| f.meets(descriptor, &self.equivalencies))
    }

    pub fn measure(&self, descriptor: &Descriptor, attribute: &str) -> Option<&M> {
        self.rules_for(descriptor)?.measures.get(attribute)
    }

    pub fn measures_for(&self, descriptor: &Descriptor) -> Option<&BTreeMap<String, M>> {
        self.rules_for(descriptor).map(|d| &d.measures)
    }

    /// In-scope attribute names of a descriptor, without the frame span.
    pub fn in_scope_attributes(&self, descriptor: &Descriptor) -> Vec<&str> {
        self.measures_for(descriptor)
            .map(|m| {
                m.keys()
                    .map(String::as_str)
                    .filter(|name| *name != FRAMESPAN)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Derive scope rules with a different measure type, dropping the
    /// attributes for which `f` returns `None`.
    pub fn map_measures<N, F>(&self, mut f: F) -> ScopeRules<N>
    where
        F: FnMut(&str, &M) -> Option<N>,
    {
        ScopeRules {
            equivalencies: self.equivalencies.clone(),
            descriptors: self
                .descriptors
                .iter()
                .map(|d| DescriptorScope {
                    category: d.category,
                    name: d.name.clone(),
                    measures: d
                        .measures
                        .iter()
                        .filter_map(|(name, m)| f(name, m).map(|n| (name.clone(), n)))
                        .collect(),
                })
                .collect(),
            target_filter: self.target_filter.clone(),
            candidate_filter: self.candidate_filter.clone(),
        }
    }
}

impl ScopeRules<AttrMeasure> {
    /// The frame span measure for a descriptor.
    pub fn span_measure(&self, descriptor: &Descriptor) -> Option<&AttrMeasure> {
        self.measure(descriptor, FRAMESPAN)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attribute::{Attribute, ValueType};
    use crate::span::FrameSpan;

    fn person(name: &str, id: u32) -> Descriptor {
        Descriptor::new(Category::Object, name, id, FrameSpan::new(0, 10))
    }

    fn rules() -> ScopeRules {
        let defaults = MetricDefaults::new();
        let mut eq = Equivalencies::new();
        eq.add("HUMAN", "PERSON");
        eq.add("location", "box");
        let mut scope = ScopeRules::new(eq);
        let mut measures = BTreeMap::new();
        measures.insert(
            FRAMESPAN.to_string(),
            AttrMeasure::parse(ValueType::FrameSpan, "[dice .5]", &defaults).unwrap(),
        );
        measures.insert(
            "box".to_string(),
            AttrMeasure::parse(ValueType::Region, "[dice .5]", &defaults).unwrap(),
        );
        scope.add_descriptor(Category::Object, "PERSON", measures);
        scope
    }

    // ===== Equivalencies =====

    #[test]
    fn test_equivalencies_are_directional_but_matched_both_ways() {
        let mut eq = Equivalencies::new();
        eq.add("HUMAN", "PERSON");
        assert!(eq.is_equivalent("HUMAN", "PERSON"));
        assert!(!eq.is_equivalent("PERSON", "HUMAN"));
        assert!(eq.names_match("PERSON", "HUMAN"));
        assert!(!eq.names_match("PERSON", "CAR"));
    }

    // ===== Scope =====

    #[test]
    fn test_in_scope_and_comparable() {
        let scope = rules();
        let target = person("PERSON", 1);
        let candidate = person("HUMAN", 2);
        let car = person("CAR", 3);
        assert!(scope.in_scope(&target));
        assert!(scope.in_scope(&candidate));
        assert!(!scope.in_scope(&car));
        assert!(scope.comparable(&target, &candidate));
        assert!(!scope.comparable(&target, &car));
    }

    #[test]
    fn test_measures_and_attributes() {
        let scope = rules();
        let target = person("PERSON", 1);
        assert_eq!(scope.span_measure(&target).unwrap().metric.name, "dice");
        assert_eq!(scope.in_scope_attributes(&target), vec!["box"]);
        assert!(scope.measure(&person("CAR", 2), "box").is_none());
    }

    #[test]
    fn test_output_filter() {
        let mut scope = rules();
        scope.set_candidate_filter(OutputFilter::new(vec![FilterRule::AttributeEquals {
            attribute: "box".into(),
            value: AttributeValue::Bool(true),
        }]));
        scope.set_target_filter(OutputFilter::new(vec![FilterRule::MinFrames { frames: 20 }]));

        let plain = person("PERSON", 1);
        assert!(!scope.is_outputable_target(&plain));
        assert!(!scope.is_outputable_candidate(&plain));

        let flagged = person("HUMAN", 2)
            .with_attribute("location", Attribute::Static(Some(AttributeValue::Bool(true))));
        assert!(scope.is_outputable_candidate(&flagged));
    }

    #[test]
    fn test_map_measures_drops_attributes() {
        let scope = rules();
        let only_span: ScopeRules<f64> =
            scope.map_measures(|name, m| (name == FRAMESPAN).then_some(m.tolerance));
        let target = person("PERSON", 1);
        assert_eq!(only_span.measure(&target, FRAMESPAN), Some(&0.5));
        assert!(only_span.in_scope_attributes(&target).is_empty());
    }

    #[test]
    fn test_filter_rules_deserialize() {
        let json = r#"[{"rule": "min_frames", "frames": 3},
                       {"rule": "attribute_not_equals", "attribute": "occluded",
                        "value": {"type": "bool", "value": true}}]"#;
        let filter: OutputFilter = serde_json::from_str(json).unwrap();
        let d = person("PERSON", 1);
        assert!(filter.meets(&d, &Equivalencies::new()));
    }
}
