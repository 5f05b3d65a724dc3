//! JSON evaluation configuration.
//!
//! One [`EvaluationConfig`] describes the descriptor types, attributes and
//! measures of a run. The same configuration builds the scope of all three
//! evaluations.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::attribute::ValueType;
use crate::comparison::Level;
use crate::descriptor::Category;
use crate::distances::{metric_by_name, AttrMeasure, Metric, MetricDefaults, FRAMESPAN};
use crate::evaluation::{FrameMeasure, FramewiseEvaluation, ObjectEvaluation, TrackMeasure, TrackingEvaluation};
use crate::filter::FilterKind;
use crate::scope::{Equivalencies, OutputFilter, ScopeRules};
use crate::{Error, Result};

/// One attribute of a descriptor type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributeConfig {
    pub name: String,
    #[serde(rename = "type")]
    pub value_type: ValueType,
    /// Measure text such as `"[dice .5]"`. Absent means the type's default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub measure: Option<String>,
    /// Tracks are paired by agreement on key attributes.
    #[serde(default)]
    pub key: bool,
    /// Metric names reported by tracking and framewise evaluation.
    #[serde(default)]
    pub metrics: Vec<String>,
    /// Measure texts counted as framewise localization columns.
    #[serde(default)]
    pub localizers: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dont_care: Option<String>,
}

impl AttributeConfig {
    pub fn new(name: impl Into<String>, value_type: ValueType) -> Self {
        Self {
            name: name.into(),
            value_type,
            measure: None,
            key: false,
            metrics: Vec::new(),
            localizers: Vec::new(),
            dont_care: None,
        }
    }

    fn object_measure(&self, defaults: &MetricDefaults) -> Result<AttrMeasure> {
        match &self.measure {
            Some(text) => AttrMeasure::parse(self.value_type, text, defaults),
            None => AttrMeasure::default_for(self.value_type, defaults),
        }
    }
}

/// One descriptor type and its attributes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DescriptorConfig {
    pub category: Category,
    pub name: String,
    /// Measure text for the frame span.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub framespan: Option<String>,
    #[serde(default)]
    pub framespan_metrics: Vec<String>,
    #[serde(default)]
    pub attributes: Vec<AttributeConfig>,
}

impl DescriptorConfig {
    pub fn new(category: Category, name: impl Into<String>) -> Self {
        Self {
            category,
            name: name.into(),
            framespan: None,
            framespan_metrics: Vec::new(),
            attributes: Vec::new(),
        }
    }

    pub fn with_attribute(mut self, attribute: AttributeConfig) -> Self {
        self.attributes.push(attribute);
        self
    }

    fn span_measure(&self, defaults: &MetricDefaults) -> Result<AttrMeasure> {
        match &self.framespan {
            Some(text) => AttrMeasure::parse(ValueType::FrameSpan, text, defaults),
            None => AttrMeasure::default_for(ValueType::FrameSpan, defaults),
        }
    }
}

fn default_level() -> i8 {
    Level::Detected.value()
}

fn parse_metrics(value_type: ValueType, names: &[String]) -> Result<Vec<Metric>> {
    names.iter().map(|name| metric_by_name(value_type, name)).collect()
}

/// Configuration of an evaluation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationConfig {
    /// Object evaluation level, 0 (matched) to 3 (statisticed).
    #[serde(default = "default_level")]
    pub level: i8,
    #[serde(default)]
    pub target_match: FilterKind,
    #[serde(default)]
    pub defaults: MetricDefaults,
    /// `[candidate_name, target_name]` pairs.
    #[serde(default)]
    pub equivalencies: Vec<(String, String)>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_filter: Option<OutputFilter>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub candidate_filter: Option<OutputFilter>,
    #[serde(default)]
    pub descriptors: Vec<DescriptorConfig>,
}

impl Default for EvaluationConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            target_match: FilterKind::None,
            defaults: MetricDefaults::default(),
            equivalencies: Vec::new(),
            target_filter: None,
            candidate_filter: None,
            descriptors: Vec::new(),
        }
    }
}

impl EvaluationConfig {
    /// Parse and validate a configuration.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: EvaluationConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Check ranges and names, and that every measure and metric parses.
    pub fn validate(&self) -> Result<()> {
        if !(0..=3).contains(&self.level) {
            return Err(Error::InvalidConfig(format!(
                "level must be between 0 and 3, got {}",
                self.level
            )));
        }

        if self.defaults.stat_tolerance < 0.0 {
            return Err(Error::InvalidConfig(
                "default statistic tolerance must be non-negative".to_string(),
            ));
        }

        let mut seen = BTreeSet::new();
        for descriptor in &self.descriptors {
            if descriptor.name.is_empty() {
                return Err(Error::InvalidConfig("descriptor name must not be empty".to_string()));
            }
            if !seen.insert((descriptor.category, descriptor.name.as_str())) {
                return Err(Error::InvalidConfig(format!(
                    "descriptor {} {} is configured twice",
                    descriptor.category, descriptor.name
                )));
            }
            let mut names = BTreeSet::new();
            for attribute in &descriptor.attributes {
                if attribute.name.is_empty() || attribute.name == FRAMESPAN {
                    return Err(Error::InvalidConfig(format!(
                        "bad attribute name '{}' on {}",
                        attribute.name, descriptor.name
                    )));
                }
                if !names.insert(attribute.name.as_str()) {
                    return Err(Error::InvalidConfig(format!(
                        "attribute {} is configured twice on {}",
                        attribute.name, descriptor.name
                    )));
                }
            }
        }

        self.object_scope()?;
        self.tracking_scope()?;
        self.framewise_scope()?;
        Ok(())
    }

    pub fn level(&self) -> Result<Level> {
        Level::from_value(self.level)
            .ok_or_else(|| Error::InvalidConfig(format!("unknown level {}", self.level)))
    }

    pub fn equivalencies(&self) -> Equivalencies {
        let mut eq = Equivalencies::new();
        for (candidate, target) in &self.equivalencies {
            eq.add(candidate.clone(), target.clone());
        }
        eq
    }

    fn build_scope<M, F>(&self, mut measures: F) -> Result<ScopeRules<M>>
    where
        F: FnMut(&DescriptorConfig) -> Result<BTreeMap<String, M>>,
    {
        let mut scope = ScopeRules::new(self.equivalencies());
        for descriptor in &self.descriptors {
            scope.add_descriptor(descriptor.category, descriptor.name.clone(), measures(descriptor)?);
        }
        if let Some(filter) = &self.target_filter {
            scope.set_target_filter(filter.clone());
        }
        if let Some(filter) = &self.candidate_filter {
            scope.set_candidate_filter(filter.clone());
        }
        Ok(scope)
    }

    /// Every configured attribute with its measure, plus the frame span.
    pub fn object_scope(&self) -> Result<ScopeRules> {
        self.build_scope(|descriptor| {
            let mut measures = BTreeMap::new();
            measures.insert(FRAMESPAN.to_string(), descriptor.span_measure(&self.defaults)?);
            for attribute in &descriptor.attributes {
                measures.insert(attribute.name.clone(), attribute.object_measure(&self.defaults)?);
            }
            Ok(measures)
        })
    }

    /// Key flags and reported metrics. The object measures are kept for
    /// the fallback matching of unkeyed tracks.
    pub fn tracking_scope(&self) -> Result<ScopeRules<TrackMeasure>> {
        self.build_scope(|descriptor| {
            let mut measures = BTreeMap::new();
            measures.insert(
                FRAMESPAN.to_string(),
                TrackMeasure {
                    key: false,
                    metrics: parse_metrics(ValueType::FrameSpan, &descriptor.framespan_metrics)?,
                    measure: Some(descriptor.span_measure(&self.defaults)?),
                },
            );
            for attribute in &descriptor.attributes {
                let measure = match &attribute.measure {
                    Some(text) => Some(AttrMeasure::parse(attribute.value_type, text, &self.defaults)?),
                    None => None,
                };
                measures.insert(
                    attribute.name.clone(),
                    TrackMeasure {
                        key: attribute.key,
                        metrics: parse_metrics(attribute.value_type, &attribute.metrics)?,
                        measure,
                    },
                );
            }
            Ok(measures)
        })
    }

    pub fn framewise_scope(&self) -> Result<ScopeRules<FrameMeasure>> {
        self.build_scope(|descriptor| {
            let mut measures = BTreeMap::new();
            for attribute in &descriptor.attributes {
                let parse = |text: &String| AttrMeasure::parse(attribute.value_type, text, &self.defaults);
                measures.insert(
                    attribute.name.clone(),
                    FrameMeasure {
                        metrics: parse_metrics(attribute.value_type, &attribute.metrics)?,
                        localizers: attribute.localizers.iter().map(parse).collect::<Result<_>>()?,
                        dont_care: attribute.dont_care.as_ref().map(parse).transpose()?,
                    },
                );
            }
            Ok(measures)
        })
    }

    pub fn object_evaluation(&self) -> Result<ObjectEvaluation> {
        ObjectEvaluation::new(Arc::new(self.object_scope()?), self.level()?, self.target_match)
    }

    pub fn tracking_evaluation(&self) -> Result<TrackingEvaluation> {
        Ok(TrackingEvaluation::new(Arc::new(self.tracking_scope()?)))
    }

    pub fn framewise_evaluation(&self) -> Result<FramewiseEvaluation> {
        Ok(FramewiseEvaluation::new(Arc::new(self.framewise_scope()?)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scope::FilterRule;

    const CONFIG: &str = r#"{
        "level": 2,
        "target_match": "multi-best",
        "equivalencies": [["Face", "FACE"]],
        "descriptors": [
            {
                "category": "OBJECT",
                "name": "FACE",
                "framespan": "[dice .5]",
                "framespan_metrics": ["dice"],
                "attributes": [
                    {"name": "area", "type": "bbox", "measure": "[dice .7]", "metrics": ["matchedpixels"],
                     "localizers": ["[dice .5]"], "dont_care": "[overlap .9]"},
                    {"name": "person", "type": "lvalue", "key": true}
                ]
            }
        ],
        "target_filter": [{"rule": "min_frames", "frames": 3}]
    }"#;

    // ===== Parsing =====

    #[test]
    fn test_parse_full_config() {
        let config = EvaluationConfig::from_json_str(CONFIG).unwrap();
        assert_eq!(config.level().unwrap(), Level::Localized);
        assert_eq!(config.target_match, FilterKind::Multiple);
        assert_eq!(config.descriptors[0].attributes[0].value_type, ValueType::Region);
        assert_eq!(
            config.target_filter,
            Some(OutputFilter::new(vec![FilterRule::MinFrames { frames: 3 }]))
        );
        assert!(config.equivalencies().names_match("Face", "FACE"));
    }

    #[test]
    fn test_defaults_fill_missing_fields() {
        let config = EvaluationConfig::from_json_str("{}").unwrap();
        assert_eq!(config, EvaluationConfig::default());
        assert_eq!(config.level().unwrap(), Level::Detected);
    }

    #[test]
    fn test_json_round_trip() {
        let config = EvaluationConfig::from_json_str(CONFIG).unwrap();
        let again = EvaluationConfig::from_json_str(&config.to_json_string().unwrap()).unwrap();
        assert_eq!(config, again);
    }

    // ===== Validation =====

    #[test]
    fn test_level_out_of_range() {
        let config = EvaluationConfig {
            level: 4,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn test_duplicate_descriptor_rejected() {
        let config = EvaluationConfig {
            descriptors: vec![
                DescriptorConfig::new(Category::Object, "FACE"),
                DescriptorConfig::new(Category::Object, "FACE"),
            ],
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_unknown_metric_rejected() {
        let mut attribute = AttributeConfig::new("label", ValueType::Text);
        attribute.metrics.push("dice".to_string());
        let config = EvaluationConfig {
            descriptors: vec![DescriptorConfig::new(Category::Object, "TEXT").with_attribute(attribute)],
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(Error::UnknownDistance(_))));
    }

    #[test]
    fn test_unknown_filter_is_a_json_error() {
        let result = EvaluationConfig::from_json_str(r#"{"target_match": "sometimes"}"#);
        assert!(matches!(result, Err(Error::Json(_))));
    }

    // ===== Scopes =====

    #[test]
    fn test_scopes_share_descriptors() {
        let config = EvaluationConfig::from_json_str(CONFIG).unwrap();

        let object = config.object_scope().unwrap();
        let rule = &object.descriptors()[0];
        assert_eq!(rule.measures.len(), 3);
        assert_eq!(rule.measures["area"].tolerance, 0.7);

        let tracking = config.tracking_scope().unwrap();
        let rule = &tracking.descriptors()[0];
        assert!(rule.measures["person"].key);
        assert!(rule.measures["person"].measure.is_none());
        assert_eq!(rule.measures[FRAMESPAN].metrics[0].name, "dice");

        let framewise = config.framewise_scope().unwrap();
        let rule = &framewise.descriptors()[0];
        assert!(!rule.measures.contains_key(FRAMESPAN));
        assert_eq!(rule.measures["area"].localizers.len(), 1);
        assert!(rule.measures["area"].dont_care.is_some());
    }

    #[test]
    fn test_object_evaluation_from_config() {
        let config = EvaluationConfig::from_json_str(CONFIG).unwrap();
        let evaluation = config.object_evaluation().unwrap();
        assert_eq!(evaluation.level(), Level::Localized);
        assert_eq!(evaluation.target_match(), FilterKind::Multiple);
    }
}
