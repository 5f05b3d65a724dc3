//! # ViPER-PE - Video Annotation Evaluation Engine
//!
//! Scores how well a set of candidate spatio-temporal annotations (system
//! output) matches a set of target annotations (ground truth).
//!
//! ## Features
//!
//! - Comparison state machine promoting target/candidate pairs through
//!   matched, detected, localized and statisticed levels
//! - Sparse comparison matrix with connected-component partitioning
//! - Greedy, optimal (Hungarian) and many-to-one (composition) match filters
//! - Object, framewise and tracking evaluations with summable results
//! - JSON evaluation configuration
//!
//! ## Example
//!
//! ```rust,ignore
//! use viper_pe_rs::{evaluate_all, EvaluationConfig, Information, Report};
//!
//! let config = EvaluationConfig::from_json_file("eval.json")?;
//! let evaluation = config.object_evaluation()?;
//!
//! let mut report = Report::new();
//! let info = evaluate_all(&evaluation, &files, &mut report)?;
//! println!("{}", info.to_verbose());
//! ```

// Internal modules (assignment solver, sparse storage)
pub(crate) mod internal;

// Public modules
pub mod span;
pub mod attribute;
pub mod descriptor;
pub mod distances;
pub mod scope;
pub mod surreal;
pub mod comparison;
pub mod matrix;
pub mod filter;
pub mod evaluation;
pub mod report;
pub mod config;
pub mod utils;

// Re-exports for convenience
pub use span::FrameSpan;
pub use attribute::{Attribute, AttributeValue, BBox, Region, ValueType};
pub use descriptor::{Category, DescKey, Descriptor, DescriptorArena, FileInformation};
pub use distances::{metric_by_name, AttrMeasure, Difference, DistanceShape, Metric, Statistic};
pub use scope::{Equivalencies, MetricDefaults, OutputFilter, ScopeRules};
pub use surreal::Surreal;
pub use comparison::{Comparison, Level};
pub use matrix::{CompMatrix, Submatrix};
pub use filter::FilterKind;
pub use evaluation::{
    evaluate_all, Evaluation, FileData, FramewiseEvaluation, Information, ObjectEvaluation,
    TrackingEvaluation,
};
pub use report::{Report, ReportEntry, ReportKind};
pub use config::{AttributeConfig, DescriptorConfig, EvaluationConfig};

// Error types
pub use crate::error::{Error, Result};

mod error {
    use thiserror::Error;

    /// Errors that can occur while configuring or running an evaluation
    #[derive(Error, Debug)]
    pub enum Error {
        #[error("Invalid configuration: {0}")]
        InvalidConfig(String),

        #[error("Unknown distance function: {0}")]
        UnknownDistance(String),

        #[error("Improper metric: {0}")]
        ImproperMetric(String),

        #[error("Unknown statistic: {0}")]
        UnknownStatistic(String),

        #[error("Unknown match filter: {0}")]
        UnknownFilter(String),

        #[error("Cannot compose: {0}")]
        Uncomposable(String),

        #[error("Bad data: {0}")]
        BadData(String),

        #[error("JSON error: {0}")]
        Json(#[from] serde_json::Error),

        #[error("IO error: {0}")]
        IoError(#[from] std::io::Error),
    }

    /// Result type for evaluation operations
    pub type Result<T> = std::result::Result<T, Error>;
}
