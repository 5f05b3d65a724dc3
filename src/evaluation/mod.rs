//! Evaluations over one file's targets and candidates.
//!
//! This module provides:
//! - `ObjectEvaluation` - level-by-level object matching with precision/recall
//! - `FramewiseEvaluation` - per-frame aggregate statistics
//! - `TrackingEvaluation` - per-track attribute distances
//!
//! Each evaluation produces an [`Information`] value per file; values from
//! several files are summed with [`Information::add`].

mod framewise;
mod object;
mod tracking;

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::descriptor::{Descriptor, FileInformation};
use crate::report::Report;
use crate::Result;

pub use framewise::{FrameColumn, FrameMeasure, FramewiseEvaluation, FramewiseInformation, PartialSum};
pub use object::{ObjectEvaluation, ObjectInformation, PrecisionRecall};
pub use tracking::{TrackMeasure, TrackingEvaluation, TrackingInformation};

/// Aggregated result of an evaluation.
///
/// `add` is associative and commutative, so per-file results can be summed
/// in any order.
pub trait Information: fmt::Display + Clone {
    /// Fold `other` into `self`.
    fn add(&mut self, other: &Self);

    /// Whether anything was measured.
    fn has_information(&self) -> bool;

    /// Space separated names of the fields in the raw rendering.
    fn layout(&self) -> String;

    /// Multi-line human readable rendering.
    fn to_verbose(&self) -> String;
}

/// An evaluation strategy.
pub trait Evaluation {
    type Info: Information;

    fn name(&self) -> &'static str;

    /// An information value with nothing in it, the identity of `add`.
    fn empty_information(&self) -> Self::Info;

    /// Evaluate one file, appending any descriptor listings to `report`.
    fn evaluate(&self, data: &FileData, report: &mut Report) -> Result<Self::Info>;
}

/// The targets and candidates of one media file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FileData {
    pub file: FileInformation,
    #[serde(default)]
    pub targets: Vec<Descriptor>,
    #[serde(default)]
    pub candidates: Vec<Descriptor>,
}

impl FileData {
    pub fn new(file: FileInformation, targets: Vec<Descriptor>, candidates: Vec<Descriptor>) -> Self {
        Self {
            file,
            targets,
            candidates,
        }
    }

    /// The last frame touched by any target or candidate.
    pub fn highest_frame(&self) -> Option<u32> {
        self.targets
            .iter()
            .chain(&self.candidates)
            .filter_map(Descriptor::highest_frame)
            .max()
    }
}

/// Evaluate every file and sum the results in file order.
pub fn evaluate_all<E: Evaluation>(evaluation: &E, files: &[FileData], report: &mut Report) -> Result<E::Info> {
    let mut total = evaluation.empty_information();
    for data in files {
        let info = evaluation.evaluate(data, report)?;
        log::debug!("{} for {}: {}", evaluation.name(), data.file.name, info);
        total.add(&info);
    }
    Ok(total)
}
