//! Enum-based filter dispatch.
//!
//! `FilterKind` names a filter and doubles as the mark left on comparisons
//! that survived it; dispatch goes through a `match` rather than a vtable.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::greedy::GreedyFilter;
use super::multiple::MultipleFilter;
use super::no_filter::EmptyFilter;
use super::optimum::OptimumFilter;
use super::traits::CompFilter;
use crate::matrix::{CompMatrix, Submatrix};
use crate::surreal::Surreal;
use crate::{Error, Result};

/// The match filters, in increasing order of permissiveness.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum FilterKind {
    #[default]
    None = 0,
    SingleGreedy = 1,
    SingleOptimum = 2,
    Multiple = 3,
}

impl FilterKind {
    pub fn name(&self) -> &'static str {
        match self {
            FilterKind::None => "NONE",
            FilterKind::SingleGreedy => "SINGLE_GREEDY",
            FilterKind::SingleOptimum => "SINGLE_OPTIMUM",
            FilterKind::Multiple => "MULTIPLE",
        }
    }

    /// Run the filter on one connected component.
    #[inline]
    pub fn apply(&self, matrix: &mut CompMatrix, sub: &Submatrix) -> Surreal {
        match self {
            FilterKind::None => EmptyFilter.filter(matrix, sub),
            FilterKind::SingleGreedy => GreedyFilter.filter(matrix, sub),
            FilterKind::SingleOptimum => OptimumFilter.filter(matrix, sub),
            FilterKind::Multiple => MultipleFilter::default().filter(matrix, sub),
        }
    }
}

impl FromStr for FilterKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_uppercase().as_str() {
            "SINGLE" | "SINGLE-GREEDY" | "SINGLE_GREEDY" => Ok(FilterKind::SingleGreedy),
            "SINGLE-OPTIMUM" | "SINGLE_OPTIMUM" | "SINGLE-OPTIMAL" | "SINGLE-BEST" => {
                Ok(FilterKind::SingleOptimum)
            }
            "MULTI-BEST" | "MULTIPLE" => Ok(FilterKind::Multiple),
            "NONE" | "ALL" | "DEFAULT" => Ok(FilterKind::None),
            _ => Err(Error::UnknownFilter(s.to_string())),
        }
    }
}

impl TryFrom<String> for FilterKind {
    type Error = Error;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

impl From<FilterKind> for String {
    fn from(kind: FilterKind) -> String {
        kind.name().to_string()
    }
}

impl fmt::Display for FilterKind {
    /// Left-justified to the width of the longest name.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:<14}", self.name())
    }
}
