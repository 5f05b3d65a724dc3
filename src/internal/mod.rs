//! Internal building blocks.
//!
//! - assignment: integer Hungarian solver used by the optimal match filter
//! - sparse: index-addressed sparse table backing the comparison matrix

pub mod assignment;
pub mod sparse;
