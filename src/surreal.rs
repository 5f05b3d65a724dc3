//! Lexicographic accumulator of unmatched counts and finite distances.
//!
//! A `Surreal` is `infinities * inf + reality`. Adding an infinite distance
//! bumps the infinity count; anything finite accumulates into the real part.
//! Ordering compares infinities first, so one unmatched item outweighs any
//! finite sum.

use std::cmp::Ordering;
use std::fmt;
use std::ops::{Add, AddAssign};

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Surreal {
    pub infinities: i64,
    pub reality: f64,
}

impl Surreal {
    pub fn new(infinities: i64, reality: f64) -> Self {
        Self {
            infinities,
            reality,
        }
    }

    pub fn zero() -> Self {
        Self::default()
    }

    /// Add a distance; +inf and -inf count as one infinity unit each.
    pub fn add_distance(&mut self, d: f64) {
        if d == f64::INFINITY {
            self.infinities += 1;
        } else if d == f64::NEG_INFINITY {
            self.infinities -= 1;
        } else {
            self.reality += d;
        }
    }

    /// Add `units` infinity units plus a distance.
    pub fn add_units(&mut self, units: i64, d: f64) {
        self.infinities += units;
        self.add_distance(d);
    }

    pub fn subtract_distance(&mut self, d: f64) {
        if d == f64::INFINITY {
            self.infinities -= 1;
        } else if d == f64::NEG_INFINITY {
            self.infinities += 1;
        } else {
            self.reality -= d;
        }
    }

    pub fn subtract_units(&mut self, units: i64, d: f64) {
        self.infinities -= units;
        self.subtract_distance(d);
    }

    pub fn compare(&self, other: &Surreal) -> Ordering {
        self.infinities
            .cmp(&other.infinities)
            .then_with(|| self.reality.partial_cmp(&other.reality).unwrap_or(Ordering::Equal))
    }
}

impl PartialOrd for Surreal {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.compare(other))
    }
}

impl Add for Surreal {
    type Output = Surreal;

    fn add(self, other: Surreal) -> Surreal {
        Surreal::new(self.infinities + other.infinities, self.reality + other.reality)
    }
}

impl AddAssign for Surreal {
    fn add_assign(&mut self, other: Surreal) {
        self.infinities += other.infinities;
        self.reality += other.reality;
    }
}

impl fmt::Display for Surreal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}oo, {} )", self.infinities, self.reality)
    }
}
