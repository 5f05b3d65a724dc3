//! Attribute values carried by descriptors.
//!
//! An attribute is either static (one value for the whole descriptor) or
//! dynamic (a run-length list of values over frame ranges). Only region
//! values know how to compose; every other type composes only when one side
//! has no value.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// The value types known to the distance catalogue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueType {
    /// The synthetic frame span attribute.
    FrameSpan,
    Bool,
    Int,
    Float,
    Text,
    Lvalue,
    Point,
    #[serde(alias = "bbox", alias = "polygon")]
    Region,
}

impl ValueType {
    /// Parse a value type name, accepting the usual annotation schema aliases.
    pub fn from_name(name: &str) -> Result<Self> {
        match name.to_ascii_lowercase().as_str() {
            "framespan" => Ok(ValueType::FrameSpan),
            "bool" | "bvalue" => Ok(ValueType::Bool),
            "int" | "dvalue" | "number" => Ok(ValueType::Int),
            "float" | "fvalue" => Ok(ValueType::Float),
            "text" | "svalue" => Ok(ValueType::Text),
            "lvalue" => Ok(ValueType::Lvalue),
            "point" => Ok(ValueType::Point),
            "region" | "bbox" | "obox" | "polygon" => Ok(ValueType::Region),
            _ => Err(Error::InvalidConfig(format!("unknown value type '{}'", name))),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ValueType::FrameSpan => "framespan",
            ValueType::Bool => "bool",
            ValueType::Int => "int",
            ValueType::Float => "float",
            ValueType::Text => "text",
            ValueType::Lvalue => "lvalue",
            ValueType::Point => "point",
            ValueType::Region => "region",
        }
    }
}

/// An axis-aligned integer box.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BBox {
    pub x: i64,
    pub y: i64,
    pub width: i64,
    pub height: i64,
}

impl BBox {
    pub fn new(x: i64, y: i64, width: i64, height: i64) -> Self {
        Self { x, y, width, height }
    }

    pub fn is_empty(&self) -> bool {
        self.width <= 0 || self.height <= 0
    }

    pub fn area(&self) -> u64 {
        if self.is_empty() {
            0
        } else {
            (self.width as u64) * (self.height as u64)
        }
    }

    pub fn intersection(&self, other: &BBox) -> Option<BBox> {
        let x1 = self.x.max(other.x);
        let y1 = self.y.max(other.y);
        let x2 = (self.x + self.width).min(other.x + other.width);
        let y2 = (self.y + self.height).min(other.y + other.height);
        let b = BBox::new(x1, y1, x2 - x1, y2 - y1);
        (!b.is_empty()).then_some(b)
    }
}

/// A pixel region: the union of a list of boxes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Region {
    boxes: Vec<BBox>,
}

impl Region {
    pub fn new(boxes: Vec<BBox>) -> Self {
        Self {
            boxes: boxes.into_iter().filter(|b| !b.is_empty()).collect(),
        }
    }

    pub fn from_bbox(bbox: BBox) -> Self {
        Self::new(vec![bbox])
    }

    pub fn boxes(&self) -> &[BBox] {
        &self.boxes
    }

    pub fn is_empty(&self) -> bool {
        self.boxes.is_empty()
    }

    /// Area of the union of all boxes, counting shared pixels once.
    pub fn area(&self) -> u64 {
        match self.boxes.len() {
            0 => 0,
            1 => self.boxes[0].area(),
            _ => union_area(&self.boxes),
        }
    }

    /// The region covered by both `self` and `other`.
    pub fn intersection(&self, other: &Region) -> Region {
        let boxes = self
            .boxes
            .iter()
            .flat_map(|a| other.boxes.iter().filter_map(move |b| a.intersection(b)))
            .collect();
        Region { boxes }
    }

    pub fn union(&self, other: &Region) -> Region {
        let mut boxes = self.boxes.clone();
        for b in &other.boxes {
            if !boxes.contains(b) {
                boxes.push(*b);
            }
        }
        Region { boxes }
    }

    /// Area of `self` outside of `mask`.
    pub fn area_outside(&self, mask: Option<&Region>) -> u64 {
        match mask {
            Some(mask) => self.area() - self.intersection(mask).area(),
            None => self.area(),
        }
    }
}

/// Union area of a set of boxes, by coordinate compression.
fn union_area(boxes: &[BBox]) -> u64 {
    let xs: Vec<i64> = boxes
        .iter()
        .flat_map(|b| [b.x, b.x + b.width])
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    let ys: Vec<i64> = boxes
        .iter()
        .flat_map(|b| [b.y, b.y + b.height])
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();

    let mut area = 0u64;
    for xw in xs.windows(2) {
        for yw in ys.windows(2) {
            let covered = boxes.iter().any(|b| {
                b.x <= xw[0] && xw[1] <= b.x + b.width && b.y <= yw[0] && yw[1] <= b.y + b.height
            });
            if covered {
                area += ((xw[1] - xw[0]) as u64) * ((yw[1] - yw[0]) as u64);
            }
        }
    }
    area
}

/// A single attribute value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum AttributeValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Lvalue(String),
    Point { x: i64, y: i64 },
    Region(Region),
}

impl AttributeValue {
    pub fn value_type(&self) -> ValueType {
        match self {
            AttributeValue::Bool(_) => ValueType::Bool,
            AttributeValue::Int(_) => ValueType::Int,
            AttributeValue::Float(_) => ValueType::Float,
            AttributeValue::Text(_) => ValueType::Text,
            AttributeValue::Lvalue(_) => ValueType::Lvalue,
            AttributeValue::Point { .. } => ValueType::Point,
            AttributeValue::Region(_) => ValueType::Region,
        }
    }

    pub fn as_region(&self) -> Option<&Region> {
        match self {
            AttributeValue::Region(r) => Some(r),
            _ => None,
        }
    }

    /// Numeric view of int and float values.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            AttributeValue::Int(v) => Some(*v as f64),
            AttributeValue::Float(v) => Some(*v),
            _ => None,
        }
    }

    /// Combine two values into one aggregate value.
    pub fn compose(&self, other: &AttributeValue) -> Result<AttributeValue> {
        match (self, other) {
            (AttributeValue::Region(a), AttributeValue::Region(b)) => {
                Ok(AttributeValue::Region(a.union(b)))
            }
            _ => Err(Error::Uncomposable(format!(
                "{} values cannot be combined",
                self.value_type().name()
            ))),
        }
    }
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttributeValue::Bool(v) => write!(f, "{}", v),
            AttributeValue::Int(v) => write!(f, "{}", v),
            AttributeValue::Float(v) => write!(f, "{}", v),
            AttributeValue::Text(v) => write!(f, "\"{}\"", v),
            AttributeValue::Lvalue(v) => write!(f, "{}", v),
            AttributeValue::Point { x, y } => write!(f, "({} {})", x, y),
            AttributeValue::Region(r) => {
                let parts: Vec<String> = r
                    .boxes()
                    .iter()
                    .map(|b| format!("{} {} {} {}", b.x, b.y, b.width, b.height))
                    .collect();
                write!(f, "({})", parts.join(", "))
            }
        }
    }
}

/// A value held over the frames `[begin, end)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValueRun {
    pub begin: u32,
    pub end: u32,
    pub value: AttributeValue,
}

/// A descriptor attribute.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Attribute {
    Static(Option<AttributeValue>),
    Dynamic(Vec<ValueRun>),
}

impl Attribute {
    pub fn is_dynamic(&self) -> bool {
        matches!(self, Attribute::Dynamic(_))
    }

    /// Build a dynamic attribute from runs, sorting them and merging equal
    /// neighbours.
    pub fn dynamic(mut runs: Vec<ValueRun>) -> Self {
        runs.retain(|r| r.begin < r.end);
        runs.sort_by_key(|r| r.begin);
        let mut merged: Vec<ValueRun> = Vec::with_capacity(runs.len());
        for run in runs {
            match merged.last_mut() {
                Some(last) if last.end == run.begin && last.value == run.value => last.end = run.end,
                _ => merged.push(run),
            }
        }
        Attribute::Dynamic(merged)
    }

    /// The value at `frame`. Static values hold on every frame.
    pub fn value_at(&self, frame: u32) -> Option<&AttributeValue> {
        match self {
            Attribute::Static(v) => v.as_ref(),
            Attribute::Dynamic(runs) => runs
                .iter()
                .find(|r| r.begin <= frame && frame < r.end)
                .map(|r| &r.value),
        }
    }

    /// The static value, or the first value of a dynamic attribute.
    pub fn first_value(&self) -> Option<&AttributeValue> {
        match self {
            Attribute::Static(v) => v.as_ref(),
            Attribute::Dynamic(runs) => runs.first().map(|r| &r.value),
        }
    }

    /// Frame boundaries where this attribute may change value.
    pub(crate) fn breakpoints(&self) -> Vec<u32> {
        match self {
            Attribute::Static(_) => Vec::new(),
            Attribute::Dynamic(runs) => runs.iter().flat_map(|r| [r.begin, r.end]).collect(),
        }
    }

    /// Restrict a dynamic attribute to a single frame.
    pub fn crop_to_frame(&self, frame: u32) -> Attribute {
        match self {
            Attribute::Static(v) => Attribute::Static(v.clone()),
            Attribute::Dynamic(_) => Attribute::Dynamic(
                self.value_at(frame)
                    .map(|value| ValueRun {
                        begin: frame,
                        end: frame + 1,
                        value: value.clone(),
                    })
                    .into_iter()
                    .collect(),
            ),
        }
    }

    /// Combine two attributes frame by frame.
    ///
    /// Where only one side has a value it is kept; where both do, the values
    /// are composed.
    pub fn compose(&self, other: &Attribute) -> Result<Attribute> {
        match (self, other) {
            (Attribute::Static(a), Attribute::Static(b)) => {
                Ok(Attribute::Static(compose_optional(a.as_ref(), b.as_ref())?))
            }
            _ => {
                let mut cuts: Vec<u32> = self.breakpoints();
                cuts.extend(other.breakpoints());
                cuts.sort_unstable();
                cuts.dedup();

                let mut runs = Vec::new();
                for w in cuts.windows(2) {
                    let (begin, end) = (w[0], w[1]);
                    if let Some(value) = compose_optional(self.value_at(begin), other.value_at(begin))? {
                        runs.push(ValueRun { begin, end, value });
                    }
                }
                Ok(Attribute::dynamic(runs))
            }
        }
    }
}

fn compose_optional(
    a: Option<&AttributeValue>,
    b: Option<&AttributeValue>,
) -> Result<Option<AttributeValue>> {
    match (a, b) {
        (Some(a), Some(b)) => a.compose(b).map(Some),
        (Some(v), None) | (None, Some(v)) => Ok(Some(v.clone())),
        (None, None) => Ok(None),
    }
}
