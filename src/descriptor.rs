//! Descriptors: the annotations being compared.
//!
//! A descriptor has a category, a type name, one or more ids, a frame span
//! and a set of named attributes. Composite descriptors (built by the
//! many-to-one match filter and by framewise evaluation) carry the union of
//! their members' ids.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::ops::Index;

use serde::{Deserialize, Serialize};

use crate::attribute::Attribute;
use crate::scope::Equivalencies;
use crate::span::FrameSpan;
use crate::{Error, Result};

/// Descriptor category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Category {
    Object,
    Content,
    File,
}

impl Category {
    pub fn from_name(name: &str) -> Result<Self> {
        match name.to_ascii_uppercase().as_str() {
            "OBJECT" => Ok(Category::Object),
            "CONTENT" => Ok(Category::Content),
            "FILE" => Ok(Category::File),
            _ => Err(Error::InvalidConfig(format!("unknown descriptor category '{}'", name))),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Category::Object => "OBJECT",
            Category::Content => "CONTENT",
            Category::File => "FILE",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Per-file context used when checking detection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileInformation {
    pub name: String,
    /// Total number of frames in the media file, when known.
    #[serde(default)]
    pub frame_count: Option<u32>,
}

impl FileInformation {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            frame_count: None,
        }
    }

    pub fn with_frame_count(mut self, frame_count: u32) -> Self {
        self.frame_count = Some(frame_count);
        self
    }

    /// Clip a span to the frames of the file.
    pub fn clip(&self, span: &FrameSpan) -> FrameSpan {
        match self.frame_count {
            Some(count) => span.clip(count),
            None => span.clone(),
        }
    }
}

/// A target or candidate annotation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Descriptor {
    pub category: Category,
    pub name: String,
    pub ids: BTreeSet<u32>,
    pub span: FrameSpan,
    #[serde(default)]
    pub attributes: BTreeMap<String, Attribute>,
}

impl Descriptor {
    /// Create a descriptor with a single id and no attributes.
    pub fn new(category: Category, name: impl Into<String>, id: u32, span: FrameSpan) -> Self {
        Self {
            category,
            name: name.into(),
            ids: BTreeSet::from([id]),
            span,
            attributes: BTreeMap::new(),
        }
    }

    /// Builder-style attribute setter.
    pub fn with_attribute(mut self, name: impl Into<String>, attribute: Attribute) -> Self {
        self.attributes.insert(name.into(), attribute);
        self
    }

    /// True when this descriptor was built from several others.
    pub fn is_composite(&self) -> bool {
        self.ids.len() > 1
    }

    /// The id, or the parenthesized id list for composites.
    pub fn id_label(&self) -> String {
        if self.ids.len() == 1 {
            self.ids.iter().map(|id| id.to_string()).collect()
        } else {
            let ids: Vec<String> = self.ids.iter().map(|id| id.to_string()).collect();
            format!("({})", ids.join(" "))
        }
    }

    /// `"CATEGORY NAME"`, the key used when grouping results.
    pub fn type_key(&self) -> String {
        format!("{} {}", self.category, self.name)
    }

    /// The last frame of the span.
    pub fn highest_frame(&self) -> Option<u32> {
        self.span.end().map(|e| e - 1)
    }

    /// Same category, and a name that matches directly or through the
    /// equivalency table in either direction.
    pub fn same_category_as(&self, other: &Descriptor, equivalencies: &Equivalencies) -> bool {
        self.category == other.category && equivalencies.names_match(&self.name, &other.name)
    }

    /// Look up an attribute by name, falling back to equivalent names.
    pub fn attribute(&self, name: &str, equivalencies: &Equivalencies) -> Option<&Attribute> {
        self.attributes.get(name).or_else(|| {
            self.attributes
                .iter()
                .find(|(key, _)| equivalencies.names_match(name, key))
                .map(|(_, attr)| attr)
        })
    }

    /// A copy of this descriptor restricted to a single frame, or `None` if
    /// the descriptor is not present at `frame`.
    pub fn crop_to_frame(&self, frame: u32) -> Option<Descriptor> {
        if !self.span.contains(frame) {
            return None;
        }
        Some(Descriptor {
            category: self.category,
            name: self.name.clone(),
            ids: self.ids.clone(),
            span: FrameSpan::single(frame),
            attributes: self
                .attributes
                .iter()
                .map(|(k, v)| (k.clone(), v.crop_to_frame(frame)))
                .collect(),
        })
    }

    /// Combine two same-role descriptors into one aggregate.
    ///
    /// The attributes named in `composable` are composed frame by frame; any
    /// other attribute keeps the value from `self` (or `other` if `self` lacks
    /// it). Fails with `BadData` if the two share an id, and with
    /// `Uncomposable` if a named attribute type cannot be combined.
    pub fn compose<S: AsRef<str>>(&self, other: &Descriptor, composable: &[S]) -> Result<Descriptor> {
        if let Some(id) = self.ids.intersection(&other.ids).next() {
            return Err(Error::BadData(format!(
                "descriptor id {} appears twice in one composition",
                id
            )));
        }

        let mut attributes = self.attributes.clone();
        for (name, theirs) in &other.attributes {
            let composed = match attributes.get(name) {
                Some(mine) if composable.iter().any(|c| c.as_ref() == name) => mine.compose(theirs)?,
                Some(mine) => mine.clone(),
                None => theirs.clone(),
            };
            attributes.insert(name.clone(), composed);
        }

        Ok(Descriptor {
            category: self.category,
            name: self.name.clone(),
            ids: self.ids.union(&other.ids).copied().collect(),
            span: self.span.union(&other.span),
            attributes,
        })
    }
}

impl fmt::Display for Descriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {} {}", self.category, self.name, self.id_label(), self.span)
    }
}

/// Handle to a descriptor stored in a [`DescriptorArena`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DescKey(usize);

/// Owning storage for descriptors, addressed by [`DescKey`].
#[derive(Debug, Clone, Default)]
pub struct DescriptorArena {
    items: Vec<Descriptor>,
}

impl DescriptorArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, descriptor: Descriptor) -> DescKey {
        self.items.push(descriptor);
        DescKey(self.items.len() - 1)
    }

    pub fn get(&self, key: DescKey) -> Option<&Descriptor> {
        self.items.get(key.0)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl Index<DescKey> for DescriptorArena {
    type Output = Descriptor;

    fn index(&self, key: DescKey) -> &Descriptor {
        &self.items[key.0]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attribute::{AttributeValue, BBox, Region, ValueRun};

    fn person(id: u32, begin: u32, end: u32) -> Descriptor {
        Descriptor::new(Category::Object, "PERSON", id, FrameSpan::new(begin, end))
    }

    fn boxes(begin: u32, end: u32, x: i64) -> Attribute {
        Attribute::dynamic(vec![ValueRun {
            begin,
            end,
            value: AttributeValue::Region(Region::from_bbox(BBox::new(x, 0, 10, 10))),
        }])
    }

    // ===== Identity =====

    #[test]
    fn test_id_label_and_display() {
        let d = person(3, 1, 10);
        assert_eq!(d.id_label(), "3");
        assert_eq!(d.to_string(), "OBJECT PERSON 3 [1, 10)");
        assert_eq!(d.type_key(), "OBJECT PERSON");
        assert_eq!(d.highest_frame(), Some(9));
    }

    #[test]
    fn test_same_category_with_equivalencies() {
        let target = person(1, 0, 5);
        let mut candidate = person(2, 0, 5);
        candidate.name = "HUMAN".into();

        let none = Equivalencies::new();
        assert!(!target.same_category_as(&candidate, &none));

        let mut eq = Equivalencies::new();
        eq.add("HUMAN", "PERSON");
        assert!(target.same_category_as(&candidate, &eq));
        assert!(candidate.same_category_as(&target, &eq));

        let mut content = person(4, 0, 5);
        content.category = Category::Content;
        assert!(!target.same_category_as(&content, &eq));
    }

    #[test]
    fn test_attribute_lookup_through_equivalency() {
        let d = person(1, 0, 5).with_attribute("box", boxes(0, 5, 0));
        let mut eq = Equivalencies::new();
        eq.add("location", "box");
        assert!(d.attribute("location", &eq).is_some());
        assert!(d.attribute("location", &Equivalencies::new()).is_none());
    }

    // ===== Composition =====

    #[test]
    fn test_compose_unions_spans_ids_and_regions() {
        let a = person(1, 0, 5).with_attribute("box", boxes(0, 5, 0));
        let b = person(2, 5, 10).with_attribute("box", boxes(5, 10, 20));
        let c = a.compose(&b, &["box"]).unwrap();

        assert!(c.is_composite());
        assert_eq!(c.id_label(), "(1 2)");
        assert_eq!(c.span, FrameSpan::new(0, 10));
        let attr = c.attributes.get("box").unwrap();
        assert!(attr.value_at(2).is_some());
        assert!(attr.value_at(7).is_some());
    }

    #[test]
    fn test_compose_rejects_duplicate_ids() {
        let a = person(1, 0, 5);
        let b = person(1, 5, 10);
        assert!(matches!(a.compose(&b, &["box"]), Err(Error::BadData(_))));
    }

    #[test]
    fn test_compose_out_of_scope_attribute_keeps_first() {
        let text = |s: &str| Attribute::Static(Some(AttributeValue::Text(s.into())));
        let a = person(1, 0, 5).with_attribute("label", text("a"));
        let b = person(2, 0, 5).with_attribute("label", text("b"));

        let kept = a.compose(&b, &["box"]).unwrap();
        assert_eq!(kept.attributes.get("label"), Some(&text("a")));

        assert!(matches!(a.compose(&b, &["label"]), Err(Error::Uncomposable(_))));
    }

    // ===== Cropping =====

    #[test]
    fn test_crop_to_frame() {
        let d = person(1, 0, 5).with_attribute("box", boxes(0, 5, 0));
        let cropped = d.crop_to_frame(3).unwrap();
        assert_eq!(cropped.span, FrameSpan::new(3, 4));
        assert!(cropped.attributes.get("box").unwrap().value_at(3).is_some());
        assert!(d.crop_to_frame(5).is_none());
    }

    // ===== Arena =====

    #[test]
    fn test_arena_keys() {
        let mut arena = DescriptorArena::new();
        let a = arena.insert(person(1, 0, 5));
        let b = arena.insert(person(2, 0, 5));
        assert_ne!(a, b);
        assert_eq!(arena.len(), 2);
        assert_eq!(arena[b].id_label(), "2");
        assert!(arena.get(a).is_some());
    }

    #[test]
    fn test_file_information_clip() {
        let info = FileInformation::new("a.mpg").with_frame_count(8);
        assert_eq!(info.clip(&FrameSpan::new(5, 20)), FrameSpan::new(5, 8));
        assert_eq!(FileInformation::new("b").clip(&FrameSpan::new(5, 20)), FrameSpan::new(5, 20));
    }
}
