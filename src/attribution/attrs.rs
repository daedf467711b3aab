//! Key → value attribute maps layered over vertices and edges.

use crate::config::ShapeToken;
use egui::Color32;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum AttrKey {
    Shape,
    Foreground,
    Background,
    LineWidth,
    Dashed,
    MinWidth,
    MinHeight,
    Label,
    Description,
    Condition,
    BundleInThreshold,
    BundleOutThreshold,
}

#[derive(Debug, Clone, PartialEq)]
pub enum AttrValue {
    Shape(ShapeToken),
    Color(Color32),
    Number(f32),
    Count(usize),
    Text(String),
    Flag(bool),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Attributes(BTreeMap<AttrKey, AttrValue>);

impl Attributes {
    pub fn set(&mut self, key: AttrKey, value: AttrValue) {
        self.0.insert(key, value);
    }

    pub fn get(&self, key: AttrKey) -> Option<&AttrValue> {
        self.0.get(&key)
    }

    pub fn contains(&self, key: AttrKey) -> bool {
        self.0.contains_key(&key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn shape(&self) -> Option<ShapeToken> {
        match self.get(AttrKey::Shape) {
            Some(AttrValue::Shape(s)) => Some(*s),
            _ => None,
        }
    }

    pub fn color(&self, key: AttrKey) -> Option<Color32> {
        match self.get(key) {
            Some(AttrValue::Color(c)) => Some(*c),
            _ => None,
        }
    }

    pub fn number(&self, key: AttrKey) -> Option<f32> {
        match self.get(key) {
            Some(AttrValue::Number(n)) => Some(*n),
            _ => None,
        }
    }

    pub fn count(&self, key: AttrKey) -> Option<usize> {
        match self.get(key) {
            Some(AttrValue::Count(n)) => Some(*n),
            _ => None,
        }
    }

    pub fn text(&self, key: AttrKey) -> Option<&str> {
        match self.get(key) {
            Some(AttrValue::Text(s)) => Some(s.as_str()),
            _ => None,
        }
    }

    /// Missing flags read as `false`.
    pub fn flag(&self, key: AttrKey) -> bool {
        matches!(self.get(key), Some(AttrValue::Flag(true)))
    }
}
