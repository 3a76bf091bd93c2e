//! GeoJSON document model.
//!
//! A [`Document`] is only obtainable through [`validate`], so holding one means
//! the top-level shape has been checked. The original JSON value is kept as-is:
//! foreign members, `id` and `bbox` survive a store round-trip untouched.

use std::fmt;

use serde::{Serialize, Serializer};
use serde_json::Value;

mod rules;

pub use rules::{validate, Violation};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    Feature,
    FeatureCollection,
}

impl DocumentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentKind::Feature => "Feature",
            DocumentKind::FeatureCollection => "FeatureCollection",
        }
    }
}

impl fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Geometry `type` values accepted inside a Feature.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeometryKind {
    Point,
    LineString,
    Polygon,
    MultiPoint,
    MultiLineString,
    MultiPolygon,
    GeometryCollection,
}

impl GeometryKind {
    pub const ALL: [GeometryKind; 7] = [
        GeometryKind::Point,
        GeometryKind::LineString,
        GeometryKind::Polygon,
        GeometryKind::MultiPoint,
        GeometryKind::MultiLineString,
        GeometryKind::MultiPolygon,
        GeometryKind::GeometryCollection,
    ];

    pub fn from_type_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.as_str() == name)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            GeometryKind::Point => "Point",
            GeometryKind::LineString => "LineString",
            GeometryKind::Polygon => "Polygon",
            GeometryKind::MultiPoint => "MultiPoint",
            GeometryKind::MultiLineString => "MultiLineString",
            GeometryKind::MultiPolygon => "MultiPolygon",
            GeometryKind::GeometryCollection => "GeometryCollection",
        }
    }
}

/// A validated Feature or FeatureCollection.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    kind: DocumentKind,
    value: Value,
}

impl Document {
    pub(crate) fn new(kind: DocumentKind, value: Value) -> Self {
        Self { kind, value }
    }

    pub fn kind(&self) -> DocumentKind {
        self.kind
    }

    pub fn as_value(&self) -> &Value {
        &self.value
    }

    /// 1 for a Feature, the array length for a FeatureCollection.
    pub fn feature_count(&self) -> usize {
        match self.kind {
            DocumentKind::Feature => 1,
            DocumentKind::FeatureCollection => self
                .value
                .get("features")
                .and_then(Value::as_array)
                .map_or(0, Vec::len),
        }
    }
}

impl Serialize for Document {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.value.serialize(serializer)
    }
}
