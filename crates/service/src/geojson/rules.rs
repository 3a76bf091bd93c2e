use serde::Serialize;
use serde_json::{Map, Value};

use super::{Document, DocumentKind, GeometryKind};
use crate::errors::ServiceError;

/// One failed rule, located by a JSONPath-like `path` (`$.features[3].geometry.type`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Violation {
    pub path: String,
    pub message: String,
}

impl Violation {
    fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self { path: path.into(), message: message.into() }
    }
}

/// Narrow an arbitrary JSON value to a [`Document`].
///
/// Only the envelope is checked: top-level `type`, each Feature's `geometry.type`
/// and `properties`. `coordinates` may hold any value (or be absent); geometric
/// validity is not this function's concern. Every violation found is reported,
/// not just the first.
pub fn validate(value: Value) -> Result<Document, ServiceError> {
    let mut violations = Vec::new();
    let kind = check_document(&value, &mut violations);
    match kind {
        Some(kind) if violations.is_empty() => Ok(Document::new(kind, value)),
        _ => Err(ServiceError::Validation(violations)),
    }
}

fn check_document(value: &Value, out: &mut Vec<Violation>) -> Option<DocumentKind> {
    let Some(obj) = value.as_object() else {
        out.push(Violation::new("$", "expected a Feature or FeatureCollection object"));
        return None;
    };
    match obj.get("type") {
        Some(Value::String(t)) if t == "Feature" => {
            check_feature(obj, "$", out);
            Some(DocumentKind::Feature)
        }
        Some(Value::String(t)) if t == "FeatureCollection" => {
            check_collection(obj, out);
            Some(DocumentKind::FeatureCollection)
        }
        Some(Value::String(t)) => {
            out.push(Violation::new(
                "$.type",
                format!("expected \"Feature\" or \"FeatureCollection\", got \"{t}\""),
            ));
            None
        }
        Some(_) => {
            out.push(Violation::new("$.type", "must be a string"));
            None
        }
        None => {
            out.push(Violation::new("$.type", "required string field is missing"));
            None
        }
    }
}

fn check_collection(obj: &Map<String, Value>, out: &mut Vec<Violation>) {
    match obj.get("features") {
        Some(Value::Array(features)) => {
            for (i, feature) in features.iter().enumerate() {
                let path = format!("$.features[{i}]");
                match feature.as_object() {
                    Some(f) => {
                        if f.get("type").and_then(Value::as_str) != Some("Feature") {
                            out.push(Violation::new(format!("{path}.type"), "expected \"Feature\""));
                        }
                        check_feature(f, &path, out);
                    }
                    None => out.push(Violation::new(path, "expected a Feature object")),
                }
            }
        }
        Some(_) => out.push(Violation::new("$.features", "expected an array of Features")),
        None => out.push(Violation::new("$.features", "required field is missing")),
    }
}

fn check_feature(obj: &Map<String, Value>, path: &str, out: &mut Vec<Violation>) {
    match obj.get("geometry") {
        Some(Value::Object(geometry)) => check_geometry(geometry, &format!("{path}.geometry"), out),
        Some(_) => out.push(Violation::new(format!("{path}.geometry"), "expected a Geometry object")),
        None => out.push(Violation::new(format!("{path}.geometry"), "required field is missing")),
    }
    match obj.get("properties") {
        None | Some(Value::Object(_)) => {}
        Some(_) => out.push(Violation::new(format!("{path}.properties"), "expected an object")),
    }
}

fn check_geometry(geometry: &Map<String, Value>, path: &str, out: &mut Vec<Violation>) {
    match geometry.get("type") {
        Some(Value::String(t)) if GeometryKind::from_type_name(t).is_some() => {}
        Some(Value::String(t)) => {
            let allowed = GeometryKind::ALL.map(|k| k.as_str()).join(", ");
            out.push(Violation::new(
                format!("{path}.type"),
                format!("unsupported geometry type \"{t}\"; expected one of {allowed}"),
            ));
        }
        Some(_) => out.push(Violation::new(format!("{path}.type"), "must be a string")),
        None => out.push(Violation::new(format!("{path}.type"), "required string field is missing")),
    }
}
