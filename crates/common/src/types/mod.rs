use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Debug)]
pub struct Health {
    pub ok: bool,
}

/// Media type for stored and served GeoJSON documents.
pub const GEOJSON_MEDIA_TYPE: &str = "application/geo+json";
