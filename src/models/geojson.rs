//! Minimal GeoJSON feature collections as served by the geodata backend

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use super::Coordinate;

/// GeoJSON `FeatureCollection`
///
/// The backend aggregates features with `jsonb_agg`, which yields `null`
/// rather than an empty array when nothing matched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FeatureCollection {
    #[serde(default)]
    pub features: Option<Vec<Feature>>,
}

impl FeatureCollection {
    #[must_use]
    pub fn features(&self) -> &[Feature] {
        self.features.as_deref().unwrap_or_default()
    }

    /// First feature whose `key` property equals `name`, ignoring case and
    /// surrounding whitespace
    #[must_use]
    pub fn find_by_name(&self, key: &str, name: &str) -> Option<&Feature> {
        let wanted = name.trim().to_lowercase();
        self.features().iter().find(|feature| {
            feature
                .property_str(key)
                .is_some_and(|value| value.trim().to_lowercase() == wanted)
        })
    }
}

/// GeoJSON `Feature`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Feature {
    /// `null` properties are valid GeoJSON and read as empty
    #[serde(default, deserialize_with = "null_as_empty")]
    pub properties: Map<String, Value>,
    #[serde(default)]
    pub geometry: Value,
}

impl Feature {
    #[must_use]
    pub fn property_str(&self, key: &str) -> Option<&str> {
        self.properties.get(key).and_then(Value::as_str)
    }

    #[must_use]
    pub fn has_geometry(&self) -> bool {
        self.geometry.is_object()
    }

    /// Position of a `Point` geometry (GeoJSON order is `[lon, lat]`)
    #[must_use]
    pub fn point(&self) -> Option<Coordinate> {
        if self.geometry.get("type").and_then(Value::as_str) != Some("Point") {
            return None;
        }
        let position = self.geometry.get("coordinates")?.as_array()?;
        let longitude = position.first()?.as_f64()?;
        let latitude = position.get(1)?.as_f64()?;
        Coordinate::new(latitude, longitude).ok()
    }
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<Map<String, Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Map<String, Value>>::deserialize(deserializer)?.unwrap_or_default())
}
