//! Analysis records produced by the spatial orchestrator

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{Coordinate, Feature};
use crate::coordinator::{CompositeResult, SlotStatus};
use crate::source::FailureReason;

/// Region name used when neither the caller nor the backend supplies one
pub const UNKNOWN_REGION: &str = "Unknown Region";

/// Raster values sampled at a single pixel
///
/// Every field is optional: rasters report nodata at their edges.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PixelMetrics {
    /// Solar potential score (0-10)
    #[serde(default, rename = "solar_mean_score")]
    pub solar_score: Option<f64>,
    /// Wind potential score (0-10)
    #[serde(default, rename = "wind_mean_score")]
    pub wind_score: Option<f64>,
    /// Terrain slope in degrees
    #[serde(default)]
    pub slope: Option<f64>,
    /// Mean global horizontal irradiance in kWh/m²/day
    #[serde(default, rename = "mean_ghi")]
    pub mean_irradiance: Option<f64>,
    /// Mean wind speed in m/s
    #[serde(default, rename = "mean_wind_speed_ms")]
    pub mean_wind_speed: Option<f64>,
    /// Mean wind power density in W/m²
    #[serde(default, rename = "mean_wpd")]
    pub mean_power_density: Option<f64>,
}

impl PixelMetrics {
    /// Whether any raster produced a value
    #[must_use]
    pub fn has_data(&self) -> bool {
        [
            self.solar_score,
            self.wind_score,
            self.slope,
            self.mean_irradiance,
            self.mean_wind_speed,
            self.mean_power_density,
        ]
        .iter()
        .any(Option::is_some)
    }
}

/// Aggregate statistics for an administrative region
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RegionMetrics {
    #[serde(rename = "state_name")]
    pub name: String,
    #[serde(default)]
    pub mean_ghi: Option<f64>,
    #[serde(default)]
    pub mean_wpd: Option<f64>,
    #[serde(default)]
    pub mean_wind_speed_ms: Option<f64>,
    #[serde(default)]
    pub solar_mean_score: Option<f64>,
    #[serde(default)]
    pub wind_mean_score: Option<f64>,
    #[serde(default)]
    pub solar_highly_suitable_km2: Option<f64>,
    #[serde(default)]
    pub wind_highly_suitable_km2: Option<f64>,
    /// Levelized cost of energy, USD/kWh
    #[serde(default)]
    pub lcoe_solar: Option<f64>,
    #[serde(default)]
    pub lcoe_wind: Option<f64>,
}

/// Attributes of a known settlement or demand center
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaceMetadata {
    pub name: String,
    /// Settlement type, e.g. "Port City"
    pub kind: Option<String>,
    pub population: Option<String>,
    pub infrastructure: Option<String>,
    pub source: Option<String>,
    pub source_url: Option<String>,
    /// Region the place belongs to, overriding the fetched region name
    pub region: Option<String>,
    pub coordinate: Option<Coordinate>,
}

impl PlaceMetadata {
    #[must_use]
    pub fn named<S: Into<String>>(name: S) -> Self {
        Self {
            name: name.into(),
            kind: None,
            population: None,
            infrastructure: None,
            source: None,
            source_url: None,
            region: None,
            coordinate: None,
        }
    }

    /// Build from a point-of-interest feature; `None` without a name
    #[must_use]
    pub fn from_feature(feature: &Feature) -> Option<Self> {
        let text = |key: &str| feature.property_str(key).map(str::to_string);
        Some(Self {
            name: text("name")?,
            kind: text("type"),
            population: text("pop"),
            infrastructure: text("infra"),
            source: text("source"),
            source_url: text("source_url"),
            region: text("region"),
            coordinate: feature.point(),
        })
    }
}

/// How the analyzed coordinate was obtained
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LocationOrigin {
    /// Clicked or searched by the user
    Selected,
    /// Reported by the device inside the mission area
    Device,
    /// Device was outside the mission area; the configured simulation point was used
    Simulated {
        reported: Coordinate,
        distance_km: f64,
    },
}

impl LocationOrigin {
    #[must_use]
    pub fn is_simulated(&self) -> bool {
        matches!(self, LocationOrigin::Simulated { .. })
    }
}

/// Data quality of one slot as seen by the consumer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlotReport {
    pub slot: String,
    pub status: SlotStatus,
    pub failure: Option<FailureReason>,
}

/// Per-slot data quality of a record, ordered by slot name
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SourceReport(pub Vec<SlotReport>);

impl SourceReport {
    #[must_use]
    pub fn from_composite(composite: &CompositeResult) -> Self {
        let mut slots: Vec<SlotReport> = composite
            .iter()
            .map(|(slot, outcome)| SlotReport {
                slot: slot.clone(),
                status: outcome.status,
                failure: outcome.failure.clone(),
            })
            .collect();
        slots.sort_by(|a, b| a.slot.cmp(&b.slot));
        Self(slots)
    }

    #[must_use]
    pub fn status(&self, slot: &str) -> Option<SlotStatus> {
        self.0.iter().find(|r| r.slot == slot).map(|r| r.status)
    }

    /// Whether every slot came from its primary source
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.0.iter().all(|r| r.status == SlotStatus::Ok)
    }
}

/// Merged result of a point query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SiteRecord {
    /// Request sequence number this record answers
    pub sequence: u64,
    pub coordinate: Coordinate,
    pub origin: LocationOrigin,
    pub metrics: PixelMetrics,
    pub region_name: String,
    pub region_metrics: Option<RegionMetrics>,
    pub place: Option<PlaceMetadata>,
    pub sources: SourceReport,
    pub generated_at: DateTime<Utc>,
}

impl SiteRecord {
    /// Place name when known, otherwise the region name
    #[must_use]
    pub fn display_name(&self) -> &str {
        self.place
            .as_ref()
            .map_or(self.region_name.as_str(), |p| p.name.as_str())
    }
}

/// Merged result of a named-region query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionRecord {
    pub sequence: u64,
    pub region_name: String,
    pub metrics: RegionMetrics,
    /// Boundary geometry; `None` tells the view to skip highlight and zoom
    pub geometry: Option<Value>,
    pub sources: SourceReport,
    pub generated_at: DateTime<Utc>,
}

impl RegionRecord {
    #[must_use]
    pub fn has_geometry(&self) -> bool {
        self.geometry.is_some()
    }
}
