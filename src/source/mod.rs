//! Source fetchers
//!
//! A fetcher performs one logical data retrieval and always resolves to a
//! [`SourceResult`]; transport, status and parse errors are folded into a
//! stable [`FailureReason`] instead of being propagated.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

use crate::models::{Coordinate, FeatureCollection, PixelMetrics, RegionMetrics};

pub mod bundled;
pub mod http;

pub use bundled::{StaticSource, bundled_places};
pub use http::BackendClient;

/// Untyped payload returned by a source
pub type RawPayload = Value;

/// Raster fields of which a pixel payload carries at least one, possibly null
const PIXEL_FIELDS: [&str; 6] = [
    "solar_mean_score",
    "wind_mean_score",
    "slope",
    "mean_ghi",
    "mean_wind_speed_ms",
    "mean_wpd",
];

/// Which logical dataset a fetch targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SourceKind {
    /// Raster values sampled at a coordinate
    PixelMetrics,
    /// Aggregate statistics of an administrative region
    RegionMetrics,
    /// Administrative boundary polygons
    BoundaryGeometry,
    /// Settlements and demand centers
    PlaceGeometry,
}

impl SourceKind {
    /// Slot name used by the orchestrator for this kind
    #[must_use]
    pub fn slot_name(&self) -> &'static str {
        match self {
            SourceKind::PixelMetrics => "pixel-metrics",
            SourceKind::RegionMetrics => "region-metrics",
            SourceKind::BoundaryGeometry => "boundary-geometry",
            SourceKind::PlaceGeometry => "point-of-interest-geometry",
        }
    }

    /// Check that `payload` has the shape this kind serves.
    ///
    /// Error bodies answered with a 2xx status (`{"detail": ...}`) fail here
    /// as [`FailureReason::MalformedPayload`].
    pub fn validate(&self, payload: &RawPayload) -> Result<(), FailureReason> {
        let Some(object) = payload.as_object() else {
            return Err(FailureReason::MalformedPayload);
        };
        let valid = match self {
            SourceKind::PixelMetrics => {
                PIXEL_FIELDS.iter().any(|field| object.contains_key(*field))
                    && PixelMetrics::deserialize(payload).is_ok()
            }
            SourceKind::RegionMetrics => RegionMetrics::deserialize(payload).is_ok(),
            // `features` may be null, but must be present
            SourceKind::BoundaryGeometry | SourceKind::PlaceGeometry => {
                object.contains_key("features") && FeatureCollection::deserialize(payload).is_ok()
            }
        };
        if valid {
            Ok(())
        } else {
            Err(FailureReason::MalformedPayload)
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.slot_name())
    }
}

/// Query parameters of a fetch
#[derive(Debug, Clone, PartialEq)]
pub enum SourceQuery {
    Point(Coordinate),
    Region(String),
    /// Whole collection, no filter
    Collection,
}

/// Stable reason code for a failed fetch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    Timeout,
    /// Non-2xx HTTP status other than 404
    Status(u16),
    MalformedPayload,
    NotFound,
    /// Connection-level failure (refused, reset, DNS)
    Transport,
}

impl FailureReason {
    /// Short machine-readable code, e.g. `status_503`
    #[must_use]
    pub fn code(&self) -> String {
        match self {
            FailureReason::Timeout => "timeout".to_string(),
            FailureReason::Status(status) => format!("status_{status}"),
            FailureReason::MalformedPayload => "malformed_payload".to_string(),
            FailureReason::NotFound => "not_found".to_string(),
            FailureReason::Transport => "transport".to_string(),
        }
    }
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.code())
    }
}

/// Outcome of a single fetch
#[derive(Debug, Clone, PartialEq)]
pub enum SourceResult<T> {
    Ok(T),
    Failed(FailureReason),
}

impl<T> SourceResult<T> {
    #[must_use]
    pub fn is_ok(&self) -> bool {
        matches!(self, SourceResult::Ok(_))
    }

    pub fn ok(self) -> Option<T> {
        match self {
            SourceResult::Ok(value) => Some(value),
            SourceResult::Failed(_) => None,
        }
    }

    pub fn map<U, F: FnOnce(T) -> U>(self, f: F) -> SourceResult<U> {
        match self {
            SourceResult::Ok(value) => SourceResult::Ok(f(value)),
            SourceResult::Failed(reason) => SourceResult::Failed(reason),
        }
    }
}

impl<T> From<Result<T, FailureReason>> for SourceResult<T> {
    fn from(result: Result<T, FailureReason>) -> Self {
        match result {
            Ok(value) => SourceResult::Ok(value),
            Err(reason) => SourceResult::Failed(reason),
        }
    }
}

/// One logical data retrieval, independent of every other fetcher
#[async_trait]
pub trait SourceFetcher: Send + Sync {
    /// Human-readable name used in logs
    fn name(&self) -> &str;

    async fn fetch(&self, kind: SourceKind, query: &SourceQuery) -> SourceResult<RawPayload>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_failure_reason_codes_are_stable() {
        assert_eq!(FailureReason::Timeout.code(), "timeout");
        assert_eq!(FailureReason::Status(503).code(), "status_503");
        assert_eq!(FailureReason::MalformedPayload.to_string(), "malformed_payload");
        assert_eq!(FailureReason::NotFound.to_string(), "not_found");
    }

    #[test]
    fn test_source_result_conversions() {
        let ok: SourceResult<u8> = Ok(3).into();
        assert!(ok.is_ok());
        assert_eq!(ok.map(|v| v * 2).ok(), Some(6));

        let failed: SourceResult<u8> = Err(FailureReason::Transport).into();
        assert!(!failed.is_ok());
        assert_eq!(failed.ok(), None);
    }

    #[test]
    fn test_slot_names() {
        assert_eq!(SourceKind::PixelMetrics.slot_name(), "pixel-metrics");
        assert_eq!(SourceKind::PlaceGeometry.to_string(), "point-of-interest-geometry");
    }

    #[test]
    fn test_validate_accepts_expected_shapes() {
        assert!(SourceKind::PixelMetrics
            .validate(&json!({"solar_mean_score": null, "wind_mean_score": null}))
            .is_ok());
        assert!(SourceKind::RegionMetrics
            .validate(&json!({"state_name": "Banadir", "lcoe_solar": 0.11}))
            .is_ok());
        assert!(SourceKind::BoundaryGeometry
            .validate(&json!({"type": "FeatureCollection", "features": null}))
            .is_ok());
        assert!(SourceKind::PlaceGeometry
            .validate(&json!({"features": [{"properties": null, "geometry": null}]}))
            .is_ok());
    }

    #[test]
    fn test_validate_rejects_error_bodies() {
        let detail = json!({"detail": "Internal database error."});
        for kind in [
            SourceKind::PixelMetrics,
            SourceKind::RegionMetrics,
            SourceKind::BoundaryGeometry,
            SourceKind::PlaceGeometry,
        ] {
            assert_eq!(kind.validate(&detail), Err(FailureReason::MalformedPayload));
        }
        assert_eq!(
            SourceKind::PixelMetrics.validate(&json!({"solar_mean_score": "high"})),
            Err(FailureReason::MalformedPayload)
        );
        assert_eq!(
            SourceKind::PlaceGeometry.validate(&json!([1, 2])),
            Err(FailureReason::MalformedPayload)
        );
    }
}
