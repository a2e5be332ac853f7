//! Current Location Module
//!
//! Resolves the device position into a coordinate the orchestrator can
//! analyze. Positions outside the mission area are replaced by the
//! configured simulation point; the reported position is kept so the user
//! can be told how far away they are.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, info, warn};

use crate::DssError;
use crate::config::AnalysisConfig;
use crate::models::{Coordinate, LocationOrigin};

/// Why the device position could not be read
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LocationFailure {
    /// The user refused the permission prompt
    Denied,
    /// Hardware or platform error
    Error(String),
}

impl fmt::Display for LocationFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LocationFailure::Denied => f.write_str("permission denied"),
            LocationFailure::Error(message) => f.write_str(message),
        }
    }
}

/// Supplier of the device position
#[async_trait]
pub trait LocationProvider: Send + Sync {
    async fn current_position(&self) -> Result<Coordinate, LocationFailure>;
}

/// Provider answering with a fixed position or failure, for the CLI and tests
#[derive(Debug, Clone)]
pub struct FixedLocationProvider {
    position: Result<Coordinate, LocationFailure>,
}

impl FixedLocationProvider {
    #[must_use]
    pub fn new(position: Coordinate) -> Self {
        Self {
            position: Ok(position),
        }
    }

    #[must_use]
    pub fn denied() -> Self {
        Self {
            position: Err(LocationFailure::Denied),
        }
    }

    #[must_use]
    pub fn failing<S: Into<String>>(message: S) -> Self {
        Self {
            position: Err(LocationFailure::Error(message.into())),
        }
    }
}

#[async_trait]
impl LocationProvider for FixedLocationProvider {
    async fn current_position(&self) -> Result<Coordinate, LocationFailure> {
        self.position.clone()
    }
}

/// Coordinate to analyze and how it was obtained
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ResolvedLocation {
    pub coordinate: Coordinate,
    pub origin: LocationOrigin,
}

impl ResolvedLocation {
    /// A coordinate picked by the user
    #[must_use]
    pub fn selected(coordinate: Coordinate) -> Self {
        Self {
            coordinate,
            origin: LocationOrigin::Selected,
        }
    }
}

/// Resolve the device position against the mission area
pub async fn resolve_current_location(
    provider: &dyn LocationProvider,
    settings: &AnalysisConfig,
) -> crate::Result<ResolvedLocation> {
    let reported = provider.current_position().await.map_err(|failure| {
        warn!("Device location unavailable: {}", failure);
        DssError::location_unavailable(failure.to_string())
    })?;

    debug!("Device reported position {}", reported);

    if settings.mission_area.contains(&reported) {
        return Ok(ResolvedLocation {
            coordinate: reported,
            origin: LocationOrigin::Device,
        });
    }

    let simulated = settings.simulation_point;
    let distance_km = reported.distance_km(&simulated);
    info!(
        "Device at {} is outside the mission area ({:.0} km away), simulating {}",
        reported, distance_km, simulated
    );

    Ok(ResolvedLocation {
        coordinate: simulated,
        origin: LocationOrigin::Simulated {
            reported,
            distance_km,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_device_inside_mission_area() {
        let hargeisa = Coordinate::new(9.5624, 44.0770).unwrap();
        let resolved =
            resolve_current_location(&FixedLocationProvider::new(hargeisa), &AnalysisConfig::default())
                .await
                .unwrap();

        assert_eq!(resolved.coordinate, hargeisa);
        assert_eq!(resolved.origin, LocationOrigin::Device);
    }

    #[tokio::test]
    async fn test_device_outside_mission_area_is_simulated() {
        let berlin = Coordinate::new(52.52, 13.40).unwrap();
        let settings = AnalysisConfig::default();
        let resolved = resolve_current_location(&FixedLocationProvider::new(berlin), &settings)
            .await
            .unwrap();

        assert_eq!(resolved.coordinate, settings.simulation_point);
        match resolved.origin {
            LocationOrigin::Simulated {
                reported,
                distance_km,
            } => {
                assert_eq!(reported, berlin);
                assert!(distance_km > 5000.0, "unexpected distance {distance_km}");
            }
            other => panic!("expected simulated origin, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_denied_permission_is_location_unavailable() {
        let result =
            resolve_current_location(&FixedLocationProvider::denied(), &AnalysisConfig::default()).await;
        assert!(matches!(result, Err(DssError::LocationUnavailable { .. })));

        let result = resolve_current_location(
            &FixedLocationProvider::failing("gps timeout"),
            &AnalysisConfig::default(),
        )
        .await;
        assert!(result.unwrap_err().to_string().contains("gps timeout"));
    }
}
