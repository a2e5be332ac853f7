//! Data models for the EnergyDSS core
//!
//! This module contains the core domain models organized by concern:
//! - Location: validated coordinates and bounding boxes
//! - GeoJSON: boundary and point-of-interest feature collections
//! - Record: merged site and region analysis records

pub mod geojson;
pub mod location;
pub mod record;

// Re-export all public types for convenient access
pub use geojson::{Feature, FeatureCollection};
pub use location::{Coordinate, RegionBounds};
pub use record::{
    LocationOrigin, PixelMetrics, PlaceMetadata, RegionMetrics, RegionRecord, SiteRecord,
    SlotReport, SourceReport, UNKNOWN_REGION,
};
