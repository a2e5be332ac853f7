//! `EnergyDSS` - Energy-potential decision support for field teams
//!
//! This library provides concurrent, degradation-tolerant retrieval of
//! solar and wind potential data, score classification and advisories,
//! and a decision-tree wizard for solar equipment recommendations.

pub mod api;
pub mod classification;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod location;
pub mod logging;
pub mod models;
pub mod orchestrator;
pub mod source;
pub mod web;
pub mod wizard;

// Re-export core types for public API
pub use classification::{Advisory, Category, SiteAssessment, advise, classify};
pub use config::DssConfig;
pub use coordinator::{CompositeResult, DegradationCoordinator, Slot, SlotOutcome, SlotStatus};
pub use error::DssError;
pub use location::{FixedLocationProvider, LocationProvider, ResolvedLocation, resolve_current_location};
pub use models::{Coordinate, RegionBounds, RegionRecord, SiteRecord};
pub use orchestrator::{AnalysisRecord, Delivery, RecordConsumer, SpatialAnalyzer, Visualizer};
pub use source::{BackendClient, FailureReason, SourceFetcher, SourceKind, SourceResult};
pub use wizard::{Domain, Recommendation, WizardSession};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Core result type used throughout the library
pub type Result<T> = std::result::Result<T, DssError>;
