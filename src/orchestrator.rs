//! Spatial Analysis Orchestrator
//!
//! Translates user intents (a clicked point, a region name, a place search
//! or the device position) into slot sets for the degradation coordinator,
//! merges the composite result into one immutable record and publishes it
//! to the registered consumers. Only the most recently started analysis may
//! publish; anything that finishes after a newer request began is discarded.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

use crate::DssError;
use crate::classification::{Resource, SiteAssessment, estimate_lcoe};
use crate::config::{AnalysisConfig, DssConfig};
use crate::coordinator::{CompositeResult, DegradationCoordinator, Slot};
use crate::location::ResolvedLocation;
use crate::models::{
    Coordinate, FeatureCollection, LocationOrigin, PixelMetrics, PlaceMetadata, RegionMetrics,
    RegionRecord, SiteRecord, SourceReport, UNKNOWN_REGION,
};
use crate::source::{BackendClient, SourceFetcher, SourceKind, SourceQuery, bundled_places};

/// Property holding the region name in boundary features
const BOUNDARY_NAME_KEY: &str = "state_name";
/// Property holding the place name in point-of-interest features
const PLACE_NAME_KEY: &str = "name";

/// Outcome of an analysis with respect to newer requests
#[derive(Debug, Clone, PartialEq)]
pub enum Delivery<T> {
    /// Published as the current record
    Current(T),
    /// A newer analysis started before this one finished; result discarded
    Superseded { sequence: u64 },
}

impl<T> Delivery<T> {
    #[must_use]
    pub fn is_current(&self) -> bool {
        matches!(self, Delivery::Current(_))
    }

    pub fn into_current(self) -> Option<T> {
        match self {
            Delivery::Current(record) => Some(record),
            Delivery::Superseded { .. } => None,
        }
    }

    pub fn map<U, F: FnOnce(T) -> U>(self, f: F) -> Delivery<U> {
        match self {
            Delivery::Current(record) => Delivery::Current(f(record)),
            Delivery::Superseded { sequence } => Delivery::Superseded { sequence },
        }
    }
}

/// Either kind of published record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AnalysisRecord {
    Site(SiteRecord),
    Region(RegionRecord),
}

impl AnalysisRecord {
    #[must_use]
    pub fn sequence(&self) -> u64 {
        match self {
            AnalysisRecord::Site(record) => record.sequence,
            AnalysisRecord::Region(record) => record.sequence,
        }
    }
}

/// Receiver of published records
///
/// Errors are logged by the analyzer and never reach the caller.
pub trait RecordConsumer: Send + Sync {
    fn on_site(&self, record: &SiteRecord) -> crate::Result<()>;

    fn on_region(&self, record: &RegionRecord) -> crate::Result<()>;
}

/// Map surface driven by published records; every call is fire-and-forget
pub trait Visualizer: Send + Sync {
    fn render_site(&self, record: &SiteRecord, assessment: &SiteAssessment);

    fn render_region(&self, record: &RegionRecord, assessment: &SiteAssessment);

    fn highlight_boundary(&self, geometry: &Value);

    fn place_marker(&self, coordinate: &Coordinate, label: &str);

    fn remove_marker(&self);
}

/// Adapts a [`Visualizer`] to the consumer interface
pub struct VisualizationConsumer<V> {
    visualizer: V,
    slope_limit_deg: f64,
}

impl<V: Visualizer> VisualizationConsumer<V> {
    pub fn new(visualizer: V, slope_limit_deg: f64) -> Self {
        Self {
            visualizer,
            slope_limit_deg,
        }
    }

    pub fn visualizer(&self) -> &V {
        &self.visualizer
    }
}

impl<V: Visualizer> RecordConsumer for VisualizationConsumer<V> {
    fn on_site(&self, record: &SiteRecord) -> crate::Result<()> {
        let assessment = SiteAssessment::of(record, self.slope_limit_deg);
        self.visualizer.remove_marker();
        self.visualizer
            .place_marker(&record.coordinate, record.display_name());
        self.visualizer.render_site(record, &assessment);
        Ok(())
    }

    fn on_region(&self, record: &RegionRecord) -> crate::Result<()> {
        let assessment = SiteAssessment::of_region(record);
        self.visualizer.remove_marker();
        // No geometry means no highlight and no zoom
        if let Some(geometry) = &record.geometry {
            self.visualizer.highlight_boundary(geometry);
        }
        self.visualizer.render_region(record, &assessment);
        Ok(())
    }
}

/// Entry point for every spatial analysis
pub struct SpatialAnalyzer {
    primary: Arc<dyn SourceFetcher>,
    secondary: Option<Arc<dyn SourceFetcher>>,
    place_fallback: Option<Arc<dyn SourceFetcher>>,
    boundary_fallback: Option<Arc<dyn SourceFetcher>>,
    settings: AnalysisConfig,
    coordinator: DegradationCoordinator,
    consumers: Vec<Arc<dyn RecordConsumer>>,
    sequencer: AtomicU64,
    publisher: Mutex<()>,
    current: Mutex<Option<AnalysisRecord>>,
}

impl SpatialAnalyzer {
    /// Analyzer reading every slot from `primary`, without fallbacks
    pub fn new(primary: Arc<dyn SourceFetcher>, settings: AnalysisConfig) -> Self {
        Self {
            primary,
            secondary: None,
            place_fallback: None,
            boundary_fallback: None,
            settings,
            coordinator: DegradationCoordinator::new(),
            consumers: Vec::new(),
            sequencer: AtomicU64::new(0),
            publisher: Mutex::new(()),
            current: Mutex::new(None),
        }
    }

    /// Analyzer wired to the configured backends, with the bundled towns as
    /// point-of-interest fallback
    pub fn from_config(config: &DssConfig) -> crate::Result<Self> {
        let primary = BackendClient::new(&config.backend)?;
        info!("Primary geodata backend: {}", primary.base_url());

        let secondary = match &config.backend.secondary_url {
            Some(url) => {
                info!("Secondary geodata backend: {}", url);
                let client = BackendClient::with_timeout(
                    "secondary",
                    url,
                    Duration::from_secs(config.backend.timeout_seconds.into()),
                )?;
                Some(Arc::new(client) as Arc<dyn SourceFetcher>)
            }
            None => None,
        };

        Ok(Self::new(Arc::new(primary), config.analysis.clone())
            .with_secondary(secondary)
            .with_place_fallback(Some(Arc::new(bundled_places()))))
    }

    /// Fallback for pixel and region metric slots
    #[must_use]
    pub fn with_secondary(mut self, secondary: Option<Arc<dyn SourceFetcher>>) -> Self {
        self.secondary = secondary;
        self
    }

    #[must_use]
    pub fn with_place_fallback(mut self, fallback: Option<Arc<dyn SourceFetcher>>) -> Self {
        self.place_fallback = fallback;
        self
    }

    #[must_use]
    pub fn with_boundary_fallback(mut self, fallback: Option<Arc<dyn SourceFetcher>>) -> Self {
        self.boundary_fallback = fallback;
        self
    }

    pub fn register_consumer(&mut self, consumer: Arc<dyn RecordConsumer>) {
        self.consumers.push(consumer);
    }

    #[must_use]
    pub fn settings(&self) -> &AnalysisConfig {
        &self.settings
    }

    /// Latest published record
    #[must_use]
    pub fn current(&self) -> Option<AnalysisRecord> {
        self.current
            .lock()
            .map(|current| current.clone())
            .unwrap_or_else(|poisoned| poisoned.into_inner().clone())
    }

    /// Analyze a user-selected point
    ///
    /// `context` carries the place the point was reached through; its region
    /// overrides the fetched region name.
    pub async fn analyze_point(
        &self,
        coordinate: Coordinate,
        context: Option<PlaceMetadata>,
    ) -> crate::Result<Delivery<SiteRecord>> {
        let sequence = self.next_sequence();
        self.analyze_site(sequence, coordinate, LocationOrigin::Selected, context)
            .await
    }

    /// Analyze a resolved device location
    pub async fn analyze_location(
        &self,
        resolved: ResolvedLocation,
    ) -> crate::Result<Delivery<SiteRecord>> {
        let sequence = self.next_sequence();
        self.analyze_site(sequence, resolved.coordinate, resolved.origin, None)
            .await
    }

    #[instrument(skip(self, context), fields(point = %coordinate))]
    async fn analyze_site(
        &self,
        sequence: u64,
        coordinate: Coordinate,
        origin: LocationOrigin,
        context: Option<PlaceMetadata>,
    ) -> crate::Result<Delivery<SiteRecord>> {
        debug!("Starting site analysis #{}", sequence);

        let query = SourceQuery::Point(coordinate);
        let composite = self
            .coordinator
            .run(vec![
                Slot::new(SourceKind::PixelMetrics, query.clone(), self.primary.clone())
                    .with_fallback(self.secondary.clone()),
                Slot::new(SourceKind::RegionMetrics, query, self.primary.clone())
                    .with_fallback(self.secondary.clone()),
            ])
            .await;

        let metrics = decode_slot::<PixelMetrics>(&composite, SourceKind::PixelMetrics)
            .filter(PixelMetrics::has_data);
        let Some(metrics) = metrics else {
            return self.superseded_or(
                sequence,
                DssError::NoCoverage {
                    latitude: coordinate.latitude(),
                    longitude: coordinate.longitude(),
                },
            );
        };

        let region_metrics = decode_slot::<RegionMetrics>(&composite, SourceKind::RegionMetrics)
            .map(with_estimated_lcoe);
        let region_name = context
            .as_ref()
            .and_then(|place| place.region.clone())
            .or_else(|| {
                region_metrics
                    .as_ref()
                    .map(|m| m.name.trim().to_string())
                    .filter(|name| !name.is_empty())
            })
            .unwrap_or_else(|| UNKNOWN_REGION.to_string());

        let record = SiteRecord {
            sequence,
            coordinate,
            origin,
            metrics,
            region_name,
            region_metrics,
            place: context,
            sources: SourceReport::from_composite(&composite),
            generated_at: Utc::now(),
        };

        if self.publish(AnalysisRecord::Site(record.clone())) {
            Ok(Delivery::Current(record))
        } else {
            Ok(Delivery::Superseded { sequence })
        }
    }

    /// Analyze a named administrative region
    #[instrument(skip(self))]
    pub async fn analyze_region(&self, name: &str) -> crate::Result<Delivery<RegionRecord>> {
        let name = name.trim();
        if name.is_empty() {
            return Err(DssError::validation("region name must not be empty"));
        }

        let sequence = self.next_sequence();
        self.region_analysis(sequence, name).await
    }

    async fn region_analysis(
        &self,
        sequence: u64,
        name: &str,
    ) -> crate::Result<Delivery<RegionRecord>> {
        debug!("Starting region analysis #{}", sequence);

        let composite = self
            .coordinator
            .run(vec![
                Slot::new(
                    SourceKind::RegionMetrics,
                    SourceQuery::Region(name.to_string()),
                    self.primary.clone(),
                )
                .with_fallback(self.secondary.clone()),
                Slot::new(
                    SourceKind::BoundaryGeometry,
                    SourceQuery::Collection,
                    self.primary.clone(),
                )
                .with_fallback(self.boundary_fallback.clone()),
            ])
            .await;

        let Some(metrics) = decode_slot::<RegionMetrics>(&composite, SourceKind::RegionMetrics)
        else {
            return self.superseded_or(sequence, DssError::region_not_found(name));
        };
        let metrics = with_estimated_lcoe(metrics);

        let geometry = decode_slot::<FeatureCollection>(&composite, SourceKind::BoundaryGeometry)
            .and_then(|states| {
                states
                    .find_by_name(BOUNDARY_NAME_KEY, name)
                    .filter(|feature| feature.has_geometry())
                    .map(|feature| feature.geometry.clone())
            });
        if geometry.is_none() {
            debug!("No boundary geometry matches '{}'", name);
        }

        let region_name = if metrics.name.trim().is_empty() {
            name.to_string()
        } else {
            metrics.name.trim().to_string()
        };

        let record = RegionRecord {
            sequence,
            region_name,
            metrics,
            geometry,
            sources: SourceReport::from_composite(&composite),
            generated_at: Utc::now(),
        };

        if self.publish(AnalysisRecord::Region(record.clone())) {
            Ok(Delivery::Current(record))
        } else {
            Ok(Delivery::Superseded { sequence })
        }
    }

    /// Look up a known settlement and analyze its position
    #[instrument(skip(self))]
    pub async fn analyze_place(&self, name: &str) -> crate::Result<Delivery<SiteRecord>> {
        let name = name.trim();
        if name.is_empty() {
            return Err(DssError::validation("place name must not be empty"));
        }

        let sequence = self.next_sequence();
        match self.place_analysis(sequence, name).await {
            Err(e) => self.superseded_or(sequence, e),
            delivery => delivery,
        }
    }

    /// Search box: a known place first, otherwise a region of that name
    ///
    /// Both attempts belong to one request and share its sequence number.
    #[instrument(skip(self))]
    pub async fn search(&self, name: &str) -> crate::Result<Delivery<AnalysisRecord>> {
        let name = name.trim();
        if name.is_empty() {
            return Err(DssError::validation("search text must not be empty"));
        }

        let sequence = self.next_sequence();
        match self.place_analysis(sequence, name).await {
            Ok(delivery) => Ok(delivery.map(AnalysisRecord::Site)),
            Err(DssError::PlaceNotFound { .. }) if !self.is_stale(sequence) => {
                debug!("'{}' is not a known place, trying regions", name);
                Ok(self
                    .region_analysis(sequence, name)
                    .await?
                    .map(AnalysisRecord::Region))
            }
            Err(e) => self.superseded_or(sequence, e),
        }
    }

    async fn place_analysis(
        &self,
        sequence: u64,
        name: &str,
    ) -> crate::Result<Delivery<SiteRecord>> {
        let place = self.find_place(name).await?;
        let coordinate = place
            .coordinate
            .ok_or_else(|| DssError::place_not_found(name))?;
        info!("Analyzing place '{}' at {}", place.name, coordinate);
        self.analyze_site(sequence, coordinate, LocationOrigin::Selected, Some(place))
            .await
    }

    async fn find_place(&self, name: &str) -> crate::Result<PlaceMetadata> {
        let composite = self
            .coordinator
            .run(vec![
                Slot::new(
                    SourceKind::PlaceGeometry,
                    SourceQuery::Collection,
                    self.primary.clone(),
                )
                .with_fallback(self.place_fallback.clone()),
            ])
            .await;

        decode_slot::<FeatureCollection>(&composite, SourceKind::PlaceGeometry)
            .and_then(|places| {
                places
                    .find_by_name(PLACE_NAME_KEY, name)
                    .and_then(PlaceMetadata::from_feature)
            })
            .ok_or_else(|| DssError::place_not_found(name))
    }

    fn next_sequence(&self) -> u64 {
        self.sequencer.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn is_stale(&self, sequence: u64) -> bool {
        self.sequencer.load(Ordering::SeqCst) != sequence
    }

    /// Failures of superseded requests are discarded like their records
    fn superseded_or<T>(&self, sequence: u64, error: DssError) -> crate::Result<Delivery<T>> {
        if self.is_stale(sequence) {
            debug!("Dropping failure of superseded analysis #{}: {}", sequence, error);
            Ok(Delivery::Superseded { sequence })
        } else {
            Err(error)
        }
    }

    /// Replace the current record if `record` belongs to the latest request,
    /// then notify consumers. Returns `false` for stale records.
    ///
    /// The publish lock is held through the consumer fan-out, so consumers
    /// receive records in sequence order and never end on a stale one.
    fn publish(&self, record: AnalysisRecord) -> bool {
        let sequence = record.sequence();
        let _publishing = self
            .publisher
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if self.is_stale(sequence) {
            info!(
                "Discarding stale analysis #{} (latest is #{})",
                sequence,
                self.sequencer.load(Ordering::SeqCst)
            );
            return false;
        }
        *self
            .current
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(record.clone());

        for consumer in &self.consumers {
            let result = match &record {
                AnalysisRecord::Site(site) => consumer.on_site(site),
                AnalysisRecord::Region(region) => consumer.on_region(region),
            };
            if let Err(e) = result {
                warn!("Consumer failed to handle record #{}: {}", sequence, e);
            }
        }

        true
    }
}

/// Decode an available slot value; unavailable or undecodable slots yield `None`
fn decode_slot<T: DeserializeOwned>(composite: &CompositeResult, kind: SourceKind) -> Option<T> {
    let value = composite.get(kind.slot_name())?.available_value()?;
    match serde_json::from_value(value.clone()) {
        Ok(decoded) => Some(decoded),
        Err(e) => {
            warn!("Undecodable {} payload: {}", kind, e);
            None
        }
    }
}

/// Fill missing LCOE values from the mean scores
fn with_estimated_lcoe(mut metrics: RegionMetrics) -> RegionMetrics {
    if metrics.lcoe_solar.is_none() {
        metrics.lcoe_solar = metrics
            .solar_mean_score
            .map(|score| estimate_lcoe(Resource::Solar, score));
    }
    if metrics.lcoe_wind.is_none() {
        metrics.lcoe_wind = metrics
            .wind_mean_score
            .map(|score| estimate_lcoe(Resource::Wind, score));
    }
    metrics
}
