//! Degradation Coordinator
//!
//! Runs a set of named fetch slots concurrently and degrades each slot
//! independently: a failed primary is replaced by the slot's fallback
//! supplier when one is registered, otherwise the slot is reported
//! unavailable with a placeholder value. The composite call itself never
//! fails.

use futures::future::join_all;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

use crate::DssError;
use crate::source::{FailureReason, RawPayload, SourceFetcher, SourceKind, SourceQuery, SourceResult};

/// Data quality of a slot after coordination
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlotStatus {
    /// Primary source answered
    Ok,
    /// Primary failed, fallback answered
    Degraded,
    /// No source answered; value is a placeholder
    Unavailable,
}

/// One named retrieval task within a composite query
pub struct Slot {
    pub name: String,
    pub kind: SourceKind,
    pub query: SourceQuery,
    pub primary: Arc<dyn SourceFetcher>,
    pub fallback: Option<Arc<dyn SourceFetcher>>,
}

impl Slot {
    /// Slot named after its kind, without fallback
    pub fn new(kind: SourceKind, query: SourceQuery, primary: Arc<dyn SourceFetcher>) -> Self {
        Self {
            name: kind.slot_name().to_string(),
            kind,
            query,
            primary,
            fallback: None,
        }
    }

    #[must_use]
    pub fn with_fallback(mut self, fallback: Option<Arc<dyn SourceFetcher>>) -> Self {
        self.fallback = fallback;
        self
    }

    #[must_use]
    pub fn named<S: Into<String>>(mut self, name: S) -> Self {
        self.name = name.into();
        self
    }
}

/// Result of one slot
#[derive(Debug, Clone, PartialEq)]
pub struct SlotOutcome {
    pub status: SlotStatus,
    /// `Value::Null` when unavailable
    pub value: RawPayload,
    /// Primary failure reason, kept for degraded and unavailable slots
    pub failure: Option<FailureReason>,
}

impl SlotOutcome {
    fn unavailable(failure: FailureReason) -> Self {
        Self {
            status: SlotStatus::Unavailable,
            value: Value::Null,
            failure: Some(failure),
        }
    }

    #[must_use]
    pub fn is_available(&self) -> bool {
        self.status != SlotStatus::Unavailable
    }

    /// The value when the slot produced one
    #[must_use]
    pub fn available_value(&self) -> Option<&RawPayload> {
        self.is_available().then_some(&self.value)
    }
}

/// Best-effort composite result keyed by slot name
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompositeResult {
    slots: HashMap<String, SlotOutcome>,
}

impl CompositeResult {
    #[must_use]
    pub fn get(&self, slot: &str) -> Option<&SlotOutcome> {
        self.slots.get(slot)
    }

    #[must_use]
    pub fn status(&self, slot: &str) -> SlotStatus {
        self.get(slot)
            .map_or(SlotStatus::Unavailable, |outcome| outcome.status)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &SlotOutcome)> {
        self.slots.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Source failures contained by the coordinator, for reporting
    #[must_use]
    pub fn failures(&self) -> Vec<DssError> {
        let mut failures: Vec<DssError> = self
            .slots
            .iter()
            .filter_map(|(name, outcome)| {
                outcome
                    .failure
                    .clone()
                    .map(|reason| DssError::source_failure(name.clone(), reason))
            })
            .collect();
        failures.sort_by_key(|e| e.to_string());
        failures
    }
}

/// Runs slots concurrently with per-slot fallback
#[derive(Debug, Default, Clone, Copy)]
pub struct DegradationCoordinator;

impl DegradationCoordinator {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Run every slot concurrently and collect one outcome per slot.
    ///
    /// Completes once every underlying fetch has resolved; time-outs are the
    /// transport's job and surface as ordinary failures.
    #[instrument(name = "coordinate_slots", skip_all, fields(slots = slots.len()))]
    pub async fn run(&self, slots: Vec<Slot>) -> CompositeResult {
        let futures = slots.into_iter().map(|slot| async move {
            let outcome = Self::run_slot(&slot).await;
            (slot.name, outcome)
        });

        let slots = join_all(futures).await.into_iter().collect();
        CompositeResult { slots }
    }

    /// Fetch from `fetcher`, rejecting payloads of the wrong shape
    async fn fetch_checked(slot: &Slot, fetcher: &dyn SourceFetcher) -> SourceResult<RawPayload> {
        match fetcher.fetch(slot.kind, &slot.query).await {
            SourceResult::Ok(value) => match slot.kind.validate(&value) {
                Ok(()) => SourceResult::Ok(value),
                Err(reason) => {
                    warn!(
                        slot = %slot.name,
                        source = fetcher.name(),
                        "Rejected payload of unexpected shape"
                    );
                    SourceResult::Failed(reason)
                }
            },
            failed => failed,
        }
    }

    async fn run_slot(slot: &Slot) -> SlotOutcome {
        let primary_failure = match Self::fetch_checked(slot, slot.primary.as_ref()).await {
            SourceResult::Ok(value) => {
                debug!(slot = %slot.name, source = slot.primary.name(), "Slot answered by primary");
                return SlotOutcome {
                    status: SlotStatus::Ok,
                    value,
                    failure: None,
                };
            }
            SourceResult::Failed(reason) => reason,
        };

        let Some(fallback) = &slot.fallback else {
            warn!(
                slot = %slot.name,
                reason = %primary_failure,
                "Slot unavailable, no fallback registered"
            );
            return SlotOutcome::unavailable(primary_failure);
        };

        match Self::fetch_checked(slot, fallback.as_ref()).await {
            SourceResult::Ok(value) => {
                warn!(
                    slot = %slot.name,
                    reason = %primary_failure,
                    fallback = fallback.name(),
                    "Slot degraded to fallback source"
                );
                SlotOutcome {
                    status: SlotStatus::Degraded,
                    value,
                    failure: Some(primary_failure),
                }
            }
            SourceResult::Failed(fallback_failure) => {
                warn!(
                    slot = %slot.name,
                    reason = %primary_failure,
                    fallback_reason = %fallback_failure,
                    "Slot unavailable, fallback failed too"
                );
                SlotOutcome::unavailable(primary_failure)
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod mock {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Fetcher answering from a fixed per-kind table
    pub struct MockFetcher {
        pub name: &'static str,
        pub responses: HashMap<SourceKind, SourceResult<RawPayload>>,
        pub calls: AtomicUsize,
    }

    impl MockFetcher {
        pub fn new(name: &'static str) -> Self {
            Self {
                name,
                responses: HashMap::new(),
                calls: AtomicUsize::new(0),
            }
        }

        pub fn answering(mut self, kind: SourceKind, value: RawPayload) -> Self {
            self.responses.insert(kind, SourceResult::Ok(value));
            self
        }

        pub fn failing(mut self, kind: SourceKind, reason: FailureReason) -> Self {
            self.responses.insert(kind, SourceResult::Failed(reason));
            self
        }

        pub fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl SourceFetcher for MockFetcher {
        fn name(&self) -> &str {
            self.name
        }

        async fn fetch(&self, kind: SourceKind, _query: &SourceQuery) -> SourceResult<RawPayload> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.responses
                .get(&kind)
                .cloned()
                .unwrap_or(SourceResult::Failed(FailureReason::NotFound))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::mock::MockFetcher;
    use super::*;
    use async_trait::async_trait;
    use serde_json::json;
    use std::time::Duration;
    use tokio::sync::Barrier;

    fn point_query() -> SourceQuery {
        SourceQuery::Point(crate::models::Coordinate::new(2.05, 45.34).unwrap())
    }

    #[tokio::test]
    async fn test_all_slots_ok() {
        let primary = Arc::new(
            MockFetcher::new("primary")
                .answering(SourceKind::PixelMetrics, json!({"solar_mean_score": 7.0}))
                .answering(SourceKind::RegionMetrics, json!({"state_name": "Banadir"})),
        );
        let result = DegradationCoordinator::new()
            .run(vec![
                Slot::new(SourceKind::PixelMetrics, point_query(), primary.clone()),
                Slot::new(SourceKind::RegionMetrics, point_query(), primary.clone()),
            ])
            .await;

        assert_eq!(result.len(), 2);
        assert_eq!(result.status("pixel-metrics"), SlotStatus::Ok);
        assert_eq!(result.status("region-metrics"), SlotStatus::Ok);
        assert!(result.failures().is_empty());
    }

    #[tokio::test]
    async fn test_failed_slot_with_fallback_is_degraded() {
        let primary = Arc::new(
            MockFetcher::new("primary")
                .failing(SourceKind::PlaceGeometry, FailureReason::Timeout)
                .answering(SourceKind::BoundaryGeometry, json!({"features": []})),
        );
        let fallback = Arc::new(
            MockFetcher::new("bundled")
                .answering(SourceKind::PlaceGeometry, json!({"features": [{"properties": {"name": "Garowe"}}]})),
        );

        let result = DegradationCoordinator::new()
            .run(vec![
                Slot::new(SourceKind::PlaceGeometry, SourceQuery::Collection, primary.clone())
                    .with_fallback(Some(fallback.clone())),
                Slot::new(SourceKind::BoundaryGeometry, SourceQuery::Collection, primary.clone()),
            ])
            .await;

        let places = result.get("point-of-interest-geometry").unwrap();
        assert_eq!(places.status, SlotStatus::Degraded);
        assert_eq!(places.value["features"][0]["properties"]["name"], "Garowe");
        assert_eq!(places.failure, Some(FailureReason::Timeout));
        assert_eq!(result.status("boundary-geometry"), SlotStatus::Ok);
        assert_eq!(fallback.call_count(), 1);
    }

    #[tokio::test]
    async fn test_failed_slot_without_fallback_is_isolated() {
        let primary = Arc::new(
            MockFetcher::new("primary")
                .failing(SourceKind::PixelMetrics, FailureReason::Status(500))
                .answering(SourceKind::RegionMetrics, json!({"state_name": "Puntland"})),
        );

        let result = DegradationCoordinator::new()
            .run(vec![
                Slot::new(SourceKind::PixelMetrics, point_query(), primary.clone()),
                Slot::new(SourceKind::RegionMetrics, point_query(), primary.clone()),
            ])
            .await;

        let pixel = result.get("pixel-metrics").unwrap();
        assert_eq!(pixel.status, SlotStatus::Unavailable);
        assert_eq!(pixel.value, Value::Null);
        assert!(pixel.available_value().is_none());

        let region = result.get("region-metrics").unwrap();
        assert_eq!(region.status, SlotStatus::Ok);
        assert_eq!(region.value["state_name"], "Puntland");

        let failures = result.failures();
        assert_eq!(failures.len(), 1);
        assert!(failures[0].to_string().contains("status_500"));
    }

    #[tokio::test]
    async fn test_every_slot_failing_still_completes() {
        let primary = Arc::new(MockFetcher::new("down"));
        let fallback = Arc::new(MockFetcher::new("also-down"));

        let result = DegradationCoordinator::new()
            .run(vec![
                Slot::new(SourceKind::PixelMetrics, point_query(), primary.clone())
                    .with_fallback(Some(fallback.clone())),
                Slot::new(SourceKind::RegionMetrics, point_query(), primary.clone()),
            ])
            .await;

        assert_eq!(result.len(), 2);
        for (_, outcome) in result.iter() {
            assert_eq!(outcome.status, SlotStatus::Unavailable);
            assert_eq!(outcome.failure, Some(FailureReason::NotFound));
        }
        assert_eq!(fallback.call_count(), 1);
    }

    #[tokio::test]
    async fn test_fallback_not_called_when_primary_succeeds() {
        let primary = Arc::new(
            MockFetcher::new("primary").answering(SourceKind::PlaceGeometry, json!({"features": []})),
        );
        let fallback = Arc::new(MockFetcher::new("bundled"));

        let result = DegradationCoordinator::new()
            .run(vec![
                Slot::new(SourceKind::PlaceGeometry, SourceQuery::Collection, primary.clone())
                    .with_fallback(Some(fallback.clone()))
                    .named("towns"),
            ])
            .await;

        assert_eq!(result.status("towns"), SlotStatus::Ok);
        assert_eq!(fallback.call_count(), 0);
    }

    #[tokio::test]
    async fn test_empty_slot_list() {
        let result = DegradationCoordinator::new().run(Vec::new()).await;
        assert!(result.is_empty());
        assert_eq!(result.status("anything"), SlotStatus::Unavailable);
    }

    #[tokio::test]
    async fn test_malformed_primary_payload_uses_fallback() {
        let primary = Arc::new(MockFetcher::new("primary").answering(
            SourceKind::PlaceGeometry,
            json!({"detail": "Internal database error."}),
        ));
        let fallback = Arc::new(
            MockFetcher::new("bundled").answering(SourceKind::PlaceGeometry, json!({"features": []})),
        );

        let result = DegradationCoordinator::new()
            .run(vec![
                Slot::new(SourceKind::PlaceGeometry, SourceQuery::Collection, primary.clone())
                    .with_fallback(Some(fallback.clone())),
            ])
            .await;

        let places = result.get("point-of-interest-geometry").unwrap();
        assert_eq!(places.status, SlotStatus::Degraded);
        assert_eq!(places.failure, Some(FailureReason::MalformedPayload));
        assert_eq!(places.value, json!({"features": []}));
    }

    #[tokio::test]
    async fn test_malformed_payload_without_fallback_is_unavailable() {
        let primary = Arc::new(
            MockFetcher::new("primary").answering(SourceKind::PixelMetrics, json!("no raster")),
        );

        let result = DegradationCoordinator::new()
            .run(vec![Slot::new(SourceKind::PixelMetrics, point_query(), primary)])
            .await;

        let pixel = result.get("pixel-metrics").unwrap();
        assert_eq!(pixel.status, SlotStatus::Unavailable);
        assert_eq!(pixel.value, Value::Null);
        assert_eq!(pixel.failure, Some(FailureReason::MalformedPayload));
    }

    /// Every fetch waits until all slots have entered
    struct BarrierFetcher {
        barrier: Barrier,
    }

    #[async_trait]
    impl SourceFetcher for BarrierFetcher {
        fn name(&self) -> &str {
            "barrier"
        }

        async fn fetch(&self, kind: SourceKind, _query: &SourceQuery) -> SourceResult<RawPayload> {
            self.barrier.wait().await;
            match kind {
                SourceKind::PixelMetrics => SourceResult::Ok(json!({"solar_mean_score": 5.0})),
                _ => SourceResult::Ok(json!({"state_name": "Hirshabelle"})),
            }
        }
    }

    #[tokio::test]
    async fn test_slot_primaries_run_concurrently() {
        let primary = Arc::new(BarrierFetcher {
            barrier: Barrier::new(2),
        });

        // Sequential slots would never get past the barrier
        let result = tokio::time::timeout(
            Duration::from_secs(2),
            DegradationCoordinator::new().run(vec![
                Slot::new(SourceKind::PixelMetrics, point_query(), primary.clone()),
                Slot::new(SourceKind::RegionMetrics, point_query(), primary.clone()),
            ]),
        )
        .await
        .expect("slots did not run concurrently");

        assert_eq!(result.status("pixel-metrics"), SlotStatus::Ok);
        assert_eq!(result.status("region-metrics"), SlotStatus::Ok);
    }
}
