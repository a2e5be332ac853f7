//! Static suppliers used as one-shot fallbacks

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, warn};

use super::{FailureReason, RawPayload, SourceFetcher, SourceKind, SourceQuery, SourceResult};

const BUNDLED_TOWNS: &str = include_str!("towns.geojson");

/// Serves the same payload for every query of one kind
pub struct StaticSource {
    name: String,
    kind: SourceKind,
    payload: RawPayload,
}

impl StaticSource {
    pub fn new<S: Into<String>>(name: S, kind: SourceKind, payload: RawPayload) -> Self {
        Self {
            name: name.into(),
            kind,
            payload,
        }
    }

    #[must_use]
    pub fn kind(&self) -> SourceKind {
        self.kind
    }
}

#[async_trait]
impl SourceFetcher for StaticSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn fetch(&self, kind: SourceKind, _query: &SourceQuery) -> SourceResult<RawPayload> {
        if kind != self.kind {
            warn!(source = %self.name, %kind, "Bundled source asked for a kind it does not serve");
            return SourceResult::Failed(FailureReason::NotFound);
        }
        if self.payload.is_null() {
            return SourceResult::Failed(FailureReason::NotFound);
        }
        debug!(source = %self.name, %kind, "Serving bundled payload");
        SourceResult::Ok(self.payload.clone())
    }
}

/// The six demand centers shipped with the application
#[must_use]
pub fn bundled_places() -> StaticSource {
    let payload = serde_json::from_str(BUNDLED_TOWNS).unwrap_or_else(|e| {
        warn!("Bundled towns dataset is unreadable: {}", e);
        Value::Null
    });
    StaticSource::new("bundled-towns", SourceKind::PlaceGeometry, payload)
}
