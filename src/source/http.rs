use reqwest::{Client, StatusCode};
use async_trait::async_trait;
use std::time::{Duration, Instant};
use tracing::{debug, info, instrument, warn};

use super::{FailureReason, RawPayload, SourceFetcher, SourceKind, SourceQuery, SourceResult};
use crate::DssError;
use crate::config::BackendConfig;

/// Geodata backend client
///
/// Every call is a single idempotent GET; no retries are attempted here.
pub struct BackendClient {
    client: Client,
    name: String,
    base_url: String,
}

impl BackendClient {
    /// Create a client for the primary backend
    pub fn new(config: &BackendConfig) -> crate::Result<Self> {
        Self::with_timeout(
            "backend",
            &config.base_url,
            Duration::from_secs(config.timeout_seconds.into()),
        )
    }

    /// Create a client with an explicit name, URL and request timeout
    pub fn with_timeout(name: &str, base_url: &str, timeout: Duration) -> crate::Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("EnergyDSS/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| DssError::config(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            name: name.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// URL serving `kind` for `query`, or `None` when the kind does not
    /// accept that query shape
    fn endpoint(&self, kind: SourceKind, query: &SourceQuery) -> Option<String> {
        let base = &self.base_url;
        let url = match (kind, query) {
            (SourceKind::PixelMetrics, SourceQuery::Point(point)) => format!(
                "{base}/api/report/pixel?lon={}&lat={}",
                point.longitude(),
                point.latitude()
            ),
            (SourceKind::RegionMetrics, SourceQuery::Point(point)) => format!(
                "{base}/state_metrics?lat={}&lon={}",
                point.latitude(),
                point.longitude()
            ),
            (SourceKind::RegionMetrics, SourceQuery::Region(name)) => {
                format!("{base}/state_metrics?state={}", urlencoding::encode(name.trim()))
            }
            (SourceKind::BoundaryGeometry, SourceQuery::Collection) => format!("{base}/states"),
            (SourceKind::PlaceGeometry, SourceQuery::Collection) => format!("{base}/api/towns"),
            _ => return None,
        };
        Some(url)
    }

    async fn get_json(&self, url: &str) -> Result<RawPayload, FailureReason> {
        let start_time = Instant::now();

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| classify_transport_error(&e))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(FailureReason::NotFound);
        }
        if !status.is_success() {
            return Err(FailureReason::Status(status.as_u16()));
        }

        let payload: RawPayload = response
            .json()
            .await
            .map_err(|e| classify_transport_error(&e))?;

        let total_duration = start_time.elapsed();
        if total_duration.as_secs() > 5 {
            warn!(
                "Slow backend response detected: {:.3}s",
                total_duration.as_secs_f64()
            );
        }
        Ok(payload)
    }

    /// Probe the backend `/health` endpoint
    pub async fn health_check(&self) -> SourceResult<RawPayload> {
        let url = format!("{}/health", self.base_url);
        self.get_json(&url).await.into()
    }
}

fn classify_transport_error(error: &reqwest::Error) -> FailureReason {
    if error.is_timeout() {
        FailureReason::Timeout
    } else if error.is_decode() {
        FailureReason::MalformedPayload
    } else {
        FailureReason::Transport
    }
}

#[async_trait]
impl SourceFetcher for BackendClient {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(name = "backend_fetch", skip(self), fields(source = %self.name))]
    async fn fetch(&self, kind: SourceKind, query: &SourceQuery) -> SourceResult<RawPayload> {
        let Some(url) = self.endpoint(kind, query) else {
            warn!("Query {:?} is not valid for {}", query, kind);
            return SourceResult::Failed(FailureReason::MalformedPayload);
        };

        debug!("Backend request URL: {}", url);
        let start_time = Instant::now();

        let result = self
            .get_json(&url)
            .await
            .and_then(|payload| kind.validate(&payload).map(|()| payload));
        match result {
            Ok(payload) => {
                info!(
                    "Fetched {} in {:.3}s",
                    kind,
                    start_time.elapsed().as_secs_f64()
                );
                SourceResult::Ok(payload)
            }
            Err(reason) => {
                warn!("Fetching {} failed: {}", kind, reason);
                SourceResult::Failed(reason)
            }
        }
    }
}
