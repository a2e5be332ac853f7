use std::sync::Arc;

use axum::{
    Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::warn;

use crate::{
    DssError, VERSION,
    classification::{Advisory, SiteAssessment, advise},
    models::{Coordinate, RegionRecord, SiteRecord},
    orchestrator::{AnalysisRecord, Delivery, SpatialAnalyzer},
    wizard::{Domain, Recommendation, WizardSession, WizardState},
};

/// Shared handler state
///
/// Every client talks to the same analyzer, i.e. one field session: a newer
/// analysis from any client supersedes older in-flight ones (409).
#[derive(Clone)]
pub struct ApiState {
    pub analyzer: Arc<SpatialAnalyzer>,
}

#[derive(Serialize, Deserialize)]
pub struct ApiSite {
    pub record: SiteRecord,
    pub assessment: SiteAssessment,
}

#[derive(Serialize, Deserialize)]
pub struct ApiRegion {
    pub record: RegionRecord,
    pub assessment: SiteAssessment,
}

#[derive(Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ApiSearchResult {
    Site(ApiSite),
    Region(ApiRegion),
}

#[derive(Serialize, Deserialize)]
pub struct ApiWizard {
    pub domain: Domain,
    pub state: WizardState,
    pub answers: Vec<String>,
    pub options: Vec<String>,
    pub recommendation: Option<Recommendation>,
}

impl ApiWizard {
    fn new(domain: Domain, session: &WizardSession) -> Self {
        Self {
            domain,
            state: session.state(),
            answers: session.answers().to_vec(),
            options: session.options().into_iter().map(str::to_string).collect(),
            recommendation: session.recommendation().cloned(),
        }
    }
}

#[derive(Deserialize)]
pub struct PointParams {
    pub lat: f64,
    pub lon: f64,
}

#[derive(Deserialize)]
pub struct NameParams {
    pub name: String,
}

#[derive(Deserialize)]
pub struct ClassifyParams {
    pub score: f64,
    pub slope: Option<f64>,
}

#[derive(Deserialize)]
pub struct OptionsParams {
    /// Prior answers separated by `|`
    #[serde(default)]
    pub answers: String,
}

#[derive(Deserialize)]
pub struct ReplayRequest {
    pub domain: String,
    #[serde(default)]
    pub answers: Vec<String>,
}

/// Error response carrying a status code and a user-facing message
pub enum ApiError {
    Dss(DssError),
    Superseded(u64),
}

impl From<DssError> for ApiError {
    fn from(error: DssError) -> Self {
        ApiError::Dss(error)
    }
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::Superseded(_) => StatusCode::CONFLICT,
            ApiError::Dss(error) => match error {
                DssError::NoCoverage { .. } => StatusCode::UNPROCESSABLE_ENTITY,
                DssError::RegionNotFound { .. } | DssError::PlaceNotFound { .. } => {
                    StatusCode::NOT_FOUND
                }
                DssError::Validation { .. } | DssError::InvalidWizardTransition { .. } => {
                    StatusCode::BAD_REQUEST
                }
                DssError::LocationUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
                DssError::SourceFailure { .. } => StatusCode::BAD_GATEWAY,
                DssError::Config { .. } | DssError::Io { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match &self {
            ApiError::Superseded(sequence) => json!({
                "error": format!("Analysis #{sequence} was superseded by a newer request"),
            }),
            ApiError::Dss(error) => {
                if status.is_server_error() {
                    warn!("Request failed: {}", error);
                }
                json!({ "error": error.user_message(), "detail": error.to_string() })
            }
        };
        (status, Json(body)).into_response()
    }
}

fn current<T>(delivery: Delivery<T>) -> Result<T, ApiError> {
    match delivery {
        Delivery::Current(record) => Ok(record),
        Delivery::Superseded { sequence } => Err(ApiError::Superseded(sequence)),
    }
}

fn assess_site(analyzer: &SpatialAnalyzer, record: SiteRecord) -> ApiSite {
    let assessment = SiteAssessment::of(&record, analyzer.settings().slope_limit_deg);
    ApiSite { record, assessment }
}

fn assess_region(record: RegionRecord) -> ApiRegion {
    let assessment = SiteAssessment::of_region(&record);
    ApiRegion { record, assessment }
}

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/analyze/point", get(analyze_point))
        .route("/analyze/region", get(analyze_region))
        .route("/search", get(search))
        .route("/classify", get(classify))
        .route("/wizard/{domain}/options", get(wizard_options))
        .route("/wizard/replay", post(wizard_replay))
        .with_state(state)
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok", "version": VERSION }))
}

async fn analyze_point(
    State(state): State<ApiState>,
    Query(params): Query<PointParams>,
) -> Result<Json<ApiSite>, ApiError> {
    let coordinate = Coordinate::new(params.lat, params.lon)?;
    let record = current(state.analyzer.analyze_point(coordinate, None).await?)?;
    Ok(Json(assess_site(&state.analyzer, record)))
}

async fn analyze_region(
    State(state): State<ApiState>,
    Query(params): Query<NameParams>,
) -> Result<Json<ApiRegion>, ApiError> {
    let record = current(state.analyzer.analyze_region(&params.name).await?)?;
    Ok(Json(assess_region(record)))
}

async fn search(
    State(state): State<ApiState>,
    Query(params): Query<NameParams>,
) -> Result<Json<ApiSearchResult>, ApiError> {
    let result = match current(state.analyzer.search(&params.name).await?)? {
        AnalysisRecord::Site(record) => ApiSearchResult::Site(assess_site(&state.analyzer, record)),
        AnalysisRecord::Region(record) => ApiSearchResult::Region(assess_region(record)),
    };
    Ok(Json(result))
}

async fn classify(
    State(state): State<ApiState>,
    Query(params): Query<ClassifyParams>,
) -> Json<Advisory> {
    Json(advise(
        params.score,
        params.slope,
        state.analyzer.settings().slope_limit_deg,
    ))
}

async fn wizard_options(
    Path(domain): Path<String>,
    Query(params): Query<OptionsParams>,
) -> Result<Json<ApiWizard>, ApiError> {
    let domain: Domain = domain.parse()?;
    let answers: Vec<&str> = params
        .answers
        .split('|')
        .map(str::trim)
        .filter(|answer| !answer.is_empty())
        .collect();
    let session = WizardSession::replay(domain, &answers)?;
    Ok(Json(ApiWizard::new(domain, &session)))
}

async fn wizard_replay(Json(request): Json<ReplayRequest>) -> Result<Json<ApiWizard>, ApiError> {
    let domain: Domain = request.domain.parse()?;
    let session = WizardSession::replay(domain, &request.answers)?;
    Ok(Json(ApiWizard::new(domain, &session)))
}
