//! REST API Endpoints
//!
//! Health, status, and proof endpoints.

use crate::abi;
use crate::state::{AppState, RequestCounts};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use gindex_proofs::{
    BlockId, ChainConfig, DataSource, PathSpec, ProofArtifact, ProofRequest, ProverError,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tower_http::trace::TraceLayer;

/// Run the API server
pub async fn run_server<S>(listen: String, state: AppState<S>) -> anyhow::Result<()>
where
    S: DataSource + std::fmt::Debug + 'static,
{
    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(&listen).await?;
    tracing::info!(address = %listen, "API server listening");

    axum::serve(listener, app).await?;

    Ok(())
}

/// Create the API router
pub fn create_router<S>(state: AppState<S>) -> Router
where
    S: DataSource + std::fmt::Debug + 'static,
{
    Router::new()
        .route("/health", get(health::<S>))
        .route("/status", get(status::<S>))
        .route("/proofs/{block_id}", get(get_proof::<S>))
        .route("/proofs/{block_id}/calldata", get(get_calldata::<S>))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Errors returned to API clients
#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    BadBlockId(#[from] gindex_proofs::source::InvalidBlockId),

    #[error(transparent)]
    Prover(#[from] ProverError),
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::BadBlockId(_) | Self::Prover(ProverError::Path(_)) => StatusCode::BAD_REQUEST,
            Self::Prover(err) if err.is_not_found() => StatusCode::NOT_FOUND,
            Self::Prover(ProverError::SourceUnavailable(_)) => StatusCode::BAD_GATEWAY,
            Self::Prover(ProverError::NoDescendantBlock { .. }) => StatusCode::NOT_FOUND,
            Self::Prover(
                ProverError::AmbiguousDescendant { .. } | ProverError::InconsistentSnapshot { .. },
            ) => StatusCode::CONFLICT,
            Self::Prover(ProverError::TimestampOverflow { .. } | ProverError::Proof(_)) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: self.to_string(),
        };
        (self.status_code(), Json(body)).into_response()
    }
}

/// Health check response
#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    head_slot: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

/// Health check endpoint: healthy while the beacon node answers.
///
/// The outcome is reported only in the response; `last_error` tracks proof
/// requests.
async fn health<S: DataSource>(State(state): State<AppState<S>>) -> (StatusCode, Json<HealthResponse>) {
    match state.prover().source().block_header(&BlockId::Head).await {
        Ok(head) => (
            StatusCode::OK,
            Json(HealthResponse {
                status: "healthy",
                head_slot: Some(head.header.slot),
                error: None,
            }),
        ),
        Err(err) => {
            tracing::warn!(error = %err, "Beacon node health check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(HealthResponse {
                    status: "degraded",
                    head_slot: None,
                    error: Some(err.to_string()),
                }),
            )
        }
    }
}

/// Status response
#[derive(Debug, Serialize)]
struct StatusResponse {
    chain: ChainConfig,
    uptime_secs: u64,
    proofs: RequestCounts,
    last_error: Option<String>,
}

/// Status endpoint
async fn status<S: DataSource>(State(state): State<AppState<S>>) -> Json<StatusResponse> {
    Json(StatusResponse {
        chain: *state.prover().config(),
        uptime_secs: state.uptime_secs(),
        proofs: state.counts(),
        last_error: state.last_error(),
    })
}

#[derive(Debug, Deserialize)]
struct ProofQuery {
    path: PathSpec,
}

async fn prove<S: DataSource>(
    state: &AppState<S>,
    block_id: &str,
    path: PathSpec,
) -> Result<ProofArtifact, ApiError> {
    let request = ProofRequest {
        block_id: block_id.parse()?,
        path,
    };
    Ok(state.prove(&request).await?)
}

/// Proof of `path` in block `block_id`
async fn get_proof<S: DataSource>(
    State(state): State<AppState<S>>,
    Path(block_id): Path<String>,
    Query(query): Query<ProofQuery>,
) -> Result<Json<ProofArtifact>, ApiError> {
    prove(&state, &block_id, query.path).await.map(Json)
}

/// The same proof, ABI-encoded for the on-chain verifier
async fn get_calldata<S: DataSource>(
    State(state): State<AppState<S>>,
    Path(block_id): Path<String>,
    Query(query): Query<ProofQuery>,
) -> Result<Json<abi::Calldata>, ApiError> {
    let artifact = prove(&state, &block_id, query.path).await?;
    Ok(Json(abi::Calldata::from_artifact(&artifact)))
}
