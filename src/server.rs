//! HTTP surface: health, session state, metrics, token metadata and user actions

use std::net::SocketAddr;
use std::str::FromStr;
use std::sync::Arc;

use alloy::primitives::U256;
use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use eyre::eyre;
use prometheus::{Encoder, TextEncoder};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::client::{SaleClient, SaleSnapshot};
use crate::error::SaleError;
use crate::metadata::{MetadataTemplate, TokenMetadata};
use crate::state::UiState;
use crate::types::{mint_price, TxKind};

#[derive(Clone)]
pub struct AppState {
    pub client: Arc<SaleClient>,
    pub metadata: Arc<MetadataTemplate>,
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub wallet_connected: bool,
    pub account: Option<String>,
    pub ui_state: UiState,
}

#[derive(Debug, Default, Deserialize)]
pub struct MintRequest {
    /// Payment in wei as a decimal string. Defaults to the mint price.
    pub value_wei: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ActionResponse {
    pub kind: &'static str,
    pub tx_hash: String,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub kind: &'static str,
}

/// Failure surfaced at the UI boundary
pub enum ApiError {
    Sale(SaleError),
    /// The request itself was malformed; nothing reached the wallet or chain
    BadRequest(String),
    /// The action task died before producing a result
    Internal(String),
}

impl From<SaleError> for ApiError {
    fn from(err: SaleError) -> Self {
        Self::Sale(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error, kind) = match self {
            ApiError::Sale(err) => {
                let status = match &err {
                    SaleError::TransactionPending => StatusCode::CONFLICT,
                    SaleError::NetworkMismatch { .. } => StatusCode::BAD_REQUEST,
                    SaleError::ProviderUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
                    SaleError::ReadFailure(_) | SaleError::SubmissionFailure(_) => {
                        StatusCode::BAD_GATEWAY
                    }
                    SaleError::RevertedFailure(_) => StatusCode::UNPROCESSABLE_ENTITY,
                };
                (status, err.to_string(), err.kind())
            }
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg, "bad_request"),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg, "internal"),
        };
        (status, Json(ErrorResponse { error, kind })).into_response()
    }
}

async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let snapshot = state.client.snapshot().await;
    Json(HealthResponse {
        status: "healthy".to_string(),
        wallet_connected: snapshot.wallet_connected,
        account: snapshot.account,
        ui_state: snapshot.ui_state,
    })
}

async fn sale_state(State(state): State<AppState>) -> Json<SaleSnapshot> {
    Json(state.client.snapshot().await)
}

async fn token_metadata(
    State(state): State<AppState>,
    Path(token_id): Path<String>,
) -> Json<TokenMetadata> {
    Json(state.metadata.for_token(&token_id))
}

async fn prometheus_metrics(State(state): State<AppState>) -> Response {
    let encoder = TextEncoder::new();
    let metric_families = state.client.metrics().registry.gather();
    let mut buffer = Vec::new();

    if encoder.encode(&metric_families, &mut buffer).is_err() {
        return (StatusCode::INTERNAL_SERVER_ERROR, "Failed to encode metrics").into_response();
    }

    match Response::builder()
        .header(header::CONTENT_TYPE, encoder.format_type())
        .body(axum::body::Body::from(buffer))
    {
        Ok(resp) => resp,
        Err(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to build metrics response",
        )
            .into_response(),
    }
}

async fn connect_wallet(State(state): State<AppState>) -> Result<Json<HealthResponse>, ApiError> {
    state.client.connect().await?;
    Ok(health_check(State(state)).await)
}

async fn disconnect_wallet(State(state): State<AppState>) -> Json<HealthResponse> {
    state.client.disconnect().await;
    health_check(State(state)).await
}

fn parse_payment(body: &Bytes) -> Result<U256, ApiError> {
    if body.is_empty() {
        return Ok(mint_price());
    }

    let request: MintRequest = serde_json::from_slice(body)
        .map_err(|e| ApiError::BadRequest(format!("invalid request body: {}", e)))?;

    match request.value_wei {
        Some(value) => U256::from_str(value.trim())
            .map_err(|e| ApiError::BadRequest(format!("invalid value_wei: {}", e))),
        None => Ok(mint_price()),
    }
}

/// Run the action on its own task so a dropped request cannot leave the
/// session stuck in `loading`.
async fn run_action(
    state: AppState,
    kind: TxKind,
    value: U256,
) -> Result<Json<ActionResponse>, ApiError> {
    let client = state.client.clone();
    let outcome = tokio::spawn(async move { client.execute_with_value(kind, value).await })
        .await
        .map_err(|e| ApiError::Internal(format!("action task failed: {}", e)))?;

    let outcome = outcome.map_err(|e| {
        warn!(kind = %kind, error = %e, "Action failed");
        ApiError::Sale(e)
    })?;

    let message = match kind {
        TxKind::StartPresale => "Presale started".to_string(),
        TxKind::PresaleMint | TxKind::PublicMint => format!(
            "Successfully minted a {} NFT to your wallet",
            state.metadata.collection_name
        ),
    };

    Ok(Json(ActionResponse {
        kind: kind.as_str(),
        tx_hash: outcome.tx.hash_hex(),
        message,
    }))
}

async fn start_presale(State(state): State<AppState>) -> Result<Json<ActionResponse>, ApiError> {
    run_action(state, TxKind::StartPresale, U256::ZERO).await
}

async fn presale_mint(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<ActionResponse>, ApiError> {
    let value = parse_payment(&body)?;
    run_action(state, TxKind::PresaleMint, value).await
}

async fn public_mint(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<ActionResponse>, ApiError> {
    let value = parse_payment(&body)?;
    run_action(state, TxKind::PublicMint, value).await
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/state", get(sale_state))
        .route("/metrics", get(prometheus_metrics))
        .route("/api/{token_id}", get(token_metadata))
        .route("/connect", post(connect_wallet))
        .route("/disconnect", post(disconnect_wallet))
        .route("/actions/start-presale", post(start_presale))
        .route("/actions/presale-mint", post(presale_mint))
        .route("/actions/mint", post(public_mint))
        .with_state(state)
}

/// Start the HTTP server
pub async fn start_server(bind_address: &str, port: u16, state: AppState) -> eyre::Result<()> {
    let app = router(state);

    let addr: SocketAddr = format!("{}:{}", bind_address, port)
        .parse()
        .map_err(|e| eyre!("Invalid bind address {}:{}: {}", bind_address, port, e))?;
    info!("HTTP server listening on {}", addr);
    info!("  /state          - Session facts and derived UI state (JSON)");
    info!("  /api/{{token_id}} - Token metadata");
    info!("  /actions/*      - Start presale, presale mint, public mint");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
