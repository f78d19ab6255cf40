//! HTTP API for submissions and status queries

use crate::config::ApiConfig;
use crate::error::{CourierError, CourierResult};
use crate::rpc::NodeClient;
use crate::tx::{Courier, Outcome, TxRequest};

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use ethers::types::{H256, U256};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub courier: Arc<Courier>,
    pub node: Arc<NodeClient>,
}

/// Run the HTTP API server
pub async fn run_server(
    config: ApiConfig,
    courier: Arc<Courier>,
    node: Arc<NodeClient>,
) -> CourierResult<()> {
    let state = AppState { courier, node };

    let app = Router::new()
        .route("/health", get(health_check))
        .route("/ready", get(readiness_check))
        .route("/status/:hash", get(transaction_status))
        .route("/transactions", post(submit_transaction))
        .with_state(state);

    let addr = format!("{}:{}", config.host, config.port);
    info!("Starting API server on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| CourierError::Config(format!("Failed to bind {}: {}", addr, e)))?;
    axum::serve(listener, app)
        .await
        .map_err(|e| CourierError::Rpc(e.to_string()))?;

    Ok(())
}

/// Health check endpoint - basic liveness
async fn health_check() -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Readiness check - verify the node is reachable
async fn readiness_check(State(state): State<AppState>) -> impl IntoResponse {
    let node_ok = state.node.health_check().await;
    let code = if node_ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (code, Json(ReadinessResponse { ready: node_ok }))
}

/// Point-in-time status of a transaction by hash
async fn transaction_status(
    State(state): State<AppState>,
    Path(hash): Path<String>,
) -> Response {
    let tx_hash: H256 = match hash.parse() {
        Ok(hash) => hash,
        Err(_) => {
            return error_response(&CourierError::Encoding(format!(
                "Invalid transaction hash: {}",
                hash
            )))
        }
    };

    match state.courier.status(tx_hash).await {
        Ok(report) => (
            StatusCode::OK,
            Json(StatusResponse {
                tx_hash,
                outcome: report.outcome,
                reason: report.reason,
            }),
        )
            .into_response(),
        Err(e) => error_response(&e),
    }
}

/// Submit a transaction; with `wait` set, block until mined
async fn submit_transaction(
    State(state): State<AppState>,
    Json(body): Json<SubmitRequest>,
) -> Response {
    let request = match build_request(&state, &body) {
        Ok(request) => request,
        Err(e) => return error_response(&e),
    };

    if body.wait {
        match state.courier.submit_and_track(&request).await {
            Ok(receipt) => (
                StatusCode::OK,
                Json(ReceiptResponse {
                    tx_hash: receipt.transaction_hash,
                    status: receipt.status.map(|s| s.as_u64()),
                    gas_used: receipt.gas_used,
                }),
            )
                .into_response(),
            Err(e) => error_response(&e),
        }
    } else {
        match state.courier.submit(&request).await {
            Ok(tx_hash) => (StatusCode::ACCEPTED, Json(SubmitResponse { tx_hash })).into_response(),
            Err(e) => error_response(&e),
        }
    }
}

fn build_request(state: &AppState, body: &SubmitRequest) -> CourierResult<TxRequest> {
    let mut request = TxRequest::from_hex(&body.data, state.courier.sender(), body.to.as_deref())?;
    if let Some(gas_limit) = body.gas_limit {
        request = request.with_gas_limit(U256::from(gas_limit));
    }
    Ok(request)
}

fn error_response(err: &CourierError) -> Response {
    let code = match err {
        CourierError::Encoding(_) | CourierError::InvalidKey(_) => StatusCode::BAD_REQUEST,
        CourierError::Submission(_) | CourierError::NonceConflict { .. } => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
        CourierError::NotPropagated { .. } | CourierError::TrackingTimeout { .. } => {
            StatusCode::GATEWAY_TIMEOUT
        }
        CourierError::Rpc(_) => StatusCode::BAD_GATEWAY,
        CourierError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (
        code,
        Json(ErrorResponse {
            error: err.to_string(),
        }),
    )
        .into_response()
}

// Request/response types

#[derive(Deserialize)]
struct SubmitRequest {
    /// Hex-encoded calldata
    data: String,
    /// Hex-encoded target address, absent for contract creation
    to: Option<String>,
    /// Optional gas limit override
    gas_limit: Option<u64>,
    /// Block until the transaction is mined
    #[serde(default)]
    wait: bool,
}

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

#[derive(Serialize)]
struct ReadinessResponse {
    ready: bool,
}

#[derive(Serialize)]
struct StatusResponse {
    tx_hash: H256,
    outcome: Outcome,
    /// Present only for reverted transactions with a recoverable reason
    #[serde(skip_serializing_if = "Option::is_none")]
    reason: Option<String>,
}

#[derive(Serialize)]
struct SubmitResponse {
    tx_hash: H256,
}

#[derive(Serialize)]
struct ReceiptResponse {
    tx_hash: H256,
    status: Option<u64>,
    gas_used: Option<U256>,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}
