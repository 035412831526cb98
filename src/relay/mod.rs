//! Signed-transaction relay
//!
//! Endpoints:
//! - GET /api/config - public dashboard configuration
//! - POST /api/send-signed - `{signed: [base64]}`, forwarded upstream as one body
//! - POST /api/broadcast - same payload, answers `{txid}` or `{detail}`
//! - GET /api/params - suggested transaction parameters
//! - GET /health
//!
//! Anything else falls through to the static dashboard assets when a static
//! directory is configured.
//!
//! SECURITY NOTE:
//! - The node credential is only ever attached to upstream requests
//! - `send-signed` relays upstream status and body verbatim, never rewritten

use crate::config::{ServerConfig, SEND_SIGNED_PATH};
use crate::submit::{NodeClient, TransactionSink, UpstreamResponse};
use crate::Result;
use axum::{
    body::Bytes,
    extract::State,
    http::{header::CONTENT_TYPE, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use base64::{engine::general_purpose::STANDARD as BASE64_STANDARD, Engine};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;

/// Shared relay state
pub struct RelayState {
    config: Arc<ServerConfig>,
    node: NodeClient,
}

impl RelayState {
    pub fn new(config: ServerConfig) -> Self {
        let node = NodeClient::new(Arc::clone(&config.node));
        Self {
            config: Arc::new(config),
            node,
        }
    }
}

type AppState = Arc<RelayState>;

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

#[derive(Serialize)]
struct DetailResponse {
    detail: String,
}

#[derive(Serialize)]
struct BroadcastResponse {
    txid: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SignedPayload {
    signed: Vec<String>,
}

fn detail_response(status: StatusCode, message: impl Into<String>) -> Response {
    (
        status,
        Json(DetailResponse {
            detail: message.into(),
        }),
    )
        .into_response()
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (
        status,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
        .into_response()
}

/// Build the relay router
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let static_dir = state.config.static_dir.clone();

    let router = Router::new()
        .route("/health", get(health))
        .route("/api/config", get(config))
        .route(SEND_SIGNED_PATH, post(send_signed))
        .route("/api/broadcast", post(broadcast))
        .route("/api/params", get(params))
        .layer(cors)
        .with_state(state);

    match static_dir {
        Some(dir) => router.fallback_service(ServeDir::new(dir)),
        None => router,
    }
}

/// Start the relay
pub async fn serve(config: ServerConfig) -> Result<()> {
    let addr = config.bind_address;
    if !config.node.has_token() {
        tracing::warn!("Relay starting without a node credential");
    }
    let app = router(Arc::new(RelayState::new(config)));

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(addr = %addr, "Relay listening");
    axum::serve(listener, app).await?;

    Ok(())
}

async fn health() -> impl IntoResponse {
    "OK"
}

async fn config(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.config.public_config())
}

/// Decode the `signed` list into one concatenated payload
///
/// Errors carry the message for a 400 response.
fn decode_signed_list(body: &Value) -> std::result::Result<Vec<u8>, String> {
    let entries = match body.get("signed") {
        Some(Value::Array(entries)) if !entries.is_empty() => entries,
        _ => return Err("no signed txns".to_string()),
    };

    let mut payload = Vec::new();
    for (i, entry) in entries.iter().enumerate() {
        let encoded = entry
            .as_str()
            .ok_or_else(|| format!("signed[{}] is not a string", i))?;
        let bytes = BASE64_STANDARD
            .decode(encoded)
            .map_err(|e| format!("signed[{}] is not valid base64: {}", i, e))?;
        payload.extend(bytes);
    }
    Ok(payload)
}

fn relay_upstream(upstream: UpstreamResponse) -> Response {
    let status = StatusCode::from_u16(upstream.status).unwrap_or(StatusCode::BAD_GATEWAY);
    let content_type = upstream
        .content_type
        .and_then(|ct| HeaderValue::from_str(&ct).ok());

    let mut response = (status, upstream.body).into_response();
    match content_type {
        Some(ct) => {
            response.headers_mut().insert(CONTENT_TYPE, ct);
        }
        None => {
            response.headers_mut().remove(CONTENT_TYPE);
        }
    }
    response
}

async fn send_signed(State(state): State<AppState>, body: Bytes) -> Response {
    let body: Value = match serde_json::from_slice(&body) {
        Ok(body) => body,
        Err(e) => {
            tracing::warn!(error = %e, "Malformed send-signed body");
            return error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string());
        }
    };

    let payload = match decode_signed_list(&body) {
        Ok(payload) => payload,
        Err(message) => return error_response(StatusCode::BAD_REQUEST, message),
    };

    match state.node.forward(payload).await {
        Ok(upstream) => {
            if !upstream.is_success() {
                tracing::warn!(status = upstream.status, "Node rejected relayed submission");
            }
            relay_upstream(upstream)
        }
        Err(e) => error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    }
}

/// Submit signed blobs as one body and answer with the node's txid
///
/// Unlike `send-signed`, upstream failures are not relayed verbatim: any
/// failure after validation is a 500 with the error text.
async fn broadcast(State(state): State<AppState>, Json(payload): Json<SignedPayload>) -> Response {
    if payload.signed.is_empty() {
        return detail_response(
            StatusCode::BAD_REQUEST,
            "Provide at least one signed transaction blob",
        );
    }

    let mut body = Vec::new();
    for encoded in &payload.signed {
        match BASE64_STANDARD.decode(encoded) {
            Ok(bytes) => body.extend(bytes),
            Err(e) => return detail_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
        }
    }

    match state.node.send_raw(body).await {
        Ok(receipt) => Json(BroadcastResponse {
            txid: receipt.tx_id,
        })
        .into_response(),
        Err(e) => {
            tracing::warn!(error = %e, "Broadcast failed");
            detail_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
    }
}

async fn params(State(state): State<AppState>) -> Response {
    match state.node.params().await {
        Ok(upstream) => relay_upstream(upstream),
        Err(e) => {
            tracing::error!(error = %e, "Failed to fetch suggested params");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
    }
}
