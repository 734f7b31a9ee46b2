//! # HTTP Surface
//!
//! Builds the axum router for the gateway. One listener carries everything:
//! the aggregator webhook, the read-only REST endpoints, the liveness probe,
//! and the metrics scrape.
//!
//! ## Endpoints
//!
//! | Method | Path                          | Description                        |
//! |--------|-------------------------------|------------------------------------|
//! | POST   | `/ussd`                       | Aggregator webhook (form-encoded)  |
//! | GET    | `/health`                     | Liveness probe                     |
//! | GET    | `/accounts/:msisdn`           | Subscriber account (no secrets)    |
//! | GET    | `/accounts/:msisdn/transfers` | Paginated transfer history         |
//! | GET    | `/metrics`                    | Prometheus text exposition         |
//!
//! The webhook speaks the aggregator's dialect: `phoneNumber` and `text`
//! form fields in, a plain-text `CON ...`/`END ...` body out. Everything
//! else is JSON.

use axum::{
    extract::{Path, Query, State},
    http::{Method, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Form, Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use sente_core::account::AccountStore;
use sente_core::dispatcher::Dispatcher;
use sente_core::ledger::TransferStore;

use crate::metrics::SharedMetrics;

/// History page size cap for the REST surface. A phone renders five rows;
/// an operator dashboard gets a hundred.
const MAX_HISTORY_LIMIT: usize = 100;
const DEFAULT_HISTORY_LIMIT: usize = 20;

// ---------------------------------------------------------------------------
// Application State
// ---------------------------------------------------------------------------

/// Shared application state available to all request handlers.
///
/// Cheap to clone — everything behind `Arc`.
#[derive(Clone)]
pub struct AppState {
    /// The gateway's reported version string.
    pub version: String,
    /// Network label (e.g., "devnet", "testnet").
    pub network: String,
    /// The USSD request dispatcher. Owns the session store and machine.
    pub dispatcher: Arc<Dispatcher>,
    /// Subscriber accounts, for the read-only REST surface.
    pub accounts: Arc<AccountStore>,
    /// Transfer records, for the history endpoint.
    pub records: Arc<TransferStore>,
    /// Prometheus metrics handles.
    pub metrics: SharedMetrics,
}

// ---------------------------------------------------------------------------
// Router Construction
// ---------------------------------------------------------------------------

/// Builds the full axum [`Router`] with all routes, CORS, and tracing.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any);

    Router::new()
        .route("/ussd", post(ussd_handler))
        .route("/health", get(health_handler))
        .route("/accounts/:msisdn", get(account_handler))
        .route("/accounts/:msisdn/transfers", get(transfers_handler))
        .route("/metrics", get(metrics_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Request / Response Types
// ---------------------------------------------------------------------------

/// The aggregator's webhook payload. Field names follow the aggregator's
/// camelCase convention, not ours.
#[derive(Debug, Deserialize)]
pub struct UssdRequest {
    /// Aggregator-side session identifier. We key sessions by phone number
    /// instead, but log this for cross-referencing aggregator tickets.
    #[serde(rename = "sessionId", default)]
    pub session_id: Option<String>,
    /// The dialed service code (`*XXX#`). Informational.
    #[serde(rename = "serviceCode", default)]
    pub service_code: Option<String>,
    /// The subscriber's phone number, E.164.
    #[serde(rename = "phoneNumber")]
    pub phone_number: String,
    /// Accumulated `*`-joined input history for this session.
    #[serde(default)]
    pub text: String,
}

/// Query parameters for the transfer history endpoint.
#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

/// Generic error body returned by REST endpoints on failure.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// `GET /health` — returns 200 if the gateway is alive, plus the build
/// version and network label so a dashboard can tell deployments apart.
///
/// This is the liveness probe for orchestrators. It intentionally does not
/// probe the ledger backend — a degraded chain should page someone, not
/// restart-loop the gateway.
async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(serde_json::json!({
            "status": "ok",
            "version": state.version,
            "network": state.network,
        })),
    )
}

/// `POST /ussd` — the aggregator webhook.
///
/// Runs one dispatcher step and answers in the USSD plain-text dialect.
/// Always 200: the aggregator treats any other status as a dead service,
/// and the dispatcher already maps internal faults to a polite `END`.
async fn ussd_handler(
    State(state): State<AppState>,
    Form(req): Form<UssdRequest>,
) -> impl IntoResponse {
    let timer = state
        .metrics
        .ussd_request_duration_seconds
        .start_timer();
    state.metrics.ussd_requests_total.inc();

    tracing::debug!(
        msisdn = %req.phone_number,
        session_id = req.session_id.as_deref().unwrap_or("-"),
        service_code = req.service_code.as_deref().unwrap_or("-"),
        "ussd request"
    );

    let reply = state.dispatcher.handle(&req.phone_number, &req.text).await;

    if reply.starts_with("END ") {
        state.metrics.ussd_sessions_ended_total.inc();
    }
    state
        .metrics
        .ussd_sessions_active
        .set(state.dispatcher.sessions().len() as i64);
    state
        .metrics
        .accounts_registered
        .set(state.accounts.len() as i64);
    timer.observe_duration();

    (
        StatusCode::OK,
        [("content-type", "text/plain; charset=utf-8")],
        reply,
    )
}

/// `GET /accounts/:msisdn` — read-only account view.
///
/// The secret-bearing fields never serialize (the account type skips them),
/// so this is safe to expose to operator tooling.
async fn account_handler(
    Path(msisdn): Path<String>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    match state.accounts.get(&msisdn) {
        Some(account) => (StatusCode::OK, Json(serde_json::json!(account))).into_response(),
        None => {
            let err = ErrorResponse {
                error: format!("no account for {msisdn}"),
            };
            (StatusCode::NOT_FOUND, Json(serde_json::json!(err))).into_response()
        }
    }
}

/// `GET /accounts/:msisdn/transfers?limit&offset` — paginated transfer
/// history, newest first, both directions.
///
/// An unknown subscriber gets an empty list rather than a 404: an account
/// with no history and no account at all look the same to a dashboard.
async fn transfers_handler(
    Path(msisdn): Path<String>,
    Query(query): Query<HistoryQuery>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    let limit = query
        .limit
        .unwrap_or(DEFAULT_HISTORY_LIMIT)
        .min(MAX_HISTORY_LIMIT);
    let offset = query.offset.unwrap_or(0);

    let page = state.records.history_for(&msisdn, limit, offset);
    Json(page)
}

/// `GET /metrics` — renders the Prometheus text exposition format.
///
/// Returns HTTP 500 if encoding fails (should never happen in practice).
async fn metrics_handler(State(state): State<AppState>) -> impl IntoResponse {
    match state.metrics.encode() {
        Ok(body) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            body,
        )
            .into_response(),
        Err(e) => {
            tracing::error!("failed to encode metrics: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "metrics encoding failed").into_response()
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
