//! Axum router and HTTP handlers for tally-daemon.
//!
//! `build_router` is the single entry point; `main.rs` calls it and attaches
//! middleware layers. Every entry route delegates to the shared
//! [`InMemoryGateway`](tally_gateway::InMemoryGateway), so the HTTP surface
//! and the in-process store apply identical rules.

use std::{convert::Infallible, sync::Arc};

use axum::{
    extract::{Path, State},
    http::{HeaderMap, HeaderValue, StatusCode},
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    routing::{get, post},
    Json, Router,
};
use futures_util::{Stream, StreamExt};
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;

use tally_gateway::{
    ErrorResponse, GatewayError, ResolveDifferencesRequest, ResolveErrorsRequest, SaveRequest,
    SessionGateway, TypistRequest,
};
use tally_schemas::EntryNumber;

use crate::{
    api_types::{HealthResponse, PollingStationSummary, PollingStationsResponse},
    state::{AppState, BusMsg},
};

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

/// Build the complete application router wired to the given shared state.
///
/// Middleware layers (CORS, tracing) are not applied here; `main.rs`
/// attaches them after this call so tests can use the bare router.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/v1/health", get(health))
        .route("/v1/stream", get(stream))
        .route("/v1/polling_stations", get(list_polling_stations))
        .route("/v1/polling_stations/:id/data_entries", get(entry_status))
        .route(
            "/v1/polling_stations/:id/data_entries/resolve_differences",
            post(resolve_differences),
        )
        .route(
            "/v1/polling_stations/:id/data_entries/resolve_errors",
            post(resolve_errors),
        )
        .route("/v1/polling_stations/:id/data_entries/:entry", post(save))
        .route(
            "/v1/polling_stations/:id/data_entries/:entry/claim",
            post(claim),
        )
        .route(
            "/v1/polling_stations/:id/data_entries/:entry/release",
            post(release),
        )
        .route(
            "/v1/polling_stations/:id/data_entries/:entry/finalise",
            post(finalise),
        )
        .route(
            "/v1/polling_stations/:id/data_entries/:entry/discard",
            post(discard),
        )
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Error mapping
// ---------------------------------------------------------------------------

/// A gateway error rendered as `{error, fatal, reference}` with the status
/// code the HTTP client maps back to the same variant.
pub struct ApiError(GatewayError);

impl From<GatewayError> for ApiError {
    fn from(e: GatewayError) -> Self {
        Self(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self.0 {
            GatewayError::Conflict(body) => (StatusCode::CONFLICT, body),
            GatewayError::Rejected(body) if body.reference == "EntryNotFound" => {
                (StatusCode::NOT_FOUND, body)
            }
            GatewayError::Rejected(body) => (StatusCode::UNPROCESSABLE_ENTITY, body),
            GatewayError::Fatal(body) => (StatusCode::INTERNAL_SERVER_ERROR, body),
            GatewayError::Transport(msg) => (
                StatusCode::SERVICE_UNAVAILABLE,
                ErrorResponse::new("Unavailable", msg),
            ),
            GatewayError::Decode(msg) => {
                (StatusCode::BAD_REQUEST, ErrorResponse::new("InvalidData", msg))
            }
        };
        (status, Json(body)).into_response()
    }
}

fn entry_number(id: u32, raw: u8) -> Result<EntryNumber, ApiError> {
    EntryNumber::try_from(raw).map_err(|_| {
        ApiError(GatewayError::Rejected(ErrorResponse::new(
            "EntryNotFound",
            format!("polling station {id} has no data entry {raw}"),
        )))
    })
}

// ---------------------------------------------------------------------------
// GET /v1/health
// ---------------------------------------------------------------------------

pub(crate) async fn health(State(st): State<Arc<AppState>>) -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(HealthResponse {
            ok: true,
            service: st.build.service.to_string(),
            version: st.build.version.to_string(),
            config_hash: st.config_hash.clone(),
        }),
    )
}

// ---------------------------------------------------------------------------
// GET /v1/polling_stations
// ---------------------------------------------------------------------------

pub(crate) async fn list_polling_stations(
    State(st): State<Arc<AppState>>,
) -> Result<Json<PollingStationsResponse>, ApiError> {
    let mut polling_stations = Vec::new();
    for station in st.gateway.stations() {
        let status = st.gateway.status(station.id).await?;
        polling_stations.push(PollingStationSummary {
            id: station.id,
            number: station.number,
            name: station.name.clone(),
            status: status.status.name().to_string(),
        });
    }
    Ok(Json(PollingStationsResponse { polling_stations }))
}

// ---------------------------------------------------------------------------
// Data entry routes
// ---------------------------------------------------------------------------

pub(crate) async fn entry_status(
    State(st): State<Arc<AppState>>,
    Path(id): Path<u32>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(st.gateway.status(id).await?))
}

pub(crate) async fn claim(
    State(st): State<Arc<AppState>>,
    Path((id, entry)): Path<(u32, u8)>,
    Json(req): Json<TypistRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let entry = entry_number(id, entry)?;
    Ok(Json(st.gateway.claim(id, entry, &req.typist).await?))
}

pub(crate) async fn save(
    State(st): State<Arc<AppState>>,
    Path((id, entry)): Path<(u32, u8)>,
    Json(req): Json<SaveRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let entry = entry_number(id, entry)?;
    Ok(Json(
        st.gateway
            .save(id, entry, &req.typist, &req.snapshot)
            .await?,
    ))
}

pub(crate) async fn release(
    State(st): State<Arc<AppState>>,
    Path((id, entry)): Path<(u32, u8)>,
    Json(req): Json<TypistRequest>,
) -> Result<StatusCode, ApiError> {
    let entry = entry_number(id, entry)?;
    st.gateway.release(id, entry, &req.typist).await?;
    Ok(StatusCode::OK)
}

pub(crate) async fn finalise(
    State(st): State<Arc<AppState>>,
    Path((id, entry)): Path<(u32, u8)>,
    Json(req): Json<TypistRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let entry = entry_number(id, entry)?;
    Ok(Json(st.gateway.finalize(id, entry, &req.typist).await?))
}

pub(crate) async fn discard(
    State(st): State<Arc<AppState>>,
    Path((id, entry)): Path<(u32, u8)>,
    Json(req): Json<TypistRequest>,
) -> Result<StatusCode, ApiError> {
    let entry = entry_number(id, entry)?;
    st.gateway.discard(id, entry, &req.typist).await?;
    Ok(StatusCode::OK)
}

pub(crate) async fn resolve_differences(
    State(st): State<Arc<AppState>>,
    Path(id): Path<u32>,
    Json(req): Json<ResolveDifferencesRequest>,
) -> Result<StatusCode, ApiError> {
    st.gateway.resolve_difference(id, req.decision).await?;
    Ok(StatusCode::OK)
}

pub(crate) async fn resolve_errors(
    State(st): State<Arc<AppState>>,
    Path(id): Path<u32>,
    Json(req): Json<ResolveErrorsRequest>,
) -> Result<StatusCode, ApiError> {
    st.gateway.resolve_errors(id, req.decision).await?;
    Ok(StatusCode::OK)
}

// ---------------------------------------------------------------------------
// GET /v1/stream  (SSE)
// ---------------------------------------------------------------------------

pub(crate) async fn stream(State(st): State<Arc<AppState>>) -> Response {
    let mut headers = HeaderMap::new();
    headers.insert("Cache-Control", HeaderValue::from_static("no-cache"));
    headers.insert("Connection", HeaderValue::from_static("keep-alive"));

    let rx = st.bus.subscribe();
    let events = broadcast_to_sse(rx);

    (headers, Sse::new(events).keep_alive(KeepAlive::new())).into_response()
}

fn broadcast_to_sse(
    rx: broadcast::Receiver<BusMsg>,
) -> impl Stream<Item = Result<Event, Infallible>> {
    BroadcastStream::new(rx).filter_map(|msg| async move {
        match msg {
            Ok(m) => {
                let data = serde_json::to_string(&m).ok()?;
                Some(Ok(Event::default().event(m.event_name()).data(data)))
            }
            Err(_) => None, // lagged / closed
        }
    })
}
