//! Shared runtime state for tally-daemon.
//!
//! Handlers receive `State<Arc<AppState>>` from Axum. The session store is
//! the gateway's [`InMemoryGateway`]; this module only adds the event bus
//! and build metadata around it.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tally_config::TallyConfig;
use tally_gateway::{InMemoryGateway, StatusChange};
use tokio::sync::broadcast;

// ---------------------------------------------------------------------------
// BusMsg: SSE event bus payload
// ---------------------------------------------------------------------------

/// Messages broadcast over the internal event bus and surfaced as SSE events.
#[derive(Clone, Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BusMsg {
    Heartbeat { ts_millis: i64 },
    StatusChange(StatusChange),
}

impl BusMsg {
    pub fn event_name(&self) -> &'static str {
        match self {
            BusMsg::Heartbeat { .. } => "heartbeat",
            BusMsg::StatusChange(_) => "status",
        }
    }
}

/// Static build metadata included in the health response.
#[derive(Clone, Debug, Serialize)]
pub struct BuildInfo {
    pub service: &'static str,
    pub version: &'static str,
}

// ---------------------------------------------------------------------------
// AppState
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct AppState {
    /// Broadcast bus for SSE.
    pub bus: broadcast::Sender<BusMsg>,
    pub build: BuildInfo,
    pub gateway: Arc<InMemoryGateway>,
    /// Hash of the effective configuration the daemon was seeded from.
    pub config_hash: Option<String>,
}

impl AppState {
    pub fn new(gateway: Arc<InMemoryGateway>) -> Self {
        let (bus, _rx) = broadcast::channel::<BusMsg>(1024);
        Self {
            bus,
            build: BuildInfo {
                service: "tally-daemon",
                version: env!("CARGO_PKG_VERSION"),
            },
            gateway,
            config_hash: None,
        }
    }

    /// Seed elections and polling stations from `cfg`.
    pub fn from_config(cfg: &TallyConfig, config_hash: String) -> Self {
        let mut st = Self::new(Arc::new(InMemoryGateway::from_config(cfg)));
        st.config_hash = Some(config_hash);
        st
    }
}

// ---------------------------------------------------------------------------
// Background tasks
// ---------------------------------------------------------------------------

/// Spawn a background task that emits a heartbeat SSE every `interval`.
pub fn spawn_heartbeat(bus: broadcast::Sender<BusMsg>, interval: Duration) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            let ts = chrono::Utc::now().timestamp_millis();
            let _ = bus.send(BusMsg::Heartbeat { ts_millis: ts });
        }
    });
}

/// Spawn a background task that republishes store status changes on the bus.
pub fn spawn_status_forwarder(state: Arc<AppState>) {
    let mut rx = state.gateway.subscribe();
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(change) => {
                    let _ = state.bus.send(BusMsg::StatusChange(change));
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!(skipped = n, "status forwarder lagged");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    });
}
