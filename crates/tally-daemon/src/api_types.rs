//! Response types owned by the daemon. Entry request and response bodies
//! are the gateway's wire types.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub ok: bool,
    pub service: String,
    pub version: String,
    pub config_hash: Option<String>,
}

/// One row of GET /v1/polling_stations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollingStationSummary {
    pub id: u32,
    pub number: u32,
    pub name: String,
    pub status: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollingStationsResponse {
    pub polling_stations: Vec<PollingStationSummary>,
}
