use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tally_reconcile::{DataEntryStatus, ResolveDecision, ResolveErrorsDecision};
use tally_schemas::{EntryNumber, SectionKey, SessionSnapshot, TypistId, ValidationResults};

use crate::GatewayError;

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

/// Body of every typist request. Authentication is external; the typist
/// identity is taken as given.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypistRequest {
    pub typist: TypistId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimResponse {
    pub polling_station_id: u32,
    pub entry_number: EntryNumber,
    /// Saved progress of a suspended entry; `None` for a fresh one.
    pub snapshot: Option<SessionSnapshot>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaveRequest {
    pub typist: TypistId,
    pub snapshot: SessionSnapshot,
}

/// Current violations of every submitted section, by rule code.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaveResponse {
    pub validation_results: BTreeMap<SectionKey, ValidationResults>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinaliseOutcome {
    /// First entry done; a second entry is needed.
    SecondEntryNeeded,
    Definitive,
    Different,
    /// First entry finalized with accepted errors; waits for a coordinator.
    ErrorsPending,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinaliseResponse {
    pub outcome: FinaliseOutcome,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolveDifferencesRequest {
    pub decision: ResolveDecision,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolveErrorsRequest {
    pub decision: ResolveErrorsDecision,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusResponse {
    pub polling_station_id: u32,
    #[serde(flatten)]
    pub status: DataEntryStatus,
    pub updated_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Gateway contract
// ---------------------------------------------------------------------------

/// Remote persistence for entry sessions, addressed by polling station id
/// and entry number.
///
/// No call changes anything on the remote side unless it returns `Ok`.
#[async_trait::async_trait]
pub trait SessionGateway: Send + Sync {
    async fn claim(
        &self,
        polling_station_id: u32,
        entry: EntryNumber,
        typist: &TypistId,
    ) -> Result<ClaimResponse, GatewayError>;

    async fn save(
        &self,
        polling_station_id: u32,
        entry: EntryNumber,
        typist: &TypistId,
        snapshot: &SessionSnapshot,
    ) -> Result<SaveResponse, GatewayError>;

    /// Keep the saved data and give up the claim.
    async fn release(
        &self,
        polling_station_id: u32,
        entry: EntryNumber,
        typist: &TypistId,
    ) -> Result<(), GatewayError>;

    async fn finalize(
        &self,
        polling_station_id: u32,
        entry: EntryNumber,
        typist: &TypistId,
    ) -> Result<FinaliseResponse, GatewayError>;

    async fn discard(
        &self,
        polling_station_id: u32,
        entry: EntryNumber,
        typist: &TypistId,
    ) -> Result<(), GatewayError>;

    async fn resolve_difference(
        &self,
        polling_station_id: u32,
        decision: ResolveDecision,
    ) -> Result<(), GatewayError>;

    async fn resolve_errors(
        &self,
        polling_station_id: u32,
        decision: ResolveErrorsDecision,
    ) -> Result<(), GatewayError>;

    async fn status(&self, polling_station_id: u32) -> Result<StatusResponse, GatewayError>;
}
