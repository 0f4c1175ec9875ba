//! In-process session store.
//!
//! Holds one [`DataEntryStatus`] per polling station behind a single async
//! mutex, so every request is applied atomically and concurrent claims on
//! the same entry produce exactly one winner. Every accepted change is
//! published on a broadcast channel for the daemon's event stream.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{broadcast, Mutex};

use tally_config::TallyConfig;
use tally_entry::SectionPlan;
use tally_reconcile::{
    DataEntryEvent, DataEntryStatus, ResolveDecision, ResolveErrorsDecision, StatusPolicy,
};
use tally_schemas::{
    ElectionContext, EntryNumber, FinalResult, PollingStation, PollingStationResults,
    SessionSnapshot, TypistId, ValidationResults,
};
use tally_validate::{is_overridable, validate_results};

use crate::{
    ClaimResponse, ErrorResponse, FinaliseOutcome, FinaliseResponse, GatewayError, SaveResponse,
    SessionGateway, StatusResponse,
};

const CHANGE_CHANNEL_CAPACITY: usize = 256;

/// Published after every successful status-changing request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusChange {
    pub polling_station_id: u32,
    pub status: &'static str,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
struct Record {
    status: DataEntryStatus,
    updated_at: DateTime<Utc>,
}

pub struct InMemoryGateway {
    ctx: Arc<ElectionContext>,
    stations: BTreeMap<u32, PollingStation>,
    policy: StatusPolicy,
    records: Mutex<BTreeMap<u32, Record>>,
    changes: broadcast::Sender<StatusChange>,
}

impl InMemoryGateway {
    pub fn new(
        ctx: Arc<ElectionContext>,
        stations: impl IntoIterator<Item = PollingStation>,
        policy: StatusPolicy,
    ) -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Self {
            ctx,
            stations: stations.into_iter().map(|s| (s.id, s)).collect(),
            policy,
            records: Mutex::new(BTreeMap::new()),
            changes,
        }
    }

    pub fn from_config(cfg: &TallyConfig) -> Self {
        Self::new(
            Arc::new(cfg.election.clone()),
            cfg.polling_stations.iter().cloned(),
            StatusPolicy {
                keep_requires_new_second_entry: cfg.reconcile.keep_requires_new_second_entry,
            },
        )
    }

    pub fn ctx(&self) -> Arc<ElectionContext> {
        Arc::clone(&self.ctx)
    }

    pub fn station(&self, id: u32) -> Option<&PollingStation> {
        self.stations.get(&id)
    }

    pub fn stations(&self) -> impl Iterator<Item = &PollingStation> {
        self.stations.values()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StatusChange> {
        self.changes.subscribe()
    }

    fn require_station(&self, id: u32) -> Result<&PollingStation, GatewayError> {
        self.stations.get(&id).ok_or(GatewayError::not_found(id))
    }

    /// Apply one event under the store lock and publish the new status.
    async fn transition(
        &self,
        id: u32,
        event: DataEntryEvent,
    ) -> Result<DataEntryStatus, GatewayError> {
        self.require_station(id)?;
        let mut records = self.records.lock().await;
        let record = records.entry(id).or_default();
        record.status.apply(event, &self.policy)?;
        Ok(self.touch(id, record))
    }

    fn touch(&self, id: u32, record: &mut Record) -> DataEntryStatus {
        record.updated_at = Utc::now();
        // No subscribers is fine.
        let _ = self.changes.send(StatusChange {
            polling_station_id: id,
            status: record.status.name(),
            at: record.updated_at,
        });
        record.status.clone()
    }

    /// Recompute the validation of every submitted section, and reject
    /// progress that names sections outside this station's plan or accepts
    /// violations that cannot be overridden.
    fn revalidate(
        &self,
        station: &PollingStation,
        snapshot: &SessionSnapshot,
    ) -> Result<SessionSnapshot, GatewayError> {
        let plan = SectionPlan::new(&self.ctx, station);
        let progress = &snapshot.progress;
        let unknown = std::iter::once(&progress.current_section)
            .chain(progress.validation.keys())
            .chain(progress.accepted.iter())
            .find(|k| !plan.contains(**k));
        if let Some(key) = unknown {
            return Err(invalid_data(format!(
                "section {key} is not part of polling station {}",
                station.id
            )));
        }

        let validation: BTreeMap<_, _> = progress
            .validation
            .keys()
            .map(|&k| (k, validate_results(k, &snapshot.results, &self.ctx)))
            .collect();

        for key in &progress.accepted {
            let Some(v) = validation.get(key) else {
                return Err(invalid_data(format!("section {key} accepted but never submitted")));
            };
            if let Some(err) = v.errors.iter().find(|e| !is_overridable(e.code)) {
                return Err(invalid_data(format!(
                    "section {key}: {} cannot be accepted",
                    err.code
                )));
            }
        }

        let mut stored = snapshot.clone();
        stored.progress.validation = validation;
        Ok(stored)
    }
}

fn invalid_data(msg: String) -> GatewayError {
    GatewayError::Rejected(ErrorResponse::new("InvalidData", msg))
}

fn not_finalisable(msg: String) -> GatewayError {
    GatewayError::Rejected(ErrorResponse::new("EntryNotFinalisable", msg))
}

#[async_trait::async_trait]
impl SessionGateway for InMemoryGateway {
    async fn claim(
        &self,
        polling_station_id: u32,
        entry: EntryNumber,
        typist: &TypistId,
    ) -> Result<ClaimResponse, GatewayError> {
        let status = self
            .transition(
                polling_station_id,
                DataEntryEvent::Claim {
                    entry,
                    typist: typist.clone(),
                },
            )
            .await
            .inspect_err(|e| {
                tracing::info!(polling_station_id, entry_number = %entry, typist = %typist, error = %e, "claim refused");
            })?;

        let snapshot = status.in_progress(entry).and_then(|p| p.snapshot.clone());
        tracing::info!(
            polling_station_id,
            entry_number = %entry,
            typist = %typist,
            resumed = snapshot.is_some(),
            "entry claimed"
        );
        Ok(ClaimResponse {
            polling_station_id,
            entry_number: entry,
            snapshot,
        })
    }

    async fn save(
        &self,
        polling_station_id: u32,
        entry: EntryNumber,
        typist: &TypistId,
        snapshot: &SessionSnapshot,
    ) -> Result<SaveResponse, GatewayError> {
        let station = self.require_station(polling_station_id)?;
        let stored = self.revalidate(station, snapshot)?;
        let validation_results = stored.progress.validation.clone();

        self.transition(
            polling_station_id,
            DataEntryEvent::Save {
                entry,
                typist: typist.clone(),
                snapshot: stored,
            },
        )
        .await?;

        tracing::debug!(
            polling_station_id,
            entry_number = %entry,
            typist = %typist,
            sections = validation_results.len(),
            "entry saved"
        );
        Ok(SaveResponse { validation_results })
    }

    async fn release(
        &self,
        polling_station_id: u32,
        entry: EntryNumber,
        typist: &TypistId,
    ) -> Result<(), GatewayError> {
        self.transition(
            polling_station_id,
            DataEntryEvent::Release {
                entry,
                typist: typist.clone(),
            },
        )
        .await?;
        tracing::info!(polling_station_id, entry_number = %entry, typist = %typist, "entry suspended");
        Ok(())
    }

    async fn finalize(
        &self,
        polling_station_id: u32,
        entry: EntryNumber,
        typist: &TypistId,
    ) -> Result<FinaliseResponse, GatewayError> {
        let station = self.require_station(polling_station_id)?;
        let plan = SectionPlan::new(&self.ctx, station);

        let mut records = self.records.lock().await;
        let record = records.entry(polling_station_id).or_default();

        let owned = record
            .status
            .in_progress(entry)
            .filter(|p| p.claimed && p.typist == *typist);
        let snapshot = match owned {
            Some(p) => {
                let Some(snapshot) = p.snapshot.clone() else {
                    return Err(not_finalisable("nothing was saved".to_string()));
                };
                let progress = &snapshot.progress;
                let unsaved = plan.sections().iter().find(|k| {
                    !progress
                        .validation
                        .get(*k)
                        .is_some_and(|v| !v.has_errors() || progress.accepted.contains(*k))
                });
                if let Some(key) = unsaved {
                    return Err(not_finalisable(format!("section {key} is not saved")));
                }
                Some(snapshot)
            }
            // Not ours to finalize; the status machine names the conflict.
            None => None,
        };

        let (results, validation) = match &snapshot {
            Some(s) => {
                let mut validation = ValidationResults::default();
                for v in s.progress.validation.values() {
                    validation.extend(v);
                }
                (s.results.clone(), validation)
            }
            None => (PollingStationResults::empty(&self.ctx), ValidationResults::default()),
        };
        let result = FinalResult {
            polling_station_id,
            entry_number: entry,
            typist: typist.clone(),
            results,
            validation,
        };

        record.status.apply(
            DataEntryEvent::Finalize {
                entry,
                typist: typist.clone(),
                result,
            },
            &self.policy,
        )?;
        let status = self.touch(polling_station_id, record);

        let outcome = match status {
            DataEntryStatus::SecondEntryNotStarted { .. } => FinaliseOutcome::SecondEntryNeeded,
            DataEntryStatus::FirstEntryHasErrors { .. } => FinaliseOutcome::ErrorsPending,
            DataEntryStatus::Definitive { .. } => FinaliseOutcome::Definitive,
            DataEntryStatus::EntriesDifferent { .. } => FinaliseOutcome::Different,
            other => {
                return Err(GatewayError::Fatal(ErrorResponse {
                    error: format!("finalize left polling station in {other}"),
                    fatal: true,
                    reference: "InternalError".to_string(),
                }))
            }
        };
        tracing::info!(
            polling_station_id,
            entry_number = %entry,
            typist = %typist,
            outcome = ?outcome,
            "entry finalised"
        );
        Ok(FinaliseResponse { outcome })
    }

    async fn discard(
        &self,
        polling_station_id: u32,
        entry: EntryNumber,
        typist: &TypistId,
    ) -> Result<(), GatewayError> {
        self.transition(
            polling_station_id,
            DataEntryEvent::Discard {
                entry,
                typist: typist.clone(),
            },
        )
        .await?;
        tracing::info!(polling_station_id, entry_number = %entry, typist = %typist, "entry discarded");
        Ok(())
    }

    async fn resolve_difference(
        &self,
        polling_station_id: u32,
        decision: ResolveDecision,
    ) -> Result<(), GatewayError> {
        let status = self
            .transition(
                polling_station_id,
                DataEntryEvent::ResolveDifferences(decision),
            )
            .await?;
        tracing::info!(polling_station_id, decision = ?decision, status = %status, "differences resolved");
        Ok(())
    }

    async fn resolve_errors(
        &self,
        polling_station_id: u32,
        decision: ResolveErrorsDecision,
    ) -> Result<(), GatewayError> {
        let status = self
            .transition(polling_station_id, DataEntryEvent::ResolveErrors(decision))
            .await?;
        tracing::info!(polling_station_id, decision = ?decision, status = %status, "errors resolved");
        Ok(())
    }

    async fn status(&self, polling_station_id: u32) -> Result<StatusResponse, GatewayError> {
        self.require_station(polling_station_id)?;
        let records = self.records.lock().await;
        let record = records.get(&polling_station_id).cloned().unwrap_or_default();
        Ok(StatusResponse {
            polling_station_id,
            status: record.status,
            updated_at: record.updated_at,
        })
    }
}
