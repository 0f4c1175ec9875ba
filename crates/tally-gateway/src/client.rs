//! Typist-side driver: one [`EntrySession`] bound to a [`SessionGateway`].
//!
//! Every mutating call works on a copy of the session, persists it, and
//! only then replaces the held session. A failed remote call therefore
//! leaves the session exactly as it was before the call. Methods take
//! `&mut self`, so a second mutating call cannot start while one is
//! outstanding.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use tally_entry::{
    AbortDecision, AbortOutcome, EntrySession, Navigation, SessionError, SubmitOutcome,
    UnsavedDecision,
};
use tally_schemas::{
    ElectionContext, EntryNumber, FinalResult, PollingStation, SectionKey, SectionValues,
    SessionSnapshot, TypistId, ValidationResults,
};

use crate::{FinaliseOutcome, GatewayError, RetryPolicy, SessionGateway};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ClientError {
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error(transparent)]
    Gateway(#[from] GatewayError),
}

impl ClientError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, ClientError::Gateway(e) if e.is_retryable())
    }
}

pub struct EntryClient {
    gateway: Arc<dyn SessionGateway>,
    session: EntrySession,
    retry: RetryPolicy,
    /// Snapshot already stored by a suspend whose release failed.
    suspend_saved: Option<SessionSnapshot>,
}

impl std::fmt::Debug for EntryClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntryClient")
            .field("session", &self.session)
            .field("retry", &self.retry)
            .field("suspend_saved", &self.suspend_saved)
            .finish_non_exhaustive()
    }
}

impl EntryClient {
    /// Claim `(station, entry)` for `typist`. A suspended entry comes back
    /// exactly as it was saved.
    pub async fn claim(
        gateway: Arc<dyn SessionGateway>,
        ctx: Arc<ElectionContext>,
        station: PollingStation,
        entry: EntryNumber,
        typist: TypistId,
        retry: RetryPolicy,
    ) -> Result<Self, ClientError> {
        let id = station.id;
        let resp = retry
            .run("claim", || gateway.claim(id, entry, &typist))
            .await?;

        let session = match resp.snapshot {
            Some(snapshot) => {
                match EntrySession::resume(ctx, station, entry, typist.clone(), snapshot) {
                    Ok(session) => session,
                    Err(e) => {
                        // The claim is ours; hand it back before reporting.
                        tracing::warn!(
                            polling_station_id = id,
                            entry_number = %entry,
                            typist = %typist,
                            error = %e,
                            "saved entry cannot be resumed; releasing claim"
                        );
                        retry
                            .run("release", || gateway.release(id, entry, &typist))
                            .await?;
                        return Err(e.into());
                    }
                }
            }
            None => EntrySession::new(ctx, station, entry, typist),
        };
        tracing::debug!(
            polling_station_id = id,
            entry_number = %entry,
            typist = %session.typist(),
            section = %session.current_section(),
            "session ready"
        );
        Ok(Self {
            gateway,
            session,
            retry,
            suspend_saved: None,
        })
    }

    pub fn session(&self) -> &EntrySession {
        &self.session
    }

    // --- local transitions -------------------------------------------------

    pub fn edit(&mut self, values: SectionValues) -> Result<(), ClientError> {
        Ok(self.session.edit(values)?)
    }

    pub fn navigate_to(&mut self, key: SectionKey) -> Result<Navigation, ClientError> {
        Ok(self.session.navigate_to(key)?)
    }

    pub fn abort(&mut self) -> Result<(), ClientError> {
        Ok(self.session.abort()?)
    }

    // --- persisted transitions ---------------------------------------------

    pub async fn submit_section(
        &mut self,
        values: SectionValues,
    ) -> Result<SubmitOutcome, ClientError> {
        let mut next = self.session.clone();
        let outcome = next.submit_section(values)?;
        self.persist(&mut next).await?;
        self.session = next;
        Ok(outcome)
    }

    pub async fn accept_violations(&mut self, key: SectionKey) -> Result<(), ClientError> {
        let mut next = self.session.clone();
        next.accept_violations(key)?;
        self.persist(&mut next).await?;
        self.session = next;
        Ok(())
    }

    pub async fn resolve_unsaved(
        &mut self,
        decision: UnsavedDecision,
    ) -> Result<Navigation, ClientError> {
        let mut next = self.session.clone();
        let nav = next.resolve_unsaved(decision)?;
        self.persist(&mut next).await?;
        self.session = next;
        Ok(nav)
    }

    /// Resolve an open abort. Save-and-suspend stores the snapshot, then
    /// releases the claim. If only the release fails, the session stays
    /// `AbortPending` and calling this again repeats just the release.
    pub async fn resolve_abort(
        &mut self,
        decision: AbortDecision,
    ) -> Result<AbortOutcome, ClientError> {
        let mut next = self.session.clone();
        let outcome = next.resolve_abort(decision)?;

        let (id, entry, typist) = self.key();
        match &outcome {
            AbortOutcome::Cancelled => {}
            AbortOutcome::Suspended(snapshot) => {
                // A previous attempt may have stored this snapshot and then
                // failed to release; only the release is repeated then.
                if self.suspend_saved.as_ref() != Some(snapshot) {
                    self.retry
                        .run("save", || self.gateway.save(id, entry, typist, snapshot))
                        .await?;
                }
                let released = self
                    .retry
                    .run("release", || self.gateway.release(id, entry, typist))
                    .await;
                if let Err(e) = released {
                    // Still AbortPending locally; the remote holds `snapshot`.
                    self.suspend_saved = Some(snapshot.clone());
                    return Err(e.into());
                }
                self.suspend_saved = None;
            }
            AbortOutcome::Discarded => {
                self.retry
                    .run("discard", || self.gateway.discard(id, entry, typist))
                    .await?;
            }
        }

        self.session = next;
        Ok(outcome)
    }

    /// Finalize locally, then remotely. The result is returned together
    /// with what the remote side did with it.
    pub async fn finalize(&mut self) -> Result<(FinalResult, FinaliseOutcome), ClientError> {
        let mut next = self.session.clone();
        self.persist(&mut next).await?;
        let result = next.finalize()?;

        let (id, entry, typist) = self.key();
        let resp = self
            .retry
            .run("finalise", || self.gateway.finalize(id, entry, typist))
            .await?;

        self.session = next;
        Ok((result, resp.outcome))
    }

    // --- internals ---------------------------------------------------------

    fn key(&self) -> (u32, EntryNumber, &TypistId) {
        (
            self.session.station().id,
            self.session.entry_number(),
            self.session.typist(),
        )
    }

    /// Save `next` unless the remote side already holds its snapshot.
    async fn persist(&self, next: &mut EntrySession) -> Result<(), GatewayError> {
        if next.is_persisted() {
            return Ok(());
        }
        let snapshot = next.snapshot();
        let (id, entry, typist) = self.key();
        let resp = self
            .retry
            .run("save", || self.gateway.save(id, entry, typist, &snapshot))
            .await?;
        let drifted = validation_drift(&snapshot.progress.validation, &resp.validation_results);
        if !drifted.is_empty() {
            tracing::warn!(
                polling_station_id = id,
                entry_number = %entry,
                sections = ?drifted,
                "server validation differs from local validation"
            );
        }
        next.mark_persisted();
        Ok(())
    }
}

/// Sections whose server-side validation disagrees with ours, including
/// sections only one side validated.
fn validation_drift(
    local: &BTreeMap<SectionKey, ValidationResults>,
    remote: &BTreeMap<SectionKey, ValidationResults>,
) -> Vec<SectionKey> {
    let keys: BTreeSet<_> = local.keys().chain(remote.keys()).copied().collect();
    keys.into_iter()
        .filter(|k| local.get(k) != remote.get(k))
        .collect()
}
