//! Entry session state machine.
//!
//! # Design
//!
//! One [`EntrySession`] per (polling station, entry number, typist). Every
//! typist action is a method that either applies a legal transition or
//! returns [`SessionError`] and leaves the session untouched. The session
//! keeps the working data for all sections, the cached validation result per
//! submitted section, and the set of sections whose violations were accepted.
//!
//! ```text
//!   new() ──► Empty ──edit/submit──► Active ◄──────────────┐
//!                                     │   ▲                 │
//!                      submit(errors) ▼   │ correct/accept  │
//!                                  Blocked                  │
//!                                                           │
//!   navigate_to(dirty) ──► UnsavedChanges ──resolve_unsaved─┘
//!   abort() ──► AbortPending ──► SavedAndSuspended | Discarded (term.)
//!                          └──── Cancel restores the prior phase
//!   submit(save) ──► AwaitingFinalConfirmation ──finalize──► Finalized (term.)
//! ```
//!
//! Changing the values of a section clears its acceptance and drops the
//! cached validation of every section that depends on it, so no override is
//! ever carried over to different numbers.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use tally_schemas::{
    ElectionContext, EntryNumber, FinalResult, PollingStation, PollingStationResults,
    ProgressMarker, SectionKey, SectionValues, SessionSnapshot, TypistId, ValidationResults,
};
use tally_validate::{is_overridable, validate_results};

use crate::sequencer::{reachable_sections, SectionPlan};
use crate::SessionError;

// ---------------------------------------------------------------------------
// Phase and decisions
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SessionPhase {
    /// Nothing entered yet.
    Empty,
    /// The current section is editable and not blocked.
    Active,
    /// The current section was submitted with unaccepted blocking errors.
    Blocked,
    /// Navigation was requested while the current section has edits that
    /// were never submitted.
    UnsavedChanges { target: SectionKey },
    /// Abort decision point. `resume` is the phase restored on cancel.
    AbortPending { resume: Box<SessionPhase> },
    /// Every section is saved and the final check is current.
    AwaitingFinalConfirmation,
    /// **Terminal.**
    Finalized,
    /// **Terminal.** Working data persisted, claim released.
    SavedAndSuspended,
    /// **Terminal.** All data dropped.
    Discarded,
}

impl SessionPhase {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Finalized | Self::SavedAndSuspended | Self::Discarded
        )
    }

    fn accepts_input(&self) -> bool {
        matches!(
            self,
            Self::Empty | Self::Active | Self::Blocked | Self::AwaitingFinalConfirmation
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnsavedDecision {
    SaveAndContinue,
    DiscardAndContinue,
    Cancel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AbortDecision {
    SaveAndSuspend,
    Discard,
    Cancel,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// The section is saved. `next` is the new current section, `None` when
    /// the final check was submitted.
    Saved {
        validation: ValidationResults,
        next: Option<SectionKey>,
    },
    /// Unaccepted blocking errors; the current section does not change.
    Blocked(ValidationResults),
}

impl SubmitOutcome {
    pub fn validation(&self) -> &ValidationResults {
        match self {
            SubmitOutcome::Saved { validation, .. } => validation,
            SubmitOutcome::Blocked(validation) => validation,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Navigation {
    Moved(SectionKey),
    /// Decision point opened; see [`EntrySession::resolve_unsaved`].
    UnsavedChanges { from: SectionKey, target: SectionKey },
    /// The move did not happen (cancelled, or the target stopped being
    /// reachable after saving).
    Stayed(SectionKey),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AbortOutcome {
    Cancelled,
    /// The snapshot to persist before releasing the claim.
    Suspended(SessionSnapshot),
    Discarded,
}

// ---------------------------------------------------------------------------
// EntrySession
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct EntrySession {
    ctx: Arc<ElectionContext>,
    station: PollingStation,
    entry_number: EntryNumber,
    typist: TypistId,
    plan: SectionPlan,

    results: PollingStationResults,
    current: SectionKey,
    validation: BTreeMap<SectionKey, ValidationResults>,
    accepted: BTreeSet<SectionKey>,
    /// Unsubmitted values for the current section. Only held while they
    /// differ from `results`.
    draft: Option<SectionValues>,

    persisted: SessionSnapshot,
    phase: SessionPhase,
}

impl EntrySession {
    pub fn new(
        ctx: Arc<ElectionContext>,
        station: PollingStation,
        entry_number: EntryNumber,
        typist: TypistId,
    ) -> Self {
        let plan = SectionPlan::new(&ctx, &station);
        let results = PollingStationResults::empty(&ctx);
        let current = plan.first();
        let persisted = SessionSnapshot {
            results: results.clone(),
            progress: ProgressMarker {
                current_section: current,
                validation: BTreeMap::new(),
                accepted: BTreeSet::new(),
            },
        };
        Self {
            ctx,
            station,
            entry_number,
            typist,
            plan,
            results,
            current,
            validation: BTreeMap::new(),
            accepted: BTreeSet::new(),
            draft: None,
            persisted,
            phase: SessionPhase::Empty,
        }
    }

    /// Restore a suspended entry exactly as it was saved.
    ///
    /// Fails with [`SessionError::SectionMismatch`] when the snapshot names a
    /// section that is not in this station's plan, and with
    /// [`SessionError::NotReachable`] when its current section could not have
    /// been reached with the saved progress.
    pub fn resume(
        ctx: Arc<ElectionContext>,
        station: PollingStation,
        entry_number: EntryNumber,
        typist: TypistId,
        snapshot: SessionSnapshot,
    ) -> Result<Self, SessionError> {
        let mut session = Self::new(ctx, station, entry_number, typist);

        let progress = &snapshot.progress;
        let unknown = std::iter::once(&progress.current_section)
            .chain(progress.validation.keys())
            .chain(progress.accepted.iter())
            .find(|k| !session.plan.contains(**k));
        if let Some(key) = unknown {
            return Err(SessionError::SectionMismatch(*key));
        }

        session.results = snapshot.results.clone();
        session.current = progress.current_section;
        session.validation = progress.validation.clone();
        session.accepted = progress.accepted.clone();
        session.persisted = snapshot;

        if !reachable_sections(&session).contains(&session.current) {
            return Err(SessionError::NotReachable(session.current));
        }
        session.settle_phase();
        Ok(session)
    }

    // --- accessors ---------------------------------------------------------

    pub fn ctx(&self) -> &ElectionContext {
        &self.ctx
    }

    pub fn station(&self) -> &PollingStation {
        &self.station
    }

    pub fn entry_number(&self) -> EntryNumber {
        self.entry_number
    }

    pub fn typist(&self) -> &TypistId {
        &self.typist
    }

    pub fn plan(&self) -> &SectionPlan {
        &self.plan
    }

    pub fn phase(&self) -> &SessionPhase {
        &self.phase
    }

    pub fn current_section(&self) -> SectionKey {
        self.current
    }

    /// Stored values for every section, excluding any unsubmitted draft.
    pub fn results(&self) -> &PollingStationResults {
        &self.results
    }

    /// Values the typist currently sees for the current section.
    pub fn current_values(&self) -> SectionValues {
        self.draft
            .clone()
            .unwrap_or_else(|| self.results.section(self.current))
    }

    pub fn validation(&self, key: SectionKey) -> Option<&ValidationResults> {
        self.validation.get(&key)
    }

    pub fn is_accepted(&self, key: SectionKey) -> bool {
        self.accepted.contains(&key)
    }

    /// Submitted since the last change it depends on, and either free of
    /// errors or accepted.
    pub fn is_saved(&self, key: SectionKey) -> bool {
        self.validation
            .get(&key)
            .is_some_and(|v| !v.has_errors() || self.accepted.contains(&key))
    }

    pub fn has_draft_changes(&self) -> bool {
        self.draft.is_some()
    }

    /// `true` when the session differs from what was last persisted.
    pub fn has_unsaved_changes(&self) -> bool {
        self.draft.is_some() || !self.is_persisted()
    }

    /// `true` when the working snapshot equals the last persisted one.
    /// Drafts are ignored.
    pub fn is_persisted(&self) -> bool {
        self.snapshot() == self.persisted
    }

    /// The working snapshot: stored data plus progress. Drafts are not part
    /// of it until submitted or folded in by a suspend.
    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            results: self.results.clone(),
            progress: ProgressMarker {
                current_section: self.current,
                validation: self.validation.clone(),
                accepted: self.accepted.clone(),
            },
        }
    }

    /// Record that the current working snapshot has been persisted.
    pub fn mark_persisted(&mut self) {
        self.persisted = self.snapshot();
    }

    // --- transitions -------------------------------------------------------

    /// Record values for the current section without submitting them.
    pub fn edit(&mut self, values: SectionValues) -> Result<(), SessionError> {
        self.require_input("edit")?;
        self.require_current(&values)?;

        self.draft = (values != self.results.section(self.current)).then_some(values);
        self.settle_phase();
        Ok(())
    }

    /// Store and validate the current section.
    ///
    /// Advances to the next section when the section is saved. Blocking
    /// errors keep the session on the current section until they are
    /// corrected or accepted.
    pub fn submit_section(&mut self, values: SectionValues) -> Result<SubmitOutcome, SessionError> {
        self.require_input("submit")?;
        self.require_current(&values)?;

        self.draft = None;
        let validation = self.store(values);

        if !self.is_saved(self.current) {
            self.phase = SessionPhase::Blocked;
            return Ok(SubmitOutcome::Blocked(validation));
        }

        let next = self.plan.after(self.current);
        if let Some(next) = next {
            self.current = next;
        }
        self.settle_phase();
        Ok(SubmitOutcome::Saved { validation, next })
    }

    /// Override every violation of the current section.
    ///
    /// Only the stored values are accepted; submitting different values
    /// afterwards clears the acceptance again. The session does not advance:
    /// the typist submits once more to move on.
    pub fn accept_violations(&mut self, key: SectionKey) -> Result<(), SessionError> {
        self.require_input("accept")?;
        if key != self.current {
            return Err(SessionError::WrongSection {
                current: self.current,
                got: key,
            });
        }

        let validation = match self.validation.get(&key) {
            Some(v) if !v.is_empty() => v,
            _ => return Err(SessionError::NothingToAccept(key)),
        };
        if let Some(v) = validation.errors.iter().find(|v| !is_overridable(v.code)) {
            return Err(SessionError::NotOverridable(v.code));
        }

        self.accepted.insert(key);
        self.settle_phase();
        Ok(())
    }

    /// Move to a reachable section.
    ///
    /// Leaving a section with an unsubmitted draft opens the unsaved-changes
    /// decision point instead of moving.
    pub fn navigate_to(&mut self, key: SectionKey) -> Result<Navigation, SessionError> {
        self.require_input("navigate")?;
        if !self.plan.contains(key) {
            return Err(SessionError::SectionMismatch(key));
        }
        if !reachable_sections(self).contains(&key) {
            return Err(SessionError::NotReachable(key));
        }

        if key == self.current {
            return Ok(Navigation::Stayed(key));
        }
        if self.draft.is_some() {
            self.phase = SessionPhase::UnsavedChanges { target: key };
            return Ok(Navigation::UnsavedChanges {
                from: self.current,
                target: key,
            });
        }

        self.current = key;
        self.settle_phase();
        Ok(Navigation::Moved(key))
    }

    pub fn resolve_unsaved(&mut self, decision: UnsavedDecision) -> Result<Navigation, SessionError> {
        let target = match self.phase {
            SessionPhase::UnsavedChanges { target } => target,
            _ => return Err(self.invalid_phase("resolve unsaved changes")),
        };

        match decision {
            UnsavedDecision::Cancel => {
                self.settle_phase();
                Ok(Navigation::Stayed(self.current))
            }
            UnsavedDecision::DiscardAndContinue => {
                self.draft = None;
                self.current = target;
                self.settle_phase();
                Ok(Navigation::Moved(target))
            }
            UnsavedDecision::SaveAndContinue => {
                if let Some(values) = self.draft.take() {
                    self.store(values);
                }
                if reachable_sections(self).contains(&target) {
                    self.current = target;
                    self.settle_phase();
                    Ok(Navigation::Moved(target))
                } else {
                    self.settle_phase();
                    Ok(Navigation::Stayed(self.current))
                }
            }
        }
    }

    /// Open the abort decision point.
    pub fn abort(&mut self) -> Result<(), SessionError> {
        if self.phase.is_terminal() || matches!(self.phase, SessionPhase::AbortPending { .. }) {
            return Err(self.invalid_phase("abort"));
        }
        let resume = Box::new(self.phase.clone());
        self.phase = SessionPhase::AbortPending { resume };
        Ok(())
    }

    pub fn resolve_abort(&mut self, decision: AbortDecision) -> Result<AbortOutcome, SessionError> {
        let resume = match &self.phase {
            SessionPhase::AbortPending { resume } => (**resume).clone(),
            _ => return Err(self.invalid_phase("resolve abort")),
        };

        match decision {
            AbortDecision::Cancel => {
                self.phase = resume;
                Ok(AbortOutcome::Cancelled)
            }
            AbortDecision::SaveAndSuspend => {
                // Unsubmitted edits are kept, with whatever violations they have.
                if let Some(values) = self.draft.take() {
                    self.store(values);
                }
                let snapshot = self.snapshot();
                self.persisted = snapshot.clone();
                self.phase = SessionPhase::SavedAndSuspended;
                Ok(AbortOutcome::Suspended(snapshot))
            }
            AbortDecision::Discard => {
                self.results = PollingStationResults::empty(&self.ctx);
                self.current = self.plan.first();
                self.validation.clear();
                self.accepted.clear();
                self.draft = None;
                self.persisted = self.snapshot();
                self.phase = SessionPhase::Discarded;
                Ok(AbortOutcome::Discarded)
            }
        }
    }

    /// Close the entry and emit its result.
    pub fn finalize(&mut self) -> Result<FinalResult, SessionError> {
        if self.phase != SessionPhase::AwaitingFinalConfirmation {
            return Err(SessionError::NotFinalizable(format!(
                "session is {:?}",
                self.phase
            )));
        }
        if let Some(key) = self
            .plan
            .sections()
            .iter()
            .find(|k| !self.is_saved(**k))
        {
            return Err(SessionError::NotFinalizable(format!(
                "section {key} is not saved"
            )));
        }

        let mut validation = ValidationResults::default();
        for v in self.validation.values() {
            validation.extend(v);
        }

        self.phase = SessionPhase::Finalized;
        Ok(FinalResult {
            polling_station_id: self.station.id,
            entry_number: self.entry_number,
            typist: self.typist.clone(),
            results: self.results.clone(),
            validation,
        })
    }

    // --- internals ---------------------------------------------------------

    /// Write `values` into the working data and revalidate their section.
    fn store(&mut self, values: SectionValues) -> ValidationResults {
        let key = values.key();
        if self.results.apply(values) {
            self.accepted.remove(&key);
            for dep in self.plan.dependents(key) {
                self.validation.remove(&dep);
                self.accepted.remove(&dep);
            }
        }
        let validation = validate_results(key, &self.results, &self.ctx);
        self.validation.insert(key, validation.clone());
        validation
    }

    fn settle_phase(&mut self) {
        let all_saved = self.plan.sections().iter().all(|k| self.is_saved(*k));
        self.phase = if self.current == SectionKey::CheckAndSave && all_saved {
            SessionPhase::AwaitingFinalConfirmation
        } else if self.validation.contains_key(&self.current) && !self.is_saved(self.current) {
            SessionPhase::Blocked
        } else if self.validation.is_empty() && self.draft.is_none() {
            SessionPhase::Empty
        } else {
            SessionPhase::Active
        };
    }

    fn require_input(&self, action: &'static str) -> Result<(), SessionError> {
        if self.phase.accepts_input() {
            Ok(())
        } else {
            Err(self.invalid_phase(action))
        }
    }

    fn require_current(&self, values: &SectionValues) -> Result<(), SessionError> {
        let got = values.key();
        if got == self.current {
            Ok(())
        } else {
            Err(SessionError::WrongSection {
                current: self.current,
                got,
            })
        }
    }

    fn invalid_phase(&self, action: &'static str) -> SessionError {
        SessionError::InvalidPhase {
            action,
            phase: self.phase.clone(),
        }
    }
}
