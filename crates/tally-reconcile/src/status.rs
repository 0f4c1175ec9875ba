//! Polling-station data-entry status machine.
//!
//! # Design
//!
//! One [`DataEntryStatus`] per polling station, owned by the persistence
//! side. Every request from a typist or coordinator is a [`DataEntryEvent`]
//! applied via [`DataEntryStatus::apply`], which either moves to the next
//! status or returns a [`TransitionError`] and leaves the status unchanged.
//!
//! ```text
//!   FirstEntryNotStarted ──claim(1)──► FirstEntryInProgress
//!        ▲     ▲                          │ finalize
//!        │     │ discard_first            ├──(accepted errors)──► FirstEntryHasErrors
//!        │     └──────────────────────────┤                          │ resume_first
//!        │                                ▼                          ▼
//!        │                     SecondEntryNotStarted ◄──┐   FirstEntryInProgress
//!        │                                │ claim(2)    │ keep_first / keep_second
//!        │                                ▼             │
//!        │                     SecondEntryInProgress    │
//!        │                                │ finalize    │
//!        │ discard_both                   ▼             │
//!        └──────────────────────── EntriesDifferent ────┘
//!                                   (or Definitive)
//! ```
//!
//! The second entry must be typed by someone other than the typist of the
//! first (or kept) entry. That rule is checked at claim time.

use std::fmt;

use serde::{Deserialize, Serialize};
use tally_schemas::{
    EntryNumber, FinalResult, ProgressMarker, SectionKey, SessionSnapshot, TypistId,
};

use crate::{reconcile, Outcome, Resolution, ResolveDecision, ResolveErrorsDecision};

// ---------------------------------------------------------------------------
// Status
// ---------------------------------------------------------------------------

/// Claim state of an entry that has been started but not finalized.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryProgress {
    pub typist: TypistId,
    /// `false` while suspended: only `typist` may claim it again.
    pub claimed: bool,
    /// Last saved snapshot, `None` until the first save.
    #[serde(default)]
    pub snapshot: Option<SessionSnapshot>,
}

impl EntryProgress {
    fn claimed_by(typist: TypistId) -> Self {
        Self {
            typist,
            claimed: true,
            snapshot: None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DataEntryStatus {
    FirstEntryNotStarted,
    FirstEntryInProgress {
        first: EntryProgress,
    },
    /// Finalized with accepted errors; waits for a coordinator.
    FirstEntryHasErrors {
        first: FinalResult,
        snapshot: SessionSnapshot,
    },
    SecondEntryNotStarted {
        first: FinalResult,
    },
    SecondEntryInProgress {
        first: FinalResult,
        second: EntryProgress,
    },
    EntriesDifferent {
        record: crate::ReconciliationRecord,
    },
    /// **Terminal.**
    Definitive {
        result: FinalResult,
    },
}

impl Default for DataEntryStatus {
    fn default() -> Self {
        Self::FirstEntryNotStarted
    }
}

impl DataEntryStatus {
    pub fn name(&self) -> &'static str {
        match self {
            Self::FirstEntryNotStarted => "first_entry_not_started",
            Self::FirstEntryInProgress { .. } => "first_entry_in_progress",
            Self::FirstEntryHasErrors { .. } => "first_entry_has_errors",
            Self::SecondEntryNotStarted { .. } => "second_entry_not_started",
            Self::SecondEntryInProgress { .. } => "second_entry_in_progress",
            Self::EntriesDifferent { .. } => "entries_different",
            Self::Definitive { .. } => "definitive",
        }
    }

    /// The in-progress entry with this number, if any.
    pub fn in_progress(&self, entry: EntryNumber) -> Option<&EntryProgress> {
        match (self, entry) {
            (Self::FirstEntryInProgress { first }, EntryNumber::First) => Some(first),
            (Self::SecondEntryInProgress { second, .. }, EntryNumber::Second) => Some(second),
            _ => None,
        }
    }

    fn in_progress_mut(&mut self, entry: EntryNumber) -> Option<&mut EntryProgress> {
        match (self, entry) {
            (Self::FirstEntryInProgress { first }, EntryNumber::First) => Some(first),
            (Self::SecondEntryInProgress { second, .. }, EntryNumber::Second) => Some(second),
            _ => None,
        }
    }

    /// Has entry `entry` already been finalized?
    fn is_finalized(&self, entry: EntryNumber) -> bool {
        match self {
            Self::FirstEntryNotStarted | Self::FirstEntryInProgress { .. } => false,
            Self::FirstEntryHasErrors { .. }
            | Self::SecondEntryNotStarted { .. }
            | Self::SecondEntryInProgress { .. } => entry == EntryNumber::First,
            Self::EntriesDifferent { .. } | Self::Definitive { .. } => true,
        }
    }
}

impl fmt::Display for DataEntryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq)]
pub enum DataEntryEvent {
    Claim {
        entry: EntryNumber,
        typist: TypistId,
    },
    Save {
        entry: EntryNumber,
        typist: TypistId,
        snapshot: SessionSnapshot,
    },
    /// Keep the saved data, drop the claim (suspend).
    Release {
        entry: EntryNumber,
        typist: TypistId,
    },
    Finalize {
        entry: EntryNumber,
        typist: TypistId,
        result: FinalResult,
    },
    Discard {
        entry: EntryNumber,
        typist: TypistId,
    },
    ResolveDifferences(ResolveDecision),
    ResolveErrors(ResolveErrorsDecision),
}

impl DataEntryEvent {
    fn label(&self) -> String {
        match self {
            Self::Claim { entry, typist } => format!("claim({entry}, {typist})"),
            Self::Save { entry, typist, .. } => format!("save({entry}, {typist})"),
            Self::Release { entry, typist } => format!("release({entry}, {typist})"),
            Self::Finalize { entry, typist, .. } => format!("finalize({entry}, {typist})"),
            Self::Discard { entry, typist } => format!("discard({entry}, {typist})"),
            Self::ResolveDifferences(d) => format!("resolve_differences({d:?})"),
            Self::ResolveErrors(d) => format!("resolve_errors({d:?})"),
        }
    }
}

/// Knobs of the status machine that come from configuration.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusPolicy {
    /// After keep-first/keep-second, require a fresh second entry by a
    /// different typist. When `false` the kept entry becomes definitive.
    pub keep_requires_new_second_entry: bool,
}

impl Default for StatusPolicy {
    fn default() -> Self {
        Self {
            keep_requires_new_second_entry: true,
        }
    }
}

// ---------------------------------------------------------------------------
// TransitionError
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictKind {
    AlreadyClaimed,
    AlreadyFinalized,
    InvalidTransition,
    DifferentTypistRequired,
}

impl ConflictKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AlreadyClaimed => "AlreadyClaimed",
            Self::AlreadyFinalized => "AlreadyFinalized",
            Self::InvalidTransition => "InvalidTransition",
            Self::DifferentTypistRequired => "DifferentTypistRequired",
        }
    }
}

impl fmt::Display for ConflictKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when an event cannot be applied to the current status.
///
/// Terminal for the attempt that caused it: callers must not retry.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("{kind}: {event} in status {from}")]
pub struct TransitionError {
    pub kind: ConflictKind,
    pub from: &'static str,
    pub event: String,
}

// ---------------------------------------------------------------------------
// apply
// ---------------------------------------------------------------------------

impl DataEntryStatus {
    /// Apply one event. On error the status is unchanged.
    pub fn apply(
        &mut self,
        event: DataEntryEvent,
        policy: &StatusPolicy,
    ) -> Result<(), TransitionError> {
        let next = self.next(&event, policy).map_err(|kind| TransitionError {
            kind,
            from: self.name(),
            event: event.label(),
        })?;
        if let Some(next) = next {
            *self = next;
        }
        Ok(())
    }

    /// `Ok(None)` means the event was applied in place.
    fn next(
        &mut self,
        event: &DataEntryEvent,
        policy: &StatusPolicy,
    ) -> Result<Option<DataEntryStatus>, ConflictKind> {
        use ConflictKind::*;

        match event {
            DataEntryEvent::Claim { entry, typist } => {
                if self.is_finalized(*entry) {
                    return Err(AlreadyFinalized);
                }
                if let Some(progress) = self.in_progress_mut(*entry) {
                    // Resuming a suspended entry is reserved for its typist.
                    if progress.claimed || progress.typist != *typist {
                        return Err(AlreadyClaimed);
                    }
                    progress.claimed = true;
                    return Ok(None);
                }
                match (&*self, entry) {
                    (Self::FirstEntryNotStarted, EntryNumber::First) => {
                        Ok(Some(Self::FirstEntryInProgress {
                            first: EntryProgress::claimed_by(typist.clone()),
                        }))
                    }
                    (Self::SecondEntryNotStarted { first }, EntryNumber::Second) => {
                        if first.typist == *typist {
                            return Err(DifferentTypistRequired);
                        }
                        Ok(Some(Self::SecondEntryInProgress {
                            first: first.clone(),
                            second: EntryProgress::claimed_by(typist.clone()),
                        }))
                    }
                    _ => Err(InvalidTransition),
                }
            }

            DataEntryEvent::Save {
                entry,
                typist,
                snapshot,
            } => {
                let progress = self.owned_mut(*entry, typist)?;
                progress.snapshot = Some(snapshot.clone());
                Ok(None)
            }

            DataEntryEvent::Release { entry, typist } => {
                let progress = self.owned_mut(*entry, typist)?;
                progress.claimed = false;
                Ok(None)
            }

            DataEntryEvent::Discard { entry, typist } => {
                self.owned_mut(*entry, typist)?;
                match self {
                    Self::FirstEntryInProgress { .. } => Ok(Some(Self::FirstEntryNotStarted)),
                    Self::SecondEntryInProgress { first, .. } => {
                        Ok(Some(Self::SecondEntryNotStarted {
                            first: first.clone(),
                        }))
                    }
                    _ => Err(InvalidTransition),
                }
            }

            DataEntryEvent::Finalize {
                entry,
                typist,
                result,
            } => {
                let progress = self.owned_mut(*entry, typist)?;
                if result.entry_number != *entry || result.typist != *typist {
                    return Err(InvalidTransition);
                }
                let snapshot = progress.snapshot.clone().unwrap_or_else(|| SessionSnapshot {
                    results: result.results.clone(),
                    progress: ProgressMarker {
                        current_section: SectionKey::CheckAndSave,
                        validation: Default::default(),
                        accepted: Default::default(),
                    },
                });

                match self {
                    Self::FirstEntryInProgress { .. } => {
                        if result.has_accepted_errors() {
                            Ok(Some(Self::FirstEntryHasErrors {
                                first: result.clone(),
                                snapshot,
                            }))
                        } else {
                            Ok(Some(Self::SecondEntryNotStarted {
                                first: result.clone(),
                            }))
                        }
                    }
                    Self::SecondEntryInProgress { first, .. } => match reconcile(first, result) {
                        Outcome::Definitive(result) => Ok(Some(Self::Definitive { result })),
                        Outcome::DifferenceDetected { pending, .. } => {
                            Ok(Some(Self::EntriesDifferent { record: pending }))
                        }
                    },
                    _ => Err(InvalidTransition),
                }
            }

            DataEntryEvent::ResolveDifferences(decision) => {
                let Self::EntriesDifferent { record } = self else {
                    return Err(InvalidTransition);
                };
                let mut record = record.clone();
                match record.resolve(*decision).map_err(|_| InvalidTransition)? {
                    Resolution::Keep { kept, .. } if policy.keep_requires_new_second_entry => {
                        Ok(Some(Self::SecondEntryNotStarted { first: kept }))
                    }
                    Resolution::Keep { kept, .. } => Ok(Some(Self::Definitive { result: kept })),
                    Resolution::DiscardBoth => Ok(Some(Self::FirstEntryNotStarted)),
                }
            }

            DataEntryEvent::ResolveErrors(decision) => {
                let Self::FirstEntryHasErrors { first, snapshot } = self else {
                    return Err(InvalidTransition);
                };
                match decision {
                    ResolveErrorsDecision::ResumeFirst => Ok(Some(Self::FirstEntryInProgress {
                        first: EntryProgress {
                            typist: first.typist.clone(),
                            claimed: false,
                            snapshot: Some(snapshot.clone()),
                        },
                    })),
                    ResolveErrorsDecision::DiscardFirst => Ok(Some(Self::FirstEntryNotStarted)),
                }
            }
        }
    }

    /// The in-progress entry, if it is currently claimed by `typist`.
    fn owned_mut(
        &mut self,
        entry: EntryNumber,
        typist: &TypistId,
    ) -> Result<&mut EntryProgress, ConflictKind> {
        if self.is_finalized(entry) {
            return Err(ConflictKind::AlreadyFinalized);
        }
        match self.in_progress_mut(entry) {
            Some(p) if p.claimed && p.typist == *typist => Ok(p),
            Some(p) if p.typist != *typist => Err(ConflictKind::AlreadyClaimed),
            _ => Err(ConflictKind::InvalidTransition),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tally_schemas::{PollingStationResults, RuleCode, Severity, ValidationResults, Violation};

    fn t(name: &str) -> TypistId {
        TypistId::new(name)
    }

    fn result(entry: EntryNumber, typist: &str, blank: u32) -> FinalResult {
        let mut results = PollingStationResults::default();
        results.votes_counts.blank_votes_count = blank;
        FinalResult {
            polling_station_id: 1,
            entry_number: entry,
            typist: t(typist),
            results,
            validation: ValidationResults::default(),
        }
    }

    fn claim(entry: EntryNumber, typist: &str) -> DataEntryEvent {
        DataEntryEvent::Claim {
            entry,
            typist: t(typist),
        }
    }

    fn finalize(entry: EntryNumber, typist: &str, blank: u32) -> DataEntryEvent {
        DataEntryEvent::Finalize {
            entry,
            typist: t(typist),
            result: result(entry, typist, blank),
        }
    }

    fn kind(r: Result<(), TransitionError>) -> ConflictKind {
        r.unwrap_err().kind
    }

    fn p() -> StatusPolicy {
        StatusPolicy::default()
    }

    fn second_entry_not_started() -> DataEntryStatus {
        let mut s = DataEntryStatus::default();
        s.apply(claim(EntryNumber::First, "anna"), &p()).unwrap();
        s.apply(finalize(EntryNumber::First, "anna", 0), &p()).unwrap();
        s
    }

    fn entries_different() -> DataEntryStatus {
        let mut s = second_entry_not_started();
        s.apply(claim(EntryNumber::Second, "ben"), &p()).unwrap();
        s.apply(finalize(EntryNumber::Second, "ben", 1), &p()).unwrap();
        s
    }

    #[test]
    fn second_claim_on_claimed_entry_conflicts() {
        let mut s = DataEntryStatus::default();
        s.apply(claim(EntryNumber::First, "anna"), &p()).unwrap();
        let before = s.clone();
        assert_eq!(
            kind(s.apply(claim(EntryNumber::First, "ben"), &p())),
            ConflictKind::AlreadyClaimed
        );
        assert_eq!(
            kind(s.apply(claim(EntryNumber::First, "anna"), &p())),
            ConflictKind::AlreadyClaimed
        );
        assert_eq!(s, before);
    }

    #[test]
    fn suspended_entry_resumes_only_for_its_typist() {
        let mut s = DataEntryStatus::default();
        s.apply(claim(EntryNumber::First, "anna"), &p()).unwrap();
        s.apply(
            DataEntryEvent::Release {
                entry: EntryNumber::First,
                typist: t("anna"),
            },
            &p(),
        )
        .unwrap();
        assert_eq!(
            kind(s.apply(claim(EntryNumber::First, "ben"), &p())),
            ConflictKind::AlreadyClaimed
        );
        s.apply(claim(EntryNumber::First, "anna"), &p()).unwrap();
        assert!(s.in_progress(EntryNumber::First).unwrap().claimed);
    }

    #[test]
    fn save_requires_the_claim() {
        let mut s = DataEntryStatus::default();
        let save = |typist: &str| DataEntryEvent::Save {
            entry: EntryNumber::First,
            typist: t(typist),
            snapshot: SessionSnapshot {
                results: PollingStationResults::default(),
                progress: ProgressMarker {
                    current_section: SectionKey::VotersAndVotes,
                    validation: Default::default(),
                    accepted: Default::default(),
                },
            },
        };
        assert_eq!(kind(s.apply(save("anna"), &p())), ConflictKind::InvalidTransition);
        s.apply(claim(EntryNumber::First, "anna"), &p()).unwrap();
        assert_eq!(kind(s.apply(save("ben"), &p())), ConflictKind::AlreadyClaimed);
        s.apply(save("anna"), &p()).unwrap();
        assert!(s.in_progress(EntryNumber::First).unwrap().snapshot.is_some());
    }

    #[test]
    fn out_of_sequence_claims() {
        let mut s = DataEntryStatus::default();
        assert_eq!(
            kind(s.apply(claim(EntryNumber::Second, "ben"), &p())),
            ConflictKind::InvalidTransition
        );

        let mut s = second_entry_not_started();
        assert_eq!(
            kind(s.apply(claim(EntryNumber::First, "ben"), &p())),
            ConflictKind::AlreadyFinalized
        );
        assert_eq!(
            kind(s.apply(claim(EntryNumber::Second, "anna"), &p())),
            ConflictKind::DifferentTypistRequired
        );
    }

    #[test]
    fn equal_second_entry_is_definitive() {
        let mut s = second_entry_not_started();
        s.apply(claim(EntryNumber::Second, "ben"), &p()).unwrap();
        s.apply(finalize(EntryNumber::Second, "ben", 0), &p()).unwrap();
        assert_eq!(s.name(), "definitive");
        assert_eq!(
            kind(s.apply(claim(EntryNumber::Second, "carl"), &p())),
            ConflictKind::AlreadyFinalized
        );
    }

    #[test]
    fn keep_first_requires_a_different_typist_for_the_new_second_entry() {
        let mut s = entries_different();
        assert_eq!(s.name(), "entries_different");
        s.apply(DataEntryEvent::ResolveDifferences(ResolveDecision::KeepFirst), &p())
            .unwrap();
        assert_eq!(s.name(), "second_entry_not_started");

        assert_eq!(
            kind(s.apply(claim(EntryNumber::Second, "anna"), &p())),
            ConflictKind::DifferentTypistRequired
        );
        s.apply(claim(EntryNumber::Second, "ben"), &p()).unwrap();
    }

    #[test]
    fn keep_second_promotes_second_entry() {
        let mut s = entries_different();
        s.apply(DataEntryEvent::ResolveDifferences(ResolveDecision::KeepSecond), &p())
            .unwrap();
        match &s {
            DataEntryStatus::SecondEntryNotStarted { first } => {
                assert_eq!(first.typist, t("ben"));
                assert_eq!(first.entry_number, EntryNumber::First);
                assert_eq!(first.results.votes_counts.blank_votes_count, 1);
            }
            other => panic!("unexpected status {other}"),
        }
        assert_eq!(
            kind(s.apply(claim(EntryNumber::Second, "ben"), &p())),
            ConflictKind::DifferentTypistRequired
        );
    }

    #[test]
    fn keep_can_be_configured_to_finish_directly() {
        let policy = StatusPolicy {
            keep_requires_new_second_entry: false,
        };
        let mut s = entries_different();
        s.apply(
            DataEntryEvent::ResolveDifferences(ResolveDecision::KeepFirst),
            &policy,
        )
        .unwrap();
        assert_eq!(s.name(), "definitive");
    }

    #[test]
    fn first_decision_wins() {
        let mut s = entries_different();
        s.apply(DataEntryEvent::ResolveDifferences(ResolveDecision::DiscardBoth), &p())
            .unwrap();
        assert_eq!(s, DataEntryStatus::FirstEntryNotStarted);
        assert_eq!(
            kind(s.apply(DataEntryEvent::ResolveDifferences(ResolveDecision::KeepFirst), &p())),
            ConflictKind::InvalidTransition
        );
    }

    #[test]
    fn accepted_errors_route_first_entry_to_coordinator() {
        let mut s = DataEntryStatus::default();
        s.apply(claim(EntryNumber::First, "anna"), &p()).unwrap();
        let mut r = result(EntryNumber::First, "anna", 0);
        r.validation.errors.push(Violation {
            code: RuleCode::F201,
            fields: vec![],
            severity: Severity::Error,
        });
        s.apply(
            DataEntryEvent::Finalize {
                entry: EntryNumber::First,
                typist: t("anna"),
                result: r,
            },
            &p(),
        )
        .unwrap();
        assert_eq!(s.name(), "first_entry_has_errors");

        let mut resumed = s.clone();
        resumed
            .apply(DataEntryEvent::ResolveErrors(ResolveErrorsDecision::ResumeFirst), &p())
            .unwrap();
        let first = resumed.in_progress(EntryNumber::First).unwrap();
        assert_eq!(first.typist, t("anna"));
        assert!(!first.claimed);
        assert!(first.snapshot.is_some());

        s.apply(DataEntryEvent::ResolveErrors(ResolveErrorsDecision::DiscardFirst), &p())
            .unwrap();
        assert_eq!(s, DataEntryStatus::FirstEntryNotStarted);
    }

    #[test]
    fn discard_returns_entry_to_not_started() {
        let mut s = second_entry_not_started();
        s.apply(claim(EntryNumber::Second, "ben"), &p()).unwrap();
        s.apply(
            DataEntryEvent::Discard {
                entry: EntryNumber::Second,
                typist: t("ben"),
            },
            &p(),
        )
        .unwrap();
        assert_eq!(s.name(), "second_entry_not_started");
    }

    #[test]
    fn status_serializes_with_tag() {
        let json = serde_json::to_value(DataEntryStatus::default()).unwrap();
        assert_eq!(json["status"], "first_entry_not_started");
    }
}
