//! tally-schemas
//!
//! Shared data model for two-fold data entry of polling-station tallies:
//! polling stations, entry numbers, the ordered section keys, the tally
//! fields themselves, rule violations and the election context that
//! parameterises the section plan and the rule set.
//!
//! Plain data only. No IO, no validation logic.

mod election;
mod results;
mod section;
mod violation;

pub use election::*;
pub use results::*;
pub use section::*;
pub use violation::*;

use serde::{Deserialize, Serialize};

/// Snapshot of an in-progress entry as persisted by the gateway.
///
/// `results` is the working data for every section (including sections not
/// yet submitted), `progress` records where the typist was and which
/// sections were validated/accepted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub results: PollingStationResults,
    pub progress: ProgressMarker,
}

/// Result of a finalized entry, handed to reconciliation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinalResult {
    pub polling_station_id: u32,
    pub entry_number: EntryNumber,
    pub typist: TypistId,
    pub results: PollingStationResults,
    /// Violations present at finalization. All of them were accepted by the
    /// typist; a non-empty `errors` list routes the entry to a coordinator.
    pub validation: ValidationResults,
}

impl FinalResult {
    /// `true` when the typist finalized with accepted blocking errors.
    pub fn has_accepted_errors(&self) -> bool {
        self.validation.has_errors()
    }
}
