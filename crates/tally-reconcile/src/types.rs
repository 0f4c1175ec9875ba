use serde::{Deserialize, Serialize};
use tally_schemas::{EntryNumber, FieldPath, FinalResult};

/// One field whose value differs between the two entries.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FieldDifference {
    pub field: FieldPath,
    pub first: String,
    pub second: String,
}

/// Every differing field, sorted by path.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultsDiff {
    pub differences: Vec<FieldDifference>,
}

impl ResultsDiff {
    pub fn is_empty(&self) -> bool {
        self.differences.is_empty()
    }

    pub fn fields(&self) -> Vec<&FieldPath> {
        self.differences.iter().map(|d| &d.field).collect()
    }
}

/// Coordinator decision on two differing entries.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolveDecision {
    KeepFirst,
    KeepSecond,
    DiscardBoth,
}

/// Coordinator decision on a first entry finalized with accepted errors.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolveErrorsDecision {
    ResumeFirst,
    DiscardFirst,
}

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ReconcileError {
    #[error("difference for polling station {0} was already resolved")]
    AlreadyResolved(u32),
}

/// A pending coordinator decision over two differing entries.
///
/// Resolving consumes the record: the first decision wins, any later one
/// fails with [`ReconcileError::AlreadyResolved`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconciliationRecord {
    pub polling_station_id: u32,
    pub first: FinalResult,
    pub second: FinalResult,
    pub diff: ResultsDiff,
    #[serde(default)]
    pub resolution: Option<ResolveDecision>,
}

/// What a resolved record leaves behind.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Resolution {
    /// `kept` is renumbered as the first entry; `discarded` is dropped.
    Keep {
        kept: FinalResult,
        discarded: FinalResult,
    },
    DiscardBoth,
}

impl ReconciliationRecord {
    pub fn is_resolved(&self) -> bool {
        self.resolution.is_some()
    }

    pub fn resolve(&mut self, decision: ResolveDecision) -> Result<Resolution, ReconcileError> {
        if self.is_resolved() {
            return Err(ReconcileError::AlreadyResolved(self.polling_station_id));
        }
        self.resolution = Some(decision);

        Ok(match decision {
            ResolveDecision::KeepFirst => Resolution::Keep {
                kept: self.first.clone(),
                discarded: self.second.clone(),
            },
            ResolveDecision::KeepSecond => {
                let mut kept = self.second.clone();
                kept.entry_number = EntryNumber::First;
                Resolution::Keep {
                    kept,
                    discarded: self.first.clone(),
                }
            }
            ResolveDecision::DiscardBoth => Resolution::DiscardBoth,
        })
    }
}

/// Result of comparing two finalized entries.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Outcome {
    /// Every compared field is equal; carries the first entry.
    Definitive(FinalResult),
    DifferenceDetected {
        diff: ResultsDiff,
        pending: ReconciliationRecord,
    },
}

impl Outcome {
    pub fn is_definitive(&self) -> bool {
        matches!(self, Outcome::Definitive(_))
    }
}
