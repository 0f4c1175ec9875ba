use tally_schemas::{RuleCode, SectionKey};

use crate::SessionPhase;

/// An action that violates the session's own invariants.
///
/// These never come from the data: a correct integration only offers
/// actions the session allows. Callers must not retry them.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    #[error("section {0} is not part of this entry's plan")]
    SectionMismatch(SectionKey),

    #[error("section {0} is not reachable yet")]
    NotReachable(SectionKey),

    #[error("values for {got} offered while {current} is the current section")]
    WrongSection { current: SectionKey, got: SectionKey },

    #[error("violation {0} cannot be accepted")]
    NotOverridable(RuleCode),

    #[error("section {0} has no violations to accept")]
    NothingToAccept(SectionKey),

    #[error("{action} is not allowed while the session is {phase:?}")]
    InvalidPhase {
        action: &'static str,
        phase: SessionPhase,
    },

    #[error("entry cannot be finalized: {0}")]
    NotFinalizable(String),
}
