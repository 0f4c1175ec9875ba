//! tally-entry
//!
//! The per-typist data-entry workflow for one polling station and entry
//! number:
//!
//! - [`SectionPlan`] / [`reachable_sections`] / [`next_section`]: the fixed
//!   order of sections and which of them the typist may visit.
//! - [`EntrySession`]: the explicit state machine driven by typist actions.
//! - [`progress`]: the per-section display status derived from a session.
//!
//! Pure deterministic logic. No IO; persistence is the caller's job (see
//! `tally-gateway`).

mod error;
pub mod progress;
mod sequencer;
mod session;

pub use error::SessionError;
pub use progress::{menu, status, ProgressStatus};
pub use sequencer::{next_section, reachable_sections, SectionPlan};
pub use session::{
    AbortDecision, AbortOutcome, EntrySession, Navigation, SessionPhase, SubmitOutcome,
    UnsavedDecision,
};
