//! tally-reconcile
//!
//! Reconciliation of the two independent entries of a polling station, and
//! the polling-station data-entry status machine built around it.
//!
//! - Field comparison is exact; any difference escalates to a coordinator.
//! - A coordinator decision is consumed once; the first decision wins.
//! - Who may claim which entry is decided here, not by the typist's client.
//!
//! Deterministic, pure logic. No IO.

mod engine;
mod status;
mod types;

pub use engine::{diff_results, reconcile};
pub use status::*;
pub use types::*;
