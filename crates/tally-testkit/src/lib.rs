//! tally-testkit
//!
//! Shared fixtures and drivers for scenario tests that span crates:
//!
//! - [`fixtures`]: election contexts, polling stations and a [`Tally`] of
//!   consistent counts that can be bent into specific violations.
//! - [`explore`]: breadth-first traversal of the entry session's state space.
//! - [`double_entry`]: drives two typists through an in-memory gateway.

pub mod double_entry;
pub mod explore;
pub mod fixtures;

pub use double_entry::{enter_and_finalize, DoubleEntry};
pub use explore::{explore, Action, Exploration, Step};
pub use fixtures::{election, station, station_with_previous_session, Tally};
