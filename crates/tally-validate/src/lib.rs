//! tally-validate
//!
//! Validation Rule Engine for polling-station tallies.
//!
//! - Every rule has a stable code and a fixed severity; severity never
//!   depends on the data.
//! - All rules owned by a section run on every call; nothing short-circuits.
//! - Zero is a valid count. An empty candidate list is still validated.
//!
//! Pure deterministic logic. No IO, no hidden state.

mod engine;
mod rules;

pub use engine::{validate, validate_all, validate_results};
pub use rules::{is_overridable, rule, rules, RuleScope, RuleSpec};
