//! Progress indicator: a pure projection of a session onto one status per
//! section.
//!
//! When several conditions hold, the first one in this order wins:
//! active > error > warning > accepted > saved > unreachable > empty.

use serde::Serialize;
use tally_schemas::SectionKey;

use crate::sequencer::reachable_sections;
use crate::EntrySession;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgressStatus {
    Active,
    Error,
    Warning,
    Accepted,
    Saved,
    Unreachable,
    Empty,
}

impl ProgressStatus {
    /// Accessible label shown next to the section in the menu.
    pub fn label(&self) -> &'static str {
        match self {
            ProgressStatus::Active => "active",
            ProgressStatus::Error => "contains errors",
            ProgressStatus::Warning => "contains warnings",
            ProgressStatus::Accepted => "accepted",
            ProgressStatus::Saved => "saved",
            ProgressStatus::Unreachable => "unreachable",
            ProgressStatus::Empty => "empty",
        }
    }
}

pub fn status(key: SectionKey, session: &EntrySession) -> ProgressStatus {
    if !session.plan().contains(key) {
        return ProgressStatus::Unreachable;
    }
    if key == session.current_section() {
        return ProgressStatus::Active;
    }

    if let Some(v) = session.validation(key) {
        let accepted = session.is_accepted(key);
        return if v.has_errors() && !accepted {
            ProgressStatus::Error
        } else if v.has_warnings() && !accepted {
            ProgressStatus::Warning
        } else if accepted {
            ProgressStatus::Accepted
        } else {
            ProgressStatus::Saved
        };
    }

    if reachable_sections(session).contains(&key) {
        ProgressStatus::Empty
    } else {
        ProgressStatus::Unreachable
    }
}

/// Status of every section in plan order.
pub fn menu(session: &EntrySession) -> Vec<(SectionKey, ProgressStatus)> {
    session
        .plan()
        .sections()
        .iter()
        .map(|&key| (key, status(key, session)))
        .collect()
}
