use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::RuleCode;

// ---------------------------------------------------------------------------
// Polling station
// ---------------------------------------------------------------------------

/// A polling station as imported with the election definition.
/// Immutable during data entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollingStation {
    pub id: u32,
    pub election_id: u32,
    pub number: u32,
    pub name: String,
    /// Set when this station's results correct those of an earlier session.
    #[serde(default)]
    pub previous_session_id: Option<u32>,
}

impl PollingStation {
    pub fn has_previous_session_id(&self) -> bool {
        self.previous_session_id.is_some()
    }
}

// ---------------------------------------------------------------------------
// Entry number / typist
// ---------------------------------------------------------------------------

/// Which of the two independent tallies a session belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum EntryNumber {
    First,
    Second,
}

impl EntryNumber {
    pub fn as_u8(self) -> u8 {
        match self {
            EntryNumber::First => 1,
            EntryNumber::Second => 2,
        }
    }
}

/// Returned when an integer other than 1 or 2 is offered as entry number.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("entry number must be 1 or 2, got {0}")]
pub struct InvalidEntryNumber(pub u8);

impl TryFrom<u8> for EntryNumber {
    type Error = InvalidEntryNumber;

    fn try_from(v: u8) -> Result<Self, Self::Error> {
        match v {
            1 => Ok(EntryNumber::First),
            2 => Ok(EntryNumber::Second),
            other => Err(InvalidEntryNumber(other)),
        }
    }
}

impl From<EntryNumber> for u8 {
    fn from(e: EntryNumber) -> u8 {
        e.as_u8()
    }
}

impl fmt::Display for EntryNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_u8())
    }
}

/// Operator identity. Authentication happens outside this system; the
/// identity is only compared for equality (different-typist constraint).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TypistId(pub String);

impl TypistId {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TypistId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// Election context
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    pub number: u32,
    #[serde(default)]
    pub name: String,
}

/// A candidate list. `number` determines the order of the list sections.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoliticalGroup {
    pub number: u32,
    pub name: String,
    pub candidates: Vec<Candidate>,
}

/// Which optional sections this election's forms carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionLayout {
    #[serde(default = "yes")]
    pub extra_investigation: bool,
    #[serde(default = "yes")]
    pub counting_differences: bool,
}

fn yes() -> bool {
    true
}

impl Default for SectionLayout {
    fn default() -> Self {
        Self {
            extra_investigation: true,
            counting_differences: true,
        }
    }
}

/// External data that parameterises both the section plan and the rule set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElectionContext {
    pub election_id: u32,
    pub political_groups: Vec<PoliticalGroup>,
    #[serde(default)]
    pub layout: SectionLayout,
    /// Whether `voter_card_count` is a distinct field counted towards the
    /// admitted-voters total.
    #[serde(default = "yes")]
    pub voter_card_count: bool,
    /// Rules switched off for this election.
    #[serde(default)]
    pub disabled_rules: BTreeSet<RuleCode>,
}

impl ElectionContext {
    pub fn new(election_id: u32, political_groups: Vec<PoliticalGroup>) -> Self {
        Self {
            election_id,
            political_groups,
            layout: SectionLayout::default(),
            voter_card_count: true,
            disabled_rules: BTreeSet::new(),
        }
    }

    /// Groups sorted by number ascending.
    pub fn groups_in_order(&self) -> Vec<&PoliticalGroup> {
        let mut groups: Vec<&PoliticalGroup> = self.political_groups.iter().collect();
        groups.sort_by_key(|g| g.number);
        groups
    }

    pub fn group(&self, number: u32) -> Option<&PoliticalGroup> {
        self.political_groups.iter().find(|g| g.number == number)
    }

    pub fn rule_enabled(&self, code: RuleCode) -> bool {
        !self.disabled_rules.contains(&code)
    }
}
