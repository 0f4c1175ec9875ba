use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{
    CountingDifferencesPollingStation, DifferencesCounts, ExtraInvestigation, PoliticalGroupVotes,
    ValidationResults, VotersCounts, VotesCounts,
};

// ---------------------------------------------------------------------------
// SectionKey
// ---------------------------------------------------------------------------

/// One step of the data-entry sequence.
///
/// The derived `Ord` is the sequence order: variant order first, candidate
/// lists by group number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum SectionKey {
    ExtraInvestigation,
    CountingDifferences,
    VotersAndVotes,
    Differences,
    PoliticalGroupVotes(u32),
    CheckAndSave,
}

const LIST_PREFIX: &str = "political_group_votes_";

impl SectionKey {
    pub fn id(&self) -> String {
        match self {
            SectionKey::ExtraInvestigation => "extra_investigation".to_string(),
            SectionKey::CountingDifferences => "counting_differences_polling_station".to_string(),
            SectionKey::VotersAndVotes => "voters_votes_counts".to_string(),
            SectionKey::Differences => "differences_counts".to_string(),
            SectionKey::PoliticalGroupVotes(n) => format!("{LIST_PREFIX}{n}"),
            SectionKey::CheckAndSave => "save".to_string(),
        }
    }

    pub fn is_list(&self) -> bool {
        matches!(self, SectionKey::PoliticalGroupVotes(_))
    }
}

impl fmt::Display for SectionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.id())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown section id: {0:?}")]
pub struct UnknownSection(pub String);

impl FromStr for SectionKey {
    type Err = UnknownSection;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "extra_investigation" => Ok(SectionKey::ExtraInvestigation),
            "counting_differences_polling_station" => Ok(SectionKey::CountingDifferences),
            "voters_votes_counts" => Ok(SectionKey::VotersAndVotes),
            "differences_counts" => Ok(SectionKey::Differences),
            "save" => Ok(SectionKey::CheckAndSave),
            other => other
                .strip_prefix(LIST_PREFIX)
                .and_then(|n| n.parse::<u32>().ok())
                .map(SectionKey::PoliticalGroupVotes)
                .ok_or_else(|| UnknownSection(other.to_string())),
        }
    }
}

impl TryFrom<String> for SectionKey {
    type Error = UnknownSection;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<SectionKey> for String {
    fn from(k: SectionKey) -> String {
        k.id()
    }
}

// ---------------------------------------------------------------------------
// SectionValues
// ---------------------------------------------------------------------------

/// The field values belonging to exactly one section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "section", rename_all = "snake_case")]
pub enum SectionValues {
    ExtraInvestigation(ExtraInvestigation),
    CountingDifferences(CountingDifferencesPollingStation),
    VotersAndVotes {
        voters_counts: VotersCounts,
        votes_counts: VotesCounts,
    },
    Differences(DifferencesCounts),
    PoliticalGroupVotes(PoliticalGroupVotes),
    /// The final check has no fields of its own.
    CheckAndSave,
}

impl SectionValues {
    pub fn key(&self) -> SectionKey {
        match self {
            SectionValues::ExtraInvestigation(_) => SectionKey::ExtraInvestigation,
            SectionValues::CountingDifferences(_) => SectionKey::CountingDifferences,
            SectionValues::VotersAndVotes { .. } => SectionKey::VotersAndVotes,
            SectionValues::Differences(_) => SectionKey::Differences,
            SectionValues::PoliticalGroupVotes(g) => SectionKey::PoliticalGroupVotes(g.number),
            SectionValues::CheckAndSave => SectionKey::CheckAndSave,
        }
    }
}

// ---------------------------------------------------------------------------
// ProgressMarker
// ---------------------------------------------------------------------------

/// Where a typist is and what has been validated, persisted with each save.
///
/// A section present in `validation` has been submitted and not invalidated
/// since; `accepted` holds the sections whose violations were overridden.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressMarker {
    pub current_section: SectionKey,
    #[serde(default)]
    pub validation: BTreeMap<SectionKey, ValidationResults>,
    #[serde(default)]
    pub accepted: BTreeSet<SectionKey>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn section_ids_round_trip_through_from_str() {
        for key in [
            SectionKey::ExtraInvestigation,
            SectionKey::CountingDifferences,
            SectionKey::VotersAndVotes,
            SectionKey::Differences,
            SectionKey::PoliticalGroupVotes(12),
            SectionKey::CheckAndSave,
        ] {
            assert_eq!(key.id().parse::<SectionKey>().unwrap(), key);
        }
        assert!("political_group_votes_x".parse::<SectionKey>().is_err());
        assert!("voters".parse::<SectionKey>().is_err());
    }

    #[test]
    fn ordering_puts_lists_between_differences_and_save() {
        let mut keys = vec![
            SectionKey::CheckAndSave,
            SectionKey::PoliticalGroupVotes(2),
            SectionKey::VotersAndVotes,
            SectionKey::PoliticalGroupVotes(1),
            SectionKey::Differences,
            SectionKey::ExtraInvestigation,
        ];
        keys.sort();
        assert_eq!(
            keys,
            vec![
                SectionKey::ExtraInvestigation,
                SectionKey::VotersAndVotes,
                SectionKey::Differences,
                SectionKey::PoliticalGroupVotes(1),
                SectionKey::PoliticalGroupVotes(2),
                SectionKey::CheckAndSave,
            ]
        );
    }

    #[test]
    fn section_key_serializes_as_map_key() {
        let mut m = BTreeMap::new();
        m.insert(SectionKey::PoliticalGroupVotes(3), 1u8);
        let s = serde_json::to_string(&m).unwrap();
        assert_eq!(s, r#"{"political_group_votes_3":1}"#);
        let back: BTreeMap<SectionKey, u8> = serde_json::from_str(&s).unwrap();
        assert_eq!(back, m);
    }
}
