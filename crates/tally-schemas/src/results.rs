use serde::{Deserialize, Serialize};

use crate::{ElectionContext, SectionKey, SectionValues};

/// A yes/no question entered as two checkboxes.
///
/// Neither ticked = unanswered; both ticked = invalid.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct YesNo {
    pub yes: bool,
    pub no: bool,
}

impl YesNo {
    pub fn yes() -> Self {
        Self { yes: true, no: false }
    }

    pub fn no() -> Self {
        Self { yes: false, no: true }
    }

    pub fn is_answered(&self) -> bool {
        self.yes || self.no
    }

    pub fn is_both(&self) -> bool {
        self.yes && self.no
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtraInvestigation {
    pub extra_investigation_other_reason: YesNo,
    pub ballots_recounted_extra_investigation: YesNo,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CountingDifferencesPollingStation {
    pub unexplained_difference_ballots_voters: YesNo,
    pub difference_ballots_per_list: YesNo,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VotersCounts {
    pub poll_card_count: u32,
    pub proxy_certificate_count: u32,
    #[serde(default)]
    pub voter_card_count: u32,
    pub total_admitted_voters_count: u32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VotesCounts {
    pub votes_candidates_count: u32,
    pub blank_votes_count: u32,
    pub invalid_votes_count: u32,
    pub total_votes_cast_count: u32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DifferencesCounts {
    pub more_ballots_count: u32,
    pub fewer_ballots_count: u32,
    pub unreturned_ballots_count: u32,
    pub too_few_ballots_handed_out_count: u32,
    pub too_many_ballots_handed_out_count: u32,
    pub other_explanation_count: u32,
    pub no_explanation_count: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateVotes {
    pub number: u32,
    pub votes: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoliticalGroupVotes {
    pub number: u32,
    pub total: u32,
    pub candidate_votes: Vec<CandidateVotes>,
}

impl PoliticalGroupVotes {
    /// All-zero votes for `candidate_count` candidates numbered from 1.
    pub fn zeroed(number: u32, candidate_count: usize) -> Self {
        Self {
            number,
            total: 0,
            candidate_votes: (1..=candidate_count as u32)
                .map(|n| CandidateVotes { number: n, votes: 0 })
                .collect(),
        }
    }

    pub fn candidate_sum(&self) -> u64 {
        self.candidate_votes.iter().map(|c| u64::from(c.votes)).sum()
    }
}

/// All tally fields of one entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollingStationResults {
    #[serde(default)]
    pub extra_investigation: ExtraInvestigation,
    #[serde(default)]
    pub counting_differences_polling_station: CountingDifferencesPollingStation,
    pub voters_counts: VotersCounts,
    pub votes_counts: VotesCounts,
    pub differences_counts: DifferencesCounts,
    pub political_group_votes: Vec<PoliticalGroupVotes>,
}

impl PollingStationResults {
    /// Zeroed results with one list per group of the election, in group order.
    pub fn empty(ctx: &ElectionContext) -> Self {
        Self {
            political_group_votes: ctx
                .groups_in_order()
                .into_iter()
                .map(|g| PoliticalGroupVotes::zeroed(g.number, g.candidates.len()))
                .collect(),
            ..Self::default()
        }
    }

    pub fn group(&self, number: u32) -> Option<&PoliticalGroupVotes> {
        self.political_group_votes.iter().find(|g| g.number == number)
    }

    /// Extract the values of one section.
    ///
    /// A list section for a group that has no entry yields an empty list.
    pub fn section(&self, key: SectionKey) -> SectionValues {
        match key {
            SectionKey::ExtraInvestigation => {
                SectionValues::ExtraInvestigation(self.extra_investigation)
            }
            SectionKey::CountingDifferences => {
                SectionValues::CountingDifferences(self.counting_differences_polling_station)
            }
            SectionKey::VotersAndVotes => SectionValues::VotersAndVotes {
                voters_counts: self.voters_counts,
                votes_counts: self.votes_counts,
            },
            SectionKey::Differences => SectionValues::Differences(self.differences_counts),
            SectionKey::PoliticalGroupVotes(n) => SectionValues::PoliticalGroupVotes(
                self.group(n)
                    .cloned()
                    .unwrap_or_else(|| PoliticalGroupVotes::zeroed(n, 0)),
            ),
            SectionKey::CheckAndSave => SectionValues::CheckAndSave,
        }
    }

    /// Write the values of one section back. Returns `true` if anything changed.
    pub fn apply(&mut self, values: SectionValues) -> bool {
        if self.section(values.key()) == values {
            return false;
        }
        match values {
            SectionValues::ExtraInvestigation(v) => self.extra_investigation = v,
            SectionValues::CountingDifferences(v) => self.counting_differences_polling_station = v,
            SectionValues::VotersAndVotes {
                voters_counts,
                votes_counts,
            } => {
                self.voters_counts = voters_counts;
                self.votes_counts = votes_counts;
            }
            SectionValues::Differences(v) => self.differences_counts = v,
            SectionValues::PoliticalGroupVotes(v) => {
                match self
                    .political_group_votes
                    .iter_mut()
                    .find(|g| g.number == v.number)
                {
                    Some(slot) => *slot = v,
                    None => {
                        self.political_group_votes.push(v);
                        self.political_group_votes.sort_by_key(|g| g.number);
                    }
                }
            }
            SectionValues::CheckAndSave => {}
        }
        true
    }
}
