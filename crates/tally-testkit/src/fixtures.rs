use std::sync::Arc;

use tally_schemas::{
    Candidate, CountingDifferencesPollingStation, ElectionContext, ExtraInvestigation,
    PoliticalGroup, PoliticalGroupVotes, PollingStation, PollingStationResults, SectionKey,
    SectionLayout, SectionValues, VotersCounts, VotesCounts, YesNo,
};

/// Election 1 with one list per entry of `candidates`, numbered from 1.
///
/// `full_layout` switches both optional sections on.
pub fn election(candidates: &[usize], full_layout: bool) -> Arc<ElectionContext> {
    let groups = candidates
        .iter()
        .enumerate()
        .map(|(i, &n)| PoliticalGroup {
            number: i as u32 + 1,
            name: format!("Lijst {}", i + 1),
            candidates: (1..=n as u32)
                .map(|number| Candidate {
                    number,
                    name: format!("Kandidaat {number}"),
                })
                .collect(),
        })
        .collect();
    let mut ctx = ElectionContext::new(1, groups);
    ctx.layout = SectionLayout {
        extra_investigation: full_layout,
        counting_differences: full_layout,
    };
    Arc::new(ctx)
}

pub fn station(id: u32) -> PollingStation {
    PollingStation {
        id,
        election_id: 1,
        number: 30 + id,
        name: format!("Stembureau {id}"),
        previous_session_id: None,
    }
}

/// A station whose results correct an earlier session.
pub fn station_with_previous_session(id: u32, previous_session_id: u32) -> PollingStation {
    PollingStation {
        previous_session_id: Some(previous_session_id),
        ..station(id)
    }
}

// ---------------------------------------------------------------------------
// Tally
// ---------------------------------------------------------------------------

/// What a typist reads off the paper form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tally {
    results: PollingStationResults,
}

impl Tally {
    /// 100 admitted voters, 100 votes, all on the first candidate of the
    /// first list. No differences, every question answered "no".
    pub fn balanced(ctx: &ElectionContext) -> Self {
        let mut results = PollingStationResults::empty(ctx);
        results.extra_investigation = ExtraInvestigation {
            extra_investigation_other_reason: YesNo::no(),
            ballots_recounted_extra_investigation: YesNo::no(),
        };
        results.counting_differences_polling_station = CountingDifferencesPollingStation {
            unexplained_difference_ballots_voters: YesNo::no(),
            difference_ballots_per_list: YesNo::no(),
        };
        results.voters_counts = VotersCounts {
            poll_card_count: 90,
            proxy_certificate_count: 10,
            voter_card_count: 0,
            total_admitted_voters_count: 100,
        };
        results.votes_counts = VotesCounts {
            votes_candidates_count: 100,
            blank_votes_count: 0,
            invalid_votes_count: 0,
            total_votes_cast_count: 100,
        };
        if let Some(first) = results.political_group_votes.first_mut() {
            set_votes(first, 0, 100);
        }
        Self { results }
    }

    /// Misreport the admitted-voters total only. Fires F201.
    pub fn with_admitted_total(mut self, total: u32) -> Self {
        self.results.voters_counts.total_admitted_voters_count = total;
        self
    }

    /// Move `votes` from the first candidate of `group` to candidate
    /// `to` (1-based). List and overall totals stay consistent.
    pub fn with_moved_votes(mut self, group: u32, to: u32, votes: u32) -> Self {
        if let Some(list) = self
            .results
            .political_group_votes
            .iter_mut()
            .find(|g| g.number == group)
        {
            let first = list.candidate_votes.first().map_or(0, |c| c.votes);
            let moved = votes.min(first);
            set_votes(list, 0, first - moved);
            let idx = to.saturating_sub(1) as usize;
            let current = list.candidate_votes.get(idx).map_or(0, |c| c.votes);
            set_votes(list, idx, current + moved);
        }
        self
    }

    pub fn results(&self) -> &PollingStationResults {
        &self.results
    }

    /// The values of one section as the typist would submit them.
    pub fn values(&self, key: SectionKey) -> SectionValues {
        self.results.section(key)
    }
}

fn set_votes(list: &mut PoliticalGroupVotes, candidate_index: usize, votes: u32) {
    if let Some(slot) = list.candidate_votes.get_mut(candidate_index) {
        slot.votes = votes;
    }
    list.total = list.candidate_votes.iter().map(|c| c.votes).sum();
}
