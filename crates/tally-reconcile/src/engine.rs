use std::fmt::Display;

use tally_schemas::{FieldPath, FinalResult, PollingStationResults, YesNo};

use crate::{FieldDifference, Outcome, ReconciliationRecord, ResultsDiff};

fn push_if_different<T: PartialEq + Display>(
    diffs: &mut Vec<FieldDifference>,
    field: FieldPath,
    first: T,
    second: T,
) {
    if first != second {
        diffs.push(FieldDifference {
            field,
            first: first.to_string(),
            second: second.to_string(),
        });
    }
}

fn compare_yes_no(
    diffs: &mut Vec<FieldDifference>,
    section: &str,
    name: &str,
    first: YesNo,
    second: YesNo,
) {
    push_if_different(
        diffs,
        FieldPath::field(section, &format!("{name}.yes")),
        first.yes,
        second.yes,
    );
    push_if_different(
        diffs,
        FieldPath::field(section, &format!("{name}.no")),
        first.no,
        second.no,
    );
}

macro_rules! compare_counts {
    ($diffs:expr, $section:literal, $a:expr, $b:expr, [$($field:ident),+ $(,)?]) => {
        $(
            push_if_different(
                $diffs,
                FieldPath::field($section, stringify!($field)),
                $a.$field,
                $b.$field,
            );
        )+
    };
}

/// Exact, field-by-field comparison of two entries.
///
/// Lists are matched by group number. A list present in only one entry is
/// reported as a single difference on its total.
pub fn diff_results(first: &PollingStationResults, second: &PollingStationResults) -> ResultsDiff {
    let mut diffs = Vec::new();

    let (a, b) = (&first.extra_investigation, &second.extra_investigation);
    compare_yes_no(
        &mut diffs,
        "extra_investigation",
        "extra_investigation_other_reason",
        a.extra_investigation_other_reason,
        b.extra_investigation_other_reason,
    );
    compare_yes_no(
        &mut diffs,
        "extra_investigation",
        "ballots_recounted_extra_investigation",
        a.ballots_recounted_extra_investigation,
        b.ballots_recounted_extra_investigation,
    );

    let (a, b) = (
        &first.counting_differences_polling_station,
        &second.counting_differences_polling_station,
    );
    compare_yes_no(
        &mut diffs,
        "counting_differences_polling_station",
        "unexplained_difference_ballots_voters",
        a.unexplained_difference_ballots_voters,
        b.unexplained_difference_ballots_voters,
    );
    compare_yes_no(
        &mut diffs,
        "counting_differences_polling_station",
        "difference_ballots_per_list",
        a.difference_ballots_per_list,
        b.difference_ballots_per_list,
    );

    compare_counts!(
        &mut diffs,
        "voters_counts",
        first.voters_counts,
        second.voters_counts,
        [
            poll_card_count,
            proxy_certificate_count,
            voter_card_count,
            total_admitted_voters_count,
        ]
    );
    compare_counts!(
        &mut diffs,
        "votes_counts",
        first.votes_counts,
        second.votes_counts,
        [
            votes_candidates_count,
            blank_votes_count,
            invalid_votes_count,
            total_votes_cast_count,
        ]
    );
    compare_counts!(
        &mut diffs,
        "differences_counts",
        first.differences_counts,
        second.differences_counts,
        [
            more_ballots_count,
            fewer_ballots_count,
            unreturned_ballots_count,
            too_few_ballots_handed_out_count,
            too_many_ballots_handed_out_count,
            other_explanation_count,
            no_explanation_count,
        ]
    );

    // Union of list numbers, in order.
    let mut numbers: Vec<u32> = first
        .political_group_votes
        .iter()
        .chain(second.political_group_votes.iter())
        .map(|g| g.number)
        .collect();
    numbers.sort_unstable();
    numbers.dedup();

    for (index, number) in numbers.into_iter().enumerate() {
        match (first.group(number), second.group(number)) {
            (Some(a), Some(b)) => {
                push_if_different(&mut diffs, FieldPath::group_total(index), a.total, b.total);
                let candidates = a.candidate_votes.len().max(b.candidate_votes.len());
                for c in 0..candidates {
                    let va = a.candidate_votes.get(c).map_or(0, |v| v.votes);
                    let vb = b.candidate_votes.get(c).map_or(0, |v| v.votes);
                    push_if_different(&mut diffs, FieldPath::candidate(index, c), va, vb);
                }
            }
            (a, b) => {
                let show = |g: Option<&tally_schemas::PoliticalGroupVotes>| {
                    g.map_or_else(|| "missing".to_string(), |g| g.total.to_string())
                };
                diffs.push(FieldDifference {
                    field: FieldPath::group_total(index),
                    first: show(a),
                    second: show(b),
                });
            }
        }
    }

    diffs.sort();
    ResultsDiff { differences: diffs }
}

/// Compare two finalized entries of the same polling station.
///
/// Only the tally fields take part; who typed the entries and which
/// violations they accepted do not.
pub fn reconcile(entry1: &FinalResult, entry2: &FinalResult) -> Outcome {
    let diff = diff_results(&entry1.results, &entry2.results);
    if diff.is_empty() {
        return Outcome::Definitive(entry1.clone());
    }

    Outcome::DifferenceDetected {
        diff: diff.clone(),
        pending: ReconciliationRecord {
            polling_station_id: entry1.polling_station_id,
            first: entry1.clone(),
            second: entry2.clone(),
            diff,
            resolution: None,
        },
    }
}
