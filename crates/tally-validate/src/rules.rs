use tally_schemas::{
    ElectionContext, FieldPath, PoliticalGroupVotes, PollingStationResults, RuleCode, Severity,
    YesNo,
};

// ---------------------------------------------------------------------------
// Rule catalogue types
// ---------------------------------------------------------------------------

/// Which section owns a rule. List rules run once per list section.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleScope {
    ExtraInvestigation,
    CountingDifferences,
    VotersAndVotes,
    Differences,
    PoliticalGroup,
    CheckAndSave,
}

/// Input handed to a rule check.
pub(crate) struct RuleInput<'a> {
    pub results: &'a PollingStationResults,
    pub ctx: &'a ElectionContext,
    /// Index into `results.political_group_votes` and the list itself,
    /// set only for `RuleScope::PoliticalGroup` rules.
    pub group: Option<(usize, &'a PoliticalGroupVotes)>,
}

type Check = fn(&RuleInput<'_>) -> Option<Vec<FieldPath>>;

/// One entry of the static rule catalogue.
pub struct RuleSpec {
    pub code: RuleCode,
    pub severity: Severity,
    pub scope: RuleScope,
    /// Whether a typist may accept this violation and continue.
    /// Warnings are always overridable.
    pub overridable: bool,
    pub description: &'static str,
    pub(crate) check: Check,
}

impl std::fmt::Debug for RuleSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RuleSpec")
            .field("code", &self.code)
            .field("severity", &self.severity)
            .field("scope", &self.scope)
            .field("overridable", &self.overridable)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Field path helpers
// ---------------------------------------------------------------------------

fn inv(field: &str) -> FieldPath {
    FieldPath::field("extra_investigation", field)
}

fn cdps(field: &str) -> FieldPath {
    FieldPath::field("counting_differences_polling_station", field)
}

fn voters(field: &str) -> FieldPath {
    FieldPath::field("voters_counts", field)
}

fn votes(field: &str) -> FieldPath {
    FieldPath::field("votes_counts", field)
}

fn diff(field: &str) -> FieldPath {
    FieldPath::field("differences_counts", field)
}

fn admitted(r: &PollingStationResults) -> u64 {
    u64::from(r.voters_counts.total_admitted_voters_count)
}

fn cast(r: &PollingStationResults) -> u64 {
    u64::from(r.votes_counts.total_votes_cast_count)
}

fn fires(cond: bool, fields: impl FnOnce() -> Vec<FieldPath>) -> Option<Vec<FieldPath>> {
    if cond {
        Some(fields())
    } else {
        None
    }
}

/// `part * 100 >= pct * whole`, in integers.
fn at_least_pct(part: u64, whole: u64, pct: u64) -> bool {
    part * 100 >= pct * whole
}

// ---------------------------------------------------------------------------
// Checks: investigation / counting differences
// ---------------------------------------------------------------------------

fn f101(i: &RuleInput<'_>) -> Option<Vec<FieldPath>> {
    let e = &i.results.extra_investigation;
    let a = e.extra_investigation_other_reason.is_answered();
    let b = e.ballots_recounted_extra_investigation.is_answered();
    fires(a != b, || {
        vec![
            inv("extra_investigation_other_reason"),
            inv("ballots_recounted_extra_investigation"),
        ]
    })
}

fn f102(i: &RuleInput<'_>) -> Option<Vec<FieldPath>> {
    let e = &i.results.extra_investigation;
    let mut fields = Vec::new();
    if e.extra_investigation_other_reason.is_both() {
        fields.push(inv("extra_investigation_other_reason"));
    }
    if e.ballots_recounted_extra_investigation.is_both() {
        fields.push(inv("ballots_recounted_extra_investigation"));
    }
    fires(!fields.is_empty(), || fields)
}

fn unanswered_or_both(
    pairs: [(&str, YesNo); 2],
    pred: fn(&YesNo) -> bool,
) -> Option<Vec<FieldPath>> {
    let fields: Vec<FieldPath> = pairs
        .iter()
        .filter(|(_, yn)| pred(yn))
        .map(|(name, _)| cdps(name))
        .collect();
    fires(!fields.is_empty(), || fields)
}

fn cdps_pairs(r: &PollingStationResults) -> [(&'static str, YesNo); 2] {
    let c = &r.counting_differences_polling_station;
    [
        (
            "unexplained_difference_ballots_voters",
            c.unexplained_difference_ballots_voters,
        ),
        ("difference_ballots_per_list", c.difference_ballots_per_list),
    ]
}

fn f111(i: &RuleInput<'_>) -> Option<Vec<FieldPath>> {
    unanswered_or_both(cdps_pairs(i.results), |yn| !yn.is_answered())
}

fn f112(i: &RuleInput<'_>) -> Option<Vec<FieldPath>> {
    unanswered_or_both(cdps_pairs(i.results), YesNo::is_both)
}

// ---------------------------------------------------------------------------
// Checks: voters and votes
// ---------------------------------------------------------------------------

fn f201(i: &RuleInput<'_>) -> Option<Vec<FieldPath>> {
    let v = &i.results.voters_counts;
    let mut sum = u64::from(v.poll_card_count) + u64::from(v.proxy_certificate_count);
    if i.ctx.voter_card_count {
        sum += u64::from(v.voter_card_count);
    }
    fires(sum != u64::from(v.total_admitted_voters_count), || {
        let mut fields = vec![
            voters("poll_card_count"),
            voters("proxy_certificate_count"),
        ];
        if i.ctx.voter_card_count {
            fields.push(voters("voter_card_count"));
        }
        fields.push(voters("total_admitted_voters_count"));
        fields
    })
}

fn f202(i: &RuleInput<'_>) -> Option<Vec<FieldPath>> {
    let v = &i.results.votes_counts;
    let sum = u64::from(v.votes_candidates_count)
        + u64::from(v.blank_votes_count)
        + u64::from(v.invalid_votes_count);
    fires(sum != u64::from(v.total_votes_cast_count), || {
        vec![
            votes("votes_candidates_count"),
            votes("blank_votes_count"),
            votes("invalid_votes_count"),
            votes("total_votes_cast_count"),
        ]
    })
}

fn w201(i: &RuleInput<'_>) -> Option<Vec<FieldPath>> {
    let total = cast(i.results);
    let blank = u64::from(i.results.votes_counts.blank_votes_count);
    fires(total > 0 && at_least_pct(blank, total, 3), || {
        vec![votes("blank_votes_count")]
    })
}

fn w202(i: &RuleInput<'_>) -> Option<Vec<FieldPath>> {
    let total = cast(i.results);
    let invalid = u64::from(i.results.votes_counts.invalid_votes_count);
    fires(total > 0 && at_least_pct(invalid, total, 3), || {
        vec![votes("invalid_votes_count")]
    })
}

fn w203(i: &RuleInput<'_>) -> Option<Vec<FieldPath>> {
    let a = admitted(i.results);
    let c = cast(i.results);
    let d = a.abs_diff(c);
    fires(d > 0 && (at_least_pct(d, a, 2) || d >= 15), || {
        vec![
            voters("total_admitted_voters_count"),
            votes("total_votes_cast_count"),
        ]
    })
}

fn w204(i: &RuleInput<'_>) -> Option<Vec<FieldPath>> {
    fires(cast(i.results) == 0, || vec![votes("total_votes_cast_count")])
}

// ---------------------------------------------------------------------------
// Checks: differences
// ---------------------------------------------------------------------------

fn f301(i: &RuleInput<'_>) -> Option<Vec<FieldPath>> {
    let (a, c) = (admitted(i.results), cast(i.results));
    let more = u64::from(i.results.differences_counts.more_ballots_count);
    fires(c > a && more != c - a, || vec![diff("more_ballots_count")])
}

fn f302(i: &RuleInput<'_>) -> Option<Vec<FieldPath>> {
    let (a, c) = (admitted(i.results), cast(i.results));
    let fewer = i.results.differences_counts.fewer_ballots_count;
    fires(c > a && fewer != 0, || vec![diff("fewer_ballots_count")])
}

fn f303(i: &RuleInput<'_>) -> Option<Vec<FieldPath>> {
    let (a, c) = (admitted(i.results), cast(i.results));
    let fewer = u64::from(i.results.differences_counts.fewer_ballots_count);
    fires(c < a && fewer != a - c, || vec![diff("fewer_ballots_count")])
}

fn f304(i: &RuleInput<'_>) -> Option<Vec<FieldPath>> {
    let (a, c) = (admitted(i.results), cast(i.results));
    let more = i.results.differences_counts.more_ballots_count;
    fires(c < a && more != 0, || vec![diff("more_ballots_count")])
}

fn f305(i: &RuleInput<'_>) -> Option<Vec<FieldPath>> {
    let (a, c) = (admitted(i.results), cast(i.results));
    let d = &i.results.differences_counts;
    let mut fields = Vec::new();
    if d.more_ballots_count != 0 {
        fields.push(diff("more_ballots_count"));
    }
    if d.fewer_ballots_count != 0 {
        fields.push(diff("fewer_ballots_count"));
    }
    fires(c == a && !fields.is_empty(), || fields)
}

fn explanation_fields() -> Vec<FieldPath> {
    vec![
        diff("unreturned_ballots_count"),
        diff("too_few_ballots_handed_out_count"),
        diff("too_many_ballots_handed_out_count"),
        diff("other_explanation_count"),
        diff("no_explanation_count"),
    ]
}

fn f306(i: &RuleInput<'_>) -> Option<Vec<FieldPath>> {
    let d = &i.results.differences_counts;
    let explained = i64::from(d.too_many_ballots_handed_out_count)
        + i64::from(d.other_explanation_count)
        + i64::from(d.no_explanation_count)
        - i64::from(d.unreturned_ballots_count)
        - i64::from(d.too_few_ballots_handed_out_count);
    fires(
        d.more_ballots_count > 0 && i64::from(d.more_ballots_count) != explained,
        || {
            let mut f = vec![diff("more_ballots_count")];
            f.extend(explanation_fields());
            f
        },
    )
}

fn f307(i: &RuleInput<'_>) -> Option<Vec<FieldPath>> {
    let d = &i.results.differences_counts;
    let explained = i64::from(d.unreturned_ballots_count)
        + i64::from(d.too_few_ballots_handed_out_count)
        + i64::from(d.other_explanation_count)
        + i64::from(d.no_explanation_count)
        - i64::from(d.too_many_ballots_handed_out_count);
    fires(
        d.fewer_ballots_count > 0 && i64::from(d.fewer_ballots_count) != explained,
        || {
            let mut f = vec![diff("fewer_ballots_count")];
            f.extend(explanation_fields());
            f
        },
    )
}

fn w301(i: &RuleInput<'_>) -> Option<Vec<FieldPath>> {
    fires(i.results.differences_counts.no_explanation_count > 0, || {
        vec![diff("no_explanation_count")]
    })
}

fn w302(i: &RuleInput<'_>) -> Option<Vec<FieldPath>> {
    let (a, c) = (admitted(i.results), cast(i.results));
    let d = &i.results.differences_counts;
    let any = d.unreturned_ballots_count != 0
        || d.too_few_ballots_handed_out_count != 0
        || d.too_many_ballots_handed_out_count != 0
        || d.other_explanation_count != 0
        || d.no_explanation_count != 0;
    fires(c == a && any, explanation_fields)
}

// ---------------------------------------------------------------------------
// Checks: candidate lists / final check
// ---------------------------------------------------------------------------

fn f401(i: &RuleInput<'_>) -> Option<Vec<FieldPath>> {
    let (idx, g) = i.group?;
    fires(g.candidate_sum() != u64::from(g.total), || {
        vec![FieldPath::group_total(idx)]
    })
}

fn f402(i: &RuleInput<'_>) -> Option<Vec<FieldPath>> {
    let (idx, g) = i.group?;
    let matches = match i.ctx.group(g.number) {
        None => false,
        Some(def) => {
            def.candidates.len() == g.candidate_votes.len()
                && def
                    .candidates
                    .iter()
                    .zip(g.candidate_votes.iter())
                    .all(|(c, v)| c.number == v.number)
        }
    };
    fires(!matches, || {
        vec![FieldPath::new(format!("data.political_group_votes[{idx}]"))]
    })
}

fn f204(i: &RuleInput<'_>) -> Option<Vec<FieldPath>> {
    let lists: u64 = i
        .results
        .political_group_votes
        .iter()
        .map(|g| u64::from(g.total))
        .sum();
    let candidates = u64::from(i.results.votes_counts.votes_candidates_count);
    fires(lists != candidates, || {
        let mut f = vec![votes("votes_candidates_count")];
        f.extend(
            (0..i.results.political_group_votes.len()).map(FieldPath::group_total),
        );
        f
    })
}

// ---------------------------------------------------------------------------
// Catalogue
// ---------------------------------------------------------------------------

macro_rules! rule {
    ($code:ident, $sev:ident, $scope:ident, $over:expr, $check:ident, $desc:expr) => {
        RuleSpec {
            code: RuleCode::$code,
            severity: Severity::$sev,
            scope: RuleScope::$scope,
            overridable: $over,
            description: $desc,
            check: $check,
        }
    };
}

static RULES: &[RuleSpec] = &[
    rule!(F101, Error, ExtraInvestigation, true, f101,
        "only one of the two investigation questions is answered"),
    rule!(F102, Error, ExtraInvestigation, false, f102,
        "an investigation question has both yes and no selected"),
    rule!(F111, Error, CountingDifferences, true, f111,
        "a counting-differences question is unanswered"),
    rule!(F112, Error, CountingDifferences, false, f112,
        "a counting-differences question has both yes and no selected"),
    rule!(F201, Error, VotersAndVotes, true, f201,
        "admitted voters mismatch: sub-counts do not add up to the total"),
    rule!(F202, Error, VotersAndVotes, true, f202,
        "votes mismatch: candidate, blank and invalid votes do not add up to the total"),
    rule!(F204, Error, CheckAndSave, true, f204,
        "votes on candidates do not equal the sum of all list totals"),
    rule!(F301, Error, Differences, true, f301,
        "more ballots than voters, but more_ballots_count does not match the difference"),
    rule!(F302, Error, Differences, true, f302,
        "more ballots than voters, but fewer_ballots_count is filled in"),
    rule!(F303, Error, Differences, true, f303,
        "fewer ballots than voters, but fewer_ballots_count does not match the difference"),
    rule!(F304, Error, Differences, true, f304,
        "fewer ballots than voters, but more_ballots_count is filled in"),
    rule!(F305, Error, Differences, true, f305,
        "ballots equal voters, but a difference is filled in"),
    rule!(F306, Error, Differences, true, f306,
        "explanations do not add up to more_ballots_count"),
    rule!(F307, Error, Differences, true, f307,
        "explanations do not add up to fewer_ballots_count"),
    rule!(F401, Error, PoliticalGroup, true, f401,
        "list total does not equal the sum of its candidate votes"),
    rule!(F402, Error, PoliticalGroup, false, f402,
        "list does not match the election's candidate list definition"),
    rule!(W201, Warning, VotersAndVotes, true, w201,
        "blank votes are 3% or more of all votes cast"),
    rule!(W202, Warning, VotersAndVotes, true, w202,
        "invalid votes are 3% or more of all votes cast"),
    rule!(W203, Warning, VotersAndVotes, true, w203,
        "admitted voters and votes cast differ by 2% or more, or by 15 or more"),
    rule!(W204, Warning, VotersAndVotes, true, w204,
        "no votes were cast"),
    rule!(W301, Warning, Differences, true, w301,
        "part of the difference has no explanation"),
    rule!(W302, Warning, Differences, true, w302,
        "explanations are filled in while ballots equal voters"),
];

/// The full static rule catalogue, in code order.
pub fn rules() -> &'static [RuleSpec] {
    RULES
}

/// Look up the catalogue entry for a code.
pub fn rule(code: RuleCode) -> Option<&'static RuleSpec> {
    RULES.iter().find(|r| r.code == code)
}

/// Whether a typist may accept a violation of this rule.
pub fn is_overridable(code: RuleCode) -> bool {
    rule(code).is_some_and(|r| r.severity == Severity::Warning || r.overridable)
}
