use std::collections::BTreeMap;

use tally_schemas::{
    ElectionContext, FieldPath, PollingStationResults, RuleCode, SectionKey, Severity,
    ValidationResults, Violation,
};

use crate::rules::{rules, RuleInput, RuleScope};

fn scope_of(section: SectionKey) -> RuleScope {
    match section {
        SectionKey::ExtraInvestigation => RuleScope::ExtraInvestigation,
        SectionKey::CountingDifferences => RuleScope::CountingDifferences,
        SectionKey::VotersAndVotes => RuleScope::VotersAndVotes,
        SectionKey::Differences => RuleScope::Differences,
        SectionKey::PoliticalGroupVotes(_) => RuleScope::PoliticalGroup,
        SectionKey::CheckAndSave => RuleScope::CheckAndSave,
    }
}

/// Run every enabled rule owned by `section` against `data`.
///
/// Cross-section rules read the other sections from `data` (the differences
/// rules need the voters and votes counts, the final check needs every list).
/// Output is sorted by rule code.
pub fn validate(
    section: SectionKey,
    data: &PollingStationResults,
    ctx: &ElectionContext,
) -> Vec<Violation> {
    let scope = scope_of(section);

    let group = match section {
        SectionKey::PoliticalGroupVotes(n) => {
            match data
                .political_group_votes
                .iter()
                .enumerate()
                .find(|(_, g)| g.number == n)
            {
                Some(found) => Some(found),
                // The list was never entered: it cannot match the election's
                // definition, and there is nothing else to check.
                None => {
                    return missing_list(ctx);
                }
            }
        }
        _ => None,
    };

    let input = RuleInput {
        results: data,
        ctx,
        group,
    };

    let mut out: Vec<Violation> = rules()
        .iter()
        .filter(|r| r.scope == scope && ctx.rule_enabled(r.code))
        .filter_map(|r| {
            (r.check)(&input).map(|fields| Violation {
                code: r.code,
                fields,
                severity: r.severity,
            })
        })
        .collect();

    out.sort();
    out
}

fn missing_list(ctx: &ElectionContext) -> Vec<Violation> {
    if !ctx.rule_enabled(RuleCode::F402) {
        return Vec::new();
    }
    vec![Violation {
        code: RuleCode::F402,
        fields: vec![FieldPath::new("data.political_group_votes")],
        severity: Severity::Error,
    }]
}

/// [`validate`], split into errors and warnings.
pub fn validate_results(
    section: SectionKey,
    data: &PollingStationResults,
    ctx: &ElectionContext,
) -> ValidationResults {
    ValidationResults::from_violations(validate(section, data, ctx))
}

/// Validate every section of a plan. Sections without violations are
/// present with empty results.
pub fn validate_all(
    data: &PollingStationResults,
    ctx: &ElectionContext,
    sections: &[SectionKey],
) -> BTreeMap<SectionKey, ValidationResults> {
    sections
        .iter()
        .map(|&s| (s, validate_results(s, data, ctx)))
        .collect()
}
