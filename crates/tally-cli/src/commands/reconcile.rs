use serde::Serialize;

use tally_config::TallyConfig;
use tally_entry::SectionPlan;
use tally_reconcile::{diff_results, FieldDifference};
use tally_schemas::{PollingStation, PollingStationResults};
use tally_validate::validate_all;

#[derive(Debug, Serialize)]
pub struct ReconcileReport {
    /// `true` when every compared field is equal.
    pub definitive: bool,
    pub differences: Vec<FieldDifference>,
    /// Blocking errors still present in either entry, by rule code.
    pub first_errors: Vec<String>,
    pub second_errors: Vec<String>,
}

pub fn run(
    cfg: &TallyConfig,
    station: &PollingStation,
    first: &PollingStationResults,
    second: &PollingStationResults,
) -> ReconcileReport {
    let plan = SectionPlan::new(&cfg.election, station);
    let diff = diff_results(first, second);
    tracing::info!(differences = diff.differences.len(), "entries compared");
    ReconcileReport {
        definitive: diff.is_empty(),
        differences: diff.differences,
        first_errors: error_codes(cfg, &plan, first),
        second_errors: error_codes(cfg, &plan, second),
    }
}

fn error_codes(cfg: &TallyConfig, plan: &SectionPlan, data: &PollingStationResults) -> Vec<String> {
    let mut codes: Vec<String> = validate_all(data, &cfg.election, plan.sections())
        .values()
        .flat_map(|v| v.errors.iter().map(|e| e.code.to_string()))
        .collect();
    codes.sort();
    codes.dedup();
    codes
}
