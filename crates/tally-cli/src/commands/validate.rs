use std::collections::BTreeMap;

use anyhow::{Context, Result};
use serde_json::{json, Value};

use tally_config::TallyConfig;
use tally_entry::SectionPlan;
use tally_schemas::{PollingStation, PollingStationResults, SectionKey, ValidationResults};
use tally_validate::{rules, validate_all, validate_results};

/// Violations per section of the station's plan, or of `section` alone.
pub fn run(
    cfg: &TallyConfig,
    station: &PollingStation,
    data: &PollingStationResults,
    section: Option<&str>,
) -> Result<BTreeMap<SectionKey, ValidationResults>> {
    let plan = SectionPlan::new(&cfg.election, station);

    let out = match section {
        Some(id) => {
            let key: SectionKey = id.parse().with_context(|| format!("--section {id}"))?;
            if !plan.contains(key) {
                anyhow::bail!("section {key} is not part of this polling station's plan");
            }
            BTreeMap::from([(key, validate_results(key, data, &cfg.election))])
        }
        None => validate_all(data, &cfg.election, plan.sections()),
    };

    let errors: usize = out.values().map(|v| v.errors.len()).sum();
    let warnings: usize = out.values().map(|v| v.warnings.len()).sum();
    tracing::info!(sections = out.len(), errors, warnings, "validated");
    Ok(out)
}

pub fn catalogue() -> Vec<Value> {
    rules()
        .iter()
        .map(|r| {
            json!({
                "code": r.code,
                "severity": r.severity,
                "section": format!("{:?}", r.scope),
                "overridable": r.overridable,
                "description": r.description,
            })
        })
        .collect()
}
