//! Command handler modules for tally-cli.
//!
//! Shared helpers live here; command-specific logic lives in the submodules.

pub mod reconcile;
pub mod remote;
pub mod validate;

use anyhow::{Context, Result};
use serde::Serialize;
use std::fs;

use tally_config::TallyConfig;
use tally_entry::SectionPlan;
use tally_schemas::{PollingStation, PollingStationResults};

pub fn load(paths: &[String]) -> Result<TallyConfig> {
    let (cfg, hash) = tally_config::load_config(paths)?;
    tracing::debug!(config_hash = %hash, "configuration loaded");
    Ok(cfg)
}

/// The configured station, or an ad-hoc one without a previous session.
pub fn station_for(cfg: &TallyConfig, id: Option<u32>) -> Result<PollingStation> {
    match id {
        Some(id) => cfg
            .polling_station(id)
            .cloned()
            .with_context(|| format!("polling station {id} is not configured")),
        None => Ok(PollingStation {
            id: 0,
            election_id: cfg.election.election_id,
            number: 0,
            name: String::new(),
            previous_session_id: None,
        }),
    }
}

pub fn sections(cfg: &TallyConfig, station: &PollingStation) -> Vec<String> {
    SectionPlan::new(&cfg.election, station)
        .sections()
        .iter()
        .map(|k| k.id())
        .collect()
}

pub fn read_results(path: &str) -> Result<PollingStationResults> {
    let s = fs::read_to_string(path).with_context(|| format!("read results: {path}"))?;
    serde_json::from_str(&s).with_context(|| format!("parse results json: {path}"))
}

pub fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
