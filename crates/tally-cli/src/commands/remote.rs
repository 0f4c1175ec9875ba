//! Coordinator commands against a running daemon.

use anyhow::{Context, Result};

use tally_config::TallyConfig;
use tally_gateway::{HttpSessionGateway, RetryPolicy, SessionGateway, StatusResponse};
use tally_reconcile::{ResolveDecision, ResolveErrorsDecision};

fn gateway(cfg: &TallyConfig) -> Result<(HttpSessionGateway, RetryPolicy)> {
    let gw = HttpSessionGateway::from_config(&cfg.gateway).context("building http client")?;
    Ok((gw, RetryPolicy::from(&cfg.gateway.retry)))
}

pub async fn status(cfg: &TallyConfig, polling_station_id: u32) -> Result<StatusResponse> {
    let (gw, retry) = gateway(cfg)?;
    retry
        .run("status", || gw.status(polling_station_id))
        .await
        .with_context(|| format!("status of polling station {polling_station_id}"))
}

pub async fn resolve_differences(
    cfg: &TallyConfig,
    polling_station_id: u32,
    decision: ResolveDecision,
) -> Result<()> {
    let (gw, retry) = gateway(cfg)?;
    retry
        .run("resolve_differences", || {
            gw.resolve_difference(polling_station_id, decision)
        })
        .await
        .with_context(|| format!("resolving differences of polling station {polling_station_id}"))?;
    tracing::info!(polling_station_id, decision = ?decision, "differences resolved");
    Ok(())
}

pub async fn resolve_errors(
    cfg: &TallyConfig,
    polling_station_id: u32,
    decision: ResolveErrorsDecision,
) -> Result<()> {
    let (gw, retry) = gateway(cfg)?;
    retry
        .run("resolve_errors", || gw.resolve_errors(polling_station_id, decision))
        .await
        .with_context(|| format!("resolving errors of polling station {polling_station_id}"))?;
    tracing::info!(polling_station_id, decision = ?decision, "errors resolved");
    Ok(())
}
