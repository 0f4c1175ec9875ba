//! Two typists, one polling station, an in-memory gateway.

use std::sync::Arc;

use anyhow::{bail, Result};

use tally_entry::SubmitOutcome;
use tally_gateway::{
    ClientError, EntryClient, FinaliseOutcome, GatewayError, InMemoryGateway, RetryPolicy,
    SessionGateway,
};
use tally_reconcile::{DataEntryStatus, StatusPolicy};
use tally_schemas::{ElectionContext, EntryNumber, FinalResult, PollingStation, TypistId};

use crate::Tally;

pub struct DoubleEntry {
    pub gateway: Arc<InMemoryGateway>,
    pub station: PollingStation,
}

impl DoubleEntry {
    pub fn new(ctx: Arc<ElectionContext>, station: PollingStation, policy: StatusPolicy) -> Self {
        let gateway = Arc::new(InMemoryGateway::new(ctx, [station.clone()], policy));
        Self { gateway, station }
    }

    pub async fn claim(&self, entry: EntryNumber, typist: &str) -> Result<EntryClient, ClientError> {
        EntryClient::claim(
            self.gateway.clone(),
            self.gateway.ctx(),
            self.station.clone(),
            entry,
            TypistId::new(typist),
            RetryPolicy::none(),
        )
        .await
    }

    /// Claim, enter `tally` accepting every overridable violation, finalize.
    pub async fn enter(
        &self,
        entry: EntryNumber,
        typist: &str,
        tally: &Tally,
    ) -> Result<(FinalResult, FinaliseOutcome)> {
        let mut client = self.claim(entry, typist).await?;
        enter_and_finalize(&mut client, tally).await
    }

    pub async fn status(&self) -> Result<DataEntryStatus, GatewayError> {
        Ok(self.gateway.status(self.station.id).await?.status)
    }
}

/// Submit every remaining section of `client`'s plan from `tally`, then
/// finalize. Blocked sections are accepted and submitted again.
pub async fn enter_and_finalize(
    client: &mut EntryClient,
    tally: &Tally,
) -> Result<(FinalResult, FinaliseOutcome)> {
    // Each section is submitted at most twice.
    let budget = client.session().plan().sections().len() * 2;
    for _ in 0..budget {
        let key = client.session().current_section();
        match client.submit_section(tally.values(key)).await? {
            SubmitOutcome::Saved { next: None, .. } => {
                return Ok(client.finalize().await?);
            }
            SubmitOutcome::Saved { .. } => {}
            SubmitOutcome::Blocked(_) => client.accept_violations(key).await?,
        }
    }
    bail!(
        "entry did not reach the final check; stuck at {}",
        client.session().current_section()
    )
}
