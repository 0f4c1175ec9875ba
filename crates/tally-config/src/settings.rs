use std::collections::BTreeSet;
use std::time::Duration;

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use tally_schemas::{ElectionContext, PollingStation};

/// Effective configuration of every tally binary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TallyConfig {
    /// Political groups, section layout and rule switches.
    pub election: ElectionContext,
    #[serde(default)]
    pub polling_stations: Vec<PollingStation>,
    #[serde(default)]
    pub reconcile: ReconcileConfig,
    #[serde(default)]
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub daemon: DaemonConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReconcileConfig {
    /// After a coordinator keeps one of two differing entries, require a
    /// fresh second entry by another typist before the result is final.
    #[serde(default = "default_true")]
    pub keep_requires_new_second_entry: bool,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            keep_requires_new_second_entry: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GatewayConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default)]
    pub retry: RetryConfig,
}

impl GatewayConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_ms: default_timeout_ms(),
            retry: RetryConfig::default(),
        }
    }
}

/// Retries apply to transport failures only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RetryConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_backoff_ms")]
    pub backoff_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            backoff_ms: default_backoff_ms(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DaemonConfig {
    #[serde(default = "default_addr")]
    pub addr: String,
    #[serde(default = "default_heartbeat_secs")]
    pub heartbeat_secs: u64,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            addr: default_addr(),
            heartbeat_secs: default_heartbeat_secs(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_base_url() -> String {
    "http://127.0.0.1:8899".to_string()
}

fn default_timeout_ms() -> u64 {
    10_000
}

fn default_max_attempts() -> u32 {
    3
}

fn default_backoff_ms() -> u64 {
    250
}

fn default_addr() -> String {
    "127.0.0.1:8899".to_string()
}

fn default_heartbeat_secs() -> u64 {
    5
}

impl TallyConfig {
    pub fn polling_station(&self, id: u32) -> Option<&PollingStation> {
        self.polling_stations.iter().find(|ps| ps.id == id)
    }

    /// Consistency checks serde cannot express.
    pub fn check(&self) -> Result<()> {
        let mut groups = BTreeSet::new();
        for g in &self.election.political_groups {
            if !groups.insert(g.number) {
                bail!("CONFIG_DUPLICATE_GROUP number={}", g.number);
            }
            let mut candidates = BTreeSet::new();
            for c in &g.candidates {
                if !candidates.insert(c.number) {
                    bail!(
                        "CONFIG_DUPLICATE_CANDIDATE group={} number={}",
                        g.number,
                        c.number
                    );
                }
            }
        }

        let mut ids = BTreeSet::new();
        for ps in &self.polling_stations {
            if !ids.insert(ps.id) {
                bail!("CONFIG_DUPLICATE_POLLING_STATION id={}", ps.id);
            }
            if ps.election_id != self.election.election_id {
                bail!(
                    "CONFIG_POLLING_STATION_ELECTION_MISMATCH id={} election_id={} expected={}",
                    ps.id,
                    ps.election_id,
                    self.election.election_id
                );
            }
        }

        if self.gateway.retry.max_attempts == 0 {
            bail!("CONFIG_RETRY_MAX_ATTEMPTS must be at least 1");
        }
        Ok(())
    }
}
