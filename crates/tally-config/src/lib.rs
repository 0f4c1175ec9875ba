//! tally-config
//!
//! Layered YAML configuration: documents are merged in order (later
//! documents override earlier ones key by key), rendered as canonical JSON
//! and hashed with SHA-256 so that two processes can prove they run with
//! the same election definition.
//!
//! The merged document is then deserialized into [`TallyConfig`].

use anyhow::{Context, Result};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::fs;

mod settings;

pub use settings::{DaemonConfig, GatewayConfig, ReconcileConfig, RetryConfig, TallyConfig};

#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config_hash: String,
    pub canonical_json: String,
    pub config_json: Value,
}

impl LoadedConfig {
    /// Deserialize and check the merged document.
    pub fn typed(&self) -> Result<TallyConfig> {
        let cfg: TallyConfig = serde_json::from_value(self.config_json.clone())
            .context("config does not match the expected shape")?;
        cfg.check()?;
        Ok(cfg)
    }
}

/// Read the config layers at `paths` (base election first, then site and
/// local overrides) and merge them.
pub fn load_layered_yaml<P: AsRef<std::path::Path>>(paths: &[P]) -> Result<LoadedConfig> {
    let layers = paths
        .iter()
        .map(|p| {
            let p = p.as_ref();
            fs::read_to_string(p).with_context(|| format!("read config layer {}", p.display()))
        })
        .collect::<Result<Vec<_>>>()?;
    let layers: Vec<&str> = layers.iter().map(String::as_str).collect();
    load_layered_yaml_from_strings(&layers)
}

pub fn load_layered_yaml_from_strings(layers: &[&str]) -> Result<LoadedConfig> {
    let mut merged = serde_json::json!({});
    for (n, raw) in layers.iter().enumerate() {
        let yaml: serde_yaml::Value =
            serde_yaml::from_str(raw).with_context(|| format!("config layer {n} is not yaml"))?;
        let layer = serde_json::to_value(yaml)
            .with_context(|| format!("config layer {n} has a non-string map key"))?;
        // An empty layer parses as null and must not wipe the election.
        if !layer.is_null() {
            merged = overlay(merged, layer);
        }
    }

    let canonical_json = canonical_json(&merged)?;
    let config_hash = config_digest(&canonical_json);
    Ok(LoadedConfig {
        config_hash,
        canonical_json,
        config_json: merged,
    })
}

/// Load, merge and deserialize in one step.
pub fn load_config<P: AsRef<std::path::Path>>(paths: &[P]) -> Result<(TallyConfig, String)> {
    let loaded = load_layered_yaml(paths)?;
    let cfg = loaded.typed()?;
    Ok((cfg, loaded.config_hash))
}

/// Put `layer` on top of `base`. Maps merge key by key; anything else,
/// including the `polling_stations` and `political_groups` lists, is
/// replaced whole by the later layer.
fn overlay(base: Value, layer: Value) -> Value {
    match (base, layer) {
        (Value::Object(mut base), Value::Object(layer)) => {
            for (key, top) in layer {
                let below = base.remove(&key).unwrap_or(Value::Null);
                base.insert(key, overlay(below, top));
            }
            Value::Object(base)
        }
        (_, top) => top,
    }
}

/// Compact JSON with keys in sorted order; serde_json's default map is a
/// `BTreeMap`, so plain serialization already sorts them.
fn canonical_json(merged: &Value) -> Result<String> {
    serde_json::to_string(merged).context("serialize merged config")
}

/// Lowercase hex SHA-256 of the canonical config. Daemon and CLI log it so
/// operators can check both run the same election.
fn config_digest(canonical: &str) -> String {
    hex::encode(Sha256::digest(canonical.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn site_layer_overrides_leaves_and_replaces_lists() {
        let merged = overlay(
            serde_json::json!({
                "daemon": {"addr": "127.0.0.1:8899", "heartbeat_secs": 5},
                "polling_stations": [{"id": 1}, {"id": 2}]
            }),
            serde_json::json!({
                "daemon": {"addr": "0.0.0.0:8899"},
                "polling_stations": [{"id": 3}]
            }),
        );
        assert_eq!(
            merged,
            serde_json::json!({
                "daemon": {"addr": "0.0.0.0:8899", "heartbeat_secs": 5},
                "polling_stations": [{"id": 3}]
            })
        );
    }

    #[test]
    fn broken_layer_is_named_by_position() {
        let err = load_layered_yaml_from_strings(&["x: 1", "x: [unclosed"]).unwrap_err();
        assert!(err.to_string().contains("config layer 1"), "{err}");
    }

    #[test]
    fn empty_overlay_keeps_base() {
        let a = load_layered_yaml_from_strings(&["daemon:\n  addr: \"0.0.0.0:1\"\n"]).unwrap();
        let b = load_layered_yaml_from_strings(&["daemon:\n  addr: \"0.0.0.0:1\"\n", ""]).unwrap();
        assert_eq!(a.config_hash, b.config_hash);
    }

    #[test]
    fn hash_is_hex_sha256() {
        let a = load_layered_yaml_from_strings(&["x: 1"]).unwrap();
        assert_eq!(a.config_hash.len(), 64);
        assert!(a.config_hash.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
