//! Serializable engine snapshot and SHA-256 state hash.

use crate::custody::Vault;
use crate::engine::LedgerState;
use crate::ids::PoolId;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SnapshotError {
    #[error("serialize: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("unsupported snapshot version {0}")]
    Version(u32),
}

pub const SNAPSHOT_VERSION: u32 = 1;

/// Ledger state plus custody balances at one point in time.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Snapshot {
    pub version: u32,
    pub created_utc_rfc3339: String,
    /// Hash of `state` and `vault` at creation.
    pub state_hash: String,
    pub state: LedgerState,
    pub vault: Vault,
}

#[derive(Serialize)]
struct Hashed<'a> {
    state: &'a LedgerState,
    vault: &'a Vault,
}

impl Snapshot {
    pub fn new(state: LedgerState, vault: Vault) -> Result<Self, SnapshotError> {
        let created_utc_rfc3339 = time::OffsetDateTime::now_utc()
            .format(&time::format_description::well_known::Rfc3339)
            .unwrap_or_default();
        let state_hash = state_hash(&state, &vault)?;
        Ok(Self {
            version: SNAPSHOT_VERSION,
            created_utc_rfc3339,
            state_hash,
            state,
            vault,
        })
    }

    pub fn from_json(json: &str) -> Result<Self, SnapshotError> {
        let snapshot: Self = serde_json::from_str(json)?;
        if snapshot.version != SNAPSHOT_VERSION {
            return Err(SnapshotError::Version(snapshot.version));
        }
        Ok(snapshot)
    }

    /// Recompute the hash and check it against the recorded one (and `expected`, when given).
    pub fn verify(&self, expected_hex: Option<&str>) -> Result<VerificationResult, SnapshotError> {
        let computed = state_hash(&self.state, &self.vault)?;
        let expected = expected_hex.map(|s| s.trim().to_lowercase());
        let expected_ok = match expected.as_deref() {
            Some(e) => e == computed,
            None => true,
        };
        let matches = expected_ok && computed == self.state_hash.to_lowercase();
        Ok(VerificationResult {
            state_hash: computed,
            expected_hash: expected,
            matches,
            inconsistent_pools: self.state.inconsistent_pools(),
        })
    }
}

/// Normalize JSON for hashing: sorted object keys, no whitespace.
pub fn normalize_for_hash(value: &serde_json::Value) -> Result<String, SnapshotError> {
    Ok(serde_json::to_string(&sort_json_keys(value))?)
}

fn sort_json_keys(v: &serde_json::Value) -> serde_json::Value {
    match v {
        serde_json::Value::Object(m) => {
            let sorted: BTreeMap<String, serde_json::Value> = m
                .iter()
                .map(|(k, v)| (k.clone(), sort_json_keys(v)))
                .collect();
            serde_json::Value::Object(serde_json::Map::from_iter(sorted))
        }
        serde_json::Value::Array(arr) => {
            serde_json::Value::Array(arr.iter().map(sort_json_keys).collect())
        }
        other => other.clone(),
    }
}

/// SHA-256 over the normalized JSON of state and custody balances.
pub fn state_hash(state: &LedgerState, vault: &Vault) -> Result<String, SnapshotError> {
    let json = serde_json::to_value(Hashed { state, vault })?;
    let normalized = normalize_for_hash(&json)?;
    let mut hasher = Sha256::new();
    hasher.update(normalized.as_bytes());
    Ok(hex::encode(hasher.finalize()))
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct VerificationResult {
    pub state_hash: String,
    pub expected_hash: Option<String>,
    pub matches: bool,
    /// Pools whose deposit counter disagrees with their positions.
    pub inconsistent_pools: Vec<PoolId>,
}

impl VerificationResult {
    pub fn is_ok(&self) -> bool {
        self.matches && self.inconsistent_pools.is_empty()
    }
}
