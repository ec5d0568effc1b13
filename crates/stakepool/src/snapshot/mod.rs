//! Snapshots, reproducibility hashing, and verification.

mod bundle;

pub use bundle::normalize_for_hash;
pub use bundle::{state_hash, Snapshot, SnapshotError, VerificationResult, SNAPSHOT_VERSION};
