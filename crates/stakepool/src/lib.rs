//! stakepool: multi-pool staking ledger.
//!
//! Tracks deposits into independently configured reward pools and pays a reward
//! that is linear in deposited amount and elapsed time, with withdrawals gated by
//! a per-pool lock period. Asset movement is delegated to a [`Custody`] service;
//! this crate only keeps the accounting records.

pub mod clock;
pub mod config;
pub mod custody;
pub mod engine;
pub mod error;
pub mod ids;
pub mod ledger;
pub mod registry;
pub mod snapshot;
pub mod stats;
pub mod store;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::PoolsFile;
pub use custody::{Custody, CustodyError, Transfer, Vault};
pub use engine::{ClaimAllReport, Engine, LedgerState, Receipt, SharedEngine};
pub use error::{Result, StakingError};
pub use ids::{AccountId, AssetId, PoolId};
pub use ledger::{UserLedger, UserPosition};
pub use registry::{Pool, PoolConfig, PoolParams, PoolRegistry};
pub use snapshot::{state_hash, Snapshot, VerificationResult};
pub use stats::PoolStats;
pub use store::StateStore;
