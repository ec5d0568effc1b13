//! Engine error type.

use crate::ids::{AccountId, AssetId, PoolId};
use thiserror::Error;

pub type Result<T, E = StakingError> = std::result::Result<T, E>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StakingError {
    #[error("pool {0} not found")]
    PoolNotFound(PoolId),
    #[error("invalid pool config: {0}")]
    InvalidConfig(String),
    #[error("invalid amount: {0}")]
    InvalidAmount(u64),
    #[error("staking closed for pool {pool_id}: deadline {deadline}, now {now}")]
    StakingClosed {
        pool_id: PoolId,
        deadline: i64,
        now: i64,
    },
    #[error("position still locked until {unlock_at} (now {now})")]
    StillLocked { unlock_at: i64, now: i64 },
    #[error("insufficient balance: available {available}, requested {requested}")]
    InsufficientBalance { available: u64, requested: u64 },
    #[error("transfer of {amount} {asset} for {account} failed: {reason}")]
    TransferFailed {
        asset: AssetId,
        account: AccountId,
        amount: u64,
        reason: String,
    },
    /// Custody could not undo part of a failed batch; its balances no longer match the ledger.
    #[error("rollback of {amount} {asset} for {account} failed: {reason}")]
    RollbackFailed {
        asset: AssetId,
        account: AccountId,
        amount: u64,
        reason: String,
    },
    /// The clock reads earlier than a time already recorded in the ledger.
    #[error("clock moved backwards: now {now} is before recorded time {recorded}")]
    ClockRegression { recorded: i64, now: i64 },
    #[error("arithmetic overflow in {0}")]
    ArithmeticOverflow(&'static str),
}
