//! Pool configuration and per-pool counters.

use crate::error::{Result, StakingError};
use crate::ids::AssetId;
use serde::{Deserialize, Serialize};

/// Mutable subset of a pool's parameters. `update_pool` overwrites exactly these.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolParams {
    /// Reward units paid per deposited unit per `reward_interval` seconds.
    pub reward_rate: u64,
    pub reward_asset: AssetId,
    /// Seconds normalizing `reward_rate`. Must be non-zero.
    pub reward_interval: u64,
    /// Seconds a deposit must dwell before it can be withdrawn.
    pub lock_period: u64,
    /// Unix timestamp after which no reward accrues. Accepts seconds or RFC3339 in config files.
    #[serde(deserialize_with = "crate::clock::deserialize_timestamp")]
    pub end_time: i64,
}

impl PoolParams {
    /// Reject parameters that would break payout math or leave no valid staking window.
    pub fn validate(&self, start_time: i64) -> Result<()> {
        if self.reward_interval == 0 {
            return Err(StakingError::InvalidConfig(
                "reward_interval must be greater than zero".to_string(),
            ));
        }
        if self.end_time <= start_time {
            return Err(StakingError::InvalidConfig(format!(
                "end_time {} must be after start_time {}",
                self.end_time, start_time
            )));
        }
        let window = self.end_time.abs_diff(start_time);
        if self.lock_period > window {
            return Err(StakingError::InvalidConfig(format!(
                "lock_period {}s exceeds the pool window of {}s",
                self.lock_period, window
            )));
        }
        Ok(())
    }
}

/// Full pool definition supplied at creation. The stake asset cannot change afterwards.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolConfig {
    pub stake_asset: AssetId,
    #[serde(flatten)]
    pub params: PoolParams,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pool {
    pub stake_asset: AssetId,
    pub reward_asset: AssetId,
    pub reward_rate: u64,
    pub reward_interval: u64,
    pub lock_period: u64,
    pub start_time: i64,
    pub end_time: i64,
    /// Sum of every depositor's active balance in this pool.
    pub total_deposited: u64,
    /// Audit counter of reward ever paid out. Never decreases.
    pub total_reward_distributed: u64,
}

impl Pool {
    pub(crate) fn new(config: PoolConfig, start_time: i64) -> Self {
        let PoolConfig { stake_asset, params } = config;
        Self {
            stake_asset,
            reward_asset: params.reward_asset,
            reward_rate: params.reward_rate,
            reward_interval: params.reward_interval,
            lock_period: params.lock_period,
            start_time,
            end_time: params.end_time,
            total_deposited: 0,
            total_reward_distributed: 0,
        }
    }

    pub(crate) fn apply(&mut self, params: PoolParams) {
        self.reward_rate = params.reward_rate;
        self.reward_asset = params.reward_asset;
        self.reward_interval = params.reward_interval;
        self.lock_period = params.lock_period;
        self.end_time = params.end_time;
    }

    /// Current mutable parameters, e.g. as a base for a partial update.
    pub fn params(&self) -> PoolParams {
        PoolParams {
            reward_rate: self.reward_rate,
            reward_asset: self.reward_asset.clone(),
            reward_interval: self.reward_interval,
            lock_period: self.lock_period,
            end_time: self.end_time,
        }
    }

    /// Last instant a deposit may be made and still serve its full lock before `end_time`.
    pub fn staking_deadline(&self) -> i64 {
        self.end_time.saturating_sub_unsigned(self.lock_period)
    }

    pub fn is_accruing(&self, now: i64) -> bool {
        self.start_time <= now && now < self.end_time
    }
}
