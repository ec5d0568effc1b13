//! Read-only per-pool statistics.

use crate::engine::{accrued_reward, LedgerState};
use crate::error::{Result, StakingError};
use crate::ids::PoolId;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolStats {
    pub pool_id: PoolId,
    /// Positions ever opened in this pool, including emptied ones.
    pub depositor_count: u64,
    pub active_depositors: u64,
    pub total_deposited: u64,
    pub total_reward_distributed: u64,
    /// Sum of every position's current payout.
    pub pending_reward: u64,
    /// Reward emitted per `reward_interval` at the current total deposit.
    pub emission_per_interval: u128,
    pub staking_deadline: i64,
    pub is_accruing: bool,
}

/// Compute statistics for one pool at `now`.
pub fn compute_pool_stats(state: &LedgerState, pool_id: PoolId, now: i64) -> Result<PoolStats> {
    let pool = state.registry.get(pool_id)?;
    let mut stats = PoolStats {
        pool_id,
        total_deposited: pool.total_deposited,
        total_reward_distributed: pool.total_reward_distributed,
        emission_per_interval: u128::from(pool.total_deposited) * u128::from(pool.reward_rate),
        staking_deadline: pool.staking_deadline(),
        is_accruing: pool.is_accruing(now),
        ..Default::default()
    };

    for (_, position) in state.ledger.pool_positions(pool_id) {
        stats.depositor_count = stats.depositor_count.saturating_add(1);
        if position.deposited_amount > 0 {
            stats.active_depositors = stats.active_depositors.saturating_add(1);
        }
        stats.pending_reward = stats
            .pending_reward
            .checked_add(accrued_reward(pool, position, now)?)
            .ok_or(StakingError::ArithmeticOverflow("pending_reward"))?;
    }
    Ok(stats)
}
