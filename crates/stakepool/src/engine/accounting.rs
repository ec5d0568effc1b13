//! State transitions and queries.
//!
//! Each mutating operation validates, computes every new value with checked
//! arithmetic, submits its transfers to custody as one batch, and only then
//! writes the new position and pool counters. A rejected batch leaves the
//! ledger exactly as it was.

use crate::clock::Clock;
use crate::custody::{Custody, Transfer};
use crate::engine::payout::accrued_reward;
use crate::engine::Engine;
use crate::error::{Result, StakingError};
use crate::ids::{AccountId, PoolId};
use crate::ledger::UserPosition;
use crate::registry::{Pool, PoolConfig, PoolParams};
use crate::stats::{compute_pool_stats, PoolStats};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// Outcome of a stake or unstake: principal moved plus reward settled on the way.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Receipt {
    pub pool_id: PoolId,
    pub principal: u64,
    pub reward: u64,
    pub at: i64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolClaim {
    pub pool_id: PoolId,
    pub amount: u64,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PoolFailure {
    pub pool_id: PoolId,
    pub error: StakingError,
}

/// Per-pool results of `claim_all`. Some pools failing is a normal outcome.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ClaimAllReport {
    pub settled: Vec<PoolClaim>,
    pub failed: Vec<PoolFailure>,
}

impl ClaimAllReport {
    pub fn total_claimed(&self) -> u128 {
        self.settled.iter().map(|c| u128::from(c.amount)).sum()
    }

    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Copy of `position` with `reward` marked as paid at `now`.
/// Zero reward leaves the claim floor alone.
fn with_reward_paid(position: &UserPosition, reward: u64, now: i64) -> Result<UserPosition> {
    let mut next = position.clone();
    if reward > 0 {
        next.total_claimed = next
            .total_claimed
            .checked_add(reward)
            .ok_or(StakingError::ArithmeticOverflow("total_claimed"))?;
        next.last_claim_time = Some(now);
    }
    Ok(next)
}

fn distributed_after(pool: &Pool, reward: u64) -> Result<u64> {
    pool.total_reward_distributed
        .checked_add(reward)
        .ok_or(StakingError::ArithmeticOverflow("total_reward_distributed"))
}

impl<C: Clock, K: Custody> Engine<C, K> {
    pub fn create_pool(&mut self, config: PoolConfig) -> Result<PoolId> {
        let now = self.checked_now(None)?;
        let pool_id = self.state.registry.create_pool(config, now)?;
        self.state.last_commit_time = Some(now);
        Ok(pool_id)
    }

    pub fn update_pool(&mut self, pool_id: PoolId, params: PoolParams) -> Result<()> {
        self.state.registry.update_pool(pool_id, params)
    }

    pub fn pool(&self, pool_id: PoolId) -> Result<&Pool> {
        self.state.registry.get(pool_id)
    }

    pub fn position(&self, pool_id: PoolId, depositor: &AccountId) -> Option<&UserPosition> {
        self.state.ledger.get(pool_id, depositor)
    }

    pub fn positions_of<'a>(
        &'a self,
        depositor: &'a AccountId,
    ) -> impl Iterator<Item = (PoolId, &'a UserPosition)> + 'a {
        self.state.ledger.positions_of(depositor)
    }

    /// Reward claimable right now. Pure; an absent position pays nothing.
    pub fn payout(&self, pool_id: PoolId, depositor: &AccountId) -> Result<u64> {
        let pool = self.state.registry.get(pool_id)?;
        match self.state.ledger.get(pool_id, depositor) {
            Some(position) => accrued_reward(pool, position, self.clock.now()),
            None => Ok(0),
        }
    }

    /// Sum of `payout` across every pool.
    pub fn pending_rewards(&self, depositor: &AccountId) -> Result<u64> {
        let now = self.clock.now();
        let mut total: u64 = 0;
        for (pool_id, position) in self.state.ledger.positions_of(depositor) {
            let pool = self.state.registry.get(pool_id)?;
            total = total
                .checked_add(accrued_reward(pool, position, now)?)
                .ok_or(StakingError::ArithmeticOverflow("pending_rewards"))?;
        }
        Ok(total)
    }

    /// True once the lock measured from the latest deposit has elapsed.
    pub fn can_unstake(&self, pool_id: PoolId, depositor: &AccountId) -> Result<bool> {
        let pool = self.state.registry.get(pool_id)?;
        Ok(self
            .state
            .ledger
            .get(pool_id, depositor)
            .is_some_and(|p| p.is_unlocked(pool.lock_period, self.clock.now())))
    }

    pub fn pool_stats(&self, pool_id: PoolId) -> Result<PoolStats> {
        compute_pool_stats(&self.state, pool_id, self.clock.now())
    }

    /// Deposit `amount` of the pool's stake asset, settling any outstanding reward first.
    pub fn stake(
        &mut self,
        pool_id: PoolId,
        depositor: &AccountId,
        amount: u64,
    ) -> Result<Receipt> {
        let pool = self.state.registry.get(pool_id)?;
        if amount == 0 {
            return Err(StakingError::InvalidAmount(amount));
        }
        let existing = self.state.ledger.get(pool_id, depositor);
        let now = self.checked_now(existing.map(UserPosition::accrual_floor))?;
        let deadline = pool.staking_deadline();
        if now > deadline {
            return Err(StakingError::StakingClosed {
                pool_id,
                deadline,
                now,
            });
        }

        let position = existing.cloned().unwrap_or_default();
        let reward = accrued_reward(pool, &position, now)?;
        let mut next = with_reward_paid(&position, reward, now)?;
        next.deposited_amount = next
            .deposited_amount
            .checked_add(amount)
            .ok_or(StakingError::ArithmeticOverflow("deposited_amount"))?;
        next.last_deposit_time = now;
        let total_deposited = pool
            .total_deposited
            .checked_add(amount)
            .ok_or(StakingError::ArithmeticOverflow("total_deposited"))?;
        let distributed = distributed_after(pool, reward)?;

        let mut transfers = vec![Transfer::inbound(&pool.stake_asset, depositor, amount)];
        if reward > 0 {
            transfers.push(Transfer::outbound(&pool.reward_asset, depositor, reward));
        }
        self.submit(pool_id, depositor, &transfers)?;

        let pool = self.state.registry.get_mut(pool_id)?;
        pool.total_deposited = total_deposited;
        pool.total_reward_distributed = distributed;
        self.state.ledger.put(pool_id, depositor, next);
        self.state.last_commit_time = Some(now);
        info!(pool_id, %depositor, amount, reward, total_deposited, "staked");
        Ok(Receipt {
            pool_id,
            principal: amount,
            reward,
            at: now,
        })
    }

    /// Withdraw `amount` once the lock has elapsed, settling reward on the full balance first.
    ///
    /// Principal and settled reward move in one custody batch. With `Vault`, a pool whose
    /// stake and reward asset coincide pays both from one reserve, so an unfunded reward
    /// reserve makes the withdrawal fail with `TransferFailed` until it is topped up.
    pub fn unstake(
        &mut self,
        pool_id: PoolId,
        depositor: &AccountId,
        amount: u64,
    ) -> Result<Receipt> {
        let pool = self.state.registry.get(pool_id)?;
        if amount == 0 {
            return Err(StakingError::InvalidAmount(amount));
        }
        let existing = self.state.ledger.get(pool_id, depositor);
        let now = self.checked_now(existing.map(UserPosition::accrual_floor))?;
        let position = existing.cloned().unwrap_or_default();
        if amount > position.deposited_amount {
            return Err(StakingError::InsufficientBalance {
                available: position.deposited_amount,
                requested: amount,
            });
        }
        if !position.is_unlocked(pool.lock_period, now) {
            return Err(StakingError::StillLocked {
                unlock_at: position.unlock_time(pool.lock_period),
                now,
            });
        }

        let reward = accrued_reward(pool, &position, now)?;
        let mut next = with_reward_paid(&position, reward, now)?;
        next.deposited_amount -= amount;
        let total_deposited = pool
            .total_deposited
            .checked_sub(amount)
            .ok_or(StakingError::ArithmeticOverflow("total_deposited"))?;
        let distributed = distributed_after(pool, reward)?;

        let mut transfers = vec![Transfer::outbound(&pool.stake_asset, depositor, amount)];
        if reward > 0 {
            transfers.push(Transfer::outbound(&pool.reward_asset, depositor, reward));
        }
        self.submit(pool_id, depositor, &transfers)?;

        let pool = self.state.registry.get_mut(pool_id)?;
        pool.total_deposited = total_deposited;
        pool.total_reward_distributed = distributed;
        self.state.ledger.put(pool_id, depositor, next);
        self.state.last_commit_time = Some(now);
        info!(pool_id, %depositor, amount, reward, total_deposited, "unstaked");
        Ok(Receipt {
            pool_id,
            principal: amount,
            reward,
            at: now,
        })
    }

    /// Pay out accrued reward. A zero payout succeeds without touching the position.
    pub fn claim(&mut self, pool_id: PoolId, depositor: &AccountId) -> Result<u64> {
        let pool = self.state.registry.get(pool_id)?;
        let Some(position) = self.state.ledger.get(pool_id, depositor) else {
            debug!(pool_id, %depositor, "claim without position");
            return Ok(0);
        };
        let now = self.checked_now(Some(position.accrual_floor()))?;
        let reward = accrued_reward(pool, position, now)?;
        if reward == 0 {
            debug!(pool_id, %depositor, "nothing to claim");
            return Ok(0);
        }
        let next = with_reward_paid(position, reward, now)?;
        let distributed = distributed_after(pool, reward)?;
        let transfers = [Transfer::outbound(&pool.reward_asset, depositor, reward)];
        self.submit(pool_id, depositor, &transfers)?;

        self.state.registry.get_mut(pool_id)?.total_reward_distributed = distributed;
        let total_claimed = next.total_claimed;
        self.state.ledger.put(pool_id, depositor, next);
        self.state.last_commit_time = Some(now);
        info!(pool_id, %depositor, reward, total_claimed, "claimed");
        Ok(reward)
    }

    /// Claim from every pool in registry order. One pool failing does not stop the others.
    pub fn claim_all(&mut self, depositor: &AccountId) -> ClaimAllReport {
        let mut report = ClaimAllReport::default();
        for pool_id in 0..self.state.registry.len() {
            match self.claim(pool_id, depositor) {
                Ok(amount) => report.settled.push(PoolClaim { pool_id, amount }),
                Err(error) => {
                    warn!(pool_id, %depositor, %error, "claim failed");
                    report.failed.push(PoolFailure { pool_id, error });
                }
            }
        }
        report
    }

    fn submit(
        &mut self,
        pool_id: PoolId,
        depositor: &AccountId,
        transfers: &[Transfer],
    ) -> Result<()> {
        self.custody.execute(transfers).map_err(|e| {
            warn!(pool_id, %depositor, error = %e, "custody rejected transfers");
            StakingError::from(e)
        })
    }
}
