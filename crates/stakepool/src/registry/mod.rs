//! Pool registry: append-only, index-addressed pool configurations.

mod pool;

pub use pool::{Pool, PoolConfig, PoolParams};

use crate::error::{Result, StakingError};
use crate::ids::PoolId;
use serde::{Deserialize, Serialize};
use tracing::info;

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolRegistry {
    pools: Vec<Pool>,
}

impl PoolRegistry {
    /// Append a pool starting at `now`. Returns its permanent id.
    pub fn create_pool(&mut self, config: PoolConfig, now: i64) -> Result<PoolId> {
        config.params.validate(now)?;
        let pool_id = self.pools.len();
        info!(
            pool_id,
            stake_asset = %config.stake_asset,
            reward_asset = %config.params.reward_asset,
            reward_rate = config.params.reward_rate,
            end_time = config.params.end_time,
            "pool created"
        );
        self.pools.push(Pool::new(config, now));
        Ok(pool_id)
    }

    /// Overwrite a pool's mutable parameters in place. Counters and `start_time` are kept.
    pub fn update_pool(&mut self, pool_id: PoolId, params: PoolParams) -> Result<()> {
        let pool = self
            .pools
            .get_mut(pool_id)
            .ok_or(StakingError::PoolNotFound(pool_id))?;
        params.validate(pool.start_time)?;
        info!(
            pool_id,
            reward_rate = params.reward_rate,
            reward_interval = params.reward_interval,
            lock_period = params.lock_period,
            end_time = params.end_time,
            "pool updated"
        );
        pool.apply(params);
        Ok(())
    }

    pub fn get(&self, pool_id: PoolId) -> Result<&Pool> {
        self.pools
            .get(pool_id)
            .ok_or(StakingError::PoolNotFound(pool_id))
    }

    pub(crate) fn get_mut(&mut self, pool_id: PoolId) -> Result<&mut Pool> {
        self.pools
            .get_mut(pool_id)
            .ok_or(StakingError::PoolNotFound(pool_id))
    }

    /// Pools with their ids, in registry order.
    pub fn iter(&self) -> impl Iterator<Item = (PoolId, &Pool)> {
        self.pools.iter().enumerate()
    }

    pub fn len(&self) -> usize {
        self.pools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pools.is_empty()
    }
}
