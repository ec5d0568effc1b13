//! User ledger: positions keyed by pool, then by depositor.

mod position;

pub use position::UserPosition;

use crate::ids::{AccountId, PoolId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserLedger {
    positions: BTreeMap<PoolId, BTreeMap<AccountId, UserPosition>>,
}

impl UserLedger {
    pub fn get(&self, pool_id: PoolId, depositor: &AccountId) -> Option<&UserPosition> {
        self.positions.get(&pool_id)?.get(depositor)
    }

    /// Store a position, creating the entry on first use. Positions are never removed.
    pub(crate) fn put(&mut self, pool_id: PoolId, depositor: &AccountId, position: UserPosition) {
        self.positions
            .entry(pool_id)
            .or_default()
            .insert(depositor.clone(), position);
    }

    /// All positions recorded in one pool, ordered by depositor.
    pub fn pool_positions(
        &self,
        pool_id: PoolId,
    ) -> impl Iterator<Item = (&AccountId, &UserPosition)> {
        self.positions.get(&pool_id).into_iter().flatten()
    }

    /// Every pool in which `depositor` has a position, by pool id.
    pub fn positions_of<'a>(
        &'a self,
        depositor: &'a AccountId,
    ) -> impl Iterator<Item = (PoolId, &'a UserPosition)> + 'a {
        self.positions
            .iter()
            .filter_map(move |(pool_id, by_user)| by_user.get(depositor).map(|p| (*pool_id, p)))
    }

    /// Sum of deposited balances in a pool, for checking registry counters.
    pub fn deposited_in(&self, pool_id: PoolId) -> u128 {
        self.pool_positions(pool_id)
            .map(|(_, p)| u128::from(p.deposited_amount))
            .sum()
    }
}
