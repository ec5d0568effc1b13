//! Accounting engine: stake, unstake, claim, and payout over the registry and ledger.

mod accounting;
mod payout;
mod shared;

pub use accounting::{ClaimAllReport, PoolClaim, PoolFailure, Receipt};
pub use payout::accrued_reward;
pub use shared::SharedEngine;

use crate::clock::Clock;
use crate::custody::Custody;
use crate::error::{Result, StakingError};
use crate::ids::PoolId;
use crate::ledger::UserLedger;
use crate::registry::PoolRegistry;
use serde::{Deserialize, Serialize};

/// Everything the engine persists: pool configurations and user positions.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerState {
    pub registry: PoolRegistry,
    pub ledger: UserLedger,
    /// Clock reading of the latest committed operation. Later operations may not run earlier.
    #[serde(default)]
    pub last_commit_time: Option<i64>,
}

impl LedgerState {
    /// Pools whose `total_deposited` differs from the sum of their positions.
    pub fn inconsistent_pools(&self) -> Vec<PoolId> {
        self.registry
            .iter()
            .filter(|(id, pool)| u128::from(pool.total_deposited) != self.ledger.deposited_in(*id))
            .map(|(id, _)| id)
            .collect()
    }
}

/// Engine over explicit state, an injected clock, and an external custody service.
pub struct Engine<C, K> {
    state: LedgerState,
    clock: C,
    custody: K,
}

impl<C: Clock, K: Custody> Engine<C, K> {
    pub fn new(clock: C, custody: K) -> Self {
        Self::with_state(LedgerState::default(), clock, custody)
    }

    pub fn with_state(state: LedgerState, clock: C, custody: K) -> Self {
        Self {
            state,
            clock,
            custody,
        }
    }

    pub fn state(&self) -> &LedgerState {
        &self.state
    }

    pub fn custody(&self) -> &K {
        &self.custody
    }

    /// Direct access for funding or inspecting custody outside engine operations.
    pub fn custody_mut(&mut self) -> &mut K {
        &mut self.custody
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn now(&self) -> i64 {
        self.clock.now()
    }

    /// Fails with `ClockRegression` if the clock reads earlier than the last commit.
    pub fn ensure_clock_monotonic(&self) -> Result<i64> {
        self.checked_now(None)
    }

    /// Current time, provided it is not before the last commit or `floor`.
    pub(crate) fn checked_now(&self, floor: Option<i64>) -> Result<i64> {
        let now = self.clock.now();
        match self.state.last_commit_time.max(floor) {
            Some(recorded) if now < recorded => Err(StakingError::ClockRegression { recorded, now }),
            _ => Ok(now),
        }
    }

    pub fn into_parts(self) -> (LedgerState, K) {
        (self.state, self.custody)
    }
}
