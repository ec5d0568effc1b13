//! Thread-safe handle around one engine.

use crate::clock::Clock;
use crate::custody::Custody;
use crate::engine::{ClaimAllReport, Engine, LedgerState, Receipt};
use crate::error::Result;
use crate::ids::{AccountId, PoolId};
use std::sync::{Arc, Mutex, MutexGuard};

/// Cloneable handle; every operation runs under one lock, so writes to the same
/// (pool, depositor) are serialized and pool counters update atomically.
pub struct SharedEngine<C, K> {
    inner: Arc<Mutex<Engine<C, K>>>,
}

impl<C, K> Clone for SharedEngine<C, K> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<C: Clock, K: Custody> SharedEngine<C, K> {
    pub fn new(engine: Engine<C, K>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(engine)),
        }
    }

    // Operations commit with infallible assignments after every fallible step,
    // so state behind a poisoned lock is still consistent.
    fn lock(&self) -> MutexGuard<'_, Engine<C, K>> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Run `f` with exclusive access to the engine.
    pub fn with<R>(&self, f: impl FnOnce(&mut Engine<C, K>) -> R) -> R {
        f(&mut self.lock())
    }

    pub fn stake(&self, pool_id: PoolId, depositor: &AccountId, amount: u64) -> Result<Receipt> {
        self.lock().stake(pool_id, depositor, amount)
    }

    pub fn unstake(&self, pool_id: PoolId, depositor: &AccountId, amount: u64) -> Result<Receipt> {
        self.lock().unstake(pool_id, depositor, amount)
    }

    pub fn claim(&self, pool_id: PoolId, depositor: &AccountId) -> Result<u64> {
        self.lock().claim(pool_id, depositor)
    }

    pub fn claim_all(&self, depositor: &AccountId) -> ClaimAllReport {
        self.lock().claim_all(depositor)
    }

    pub fn payout(&self, pool_id: PoolId, depositor: &AccountId) -> Result<u64> {
        self.lock().payout(pool_id, depositor)
    }

    pub fn can_unstake(&self, pool_id: PoolId, depositor: &AccountId) -> Result<bool> {
        self.lock().can_unstake(pool_id, depositor)
    }

    pub fn snapshot_state(&self) -> LedgerState {
        self.lock().state().clone()
    }
}
