//! Per-(pool, depositor) balance and claim history.

use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserPosition {
    /// Active stake balance.
    pub deposited_amount: u64,
    /// Unix timestamp of the last paying claim; `None` if never claimed.
    pub last_claim_time: Option<i64>,
    /// Unix timestamp of the most recent deposit. Restarts the lock clock.
    pub last_deposit_time: i64,
    /// Reward paid to this depositor from this pool. Never decreases.
    pub total_claimed: u64,
}

impl UserPosition {
    /// Start of the accrual window: the later of the last deposit and the last claim.
    pub fn accrual_floor(&self) -> i64 {
        match self.last_claim_time {
            Some(claimed) => claimed.max(self.last_deposit_time),
            None => self.last_deposit_time,
        }
    }

    pub fn unlock_time(&self, lock_period: u64) -> i64 {
        self.last_deposit_time.saturating_add_unsigned(lock_period)
    }

    pub fn is_unlocked(&self, lock_period: u64, now: i64) -> bool {
        now >= self.unlock_time(lock_period)
    }
}
