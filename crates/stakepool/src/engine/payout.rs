//! Linear reward accrual.

use crate::error::{Result, StakingError};
use crate::ledger::UserPosition;
use crate::registry::Pool;

/// Reward owed to `position` at `now`:
/// `deposited * (to - from) * reward_rate / reward_interval`, truncated.
///
/// `from` is the later of the last deposit, the last claim, and the pool start;
/// `to` is `now` capped at the pool's `end_time`.
pub fn accrued_reward(pool: &Pool, position: &UserPosition, now: i64) -> Result<u64> {
    let from = position.accrual_floor().max(pool.start_time);
    let to = now.min(pool.end_time);
    if from >= to || position.deposited_amount == 0 || pool.reward_rate == 0 {
        return Ok(0);
    }
    let elapsed = u128::from(to.abs_diff(from));
    let gross = u128::from(position.deposited_amount)
        .checked_mul(elapsed)
        .and_then(|x| x.checked_mul(u128::from(pool.reward_rate)))
        .ok_or(StakingError::ArithmeticOverflow("payout"))?;
    let reward = gross
        .checked_div(u128::from(pool.reward_interval))
        .ok_or_else(|| StakingError::InvalidConfig("reward_interval is zero".to_string()))?;
    u64::try_from(reward).map_err(|_| StakingError::ArithmeticOverflow("payout"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::AssetId;

    const DAY: u64 = 86_400;

    fn pool(rate: u64, interval: u64, start: i64, end: i64) -> Pool {
        Pool {
            stake_asset: AssetId::new("STK"),
            reward_asset: AssetId::new("RWD"),
            reward_rate: rate,
            reward_interval: interval,
            lock_period: 0,
            start_time: start,
            end_time: end,
            total_deposited: 0,
            total_reward_distributed: 0,
        }
    }

    fn position(amount: u64, deposit: i64, claim: Option<i64>) -> UserPosition {
        UserPosition {
            deposited_amount: amount,
            last_claim_time: claim,
            last_deposit_time: deposit,
            total_claimed: 0,
        }
    }

    #[test]
    fn one_day_at_rate_100() {
        let p = pool(100, DAY, 0, 10 * DAY as i64);
        let pos = position(50, 0, None);
        assert_eq!(accrued_reward(&p, &pos, DAY as i64).unwrap(), 5_000);
    }

    #[test]
    fn truncates_fraction() {
        // 3 * 1s * 1 / 2 = 1.5 -> 1
        let p = pool(1, 2, 0, 1_000);
        let pos = position(3, 0, None);
        assert_eq!(accrued_reward(&p, &pos, 1).unwrap(), 1);
    }

    #[test]
    fn capped_at_end_time() {
        let end = 10 * DAY as i64;
        let p = pool(100, DAY, 0, end);
        let pos = position(50, 0, None);
        let at_end = accrued_reward(&p, &pos, end).unwrap();
        assert_eq!(at_end, 50_000);
        assert_eq!(accrued_reward(&p, &pos, end + 1).unwrap(), at_end);
        assert_eq!(accrued_reward(&p, &pos, i64::MAX).unwrap(), at_end);
    }

    #[test]
    fn floor_uses_latest_of_claim_and_deposit() {
        let p = pool(1, 1, 0, 1_000);
        assert_eq!(accrued_reward(&p, &position(1, 100, Some(300)), 400).unwrap(), 100);
        assert_eq!(accrued_reward(&p, &position(1, 300, Some(100)), 400).unwrap(), 100);
    }

    #[test]
    fn zero_when_window_empty() {
        let p = pool(1, 1, 0, 1_000);
        assert_eq!(accrued_reward(&p, &position(10, 500, None), 500).unwrap(), 0);
        assert_eq!(accrued_reward(&p, &position(10, 500, None), 400).unwrap(), 0);
        assert_eq!(accrued_reward(&p, &position(10, 1_200, None), 2_000).unwrap(), 0);
        assert_eq!(accrued_reward(&p, &position(0, 0, None), 900).unwrap(), 0);
    }

    #[test]
    fn never_before_pool_start() {
        let p = pool(1, 1, 100, 1_000);
        assert_eq!(accrued_reward(&p, &position(1, 0, None), 150).unwrap(), 50);
    }

    #[test]
    fn large_values_overflow_is_reported() {
        let p = pool(u64::MAX, 1, 0, i64::MAX);
        let pos = position(u64::MAX, 0, None);
        assert_eq!(
            accrued_reward(&p, &pos, i64::MAX),
            Err(StakingError::ArithmeticOverflow("payout"))
        );
    }

    #[test]
    fn result_must_fit_u64() {
        // 1e12 base units staked for a year at 1e9 per unit per day.
        let year = 365 * DAY as i64;
        let p = pool(1_000_000_000, DAY, 0, year);
        let pos = position(1_000_000_000_000, 0, None);
        assert!(accrued_reward(&p, &pos, year).is_err());
        let p = pool(1_000, DAY, 0, year);
        assert_eq!(
            accrued_reward(&p, &pos, year).unwrap(),
            1_000_000_000_000 * 1_000 * 365
        );
    }
}
