//! Asset custody collaborator: moves stake and reward assets on the engine's behalf.
//!
//! The engine only keeps accounting records. Every asset movement goes through
//! [`Custody`], and the engine commits ledger changes only after custody reports
//! success.

mod vault;

pub use vault::Vault;

use crate::error::StakingError;
use crate::ids::{AccountId, AssetId};
use thiserror::Error;
use tracing::warn;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CustodyError {
    #[error("insufficient {asset} for {account}: available {available}, requested {requested}")]
    InsufficientFunds {
        asset: AssetId,
        account: AccountId,
        available: u64,
        requested: u64,
    },
    #[error("transfer of {amount} {asset} for {account} declined: {reason}")]
    Declined {
        asset: AssetId,
        account: AccountId,
        amount: u64,
        reason: String,
    },
    /// An applied leg of a failed batch could not be reversed. Custody is left holding it.
    #[error(
        "could not undo {} {} for {} after {cause}: {reason}",
        .leg.amount,
        .leg.asset,
        .leg.account
    )]
    RollbackFailed {
        leg: Transfer,
        /// The failure that triggered the rollback.
        cause: Box<CustodyError>,
        reason: String,
    },
}

impl From<CustodyError> for StakingError {
    fn from(e: CustodyError) -> Self {
        let reason = e.to_string();
        match e {
            CustodyError::InsufficientFunds {
                asset,
                account,
                requested,
                ..
            } => StakingError::TransferFailed {
                asset,
                account,
                amount: requested,
                reason,
            },
            CustodyError::Declined {
                asset,
                account,
                amount,
                ..
            } => StakingError::TransferFailed {
                asset,
                account,
                amount,
                reason,
            },
            CustodyError::RollbackFailed { leg, .. } => StakingError::RollbackFailed {
                asset: leg.asset,
                account: leg.account,
                amount: leg.amount,
                reason,
            },
        }
    }
}

/// Into custody (depositor pays) or out of custody (depositor receives).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    In,
    Out,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Transfer {
    pub direction: Direction,
    pub asset: AssetId,
    pub account: AccountId,
    pub amount: u64,
}

impl Transfer {
    pub fn inbound(asset: &AssetId, from: &AccountId, amount: u64) -> Self {
        Self {
            direction: Direction::In,
            asset: asset.clone(),
            account: from.clone(),
            amount,
        }
    }

    pub fn outbound(asset: &AssetId, to: &AccountId, amount: u64) -> Self {
        Self {
            direction: Direction::Out,
            asset: asset.clone(),
            account: to.clone(),
            amount,
        }
    }

    /// The transfer that undoes this one.
    pub fn reversed(&self) -> Self {
        let direction = match self.direction {
            Direction::In => Direction::Out,
            Direction::Out => Direction::In,
        };
        Self {
            direction,
            ..self.clone()
        }
    }
}

pub trait Custody {
    /// Take `amount` of `asset` from `from` into custody. All or nothing.
    fn transfer_in(
        &mut self,
        asset: &AssetId,
        from: &AccountId,
        amount: u64,
    ) -> Result<(), CustodyError>;

    /// Release `amount` of `asset` from custody to `to`. All or nothing.
    fn transfer_out(
        &mut self,
        asset: &AssetId,
        to: &AccountId,
        amount: u64,
    ) -> Result<(), CustodyError>;

    fn apply(&mut self, transfer: &Transfer) -> Result<(), CustodyError> {
        match transfer.direction {
            Direction::In => self.transfer_in(&transfer.asset, &transfer.account, transfer.amount),
            Direction::Out => {
                self.transfer_out(&transfer.asset, &transfer.account, transfer.amount)
            }
        }
    }

    /// Run a batch so that either every transfer lands or none does.
    ///
    /// The default applies transfers in order and reverses the applied prefix when
    /// one fails. If a reversal fails too, the error is `RollbackFailed` naming the
    /// first leg left in place. Implementations that can stage changes should override it.
    fn execute(&mut self, transfers: &[Transfer]) -> Result<(), CustodyError> {
        for (i, transfer) in transfers.iter().enumerate() {
            let Err(cause) = self.apply(transfer) else {
                continue;
            };
            let mut stuck = None;
            for done in transfers[..i].iter().rev() {
                if let Err(undo) = self.apply(&done.reversed()) {
                    warn!(
                        error = %undo,
                        asset = %done.asset,
                        account = %done.account,
                        amount = done.amount,
                        "rollback transfer failed"
                    );
                    stuck.get_or_insert((done.clone(), undo.to_string()));
                }
            }
            return Err(match stuck {
                Some((leg, reason)) => CustodyError::RollbackFailed {
                    leg,
                    cause: Box::new(cause),
                    reason,
                },
                None => cause,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Custody that declines every transfer of one asset.
    struct Flaky {
        deny: AssetId,
        log: Vec<Transfer>,
    }

    impl Custody for Flaky {
        fn transfer_in(
            &mut self,
            asset: &AssetId,
            from: &AccountId,
            amount: u64,
        ) -> Result<(), CustodyError> {
            self.record(Transfer::inbound(asset, from, amount))
        }

        fn transfer_out(
            &mut self,
            asset: &AssetId,
            to: &AccountId,
            amount: u64,
        ) -> Result<(), CustodyError> {
            self.record(Transfer::outbound(asset, to, amount))
        }
    }

    impl Flaky {
        fn record(&mut self, t: Transfer) -> Result<(), CustodyError> {
            if t.asset == self.deny {
                return Err(CustodyError::Declined {
                    asset: t.asset,
                    account: t.account,
                    amount: t.amount,
                    reason: "flaky".to_string(),
                });
            }
            self.log.push(t);
            Ok(())
        }
    }

    #[test]
    fn default_execute_rolls_back_prefix() {
        let alice = AccountId::new("alice");
        let stk = AssetId::new("STK");
        let rwd = AssetId::new("RWD");
        let mut custody = Flaky {
            deny: rwd.clone(),
            log: vec![],
        };
        let batch = vec![
            Transfer::inbound(&stk, &alice, 10),
            Transfer::outbound(&rwd, &alice, 3),
        ];
        let err = custody.execute(&batch).unwrap_err();
        assert!(matches!(err, CustodyError::Declined { .. }));
        assert_eq!(
            custody.log,
            vec![batch[0].clone(), Transfer::outbound(&stk, &alice, 10)]
        );
    }

    /// Accepts deposits into custody, declines every release.
    #[derive(Default)]
    struct OneWay {
        held: u64,
    }

    impl Custody for OneWay {
        fn transfer_in(
            &mut self,
            _asset: &AssetId,
            _from: &AccountId,
            amount: u64,
        ) -> Result<(), CustodyError> {
            self.held += amount;
            Ok(())
        }

        fn transfer_out(
            &mut self,
            asset: &AssetId,
            to: &AccountId,
            amount: u64,
        ) -> Result<(), CustodyError> {
            Err(CustodyError::Declined {
                asset: asset.clone(),
                account: to.clone(),
                amount,
                reason: "outbound disabled".to_string(),
            })
        }
    }

    #[test]
    fn failed_reversal_is_reported() {
        let alice = AccountId::new("alice");
        let stk = AssetId::new("STK");
        let rwd = AssetId::new("RWD");
        let mut custody = OneWay::default();
        let batch = vec![
            Transfer::inbound(&stk, &alice, 10),
            Transfer::outbound(&rwd, &alice, 3),
        ];
        let err = custody.execute(&batch).unwrap_err();
        match &err {
            CustodyError::RollbackFailed { leg, cause, .. } => {
                assert_eq!(leg, &batch[0]);
                assert!(matches!(**cause, CustodyError::Declined { amount: 3, .. }));
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(custody.held, 10);
        assert!(matches!(
            StakingError::from(err),
            StakingError::RollbackFailed { amount: 10, .. }
        ));
    }

    #[test]
    fn reversed_flips_direction() {
        let t = Transfer::inbound(&AssetId::new("A"), &AccountId::new("x"), 5);
        assert_eq!(t.reversed().direction, Direction::Out);
        assert_eq!(t.reversed().reversed(), t);
    }

    #[test]
    fn custody_error_maps_to_transfer_failed() {
        let e = CustodyError::InsufficientFunds {
            asset: AssetId::new("RWD"),
            account: AccountId::new("bob"),
            available: 1,
            requested: 9,
        };
        match StakingError::from(e) {
            StakingError::TransferFailed { amount, .. } => assert_eq!(amount, 9),
            other => panic!("unexpected {other:?}"),
        }
    }
}
