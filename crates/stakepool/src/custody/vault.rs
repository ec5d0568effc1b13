//! In-memory reference custody: external balances per account plus engine-held reserves.

use crate::custody::{Custody, CustodyError, Direction, Transfer};
use crate::ids::{AccountId, AssetId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

/// Balances of depositors (outside the engine) and reserves the engine holds per asset.
///
/// There is one reserve per asset. When a pool stakes and rewards the same asset,
/// reward payouts draw on the same reserve as deposited principal.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vault {
    accounts: BTreeMap<AssetId, BTreeMap<AccountId, u64>>,
    reserves: BTreeMap<AssetId, u64>,
}

impl Vault {
    /// Credit an account's external balance.
    pub fn deposit(
        &mut self,
        asset: &AssetId,
        account: &AccountId,
        amount: u64,
    ) -> Result<(), CustodyError> {
        let balance = self
            .accounts
            .entry(asset.clone())
            .or_default()
            .entry(account.clone())
            .or_default();
        *balance = balance
            .checked_add(amount)
            .ok_or_else(|| CustodyError::Declined {
                asset: asset.clone(),
                account: account.clone(),
                amount,
                reason: "balance overflow".to_string(),
            })?;
        Ok(())
    }

    /// Credit the engine's reserve of `asset`, e.g. to fund reward payouts.
    pub fn fund_reserve(&mut self, asset: &AssetId, amount: u64) -> Result<(), CustodyError> {
        let reserve = self.reserves.entry(asset.clone()).or_default();
        *reserve = reserve
            .checked_add(amount)
            .ok_or_else(|| CustodyError::Declined {
                asset: asset.clone(),
                account: AccountId::new("reserve"),
                amount,
                reason: "reserve overflow".to_string(),
            })?;
        Ok(())
    }

    pub fn balance(&self, asset: &AssetId, account: &AccountId) -> u64 {
        self.accounts
            .get(asset)
            .and_then(|m| m.get(account))
            .copied()
            .unwrap_or(0)
    }

    pub fn reserve(&self, asset: &AssetId) -> u64 {
        self.reserves.get(asset).copied().unwrap_or(0)
    }

    fn move_in(
        &mut self,
        asset: &AssetId,
        from: &AccountId,
        amount: u64,
    ) -> Result<(), CustodyError> {
        let available = self.balance(asset, from);
        if available < amount {
            return Err(CustodyError::InsufficientFunds {
                asset: asset.clone(),
                account: from.clone(),
                available,
                requested: amount,
            });
        }
        let reserve = self.reserve(asset);
        let new_reserve = reserve
            .checked_add(amount)
            .ok_or_else(|| CustodyError::Declined {
                asset: asset.clone(),
                account: from.clone(),
                amount,
                reason: "reserve overflow".to_string(),
            })?;
        self.accounts
            .entry(asset.clone())
            .or_default()
            .insert(from.clone(), available - amount);
        self.reserves.insert(asset.clone(), new_reserve);
        Ok(())
    }

    fn move_out(
        &mut self,
        asset: &AssetId,
        to: &AccountId,
        amount: u64,
    ) -> Result<(), CustodyError> {
        let reserve = self.reserve(asset);
        if reserve < amount {
            return Err(CustodyError::InsufficientFunds {
                asset: asset.clone(),
                account: to.clone(),
                available: reserve,
                requested: amount,
            });
        }
        self.deposit(asset, to, amount)?;
        self.reserves.insert(asset.clone(), reserve - amount);
        Ok(())
    }
}

impl Custody for Vault {
    fn transfer_in(
        &mut self,
        asset: &AssetId,
        from: &AccountId,
        amount: u64,
    ) -> Result<(), CustodyError> {
        self.move_in(asset, from, amount)?;
        debug!(%asset, account = %from, amount, "custody in");
        Ok(())
    }

    fn transfer_out(
        &mut self,
        asset: &AssetId,
        to: &AccountId,
        amount: u64,
    ) -> Result<(), CustodyError> {
        self.move_out(asset, to, amount)?;
        debug!(%asset, account = %to, amount, "custody out");
        Ok(())
    }

    /// Stage the whole batch on a copy and swap it in only when every transfer succeeds.
    fn execute(&mut self, transfers: &[Transfer]) -> Result<(), CustodyError> {
        let mut staged = self.clone();
        for t in transfers {
            match t.direction {
                Direction::In => staged.transfer_in(&t.asset, &t.account, t.amount)?,
                Direction::Out => staged.transfer_out(&t.asset, &t.account, t.amount)?,
            }
        }
        *self = staged;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids() -> (AssetId, AssetId, AccountId) {
        (AssetId::new("STK"), AssetId::new("RWD"), AccountId::new("alice"))
    }

    #[test]
    fn in_and_out_move_between_account_and_reserve() {
        let (stk, _, alice) = ids();
        let mut vault = Vault::default();
        vault.deposit(&stk, &alice, 100).unwrap();
        vault.transfer_in(&stk, &alice, 60).unwrap();
        assert_eq!(vault.balance(&stk, &alice), 40);
        assert_eq!(vault.reserve(&stk), 60);
        vault.transfer_out(&stk, &alice, 10).unwrap();
        assert_eq!(vault.balance(&stk, &alice), 50);
        assert_eq!(vault.reserve(&stk), 50);
    }

    #[test]
    fn insufficient_funds_leaves_state() {
        let (stk, rwd, alice) = ids();
        let mut vault = Vault::default();
        vault.deposit(&stk, &alice, 5).unwrap();
        let before = vault.clone();
        assert!(matches!(
            vault.transfer_in(&stk, &alice, 6),
            Err(CustodyError::InsufficientFunds { available: 5, .. })
        ));
        assert!(vault.transfer_out(&rwd, &alice, 1).is_err());
        assert_eq!(vault, before);
    }

    #[test]
    fn execute_is_all_or_nothing() {
        let (stk, rwd, alice) = ids();
        let mut vault = Vault::default();
        vault.deposit(&stk, &alice, 100).unwrap();
        vault.fund_reserve(&rwd, 10).unwrap();
        let before = vault.clone();

        let batch = vec![
            Transfer::inbound(&stk, &alice, 50),
            Transfer::outbound(&rwd, &alice, 11),
        ];
        assert!(vault.execute(&batch).is_err());
        assert_eq!(vault, before);

        let batch = vec![
            Transfer::inbound(&stk, &alice, 50),
            Transfer::outbound(&rwd, &alice, 10),
        ];
        vault.execute(&batch).unwrap();
        assert_eq!(vault.balance(&stk, &alice), 50);
        assert_eq!(vault.balance(&rwd, &alice), 10);
        assert_eq!(vault.reserve(&rwd), 0);
    }
}
