use near_sdk::{env, AccountId, NearToken};

use crate::error::{HtlcError, HtlcResult};
use crate::Contract;

/// Upper bound on the state one order adds for good: the record, its map index
/// entry and the per-record trie overhead.
pub const ORDER_STORAGE_BYTES: u64 = 512;

pub fn order_storage_cost() -> NearToken {
    env::storage_byte_cost().saturating_mul(ORDER_STORAGE_BYTES as u128)
}

// Prepaid storage credit per account. Orders are never deleted, so whoever opens
// one pays for its bytes up front instead of the contract's own balance.
impl Contract {
    pub(crate) fn storage_balance(&self, account_id: &AccountId) -> NearToken {
        self.storage_balances
            .get(account_id)
            .copied()
            .unwrap_or(NearToken::from_yoctonear(0))
    }

    pub(crate) fn credit_storage(&mut self, account_id: AccountId, amount: NearToken) {
        if amount.is_zero() {
            return;
        }
        let balance = self.storage_balance(&account_id).saturating_add(amount);
        self.storage_balances.insert(account_id, balance);
    }

    /// An explicit top-up must cover at least one order, so a balance entry is
    /// never opened for dust.
    pub(crate) fn top_up_storage(
        &mut self,
        account_id: AccountId,
        amount: NearToken,
    ) -> HtlcResult<NearToken> {
        if amount < order_storage_cost() {
            return Err(HtlcError::InsufficientStorageDeposit);
        }
        self.credit_storage(account_id.clone(), amount);
        Ok(self.storage_balance(&account_id))
    }

    pub(crate) fn charge_order_storage(&mut self, account_id: &AccountId) -> HtlcResult<()> {
        let remaining = self
            .storage_balance(account_id)
            .checked_sub(order_storage_cost())
            .ok_or(HtlcError::InsufficientStorageDeposit)?;
        self.storage_balances.insert(account_id.clone(), remaining);
        Ok(())
    }

    /// Takes `amount` (everything when `None`) out of the account's unused credit.
    pub(crate) fn withdraw_storage(
        &mut self,
        account_id: &AccountId,
        amount: Option<NearToken>,
    ) -> HtlcResult<NearToken> {
        let balance = self.storage_balance(account_id);
        let amount = amount.unwrap_or(balance);
        let remaining = balance
            .checked_sub(amount)
            .ok_or(HtlcError::InsufficientStorageDeposit)?;
        if remaining.is_zero() {
            self.storage_balances.remove(account_id);
        } else {
            self.storage_balances.insert(account_id.clone(), remaining);
        }
        Ok(amount)
    }
}
