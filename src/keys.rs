use near_sdk::{AccountId, PublicKey};

use crate::error::{HtlcError, HtlcResult};
use crate::Contract;

// Registry of ed25519 keys accounts proved to own. A key maps to exactly one
// account so a signature recovers to a single identity.
impl Contract {
    pub(crate) fn add_key(
        &mut self,
        account_id: AccountId,
        public_key: PublicKey,
    ) -> HtlcResult<()> {
        match self.key_owners.get(&public_key) {
            Some(owner) if owner != &account_id => {
                return Err(HtlcError::KeyOwnedByAnotherAccount)
            }
            Some(_) => return Ok(()),
            None => {}
        }

        self.key_owners.insert(public_key.clone(), account_id.clone());
        if let Some(keys) = self.registered_keys.get_mut(&account_id) {
            keys.push(public_key);
        } else {
            self.registered_keys.insert(account_id, vec![public_key]);
        }
        Ok(())
    }

    pub(crate) fn remove_key(
        &mut self,
        account_id: &AccountId,
        public_key: &PublicKey,
    ) -> HtlcResult<()> {
        if self.key_owners.get(public_key) != Some(account_id) {
            return Err(HtlcError::KeyNotRegistered);
        }
        self.key_owners.remove(public_key);

        let now_empty = match self.registered_keys.get_mut(account_id) {
            Some(keys) => {
                keys.retain(|key| key != public_key);
                keys.is_empty()
            }
            None => false,
        };
        if now_empty {
            self.registered_keys.remove(account_id);
        }
        Ok(())
    }

    pub(crate) fn keys_of(&self, account_id: &AccountId) -> Vec<PublicKey> {
        self.registered_keys
            .get(account_id)
            .cloned()
            .unwrap_or_default()
    }
}
