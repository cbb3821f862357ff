use near_sdk::json_types::{Base58CryptoHash, U128};
use near_sdk::{env, near, AccountId, CryptoHash};

use crate::timelocks::Timelock;

// sha256(chain_context ‖ secret_hash ‖ sha256(initiator))
pub type OrderId = CryptoHash;

/// Implicit account of the all-zero ed25519 key, the NEAR counterpart of address(0).
pub const ZERO_IMPLICIT_ACCOUNT: &str =
    "0000000000000000000000000000000000000000000000000000000000000000";

// One escrow instance. Everything but the settlement fields is fixed at creation,
// and `outcome` is never cleared once set.
#[near(serializers = [borsh])]
#[derive(Clone, Debug, PartialEq)]
pub struct Order {
    pub secret_hash: CryptoHash,
    pub initiator: AccountId, // Deposited the funds, receives them on refund
    pub redeemer: AccountId,  // Receives the funds when the secret is revealed
    pub amount: u128,
    pub timelock: Timelock,
    pub outcome: Option<OrderOutcome>,
    // Set when the payout transfer bounced; cleared while a retry is in flight
    pub payout_failed: bool,
}

impl Order {
    pub fn new(
        secret_hash: CryptoHash,
        initiator: AccountId,
        redeemer: AccountId,
        amount: u128,
        timelock: Timelock,
    ) -> Self {
        Self {
            secret_hash,
            initiator,
            redeemer,
            amount,
            timelock,
            outcome: None,
            payout_failed: false,
        }
    }

    pub fn is_fulfilled(&self) -> bool {
        self.outcome.is_some()
    }

    /// Who the escrowed funds go to for a given outcome.
    pub fn payee(&self, outcome: OrderOutcome) -> &AccountId {
        match outcome {
            OrderOutcome::Redeemed => &self.redeemer,
            OrderOutcome::Refunded => &self.initiator,
        }
    }
}

/// How a fulfilled order was closed. Fixes the payee for good.
#[near(serializers = [borsh, json])]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OrderOutcome {
    Redeemed,
    Refunded,
}

#[near(serializers = [json])]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OrderStatus {
    Uninitiated,
    /// Initiated through an allowance pull that has not resolved yet.
    Pending,
    Active,
    Fulfilled,
}

/// JSON shape of an order returned by the view methods.
#[near(serializers = [json])]
#[derive(Clone, Debug, PartialEq)]
pub struct OrderView {
    pub order_id: Base58CryptoHash,
    pub secret_hash: Base58CryptoHash,
    pub initiator: AccountId,
    pub redeemer: AccountId,
    pub amount: U128,
    pub initiated_at: u64,
    pub timelock: u64,
    pub expires_at: u64,
    pub fulfilled: bool,
    pub outcome: Option<OrderOutcome>,
    pub payout_failed: bool,
}

impl OrderView {
    pub fn new(order_id: OrderId, order: &Order) -> Self {
        Self {
            order_id: order_id.into(),
            secret_hash: order.secret_hash.into(),
            initiator: order.initiator.clone(),
            redeemer: order.redeemer.clone(),
            amount: U128(order.amount),
            initiated_at: order.timelock.initiated_at,
            timelock: order.timelock.duration,
            expires_at: order.timelock.expires_at(),
            fulfilled: order.is_fulfilled(),
            outcome: order.outcome,
            payout_failed: order.payout_failed,
        }
    }
}

// Message for ft_on_transfer to initiate an order with the transferred tokens
#[near(serializers = [json])]
#[derive(Clone, Debug)]
pub struct InitiateMsg {
    pub redeemer: AccountId,
    pub timelock: u64,
    pub secret_hash: Base58CryptoHash,
}

/// A release of escrowed funds decided by a redeem or refund transition.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Payout {
    pub order_id: OrderId,
    pub payee: AccountId,
    pub amount: u128,
}

pub fn derive_order_id(
    chain_context: &CryptoHash,
    secret_hash: &CryptoHash,
    initiator: &AccountId,
) -> OrderId {
    let mut preimage = [0u8; 96];
    preimage[..32].copy_from_slice(chain_context);
    preimage[32..64].copy_from_slice(secret_hash);
    preimage[64..].copy_from_slice(&env::sha256_array(initiator.as_str().as_bytes()));
    env::sha256_array(&preimage)
}

pub fn hash_secret(secret: &[u8]) -> CryptoHash {
    env::sha256_array(secret)
}

pub fn is_zero_identity(account_id: &AccountId) -> bool {
    account_id.as_str() == ZERO_IMPLICIT_ACCOUNT || account_id.as_str() == "system"
}

#[cfg(test)]
mod tests {
    use super::*;
    use sha2::{Digest, Sha256};

    fn account(name: &str) -> AccountId {
        name.parse().unwrap()
    }

    #[test]
    fn order_id_matches_offchain_derivation() {
        let chain = env::sha256_array(b"testnet");
        let secret_hash = hash_secret(b"secret");
        let alice = account("alice.testnet");

        let mut hasher = Sha256::new();
        hasher.update(chain);
        hasher.update(secret_hash);
        hasher.update(Sha256::digest(alice.as_str().as_bytes()));
        let expected: [u8; 32] = hasher.finalize().into();

        assert_eq!(derive_order_id(&chain, &secret_hash, &alice), expected);
    }

    #[test]
    fn order_id_binds_every_input() {
        let chain = env::sha256_array(b"testnet");
        let other_chain = env::sha256_array(b"mainnet");
        let secret_hash = hash_secret(b"one");
        let other_hash = hash_secret(b"two");
        let alice = account("alice.testnet");
        let bob = account("bob.testnet");

        let id = derive_order_id(&chain, &secret_hash, &alice);
        assert_eq!(id, derive_order_id(&chain, &secret_hash, &alice));
        assert_ne!(id, derive_order_id(&other_chain, &secret_hash, &alice));
        assert_ne!(id, derive_order_id(&chain, &other_hash, &alice));
        assert_ne!(id, derive_order_id(&chain, &secret_hash, &bob));
    }

    #[test]
    fn zero_identities() {
        assert!(is_zero_identity(&account(ZERO_IMPLICIT_ACCOUNT)));
        assert!(is_zero_identity(&account("system")));
        assert!(!is_zero_identity(&account("bob.testnet")));
    }

    #[test]
    fn view_exposes_expiry() {
        let order = Order::new(
            hash_secret(b"s"),
            account("alice.testnet"),
            account("bob.testnet"),
            100,
            Timelock::new(10, 7200),
        );
        let view = OrderView::new([7u8; 32], &order);
        assert_eq!(view.expires_at, 7210);
        assert_eq!(view.amount, U128(100));
        assert_eq!(view.order_id, Base58CryptoHash::from([7u8; 32]));
        assert!(!view.fulfilled);
    }

    #[test]
    fn outcome_fixes_payee() {
        let mut order = Order::new(
            hash_secret(b"s"),
            account("alice.testnet"),
            account("bob.testnet"),
            100,
            Timelock::new(10, 7200),
        );
        assert_eq!(order.payee(OrderOutcome::Redeemed), &account("bob.testnet"));
        assert_eq!(order.payee(OrderOutcome::Refunded), &account("alice.testnet"));

        order.outcome = Some(OrderOutcome::Redeemed);
        let view = OrderView::new([7u8; 32], &order);
        assert!(view.fulfilled);
        assert_eq!(view.outcome, Some(OrderOutcome::Redeemed));
    }
}
