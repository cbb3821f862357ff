use near_sdk::json_types::{Base58CryptoHash, Base64VecU8, U128};
use near_sdk::store::{IterableMap, LookupMap};
use near_sdk::{
    assert_one_yocto, bs58, env, ext_contract, is_promise_success, log, near, AccountId,
    NearToken, PanicOnDefault, Promise, PromiseOrValue, PublicKey,
};

mod config;
mod error;
mod events;
mod keys;
mod lifecycle;
mod order;
mod signatures;
mod storage;
mod timelocks;


pub use config::HtlcConfig;
pub use error::HtlcError;
pub use events::HtlcEvent;
pub use lifecycle::{MIN_INITIATE_GAS, MIN_PAYOUT_GAS};
pub use order::{
    InitiateMsg, Order, OrderId, OrderOutcome, OrderStatus, OrderView, ZERO_IMPLICIT_ACCOUNT,
};
pub use signatures::{
    DetachedSignature, Domain, DomainView, Initiate, Refund, SignatureVerifier, TypedMessage,
    INITIATE_TYPE, REFUND_TYPE,
};
pub use storage::ORDER_STORAGE_BYTES;
pub use timelocks::Timelock;

use error::OrPanic;
use lifecycle::ensure_gas;
use storage::order_storage_cost;

// External contract interfaces
#[ext_contract(ext_fungible_token)]
pub trait FungibleToken {
    fn ft_transfer(&mut self, receiver_id: AccountId, amount: U128, memo: Option<String>);
    fn ft_transfer_from(
        &mut self,
        owner_id: AccountId,
        new_owner_id: AccountId,
        amount: U128,
        memo: Option<String>,
    );
}

#[ext_contract(ext_self)]
pub trait SelfCallbacks {
    fn on_tokens_pulled(&mut self, order_id: Base58CryptoHash) -> bool;
    fn on_order_settled(&mut self, order_id: Base58CryptoHash) -> bool;
}

#[near(contract_state)]
#[derive(PanicOnDefault)]
pub struct Contract {
    pub config: HtlcConfig,
    // Every order ever initiated, keyed by its derived id. Never pruned.
    pub orders: IterableMap<OrderId, Order>,
    // Orders whose tokens are still being pulled from the initiator
    pub pending: LookupMap<OrderId, Order>,
    pub registered_keys: IterableMap<AccountId, Vec<PublicKey>>,
    pub key_owners: LookupMap<PublicKey, AccountId>,
    // Unused storage credit per account, drawn down by every order it opens
    pub storage_balances: LookupMap<AccountId, NearToken>,
}

#[near]
impl Contract {
    #[init]
    pub fn new(token_id: AccountId, name: String, version: String, chain_id: String) -> Self {
        let config = HtlcConfig::new(token_id, name, version, chain_id).or_panic();
        Self {
            config,
            orders: IterableMap::new(b"o"),
            pending: LookupMap::new(b"p"),
            registered_keys: IterableMap::new(b"k"),
            key_owners: LookupMap::new(b"w"),
            storage_balances: LookupMap::new(b"s"),
        }
    }

    /// Registers the FullAccess key signing this transaction for the signer account.
    /// Signatures from that key then recover to the account.
    pub fn register_key(&mut self) {
        let account_id = env::signer_account_id();
        let public_key = env::signer_account_pk();

        self.add_key(account_id.clone(), public_key.clone()).or_panic();

        log!(
            "Registered key {} for account {}",
            bs58::encode(public_key.as_bytes()).into_string(),
            account_id,
        );
    }

    pub fn unregister_key(&mut self, public_key: PublicKey) {
        let account_id = env::predecessor_account_id();
        self.remove_key(&account_id, &public_key).or_panic();
        log!("Unregistered key for account {}", account_id);
    }

    /// Prepays storage for orders `account_id` (default: caller) will open.
    #[payable]
    pub fn storage_deposit(&mut self, account_id: Option<AccountId>) -> U128 {
        let account_id = account_id.unwrap_or_else(env::predecessor_account_id);
        let balance = self
            .top_up_storage(account_id.clone(), env::attached_deposit())
            .or_panic();
        log!("Storage balance of {} is {}", account_id, balance);
        U128(balance.as_yoctonear())
    }

    /// Returns unused storage credit to the caller; everything when `amount` is omitted.
    #[payable]
    pub fn storage_withdraw(&mut self, amount: Option<U128>) -> Promise {
        assert_one_yocto();
        let account_id = env::predecessor_account_id();
        let amount = self
            .withdraw_storage(&account_id, amount.map(|a| NearToken::from_yoctonear(a.0)))
            .or_panic();
        Promise::new(account_id).transfer(amount)
    }

    /// Opens an order funded by the caller. The HTLC must hold an allowance of
    /// at least `amount` on the token; the order becomes active once the pull lands.
    /// The attached deposit is added to the caller's storage credit, which must
    /// cover the order's storage.
    #[payable]
    pub fn initiate(
        &mut self,
        redeemer: AccountId,
        timelock: u64,
        amount: U128,
        secret_hash: Base58CryptoHash,
    ) -> Promise {
        ensure_gas(MIN_INITIATE_GAS).or_panic();
        let initiator = env::predecessor_account_id();
        self.credit_storage(initiator.clone(), env::attached_deposit());
        let order_id = self
            .reserve_order(initiator.clone(), redeemer, timelock, amount.0, secret_hash.into())
            .or_panic();
        self.pull_tokens(order_id, initiator, amount.0)
    }

    /// Opens an order on behalf of whoever signed
    /// `Initiate { redeemer, timelock, amount, secret_hash }`.
    /// Any relayer may submit it; funds are pulled from the signer, and the
    /// signer's storage credit (topped up by any attached deposit) pays for the order.
    #[payable]
    pub fn initiate_with_signature(
        &mut self,
        redeemer: AccountId,
        timelock: u64,
        amount: U128,
        secret_hash: Base58CryptoHash,
        signature: Base64VecU8,
        public_key: PublicKey,
    ) -> Promise {
        ensure_gas(MIN_INITIATE_GAS).or_panic();
        let message = Initiate {
            redeemer,
            timelock,
            amount: amount.0,
            secret_hash: secret_hash.into(),
        };
        let signed = DetachedSignature {
            public_key,
            signature: signature.into(),
        };

        let initiator = self.recover_signed_initiator(&message, &signed).or_panic();
        self.credit_storage(initiator.clone(), env::attached_deposit());
        let order_id = self
            .reserve_order(
                initiator.clone(),
                message.redeemer,
                message.timelock,
                message.amount,
                message.secret_hash,
            )
            .or_panic();
        self.pull_tokens(order_id, initiator, message.amount)
    }

    /// NEP-141 receiver: opens an order with tokens sent through `ft_transfer_call`.
    ///
    /// `msg` is a JSON `InitiateMsg`; the sender becomes the initiator and needs
    /// prepaid storage credit. A rejected message panics, which makes the token
    /// contract refund the transfer.
    pub fn ft_on_transfer(
        &mut self,
        sender_id: AccountId,
        amount: U128,
        msg: String,
    ) -> PromiseOrValue<U128> {
        let token_id = env::predecessor_account_id();
        self.accept_transfer(&token_id, sender_id, amount.0, &msg)
            .or_panic();
        PromiseOrValue::Value(U128(0))
    }

    /// Reveals the secret and pays the order's redeemer. Callable by anyone.
    pub fn redeem(&mut self, order_id: Base58CryptoHash, secret: Base64VecU8) -> Promise {
        ensure_gas(MIN_PAYOUT_GAS).or_panic();
        let payout = self.prepare_redeem(order_id.into(), &secret.0).or_panic();
        self.release(payout)
    }

    /// Returns an expired order's funds to its initiator. Callable by anyone.
    pub fn refund(&mut self, order_id: Base58CryptoHash) -> Promise {
        ensure_gas(MIN_PAYOUT_GAS).or_panic();
        let payout = self.prepare_refund(order_id.into()).or_panic();
        self.release(payout)
    }

    /// Returns funds to the initiator before expiry, given the redeemer's
    /// signature over `Refund { order_id }`.
    pub fn instant_refund(
        &mut self,
        order_id: Base58CryptoHash,
        signature: Base64VecU8,
        public_key: PublicKey,
    ) -> Promise {
        ensure_gas(MIN_PAYOUT_GAS).or_panic();
        let signed = DetachedSignature {
            public_key,
            signature: signature.into(),
        };
        let payout = self
            .prepare_instant_refund(order_id.into(), &signed)
            .or_panic();
        self.release(payout)
    }

    /// Sends a bounced payout again, to the same payee. Callable by anyone.
    pub fn retry_payout(&mut self, order_id: Base58CryptoHash) -> Promise {
        ensure_gas(MIN_PAYOUT_GAS).or_panic();
        let payout = self.prepare_retry(order_id.into()).or_panic();
        self.release(payout)
    }

    // --- PRIVATE CALLBACKS ---
    #[private]
    pub fn on_tokens_pulled(&mut self, order_id: Base58CryptoHash) -> bool {
        self.complete_pull(order_id.into(), is_promise_success())
    }

    #[private]
    pub fn on_order_settled(&mut self, order_id: Base58CryptoHash) -> bool {
        self.complete_settlement(order_id.into(), is_promise_success())
    }

    // --- VIEWS ---
    pub fn get_order(&self, order_id: Base58CryptoHash) -> Option<OrderView> {
        let order_id: OrderId = order_id.into();
        self.orders
            .get(&order_id)
            .map(|order| OrderView::new(order_id, order))
    }

    pub fn get_orders(&self, from_index: Option<u32>, limit: Option<u32>) -> Vec<OrderView> {
        self.orders
            .iter()
            .skip(from_index.unwrap_or(0) as usize)
            .take(limit.unwrap_or(50) as usize)
            .map(|(order_id, order)| OrderView::new(*order_id, order))
            .collect()
    }

    pub fn get_order_status(&self, order_id: Base58CryptoHash) -> OrderStatus {
        self.status_of(&order_id.into())
    }

    /// The id an order by `initiator` with `secret_hash` has on this deployment.
    pub fn get_order_id(
        &self,
        secret_hash: Base58CryptoHash,
        initiator: AccountId,
    ) -> Base58CryptoHash {
        self.derive_id(&secret_hash.into(), &initiator).into()
    }

    pub fn token(&self) -> AccountId {
        self.config.token_id.clone()
    }

    pub fn get_config(&self) -> HtlcConfig {
        self.config.clone()
    }

    pub fn get_domain(&self) -> DomainView {
        DomainView::from(&self.domain())
    }

    /// Digest an initiator signs to authorize `initiate_with_signature`.
    pub fn initiate_digest(
        &self,
        redeemer: AccountId,
        timelock: u64,
        amount: U128,
        secret_hash: Base58CryptoHash,
    ) -> Base58CryptoHash {
        let message = Initiate {
            redeemer,
            timelock,
            amount: amount.0,
            secret_hash: secret_hash.into(),
        };
        self.domain().digest(&message).into()
    }

    /// Digest a redeemer signs to consent to `instant_refund`.
    pub fn refund_digest(&self, order_id: Base58CryptoHash) -> Base58CryptoHash {
        let message = Refund {
            order_id: order_id.into(),
        };
        self.domain().digest(&message).into()
    }

    pub fn get_registered_keys(&self, account_id: AccountId) -> Vec<PublicKey> {
        self.keys_of(&account_id)
    }

    pub fn storage_balance_of(&self, account_id: AccountId) -> U128 {
        U128(self.storage_balance(&account_id).as_yoctonear())
    }

    /// Storage credit one order consumes.
    pub fn get_order_storage_cost(&self) -> U128 {
        U128(order_storage_cost().as_yoctonear())
    }
}
