use near_sdk::json_types::{Base64VecU8, U128};
use near_sdk::{env, log, serde_json, AccountId, CryptoHash, Gas, NearToken, Promise};

use crate::error::{HtlcError, HtlcResult};
use crate::events::HtlcEvent;
use crate::order::{
    derive_order_id, hash_secret, is_zero_identity, InitiateMsg, Order, OrderId, OrderOutcome,
    OrderStatus, Payout,
};
use crate::signatures::{
    DetachedSignature, Domain, Initiate, Refund, RegisteredKeys, SignatureVerifier,
};
use crate::storage::order_storage_cost;
use crate::timelocks::{current_height, Timelock};
use crate::{ext_fungible_token, ext_self, Contract};

pub const GAS_FOR_FT_TRANSFER: Gas = Gas::from_tgas(10);
pub const GAS_FOR_FT_TRANSFER_FROM: Gas = Gas::from_tgas(20);
pub const GAS_FOR_CALLBACK: Gas = Gas::from_tgas(10);
/// Calls that schedule a token transfer must leave enough gas for it and its
/// callback, otherwise the caller could starve either into failing.
pub const MIN_PAYOUT_GAS: Gas = Gas::from_tgas(30);
pub const MIN_INITIATE_GAS: Gas = Gas::from_tgas(40);

pub fn ensure_gas(minimum: Gas) -> HtlcResult<()> {
    if env::prepaid_gas() < minimum {
        return Err(HtlcError::InsufficientGas);
    }
    Ok(())
}

// Order state transitions. Every `prepare_*` validates completely before it
// mutates, so an `Err` leaves the store untouched.
impl Contract {
    pub(crate) fn domain(&self) -> Domain {
        Domain::new(&self.config, env::current_account_id())
    }

    pub(crate) fn derive_id(&self, secret_hash: &CryptoHash, initiator: &AccountId) -> OrderId {
        derive_order_id(&self.config.chain_context(), secret_hash, initiator)
    }

    pub(crate) fn status_of(&self, order_id: &OrderId) -> OrderStatus {
        match self.orders.get(order_id) {
            Some(order) if order.is_fulfilled() => OrderStatus::Fulfilled,
            Some(_) => OrderStatus::Active,
            None if self.pending.contains_key(order_id) => OrderStatus::Pending,
            None => OrderStatus::Uninitiated,
        }
    }

    /// Checks shared by every initiation path. Returns the id the order will be stored under.
    pub(crate) fn validate_initiation(
        &self,
        initiator: &AccountId,
        redeemer: &AccountId,
        timelock: u64,
        amount: u128,
        secret_hash: &CryptoHash,
    ) -> HtlcResult<OrderId> {
        if is_zero_identity(redeemer) {
            return Err(HtlcError::ZeroAddressRedeemer);
        }
        if amount == 0 {
            return Err(HtlcError::ZeroAmount);
        }
        if timelock == 0 {
            return Err(HtlcError::ZeroTimelock);
        }
        if initiator == redeemer {
            return Err(HtlcError::SameInitiatorAndRedeemer);
        }

        let order_id = self.derive_id(secret_hash, initiator);
        if self.status_of(&order_id) != OrderStatus::Uninitiated {
            return Err(HtlcError::DuplicateOrder);
        }
        Ok(order_id)
    }

    /// Resolves who signed an `Initiate` message.
    pub(crate) fn recover_initiator<V: SignatureVerifier>(
        &self,
        verifier: &V,
        message: &Initiate,
        signature: &DetachedSignature,
    ) -> HtlcResult<AccountId> {
        verifier
            .recover(&self.domain(), message, signature)
            .ok_or(HtlcError::InvalidInitiatorSignature)
    }

    pub(crate) fn recover_signed_initiator(
        &self,
        message: &Initiate,
        signature: &DetachedSignature,
    ) -> HtlcResult<AccountId> {
        self.recover_initiator(&RegisteredKeys::new(&self.key_owners), message, signature)
    }

    /// Holds the order id while the initiator's tokens are pulled in. The
    /// initiator's storage credit pays for the record.
    pub(crate) fn reserve_order(
        &mut self,
        initiator: AccountId,
        redeemer: AccountId,
        timelock: u64,
        amount: u128,
        secret_hash: CryptoHash,
    ) -> HtlcResult<OrderId> {
        let order_id =
            self.validate_initiation(&initiator, &redeemer, timelock, amount, &secret_hash)?;
        self.charge_order_storage(&initiator)?;
        self.pending.insert(
            order_id,
            Order::new(
                secret_hash,
                initiator,
                redeemer,
                amount,
                Timelock::new(current_height(), timelock),
            ),
        );
        Ok(order_id)
    }

    /// Pulls a reserved order's amount from its initiator using their allowance.
    pub(crate) fn pull_tokens(
        &self,
        order_id: OrderId,
        initiator: AccountId,
        amount: u128,
    ) -> Promise {
        ext_fungible_token::ext(self.config.token_id.clone())
            .with_attached_deposit(NearToken::from_yoctonear(1))
            .with_static_gas(GAS_FOR_FT_TRANSFER_FROM)
            .ft_transfer_from(
                initiator,
                env::current_account_id(),
                U128(amount),
                Some("HTLC initiate".to_string()),
            )
            .then(
                ext_self::ext(env::current_account_id())
                    .with_static_gas(GAS_FOR_CALLBACK)
                    .on_tokens_pulled(order_id.into()),
            )
    }

    /// Resolves a reservation once the token pull has finished. Never panics, so a
    /// failed pull keeps the token contract's error as the reported cause.
    pub(crate) fn complete_pull(&mut self, order_id: OrderId, pulled: bool) -> bool {
        let Some(mut order) = self.pending.remove(&order_id) else {
            return false;
        };

        if !pulled {
            log!("Token pull failed, initiation aborted");
            self.credit_storage(order.initiator, order_storage_cost());
            HtlcEvent::InitiationAborted {
                order_id: order_id.into(),
            }
            .emit();
            return false;
        }

        order.timelock = Timelock::new(current_height(), order.timelock.duration);
        self.activate(order_id, order);
        true
    }

    /// Opens an order whose tokens arrived through `ft_transfer_call`.
    pub(crate) fn accept_transfer(
        &mut self,
        token_id: &AccountId,
        sender_id: AccountId,
        amount: u128,
        msg: &str,
    ) -> HtlcResult<OrderId> {
        if token_id != &self.config.token_id {
            return Err(HtlcError::UnsupportedToken);
        }
        let params: InitiateMsg =
            serde_json::from_str(msg).map_err(|_| HtlcError::InvalidInitiateMessage)?;
        let secret_hash: CryptoHash = params.secret_hash.into();

        let order_id = self.validate_initiation(
            &sender_id,
            &params.redeemer,
            params.timelock,
            amount,
            &secret_hash,
        )?;
        self.charge_order_storage(&sender_id)?;
        self.activate(
            order_id,
            Order::new(
                secret_hash,
                sender_id,
                params.redeemer,
                amount,
                Timelock::new(current_height(), params.timelock),
            ),
        );
        Ok(order_id)
    }

    fn activate(&mut self, order_id: OrderId, order: Order) {
        HtlcEvent::Initiated {
            order_id: order_id.into(),
            secret_hash: order.secret_hash.into(),
            amount: U128(order.amount),
        }
        .emit();
        self.orders.insert(order_id, order);
    }

    fn active_order(&self, order_id: &OrderId) -> HtlcResult<&Order> {
        let order = self
            .orders
            .get(order_id)
            .ok_or(HtlcError::OrderNotInitiated)?;
        if order.is_fulfilled() {
            return Err(HtlcError::OrderFulfilled);
        }
        Ok(order)
    }

    // The only place an outcome is written; nothing clears it afterwards.
    fn fulfil(&mut self, order_id: OrderId, outcome: OrderOutcome) -> HtlcResult<Payout> {
        let order = self
            .orders
            .get_mut(&order_id)
            .ok_or(HtlcError::OrderNotInitiated)?;
        order.outcome = Some(outcome);
        Ok(Payout {
            order_id,
            payee: order.payee(outcome).clone(),
            amount: order.amount,
        })
    }

    /// Marks the order redeemed. Funds always go to the stored redeemer, whoever calls.
    pub(crate) fn prepare_redeem(
        &mut self,
        order_id: OrderId,
        secret: &[u8],
    ) -> HtlcResult<Payout> {
        let order = self.active_order(&order_id)?;
        if hash_secret(secret) != order.secret_hash {
            return Err(HtlcError::IncorrectSecret);
        }

        HtlcEvent::Redeemed {
            order_id: order_id.into(),
            secret_hash: order.secret_hash.into(),
            secret: Base64VecU8::from(secret.to_vec()),
        }
        .emit();
        self.fulfil(order_id, OrderOutcome::Redeemed)
    }

    /// Marks an expired order refunded. Funds always go back to the stored initiator.
    pub(crate) fn prepare_refund(&mut self, order_id: OrderId) -> HtlcResult<Payout> {
        let order = self.active_order(&order_id)?;
        if !order.timelock.has_expired(current_height()) {
            return Err(HtlcError::OrderNotExpired);
        }

        HtlcEvent::Refunded {
            order_id: order_id.into(),
        }
        .emit();
        self.fulfil(order_id, OrderOutcome::Refunded)
    }

    /// Checks that the stored redeemer consented to refunding `order_id` early.
    pub(crate) fn authorize_instant_refund<V: SignatureVerifier>(
        &self,
        verifier: &V,
        order_id: &OrderId,
        signature: &DetachedSignature,
    ) -> HtlcResult<()> {
        let order = self.active_order(order_id)?;
        let message = Refund {
            order_id: *order_id,
        };
        match verifier.recover(&self.domain(), &message, signature) {
            Some(signer) if signer == order.redeemer => Ok(()),
            _ => Err(HtlcError::InvalidRedeemerSignature),
        }
    }

    /// Refunds before expiry on the redeemer's signed consent.
    pub(crate) fn prepare_instant_refund(
        &mut self,
        order_id: OrderId,
        signature: &DetachedSignature,
    ) -> HtlcResult<Payout> {
        let verifier = RegisteredKeys::new(&self.key_owners);
        self.authorize_instant_refund(&verifier, &order_id, signature)?;

        HtlcEvent::Refunded {
            order_id: order_id.into(),
        }
        .emit();
        self.fulfil(order_id, OrderOutcome::Refunded)
    }

    /// Re-sends a bounced payout to the payee its outcome already fixed.
    pub(crate) fn prepare_retry(&mut self, order_id: OrderId) -> HtlcResult<Payout> {
        let order = self
            .orders
            .get_mut(&order_id)
            .ok_or(HtlcError::OrderNotInitiated)?;
        let outcome = match order.outcome {
            Some(outcome) if order.payout_failed => outcome,
            _ => return Err(HtlcError::NoFailedPayout),
        };
        order.payout_failed = false;
        let payout = Payout {
            order_id,
            payee: order.payee(outcome).clone(),
            amount: order.amount,
        };

        HtlcEvent::PayoutRetried {
            order_id: order_id.into(),
        }
        .emit();
        Ok(payout)
    }

    /// Sends a payout from escrow and settles the order once the transfer resolves.
    pub(crate) fn release(&self, payout: Payout) -> Promise {
        ext_fungible_token::ext(self.config.token_id.clone())
            .with_attached_deposit(NearToken::from_yoctonear(1))
            .with_static_gas(GAS_FOR_FT_TRANSFER)
            .ft_transfer(
                payout.payee,
                U128(payout.amount),
                Some("HTLC payout".to_string()),
            )
            .then(
                ext_self::ext(env::current_account_id())
                    .with_static_gas(GAS_FOR_CALLBACK)
                    .on_order_settled(payout.order_id.into()),
            )
    }

    /// A bounced payout leaves the order fulfilled. Only the same payout can be
    /// sent again, through `retry_payout`.
    pub(crate) fn complete_settlement(&mut self, order_id: OrderId, transferred: bool) -> bool {
        if transferred {
            HtlcEvent::Settled {
                order_id: order_id.into(),
            }
            .emit();
            return true;
        }

        if let Some(order) = self.orders.get_mut(&order_id) {
            order.payout_failed = true;
            HtlcEvent::PayoutFailed {
                order_id: order_id.into(),
            }
            .emit();
        }
        false
    }
}
