use near_sdk::json_types::{Base58CryptoHash, Base64VecU8, U128};
use near_sdk::near;

/// NEP-297 events emitted by the escrow. Relayers watch `redeemed` to learn
/// the secret for the counterpart leg.
#[near(event_json(standard = "htlc"))]
pub enum HtlcEvent {
    #[event_version("1.0.0")]
    Initiated {
        order_id: Base58CryptoHash,
        secret_hash: Base58CryptoHash,
        amount: U128,
    },
    #[event_version("1.0.0")]
    Redeemed {
        order_id: Base58CryptoHash,
        secret_hash: Base58CryptoHash,
        secret: Base64VecU8,
    },
    #[event_version("1.0.0")]
    Refunded { order_id: Base58CryptoHash },
    #[event_version("1.0.0")]
    InitiationAborted { order_id: Base58CryptoHash },
    #[event_version("1.0.0")]
    Settled { order_id: Base58CryptoHash },
    #[event_version("1.0.0")]
    PayoutFailed { order_id: Base58CryptoHash },
    #[event_version("1.0.0")]
    PayoutRetried { order_id: Base58CryptoHash },
}
