use thiserror::Error;

/// Every reason an HTLC call can be rejected. The `Display` strings are the
/// panic messages observed by callers, so each variant keeps its own.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HtlcError {
    #[error("HTLC: zero address redeemer")]
    ZeroAddressRedeemer,
    #[error("HTLC: zero amount")]
    ZeroAmount,
    #[error("HTLC: zero timelock")]
    ZeroTimelock,
    #[error("HTLC: duplicate order")]
    DuplicateOrder,
    #[error("HTLC: same initiator and redeemer")]
    SameInitiatorAndRedeemer,
    #[error("HTLC: invalid initiator signature")]
    InvalidInitiatorSignature,
    #[error("HTLC: order not initiated")]
    OrderNotInitiated,
    #[error("HTLC: order fulfilled")]
    OrderFulfilled,
    #[error("HTLC: incorrect secret")]
    IncorrectSecret,
    #[error("HTLC: order not expired")]
    OrderNotExpired,
    #[error("HTLC: invalid redeemer signature")]
    InvalidRedeemerSignature,
    #[error("HTLC: unsupported token")]
    UnsupportedToken,
    #[error("HTLC: invalid initiate message")]
    InvalidInitiateMessage,
    #[error("HTLC: key registered to another account")]
    KeyOwnedByAnotherAccount,
    #[error("HTLC: key not registered")]
    KeyNotRegistered,
    #[error("HTLC: no failed payout")]
    NoFailedPayout,
    #[error("HTLC: insufficient gas")]
    InsufficientGas,
    #[error("HTLC: insufficient storage deposit")]
    InsufficientStorageDeposit,
    #[error("HTLC: invalid config: {0}")]
    InvalidConfig(&'static str),
}

pub type HtlcResult<T> = Result<T, HtlcError>;

/// Aborts the current receipt with the error's message, reverting all state changes.
pub trait OrPanic<T> {
    fn or_panic(self) -> T;
}

impl<T> OrPanic<T> for HtlcResult<T> {
    fn or_panic(self) -> T {
        self.unwrap_or_else(|err| near_sdk::env::panic_str(&err.to_string()))
    }
}
