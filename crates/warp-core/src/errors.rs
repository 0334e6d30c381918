//! Error types for the warp engine

use thiserror::Error;

use crate::types::{Address, Amount, Leg};

/// Errors surfaced by every public entry point
#[derive(Debug, Error)]
pub enum ZapError {
    #[error("Invalid input: {0}")]
    Input(#[from] InputError),

    #[error("External call failed: {0}")]
    External(#[from] ExternalError),

    #[error("Output below minimum: got {realized}, need {minimum} (short by {shortfall})")]
    Slippage {
        realized: Amount,
        minimum: Amount,
        shortfall: Amount,
    },

    #[error("Reentrant call rejected")]
    Reentrant,

    #[error("Engine still holds {amount} of {token} after the call")]
    CustodyLeak { token: Address, amount: Amount },

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Caller input rejected before any external call
#[derive(Debug, Error, PartialEq, Eq)]
pub enum InputError {
    #[error("Amount must be greater than zero")]
    ZeroAmount,

    #[error("Amount {amount} leaves nothing for the {leg} leg")]
    AmountTooSmall { leg: Leg, amount: Amount },

    #[error("{0} does not fit in 128 bits")]
    AmountOverflow(&'static str),

    #[error("Attached native value {attached} does not match amount {expected}")]
    NativeValueMismatch { expected: Amount, attached: Amount },

    #[error("Native value attached to a non-native call: {attached}")]
    UnexpectedNativeValue { attached: Amount },

    #[error("Slippage {percent}% out of range [0, 100)")]
    SlippageOutOfRange { percent: u8 },

    #[error("Invalid address {address}: {reason}")]
    InvalidAddress { address: String, reason: String },

    #[error("Identical tokens: {0}")]
    IdenticalTokens(Address),

    #[error("Malformed route for {leg}: {reason}")]
    MalformedRoute { leg: &'static str, reason: String },

    #[error("Route for {leg} must start at {expected}, starts at {found}")]
    RouteSourceMismatch {
        leg: &'static str,
        expected: Address,
        found: Address,
    },

    #[error("Route for {leg} must end at {expected}, ends at {found}")]
    RouteDestinationMismatch {
        leg: &'static str,
        expected: Address,
        found: Address,
    },

    #[error("Route for {leg} is empty but {token} differs from {source_token}")]
    MissingRoute {
        leg: &'static str,
        token: Address,
        source_token: Address,
    },

    #[error("Pool {pool} has identical constituents")]
    DegenerateLegs { pool: Address },

    #[error("Pool has an empty reserve ({reserve0}, {reserve1})")]
    EmptyPool { reserve0: Amount, reserve1: Amount },

    #[error("Unknown pool: {0}")]
    UnknownPool(Address),

    #[error("Vault stakes {staked}, which is not a pool")]
    VaultNotPool { staked: Address },

    #[error("Vault stakes pool {staked}, single-asset warp needs a plain token")]
    VaultIsPool { staked: Address },
}

/// Failure reported by a collaborator (router, pool, vault, wrapper, ledger)
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ExternalError {
    #[error("Router rejected call: {0}")]
    Router(String),

    #[error("Deadline expired at {deadline}, now {now}")]
    DeadlineExpired { deadline: u64, now: u64 },

    #[error("Insufficient liquidity between {token_in} and {token_out}")]
    InsufficientLiquidity { token_in: Address, token_out: Address },

    #[error("No pool for pair {token_a} / {token_b}")]
    PairNotFound { token_a: Address, token_b: Address },

    #[error("Pool {pool} rejected call: {reason}")]
    Pool { pool: Address, reason: String },

    #[error("Vault rejected call: {0}")]
    Vault(String),

    #[error("Native wrapper rejected call: {0}")]
    Wrapper(String),

    #[error("Insufficient balance of {token}: need {required}, have {available}")]
    InsufficientBalance {
        token: Address,
        required: Amount,
        available: Amount,
    },

    #[error("Insufficient allowance of {token}: need {required}, have {available}")]
    InsufficientAllowance {
        token: Address,
        required: Amount,
        available: Amount,
    },

    #[error("Journal error: {0}")]
    Journal(String),
}

/// Result type alias for engine operations
pub type Result<T> = std::result::Result<T, ZapError>;

impl ZapError {
    /// Stable machine-readable error code
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Input(_) => "input_validation",
            Self::External(_) => "external_call_failure",
            Self::Slippage { .. } => "slippage_violation",
            Self::Reentrant => "reentrant_call",
            Self::CustodyLeak { .. } => "custody_leak",
            Self::Config(_) => "config",
        }
    }

    /// Build a slippage violation, computing the shortfall
    pub fn slippage(realized: Amount, minimum: Amount) -> Self {
        Self::Slippage {
            realized,
            minimum,
            shortfall: minimum.saturating_sub(realized),
        }
    }

    /// Whether the caller can fix this by requoting with fresh reserves
    pub fn is_requotable(&self) -> bool {
        matches!(
            self,
            Self::Slippage { .. } | Self::External(ExternalError::DeadlineExpired { .. })
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        let err: ZapError = InputError::ZeroAmount.into();
        assert_eq!(err.error_code(), "input_validation");

        let err: ZapError = ExternalError::Router("boom".into()).into();
        assert_eq!(err.error_code(), "external_call_failure");
        assert!(!err.is_requotable());

        let err = ZapError::slippage(90, 100);
        assert_eq!(err.error_code(), "slippage_violation");
        assert!(err.is_requotable());
        match err {
            ZapError::Slippage { shortfall, .. } => assert_eq!(shortfall, 10),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_display_includes_shortfall() {
        let msg = ZapError::slippage(142, 150).to_string();
        assert_eq!(msg, "Output below minimum: got 142, need 150 (short by 8)");
    }
}
