//! Zap Request and Quote Types
//!
//! Serializable shapes of the public entry points, for callers that build
//! requests from JSON.

use serde::{Deserialize, Serialize};

use warp_core::{Address, Amount, LegRoutes, Route};

/// Convert one asset into pool shares
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZapRequest {
    /// Token to spend, or the native sentinel
    pub source_token: Address,
    pub pool: Address,
    pub amount: Amount,
    /// Fewest LP shares the caller accepts
    pub minimum_lp: Amount,
    #[serde(default)]
    pub routes: LegRoutes,
}

/// Redeem pool shares into one asset
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnzapRequest {
    pub pool: Address,
    /// Token to receive, or the native sentinel
    pub destination_token: Address,
    pub lp_amount: Amount,
    pub minimum_out: Amount,
    #[serde(default)]
    pub routes: LegRoutes,
}

/// Vault deposit, either through a pool or straight into a single-asset
/// vault
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarpRequest {
    In {
        source_token: Address,
        amount: Amount,
        minimum_shares: Amount,
        #[serde(default)]
        routes: LegRoutes,
    },
    Out {
        share_amount: Amount,
        destination_token: Address,
        minimum_out: Amount,
        #[serde(default)]
        routes: LegRoutes,
    },
    InSingle {
        source_token: Address,
        amount: Amount,
        minimum_shares: Amount,
        #[serde(default)]
        route: Route,
    },
    OutSingle {
        share_amount: Amount,
        destination_token: Address,
        minimum_out: Amount,
        #[serde(default)]
        route: Route,
    },
}

/// Off-call estimate for a zap-in
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZapInQuote {
    pub pool: Address,
    /// Expected token0 reaching the pool
    pub leg0_amount: Amount,
    /// Expected token1 reaching the pool
    pub leg1_amount: Amount,
    /// LP at current reserves before any haircut
    pub ideal_lp: Amount,
    /// Floor to pass as `minimum_lp`
    pub minimum_lp: Amount,
    pub slippage_percent: u8,
}

/// Off-call estimate for a zap-out
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZapOutQuote {
    pub pool: Address,
    pub amount0: Amount,
    pub amount1: Amount,
    pub expected_out: Amount,
    /// Floor to pass as `minimum_out`
    pub minimum_out: Amount,
    pub slippage_percent: u8,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_routes_default_to_identity() {
        let json = r#"{
            "pool": "0x00000000000000000000000000000000000010aa",
            "destination_token": "0x0000000000000000000000000000000000000000",
            "lp_amount": 500,
            "minimum_out": 1
        }"#;
        let request: UnzapRequest = serde_json::from_str(json).unwrap();
        assert_eq!(request.routes, LegRoutes::default());
        assert!(request.destination_token.is_zero());
    }

    #[test]
    fn test_warp_request_by_kind() {
        let json = r#"{"out_single": {
            "share_amount": 7,
            "destination_token": "0x00000000000000000000000000000000000010bb",
            "minimum_out": 3,
            "route": ["0x00000000000000000000000000000000000010cc",
                      "0x00000000000000000000000000000000000010bb"]
        }}"#;
        match serde_json::from_str::<WarpRequest>(json).unwrap() {
            WarpRequest::OutSingle { share_amount, route, .. } => {
                assert_eq!(share_amount, 7);
                assert_eq!(route.hops(), 1);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_bad_address_rejected() {
        let json = r#"{"source_token":"0x12","pool":"0x00","amount":1,"minimum_lp":0}"#;
        assert!(serde_json::from_str::<ZapRequest>(json).is_err());
    }
}
