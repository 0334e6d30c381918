//! Route Executor
//!
//! Route validation (pure, run at entry) and execution of one swap leg
//! through the router. Execution always happens from the engine's custody
//! account.

use warp_core::{
    Address, Amount, ExternalError, Factory, InputError, Route, Router, Timestamp, TokenLedger,
    ZapError, NATIVE_ASSET,
};

/// Check a caller route against the leg it is meant to serve.
///
/// An empty route is only valid when no conversion is needed. A non-empty
/// route must hold at least two tokens, never the native sentinel, start at
/// `expected_source`, end at `expected_destination`, and cross only pools
/// the factory knows.
pub fn validate_route(
    leg: &'static str,
    route: &Route,
    expected_source: &Address,
    expected_destination: &Address,
    factory: &dyn Factory,
) -> Result<(), InputError> {
    if route.is_identity() {
        if expected_source == expected_destination {
            return Ok(());
        }
        return Err(InputError::MissingRoute {
            leg,
            token: *expected_destination,
            source_token: *expected_source,
        });
    }

    if route.len() == 1 {
        return Err(InputError::MalformedRoute {
            leg,
            reason: "a route needs at least two tokens".to_string(),
        });
    }
    if expected_source == expected_destination {
        return Err(InputError::MalformedRoute {
            leg,
            reason: format!("no swap needed for {}, route must be empty", expected_source),
        });
    }
    if route.tokens().contains(&NATIVE_ASSET) {
        return Err(InputError::MalformedRoute {
            leg,
            reason: "routes must use the wrapped native token".to_string(),
        });
    }

    let (source, destination) = match (route.source(), route.destination()) {
        (Some(s), Some(d)) => (*s, *d),
        _ => {
            return Err(InputError::MalformedRoute {
                leg,
                reason: "empty route".to_string(),
            })
        }
    };
    if source != *expected_source {
        return Err(InputError::RouteSourceMismatch {
            leg,
            expected: *expected_source,
            found: source,
        });
    }
    if destination != *expected_destination {
        return Err(InputError::RouteDestinationMismatch {
            leg,
            expected: *expected_destination,
            found: destination,
        });
    }

    for hop in route.tokens().windows(2) {
        if hop[0] == hop[1] {
            return Err(InputError::MalformedRoute {
                leg,
                reason: format!("hop from {} to itself", hop[0]),
            });
        }
        if factory.get_pair(&hop[0], &hop[1]).is_none() {
            return Err(InputError::MalformedRoute {
                leg,
                reason: format!("no pool for hop {} -> {}", hop[0], hop[1]),
            });
        }
    }
    Ok(())
}

/// Executes swap legs from one custody account
pub struct RouteExecutor<'a> {
    ledger: &'a dyn TokenLedger,
    router: &'a dyn Router,
    account: Address,
    per_hop_min_out: Amount,
    deadline: Timestamp,
}

impl<'a> RouteExecutor<'a> {
    pub fn new(
        ledger: &'a dyn TokenLedger,
        router: &'a dyn Router,
        account: Address,
        per_hop_min_out: Amount,
        deadline: Timestamp,
    ) -> Self {
        Self {
            ledger,
            router,
            account,
            per_hop_min_out,
            deadline,
        }
    }

    /// Swap `input_amount` along `route`, delivering to `recipient`.
    ///
    /// The identity route returns the input untouched without calling the
    /// router. The router's approval is reset to zero after the call.
    pub fn swap_along_path(
        &self,
        input_amount: Amount,
        route: &Route,
        recipient: &Address,
    ) -> Result<Amount, ZapError> {
        let (source, destination) = match (route.source(), route.destination()) {
            (Some(s), Some(d)) => (*s, *d),
            _ => return Ok(input_amount),
        };
        if input_amount == 0 {
            return Err(InputError::ZeroAmount.into());
        }

        let spender = self.router.address();
        self.ledger
            .approve(&source, &self.account, &spender, input_amount)?;
        let amounts = self.router.swap_exact_tokens_for_tokens(
            &self.account,
            input_amount,
            self.per_hop_min_out,
            route.tokens(),
            recipient,
            self.deadline,
        )?;
        self.ledger.approve(&source, &self.account, &spender, 0)?;

        let output = amounts.last().copied().unwrap_or(0);
        if output == 0 {
            return Err(ExternalError::Router(format!(
                "swap along {} returned nothing",
                route
            ))
            .into());
        }
        tracing::debug!(
            route = %route,
            input = input_amount,
            output,
            token_out = %destination,
            "leg swapped"
        );
        Ok(output)
    }
}
