//! Off-call quoting
//!
//! Estimates leg amounts with the router's `get_amounts_out` and derives the
//! floor with the same calculator the engine enforces on-call. Nothing here
//! mutates state.

use warp_core::{
    Address, Amount, Collaborators, InputError, LegRoutes, Result, Route, Router,
    SlippageTolerance, NATIVE_ASSET,
};

use crate::calculator::{
    apply_slippage, calculate_minimum_lp, calculate_redeem_shares, ideal_lp, read_reserves,
    split_input,
};
use crate::ordering::resolve_pool;
use crate::route::validate_route;
use crate::state::{ZapInQuote, ZapOutQuote};
use crate::zap_in::ZapEngine;

/// Expected output of swapping `amount` along `route`
fn quote_leg(router: &dyn Router, amount: Amount, route: &Route) -> Result<Amount> {
    if route.is_identity() {
        return Ok(amount);
    }
    if amount == 0 {
        return Ok(0);
    }
    let amounts = router.get_amounts_out(amount, route.tokens())?;
    Ok(amounts.last().copied().unwrap_or(0))
}

fn leg_token(collab: &Collaborators, token: &Address) -> Address {
    if *token == NATIVE_ASSET {
        collab.wrapper.wrapped_token()
    } else {
        *token
    }
}

/// Quote a zap of `amount` of `source_token` into `pool`
pub fn quote_zap_in(
    collab: &Collaborators,
    source_token: &Address,
    pool: &Address,
    amount: Amount,
    routes: &LegRoutes,
    slippage: SlippageTolerance,
) -> Result<ZapInQuote> {
    if amount == 0 {
        return Err(InputError::ZeroAmount.into());
    }
    let (split0, split1) = split_input(amount)?;
    let source = leg_token(collab, source_token);
    let tokens = resolve_pool(collab.pools.as_ref(), pool)?;
    let factory = collab.factory.as_ref();
    validate_route("token0", &routes.token0, &source, &tokens.token0, factory)?;
    validate_route("token1", &routes.token1, &source, &tokens.token1, factory)?;

    let router = collab.router.as_ref();
    let leg0_amount = quote_leg(router, split0, &routes.token0)?;
    let leg1_amount = quote_leg(router, split1, &routes.token1)?;

    let reserves = read_reserves(collab.pools.as_ref(), pool)?;
    let ideal = ideal_lp(&reserves, leg0_amount, leg1_amount)?;
    let minimum_lp =
        calculate_minimum_lp(&reserves, leg0_amount, leg1_amount, slippage.percent())?;

    Ok(ZapInQuote {
        pool: *pool,
        leg0_amount,
        leg1_amount,
        ideal_lp: ideal,
        minimum_lp,
        slippage_percent: slippage.percent(),
    })
}

/// Quote redeeming `lp_amount` of `pool` into `destination_token`
pub fn quote_zap_out(
    collab: &Collaborators,
    pool: &Address,
    destination_token: &Address,
    lp_amount: Amount,
    routes: &LegRoutes,
    slippage: SlippageTolerance,
) -> Result<ZapOutQuote> {
    if lp_amount == 0 {
        return Err(InputError::ZeroAmount.into());
    }
    let destination = leg_token(collab, destination_token);
    let tokens = resolve_pool(collab.pools.as_ref(), pool)?;
    let factory = collab.factory.as_ref();
    validate_route("token0", &routes.token0, &tokens.token0, &destination, factory)?;
    validate_route("token1", &routes.token1, &tokens.token1, &destination, factory)?;

    let reserves = read_reserves(collab.pools.as_ref(), pool)?;
    let (amount0, amount1) = calculate_redeem_shares(&reserves, lp_amount)?;
    let router = collab.router.as_ref();
    let out0 = quote_leg(router, amount0, &routes.token0)?;
    let out1 = quote_leg(router, amount1, &routes.token1)?;
    let expected_out = out0.saturating_add(out1);
    let minimum_out = apply_slippage(expected_out, slippage.percent())?;

    Ok(ZapOutQuote {
        pool: *pool,
        amount0,
        amount1,
        expected_out,
        minimum_out,
        slippage_percent: slippage.percent(),
    })
}

impl ZapEngine {
    /// [`quote_zap_in`] with the configured default tolerance unless one is
    /// given
    pub fn quote_zap_in(
        &self,
        source_token: &Address,
        pool: &Address,
        amount: Amount,
        routes: &LegRoutes,
        slippage: Option<SlippageTolerance>,
    ) -> Result<ZapInQuote> {
        let slippage = slippage.unwrap_or(self.config().default_slippage_percent);
        quote_zap_in(self.collaborators(), source_token, pool, amount, routes, slippage)
    }

    /// [`quote_zap_out`] with the configured default tolerance unless one is
    /// given
    pub fn quote_zap_out(
        &self,
        pool: &Address,
        destination_token: &Address,
        lp_amount: Amount,
        routes: &LegRoutes,
        slippage: Option<SlippageTolerance>,
    ) -> Result<ZapOutQuote> {
        let slippage = slippage.unwrap_or(self.config().default_slippage_percent);
        quote_zap_out(self.collaborators(), pool, destination_token, lp_amount, routes, slippage)
    }
}
