//! Liquidity Calculator
//!
//! The minimum-LP formula shared by off-call quoting and on-call
//! enforcement, plus the input split and the proportional redemption math
//! used by exit quotes.

use num_bigint::BigUint;
use num_traits::{ToPrimitive, Zero};

use warp_core::{
    Address, Amount, ExternalError, InputError, Leg, PoolReader, PoolReserves, ZapError,
};

/// floor(a * b / c) in arbitrary precision. `None` when the quotient does
/// not fit in an [`Amount`]; a zero divisor yields zero.
fn mul_div_floor(a: Amount, b: Amount, c: Amount) -> Option<Amount> {
    let denominator = BigUint::from(c);
    if denominator.is_zero() {
        return Some(0);
    }
    (BigUint::from(a) * BigUint::from(b) / denominator).to_u128()
}

/// Split a zap-in input between the legs: `amount / 2` to token0's leg,
/// the remainder to token1's.
///
/// Both legs feed the liquidity step, so a leg left with nothing is
/// rejected whether or not it swaps.
pub fn split_input(amount: Amount) -> Result<(Amount, Amount), InputError> {
    let amount0 = amount / 2;
    let amount1 = amount - amount0;
    for (leg, share) in [(Leg::Token0, amount0), (Leg::Token1, amount1)] {
        if share == 0 {
            return Err(InputError::AmountTooSmall { leg, amount });
        }
    }
    Ok((amount0, amount1))
}

/// LP a deposit of `(amount0, amount1)` mints at the current reserves.
///
/// ideal = min(amount0 * supply / reserve0, amount1 * supply / reserve1)
///
/// This is the pool's own mint rule: shares follow the limiting side.
pub fn ideal_lp(
    reserves: &PoolReserves,
    amount0: Amount,
    amount1: Amount,
) -> Result<Amount, InputError> {
    if reserves.reserve0 == 0 || reserves.reserve1 == 0 {
        return Err(InputError::EmptyPool {
            reserve0: reserves.reserve0,
            reserve1: reserves.reserve1,
        });
    }
    let value0 = mul_div_floor(amount0, reserves.total_supply, reserves.reserve0)
        .ok_or(InputError::AmountOverflow("ideal LP"))?;
    let value1 = mul_div_floor(amount1, reserves.total_supply, reserves.reserve1)
        .ok_or(InputError::AmountOverflow("ideal LP"))?;
    Ok(value0.min(value1))
}

/// Haircut `amount` by `slippage_percent`: floor(amount * (100 - s) / 100)
pub fn apply_slippage(amount: Amount, slippage_percent: u8) -> Result<Amount, InputError> {
    if slippage_percent >= 100 {
        return Err(InputError::SlippageOutOfRange {
            percent: slippage_percent,
        });
    }
    mul_div_floor(amount, Amount::from(100 - slippage_percent), 100)
        .ok_or(InputError::AmountOverflow("slippage haircut"))
}

/// Minimum acceptable LP for a deposit of `(amount0, amount1)`.
///
/// minimum = floor(ideal_lp * (100 - slippage) / 100)
///
/// Slippage is validated before reserves so a bad tolerance is reported
/// even against an empty pool.
pub fn calculate_minimum_lp(
    reserves: &PoolReserves,
    amount0: Amount,
    amount1: Amount,
    slippage_percent: u8,
) -> Result<Amount, InputError> {
    if slippage_percent >= 100 {
        return Err(InputError::SlippageOutOfRange {
            percent: slippage_percent,
        });
    }
    let ideal = ideal_lp(reserves, amount0, amount1)?;
    apply_slippage(ideal, slippage_percent)
}

/// Read reserves and supply of `pool` through the pool view
pub fn read_reserves(pools: &dyn PoolReader, pool: &Address) -> Result<PoolReserves, ExternalError> {
    let (reserve0, reserve1) = pools.get_reserves(pool)?;
    let total_supply = pools.total_supply(pool)?;
    Ok(PoolReserves {
        reserve0,
        reserve1,
        total_supply,
    })
}

/// [`calculate_minimum_lp`] against the live reserves of `pool`
pub fn minimum_lp_for_pool(
    pools: &dyn PoolReader,
    pool: &Address,
    amount0: Amount,
    amount1: Amount,
    slippage_percent: u8,
) -> Result<Amount, ZapError> {
    let reserves = read_reserves(pools, pool)?;
    Ok(calculate_minimum_lp(
        &reserves,
        amount0,
        amount1,
        slippage_percent,
    )?)
}

/// User's share of both reserves when burning `lp_amount`.
///
/// Returns (amount0, amount1).
/// amount0 = lp_amount * reserve0 / supply
/// amount1 = lp_amount * reserve1 / supply
pub fn calculate_redeem_shares(
    reserves: &PoolReserves,
    lp_amount: Amount,
) -> Result<(Amount, Amount), InputError> {
    if reserves.total_supply == 0 {
        return Ok((0, 0));
    }
    let amount0 = mul_div_floor(lp_amount, reserves.reserve0, reserves.total_supply)
        .ok_or(InputError::AmountOverflow("redeemed token0"))?;
    let amount1 = mul_div_floor(lp_amount, reserves.reserve1, reserves.total_supply)
        .ok_or(InputError::AmountOverflow("redeemed token1"))?;
    Ok((amount0, amount1))
}
