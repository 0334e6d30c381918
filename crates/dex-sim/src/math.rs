//! Constant-product math
//!
//! Integer formulas of a Uniswap-V2 style pair. Uses BigUint for the
//! intermediate products so u128 reserves never overflow.

use num_bigint::BigUint;
use num_traits::{ToPrimitive, Zero};

use warp_core::Amount;

/// Basis-point denominator for swap fees
pub const FEE_DENOMINATOR: u32 = 10_000;

/// floor(a * b / c), `None` when `c == 0` or the result exceeds u128
pub fn mul_div(a: Amount, b: Amount, c: Amount) -> Option<Amount> {
    if c == 0 {
        return None;
    }
    let result = BigUint::from(a) * BigUint::from(b) / BigUint::from(c);
    result.to_u128()
}

/// Swap output for a single hop with the fee taken on input
///
/// Formula: out = (in * (D - fee) * reserve_out) / (reserve_in * D + in * (D - fee))
pub fn get_amount_out(
    amount_in: Amount,
    reserve_in: Amount,
    reserve_out: Amount,
    fee_bps: u32,
) -> Amount {
    if amount_in == 0 || reserve_in == 0 || reserve_out == 0 || fee_bps >= FEE_DENOMINATOR {
        return 0;
    }
    let fee_factor = BigUint::from(FEE_DENOMINATOR - fee_bps);
    let amount_in_with_fee = BigUint::from(amount_in) * &fee_factor;
    let numerator = &amount_in_with_fee * BigUint::from(reserve_out);
    let denominator = BigUint::from(reserve_in) * BigUint::from(FEE_DENOMINATOR) + amount_in_with_fee;
    if denominator.is_zero() {
        return 0;
    }
    (numerator / denominator).to_u128().unwrap_or(0)
}

/// Amount of B matching `amount_a` at the current ratio (truncated)
pub fn quote(amount_a: Amount, reserve_a: Amount, reserve_b: Amount) -> Option<Amount> {
    if amount_a == 0 || reserve_a == 0 || reserve_b == 0 {
        return None;
    }
    mul_div(amount_a, reserve_b, reserve_a)
}

/// LP minted for a deposit into a live pool: min of the two proportional
/// valuations
pub fn liquidity_minted(
    amount0: Amount,
    amount1: Amount,
    reserve0: Amount,
    reserve1: Amount,
    total_supply: Amount,
) -> Amount {
    let value0 = mul_div(amount0, total_supply, reserve0).unwrap_or(0);
    let value1 = mul_div(amount1, total_supply, reserve1).unwrap_or(0);
    value0.min(value1)
}

/// Initial LP for an empty pool: geometric mean of the deposit
pub fn initial_liquidity(amount0: Amount, amount1: Amount) -> Amount {
    if amount0 == 0 || amount1 == 0 {
        return 0;
    }
    let product = BigUint::from(amount0) * BigUint::from(amount1);
    product.sqrt().to_u128().unwrap_or(Amount::MAX)
}

/// Proportional share of both reserves for `liquidity` burned
pub fn redeem_shares(
    liquidity: Amount,
    reserve0: Amount,
    reserve1: Amount,
    total_supply: Amount,
) -> (Amount, Amount) {
    if total_supply == 0 {
        return (0, 0);
    }
    (
        mul_div(liquidity, reserve0, total_supply).unwrap_or(0),
        mul_div(liquidity, reserve1, total_supply).unwrap_or(0),
    )
}
