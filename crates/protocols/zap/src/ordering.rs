//! Token Order Resolver
//!
//! Pools index their reserves by the byte-wise order of their two
//! constituents. Everything that assigns a caller route to "the token0 leg"
//! or "the token1 leg" goes through here.

use warp_core::{Address, ExternalError, InputError, PoolReader, PoolTokens, ZapError};

/// Sort two distinct tokens into canonical (ascending) order
pub fn sort_tokens(token_a: Address, token_b: Address) -> Result<PoolTokens, InputError> {
    if token_a == token_b {
        return Err(InputError::IdenticalTokens(token_a));
    }
    let (token0, token1) = if token_a < token_b {
        (token_a, token_b)
    } else {
        (token_b, token_a)
    };
    Ok(PoolTokens { token0, token1 })
}

/// Read a pool's constituents and check the pool reports them canonically.
///
/// A pool the reader does not know, or whose constituents are identical, is
/// an input error (the caller named it); a pool reporting an unsorted pair
/// is an external failure.
pub fn resolve_pool(pools: &dyn PoolReader, pool: &Address) -> Result<PoolTokens, ZapError> {
    let token0 = pools
        .token0(pool)
        .map_err(|_| InputError::UnknownPool(*pool))?;
    let token1 = pools
        .token1(pool)
        .map_err(|_| InputError::UnknownPool(*pool))?;

    let sorted =
        sort_tokens(token0, token1).map_err(|_| InputError::DegenerateLegs { pool: *pool })?;
    if sorted.token0 != token0 {
        return Err(ExternalError::Pool {
            pool: *pool,
            reason: format!("constituents not in canonical order: {} / {}", token0, token1),
        }
        .into());
    }
    Ok(sorted)
}

/// Whether `token` is a pool the reader knows about
pub fn is_pool(pools: &dyn PoolReader, token: &Address) -> bool {
    pools.token0(token).is_ok()
}
