//! Router, factory, pool view and native wrapper over the simulated chain

use warp_core::{
    AddLiquidity, Address, Amount, ExternalError, ExternalResult, Factory, LiquidityAdded,
    NativeWrapper, PoolReader, RemoveLiquidity, Router, Timestamp, NATIVE_ASSET,
};

use crate::chain::{Inner, SimChain, SimFault, ROUTER_ADDRESS, WRAPPED_NATIVE};
use crate::math;
use crate::state::ChainState;

fn check_deadline(state: &ChainState, deadline: Timestamp) -> ExternalResult<()> {
    if state.now > deadline {
        return Err(ExternalError::DeadlineExpired {
            deadline,
            now: state.now,
        });
    }
    Ok(())
}

/// Per-hop outputs along `path`, starting with `amount_in`
fn amounts_out(
    state: &ChainState,
    fee_bps: u32,
    amount_in: Amount,
    path: &[Address],
) -> ExternalResult<Vec<Amount>> {
    if path.len() < 2 {
        return Err(ExternalError::Router(format!(
            "invalid path length {}",
            path.len()
        )));
    }
    let mut amounts = Vec::with_capacity(path.len());
    amounts.push(amount_in);
    for hop in path.windows(2) {
        let (token_in, token_out) = (&hop[0], &hop[1]);
        let pool_address = state
            .pair(token_in, token_out)
            .ok_or(ExternalError::PairNotFound {
                token_a: *token_in,
                token_b: *token_out,
            })?;
        let pool = state.pool(&pool_address)?;
        let (reserve_in, reserve_out) =
            pool.reserves_for(token_in)
                .ok_or_else(|| ExternalError::Pool {
                    pool: pool_address,
                    reason: format!("{} is not a constituent", token_in),
                })?;
        let previous = amounts.last().copied().unwrap_or(0);
        let out = math::get_amount_out(previous, reserve_in, reserve_out, fee_bps);
        if out == 0 {
            return Err(ExternalError::InsufficientLiquidity {
                token_in: *token_in,
                token_out: *token_out,
            });
        }
        amounts.push(out);
    }
    Ok(amounts)
}

impl SimChain {
    fn swap_locked(
        inner: &mut Inner,
        sender: &Address,
        amount_in: Amount,
        amount_out_min: Amount,
        path: &[Address],
        to: &Address,
        deadline: Timestamp,
    ) -> ExternalResult<Vec<Amount>> {
        check_deadline(&inner.state, deadline)?;
        let amounts = amounts_out(&inner.state, inner.fee_bps, amount_in, path)?;
        let final_out = amounts.last().copied().unwrap_or(0);
        if final_out < amount_out_min {
            return Err(ExternalError::Router(format!(
                "insufficient output amount: {} < {}",
                final_out, amount_out_min
            )));
        }

        let state = &mut inner.state;
        let first_pool = state
            .pair(&path[0], &path[1])
            .ok_or(ExternalError::PairNotFound {
                token_a: path[0],
                token_b: path[1],
            })?;
        state.transfer_from(&path[0], &ROUTER_ADDRESS, sender, &first_pool, amount_in)?;

        for (i, hop) in path.windows(2).enumerate() {
            let (token_in, token_out) = (hop[0], hop[1]);
            let pool_address = state.pair(&token_in, &token_out).ok_or(
                ExternalError::PairNotFound {
                    token_a: token_in,
                    token_b: token_out,
                },
            )?;
            let (paid_in, paid_out) = (amounts[i], amounts[i + 1]);
            let recipient = match path.get(i + 2) {
                Some(next) => state
                    .pair(&token_out, next)
                    .ok_or(ExternalError::PairNotFound {
                        token_a: token_out,
                        token_b: *next,
                    })?,
                None => *to,
            };
            let pool = state.pool_mut(&pool_address)?;
            if token_in == pool.token0 {
                pool.reserve0 += paid_in;
                pool.reserve1 -= paid_out;
            } else {
                pool.reserve1 += paid_in;
                pool.reserve0 -= paid_out;
            }
            state.transfer(&token_out, &pool_address, &recipient, paid_out)?;
        }
        Ok(amounts)
    }
}

impl Router for SimChain {
    fn address(&self) -> Address {
        ROUTER_ADDRESS
    }

    fn swap_exact_tokens_for_tokens(
        &self,
        sender: &Address,
        amount_in: Amount,
        amount_out_min: Amount,
        path: &[Address],
        to: &Address,
        deadline: Timestamp,
    ) -> ExternalResult<Vec<Amount>> {
        let hook = self.lock().swap_hook.clone();
        if let Some(hook) = hook {
            hook();
        }

        let mut inner = self.lock();
        inner.counters.swaps += 1;
        if SimChain::take_fault(&mut inner, SimFault::Swap) {
            return Err(ExternalError::Router("injected swap failure".to_string()));
        }
        SimChain::swap_locked(
            &mut inner,
            sender,
            amount_in,
            amount_out_min,
            path,
            to,
            deadline,
        )
    }

    fn add_liquidity(
        &self,
        sender: &Address,
        params: AddLiquidity,
    ) -> ExternalResult<LiquidityAdded> {
        let mut inner = self.lock();
        inner.counters.add_liquidity += 1;
        if SimChain::take_fault(&mut inner, SimFault::AddLiquidity) {
            return Err(ExternalError::Router(
                "injected add-liquidity failure".to_string(),
            ));
        }
        let state = &mut inner.state;
        check_deadline(state, params.deadline)?;

        let pool_address =
            state
                .pair(&params.token_a, &params.token_b)
                .ok_or(ExternalError::PairNotFound {
                    token_a: params.token_a,
                    token_b: params.token_b,
                })?;
        let pool = state.pool(&pool_address)?.clone();
        let a_is_0 = params.token_a == pool.token0;
        let (reserve_a, reserve_b) = if a_is_0 {
            (pool.reserve0, pool.reserve1)
        } else {
            (pool.reserve1, pool.reserve0)
        };

        // Optimal amounts: keep the pool ratio, use all of one side
        let (amount_a, amount_b) = if reserve_a == 0 && reserve_b == 0 {
            (params.amount_a_desired, params.amount_b_desired)
        } else {
            let b_optimal = math::quote(params.amount_a_desired, reserve_a, reserve_b)
                .ok_or_else(|| ExternalError::Router("insufficient amount".to_string()))?;
            if b_optimal <= params.amount_b_desired {
                if b_optimal < params.amount_b_min {
                    return Err(ExternalError::Router(
                        "insufficient B amount".to_string(),
                    ));
                }
                (params.amount_a_desired, b_optimal)
            } else {
                let a_optimal = math::quote(params.amount_b_desired, reserve_b, reserve_a)
                    .ok_or_else(|| ExternalError::Router("insufficient amount".to_string()))?;
                if a_optimal > params.amount_a_desired || a_optimal < params.amount_a_min {
                    return Err(ExternalError::Router(
                        "insufficient A amount".to_string(),
                    ));
                }
                (a_optimal, params.amount_b_desired)
            }
        };

        let (amount0, amount1) = if a_is_0 {
            (amount_a, amount_b)
        } else {
            (amount_b, amount_a)
        };
        let liquidity = if pool.total_supply == 0 {
            math::initial_liquidity(amount0, amount1)
        } else {
            math::liquidity_minted(
                amount0,
                amount1,
                pool.reserve0,
                pool.reserve1,
                pool.total_supply,
            )
        };
        if liquidity == 0 {
            return Err(ExternalError::Pool {
                pool: pool_address,
                reason: "insufficient liquidity minted".to_string(),
            });
        }

        state.transfer_from(&params.token_a, &ROUTER_ADDRESS, sender, &pool_address, amount_a)?;
        state.transfer_from(&params.token_b, &ROUTER_ADDRESS, sender, &pool_address, amount_b)?;
        state.mint(&pool_address, &params.to, liquidity);
        let pool = state.pool_mut(&pool_address)?;
        pool.reserve0 += amount0;
        pool.reserve1 += amount1;
        pool.total_supply += liquidity;

        Ok(LiquidityAdded {
            amount_a,
            amount_b,
            liquidity,
        })
    }

    fn remove_liquidity(
        &self,
        sender: &Address,
        params: RemoveLiquidity,
    ) -> ExternalResult<(Amount, Amount)> {
        let mut inner = self.lock();
        inner.counters.remove_liquidity += 1;
        if SimChain::take_fault(&mut inner, SimFault::RemoveLiquidity) {
            return Err(ExternalError::Router(
                "injected remove-liquidity failure".to_string(),
            ));
        }
        let state = &mut inner.state;
        check_deadline(state, params.deadline)?;

        let pool_address =
            state
                .pair(&params.token_a, &params.token_b)
                .ok_or(ExternalError::PairNotFound {
                    token_a: params.token_a,
                    token_b: params.token_b,
                })?;
        let pool = state.pool(&pool_address)?.clone();
        let (amount0, amount1) = math::redeem_shares(
            params.liquidity,
            pool.reserve0,
            pool.reserve1,
            pool.total_supply,
        );
        if amount0 == 0 || amount1 == 0 {
            return Err(ExternalError::Pool {
                pool: pool_address,
                reason: "insufficient liquidity burned".to_string(),
            });
        }
        let (amount_a, amount_b) = if params.token_a == pool.token0 {
            (amount0, amount1)
        } else {
            (amount1, amount0)
        };
        if amount_a < params.amount_a_min || amount_b < params.amount_b_min {
            return Err(ExternalError::Router(
                "insufficient amounts on removal".to_string(),
            ));
        }

        state.transfer_from(&pool_address, &ROUTER_ADDRESS, sender, &pool_address, params.liquidity)?;
        state.burn(&pool_address, &pool_address, params.liquidity)?;
        state.transfer(&pool.token0, &pool_address, &params.to, amount0)?;
        state.transfer(&pool.token1, &pool_address, &params.to, amount1)?;
        let pool = state.pool_mut(&pool_address)?;
        pool.reserve0 -= amount0;
        pool.reserve1 -= amount1;
        pool.total_supply -= params.liquidity;

        Ok((amount_a, amount_b))
    }

    fn get_amounts_out(&self, amount_in: Amount, path: &[Address]) -> ExternalResult<Vec<Amount>> {
        let inner = self.lock();
        amounts_out(&inner.state, inner.fee_bps, amount_in, path)
    }
}

impl Factory for SimChain {
    fn get_pair(&self, token_a: &Address, token_b: &Address) -> Option<Address> {
        self.lock().state.pair(token_a, token_b)
    }
}

impl PoolReader for SimChain {
    fn token0(&self, pool: &Address) -> ExternalResult<Address> {
        Ok(self.lock().state.pool(pool)?.token0)
    }

    fn token1(&self, pool: &Address) -> ExternalResult<Address> {
        Ok(self.lock().state.pool(pool)?.token1)
    }

    fn get_reserves(&self, pool: &Address) -> ExternalResult<(Amount, Amount)> {
        let inner = self.lock();
        let pool = inner.state.pool(pool)?;
        Ok((pool.reserve0, pool.reserve1))
    }

    fn total_supply(&self, pool: &Address) -> ExternalResult<Amount> {
        Ok(self.lock().state.pool(pool)?.total_supply)
    }
}

impl NativeWrapper for SimChain {
    fn wrapped_token(&self) -> Address {
        WRAPPED_NATIVE
    }

    fn wrap(&self, account: &Address, amount: Amount) -> ExternalResult<()> {
        let mut inner = self.lock();
        inner.counters.wraps += 1;
        if SimChain::take_fault(&mut inner, SimFault::Wrap) {
            return Err(ExternalError::Wrapper("injected wrap failure".to_string()));
        }
        inner
            .state
            .transfer(&NATIVE_ASSET, account, &WRAPPED_NATIVE, amount)?;
        inner.state.mint(&WRAPPED_NATIVE, account, amount);
        Ok(())
    }

    fn unwrap(&self, account: &Address, amount: Amount) -> ExternalResult<()> {
        let mut inner = self.lock();
        inner.counters.unwraps += 1;
        if SimChain::take_fault(&mut inner, SimFault::Unwrap) {
            return Err(ExternalError::Wrapper(
                "injected unwrap failure".to_string(),
            ));
        }
        inner.state.burn(&WRAPPED_NATIVE, account, amount)?;
        inner
            .state
            .transfer(&NATIVE_ASSET, &WRAPPED_NATIVE, account, amount)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use warp_core::TokenLedger;

    const DEADLINE: Timestamp = u64::MAX;

    fn setup() -> (SimChain, Address, Address, Address, Address) {
        let chain = SimChain::with_fee(0);
        let lp = chain.new_address();
        let a = chain.new_token();
        let b = chain.new_token();
        let pool = chain.create_pool(a, b, 1_000_000, 1_000_000, &lp);
        (chain, a, b, pool, lp)
    }

    #[test]
    fn test_swap_moves_reserves() {
        let (chain, a, b, pool, _) = setup();
        let trader = chain.new_address();
        chain.mint(&a, &trader, 1000);
        chain.approve(&a, &trader, &ROUTER_ADDRESS, 1000).unwrap();

        let amounts = chain
            .swap_exact_tokens_for_tokens(&trader, 1000, 1, &[a, b], &trader, DEADLINE)
            .unwrap();
        assert_eq!(amounts, vec![1000, 999]);
        assert_eq!(chain.balance_of(&b, &trader), 999);
        assert_eq!(chain.balance_of(&a, &trader), 0);

        let state = chain.pool(&pool).unwrap();
        assert_eq!(state.reserve0 + state.reserve1, 2_000_001);
        assert_eq!(chain.counters().swaps, 1);
    }

    #[test]
    fn test_swap_requires_allowance() {
        let (chain, a, b, _, _) = setup();
        let trader = chain.new_address();
        chain.mint(&a, &trader, 1000);
        let err = chain
            .swap_exact_tokens_for_tokens(&trader, 1000, 1, &[a, b], &trader, DEADLINE)
            .unwrap_err();
        assert!(matches!(err, ExternalError::InsufficientAllowance { .. }));
    }

    #[test]
    fn test_swap_deadline() {
        let (chain, a, b, _, _) = setup();
        let trader = chain.new_address();
        chain.set_now(100);
        let err = chain
            .swap_exact_tokens_for_tokens(&trader, 1, 1, &[a, b], &trader, 99)
            .unwrap_err();
        assert!(matches!(err, ExternalError::DeadlineExpired { deadline: 99, now: 100 }));
    }

    #[test]
    fn test_multi_hop_amounts() {
        let chain = SimChain::with_fee(0);
        let lp = chain.new_address();
        let a = chain.new_token();
        let b = chain.new_token();
        let c = chain.new_token();
        chain.create_pool(a, b, 1000, 1000, &lp);
        chain.create_pool(b, c, 1000, 1000, &lp);
        let amounts = chain.get_amounts_out(100, &[a, b, c]).unwrap();
        assert_eq!(amounts, vec![100, 90, 82]);
        assert!(matches!(
            chain.get_amounts_out(100, &[a, c]),
            Err(ExternalError::PairNotFound { .. })
        ));
    }

    #[test]
    fn test_add_liquidity_uses_optimal_amounts() {
        let (chain, a, b, pool, _) = setup();
        let provider = chain.new_address();
        chain.mint(&a, &provider, 1000);
        chain.mint(&b, &provider, 3000);
        chain.approve(&a, &provider, &ROUTER_ADDRESS, 1000).unwrap();
        chain.approve(&b, &provider, &ROUTER_ADDRESS, 3000).unwrap();

        let added = chain
            .add_liquidity(
                &provider,
                AddLiquidity {
                    token_a: a,
                    token_b: b,
                    amount_a_desired: 1000,
                    amount_b_desired: 3000,
                    amount_a_min: 1,
                    amount_b_min: 1,
                    to: provider,
                    deadline: DEADLINE,
                },
            )
            .unwrap();
        assert_eq!(added.amount_a, 1000);
        assert_eq!(added.amount_b, 1000);
        assert_eq!(added.liquidity, 1000);
        assert_eq!(chain.balance_of(&b, &provider), 2000);
        assert_eq!(chain.balance_of(&pool, &provider), 1000);
    }

    #[test]
    fn test_remove_liquidity_pays_proportionally() {
        let (chain, a, b, pool, lp) = setup();
        chain.approve(&pool, &lp, &ROUTER_ADDRESS, 500_000).unwrap();
        let (out_a, out_b) = chain
            .remove_liquidity(
                &lp,
                RemoveLiquidity {
                    token_a: b,
                    token_b: a,
                    liquidity: 500_000,
                    amount_a_min: 1,
                    amount_b_min: 1,
                    to: lp,
                    deadline: DEADLINE,
                },
            )
            .unwrap();
        assert_eq!((out_a, out_b), (500_000, 500_000));
        assert_eq!(chain.pool(&pool).unwrap().total_supply, 500_000);
        assert_eq!(chain.balance_of(&a, &lp), 500_000);
    }

    #[test]
    fn test_wrap_and_unwrap() {
        let chain = SimChain::new();
        let user = chain.new_address();
        chain.mint(&NATIVE_ASSET, &user, 10);
        chain.wrap(&user, 10).unwrap();
        assert_eq!(chain.balance_of(&WRAPPED_NATIVE, &user), 10);
        assert_eq!(chain.balance_of(&NATIVE_ASSET, &user), 0);
        chain.unwrap(&user, 4).unwrap();
        assert_eq!(chain.balance_of(&NATIVE_ASSET, &user), 4);
        assert_eq!(chain.balance_of(&WRAPPED_NATIVE, &user), 6);
    }

    #[test]
    fn test_injected_fault_fires_once() {
        let (chain, a, b, _, _) = setup();
        let trader = chain.new_address();
        chain.mint(&a, &trader, 10);
        chain.approve(&a, &trader, &ROUTER_ADDRESS, 10).unwrap();
        chain.fail_next(SimFault::Swap);
        assert!(chain
            .swap_exact_tokens_for_tokens(&trader, 5, 1, &[a, b], &trader, DEADLINE)
            .is_err());
        assert!(chain
            .swap_exact_tokens_for_tokens(&trader, 5, 1, &[a, b], &trader, DEADLINE)
            .is_ok());
    }
}
