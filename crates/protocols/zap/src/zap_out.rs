//! Zap-out: pool shares in, one asset out
//!
//! Burn the shares through the router, swap each constituent along its leg
//! route into the destination, then unwrap if the destination is native.

use warp_core::{
    Address, Amount, CallContext, InputError, Leg, LegRoutes, PoolTokens, RemoveLiquidity,
    Result, ZapError, NATIVE_ASSET,
};

use crate::ordering::resolve_pool;
use crate::route::validate_route;
use crate::state::UnzapRequest;
use crate::zap_in::ZapEngine;

/// A zap-out that passed validation
#[derive(Debug, Clone)]
pub(crate) struct ZapOutPlan {
    pub pool: Address,
    pub tokens: PoolTokens,
    /// Token as named by the caller (may be the native sentinel)
    pub destination_token: Address,
    /// Token the legs end in (wrapped when the destination is native)
    pub leg_destination: Address,
    pub routes: LegRoutes,
}

impl ZapOutPlan {
    pub fn touched(&self) -> Vec<Address> {
        let mut tokens = vec![
            NATIVE_ASSET,
            self.leg_destination,
            self.tokens.token0,
            self.tokens.token1,
            self.pool,
        ];
        tokens.extend(self.routes.token0.tokens().iter().copied());
        tokens.extend(self.routes.token1.tokens().iter().copied());
        tokens
    }
}

impl ZapEngine {
    /// Validate a zap-out without touching any state. The share amount is
    /// checked by the entry point since warp-out only learns it after
    /// unstaking.
    pub(crate) fn plan_zap_out(
        &self,
        ctx: &CallContext,
        pool: &Address,
        destination_token: &Address,
        routes: &LegRoutes,
    ) -> Result<ZapOutPlan> {
        if ctx.attached_value != 0 {
            return Err(InputError::UnexpectedNativeValue {
                attached: ctx.attached_value,
            }
            .into());
        }
        let collab = self.collaborators();
        let tokens = resolve_pool(collab.pools.as_ref(), pool)?;
        let leg_destination = self.leg_token(destination_token);

        let factory = collab.factory.as_ref();
        for leg in [Leg::Token0, Leg::Token1] {
            validate_route(
                leg.as_str(),
                routes.get(leg),
                &tokens.get(leg),
                &leg_destination,
                factory,
            )?;
        }

        Ok(ZapOutPlan {
            pool: *pool,
            tokens,
            destination_token: *destination_token,
            leg_destination,
            routes: routes.clone(),
        })
    }

    /// Redeem `lp_amount` shares of `pool` into `destination_token`.
    ///
    /// `routes.token0` runs from the pool's token0 to the (wrapped)
    /// destination, `routes.token1` likewise; a constituent equal to the
    /// destination takes the empty route. Reverts with
    /// [`ZapError::Slippage`] if less than `minimum_out` arrives.
    pub fn zap_out(
        &self,
        ctx: &CallContext,
        pool: Address,
        destination_token: Address,
        lp_amount: Amount,
        minimum_out: Amount,
        routes: &LegRoutes,
    ) -> Result<Amount> {
        self.section("zap_out")?.run(|| {
            if lp_amount == 0 {
                return Err(InputError::ZeroAmount.into());
            }
            let plan = self.plan_zap_out(ctx, &pool, &destination_token, routes)?;
            let custody = self.custody(plan.touched());

            let account = self.account();
            self.collaborators().ledger.transfer_from(
                &pool,
                &account,
                &ctx.caller,
                &account,
                lp_amount,
            )?;
            let out = self.zap_out_inner(ctx, &plan, lp_amount, minimum_out)?;
            custody.verify()?;
            Ok(out)
        })
    }

    /// [`ZapEngine::zap_out`] driven by a request value
    pub fn execute_zap_out(&self, ctx: &CallContext, request: &UnzapRequest) -> Result<Amount> {
        self.zap_out(
            ctx,
            request.pool,
            request.destination_token,
            request.lp_amount,
            request.minimum_out,
            &request.routes,
        )
    }

    /// Burn `lp_amount` already in custody and deliver the proceeds. Runs
    /// inside the caller's atomic section.
    pub(crate) fn zap_out_inner(
        &self,
        ctx: &CallContext,
        plan: &ZapOutPlan,
        lp_amount: Amount,
        minimum_out: Amount,
    ) -> Result<Amount> {
        let account = self.account();
        let collab = self.collaborators();
        let ledger = collab.ledger.as_ref();
        let router = collab.router.as_ref();
        let min_out = self.config().per_hop_min_out;

        let spender = router.address();
        ledger.approve(&plan.pool, &account, &spender, lp_amount)?;
        let (amount0, amount1) = router.remove_liquidity(
            &account,
            RemoveLiquidity {
                token_a: plan.tokens.token0,
                token_b: plan.tokens.token1,
                liquidity: lp_amount,
                amount_a_min: min_out,
                amount_b_min: min_out,
                to: account,
                deadline: ctx.deadline,
            },
        )?;
        ledger.approve(&plan.pool, &account, &spender, 0)?;
        tracing::debug!(pool = %plan.pool, lp_amount, amount0, amount1, "liquidity removed");

        let executor = self.executor(ctx.deadline);
        let out0 = executor.swap_along_path(amount0, &plan.routes.token0, &account)?;
        let out1 = executor.swap_along_path(amount1, &plan.routes.token1, &account)?;
        let total = out0.saturating_add(out1);

        if total < minimum_out {
            return Err(ZapError::slippage(total, minimum_out));
        }
        self.deliver(&ctx.caller, &plan.destination_token, total)?;

        tracing::info!(
            caller = %ctx.caller,
            pool = %plan.pool,
            destination = %plan.destination_token,
            lp_amount,
            out = total,
            "zap out"
        );
        Ok(total)
    }
}
