//! Warp: zap plus staking-vault deposit, and the reverse
//!
//! A pool vault takes LP shares: warp-in zaps into the vault's staked pool
//! and stakes the result; warp-out unstakes and zaps out. A single-asset
//! vault takes a plain token: one route in or out, no liquidity step.

use std::fmt;
use std::sync::Arc;

use warp_core::{
    Address, Amount, CallContext, InputError, LegRoutes, Result, Route, StakingVault, ZapError,
};

use crate::ordering::is_pool;
use crate::route::validate_route;
use crate::state::WarpRequest;
use crate::zap_in::{Emit, ZapEngine};

const STAKING_LEG: &str = "staking";

/// Composes a [`ZapEngine`] with one staking vault. Shares the engine's
/// reentrancy guard.
#[derive(Clone)]
pub struct WarpWrapper {
    engine: ZapEngine,
    vault: Arc<dyn StakingVault>,
}

impl fmt::Debug for WarpWrapper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WarpWrapper")
            .field("engine", &self.engine.account())
            .field("vault", &self.vault.address())
            .finish()
    }
}

impl WarpWrapper {
    pub fn new(engine: ZapEngine, vault: Arc<dyn StakingVault>) -> Self {
        Self { engine, vault }
    }

    pub fn engine(&self) -> &ZapEngine {
        &self.engine
    }

    pub fn vault(&self) -> &dyn StakingVault {
        self.vault.as_ref()
    }

    /// The vault's staked token, which must be a pool
    fn staked_pool(&self) -> Result<Address> {
        let staked = self.vault.staked_token();
        if !is_pool(self.engine.collaborators().pools.as_ref(), &staked) {
            return Err(InputError::VaultNotPool { staked }.into());
        }
        Ok(staked)
    }

    /// The vault's staked token, which must not be a pool
    fn staked_single(&self) -> Result<Address> {
        let staked = self.vault.staked_token();
        if is_pool(self.engine.collaborators().pools.as_ref(), &staked) {
            return Err(InputError::VaultIsPool { staked }.into());
        }
        Ok(staked)
    }

    fn custody_tokens(&self, mut tokens: Vec<Address>) -> Vec<Address> {
        tokens.push(self.vault.staked_token());
        tokens.push(self.vault.share_token());
        tokens
    }

    /// Stake `amount` of `staked` from custody, crediting `recipient`
    fn stake_for(
        &self,
        recipient: &Address,
        staked: &Address,
        amount: Amount,
        minimum_shares: Amount,
    ) -> Result<Amount> {
        let ledger = self.engine.collaborators().ledger.as_ref();
        let account = self.engine.account();
        let vault_account = self.vault.address();

        ledger.approve(staked, &account, &vault_account, amount)?;
        let shares = self.vault.stake(&account, amount, recipient)?;
        ledger.approve(staked, &account, &vault_account, 0)?;

        if shares < minimum_shares {
            return Err(ZapError::slippage(shares, minimum_shares));
        }
        Ok(shares)
    }

    /// Pull `share_amount` vault shares from the caller and unstake them
    /// into custody
    fn unstake_from(&self, ctx: &CallContext, share_amount: Amount) -> Result<Amount> {
        let account = self.engine.account();
        self.engine.collaborators().ledger.transfer_from(
            &self.vault.share_token(),
            &account,
            &ctx.caller,
            &account,
            share_amount,
        )?;
        Ok(self.vault.unstake(&account, share_amount, &account)?)
    }

    /// Zap `amount` of `source_token` into the vault's pool and stake the
    /// LP for the caller. Returns the vault shares minted.
    pub fn warp_in(
        &self,
        ctx: &CallContext,
        source_token: Address,
        amount: Amount,
        minimum_shares: Amount,
        routes: &LegRoutes,
    ) -> Result<Amount> {
        self.engine.section("warp_in")?.run(|| {
            let pool = self.staked_pool()?;
            let plan = self
                .engine
                .plan_zap_in(ctx, &source_token, &pool, amount, routes)?;
            let custody = self.engine.custody(self.custody_tokens(plan.touched()));

            let lp = self.engine.zap_in_inner(ctx, &plan, 0, Emit::Custody)?;
            let shares = self.stake_for(&ctx.caller, &pool, lp, minimum_shares)?;
            custody.verify()?;

            tracing::info!(
                caller = %ctx.caller,
                vault = %self.vault.address(),
                lp,
                shares,
                "warp in"
            );
            Ok(shares)
        })
    }

    /// Unstake `share_amount` vault shares and zap the LP out into
    /// `destination_token`
    pub fn warp_out(
        &self,
        ctx: &CallContext,
        share_amount: Amount,
        destination_token: Address,
        minimum_out: Amount,
        routes: &LegRoutes,
    ) -> Result<Amount> {
        self.engine.section("warp_out")?.run(|| {
            if share_amount == 0 {
                return Err(InputError::ZeroAmount.into());
            }
            let pool = self.staked_pool()?;
            let plan = self
                .engine
                .plan_zap_out(ctx, &pool, &destination_token, routes)?;
            let custody = self.engine.custody(self.custody_tokens(plan.touched()));

            let lp = self.unstake_from(ctx, share_amount)?;
            let out = self.engine.zap_out_inner(ctx, &plan, lp, minimum_out)?;
            custody.verify()?;

            tracing::info!(
                caller = %ctx.caller,
                vault = %self.vault.address(),
                shares = share_amount,
                lp,
                out,
                "warp out"
            );
            Ok(out)
        })
    }

    /// Swap `amount` of `source_token` along `route` into a single-asset
    /// vault's token and stake it for the caller
    pub fn warp_in_single(
        &self,
        ctx: &CallContext,
        source_token: Address,
        amount: Amount,
        minimum_shares: Amount,
        route: &Route,
    ) -> Result<Amount> {
        self.engine.section("warp_in_single")?.run(|| {
            let staked = self.staked_single()?;
            self.engine.check_input(ctx, &source_token, amount)?;
            let leg_source = self.engine.leg_token(&source_token);
            validate_route(
                STAKING_LEG,
                route,
                &leg_source,
                &staked,
                self.engine.collaborators().factory.as_ref(),
            )?;
            let mut touched = vec![leg_source];
            touched.extend(route.tokens().iter().copied());
            let custody = self.engine.custody(self.custody_tokens(touched));

            self.engine.accept_input(ctx, &source_token, amount)?;
            let account = self.engine.account();
            let staked_amount = self
                .engine
                .executor(ctx.deadline)
                .swap_along_path(amount, route, &account)?;
            let shares = self.stake_for(&ctx.caller, &staked, staked_amount, minimum_shares)?;
            custody.verify()?;

            tracing::info!(
                caller = %ctx.caller,
                vault = %self.vault.address(),
                staked = staked_amount,
                shares,
                "warp in (single asset)"
            );
            Ok(shares)
        })
    }

    /// Unstake `share_amount` from a single-asset vault and swap the
    /// underlying along `route` into `destination_token`
    pub fn warp_out_single(
        &self,
        ctx: &CallContext,
        share_amount: Amount,
        destination_token: Address,
        minimum_out: Amount,
        route: &Route,
    ) -> Result<Amount> {
        self.engine.section("warp_out_single")?.run(|| {
            if share_amount == 0 {
                return Err(InputError::ZeroAmount.into());
            }
            if ctx.attached_value != 0 {
                return Err(InputError::UnexpectedNativeValue {
                    attached: ctx.attached_value,
                }
                .into());
            }
            let staked = self.staked_single()?;
            let leg_destination = self.engine.leg_token(&destination_token);
            validate_route(
                STAKING_LEG,
                route,
                &staked,
                &leg_destination,
                self.engine.collaborators().factory.as_ref(),
            )?;
            let mut touched = vec![leg_destination];
            touched.extend(route.tokens().iter().copied());
            let custody = self.engine.custody(self.custody_tokens(touched));

            let underlying = self.unstake_from(ctx, share_amount)?;
            let account = self.engine.account();
            let out = self
                .engine
                .executor(ctx.deadline)
                .swap_along_path(underlying, route, &account)?;
            if out < minimum_out {
                return Err(ZapError::slippage(out, minimum_out));
            }
            self.engine.deliver(&ctx.caller, &destination_token, out)?;
            custody.verify()?;

            tracing::info!(
                caller = %ctx.caller,
                vault = %self.vault.address(),
                shares = share_amount,
                out,
                "warp out (single asset)"
            );
            Ok(out)
        })
    }

    /// Dispatch a [`WarpRequest`]
    pub fn execute(&self, ctx: &CallContext, request: &WarpRequest) -> Result<Amount> {
        match request {
            WarpRequest::In {
                source_token,
                amount,
                minimum_shares,
                routes,
            } => self.warp_in(ctx, *source_token, *amount, *minimum_shares, routes),
            WarpRequest::Out {
                share_amount,
                destination_token,
                minimum_out,
                routes,
            } => self.warp_out(ctx, *share_amount, *destination_token, *minimum_out, routes),
            WarpRequest::InSingle {
                source_token,
                amount,
                minimum_shares,
                route,
            } => self.warp_in_single(ctx, *source_token, *amount, *minimum_shares, route),
            WarpRequest::OutSingle {
                share_amount,
                destination_token,
                minimum_out,
                route,
            } => self.warp_out_single(ctx, *share_amount, *destination_token, *minimum_out, route),
        }
    }
}
