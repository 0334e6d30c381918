//! Zap-in: one asset in, pool shares out
//!
//! # Steps
//!
//! 1. Accept the input into custody (wrapping native value)
//! 2. Split it in half and swap each half along its leg route
//! 3. Add liquidity with both realized leg amounts
//! 4. Check the realized LP against the floor
//! 5. Refund unused leg tokens to the caller
//! 6. Hand the LP to the caller (or keep it for a vault deposit)
//!
//! All validation happens before step 1.

use std::sync::Arc;

use warp_core::{
    AddLiquidity, Address, Amount, CallContext, Collaborators, EngineConfig, InputError, Leg,
    LegRoutes, PoolTokens, Result, Timestamp, ZapError, NATIVE_ASSET,
};

use crate::atomic::{AtomicSection, ReentrancyGuard};
use crate::calculator;
use crate::custody::Custody;
use crate::ordering::resolve_pool;
use crate::route::{validate_route, RouteExecutor};
use crate::state::ZapRequest;

/// Where freshly minted LP goes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Emit {
    Caller,
    Custody,
}

/// A zap-in that passed validation
#[derive(Debug, Clone)]
pub(crate) struct ZapInPlan {
    pub pool: Address,
    pub tokens: PoolTokens,
    /// Token as named by the caller (may be the native sentinel)
    pub source_token: Address,
    /// Token the legs start from (wrapped when the source is native)
    pub leg_source: Address,
    pub amount: Amount,
    /// Share of `amount` entering each leg
    pub split: (Amount, Amount),
    pub routes: LegRoutes,
}

impl ZapInPlan {
    pub fn native_input(&self) -> bool {
        self.source_token == NATIVE_ASSET
    }

    /// Every token the engine account may hold during the call
    pub fn touched(&self) -> Vec<Address> {
        let mut tokens = vec![
            NATIVE_ASSET,
            self.leg_source,
            self.tokens.token0,
            self.tokens.token1,
            self.pool,
        ];
        tokens.extend(self.routes.token0.tokens().iter().copied());
        tokens.extend(self.routes.token1.tokens().iter().copied());
        tokens
    }
}

/// The zap engine. Stateless across calls apart from the reentrancy guard,
/// which clones share.
#[derive(Clone, Debug)]
pub struct ZapEngine {
    config: EngineConfig,
    collab: Collaborators,
    guard: Arc<ReentrancyGuard>,
}

impl ZapEngine {
    pub fn new(config: EngineConfig, collab: Collaborators) -> Result<Self> {
        config.validate()?;
        tracing::info!(
            account = %config.engine_account,
            per_hop_min_out = config.per_hop_min_out,
            max_slippage = ?config.max_slippage_percent,
            "zap engine ready"
        );
        Ok(Self {
            config,
            collab,
            guard: Arc::new(ReentrancyGuard::new()),
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn collaborators(&self) -> &Collaborators {
        &self.collab
    }

    /// Custody account
    pub fn account(&self) -> Address {
        self.config.engine_account
    }

    pub(crate) fn guard(&self) -> &ReentrancyGuard {
        &self.guard
    }

    pub(crate) fn section(&self, operation: &'static str) -> Result<AtomicSection<'_>> {
        AtomicSection::open(&self.guard, self.collab.journal.as_ref(), operation)
    }

    pub(crate) fn executor(&self, deadline: Timestamp) -> RouteExecutor<'_> {
        RouteExecutor::new(
            self.collab.ledger.as_ref(),
            self.collab.router.as_ref(),
            self.account(),
            self.config.per_hop_min_out,
            deadline,
        )
    }

    pub(crate) fn custody(&self, tokens: Vec<Address>) -> Custody<'_> {
        let mut tokens = tokens;
        tokens.push(self.collab.wrapper.wrapped_token());
        Custody::record(self.collab.ledger.as_ref(), self.account(), tokens)
    }

    /// Map the caller's token to the token routes are expressed in
    pub(crate) fn leg_token(&self, token: &Address) -> Address {
        if *token == NATIVE_ASSET {
            self.collab.wrapper.wrapped_token()
        } else {
            *token
        }
    }

    /// Check amount and attached native value for an input of `amount` of
    /// `source_token`
    pub(crate) fn check_input(
        &self,
        ctx: &CallContext,
        source_token: &Address,
        amount: Amount,
    ) -> Result<()> {
        if amount == 0 {
            return Err(InputError::ZeroAmount.into());
        }
        if *source_token == NATIVE_ASSET {
            if ctx.attached_value != amount {
                return Err(InputError::NativeValueMismatch {
                    expected: amount,
                    attached: ctx.attached_value,
                }
                .into());
            }
        } else if ctx.attached_value != 0 {
            return Err(InputError::UnexpectedNativeValue {
                attached: ctx.attached_value,
            }
            .into());
        }
        Ok(())
    }

    /// Pull `amount` of `source_token` from the caller into custody.
    /// Native value is wrapped on arrival.
    pub(crate) fn accept_input(
        &self,
        ctx: &CallContext,
        source_token: &Address,
        amount: Amount,
    ) -> Result<()> {
        let ledger = self.collab.ledger.as_ref();
        let account = self.account();
        if *source_token == NATIVE_ASSET {
            ledger.transfer(&NATIVE_ASSET, &ctx.caller, &account, amount)?;
            self.collab.wrapper.wrap(&account, amount)?;
        } else {
            ledger.transfer_from(source_token, &account, &ctx.caller, &account, amount)?;
        }
        Ok(())
    }

    /// Send `amount` of `token` from custody to `recipient`. Wrapped native
    /// is unwrapped first when `token` is the native sentinel.
    pub(crate) fn deliver(&self, recipient: &Address, token: &Address, amount: Amount) -> Result<()> {
        if amount == 0 {
            return Ok(());
        }
        let account = self.account();
        if *token == NATIVE_ASSET {
            self.collab.wrapper.unwrap(&account, amount)?;
        }
        self.collab
            .ledger
            .transfer(token, &account, recipient, amount)?;
        Ok(())
    }

    /// Validate a zap-in without touching any state
    pub(crate) fn plan_zap_in(
        &self,
        ctx: &CallContext,
        source_token: &Address,
        pool: &Address,
        amount: Amount,
        routes: &LegRoutes,
    ) -> Result<ZapInPlan> {
        self.check_input(ctx, source_token, amount)?;
        let split = calculator::split_input(amount)?;
        let leg_source = self.leg_token(source_token);
        let tokens = resolve_pool(self.collab.pools.as_ref(), pool)?;

        let factory = self.collab.factory.as_ref();
        for leg in [Leg::Token0, Leg::Token1] {
            validate_route(
                leg.as_str(),
                routes.get(leg),
                &leg_source,
                &tokens.get(leg),
                factory,
            )?;
        }

        Ok(ZapInPlan {
            pool: *pool,
            tokens,
            source_token: *source_token,
            leg_source,
            amount,
            split,
            routes: routes.clone(),
        })
    }

    /// Convert `amount` of `source_token` into shares of `pool`.
    ///
    /// `routes.token0` must run from the (wrapped) source to the pool's
    /// token0, `routes.token1` to its token1; a leg whose constituent is the
    /// source takes the empty route. Reverts with [`ZapError::Slippage`] if
    /// fewer than `minimum_lp` shares are minted.
    pub fn zap_in(
        &self,
        ctx: &CallContext,
        source_token: Address,
        pool: Address,
        amount: Amount,
        minimum_lp: Amount,
        routes: &LegRoutes,
    ) -> Result<Amount> {
        self.section("zap_in")?.run(|| {
            let plan = self.plan_zap_in(ctx, &source_token, &pool, amount, routes)?;
            let custody = self.custody(plan.touched());
            let lp = self.zap_in_inner(ctx, &plan, minimum_lp, Emit::Caller)?;
            custody.verify()?;
            Ok(lp)
        })
    }

    /// [`ZapEngine::zap_in`] driven by a request value
    pub fn execute_zap_in(&self, ctx: &CallContext, request: &ZapRequest) -> Result<Amount> {
        self.zap_in(
            ctx,
            request.source_token,
            request.pool,
            request.amount,
            request.minimum_lp,
            &request.routes,
        )
    }

    /// Steps 1-6 for a validated plan. Runs inside the caller's atomic
    /// section.
    pub(crate) fn zap_in_inner(
        &self,
        ctx: &CallContext,
        plan: &ZapInPlan,
        minimum_lp: Amount,
        emit: Emit,
    ) -> Result<Amount> {
        let account = self.account();
        let ledger = self.collab.ledger.as_ref();
        let router = self.collab.router.as_ref();
        let PoolTokens { token0, token1 } = plan.tokens;

        self.accept_input(ctx, &plan.source_token, plan.amount)?;

        let (split0, split1) = plan.split;
        let executor = self.executor(ctx.deadline);
        let amount0 = executor.swap_along_path(split0, &plan.routes.token0, &account)?;
        let amount1 = executor.swap_along_path(split1, &plan.routes.token1, &account)?;
        tracing::debug!(pool = %plan.pool, amount0, amount1, "legs resolved");

        let floor = match self.config.max_slippage_percent {
            Some(tolerance) => {
                let live = calculator::minimum_lp_for_pool(
                    self.collab.pools.as_ref(),
                    &plan.pool,
                    amount0,
                    amount1,
                    tolerance.percent(),
                )?;
                minimum_lp.max(live)
            }
            None => minimum_lp,
        };

        let spender = router.address();
        ledger.approve(&token0, &account, &spender, amount0)?;
        ledger.approve(&token1, &account, &spender, amount1)?;
        let added = router.add_liquidity(
            &account,
            AddLiquidity {
                token_a: token0,
                token_b: token1,
                amount_a_desired: amount0,
                amount_b_desired: amount1,
                amount_a_min: self.config.per_hop_min_out,
                amount_b_min: self.config.per_hop_min_out,
                to: account,
                deadline: ctx.deadline,
            },
        )?;
        ledger.approve(&token0, &account, &spender, 0)?;
        ledger.approve(&token1, &account, &spender, 0)?;

        if added.liquidity < floor {
            return Err(ZapError::slippage(added.liquidity, floor));
        }

        let dust0 = amount0.saturating_sub(added.amount_a);
        let dust1 = amount1.saturating_sub(added.amount_b);
        self.refund_dust(ctx, plan, token0, dust0)?;
        self.refund_dust(ctx, plan, token1, dust1)?;

        if emit == Emit::Caller {
            ledger.transfer(&plan.pool, &account, &ctx.caller, added.liquidity)?;
        }

        tracing::info!(
            caller = %ctx.caller,
            pool = %plan.pool,
            source = %plan.source_token,
            amount = plan.amount,
            lp = added.liquidity,
            floor,
            dust0,
            dust1,
            "zap in"
        );
        Ok(added.liquidity)
    }

    /// Return an unused leg balance. Wrapped-native dust goes back as native
    /// only when the caller paid in native.
    fn refund_dust(
        &self,
        ctx: &CallContext,
        plan: &ZapInPlan,
        token: Address,
        dust: Amount,
    ) -> Result<()> {
        let as_token = if plan.native_input() && token == plan.leg_source {
            NATIVE_ASSET
        } else {
            token
        };
        self.deliver(&ctx.caller, &as_token, dust)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use dex_sim::{SimChain, SimFault, WRAPPED_NATIVE};
    use warp_core::{ExternalError, Route, SlippageTolerance, TokenLedger};

    const DEADLINE: Timestamp = u64::MAX;
    const E18: Amount = 1_000_000_000_000_000_000;

    struct Market {
        chain: SimChain,
        engine: ZapEngine,
        user: Address,
        a: Address,
        b: Address,
        pool_ab: Address,
    }

    fn market(fee_bps: u32) -> Market {
        let chain = SimChain::with_fee(fee_bps);
        let provider = chain.new_address();
        let a = chain.new_token();
        let b = chain.new_token();
        let pool_ab = chain.create_pool(a, b, 1_000_000, 1_000_000, &provider);
        let engine = ZapEngine::new(EngineConfig::default(), chain.collaborators()).unwrap();
        let user = chain.new_address();
        chain.mint(&a, &user, 100_000);
        chain.approve(&a, &user, &engine.account(), 100_000).unwrap();
        Market {
            chain,
            engine,
            user,
            a,
            b,
            pool_ab,
        }
    }

    fn a_routes(m: &Market) -> LegRoutes {
        // a < b, so a is token0
        LegRoutes::new(Route::identity(), Route::new(vec![m.a, m.b]))
    }

    /// Token `c` outside the a/b pool, with c/a and c/b pools to route
    /// through. `c` is cheap against a and at par with b.
    fn outside_source(m: &Market) -> (Address, LegRoutes) {
        let provider = m.chain.new_address();
        let c = m.chain.new_token();
        m.chain.create_pool(m.a, c, 1_000_000, 2_000_000, &provider);
        m.chain.create_pool(m.b, c, 1_000_000, 1_000_000, &provider);
        m.chain.mint(&c, &m.user, 50_000);
        m.chain.approve(&c, &m.user, &m.engine.account(), 50_000).unwrap();
        (
            c,
            LegRoutes::new(Route::new(vec![c, m.a]), Route::new(vec![c, m.b])),
        )
    }

    #[test]
    fn test_zap_in_token_constituent() {
        crate::init_test_tracing();
        let m = market(0);
        let ctx = CallContext::new(m.user, DEADLINE);
        let lp = m
            .engine
            .zap_in(&ctx, m.a, m.pool_ab, 10_000, 4_900, &a_routes(&m))
            .unwrap();

        // 5000 a stays, 5000 a -> 4975 b; router takes (5000, 4950)
        assert_eq!(lp, 4_974);
        assert_eq!(m.chain.balance_of(&m.pool_ab, &m.user), 4_974);
        assert_eq!(m.chain.balance_of(&m.a, &m.user), 90_000);
        assert_eq!(m.chain.balance_of(&m.b, &m.user), 25);
        assert!(m.chain.holdings(&m.engine.account()).is_empty());
        assert_eq!(m.chain.counters().swaps, 1);
        assert_eq!(m.chain.open_checkpoints(), 0);
    }

    #[test]
    fn test_zap_in_swaps_both_legs() {
        crate::init_test_tracing();
        let m = market(0);
        let (c, routes) = outside_source(&m);
        let ctx = CallContext::new(m.user, DEADLINE);
        let lp = m
            .engine
            .zap_in(&ctx, c, m.pool_ab, 20_000, 4_975, &routes)
            .unwrap();

        // 10_000 c -> 4_975 a and 10_000 c -> 9_900 b; the pool takes
        // (4_975, 4_975) and 4_925 b comes back
        assert_eq!(lp, 4_975);
        assert_eq!(m.chain.counters().swaps, 2);
        assert_eq!(m.chain.counters().add_liquidity, 1);
        assert_eq!(m.chain.balance_of(&m.pool_ab, &m.user), 4_975);
        assert_eq!(m.chain.balance_of(&c, &m.user), 30_000);
        assert_eq!(m.chain.balance_of(&m.a, &m.user), 100_000);
        assert_eq!(m.chain.balance_of(&m.b, &m.user), 4_925);
        assert!(m.chain.holdings(&m.engine.account()).is_empty());
        assert_eq!(m.chain.open_checkpoints(), 0);
    }

    #[test]
    fn test_amount_too_small_to_split_rejected_before_any_call() {
        let m = market(0);
        let (c, routes) = outside_source(&m);
        let err = m
            .engine
            .zap_in(&CallContext::new(m.user, DEADLINE), c, m.pool_ab, 1, 0, &routes)
            .unwrap_err();
        assert!(matches!(
            err,
            ZapError::Input(InputError::AmountTooSmall {
                leg: Leg::Token0,
                amount: 1
            })
        ));
        assert_eq!(m.chain.counters(), dex_sim::CallCounters::default());
        assert_eq!(m.chain.balance_of(&c, &m.user), 50_000);
        assert_eq!(m.chain.allowance(&c, &m.user, &m.engine.account()), 50_000);
    }

    #[test]
    fn test_zap_in_slippage_reverts_everything() {
        crate::init_test_tracing();
        let m = market(25);
        let ctx = CallContext::new(m.user, DEADLINE);
        let before = m.chain.pool(&m.pool_ab).unwrap();

        let err = m
            .engine
            .zap_in(&ctx, m.a, m.pool_ab, 10_000, 1_000_000, &a_routes(&m))
            .unwrap_err();
        assert!(matches!(err, ZapError::Slippage { minimum: 1_000_000, .. }));
        assert!(err.is_requotable());

        assert_eq!(m.chain.balance_of(&m.a, &m.user), 100_000);
        assert_eq!(m.chain.balance_of(&m.b, &m.user), 0);
        assert_eq!(m.chain.balance_of(&m.pool_ab, &m.user), 0);
        assert_eq!(m.chain.pool(&m.pool_ab).unwrap(), before);
        assert!(m.chain.holdings(&m.engine.account()).is_empty());
        assert_eq!(m.chain.open_checkpoints(), 0);
    }

    #[test]
    fn test_misaligned_routes_rejected_before_any_call() {
        let m = market(25);
        let ctx = CallContext::new(m.user, DEADLINE);
        // token1's route handed in as token0's
        let swapped = LegRoutes::new(Route::new(vec![m.a, m.b]), Route::identity());
        let err = m
            .engine
            .zap_in(&ctx, m.a, m.pool_ab, 10_000, 0, &swapped)
            .unwrap_err();
        assert!(matches!(err, ZapError::Input(_)));
        assert_eq!(m.chain.counters(), dex_sim::CallCounters::default());
        assert_eq!(m.chain.balance_of(&m.a, &m.user), 100_000);
    }

    #[test]
    fn test_input_validation() {
        let m = market(25);
        let ctx = CallContext::new(m.user, DEADLINE);
        let routes = a_routes(&m);

        assert!(matches!(
            m.engine.zap_in(&ctx, m.a, m.pool_ab, 0, 0, &routes),
            Err(ZapError::Input(InputError::ZeroAmount))
        ));
        assert!(matches!(
            m.engine
                .zap_in(&ctx.with_value(5), m.a, m.pool_ab, 10, 0, &routes),
            Err(ZapError::Input(InputError::UnexpectedNativeValue { attached: 5 }))
        ));
        assert!(matches!(
            m.engine
                .zap_in(&ctx.with_value(9), NATIVE_ASSET, m.pool_ab, 10, 0, &routes),
            Err(ZapError::Input(InputError::NativeValueMismatch { expected: 10, attached: 9 }))
        ));
        assert!(matches!(
            m.engine.zap_in(&ctx, m.a, m.a, 10, 0, &routes),
            Err(ZapError::Input(InputError::UnknownPool(_)))
        ));
        assert_eq!(m.chain.counters(), dex_sim::CallCounters::default());
    }

    #[test]
    fn test_native_zap_in_single_swap_two_hops() {
        crate::init_test_tracing();
        let chain = SimChain::new();
        let provider = chain.new_address();
        let mid = chain.new_token();
        let usd = chain.new_token();
        let big = 1_000 * E18;
        let target = chain.create_pool(WRAPPED_NATIVE, usd, big, big, &provider);
        chain.create_pool(WRAPPED_NATIVE, mid, big, big, &provider);
        chain.create_pool(mid, usd, big, big, &provider);

        let engine = ZapEngine::new(EngineConfig::default(), chain.collaborators()).unwrap();
        let user = chain.new_address();
        chain.mint(&NATIVE_ASSET, &user, 5 * E18);

        // usd sorts below the wrapped token, so it is token0
        let routes = LegRoutes::new(
            Route::new(vec![WRAPPED_NATIVE, mid, usd]),
            Route::identity(),
        );
        let ctx = CallContext::new(user, DEADLINE).with_value(2 * E18);
        let lp = engine
            .zap_in(&ctx, NATIVE_ASSET, target, 2 * E18, 0, &routes)
            .unwrap();

        assert!(lp > 0);
        assert_eq!(chain.counters().swaps, 1);
        assert_eq!(chain.balance_of(&target, &user), lp);
        assert_eq!(chain.balance_of(&WRAPPED_NATIVE, &user), 0);
        assert!(chain.balance_of(&NATIVE_ASSET, &user) >= 3 * E18);
        assert!(chain.holdings(&engine.account()).is_empty());
    }

    #[test]
    fn test_failed_add_liquidity_rolls_back_swaps() {
        let m = market(25);
        let ctx = CallContext::new(m.user, DEADLINE);
        let before = m.chain.pool(&m.pool_ab).unwrap();
        m.chain.fail_next(SimFault::AddLiquidity);

        let err = m
            .engine
            .zap_in(&ctx, m.a, m.pool_ab, 10_000, 0, &a_routes(&m))
            .unwrap_err();
        assert!(matches!(err, ZapError::External(ExternalError::Router(_))));
        assert_eq!(m.chain.counters().swaps, 1);
        assert_eq!(m.chain.pool(&m.pool_ab).unwrap(), before);
        assert_eq!(m.chain.balance_of(&m.a, &m.user), 100_000);
    }

    #[test]
    fn test_reentrant_call_rejected() {
        let m = market(25);
        let seen: Arc<Mutex<Option<Result<Amount>>>> = Arc::new(Mutex::new(None));

        let inner_engine = m.engine.clone();
        let inner_seen = seen.clone();
        let (user, a, pool, routes) = (m.user, m.a, m.pool_ab, a_routes(&m));
        m.chain.set_swap_hook(Arc::new(move || {
            let ctx = CallContext::new(user, DEADLINE);
            let result = inner_engine.zap_in(&ctx, a, pool, 10, 0, &routes);
            *inner_seen.lock().unwrap() = Some(result);
        }));

        let ctx = CallContext::new(m.user, DEADLINE);
        let outer = m.engine.zap_in(&ctx, m.a, m.pool_ab, 10_000, 0, &a_routes(&m));
        m.chain.clear_swap_hook();

        assert!(outer.is_ok());
        assert!(matches!(
            seen.lock().unwrap().take(),
            Some(Err(ZapError::Reentrant))
        ));
        assert!(!m.engine.guard().is_entered());
    }

    #[test]
    fn test_configured_tolerance_raises_floor() {
        let chain = SimChain::with_fee(0);
        let provider = chain.new_address();
        let a = chain.new_token();
        let b = chain.new_token();
        let pool = chain.create_pool(a, b, 1_000_000, 1_000_000, &provider);
        let config = EngineConfig {
            max_slippage_percent: Some(SlippageTolerance::ZERO),
            ..EngineConfig::default()
        };
        let engine = ZapEngine::new(config, chain.collaborators()).unwrap();
        let user = chain.new_address();
        chain.mint(&a, &user, 10_000);
        chain.approve(&a, &user, &engine.account(), 10_000).unwrap();

        // live ideal is min(4975, 4975) = 4975 but only 4974 gets minted
        let routes = LegRoutes::new(Route::identity(), Route::new(vec![a, b]));
        let err = engine
            .zap_in(&CallContext::new(user, DEADLINE), a, pool, 10_000, 0, &routes)
            .unwrap_err();
        assert!(matches!(
            err,
            ZapError::Slippage {
                realized: 4_974,
                minimum: 4_975,
                shortfall: 1
            }
        ));
    }

    #[test]
    fn test_execute_zap_in_from_json_request() {
        let m = market(0);
        let json = format!(
            r#"{{"source_token":"{}","pool":"{}","amount":10000,"minimum_lp":4900,
                "routes":{{"token0":[],"token1":["{}","{}"]}}}}"#,
            m.a, m.pool_ab, m.a, m.b
        );
        let request: ZapRequest = serde_json::from_str(&json).unwrap();
        let lp = m
            .engine
            .execute_zap_in(&CallContext::new(m.user, DEADLINE), &request)
            .unwrap();
        assert_eq!(lp, 4_974);
    }
}
