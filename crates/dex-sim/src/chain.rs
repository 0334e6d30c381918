//! The simulated chain: shared state, journal, fault injection and call
//! counters

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use warp_core::{
    Address, Amount, Checkpoint, Collaborators, ExternalError, ExternalResult, StateJournal,
    Timestamp, TokenLedger,
};

use crate::math;
use crate::state::{ChainState, SimPool, SimVaultState};
use crate::vault::SimVault;

/// Router account (spender for swaps and liquidity calls)
pub const ROUTER_ADDRESS: Address = Address([
    0x11, 0x11, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0x01,
]);

/// Wrapped native token (also the wrapper's own account)
pub const WRAPPED_NATIVE: Address = Address([
    0x98, 0x87, 0x8b, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0x02,
]);

/// Default swap fee: 0.25%
pub const DEFAULT_FEE_BPS: u32 = 25;

/// Operations that can be made to fail once
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SimFault {
    Swap,
    AddLiquidity,
    RemoveLiquidity,
    Stake,
    Unstake,
    Wrap,
    Unwrap,
}

/// Number of calls each collaborator received (not rolled back)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallCounters {
    pub swaps: usize,
    pub add_liquidity: usize,
    pub remove_liquidity: usize,
    pub stakes: usize,
    pub unstakes: usize,
    pub wraps: usize,
    pub unwraps: usize,
}

/// Callback invoked at the start of every router swap, outside the lock
pub type SwapHook = Arc<dyn Fn() + Send + Sync>;

pub(crate) struct Inner {
    pub(crate) state: ChainState,
    pub(crate) snapshots: Vec<ChainState>,
    pub(crate) fee_bps: u32,
    pub(crate) faults: HashSet<SimFault>,
    pub(crate) counters: CallCounters,
    pub(crate) next_address: u64,
    pub(crate) swap_hook: Option<SwapHook>,
}

/// In-memory chain implementing every collaborator interface
#[derive(Clone)]
pub struct SimChain {
    pub(crate) inner: Arc<Mutex<Inner>>,
}

impl SimChain {
    pub fn new() -> Self {
        Self::with_fee(DEFAULT_FEE_BPS)
    }

    /// Chain whose pools charge `fee_bps` basis points per hop
    pub fn with_fee(fee_bps: u32) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                state: ChainState {
                    now: 1_700_000_000,
                    ..ChainState::default()
                },
                snapshots: Vec::new(),
                fee_bps,
                faults: HashSet::new(),
                counters: CallCounters::default(),
                next_address: 0x1000,
                swap_hook: None,
            })),
        }
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Bundle of collaborators for the engine
    pub fn collaborators(&self) -> Collaborators {
        let chain = Arc::new(self.clone());
        Collaborators {
            ledger: chain.clone(),
            router: chain.clone(),
            factory: chain.clone(),
            pools: chain.clone(),
            wrapper: chain.clone(),
            journal: chain,
        }
    }

    /// Fresh deterministic address
    pub fn new_address(&self) -> Address {
        let mut inner = self.lock();
        inner.next_address += 1;
        Address::from_low_u64(inner.next_address)
    }

    /// Create a token identifier (tokens need no registration)
    pub fn new_token(&self) -> Address {
        self.new_address()
    }

    pub fn fee_bps(&self) -> u32 {
        self.lock().fee_bps
    }

    pub fn now(&self) -> Timestamp {
        self.lock().state.now
    }

    pub fn set_now(&self, now: Timestamp) {
        self.lock().state.now = now;
    }

    pub fn mint(&self, token: &Address, to: &Address, amount: Amount) {
        self.lock().state.mint(token, to, amount);
    }

    /// Create and seed a pool; `provider` receives the initial shares
    pub fn create_pool(
        &self,
        token_a: Address,
        token_b: Address,
        amount_a: Amount,
        amount_b: Amount,
        provider: &Address,
    ) -> Address {
        let address = self.new_address();
        let (token0, token1, reserve0, reserve1) = if token_a < token_b {
            (token_a, token_b, amount_a, amount_b)
        } else {
            (token_b, token_a, amount_b, amount_a)
        };
        let total_supply = math::initial_liquidity(reserve0, reserve1);
        let mut inner = self.lock();
        inner.state.mint(&token0, &address, reserve0);
        inner.state.mint(&token1, &address, reserve1);
        inner.state.mint(&address, provider, total_supply);
        inner.state.register_pool(SimPool {
            address,
            token0,
            token1,
            reserve0,
            reserve1,
            total_supply,
        });
        tracing::debug!(pool = %address, %token0, %token1, reserve0, reserve1, "pool created");
        address
    }

    /// Snapshot of a pool
    pub fn pool(&self, address: &Address) -> Option<SimPool> {
        self.lock().state.pools.get(address).cloned()
    }

    /// Create a vault over `staked_token`
    pub fn create_vault(&self, staked_token: Address) -> SimVault {
        let address = self.new_address();
        self.lock().state.vaults.insert(
            address,
            SimVaultState {
                address,
                staked_token,
                total_staked: 0,
                total_shares: 0,
            },
        );
        SimVault::new(self.clone(), address)
    }

    /// Make the next call of `fault`'s kind fail
    pub fn fail_next(&self, fault: SimFault) {
        self.lock().faults.insert(fault);
    }

    pub(crate) fn take_fault(inner: &mut Inner, fault: SimFault) -> bool {
        inner.faults.remove(&fault)
    }

    pub fn counters(&self) -> CallCounters {
        self.lock().counters
    }

    pub fn reset_counters(&self) {
        self.lock().counters = CallCounters::default();
    }

    /// Install a callback run at the start of every swap
    pub fn set_swap_hook(&self, hook: SwapHook) {
        self.lock().swap_hook = Some(hook);
    }

    pub fn clear_swap_hook(&self) {
        self.lock().swap_hook = None;
    }

    /// All non-zero balances of `owner`
    pub fn holdings(&self, owner: &Address) -> Vec<(Address, Amount)> {
        self.lock().state.holdings(owner)
    }

    pub fn supply_of(&self, token: &Address) -> Amount {
        self.lock().state.supply_of(token)
    }

    /// Open checkpoints (for tests asserting the journal is balanced)
    pub fn open_checkpoints(&self) -> usize {
        self.lock().snapshots.len()
    }
}

impl Default for SimChain {
    fn default() -> Self {
        Self::new()
    }
}

impl TokenLedger for SimChain {
    fn balance_of(&self, token: &Address, owner: &Address) -> Amount {
        self.lock().state.balance(token, owner)
    }

    fn transfer(
        &self,
        token: &Address,
        from: &Address,
        to: &Address,
        amount: Amount,
    ) -> ExternalResult<()> {
        self.lock().state.transfer(token, from, to, amount)
    }

    fn transfer_from(
        &self,
        token: &Address,
        spender: &Address,
        from: &Address,
        to: &Address,
        amount: Amount,
    ) -> ExternalResult<()> {
        self.lock()
            .state
            .transfer_from(token, spender, from, to, amount)
    }

    fn approve(
        &self,
        token: &Address,
        owner: &Address,
        spender: &Address,
        amount: Amount,
    ) -> ExternalResult<()> {
        self.lock().state.approve(token, owner, spender, amount);
        Ok(())
    }

    fn allowance(&self, token: &Address, owner: &Address, spender: &Address) -> Amount {
        self.lock().state.allowance(token, owner, spender)
    }
}

impl StateJournal for SimChain {
    fn checkpoint(&self) -> Checkpoint {
        let mut inner = self.lock();
        let snapshot = inner.state.clone();
        inner.snapshots.push(snapshot);
        Checkpoint((inner.snapshots.len() - 1) as u64)
    }

    fn commit(&self, checkpoint: Checkpoint) -> ExternalResult<()> {
        let mut inner = self.lock();
        if inner.snapshots.len() as u64 != checkpoint.0 + 1 {
            return Err(ExternalError::Journal(format!(
                "commit of checkpoint {} out of order ({} open)",
                checkpoint.0,
                inner.snapshots.len()
            )));
        }
        inner.snapshots.pop();
        Ok(())
    }

    fn rollback(&self, checkpoint: Checkpoint) -> ExternalResult<()> {
        let mut inner = self.lock();
        if inner.snapshots.len() as u64 != checkpoint.0 + 1 {
            return Err(ExternalError::Journal(format!(
                "rollback of checkpoint {} out of order ({} open)",
                checkpoint.0,
                inner.snapshots.len()
            )));
        }
        if let Some(snapshot) = inner.snapshots.pop() {
            inner.state = snapshot;
        }
        Ok(())
    }
}
