//! Collaborator interfaces
//!
//! The engine never talks to a concrete router, pool, vault or wrapper. Each
//! is injected as a trait object so the engine can run against a live
//! adapter or an in-memory simulation. Every mutating call names the acting
//! account explicitly.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::errors::ExternalError;
use crate::types::{Address, Amount, Timestamp};

/// Result of a collaborator call
pub type ExternalResult<T> = std::result::Result<T, ExternalError>;

/// Fungible token balances, transfers and allowances (native asset included)
pub trait TokenLedger: Send + Sync {
    fn balance_of(&self, token: &Address, owner: &Address) -> Amount;

    /// Move `amount` out of `from`, acting as `from`
    fn transfer(
        &self,
        token: &Address,
        from: &Address,
        to: &Address,
        amount: Amount,
    ) -> ExternalResult<()>;

    /// Move `amount` out of `from`, acting as `spender` and consuming its
    /// allowance
    fn transfer_from(
        &self,
        token: &Address,
        spender: &Address,
        from: &Address,
        to: &Address,
        amount: Amount,
    ) -> ExternalResult<()>;

    fn approve(
        &self,
        token: &Address,
        owner: &Address,
        spender: &Address,
        amount: Amount,
    ) -> ExternalResult<()>;

    fn allowance(&self, token: &Address, owner: &Address, spender: &Address) -> Amount;
}

/// Parameters of a router add-liquidity call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddLiquidity {
    pub token_a: Address,
    pub token_b: Address,
    pub amount_a_desired: Amount,
    pub amount_b_desired: Amount,
    pub amount_a_min: Amount,
    pub amount_b_min: Amount,
    pub to: Address,
    pub deadline: Timestamp,
}

/// What the router actually took and minted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiquidityAdded {
    pub amount_a: Amount,
    pub amount_b: Amount,
    pub liquidity: Amount,
}

/// Parameters of a router remove-liquidity call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoveLiquidity {
    pub token_a: Address,
    pub token_b: Address,
    pub liquidity: Amount,
    pub amount_a_min: Amount,
    pub amount_b_min: Amount,
    pub to: Address,
    pub deadline: Timestamp,
}

/// AMM router
pub trait Router: Send + Sync {
    /// Account that must be approved to spend the sender's tokens
    fn address(&self) -> Address;

    fn swap_exact_tokens_for_tokens(
        &self,
        sender: &Address,
        amount_in: Amount,
        amount_out_min: Amount,
        path: &[Address],
        to: &Address,
        deadline: Timestamp,
    ) -> ExternalResult<Vec<Amount>>;

    fn add_liquidity(&self, sender: &Address, params: AddLiquidity)
        -> ExternalResult<LiquidityAdded>;

    /// Returns `(amount_a, amount_b)` in the order of `params.token_a/token_b`
    fn remove_liquidity(
        &self,
        sender: &Address,
        params: RemoveLiquidity,
    ) -> ExternalResult<(Amount, Amount)>;

    fn get_amounts_out(&self, amount_in: Amount, path: &[Address]) -> ExternalResult<Vec<Amount>>;
}

/// AMM factory
pub trait Factory: Send + Sync {
    fn get_pair(&self, token_a: &Address, token_b: &Address) -> Option<Address>;
}

/// Read-only view of a pool. The pool's address doubles as its share token.
pub trait PoolReader: Send + Sync {
    fn token0(&self, pool: &Address) -> ExternalResult<Address>;
    fn token1(&self, pool: &Address) -> ExternalResult<Address>;
    fn get_reserves(&self, pool: &Address) -> ExternalResult<(Amount, Amount)>;
    fn total_supply(&self, pool: &Address) -> ExternalResult<Amount>;
}

/// Yield-bearing staking vault
pub trait StakingVault: Send + Sync {
    /// Account that must be approved to pull the staked token
    fn address(&self) -> Address;

    /// Token the vault accepts
    fn staked_token(&self) -> Address;

    /// Token the vault issues as shares
    fn share_token(&self) -> Address;

    /// Pull `amount` of the staked token from `sender`, credit shares to
    /// `recipient`, return the shares minted
    fn stake(&self, sender: &Address, amount: Amount, recipient: &Address)
        -> ExternalResult<Amount>;

    /// Burn `shares` held by `sender`, pay the underlying to `recipient`,
    /// return the underlying paid
    fn unstake(&self, sender: &Address, shares: Amount, recipient: &Address)
        -> ExternalResult<Amount>;
}

/// Native-asset wrapper (WETH-style)
pub trait NativeWrapper: Send + Sync {
    fn wrapped_token(&self) -> Address;
    fn wrap(&self, account: &Address, amount: Amount) -> ExternalResult<()>;
    fn unwrap(&self, account: &Address, amount: Amount) -> ExternalResult<()>;
}

/// Opaque handle returned by [`StateJournal::checkpoint`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Checkpoint(pub u64);

/// Checkpoint/rollback over the shared state the collaborators mutate.
///
/// Checkpoints nest; `commit` folds a checkpoint into its parent and
/// `rollback` restores the state captured when it was opened.
pub trait StateJournal: Send + Sync {
    fn checkpoint(&self) -> Checkpoint;
    fn commit(&self, checkpoint: Checkpoint) -> ExternalResult<()>;
    fn rollback(&self, checkpoint: Checkpoint) -> ExternalResult<()>;
}

/// Every collaborator the zap engine needs
#[derive(Clone)]
pub struct Collaborators {
    pub ledger: Arc<dyn TokenLedger>,
    pub router: Arc<dyn Router>,
    pub factory: Arc<dyn Factory>,
    pub pools: Arc<dyn PoolReader>,
    pub wrapper: Arc<dyn NativeWrapper>,
    pub journal: Arc<dyn StateJournal>,
}

impl fmt::Debug for Collaborators {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Collaborators")
            .field("router", &self.router.address())
            .field("wrapped_native", &self.wrapper.wrapped_token())
            .finish()
    }
}
