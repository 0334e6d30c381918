//! In-memory DEX simulation
//!
//! A journaled ledger with constant-product pools, a router, a factory, a
//! native wrapper and staking vaults. It implements every collaborator
//! interface from `warp-core` so the engine can run end to end without a
//! chain.

pub mod chain;
pub mod math;
pub mod router;
pub mod state;
pub mod vault;

pub use chain::{
    CallCounters, SimChain, SimFault, SwapHook, DEFAULT_FEE_BPS, ROUTER_ADDRESS, WRAPPED_NATIVE,
};
pub use state::{ChainState, SimPool, SimVaultState};
pub use vault::SimVault;
