//! Staking vault over the simulated chain
//!
//! First depositor gets shares 1:1; later deposits are priced against the
//! vault's current stake. The vault address doubles as its share token.

use warp_core::{Address, Amount, ExternalError, ExternalResult, StakingVault};

use crate::chain::{SimChain, SimFault};
use crate::math;

/// Handle to one vault on a [`SimChain`]
#[derive(Clone)]
pub struct SimVault {
    chain: SimChain,
    address: Address,
}

impl SimVault {
    pub(crate) fn new(chain: SimChain, address: Address) -> Self {
        Self { chain, address }
    }

    /// Underlying held by the vault
    pub fn total_staked(&self) -> Amount {
        self.chain
            .lock()
            .state
            .vaults
            .get(&self.address)
            .map(|v| v.total_staked)
            .unwrap_or(0)
    }

    /// Credit yield to the vault without minting shares
    pub fn accrue(&self, amount: Amount) {
        let mut inner = self.chain.lock();
        let staked_token = match inner.state.vaults.get(&self.address) {
            Some(v) => v.staked_token,
            None => return,
        };
        inner.state.mint(&staked_token, &self.address, amount);
        if let Some(v) = inner.state.vaults.get_mut(&self.address) {
            v.total_staked += amount;
        }
    }
}

impl StakingVault for SimVault {
    fn address(&self) -> Address {
        self.address
    }

    fn staked_token(&self) -> Address {
        self.chain
            .lock()
            .state
            .vaults
            .get(&self.address)
            .map(|v| v.staked_token)
            .unwrap_or_default()
    }

    fn share_token(&self) -> Address {
        self.address
    }

    fn stake(&self, sender: &Address, amount: Amount, recipient: &Address) -> ExternalResult<Amount> {
        let mut inner = self.chain.lock();
        inner.counters.stakes += 1;
        if SimChain::take_fault(&mut inner, SimFault::Stake) {
            return Err(ExternalError::Vault("injected stake failure".to_string()));
        }
        if amount == 0 {
            return Err(ExternalError::Vault("cannot stake zero".to_string()));
        }
        let vault = inner
            .state
            .vaults
            .get(&self.address)
            .cloned()
            .ok_or_else(|| ExternalError::Vault("no such vault".to_string()))?;

        let shares = if vault.total_shares == 0 || vault.total_staked == 0 {
            amount
        } else {
            math::mul_div(amount, vault.total_shares, vault.total_staked).unwrap_or(0)
        };
        if shares == 0 {
            return Err(ExternalError::Vault("stake too small for one share".to_string()));
        }

        inner
            .state
            .transfer_from(&vault.staked_token, &self.address, sender, &self.address, amount)?;
        inner.state.mint(&self.address, recipient, shares);
        if let Some(v) = inner.state.vaults.get_mut(&self.address) {
            v.total_staked += amount;
            v.total_shares += shares;
        }
        Ok(shares)
    }

    fn unstake(&self, sender: &Address, shares: Amount, recipient: &Address) -> ExternalResult<Amount> {
        let mut inner = self.chain.lock();
        inner.counters.unstakes += 1;
        if SimChain::take_fault(&mut inner, SimFault::Unstake) {
            return Err(ExternalError::Vault("injected unstake failure".to_string()));
        }
        let vault = inner
            .state
            .vaults
            .get(&self.address)
            .cloned()
            .ok_or_else(|| ExternalError::Vault("no such vault".to_string()))?;
        let underlying =
            math::mul_div(shares, vault.total_staked, vault.total_shares).unwrap_or(0);
        if underlying == 0 {
            return Err(ExternalError::Vault("nothing to unstake".to_string()));
        }

        inner.state.burn(&self.address, sender, shares)?;
        inner
            .state
            .transfer(&vault.staked_token, &self.address, recipient, underlying)?;
        if let Some(v) = inner.state.vaults.get_mut(&self.address) {
            v.total_staked -= underlying;
            v.total_shares -= shares;
        }
        Ok(underlying)
    }
}
