//! Simulated chain state
//!
//! Everything a rollback must restore lives in [`ChainState`]; the chain
//! clones it wholesale on every checkpoint.

use std::collections::{BTreeMap, HashMap};

use warp_core::{Address, Amount, ExternalError, ExternalResult, Timestamp};

/// A constant-product pool. The pool address is also its share token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimPool {
    pub address: Address,
    pub token0: Address,
    pub token1: Address,
    pub reserve0: Amount,
    pub reserve1: Amount,
    pub total_supply: Amount,
}

impl SimPool {
    /// Reserves ordered as `(reserve of token_in, reserve of token_out)`
    pub fn reserves_for(&self, token_in: &Address) -> Option<(Amount, Amount)> {
        if *token_in == self.token0 {
            Some((self.reserve0, self.reserve1))
        } else if *token_in == self.token1 {
            Some((self.reserve1, self.reserve0))
        } else {
            None
        }
    }

    pub fn other(&self, token: &Address) -> Option<Address> {
        if *token == self.token0 {
            Some(self.token1)
        } else if *token == self.token1 {
            Some(self.token0)
        } else {
            None
        }
    }
}

/// A staking vault. The vault address is also its share token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimVaultState {
    pub address: Address,
    pub staked_token: Address,
    pub total_staked: Amount,
    pub total_shares: Amount,
}

/// Journaled chain state
#[derive(Debug, Clone, Default)]
pub struct ChainState {
    pub balances: HashMap<(Address, Address), Amount>,
    pub allowances: HashMap<(Address, Address, Address), Amount>,
    pub pools: BTreeMap<Address, SimPool>,
    pub pairs: HashMap<(Address, Address), Address>,
    pub vaults: BTreeMap<Address, SimVaultState>,
    pub now: Timestamp,
}

fn pair_key(a: &Address, b: &Address) -> (Address, Address) {
    if a < b {
        (*a, *b)
    } else {
        (*b, *a)
    }
}

impl ChainState {
    pub fn balance(&self, token: &Address, owner: &Address) -> Amount {
        self.balances.get(&(*token, *owner)).copied().unwrap_or(0)
    }

    pub fn allowance(&self, token: &Address, owner: &Address, spender: &Address) -> Amount {
        self.allowances
            .get(&(*token, *owner, *spender))
            .copied()
            .unwrap_or(0)
    }

    pub fn mint(&mut self, token: &Address, to: &Address, amount: Amount) {
        *self.balances.entry((*token, *to)).or_insert(0) += amount;
    }

    pub fn burn(&mut self, token: &Address, from: &Address, amount: Amount) -> ExternalResult<()> {
        self.debit(token, from, amount)
    }

    fn debit(&mut self, token: &Address, from: &Address, amount: Amount) -> ExternalResult<()> {
        let available = self.balance(token, from);
        if available < amount {
            return Err(ExternalError::InsufficientBalance {
                token: *token,
                required: amount,
                available,
            });
        }
        let remaining = available - amount;
        if remaining == 0 {
            self.balances.remove(&(*token, *from));
        } else {
            self.balances.insert((*token, *from), remaining);
        }
        Ok(())
    }

    pub fn transfer(
        &mut self,
        token: &Address,
        from: &Address,
        to: &Address,
        amount: Amount,
    ) -> ExternalResult<()> {
        if amount == 0 {
            return Ok(());
        }
        self.debit(token, from, amount)?;
        self.mint(token, to, amount);
        Ok(())
    }

    pub fn approve(&mut self, token: &Address, owner: &Address, spender: &Address, amount: Amount) {
        if amount == 0 {
            self.allowances.remove(&(*token, *owner, *spender));
        } else {
            self.allowances.insert((*token, *owner, *spender), amount);
        }
    }

    pub fn transfer_from(
        &mut self,
        token: &Address,
        spender: &Address,
        from: &Address,
        to: &Address,
        amount: Amount,
    ) -> ExternalResult<()> {
        if spender != from {
            let available = self.allowance(token, from, spender);
            if available < amount {
                return Err(ExternalError::InsufficientAllowance {
                    token: *token,
                    required: amount,
                    available,
                });
            }
            self.approve(token, from, spender, available - amount);
        }
        self.transfer(token, from, to, amount)
    }

    pub fn pair(&self, a: &Address, b: &Address) -> Option<Address> {
        self.pairs.get(&pair_key(a, b)).copied()
    }

    pub fn register_pool(&mut self, pool: SimPool) {
        self.pairs
            .insert(pair_key(&pool.token0, &pool.token1), pool.address);
        self.pools.insert(pool.address, pool);
    }

    pub fn pool(&self, address: &Address) -> ExternalResult<&SimPool> {
        self.pools.get(address).ok_or_else(|| ExternalError::Pool {
            pool: *address,
            reason: "no such pool".to_string(),
        })
    }

    pub fn pool_mut(&mut self, address: &Address) -> ExternalResult<&mut SimPool> {
        self.pools.get_mut(address).ok_or_else(|| ExternalError::Pool {
            pool: *address,
            reason: "no such pool".to_string(),
        })
    }

    /// Total supply of a token across every holder
    pub fn supply_of(&self, token: &Address) -> Amount {
        self.balances
            .iter()
            .filter(|((t, _), _)| t == token)
            .map(|(_, amount)| *amount)
            .sum()
    }

    /// All non-zero balances held by `owner`
    pub fn holdings(&self, owner: &Address) -> Vec<(Address, Amount)> {
        let mut out: Vec<(Address, Amount)> = self
            .balances
            .iter()
            .filter(|((_, o), amount)| o == owner && **amount > 0)
            .map(|((t, _), amount)| (*t, *amount))
            .collect();
        out.sort();
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(n: u64) -> Address {
        Address::from_low_u64(n)
    }

    #[test]
    fn test_transfer_moves_balance() {
        let mut state = ChainState::default();
        state.mint(&addr(1), &addr(10), 100);
        state.transfer(&addr(1), &addr(10), &addr(11), 40).unwrap();
        assert_eq!(state.balance(&addr(1), &addr(10)), 60);
        assert_eq!(state.balance(&addr(1), &addr(11)), 40);
    }

    #[test]
    fn test_transfer_insufficient() {
        let mut state = ChainState::default();
        state.mint(&addr(1), &addr(10), 5);
        let err = state.transfer(&addr(1), &addr(10), &addr(11), 6).unwrap_err();
        assert!(matches!(err, ExternalError::InsufficientBalance { required: 6, available: 5, .. }));
    }

    #[test]
    fn test_transfer_from_consumes_allowance() {
        let mut state = ChainState::default();
        state.mint(&addr(1), &addr(10), 100);
        state.approve(&addr(1), &addr(10), &addr(20), 50);
        state
            .transfer_from(&addr(1), &addr(20), &addr(10), &addr(20), 30)
            .unwrap();
        assert_eq!(state.allowance(&addr(1), &addr(10), &addr(20)), 20);
        let err = state
            .transfer_from(&addr(1), &addr(20), &addr(10), &addr(20), 30)
            .unwrap_err();
        assert!(matches!(err, ExternalError::InsufficientAllowance { .. }));
    }

    #[test]
    fn test_pair_lookup_is_order_independent() {
        let mut state = ChainState::default();
        state.register_pool(SimPool {
            address: addr(99),
            token0: addr(1),
            token1: addr(2),
            reserve0: 0,
            reserve1: 0,
            total_supply: 0,
        });
        assert_eq!(state.pair(&addr(1), &addr(2)), Some(addr(99)));
        assert_eq!(state.pair(&addr(2), &addr(1)), Some(addr(99)));
        assert_eq!(state.pair(&addr(1), &addr(3)), None);
    }
}
