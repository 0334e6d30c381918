//! Custody accounting for the engine account
//!
//! Balances of every token a call may touch are recorded when the call
//! starts. Anything the call leaves behind on top of that is a leak and the
//! call reverts.

use std::collections::BTreeMap;

use warp_core::{Address, Amount, Result, TokenLedger, ZapError};

pub struct Custody<'a> {
    ledger: &'a dyn TokenLedger,
    account: Address,
    opening: BTreeMap<Address, Amount>,
}

impl<'a> Custody<'a> {
    pub fn record(
        ledger: &'a dyn TokenLedger,
        account: Address,
        tokens: impl IntoIterator<Item = Address>,
    ) -> Self {
        let opening = tokens
            .into_iter()
            .map(|token| (token, ledger.balance_of(&token, &account)))
            .collect();
        Self {
            ledger,
            account,
            opening,
        }
    }

    /// Fail with [`ZapError::CustodyLeak`] on the first token whose balance
    /// grew during the call
    pub fn verify(&self) -> Result<()> {
        for (token, opening) in &self.opening {
            let closing = self.ledger.balance_of(token, &self.account);
            if closing > *opening {
                return Err(ZapError::CustodyLeak {
                    token: *token,
                    amount: closing - opening,
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dex_sim::SimChain;

    #[test]
    fn test_leak_detected_against_opening_balance() {
        let chain = SimChain::new();
        let token = chain.new_token();
        let engine = chain.new_address();
        chain.mint(&token, &engine, 40);

        let custody = Custody::record(&chain, engine, [token]);
        assert!(custody.verify().is_ok());

        chain.mint(&token, &engine, 2);
        match custody.verify() {
            Err(ZapError::CustodyLeak { token: t, amount }) => {
                assert_eq!(t, token);
                assert_eq!(amount, 2);
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
