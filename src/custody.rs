// 9.2 custody.rs: in-memory token bank. balances per holder per token.
// the ledger never trusts a declared amount: it learns deposits by diffing its own
// balance here against what it last recorded.
// tokens can carry a transfer tax to model fee-on-transfer tokens.

use ruint::aliases::U256;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::fixed::{after_bps, BASIS_POINTS_DIVISOR};
use crate::types::{AccountId, TokenId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Holder {
    Ledger,
    Account(AccountId),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CustodyError {
    #[error("{holder:?} holds {balance} of {token}, needs {requested}")]
    InsufficientBalance {
        holder: Holder,
        token: TokenId,
        balance: U256,
        requested: U256,
    },

    #[error("balance overflow for {token}")]
    Overflow { token: TokenId },

    #[error("transfer tax {bps} bps out of range")]
    InvalidTax { bps: u32 },
}

/// Outbound movements the ledger queues during an operation and applies on commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransferOp {
    /// ledger pays an account
    Pay { token: TokenId, to: AccountId, amount: U256 },
    /// new units created straight into an account
    Mint { token: TokenId, to: AccountId, amount: U256 },
    /// units held by the ledger destroyed
    Burn { token: TokenId, amount: U256 },
}

impl TransferOp {
    pub fn token(&self) -> TokenId {
        match self {
            TransferOp::Pay { token, .. } | TransferOp::Mint { token, .. } | TransferOp::Burn { token, .. } => *token,
        }
    }

    /// How much this op takes out of the ledger's own balance.
    pub fn ledger_outflow(&self) -> U256 {
        match self {
            TransferOp::Pay { amount, .. } | TransferOp::Burn { amount, .. } => *amount,
            TransferOp::Mint { .. } => U256::ZERO,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct TokenBank {
    balances: HashMap<(Holder, TokenId), U256>,
    supply: HashMap<TokenId, U256>,
    transfer_tax_bps: HashMap<TokenId, u32>,
}

impl TokenBank {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn balance_of(&self, token: TokenId, holder: Holder) -> U256 {
        self.balances.get(&(holder, token)).copied().unwrap_or(U256::ZERO)
    }

    pub fn total_supply(&self, token: TokenId) -> U256 {
        self.supply.get(&token).copied().unwrap_or(U256::ZERO)
    }

    pub fn transfer_tax(&self, token: TokenId) -> u32 {
        self.transfer_tax_bps.get(&token).copied().unwrap_or(0)
    }

    pub fn set_transfer_tax(&mut self, token: TokenId, bps: u32) -> Result<(), CustodyError> {
        if U256::from(bps) > BASIS_POINTS_DIVISOR {
            return Err(CustodyError::InvalidTax { bps });
        }
        self.transfer_tax_bps.insert(token, bps);
        Ok(())
    }

    fn credit(&mut self, token: TokenId, holder: Holder, amount: U256) -> Result<(), CustodyError> {
        let entry = self.balances.entry((holder, token)).or_insert(U256::ZERO);
        *entry = entry.checked_add(amount).ok_or(CustodyError::Overflow { token })?;
        Ok(())
    }

    fn debit(&mut self, token: TokenId, holder: Holder, amount: U256) -> Result<(), CustodyError> {
        let balance = self.balance_of(token, holder);
        if balance < amount {
            return Err(CustodyError::InsufficientBalance {
                holder,
                token,
                balance,
                requested: amount,
            });
        }
        self.balances.insert((holder, token), balance - amount);
        Ok(())
    }

    pub fn mint(&mut self, token: TokenId, to: Holder, amount: U256) -> Result<(), CustodyError> {
        let supply = self
            .total_supply(token)
            .checked_add(amount)
            .ok_or(CustodyError::Overflow { token })?;
        self.credit(token, to, amount)?;
        self.supply.insert(token, supply);
        Ok(())
    }

    pub fn burn(&mut self, token: TokenId, from: Holder, amount: U256) -> Result<(), CustodyError> {
        self.debit(token, from, amount)?;
        let supply = self.total_supply(token).saturating_sub(amount);
        self.supply.insert(token, supply);
        Ok(())
    }

    /// Move tokens. The sender loses `amount`, the receiver gets it minus any
    /// transfer tax (the tax is burned). Returns what the receiver got.
    pub fn transfer(&mut self, token: TokenId, from: Holder, to: Holder, amount: U256) -> Result<U256, CustodyError> {
        self.debit(token, from, amount)?;
        let tax_bps = self.transfer_tax(token);
        let received = if tax_bps == 0 {
            amount
        } else {
            after_bps(amount, tax_bps).map_err(|_| CustodyError::Overflow { token })?
        };
        self.credit(token, to, received)?;
        let burned = amount - received;
        if !burned.is_zero() {
            let supply = self.total_supply(token).saturating_sub(burned);
            self.supply.insert(token, supply);
        }
        Ok(received)
    }

    pub fn apply(&mut self, op: &TransferOp) -> Result<(), CustodyError> {
        match op {
            TransferOp::Pay { token, to, amount } => {
                self.transfer(*token, Holder::Ledger, Holder::Account(*to), *amount)?;
            }
            TransferOp::Mint { token, to, amount } => {
                self.mint(*token, Holder::Account(*to), *amount)?;
            }
            TransferOp::Burn { token, amount } => {
                self.burn(*token, Holder::Ledger, *amount)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BTC: TokenId = TokenId(1);
    const ALICE: Holder = Holder::Account(AccountId(1));

    fn u(v: u64) -> U256 {
        U256::from(v)
    }

    #[test]
    fn test_mint_and_transfer() {
        let mut bank = TokenBank::new();
        bank.mint(BTC, ALICE, u(1_000)).unwrap();
        let got = bank.transfer(BTC, ALICE, Holder::Ledger, u(400)).unwrap();
        assert_eq!(got, u(400));
        assert_eq!(bank.balance_of(BTC, ALICE), u(600));
        assert_eq!(bank.balance_of(BTC, Holder::Ledger), u(400));
        assert_eq!(bank.total_supply(BTC), u(1_000));
    }

    #[test]
    fn test_insufficient_balance() {
        let mut bank = TokenBank::new();
        bank.mint(BTC, ALICE, u(10)).unwrap();
        let err = bank.transfer(BTC, ALICE, Holder::Ledger, u(11)).unwrap_err();
        assert!(matches!(err, CustodyError::InsufficientBalance { .. }));
        assert_eq!(bank.balance_of(BTC, ALICE), u(10));
    }

    #[test]
    fn test_transfer_tax_burns_difference() {
        let mut bank = TokenBank::new();
        bank.set_transfer_tax(BTC, 100).unwrap();
        bank.mint(BTC, ALICE, u(10_000)).unwrap();
        let got = bank.transfer(BTC, ALICE, Holder::Ledger, u(10_000)).unwrap();
        assert_eq!(got, u(9_900));
        assert_eq!(bank.total_supply(BTC), u(9_900));
    }

    #[test]
    fn test_apply_ops() {
        let mut bank = TokenBank::new();
        bank.mint(BTC, Holder::Ledger, u(500)).unwrap();
        bank.apply(&TransferOp::Pay { token: BTC, to: AccountId(1), amount: u(200) }).unwrap();
        bank.apply(&TransferOp::Burn { token: BTC, amount: u(100) }).unwrap();
        bank.apply(&TransferOp::Mint { token: BTC, to: AccountId(2), amount: u(7) }).unwrap();
        assert_eq!(bank.balance_of(BTC, Holder::Ledger), u(200));
        assert_eq!(bank.balance_of(BTC, ALICE), u(200));
        assert_eq!(bank.total_supply(BTC), u(407));
    }
}
