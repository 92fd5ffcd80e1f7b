// 3.0 liquidity.rs: per token pool counters. the ONLY place pool numbers change.
// every mutator is checked. reserved never exceeds pool, nothing goes below zero.

use ruint::aliases::U256;
use serde::{Deserialize, Serialize};

use crate::fixed::{checked_add, checked_sub, mul_div, MathError, Price, Usd, FUNDING_RATE_PRECISION};
use crate::types::{Timestamp, TokenId};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LiquidityError {
    #[error("{token}: pool amount {available} below requested {requested}")]
    InsufficientPoolAmount { token: TokenId, available: U256, requested: U256 },

    #[error("{token}: reserved {reserved} exceeds pool {pool}")]
    ReserveExceedsPool { token: TokenId, reserved: U256, pool: U256 },

    #[error("{token}: reserved amount {reserved} below release {requested}")]
    InsufficientReserve { token: TokenId, reserved: U256, requested: U256 },

    #[error("{token}: fee reserve {available} below withdrawal {requested}")]
    InsufficientFeeReserve { token: TokenId, available: U256, requested: U256 },

    #[error("{token}: guaranteed usd {guaranteed} below decrease {requested}")]
    GuaranteedUnderflow { token: TokenId, guaranteed: Usd, requested: Usd },

    #[error("{token}: unit of account issued {issued} over cap {max}")]
    MaxUnitOfAccountExceeded { token: TokenId, issued: U256, max: U256 },

    #[error("{token}: pool {pool} would fall below buffer {buffer}")]
    PoolBelowBuffer { token: TokenId, pool: U256, buffer: U256 },

    #[error("{token}: pool + fee reserve = {tracked}, custody holds {custody}")]
    BalanceMismatch { token: TokenId, tracked: U256, custody: U256 },

    #[error("{token}: {source}")]
    Math { token: TokenId, source: MathError },
}

/// Counters for one whitelisted token.
///
/// `pool_amount` is liquidity owned by the pool, including deposited position
/// collateral. `fee_reserve` is collected fees not yet withdrawn. Together they
/// must equal what custody holds for the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolState {
    pub token: TokenId,
    pub pool_amount: U256,
    pub reserved_amount: U256,
    pub fee_reserve: U256,
    pub guaranteed_usd: Usd,
    pub unit_of_account_issued: U256,
    pub cumulative_funding_rate: U256,
    /// `None` until the first funding touch aligns it to an interval boundary.
    pub last_funding_time: Option<Timestamp>,
    pub global_short_size: Usd,
    pub global_short_average_price: Price,
    /// Last custody balance the ledger observed for itself.
    pub token_balance: U256,
}

impl PoolState {
    pub fn new(token: TokenId) -> Self {
        Self {
            token,
            pool_amount: U256::ZERO,
            reserved_amount: U256::ZERO,
            fee_reserve: U256::ZERO,
            guaranteed_usd: Usd::ZERO,
            unit_of_account_issued: U256::ZERO,
            cumulative_funding_rate: U256::ZERO,
            last_funding_time: None,
            global_short_size: Usd::ZERO,
            global_short_average_price: Price::ZERO,
            token_balance: U256::ZERO,
        }
    }

    fn math(&self, source: MathError) -> LiquidityError {
        LiquidityError::Math { token: self.token, source }
    }

    // 3.1: pool amount

    pub fn increase_pool_amount(&mut self, amount: U256) -> Result<(), LiquidityError> {
        self.pool_amount = checked_add(self.pool_amount, amount).map_err(|e| self.math(e))?;
        Ok(())
    }

    pub fn decrease_pool_amount(&mut self, amount: U256) -> Result<(), LiquidityError> {
        if amount > self.pool_amount {
            return Err(LiquidityError::InsufficientPoolAmount {
                token: self.token,
                available: self.pool_amount,
                requested: amount,
            });
        }
        self.pool_amount -= amount;
        self.check_reserve()
    }

    // 3.2: reservations backing open positions

    pub fn increase_reserved_amount(&mut self, amount: U256) -> Result<(), LiquidityError> {
        self.reserved_amount = checked_add(self.reserved_amount, amount).map_err(|e| self.math(e))?;
        self.check_reserve()
    }

    pub fn decrease_reserved_amount(&mut self, amount: U256) -> Result<(), LiquidityError> {
        if amount > self.reserved_amount {
            return Err(LiquidityError::InsufficientReserve {
                token: self.token,
                reserved: self.reserved_amount,
                requested: amount,
            });
        }
        self.reserved_amount -= amount;
        Ok(())
    }

    pub fn check_reserve(&self) -> Result<(), LiquidityError> {
        if self.reserved_amount > self.pool_amount {
            return Err(LiquidityError::ReserveExceedsPool {
                token: self.token,
                reserved: self.reserved_amount,
                pool: self.pool_amount,
            });
        }
        Ok(())
    }

    // 3.3: guaranteed usd, the part of long size the pool already owes in usd terms

    pub fn increase_guaranteed_usd(&mut self, amount: Usd) -> Result<(), LiquidityError> {
        self.guaranteed_usd = self.guaranteed_usd.checked_add(amount).map_err(|e| self.math(e))?;
        Ok(())
    }

    pub fn decrease_guaranteed_usd(&mut self, amount: Usd) -> Result<(), LiquidityError> {
        if amount > self.guaranteed_usd {
            return Err(LiquidityError::GuaranteedUnderflow {
                token: self.token,
                guaranteed: self.guaranteed_usd,
                requested: amount,
            });
        }
        self.guaranteed_usd = self.guaranteed_usd.saturating_sub(amount);
        Ok(())
    }

    // 3.4: fees

    /// Move `amount` out of the pool into the fee reserve.
    pub fn collect_fee_from_pool(&mut self, amount: U256) -> Result<(), LiquidityError> {
        self.decrease_pool_amount(amount)?;
        self.increase_fee_reserve(amount)
    }

    pub fn increase_fee_reserve(&mut self, amount: U256) -> Result<(), LiquidityError> {
        self.fee_reserve = checked_add(self.fee_reserve, amount).map_err(|e| self.math(e))?;
        Ok(())
    }

    pub fn withdraw_fee_reserve(&mut self, amount: U256) -> Result<(), LiquidityError> {
        if amount > self.fee_reserve {
            return Err(LiquidityError::InsufficientFeeReserve {
                token: self.token,
                available: self.fee_reserve,
                requested: amount,
            });
        }
        self.fee_reserve -= amount;
        Ok(())
    }

    // 3.5: unit of account issued against this token. max of zero means uncapped.

    pub fn issue_unit_of_account(&mut self, amount: U256, max: U256) -> Result<(), LiquidityError> {
        let issued = checked_add(self.unit_of_account_issued, amount).map_err(|e| self.math(e))?;
        if !max.is_zero() && issued > max {
            return Err(LiquidityError::MaxUnitOfAccountExceeded {
                token: self.token,
                issued,
                max,
            });
        }
        self.unit_of_account_issued = issued;
        Ok(())
    }

    // saturating: price moves can make a token redeem more than was ever issued against it
    pub fn retire_unit_of_account(&mut self, amount: U256) {
        self.unit_of_account_issued = self.unit_of_account_issued.saturating_sub(amount);
    }

    // 3.6: global short tracking

    pub fn increase_global_short_size(&mut self, amount: Usd) -> Result<(), LiquidityError> {
        self.global_short_size = self.global_short_size.checked_add(amount).map_err(|e| self.math(e))?;
        Ok(())
    }

    // floored at zero
    pub fn decrease_global_short_size(&mut self, amount: Usd) {
        self.global_short_size = self.global_short_size.saturating_sub(amount);
    }

    // 3.7: derived views

    pub fn available_amount(&self) -> U256 {
        self.pool_amount.saturating_sub(self.reserved_amount)
    }

    /// reserved / pool, scaled by `FUNDING_RATE_PRECISION`.
    pub fn utilization(&self) -> U256 {
        if self.pool_amount.is_zero() {
            return U256::ZERO;
        }
        mul_div(self.reserved_amount, FUNDING_RATE_PRECISION, self.pool_amount).unwrap_or(U256::ZERO)
    }

    pub fn check_buffer(&self, buffer: U256) -> Result<(), LiquidityError> {
        if self.pool_amount < buffer {
            return Err(LiquidityError::PoolBelowBuffer {
                token: self.token,
                pool: self.pool_amount,
                buffer,
            });
        }
        Ok(())
    }

    /// The solvency check run before every commit.
    pub fn check_solvency(&self, custody_balance: U256) -> Result<(), LiquidityError> {
        self.check_reserve()?;
        let tracked = checked_add(self.pool_amount, self.fee_reserve).map_err(|e| self.math(e))?;
        if tracked != custody_balance {
            return Err(LiquidityError::BalanceMismatch {
                token: self.token,
                tracked,
                custody: custody_balance,
            });
        }
        Ok(())
    }

    /// How much of the pool's accounting is not yet backed by a transfer. Used by
    /// deposits, which learn amounts by balance delta.
    pub fn pending_inflow(&self, custody_balance: U256) -> Result<U256, LiquidityError> {
        checked_sub(custody_balance, self.token_balance).map_err(|e| self.math(e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn u(v: u64) -> U256 {
        U256::from(v)
    }

    fn pool_with(amount: u64) -> PoolState {
        let mut p = PoolState::new(TokenId(1));
        p.increase_pool_amount(u(amount)).unwrap();
        p
    }

    #[test]
    fn reserve_cannot_exceed_pool() {
        let mut p = pool_with(1_000);
        p.increase_reserved_amount(u(1_000)).unwrap();
        let err = p.increase_reserved_amount(u(1)).unwrap_err();
        assert!(matches!(err, LiquidityError::ReserveExceedsPool { .. }));
    }

    #[test]
    fn pool_cannot_drop_under_reserve() {
        let mut p = pool_with(1_000);
        p.increase_reserved_amount(u(600)).unwrap();
        assert!(p.decrease_pool_amount(u(400)).is_ok());
        assert!(matches!(
            p.decrease_pool_amount(u(1)),
            Err(LiquidityError::ReserveExceedsPool { .. })
        ));
    }

    #[test]
    fn pool_cannot_go_negative() {
        let mut p = pool_with(10);
        assert!(matches!(
            p.decrease_pool_amount(u(11)),
            Err(LiquidityError::InsufficientPoolAmount { .. })
        ));
        assert_eq!(p.pool_amount, u(10));
    }

    #[test]
    fn fee_collection_keeps_sum() {
        let mut p = pool_with(250_000);
        p.collect_fee_from_pool(u(750)).unwrap();
        assert_eq!(p.pool_amount, u(249_250));
        assert_eq!(p.fee_reserve, u(750));
        assert!(p.check_solvency(u(250_000)).is_ok());
        assert!(p.check_solvency(u(250_001)).is_err());
    }

    #[test]
    fn unit_of_account_cap() {
        let mut p = PoolState::new(TokenId(2));
        p.issue_unit_of_account(u(100), u(150)).unwrap();
        assert!(p.issue_unit_of_account(u(51), u(150)).is_err());
        assert_eq!(p.unit_of_account_issued, u(100));
        // uncapped
        p.issue_unit_of_account(u(1_000), U256::ZERO).unwrap();
        p.retire_unit_of_account(u(5_000));
        assert_eq!(p.unit_of_account_issued, U256::ZERO);
    }

    #[test]
    fn utilization_scaled() {
        let mut p = pool_with(1_000);
        p.increase_reserved_amount(u(250)).unwrap();
        assert_eq!(p.utilization(), u(250_000));
        assert_eq!(p.available_amount(), u(750));
    }

    #[test]
    fn buffer_check() {
        let p = pool_with(100);
        assert!(p.check_buffer(u(100)).is_ok());
        assert!(p.check_buffer(u(101)).is_err());
    }
}
