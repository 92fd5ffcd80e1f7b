// 8.6 engine/positions.rs: helpers shared by increase, decrease and liquidation,
// plus the read-only position views. views run on a throwaway Tx so they see
// exactly what an operation would see.

use ruint::aliases::U256;

use super::core::Ledger;
use super::results::LedgerError;
use super::tx::Tx;
use crate::events::{CollectMarginFeesEvent, EventPayload};
use crate::fees::position_fee;
use crate::fixed::Usd;
use crate::funding::funding_fee;
use crate::oracle::PriceOracle;
use crate::position::{self, DeltaParams, LiquidationCheck, LiquidationState, Position};
use crate::types::{AccountId, PositionKey, TokenId};

impl<'a, O: PriceOracle> Tx<'a, O> {
    // long: collateral is the index token and not a stable.
    // short: stable collateral against a shortable non-stable index.
    pub(super) fn validate_tokens(&self, collateral_token: TokenId, index_token: TokenId, is_long: bool) -> Result<(), LedgerError> {
        let collateral = self.token(collateral_token)?;
        if is_long {
            if collateral_token != index_token {
                return Err(LedgerError::InvalidTokens(collateral_token, index_token));
            }
            if collateral.is_stable {
                return Err(LedgerError::InvalidToken(collateral_token));
            }
            return Ok(());
        }

        if !collateral.is_stable {
            return Err(LedgerError::InvalidToken(collateral_token));
        }
        let index = self.token(index_token)?;
        if index.is_stable || !index.is_shortable {
            return Err(LedgerError::InvalidToken(index_token));
        }
        Ok(())
    }

    /// Unrealized pnl of `position` at the price it would close at.
    pub(super) fn position_delta(&self, key: &PositionKey, position: &Position) -> Result<(bool, Usd), LedgerError> {
        let price = if key.is_long() {
            self.min_price(key.index_token)?
        } else {
            self.max_price(key.index_token)?
        };
        let params = DeltaParams {
            now: self.now(),
            min_profit_time: self.config().fees.min_profit_time,
            min_profit_bps: self.token(key.index_token)?.min_profit_bps,
        };
        Ok(position::get_delta(
            position.size,
            position.average_price,
            price,
            key.is_long(),
            position.last_increased_time,
            params,
        )?)
    }

    /// Position fee on `size_delta` plus funding owed on the current size.
    pub(super) fn margin_fees(&self, collateral_token: TokenId, position: &Position, size_delta: Usd) -> Result<Usd, LedgerError> {
        let cumulative = self.pool(collateral_token)?.cumulative_funding_rate;
        let trade = position_fee(size_delta, self.config().fees.margin_fee_bps)?;
        let funding = funding_fee(position.size, position.entry_funding_rate, cumulative)?;
        Ok(trade.checked_add(funding)?)
    }

    pub(super) fn emit_margin_fees(&mut self, token: TokenId, fee_usd: Usd, fee_tokens: U256) {
        if fee_usd.is_zero() {
            return;
        }
        self.emit(EventPayload::CollectMarginFees(CollectMarginFeesEvent {
            token,
            fee_usd,
            fee_tokens,
        }));
    }

    pub(super) fn check_liquidation(
        &self,
        key: &PositionKey,
        position: &Position,
        raise: bool,
    ) -> Result<(LiquidationState, Usd), LedgerError> {
        let (has_profit, delta) = self.position_delta(key, position)?;
        let margin_fees = self.margin_fees(key.collateral_token, position, position.size)?;
        let check = LiquidationCheck {
            has_profit,
            delta,
            margin_fees,
            liquidation_fee: self.config().fees.liquidation_fee()?,
            max_leverage_bps: self.config().max_leverage_bps,
        };
        Ok(position::validate_liquidation(position, check, raise)?)
    }

    pub(super) fn existing_position(&self, key: &PositionKey) -> Result<Position, LedgerError> {
        self.position(key)
            .filter(|p| !p.size.is_zero())
            .ok_or(LedgerError::EmptyPosition)
    }
}

// 8.6.1: read views
impl<O: PriceOracle> Ledger<O> {
    pub fn position(
        &self,
        account: AccountId,
        collateral_token: TokenId,
        index_token: TokenId,
        is_long: bool,
    ) -> Option<Position> {
        let key = PositionKey::new(account, collateral_token, index_token, is_long);
        self.positions.get(&key).copied()
    }

    pub fn position_delta(
        &self,
        account: AccountId,
        collateral_token: TokenId,
        index_token: TokenId,
        is_long: bool,
    ) -> Result<(bool, Usd), LedgerError> {
        let key = PositionKey::new(account, collateral_token, index_token, is_long);
        let tx = Tx::new(self);
        let position = tx.existing_position(&key)?;
        tx.position_delta(&key, &position)
    }

    /// Liquidation state without raising, with the margin fees the pool would keep.
    pub fn validate_liquidation(
        &self,
        account: AccountId,
        collateral_token: TokenId,
        index_token: TokenId,
        is_long: bool,
    ) -> Result<(LiquidationState, Usd), LedgerError> {
        let key = PositionKey::new(account, collateral_token, index_token, is_long);
        let tx = Tx::new(self);
        let position = tx.existing_position(&key)?;
        tx.check_liquidation(&key, &position, false)
    }

    /// size / collateral in bps.
    pub fn position_leverage(
        &self,
        account: AccountId,
        collateral_token: TokenId,
        index_token: TokenId,
        is_long: bool,
    ) -> Result<U256, LedgerError> {
        let position = self
            .position(account, collateral_token, index_token, is_long)
            .ok_or(LedgerError::EmptyPosition)?;
        position.leverage_bps().ok_or(LedgerError::InsufficientCollateralForFees)
    }

    /// Pnl of all shorts on `index_token` at the max price.
    pub fn global_short_delta(&self, index_token: TokenId) -> Result<(bool, Usd), LedgerError> {
        let pool = self.pools.get(&index_token).ok_or(LedgerError::InvalidToken(index_token))?;
        if pool.global_short_size.is_zero() {
            return Ok((false, Usd::ZERO));
        }
        let price = self.max_price(index_token)?;
        Ok(position::global_short_delta(
            pool.global_short_size,
            pool.global_short_average_price,
            price,
        )?)
    }
}
