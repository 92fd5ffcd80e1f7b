// 8.7 engine/increase.rs: open or grow a position.
// collateral arrives by transfer before the call and is measured, never declared.

use tracing::debug;

use super::core::Ledger;
use super::results::LedgerError;
use super::tx::Tx;
use crate::events::{EventPayload, IncreasePositionEvent, UpdatePositionEvent};
use crate::fixed::{checked_add, Usd};
use crate::oracle::PriceOracle;
use crate::position::{get_delta, next_average_price, next_global_short_average_price, DeltaParams, Position};
use crate::types::{AccountId, CallContext, PositionKey, TokenId};

impl<O: PriceOracle> Ledger<O> {
    /// Grow (or open) the position keyed by `(account, collateral_token, index_token, is_long)`
    /// by `size_delta`, using whatever collateral was transferred in since the last call.
    pub fn increase_position(
        &mut self,
        ctx: &CallContext,
        account: AccountId,
        collateral_token: TokenId,
        index_token: TokenId,
        size_delta: Usd,
        is_long: bool,
    ) -> Result<Position, LedgerError> {
        self.run("increase_position", |tx| {
            tx.ledger.validate_router(ctx, account)?;
            tx.ledger.validate_priority_fee(ctx)?;
            let key = PositionKey::new(account, collateral_token, index_token, is_long);
            tx.increase_position(key, size_delta)
        })
    }
}

impl<'a, O: PriceOracle> Tx<'a, O> {
    pub(super) fn increase_position(&mut self, key: PositionKey, size_delta: Usd) -> Result<Position, LedgerError> {
        if !self.config().is_leverage_enabled {
            return Err(LedgerError::LeverageDisabled);
        }
        let collateral_token = key.collateral_token;
        let index_token = key.index_token;
        let is_long = key.is_long();
        self.validate_tokens(collateral_token, index_token, is_long)?;
        self.accrue_funding(collateral_token)?;

        let mut position = self.position(&key).unwrap_or_default();
        let price = if is_long {
            self.max_price(index_token)?
        } else {
            self.min_price(index_token)?
        };

        // 8.7.1: entry price. existing pnl is read at the entry price with no min
        // profit window, so the merged position keeps it at every price
        if position.size.is_zero() {
            position.average_price = price;
        }
        if !position.size.is_zero() && !size_delta.is_zero() {
            let params = DeltaParams {
                now: self.now(),
                min_profit_time: 0,
                min_profit_bps: 0,
            };
            let (has_profit, delta) = get_delta(
                position.size,
                position.average_price,
                price,
                is_long,
                position.last_increased_time,
                params,
            )?;
            position.average_price =
                next_average_price(is_long, has_profit, delta, position.size, size_delta, price)?;
        }

        // 8.7.2: fees come out of the new collateral
        let fee = self.margin_fees(collateral_token, &position, size_delta)?;
        let collateral_delta = self.transfer_in(collateral_token)?;
        let collateral_delta_usd = self.token_to_usd_min(collateral_token, collateral_delta)?;

        position.collateral = position.collateral.checked_add(collateral_delta_usd)?;
        position.collateral = position
            .collateral
            .checked_sub(fee)
            .map_err(|_| LedgerError::InsufficientCollateralForFees)?;
        position.entry_funding_rate = self.pool(collateral_token)?.cumulative_funding_rate;
        position.size = position.size.checked_add(size_delta)?;
        position.last_increased_time = self.now();

        if position.size.is_zero() {
            return Err(LedgerError::ZeroSize);
        }
        if position.size < position.collateral {
            return Err(LedgerError::SizeLessThanCollateral);
        }
        self.check_liquidation(&key, &position, true)?;

        // 8.7.3: hold back enough collateral tokens to pay out the new size
        let reserve_delta = self.usd_to_token_max(collateral_token, size_delta)?;
        position.reserve_amount = checked_add(position.reserve_amount, reserve_delta)?;
        let fee_tokens = self.usd_to_token_min(collateral_token, fee)?;

        {
            let pool = self.pool_mut(collateral_token)?;
            pool.increase_reserved_amount(reserve_delta)?;
            pool.increase_pool_amount(collateral_delta)?;
            pool.collect_fee_from_pool(fee_tokens)?;
            if is_long {
                // pool now owes size minus what the trader put in
                pool.increase_guaranteed_usd(size_delta.checked_add(fee)?)?;
                pool.decrease_guaranteed_usd(collateral_delta_usd)?;
            }
        }

        if !is_long && !size_delta.is_zero() {
            let index_pool = self.pool_mut(index_token)?;
            index_pool.global_short_average_price = next_global_short_average_price(
                index_pool.global_short_size,
                index_pool.global_short_average_price,
                price,
                size_delta,
            )?;
            index_pool.increase_global_short_size(size_delta)?;
        }

        debug!(
            account = key.account.0,
            collateral = collateral_token.0,
            index = index_token.0,
            is_long,
            size = %position.size,
            collateral_usd = %position.collateral,
            "position increased"
        );

        self.emit_margin_fees(collateral_token, fee, fee_tokens);
        self.emit(EventPayload::IncreasePosition(IncreasePositionEvent {
            key,
            collateral_delta: collateral_delta_usd,
            size_delta,
            price,
            fee,
        }));
        self.emit(EventPayload::UpdatePosition(UpdatePositionEvent {
            key,
            size: position.size,
            collateral: position.collateral,
            average_price: position.average_price,
            entry_funding_rate: position.entry_funding_rate,
            reserve_amount: position.reserve_amount,
            realised_pnl: position.realised_pnl,
            mark_price: price,
        }));

        self.store_position(key, position);
        Ok(position)
    }
}
