// 8.8 engine/decrease.rs: shrink or close a position and pay out.
// realized pnl settles against the pool, fees come off the payout when it covers
// them and out of remaining collateral otherwise.

use ruint::aliases::U256;
use tracing::debug;

use super::core::Ledger;
use super::results::LedgerError;
use super::tx::Tx;
use crate::events::{
    side_label, ClosePositionEvent, DecreasePositionEvent, EventPayload, UpdatePnlEvent, UpdatePositionEvent,
};
use crate::fixed::{checked_sub, mul_div, Usd};
use crate::oracle::PriceOracle;
use crate::position::Position;
use crate::types::{AccountId, CallContext, PositionKey, TokenId};

impl<O: PriceOracle> Ledger<O> {
    /// Take `collateral_delta` out of and cut `size_delta` off a position, paying
    /// the resulting collateral tokens to `receiver`. Returns the amount paid.
    #[allow(clippy::too_many_arguments)]
    pub fn decrease_position(
        &mut self,
        ctx: &CallContext,
        account: AccountId,
        collateral_token: TokenId,
        index_token: TokenId,
        collateral_delta: Usd,
        size_delta: Usd,
        is_long: bool,
        receiver: AccountId,
    ) -> Result<U256, LedgerError> {
        self.run("decrease_position", |tx| {
            tx.ledger.validate_router(ctx, account)?;
            tx.ledger.validate_priority_fee(ctx)?;
            let key = PositionKey::new(account, collateral_token, index_token, is_long);
            tx.decrease_position(key, collateral_delta, size_delta, receiver)
        })
    }
}

impl<'a, O: PriceOracle> Tx<'a, O> {
    pub(super) fn decrease_position(
        &mut self,
        key: PositionKey,
        collateral_delta: Usd,
        size_delta: Usd,
        receiver: AccountId,
    ) -> Result<U256, LedgerError> {
        let collateral_token = key.collateral_token;
        let is_long = key.is_long();
        self.accrue_funding(collateral_token)?;

        let mut position = self.existing_position(&key)?;
        if size_delta > position.size {
            return Err(LedgerError::PositionSizeExceeded);
        }
        if collateral_delta > position.collateral {
            return Err(LedgerError::CollateralDeltaExceeded);
        }
        let collateral_before = position.collateral;
        let closing = size_delta == position.size;

        // 8.8.1: release the share of the reservation this cut backs
        let reserve_delta = mul_div(position.reserve_amount, size_delta.raw(), position.size.raw())?;
        position.reserve_amount = checked_sub(position.reserve_amount, reserve_delta)?;
        self.pool_mut(collateral_token)?.decrease_reserved_amount(reserve_delta)?;

        let (usd_out, usd_out_after_fee, fee) =
            self.reduce_collateral(&key, &mut position, collateral_delta, size_delta, closing)?;

        // 8.8.2: payout. whatever of usd_out the trader doesn't receive is fee
        let mut amount_out = U256::ZERO;
        if !usd_out.is_zero() {
            let gross = self.usd_to_token_min(collateral_token, usd_out)?;
            amount_out = self.usd_to_token_min(collateral_token, usd_out_after_fee)?;
            let fee_tokens = checked_sub(gross, amount_out)?;
            {
                let pool = self.pool_mut(collateral_token)?;
                pool.decrease_pool_amount(gross)?;
                pool.increase_fee_reserve(fee_tokens)?;
            }
            if usd_out > fee {
                self.emit_margin_fees(collateral_token, fee, fee_tokens);
            }
            self.pay(collateral_token, receiver, amount_out)?;
        }

        let price = if is_long {
            self.min_price(key.index_token)?
        } else {
            self.max_price(key.index_token)?
        };
        let decrease_event = DecreasePositionEvent {
            key,
            collateral_delta,
            size_delta,
            price,
            fee,
            amount_out,
            receiver,
        };

        if closing {
            if is_long {
                let pool = self.pool_mut(collateral_token)?;
                pool.increase_guaranteed_usd(collateral_before)?;
                pool.decrease_guaranteed_usd(size_delta)?;
            }
            self.emit(EventPayload::DecreasePosition(decrease_event));
            self.emit(EventPayload::ClosePosition(ClosePositionEvent {
                key,
                size: position.size,
                collateral: collateral_before,
                average_price: position.average_price,
                realised_pnl: position.realised_pnl,
            }));
            self.remove_position(key);
        } else {
            position.entry_funding_rate = self.pool(collateral_token)?.cumulative_funding_rate;
            position.size = position.size.checked_sub(size_delta)?;
            if position.size < position.collateral {
                return Err(LedgerError::SizeLessThanCollateral);
            }
            self.check_liquidation(&key, &position, true)?;

            if is_long {
                let pool = self.pool_mut(collateral_token)?;
                pool.increase_guaranteed_usd(collateral_before.checked_sub(position.collateral)?)?;
                pool.decrease_guaranteed_usd(size_delta)?;
            }
            self.emit(EventPayload::DecreasePosition(decrease_event));
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
        }

        if !is_long {
            self.pool_mut(key.index_token)?.decrease_global_short_size(size_delta);
        }

        debug!(
            account = key.account.0,
            side = side_label(key.side),
            size_delta = %size_delta,
            closing,
            amount_out = %amount_out,
            "position decreased"
        );
        Ok(amount_out)
    }

    // 8.8.3: realize pnl on the cut and work out what leaves the position.
    // returns (usd out before fees, usd out after fees, fee)
    fn reduce_collateral(
        &mut self,
        key: &PositionKey,
        position: &mut Position,
        collateral_delta: Usd,
        size_delta: Usd,
        closing: bool,
    ) -> Result<(Usd, Usd, Usd), LedgerError> {
        let collateral_token = key.collateral_token;
        let fee = self.margin_fees(collateral_token, position, size_delta)?;

        let (has_profit, delta) = self.position_delta(key, position)?;
        let adjusted_delta = delta.mul_ratio(size_delta, position.size)?;

        let mut usd_out = Usd::ZERO;
        if !adjusted_delta.is_zero() {
            if has_profit {
                usd_out = adjusted_delta;
                position.realised_pnl = position.realised_pnl.add_profit(adjusted_delta)?;
            } else {
                position.collateral = position
                    .collateral
                    .checked_sub(adjusted_delta)
                    .map_err(|_| LedgerError::LossesExceedCollateral)?;
                position.realised_pnl = position.realised_pnl.add_loss(adjusted_delta)?;
            }
        }
        self.emit(EventPayload::UpdatePnl(UpdatePnlEvent {
            key: *key,
            has_profit,
            delta: adjusted_delta,
        }));

        if !collateral_delta.is_zero() {
            usd_out = usd_out.checked_add(collateral_delta)?;
            position.collateral = position
                .collateral
                .checked_sub(collateral_delta)
                .map_err(|_| LedgerError::CollateralDeltaExceeded)?;
        }
        if closing {
            usd_out = usd_out.checked_add(position.collateral)?;
            position.collateral = Usd::ZERO;
        }

        if usd_out > fee {
            return Ok((usd_out, usd_out.checked_sub(fee)?, fee));
        }

        // payout too small: the fee comes out of what stays in the position
        position.collateral = position
            .collateral
            .checked_sub(fee)
            .map_err(|_| LedgerError::InsufficientCollateralForFees)?;
        let fee_tokens = self.usd_to_token_min(collateral_token, fee)?;
        self.pool_mut(collateral_token)?.collect_fee_from_pool(fee_tokens)?;
        self.emit_margin_fees(collateral_token, fee, fee_tokens);
        Ok((usd_out, usd_out, fee))
    }
}
