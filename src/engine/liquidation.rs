// 8.9 engine/liquidation.rs: close out positions that can no longer carry their losses.
// liquidatable rows are wiped and the pool keeps the collateral. over-leveraged rows
// are closed through the normal decrease path so the owner gets what is left.

use ruint::aliases::U256;
use tracing::{info, warn};

use super::core::Ledger;
use super::results::{LedgerError, LiquidationResult};
use super::tx::Tx;
use crate::events::{EventPayload, LiquidatePositionEvent};
use crate::fixed::Usd;
use crate::oracle::PriceOracle;
use crate::position::LiquidationState;
use crate::types::{AccountId, CallContext, PositionKey, TokenId};

impl<O: PriceOracle> Ledger<O> {
    /// Liquidate a position, paying the flat liquidation fee to `fee_receiver`.
    /// Healthy positions are rejected.
    pub fn liquidate_position(
        &mut self,
        ctx: &CallContext,
        account: AccountId,
        collateral_token: TokenId,
        index_token: TokenId,
        is_long: bool,
        fee_receiver: AccountId,
    ) -> Result<LiquidationResult, LedgerError> {
        self.run("liquidate_position", |tx| {
            tx.ledger.validate_liquidator(ctx)?;
            tx.ledger.validate_priority_fee(ctx)?;
            let key = PositionKey::new(account, collateral_token, index_token, is_long);
            tx.liquidate_position(key, fee_receiver)
        })
    }
}

impl<'a, O: PriceOracle> Tx<'a, O> {
    fn liquidate_position(&mut self, key: PositionKey, fee_receiver: AccountId) -> Result<LiquidationResult, LedgerError> {
        let collateral_token = key.collateral_token;
        self.accrue_funding(collateral_token)?;

        let position = self.existing_position(&key)?;
        let (state, margin_fees) = self.check_liquidation(&key, &position, false)?;

        match state {
            LiquidationState::Healthy => Err(LedgerError::PositionCannotBeLiquidated),
            LiquidationState::OverLeveraged => {
                // 8.9.1: soft liquidation, close in full and return what remains to the owner
                warn!(account = key.account.0, size = %position.size, "closing over-leveraged position");
                let amount_out = self.decrease_position(key, Usd::ZERO, position.size, key.account)?;
                Ok(LiquidationResult {
                    key,
                    state,
                    margin_fees,
                    liquidation_fee_tokens: U256::ZERO,
                    amount_out,
                })
            }
            LiquidationState::Liquidatable => {
                // 8.9.2: the pool takes the fees, then the collateral, then pays the liquidator
                let fee_tokens = self.usd_to_token_min(collateral_token, margin_fees)?;
                let liquidation_fee = self.config().fees.liquidation_fee()?;
                let liquidation_fee_tokens = self.usd_to_token_min(collateral_token, liquidation_fee)?;
                let mark_price = if key.is_long() {
                    self.min_price(key.index_token)?
                } else {
                    self.max_price(key.index_token)?
                };

                {
                    let pool = self.pool_mut(collateral_token)?;
                    pool.decrease_reserved_amount(position.reserve_amount)?;
                    pool.collect_fee_from_pool(fee_tokens)?;
                    if key.is_long() {
                        pool.decrease_guaranteed_usd(position.size.checked_sub(position.collateral)?)?;
                    }
                }
                self.emit_margin_fees(collateral_token, margin_fees, fee_tokens);
                if !key.is_long() {
                    self.pool_mut(key.index_token)?.decrease_global_short_size(position.size);
                }

                self.emit(EventPayload::LiquidatePosition(LiquidatePositionEvent {
                    key,
                    state,
                    size: position.size,
                    collateral: position.collateral,
                    reserve_amount: position.reserve_amount,
                    realised_pnl: position.realised_pnl,
                    mark_price,
                    fee_receiver,
                }));
                self.remove_position(key);

                self.pool_mut(collateral_token)?.decrease_pool_amount(liquidation_fee_tokens)?;
                self.pay(collateral_token, fee_receiver, liquidation_fee_tokens)?;

                info!(
                    account = key.account.0,
                    size = %position.size,
                    collateral = %position.collateral,
                    fee_tokens = %liquidation_fee_tokens,
                    "position liquidated"
                );
                Ok(LiquidationResult {
                    key,
                    state,
                    margin_fees,
                    liquidation_fee_tokens,
                    amount_out: U256::ZERO,
                })
            }
        }
    }
}
