// 8.10 engine/swap.rs: token to token swaps against the pool.
// token_in is valued at its min price and token_out at its max, so the pool never
// hands out more value than it takes in. fees stay behind in token_out.

use ruint::aliases::U256;
use tracing::debug;

use super::core::Ledger;
use super::results::LedgerError;
use super::tx::Tx;
use crate::events::{CollectSwapFeesEvent, EventPayload, SwapEvent};
use crate::fees::{self, FeeCurve};
use crate::fixed::{adjust_for_decimals, after_bps, checked_sub, mul_div, PRICE_PRECISION, UNIT_OF_ACCOUNT_DECIMALS};
use crate::oracle::PriceOracle;
use crate::types::{AccountId, CallContext, TokenId};

impl<O: PriceOracle> Ledger<O> {
    /// Swap whatever `token_in` was transferred in for `token_out`, paid to `receiver`.
    pub fn swap(
        &mut self,
        ctx: &CallContext,
        token_in: TokenId,
        token_out: TokenId,
        receiver: AccountId,
    ) -> Result<U256, LedgerError> {
        debug!(caller = ctx.caller.0, token_in = token_in.0, token_out = token_out.0, "swap requested");
        self.run("swap", |tx| {
            tx.ledger.validate_priority_fee(ctx)?;
            tx.swap(token_in, token_out, receiver)
        })
    }

    /// Fee in bps a swap moving `uoa_amount` of value from `token_in` to `token_out` would pay.
    pub fn swap_fee_basis_points(&self, token_in: TokenId, token_out: TokenId, uoa_amount: U256) -> Result<u32, LedgerError> {
        let tx = Tx::new(self);
        tx.swap_fee_bps(token_in, token_out, uoa_amount)
    }
}

impl<'a, O: PriceOracle> Tx<'a, O> {
    fn swap_fee_bps(&self, token_in: TokenId, token_out: TokenId, uoa_amount: U256) -> Result<u32, LedgerError> {
        let both_stable = self.token(token_in)?.is_stable && self.token(token_out)?.is_stable;
        let curve = FeeCurve::swap(&self.config().fees, both_stable);
        Ok(fees::swap_fee_basis_points(
            curve,
            self.weight_state(token_in)?,
            self.weight_state(token_out)?,
            uoa_amount,
        )?)
    }

    fn swap(&mut self, token_in: TokenId, token_out: TokenId, receiver: AccountId) -> Result<U256, LedgerError> {
        if !self.config().is_swap_enabled {
            return Err(LedgerError::SwapsDisabled);
        }
        if token_in == token_out || !self.ledger.is_whitelisted(token_in) || !self.ledger.is_whitelisted(token_out) {
            return Err(LedgerError::InvalidTokens(token_in, token_out));
        }
        self.accrue_funding(token_in)?;
        self.accrue_funding(token_out)?;

        let amount_in = self.transfer_in(token_in)?;
        if amount_in.is_zero() {
            return Err(LedgerError::ZeroAmount);
        }

        // 8.10.1: value the input low and the output high
        let price_in = self.min_price(token_in)?;
        let price_out = self.max_price(token_out)?;
        let decimals_in = self.token(token_in)?.decimals;
        let decimals_out = self.token(token_out)?.decimals;

        let raw_out = mul_div(amount_in, price_in.raw(), price_out.raw())?;
        let amount_out = adjust_for_decimals(raw_out, decimals_in, decimals_out)?;
        let raw_uoa = mul_div(amount_in, price_in.raw(), PRICE_PRECISION)?;
        let uoa_amount = adjust_for_decimals(raw_uoa, decimals_in, UNIT_OF_ACCOUNT_DECIMALS)?;

        // 8.10.2: fee is taken in token_out and stays in its fee reserve
        let fee_bps = self.swap_fee_bps(token_in, token_out, uoa_amount)?;
        let amount_out_after_fees = after_bps(amount_out, fee_bps)?;
        let fee_tokens = checked_sub(amount_out, amount_out_after_fees)?;

        let max_issued = self.token(token_in)?.max_unit_of_account_amount;
        let buffer = self.token(token_out)?.buffer_amount;
        {
            let pool_in = self.pool_mut(token_in)?;
            pool_in.issue_unit_of_account(uoa_amount, max_issued)?;
            pool_in.increase_pool_amount(amount_in)?;
        }
        {
            let pool_out = self.pool_mut(token_out)?;
            pool_out.retire_unit_of_account(uoa_amount);
            pool_out.decrease_pool_amount(amount_out)?;
            pool_out.increase_fee_reserve(fee_tokens)?;
            pool_out.check_buffer(buffer)?;
        }

        self.pay(token_out, receiver, amount_out_after_fees)?;

        let fee_usd = self.token_to_usd_min(token_out, fee_tokens)?;
        self.emit(EventPayload::Swap(SwapEvent {
            receiver,
            token_in,
            token_out,
            amount_in,
            amount_out,
            amount_out_after_fees,
            fee_bps,
        }));
        if !fee_tokens.is_zero() {
            self.emit(EventPayload::CollectSwapFees(CollectSwapFeesEvent {
                token: token_out,
                fee_usd,
                fee_tokens,
            }));
        }

        debug!(
            amount_in = %amount_in,
            amount_out = %amount_out_after_fees,
            fee_bps,
            "swap filled"
        );
        Ok(amount_out_after_fees)
    }
}
