// 8.11 engine/liquidity_ops.rs: the liquidity side of the ledger. buying and
// selling the unit of account, direct deposits, fee withdrawal, funding pokes and
// the pool views that go with them.

use ruint::aliases::U256;
use tracing::{debug, info};

use super::core::Ledger;
use super::results::LedgerError;
use super::tx::Tx;
use crate::events::{
    BuyUnitOfAccountEvent, DirectPoolDepositEvent, EventPayload, FeesWithdrawnEvent, SellUnitOfAccountEvent,
};
use crate::fees::{target_amount, FeeCurve, WeightState};
use crate::fixed::{adjust_for_decimals, after_bps, checked_sub, mul_div, PRICE_PRECISION, UNIT_OF_ACCOUNT_DECIMALS};
use crate::funding;
use crate::liquidity::PoolState;
use crate::oracle::PriceOracle;
use crate::types::{AccountId, CallContext, TokenId};

impl<O: PriceOracle> Ledger<O> {
    /// Mint unit of account to `receiver` against the `token` transferred in.
    pub fn buy_unit_of_account(&mut self, ctx: &CallContext, token: TokenId, receiver: AccountId) -> Result<U256, LedgerError> {
        self.run("buy_unit_of_account", |tx| {
            tx.ledger.validate_manager(ctx)?;
            tx.ledger.validate_priority_fee(ctx)?;
            tx.buy_unit_of_account(token, receiver)
        })
    }

    /// Redeem the unit of account transferred in for `token`, paid to `receiver`.
    pub fn sell_unit_of_account(&mut self, ctx: &CallContext, token: TokenId, receiver: AccountId) -> Result<U256, LedgerError> {
        self.run("sell_unit_of_account", |tx| {
            tx.ledger.validate_manager(ctx)?;
            tx.ledger.validate_priority_fee(ctx)?;
            tx.sell_unit_of_account(token, receiver)
        })
    }

    /// Add the `token` transferred in to the pool without minting anything.
    pub fn direct_pool_deposit(&mut self, token: TokenId) -> Result<U256, LedgerError> {
        self.run("direct_pool_deposit", |tx| {
            tx.token(token)?;
            let amount = tx.transfer_in(token)?;
            if amount.is_zero() {
                return Err(LedgerError::ZeroAmount);
            }
            tx.pool_mut(token)?.increase_pool_amount(amount)?;
            tx.emit(EventPayload::DirectPoolDeposit(DirectPoolDepositEvent { token, amount }));
            Ok(amount)
        })
    }

    /// Pay out the whole fee reserve of `token`. Admin only.
    pub fn withdraw_fees(&mut self, ctx: &CallContext, token: TokenId, receiver: AccountId) -> Result<U256, LedgerError> {
        self.run("withdraw_fees", |tx| {
            tx.ledger.validate_admin(ctx)?;
            tx.ledger.validate_priority_fee(ctx)?;
            tx.token(token)?;
            let amount = tx.pool(token)?.fee_reserve;
            if amount.is_zero() {
                return Ok(U256::ZERO);
            }
            tx.pool_mut(token)?.withdraw_fee_reserve(amount)?;
            tx.pay(token, receiver, amount)?;
            tx.emit(EventPayload::FeesWithdrawn(FeesWithdrawnEvent { token, amount, receiver }));
            info!(token = token.0, amount = %amount, receiver = receiver.0, "fees withdrawn");
            Ok(amount)
        })
    }

    /// Accrue funding on `token` up to the current time. Anyone may call this.
    pub fn update_cumulative_funding_rate(&mut self, token: TokenId) -> Result<U256, LedgerError> {
        self.run("update_cumulative_funding_rate", |tx| {
            tx.accrue_funding(token)?;
            Ok(tx.pool(token)?.cumulative_funding_rate)
        })
    }

    // 8.11.1: views

    pub fn pool(&self, token: TokenId) -> Option<&PoolState> {
        self.pools.get(&token)
    }

    pub fn pools(&self) -> impl Iterator<Item = &PoolState> {
        self.pools.values()
    }

    /// Funding rate the next accrual on `token` would add.
    pub fn next_funding_rate(&self, token: TokenId) -> Result<U256, LedgerError> {
        let config = self.checked_token(token)?;
        let pool = self.pools.get(&token).ok_or(LedgerError::InvalidToken(token))?;
        Ok(funding::next_funding_rate(
            pool,
            self.current_time,
            &self.config.funding,
            config.is_stable,
        )?)
    }

    /// reserved / pool for `token`, scaled by 1_000_000.
    pub fn utilization(&self, token: TokenId) -> Result<U256, LedgerError> {
        let pool = self.pools.get(&token).ok_or(LedgerError::InvalidToken(token))?;
        Ok(pool.utilization())
    }

    /// Tokens `uoa_amount` of unit of account would redeem for, before fees.
    pub fn redemption_amount(&self, token: TokenId, uoa_amount: U256) -> Result<U256, LedgerError> {
        let tx = Tx::new(self);
        tx.redemption_amount(token, uoa_amount)
    }

    /// Unit of account `token` should back at its configured weight.
    pub fn target_unit_of_account_amount(&self, token: TokenId) -> Result<U256, LedgerError> {
        let tx = Tx::new(self);
        Ok(tx.weight_state(token)?.target)
    }

    /// Mint/burn fee in bps for moving `token`'s issuance by `uoa_delta`.
    pub fn fee_basis_points(&self, token: TokenId, uoa_delta: U256, increment: bool) -> Result<u32, LedgerError> {
        let tx = Tx::new(self);
        let curve = FeeCurve::mint_burn(&self.config.fees);
        Ok(curve.basis_points(tx.weight_state(token)?, uoa_delta, increment)?)
    }
}

impl<'a, O: PriceOracle> Tx<'a, O> {
    /// Issued unit of account against `token` next to its target share of supply.
    pub(super) fn weight_state(&self, token: TokenId) -> Result<WeightState, LedgerError> {
        let weight = self.token(token)?.weight;
        let supply = self.unit_of_account_supply()?;
        let target = target_amount(supply, weight, self.ledger.total_token_weights)?;
        Ok(WeightState {
            issued: self.pool(token)?.unit_of_account_issued,
            target,
        })
    }

    fn redemption_amount(&self, token: TokenId, uoa_amount: U256) -> Result<U256, LedgerError> {
        let price = self.max_price(token)?;
        let decimals = self.token(token)?.decimals;
        let raw = mul_div(uoa_amount, PRICE_PRECISION, price.raw())?;
        Ok(adjust_for_decimals(raw, UNIT_OF_ACCOUNT_DECIMALS, decimals)?)
    }

    fn buy_unit_of_account(&mut self, token: TokenId, receiver: AccountId) -> Result<U256, LedgerError> {
        let config = self.token(token)?;
        self.accrue_funding(token)?;

        let amount = self.transfer_in(token)?;
        if amount.is_zero() {
            return Err(LedgerError::ZeroAmount);
        }

        // 8.11.2: deposits are valued at the min price
        let price = self.min_price(token)?;
        let raw = mul_div(amount, price.raw(), PRICE_PRECISION)?;
        let uoa_amount = adjust_for_decimals(raw, config.decimals, UNIT_OF_ACCOUNT_DECIMALS)?;
        if uoa_amount.is_zero() {
            return Err(LedgerError::ZeroAmount);
        }

        let curve = FeeCurve::mint_burn(&self.config().fees);
        let fee_bps = curve.basis_points(self.weight_state(token)?, uoa_amount, true)?;
        let after_fee = after_bps(amount, fee_bps)?;
        let fee_tokens = checked_sub(amount, after_fee)?;

        let raw_mint = mul_div(after_fee, price.raw(), PRICE_PRECISION)?;
        let minted = adjust_for_decimals(raw_mint, config.decimals, UNIT_OF_ACCOUNT_DECIMALS)?;

        {
            let pool = self.pool_mut(token)?;
            pool.increase_fee_reserve(fee_tokens)?;
            pool.issue_unit_of_account(minted, config.max_unit_of_account_amount)?;
            pool.increase_pool_amount(after_fee)?;
        }
        self.mint_unit_of_account(receiver, minted);

        self.emit(EventPayload::BuyUnitOfAccount(BuyUnitOfAccountEvent {
            receiver,
            token,
            token_amount: amount,
            minted,
            fee_bps,
        }));
        debug!(token = token.0, amount = %amount, minted = %minted, fee_bps, "unit of account bought");
        Ok(minted)
    }

    fn sell_unit_of_account(&mut self, token: TokenId, receiver: AccountId) -> Result<U256, LedgerError> {
        self.token(token)?;
        self.accrue_funding(token)?;

        let uoa_amount = self.transfer_in_unit_of_account()?;
        if uoa_amount.is_zero() {
            return Err(LedgerError::ZeroAmount);
        }

        let redemption = self.redemption_amount(token, uoa_amount)?;
        if redemption.is_zero() {
            return Err(LedgerError::ZeroAmount);
        }

        {
            let pool = self.pool_mut(token)?;
            pool.retire_unit_of_account(uoa_amount);
            pool.decrease_pool_amount(redemption)?;
        }
        self.burn_unit_of_account(uoa_amount)?;

        // 8.11.3: fee is priced on the state after the burn
        let curve = FeeCurve::mint_burn(&self.config().fees);
        let fee_bps = curve.basis_points(self.weight_state(token)?, uoa_amount, false)?;
        let amount_out = after_bps(redemption, fee_bps)?;
        if amount_out.is_zero() {
            return Err(LedgerError::ZeroAmount);
        }
        self.pool_mut(token)?.increase_fee_reserve(checked_sub(redemption, amount_out)?)?;
        self.pay(token, receiver, amount_out)?;

        self.emit(EventPayload::SellUnitOfAccount(SellUnitOfAccountEvent {
            receiver,
            token,
            burned: uoa_amount,
            token_amount: amount_out,
            fee_bps,
        }));
        debug!(token = token.0, burned = %uoa_amount, amount_out = %amount_out, fee_bps, "unit of account sold");
        Ok(amount_out)
    }
}
