// 8.5 engine/tx.rs: staging area for one operation.
// reads fall through to the ledger, writes land on copies. nothing is visible
// until `finish` has checked solvency and the ledger commits the result.

use ruint::aliases::U256;
use std::collections::{BTreeMap, HashMap};
use tracing::debug;

use super::core::Ledger;
use super::results::LedgerError;
use crate::config::{LedgerConfig, TokenConfig};
use crate::custody::{Holder, TokenBank, TransferOp};
use crate::events::{EventCollector, EventPayload, UpdateFundingRateEvent};
use crate::fixed::{checked_add, checked_sub, Price, Usd};
use crate::funding;
use crate::liquidity::PoolState;
use crate::oracle::PriceOracle;
use crate::position::Position;
use crate::types::{AccountId, PositionKey, Timestamp, TokenId};

/// Everything an operation changed, ready to swap into the ledger.
#[derive(Debug)]
pub(super) struct Staged {
    pub(super) pools: BTreeMap<TokenId, PoolState>,
    pub(super) positions: HashMap<PositionKey, Option<Position>>,
    pub(super) transfers: Vec<TransferOp>,
    pub(super) bank: TokenBank,
    pub(super) unit_of_account_balance: Option<U256>,
    pub(super) events: Vec<EventPayload>,
}

pub(super) struct Tx<'a, O: PriceOracle> {
    pub(super) ledger: &'a Ledger<O>,
    pools: BTreeMap<TokenId, PoolState>,
    positions: HashMap<PositionKey, Option<Position>>,
    transfers: Vec<TransferOp>,
    unit_of_account_balance: Option<U256>,
    events: EventCollector,
}

impl<'a, O: PriceOracle> Tx<'a, O> {
    pub(super) fn new(ledger: &'a Ledger<O>) -> Self {
        Self {
            ledger,
            pools: BTreeMap::new(),
            positions: HashMap::new(),
            transfers: Vec::new(),
            unit_of_account_balance: None,
            events: EventCollector::new(),
        }
    }

    pub(super) fn now(&self) -> Timestamp {
        self.ledger.current_time
    }

    pub(super) fn config(&self) -> &'a LedgerConfig {
        &self.ledger.config
    }

    pub(super) fn token(&self, token: TokenId) -> Result<&'a TokenConfig, LedgerError> {
        self.ledger.checked_token(token)
    }

    // 8.5.1: pool state. first write clones the committed row

    pub(super) fn pool(&self, token: TokenId) -> Result<&PoolState, LedgerError> {
        if let Some(p) = self.pools.get(&token) {
            return Ok(p);
        }
        self.ledger.pools.get(&token).ok_or(LedgerError::InvalidToken(token))
    }

    pub(super) fn pool_mut(&mut self, token: TokenId) -> Result<&mut PoolState, LedgerError> {
        if !self.pools.contains_key(&token) {
            let committed = self
                .ledger
                .pools
                .get(&token)
                .cloned()
                .ok_or(LedgerError::InvalidToken(token))?;
            self.pools.insert(token, committed);
        }
        self.pools.get_mut(&token).ok_or(LedgerError::InvalidToken(token))
    }

    // 8.5.2: positions. None in the overlay means deleted

    pub(super) fn position(&self, key: &PositionKey) -> Option<Position> {
        match self.positions.get(key) {
            Some(staged) => *staged,
            None => self.ledger.positions.get(key).copied(),
        }
    }

    pub(super) fn store_position(&mut self, key: PositionKey, position: Position) {
        self.positions.insert(key, Some(position));
    }

    pub(super) fn remove_position(&mut self, key: PositionKey) {
        self.positions.insert(key, None);
    }

    // 8.5.3: prices, read straight from the oracle

    pub(super) fn min_price(&self, token: TokenId) -> Result<Price, LedgerError> {
        self.ledger.min_price(token)
    }

    pub(super) fn max_price(&self, token: TokenId) -> Result<Price, LedgerError> {
        self.ledger.max_price(token)
    }

    pub(super) fn token_to_usd_min(&self, token: TokenId, amount: U256) -> Result<Usd, LedgerError> {
        self.ledger.token_to_usd_min(token, amount)
    }

    pub(super) fn usd_to_token_min(&self, token: TokenId, usd: Usd) -> Result<U256, LedgerError> {
        self.ledger.usd_to_token_min(token, usd)
    }

    pub(super) fn usd_to_token_max(&self, token: TokenId, usd: Usd) -> Result<U256, LedgerError> {
        self.ledger.usd_to_token_max(token, usd)
    }

    // 8.5.4: custody. inflows are measured, outflows are queued

    /// Amount of `token` that arrived since the ledger last accounted for its balance.
    pub(super) fn transfer_in(&mut self, token: TokenId) -> Result<U256, LedgerError> {
        let custody = self.ledger.bank.balance_of(token, Holder::Ledger);
        let pool = self.pool_mut(token)?;
        let received = pool.pending_inflow(custody)?;
        pool.token_balance = custody;
        Ok(received)
    }

    pub(super) fn transfer_in_unit_of_account(&mut self) -> Result<U256, LedgerError> {
        let token = self.ledger.unit_of_account;
        let custody = self.ledger.bank.balance_of(token, Holder::Ledger);
        let recorded = self.unit_of_account_balance.unwrap_or(self.ledger.unit_of_account_balance);
        let received = checked_sub(custody, recorded)?;
        self.unit_of_account_balance = Some(custody);
        Ok(received)
    }

    pub(super) fn pay(&mut self, token: TokenId, to: AccountId, amount: U256) -> Result<(), LedgerError> {
        // touch the pool so finish reconciles its balance
        self.pool_mut(token)?;
        if !amount.is_zero() {
            self.transfers.push(TransferOp::Pay { token, to, amount });
        }
        Ok(())
    }

    pub(super) fn mint_unit_of_account(&mut self, to: AccountId, amount: U256) {
        if !amount.is_zero() {
            let token = self.ledger.unit_of_account;
            self.transfers.push(TransferOp::Mint { token, to, amount });
        }
    }

    pub(super) fn burn_unit_of_account(&mut self, amount: U256) -> Result<(), LedgerError> {
        let token = self.ledger.unit_of_account;
        let recorded = self.unit_of_account_balance.unwrap_or(self.ledger.unit_of_account_balance);
        self.unit_of_account_balance = Some(checked_sub(recorded, amount)?);
        if !amount.is_zero() {
            self.transfers.push(TransferOp::Burn { token, amount });
        }
        Ok(())
    }

    /// Supply of the unit of account once this operation's mints and burns land.
    pub(super) fn unit_of_account_supply(&self) -> Result<U256, LedgerError> {
        let token = self.ledger.unit_of_account;
        let mut supply = self.ledger.bank.total_supply(token);
        for op in &self.transfers {
            match op {
                TransferOp::Mint { token: t, amount, .. } if *t == token => supply = checked_add(supply, *amount)?,
                TransferOp::Burn { token: t, amount } if *t == token => supply = supply.saturating_sub(*amount),
                _ => {}
            }
        }
        Ok(supply)
    }

    pub(super) fn emit(&mut self, payload: EventPayload) {
        self.events.emit(payload);
    }

    // 8.5.5: funding
    pub(super) fn accrue_funding(&mut self, token: TokenId) -> Result<(), LedgerError> {
        let is_stable = self.token(token)?.is_stable;
        let now = self.now();
        let ledger = self.ledger;
        let funding_config = &ledger.config.funding;
        let pool = self.pool_mut(token)?;
        let rate = funding::update_cumulative_funding_rate(pool, now, funding_config, is_stable)?;
        if !rate.is_zero() {
            let cumulative = pool.cumulative_funding_rate;
            debug!(token = token.0, added = %rate, cumulative = %cumulative, "funding accrued");
            self.emit(EventPayload::UpdateFundingRate(UpdateFundingRateEvent {
                token,
                cumulative_funding_rate: cumulative,
            }));
        }
        Ok(())
    }

    // 8.5.6: apply queued transfers to a copy of the bank, then check every touched
    // token: pool + fee reserve equals what the ledger holds, reserve within pool.
    pub(super) fn finish(self) -> Result<Staged, LedgerError> {
        let Tx {
            ledger,
            mut pools,
            positions,
            transfers,
            unit_of_account_balance,
            events,
        } = self;

        let mut bank = ledger.bank.clone();
        let mut outflows: BTreeMap<TokenId, U256> = BTreeMap::new();
        for op in &transfers {
            bank.apply(op)?;
            let out = op.ledger_outflow();
            if !out.is_zero() && op.token() != ledger.unit_of_account {
                let total = outflows.entry(op.token()).or_insert(U256::ZERO);
                *total = checked_add(*total, out)?;
            }
        }

        for (token, pool) in pools.iter_mut() {
            let out = outflows.remove(token).unwrap_or(U256::ZERO);
            pool.token_balance = pool
                .token_balance
                .checked_sub(out)
                .ok_or(LedgerError::SolvencyViolation(*token))?;
            pool.check_solvency(pool.token_balance)?;
            if pool.token_balance > bank.balance_of(*token, Holder::Ledger) {
                return Err(LedgerError::SolvencyViolation(*token));
            }
        }
        // a payout in a token whose pool was never staged
        if let Some((token, _)) = outflows.into_iter().next() {
            return Err(LedgerError::SolvencyViolation(token));
        }

        for row in positions.values().flatten() {
            if row.size.is_zero() {
                return Err(LedgerError::ZeroSize);
            }
            if row.size < row.collateral {
                return Err(LedgerError::SizeLessThanCollateral);
            }
        }

        if let Some(balance) = unit_of_account_balance {
            if balance > bank.balance_of(ledger.unit_of_account, Holder::Ledger) {
                return Err(LedgerError::SolvencyViolation(ledger.unit_of_account));
            }
        }

        Ok(Staged {
            pools,
            positions,
            transfers,
            bank,
            unit_of_account_balance,
            events: events.drain(),
        })
    }
}
