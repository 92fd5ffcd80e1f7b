// 8.0 engine/core.rs: the ledger aggregate. holds every pool, position, role and
// the token bank. all external operations run through `run`, which stages changes
// in a Tx and only commits when every invariant holds.

use ruint::aliases::U256;
use std::collections::{BTreeMap, HashMap, HashSet};
use tracing::{debug, info, warn};

use super::results::LedgerError;
use super::tx::{Staged, Tx};
use crate::config::{LedgerConfig, TokenConfig};
use crate::custody::{Holder, TokenBank};
use crate::events::{Event, EventId, EventPayload};
use crate::fixed::{token_to_usd, usd_to_token, Price, Usd};
use crate::liquidity::PoolState;
use crate::oracle::{PriceFeed, PriceOracle};
use crate::position::Position;
use crate::types::{AccountId, CallContext, PositionKey, Timestamp, TokenId};

/** 8.1: main ledger struct. all state lives here */
#[derive(Debug)]
pub struct Ledger<O: PriceOracle = PriceFeed> {
    pub(super) config: LedgerConfig,
    pub(super) admin: AccountId,
    pub(super) oracle: O,
    pub(super) bank: TokenBank,
    pub(super) unit_of_account: TokenId,
    // units of account the ledger has accounted for holding
    pub(super) unit_of_account_balance: U256,
    pub(super) tokens: BTreeMap<TokenId, TokenConfig>,
    pub(super) total_token_weights: u32,
    pub(super) pools: BTreeMap<TokenId, PoolState>,
    pub(super) positions: HashMap<PositionKey, Position>,
    // account -> routers it has approved
    pub(super) routers: HashMap<AccountId, HashSet<AccountId>>,
    pub(super) managers: HashSet<AccountId>,
    pub(super) liquidators: HashSet<AccountId>,
    pub(super) events: Vec<Event>,
    pub(super) next_event_id: u64,
    pub(super) current_time: Timestamp,
}

impl Ledger<PriceFeed> {
    pub fn with_price_feed(config: LedgerConfig, admin: AccountId, unit_of_account: TokenId) -> Result<Self, LedgerError> {
        Self::new(config, admin, unit_of_account, PriceFeed::default())
    }
}

impl<O: PriceOracle> Ledger<O> {
    pub fn new(config: LedgerConfig, admin: AccountId, unit_of_account: TokenId, oracle: O) -> Result<Self, LedgerError> {
        config.validate()?;
        Ok(Self {
            config,
            admin,
            oracle,
            bank: TokenBank::new(),
            unit_of_account,
            unit_of_account_balance: U256::ZERO,
            tokens: BTreeMap::new(),
            total_token_weights: 0,
            pools: BTreeMap::new(),
            positions: HashMap::new(),
            routers: HashMap::new(),
            managers: HashSet::new(),
            liquidators: HashSet::new(),
            events: Vec::new(),
            next_event_id: 1,
            current_time: Timestamp::default(),
        })
    }

    // 8.1.1: clock. explicit so runs are deterministic
    pub fn set_time(&mut self, timestamp: Timestamp) {
        self.current_time = timestamp;
        self.oracle.sync_time(timestamp);
    }

    pub fn time(&self) -> Timestamp {
        self.current_time
    }

    pub fn advance_time(&mut self, secs: u64) {
        self.set_time(Timestamp::from_secs(self.current_time.as_secs().saturating_add(secs)));
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    pub fn admin(&self) -> AccountId {
        self.admin
    }

    pub fn oracle(&self) -> &O {
        &self.oracle
    }

    pub fn oracle_mut(&mut self) -> &mut O {
        &mut self.oracle
    }

    pub fn bank(&self) -> &TokenBank {
        &self.bank
    }

    // tests and the simulator fund accounts through this. the ledger itself only
    // ever moves tokens on commit
    pub fn bank_mut(&mut self) -> &mut TokenBank {
        &mut self.bank
    }

    pub fn unit_of_account(&self) -> TokenId {
        self.unit_of_account
    }

    /// Send tokens from an account to the ledger ahead of a call that measures them.
    pub fn transfer_in(&mut self, from: AccountId, token: TokenId, amount: U256) -> Result<U256, LedgerError> {
        Ok(self.bank.transfer(token, Holder::Account(from), Holder::Ledger, amount)?)
    }

    pub fn token_config(&self, token: TokenId) -> Option<&TokenConfig> {
        self.tokens.get(&token)
    }

    pub fn is_whitelisted(&self, token: TokenId) -> bool {
        self.tokens.contains_key(&token)
    }

    pub fn total_token_weights(&self) -> u32 {
        self.total_token_weights
    }

    pub fn whitelisted_tokens(&self) -> impl Iterator<Item = TokenId> + '_ {
        self.tokens.keys().copied()
    }

    pub fn positions_iter(&self) -> impl Iterator<Item = (&PositionKey, &Position)> {
        self.positions.iter()
    }

    pub fn recent_events(&self, count: usize) -> &[Event] {
        let start = self.events.len().saturating_sub(count);
        &self.events[start..]
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    // 8.2: prices and conversions. zero prices are never acted on

    pub(super) fn checked_token(&self, token: TokenId) -> Result<&TokenConfig, LedgerError> {
        self.tokens.get(&token).ok_or(LedgerError::InvalidToken(token))
    }

    pub fn min_price(&self, token: TokenId) -> Result<Price, LedgerError> {
        let price = self.oracle.min_price(token)?;
        if price.is_zero() {
            return Err(LedgerError::InvalidPriceForExecution(token));
        }
        Ok(price)
    }

    pub fn max_price(&self, token: TokenId) -> Result<Price, LedgerError> {
        let price = self.oracle.max_price(token)?;
        if price.is_zero() {
            return Err(LedgerError::InvalidPriceForExecution(token));
        }
        Ok(price)
    }

    pub(super) fn decimals(&self, token: TokenId) -> Result<u8, LedgerError> {
        Ok(self.checked_token(token)?.decimals)
    }

    // value tokens low
    pub fn token_to_usd_min(&self, token: TokenId, amount: U256) -> Result<Usd, LedgerError> {
        Ok(token_to_usd(amount, self.min_price(token)?, self.decimals(token)?)?)
    }

    // fewest tokens for a usd amount
    pub fn usd_to_token_min(&self, token: TokenId, usd: Usd) -> Result<U256, LedgerError> {
        Ok(usd_to_token(usd, self.max_price(token)?, self.decimals(token)?)?)
    }

    // most tokens for a usd amount
    pub fn usd_to_token_max(&self, token: TokenId, usd: Usd) -> Result<U256, LedgerError> {
        Ok(usd_to_token(usd, self.min_price(token)?, self.decimals(token)?)?)
    }

    // 8.3: authorization

    pub(super) fn validate_router(&self, ctx: &CallContext, account: AccountId) -> Result<(), LedgerError> {
        if ctx.caller == account {
            return Ok(());
        }
        let approved = self
            .routers
            .get(&account)
            .map(|set| set.contains(&ctx.caller))
            .unwrap_or(false);
        if !approved {
            return Err(LedgerError::InvalidCaller(ctx.caller));
        }
        Ok(())
    }

    pub(super) fn validate_priority_fee(&self, ctx: &CallContext) -> Result<(), LedgerError> {
        let max = self.config.max_priority_fee;
        if max == 0 {
            return Ok(());
        }
        if ctx.priority_fee > max {
            return Err(LedgerError::PriorityFeeTooHigh { fee: ctx.priority_fee, max });
        }
        Ok(())
    }

    pub(super) fn validate_manager(&self, ctx: &CallContext) -> Result<(), LedgerError> {
        if self.config.in_manager_mode && !self.managers.contains(&ctx.caller) {
            return Err(LedgerError::InvalidCaller(ctx.caller));
        }
        Ok(())
    }

    pub(super) fn validate_liquidator(&self, ctx: &CallContext) -> Result<(), LedgerError> {
        if self.config.in_private_liquidation_mode && !self.liquidators.contains(&ctx.caller) {
            return Err(LedgerError::InvalidCaller(ctx.caller));
        }
        Ok(())
    }

    pub(super) fn validate_admin(&self, ctx: &CallContext) -> Result<(), LedgerError> {
        if ctx.caller != self.admin {
            return Err(LedgerError::InvalidCaller(ctx.caller));
        }
        Ok(())
    }

    // 8.4: the all-or-nothing wrapper every state changing call goes through
    pub(super) fn run<T>(
        &mut self,
        op: &'static str,
        body: impl FnOnce(&mut Tx<'_, O>) -> Result<T, LedgerError>,
    ) -> Result<T, LedgerError> {
        let outcome = {
            let mut tx = Tx::new(self);
            match body(&mut tx) {
                Ok(value) => tx.finish().map(|staged| (value, staged)),
                Err(e) => Err(e),
            }
        };

        match outcome {
            Ok((value, staged)) => {
                debug!(
                    op,
                    pools = staged.pools.len(),
                    positions = staged.positions.len(),
                    transfers = staged.transfers.len(),
                    "staged"
                );
                self.commit(staged);
                info!(op, time = self.current_time.as_secs(), "committed");
                Ok(value)
            }
            Err(e) => {
                warn!(op, error = %e, "rejected");
                Err(e)
            }
        }
    }

    fn commit(&mut self, staged: Staged) {
        let Staged {
            pools,
            positions,
            transfers: _,
            bank,
            unit_of_account_balance,
            events,
        } = staged;

        self.pools.extend(pools);
        for (key, row) in positions {
            match row {
                Some(position) => {
                    self.positions.insert(key, position);
                }
                None => {
                    self.positions.remove(&key);
                }
            }
        }
        self.bank = bank;
        if let Some(balance) = unit_of_account_balance {
            self.unit_of_account_balance = balance;
        }
        for payload in events {
            self.emit_event(payload);
        }
    }

    pub(super) fn emit_event(&mut self, payload: EventPayload) {
        let event = Event::new(EventId(self.next_event_id), self.current_time, payload);
        self.next_event_id += 1;

        if self.config.verbose {
            info!(id = event.id.0, kind = event.payload.kind(), "event");
        }

        self.events.push(event);

        if self.events.len() > self.config.max_events {
            let drain_count = self.events.len() - self.config.max_events;
            self.events.drain(0..drain_count);
        }
    }
}
