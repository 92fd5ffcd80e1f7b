// 8.12 engine/config.rs: admin and role management. none of these move tokens, so
// they skip the staging in `run` and write straight through after validating.

use tracing::info;

use super::core::Ledger;
use super::results::LedgerError;
use crate::config::{LedgerConfig, TokenConfig};
use crate::events::{EventPayload, Role, RoleUpdatedEvent, RouterUpdatedEvent, TokenConfigUpdatedEvent};
use crate::liquidity::PoolState;
use crate::oracle::PriceOracle;
use crate::types::{AccountId, CallContext, TokenId};

impl<O: PriceOracle> Ledger<O> {
    /// Whitelist `token`, or replace its settings if already listed. Pool counters survive a
    /// reconfigure.
    pub fn set_token_config(&mut self, ctx: &CallContext, token: TokenId, config: TokenConfig) -> Result<(), LedgerError> {
        self.validate_admin(ctx)?;
        config.validate()?;
        if token == self.unit_of_account {
            return Err(LedgerError::InvalidToken(token));
        }

        let previous_weight = self.tokens.get(&token).map(|c| c.weight).unwrap_or(0);
        let total = self
            .total_token_weights
            .checked_sub(previous_weight)
            .and_then(|w| w.checked_add(config.weight))
            .ok_or(LedgerError::InvalidToken(token))?;

        info!(token = token.0, decimals = config.decimals, weight = config.weight, stable = config.is_stable, "token configured");
        self.total_token_weights = total;
        self.tokens.insert(token, config);
        self.pools.entry(token).or_insert_with(|| PoolState::new(token));
        self.emit_event(EventPayload::TokenConfigUpdated(TokenConfigUpdatedEvent {
            token,
            whitelisted: true,
        }));
        Ok(())
    }

    /// Drop `token` from the whitelist. Its pool row is kept so balances stay auditable.
    pub fn clear_token_config(&mut self, ctx: &CallContext, token: TokenId) -> Result<(), LedgerError> {
        self.validate_admin(ctx)?;
        let removed = self.tokens.remove(&token).ok_or(LedgerError::InvalidToken(token))?;
        self.total_token_weights = self.total_token_weights.saturating_sub(removed.weight);
        info!(token = token.0, "token cleared");
        self.emit_event(EventPayload::TokenConfigUpdated(TokenConfigUpdatedEvent {
            token,
            whitelisted: false,
        }));
        Ok(())
    }

    pub fn set_config(&mut self, ctx: &CallContext, config: LedgerConfig) -> Result<(), LedgerError> {
        self.validate_admin(ctx)?;
        config.validate()?;
        self.config = config;
        Ok(())
    }

    // 8.12.1: routers act on behalf of the account that approved them

    pub fn add_router(&mut self, ctx: &CallContext, router: AccountId) -> Result<(), LedgerError> {
        self.routers.entry(ctx.caller).or_default().insert(router);
        self.emit_event(EventPayload::RouterUpdated(RouterUpdatedEvent {
            account: ctx.caller,
            router,
            approved: true,
        }));
        Ok(())
    }

    pub fn remove_router(&mut self, ctx: &CallContext, router: AccountId) -> Result<(), LedgerError> {
        if let Some(set) = self.routers.get_mut(&ctx.caller) {
            set.remove(&router);
            if set.is_empty() {
                self.routers.remove(&ctx.caller);
            }
        }
        self.emit_event(EventPayload::RouterUpdated(RouterUpdatedEvent {
            account: ctx.caller,
            router,
            approved: false,
        }));
        Ok(())
    }

    pub fn is_router_approved(&self, account: AccountId, router: AccountId) -> bool {
        self.routers.get(&account).map(|set| set.contains(&router)).unwrap_or(false)
    }

    // 8.12.2: roles

    pub fn set_manager(&mut self, ctx: &CallContext, account: AccountId, active: bool) -> Result<(), LedgerError> {
        self.validate_admin(ctx)?;
        if active {
            self.managers.insert(account);
        } else {
            self.managers.remove(&account);
        }
        self.emit_event(EventPayload::RoleUpdated(RoleUpdatedEvent {
            role: Role::Manager,
            account,
            active,
        }));
        Ok(())
    }

    pub fn set_liquidator(&mut self, ctx: &CallContext, account: AccountId, active: bool) -> Result<(), LedgerError> {
        self.validate_admin(ctx)?;
        if active {
            self.liquidators.insert(account);
        } else {
            self.liquidators.remove(&account);
        }
        self.emit_event(EventPayload::RoleUpdated(RoleUpdatedEvent {
            role: Role::Liquidator,
            account,
            active,
        }));
        Ok(())
    }

    pub fn is_manager(&self, account: AccountId) -> bool {
        self.managers.contains(&account)
    }

    pub fn is_liquidator(&self, account: AccountId) -> bool {
        self.liquidators.contains(&account)
    }
}
