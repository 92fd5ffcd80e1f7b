// 11.0: every committed operation produces events. used for audit trails and
// notifying external systems. rejected operations produce none.
// the EventPayload enum lists all event types.

use ruint::aliases::U256;
use serde::{Deserialize, Serialize};

use crate::fixed::{Price, SignedUsd, Usd};
use crate::position::LiquidationState;
use crate::types::{AccountId, PositionKey, Side, Timestamp, TokenId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EventId(pub u64);

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: EventId,
    pub timestamp: Timestamp,
    pub payload: EventPayload,
}

impl Event {
    pub fn new(id: EventId, timestamp: Timestamp, payload: EventPayload) -> Self {
        Self {
            id,
            timestamp,
            payload,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum EventPayload {
    // Position events
    IncreasePosition(IncreasePositionEvent),
    DecreasePosition(DecreasePositionEvent),
    UpdatePosition(UpdatePositionEvent),
    ClosePosition(ClosePositionEvent),
    LiquidatePosition(LiquidatePositionEvent),
    UpdatePnl(UpdatePnlEvent),

    // Swap and liquidity events
    Swap(SwapEvent),
    BuyUnitOfAccount(BuyUnitOfAccountEvent),
    SellUnitOfAccount(SellUnitOfAccountEvent),
    DirectPoolDeposit(DirectPoolDepositEvent),

    // Fee events
    CollectMarginFees(CollectMarginFeesEvent),
    CollectSwapFees(CollectSwapFeesEvent),
    FeesWithdrawn(FeesWithdrawnEvent),
    UpdateFundingRate(UpdateFundingRateEvent),

    // Admin events
    RouterUpdated(RouterUpdatedEvent),
    RoleUpdated(RoleUpdatedEvent),
    TokenConfigUpdated(TokenConfigUpdatedEvent),
}

impl EventPayload {
    pub fn kind(&self) -> &'static str {
        match self {
            EventPayload::IncreasePosition(_) => "increase_position",
            EventPayload::DecreasePosition(_) => "decrease_position",
            EventPayload::UpdatePosition(_) => "update_position",
            EventPayload::ClosePosition(_) => "close_position",
            EventPayload::LiquidatePosition(_) => "liquidate_position",
            EventPayload::UpdatePnl(_) => "update_pnl",
            EventPayload::Swap(_) => "swap",
            EventPayload::BuyUnitOfAccount(_) => "buy_unit_of_account",
            EventPayload::SellUnitOfAccount(_) => "sell_unit_of_account",
            EventPayload::DirectPoolDeposit(_) => "direct_pool_deposit",
            EventPayload::CollectMarginFees(_) => "collect_margin_fees",
            EventPayload::CollectSwapFees(_) => "collect_swap_fees",
            EventPayload::FeesWithdrawn(_) => "fees_withdrawn",
            EventPayload::UpdateFundingRate(_) => "update_funding_rate",
            EventPayload::RouterUpdated(_) => "router_updated",
            EventPayload::RoleUpdated(_) => "role_updated",
            EventPayload::TokenConfigUpdated(_) => "token_config_updated",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IncreasePositionEvent {
    pub key: PositionKey,
    pub collateral_delta: Usd,
    pub size_delta: Usd,
    pub price: Price,
    pub fee: Usd,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecreasePositionEvent {
    pub key: PositionKey,
    pub collateral_delta: Usd,
    pub size_delta: Usd,
    pub price: Price,
    pub fee: Usd,
    pub amount_out: U256,
    pub receiver: AccountId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdatePositionEvent {
    pub key: PositionKey,
    pub size: Usd,
    pub collateral: Usd,
    pub average_price: Price,
    pub entry_funding_rate: U256,
    pub reserve_amount: U256,
    pub realised_pnl: SignedUsd,
    pub mark_price: Price,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClosePositionEvent {
    pub key: PositionKey,
    pub size: Usd,
    pub collateral: Usd,
    pub average_price: Price,
    pub realised_pnl: SignedUsd,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LiquidatePositionEvent {
    pub key: PositionKey,
    pub state: LiquidationState,
    pub size: Usd,
    pub collateral: Usd,
    pub reserve_amount: U256,
    pub realised_pnl: SignedUsd,
    pub mark_price: Price,
    pub fee_receiver: AccountId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdatePnlEvent {
    pub key: PositionKey,
    pub has_profit: bool,
    pub delta: Usd,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwapEvent {
    pub receiver: AccountId,
    pub token_in: TokenId,
    pub token_out: TokenId,
    pub amount_in: U256,
    pub amount_out: U256,
    pub amount_out_after_fees: U256,
    pub fee_bps: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuyUnitOfAccountEvent {
    pub receiver: AccountId,
    pub token: TokenId,
    pub token_amount: U256,
    pub minted: U256,
    pub fee_bps: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SellUnitOfAccountEvent {
    pub receiver: AccountId,
    pub token: TokenId,
    pub burned: U256,
    pub token_amount: U256,
    pub fee_bps: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectPoolDepositEvent {
    pub token: TokenId,
    pub amount: U256,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectMarginFeesEvent {
    pub token: TokenId,
    pub fee_usd: Usd,
    pub fee_tokens: U256,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectSwapFeesEvent {
    pub token: TokenId,
    pub fee_usd: Usd,
    pub fee_tokens: U256,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeesWithdrawnEvent {
    pub token: TokenId,
    pub amount: U256,
    pub receiver: AccountId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateFundingRateEvent {
    pub token: TokenId,
    pub cumulative_funding_rate: U256,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouterUpdatedEvent {
    pub account: AccountId,
    pub router: AccountId,
    pub approved: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Manager,
    Liquidator,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoleUpdatedEvent {
    pub role: Role,
    pub account: AccountId,
    pub active: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenConfigUpdatedEvent {
    pub token: TokenId,
    pub whitelisted: bool,
}

// side of a close for log lines
pub fn side_label(side: Side) -> &'static str {
    match side {
        Side::Long => "long",
        Side::Short => "short",
    }
}

/// Events staged by an operation, handed to the ledger log only on commit.
#[derive(Debug, Default)]
pub struct EventCollector {
    pending: Vec<EventPayload>,
}

impl EventCollector {
    pub fn new() -> Self {
        Self { pending: Vec::new() }
    }

    pub fn emit(&mut self, payload: EventPayload) {
        self.pending.push(payload);
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn drain(self) -> Vec<EventPayload> {
        self.pending
    }
}
