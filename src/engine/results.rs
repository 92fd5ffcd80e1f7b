// 8.0.2: result types and errors for ledger operations.

use ruint::aliases::U256;

use crate::config::ConfigError;
use crate::custody::CustodyError;
use crate::fixed::{MathError, Usd};
use crate::liquidity::LiquidityError;
use crate::oracle::OracleError;
use crate::position::{LiquidationState, PositionError};
use crate::types::{AccountId, PositionKey, TokenId};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiquidationResult {
    pub key: PositionKey,
    pub state: LiquidationState,
    pub margin_fees: Usd,
    // paid to fee_receiver, in collateral token units
    pub liquidation_fee_tokens: U256,
    // only set on the over-leveraged path, paid to the position owner
    pub amount_out: U256,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LedgerError {
    #[error("{0} may not act for this account")]
    InvalidCaller(AccountId),

    #[error("priority fee {fee} above ceiling {max}")]
    PriorityFeeTooHigh { fee: u64, max: u64 },

    #[error("token {0} is not usable here")]
    InvalidToken(TokenId),

    #[error("token pair {0} / {1} is not valid for this operation")]
    InvalidTokens(TokenId, TokenId),

    #[error("leverage is disabled")]
    LeverageDisabled,

    #[error("swaps are disabled")]
    SwapsDisabled,

    #[error("fees exceed collateral")]
    InsufficientCollateralForFees,

    #[error("losses exceed collateral")]
    LossesExceedCollateral,

    #[error("liquidation fees exceed collateral")]
    LiquidationFeesExceedCollateral,

    #[error("max leverage exceeded")]
    MaxLeverageExceeded,

    #[error("reserved amount exceeds pool for {0}")]
    ReserveExceedsPool(TokenId),

    #[error("pool amount too small for {0}")]
    InsufficientPoolAmount(TokenId),

    #[error("pool for {0} would fall below its buffer")]
    PoolBelowBuffer(TokenId),

    #[error("unit of account issued against {0} over its cap")]
    MaxUnitOfAccountExceeded(TokenId),

    #[error("position size exceeded")]
    PositionSizeExceeded,

    #[error("collateral delta exceeds collateral")]
    CollateralDeltaExceeded,

    #[error("position size below collateral")]
    SizeLessThanCollateral,

    #[error("position would have zero size")]
    ZeroSize,

    #[error("position does not exist")]
    EmptyPosition,

    #[error("nothing was transferred in")]
    ZeroAmount,

    #[error("oracle returned an unusable price for {0}")]
    InvalidPriceForExecution(TokenId),

    #[error("position cannot be liquidated")]
    PositionCannotBeLiquidated,

    #[error("accounting for {0} does not match custody")]
    SolvencyViolation(TokenId),

    #[error("liquidity: {0}")]
    Liquidity(LiquidityError),

    #[error("oracle: {0}")]
    Oracle(OracleError),

    #[error("custody: {0}")]
    Custody(#[from] CustodyError),

    #[error("math: {0}")]
    Math(#[from] MathError),

    #[error("config: {0}")]
    Config(#[from] ConfigError),
}

impl From<LiquidityError> for LedgerError {
    fn from(e: LiquidityError) -> Self {
        match e {
            LiquidityError::ReserveExceedsPool { token, .. } => LedgerError::ReserveExceedsPool(token),
            LiquidityError::InsufficientPoolAmount { token, .. } => LedgerError::InsufficientPoolAmount(token),
            LiquidityError::PoolBelowBuffer { token, .. } => LedgerError::PoolBelowBuffer(token),
            LiquidityError::MaxUnitOfAccountExceeded { token, .. } => LedgerError::MaxUnitOfAccountExceeded(token),
            LiquidityError::BalanceMismatch { token, .. } => LedgerError::SolvencyViolation(token),
            LiquidityError::Math { source, .. } => LedgerError::Math(source),
            other => LedgerError::Liquidity(other),
        }
    }
}

// a read that is missing or stale is a price the ledger will not execute at
impl From<OracleError> for LedgerError {
    fn from(e: OracleError) -> Self {
        match e {
            OracleError::NoPrice(token) | OracleError::Stale { token, .. } => LedgerError::InvalidPriceForExecution(token),
            other => LedgerError::Oracle(other),
        }
    }
}

impl From<PositionError> for LedgerError {
    fn from(e: PositionError) -> Self {
        match e {
            PositionError::LossesExceedCollateral => LedgerError::LossesExceedCollateral,
            PositionError::InsufficientCollateralForFees => LedgerError::InsufficientCollateralForFees,
            PositionError::LiquidationFeesExceedCollateral => LedgerError::LiquidationFeesExceedCollateral,
            PositionError::MaxLeverageExceeded => LedgerError::MaxLeverageExceeded,
            PositionError::InvalidAveragePrice => LedgerError::Math(MathError::DivideByZero),
            PositionError::Math(m) => LedgerError::Math(m),
        }
    }
}
