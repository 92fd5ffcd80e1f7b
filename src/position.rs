// 4.0: position row and the pure math around it. pnl = size * |price - avg| / avg.
// 4.1 delta, 4.2 average price algebra, 4.3 liquidation classification.
// nothing here touches pool state; the engine feeds in prices and fees.

use ruint::aliases::U256;
use serde::{Deserialize, Serialize};

use crate::fixed::{mul_div, MathError, Price, SignedUsd, Usd, BASIS_POINTS_DIVISOR};
use crate::types::Timestamp;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Position {
    pub size: Usd,
    pub collateral: Usd,
    pub average_price: Price,
    pub entry_funding_rate: U256,
    // collateral token units held out of the pool's available liquidity
    pub reserve_amount: U256,
    pub realised_pnl: SignedUsd,
    pub last_increased_time: Timestamp,
}

impl Position {
    pub fn is_empty(&self) -> bool {
        self.size.is_zero()
    }

    /// size / collateral in bps. `None` with no collateral.
    pub fn leverage_bps(&self) -> Option<U256> {
        if self.collateral.is_zero() {
            return None;
        }
        mul_div(self.size.raw(), BASIS_POINTS_DIVISOR, self.collateral.raw()).ok()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum PositionError {
    #[error("average price is zero")]
    InvalidAveragePrice,

    #[error("losses exceed collateral")]
    LossesExceedCollateral,

    #[error("fees exceed collateral")]
    InsufficientCollateralForFees,

    #[error("liquidation fees exceed collateral")]
    LiquidationFeesExceedCollateral,

    #[error("max leverage exceeded")]
    MaxLeverageExceeded,

    #[error(transparent)]
    Math(#[from] MathError),
}

// 4.1: unrealized pnl. profits inside the min profit window that are smaller than
// min_profit_bps of size count as zero, which blocks front-running tiny oracle moves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeltaParams {
    pub now: Timestamp,
    pub min_profit_time: u64,
    pub min_profit_bps: u32,
}

pub fn get_delta(
    size: Usd,
    average_price: Price,
    price: Price,
    is_long: bool,
    last_increased_time: Timestamp,
    params: DeltaParams,
) -> Result<(bool, Usd), PositionError> {
    if average_price.is_zero() {
        return Err(PositionError::InvalidAveragePrice);
    }

    let price_delta = average_price.abs_diff(price);
    let mut delta = size.mul_div(price_delta, average_price.raw())?;

    let has_profit = if is_long {
        price > average_price
    } else {
        average_price > price
    };

    let window_open = last_increased_time.as_secs().saturating_add(params.min_profit_time) >= params.now.as_secs();
    let min_bps = if window_open { params.min_profit_bps } else { 0 };
    if has_profit {
        let lhs = delta.raw().checked_mul(BASIS_POINTS_DIVISOR).ok_or(MathError::Overflow)?;
        let rhs = size.raw().checked_mul(U256::from(min_bps)).ok_or(MathError::Overflow)?;
        if lhs <= rhs {
            delta = Usd::ZERO;
        }
    }

    Ok((has_profit, delta))
}

// 4.2: new average price such that the position's pnl at next_price is preserved.
// long:  divisor = next_size + delta on profit, next_size - delta on loss.
// short: divisor = next_size - delta on profit, next_size + delta on loss.
pub fn next_average_price(
    is_long: bool,
    has_profit: bool,
    delta: Usd,
    size: Usd,
    size_delta: Usd,
    next_price: Price,
) -> Result<Price, PositionError> {
    let next_size = size.checked_add(size_delta)?;
    let add = is_long == has_profit;
    let divisor = if add {
        next_size.checked_add(delta)?
    } else {
        next_size.checked_sub(delta)?
    };
    if divisor.is_zero() {
        return Err(PositionError::InvalidAveragePrice);
    }
    Ok(Price::from_raw(mul_div(next_price.raw(), next_size.raw(), divisor.raw())?))
}

/// Aggregate pnl of all shorts on an index token. Shorts profit when price is under the average.
pub fn global_short_delta(size: Usd, average_price: Price, price: Price) -> Result<(bool, Usd), PositionError> {
    if size.is_zero() || average_price.is_zero() {
        return Ok((false, Usd::ZERO));
    }
    let delta = size.mul_div(average_price.abs_diff(price), average_price.raw())?;
    Ok((average_price > price, delta))
}

pub fn next_global_short_average_price(
    size: Usd,
    average_price: Price,
    next_price: Price,
    size_delta: Usd,
) -> Result<Price, PositionError> {
    if size.is_zero() || average_price.is_zero() {
        return Ok(next_price);
    }
    let (has_profit, delta) = global_short_delta(size, average_price, next_price)?;
    next_average_price(false, has_profit, delta, size, size_delta, next_price)
}

// 4.3: liquidation classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LiquidationState {
    Healthy,
    Liquidatable,
    OverLeveraged,
}

impl LiquidationState {
    pub fn code(&self) -> u8 {
        match self {
            LiquidationState::Healthy => 0,
            LiquidationState::Liquidatable => 1,
            LiquidationState::OverLeveraged => 2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LiquidationCheck {
    pub has_profit: bool,
    pub delta: Usd,
    // funding fee + position fee on the full size
    pub margin_fees: Usd,
    pub liquidation_fee: Usd,
    pub max_leverage_bps: u32,
}

/// Classify a position. With `raise` set, anything but healthy is an error.
/// Returns the state and the fees the pool would keep.
pub fn validate_liquidation(
    position: &Position,
    check: LiquidationCheck,
    raise: bool,
) -> Result<(LiquidationState, Usd), PositionError> {
    if !check.has_profit && position.collateral < check.delta {
        if raise {
            return Err(PositionError::LossesExceedCollateral);
        }
        return Ok((LiquidationState::Liquidatable, check.margin_fees));
    }

    let remaining = if check.has_profit {
        position.collateral
    } else {
        position.collateral.checked_sub(check.delta)?
    };

    if remaining < check.margin_fees {
        if raise {
            return Err(PositionError::InsufficientCollateralForFees);
        }
        // the pool can't take more than what's left
        return Ok((LiquidationState::Liquidatable, remaining));
    }

    if remaining < check.margin_fees.checked_add(check.liquidation_fee)? {
        if raise {
            return Err(PositionError::LiquidationFeesExceedCollateral);
        }
        return Ok((LiquidationState::Liquidatable, check.margin_fees));
    }

    let lhs = remaining
        .raw()
        .checked_mul(U256::from(check.max_leverage_bps))
        .ok_or(MathError::Overflow)?;
    let rhs = position.size.raw().checked_mul(BASIS_POINTS_DIVISOR).ok_or(MathError::Overflow)?;
    if lhs < rhs {
        if raise {
            return Err(PositionError::MaxLeverageExceeded);
        }
        return Ok((LiquidationState::OverLeveraged, check.margin_fees));
    }

    Ok((LiquidationState::Healthy, check.margin_fees))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn usd(d: rust_decimal::Decimal) -> Usd {
        Usd::from_decimal(d).unwrap()
    }

    fn params(now: u64) -> DeltaParams {
        DeltaParams {
            now: Timestamp::from_secs(now),
            min_profit_time: 3_600,
            min_profit_bps: 75,
        }
    }

    fn test_position() -> Position {
        Position {
            size: Usd::from_dollars(90),
            collateral: usd(dec!(9.91)),
            average_price: Price::from_dollars(40_000),
            last_increased_time: Timestamp::from_secs(0),
            ..Position::default()
        }
    }

    #[test]
    fn long_profit_delta() {
        let (profit, delta) = get_delta(
            Usd::from_dollars(90),
            Price::from_dollars(41_000),
            Price::from_dollars(45_100),
            true,
            Timestamp::from_secs(0),
            params(0),
        )
        .unwrap();
        assert!(profit);
        assert_eq!(delta, Usd::from_dollars(9));
    }

    #[test]
    fn short_loss_delta() {
        let (profit, delta) = get_delta(
            Usd::from_dollars(100),
            Price::from_dollars(1_000),
            Price::from_dollars(1_100),
            false,
            Timestamp::from_secs(0),
            params(0),
        )
        .unwrap();
        assert!(!profit);
        assert_eq!(delta, Usd::from_dollars(10));
    }

    #[test]
    fn tiny_profit_hidden_inside_window() {
        // +0.5% on $100 is under 75 bps
        let size = Usd::from_dollars(100);
        let avg = Price::from_dollars(1_000);
        let p = Price::from_dollars(1_005);
        let (_, inside) = get_delta(size, avg, p, true, Timestamp::from_secs(1_000), params(1_100)).unwrap();
        assert_eq!(inside, Usd::ZERO);
        let (_, after) = get_delta(size, avg, p, true, Timestamp::from_secs(1_000), params(4_601)).unwrap();
        assert_eq!(after, usd(dec!(0.5)));
    }

    #[test]
    fn zero_average_price_rejected() {
        let r = get_delta(Usd::from_dollars(1), Price::ZERO, Price::from_dollars(1), true, Timestamp::default(), params(0));
        assert_eq!(r, Err(PositionError::InvalidAveragePrice));
    }

    #[test]
    fn average_price_keeps_pnl() {
        // long 100 @ 1000, price now 1100 => +10 profit. add 100 at 1100
        let next = next_average_price(
            true,
            true,
            Usd::from_dollars(10),
            Usd::from_dollars(100),
            Usd::from_dollars(100),
            Price::from_dollars(1_100),
        )
        .unwrap();
        // 1100 * 200 / 210
        let expected = mul_div(Price::from_dollars(1_100).raw(), U256::from(200u64), U256::from(210u64)).unwrap();
        assert_eq!(next.raw(), expected);

        // pnl at 1100 on the 200 size is still 10 (minus rounding)
        let (_, delta) = get_delta(Usd::from_dollars(200), next, Price::from_dollars(1_100), true, Timestamp::default(), params(99_999)).unwrap();
        assert!(Usd::from_dollars(10).abs_diff(delta) < usd(dec!(0.000001)));
    }

    #[test]
    fn global_short_average_moves_toward_new_entries() {
        let first = next_global_short_average_price(Usd::ZERO, Price::ZERO, Price::from_dollars(1_000), Usd::from_dollars(100)).unwrap();
        assert_eq!(first, Price::from_dollars(1_000));

        // 100 short @ 1000, price 900 (shorts up 10), add 100 at 900: 900 * 200 / 190
        let next = next_global_short_average_price(
            Usd::from_dollars(100),
            Price::from_dollars(1_000),
            Price::from_dollars(900),
            Usd::from_dollars(100),
        )
        .unwrap();
        let expected = mul_div(Price::from_dollars(900).raw(), U256::from(200u64), U256::from(190u64)).unwrap();
        assert_eq!(next.raw(), expected);

        let (profit, delta) = global_short_delta(Usd::from_dollars(200), next, Price::from_dollars(900)).unwrap();
        assert!(profit);
        assert!(Usd::from_dollars(10).abs_diff(delta) < usd(dec!(0.000001)));
    }

    #[test]
    fn healthy_position() {
        let check = LiquidationCheck {
            has_profit: false,
            delta: Usd::ZERO,
            margin_fees: usd(dec!(0.09)),
            liquidation_fee: usd(dec!(0.05)),
            max_leverage_bps: 500_000,
        };
        let (state, fees) = validate_liquidation(&test_position(), check, true).unwrap();
        assert_eq!(state, LiquidationState::Healthy);
        assert_eq!(fees, usd(dec!(0.09)));
    }

    #[test]
    fn losses_exceed_collateral() {
        let check = LiquidationCheck {
            has_profit: false,
            delta: Usd::from_dollars(10),
            margin_fees: usd(dec!(0.09)),
            liquidation_fee: usd(dec!(0.05)),
            max_leverage_bps: 500_000,
        };
        let pos = test_position();
        assert_eq!(validate_liquidation(&pos, check, true), Err(PositionError::LossesExceedCollateral));
        let (state, _) = validate_liquidation(&pos, check, false).unwrap();
        assert_eq!(state.code(), 1);
    }

    #[test]
    fn fees_capped_at_remaining() {
        let check = LiquidationCheck {
            has_profit: false,
            delta: usd(dec!(9.88)),
            margin_fees: usd(dec!(0.09)),
            liquidation_fee: usd(dec!(0.05)),
            max_leverage_bps: 500_000,
        };
        let (state, fees) = validate_liquidation(&test_position(), check, false).unwrap();
        assert_eq!(state, LiquidationState::Liquidatable);
        assert_eq!(fees, usd(dec!(0.03)));
    }

    #[test]
    fn liquidation_fee_buffer() {
        let check = LiquidationCheck {
            has_profit: false,
            delta: usd(dec!(9.80)),
            margin_fees: usd(dec!(0.09)),
            liquidation_fee: usd(dec!(0.05)),
            max_leverage_bps: 500_000,
        };
        assert_eq!(
            validate_liquidation(&test_position(), check, true),
            Err(PositionError::LiquidationFeesExceedCollateral)
        );
    }

    #[test]
    fn over_leveraged() {
        // remaining 1.81 * 50 = 90.5 >= 90 ok; remaining 1.71 * 50 = 85.5 < 90
        let mut check = LiquidationCheck {
            has_profit: false,
            delta: usd(dec!(8.1)),
            margin_fees: usd(dec!(0.09)),
            liquidation_fee: usd(dec!(0.05)),
            max_leverage_bps: 500_000,
        };
        let pos = test_position();
        assert_eq!(validate_liquidation(&pos, check, false).unwrap().0, LiquidationState::Healthy);
        check.delta = usd(dec!(8.2));
        assert_eq!(validate_liquidation(&pos, check, false).unwrap().0, LiquidationState::OverLeveraged);
        assert_eq!(validate_liquidation(&pos, check, true), Err(PositionError::MaxLeverageExceeded));
    }

    #[test]
    fn leverage_view() {
        let pos = Position {
            size: Usd::from_dollars(90),
            collateral: Usd::from_dollars(10),
            ..Position::default()
        };
        assert_eq!(pos.leverage_bps(), Some(U256::from(90_000u64)));
        assert_eq!(Position::default().leverage_bps(), None);
    }
}
