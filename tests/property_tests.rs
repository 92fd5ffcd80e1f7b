//! Property-based tests for the position, fee and funding math.
//!
//! These tests verify invariants hold under random inputs.

use perps_vault::fees::{FeeCurve, WeightState};
use perps_vault::funding::update_cumulative_funding_rate;
use perps_vault::position::{
    get_delta, next_average_price, validate_liquidation, DeltaParams, LiquidationCheck,
};
use perps_vault::*;
use proptest::prelude::*;
use rust_decimal_macros::dec;

// Strategies for generating test data
fn price_strategy() -> impl Strategy<Value = u64> {
    1u64..200_000u64 // $1 to $200,000
}

fn size_strategy() -> impl Strategy<Value = u64> {
    1u64..1_000_000u64 // $1 to $1M
}

fn no_min_profit() -> DeltaParams {
    DeltaParams {
        now: Timestamp::from_secs(10_000),
        min_profit_time: 0,
        min_profit_bps: 0,
    }
}

fn delta_at(size: Usd, avg: Price, price: Price, is_long: bool) -> (bool, Usd) {
    get_delta(size, avg, price, is_long, Timestamp::default(), no_min_profit()).unwrap()
}

fn rank(state: LiquidationState) -> u8 {
    match state {
        LiquidationState::Healthy => 0,
        LiquidationState::OverLeveraged => 1,
        LiquidationState::Liquidatable => 2,
    }
}

fn check_for(position: &Position, price: Price, is_long: bool) -> LiquidationCheck {
    let (has_profit, delta) = delta_at(position.size, position.average_price, price, is_long);
    LiquidationCheck {
        has_profit,
        delta,
        margin_fees: position.size.bps(10).unwrap(),
        liquidation_fee: Usd::from_decimal(dec!(0.05)).unwrap(),
        max_leverage_bps: 500_000,
    }
}

proptest! {
    /// Pnl is zero when the price is the average price
    #[test]
    fn pnl_zero_at_entry(size in size_strategy(), price in price_strategy(), is_long in any::<bool>()) {
        let p = Price::from_dollars(price);
        let (_, delta) = delta_at(Usd::from_dollars(size), p, p, is_long);
        prop_assert_eq!(delta, Usd::ZERO);
    }

    /// Longs and shorts see the same move from opposite sides
    #[test]
    fn pnl_symmetric_between_sides(size in size_strategy(), entry in price_strategy(), exit in price_strategy()) {
        prop_assume!(entry != exit);
        let s = Usd::from_dollars(size);
        let (long_profit, long_delta) = delta_at(s, Price::from_dollars(entry), Price::from_dollars(exit), true);
        let (short_profit, short_delta) = delta_at(s, Price::from_dollars(entry), Price::from_dollars(exit), false);
        prop_assert_eq!(long_delta, short_delta);
        prop_assert_ne!(long_profit, short_profit);
    }

    /// Growing a position at the current price keeps its pnl at that price
    #[test]
    fn average_price_preserves_pnl(
        size in size_strategy(),
        size_delta in size_strategy(),
        entry in price_strategy(),
        next in price_strategy(),
        is_long in any::<bool>(),
    ) {
        let size = Usd::from_dollars(size);
        let size_delta = Usd::from_dollars(size_delta);
        let entry = Price::from_dollars(entry);
        let next = Price::from_dollars(next);

        let (has_profit, delta) = delta_at(size, entry, next, is_long);
        let avg = next_average_price(is_long, has_profit, delta, size, size_delta, next).unwrap();
        let next_size = size.checked_add(size_delta).unwrap();
        let (after_profit, after_delta) = delta_at(next_size, avg, next, is_long);

        // one unit of price rounding is worth far less than this
        let tolerance = Usd::from_decimal(dec!(0.000000000001)).unwrap();
        prop_assert!(after_delta.abs_diff(delta) <= tolerance, "{} vs {}", after_delta, delta);
        if !delta.is_zero() && delta > tolerance {
            prop_assert_eq!(after_profit, has_profit);
        }
    }

    /// A position that passes the raising check is within max leverage
    #[test]
    fn accepted_positions_within_leverage(
        size in size_strategy(),
        collateral in 1u64..100_000u64,
        entry in price_strategy(),
        move_bps in 0u64..2_000u64,
        is_long in any::<bool>(),
    ) {
        prop_assume!(collateral <= size);
        let position = Position {
            size: Usd::from_dollars(size),
            collateral: Usd::from_dollars(collateral),
            average_price: Price::from_dollars(entry),
            ..Position::default()
        };
        let price = Price::from_dollars(entry).spread(move_bps as u32, !is_long).unwrap();
        let check = check_for(&position, price, is_long);
        if validate_liquidation(&position, check, true).is_ok() {
            let remaining = if check.has_profit {
                position.collateral
            } else {
                position.collateral.checked_sub(check.delta).unwrap()
            };
            let lhs = remaining.raw() * U256::from(check.max_leverage_bps);
            let rhs = position.size.raw() * U256::from(10_000u64);
            prop_assert!(lhs >= rhs);
        }
    }

    /// Moving price against a position never makes it healthier
    #[test]
    fn liquidation_monotone_in_adverse_price(
        size in 10u64..1_000_000u64,
        leverage in 1u64..60u64,
        entry in 1_000u64..100_000u64,
        first_bps in 0u32..5_000u32,
        extra_bps in 0u32..5_000u32,
        is_long in any::<bool>(),
    ) {
        let position = Position {
            size: Usd::from_dollars(size),
            collateral: Usd::from_dollars(size).mul_div(U256::from(1u64), U256::from(leverage)).unwrap(),
            average_price: Price::from_dollars(entry),
            ..Position::default()
        };
        let entry = Price::from_dollars(entry);
        let near = entry.spread(first_bps, !is_long).unwrap();
        let far = entry.spread(first_bps + extra_bps, !is_long).unwrap();

        let (near_state, _) = validate_liquidation(&position, check_for(&position, near, is_long), false).unwrap();
        let (far_state, _) = validate_liquidation(&position, check_for(&position, far, is_long), false).unwrap();
        prop_assert!(rank(far_state) >= rank(near_state), "{:?} then {:?}", near_state, far_state);
    }

    /// Cumulative funding never decreases
    #[test]
    fn funding_monotone(
        steps in proptest::collection::vec((0u64..20_000u64, 1u64..1_000_000u64, 0u64..100u64), 1..30),
    ) {
        let config = FundingConfig::default();
        let mut pool = PoolState::new(TokenId(1));
        let mut now = 0u64;
        let mut last = U256::ZERO;
        for (dt, pool_amount, reserved_pct) in steps {
            now += dt;
            pool.pool_amount = U256::from(pool_amount);
            pool.reserved_amount = U256::from(pool_amount * reserved_pct / 100);
            update_cumulative_funding_rate(&mut pool, Timestamp::from_secs(now), &config, false).unwrap();
            prop_assert!(pool.cumulative_funding_rate >= last);
            last = pool.cumulative_funding_rate;
        }
    }

    /// Dynamic fees stay between zero and base + tax
    #[test]
    fn fee_curve_bounded(
        issued in 0u64..1_000_000_000u64,
        target in 1u64..1_000_000_000u64,
        delta in 0u64..1_000_000_000u64,
        increment in any::<bool>(),
    ) {
        let curve = FeeCurve::mint_burn(&LedgerConfig::testnet().fees);
        let state = WeightState { issued: U256::from(issued), target: U256::from(target) };
        let bps = curve.basis_points(state, U256::from(delta), increment).unwrap();
        prop_assert!(bps <= curve.base_bps + curve.tax_bps);
    }
}
