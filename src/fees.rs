// 10.0: fees. fee schedule math. margin fees on size, dynamic fee curve on
// swaps and buy/sell. the curve nudges the pool toward its target weights:
// trades that move a token toward its target get a rebate, trades that move it
// away pay extra tax.

use ruint::aliases::U256;

use crate::config::FeeSchedule;
use crate::fixed::{mul_div, MathError, Usd, BASIS_POINTS_DIVISOR};

/// A base fee plus the tax slope applied when dynamic fees are on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeeCurve {
    pub base_bps: u32,
    pub tax_bps: u32,
    pub dynamic: bool,
}

/// Where a token's unit of account issuance sits relative to its target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WeightState {
    pub issued: U256,
    pub target: U256,
}

impl FeeCurve {
    pub fn mint_burn(schedule: &FeeSchedule) -> Self {
        Self {
            base_bps: schedule.mint_burn_fee_bps,
            tax_bps: schedule.tax_bps,
            dynamic: schedule.has_dynamic_fees,
        }
    }

    // stable to stable pairs get the cheap schedule
    pub fn swap(schedule: &FeeSchedule, both_stable: bool) -> Self {
        if both_stable {
            Self {
                base_bps: schedule.stable_swap_fee_bps,
                tax_bps: schedule.stable_tax_bps,
                dynamic: schedule.has_dynamic_fees,
            }
        } else {
            Self {
                base_bps: schedule.swap_fee_bps,
                tax_bps: schedule.tax_bps,
                dynamic: schedule.has_dynamic_fees,
            }
        }
    }

    /// Fee in bps for changing `state.issued` by `delta` in the given direction.
    pub fn basis_points(&self, state: WeightState, delta: U256, increment: bool) -> Result<u32, MathError> {
        if !self.dynamic || state.target.is_zero() {
            return Ok(self.base_bps);
        }

        let next = if increment {
            state.issued.checked_add(delta).ok_or(MathError::Overflow)?
        } else {
            state.issued.saturating_sub(delta)
        };

        let initial_diff = state.issued.abs_diff(state.target);
        let next_diff = next.abs_diff(state.target);

        // 10.1: moving toward target earns a rebate
        if next_diff < initial_diff {
            let rebate = mul_div(U256::from(self.tax_bps), initial_diff, state.target)?;
            let base = U256::from(self.base_bps);
            return Ok(if rebate > base { 0 } else { to_bps(base - rebate) });
        }

        // 10.2: moving away pays tax on the average imbalance, capped at the target
        let mut average_diff = (initial_diff + next_diff) / U256::from(2u64);
        if average_diff > state.target {
            average_diff = state.target;
        }
        let tax = mul_div(U256::from(self.tax_bps), average_diff, state.target)?;
        Ok(self.base_bps.saturating_add(to_bps(tax)))
    }
}

// tax <= tax_bps and rebates <= base so this always fits
fn to_bps(v: U256) -> u32 {
    u32::try_from(v).unwrap_or(u32::MAX)
}

/// How much unit of account a token should back at its configured weight.
pub fn target_amount(supply: U256, weight: u32, total_weight: u32) -> Result<U256, MathError> {
    if supply.is_zero() || total_weight == 0 {
        return Ok(U256::ZERO);
    }
    mul_div(supply, U256::from(weight), U256::from(total_weight))
}

/// Swap fee is the worse of the two legs: adding token_in and removing token_out.
pub fn swap_fee_basis_points(
    curve: FeeCurve,
    token_in: WeightState,
    token_out: WeightState,
    uoa_amount: U256,
) -> Result<u32, MathError> {
    let bps_in = curve.basis_points(token_in, uoa_amount, true)?;
    let bps_out = curve.basis_points(token_out, uoa_amount, false)?;
    Ok(bps_in.max(bps_out))
}

/// Margin fee on a size change.
pub fn position_fee(size_delta: Usd, margin_fee_bps: u32) -> Result<Usd, MathError> {
    if size_delta.is_zero() {
        return Ok(Usd::ZERO);
    }
    size_delta.mul_div(U256::from(margin_fee_bps), BASIS_POINTS_DIVISOR)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn u(v: u64) -> U256 {
        U256::from(v)
    }

    fn curve(dynamic: bool) -> FeeCurve {
        FeeCurve {
            base_bps: 30,
            tax_bps: 50,
            dynamic,
        }
    }

    #[test]
    fn static_fee_when_dynamic_off() {
        let s = WeightState { issued: u(0), target: u(1_000) };
        assert_eq!(curve(false).basis_points(s, u(5_000), true).unwrap(), 30);
    }

    #[test]
    fn static_fee_when_no_target() {
        let s = WeightState { issued: u(500), target: U256::ZERO };
        assert_eq!(curve(true).basis_points(s, u(5_000), true).unwrap(), 30);
    }

    #[test]
    fn rebate_moving_toward_target() {
        // issued 500 of 1000 target, adding 200 helps: rebate = 50 * 500 / 1000 = 25
        let s = WeightState { issued: u(500), target: u(1_000) };
        assert_eq!(curve(true).basis_points(s, u(200), true).unwrap(), 5);
    }

    #[test]
    fn rebate_floors_at_zero() {
        let s = WeightState { issued: u(0), target: u(1_000) };
        let c = FeeCurve { base_bps: 10, tax_bps: 50, dynamic: true };
        assert_eq!(c.basis_points(s, u(100), true).unwrap(), 0);
    }

    #[test]
    fn tax_moving_away_from_target() {
        // at target, adding 500: avg diff 250, tax = 50 * 250 / 1000 = 12
        let s = WeightState { issued: u(1_000), target: u(1_000) };
        assert_eq!(curve(true).basis_points(s, u(500), true).unwrap(), 42);
        // huge move: avg diff capped at target, full tax
        assert_eq!(curve(true).basis_points(s, u(100_000), true).unwrap(), 80);
    }

    #[test]
    fn swap_takes_the_worse_leg() {
        let balanced = WeightState { issued: u(1_000), target: u(1_000) };
        let short_of_target = WeightState { issued: u(200), target: u(1_000) };
        // adding to an under-weight token is cheap, removing from a balanced one is not
        let bps = swap_fee_basis_points(curve(true), short_of_target, balanced, u(100)).unwrap();
        assert_eq!(bps, 32);
    }

    #[test]
    fn target_by_weight() {
        assert_eq!(target_amount(u(1_000), 1, 4).unwrap(), u(250));
        assert_eq!(target_amount(U256::ZERO, 1, 4).unwrap(), U256::ZERO);
    }

    #[test]
    fn margin_fee() {
        let fee = position_fee(Usd::from_dollars(90), 10).unwrap();
        assert_eq!(fee, Usd::from_dollars(9).mul_div(u(1), u(100)).unwrap());
    }
}
