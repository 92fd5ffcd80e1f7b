// 5.0: funding. positions borrow pool liquidity and pay for it per whole interval.
// the rate scales with utilization (reserved / pool) of the collateral token.
// cumulative rate only ever grows; a position pays the growth since it last settled.

use ruint::aliases::U256;

use crate::config::FundingConfig;
use crate::fixed::{checked_add, mul_div, MathError, Usd, FUNDING_RATE_PRECISION};
use crate::liquidity::PoolState;
use crate::types::Timestamp;

// 5.1: snap to the start of the current interval
pub fn align_to_interval(now: Timestamp, interval_secs: u64) -> Timestamp {
    if interval_secs == 0 {
        return now;
    }
    Timestamp::from_secs(now.as_secs() / interval_secs * interval_secs)
}

fn factor(config: &FundingConfig, is_stable: bool) -> U256 {
    if is_stable {
        U256::from(config.stable_funding_rate_factor)
    } else {
        U256::from(config.funding_rate_factor)
    }
}

// 5.2: rate that would be added right now. zero until a full interval has passed.
pub fn next_funding_rate(
    pool: &PoolState,
    now: Timestamp,
    config: &FundingConfig,
    is_stable: bool,
) -> Result<U256, MathError> {
    let last = match pool.last_funding_time {
        Some(t) => t,
        None => return Ok(U256::ZERO),
    };
    let interval = config.funding_interval_secs;
    if interval == 0 || last.as_secs().saturating_add(interval) > now.as_secs() {
        return Ok(U256::ZERO);
    }
    if pool.pool_amount.is_zero() {
        return Ok(U256::ZERO);
    }

    let intervals = U256::from(last.saturating_elapsed(now) / interval);
    let weighted = factor(config, is_stable)
        .checked_mul(pool.reserved_amount)
        .ok_or(MathError::Overflow)?;
    mul_div(weighted, intervals, pool.pool_amount)
}

/// Accrue funding into `pool`. Returns the rate added, zero if nothing accrued.
pub fn update_cumulative_funding_rate(
    pool: &mut PoolState,
    now: Timestamp,
    config: &FundingConfig,
    is_stable: bool,
) -> Result<U256, MathError> {
    let interval = config.funding_interval_secs;
    let last = match pool.last_funding_time {
        Some(t) => t,
        None => {
            // first touch only sets the clock
            pool.last_funding_time = Some(align_to_interval(now, interval));
            return Ok(U256::ZERO);
        }
    };

    if last.as_secs().saturating_add(interval) > now.as_secs() {
        return Ok(U256::ZERO);
    }

    let rate = next_funding_rate(pool, now, config, is_stable)?;
    pool.cumulative_funding_rate = checked_add(pool.cumulative_funding_rate, rate)?;
    pool.last_funding_time = Some(align_to_interval(now, interval));
    Ok(rate)
}

// 5.3: what a position owes for the funding accrued since it last settled
pub fn funding_fee(size: Usd, entry_funding_rate: U256, cumulative_funding_rate: U256) -> Result<Usd, MathError> {
    if size.is_zero() {
        return Ok(Usd::ZERO);
    }
    let accrued = cumulative_funding_rate.saturating_sub(entry_funding_rate);
    if accrued.is_zero() {
        return Ok(Usd::ZERO);
    }
    size.mul_div(accrued, FUNDING_RATE_PRECISION)
}
