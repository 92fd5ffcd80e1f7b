// 2.0: fixed point core. every USD figure is a 30 decimal scaled integer in a U256.
// never floats: payouts and fees must be bit exact.
// 2.1 Usd, 2.2 Price, 2.3 SignedUsd, 2.4 token <-> usd conversion helpers.

use rust_decimal::Decimal;
use ruint::aliases::{U256, U512};
use ruint::uint;
use serde::{Deserialize, Serialize};
use std::fmt;

pub const USD_DECIMALS: u8 = 30;
pub const PRICE_PRECISION: U256 = uint!(1000000000000000000000000000000_U256);
pub const BASIS_POINTS_DIVISOR: U256 = uint!(10000_U256);
pub const FUNDING_RATE_PRECISION: U256 = uint!(1000000_U256);
pub const UNIT_OF_ACCOUNT_DECIMALS: u8 = 18;

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum MathError {
    #[error("arithmetic overflow")]
    Overflow,

    #[error("arithmetic underflow")]
    Underflow,

    #[error("divide by zero")]
    DivideByZero,

    #[error("negative value cannot be represented")]
    Negative,
}

/// `a * b / c` with a 512 bit intermediate, rounding down.
pub fn mul_div(a: U256, b: U256, c: U256) -> Result<U256, MathError> {
    if c.is_zero() {
        return Err(MathError::DivideByZero);
    }
    let res = U512::from(a)
        .checked_mul(U512::from(b))
        .ok_or(MathError::Overflow)?
        / U512::from(c);

    if res > U512::from(U256::MAX) {
        return Err(MathError::Overflow);
    }

    Ok(U256::from(res))
}

pub fn checked_add(a: U256, b: U256) -> Result<U256, MathError> {
    a.checked_add(b).ok_or(MathError::Overflow)
}

pub fn checked_sub(a: U256, b: U256) -> Result<U256, MathError> {
    a.checked_sub(b).ok_or(MathError::Underflow)
}

pub fn pow10(decimals: u8) -> U256 {
    U256::from(10u64).pow(U256::from(decimals))
}

/// `amount * bps / 10000`.
pub fn apply_bps(amount: U256, bps: u32) -> Result<U256, MathError> {
    mul_div(amount, U256::from(bps), BASIS_POINTS_DIVISOR)
}

/// What is left of `amount` after taking `bps` off the top.
pub fn after_bps(amount: U256, bps: u32) -> Result<U256, MathError> {
    let keep = checked_sub(BASIS_POINTS_DIVISOR, U256::from(bps))?;
    mul_div(amount, keep, BASIS_POINTS_DIVISOR)
}

fn decimal_to_scaled(value: Decimal) -> Result<U256, MathError> {
    if value.is_sign_negative() && !value.is_zero() {
        return Err(MathError::Negative);
    }
    let mantissa = U256::from(value.mantissa().unsigned_abs());
    let scale = value.scale() as u8;
    if scale > USD_DECIMALS {
        return Ok(mantissa / pow10(scale - USD_DECIMALS));
    }
    mantissa
        .checked_mul(pow10(USD_DECIMALS - scale))
        .ok_or(MathError::Overflow)
}

// keeps 18 decimals, which is all Decimal can hold next to a useful integer part
fn scaled_to_decimal(raw: U256) -> Option<Decimal> {
    let reduced = raw / pow10(USD_DECIMALS - 18);
    let as_u128: u128 = reduced.try_into().ok()?;
    let as_i128 = i128::try_from(as_u128).ok()?;
    Decimal::try_from_i128_with_scale(as_i128, 18)
        .ok()
        .map(|d| d.normalize())
}

fn fmt_scaled(raw: U256, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let whole = raw / PRICE_PRECISION;
    let frac = raw % PRICE_PRECISION;
    if frac.is_zero() {
        return write!(f, "{}", whole);
    }
    let digits = format!("{:0>30}", frac.to_string());
    write!(f, "{}.{}", whole, digits.trim_end_matches('0'))
}

// 2.1: USD amount (position size, collateral, fees, pnl magnitude).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct Usd(U256);

impl Usd {
    pub const ZERO: Usd = Usd(U256::ZERO);

    pub const fn from_raw(raw: U256) -> Self {
        Self(raw)
    }

    pub fn from_dollars(dollars: u64) -> Self {
        Self(U256::from(dollars) * PRICE_PRECISION)
    }

    pub fn from_decimal(value: Decimal) -> Result<Self, MathError> {
        decimal_to_scaled(value).map(Self)
    }

    pub fn raw(&self) -> U256 {
        self.0
    }

    pub fn to_decimal(&self) -> Option<Decimal> {
        scaled_to_decimal(self.0)
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    pub fn checked_add(self, other: Usd) -> Result<Usd, MathError> {
        checked_add(self.0, other.0).map(Usd)
    }

    pub fn checked_sub(self, other: Usd) -> Result<Usd, MathError> {
        checked_sub(self.0, other.0).map(Usd)
    }

    pub fn saturating_sub(self, other: Usd) -> Usd {
        Usd(self.0.saturating_sub(other.0))
    }

    pub fn abs_diff(self, other: Usd) -> Usd {
        Usd(self.0.abs_diff(other.0))
    }

    pub fn mul_div(self, numerator: U256, denominator: U256) -> Result<Usd, MathError> {
        mul_div(self.0, numerator, denominator).map(Usd)
    }

    /// Scale by `part / whole` where both are USD figures.
    pub fn mul_ratio(self, part: Usd, whole: Usd) -> Result<Usd, MathError> {
        mul_div(self.0, part.0, whole.0).map(Usd)
    }

    pub fn bps(self, bps: u32) -> Result<Usd, MathError> {
        apply_bps(self.0, bps).map(Usd)
    }
}

impl fmt::Display for Usd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "$")?;
        fmt_scaled(self.0, f)
    }
}

// 2.2: USD per one whole token, same 30 decimal scale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct Price(U256);

impl Price {
    pub const ZERO: Price = Price(U256::ZERO);

    pub const fn from_raw(raw: U256) -> Self {
        Self(raw)
    }

    pub fn from_dollars(dollars: u64) -> Self {
        Self(U256::from(dollars) * PRICE_PRECISION)
    }

    pub fn from_decimal(value: Decimal) -> Result<Self, MathError> {
        decimal_to_scaled(value).map(Self)
    }

    pub fn raw(&self) -> U256 {
        self.0
    }

    pub fn to_decimal(&self) -> Option<Decimal> {
        scaled_to_decimal(self.0)
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    pub fn abs_diff(self, other: Price) -> U256 {
        self.0.abs_diff(other.0)
    }

    /// Widen by `bps` in the given direction, used for oracle spreads.
    pub fn spread(self, bps: u32, up: bool) -> Result<Price, MathError> {
        let factor = if up {
            checked_add(BASIS_POINTS_DIVISOR, U256::from(bps))?
        } else {
            checked_sub(BASIS_POINTS_DIVISOR, U256::from(bps))?
        };
        mul_div(self.0, factor, BASIS_POINTS_DIVISOR).map(Price)
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "$")?;
        fmt_scaled(self.0, f)
    }
}

// 2.3: signed USD, only needed for realised pnl which can go either way.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct SignedUsd {
    negative: bool,
    magnitude: Usd,
}

impl SignedUsd {
    pub const ZERO: SignedUsd = SignedUsd {
        negative: false,
        magnitude: Usd::ZERO,
    };

    pub fn profit(amount: Usd) -> Self {
        Self {
            negative: false,
            magnitude: amount,
        }
    }

    pub fn loss(amount: Usd) -> Self {
        Self {
            negative: !amount.is_zero(),
            magnitude: amount,
        }
    }

    pub fn is_negative(&self) -> bool {
        self.negative
    }

    pub fn magnitude(&self) -> Usd {
        self.magnitude
    }

    pub fn add_profit(self, amount: Usd) -> Result<SignedUsd, MathError> {
        if !self.negative {
            return Ok(Self::profit(self.magnitude.checked_add(amount)?));
        }
        if self.magnitude >= amount {
            Ok(Self::loss(self.magnitude.checked_sub(amount)?))
        } else {
            Ok(Self::profit(amount.checked_sub(self.magnitude)?))
        }
    }

    pub fn add_loss(self, amount: Usd) -> Result<SignedUsd, MathError> {
        if self.negative {
            return Ok(Self::loss(self.magnitude.checked_add(amount)?));
        }
        if self.magnitude >= amount {
            Ok(Self::profit(self.magnitude.checked_sub(amount)?))
        } else {
            Ok(Self::loss(amount.checked_sub(self.magnitude)?))
        }
    }
}

impl fmt::Display for SignedUsd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.negative {
            write!(f, "-")?;
        }
        write!(f, "{}", self.magnitude)
    }
}

// 2.4: token amounts are raw U256 units at the token's own decimals.

pub fn token_to_usd(amount: U256, price: Price, decimals: u8) -> Result<Usd, MathError> {
    if amount.is_zero() {
        return Ok(Usd::ZERO);
    }
    mul_div(amount, price.raw(), pow10(decimals)).map(Usd)
}

pub fn usd_to_token(usd: Usd, price: Price, decimals: u8) -> Result<U256, MathError> {
    if usd.is_zero() {
        return Ok(U256::ZERO);
    }
    mul_div(usd.raw(), pow10(decimals), price.raw())
}

/// Re-express `amount` from `decimals_div` to `decimals_mul` precision.
pub fn adjust_for_decimals(amount: U256, decimals_div: u8, decimals_mul: u8) -> Result<U256, MathError> {
    mul_div(amount, pow10(decimals_mul), pow10(decimals_div))
}
