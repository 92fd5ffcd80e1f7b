// 1.0: identifiers and small value types shared by every module.
// each id is a newtype so the compiler catches account/token mixups.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AccountId(pub u64);

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "acct#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TokenId(pub u32);

impl fmt::Display for TokenId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "token#{}", self.0)
    }
}

// Long = profit when price goes up. Short = profit when price goes down.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    Long,
    Short,
}

impl Side {
    pub fn from_is_long(is_long: bool) -> Self {
        if is_long {
            Side::Long
        } else {
            Side::Short
        }
    }

    pub fn is_long(&self) -> bool {
        matches!(self, Side::Long)
    }

    pub fn opposite(&self) -> Self {
        match self {
            Side::Long => Side::Short,
            Side::Short => Side::Long,
        }
    }
}

// 1.1: a position is identified by who holds it, what backs it, what it tracks, and direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PositionKey {
    pub account: AccountId,
    pub collateral_token: TokenId,
    pub index_token: TokenId,
    pub side: Side,
}

impl PositionKey {
    pub fn new(account: AccountId, collateral_token: TokenId, index_token: TokenId, is_long: bool) -> Self {
        Self {
            account,
            collateral_token,
            index_token,
            side: Side::from_is_long(is_long),
        }
    }

    pub fn is_long(&self) -> bool {
        self.side.is_long()
    }
}

// 1.2: second-resolution clock. funding intervals and min profit windows are in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct Timestamp(pub u64);

impl Timestamp {
    pub fn now() -> Self {
        Self(chrono::Utc::now().timestamp().max(0) as u64)
    }

    pub fn from_secs(secs: u64) -> Self {
        Self(secs)
    }

    pub fn as_secs(&self) -> u64 {
        self.0
    }

    pub fn saturating_elapsed(&self, later: Timestamp) -> u64 {
        later.0.saturating_sub(self.0)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "t={}", self.0)
    }
}

// 1.3: identity and priority fee of whoever invokes an entry point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallContext {
    pub caller: AccountId,
    pub priority_fee: u64,
}

impl CallContext {
    pub fn new(caller: AccountId) -> Self {
        Self {
            caller,
            priority_fee: 0,
        }
    }

    pub fn with_priority_fee(mut self, priority_fee: u64) -> Self {
        self.priority_fee = priority_fee;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wall_clock_is_past_2024() {
        assert!(Timestamp::now().as_secs() > 1_704_067_200);
    }

    #[test]
    fn side_from_bool() {
        assert_eq!(Side::from_is_long(true), Side::Long);
        assert_eq!(Side::from_is_long(false), Side::Short);
        assert_eq!(Side::Long.opposite(), Side::Short);
        assert!(!Side::Short.is_long());
    }

    #[test]
    fn position_key_distinguishes_direction() {
        let long = PositionKey::new(AccountId(1), TokenId(1), TokenId(1), true);
        let short = PositionKey::new(AccountId(1), TokenId(1), TokenId(1), false);
        assert_ne!(long, short);
        assert!(long.is_long());
    }

    #[test]
    fn elapsed_never_underflows() {
        let t0 = Timestamp::from_secs(100);
        assert_eq!(t0.saturating_elapsed(Timestamp::from_secs(160)), 60);
        assert_eq!(t0.saturating_elapsed(Timestamp::from_secs(50)), 0);
    }
}
