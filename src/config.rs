// 7.0 config.rs: all ledger settings in one place. fees, funding, leverage, modes.
// 7.1 FeeSchedule is in bps except the liquidation fee which is a flat usd amount.
// human values are Decimal here and only become fixed point inside the ledger.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use ruint::aliases::U256;
use serde::{Deserialize, Serialize};

use crate::fixed::{MathError, Usd, BASIS_POINTS_DIVISOR};

/** 7.2: fee settings. 100 bps = 1% */
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeeSchedule {
    // dynamic fee slope for volatile tokens
    pub tax_bps: u32,
    pub stable_tax_bps: u32,
    // buy/sell of the unit of account
    pub mint_burn_fee_bps: u32,
    pub swap_fee_bps: u32,
    pub stable_swap_fee_bps: u32,
    // charged on every size change
    pub margin_fee_bps: u32,
    // flat incentive paid to whoever liquidates
    pub liquidation_fee_usd: Decimal,
    // profits under min_profit_bps are ignored for this long after an increase (seconds)
    pub min_profit_time: u64,
    pub has_dynamic_fees: bool,
}

impl Default for FeeSchedule {
    fn default() -> Self {
        Self {
            tax_bps: 50,
            stable_tax_bps: 20,
            mint_burn_fee_bps: 30,
            swap_fee_bps: 30,
            stable_swap_fee_bps: 4,
            margin_fee_bps: 10,
            liquidation_fee_usd: dec!(0.05),
            min_profit_time: 60 * 60,
            has_dynamic_fees: false,
        }
    }
}

impl FeeSchedule {
    pub fn liquidation_fee(&self) -> Result<Usd, MathError> {
        Usd::from_decimal(self.liquidation_fee_usd)
    }
}

// 7.3: funding accrues per whole interval, proportional to utilization
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FundingConfig {
    pub funding_interval_secs: u64,
    // per interval, in FUNDING_RATE_PRECISION units at 100% utilization
    pub funding_rate_factor: u32,
    pub stable_funding_rate_factor: u32,
}

impl Default for FundingConfig {
    fn default() -> Self {
        Self {
            funding_interval_secs: 60 * 60,
            funding_rate_factor: 100,
            stable_funding_rate_factor: 100,
        }
    }
}

// 7.4: the whole ledger
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerConfig {
    pub fees: FeeSchedule,
    pub funding: FundingConfig,
    // 500_000 bps = 50x
    pub max_leverage_bps: u32,
    // 0 disables the guard
    pub max_priority_fee: u64,
    pub is_swap_enabled: bool,
    pub is_leverage_enabled: bool,
    pub in_manager_mode: bool,
    pub in_private_liquidation_mode: bool,
    // maximum number of audit events kept in memory
    pub max_events: usize,
    // mirror every event to the log at info level
    pub verbose: bool,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            fees: FeeSchedule::default(),
            funding: FundingConfig::default(),
            max_leverage_bps: 500_000,
            max_priority_fee: 0,
            is_swap_enabled: true,
            is_leverage_enabled: true,
            in_manager_mode: false,
            in_private_liquidation_mode: false,
            max_events: 100_000,
            verbose: false,
        }
    }
}

impl LedgerConfig {
    // cheap fees, dynamic curve on so it gets exercised
    pub fn testnet() -> Self {
        let mut config = Self::default();
        config.fees.has_dynamic_fees = true;
        config.fees.margin_fee_bps = 5;
        config.max_leverage_bps = 1_000_000; // 100x
        config
    }

    // lower leverage, keepers only, priority fee capped
    pub fn mainnet_conservative() -> Self {
        let mut config = Self::default();
        config.fees.has_dynamic_fees = true;
        config.fees.liquidation_fee_usd = dec!(5);
        config.max_leverage_bps = 300_000; // 30x
        config.max_priority_fee = 3_000_000_000;
        config.in_private_liquidation_mode = true;
        config.funding.funding_interval_secs = 8 * 60 * 60;
        config
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let bps_fields = [
            ("tax_bps", self.fees.tax_bps),
            ("stable_tax_bps", self.fees.stable_tax_bps),
            ("mint_burn_fee_bps", self.fees.mint_burn_fee_bps),
            ("swap_fee_bps", self.fees.swap_fee_bps),
            ("stable_swap_fee_bps", self.fees.stable_swap_fee_bps),
        ];
        for (name, value) in bps_fields {
            if value > 500 {
                return Err(ConfigError::InvalidFees {
                    reason: format!("{} above 5%", name),
                });
            }
        }

        if self.fees.margin_fee_bps > 500 {
            return Err(ConfigError::InvalidFees {
                reason: "margin fee above 5%".to_string(),
            });
        }

        if self.fees.liquidation_fee_usd < Decimal::ZERO || self.fees.liquidation_fee_usd > dec!(100) {
            return Err(ConfigError::InvalidFees {
                reason: "liquidation fee must be between 0 and 100 usd".to_string(),
            });
        }

        if self.fees.min_profit_time > 24 * 60 * 60 {
            return Err(ConfigError::InvalidFees {
                reason: "min profit time longer than a day".to_string(),
            });
        }

        // must be above 1x or every position is over-leveraged
        if U256::from(self.max_leverage_bps) <= BASIS_POINTS_DIVISOR {
            return Err(ConfigError::InvalidLeverage {
                reason: "max leverage must exceed 1x".to_string(),
            });
        }

        if self.funding.funding_interval_secs < 60 {
            return Err(ConfigError::InvalidFunding {
                reason: "funding interval under a minute".to_string(),
            });
        }

        if self.funding.funding_rate_factor > 10_000 || self.funding.stable_funding_rate_factor > 10_000 {
            return Err(ConfigError::InvalidFunding {
                reason: "funding rate factor above 1% per interval".to_string(),
            });
        }

        if self.max_events == 0 {
            return Err(ConfigError::InvalidLedger {
                reason: "max_events must be positive".to_string(),
            });
        }

        Ok(())
    }
}

// 7.5: per token whitelist entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenConfig {
    pub decimals: u8,
    // relative share of the pool this token should hold
    pub weight: u32,
    pub min_profit_bps: u32,
    pub is_stable: bool,
    pub is_shortable: bool,
    // cap on unit of account issued against this token. 0 = uncapped
    pub max_unit_of_account_amount: U256,
    // swaps never take the pool below this
    pub buffer_amount: U256,
}

impl TokenConfig {
    pub fn volatile(decimals: u8) -> Self {
        Self {
            decimals,
            weight: 10_000,
            min_profit_bps: 75,
            is_stable: false,
            is_shortable: true,
            max_unit_of_account_amount: U256::ZERO,
            buffer_amount: U256::ZERO,
        }
    }

    pub fn stable(decimals: u8) -> Self {
        Self {
            decimals,
            weight: 10_000,
            min_profit_bps: 75,
            is_stable: true,
            is_shortable: false,
            max_unit_of_account_amount: U256::ZERO,
            buffer_amount: U256::ZERO,
        }
    }

    pub fn with_weight(mut self, weight: u32) -> Self {
        self.weight = weight;
        self
    }

    pub fn with_buffer(mut self, buffer_amount: U256) -> Self {
        self.buffer_amount = buffer_amount;
        self
    }

    pub fn with_max_unit_of_account(mut self, max: U256) -> Self {
        self.max_unit_of_account_amount = max;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.decimals > 30 {
            return Err(ConfigError::InvalidToken {
                reason: "more than 30 decimals".to_string(),
            });
        }
        if self.is_stable && self.is_shortable {
            return Err(ConfigError::InvalidToken {
                reason: "stable tokens cannot be shorted".to_string(),
            });
        }
        if U256::from(self.min_profit_bps) > BASIS_POINTS_DIVISOR {
            return Err(ConfigError::InvalidToken {
                reason: "min profit above 100%".to_string(),
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid fees: {reason}")]
    InvalidFees { reason: String },

    #[error("invalid leverage: {reason}")]
    InvalidLeverage { reason: String },

    #[error("invalid funding: {reason}")]
    InvalidFunding { reason: String },

    #[error("invalid token: {reason}")]
    InvalidToken { reason: String },

    #[error("invalid ledger settings: {reason}")]
    InvalidLedger { reason: String },
}

// Environment presets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Environment {
    Development,
    Testnet,
    Mainnet,
}

impl Environment {
    pub fn config(&self) -> LedgerConfig {
        match self {
            Environment::Development => LedgerConfig::default(),
            Environment::Testnet => LedgerConfig::testnet(),
            Environment::Mainnet => LedgerConfig::mainnet_conservative(),
        }
    }
}
