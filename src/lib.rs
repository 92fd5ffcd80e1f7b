// perps-vault: multi-collateral perpetual ledger.
// solvency-first: one pool per token backs every position, swap and redemption,
// and no operation commits unless pool + fee reserve still match custody.
// all computation is deterministic fixed point with no external I/O.
//
// file map (search X.0 for structs, X.1+ for logic):
//   1.x  types.rs: ids, side, position key, timestamp, call context
//   2.x  fixed.rs: 30 decimal Usd / Price, mul_div, token conversions
//   3.x  liquidity.rs: per token pool counters and their checked mutators
//   4.x  position.rs: position row, pnl delta, average price, liquidation state
//   5.x  funding.rs: interval funding on utilization
//   6.x  custody.rs: token balances held by accounts and the ledger
//   7.x  config.rs: fee schedule, funding, token whitelist entries, presets
//   8.x  engine/: ledger, staged transactions, position and liquidity ops
//   9.x  oracle.rs: min/max price source
//   10.x fees.rs: margin fees and the dynamic weight fee curve
//   11.x events.rs: state transition events for audit

// core ledger modules
pub mod engine;
pub mod events;
pub mod fees;
pub mod fixed;
pub mod funding;
pub mod liquidity;
pub mod position;
pub mod types;

// integration modules
pub mod config;
pub mod custody;
pub mod oracle;

// re exports for convenience
pub use config::{ConfigError, Environment, FeeSchedule, FundingConfig, LedgerConfig, TokenConfig};
pub use custody::{CustodyError, Holder, TokenBank, TransferOp};
pub use engine::*;
pub use events::*;
pub use fixed::{MathError, Price, SignedUsd, Usd, PRICE_PRECISION, USD_DECIMALS};
pub use liquidity::{LiquidityError, PoolState};
pub use oracle::{OracleError, PriceFeed, PriceFeedConfig, PriceOracle, StaticOracle};
pub use position::{LiquidationState, Position, PositionError};
pub use types::*;

pub use ruint::aliases::U256;
