// 8.0: the ledger engine. owns pools, positions, roles and custody, and runs every
// state change as a staged transaction that either commits whole or not at all.
// deterministic: the clock and prices are inputs, nothing reads the wall clock.

mod config;
mod core;
mod decrease;
mod increase;
mod liquidation;
mod liquidity_ops;
mod positions;
mod results;
mod swap;
mod tx;

pub use core::Ledger;
pub use results::{LedgerError, LiquidationResult};
