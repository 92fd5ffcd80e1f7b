//! Shared fixtures: a BTC (8 decimals) / USDC (6 decimals) ledger at $40,000 / $1.

#![allow(dead_code)]

use perps_vault::*;
use rust_decimal::Decimal;

pub const BTC: TokenId = TokenId(1);
pub const USDC: TokenId = TokenId(2);
pub const UOA: TokenId = TokenId(100);

pub const ADMIN: AccountId = AccountId(0);
pub const LP: AccountId = AccountId(1);
pub const ALICE: AccountId = AccountId(2);
pub const BOB: AccountId = AccountId(3);
pub const KEEPER: AccountId = AccountId(9);

pub fn u(v: u64) -> U256 {
    U256::from(v)
}

pub fn usd(d: Decimal) -> Usd {
    Usd::from_decimal(d).unwrap()
}

pub fn ctx(account: AccountId) -> CallContext {
    CallContext::new(account)
}

pub fn ledger() -> Ledger {
    ledger_with(LedgerConfig::default())
}

pub fn ledger_with(config: LedgerConfig) -> Ledger {
    let mut ledger = Ledger::with_price_feed(config, ADMIN, UOA).unwrap();
    ledger.set_token_config(&ctx(ADMIN), BTC, TokenConfig::volatile(8)).unwrap();
    ledger.set_token_config(&ctx(ADMIN), USDC, TokenConfig::stable(6)).unwrap();
    set_price(&mut ledger, BTC, 40_000);
    set_price(&mut ledger, USDC, 1);
    ledger
}

pub fn set_price(ledger: &mut Ledger, token: TokenId, dollars: u64) {
    ledger.oracle_mut().set_price(token, Price::from_dollars(dollars));
}

/// Mint `amount` to `account` and send it to the ledger ahead of a call.
pub fn fund(ledger: &mut Ledger, account: AccountId, token: TokenId, amount: u64) {
    ledger.bank_mut().mint(token, Holder::Account(account), u(amount)).unwrap();
    ledger.transfer_in(account, token, u(amount)).unwrap();
}

/// LP buys unit of account with `amount` of `token`. Returns what was minted.
pub fn seed_pool(ledger: &mut Ledger, token: TokenId, amount: u64) -> U256 {
    fund(ledger, LP, token, amount);
    ledger.buy_unit_of_account(&ctx(LP), token, LP).unwrap()
}

pub fn balance(ledger: &Ledger, account: AccountId, token: TokenId) -> U256 {
    ledger.bank().balance_of(token, Holder::Account(account))
}

pub fn open_long(ledger: &mut Ledger, account: AccountId, sats: u64, size_dollars: u64) -> Result<Position, LedgerError> {
    fund(ledger, account, BTC, sats);
    ledger.increase_position(&ctx(account), account, BTC, BTC, Usd::from_dollars(size_dollars), true)
}

pub fn open_short(ledger: &mut Ledger, account: AccountId, usdc_units: u64, size_dollars: u64) -> Result<Position, LedgerError> {
    fund(ledger, account, USDC, usdc_units);
    ledger.increase_position(&ctx(account), account, USDC, BTC, Usd::from_dollars(size_dollars), false)
}

/// pool + fee reserve equals custody and reserved stays inside the pool, for every token.
pub fn assert_solvent(ledger: &Ledger) {
    for pool in ledger.pools() {
        let custody = ledger.bank().balance_of(pool.token, Holder::Ledger);
        assert_eq!(
            pool.pool_amount + pool.fee_reserve,
            custody,
            "{}: pool {} + fees {} != custody {}",
            pool.token,
            pool.pool_amount,
            pool.fee_reserve,
            custody
        );
        assert!(pool.reserved_amount <= pool.pool_amount, "{}: reserve above pool", pool.token);
    }
}
