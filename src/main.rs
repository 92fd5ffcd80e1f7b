//! Perpetual Vault Simulation.
//!
//! Walks the ledger through a long position lifecycle, a pool swap and a short
//! liquidation, printing pool accounting after each step.

use perps_vault::*;

const BTC: TokenId = TokenId(1);
const USDC: TokenId = TokenId(2);
const UOA: TokenId = TokenId(100);
const ADMIN: AccountId = AccountId(0);

fn main() {
    tracing_subscriber::fmt::init();

    println!("Perpetual Vault Simulation");
    println!("Shared Pools, Multi-Collateral, Full Lifecycle\n");

    if let Err(e) = run() {
        eprintln!("simulation failed: {}", e);
        std::process::exit(1);
    }

    println!("\nAll simulations completed successfully.");
}

fn run() -> Result<(), LedgerError> {
    scenario_1_long_lifecycle()?;
    scenario_2_swap()?;
    scenario_3_short_liquidation()?;
    Ok(())
}

fn setup() -> Result<Ledger, LedgerError> {
    let mut ledger = Ledger::with_price_feed(LedgerConfig::default(), ADMIN, UOA)?;
    // start on the wall clock
    ledger.set_time(Timestamp::now());
    let admin = CallContext::new(ADMIN);
    ledger.set_token_config(&admin, BTC, TokenConfig::volatile(8))?;
    ledger.set_token_config(&admin, USDC, TokenConfig::stable(6))?;
    ledger.oracle_mut().set_price(BTC, Price::from_dollars(40_000));
    ledger.oracle_mut().set_price(USDC, Price::from_dollars(1));
    Ok(ledger)
}

fn deposit(ledger: &mut Ledger, account: AccountId, token: TokenId, amount: u64) -> Result<(), LedgerError> {
    let amount = U256::from(amount);
    ledger.bank_mut().mint(token, Holder::Account(account), amount)?;
    ledger.transfer_in(account, token, amount)?;
    Ok(())
}

fn print_pool(ledger: &Ledger, token: TokenId) {
    if let Some(pool) = ledger.pool(token) {
        println!(
            "  {}: pool {}, reserved {}, fees {}, guaranteed {}",
            token, pool.pool_amount, pool.reserved_amount, pool.fee_reserve, pool.guaranteed_usd
        );
    }
}

/// Open a 9x BTC long, then close it in profit.
fn scenario_1_long_lifecycle() -> Result<(), LedgerError> {
    println!("Scenario 1: BTC Long Lifecycle\n");

    let mut ledger = setup()?;
    let lp = AccountId(1);
    let trader = AccountId(2);

    deposit(&mut ledger, lp, BTC, 250_000)?;
    let minted = ledger.buy_unit_of_account(&CallContext::new(lp), BTC, lp)?;
    println!("  LP deposits 250,000 sats, receives {} units of account", minted);
    print_pool(&ledger, BTC);

    deposit(&mut ledger, trader, BTC, 25_000)?;
    let position = ledger.increase_position(&CallContext::new(trader), trader, BTC, BTC, Usd::from_dollars(90), true)?;
    println!(
        "\n  Trader opens long: size {}, collateral {}, entry {}",
        position.size, position.collateral, position.average_price
    );
    print_pool(&ledger, BTC);

    ledger.oracle_mut().set_price(BTC, Price::from_dollars(45_100));
    let (has_profit, delta) = ledger.position_delta(trader, BTC, BTC, true)?;
    println!("\n  BTC moves to $45,100, pnl {}{}", if has_profit { "+" } else { "-" }, delta);

    let out = ledger.decrease_position(
        &CallContext::new(trader),
        trader,
        BTC,
        BTC,
        Usd::from_dollars(4),
        Usd::from_dollars(90),
        true,
        trader,
    )?;
    println!("  Trader closes, receives {} sats", out);
    print_pool(&ledger, BTC);
    println!();
    Ok(())
}

/// Swap 1,000 USDC into BTC against a seeded pool.
fn scenario_2_swap() -> Result<(), LedgerError> {
    println!("Scenario 2: Pool Swap\n");

    let mut ledger = setup()?;
    let lp = AccountId(1);
    let user = AccountId(3);

    deposit(&mut ledger, lp, BTC, 100_000_000)?;
    ledger.buy_unit_of_account(&CallContext::new(lp), BTC, lp)?;

    deposit(&mut ledger, user, USDC, 1_000_000_000)?;
    let out = ledger.swap(&CallContext::new(user), USDC, BTC, user)?;
    println!("  1,000 USDC swapped for {} sats", out);
    print_pool(&ledger, USDC);
    print_pool(&ledger, BTC);
    println!();
    Ok(())
}

/// Short BTC against USDC collateral and get liquidated on a rally.
fn scenario_3_short_liquidation() -> Result<(), LedgerError> {
    println!("Scenario 3: Short Liquidation\n");

    let mut ledger = setup()?;
    let lp = AccountId(1);
    let trader = AccountId(4);
    let keeper = AccountId(5);

    deposit(&mut ledger, lp, USDC, 100_000_000_000)?;
    ledger.buy_unit_of_account(&CallContext::new(lp), USDC, lp)?;

    deposit(&mut ledger, trader, USDC, 10_000_000)?;
    ledger.increase_position(&CallContext::new(trader), trader, USDC, BTC, Usd::from_dollars(90), false)?;
    println!("  Trader shorts $90 of BTC with $10 USDC at $40,000");

    ledger.oracle_mut().set_price(BTC, Price::from_dollars(45_000));
    let (state, fees) = ledger.validate_liquidation(trader, USDC, BTC, false)?;
    println!("  BTC rallies to $45,000, liquidation state {} (fees {})", state.code(), fees);

    let result = ledger.liquidate_position(&CallContext::new(keeper), trader, USDC, BTC, false, keeper)?;
    println!(
        "  Keeper liquidates, earns {} USDC units",
        result.liquidation_fee_tokens
    );
    print_pool(&ledger, USDC);
    println!("  Events recorded: {}", ledger.events().len());
    Ok(())
}
