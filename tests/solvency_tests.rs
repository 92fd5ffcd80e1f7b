//! Solvency invariant tests.
//!
//! Random sequences of ledger operations. Whatever commits, the ledger must keep
//! pool + fee reserve equal to what custody holds for it, reserves inside the
//! pool, and guaranteed usd equal to the open long exposure.

mod common;

use common::*;
use perps_vault::*;
use proptest::prelude::*;

#[derive(Debug, Clone)]
enum Action {
    Seed { stable: bool, amount: u64 },
    Long { sats: u64, size: u64 },
    Short { usdc: u64, size: u64 },
    CloseLong { pct: u64 },
    CloseShort { pct: u64 },
    Swap { to_btc: bool, amount: u64 },
    Sell { pct: u64 },
    Price { btc: u64 },
    Wait { secs: u64 },
    Liquidate { long: bool },
}

fn action_strategy() -> impl Strategy<Value = Action> {
    prop_oneof![
        (any::<bool>(), 1_000u64..10_000_000_000u64).prop_map(|(stable, amount)| Action::Seed { stable, amount }),
        (10_000u64..1_000_000u64, 10u64..5_000u64).prop_map(|(sats, size)| Action::Long { sats, size }),
        (1_000_000u64..1_000_000_000u64, 10u64..5_000u64).prop_map(|(usdc, size)| Action::Short { usdc, size }),
        (1u64..=100u64).prop_map(|pct| Action::CloseLong { pct }),
        (1u64..=100u64).prop_map(|pct| Action::CloseShort { pct }),
        (any::<bool>(), 1_000u64..100_000_000u64).prop_map(|(to_btc, amount)| Action::Swap { to_btc, amount }),
        (1u64..=100u64).prop_map(|pct| Action::Sell { pct }),
        (20_000u64..60_000u64).prop_map(|btc| Action::Price { btc }),
        (0u64..20_000u64).prop_map(|secs| Action::Wait { secs }),
        any::<bool>().prop_map(|long| Action::Liquidate { long }),
    ]
}

fn pct_of(size: Usd, pct: u64) -> Usd {
    size.mul_div(U256::from(pct), U256::from(100u64)).unwrap()
}

// funds are minted and sent just before the call, so a rejected call leaves them
// waiting in custody. sweep them into the pool so the next check sees a clean slate.
fn sweep(ledger: &mut Ledger, token: TokenId) {
    let _ = ledger.direct_pool_deposit(token);
}

fn apply(ledger: &mut Ledger, action: &Action) -> Result<(), LedgerError> {
    match *action {
        Action::Seed { stable, amount } => {
            let token = if stable { USDC } else { BTC };
            fund(ledger, LP, token, amount);
            let result = ledger.buy_unit_of_account(&ctx(LP), token, LP).map(|_| ());
            sweep(ledger, token);
            result
        }
        Action::Long { sats, size } => {
            let result = open_long(ledger, ALICE, sats, size).map(|_| ());
            sweep(ledger, BTC);
            result
        }
        Action::Short { usdc, size } => {
            let result = open_short(ledger, BOB, usdc, size).map(|_| ());
            sweep(ledger, USDC);
            result
        }
        Action::CloseLong { pct } => {
            let position = ledger.position(ALICE, BTC, BTC, true).ok_or(LedgerError::EmptyPosition)?;
            ledger
                .decrease_position(&ctx(ALICE), ALICE, BTC, BTC, Usd::ZERO, pct_of(position.size, pct), true, ALICE)
                .map(|_| ())
        }
        Action::CloseShort { pct } => {
            let position = ledger.position(BOB, USDC, BTC, false).ok_or(LedgerError::EmptyPosition)?;
            ledger
                .decrease_position(&ctx(BOB), BOB, USDC, BTC, Usd::ZERO, pct_of(position.size, pct), false, BOB)
                .map(|_| ())
        }
        Action::Swap { to_btc, amount } => {
            let (token_in, token_out) = if to_btc { (USDC, BTC) } else { (BTC, USDC) };
            fund(ledger, KEEPER, token_in, amount);
            let result = ledger.swap(&ctx(KEEPER), token_in, token_out, KEEPER).map(|_| ());
            sweep(ledger, token_in);
            result
        }
        Action::Sell { pct } => {
            let held = balance(ledger, LP, UOA);
            let amount = held * U256::from(pct) / U256::from(100u64);
            if amount.is_zero() {
                return Err(LedgerError::ZeroAmount);
            }
            ledger.transfer_in(LP, UOA, amount)?;
            let result = ledger.sell_unit_of_account(&ctx(LP), BTC, LP).map(|_| ());
            if result.is_err() {
                // nothing else can claim the parked units, hand them back
                let _ = ledger.sell_unit_of_account(&ctx(LP), USDC, LP);
            }
            result
        }
        Action::Price { btc } => {
            set_price(ledger, BTC, btc);
            Ok(())
        }
        Action::Wait { secs } => {
            ledger.advance_time(secs);
            Ok(())
        }
        Action::Liquidate { long } => {
            let (account, collateral) = if long { (ALICE, BTC) } else { (BOB, USDC) };
            ledger
                .liquidate_position(&ctx(KEEPER), account, collateral, BTC, long, KEEPER)
                .map(|_| ())
        }
    }
}

fn assert_exposure_tracked(ledger: &Ledger) {
    let mut long_exposure = Usd::ZERO;
    let mut short_size = Usd::ZERO;
    for (key, position) in ledger.positions_iter() {
        if key.is_long() {
            long_exposure = long_exposure
                .checked_add(position.size.checked_sub(position.collateral).unwrap())
                .unwrap();
        } else {
            short_size = short_size.checked_add(position.size).unwrap();
        }
        assert!(position.size >= position.collateral);
    }
    assert_eq!(ledger.pool(BTC).unwrap().guaranteed_usd, long_exposure);
    assert_eq!(ledger.pool(BTC).unwrap().global_short_size, short_size);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Pool + fee reserve always matches custody after any committed operation.
    #[test]
    fn custody_always_backs_pools(actions in proptest::collection::vec(action_strategy(), 1..40)) {
        let mut ledger = ledger();
        seed_pool(&mut ledger, BTC, 100_000_000);
        seed_pool(&mut ledger, USDC, 1_000_000_000_000);

        for action in &actions {
            let _ = apply(&mut ledger, action);
            assert_solvent(&ledger);
            assert_exposure_tracked(&ledger);
        }
    }

    /// A rejected operation leaves pools, positions and the event log untouched.
    #[test]
    fn rejected_operations_change_nothing(actions in proptest::collection::vec(action_strategy(), 1..40)) {
        let mut ledger = ledger();
        seed_pool(&mut ledger, BTC, 100_000_000);
        seed_pool(&mut ledger, USDC, 1_000_000_000_000);

        for action in &actions {
            let pools: Vec<PoolState> = ledger.pools().cloned().collect();
            let positions: Vec<(PositionKey, Position)> =
                ledger.positions_iter().map(|(k, p)| (*k, *p)).collect();
            let events = ledger.events().len();

            // only actions that don't deposit first, so a failure has nothing to sweep
            let result = match action {
                Action::CloseLong { .. } | Action::CloseShort { .. } | Action::Liquidate { .. } => apply(&mut ledger, action),
                _ => continue,
            };

            if result.is_err() {
                let after: Vec<PoolState> = ledger.pools().cloned().collect();
                prop_assert_eq!(&after, &pools);
                let mut before_positions = positions.clone();
                let mut after_positions: Vec<(PositionKey, Position)> =
                    ledger.positions_iter().map(|(k, p)| (*k, *p)).collect();
                before_positions.sort_by_key(|(k, _)| (k.account, k.collateral_token, k.index_token, k.is_long()));
                after_positions.sort_by_key(|(k, _)| (k.account, k.collateral_token, k.index_token, k.is_long()));
                prop_assert_eq!(after_positions, before_positions);
                prop_assert_eq!(ledger.events().len(), events);
            }
        }
    }
}

#[test]
fn donation_is_swept_into_next_deposit() {
    let mut ledger = ledger();
    seed_pool(&mut ledger, BTC, 250_000);

    // tokens sent with no call attached are picked up by the next measured deposit
    fund(&mut ledger, BOB, BTC, 5_000);
    fund(&mut ledger, ALICE, BTC, 25_000);
    let position = ledger
        .increase_position(&ctx(ALICE), ALICE, BTC, BTC, Usd::from_dollars(90), true)
        .unwrap();
    assert_eq!(position.collateral, Usd::from_dollars(12).checked_sub(Usd::from_dollars(90).bps(10).unwrap()).unwrap());
    assert_solvent(&ledger);
}
