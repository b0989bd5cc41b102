//! Smart Margin Account Simulation.
//!
//! Demonstrates the full account lifecycle including collateral management,
//! atomic command batches, fee imposition, and keeper-filled conditional
//! orders against a simulated derivatives venue.

use margin_account_core::*;
use rust_decimal_macros::dec;

const OWNER: Address = Address(0xA11CE);
const KEEPER: Address = Address(0xCAFE);
const ETH_PERP: MarketKey = MarketKey(1);

fn main() {
    println!("Smart Margin Account Simulation");
    println!("Single Owner, Simulated Venue, Full Lifecycle\n");

    scenario_1_collateral_management();
    scenario_2_command_batch();
    scenario_3_batch_rollback();
    scenario_4_conditional_limit_order();
    scenario_5_reduce_only_stop();
    scenario_6_double_fill_race();

    println!("\nAll simulations completed successfully.");
}

fn new_account() -> SmartAccount {
    SmartAccount::new(
        OWNER,
        KEEPER,
        ExchangeSettings::default(),
        AccountConfig::default(),
    )
}

fn new_venue() -> SimVenue {
    let mut venue = SimVenue::new();
    venue.add_market(ETH_PERP, Price::new_unchecked(dec!(2000)));
    venue
}

/// Deposits, withdrawals, and the gas balance.
fn scenario_1_collateral_management() {
    println!("Scenario 1: Collateral Management\n");

    let mut account = new_account();

    account.deposit(OWNER, Quote::new(dec!(10000))).unwrap();
    account.deposit_gas(Quote::new(dec!(25))).unwrap();
    println!("  Deposited $10,000 collateral and $25 gas");

    account.withdraw(OWNER, Quote::new(dec!(2500))).unwrap();
    println!("  Withdrew $2,500");
    println!(
        "  Balances: collateral ${}, gas ${}",
        account.collateral_balance(),
        account.gas_balance()
    );

    let err = account.withdraw(OWNER, Quote::new(dec!(100000))).unwrap_err();
    println!("  Over-withdrawal rejected: {}", err);

    let err = account.deposit(Address(0xBAD), Quote::new(dec!(1))).unwrap_err();
    println!("  Third-party deposit rejected: {}", err);
    println!("  Events recorded: {}\n", account.events().len());
}

/// A multi-command batch: margin in, atomic order, fee imposed.
fn scenario_2_command_batch() {
    println!("Scenario 2: Command Batch\n");

    let mut account = new_account();
    let mut venue = new_venue();
    account.deposit(OWNER, Quote::new(dec!(10000))).unwrap();

    println!("  ETH-PERP at $2,000");
    println!("  Batch: modify margin +$5,000, atomic order +2 ETH");

    account
        .execute(
            OWNER,
            &mut venue,
            &[
                CommandKind::ModifyMargin.opcode(),
                CommandKind::SubmitAtomicOrder.opcode(),
            ],
            &[
                vec![dec!(1), dec!(5000)],
                vec![dec!(1), dec!(2), dec!(0.01)],
            ],
        )
        .unwrap();

    let position = venue.position(ETH_PERP).unwrap();
    println!(
        "  Venue position: {} ETH, ${} margin",
        position.size, position.margin
    );
    println!(
        "  Account collateral: ${}, treasury accrued: ${}\n",
        account.collateral_balance(),
        account.treasury_accrued()
    );
}

/// A failing command aborts every earlier command in the batch.
fn scenario_3_batch_rollback() {
    println!("Scenario 3: Batch Rollback\n");

    let mut account = new_account();
    let mut venue = new_venue();
    account.deposit(OWNER, Quote::new(dec!(10000))).unwrap();

    println!("  Batch: modify margin +$5,000, then cancel a nonexistent order");

    let err = account
        .execute(
            OWNER,
            &mut venue,
            &[
                CommandKind::ModifyMargin.opcode(),
                CommandKind::CancelDelayedOrder.opcode(),
            ],
            &[vec![dec!(1), dec!(5000)], vec![dec!(1)]],
        )
        .unwrap_err();

    println!("  Batch failed: {}", err);
    println!(
        "  Collateral restored to ${}, venue position: {}\n",
        account.collateral_balance(),
        if venue.position(ETH_PERP).is_none() {
            "none"
        } else {
            "present"
        }
    );
}

/// Limit order placed, polled by the keeper, filled when price crosses.
fn scenario_4_conditional_limit_order() {
    println!("Scenario 4: Conditional Limit Order\n");

    let mut account = new_account();
    let mut venue = new_venue();
    account.deposit(OWNER, Quote::new(dec!(10000))).unwrap();
    account.deposit_gas(Quote::new(dec!(25))).unwrap();

    let id = account
        .place_conditional_order(
            OWNER,
            ConditionalOrderParams {
                market: ETH_PERP,
                margin_delta: Quote::new(dec!(2000)),
                size_delta: SignedSize::new(dec!(1)),
                target_price: dec!(1900),
                kind: ConditionalOrderKind::Limit,
                price_impact_delta: dec!(0.01),
                reduce_only: false,
            },
        )
        .unwrap();

    println!("  Placed limit buy 1 ETH @ $1,900 (id {:?})", id);

    let (eligible, _) = account.checker(&venue, id);
    println!("  Checker at $2,000: eligible = {}", eligible);

    venue.set_price(ETH_PERP, Price::new_unchecked(dec!(1890)));
    let (eligible, _) = account.checker(&venue, id);
    println!("  Checker at $1,890: eligible = {}", eligible);

    account.fill_conditional_order(KEEPER, &mut venue, id).unwrap();
    let order = venue.offchain_delayed_order(ETH_PERP).unwrap();
    println!(
        "  Keeper filled: off-chain order for {} ETH resting at venue",
        order.size_delta
    );
    println!(
        "  Gas after keeper fee: ${}, record cleared: {}\n",
        account.gas_balance(),
        account.conditional_order(id).is_empty()
    );
}

/// A reduce-only stop that outlives its position gets implicitly cancelled.
fn scenario_5_reduce_only_stop() {
    println!("Scenario 5: Reduce-Only Stop\n");

    let mut account = new_account();
    let mut venue = new_venue();
    account.deposit(OWNER, Quote::new(dec!(10000))).unwrap();
    account.deposit_gas(Quote::new(dec!(25))).unwrap();

    let id = account
        .place_conditional_order(
            OWNER,
            ConditionalOrderParams {
                market: ETH_PERP,
                margin_delta: Quote::zero(),
                size_delta: SignedSize::new(dec!(-1)),
                target_price: dec!(1800),
                kind: ConditionalOrderKind::Stop,
                price_impact_delta: dec!(0.01),
                reduce_only: true,
            },
        )
        .unwrap();

    println!("  Placed reduce-only stop sell 1 ETH @ $1,800 (id {:?})", id);
    println!("  Position was closed elsewhere; stop is now meaningless");

    venue.set_price(ETH_PERP, Price::new_unchecked(dec!(1750)));
    account.fill_conditional_order(KEEPER, &mut venue, id).unwrap();

    let cancelled = account.events().iter().any(|e| {
        matches!(
            &e.payload,
            EventPayload::ConditionalOrderCancelled(ev)
                if ev.reason == ConditionalCancelReason::ReduceOnlyInvalid
        )
    });
    println!(
        "  Keeper call cancelled the order instead of filling: {}",
        cancelled
    );
    println!("  No venue order submitted: {}\n", venue.offchain_delayed_order(ETH_PERP).is_none());
}

/// Two keepers race to fill the same order; exactly one succeeds.
fn scenario_6_double_fill_race() {
    println!("Scenario 6: Double-Fill Race\n");

    let mut account = new_account();
    let mut venue = new_venue();
    account.deposit(OWNER, Quote::new(dec!(10000))).unwrap();
    account.deposit_gas(Quote::new(dec!(25))).unwrap();

    let id = account
        .place_conditional_order(
            OWNER,
            ConditionalOrderParams {
                market: ETH_PERP,
                margin_delta: Quote::new(dec!(1000)),
                size_delta: SignedSize::new(dec!(1)),
                target_price: dec!(1900),
                kind: ConditionalOrderKind::Limit,
                price_impact_delta: dec!(0.01),
                reduce_only: false,
            },
        )
        .unwrap();

    venue.set_price(ETH_PERP, Price::new_unchecked(dec!(1890)));

    account.fill_conditional_order(KEEPER, &mut venue, id).unwrap();
    println!("  First fill succeeded");

    let err = account
        .fill_conditional_order(KEEPER, &mut venue, id)
        .unwrap_err();
    println!("  Second fill rejected: {}", err);

    let fills = account
        .events()
        .iter()
        .filter(|e| matches!(e.payload, EventPayload::ConditionalOrderFilled(_)))
        .count();
    println!("  ConditionalOrderFilled events: {}", fills);
}
