//! Integration tests for the reserve protocol.
//!
//! These tests drive the whole ledger world through the engine.

use reserve_protocol::prelude::*;
use reserve_protocol::utils::constants::{COLLATERAL_UNIT, SECONDS_PER_DAY, STABLE_UNIT};

// ═══════════════════════════════════════════════════════════════════════════════
// TEST HELPERS
// ═══════════════════════════════════════════════════════════════════════════════

const GENESIS: u64 = 1_700_000_000;

fn alice() -> Address {
    Address::derive("alice")
}

fn saver() -> Address {
    Address::derive("saver")
}

fn deploy(params: ProtocolParams) -> Protocol {
    Protocol::new(params, GENESIS).unwrap()
}

fn fund(protocol: &mut Protocol, account: &Address, collateral: u128) {
    let reserve = protocol.registry().reserve;
    protocol.faucet_collateral(account, collateral).unwrap();
    protocol.approve_collateral(account, &reserve, u128::MAX).unwrap();
}

/// Deployment with a 5% redemption tax, a market maker holding 1M stable and a
/// saver with 100k stable in the flywheel. The pair prices the stable asset at
/// `collateral_side / 1M`.
fn flywheel(collateral_side: u128) -> Protocol {
    let params = ProtocolParams::default().with_redemption_tax("0.05".parse().unwrap());
    let mut protocol = deploy(params);
    let registry = protocol.registry().clone();
    let maker = Address::derive("market-maker");

    fund(&mut protocol, &maker, 1_000_000 * COLLATERAL_UNIT);
    protocol.mint(&maker, 1_000_000 * STABLE_UNIT).unwrap();
    fund(&mut protocol, &saver(), 100_000 * COLLATERAL_UNIT);
    protocol.mint(&saver(), 100_000 * STABLE_UNIT).unwrap();

    protocol
        .set_pair_reserves(1_000_000 * STABLE_UNIT, collateral_side)
        .unwrap();
    protocol.stabilizer_setup(&registry.authority).unwrap();
    assert_eq!(protocol.stabilizer_settle().unwrap(), 0);

    protocol
        .approve_stable(&saver(), &registry.stabilizer, u128::MAX)
        .unwrap();
    protocol
        .stabilizer_supply(&saver(), 100_000 * STABLE_UNIT)
        .unwrap();
    protocol
}

fn next_day(protocol: &mut Protocol) -> u128 {
    protocol.advance_time(SECONDS_PER_DAY).unwrap();
    protocol.stabilizer_settle().unwrap()
}

// ═══════════════════════════════════════════════════════════════════════════════
// RESERVE TESTS
// ═══════════════════════════════════════════════════════════════════════════════

#[test]
fn test_mint_and_full_redeem() {
    let mut protocol = deploy(ProtocolParams::default());
    fund(&mut protocol, &alice(), 100_000);

    let cost = protocol.mint(&alice(), 100_000 * 10u128.pow(12)).unwrap();
    assert_eq!(cost, 100_000);
    assert_eq!(protocol.collateral_balance(&alice()), 0);
    assert_eq!(protocol.reserve_ratio().unwrap(), Decimal::ONE);
    assert_eq!(protocol.reserve_balance().unwrap(), 100_000 * 10u128.pow(12));

    let payout = protocol.redeem(&alice(), 100_000 * 10u128.pow(12)).unwrap();
    assert_eq!(payout, 100_000);
    assert_eq!(protocol.reserve_balance().unwrap(), 0);
    assert_eq!(protocol.collateral_balance(&alice()), 100_000);
    assert_eq!(protocol.stable_supply(), 0);

    let types: Vec<_> = protocol
        .events()
        .records()
        .iter()
        .map(|r| r.event.event_type())
        .collect();
    assert_eq!(types, vec!["Mint", "Redeem"]);
}

#[test]
fn test_mint_cost_rounds_up() {
    let mut protocol = deploy(ProtocolParams::default());
    fund(&mut protocol, &alice(), 10 * COLLATERAL_UNIT);

    assert_eq!(protocol.mint(&alice(), 1).unwrap(), 1);
    assert_eq!(protocol.mint(&alice(), 10u128.pow(12) + 1).unwrap(), 2);
    assert_eq!(protocol.mint(&alice(), 10u128.pow(12)).unwrap(), 1);
}

#[test]
fn test_redeem_payout_truncates() {
    let mut protocol = deploy(ProtocolParams::default());
    fund(&mut protocol, &alice(), 10 * COLLATERAL_UNIT);

    protocol.mint(&alice(), 3 * 10u128.pow(12)).unwrap();
    assert_eq!(protocol.redeem(&alice(), 10u128.pow(12) - 1).unwrap(), 0);
}

#[test]
fn test_redemption_tax_lowers_payout() {
    let mut protocol = deploy(ProtocolParams::default());
    let authority = protocol.registry().authority;
    fund(&mut protocol, &alice(), 1_000 * COLLATERAL_UNIT);
    protocol.mint(&alice(), 1_000 * STABLE_UNIT).unwrap();

    protocol
        .set_redemption_tax(&authority, "0.1".parse().unwrap())
        .unwrap();
    assert_eq!(protocol.redeem_price().unwrap(), "0.9".parse().unwrap());
    assert_eq!(protocol.redeem(&alice(), 100 * STABLE_UNIT).unwrap(), 90 * COLLATERAL_UNIT);

    // The tax stays in the reserve
    assert!(protocol.reserve_ratio().unwrap() > Decimal::ONE);
}

#[test]
fn test_failed_mint_rolls_back_everything() {
    let mut protocol = deploy(ProtocolParams::default());
    fund(&mut protocol, &alice(), 100 * COLLATERAL_UNIT);
    let events_before = protocol.events().len();

    protocol.set_pool_paused(true);
    let err = protocol.mint(&alice(), 10 * STABLE_UNIT).unwrap_err();
    assert_eq!(err.kind(), "ExternalCallFailed");
    assert_eq!(err.tag(), "yield-pool-supply");

    assert_eq!(protocol.collateral_balance(&alice()), 100 * COLLATERAL_UNIT);
    assert_eq!(protocol.stable_balance(&alice()), 0);
    assert_eq!(protocol.events().len(), events_before);
}

#[test]
fn test_failed_redeem_keeps_stable() {
    let mut protocol = deploy(ProtocolParams::default());
    fund(&mut protocol, &alice(), 100 * COLLATERAL_UNIT);
    protocol.mint(&alice(), 10 * STABLE_UNIT).unwrap();

    protocol.set_pool_paused(true);
    let err = protocol.redeem(&alice(), 10 * STABLE_UNIT).unwrap_err();
    assert_eq!(
        err,
        Error::ExternalCallFailed {
            call: "yield-pool-redeem",
            status: PoolStatus::Paused.code()
        }
    );
    assert_eq!(protocol.stable_balance(&alice()), 10 * STABLE_UNIT);

    protocol.set_pool_paused(false);
    assert_eq!(protocol.redeem(&alice(), 10 * STABLE_UNIT).unwrap(), 10 * COLLATERAL_UNIT);
}

#[test]
fn test_yield_accrual_raises_ratio() {
    let mut protocol = deploy(ProtocolParams::default());
    fund(&mut protocol, &alice(), 1_000 * COLLATERAL_UNIT);
    protocol.mint(&alice(), 1_000 * STABLE_UNIT).unwrap();

    protocol.accrue_yield(50 * COLLATERAL_UNIT).unwrap();
    assert_eq!(protocol.reserve_ratio().unwrap(), "1.05".parse().unwrap());
    // Redemptions never pay above par
    assert_eq!(protocol.redeem_price().unwrap(), Decimal::ONE);
}

#[test]
fn test_insufficient_allowance() {
    let mut protocol = deploy(ProtocolParams::default());
    protocol.faucet_collateral(&alice(), 100 * COLLATERAL_UNIT).unwrap();

    let err = protocol.mint(&alice(), STABLE_UNIT).unwrap_err();
    assert_eq!(err.kind(), "InsufficientFunds");
    assert_eq!(err.tag(), "allowance");
}

// ═══════════════════════════════════════════════════════════════════════════════
// AUTHORIZATION TESTS
// ═══════════════════════════════════════════════════════════════════════════════

#[test]
fn test_privileged_operations_reject_strangers() {
    let mut protocol = deploy(ProtocolParams::default());

    let err = protocol.stabilizer_setup(&alice()).unwrap_err();
    assert_eq!(err, Error::Unauthorized { action: "stabilizer-setup" });

    let err = protocol.set_redemption_tax(&alice(), Decimal::ZERO).unwrap_err();
    assert_eq!(err, Error::Unauthorized { action: "set-redemption-tax" });

    let err = protocol.set_reward_rate(&alice(), Decimal::ZERO).unwrap_err();
    assert_eq!(err.kind(), "Unauthorized");
}

#[test]
fn test_governance_setters_emit_events() {
    let mut protocol = deploy(ProtocolParams::default());
    let authority = protocol.registry().authority;

    protocol
        .execute(Operation::SetMaxAlpha {
            caller: authority,
            value: "0.2".parse().unwrap(),
        })
        .unwrap();
    protocol
        .execute(Operation::SetDecayRate {
            caller: authority,
            value: "2".parse().unwrap(),
        })
        .unwrap();

    let changes = protocol.events().filter_by_type("ParameterChanged");
    assert_eq!(changes.len(), 2);

    let err = protocol
        .set_max_alpha(&authority, "1.5".parse().unwrap())
        .unwrap_err();
    assert_eq!(err.kind(), "InvalidParameter");
}

#[test]
fn test_settle_before_setup_fails() {
    let mut protocol = deploy(ProtocolParams::default());
    let err = protocol.stabilizer_settle().unwrap_err();
    assert_eq!(err, Error::InvalidState("oracle-not-setup"));
}

// ═══════════════════════════════════════════════════════════════════════════════
// FLYWHEEL TESTS
// ═══════════════════════════════════════════════════════════════════════════════

#[test]
fn test_flywheel_borrows_below_par() {
    let mut protocol = flywheel(900_000 * COLLATERAL_UNIT);
    let stabilizer = protocol.registry().stabilizer;

    // First day: the rate uses the EMA from before the snapshot, still at par
    assert_eq!(next_day(&mut protocol), 0);
    let ema = protocol.ema().unwrap();
    assert!(ema <= "0.99".parse().unwrap());
    assert!(ema > "0.98".parse().unwrap());

    let borrowed = next_day(&mut protocol);
    assert!(borrowed >= STABLE_UNIT);
    assert!(borrowed < 2 * STABLE_UNIT);

    assert_eq!(protocol.total_debt(), borrowed);
    assert_eq!(protocol.debt_of(&stabilizer), borrowed);
    assert_eq!(protocol.stabilizer_underlying(), 100_000 * STABLE_UNIT + borrowed);
    assert_eq!(protocol.events().filter_by_type("Borrow").len(), 1);

    let earned = protocol.earned(&saver()).unwrap();
    assert!(earned <= borrowed);
    assert!(borrowed - earned < 1_000_000);
}

#[test]
fn test_flywheel_redeem_pays_rewards() {
    let mut protocol = flywheel(900_000 * COLLATERAL_UNIT);
    next_day(&mut protocol);
    let borrowed = next_day(&mut protocol);

    let shares = protocol.share_balance(&saver());
    let amount = protocol.stabilizer_redeem(&saver(), shares).unwrap();
    assert_eq!(amount, 100_000 * STABLE_UNIT + borrowed);
    assert_eq!(protocol.share_balance(&saver()), 0);
    assert_eq!(protocol.stable_balance(&saver()), amount);
}

#[test]
fn test_settle_debt_returns_collateral() {
    let mut protocol = flywheel(900_000 * COLLATERAL_UNIT);
    next_day(&mut protocol);
    let borrowed = next_day(&mut protocol);
    let shares = protocol.share_balance(&saver());
    protocol.stabilizer_redeem(&saver(), shares).unwrap();

    let before = protocol.collateral_balance(&saver());
    let proceeds = protocol.settle_debt(&saver(), borrowed).unwrap();
    assert_eq!(proceeds, borrowed / 10u128.pow(12));
    assert_eq!(protocol.collateral_balance(&saver()), before + proceeds);
    assert_eq!(protocol.total_debt(), 0);

    let err = protocol.settle_debt(&saver(), 1).unwrap_err();
    assert_eq!(err, Error::InvalidState("settle-exceeds-debt"));
}

#[test]
fn test_thin_pair_is_unhealthy() {
    // 50k collateral is below the 100k liquidity floor
    let mut protocol = flywheel(50_000 * COLLATERAL_UNIT);
    assert_eq!(next_day(&mut protocol), 0);
    assert_eq!(protocol.ema(), Some(Decimal::ONE));
    assert_eq!(next_day(&mut protocol), 0);
    assert_eq!(protocol.total_debt(), 0);
}

#[test]
fn test_restricted_pair_is_unhealthy() {
    let mut protocol = flywheel(900_000 * COLLATERAL_UNIT);
    let pair = protocol.world().pair.address();
    protocol.restrict(&pair).unwrap();

    assert_eq!(next_day(&mut protocol), 0);
    assert_eq!(protocol.ema(), Some(Decimal::ONE));

    protocol.unrestrict(&pair).unwrap();
    next_day(&mut protocol);
    assert!(protocol.ema().unwrap() < Decimal::ONE);
}

#[test]
fn test_no_incentive_when_fully_backed_without_tax() {
    let mut protocol = flywheel(900_000 * COLLATERAL_UNIT);
    let authority = protocol.registry().authority;
    protocol.set_redemption_tax(&authority, Decimal::ZERO).unwrap();

    next_day(&mut protocol);
    assert_eq!(next_day(&mut protocol), 0);
}

#[test]
fn test_share_transfer_moves_rewards_checkpoint() {
    let mut protocol = flywheel(900_000 * COLLATERAL_UNIT);
    next_day(&mut protocol);
    next_day(&mut protocol);

    let bob = Address::derive("bob");
    let shares = protocol.share_balance(&saver());
    let earned_before = protocol.earned(&saver()).unwrap();
    protocol
        .execute(Operation::ShareTransfer {
            from: saver(),
            to: bob,
            shares,
        })
        .unwrap();

    assert_eq!(protocol.share_balance(&bob), shares);
    assert_eq!(protocol.earned(&saver()).unwrap(), earned_before);
    assert_eq!(protocol.earned(&bob).unwrap(), 0);
}

// ═══════════════════════════════════════════════════════════════════════════════
// PERSISTENCE TESTS
// ═══════════════════════════════════════════════════════════════════════════════

#[test]
fn test_export_import_continues_identically() {
    let mut original = flywheel(900_000 * COLLATERAL_UNIT);
    next_day(&mut original);

    let mut restored = Protocol::import_state(&original.export_state().unwrap()).unwrap();
    assert_eq!(restored.world(), original.world());
    assert_eq!(restored.now(), original.now());

    let a = next_day(&mut original);
    let b = next_day(&mut restored);
    assert_eq!(a, b);
    assert_eq!(original.events().digest(), restored.events().digest());
}

#[test]
fn test_snapshot_file_roundtrip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("state.rsvp");
    let protocol = flywheel(900_000 * COLLATERAL_UNIT);

    reserve_protocol::storage::write_snapshot(&path, &protocol.to_state()).unwrap();
    let restored = Protocol::from_state(reserve_protocol::storage::read_snapshot(&path).unwrap());
    assert_eq!(restored.world(), protocol.world());
}
