//! End-to-end ledger scenarios against the public API.

use std::sync::Arc;

use multivault_kernel::arithmetic::WAD;
use multivault_kernel::curves::{BondingCurve, LinearCurve};
use multivault_kernel::domain::{TermKind, VaultPhase};
use multivault_kernel::events::LedgerEvent;
use multivault_kernel::{Address, LedgerConfig, MultiVault, TermId, VaultError};

const DEFAULT_CURVE: u32 = 1;

fn admin() -> Address {
    Address::from_low_u64_be(1)
}

fn creator() -> Address {
    Address::from_low_u64_be(0xc0ffee)
}

fn holder() -> Address {
    Address::from_low_u64_be(0xbeef)
}

fn create_atom(ledger: &mut MultiVault, content: &str) -> TermId {
    let cost = ledger.atom_cost().unwrap();
    ledger
        .create_atoms(creator(), &[content.as_bytes().to_vec()], &[cost])
        .unwrap()[0]
}

fn create_spo(ledger: &mut MultiVault) -> (TermId, [TermId; 3]) {
    let s = create_atom(ledger, "alice");
    let p = create_atom(ledger, "knows");
    let o = create_atom(ledger, "bob");
    let cost = ledger.triple_cost().unwrap();
    let triple = ledger
        .create_triples(creator(), &[s], &[p], &[o], &[cost])
        .unwrap()[0];
    (triple, [s, p, o])
}

// ─────────────────────────────────────────────────────────────
// Creation at exactly the minimum cost
// ─────────────────────────────────────────────────────────────

#[test]
fn atom_created_at_cost_holds_only_ghost_shares() {
    let mut ledger = MultiVault::new(LedgerConfig::default()).unwrap();
    let atom = create_atom(&mut ledger, "hello");

    assert!(ledger.is_atom(&atom));
    assert_eq!(ledger.terms().kind(&atom), Ok(TermKind::Atom));
    let totals = ledger.vault(&atom, DEFAULT_CURVE).unwrap();
    let min_share = ledger.config().general.min_share;
    assert_eq!(totals.total_shares, min_share);
    assert_eq!(totals.total_assets, ledger.ghost_cost(DEFAULT_CURVE).unwrap());
    assert_eq!(ledger.shares(&Address::ZERO, &atom, DEFAULT_CURVE), min_share);
    assert_eq!(ledger.shares(&creator(), &atom, DEFAULT_CURVE), 0);
    assert_eq!(ledger.vault_phase(&atom, DEFAULT_CURVE), VaultPhase::Bootstrapped);
    assert_eq!(
        ledger.protocol_fees_transferred(),
        ledger.config().atom.atom_creation_protocol_fee
    );
}

#[test]
fn duplicate_atom_is_rejected() {
    let mut ledger = MultiVault::new(LedgerConfig::default()).unwrap();
    let atom = create_atom(&mut ledger, "hello");
    let cost = ledger.atom_cost().unwrap();
    assert_eq!(
        ledger.create_atoms(holder(), &[b"hello".to_vec()], &[cost]),
        Err(VaultError::AtomExists(atom))
    );
}

#[test]
fn triple_creation_bootstraps_counter_vault() {
    let mut ledger = MultiVault::new(LedgerConfig::default()).unwrap();
    let (triple, [s, p, o]) = create_spo(&mut ledger);
    let counter = ledger.terms().counter_id_of(&triple).unwrap();

    assert!(ledger.is_triple(&triple));
    assert!(ledger.is_counter_triple(&counter));
    assert_eq!(ledger.terms().inverse(&counter), Ok(triple));
    assert_eq!(ledger.terms().triple_components(&counter), Ok([s, p, o]));
    let min_share = ledger.config().general.min_share;
    assert_eq!(ledger.vault(&triple, DEFAULT_CURVE).unwrap().total_shares, min_share);
    assert_eq!(ledger.vault(&counter, DEFAULT_CURVE).unwrap().total_shares, min_share);

    let cost = ledger.triple_cost().unwrap();
    assert_eq!(
        ledger.create_triples(creator(), &[s], &[p], &[o], &[cost]),
        Err(VaultError::TripleExists(triple))
    );
    assert_eq!(
        ledger.create_triples(creator(), &[s], &[p], &[triple], &[cost]),
        Err(VaultError::AtomDoesNotExist(triple))
    );
}

// ─────────────────────────────────────────────────────────────
// First deposit into a fresh vault pays for ghost shares
// ─────────────────────────────────────────────────────────────

#[test]
fn first_deposit_on_new_curve_pays_ghost_cost() {
    let mut config = LedgerConfig::default();
    config.atom.atom_wallet_deposit_fee = 0;
    let mut ledger = MultiVault::new(config).unwrap();
    let curve: Arc<dyn BondingCurve> = Arc::new(LinearCurve::new("Linear Curve 2"));
    let curve_id = ledger.register_curve(admin(), curve).unwrap();
    assert_eq!(curve_id, 4);
    let atom = create_atom(&mut ledger, "curves");

    assert_eq!(ledger.vault_phase(&atom, curve_id), VaultPhase::Uninitialized);
    let first = ledger
        .deposit(holder(), holder(), atom, curve_id, 100 * WAD, 0)
        .unwrap();
    assert_eq!(ledger.vault_phase(&atom, curve_id), VaultPhase::Active);

    let quote = ledger.preview_deposit(&atom, curve_id, 100 * WAD).unwrap();
    assert!(!quote.creates_vault);
    let second = ledger
        .deposit(holder(), holder(), atom, curve_id, 100 * WAD, 0)
        .unwrap();
    assert_eq!(second, quote.shares);

    let ghost = ledger.ghost_cost(curve_id).unwrap();
    assert_eq!(second, first + ghost - quote.entry_fee);
    assert!(second < first);
}

#[test]
fn first_holder_of_bootstrapped_vault_pays_no_entry_fee() {
    let mut ledger = MultiVault::new(LedgerConfig::default()).unwrap();
    let atom = create_atom(&mut ledger, "hello");
    assert_eq!(ledger.vault_phase(&atom, DEFAULT_CURVE), VaultPhase::Bootstrapped);

    let quote = ledger.preview_deposit(&atom, DEFAULT_CURVE, 100 * WAD).unwrap();
    assert!(!quote.creates_vault);
    assert_eq!(quote.entry_fee, 0);
    let shares = ledger
        .deposit(holder(), holder(), atom, DEFAULT_CURVE, 100 * WAD, 0)
        .unwrap();
    assert_eq!(shares, quote.shares);
    assert_eq!(ledger.vault_phase(&atom, DEFAULT_CURVE), VaultPhase::Active);

    // 0.5% of the 99 WAD left after the 1% protocol fee.
    let next = ledger.preview_deposit(&atom, DEFAULT_CURVE, 100 * WAD).unwrap();
    assert_eq!(next.entry_fee, 495 * WAD / 1_000);
}

#[test]
fn fresh_counter_vault_waives_entry_fee() {
    let mut ledger = MultiVault::new(LedgerConfig::default()).unwrap();
    let (triple, _) = create_spo(&mut ledger);
    let counter = ledger.terms().counter_id_of(&triple).unwrap();
    assert_eq!(ledger.vault_phase(&counter, DEFAULT_CURVE), VaultPhase::Bootstrapped);

    let quote = ledger.preview_deposit(&counter, DEFAULT_CURVE, 10 * WAD).unwrap();
    assert_eq!(quote.entry_fee, 0);
    let shares = ledger
        .deposit(holder(), holder(), counter, DEFAULT_CURVE, 10 * WAD, 0)
        .unwrap();
    assert_eq!(shares, quote.shares);
}

#[test]
fn creation_dust_goes_to_the_fee_sink() {
    let mut ledger = MultiVault::new(LedgerConfig::default()).unwrap();
    let cost = ledger.atom_cost().unwrap();
    let quote = ledger.preview_atom_create(cost + 1).unwrap();
    assert_eq!(quote.shares, 0);

    let atom = ledger
        .create_atoms(creator(), &[b"hello".to_vec()], &[cost + 1])
        .unwrap()[0];
    assert_eq!(ledger.shares(&creator(), &atom, DEFAULT_CURVE), 0);
    assert_eq!(ledger.vault_phase(&atom, DEFAULT_CURVE), VaultPhase::Bootstrapped);
    assert_eq!(
        ledger.protocol_fees_transferred(),
        ledger.config().atom.atom_creation_protocol_fee + 1
    );

    let p = create_atom(&mut ledger, "likes");
    let o = create_atom(&mut ledger, "tea");
    let before = ledger.protocol_fees_transferred();
    let triple_cost = ledger.triple_cost().unwrap();
    let triple = ledger
        .create_triples(creator(), &[atom], &[p], &[o], &[triple_cost + 1])
        .unwrap()[0];
    assert_eq!(ledger.vault_phase(&triple, DEFAULT_CURVE), VaultPhase::Bootstrapped);
    assert_eq!(
        ledger.protocol_fees_transferred(),
        before + ledger.config().triple.triple_creation_protocol_fee + 1
    );
}

#[test]
fn deposit_below_minimum_is_rejected() {
    let mut ledger = MultiVault::new(LedgerConfig::default()).unwrap();
    let atom = create_atom(&mut ledger, "minimum");
    let min_deposit = ledger.config().general.min_deposit;
    assert!(ledger.deposit(holder(), holder(), atom, 2, min_deposit, 0).is_ok());
    assert_eq!(
        ledger.deposit(holder(), holder(), atom, 1, min_deposit - 1, 0),
        Err(VaultError::DepositBelowMinimumDeposit {
            have: min_deposit - 1,
            need: min_deposit
        })
    );
}

#[test]
fn dust_deposit_into_fresh_vault_cannot_cover_ghosts() {
    let mut config = LedgerConfig::default();
    config.general.min_deposit = 1;
    let mut ledger = MultiVault::new(config).unwrap();
    let atom = create_atom(&mut ledger, "dust");
    let ghost = ledger.ghost_cost(3).unwrap();
    assert!(ghost > 10_000_000);

    let err = ledger
        .deposit(holder(), holder(), atom, 3, 10_000_000, 0)
        .unwrap_err();
    assert!(matches!(
        err,
        VaultError::DepositTooSmallToCoverGhostShares { need, .. } if need == ghost
    ));
    assert_eq!(ledger.vault_phase(&atom, 3), VaultPhase::Uninitialized);
}

// ─────────────────────────────────────────────────────────────
// Triple deposits fan out into the underlying atoms
// ─────────────────────────────────────────────────────────────

#[test]
fn triple_deposit_routes_fraction_to_each_atom() {
    let mut config = LedgerConfig::default();
    config.triple.atom_deposit_fraction_for_triple = 1_000;
    config.vault_fees.protocol_fee = 0;
    config.atom.atom_wallet_deposit_fee = 0;
    let mut ledger = MultiVault::new(config).unwrap();
    let (triple, atoms) = create_spo(&mut ledger);

    let atoms_before: Vec<u128> = atoms
        .iter()
        .map(|a| ledger.vault(a, DEFAULT_CURVE).unwrap().total_assets)
        .collect();
    let triple_before = ledger.vault(&triple, DEFAULT_CURVE).unwrap().total_assets;

    ledger
        .deposit(holder(), holder(), triple, DEFAULT_CURVE, 100 * WAD, 0)
        .unwrap();

    for (atom, before) in atoms.iter().zip(atoms_before) {
        let after = ledger.vault(atom, DEFAULT_CURVE).unwrap().total_assets;
        assert_eq!(after - before, 10 * WAD);
        assert!(ledger.shares(&holder(), atom, DEFAULT_CURVE) > 0);
    }
    let triple_after = ledger.vault(&triple, DEFAULT_CURVE).unwrap().total_assets;
    assert_eq!(triple_after - triple_before, 70 * WAD);

    let counter = ledger.terms().counter_id_of(&triple).unwrap();
    assert_eq!(ledger.shares(&holder(), &counter, DEFAULT_CURVE), 0);
}

#[test]
fn counter_deposit_on_fresh_curve_bootstraps_both_sides() {
    let mut ledger = MultiVault::new(LedgerConfig::default()).unwrap();
    let (triple, atoms) = create_spo(&mut ledger);
    let counter = ledger.terms().counter_id_of(&triple).unwrap();

    let quote = ledger.preview_deposit(&counter, 2, 10 * WAD).unwrap();
    assert!(quote.creates_vault);
    assert_eq!(quote.ghost_cost, 2 * ledger.ghost_cost(2).unwrap());

    ledger
        .deposit(holder(), holder(), counter, 2, 10 * WAD, 0)
        .unwrap();
    assert_eq!(ledger.vault_phase(&triple, 2), VaultPhase::Bootstrapped);
    assert_eq!(ledger.vault_phase(&counter, 2), VaultPhase::Active);
    for atom in &atoms {
        assert_eq!(ledger.vault_phase(atom, 2), VaultPhase::Active);
    }
}

// ─────────────────────────────────────────────────────────────
// Redemption floor and exit fee waiver
// ─────────────────────────────────────────────────────────────

#[test]
fn last_holder_must_exit_fully() {
    let mut ledger = MultiVault::new(LedgerConfig::default()).unwrap();
    let atom = create_atom(&mut ledger, "exit");
    let shares = ledger
        .deposit(holder(), holder(), atom, DEFAULT_CURVE, 10 * WAD, 0)
        .unwrap();

    assert_eq!(
        ledger.redeem(holder(), holder(), atom, DEFAULT_CURVE, shares - 1, 0),
        Err(VaultError::InsufficientRemainingSharesInVault {
            remaining: 1,
            min: ledger.config().general.min_share
        })
    );

    let quote = ledger.preview_redeem(&atom, DEFAULT_CURVE, shares).unwrap();
    assert!(quote.full_exit);
    assert_eq!(quote.exit_fee, 0);
    let paid = ledger
        .redeem(holder(), holder(), atom, DEFAULT_CURVE, shares, 0)
        .unwrap();
    assert_eq!(paid, quote.assets_after_fees);
    assert_eq!(ledger.max_redeem(&holder(), &atom, DEFAULT_CURVE), 0);
    assert_eq!(ledger.vault_phase(&atom, DEFAULT_CURVE), VaultPhase::Bootstrapped);
    assert!(matches!(
        ledger.events().last(),
        Some(LedgerEvent::UtilizationRecorded { .. })
    ));
}

#[test]
fn partial_redeem_pays_exit_fee_into_vault() {
    let mut ledger = MultiVault::new(LedgerConfig::default()).unwrap();
    let atom = create_atom(&mut ledger, "partial");
    let shares = ledger
        .deposit(holder(), holder(), atom, DEFAULT_CURVE, 10 * WAD, 0)
        .unwrap();
    ledger
        .deposit(creator(), creator(), atom, DEFAULT_CURVE, 10 * WAD, 0)
        .unwrap();

    let before = ledger.vault(&atom, DEFAULT_CURVE).unwrap();
    let price_before = ledger.current_share_price(&atom, DEFAULT_CURVE).unwrap();
    let quote = ledger.preview_redeem(&atom, DEFAULT_CURVE, shares).unwrap();
    assert!(!quote.full_exit);
    assert!(quote.exit_fee > 0);

    ledger
        .redeem(holder(), holder(), atom, DEFAULT_CURVE, shares, 0)
        .unwrap();
    let after = ledger.vault(&atom, DEFAULT_CURVE).unwrap();
    assert_eq!(
        before.total_assets - after.total_assets,
        quote.gross_assets - quote.exit_fee
    );
    assert!(ledger.current_share_price(&atom, DEFAULT_CURVE).unwrap() >= price_before);
}

#[test]
fn cannot_redeem_more_than_owned() {
    let mut ledger = MultiVault::new(LedgerConfig::default()).unwrap();
    let atom = create_atom(&mut ledger, "owned");
    let shares = ledger
        .deposit(holder(), holder(), atom, DEFAULT_CURVE, 10 * WAD, 0)
        .unwrap();
    ledger
        .deposit(creator(), creator(), atom, DEFAULT_CURVE, 10 * WAD, 0)
        .unwrap();
    assert_eq!(
        ledger.redeem(holder(), holder(), atom, DEFAULT_CURVE, shares + 1, 0),
        Err(VaultError::InsufficientSharesInVault {
            have: shares,
            need: shares + 1
        })
    );
    assert_eq!(
        ledger.redeem(holder(), holder(), atom, DEFAULT_CURVE, 0, 0),
        Err(VaultError::DepositOrRedeemZeroShares)
    );
}

// ─────────────────────────────────────────────────────────────
// Batches are all-or-nothing
// ─────────────────────────────────────────────────────────────

#[test]
fn batch_deposit_rolls_back_as_a_whole() {
    let mut ledger = MultiVault::new(LedgerConfig::default()).unwrap();
    let a = create_atom(&mut ledger, "a");
    let b = create_atom(&mut ledger, "b");

    assert_eq!(
        ledger.deposit_batch(holder(), holder(), &[a, b], &[1], &[WAD, WAD], &[0, 0]),
        Err(VaultError::ArraysNotSameLength { expected: 2, got: 1 })
    );
    assert_eq!(
        ledger.deposit_batch(holder(), holder(), &[], &[], &[], &[]),
        Err(VaultError::EmptyBatch)
    );

    let err = ledger
        .deposit_batch(holder(), holder(), &[a, b], &[1, 99], &[WAD, WAD], &[0, 0])
        .unwrap_err();
    assert_eq!(err, VaultError::CurveDoesNotExist(99));
    assert_eq!(ledger.shares(&holder(), &a, 1), 0);

    let minted = ledger
        .deposit_batch(holder(), holder(), &[a, b], &[1, 2], &[WAD, WAD], &[0, 0])
        .unwrap();
    assert_eq!(minted.len(), 2);
    assert_eq!(ledger.shares(&holder(), &a, 1), minted[0]);
    assert_eq!(ledger.shares(&holder(), &b, 2), minted[1]);

    let paid = ledger
        .redeem_batch(holder(), holder(), &[a, b], &[1, 2], &minted, &[0, 0])
        .unwrap();
    assert_eq!(paid.len(), 2);
    assert!(paid.iter().all(|p| *p > 0));
}
