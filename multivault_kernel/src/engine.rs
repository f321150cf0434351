/// MultiVault Kernel: Engine
///
/// Top-level orchestrator. Every mutating operation runs against a clone of
/// the committed state, is validated by the invariants, and only then
/// replaces it. Events queued during the transition are published on
/// commit; a failed operation leaves no trace.
///
/// Previews and execution share the same pricing functions.

use std::sync::Arc;

use log::{debug, info, warn};

use crate::arithmetic::{checked_add, checked_mul, checked_sub};
use crate::config::LedgerConfig;
use crate::curves::{self, BondingCurve, CurveRegistry};
use crate::domain::{
    Address, ApprovalType, CurveId, DepositQuote, RedeemQuote, TermId, TermKind, VaultPhase,
    VaultTotals,
};
use crate::error::{VaultError, VaultResult};
use crate::events::LedgerEvent;
use crate::fees::FeeEngine;
use crate::graph::TermGraph;
use crate::invariants::validate_invariants;
use crate::ledger::Vault;
use crate::operations::{Operation, OperationEnvelope, OperationOutcome, SCHEMA_VERSION};
use crate::state::{create_initial_state, LedgerState};

// ---------------------------------------------------------------------------
// Deposit policy
// ---------------------------------------------------------------------------

/// Which fees a deposit pays besides the per-kind ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct DepositPolicy {
    charge_protocol_fee: bool,
    waive_entry_fee: bool,
}

impl DepositPolicy {
    /// A user deposit.
    const STANDARD: DepositPolicy = DepositPolicy {
        charge_protocol_fee: true,
        waive_entry_fee: false,
    };
    /// The remainder of a create call, deposited into the vault it just created.
    const CREATION: DepositPolicy = DepositPolicy {
        charge_protocol_fee: true,
        waive_entry_fee: true,
    };
    /// A triple deposit's share routed into one underlying atom vault.
    /// The protocol fee was already taken on the triple side.
    const ATOM_FRACTION: DepositPolicy = DepositPolicy {
        charge_protocol_fee: false,
        waive_entry_fee: false,
    };
}

// ---------------------------------------------------------------------------
// Pricing: pure quotes over a state
// ---------------------------------------------------------------------------

#[derive(Clone, Copy)]
struct Pricing<'a> {
    config: &'a LedgerConfig,
    curves: &'a CurveRegistry,
}

impl<'a> Pricing<'a> {
    fn fees(&self) -> FeeEngine<'a> {
        FeeEngine::new(self.config)
    }

    fn default_curve_id(&self) -> CurveId {
        self.config.bonding_curves.default_curve_id
    }

    fn ghost_cost(&self, curve_id: CurveId) -> VaultResult<u128> {
        self.curves
            .get_curve(curve_id)?
            .preview_mint(self.config.general.min_share, 0, 0)
    }

    fn atom_cost(&self) -> VaultResult<u128> {
        checked_add(
            self.config.atom.atom_creation_protocol_fee,
            self.ghost_cost(self.default_curve_id())?,
        )
    }

    /// A triple bootstraps its own vault and its counter vault.
    fn triple_cost(&self) -> VaultResult<u128> {
        checked_add(
            self.config.triple.triple_creation_protocol_fee,
            checked_mul(self.ghost_cost(self.default_curve_id())?, 2)?,
        )
    }

    fn plan_deposit(
        &self,
        state: &LedgerState,
        term_id: &TermId,
        curve_id: CurveId,
        assets: u128,
        policy: DepositPolicy,
    ) -> VaultResult<DepositQuote> {
        let kind = state.terms.kind(term_id)?;
        let existing = state
            .vaults
            .get(term_id, curve_id)
            .map(|vault| (vault.totals(), vault.phase()));
        let pair_missing = match kind {
            TermKind::Atom => false,
            TermKind::Triple | TermKind::CounterTriple => {
                !state.vaults.exists(&state.terms.inverse(term_id)?, curve_id)
            }
        };
        self.plan_deposit_at(kind, curve_id, existing, pair_missing, assets, policy)
    }

    /// Price a deposit against `existing` totals and phase, or against a
    /// vault that this deposit bootstraps when `existing` is `None`. The
    /// entry fee is only charged once the vault has a real holder.
    fn plan_deposit_at(
        &self,
        kind: TermKind,
        curve_id: CurveId,
        existing: Option<(VaultTotals, VaultPhase)>,
        pair_missing: bool,
        assets: u128,
        policy: DepositPolicy,
    ) -> VaultResult<DepositQuote> {
        let curve = self.curves.get_curve(curve_id)?;
        let fees = self.fees();

        let protocol_fee = if policy.charge_protocol_fee {
            fees.protocol_fee(assets)?
        } else {
            0
        };
        let post_protocol = checked_sub(assets, protocol_fee)?;

        let creates_vault = existing.is_none();
        let active = matches!(existing, Some((_, VaultPhase::Active)));
        let entry_fee = if active && !policy.waive_entry_fee {
            fees.entry_fee(post_protocol)?
        } else {
            0
        };
        let (atom_wallet_fee, atom_deposit_fraction) = match kind {
            TermKind::Atom => (fees.atom_wallet_deposit_fee(post_protocol)?, 0),
            TermKind::Triple | TermKind::CounterTriple => {
                (0, fees.atom_deposit_fraction_amount(post_protocol)?)
            }
        };
        let deducted = checked_add(
            checked_add(entry_fee, atom_wallet_fee)?,
            checked_mul(atom_deposit_fraction, 3)?,
        )?;
        // Fees round up, so on dust amounts they can exceed what is left.
        let net = post_protocol
            .checked_sub(deducted)
            .ok_or(VaultError::DepositOrRedeemZeroShares)?;

        let (ghost_cost, base, assets_after_fees) = match existing {
            Some((totals, _)) => (0, totals, net),
            None => {
                let single = self.ghost_cost(curve_id)?;
                let ghost_cost = if pair_missing {
                    checked_mul(single, 2)?
                } else {
                    single
                };
                if net <= ghost_cost {
                    return Err(VaultError::DepositTooSmallToCoverGhostShares {
                        have: net,
                        need: ghost_cost,
                    });
                }
                let base = VaultTotals {
                    total_assets: single,
                    total_shares: self.config.general.min_share,
                };
                (ghost_cost, base, net - ghost_cost)
            }
        };

        let shares = curve.preview_deposit(assets_after_fees, base.total_assets, base.total_shares)?;
        if shares == 0 {
            return Err(if creates_vault {
                VaultError::DepositTooSmallToCoverGhostShares {
                    have: net,
                    need: ghost_cost,
                }
            } else {
                VaultError::DepositOrRedeemZeroShares
            });
        }

        debug!(
            "event=deposit_quote module=engine status=ok curve_id={} assets={} shares={} protocol_fee={} entry_fee={} atom_wallet_fee={} fraction={} ghost_cost={}",
            curve_id, assets, shares, protocol_fee, entry_fee, atom_wallet_fee, atom_deposit_fraction, ghost_cost
        );

        Ok(DepositQuote {
            shares,
            assets_after_fees,
            protocol_fee,
            entry_fee,
            atom_wallet_fee,
            atom_deposit_fraction,
            ghost_cost,
            creates_vault,
        })
    }

    fn plan_redeem(
        &self,
        state: &LedgerState,
        term_id: &TermId,
        curve_id: CurveId,
        shares: u128,
    ) -> VaultResult<RedeemQuote> {
        if shares == 0 {
            return Err(VaultError::DepositOrRedeemZeroShares);
        }
        state.terms.kind(term_id)?;
        let curve = self.curves.get_curve(curve_id)?;
        let vault = state.vaults.vault(term_id, curve_id)?;

        let holder_shares = vault.holder_shares();
        let remaining = holder_shares
            .checked_sub(shares)
            .ok_or(VaultError::InsufficientSharesInVault {
                have: holder_shares,
                need: shares,
            })?;
        let min_share = self.config.general.min_share;
        if remaining > 0 && remaining < min_share {
            return Err(VaultError::InsufficientRemainingSharesInVault {
                remaining,
                min: min_share,
            });
        }
        let full_exit = remaining == 0;

        let gross_assets = curve.preview_redeem(shares, vault.total_assets, vault.total_shares)?;
        if gross_assets == 0 {
            return Err(VaultError::DepositOrRedeemZeroShares);
        }
        let fees = self.fees();
        let exit_fee = if full_exit { 0 } else { fees.exit_fee(gross_assets)? };
        let protocol_fee = fees.protocol_fee(gross_assets)?;
        let assets_after_fees = gross_assets
            .checked_sub(checked_add(exit_fee, protocol_fee)?)
            .ok_or(VaultError::DepositOrRedeemZeroShares)?;

        debug!(
            "event=redeem_quote module=engine status=ok curve_id={} shares={} gross={} exit_fee={} protocol_fee={} full_exit={}",
            curve_id, shares, gross_assets, exit_fee, protocol_fee, full_exit
        );

        Ok(RedeemQuote {
            assets_after_fees,
            shares_used: shares,
            gross_assets,
            exit_fee,
            protocol_fee,
            full_exit,
        })
    }
}

// ---------------------------------------------------------------------------
// Transition: one operation against a working copy
// ---------------------------------------------------------------------------

struct Transition<'a> {
    pricing: Pricing<'a>,
    state: LedgerState,
    events: Vec<LedgerEvent>,
}

fn to_signed(amount: u128) -> VaultResult<i128> {
    i128::try_from(amount).map_err(|_| VaultError::Overflow)
}

fn check_batch_lengths(expected: usize, others: &[usize]) -> VaultResult<()> {
    for &got in others {
        if got != expected {
            return Err(VaultError::ArraysNotSameLength { expected, got });
        }
    }
    Ok(())
}

impl<'a> Transition<'a> {
    fn config(&self) -> &'a LedgerConfig {
        self.pricing.config
    }

    fn ensure_not_paused(&self) -> VaultResult<()> {
        if self.state.paused {
            return Err(VaultError::Paused);
        }
        Ok(())
    }

    fn require_admin(&self, sender: Address) -> VaultResult<()> {
        if sender != self.config().general.admin {
            return Err(VaultError::Unauthorized(sender));
        }
        Ok(())
    }

    // -- side effects, queued --------------------------------------------

    fn transfer_protocol_fee(&mut self, sender: Address, amount: u128) -> VaultResult<()> {
        if amount == 0 {
            return Ok(());
        }
        self.state.protocol_fees_transferred =
            checked_add(self.state.protocol_fees_transferred, amount)?;
        self.events.push(LedgerEvent::ProtocolFeeTransferred {
            sender,
            destination: self.config().general.protocol_multisig,
            amount,
        });
        Ok(())
    }

    fn accrue_atom_wallet_fee(
        &mut self,
        sender: Address,
        atom_id: TermId,
        amount: u128,
    ) -> VaultResult<()> {
        if amount == 0 {
            return Ok(());
        }
        let atom_wallet = self.state.terms.atom(&atom_id)?.wallet;
        let accrued = checked_add(self.state.accumulated_atom_wallet_fees(&atom_id), amount)?;
        self.state.atom_wallet_fees.insert(atom_id, accrued);
        self.events.push(LedgerEvent::AtomWalletDepositFeeCollected {
            term_id: atom_id,
            atom_wallet,
            sender,
            amount,
        });
        Ok(())
    }

    fn record_utilization(&mut self, account: Address, delta: i128) -> VaultResult<()> {
        let epoch = self.state.epoch;
        let account_total = self
            .state
            .utilization(epoch, &account)
            .checked_add(delta)
            .ok_or(VaultError::Overflow)?;
        let epoch_total = self
            .state
            .total_utilization(epoch)
            .checked_add(delta)
            .ok_or(VaultError::Overflow)?;
        self.state
            .utilization
            .entry(epoch)
            .or_default()
            .insert(account, account_total);
        self.state.total_utilization.insert(epoch, epoch_total);
        self.events.push(LedgerEvent::UtilizationRecorded {
            epoch,
            account,
            delta,
            account_total,
            epoch_total,
        });
        Ok(())
    }

    fn bootstrap_vault(&mut self, term_id: TermId, curve_id: CurveId) -> VaultResult<()> {
        let ghost_cost = self.pricing.ghost_cost(curve_id)?;
        let min_share = self.config().general.min_share;
        self.state
            .vaults
            .bootstrap(term_id, curve_id, min_share, ghost_cost);
        Ok(())
    }

    // -- creation --------------------------------------------------------

    fn create_atoms(
        &mut self,
        sender: Address,
        contents: &[Vec<u8>],
        assets: &[u128],
    ) -> VaultResult<Vec<TermId>> {
        self.ensure_not_paused()?;
        if contents.is_empty() {
            return Err(VaultError::NoAtomDataProvided);
        }
        check_batch_lengths(contents.len(), &[assets.len()])?;
        contents
            .iter()
            .zip(assets)
            .map(|(content, amount)| self.create_atom(sender, content, *amount))
            .collect()
    }

    fn create_atom(&mut self, sender: Address, content: &[u8], assets: u128) -> VaultResult<TermId> {
        let config = self.config();
        let max_len = config.general.atom_data_max_length;
        let atom_id = self.state.terms.create_atom(content, sender, max_len)?;

        let cost = self.pricing.atom_cost()?;
        if assets < cost {
            return Err(VaultError::DepositBelowMinimumDeposit {
                have: assets,
                need: cost,
            });
        }

        let curve_id = self.pricing.default_curve_id();
        self.bootstrap_vault(atom_id, curve_id)?;
        self.transfer_protocol_fee(sender, config.atom.atom_creation_protocol_fee)?;
        let atom_wallet = self.state.terms.atom(&atom_id)?.wallet;
        self.events.push(LedgerEvent::AtomCreated {
            creator: sender,
            term_id: atom_id,
            atom_wallet,
            curve_id,
            after: self.state.vaults.totals(&atom_id, curve_id),
        });

        self.deposit_remainder(sender, atom_id, curve_id, assets - cost)?;
        self.record_utilization(sender, to_signed(assets)?)?;
        Ok(atom_id)
    }

    fn create_triples(
        &mut self,
        sender: Address,
        subject_ids: &[TermId],
        predicate_ids: &[TermId],
        object_ids: &[TermId],
        assets: &[u128],
    ) -> VaultResult<Vec<TermId>> {
        self.ensure_not_paused()?;
        if subject_ids.is_empty() {
            return Err(VaultError::NoTriplesProvided);
        }
        check_batch_lengths(
            subject_ids.len(),
            &[predicate_ids.len(), object_ids.len(), assets.len()],
        )?;
        let mut created = Vec::with_capacity(subject_ids.len());
        for i in 0..subject_ids.len() {
            created.push(self.create_triple(
                sender,
                subject_ids[i],
                predicate_ids[i],
                object_ids[i],
                assets[i],
            )?);
        }
        Ok(created)
    }

    fn create_triple(
        &mut self,
        sender: Address,
        subject_id: TermId,
        predicate_id: TermId,
        object_id: TermId,
        assets: u128,
    ) -> VaultResult<TermId> {
        let (triple_id, counter_id) =
            self.state
                .terms
                .create_triple(subject_id, predicate_id, object_id, sender)?;

        let cost = self.pricing.triple_cost()?;
        if assets < cost {
            return Err(VaultError::DepositBelowMinimumDeposit {
                have: assets,
                need: cost,
            });
        }

        let curve_id = self.pricing.default_curve_id();
        self.bootstrap_vault(triple_id, curve_id)?;
        self.bootstrap_vault(counter_id, curve_id)?;
        self.transfer_protocol_fee(sender, self.config().triple.triple_creation_protocol_fee)?;
        self.events.push(LedgerEvent::TripleCreated {
            creator: sender,
            term_id: triple_id,
            counter_id,
            subject_id,
            predicate_id,
            object_id,
            curve_id,
        });

        self.deposit_remainder(sender, triple_id, curve_id, assets - cost)?;
        self.record_utilization(sender, to_signed(assets)?)?;
        Ok(triple_id)
    }

    /// Deposit what a create call paid above its cost. A remainder too small
    /// to mint a share in every vault it reaches goes to the fee sink.
    fn deposit_remainder(
        &mut self,
        sender: Address,
        term_id: TermId,
        curve_id: CurveId,
        remainder: u128,
    ) -> VaultResult<()> {
        if remainder == 0 {
            return Ok(());
        }
        let state = self.state.clone();
        let queued = self.events.len();
        match self.execute_deposit(sender, sender, term_id, curve_id, remainder, DepositPolicy::CREATION) {
            Ok(_) => Ok(()),
            Err(VaultError::DepositOrRedeemZeroShares) => {
                self.state = state;
                self.events.truncate(queued);
                debug!(
                    "event=creation_dust module=engine status=ok term_id={} amount={}",
                    term_id, remainder
                );
                self.transfer_protocol_fee(sender, remainder)
            }
            Err(err) => Err(err),
        }
    }

    // -- deposit ---------------------------------------------------------

    fn deposit(
        &mut self,
        sender: Address,
        receiver: Address,
        term_id: TermId,
        curve_id: CurveId,
        assets: u128,
        min_shares: u128,
    ) -> VaultResult<u128> {
        self.ensure_not_paused()?;
        if receiver.is_zero() {
            return Err(VaultError::ReceiverIsZeroAddress);
        }
        let min_deposit = self.config().general.min_deposit;
        if assets < min_deposit {
            return Err(VaultError::DepositBelowMinimumDeposit {
                have: assets,
                need: min_deposit,
            });
        }
        if sender != receiver && !self.state.approval(&receiver, &sender).allows_deposit() {
            return Err(VaultError::SenderNotApproved { sender, receiver });
        }

        let quote = self.execute_deposit(sender, receiver, term_id, curve_id, assets, DepositPolicy::STANDARD)?;
        if quote.shares < min_shares {
            return Err(VaultError::SlippageExceeded {
                min: min_shares,
                got: quote.shares,
            });
        }
        self.record_utilization(sender, to_signed(assets)?)?;
        Ok(quote.shares)
    }

    /// Price, mint, route fees and fan out. Shared by user deposits, the
    /// remainder of a create, and the atom legs of a triple deposit.
    fn execute_deposit(
        &mut self,
        sender: Address,
        receiver: Address,
        term_id: TermId,
        curve_id: CurveId,
        assets: u128,
        policy: DepositPolicy,
    ) -> VaultResult<DepositQuote> {
        let quote = self
            .pricing
            .plan_deposit(&self.state, &term_id, curve_id, assets, policy)?;
        let kind = self.state.terms.kind(&term_id)?;
        let before = self.state.vaults.totals(&term_id, curve_id);

        if quote.creates_vault {
            self.bootstrap_vault(term_id, curve_id)?;
            if kind != TermKind::Atom {
                let pair = self.state.terms.inverse(&term_id)?;
                self.bootstrap_vault(pair, curve_id)?;
            }
        }

        let vault = self.state.vaults.vault_mut(&term_id, curve_id)?;
        // The entry fee stays in the vault and lifts the share price.
        vault.add_assets(checked_add(quote.assets_after_fees, quote.entry_fee)?)?;
        vault.mint(receiver, quote.shares)?;
        let after = vault.totals();

        self.events.push(LedgerEvent::Deposited {
            sender,
            receiver,
            term_id,
            curve_id,
            kind,
            assets,
            assets_after_fees: quote.assets_after_fees,
            shares: quote.shares,
            before,
            after,
        });
        self.transfer_protocol_fee(sender, quote.protocol_fee)?;
        self.accrue_atom_wallet_fee(sender, term_id, quote.atom_wallet_fee)?;

        if quote.atom_deposit_fraction > 0 {
            for atom_id in self.state.terms.triple_components(&term_id)? {
                self.execute_deposit(
                    sender,
                    receiver,
                    atom_id,
                    curve_id,
                    quote.atom_deposit_fraction,
                    DepositPolicy::ATOM_FRACTION,
                )?;
            }
        }
        Ok(quote)
    }

    fn deposit_batch(
        &mut self,
        sender: Address,
        receiver: Address,
        term_ids: &[TermId],
        curve_ids: &[CurveId],
        assets: &[u128],
        min_shares: &[u128],
    ) -> VaultResult<Vec<u128>> {
        if term_ids.is_empty() {
            return Err(VaultError::EmptyBatch);
        }
        check_batch_lengths(
            term_ids.len(),
            &[curve_ids.len(), assets.len(), min_shares.len()],
        )?;
        let mut minted = Vec::with_capacity(term_ids.len());
        for i in 0..term_ids.len() {
            minted.push(self.deposit(
                sender,
                receiver,
                term_ids[i],
                curve_ids[i],
                assets[i],
                min_shares[i],
            )?);
        }
        Ok(minted)
    }

    // -- redeem ----------------------------------------------------------

    fn redeem(
        &mut self,
        sender: Address,
        owner: Address,
        term_id: TermId,
        curve_id: CurveId,
        shares: u128,
        min_assets: u128,
    ) -> VaultResult<u128> {
        self.ensure_not_paused()?;
        // Ghost shares can never be redeemed.
        if owner.is_zero()
            || (sender != owner && !self.state.approval(&owner, &sender).allows_redemption())
        {
            return Err(VaultError::RedeemerNotApproved { sender, owner });
        }

        let quote = self
            .pricing
            .plan_redeem(&self.state, &term_id, curve_id, shares)?;

        let vault = self.state.vaults.vault_mut(&term_id, curve_id)?;
        let before = vault.totals();
        vault.burn(owner, shares)?;
        // The exit fee stays in the vault.
        vault.remove_assets(checked_sub(quote.gross_assets, quote.exit_fee)?)?;
        let after = vault.totals();

        if quote.assets_after_fees < min_assets {
            return Err(VaultError::SlippageExceeded {
                min: min_assets,
                got: quote.assets_after_fees,
            });
        }

        self.events.push(LedgerEvent::Redeemed {
            sender,
            owner,
            term_id,
            curve_id,
            shares,
            gross_assets: quote.gross_assets,
            assets_after_fees: quote.assets_after_fees,
            exit_fee: quote.exit_fee,
            protocol_fee: quote.protocol_fee,
            before,
            after,
        });
        self.transfer_protocol_fee(sender, quote.protocol_fee)?;
        self.events.push(LedgerEvent::AssetsTransferred {
            to: owner,
            amount: quote.assets_after_fees,
        });
        self.record_utilization(owner, -to_signed(quote.assets_after_fees)?)?;
        Ok(quote.assets_after_fees)
    }

    fn redeem_batch(
        &mut self,
        sender: Address,
        owner: Address,
        term_ids: &[TermId],
        curve_ids: &[CurveId],
        shares: &[u128],
        min_assets: &[u128],
    ) -> VaultResult<Vec<u128>> {
        if term_ids.is_empty() {
            return Err(VaultError::EmptyBatch);
        }
        check_batch_lengths(
            term_ids.len(),
            &[curve_ids.len(), shares.len(), min_assets.len()],
        )?;
        let mut paid = Vec::with_capacity(term_ids.len());
        for i in 0..term_ids.len() {
            paid.push(self.redeem(
                sender,
                owner,
                term_ids[i],
                curve_ids[i],
                shares[i],
                min_assets[i],
            )?);
        }
        Ok(paid)
    }

    // -- approvals, claims, admin ------------------------------------------

    fn approve(
        &mut self,
        sender: Address,
        operator: Address,
        approval: ApprovalType,
    ) -> VaultResult<()> {
        if sender == operator {
            return Err(VaultError::CannotApproveSelf(sender));
        }
        if approval == ApprovalType::None {
            if let Some(operators) = self.state.approvals.get_mut(&sender) {
                operators.remove(&operator);
                if operators.is_empty() {
                    self.state.approvals.remove(&sender);
                }
            }
        } else {
            self.state
                .approvals
                .entry(sender)
                .or_default()
                .insert(operator, approval);
        }
        self.events.push(LedgerEvent::ApprovalTypeUpdated {
            owner: sender,
            operator,
            approval,
        });
        Ok(())
    }

    fn claim_atom_wallet_deposit_fees(
        &mut self,
        sender: Address,
        atom_id: TermId,
    ) -> VaultResult<u128> {
        self.ensure_not_paused()?;
        let atom_wallet = self.state.terms.atom(&atom_id)?.wallet;
        if sender != atom_wallet {
            return Err(VaultError::NotAtomWallet { sender, atom_id });
        }
        let amount = self.state.atom_wallet_fees.remove(&atom_id).unwrap_or(0);
        if amount == 0 {
            return Err(VaultError::NothingToClaim(atom_id));
        }
        self.events.push(LedgerEvent::AtomWalletDepositFeesClaimed {
            term_id: atom_id,
            atom_wallet,
            amount,
        });
        self.events.push(LedgerEvent::AssetsTransferred {
            to: atom_wallet,
            amount,
        });
        Ok(amount)
    }

    fn advance_epoch(&mut self, sender: Address) -> VaultResult<u64> {
        self.require_admin(sender)?;
        self.state.epoch = self.state.epoch.checked_add(1).ok_or(VaultError::Overflow)?;
        self.events.push(LedgerEvent::EpochAdvanced {
            epoch: self.state.epoch,
        });
        Ok(self.state.epoch)
    }

    fn set_paused(&mut self, sender: Address, paused: bool) -> VaultResult<()> {
        self.require_admin(sender)?;
        self.state.paused = paused;
        self.events.push(LedgerEvent::PauseToggled { paused });
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// MultiVault
// ---------------------------------------------------------------------------

/// Stateful ledger wrapping the transition layer.
#[derive(Debug, Clone)]
pub struct MultiVault {
    config: LedgerConfig,
    curves: CurveRegistry,
    state: LedgerState,
    last_sequence: u64,
    events: Vec<LedgerEvent>,
}

impl MultiVault {
    /// Validate the config and register its built-in curves.
    pub fn new(config: LedgerConfig) -> VaultResult<Self> {
        config.validate()?;
        let curves = CurveRegistry::from_config(&config.bonding_curves)?;
        curves.get_curve(config.bonding_curves.default_curve_id)?;
        let state = create_initial_state(&curves);
        info!(
            "event=ledger_init module=engine status=ok curves={} default_curve_id={}",
            curves.count(),
            config.bonding_curves.default_curve_id
        );
        Ok(Self {
            config,
            curves,
            state,
            last_sequence: 0,
            events: Vec::new(),
        })
    }

    /// Rebuild a ledger around a previously committed state.
    ///
    /// Custom curves are not part of the config and must be supplied again,
    /// in their original registration order.
    pub fn restore(
        config: LedgerConfig,
        state: LedgerState,
        last_sequence: u64,
        custom_curves: Vec<Arc<dyn BondingCurve>>,
    ) -> VaultResult<Self> {
        config.validate()?;
        let mut curves = CurveRegistry::from_config(&config.bonding_curves)?;
        for curve in custom_curves {
            curves.add_curve(curve)?;
        }
        if curves.count() != state.curve_names.len() {
            return Err(VaultError::InvariantViolation(format!(
                "[INVARIANT:curve_registry] state lists {} curves, registry has {}",
                state.curve_names.len(),
                curves.count()
            )));
        }
        for (id, name) in &state.curve_names {
            let curve = curves.get_curve(*id)?;
            if curve.name() != name.as_str() {
                return Err(VaultError::InvariantViolation(format!(
                    "[INVARIANT:curve_registry] curve {} is {:?} in state but {:?} in registry",
                    id,
                    name,
                    curve.name()
                )));
            }
        }
        validate_invariants(&state, &config)?;
        info!(
            "event=ledger_restore module=engine status=ok last_sequence={} vaults={}",
            last_sequence,
            state.vaults.len()
        );
        Ok(Self {
            config,
            curves,
            state,
            last_sequence,
            events: Vec::new(),
        })
    }

    fn pricing(&self) -> Pricing<'_> {
        Pricing {
            config: &self.config,
            curves: &self.curves,
        }
    }

    /// Run `apply` against a working copy and commit it only if the
    /// operation and the invariants both succeed.
    fn transact<T>(
        &mut self,
        operation: &'static str,
        apply: impl FnOnce(&mut Transition<'_>) -> VaultResult<T>,
    ) -> VaultResult<T> {
        let mut tx = Transition {
            pricing: Pricing {
                config: &self.config,
                curves: &self.curves,
            },
            state: self.state.clone(),
            events: Vec::new(),
        };
        let result =
            apply(&mut tx).and_then(|value| validate_invariants(&tx.state, &self.config).map(|_| value));

        match result {
            Ok(value) => {
                let Transition { state, events, .. } = tx;
                info!(
                    "event={} module=engine status=ok events={}",
                    operation,
                    events.len()
                );
                self.state = state;
                self.events.extend(events);
                Ok(value)
            }
            Err(err) => {
                warn!(
                    "event={} module=engine status=error error={}",
                    operation, err
                );
                Err(err)
            }
        }
    }

    // -----------------------------------------------------------------------
    // Entry points
    // -----------------------------------------------------------------------

    pub fn create_atoms(
        &mut self,
        sender: Address,
        contents: &[Vec<u8>],
        assets: &[u128],
    ) -> VaultResult<Vec<TermId>> {
        self.transact("create_atoms", |tx| tx.create_atoms(sender, contents, assets))
    }

    pub fn create_triples(
        &mut self,
        sender: Address,
        subject_ids: &[TermId],
        predicate_ids: &[TermId],
        object_ids: &[TermId],
        assets: &[u128],
    ) -> VaultResult<Vec<TermId>> {
        self.transact("create_triples", |tx| {
            tx.create_triples(sender, subject_ids, predicate_ids, object_ids, assets)
        })
    }

    pub fn deposit(
        &mut self,
        sender: Address,
        receiver: Address,
        term_id: TermId,
        curve_id: CurveId,
        assets: u128,
        min_shares: u128,
    ) -> VaultResult<u128> {
        self.transact("deposit", |tx| {
            tx.deposit(sender, receiver, term_id, curve_id, assets, min_shares)
        })
    }

    pub fn deposit_batch(
        &mut self,
        sender: Address,
        receiver: Address,
        term_ids: &[TermId],
        curve_ids: &[CurveId],
        assets: &[u128],
        min_shares: &[u128],
    ) -> VaultResult<Vec<u128>> {
        self.transact("deposit_batch", |tx| {
            tx.deposit_batch(sender, receiver, term_ids, curve_ids, assets, min_shares)
        })
    }

    pub fn redeem(
        &mut self,
        sender: Address,
        owner: Address,
        term_id: TermId,
        curve_id: CurveId,
        shares: u128,
        min_assets: u128,
    ) -> VaultResult<u128> {
        self.transact("redeem", |tx| {
            tx.redeem(sender, owner, term_id, curve_id, shares, min_assets)
        })
    }

    pub fn redeem_batch(
        &mut self,
        sender: Address,
        owner: Address,
        term_ids: &[TermId],
        curve_ids: &[CurveId],
        shares: &[u128],
        min_assets: &[u128],
    ) -> VaultResult<Vec<u128>> {
        self.transact("redeem_batch", |tx| {
            tx.redeem_batch(sender, owner, term_ids, curve_ids, shares, min_assets)
        })
    }

    /// Grant `operator` a capability over the sender's positions.
    /// `ApprovalType::None` revokes.
    pub fn approve(
        &mut self,
        sender: Address,
        operator: Address,
        approval: ApprovalType,
    ) -> VaultResult<()> {
        self.transact("approve", |tx| tx.approve(sender, operator, approval))
    }

    pub fn claim_atom_wallet_deposit_fees(
        &mut self,
        sender: Address,
        atom_id: TermId,
    ) -> VaultResult<u128> {
        self.transact("claim_atom_wallet_deposit_fees", |tx| {
            tx.claim_atom_wallet_deposit_fees(sender, atom_id)
        })
    }

    pub fn advance_epoch(&mut self, sender: Address) -> VaultResult<u64> {
        self.transact("advance_epoch", |tx| tx.advance_epoch(sender))
    }

    pub fn set_paused(&mut self, sender: Address, paused: bool) -> VaultResult<()> {
        self.transact("set_paused", |tx| tx.set_paused(sender, paused))
    }

    /// Admin-only. The registry is swapped in only once the state accepts it.
    pub fn register_curve(
        &mut self,
        sender: Address,
        curve: Arc<dyn BondingCurve>,
    ) -> VaultResult<CurveId> {
        let result = self.try_register_curve(sender, curve);
        match &result {
            Ok(curve_id) => info!(
                "event=register_curve module=engine status=ok curve_id={}",
                curve_id
            ),
            Err(err) => warn!(
                "event=register_curve module=engine status=error error={}",
                err
            ),
        }
        result
    }

    fn try_register_curve(
        &mut self,
        sender: Address,
        curve: Arc<dyn BondingCurve>,
    ) -> VaultResult<CurveId> {
        if sender != self.config.general.admin {
            return Err(VaultError::Unauthorized(sender));
        }
        let mut curves = self.curves.clone();
        let curve_id = curves.add_curve(curve)?;
        let name = curves.get_curve(curve_id)?.name().to_string();
        let mut state = self.state.clone();
        state.curve_names.insert(curve_id, name.clone());
        validate_invariants(&state, &self.config)?;

        self.curves = curves;
        self.state = state;
        self.events.push(LedgerEvent::CurveAdded { curve_id, name });
        Ok(curve_id)
    }

    // -----------------------------------------------------------------------
    // Sequenced application
    // -----------------------------------------------------------------------

    /// Apply one envelope:
    ///   1. Validate schema version
    ///   2. Validate sequence (strictly increasing, no gaps)
    ///   3. Dispatch to the entry point
    ///
    /// A rejected operation does not consume its sequence number.
    pub fn apply(&mut self, envelope: &OperationEnvelope) -> VaultResult<OperationOutcome> {
        if envelope.schema_version != SCHEMA_VERSION {
            return Err(VaultError::SchemaVersionMismatch {
                expected: SCHEMA_VERSION,
                got: envelope.schema_version,
            });
        }
        let expected = self.last_sequence + 1;
        if envelope.sequence != expected {
            return Err(VaultError::SequenceViolation {
                expected,
                got: envelope.sequence,
            });
        }
        let outcome = self.dispatch(&envelope.operation)?;
        self.last_sequence = envelope.sequence;
        Ok(outcome)
    }

    /// Apply an ordered sequence of envelopes, stopping at the first error.
    pub fn apply_sequence(&mut self, envelopes: &[OperationEnvelope]) -> VaultResult<()> {
        for envelope in envelopes {
            self.apply(envelope)?;
        }
        Ok(())
    }

    /// Operation-sourced reconstruction from an empty ledger.
    pub fn replay(config: LedgerConfig, envelopes: &[OperationEnvelope]) -> VaultResult<Self> {
        let mut ledger = Self::new(config)?;
        ledger.apply_sequence(envelopes)?;
        Ok(ledger)
    }

    fn dispatch(&mut self, operation: &Operation) -> VaultResult<OperationOutcome> {
        let outcome = match operation {
            Operation::CreateAtoms {
                sender,
                contents,
                assets,
            } => OperationOutcome::TermsCreated(self.create_atoms(*sender, contents, assets)?),
            Operation::CreateTriples {
                sender,
                subject_ids,
                predicate_ids,
                object_ids,
                assets,
            } => OperationOutcome::TermsCreated(self.create_triples(
                *sender,
                subject_ids,
                predicate_ids,
                object_ids,
                assets,
            )?),
            Operation::Deposit {
                sender,
                receiver,
                term_id,
                curve_id,
                assets,
                min_shares,
            } => OperationOutcome::SharesMinted(vec![self.deposit(
                *sender,
                *receiver,
                *term_id,
                *curve_id,
                *assets,
                *min_shares,
            )?]),
            Operation::DepositBatch {
                sender,
                receiver,
                term_ids,
                curve_ids,
                assets,
                min_shares,
            } => OperationOutcome::SharesMinted(self.deposit_batch(
                *sender, *receiver, term_ids, curve_ids, assets, min_shares,
            )?),
            Operation::Redeem {
                sender,
                owner,
                term_id,
                curve_id,
                shares,
                min_assets,
            } => OperationOutcome::AssetsRedeemed(vec![self.redeem(
                *sender,
                *owner,
                *term_id,
                *curve_id,
                *shares,
                *min_assets,
            )?]),
            Operation::RedeemBatch {
                sender,
                owner,
                term_ids,
                curve_ids,
                shares,
                min_assets,
            } => OperationOutcome::AssetsRedeemed(self.redeem_batch(
                *sender, *owner, term_ids, curve_ids, shares, min_assets,
            )?),
            Operation::Approve {
                sender,
                operator,
                approval,
            } => {
                self.approve(*sender, *operator, *approval)?;
                OperationOutcome::Done
            }
            Operation::ClaimAtomWalletDepositFees { sender, atom_id } => {
                OperationOutcome::Claimed(self.claim_atom_wallet_deposit_fees(*sender, *atom_id)?)
            }
            Operation::RegisterCurve { sender, curve } => {
                let curve = curves::from_spec(curve)?;
                OperationOutcome::CurveRegistered(self.register_curve(*sender, curve)?)
            }
            Operation::AdvanceEpoch { sender } => {
                self.advance_epoch(*sender)?;
                OperationOutcome::Done
            }
            Operation::SetPaused { sender, paused } => {
                self.set_paused(*sender, *paused)?;
                OperationOutcome::Done
            }
        };
        Ok(outcome)
    }

    // -----------------------------------------------------------------------
    // Previews
    // -----------------------------------------------------------------------

    pub fn ghost_cost(&self, curve_id: CurveId) -> VaultResult<u128> {
        self.pricing().ghost_cost(curve_id)
    }

    /// Minimum amount `create_atoms` accepts per atom.
    pub fn atom_cost(&self) -> VaultResult<u128> {
        self.pricing().atom_cost()
    }

    /// Minimum amount `create_triples` accepts per triple.
    pub fn triple_cost(&self) -> VaultResult<u128> {
        self.pricing().triple_cost()
    }

    pub fn preview_deposit(
        &self,
        term_id: &TermId,
        curve_id: CurveId,
        assets: u128,
    ) -> VaultResult<DepositQuote> {
        self.pricing()
            .plan_deposit(&self.state, term_id, curve_id, assets, DepositPolicy::STANDARD)
    }

    pub fn preview_redeem(
        &self,
        term_id: &TermId,
        curve_id: CurveId,
        shares: u128,
    ) -> VaultResult<RedeemQuote> {
        self.pricing()
            .plan_redeem(&self.state, term_id, curve_id, shares)
    }

    /// Quote for the creator's shares when creating an atom with `assets`.
    /// `ghost_cost` is the bootstrap paid out of the fixed atom cost.
    pub fn preview_atom_create(&self, assets: u128) -> VaultResult<DepositQuote> {
        let pricing = self.pricing();
        let cost = pricing.atom_cost()?;
        self.preview_create(TermKind::Atom, assets, cost, 1)
    }

    /// Quote for the creator's triple-vault shares when creating a triple.
    pub fn preview_triple_create(&self, assets: u128) -> VaultResult<DepositQuote> {
        let pricing = self.pricing();
        let cost = pricing.triple_cost()?;
        self.preview_create(TermKind::Triple, assets, cost, 2)
    }

    fn preview_create(
        &self,
        kind: TermKind,
        assets: u128,
        cost: u128,
        bootstrapped_vaults: u128,
    ) -> VaultResult<DepositQuote> {
        if assets < cost {
            return Err(VaultError::DepositBelowMinimumDeposit {
                have: assets,
                need: cost,
            });
        }
        let pricing = self.pricing();
        let curve_id = pricing.default_curve_id();
        let single = pricing.ghost_cost(curve_id)?;
        let ghost_cost = checked_mul(single, bootstrapped_vaults)?;
        let remainder = assets - cost;
        if remainder == 0 {
            return Ok(DepositQuote {
                ghost_cost,
                creates_vault: true,
                ..DepositQuote::default()
            });
        }
        let base = VaultTotals {
            total_assets: single,
            total_shares: self.config.general.min_share,
        };
        let quote = match pricing.plan_deposit_at(
            kind,
            curve_id,
            Some((base, VaultPhase::Bootstrapped)),
            false,
            remainder,
            DepositPolicy::CREATION,
        ) {
            Ok(quote) => quote,
            Err(VaultError::DepositOrRedeemZeroShares) => DepositQuote {
                protocol_fee: remainder,
                ..DepositQuote::default()
            },
            Err(err) => return Err(err),
        };
        Ok(DepositQuote {
            ghost_cost,
            creates_vault: true,
            ..quote
        })
    }

    pub fn current_share_price(&self, term_id: &TermId, curve_id: CurveId) -> VaultResult<u128> {
        let totals = self.vault_totals_or_empty(term_id, curve_id)?;
        self.curves
            .get_curve(curve_id)?
            .current_price(totals.total_assets, totals.total_shares)
    }

    pub fn convert_to_shares(
        &self,
        term_id: &TermId,
        curve_id: CurveId,
        assets: u128,
    ) -> VaultResult<u128> {
        let totals = self.vault_totals_or_empty(term_id, curve_id)?;
        self.curves
            .get_curve(curve_id)?
            .convert_to_shares(assets, totals.total_assets, totals.total_shares)
    }

    pub fn convert_to_assets(
        &self,
        term_id: &TermId,
        curve_id: CurveId,
        shares: u128,
    ) -> VaultResult<u128> {
        let totals = self.vault_totals_or_empty(term_id, curve_id)?;
        self.curves
            .get_curve(curve_id)?
            .convert_to_assets(shares, totals.total_assets, totals.total_shares)
    }

    fn vault_totals_or_empty(&self, term_id: &TermId, curve_id: CurveId) -> VaultResult<VaultTotals> {
        self.state.terms.kind(term_id)?;
        self.curves.get_curve(curve_id)?;
        Ok(self.state.vaults.totals(term_id, curve_id))
    }

    /// Shares `owner` could redeem right now.
    pub fn max_redeem(&self, owner: &Address, term_id: &TermId, curve_id: CurveId) -> u128 {
        if owner.is_zero() {
            return 0;
        }
        self.state.vaults.shares_of(owner, term_id, curve_id)
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    pub fn vault(&self, term_id: &TermId, curve_id: CurveId) -> VaultResult<VaultTotals> {
        self.state.vaults.vault(term_id, curve_id).map(Vault::totals)
    }

    pub fn vault_phase(&self, term_id: &TermId, curve_id: CurveId) -> VaultPhase {
        self.state.vaults.phase(term_id, curve_id)
    }

    pub fn shares(&self, account: &Address, term_id: &TermId, curve_id: CurveId) -> u128 {
        self.state.vaults.shares_of(account, term_id, curve_id)
    }

    pub fn terms(&self) -> &TermGraph {
        &self.state.terms
    }

    pub fn is_term_created(&self, id: &TermId) -> bool {
        self.state.terms.is_term_created(id)
    }

    pub fn is_atom(&self, id: &TermId) -> bool {
        self.state.terms.is_atom(id)
    }

    pub fn is_triple(&self, id: &TermId) -> bool {
        self.state.terms.is_triple(id)
    }

    pub fn is_counter_triple(&self, id: &TermId) -> bool {
        self.state.terms.is_counter_triple(id)
    }

    pub fn atom_wallet_address(&self, atom_id: &TermId) -> VaultResult<Address> {
        self.state.terms.atom(atom_id).map(|atom| atom.wallet)
    }

    pub fn accumulated_atom_wallet_fees(&self, atom_id: &TermId) -> u128 {
        self.state.accumulated_atom_wallet_fees(atom_id)
    }

    pub fn protocol_fees_transferred(&self) -> u128 {
        self.state.protocol_fees_transferred
    }

    pub fn utilization(&self, epoch: u64, account: &Address) -> i128 {
        self.state.utilization(epoch, account)
    }

    pub fn total_utilization(&self, epoch: u64) -> i128 {
        self.state.total_utilization(epoch)
    }

    pub fn approval(&self, owner: &Address, operator: &Address) -> ApprovalType {
        self.state.approval(owner, operator)
    }

    pub fn current_epoch(&self) -> u64 {
        self.state.epoch
    }

    pub fn is_paused(&self) -> bool {
        self.state.paused
    }

    pub fn state(&self) -> &LedgerState {
        &self.state
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    pub fn curves(&self) -> &CurveRegistry {
        &self.curves
    }

    pub fn last_sequence(&self) -> u64 {
        self.last_sequence
    }

    /// Every event published since construction (or the last `take_events`).
    pub fn events(&self) -> &[LedgerEvent] {
        &self.events
    }

    pub fn take_events(&mut self) -> Vec<LedgerEvent> {
        std::mem::take(&mut self.events)
    }
}
