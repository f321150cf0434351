/// MultiVault Kernel: Invariant Checks
///
/// Run on the working copy after every transition, before it replaces the
/// committed state, and on every restored snapshot. The first failure is
/// returned as `VaultError::InvariantViolation`.

use crate::config::LedgerConfig;
use crate::domain::{Address, TermRecord};
use crate::error::{VaultError, VaultResult};
use crate::state::LedgerState;

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

pub fn validate_invariants(state: &LedgerState, config: &LedgerConfig) -> VaultResult<()> {
    check_share_conservation(state)?;
    check_ghost_floor(state, config.general.min_share)?;
    check_no_empty_balances(state)?;
    check_vault_references(state)?;
    check_counter_pairing(state)?;
    check_triple_components(state)?;
    Ok(())
}

fn violation(tag: &str, msg: String) -> VaultError {
    VaultError::InvariantViolation(format!("[INVARIANT:{}] {}", tag, msg))
}

// ---------------------------------------------------------------------------
// Individual checks (private)
// ---------------------------------------------------------------------------

/// Sum of balances equals total_shares in every vault.
fn check_share_conservation(state: &LedgerState) -> VaultResult<()> {
    for (term_id, curve_id, vault) in state.vaults.iter() {
        let mut sum: u128 = 0;
        for shares in vault.balances.values() {
            sum = sum.checked_add(*shares).ok_or(VaultError::Overflow)?;
        }
        if sum != vault.total_shares {
            return Err(violation(
                "share_conservation",
                format!(
                    "vault ({}, {}) balances sum to {} but total_shares is {}",
                    term_id, curve_id, sum, vault.total_shares
                ),
            ));
        }
    }
    Ok(())
}

/// Every vault keeps exactly its ghost shares at the zero address.
fn check_ghost_floor(state: &LedgerState, min_share: u128) -> VaultResult<()> {
    for (term_id, curve_id, vault) in state.vaults.iter() {
        let ghost = vault.balance_of(&Address::ZERO);
        if ghost != min_share || vault.total_shares < min_share {
            return Err(violation(
                "ghost_floor",
                format!(
                    "vault ({}, {}) holds {} ghost shares of {} total, expected {}",
                    term_id, curve_id, ghost, vault.total_shares, min_share
                ),
            ));
        }
    }
    Ok(())
}

fn check_no_empty_balances(state: &LedgerState) -> VaultResult<()> {
    for (term_id, curve_id, vault) in state.vaults.iter() {
        if let Some((account, _)) = vault.balances.iter().find(|(_, s)| **s == 0) {
            return Err(violation(
                "empty_balance",
                format!("vault ({}, {}) stores a zero balance for {}", term_id, curve_id, account),
            ));
        }
    }
    Ok(())
}

/// Vaults only exist for known terms on registered curves.
fn check_vault_references(state: &LedgerState) -> VaultResult<()> {
    for (term_id, curve_id, _) in state.vaults.iter() {
        if !state.terms.is_term_created(term_id) {
            return Err(violation(
                "vault_references",
                format!("vault for unknown term {}", term_id),
            ));
        }
        if !state.curve_names.contains_key(&curve_id) {
            return Err(violation(
                "vault_references",
                format!("vault for {} on unregistered curve {}", term_id, curve_id),
            ));
        }
    }
    Ok(())
}

/// Triple and counter-triple point at each other, and are distinct.
fn check_counter_pairing(state: &LedgerState) -> VaultResult<()> {
    for (id, record) in state.terms.iter() {
        match record {
            TermRecord::Triple(triple) => {
                if triple.counter_id == *id {
                    return Err(violation(
                        "counter_pairing",
                        format!("triple {} is its own counter", id),
                    ));
                }
                if state.terms.triple_id_of_counter(&triple.counter_id).ok() != Some(*id) {
                    return Err(violation(
                        "counter_pairing",
                        format!("counter {} does not point back to {}", triple.counter_id, id),
                    ));
                }
            }
            TermRecord::CounterTriple { triple_id } => {
                if state.terms.counter_id_of(triple_id).ok() != Some(*id) {
                    return Err(violation(
                        "counter_pairing",
                        format!("counter {} has no matching triple {}", id, triple_id),
                    ));
                }
            }
            TermRecord::Atom(_) => {}
        }
    }
    Ok(())
}

fn check_triple_components(state: &LedgerState) -> VaultResult<()> {
    for (id, record) in state.terms.iter() {
        if let TermRecord::Triple(triple) = record {
            for component in triple.components() {
                if !state.terms.is_atom(&component) {
                    return Err(violation(
                        "triple_components",
                        format!("triple {} references non-atom {}", id, component),
                    ));
                }
            }
        }
    }
    Ok(())
}
