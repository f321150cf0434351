/// MultiVault Kernel: Identity Derivation & Canonical Hashing
///
/// Term ids are SHA-256 digests under distinct domain salts, so an atom id,
/// a triple id and a counter-triple id can never collide with each other.
///
/// Canonical serialization rules:
///   - kernel_version first, then the ledger state
///   - every map is a BTreeMap (sorted keys)
///   - UTF-8 JSON, no whitespace, no float

use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::domain::{Address, TermId};
use crate::error::{VaultError, VaultResult};
use crate::state::LedgerState;
use crate::KERNEL_VERSION;

pub const ATOM_SALT: &[u8] = b"ATOM_SALT";
pub const TRIPLE_SALT: &[u8] = b"TRIPLE_SALT";
pub const COUNTER_SALT: &[u8] = b"COUNTER_SALT";
pub const ATOM_WALLET_SALT: &[u8] = b"ATOM_WALLET_SALT";

fn sha256_concat(parts: &[&[u8]]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update(part);
    }
    hasher.finalize().into()
}

/// `sha256(ATOM_SALT ‖ sha256(content))`.
pub fn atom_id(content: &[u8], max_len: usize) -> VaultResult<TermId> {
    if content.is_empty() {
        return Err(VaultError::EmptyAtomData);
    }
    if content.len() > max_len {
        return Err(VaultError::ContentTooLong {
            len: content.len(),
            max: max_len,
        });
    }
    let content_hash = Sha256::digest(content);
    Ok(TermId(sha256_concat(&[ATOM_SALT, content_hash.as_slice()])))
}

/// `sha256(TRIPLE_SALT ‖ subject ‖ predicate ‖ object)`.
pub fn triple_id(subject_id: &TermId, predicate_id: &TermId, object_id: &TermId) -> TermId {
    TermId(sha256_concat(&[
        TRIPLE_SALT,
        &subject_id.0[..],
        &predicate_id.0[..],
        &object_id.0[..],
    ]))
}

/// `sha256(COUNTER_SALT ‖ triple_id)`.
pub fn counter_triple_id(triple_id: &TermId) -> TermId {
    TermId(sha256_concat(&[COUNTER_SALT, &triple_id.0[..]]))
}

/// Deterministic atom-wallet resolver: first 20 bytes of
/// `sha256(ATOM_WALLET_SALT ‖ atom_id)`.
pub fn atom_wallet_address(atom_id: &TermId) -> Address {
    let digest = sha256_concat(&[ATOM_WALLET_SALT, &atom_id.0[..]]);
    let mut out = [0u8; 20];
    out.copy_from_slice(&digest[..20]);
    Address(out)
}

/// Field order of this struct is the canonical field order.
/// Amounts exceed u64, so the state is never routed through `serde_json::Value`.
#[derive(Serialize)]
struct CanonicalLedger<'a> {
    kernel_version: u32,
    state: &'a LedgerState,
}

/// Canonical serialization of the ledger state to UTF-8 JSON bytes.
/// kernel_version is the first field for identity binding.
pub fn canonical_serialize(state: &LedgerState) -> VaultResult<Vec<u8>> {
    let canonical = CanonicalLedger {
        kernel_version: KERNEL_VERSION,
        state,
    };
    serde_json::to_vec(&canonical).map_err(|e| VaultError::Serialization(e.to_string()))
}

/// SHA-256 of canonical serialization. Lowercase hex string.
pub fn canonical_hash(state: &LedgerState) -> VaultResult<String> {
    let bytes = canonical_serialize(state)?;
    Ok(hex::encode(Sha256::digest(&bytes)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn atom_id_is_deterministic() {
        let a = atom_id(b"hello", 256).unwrap();
        let b = atom_id(b"hello", 256).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, atom_id(b"hello!", 256).unwrap());
    }

    #[test]
    fn atom_id_rejects_long_content() {
        let content = vec![7u8; 257];
        assert_eq!(
            atom_id(&content, 256),
            Err(VaultError::ContentTooLong { len: 257, max: 256 })
        );
        assert!(atom_id(&content[..256], 256).is_ok());
    }

    #[test]
    fn atom_id_rejects_empty_content() {
        assert_eq!(atom_id(b"", 256), Err(VaultError::EmptyAtomData));
    }

    #[test]
    fn triple_and_counter_domains_differ() {
        let s = atom_id(b"alice", 256).unwrap();
        let p = atom_id(b"knows", 256).unwrap();
        let o = atom_id(b"bob", 256).unwrap();
        let t = triple_id(&s, &p, &o);
        let c = counter_triple_id(&t);
        assert_ne!(t, c);
        assert_ne!(t, s);
        assert_ne!(c, s);
        // component order matters
        assert_ne!(t, triple_id(&o, &p, &s));
    }

    #[test]
    fn atom_wallet_is_stable_per_atom() {
        let a = atom_id(b"alice", 256).unwrap();
        let b = atom_id(b"bob", 256).unwrap();
        assert_eq!(atom_wallet_address(&a), atom_wallet_address(&a));
        assert_ne!(atom_wallet_address(&a), atom_wallet_address(&b));
        assert!(!atom_wallet_address(&a).is_zero());
    }
}
