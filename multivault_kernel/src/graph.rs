/// MultiVault Kernel: Term Graph
///
/// Atoms, triples and their counter-triples, keyed by term id.
/// A counter-triple is registered together with its triple and stores only
/// the back-reference; its components are always read through the triple.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::domain::{Address, AtomRecord, TermId, TermKind, TermRecord, TripleRecord};
use crate::error::{VaultError, VaultResult};
use crate::hashing::{atom_id, atom_wallet_address, counter_triple_id, triple_id};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TermGraph {
    terms: BTreeMap<TermId, TermRecord>,
}

impl TermGraph {
    pub fn new() -> Self {
        Self::default()
    }

    // -----------------------------------------------------------------------
    // Creation
    // -----------------------------------------------------------------------

    pub fn create_atom(
        &mut self,
        content: &[u8],
        creator: Address,
        max_len: usize,
    ) -> VaultResult<TermId> {
        let id = atom_id(content, max_len)?;
        if self.terms.contains_key(&id) {
            return Err(VaultError::AtomExists(id));
        }
        self.terms.insert(
            id,
            TermRecord::Atom(AtomRecord {
                data: content.to_vec(),
                creator,
                wallet: atom_wallet_address(&id),
            }),
        );
        Ok(id)
    }

    /// Registers the triple and its counter-triple. Returns both ids.
    pub fn create_triple(
        &mut self,
        subject_id: TermId,
        predicate_id: TermId,
        object_id: TermId,
        creator: Address,
    ) -> VaultResult<(TermId, TermId)> {
        for component in [subject_id, predicate_id, object_id] {
            if !self.is_atom(&component) {
                return Err(VaultError::AtomDoesNotExist(component));
            }
        }
        let id = triple_id(&subject_id, &predicate_id, &object_id);
        if self.terms.contains_key(&id) {
            return Err(VaultError::TripleExists(id));
        }
        let counter_id = counter_triple_id(&id);
        self.terms.insert(
            id,
            TermRecord::Triple(TripleRecord {
                subject_id,
                predicate_id,
                object_id,
                counter_id,
                creator,
            }),
        );
        self.terms
            .insert(counter_id, TermRecord::CounterTriple { triple_id: id });
        Ok((id, counter_id))
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    pub fn record(&self, id: &TermId) -> VaultResult<&TermRecord> {
        self.terms.get(id).ok_or(VaultError::TermDoesNotExist(*id))
    }

    pub fn kind(&self, id: &TermId) -> VaultResult<TermKind> {
        self.record(id).map(TermRecord::kind)
    }

    pub fn is_term_created(&self, id: &TermId) -> bool {
        self.terms.contains_key(id)
    }

    pub fn is_atom(&self, id: &TermId) -> bool {
        matches!(self.terms.get(id), Some(TermRecord::Atom(_)))
    }

    /// True for positive triples only.
    pub fn is_triple(&self, id: &TermId) -> bool {
        matches!(self.terms.get(id), Some(TermRecord::Triple(_)))
    }

    pub fn is_counter_triple(&self, id: &TermId) -> bool {
        matches!(self.terms.get(id), Some(TermRecord::CounterTriple { .. }))
    }

    pub fn atom(&self, id: &TermId) -> VaultResult<&AtomRecord> {
        match self.terms.get(id) {
            Some(TermRecord::Atom(atom)) => Ok(atom),
            _ => Err(VaultError::AtomDoesNotExist(*id)),
        }
    }

    /// The triple record for a positive or a counter id.
    pub fn triple(&self, id: &TermId) -> VaultResult<&TripleRecord> {
        match self.terms.get(id) {
            Some(TermRecord::Triple(triple)) => Ok(triple),
            Some(TermRecord::CounterTriple { triple_id }) => match self.terms.get(triple_id) {
                Some(TermRecord::Triple(triple)) => Ok(triple),
                _ => Err(VaultError::TripleDoesNotExist(*triple_id)),
            },
            _ => Err(VaultError::TripleDoesNotExist(*id)),
        }
    }

    /// `[subject, predicate, object]`. Identical for a triple and its counter.
    pub fn triple_components(&self, id: &TermId) -> VaultResult<[TermId; 3]> {
        self.triple(id).map(TripleRecord::components)
    }

    pub fn counter_id_of(&self, triple_id: &TermId) -> VaultResult<TermId> {
        match self.terms.get(triple_id) {
            Some(TermRecord::Triple(triple)) => Ok(triple.counter_id),
            _ => Err(VaultError::TripleDoesNotExist(*triple_id)),
        }
    }

    pub fn triple_id_of_counter(&self, counter_id: &TermId) -> VaultResult<TermId> {
        match self.terms.get(counter_id) {
            Some(TermRecord::CounterTriple { triple_id }) => Ok(*triple_id),
            _ => Err(VaultError::TripleDoesNotExist(*counter_id)),
        }
    }

    /// Maps a triple to its counter and a counter back to its triple.
    pub fn inverse(&self, id: &TermId) -> VaultResult<TermId> {
        match self.terms.get(id) {
            Some(TermRecord::Triple(triple)) => Ok(triple.counter_id),
            Some(TermRecord::CounterTriple { triple_id }) => Ok(*triple_id),
            _ => Err(VaultError::TripleDoesNotExist(*id)),
        }
    }

    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&TermId, &TermRecord)> {
        self.terms.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MAX: usize = 256;

    fn graph_with_atoms() -> (TermGraph, [TermId; 3]) {
        let mut g = TermGraph::new();
        let creator = Address::from_low_u64_be(7);
        let s = g.create_atom(b"alice", creator, MAX).unwrap();
        let p = g.create_atom(b"knows", creator, MAX).unwrap();
        let o = g.create_atom(b"bob", creator, MAX).unwrap();
        (g, [s, p, o])
    }

    #[test]
    fn duplicate_atom_is_rejected() {
        let (mut g, [s, _, _]) = graph_with_atoms();
        assert_eq!(
            g.create_atom(b"alice", Address::from_low_u64_be(8), MAX),
            Err(VaultError::AtomExists(s))
        );
    }

    #[test]
    fn atom_record_carries_wallet() {
        let (g, [s, _, _]) = graph_with_atoms();
        let atom = g.atom(&s).unwrap();
        assert_eq!(atom.data, b"alice".to_vec());
        assert_eq!(atom.wallet, atom_wallet_address(&s));
        assert_eq!(g.kind(&s), Ok(TermKind::Atom));
    }

    #[test]
    fn triple_registers_counter() {
        let (mut g, [s, p, o]) = graph_with_atoms();
        let creator = Address::from_low_u64_be(7);
        let (t, c) = g.create_triple(s, p, o, creator).unwrap();
        assert_ne!(t, c);
        assert_eq!(g.kind(&t), Ok(TermKind::Triple));
        assert_eq!(g.kind(&c), Ok(TermKind::CounterTriple));
        assert_eq!(g.inverse(&t), Ok(c));
        assert_eq!(g.inverse(&c), Ok(t));
        assert_eq!(g.triple_components(&t), Ok([s, p, o]));
        assert_eq!(g.triple_components(&c), Ok([s, p, o]));
        assert_eq!(g.counter_id_of(&t), Ok(c));
        assert_eq!(g.triple_id_of_counter(&c), Ok(t));
        assert!(g.is_triple(&t) && !g.is_triple(&c));
        assert!(g.is_counter_triple(&c));
        assert_eq!(
            g.create_triple(s, p, o, creator),
            Err(VaultError::TripleExists(t))
        );
    }

    #[test]
    fn triple_components_must_be_atoms() {
        let (mut g, [s, p, o]) = graph_with_atoms();
        let creator = Address::from_low_u64_be(7);
        let (t, c) = g.create_triple(s, p, o, creator).unwrap();
        assert_eq!(
            g.create_triple(t, p, o, creator),
            Err(VaultError::AtomDoesNotExist(t))
        );
        assert_eq!(
            g.create_triple(s, p, c, creator),
            Err(VaultError::AtomDoesNotExist(c))
        );
        let unknown = TermId([9u8; 32]);
        assert_eq!(
            g.create_triple(s, unknown, o, creator),
            Err(VaultError::AtomDoesNotExist(unknown))
        );
    }

    #[test]
    fn unknown_ids() {
        let g = TermGraph::new();
        let id = TermId([1u8; 32]);
        assert_eq!(g.kind(&id), Err(VaultError::TermDoesNotExist(id)));
        assert_eq!(g.atom(&id), Err(VaultError::AtomDoesNotExist(id)));
        assert_eq!(g.triple(&id), Err(VaultError::TripleDoesNotExist(id)));
    }
}
