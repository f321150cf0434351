//! Off-ledger event indexer.
//!
//! Collects the notifications a ledger publishes, tagged with the sequence
//! of the operation that produced them, and answers range queries by
//! category, by account and by term. Read-only with respect to the ledger.

use std::collections::BTreeMap;
use std::ops::RangeInclusive;

use log::debug;
use serde::Serialize;

use multivault_kernel::events::LedgerEvent;
use multivault_kernel::{Address, TermId};

/// Event categories the indexer groups by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EventCategory {
    AtomCreated,
    TripleCreated,
    Deposited,
    Redeemed,
}

impl EventCategory {
    fn of(event: &LedgerEvent) -> Option<Self> {
        match event {
            LedgerEvent::AtomCreated { .. } => Some(Self::AtomCreated),
            LedgerEvent::TripleCreated { .. } => Some(Self::TripleCreated),
            LedgerEvent::Deposited { .. } => Some(Self::Deposited),
            LedgerEvent::Redeemed { .. } => Some(Self::Redeemed),
            _ => None,
        }
    }
}

/// A notification with the sequence of the operation that emitted it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IndexedEvent {
    pub sequence: u64,
    pub event: LedgerEvent,
}

impl IndexedEvent {
    /// The account that initiated the event: creator for creations,
    /// sender for deposits and redemptions.
    pub fn actor(&self) -> Option<Address> {
        match &self.event {
            LedgerEvent::AtomCreated { creator, .. } | LedgerEvent::TripleCreated { creator, .. } => {
                Some(*creator)
            }
            LedgerEvent::Deposited { sender, .. } | LedgerEvent::Redeemed { sender, .. } => {
                Some(*sender)
            }
            _ => None,
        }
    }
}

/// Query result grouped by category.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EventSummary {
    pub atoms_created: Vec<IndexedEvent>,
    pub triples_created: Vec<IndexedEvent>,
    pub deposits: Vec<IndexedEvent>,
    pub redemptions: Vec<IndexedEvent>,
}

impl EventSummary {
    fn push(&mut self, category: EventCategory, indexed: IndexedEvent) {
        match category {
            EventCategory::AtomCreated => self.atoms_created.push(indexed),
            EventCategory::TripleCreated => self.triples_created.push(indexed),
            EventCategory::Deposited => self.deposits.push(indexed),
            EventCategory::Redeemed => self.redemptions.push(indexed),
        }
    }

    /// Counts per category, in a stable order.
    pub fn counts(&self) -> BTreeMap<EventCategory, usize> {
        BTreeMap::from([
            (EventCategory::AtomCreated, self.atoms_created.len()),
            (EventCategory::TripleCreated, self.triples_created.len()),
            (EventCategory::Deposited, self.deposits.len()),
            (EventCategory::Redeemed, self.redemptions.len()),
        ])
    }

    pub fn is_empty(&self) -> bool {
        self.atoms_created.is_empty()
            && self.triples_created.is_empty()
            && self.deposits.is_empty()
            && self.redemptions.is_empty()
    }
}

#[derive(Debug, Clone, Default)]
pub struct EventIndexer {
    events: Vec<IndexedEvent>,
    last_sequence: u64,
}

impl EventIndexer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the events one operation published. Categories the indexer
    /// does not track are dropped.
    pub fn ingest(&mut self, sequence: u64, events: &[LedgerEvent]) {
        let before = self.events.len();
        self.events.extend(
            events
                .iter()
                .filter(|e| EventCategory::of(e).is_some())
                .map(|e| IndexedEvent {
                    sequence,
                    event: e.clone(),
                }),
        );
        self.last_sequence = self.last_sequence.max(sequence);
        debug!(
            "event=index_ingest module=indexer status=ok sequence={} indexed={}",
            sequence,
            self.events.len() - before
        );
    }

    /// Every tracked event emitted by operations in `range`.
    pub fn query(&self, range: RangeInclusive<u64>) -> EventSummary {
        self.collect(|indexed| range.contains(&indexed.sequence))
    }

    /// Events initiated by `account` within `range`.
    pub fn query_account(&self, account: &Address, range: RangeInclusive<u64>) -> EventSummary {
        self.collect(|indexed| {
            range.contains(&indexed.sequence) && indexed.actor().as_ref() == Some(account)
        })
    }

    /// Events touching `term_id`, over the whole history.
    pub fn query_term(&self, term_id: &TermId) -> EventSummary {
        self.collect(|indexed| indexed.event.term_id().as_ref() == Some(term_id))
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn last_sequence(&self) -> u64 {
        self.last_sequence
    }

    fn collect(&self, keep: impl Fn(&IndexedEvent) -> bool) -> EventSummary {
        let mut summary = EventSummary::default();
        for indexed in self.events.iter().filter(|e| keep(e)) {
            if let Some(category) = EventCategory::of(&indexed.event) {
                summary.push(category, indexed.clone());
            }
        }
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use multivault_kernel::MultiVault;
    use multivault_kernel::LedgerConfig;

    fn alice() -> Address {
        Address::from_low_u64_be(0xa1)
    }

    fn bob() -> Address {
        Address::from_low_u64_be(0xb0)
    }

    #[test]
    fn groups_by_category_and_filters() {
        let mut ledger = MultiVault::new(LedgerConfig::default()).unwrap();
        let mut indexer = EventIndexer::new();
        let cost = ledger.atom_cost().unwrap();

        let ids = ledger
            .create_atoms(alice(), &[b"a".to_vec(), b"b".to_vec()], &[cost, cost])
            .unwrap();
        indexer.ingest(1, &ledger.take_events());

        ledger
            .deposit(bob(), bob(), ids[0], 1, cost * 2, 0)
            .unwrap();
        indexer.ingest(2, &ledger.take_events());

        let all = indexer.query(0..=u64::MAX);
        assert_eq!(all.atoms_created.len(), 2);
        assert_eq!(all.deposits.len(), 1);
        assert!(all.redemptions.is_empty());
        assert_eq!(indexer.last_sequence(), 2);

        let bobs = indexer.query_account(&bob(), 0..=u64::MAX);
        assert!(bobs.atoms_created.is_empty());
        assert_eq!(bobs.deposits.len(), 1);

        assert!(indexer.query(3..=10).is_empty());
        assert_eq!(indexer.query_term(&ids[1]).counts()[&EventCategory::AtomCreated], 1);
        assert!(indexer.query_term(&ids[1]).deposits.is_empty());
    }

    #[test]
    fn untracked_events_are_dropped() {
        let mut indexer = EventIndexer::new();
        indexer.ingest(4, &[LedgerEvent::EpochAdvanced { epoch: 1 }]);
        assert!(indexer.is_empty());
        assert_eq!(indexer.last_sequence(), 4);
    }
}
