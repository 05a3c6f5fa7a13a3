//! Per-parent child collections
//!
//! Each parent token carries two ordered collections of child references,
//! pending and active, plus a position index keyed by the (ledger, token)
//! pair. Removal is swap-and-pop: the last entry is moved into the freed
//! slot and its index entry re-pointed in the same call, so collection
//! order is insertion order only until the first removal.
//!
//! A pair is recorded iff it has an index entry; index 0 is an ordinary
//! position, not a sentinel.

use crate::error::{Error, Result};
use crate::types::{ChildRef, ChildSlot, TokenId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Child collections and position index for a single parent token
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChildLedger {
    pending: Vec<ChildRef>,
    active: Vec<ChildRef>,
    index: HashMap<ChildRef, ChildSlot>,
}

impl ChildLedger {
    /// Create empty collections
    pub fn new() -> Self {
        Self::default()
    }

    /// The active collection, in current storage order
    pub fn active(&self) -> &[ChildRef] {
        &self.active
    }

    /// The pending collection, in current storage order
    pub fn pending(&self) -> &[ChildRef] {
        &self.pending
    }

    /// Entry at `index` of the named collection
    pub fn at(&self, index: usize, pending: bool) -> Result<ChildRef> {
        let coll = if pending { &self.pending } else { &self.active };
        coll.get(index).copied().ok_or(Error::IndexOutOfRange {
            index,
            len: coll.len(),
        })
    }

    /// Recorded position of the pair, if any
    pub fn position(&self, child: ChildRef) -> Option<ChildSlot> {
        self.index.get(&child).copied()
    }

    /// True when the pair sits in either collection
    pub fn contains(&self, child: ChildRef) -> bool {
        self.index.contains_key(&child)
    }

    /// True when both collections are empty
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty() && self.active.is_empty()
    }

    /// Append a pair to the pending collection. Returns the index it got.
    pub fn add_pending(&mut self, parent: TokenId, child: ChildRef, capacity: usize) -> Result<usize> {
        if self.pending.len() >= capacity {
            return Err(Error::CapacityExceeded { parent, capacity });
        }
        if self.index.contains_key(&child) {
            return Err(Error::DuplicateRelationship { parent, child });
        }
        let index = self.pending.len();
        self.pending.push(child);
        self.index.insert(child, ChildSlot::pending(index));
        Ok(index)
    }

    /// Promote the pending entry at `index` to the active collection,
    /// verifying it holds `child`. Returns the index it got there.
    pub fn promote_at(&mut self, parent: TokenId, index: usize, child: ChildRef) -> Result<usize> {
        self.take_at(parent, index, true, child)?;
        let new_index = self.active.len();
        self.active.push(child);
        self.index.insert(child, ChildSlot::active(new_index));
        Ok(new_index)
    }

    /// Remove the entry at `index` of the named collection, verifying it
    /// holds `child`.
    pub fn remove_at(
        &mut self,
        parent: TokenId,
        index: usize,
        child: ChildRef,
        from_pending: bool,
    ) -> Result<()> {
        self.take_at(parent, index, from_pending, child)?;
        self.index.remove(&child);
        Ok(())
    }

    /// Re-append a pair removed by [`remove_at`](Self::remove_at). Rollback
    /// path only: skips the capacity and duplicate checks.
    pub fn reinstate(&mut self, child: ChildRef, pending: bool) -> usize {
        let coll = if pending {
            &mut self.pending
        } else {
            &mut self.active
        };
        let index = coll.len();
        coll.push(child);
        self.index.insert(child, ChildSlot { pending, index });
        index
    }

    /// Drop the entire pending collection, returning the dropped entries
    pub fn clear_pending(&mut self) -> Vec<ChildRef> {
        for child in &self.pending {
            self.index.remove(child);
        }
        std::mem::take(&mut self.pending)
    }

    /// Drop the entire active collection, returning the dropped entries
    pub fn clear_active(&mut self) -> Vec<ChildRef> {
        for child in &self.active {
            self.index.remove(child);
        }
        std::mem::take(&mut self.active)
    }

    /// Scan both collections directly, bypassing the index
    pub fn scan(&self, child: ChildRef) -> Option<ChildSlot> {
        if let Some(i) = self.pending.iter().position(|c| *c == child) {
            return Some(ChildSlot::pending(i));
        }
        self.active
            .iter()
            .position(|c| *c == child)
            .map(ChildSlot::active)
    }

    /// Verify every index entry matches the slot it points at
    pub fn check_index(&self) -> Result<()> {
        if self.index.len() != self.pending.len() + self.active.len() {
            return Err(Error::Invariant(format!(
                "index holds {} entries for {} children",
                self.index.len(),
                self.pending.len() + self.active.len()
            )));
        }
        for (i, child) in self.pending.iter().enumerate() {
            match self.index.get(child) {
                Some(slot) if slot.pending && slot.index == i => {}
                _ => {
                    return Err(Error::Invariant(format!(
                        "pending entry {} at {} has no matching index entry",
                        child, i
                    )))
                }
            }
        }
        for (i, child) in self.active.iter().enumerate() {
            match self.index.get(child) {
                Some(slot) if !slot.pending && slot.index == i => {}
                _ => {
                    return Err(Error::Invariant(format!(
                        "active entry {} at {} has no matching index entry",
                        child, i
                    )))
                }
            }
        }
        Ok(())
    }

    // Swap-and-pop removal. The moved entry's index update happens before
    // returning, so no stale position is ever observable.
    fn take_at(
        &mut self,
        parent: TokenId,
        index: usize,
        pending: bool,
        expected: ChildRef,
    ) -> Result<()> {
        let coll = if pending {
            &mut self.pending
        } else {
            &mut self.active
        };
        let len = coll.len();
        if index >= len {
            return Err(Error::IndexOutOfRange { index, len });
        }
        if coll[index] != expected {
            return Err(Error::ParentChildMismatch {
                parent,
                child: expected,
            });
        }
        coll.swap_remove(index);
        if index < coll.len() {
            let moved = coll[index];
            self.index.insert(moved, ChildSlot { pending, index });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Address;

    fn child(n: u64) -> ChildRef {
        ChildRef::new(Address::generate(), TokenId::new(n))
    }

    const PARENT: TokenId = TokenId::new(1);
    const CAP: usize = 128;

    #[test]
    fn test_add_pending_assigns_sequential_indices() {
        let mut ledger = ChildLedger::new();
        for i in 0..5 {
            let idx = ledger.add_pending(PARENT, child(i), CAP).unwrap();
            assert_eq!(idx, i as usize);
        }
        assert_eq!(ledger.pending().len(), 5);
        ledger.check_index().unwrap();
    }

    #[test]
    fn test_capacity_enforced() {
        let mut ledger = ChildLedger::new();
        ledger.add_pending(PARENT, child(0), 1).unwrap();
        assert!(matches!(
            ledger.add_pending(PARENT, child(1), 1),
            Err(Error::CapacityExceeded { capacity: 1, .. })
        ));
    }

    #[test]
    fn test_duplicate_rejected() {
        let mut ledger = ChildLedger::new();
        let c = child(7);
        ledger.add_pending(PARENT, c, CAP).unwrap();
        assert!(matches!(
            ledger.add_pending(PARENT, c, CAP),
            Err(Error::DuplicateRelationship { .. })
        ));

        // still recorded after promotion
        ledger.promote_at(PARENT, 0, c).unwrap();
        assert!(matches!(
            ledger.add_pending(PARENT, c, CAP),
            Err(Error::DuplicateRelationship { .. })
        ));
    }

    #[test]
    fn test_promote_moves_between_collections() {
        let mut ledger = ChildLedger::new();
        let a = child(1);
        let b = child(2);
        ledger.add_pending(PARENT, a, CAP).unwrap();
        ledger.add_pending(PARENT, b, CAP).unwrap();

        let idx = ledger.promote_at(PARENT, 0, a).unwrap();
        assert_eq!(idx, 0);
        assert_eq!(ledger.active(), &[a]);
        // b swapped into slot 0 of pending
        assert_eq!(ledger.pending(), &[b]);
        assert_eq!(ledger.position(b), Some(ChildSlot::pending(0)));
        ledger.check_index().unwrap();
    }

    #[test]
    fn test_mismatched_entry_rejected() {
        let mut ledger = ChildLedger::new();
        let a = child(1);
        let b = child(2);
        ledger.add_pending(PARENT, a, CAP).unwrap();
        ledger.add_pending(PARENT, b, CAP).unwrap();

        // index 0 holds a, not b
        assert!(matches!(
            ledger.promote_at(PARENT, 0, b),
            Err(Error::ParentChildMismatch { .. })
        ));
        assert!(matches!(
            ledger.remove_at(PARENT, 1, a, true),
            Err(Error::ParentChildMismatch { .. })
        ));
        ledger.check_index().unwrap();
    }

    #[test]
    fn test_out_of_range_index() {
        let mut ledger = ChildLedger::new();
        assert!(matches!(
            ledger.promote_at(PARENT, 0, child(1)),
            Err(Error::IndexOutOfRange { index: 0, len: 0 })
        ));
        assert!(matches!(
            ledger.at(3, false),
            Err(Error::IndexOutOfRange { index: 3, len: 0 })
        ));
    }

    #[test]
    fn test_swap_and_pop_repoints_moved_entry() {
        let mut ledger = ChildLedger::new();
        let children: Vec<_> = (0..4).map(child).collect();
        for c in &children {
            ledger.add_pending(PARENT, *c, CAP).unwrap();
        }

        // removing index 1 moves the last entry into slot 1
        ledger.remove_at(PARENT, 1, children[1], true).unwrap();
        assert_eq!(ledger.pending(), &[children[0], children[3], children[2]]);
        assert_eq!(ledger.position(children[3]), Some(ChildSlot::pending(1)));
        assert_eq!(ledger.position(children[1]), None);
        ledger.check_index().unwrap();
    }

    #[test]
    fn test_remove_last_entry_needs_no_repoint() {
        let mut ledger = ChildLedger::new();
        let a = child(1);
        ledger.add_pending(PARENT, a, CAP).unwrap();
        ledger.remove_at(PARENT, 0, a, true).unwrap();
        assert!(ledger.is_empty());
        ledger.check_index().unwrap();
    }

    #[test]
    fn test_clear_pending_erases_index_entries() {
        let mut ledger = ChildLedger::new();
        let a = child(1);
        let b = child(2);
        let c = child(3);
        ledger.add_pending(PARENT, a, CAP).unwrap();
        ledger.add_pending(PARENT, b, CAP).unwrap();
        ledger.add_pending(PARENT, c, CAP).unwrap();
        ledger.promote_at(PARENT, 0, a).unwrap();

        let dropped = ledger.clear_pending();
        assert_eq!(dropped.len(), 2);
        assert!(ledger.pending().is_empty());
        assert_eq!(ledger.active(), &[a]);
        assert!(!ledger.contains(b));
        assert!(!ledger.contains(c));
        ledger.check_index().unwrap();
    }

    #[test]
    fn test_scan_agrees_with_index() {
        let mut ledger = ChildLedger::new();
        let a = child(1);
        let b = child(2);
        ledger.add_pending(PARENT, a, CAP).unwrap();
        ledger.add_pending(PARENT, b, CAP).unwrap();
        ledger.promote_at(PARENT, 1, b).unwrap();

        assert_eq!(ledger.scan(a), ledger.position(a));
        assert_eq!(ledger.scan(b), ledger.position(b));
        assert_eq!(ledger.scan(child(3)), None);
    }

    #[test]
    fn test_reinstate_restores_membership() {
        let mut ledger = ChildLedger::new();
        let a = child(1);
        ledger.add_pending(PARENT, a, CAP).unwrap();
        ledger.promote_at(PARENT, 0, a).unwrap();
        ledger.remove_at(PARENT, 0, a, false).unwrap();
        assert!(!ledger.contains(a));

        let idx = ledger.reinstate(a, false);
        assert_eq!(idx, 0);
        assert_eq!(ledger.active(), &[a]);
        ledger.check_index().unwrap();
    }
}
