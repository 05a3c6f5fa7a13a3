//! Property-based tests for nesting invariants
//!
//! These tests use proptest to verify critical invariants:
//! - Index coherence: every collection entry has a matching index entry
//! - Disjointness: a child pair sits in at most one collection
//! - Existence: a token exists iff it was minted and not burned
//! - Burn budgets: a chain of depth d burns with budget d-1 and no less

use balance_ledger::AccountBook;
use nesting_core::{
    children::ChildLedger, Address, ChildRef, ChildSlot, Config, Directory, Error, NestingLedger,
    TokenId,
};
use proptest::prelude::*;
use std::collections::HashSet;
use std::sync::Arc;

const PARENT: TokenId = TokenId::new(1);

/// Operations applied to a parent's child collections
#[derive(Debug, Clone)]
enum ChildOp {
    Propose(u64),
    Promote(usize),
    RemovePending(usize),
    RemoveActive(usize),
}

/// Strategy for generating collection operations. Proposals draw from a
/// small token pool so duplicates occur.
fn child_op_strategy() -> impl Strategy<Value = ChildOp> {
    prop_oneof![
        3 => (1u64..24).prop_map(ChildOp::Propose),
        2 => any::<usize>().prop_map(ChildOp::Promote),
        1 => any::<usize>().prop_map(ChildOp::RemovePending),
        1 => any::<usize>().prop_map(ChildOp::RemoveActive),
    ]
}

/// Apply one operation, targeting a live entry when the collection has one
fn apply(ledger: &mut ChildLedger, home: Address, op: &ChildOp) {
    match *op {
        ChildOp::Propose(n) => {
            let _ = ledger.add_pending(PARENT, ChildRef::new(home, TokenId::new(n)), 128);
        }
        ChildOp::Promote(k) => {
            if !ledger.pending().is_empty() {
                let index = k % ledger.pending().len();
                let child = ledger.pending()[index];
                ledger.promote_at(PARENT, index, child).unwrap();
            }
        }
        ChildOp::RemovePending(k) => {
            if !ledger.pending().is_empty() {
                let index = k % ledger.pending().len();
                let child = ledger.pending()[index];
                ledger.remove_at(PARENT, index, child, true).unwrap();
            }
        }
        ChildOp::RemoveActive(k) => {
            if !ledger.active().is_empty() {
                let index = k % ledger.active().len();
                let child = ledger.active()[index];
                ledger.remove_at(PARENT, index, child, false).unwrap();
            }
        }
    }
}

/// Create a registered instance with its own directory and balance book
fn test_instance() -> (Arc<Directory>, Arc<NestingLedger>, Arc<AccountBook>) {
    let directory = Directory::new();
    let book = Arc::new(AccountBook::new());
    let ledger = NestingLedger::new(
        Address::generate(),
        Config::default(),
        directory.clone(),
        book.clone(),
    )
    .register();
    (directory, ledger, book)
}

/// Build `depth` tokens chained under an external root owned by `alice`,
/// accepting each link so the whole chain is active
fn build_chain(ledger: &NestingLedger, alice: Address, depth: u64) {
    ledger.mint(alice, TokenId::new(1)).unwrap();
    for i in 2..=depth {
        ledger
            .nest_mint(ledger.address(), TokenId::new(i), TokenId::new(i - 1))
            .unwrap();
        let child = ChildRef::new(ledger.address(), TokenId::new(i));
        let owner = if i == 2 { alice } else { ledger.address() };
        ledger
            .accept_child(owner, TokenId::new(i - 1), 0, child)
            .unwrap();
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Property: the position index survives any operation sequence
    #[test]
    fn prop_index_survives_arbitrary_op_sequences(
        ops in prop::collection::vec(child_op_strategy(), 1..60)
    ) {
        let home = Address::generate();
        let mut ledger = ChildLedger::new();
        for op in &ops {
            apply(&mut ledger, home, op);
            prop_assert!(ledger.check_index().is_ok());
        }
    }

    /// Property: a pair sits in at most one collection, and the index
    /// always agrees with a direct scan
    #[test]
    fn prop_collections_stay_disjoint(
        ops in prop::collection::vec(child_op_strategy(), 1..60)
    ) {
        let home = Address::generate();
        let mut ledger = ChildLedger::new();
        for op in &ops {
            apply(&mut ledger, home, op);
        }

        for child in ledger.pending() {
            prop_assert!(!ledger.active().contains(child));
        }
        for child in ledger.pending().iter().chain(ledger.active()) {
            prop_assert_eq!(ledger.position(*child), ledger.scan(*child));
        }
        let absent = ChildRef::new(home, TokenId::new(999));
        prop_assert_eq!(ledger.position(absent), None);
    }

    /// Property: a token exists iff it was minted and not since burned,
    /// and the balance book mirrors the live count
    #[test]
    fn prop_existence_tracks_mint_and_burn(
        entries in prop::collection::vec((1u64..200, any::<bool>()), 1..40)
    ) {
        let (_directory, ledger, book) = test_instance();
        let owner = Address::generate();
        let mut live = HashSet::new();

        for (id, burn) in &entries {
            let token = TokenId::new(*id);
            if *burn {
                if live.remove(&token) {
                    prop_assert_eq!(ledger.burn(owner, token, 0).unwrap(), 0);
                } else {
                    prop_assert!(ledger.burn(owner, token, 0).is_err());
                }
            } else if live.insert(token) {
                ledger.mint(owner, token).unwrap();
            } else {
                prop_assert!(matches!(
                    ledger.mint(owner, token),
                    Err(Error::AlreadyExists(_))
                ));
            }
        }

        for id in 1u64..200 {
            let token = TokenId::new(id);
            prop_assert_eq!(ledger.exists(token), live.contains(&token));
        }
        prop_assert_eq!(ledger.token_count(), live.len());
        prop_assert_eq!(book.balance_of(owner), live.len() as u64);
    }

    /// Property: a fully active chain of depth d burns with budget d-1
    /// and fails with anything less
    #[test]
    fn prop_chain_burn_budget_is_exact(depth in 1u64..8) {
        let (_directory, ledger, book) = test_instance();
        let alice = Address::generate();
        build_chain(&ledger, alice, depth);

        let descendants = depth - 1;
        prop_assert_eq!(book.balance_of(ledger.address()), descendants);

        if descendants > 0 {
            prop_assert!(
                matches!(
                    ledger.burn(alice, TokenId::new(1), descendants - 1),
                    Err(Error::BudgetExceeded { .. })
                ),
                "expected BudgetExceeded"
            );
            // the rehearsal failed before any state change
            prop_assert!(ledger.exists(TokenId::new(depth)));
            prop_assert_eq!(book.balance_of(alice), 1);
        }

        prop_assert_eq!(
            ledger.burn(alice, TokenId::new(1), descendants).unwrap(),
            descendants
        );
        for i in 1..=depth {
            prop_assert!(!ledger.exists(TokenId::new(i)));
        }
        prop_assert_eq!(book.balance_of(alice), 0);
        prop_assert_eq!(book.balance_of(ledger.address()), 0);
    }

    /// Property: every token in a chain resolves to the same root owner
    #[test]
    fn prop_root_owner_constant_down_chain(depth in 2u64..30) {
        let (_directory, ledger, _book) = test_instance();
        let alice = Address::generate();
        build_chain(&ledger, alice, depth);

        for i in 1..=depth {
            prop_assert_eq!(ledger.root_owner_of(TokenId::new(i)).unwrap(), alice);
        }
    }
}

#[cfg(test)]
mod integration_tests {
    use super::*;

    #[test]
    fn test_child_shuffle_keeps_find_child_accurate() {
        let (_directory, ledger, _book) = test_instance();
        let alice = Address::generate();
        let root = TokenId::new(1);
        ledger.mint(alice, root).unwrap();

        let refs: Vec<ChildRef> = (10u64..15)
            .map(|i| ChildRef::new(ledger.address(), TokenId::new(i)))
            .collect();
        for r in &refs {
            ledger.nest_mint(ledger.address(), r.token, root).unwrap();
        }

        // Accept out of order and abandon one pending entry; every removal
        // swaps the last entry into the freed slot.
        ledger.accept_child(alice, root, 0, refs[0]).unwrap();
        ledger.accept_child(alice, root, 2, refs[2]).unwrap();
        ledger
            .unnest_child(alice, root, Address::ZERO, 1, refs[1], true)
            .unwrap();

        assert_eq!(ledger.pending_children_of(root), vec![refs[4], refs[3]]);
        assert_eq!(ledger.children_of(root), vec![refs[0], refs[2]]);
        for (slot, r) in [
            (ChildSlot::pending(0), refs[4]),
            (ChildSlot::pending(1), refs[3]),
            (ChildSlot::active(0), refs[0]),
            (ChildSlot::active(1), refs[2]),
        ] {
            assert_eq!(ledger.find_child(root, r), Some(slot));
        }
        assert_eq!(ledger.find_child(root, refs[1]), None);
    }

    #[test]
    fn test_abandoned_child_can_be_reproposed() {
        let directory = Directory::new();
        let book = Arc::new(AccountBook::new());
        let mut config = Config::default();
        config.instance_name = "relics".to_string();
        let relics =
            NestingLedger::new(Address::generate(), config, directory.clone(), book.clone())
                .register();
        let mut config = Config::default();
        config.instance_name = "charms".to_string();
        let charms =
            NestingLedger::new(Address::generate(), config, directory.clone(), book.clone())
                .register();
        let alice = Address::generate();
        let root = TokenId::new(1);
        let charm = TokenId::new(10);

        relics.mint(alice, root).unwrap();
        charms.nest_mint(relics.address(), charm, root).unwrap();
        relics.reject_all_children(alice, root, 1).unwrap();
        assert!(relics.pending_children_of(root).is_empty());

        // The abandoned child's record still names this parent, so a fresh
        // report verifies and lands in pending again.
        relics.add_child(charms.address(), root, charm).unwrap();
        assert_eq!(
            relics.pending_children_of(root),
            vec![ChildRef::new(charms.address(), charm)]
        );
    }
}
