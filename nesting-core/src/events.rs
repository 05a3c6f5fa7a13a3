//! Lifecycle events emitted by a ledger instance
//!
//! Every successful mutation pushes one event onto the instance's event
//! log. Consumers drain the log with [`crate::NestingLedger::take_events`];
//! nothing in the engine replays or depends on past events.

use crate::types::{Address, ChildRef, TokenId};
use serde::{Deserialize, Serialize};

/// Event recorded on a successful state transition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum NestingEvent {
    /// Token moved between addresses. Mints use the zero address as `from`,
    /// burns use it as `to`.
    Transferred {
        /// Previous holder
        from: Address,
        /// New holder
        to: Address,
        /// Token that moved
        token: TokenId,
    },

    /// Token moved into or out of a token slot
    NestTransferred {
        /// Previous holder
        from: Address,
        /// New holder (a ledger instance)
        to: Address,
        /// Parent token at the source (`NONE` when the source was external)
        from_token: TokenId,
        /// Parent token at the destination
        to_token: TokenId,
        /// Token that moved
        token: TokenId,
    },

    /// A counterpart reported a new child; it now awaits acceptance
    ChildProposed {
        /// Parent token the child was offered to
        parent: TokenId,
        /// Index the child received in the pending collection
        index: usize,
        /// The child pair
        child: ChildRef,
    },

    /// Pending child promoted to the active collection
    ChildAccepted {
        /// Parent token
        parent: TokenId,
        /// Index the child received in the active collection
        index: usize,
        /// The child pair
        child: ChildRef,
    },

    /// Child entry removed from one of the parent's collections
    ChildUnnested {
        /// Parent token
        parent: TokenId,
        /// Index the entry held when it was removed
        index: usize,
        /// The child pair
        child: ChildRef,
        /// True when the entry came out of the pending collection
        from_pending: bool,
    },

    /// Entire pending collection of the parent was dropped
    AllChildrenRejected {
        /// Parent token
        parent: TokenId,
    },
}
