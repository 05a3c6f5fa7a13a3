//! Error types for the nesting ledger

use crate::types::{Address, ChildRef, TokenId};
use thiserror::Error;

/// Result type for nesting operations
pub type Result<T> = std::result::Result<T, Error>;

/// Nesting ledger errors
#[derive(Error, Debug)]
pub enum Error {
    /// No ownership record exists for the token
    #[error("Token {0} not found")]
    NotFound(TokenId),

    /// Mint collision with a live token
    #[error("Token {0} already exists")]
    AlreadyExists(TokenId),

    /// Token id 0 is reserved as the "no token" sentinel
    #[error("Token id 0 is reserved")]
    ReservedTokenId,

    /// Zero address given where a real recipient is required
    #[error("Recipient is the zero address")]
    InvalidRecipient,

    /// Address does not host a nesting-capable ledger instance
    #[error("Address {0} does not implement the nesting interface")]
    NotNestableImplementer(Address),

    /// Caller is neither the direct owner of the token nor approved for it
    #[error("Caller {caller} is not authorized for token {token}")]
    NotAuthorized {
        /// Identity the operation ran under
        caller: Address,
        /// Token the caller tried to act on
        token: TokenId,
    },

    /// Recorded direct owner disagrees with the source the caller named
    #[error("Token {token} is directly owned by {actual}, not {claimed}")]
    WrongOwner {
        /// Token being moved
        token: TokenId,
        /// Source address the caller named
        claimed: Address,
        /// Direct owner on record
        actual: Address,
    },

    /// Child pair already recorded under the parent
    #[error("Child {child} already recorded under parent {parent}")]
    DuplicateRelationship {
        /// Parent token
        parent: TokenId,
        /// Child pair that was offered twice
        child: ChildRef,
    },

    /// Stored entry does not match the requested pair, or the counterpart's
    /// own records do not confirm the claimed relationship
    #[error("Child {child} does not match the recorded relationship for parent {parent}")]
    ParentChildMismatch {
        /// Parent token
        parent: TokenId,
        /// Child pair that failed verification
        child: ChildRef,
    },

    /// Index beyond the end of a child collection
    #[error("Child index {index} out of range (collection holds {len})")]
    IndexOutOfRange {
        /// Requested index
        index: usize,
        /// Collection length at the time of the access
        len: usize,
    },

    /// Token would be nested under itself
    #[error("Token {0} cannot be nested under itself")]
    SelfNesting(TokenId),

    /// Ancestry walk found the moved token among the destination's
    /// ancestors, or ran out of hops before reaching a root
    #[error("Ancestry walk for token {token} cycled or exceeded {max_hops} hops")]
    Cycle {
        /// Token whose ancestry was walked
        token: TokenId,
        /// Configured hop bound
        max_hops: u32,
    },

    /// Pending collection is full
    #[error("Pending children of {parent} at capacity ({capacity})")]
    CapacityExceeded {
        /// Parent token whose pending collection is full
        parent: TokenId,
        /// Configured capacity
        capacity: usize,
    },

    /// Recursive burn budget ran out before this child could be processed
    #[error("Burn budget exhausted before child {child}")]
    BudgetExceeded {
        /// First child that no longer fit in the budget
        child: ChildRef,
    },

    /// More pending children than the caller was prepared to reject
    #[error("{actual} pending children exceed the expected maximum of {expected}")]
    UnexpectedChildCount {
        /// Maximum the caller expected
        expected: usize,
        /// Actual pending count
        actual: usize,
    },

    /// Internal consistency violation (index desync, balance underflow)
    #[error("Invariant violation: {0}")]
    Invariant(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
