//! Interfaces between ledger instances and their collaborators
//!
//! [`Nestable`] is the surface one instance exposes to another; every
//! cross-instance step of a nested operation goes through it. Counterparts
//! are never trusted: any claim arriving through this interface is
//! re-verified against the claimant's own records before local state
//! changes.
//!
//! [`BalanceBook`] is the bookkeeping surface the engine consumes. It is
//! scoped to direct ownership; approvals never traverse the ancestry chain.

use crate::error::Result;
use crate::types::{Address, ChildRef, OwnerRecord, TokenId};

/// Public nesting interface of a ledger instance
pub trait Nestable: Send + Sync {
    /// Address this instance is registered under
    fn address(&self) -> Address;

    /// Capability probe: true when the instance speaks the nesting protocol
    fn supports_nesting(&self) -> bool;

    /// Direct-ownership record of a token
    fn direct_owner_of(&self, token: TokenId) -> Result<OwnerRecord>;

    /// Terminal non-nested owner reached through the ancestry chain
    fn root_owner_of(&self, token: TokenId) -> Result<Address>;

    /// Snapshot of the parent's active children
    fn children_of(&self, parent: TokenId) -> Result<Vec<ChildRef>>;

    /// Snapshot of the parent's pending children
    fn pending_children_of(&self, parent: TokenId) -> Result<Vec<ChildRef>>;

    /// Inbound child report: the instance at `caller` claims its token
    /// `child_token` is now directly owned by `parent` here. The claim is
    /// verified against the caller's records before the child is appended
    /// to the pending collection.
    fn add_child(&self, caller: Address, parent: TokenId, child_token: TokenId) -> Result<()>;

    /// Inbound removal notice: the instance at `caller` reports its token
    /// `child_token` has left the slot under `parent` here, after a burn
    /// or an outbound transfer. The entry is dropped only once the
    /// caller's records no longer confirm the nesting; a notice for an
    /// entry already gone succeeds without effect.
    fn drop_child(&self, caller: Address, parent: TokenId, child_token: TokenId) -> Result<()>;

    /// Burn a token along with its active descendants, spending at most
    /// `max_child_burns` descendant burns. Returns the number of
    /// descendants actually burned.
    fn burn(&self, caller: Address, token: TokenId, max_child_burns: u64) -> Result<u64>;

    /// Non-nested transfer of a token to the address `to`
    fn transfer(&self, caller: Address, from: Address, to: Address, token: TokenId) -> Result<()>;
}

/// Balance and approval bookkeeping consumed by the engine
pub trait BalanceBook: Send + Sync {
    /// Credit one token to the address's balance
    fn increment_balance(&self, addr: Address);

    /// Debit one token from the address's balance
    fn decrement_balance(&self, addr: Address) -> Result<()>;

    /// Drop any single-token approval for the token
    fn clear_approval(&self, token: TokenId);

    /// True when `spender` is the direct owner, holds the token's
    /// single-token approval, or is an operator for the direct owner
    fn approved_or_owner(&self, spender: Address, token: TokenId, direct_owner: Address) -> bool;
}
