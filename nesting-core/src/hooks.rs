//! Hook surface around engine transitions
//!
//! Collaborating layers (asset attachments, equip rules, auditing) observe
//! and veto transitions without the engine depending on them. A `before_*`
//! callback may return an error, which aborts the operation before any
//! state changes; an `after_*` callback runs once the mutation is
//! committed and cannot fail. When an operation aborts after its `before_*`
//! ran, the matching `after_*` never runs.

use crate::error::Result;
use crate::types::{Address, ChildRef, TokenId};

/// What a transfer-class transition exposes to hooks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferInfo {
    /// Source holder (zero on mint)
    pub from: Address,

    /// Destination holder (zero on burn)
    pub to: Address,

    /// Parent token at the destination (`NONE` for non-nested moves)
    pub to_token: TokenId,

    /// Token being moved
    pub token: TokenId,

    /// True when the destination is a token slot
    pub nested: bool,
}

/// Observer interface bracketing every mutating transition.
///
/// All methods default to no-ops, so implementations override only the
/// transitions they care about.
#[allow(unused_variables)]
pub trait NestingHooks: Send + Sync {
    /// Veto point before any mint, transfer, or burn
    fn before_transfer(&self, transfer: &TransferInfo) -> Result<()> {
        Ok(())
    }

    /// Reaction to a committed mint, transfer, or burn
    fn after_transfer(&self, transfer: &TransferInfo) {}

    /// Veto point before a child report is recorded
    fn before_add_child(&self, parent: TokenId, child: ChildRef) -> Result<()> {
        Ok(())
    }

    /// Reaction to a child entering the pending collection
    fn after_add_child(&self, parent: TokenId, child: ChildRef) {}

    /// Veto point before a pending child is promoted
    fn before_accept_child(&self, parent: TokenId, child: ChildRef) -> Result<()> {
        Ok(())
    }

    /// Reaction to a child reaching the active collection
    fn after_accept_child(&self, parent: TokenId, child: ChildRef) {}

    /// Veto point before a child entry is removed
    fn before_unnest_child(&self, parent: TokenId, child: ChildRef, from_pending: bool) -> Result<()> {
        Ok(())
    }

    /// Reaction to a removed child entry
    fn after_unnest_child(&self, parent: TokenId, child: ChildRef, from_pending: bool) {}

    /// Veto point before the pending collection is dropped
    fn before_reject_all(&self, parent: TokenId) -> Result<()> {
        Ok(())
    }

    /// Reaction to the pending collection being dropped
    fn after_reject_all(&self, parent: TokenId) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Unconfigured;
    impl NestingHooks for Unconfigured {}

    #[test]
    fn test_defaults_are_no_ops() {
        let hooks = Unconfigured;
        let info = TransferInfo {
            from: Address::ZERO,
            to: Address::generate(),
            to_token: TokenId::NONE,
            token: TokenId::new(1),
            nested: false,
        };

        assert!(hooks.before_transfer(&info).is_ok());
        assert!(hooks.before_add_child(TokenId::new(1), ChildRef::new(Address::generate(), TokenId::new(2))).is_ok());
        assert!(hooks.before_reject_all(TokenId::new(1)).is_ok());
    }
}
