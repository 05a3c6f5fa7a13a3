//! Core types for the nesting ledger
//!
//! All types are designed for:
//! - Deterministic serialization (bincode)
//! - Cheap copying (ids are `Copy`)
//! - Use as map keys (`Eq` + `Hash` throughout)

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Address of an external account or of a ledger instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Address(Uuid);

impl Address {
    /// The zero address: never owns anything, marks mints and burns
    pub const ZERO: Address = Address(Uuid::nil());

    /// Generate a fresh random address
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    /// Wrap an existing UUID
    pub const fn from_uuid(id: Uuid) -> Self {
        Self(id)
    }

    /// Underlying UUID
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }

    /// True for the zero address
    pub fn is_zero(&self) -> bool {
        self.0.is_nil()
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Token identifier, unique within one ledger instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TokenId(u64);

impl TokenId {
    /// Sentinel for "no token". Id 0 is reserved and can never be minted,
    /// so ownership records use it when the owner is an external account.
    pub const NONE: TokenId = TokenId(0);

    /// Create a token id
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Raw value
    pub fn value(&self) -> u64 {
        self.0
    }

    /// True for the reserved "no token" sentinel
    pub fn is_none(&self) -> bool {
        self.0 == 0
    }
}

impl From<u64> for TokenId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl fmt::Display for TokenId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Direct-ownership record for one token
///
/// Exactly one of these exists per live token. `parent_id` is only
/// meaningful when `is_nested` is set; otherwise it holds `TokenId::NONE`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwnerRecord {
    /// Owning address: an external account, or a ledger instance when nested
    pub owner: Address,

    /// Parent token inside the owning instance (`NONE` for external owners)
    pub parent_id: TokenId,

    /// True when the owner is itself a token in a ledger instance
    pub is_nested: bool,
}

impl OwnerRecord {
    /// Record for ownership by an external account
    pub fn external(owner: Address) -> Self {
        Self {
            owner,
            parent_id: TokenId::NONE,
            is_nested: false,
        }
    }

    /// Record for ownership by a token inside a ledger instance
    pub fn nested(ledger: Address, parent_id: TokenId) -> Self {
        Self {
            owner: ledger,
            parent_id,
            is_nested: true,
        }
    }
}

/// Identity of a child token: the instance that holds it plus its id there
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ChildRef {
    /// Ledger instance the child token lives in
    pub ledger: Address,

    /// Child token id inside that instance
    pub token: TokenId,
}

impl ChildRef {
    /// Create a child reference
    pub fn new(ledger: Address, token: TokenId) -> Self {
        Self { ledger, token }
    }
}

impl fmt::Display for ChildRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.ledger, self.token)
    }
}

/// Position of a child entry inside a parent's collections
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChildSlot {
    /// True when the entry sits in the pending collection
    pub pending: bool,

    /// Index inside that collection
    pub index: usize,
}

impl ChildSlot {
    /// Slot in the pending collection
    pub fn pending(index: usize) -> Self {
        Self {
            pending: true,
            index,
        }
    }

    /// Slot in the active collection
    pub fn active(index: usize) -> Self {
        Self {
            pending: false,
            index,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_address() {
        assert!(Address::ZERO.is_zero());
        assert!(!Address::generate().is_zero());
    }

    #[test]
    fn test_token_id_sentinel() {
        assert!(TokenId::NONE.is_none());
        assert!(!TokenId::new(1).is_none());
        assert_eq!(TokenId::from(7).value(), 7);
    }

    #[test]
    fn test_owner_record_constructors() {
        let account = Address::generate();
        let external = OwnerRecord::external(account);
        assert_eq!(external.owner, account);
        assert_eq!(external.parent_id, TokenId::NONE);
        assert!(!external.is_nested);

        let ledger = Address::generate();
        let nested = OwnerRecord::nested(ledger, TokenId::new(5));
        assert_eq!(nested.owner, ledger);
        assert_eq!(nested.parent_id, TokenId::new(5));
        assert!(nested.is_nested);
    }

    #[test]
    fn test_child_ref_display() {
        let ledger = Address::generate();
        let child = ChildRef::new(ledger, TokenId::new(42));
        assert_eq!(format!("{}", child), format!("{}/#42", ledger));
    }
}
