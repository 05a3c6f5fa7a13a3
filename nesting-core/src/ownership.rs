//! Direct-ownership record store
//!
//! Single source of truth for "who directly owns this token". The store is
//! a plain map with no side effects; pairing record updates with approval
//! clearing is the engine's job.

use crate::error::{Error, Result};
use crate::types::{OwnerRecord, TokenId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Per-token direct-ownership records
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OwnershipStore {
    records: HashMap<TokenId, OwnerRecord>,
}

impl OwnershipStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Record for a token
    pub fn record(&self, token: TokenId) -> Result<OwnerRecord> {
        self.records
            .get(&token)
            .copied()
            .ok_or(Error::NotFound(token))
    }

    /// Write the record for a token, replacing any previous one
    pub fn set(&mut self, token: TokenId, record: OwnerRecord) {
        self.records.insert(token, record);
    }

    /// Delete the record for a token; true if one existed
    pub fn remove(&mut self, token: TokenId) -> bool {
        self.records.remove(&token).is_some()
    }

    /// True when a record with a non-zero owner exists
    pub fn exists(&self, token: TokenId) -> bool {
        self.records
            .get(&token)
            .map(|r| !r.owner.is_zero())
            .unwrap_or(false)
    }

    /// Number of live records
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// True when no tokens exist
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Iterate all records
    pub fn iter(&self) -> impl Iterator<Item = (&TokenId, &OwnerRecord)> {
        self.records.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Address;

    #[test]
    fn test_set_and_get() {
        let mut store = OwnershipStore::new();
        let owner = Address::generate();
        let token = TokenId::new(1);

        store.set(token, OwnerRecord::external(owner));
        let record = store.record(token).unwrap();
        assert_eq!(record.owner, owner);
        assert!(!record.is_nested);
    }

    #[test]
    fn test_missing_record() {
        let store = OwnershipStore::new();
        assert!(matches!(
            store.record(TokenId::new(9)),
            Err(Error::NotFound(t)) if t == TokenId::new(9)
        ));
        assert!(!store.exists(TokenId::new(9)));
    }

    #[test]
    fn test_remove() {
        let mut store = OwnershipStore::new();
        let token = TokenId::new(3);
        store.set(token, OwnerRecord::external(Address::generate()));

        assert!(store.exists(token));
        assert!(store.remove(token));
        assert!(!store.exists(token));
        assert!(!store.remove(token));
    }

    #[test]
    fn test_zero_owner_does_not_exist() {
        let mut store = OwnershipStore::new();
        let token = TokenId::new(4);
        store.set(token, OwnerRecord::external(Address::ZERO));
        assert!(!store.exists(token));
    }
}
