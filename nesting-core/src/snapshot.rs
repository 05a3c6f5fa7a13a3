//! Point-in-time snapshots of instance state
//!
//! A snapshot captures the ownership records and child collections of one
//! instance, serialized with bincode. Snapshots are for inspection and
//! cold restore; the engine never reads them on its own.

use crate::children::ChildLedger;
use crate::error::{Error, Result};
use crate::ownership::OwnershipStore;
use crate::types::{Address, TokenId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

/// Serialized state of one ledger instance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Address of the instance the state belongs to
    pub address: Address,

    /// Instance name at capture time
    pub instance_name: String,

    /// Capture timestamp
    pub taken_at: DateTime<Utc>,

    /// Ownership records
    pub owners: OwnershipStore,

    /// Child collections per parent token
    pub children: HashMap<TokenId, ChildLedger>,
}

impl Snapshot {
    /// Write to a file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let bytes = bincode::serialize(self)?;
        if let Some(dir) = path.as_ref().parent() {
            std::fs::create_dir_all(dir)?;
        }
        std::fs::write(path, bytes)?;
        Ok(())
    }

    /// Read from a file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let bytes = std::fs::read(path)?;
        let snapshot = bincode::deserialize(&bytes)?;
        Ok(snapshot)
    }

    /// Structural validation: every child collection's position index must
    /// agree with the collection contents
    pub fn validate(&self) -> Result<()> {
        for (parent, ledger) in &self.children {
            ledger.check_index().map_err(|e| {
                Error::Invariant(format!("snapshot children of {}: {}", parent, e))
            })?;
        }
        Ok(())
    }
}
