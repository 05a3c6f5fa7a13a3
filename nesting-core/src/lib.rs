//! Arbor Nesting Core
//!
//! Tree-structured token ownership: tokens that own tokens, across
//! cooperating ledger instances.
//!
//! # Architecture
//!
//! - **Direct vs root ownership**: every token has exactly one direct owner
//!   (an external account or a parent token) and resolving parent pointers
//!   upward always ends at one external root owner
//! - **Two-phase attachment**: children arrive pending and join the active
//!   collection only when the parent's owner accepts them
//! - **Distrustful counterparts**: any claim arriving from another instance
//!   is re-verified against the claimant's own records before local state
//!   changes
//! - **Bounded traversal**: ancestry walks carry a hop bound, and recursive
//!   burns spend a caller-supplied descendant budget

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, unused_qualifications)]

pub mod types;
pub mod error;
pub mod config;
pub mod ownership;
pub mod children;
pub mod interface;
pub mod directory;
pub mod hooks;
pub mod events;
pub mod engine;
pub mod snapshot;
pub mod metrics;

// Re-exports
pub use config::{Config, LimitsConfig, SnapshotConfig};
pub use directory::Directory;
pub use engine::NestingLedger;
pub use error::{Error, Result};
pub use events::NestingEvent;
pub use hooks::{NestingHooks, TransferInfo};
pub use interface::{BalanceBook, Nestable};
pub use metrics::Metrics;
pub use snapshot::Snapshot;
pub use types::{Address, ChildRef, ChildSlot, OwnerRecord, TokenId};
