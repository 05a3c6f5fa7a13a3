//! Arbor Balance Ledger
//!
//! Address-level bookkeeping consumed by nesting ledger instances: token
//! balances per address, single-token approvals, and operator grants.
//! Authorization is always answered against the direct owner the engine
//! passes in; this crate holds no ownership records of its own.

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, unused_qualifications)]

pub mod book;

pub use book::AccountBook;
