//! Nesting engine: a single ledger instance
//!
//! This module ties the ownership store, child collections, balance book,
//! and instance directory together into the full token lifecycle: mint,
//! transfer, child acceptance, unnesting, and recursive burn.
//!
//! Cross-instance steps go through [`Nestable`] on the counterpart, and
//! every claim that arrives that way is re-verified against the claimant's
//! own records before anything changes locally. The state lock is never
//! held across a call into another instance, so an operation that loops
//! back into this instance (parent and child in the same ledger, say)
//! re-enters cleanly.
//!
//! # Example
//!
//! ```no_run
//! use balance_ledger::AccountBook;
//! use nesting_core::{Address, Config, Directory, NestingLedger, TokenId};
//! use std::sync::Arc;
//!
//! fn main() -> nesting_core::Result<()> {
//!     let directory = Directory::new();
//!     let book = Arc::new(AccountBook::new());
//!     let ledger = NestingLedger::new(
//!         Address::generate(),
//!         Config::default(),
//!         directory.clone(),
//!         book.clone(),
//!     )
//!     .register();
//!
//!     let alice = Address::generate();
//!     ledger.mint(alice, TokenId::new(1))?;
//!     assert_eq!(ledger.root_owner_of(TokenId::new(1))?, alice);
//!     Ok(())
//! }
//! ```

use crate::{
    children::ChildLedger,
    config::Config,
    directory::Directory,
    error::{Error, Result},
    events::NestingEvent,
    hooks::{NestingHooks, TransferInfo},
    interface::{BalanceBook, Nestable},
    metrics::Metrics,
    ownership::OwnershipStore,
    snapshot::Snapshot,
    types::{Address, ChildRef, ChildSlot, OwnerRecord, TokenId},
};
use chrono::Utc;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Mutable state of one instance
#[derive(Debug, Default)]
struct LedgerState {
    owners: OwnershipStore,
    children: HashMap<TokenId, ChildLedger>,
    events: Vec<NestingEvent>,
}

/// One frame of the burn rehearsal walk
struct PlanFrame {
    /// Token whose children this frame iterates
    parent: ChildRef,
    children: Vec<ChildRef>,
    next: usize,
    budget: u64,
    spent: u64,
    /// Reached from the root without crossing instances
    local: bool,
}

/// What the burn rehearsal learned
struct BurnPlan {
    /// Descendants the whole active subtree costs
    descendants: u64,
    /// Transfer views of the same-instance descendant frames, in visit
    /// order
    locals: Vec<TransferInfo>,
}

/// A nestable token ledger instance
pub struct NestingLedger {
    address: Address,
    config: Config,
    directory: Arc<Directory>,
    book: Arc<dyn BalanceBook>,
    hooks: Vec<Box<dyn NestingHooks>>,
    metrics: Metrics,
    state: RwLock<LedgerState>,
}

impl NestingLedger {
    /// Create an instance. It joins the deployment once
    /// [`register`](Self::register) is called.
    pub fn new(
        address: Address,
        config: Config,
        directory: Arc<Directory>,
        book: Arc<dyn BalanceBook>,
    ) -> Self {
        Self {
            address,
            config,
            directory,
            book,
            hooks: Vec::new(),
            metrics: Metrics::default(),
            state: RwLock::new(LedgerState::default()),
        }
    }

    /// Attach a hook set. Hooks run in attachment order.
    pub fn with_hook(mut self, hook: Box<dyn NestingHooks>) -> Self {
        self.hooks.push(hook);
        self
    }

    /// Register the instance in the shared directory and hand back the
    /// shared handle counterparts will resolve.
    pub fn register(self) -> Arc<Self> {
        let instance = Arc::new(self);
        instance.directory.register(instance.clone());
        info!(
            instance = %instance.config.instance_name,
            address = %instance.address,
            "ledger instance registered"
        );
        instance
    }

    /// Address this instance answers under
    pub fn address(&self) -> Address {
        self.address
    }

    /// Instance configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Metrics collector
    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    /// Drain the event log
    pub fn take_events(&self) -> Vec<NestingEvent> {
        std::mem::take(&mut self.state.write().events)
    }

    /// Number of live tokens
    pub fn token_count(&self) -> usize {
        self.state.read().owners.len()
    }

    // ---- queries ----------------------------------------------------------

    /// True when a token with this id exists
    pub fn exists(&self, token: TokenId) -> bool {
        self.state.read().owners.exists(token)
    }

    /// Direct-ownership record of a token
    pub fn direct_owner_of(&self, token: TokenId) -> Result<OwnerRecord> {
        self.state.read().owners.record(token)
    }

    /// Terminal non-nested owner, reached by following parent pointers
    /// across instances. A walk longer than the configured hop bound is
    /// reported as a cycle.
    pub fn root_owner_of(&self, token: TokenId) -> Result<Address> {
        let max_hops = self.config.limits.max_ancestry_hops;
        let mut record = self.direct_owner_of(token)?;
        for _ in 0..max_hops {
            if !record.is_nested {
                return Ok(record.owner);
            }
            let instance = self.counterpart(record.owner)?;
            record = instance.direct_owner_of(record.parent_id)?;
        }
        if record.is_nested {
            Err(Error::Cycle { token, max_hops })
        } else {
            Ok(record.owner)
        }
    }

    /// Active children of a parent, in current storage order
    pub fn children_of(&self, parent: TokenId) -> Vec<ChildRef> {
        self.state
            .read()
            .children
            .get(&parent)
            .map(|ledger| ledger.active().to_vec())
            .unwrap_or_default()
    }

    /// Pending children of a parent, in current storage order
    pub fn pending_children_of(&self, parent: TokenId) -> Vec<ChildRef> {
        self.state
            .read()
            .children
            .get(&parent)
            .map(|ledger| ledger.pending().to_vec())
            .unwrap_or_default()
    }

    /// Active child at an index
    pub fn child_at(&self, parent: TokenId, index: usize) -> Result<ChildRef> {
        let state = self.state.read();
        match state.children.get(&parent) {
            Some(ledger) => ledger.at(index, false),
            None => Err(Error::IndexOutOfRange { index, len: 0 }),
        }
    }

    /// Pending child at an index
    pub fn pending_child_at(&self, parent: TokenId, index: usize) -> Result<ChildRef> {
        let state = self.state.read();
        match state.children.get(&parent) {
            Some(ledger) => ledger.at(index, true),
            None => Err(Error::IndexOutOfRange { index, len: 0 }),
        }
    }

    /// Locate a child pair in the parent's collections
    ///
    /// The position index answers in O(1). On an index miss the pair is
    /// instead confirmed with its home instance and the collections are
    /// scanned directly, so a desynced index degrades to a slow answer
    /// rather than a wrong one.
    pub fn find_child(&self, parent: TokenId, child: ChildRef) -> Option<ChildSlot> {
        {
            let state = self.state.read();
            if let Some(ledger) = state.children.get(&parent) {
                if let Some(slot) = ledger.position(child) {
                    let confirmed = ledger
                        .at(slot.index, slot.pending)
                        .map(|entry| entry == child)
                        .unwrap_or(false);
                    if confirmed {
                        return Some(slot);
                    }
                }
            }
        }

        let instance = self.directory.resolve(child.ledger)?;
        let record = instance.direct_owner_of(child.token).ok()?;
        if !(record.is_nested && record.owner == self.address && record.parent_id == parent) {
            return None;
        }
        let state = self.state.read();
        state.children.get(&parent)?.scan(child)
    }

    // ---- mint -------------------------------------------------------------

    /// Mint a token to an external account
    pub fn mint(&self, to: Address, token: TokenId) -> Result<()> {
        if to.is_zero() {
            return Err(Error::InvalidRecipient);
        }
        if token.is_none() {
            return Err(Error::ReservedTokenId);
        }
        if self.exists(token) {
            return Err(Error::AlreadyExists(token));
        }

        let info = TransferInfo {
            from: Address::ZERO,
            to,
            to_token: TokenId::NONE,
            token,
            nested: false,
        };
        self.run_before_transfer(&info)?;

        self.book.increment_balance(to);
        {
            let mut state = self.state.write();
            state.owners.set(token, OwnerRecord::external(to));
            state.events.push(NestingEvent::Transferred {
                from: Address::ZERO,
                to,
                token,
            });
        }

        self.metrics.record_mint();
        info!(instance = %self.config.instance_name, %to, %token, "token minted");
        self.run_after_transfer(&info);
        Ok(())
    }

    /// Mint a token directly into the pending children of a destination
    /// token, possibly in another instance
    pub fn nest_mint(&self, to: Address, token: TokenId, dest_token: TokenId) -> Result<()> {
        if to.is_zero() {
            return Err(Error::InvalidRecipient);
        }
        if token.is_none() {
            return Err(Error::ReservedTokenId);
        }
        if self.exists(token) {
            return Err(Error::AlreadyExists(token));
        }
        if to == self.address && dest_token == token {
            return Err(Error::SelfNesting(token));
        }
        let destination = self
            .directory
            .resolve(to)
            .filter(|instance| instance.supports_nesting())
            .ok_or(Error::NotNestableImplementer(to))?;

        let info = TransferInfo {
            from: Address::ZERO,
            to,
            to_token: dest_token,
            token,
            nested: true,
        };
        self.run_before_transfer(&info)?;

        // The record written here is exactly what the destination verifies
        // when the child is reported.
        self.book.increment_balance(to);
        self.state
            .write()
            .owners
            .set(token, OwnerRecord::nested(to, dest_token));

        if let Err(e) = destination.add_child(self.address, dest_token, token) {
            self.unwind_mint(to, token);
            return Err(e);
        }

        self.push_event(NestingEvent::NestTransferred {
            from: Address::ZERO,
            to,
            from_token: TokenId::NONE,
            to_token: dest_token,
            token,
        });
        self.metrics.record_mint();
        info!(
            instance = %self.config.instance_name,
            %to,
            %token,
            destination = %dest_token,
            "token nest-minted"
        );
        self.run_after_transfer(&info);
        Ok(())
    }

    // ---- transfers --------------------------------------------------------

    /// Transfer a token to an external account
    pub fn transfer(&self, caller: Address, from: Address, to: Address, token: TokenId) -> Result<()> {
        if to.is_zero() {
            return Err(Error::InvalidRecipient);
        }
        self.transfer_inner(caller, from, to, token, TokenId::NONE, false)
    }

    /// Transfer a token into the pending children of a destination token
    pub fn nest_transfer(
        &self,
        caller: Address,
        from: Address,
        to: Address,
        token: TokenId,
        dest_token: TokenId,
    ) -> Result<()> {
        if to.is_zero() {
            return Err(Error::InvalidRecipient);
        }
        self.transfer_inner(caller, from, to, token, dest_token, true)
    }

    fn transfer_inner(
        &self,
        caller: Address,
        from: Address,
        to: Address,
        token: TokenId,
        dest_token: TokenId,
        nested: bool,
    ) -> Result<()> {
        let record = self.require_authorized(caller, token)?;
        if record.owner != from {
            return Err(Error::WrongOwner {
                token,
                claimed: from,
                actual: record.owner,
            });
        }
        let destination = if nested {
            Some(self.check_destination(to, dest_token, token)?)
        } else {
            None
        };

        let info = TransferInfo {
            from,
            to,
            to_token: if nested { dest_token } else { TokenId::NONE },
            token,
            nested,
        };
        self.run_before_transfer(&info)?;

        // Move the balance and rewrite the record. If the destination
        // rejects the child report, both are undone and the operation
        // leaves no trace.
        self.book.decrement_balance(from)?;
        self.book.increment_balance(to);
        let new_record = if nested {
            OwnerRecord::nested(to, dest_token)
        } else {
            OwnerRecord::external(to)
        };
        self.state.write().owners.set(token, new_record);

        if let Some(destination) = destination {
            if let Err(e) = destination.add_child(self.address, dest_token, token) {
                self.state.write().owners.set(token, record);
                if self.book.decrement_balance(to).is_err() {
                    warn!(%to, %token, "balance rollback underflowed");
                }
                self.book.increment_balance(from);
                return Err(e);
            }
        }

        // The slot change invalidates any single-token approval
        self.book.clear_approval(token);

        // A nested source leaves a stale entry in its old parent's
        // collection; tell that instance to drop it. In the unnest flow
        // the parent removed its entry before relocating, so the notice
        // lands on nothing.
        if record.is_nested {
            if let Some(home) = self.directory.resolve(record.owner) {
                if let Err(e) = home.drop_child(self.address, record.parent_id, token) {
                    warn!(
                        %token,
                        parent = %record.parent_id,
                        error = %e,
                        "previous parent kept its entry for the moved child"
                    );
                }
            }
        }

        let event = if nested {
            NestingEvent::NestTransferred {
                from,
                to,
                from_token: record.parent_id,
                to_token: dest_token,
                token,
            }
        } else {
            NestingEvent::Transferred { from, to, token }
        };
        self.push_event(event);
        self.metrics.record_transfer(nested);
        debug!(
            instance = %self.config.instance_name,
            %from,
            %to,
            %token,
            nested,
            "token transferred"
        );
        self.run_after_transfer(&info);
        Ok(())
    }

    // ---- child management -------------------------------------------------

    /// Inbound child report from a counterpart instance
    ///
    /// `caller` claims its token `child_token` is now directly owned by
    /// `parent` here. The claim is only recorded once the caller's own
    /// ownership record confirms it; the child lands in the pending
    /// collection awaiting acceptance.
    pub fn add_child(&self, caller: Address, parent: TokenId, child_token: TokenId) -> Result<()> {
        if !self.exists(parent) {
            return Err(Error::NotFound(parent));
        }
        let reporter = self
            .directory
            .resolve(caller)
            .filter(|instance| instance.supports_nesting())
            .ok_or(Error::NotNestableImplementer(caller))?;
        let child = ChildRef::new(caller, child_token);

        {
            let state = self.state.read();
            if let Some(ledger) = state.children.get(&parent) {
                if ledger.contains(child) {
                    return Err(Error::DuplicateRelationship { parent, child });
                }
            }
        }

        // A claim alone never mutates state
        let confirmed = reporter
            .direct_owner_of(child_token)
            .map(|r| r.is_nested && r.owner == self.address && r.parent_id == parent)
            .unwrap_or(false);
        if !confirmed {
            return Err(Error::ParentChildMismatch { parent, child });
        }

        self.run_before_add_child(parent, child)?;

        let index = {
            let mut state = self.state.write();
            let capacity = self.config.limits.max_pending_children;
            let index = state
                .children
                .entry(parent)
                .or_default()
                .add_pending(parent, child, capacity)?;
            state.events.push(NestingEvent::ChildProposed {
                parent,
                index,
                child,
            });
            index
        };

        self.metrics.record_child_proposed();
        debug!(
            instance = %self.config.instance_name,
            %parent,
            %child,
            index,
            "child proposed"
        );
        self.run_after_add_child(parent, child);
        Ok(())
    }

    /// Promote the pending child at `index` into the active collection,
    /// verifying the entry there is the expected pair
    pub fn accept_child(
        &self,
        caller: Address,
        parent: TokenId,
        index: usize,
        child: ChildRef,
    ) -> Result<()> {
        self.require_authorized(caller, parent)?;
        self.run_before_accept_child(parent, child)?;

        let new_index = {
            let mut state = self.state.write();
            let ledger = state
                .children
                .get_mut(&parent)
                .ok_or(Error::IndexOutOfRange { index, len: 0 })?;
            let new_index = ledger.promote_at(parent, index, child)?;
            state.events.push(NestingEvent::ChildAccepted {
                parent,
                index: new_index,
                child,
            });
            new_index
        };

        self.metrics.record_child_accepted();
        debug!(
            instance = %self.config.instance_name,
            %parent,
            %child,
            index = new_index,
            "child accepted"
        );
        self.run_after_accept_child(parent, child);
        Ok(())
    }

    /// Remove the child entry at `index` of the named collection,
    /// verifying it is the expected pair. A non-zero `to` relocates the
    /// child token to that external account through its home instance; a
    /// zero `to` abandons it where it stands.
    pub fn unnest_child(
        &self,
        caller: Address,
        parent: TokenId,
        to: Address,
        index: usize,
        child: ChildRef,
        from_pending: bool,
    ) -> Result<()> {
        self.require_authorized(caller, parent)?;
        self.run_before_unnest_child(parent, child, from_pending)?;

        {
            let mut state = self.state.write();
            let ledger = state
                .children
                .get_mut(&parent)
                .ok_or(Error::IndexOutOfRange { index, len: 0 })?;
            ledger.remove_at(parent, index, child, from_pending)?;
            let now_empty = ledger.is_empty();
            if now_empty {
                state.children.remove(&parent);
            }
        }

        if !to.is_zero() {
            let relocated = self
                .counterpart(child.ledger)
                .and_then(|instance| instance.transfer(self.address, self.address, to, child.token));
            if let Err(e) = relocated {
                // Put the entry back; order within the collection is not
                // guaranteed across removals, so appending is enough.
                self.state
                    .write()
                    .children
                    .entry(parent)
                    .or_default()
                    .reinstate(child, from_pending);
                return Err(e);
            }
        }

        self.push_event(NestingEvent::ChildUnnested {
            parent,
            index,
            child,
            from_pending,
        });
        self.metrics.record_child_unnested();
        debug!(
            instance = %self.config.instance_name,
            %parent,
            %child,
            from_pending,
            relocated = !to.is_zero(),
            "child unnested"
        );
        self.run_after_unnest_child(parent, child, from_pending);
        Ok(())
    }

    /// Drop the entire pending collection of a parent
    ///
    /// `max_rejections` guards against rejecting children that raced in
    /// after the caller last looked: if more are pending than the caller
    /// expected, nothing is dropped. Dropped children are abandoned where
    /// they stand; their home instances still record this parent as owner.
    pub fn reject_all_children(
        &self,
        caller: Address,
        parent: TokenId,
        max_rejections: usize,
    ) -> Result<()> {
        self.require_authorized(caller, parent)?;
        self.run_before_reject_all(parent)?;

        let dropped = {
            let mut state = self.state.write();
            let count = match state.children.get_mut(&parent) {
                Some(ledger) => {
                    let pending = ledger.pending().len();
                    if pending > max_rejections {
                        return Err(Error::UnexpectedChildCount {
                            expected: max_rejections,
                            actual: pending,
                        });
                    }
                    ledger.clear_pending();
                    let now_empty = ledger.is_empty();
                    if now_empty {
                        state.children.remove(&parent);
                    }
                    pending
                }
                None => 0,
            };
            state.events.push(NestingEvent::AllChildrenRejected { parent });
            count
        };

        self.metrics.record_reject_all();
        debug!(
            instance = %self.config.instance_name,
            %parent,
            dropped,
            "pending children rejected"
        );
        self.run_after_reject_all(parent);
        Ok(())
    }

    /// Inbound removal notice from a counterpart instance
    ///
    /// `caller` reports that its token `child_token` no longer belongs
    /// under `parent` here, after a burn or an outbound transfer on the
    /// child's home instance. The entry goes only once the caller's own
    /// records confirm the nesting is over; a notice for a still-nested
    /// child is refused. A notice for an entry already gone is a no-op.
    pub fn drop_child(&self, caller: Address, parent: TokenId, child_token: TokenId) -> Result<()> {
        let reporter = self.counterpart(caller)?;
        let child = ChildRef::new(caller, child_token);

        // A record still naming this parent means the nesting is live
        // and the entry stays
        let live = reporter
            .direct_owner_of(child_token)
            .map(|r| r.is_nested && r.owner == self.address && r.parent_id == parent)
            .unwrap_or(false);
        if live {
            return Err(Error::ParentChildMismatch { parent, child });
        }

        let dropped = {
            let mut state = self.state.write();
            let slot = state
                .children
                .get(&parent)
                .and_then(|ledger| ledger.position(child));
            match slot {
                Some(slot) => {
                    let ledger = state
                        .children
                        .get_mut(&parent)
                        .ok_or(Error::IndexOutOfRange { index: slot.index, len: 0 })?;
                    ledger.remove_at(parent, slot.index, child, slot.pending)?;
                    let now_empty = ledger.is_empty();
                    if now_empty {
                        state.children.remove(&parent);
                    }
                    state.events.push(NestingEvent::ChildUnnested {
                        parent,
                        index: slot.index,
                        child,
                        from_pending: slot.pending,
                    });
                    Some(slot)
                }
                None => None,
            }
        };

        if let Some(slot) = dropped {
            self.metrics.record_child_unnested();
            debug!(
                instance = %self.config.instance_name,
                %parent,
                %child,
                from_pending = slot.pending,
                "stale child entry dropped"
            );
        }
        Ok(())
    }

    // ---- burn -------------------------------------------------------------

    /// Burn a token and its active descendants
    ///
    /// `max_child_burns` caps how many descendants may burn along with the
    /// token. The whole subtree is rehearsed read-only first: the budget,
    /// every child record, every ancestry walk a counterpart entry will
    /// take, and this instance's own hooks all pass before any state
    /// changes. Pending children are dropped, not burned. When the burned
    /// token sits in a parent's collection, the parent instance is told to
    /// drop its entry once the subtree is gone. Returns the number of
    /// descendants burned.
    pub fn burn(&self, caller: Address, token: TokenId, max_child_burns: u64) -> Result<u64> {
        let record = self.require_authorized(caller, token)?;
        let root_owner = self.root_owner_of(token)?;
        let plan = self.plan_burn(token, max_child_burns)?;
        debug!(
            instance = %self.config.instance_name,
            %token,
            descendants = plan.descendants,
            "burn rehearsed"
        );

        let info = TransferInfo {
            from: record.owner,
            to: Address::ZERO,
            to_token: TokenId::NONE,
            token,
            nested: record.is_nested,
        };
        self.run_before_transfer(&info)?;
        for local in &plan.locals {
            self.run_before_transfer(local)?;
        }

        // Resolved before anything changes; the notice itself goes out
        // only after the subtree is gone.
        let parent_home = if record.is_nested {
            self.directory.resolve(record.owner)
        } else {
            None
        };

        let burned = self.execute_burn(token, record.owner, root_owner, max_child_burns)?;

        if let Some(home) = parent_home {
            if let Err(e) = home.drop_child(self.address, record.parent_id, token) {
                warn!(
                    %token,
                    parent = %record.parent_id,
                    error = %e,
                    "parent instance kept its entry for the burned child"
                );
            }
        }

        self.metrics.record_burn(burned);
        info!(
            instance = %self.config.instance_name,
            %token,
            descendants = burned,
            "token burned"
        );
        for local in &plan.locals {
            self.run_after_transfer(local);
        }
        self.run_after_transfer(&info);
        Ok(burned)
    }

    // Destroys `token` and its active subtree, assuming the rehearsal
    // passed. Same-instance children recurse here directly; children on
    // other instances go through their public burn, whose own entry
    // checks resolve against the same records the rehearsal saw, since a
    // frame's record is removed only after its whole subtree is done.
    fn execute_burn(
        &self,
        token: TokenId,
        owner: Address,
        root_owner: Address,
        budget: u64,
    ) -> Result<u64> {
        self.book.decrement_balance(owner)?;
        self.book.clear_approval(token);

        let active = {
            let mut state = self.state.write();
            match state.children.remove(&token) {
                Some(mut ledger) => {
                    ledger.clear_pending();
                    ledger.clear_active()
                }
                None => Vec::new(),
            }
        };

        let mut burned: u64 = 0;
        for child in active {
            if burned >= budget {
                // Only reachable when the subtree grew between the
                // rehearsal and now
                return Err(Error::BudgetExceeded { child });
            }
            let remaining = budget - burned - 1;
            let sub = if child.ledger == self.address {
                let sub = self.execute_burn(child.token, self.address, root_owner, remaining)?;
                self.metrics.live_tokens.dec();
                sub
            } else {
                let instance = self.counterpart(child.ledger)?;
                instance.burn(self.address, child.token, remaining)?
            };
            burned += sub + 1;
        }

        {
            let mut state = self.state.write();
            state.owners.remove(token);
            state.events.push(NestingEvent::Transferred {
                from: root_owner,
                to: Address::ZERO,
                token,
            });
        }
        Ok(burned)
    }

    // Read-only rehearsal of the recursive burn. Walks the active
    // subtree with an explicit stack, verifying each child's own record
    // along the way and failing on the first child that does not fit the
    // budget. Mirrors the spending the burn itself will do: before child
    // i, spending so far must be under the frame's budget, and the
    // child's frame gets (budget - spent - 1) of its own.
    //
    // Frames reached from the root without leaving this instance burn in
    // process, with no later step that can refuse, so their transfer
    // views are collected for hook screening up front. Every edge that
    // crosses instances becomes a counterpart burn entry at execute
    // time; the ancestry walk that entry performs is taken here first,
    // while failing is still free.
    fn plan_burn(&self, token: TokenId, budget: u64) -> Result<BurnPlan> {
        let mut locals = Vec::new();
        let mut stack = vec![PlanFrame {
            parent: ChildRef::new(self.address, token),
            children: self.children_of(token),
            next: 0,
            budget,
            spent: 0,
            local: true,
        }];

        while !stack.is_empty() {
            let top = stack.len() - 1;
            if stack[top].next < stack[top].children.len() {
                let child = stack[top].children[stack[top].next];
                if stack[top].spent >= stack[top].budget {
                    return Err(Error::BudgetExceeded { child });
                }
                stack[top].next += 1;
                let parent = stack[top].parent;
                let child_budget = stack[top].budget - stack[top].spent - 1;
                let child_local = stack[top].local && child.ledger == self.address;

                let instance = self.counterpart(child.ledger)?;
                let confirmed = instance
                    .direct_owner_of(child.token)
                    .map(|r| r.is_nested && r.owner == parent.ledger && r.parent_id == parent.token)
                    .unwrap_or(false);
                if !confirmed {
                    return Err(Error::ParentChildMismatch {
                        parent: parent.token,
                        child,
                    });
                }

                if child.ledger != parent.ledger {
                    instance.root_owner_of(child.token)?;
                }
                if child_local {
                    locals.push(TransferInfo {
                        from: self.address,
                        to: Address::ZERO,
                        to_token: TokenId::NONE,
                        token: child.token,
                        nested: true,
                    });
                }

                let grandchildren = instance.children_of(child.token)?;
                stack.push(PlanFrame {
                    parent: child,
                    children: grandchildren,
                    next: 0,
                    budget: child_budget,
                    spent: 0,
                    local: child_local,
                });
            } else if let Some(finished) = stack.pop() {
                match stack.last_mut() {
                    Some(parent_frame) => parent_frame.spent += finished.spent + 1,
                    None => {
                        return Ok(BurnPlan {
                            descendants: finished.spent,
                            locals,
                        })
                    }
                }
            }
        }
        Ok(BurnPlan {
            descendants: 0,
            locals,
        })
    }

    // ---- snapshots --------------------------------------------------------

    /// Capture the current state
    pub fn take_snapshot(&self) -> Snapshot {
        let state = self.state.read();
        Snapshot {
            address: self.address,
            instance_name: self.config.instance_name.clone(),
            taken_at: Utc::now(),
            owners: state.owners.clone(),
            children: state.children.clone(),
        }
    }

    /// Capture the current state and write it to the configured snapshot
    /// directory. Returns the path written.
    pub fn save_snapshot(&self) -> Result<PathBuf> {
        let snapshot = self.take_snapshot();
        let filename = format!(
            "{}-{}.snap",
            self.config.instance_name,
            snapshot.taken_at.format("%Y%m%dT%H%M%S%3f")
        );
        let path = self.config.snapshot.dir.join(filename);
        snapshot.save(&path)?;
        info!(
            instance = %self.config.instance_name,
            path = %path.display(),
            "snapshot written"
        );
        Ok(path)
    }

    /// Replace the instance state with a snapshot's
    ///
    /// The snapshot must belong to this address and pass structural
    /// validation. The event log is cleared; events are notifications, not
    /// durable history.
    pub fn restore_snapshot(&self, snapshot: Snapshot) -> Result<()> {
        if snapshot.address != self.address {
            return Err(Error::Invariant(format!(
                "snapshot belongs to {}, not {}",
                snapshot.address, self.address
            )));
        }
        snapshot.validate()?;

        let mut state = self.state.write();
        state.owners = snapshot.owners;
        state.children = snapshot.children;
        state.events.clear();
        self.metrics.live_tokens.set(state.owners.len() as i64);
        info!(instance = %self.config.instance_name, tokens = state.owners.len(), "snapshot restored");
        Ok(())
    }

    // ---- helpers ----------------------------------------------------------

    fn require_authorized(&self, caller: Address, token: TokenId) -> Result<OwnerRecord> {
        let record = self.direct_owner_of(token)?;
        if caller == record.owner || self.book.approved_or_owner(caller, token, record.owner) {
            Ok(record)
        } else {
            Err(Error::NotAuthorized { caller, token })
        }
    }

    fn counterpart(&self, addr: Address) -> Result<Arc<dyn Nestable>> {
        self.directory
            .resolve(addr)
            .ok_or(Error::NotNestableImplementer(addr))
    }

    // Destination checks for a nested transfer: the target must speak the
    // nesting protocol, must not be the moved token itself, and must not
    // sit anywhere inside the moved token's subtree.
    fn check_destination(
        &self,
        to: Address,
        dest_token: TokenId,
        token: TokenId,
    ) -> Result<Arc<dyn Nestable>> {
        let destination = self
            .directory
            .resolve(to)
            .filter(|instance| instance.supports_nesting())
            .ok_or(Error::NotNestableImplementer(to))?;
        if to == self.address && dest_token == token {
            return Err(Error::SelfNesting(token));
        }

        let max_hops = self.config.limits.max_ancestry_hops;
        let mut ledger = to;
        let mut current = dest_token;
        for _ in 0..max_hops {
            let instance = self.counterpart(ledger)?;
            let record = instance.direct_owner_of(current)?;
            if !record.is_nested {
                return Ok(destination);
            }
            if record.owner == self.address && record.parent_id == token {
                return Err(Error::Cycle { token, max_hops });
            }
            ledger = record.owner;
            current = record.parent_id;
        }
        Err(Error::Cycle { token, max_hops })
    }

    fn unwind_mint(&self, to: Address, token: TokenId) {
        self.state.write().owners.remove(token);
        if self.book.decrement_balance(to).is_err() {
            warn!(%to, %token, "balance rollback underflowed");
        }
    }

    fn push_event(&self, event: NestingEvent) {
        self.state.write().events.push(event);
    }

    fn run_before_transfer(&self, info: &TransferInfo) -> Result<()> {
        for hook in &self.hooks {
            hook.before_transfer(info)?;
        }
        Ok(())
    }

    fn run_after_transfer(&self, info: &TransferInfo) {
        for hook in &self.hooks {
            hook.after_transfer(info);
        }
    }

    fn run_before_add_child(&self, parent: TokenId, child: ChildRef) -> Result<()> {
        for hook in &self.hooks {
            hook.before_add_child(parent, child)?;
        }
        Ok(())
    }

    fn run_after_add_child(&self, parent: TokenId, child: ChildRef) {
        for hook in &self.hooks {
            hook.after_add_child(parent, child);
        }
    }

    fn run_before_accept_child(&self, parent: TokenId, child: ChildRef) -> Result<()> {
        for hook in &self.hooks {
            hook.before_accept_child(parent, child)?;
        }
        Ok(())
    }

    fn run_after_accept_child(&self, parent: TokenId, child: ChildRef) {
        for hook in &self.hooks {
            hook.after_accept_child(parent, child);
        }
    }

    fn run_before_unnest_child(
        &self,
        parent: TokenId,
        child: ChildRef,
        from_pending: bool,
    ) -> Result<()> {
        for hook in &self.hooks {
            hook.before_unnest_child(parent, child, from_pending)?;
        }
        Ok(())
    }

    fn run_after_unnest_child(&self, parent: TokenId, child: ChildRef, from_pending: bool) {
        for hook in &self.hooks {
            hook.after_unnest_child(parent, child, from_pending);
        }
    }

    fn run_before_reject_all(&self, parent: TokenId) -> Result<()> {
        for hook in &self.hooks {
            hook.before_reject_all(parent)?;
        }
        Ok(())
    }

    fn run_after_reject_all(&self, parent: TokenId) {
        for hook in &self.hooks {
            hook.after_reject_all(parent);
        }
    }
}

impl Nestable for NestingLedger {
    fn address(&self) -> Address {
        self.address
    }

    fn supports_nesting(&self) -> bool {
        true
    }

    fn direct_owner_of(&self, token: TokenId) -> Result<OwnerRecord> {
        NestingLedger::direct_owner_of(self, token)
    }

    fn root_owner_of(&self, token: TokenId) -> Result<Address> {
        NestingLedger::root_owner_of(self, token)
    }

    fn children_of(&self, parent: TokenId) -> Result<Vec<ChildRef>> {
        Ok(NestingLedger::children_of(self, parent))
    }

    fn pending_children_of(&self, parent: TokenId) -> Result<Vec<ChildRef>> {
        Ok(NestingLedger::pending_children_of(self, parent))
    }

    fn add_child(&self, caller: Address, parent: TokenId, child_token: TokenId) -> Result<()> {
        NestingLedger::add_child(self, caller, parent, child_token)
    }

    fn drop_child(&self, caller: Address, parent: TokenId, child_token: TokenId) -> Result<()> {
        NestingLedger::drop_child(self, caller, parent, child_token)
    }

    fn burn(&self, caller: Address, token: TokenId, max_child_burns: u64) -> Result<u64> {
        NestingLedger::burn(self, caller, token, max_child_burns)
    }

    fn transfer(&self, caller: Address, from: Address, to: Address, token: TokenId) -> Result<()> {
        NestingLedger::transfer(self, caller, from, to, token)
    }
}
