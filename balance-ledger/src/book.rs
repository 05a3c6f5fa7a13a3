//! Balance and approval book

use dashmap::DashMap;
use nesting_core::{Address, BalanceBook, Error, Result, TokenId};
use tracing::debug;

/// Balance and approval book shared by one or more ledger instances
///
/// Balances count whole tokens per address, including the instance
/// addresses that hold nested tokens. Approvals come in two shapes: a
/// single-token approval (consumed when the token moves) and an operator
/// grant covering everything a given owner holds.
#[derive(Default)]
pub struct AccountBook {
    balances: DashMap<Address, u64>,
    approvals: DashMap<TokenId, Address>,
    operators: DashMap<(Address, Address), ()>,
}

impl AccountBook {
    /// Create an empty book
    pub fn new() -> Self {
        Self::default()
    }

    /// Tokens held by an address
    pub fn balance_of(&self, addr: Address) -> u64 {
        self.balances.get(&addr).map(|v| *v).unwrap_or(0)
    }

    /// Grant a single-token approval, replacing any previous one
    pub fn approve(&self, token: TokenId, spender: Address) {
        self.approvals.insert(token, spender);
        debug!(%token, %spender, "approval granted");
    }

    /// Holder of the token's single-token approval
    pub fn approval_of(&self, token: TokenId) -> Option<Address> {
        self.approvals.get(&token).map(|v| *v)
    }

    /// Grant or revoke `operator` acting for everything `owner` holds
    pub fn set_operator(&self, owner: Address, operator: Address, approved: bool) {
        if approved {
            self.operators.insert((owner, operator), ());
        } else {
            self.operators.remove(&(owner, operator));
        }
        debug!(%owner, %operator, approved, "operator updated");
    }

    /// True when `operator` may act for all of `owner`'s tokens
    pub fn is_operator(&self, owner: Address, operator: Address) -> bool {
        self.operators.contains_key(&(owner, operator))
    }

    /// Number of addresses currently holding tokens
    pub fn tracked_addresses(&self) -> usize {
        self.balances.iter().filter(|entry| *entry.value() > 0).count()
    }

    /// Drop every balance, approval, and operator grant
    pub fn clear_all(&self) {
        self.balances.clear();
        self.approvals.clear();
        self.operators.clear();
        debug!("book cleared");
    }
}

impl BalanceBook for AccountBook {
    fn increment_balance(&self, addr: Address) {
        *self.balances.entry(addr).or_insert(0) += 1;
    }

    fn decrement_balance(&self, addr: Address) -> Result<()> {
        match self.balances.get_mut(&addr) {
            Some(mut balance) if *balance > 0 => {
                *balance -= 1;
                Ok(())
            }
            _ => Err(Error::Invariant(format!("balance underflow for {}", addr))),
        }
    }

    fn clear_approval(&self, token: TokenId) {
        self.approvals.remove(&token);
    }

    fn approved_or_owner(&self, spender: Address, token: TokenId, direct_owner: Address) -> bool {
        spender == direct_owner
            || self.approval_of(token) == Some(spender)
            || self.is_operator(direct_owner, spender)
    }
}
