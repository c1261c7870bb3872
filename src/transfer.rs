//! Transfer Workflow
//!
//! The unit of work that moves `amount` from one account to another. It runs
//! against a transaction-scoped [`Queries`]; the caller owns begin, commit
//! and rollback (see [`crate::store::Store::exec_tx`]).
//!
//! # Lock ordering
//!
//! `UPDATE accounts` takes a row lock held until the transaction ends. Two
//! opposite transfers (A→B, B→A) that each lock their sender first can wait
//! on each other forever. Balances are therefore always updated in ascending
//! account-id order, whichever side is the debit:
//!
//! ```text
//! 5 → 9 : add(5, -amt) then add(9, +amt)
//! 9 → 5 : add(5, +amt) then add(9, -amt)
//! ```

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::StoreError;
use crate::models::{
    Account, AddAccountBalanceParams, CreateEntryParams, CreateTransferParams, Entry, Transfer,
};
use crate::queries::Queries;

/// Input for the transfer transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferTxParams {
    pub from_account_id: i64,
    pub to_account_id: i64,
    pub amount: i64,
}

impl TransferTxParams {
    /// Checks that need no database round-trip
    pub fn validate(&self) -> Result<(), StoreError> {
        if self.amount <= 0 {
            return Err(StoreError::InvalidAmount(self.amount));
        }
        if self.from_account_id == self.to_account_id {
            return Err(StoreError::SameAccount(self.from_account_id));
        }
        Ok(())
    }
}

impl From<TransferTxParams> for CreateTransferParams {
    fn from(p: TransferTxParams) -> Self {
        CreateTransferParams {
            from_account_id: p.from_account_id,
            to_account_id: p.to_account_id,
            amount: p.amount,
        }
    }
}

/// Everything the transfer transaction wrote, as committed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferTxResult {
    pub transfer: Transfer,
    pub from_account: Account,
    pub to_account: Account,
    pub from_entry: Entry,
    pub to_entry: Entry,
}

/// What to do when the sender's balance would go negative
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OverdraftPolicy {
    Allow,
    #[default]
    Reject,
}

impl OverdraftPolicy {
    pub fn from_reject_flag(reject: bool) -> Self {
        if reject {
            OverdraftPolicy::Reject
        } else {
            OverdraftPolicy::Allow
        }
    }
}

/// Run the transfer steps on `q`. Any error leaves the caller to roll back.
pub async fn execute<Q>(
    q: &mut Q,
    params: TransferTxParams,
    policy: OverdraftPolicy,
) -> Result<TransferTxResult, StoreError>
where
    Q: Queries + ?Sized,
{
    params.validate()?;

    let transfer = q.create_transfer(params.into()).await?;

    let from_entry = q
        .create_entry(CreateEntryParams {
            account_id: params.from_account_id,
            amount: -params.amount,
        })
        .await?;

    let to_entry = q
        .create_entry(CreateEntryParams {
            account_id: params.to_account_id,
            amount: params.amount,
        })
        .await?;

    let (from_account, to_account) = if params.from_account_id < params.to_account_id {
        add_money(
            q,
            params.from_account_id,
            -params.amount,
            params.to_account_id,
            params.amount,
        )
        .await?
    } else {
        let (to_account, from_account) = add_money(
            q,
            params.to_account_id,
            params.amount,
            params.from_account_id,
            -params.amount,
        )
        .await?;
        (from_account, to_account)
    };

    if policy == OverdraftPolicy::Reject && from_account.balance < 0 {
        return Err(StoreError::InsufficientFunds {
            account_id: from_account.id,
            balance: from_account.balance,
        });
    }

    debug!(
        transfer_id = transfer.id,
        from = params.from_account_id,
        to = params.to_account_id,
        amount = params.amount,
        "Transfer applied"
    );

    Ok(TransferTxResult {
        transfer,
        from_account,
        to_account,
        from_entry,
        to_entry,
    })
}

/// Apply two balance deltas in the given order; callers pass the lower id first
pub async fn add_money<Q>(
    q: &mut Q,
    account_id1: i64,
    amount1: i64,
    account_id2: i64,
    amount2: i64,
) -> Result<(Account, Account), StoreError>
where
    Q: Queries + ?Sized,
{
    let account1 = q
        .add_account_balance(AddAccountBalanceParams {
            id: account_id1,
            amount: amount1,
        })
        .await?;
    let account2 = q
        .add_account_balance(AddAccountBalanceParams {
            id: account_id2,
            amount: amount2,
        })
        .await?;
    Ok((account1, account2))
}
